use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context};
use log::{info, warn};
use primeweb_scraping_utils::{
    credentials::{Credentials, Password, UserName},
    fs_json_util::{read_toml, write_toml},
};
use serde::{Deserialize, Serialize};

use crate::schema::Delta;

const CONFIG_FILE_NAME: &str = "primeweb.toml";
const KEYRING_SERVICE: &str = "primeweb";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<UserName>,
    /// Break that has to be taken on top of the core time.
    #[serde(default = "default_lunch_break")]
    pub lunch_break: Delta,
    /// Days before the end date fetched when no start date is given.
    #[serde(default = "default_days")]
    pub default_days: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_lunch_break() -> Delta {
    Delta::from_minutes(30)
}
fn default_days() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            lunch_break: default_lunch_break(),
            default_days: default_days(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// `primeweb.toml` in the platform configuration directory.
    pub fn default_path() -> anyhow::Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("Could not determine the configuration directory")?
            .join(CONFIG_FILE_NAME))
    }

    /// Loads the configuration, falling back to defaults if the file is absent.
    pub fn load(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if !path.exists() {
            info!("Config file was not found at {path:?}.  Using defaults.");
            return Ok(Self::default());
        }
        read_toml(path)
    }

    pub fn save(&self, path: impl Into<PathBuf>) -> anyhow::Result<()> {
        write_toml(path, self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Values given on the command line, taking precedence over the config file.
#[derive(Clone, Debug, Default)]
pub struct LoginOverrides {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Combines command line, config file and keyring, in that order.
///
/// `stored_password` is only consulted when no password was given directly.
pub fn resolve_login(
    overrides: LoginOverrides,
    config: &Config,
    stored_password: impl FnOnce(&UserName) -> Option<Password>,
) -> anyhow::Result<(String, Credentials)> {
    let url = overrides.url.or_else(|| config.url.clone());
    let user_name = overrides
        .user
        .map(UserName::from)
        .or_else(|| config.username.clone());
    let password = match (overrides.password, &user_name) {
        (Some(password), _) => Some(Password::from(password)),
        (None, Some(user_name)) => stored_password(user_name),
        (None, None) => None,
    };
    match (url, user_name, password) {
        (Some(url), Some(user_name), Some(password))
            if !url.is_empty() && !user_name.as_str().is_empty() =>
        {
            let credentials = Credentials::builder()
                .user_name(user_name)
                .password(password)
                .build();
            Ok((url, credentials))
        }
        _ => bail!("Please provide URL, username, and password (see --help)"),
    }
}

pub fn load_password(user_name: &UserName) -> Option<Password> {
    let entry = match keyring::Entry::new(KEYRING_SERVICE, user_name.as_str()) {
        Ok(entry) => entry,
        Err(e) => {
            warn!("Could not open the keyring: {e}");
            return None;
        }
    };
    match entry.get_password() {
        Ok(password) => Some(password.into()),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!("Could not read the password from the keyring: {e}");
            None
        }
    }
}

pub fn save_password(user_name: &UserName, password: &Password) -> anyhow::Result<()> {
    keyring::Entry::new(KEYRING_SERVICE, user_name.as_str())?
        .set_password(password.expose())
        .context("Could not store the password in the keyring")
}
