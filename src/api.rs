use std::{marker::PhantomData, time::Duration};

use anyhow::{bail, Context};
use chrono::Datelike;
use log::{debug, info, warn};
use primeweb_scraping_utils::credentials::{Credentials, Password, UserName};
use scraper::Html;
use serde::Serialize;
use url::Url;

use crate::{
    chrono_util::format_form_date,
    parser::{parse_display_name, parse_journal, parse_journal_user, JournalUser},
    schema::{DateRange, DisplayName, Journal, UserId},
};

const LOGIN_PATH: &str = "Login.jsp";
const JOURNAL_QUERY_PATH: &str = "Querybuchungsjournal.jsp";
const JOURNAL_PATH: &str = "buchungsjournal.jsp";

pub struct MayNotBeLoggedIn;
pub struct LoggedIn;

pub struct PrimeWebClient<T> {
    _phantom: PhantomData<fn() -> T>,
    base_url: Url,
    reqwest: reqwest::Client,
    display_name: Option<DisplayName>,
    journal_user: Option<JournalUser>,
}

/// Parses the portal URL so that endpoint paths can be joined onto it.
pub fn normalize_base_url(base_url: &str) -> anyhow::Result<Url> {
    let base_url = base_url.trim();
    let base_url = if base_url.ends_with('/') {
        base_url.to_owned()
    } else {
        format!("{base_url}/")
    };
    Url::parse(&base_url).with_context(|| format!("Invalid portal URL: {base_url:?}"))
}

impl PrimeWebClient<MayNotBeLoggedIn> {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let reqwest = reqwest::Client::builder()
            .cookie_store(true)
            .connection_verbose(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            _phantom: PhantomData,
            base_url: normalize_base_url(base_url)?,
            reqwest,
            display_name: None,
            journal_user: None,
        })
    }

    /// Logs in and keeps the session cookie for later requests.
    pub async fn login(self, credentials: &Credentials) -> anyhow::Result<PrimeWebClient<LoggedIn>> {
        let response = self
            .reqwest
            .post(self.base_url.join(LOGIN_PATH)?)
            .form(&LoginForm::new(credentials))
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("Failed to log in: server returned {:?}", response.status());
        }
        let html = Html::parse_document(&response.text().await?);
        let display_name = parse_display_name(&html);
        match &display_name {
            Some(name) => info!("Logged in as {name}"),
            None => warn!("Display name was not found after logging in"),
        }

        Ok(PrimeWebClient {
            _phantom: PhantomData,
            base_url: self.base_url,
            reqwest: self.reqwest,
            display_name,
            journal_user: None,
        })
    }
}

impl PrimeWebClient<LoggedIn> {
    pub fn display_name(&self) -> Option<&DisplayName> {
        self.display_name.as_ref()
    }

    /// Downloads the journal report for `range` and parses it.
    pub async fn journal(&mut self, range: DateRange) -> anyhow::Result<Journal> {
        let html = self.fetch_journal_html(range).await?;
        parse_journal(&Html::parse_document(&html), range.start().year())
    }

    /// Downloads the journal report for `range` as raw HTML.
    pub async fn fetch_journal_html(&mut self, range: DateRange) -> anyhow::Result<String> {
        let user = self.journal_user().await?.clone();
        let name = user.name.as_ref().or(self.display_name.as_ref());
        let form = JournalForm::new(&user.id, name, range);
        debug!("Requesting journal from {} to {}", range.start(), range.end());

        let response = self
            .reqwest
            .post(self.base_url.join(JOURNAL_PATH)?)
            .form(&form)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!(
                "Failed to fetch the journal: server returned {:?}",
                response.status()
            );
        }
        Ok(response.text().await?)
    }

    async fn journal_user(&mut self) -> anyhow::Result<&JournalUser> {
        if self.journal_user.is_none() {
            let response = self
                .reqwest
                .get(self.base_url.join(JOURNAL_QUERY_PATH)?)
                .send()
                .await?;
            if !response.status().is_success() {
                bail!(
                    "Failed to open the journal query page: server returned {:?}",
                    response.status()
                );
            }
            let user = parse_journal_user(&Html::parse_document(&response.text().await?))?;
            debug!("Resolved journal user {user:?}");
            self.journal_user = Some(user);
        }
        self.journal_user
            .as_ref()
            .context("Journal user was not resolved")
    }
}

#[derive(Debug, Serialize)]
struct LoginForm<'a> {
    post: &'static str,
    language: &'static str,
    screensize: u16,
    browser: &'static str,
    browser_java_en: &'static str,
    #[serde(rename = "HasJavascript")]
    has_javascript: &'static str,
    userid: &'a UserName,
    password: &'a Password,
}
impl<'a> LoginForm<'a> {
    fn new(credentials: &'a Credentials) -> Self {
        Self {
            post: "true",
            language: "de",
            screensize: 1024,
            browser: "NS5",
            browser_java_en: "true",
            has_javascript: "true",
            userid: &credentials.user_name,
            password: &credentials.password,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct JournalForm<'a> {
    lstusers: &'a UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    nname: Option<&'a DisplayName>,
    date_start: String,
    date_end: String,
    display_type: &'static str,
    zeit_tag: &'static str,
    zeit_sum: &'static str,
    cb_kontenkz: &'static str,
    outputartkz: &'static str,
    outputart: &'static str,
    kontogruppe: &'static str,
    soll_tag: &'static str,
    soll_sum: &'static str,
    saldo_tag: &'static str,
    saldo_sum: &'static str,
    summenwerte: &'static str,
    korrfehlkont: &'static str,
    korrlohnkont: &'static str,
    rund_b: &'static str,
    anzprotag: &'static str,
    fuehrende_nullen: &'static str,
    layout: &'static str,
    aktkonten: &'static str,
}
impl<'a> JournalForm<'a> {
    fn new(user_id: &'a UserId, name: Option<&'a DisplayName>, range: DateRange) -> Self {
        const ON: &str = "ON";
        Self {
            lstusers: user_id,
            nname: name,
            date_start: format_form_date(range.start()),
            date_end: format_form_date(range.end()),
            display_type: "BUCHUNG",
            zeit_tag: ON,
            zeit_sum: ON,
            cb_kontenkz: ON,
            outputartkz: "0",
            outputart: "0",
            kontogruppe: "0",
            soll_tag: ON,
            soll_sum: ON,
            saldo_tag: ON,
            saldo_sum: ON,
            summenwerte: ON,
            korrfehlkont: ON,
            korrlohnkont: ON,
            rund_b: ON,
            anzprotag: "2",
            fuehrende_nullen: ON,
            layout: "0",
            aktkonten: ON,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use primeweb_scraping_utils::credentials::Credentials;

    use super::{normalize_base_url, JournalForm, LoginForm};
    use crate::schema::{DateRange, DisplayName, UserId};

    #[test]
    fn test_login_form() {
        let credentials = Credentials::builder()
            .user_name("abc".to_owned().into())
            .password("def".to_owned().into())
            .build();
        let form = LoginForm::new(&credentials);
        let json = serde_json::to_string(&form).unwrap();
        assert_eq!(
            json,
            r#"{"post":"true","language":"de","screensize":1024,"browser":"NS5","browser_java_en":"true","HasJavascript":"true","userid":"abc","password":"def"}"#
        );
    }

    #[test]
    fn test_journal_form() {
        let user_id = UserId::from("514500000545710F".to_owned());
        let name = DisplayName::from("Mustermann, Erika".to_owned());
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2023, 12, 28).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        );
        let encoded = serde_html_form::to_string(JournalForm::new(&user_id, Some(&name), range))
            .unwrap();
        assert!(encoded.starts_with("LSTUSERS=514500000545710F&NNAME=Mustermann%2C+Erika&"));
        assert!(encoded.contains("&DATE_START=28.12.2023&DATE_END=03.01.2024&"));
        assert!(encoded.contains("&DISPLAY_TYPE=BUCHUNG&"));
        assert!(encoded.contains("&CB_KONTENKZ=ON&"));
        assert!(encoded.contains("&RUND_B=ON&ANZPROTAG=2&FUEHRENDE_NULLEN=ON&"));
        assert!(encoded.ends_with("&AKTKONTEN=ON"));

        let encoded = serde_html_form::to_string(JournalForm::new(&user_id, None, range)).unwrap();
        assert!(!encoded.contains("NNAME"));
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let url = normalize_base_url("https://zeit.example.com/prime/").unwrap();
        assert_eq!(
            url.join("Login.jsp").unwrap().as_str(),
            "https://zeit.example.com/prime/Login.jsp"
        );
        let url = normalize_base_url(" https://zeit.example.com/prime ").unwrap();
        assert_eq!(
            url.join("buchungsjournal.jsp").unwrap().as_str(),
            "https://zeit.example.com/prime/buchungsjournal.jsp"
        );
        assert!(normalize_base_url("zeit.example.com").is_err());
    }
}
