use std::fmt::Debug;

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

#[derive(Debug, TypedBuilder, Serialize, Deserialize)]
pub struct Credentials {
    pub user_name: UserName,
    pub password: Password,
}

#[derive(Clone, PartialEq, Eq, Debug, From, Display, Serialize, Deserialize)]
pub struct UserName(String);
impl UserName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, From, Serialize, Deserialize)]
pub struct Password(String);
impl Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(..)")
    }
}
impl Password {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::Credentials;

    #[test]
    fn password_is_hidden_from_debug_output() {
        let credentials = Credentials::builder()
            .user_name("jdoe".to_owned().into())
            .password("hunter2".to_owned().into())
            .build();
        let debug = format!("{credentials:?}");
        assert!(debug.contains("jdoe"));
        assert!(!debug.contains("hunter2"));
        assert_eq!(credentials.password.expose(), "hunter2");
    }
}
