use std::env;

use crate::error::ExtractError;

pub const DB_SERVER: &str = "DB_SERVER";
pub const DB_DATABASE: &str = "DB_DATABASE";
pub const DB_USERNAME: &str = "DB_USERNAME";
pub const DB_PASSWORD: &str = "DB_PASSWORD";

/// Required variables, in the order they are reported when missing.
pub const REQUIRED_VARS: [&str; 4] = [DB_SERVER, DB_DATABASE, DB_USERNAME, DB_PASSWORD];

/// Database login, resolved once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub server: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Read the credentials from the process environment.
    pub fn from_env() -> Result<Credentials, ExtractError> {
        Credentials::from_lookup(|name| env::var(name).ok())
    }

    /// Resolve the four variables with `lookup`.  An empty value counts as
    /// missing.  All the missing names are reported together.
    pub fn from_lookup<F>(lookup: F) -> Result<Credentials, ExtractError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let values: Vec<Option<String>> = REQUIRED_VARS
            .iter()
            .map(|name| lookup(name).filter(|v| !v.is_empty()))
            .collect();
        let missing: Vec<&'static str> = REQUIRED_VARS
            .iter()
            .zip(values.iter())
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ExtractError::Configuration(missing));
        }

        let mut values = values.into_iter().flatten();
        let mut next = || values.next().unwrap_or_default();
        Ok(Credentials {
            server: next(),
            database: next(),
            username: next(),
            password: next(),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
