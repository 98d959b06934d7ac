use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub account: AccountConfig,
    pub imap: ImapConfig,
    pub smtp: SmtpConfig,
    pub timeout_seconds: Option<u64>,
    pub log_file: Option<String>,
    pub log_level: Option<String>,
    #[serde(default)]
    pub quiet: bool,
}

/// Credentials shared by the mailbox and submission sessions.
#[derive(Debug, Deserialize, Clone)]
pub struct AccountConfig {
    pub address: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub folder: String,
    pub search: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
}

// Implicit TLS ports
pub const DEFAULT_IMAP_PORT: u16 = 993;
pub const DEFAULT_SMTP_PORT: u16 = 465;

pub const DEFAULT_IMAP_FOLDER: &str = "INBOX";
pub const DEFAULT_IMAP_SEARCH: &str = "UNSEEN";

impl AppConfig {
    // Load config from defaults, then file (if exists), then environment variables
    pub fn new() -> Result<Self, ConfigError> {
        Self::configure_defaults()?
            .add_source(File::with_name("config").required(false))
            // e.g. APP_ACCOUNT__PASSWORD=... APP_IMAP__HOST=...
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()
    }

    // Load config from a specific file path
    pub fn new_from_file(path: &str) -> Result<Self, ConfigError> {
        Self::configure_defaults()?
            .add_source(File::with_name(path).required(true))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()
    }

    fn configure_defaults()
    -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("imap.port", i64::from(DEFAULT_IMAP_PORT))?
            .set_default("imap.folder", DEFAULT_IMAP_FOLDER)?
            .set_default("imap.search", DEFAULT_IMAP_SEARCH)?
            .set_default("smtp.port", i64::from(DEFAULT_SMTP_PORT))
    }

    /// Network timeout applied to both sessions, `None` when unset or zero.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn load(toml_str: &str) -> Result<AppConfig, ConfigError> {
        AppConfig::configure_defaults()
            .unwrap()
            .add_source(File::from_str(toml_str, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    #[test]
    fn test_valid_config_deserialization() {
        let config = load(
            r#"
            timeout_seconds = 30

            [account]
            address = "me@example.com"
            password = "app-password"

            [imap]
            host = "imap.example.com"
            port = 1993
            folder = "Archive"
            search = "UNSEEN FROM \"boss@example.com\""

            [smtp]
            host = "smtp.example.com"
            port = 2465
        "#,
        )
        .unwrap();

        assert_eq!(config.account.address, "me@example.com");
        assert_eq!(config.account.password, "app-password");

        assert_eq!(config.imap.host, "imap.example.com");
        assert_eq!(config.imap.port, 1993);
        assert_eq!(config.imap.folder, "Archive");
        assert_eq!(config.imap.search, "UNSEEN FROM \"boss@example.com\"");

        assert_eq!(config.smtp.host, "smtp.example.com");
        assert_eq!(config.smtp.port, 2465);

        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert!(!config.quiet);
    }

    #[test]
    fn test_default_values() {
        let config = load(
            r#"
            [account]
            address = "me@example.com"
            password = "p"

            [imap]
            host = "imap.example.com"

            [smtp]
            host = "smtp.example.com"
        "#,
        )
        .unwrap();

        assert_eq!(config.imap.port, 993);
        assert_eq!(config.imap.folder, "INBOX");
        assert_eq!(config.imap.search, "UNSEEN");
        assert_eq!(config.smtp.port, 465);
        assert_eq!(config.timeout(), None);
        assert!(config.log_file.is_none());
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_zero_timeout_disables_timeout() {
        let config = load(
            r#"
            timeout_seconds = 0
            [account]
            address = "a"
            password = "p"
            [imap]
            host = "i"
            [smtp]
            host = "s"
        "#,
        )
        .unwrap();

        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_missing_account_is_rejected() {
        let res = load(
            r#"
            [imap]
            host = "imap.example.com"
            [smtp]
            host = "smtp.example.com"
        "#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_invalid_config_type() {
        let res = load(
            r#"
            [account]
            address = "a"
            password = "p"
            [imap]
            host = "i"
            port = "not a port"
            [smtp]
            host = "s"
        "#,
        );
        assert!(res.is_err());
    }
}
