//! Configuration module for the relay.

use std::{path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;

/// Errors raised while reading the process configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// How the SMTP session is secured.
/// `Implicit` wraps the whole connection in TLS (SMTPS, usually port 465);
/// `Opportunistic` upgrades with STARTTLS when the relay offers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    Implicit,
    Opportunistic,
}

/// TLS negotiation policy for the SMTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsPolicy {
    /// Whatever the platform TLS stack considers secure.
    #[default]
    Platform,
    /// Accept TLS 1.0 and up, for relays that never moved past it.
    Legacy,
}

impl FromStr for TlsPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "platform" | "" => Ok(TlsPolicy::Platform),
            "legacy" => Ok(TlsPolicy::Legacy),
            other => Err(other.to_string()),
        }
    }
}

/// Which transport delivers outbound mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    Smtp,
    /// Writes `.eml` files into the outbox directory. Local development only.
    File,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smtp" | "" => Ok(TransportKind::Smtp),
            "file" => Ok(TransportKind::File),
            other => Err(other.to_string()),
        }
    }
}

/// SMTP endpoint, credentials and session behaviour.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub security: SmtpSecurity,
    pub user: String,
    pub password: String,
    pub tls_policy: TlsPolicy,
    /// Share one pooled transport instead of opening a session per message.
    pub pool: bool,
    pub timeout: Option<Duration>,
}

/// Logger settings, consumed by [`crate::logger::set_logger`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub to_stdout: bool,
    pub to_file: bool,
    pub dir: String,
    pub file: String,
}

/// Struct containing all configuration options.
///
/// Built once at startup and handed to the application state; request
/// handlers never read the environment themselves.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub smtp: SmtpConfig,
    pub company_name: String,
    pub company_email: String,
    pub listen_addr: String,
    pub listen_port: u16,
    pub transport: TransportKind,
    pub outbox_dir: PathBuf,
    pub escape_html: bool,
    pub templates_dir: Option<PathBuf>,
    pub max_body_bytes: usize,
    pub log: LogConfig,
}

impl RelayConfig {
    /// # from_env()
    /// Reads the configuration from the process environment.
    ///
    /// # Environment Variables:
    /// |Variable|Description|
    /// |:------:|:---------:|
    /// |`SMTP_HOST`|SMTP relay hostname (e.g. `smtp.example.com`)|
    /// |`SMTP_PORT`|SMTP relay port (e.g. `587`)|
    /// |`SMTP_SECURE`|`true` for implicit TLS, anything else for STARTTLS|
    /// |`SMTP_USER`|SMTP username for authentication|
    /// |`SMTP_PASS`|SMTP password for authentication|
    /// |`SMTP_TLS_POLICY`|`platform` or `legacy`|
    /// |`SMTP_POOL`|Reuse pooled SMTP sessions (true/false)|
    /// |`SMTP_TIMEOUT_SECS`|SMTP timeout in seconds|
    /// |`COMPANY_EMAIL`|Sender and recipient of every relayed message (required)|
    /// |`COMPANY_NAME`|Name shown in the email header and footer|
    /// |`LISTEN_ADDR`|Address to bind to (e.g. `0.0.0.0`)|
    /// |`PORT`|Port to bind to (e.g. `5000`)|
    /// |`MAIL_TRANSPORT`|`smtp` or `file`|
    /// |`OUTBOX_DIR`|Directory to store emails when using `file` transport|
    /// |`ESCAPE_HTML`|Escape submitted values in templates (true/false)|
    /// |`TEMPLATES_DIR`|Directory with `.hbs` overrides|
    /// |`MAX_BODY_BYTES`|Largest accepted request body|
    /// |`LOG_LEVEL`|Log level (DEBUG, INFO, WARN, ERROR)|
    /// |`LOG_TO_STDOUT`|Whether to log to stdout (true/false)|
    /// |`LOG_TO_FILE`|Whether to log to file (true/false)|
    /// |`LOG_DIR`|Directory to log to|
    /// |`LOG_FILE`|File to log to (relative to `LOG_DIR`)|
    ///
    /// --------------------------------------------------------------------
    /// ## SMTP defaults:
    /// | `smtp_host`| `smtp_port`|`smtp_secure`|`tls_policy`|`pool` |
    /// |:----------:|:----------:|:-----------:|:----------:|:-----:|
    /// | `localhost`|`587` (`465` when secure)|`false`|`platform`|`false`|
    /// --------------------------------------------------------------------
    /// ## App defaults:
    /// |`listen_addr`|`listen_port`|`transport`|`outbox_dir`|`escape_html`|`max_body_bytes`|
    /// |:-----------:|:-----------:|:---------:|:----------:|:-----------:|:--------------:|
    /// |`0.0.0.0`    |`5000`       |`smtp`     |`outbox`    |`true`       |`26214400`      |
    /// --------------------------------------------------------------------
    /// ## Log defaults:
    /// |`log_file` |`log_dir` |`log_to_file`|`log_to_stdout`|`log_level`|
    /// |:---------:|:--------:|:-----------:|:-------------:|:---------:|
    /// |`relay.log`|`logs`    |`false`      |`true`         |`INFO`     |
    /// --------------------------------------------------------------------
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`RelayConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let company_email = lookup("COMPANY_EMAIL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("COMPANY_EMAIL"))?;

        let timeout = match lookup("SMTP_TIMEOUT_SECS") {
            Some(v) if !v.trim().is_empty() => {
                Some(Duration::from_secs(parse("SMTP_TIMEOUT_SECS", &v)?))
            }
            _ => None,
        };

        // Implicit TLS listens on 465, STARTTLS submission on 587.
        let secure = flag(lookup("SMTP_SECURE"), false);
        let default_port = if secure { "465" } else { "587" };

        let smtp = SmtpConfig {
            host: get("SMTP_HOST", "localhost"),
            port: match lookup("SMTP_PORT").filter(|v| !v.trim().is_empty()) {
                Some(v) => parse("SMTP_PORT", &v)?,
                None => parse("SMTP_PORT", default_port)?,
            },
            security: if secure {
                SmtpSecurity::Implicit
            } else {
                SmtpSecurity::Opportunistic
            },
            user: get("SMTP_USER", ""),
            password: get("SMTP_PASS", ""),
            tls_policy: parse("SMTP_TLS_POLICY", &get("SMTP_TLS_POLICY", "platform"))?,
            pool: flag(lookup("SMTP_POOL"), false),
            timeout,
        };

        let log = LogConfig {
            level: get("LOG_LEVEL", "INFO"),
            to_stdout: flag(lookup("LOG_TO_STDOUT"), true),
            to_file: flag(lookup("LOG_TO_FILE"), false),
            dir: get("LOG_DIR", "logs"),
            file: get("LOG_FILE", "relay.log"),
        };

        Ok(RelayConfig {
            smtp,
            company_name: get("COMPANY_NAME", ""),
            company_email,
            listen_addr: get("LISTEN_ADDR", "0.0.0.0"),
            listen_port: parse("PORT", &get("PORT", "5000"))?,
            transport: parse("MAIL_TRANSPORT", &get("MAIL_TRANSPORT", "smtp"))?,
            outbox_dir: PathBuf::from(get("OUTBOX_DIR", "outbox")),
            escape_html: flag(lookup("ESCAPE_HTML"), true),
            templates_dir: lookup("TEMPLATES_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            max_body_bytes: parse("MAX_BODY_BYTES", &get("MAX_BODY_BYTES", "26214400"))?,
            log,
        })
    }
}

/// Only the literal `true` (any case) switches a flag on; an unset variable
/// keeps `default`.
fn flag(value: Option<String>, default: bool) -> bool {
    match value {
        Some(v) => v.trim().eq_ignore_ascii_case("true"),
        None => default,
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}
