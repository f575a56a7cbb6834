//! Application configuration for kindle-voz.
//!
//! User config lives at `~/.config/kindle-voz/config.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VozError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config directory, relative to the user's home.
const CONFIG_DIR_NAME: &str = ".config/kindle-voz";

// ---------------------------------------------------------------------------
// Config structs (matching config.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Defaults for the `run` command.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// HTTP fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// External converter settings.
    #[serde(default)]
    pub convert: ConvertConfig,

    /// Mail relay settings.
    #[serde(default)]
    pub mail: MailConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path to the source list, one URL per line.
    #[serde(default = "default_urls")]
    pub urls: String,

    /// Book / thread title.
    #[serde(default = "default_name")]
    pub name: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            urls: default_urls(),
            name: default_name(),
        }
    }
}

fn default_urls() -> String {
    "urls.txt".into()
}
fn default_name() -> String {
    "From F17 with Love".into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// User-Agent override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_redirects: default_max_redirects(),
            user_agent: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_max_redirects() -> usize {
    5
}

/// `[convert]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Conversion executable (Calibre's `ebook-convert`).
    #[serde(default = "default_command")]
    pub command: String,

    /// Device output profile passed as `--output-profile`.
    #[serde(default = "default_output_profile")]
    pub output_profile: String,

    /// Author metadata passed as `--authors`.
    #[serde(default = "default_authors")]
    pub authors: String,

    /// Output file extension, which also selects the converter's target format.
    #[serde(default = "default_format")]
    pub format: String,

    /// Prefix of the packaged file name.
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            output_profile: default_output_profile(),
            authors: default_authors(),
            format: default_format(),
            output_prefix: default_output_prefix(),
        }
    }
}

fn default_command() -> String {
    "ebook-convert".into()
}
fn default_output_profile() -> String {
    "kindle_voyage".into()
}
fn default_authors() -> String {
    "Vozer".into()
}
fn default_format() -> String {
    "mobi".into()
}
fn default_output_prefix() -> String {
    "[voz-f17]".into()
}

/// Transport security for the SMTP relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailSecurity {
    /// Implicit TLS (port 465).
    #[default]
    Tls,
    /// Plain connection upgraded with STARTTLS (port 587).
    Starttls,
}

/// `[mail]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// SMTP relay host.
    #[serde(default)]
    pub smtp_host: String,

    /// SMTP relay port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Connection security.
    #[serde(default)]
    pub security: MailSecurity,

    /// Login name on the relay.
    #[serde(default)]
    pub username: String,

    /// Inline password. Prefer `password_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Name of the env var holding the password, used when `password` is unset.
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Sender address (must be approved on the reading device's account).
    #[serde(default)]
    pub from: String,

    /// The reading device's inbound address.
    #[serde(default)]
    pub to: String,

    /// Largest attachment the relay accepts, in megabytes.
    #[serde(default = "default_max_attachment_mb")]
    pub max_attachment_mb: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            security: MailSecurity::default(),
            username: String::new(),
            password: None,
            password_env: default_password_env(),
            from: String::new(),
            to: String::new(),
            max_attachment_mb: default_max_attachment_mb(),
        }
    }
}

fn default_smtp_port() -> u16 {
    465
}
fn default_password_env() -> String {
    "KINDLE_VOZ_SMTP_PASSWORD".into()
}
fn default_max_attachment_mb() -> u64 {
    50
}

// ---------------------------------------------------------------------------
// Resolved mail settings
// ---------------------------------------------------------------------------

/// Mail settings with every field present and the password resolved.
#[derive(Clone)]
pub struct MailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub security: MailSecurity,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
    pub max_attachment_bytes: u64,
}

impl std::fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailSettings")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("security", &self.security)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("max_attachment_bytes", &self.max_attachment_bytes)
            .finish()
    }
}

/// Check the `[mail]` section and resolve the password.
///
/// Fails with [`VozError::Config`] naming the first missing field.
pub fn validate_mail(mail: &MailConfig) -> Result<MailSettings> {
    let required = [
        ("smtp_host", &mail.smtp_host),
        ("username", &mail.username),
        ("from", &mail.from),
        ("to", &mail.to),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(VozError::config(format!(
                "mail.{field} is not set. Run `kindle-voz config init` and edit {}",
                config_file_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| CONFIG_FILE_NAME.to_string())
            )));
        }
    }

    let password = match &mail.password {
        Some(p) if !p.is_empty() => p.clone(),
        _ => match std::env::var(&mail.password_env) {
            Ok(val) if !val.is_empty() => val,
            _ => {
                return Err(VozError::config(format!(
                    "SMTP password not found. Set mail.password or the {} environment variable.",
                    mail.password_env
                )));
            }
        },
    };

    Ok(MailSettings {
        smtp_host: mail.smtp_host.trim().to_string(),
        smtp_port: mail.smtp_port,
        security: mail.security,
        username: mail.username.trim().to_string(),
        password,
        from: mail.from.trim().to_string(),
        to: mail.to.trim().to_string(),
        max_attachment_bytes: mail.max_attachment_mb.saturating_mul(1024 * 1024),
    })
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.config/kindle-voz/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| VozError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.config/kindle-voz/config.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Create the config directory if it does not exist yet.
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| VozError::io(&dir, e))?;
    Ok(dir)
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| VozError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| VozError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
///
/// An existing file holds the user's relay and recipient settings, so it is
/// only replaced when `force` is set.
pub fn init_config(force: bool) -> Result<PathBuf> {
    let dir = ensure_config_dir()?;
    let path = dir.join(CONFIG_FILE_NAME);

    if path.exists() && !force {
        return Err(VozError::config(format!(
            "{} already exists. Re-run with --force to overwrite it",
            path.display()
        )));
    }

    write_default_config(&path)?;
    tracing::info!(?path, force, "created default config file");
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| VozError::config(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| VozError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_mail() -> MailConfig {
        MailConfig {
            smtp_host: "smtp.example.com".into(),
            username: "reader".into(),
            password: Some("hunter2".into()),
            from: "reader@example.com".into(),
            to: "reader_42@kindle.com".into(),
            ..MailConfig::default()
        }
    }

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("ebook-convert"));
        assert!(toml_str.contains("KINDLE_VOZ_SMTP_PASSWORD"));
        assert!(!toml_str.contains("password = "));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.urls, "urls.txt");
        assert_eq!(parsed.defaults.name, "From F17 with Love");
        assert_eq!(parsed.convert.output_profile, "kindle_voyage");
        assert_eq!(parsed.convert.authors, "Vozer");
        assert_eq!(parsed.mail.smtp_port, 465);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[mail]
smtp_host = "smtp.gmail.com"
smtp_port = 587
security = "starttls"
to = "someone@kindle.com"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.mail.security, MailSecurity::Starttls);
        assert_eq!(config.mail.smtp_port, 587);
        assert_eq!(config.mail.max_attachment_mb, 50);
        assert_eq!(config.convert.format, "mobi");
        assert_eq!(config.fetch.timeout_secs, 30);
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[defaults]\nname = \"Thread 42\"\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.defaults.name, "Thread 42");
        assert_eq!(config.defaults.urls, "urls.txt");
    }

    #[test]
    fn load_config_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[mail\nsmtp_host = ").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, VozError::Config { .. }));
    }

    #[test]
    fn written_default_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        write_default_config(&path).unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.convert.command, "ebook-convert");
    }

    #[test]
    fn init_config_keeps_existing_file_unless_forced() {
        let home = tempfile::tempdir().unwrap();
        // Only this test changes HOME.
        unsafe { std::env::set_var("HOME", home.path()) };

        let path = init_config(false).unwrap();
        assert!(path.starts_with(home.path()));

        std::fs::write(
            &path,
            "[mail]\nsmtp_host = \"smtp.gmail.com\"\npassword = \"s3cret\"\n",
        )
        .unwrap();

        let err = init_config(false).unwrap_err();
        assert!(matches!(err, VozError::Config { .. }));
        assert!(err.to_string().contains("--force"));
        let kept = load_config_from(&path).unwrap();
        assert_eq!(kept.mail.smtp_host, "smtp.gmail.com");
        assert_eq!(kept.mail.password.as_deref(), Some("s3cret"));

        init_config(true).unwrap();
        let reset = load_config_from(&path).unwrap();
        assert!(reset.mail.smtp_host.is_empty());
        assert!(reset.mail.password.is_none());
    }

    #[test]
    fn mail_validation_accepts_inline_password() {
        let settings = validate_mail(&complete_mail()).unwrap();
        assert_eq!(settings.password, "hunter2");
        assert_eq!(settings.max_attachment_bytes, 50 * 1024 * 1024);
        assert!(!format!("{settings:?}").contains("hunter2"));
    }

    #[test]
    fn mail_validation_reports_missing_field() {
        let mut mail = complete_mail();
        mail.to = "  ".into();
        let err = validate_mail(&mail).unwrap_err();
        assert!(err.to_string().contains("mail.to"));
    }

    #[test]
    fn mail_validation_requires_password_env() {
        let mut mail = complete_mail();
        mail.password = None;
        // Unique env var name to avoid interfering with other tests
        mail.password_env = "KV_TEST_NONEXISTENT_PASSWORD_98765".into();
        let err = validate_mail(&mail).unwrap_err();
        assert!(err.to_string().contains("KV_TEST_NONEXISTENT_PASSWORD_98765"));
    }
}
