use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), worker_threads: None }
    }
}

/// Outbound-mail identity handed to the SMTP transport.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
    #[serde(default = "default_sender_email")]
    pub sender_email: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            sender_name: default_sender_name(),
            sender_email: default_sender_email(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Overrides the executable's directory as anchor for relative paths.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { root: None, images_dir: default_images_dir() }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3000 }
fn default_smtp_host() -> String { "localhost".to_string() }
fn default_smtp_port() -> u16 { 25 }
fn default_sender_name() -> String { "Mailroom".to_string() }
fn default_sender_email() -> String { "noreply@localhost".to_string() }
fn default_images_dir() -> PathBuf { PathBuf::from("images") }

pub fn config_path() -> PathBuf {
    std::env::var("CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"))
}

pub fn load_from_file(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    parse(&content).with_context(|| format!("cannot parse {}", path.display()))
}

pub fn parse(content: &str) -> Result<AppConfig> {
    Ok(toml::from_str(content)?)
}

/// Like [`load_from_file`], but a missing file yields the defaults.
pub fn load_or_default(path: &Path) -> Result<AppConfig> {
    match std::fs::metadata(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(AppConfig::default()),
        _ => load_from_file(path),
    }
}

impl AppConfig {
    /// File (or defaults), then process environment, then validation.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_or_default(&config_path())?;
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Apply `PORT`, `HOST`, `SMTP_*`, `MAIL_FROM_*`, `APP_ROOT`, `IMAGES_DIR`
    /// and `TOKIO_WORKER_THREADS` as returned by `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("PORT") {
            self.server.port = parse_number("PORT", &v)?;
        }
        if let Some(v) = var("HOST") {
            self.server.host = v;
        }
        if let Some(v) = var("TOKIO_WORKER_THREADS") {
            self.server.worker_threads = Some(parse_number("TOKIO_WORKER_THREADS", &v)?);
        }
        if let Some(v) = var("SMTP_HOST") {
            self.mail.smtp_host = v;
        }
        if let Some(v) = var("SMTP_PORT") {
            self.mail.smtp_port = parse_number("SMTP_PORT", &v)?;
        }
        if let Some(v) = var("MAIL_FROM_NAME") {
            self.mail.sender_name = v;
        }
        if let Some(v) = var("MAIL_FROM_ADDRESS") {
            self.mail.sender_email = v;
        }
        if let Some(v) = var("APP_ROOT") {
            self.storage.root = Some(PathBuf::from(v));
        }
        if let Some(v) = var("IMAGES_DIR") {
            self.storage.images_dir = PathBuf::from(v);
        }
        Ok(())
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.mail.normalize()?;
        self.storage.validate()?;
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| anyhow!("{key} must be a number, got {value:?}"))
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = default_host();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        if self.worker_threads == Some(0) {
            return Err(anyhow!("server.worker_threads must be >= 1"));
        }
        Ok(())
    }
}

impl MailConfig {
    fn normalize(&mut self) -> Result<()> {
        self.smtp_host = self.smtp_host.trim().to_string();
        self.sender_email = self.sender_email.trim().to_string();
        if self.smtp_host.is_empty() {
            return Err(anyhow!("mail.smtp_host is empty"));
        }
        if self.smtp_port == 0 {
            return Err(anyhow!("mail.smtp_port must be in 1..=65535"));
        }
        if self.sender_email.is_empty() {
            return Err(anyhow!("mail.sender_email is empty"));
        }
        Ok(())
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        if self.images_dir.as_os_str().is_empty() {
            return Err(anyhow!("storage.images_dir is empty"));
        }
        Ok(())
    }
}
