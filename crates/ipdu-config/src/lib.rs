//! Configuration for IP PDU entries.
//!
//! TOML profiles, `IPDU_` environment overrides, password resolution
//! (env + keyring + plaintext), and translation to `ipdu_core::PduConfig`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use ipdu_core::config::{DEFAULT_PASSWORD, DEFAULT_USERNAME, SCAN_INTERVAL};
use ipdu_core::{LineVoltage, PduConfig, StalePolicy};

const KEYRING_SERVICE: &str = "ipdu";
const PASSWORD_ENV: &str = "IPDU_PASSWORD";
const USERNAME_ENV: &str = "IPDU_USERNAME";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}'")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// One profile per PDU.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    pub fn profile<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|profile| (name, profile))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }

    /// Resolve a profile straight into a validated `PduConfig`.
    pub fn pdu_config(&self, name: Option<&str>) -> Result<PduConfig, ConfigError> {
        let (name, profile) = self.profile(name)?;
        profile_to_pdu_config(profile, name, &self.defaults)
    }
}

/// Values applied to every profile that does not set its own.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default)]
    pub voltage: VoltageKey,

    #[serde(default)]
    pub stale_policy: StalePolicy,
}

/// A named PDU profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Host name or IP address of the PDU.
    pub host: String,

    /// Stable entry id; defaults to the profile name.
    pub entry_id: Option<String>,

    pub username: Option<String>,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Line voltage, as a number (`230`) or key (`"230"`).
    pub voltage: Option<VoltageKey>,

    pub stale_policy: Option<StalePolicy>,
}

/// Voltage as written in TOML or the environment: `230` or `"230"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum VoltageKey {
    Volts(u16),
    Key(String),
}

impl Default for VoltageKey {
    fn default() -> Self {
        Self::Volts(LineVoltage::default().volts())
    }
}

impl From<LineVoltage> for VoltageKey {
    fn from(voltage: LineVoltage) -> Self {
        Self::Volts(voltage.volts())
    }
}

impl VoltageKey {
    /// Strict lookup: anything but a supported voltage is an error.
    pub fn resolve(&self) -> Result<LineVoltage, ConfigError> {
        match self {
            Self::Volts(volts) => {
                LineVoltage::try_from(*volts).map_err(|v| invalid_voltage(&v.to_string()))
            }
            Self::Key(key) => key.trim().parse().map_err(|_| invalid_voltage(key)),
        }
    }

    /// Lenient lookup for entries saved earlier: unknown values become 230 V.
    pub fn resolve_or_default(&self) -> LineVoltage {
        match self {
            Self::Volts(volts) => LineVoltage::try_from(*volts).unwrap_or_default(),
            Self::Key(key) => LineVoltage::from_key_or_default(key),
        }
    }
}

fn invalid_voltage(value: &str) -> ConfigError {
    ConfigError::Validation {
        field: "voltage".into(),
        reason: format!(
            "expected one of {}, got '{value}'",
            LineVoltage::keys().join(", ")
        ),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "ipdu", "ipdu").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ipdu");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing file is fine) merged with `IPDU_` variables.
///
/// Nested keys use a double underscore:
/// `IPDU_PROFILES__RACK__HOST=10.0.0.5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("IPDU_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Username from the profile, then `IPDU_USERNAME`, then `admin`.
pub fn resolve_username(profile: &Profile) -> String {
    profile
        .username
        .clone()
        .or_else(|| std::env::var(USERNAME_ENV).ok())
        .unwrap_or_else(|| DEFAULT_USERNAME.into())
}

/// Password from env, keyring, plaintext, then the factory default.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> SecretString {
    // 1. Env var: the profile's own, else IPDU_PASSWORD
    let env_name = profile.password_env.as_deref().unwrap_or(PASSWORD_ENV);
    if let Ok(pw) = std::env::var(env_name) {
        return SecretString::from(pw);
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password")) {
        if let Ok(pw) = entry.get_password() {
            return SecretString::from(pw);
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return SecretString::from(pw.clone());
    }

    debug!(profile = profile_name, "no password configured, using factory default");
    SecretString::from(DEFAULT_PASSWORD.to_owned())
}

// ── Translation ─────────────────────────────────────────────────────

/// Validate a profile and build the `PduConfig` for it.
///
/// Rejects an empty host and any voltage outside the supported set.
/// The poll interval is always the fixed 30 s.
pub fn profile_to_pdu_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<PduConfig, ConfigError> {
    let host = profile.host.trim();
    if host.is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: format!("profile '{profile_name}' has no host"),
        });
    }

    let voltage = profile
        .voltage
        .as_ref()
        .unwrap_or(&defaults.voltage)
        .resolve()?;

    Ok(PduConfig {
        entry_id: profile
            .entry_id
            .clone()
            .unwrap_or_else(|| profile_name.to_owned()),
        host: host.to_owned(),
        username: resolve_username(profile),
        password: resolve_password(profile, profile_name),
        voltage,
        poll_interval: SCAN_INTERVAL,
        stale_policy: profile.stale_policy.unwrap_or(defaults.stale_policy),
    })
}
