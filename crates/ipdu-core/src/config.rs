// ── Runtime PDU configuration ──
//
// These types describe *which* PDU to poll and how to present it.
// They carry credential data but never touch disk; `ipdu-config`
// builds a `PduConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Integration domain, used as the namespace of device identifiers.
pub const DOMAIN: &str = "intellinet_pdu";

pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "admin";

/// Fixed polling interval. Not user-configurable.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(30);

/// Number of switchable outlets on the PDU.
pub const OUTLET_COUNT: usize = 8;

// ── LineVoltage ──────────────────────────────────────────────────

/// Nominal mains voltage used to derive power from measured current.
///
/// The PDU does not report its line voltage, so the user picks one of
/// these at setup time. Keys are the decimal volt strings (`"230"`).
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum LineVoltage {
    /// Japan (some regions).
    #[strum(serialize = "100")]
    #[serde(rename = "100")]
    V100,
    /// Japan (some regions), Taiwan.
    #[strum(serialize = "110")]
    #[serde(rename = "110")]
    V110,
    /// USA, Canada, Mexico.
    #[strum(serialize = "120")]
    #[serde(rename = "120")]
    V120,
    /// Parts of Europe and Asia.
    #[strum(serialize = "220")]
    #[serde(rename = "220")]
    V220,
    /// Europe, Australia, most of Asia, Africa, South America.
    #[default]
    #[strum(serialize = "230")]
    #[serde(rename = "230")]
    V230,
    /// UK, Australia.
    #[strum(serialize = "240")]
    #[serde(rename = "240")]
    V240,
}

impl LineVoltage {
    pub fn volts(self) -> u16 {
        match self {
            Self::V100 => 100,
            Self::V110 => 110,
            Self::V120 => 120,
            Self::V220 => 220,
            Self::V230 => 230,
            Self::V240 => 240,
        }
    }

    /// Resolve a stored voltage key, falling back to 230 V for anything
    /// unrecognised. Entries saved by older setups may carry stale keys.
    pub fn from_key_or_default(key: &str) -> Self {
        key.trim().parse().unwrap_or_default()
    }

    /// All accepted keys, in declaration order.
    pub fn keys() -> Vec<String> {
        Self::iter().map(|v| v.to_string()).collect()
    }

    /// Watts for the given current, rounded to one decimal place with
    /// ties going to the even digit.
    pub fn power_watts(self, current_amperes: f64) -> f64 {
        (current_amperes * f64::from(self.volts()) * 10.0).round_ties_even() / 10.0
    }
}

impl TryFrom<u16> for LineVoltage {
    type Error = u16;

    fn try_from(volts: u16) -> Result<Self, Self::Error> {
        Self::iter().find(|v| v.volts() == volts).ok_or(volts)
    }
}

// ── StalePolicy ──────────────────────────────────────────────────

/// What projections report while the most recent poll has failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// Keep serving the last good values, flagged as stale.
    #[default]
    KeepLastGood,
    /// Report no value until a poll succeeds again.
    Unavailable,
}

// ── PduConfig ────────────────────────────────────────────────────

/// Configuration for one PDU entry. Immutable once setup has run.
#[derive(Debug, Clone)]
pub struct PduConfig {
    /// Stable identifier of this entry; prefixes every entity unique id.
    pub entry_id: String,
    /// Host name or IP address of the PDU web interface.
    pub host: String,
    pub username: String,
    pub password: SecretString,
    pub voltage: LineVoltage,
    /// Delay between the end of one scheduled poll and the start of the next.
    pub poll_interval: Duration,
    pub stale_policy: StalePolicy,
}

impl PduConfig {
    /// Defaults for everything but the host: `admin`/`admin`, 230 V,
    /// 30 s polling, and a freshly generated entry id.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            host: host.into(),
            username: DEFAULT_USERNAME.into(),
            password: SecretString::from(DEFAULT_PASSWORD.to_string()),
            voltage: LineVoltage::default(),
            poll_interval: SCAN_INTERVAL,
            stale_policy: StalePolicy::default(),
        }
    }

    /// Title shown for a configured entry.
    pub fn title(&self) -> String {
        entry_title(&self.host)
    }
}

pub(crate) fn entry_title(host: &str) -> String {
    format!("IP PDU ({host})")
}
