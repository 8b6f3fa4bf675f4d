// ── Device client seam ──
//
// The PDU's own protocol lives outside this crate. Anything that can
// read status/config and switch outlets implements `DeviceClient`;
// the coordinator and switch projections are generic over it.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::OUTLET_COUNT;
use crate::model::DeviceIdentity;

/// Failure reported by a device client.
///
/// Clients are expected to enforce their own request timeout and
/// report it as [`ClientError::Timeout`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("PDU unreachable: {0}")]
    Unreachable(String),

    #[error("Credentials rejected by PDU")]
    Unauthorized,

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected response: {0}")]
    Protocol(String),
}

/// Status page contents as the device reports them.
///
/// Readings stay loosely typed: the device may send numbers, numeric
/// strings, or placeholders such as `"--"`. Parsing happens when the
/// snapshot is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStatus {
    /// Relay state per outlet, `"on"` / `"off"`.
    #[serde(default)]
    pub outlet_states: Vec<String>,
    #[serde(default, alias = "degree_celcius")]
    pub temperature_celsius: Option<serde_json::Value>,
    #[serde(default)]
    pub humidity_percent: Option<serde_json::Value>,
    #[serde(default)]
    pub current_amperes: Option<serde_json::Value>,
}

/// Per-outlet configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutletConfig {
    #[serde(default)]
    pub name: String,
}

pub type OutletConfigMap = BTreeMap<usize, OutletConfig>;

/// Parse the device's `{"outlet0": {"name": ..}, ...}` layout.
///
/// Keys that are not `outlet<N>` with `N < 8`, and entries that do not
/// deserialize, are skipped.
pub fn parse_outlet_config(value: &serde_json::Value) -> OutletConfigMap {
    let Some(object) = value.as_object() else {
        return OutletConfigMap::new();
    };

    object
        .iter()
        .filter_map(|(key, entry)| {
            let index = key.strip_prefix("outlet")?.parse::<usize>().ok()?;
            if index >= OUTLET_COUNT {
                return None;
            }
            match OutletConfig::deserialize(entry) {
                Ok(config) => Some((index, config)),
                Err(e) => {
                    debug!(key = %key, error = %e, "skipping unreadable outlet config");
                    None
                }
            }
        })
        .collect()
}

/// Contract the coordinator consumes. One instance talks to one PDU.
pub trait DeviceClient: Send + Sync + 'static {
    /// Read outlet relay states and sensor readings.
    fn fetch_status(&self) -> impl Future<Output = Result<RawStatus, ClientError>> + Send;

    /// Read outlet names.
    fn fetch_outlet_config(
        &self,
    ) -> impl Future<Output = Result<OutletConfigMap, ClientError>> + Send;

    /// Read MAC, model, firmware, and system name. Called once at setup.
    fn fetch_identity(&self) -> impl Future<Output = Result<DeviceIdentity, ClientError>> + Send;

    /// Switch the given outlets on (`enabled = true`) or off.
    fn set_outlets_enabled(
        &self,
        outlets: &BTreeSet<usize>,
        enabled: bool,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn raw_status_accepts_device_field_names() {
        let status: RawStatus = serde_json::from_value(json!({
            "outlet_states": ["on", "off"],
            "degree_celcius": "24.5",
            "humidity_percent": 41,
            "current_amperes": null
        }))
        .unwrap();

        assert_eq!(status.outlet_states, vec!["on", "off"]);
        assert_eq!(status.temperature_celsius, Some(json!("24.5")));
        assert_eq!(status.humidity_percent, Some(json!(41)));
        assert_eq!(status.current_amperes, None);
    }

    #[test]
    fn outlet_config_layout_is_parsed() {
        let parsed = parse_outlet_config(&json!({
            "outlet0": { "name": "NAS" },
            "outlet3": { "name": "Router" },
            "outlet7": {},
            "outlet8": { "name": "out of range" },
            "outletX": { "name": "junk" },
            "system": { "name": "ignored" },
            "outlet5": "not an object"
        }));

        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[&0].name, "NAS");
        assert_eq!(parsed[&3].name, "Router");
        assert_eq!(parsed[&7].name, "");
    }

    #[test]
    fn non_object_outlet_config_is_empty() {
        assert!(parse_outlet_config(&json!([1, 2, 3])).is_empty());
    }
}
