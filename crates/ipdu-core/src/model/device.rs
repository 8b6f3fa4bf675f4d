// ── Device identity ──

use serde::{Deserialize, Serialize};

use crate::config::DOMAIN;

const DEFAULT_NAME: &str = "IP PDU";
const MANUFACTURER: &str = "Generic";

/// Hardware identity, fetched once at setup and never refreshed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub product_model: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default)]
    pub system_name: Option<String>,
}

/// Presentation record attached to every projection of one PDU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// `(domain, id)` where id is the MAC address, or the entry id if the
    /// device did not report one.
    pub identifier: (String, String),
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub sw_version: Option<String>,
}

impl DeviceInfo {
    pub fn from_identity(identity: &DeviceIdentity, entry_id: &str) -> Self {
        let id = non_empty(identity.mac_address.as_deref()).unwrap_or(entry_id);

        Self {
            identifier: (DOMAIN.to_owned(), id.to_owned()),
            name: non_empty(identity.system_name.as_deref())
                .unwrap_or(DEFAULT_NAME)
                .to_owned(),
            manufacturer: MANUFACTURER.to_owned(),
            model: non_empty(identity.product_model.as_deref())
                .unwrap_or(DEFAULT_NAME)
                .to_owned(),
            sw_version: identity.firmware_version.clone(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
