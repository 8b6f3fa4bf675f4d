// ── Poll snapshot ──
//
// One complete, immutable poll result. The coordinator replaces it
// wholesale; nothing mutates a published snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::client::{OutletConfigMap, RawStatus};
use crate::config::OUTLET_COUNT;
use crate::error::PduError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    outlet_states: Vec<bool>,
    outlet_config: OutletConfigMap,
    temperature_celsius: Option<f64>,
    humidity_percent: Option<f64>,
    current_amperes: Option<f64>,
    fetched_at: DateTime<Utc>,
    sequence: u64,
}

impl StateSnapshot {
    /// Build a snapshot from raw device data.
    ///
    /// Readings that are present but not numeric are logged and stored
    /// as unknown; they never fail the snapshot.
    pub fn from_raw(
        status: RawStatus,
        outlet_config: OutletConfigMap,
        fetched_at: DateTime<Utc>,
        sequence: u64,
    ) -> Self {
        let outlet_states = status
            .outlet_states
            .iter()
            .take(OUTLET_COUNT)
            .map(|s| s.trim().eq_ignore_ascii_case("on"))
            .collect();

        Self {
            outlet_states,
            outlet_config,
            temperature_celsius: reading("temperature", status.temperature_celsius.as_ref()),
            humidity_percent: reading("humidity", status.humidity_percent.as_ref()),
            current_amperes: reading("current", status.current_amperes.as_ref()),
            fetched_at,
            sequence,
        }
    }

    /// Relay state of `outlet`, or `None` if the device did not report it.
    pub fn outlet_state(&self, outlet: usize) -> Option<bool> {
        self.outlet_states.get(outlet).copied()
    }

    pub fn outlet_states(&self) -> &[bool] {
        &self.outlet_states
    }

    /// Configured outlet name, if set and non-empty.
    pub fn outlet_name(&self, outlet: usize) -> Option<&str> {
        self.outlet_config
            .get(&outlet)
            .map(|c| c.name.as_str())
            .filter(|name| !name.is_empty())
    }

    pub fn temperature_celsius(&self) -> Option<f64> {
        self.temperature_celsius
    }

    pub fn humidity_percent(&self) -> Option<f64> {
        self.humidity_percent
    }

    pub fn current_amperes(&self) -> Option<f64> {
        self.current_amperes
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// 1-based count of successful polls on the owning coordinator.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

fn reading(field: &'static str, value: Option<&serde_json::Value>) -> Option<f64> {
    match parse_reading(field, value) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "treating reading as unknown");
            None
        }
    }
}

/// `Ok(None)` for an absent reading, `Err` for one that is present but
/// not a finite number.
pub(crate) fn parse_reading(
    field: &'static str,
    value: Option<&serde_json::Value>,
) -> Result<Option<f64>, PduError> {
    let parsed = match value {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match parsed.filter(|v| v.is_finite()) {
        Some(v) => Ok(Some(v)),
        None => Err(PduError::MalformedData {
            field,
            value: value.map(ToString::to_string).unwrap_or_default(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::client::OutletConfig;

    fn status(readings: serde_json::Value) -> RawStatus {
        serde_json::from_value(readings).unwrap()
    }

    #[test]
    fn outlet_states_parse_on_off() {
        let snap = StateSnapshot::from_raw(
            status(json!({ "outlet_states": ["on", "off", " ON ", "unknown"] })),
            OutletConfigMap::new(),
            Utc::now(),
            1,
        );

        assert_eq!(snap.outlet_states(), &[true, false, true, false]);
        assert_eq!(snap.outlet_state(2), Some(true));
        assert_eq!(snap.outlet_state(4), None);
    }

    #[test]
    fn extra_outlets_are_dropped() {
        let states: Vec<&str> = vec!["on"; 10];
        let snap = StateSnapshot::from_raw(
            status(json!({ "outlet_states": states })),
            OutletConfigMap::new(),
            Utc::now(),
            1,
        );

        assert_eq!(snap.outlet_states().len(), OUTLET_COUNT);
    }

    #[test]
    fn readings_accept_numbers_and_numeric_strings() {
        let snap = StateSnapshot::from_raw(
            status(json!({
                "degree_celcius": "23.5",
                "humidity_percent": 40,
                "current_amperes": " 1.25 "
            })),
            OutletConfigMap::new(),
            Utc::now(),
            1,
        );

        assert_eq!(snap.temperature_celsius(), Some(23.5));
        assert_eq!(snap.humidity_percent(), Some(40.0));
        assert_eq!(snap.current_amperes(), Some(1.25));
    }

    #[test]
    fn malformed_readings_become_unknown_individually() {
        let snap = StateSnapshot::from_raw(
            status(json!({
                "degree_celcius": "--",
                "humidity_percent": { "nested": true },
                "current_amperes": 0.4
            })),
            OutletConfigMap::new(),
            Utc::now(),
            1,
        );

        assert_eq!(snap.temperature_celsius(), None);
        assert_eq!(snap.humidity_percent(), None);
        assert_eq!(snap.current_amperes(), Some(0.4));
    }

    #[test]
    fn parse_reading_reports_malformed_field() {
        let value = json!("NaN");
        let err = parse_reading("current", Some(&value)).unwrap_err();
        assert!(matches!(err, PduError::MalformedData { field: "current", .. }));
        assert_eq!(parse_reading("current", None).unwrap(), None);
        assert_eq!(parse_reading("current", Some(&json!(null))).unwrap(), None);
    }

    #[test]
    fn outlet_name_ignores_only_empty_entries() {
        let mut config = OutletConfigMap::new();
        config.insert(3, OutletConfig { name: "Router".into() });
        config.insert(4, OutletConfig { name: "   ".into() });
        config.insert(5, OutletConfig { name: String::new() });
        let snap = StateSnapshot::from_raw(RawStatus::default(), config, Utc::now(), 1);

        assert_eq!(snap.outlet_name(3), Some("Router"));
        assert_eq!(snap.outlet_name(4), Some("   "));
        assert_eq!(snap.outlet_name(5), None);
        assert_eq!(snap.outlet_name(6), None);
    }
}
