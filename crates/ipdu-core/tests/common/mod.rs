#![allow(clippy::unwrap_used, dead_code)]
// Scripted in-memory PDU shared by the integration tests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use ipdu_core::client::parse_outlet_config;
use ipdu_core::{ClientError, DeviceClient, DeviceIdentity, OutletConfigMap, PduConfig, RawStatus};

/// One device call, in the order the mock received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Status,
    OutletConfig,
    Identity,
    Set(BTreeSet<usize>, bool),
}

pub struct MockPdu {
    status: Mutex<RawStatus>,
    outlets: Mutex<OutletConfigMap>,
    calls: Mutex<Vec<Call>>,
    delay: Mutex<Option<Duration>>,
    fail_status: AtomicBool,
    fail_commands: AtomicBool,
    fail_identity: AtomicBool,
}

impl MockPdu {
    /// Outlets 0 and 2 on, the rest off; 24.5 °C, 40 %, 2.0 A.
    pub fn new() -> Arc<Self> {
        let status = RawStatus {
            outlet_states: ["on", "off", "on", "off", "off", "off", "off", "off"]
                .map(String::from)
                .to_vec(),
            temperature_celsius: Some(json!("24.5")),
            humidity_percent: Some(json!(40)),
            current_amperes: Some(json!(2.0)),
        };
        let outlets = parse_outlet_config(&json!({
            "outlet0": { "name": "NAS" },
            "outlet3": { "name": "Router" },
        }));

        Arc::new(Self {
            status: Mutex::new(status),
            outlets: Mutex::new(outlets),
            calls: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
            fail_status: AtomicBool::new(false),
            fail_commands: AtomicBool::new(false),
            fail_identity: AtomicBool::new(false),
        })
    }

    /// Make every device call take `delay` (virtual time under `start_paused`).
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_status(&self, fail: bool) {
        self.fail_status.store(fail, Ordering::SeqCst);
    }

    pub fn fail_commands(&self, fail: bool) {
        self.fail_commands.store(fail, Ordering::SeqCst);
    }

    pub fn fail_identity(&self, fail: bool) {
        self.fail_identity.store(fail, Ordering::SeqCst);
    }

    pub fn update_status(&self, f: impl FnOnce(&mut RawStatus)) {
        f(&mut self.status.lock().unwrap());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn status_fetches(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Status).count()
    }

    async fn enter(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl DeviceClient for MockPdu {
    async fn fetch_status(&self) -> Result<RawStatus, ClientError> {
        self.enter(Call::Status).await;
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(ClientError::Timeout);
        }
        Ok(self.status.lock().unwrap().clone())
    }

    async fn fetch_outlet_config(&self) -> Result<OutletConfigMap, ClientError> {
        self.enter(Call::OutletConfig).await;
        Ok(self.outlets.lock().unwrap().clone())
    }

    async fn fetch_identity(&self) -> Result<DeviceIdentity, ClientError> {
        self.enter(Call::Identity).await;
        if self.fail_identity.load(Ordering::SeqCst) {
            return Err(ClientError::Unreachable("connection refused".into()));
        }
        Ok(DeviceIdentity {
            mac_address: Some("00:1a:2b:3c:4d:5e".into()),
            product_model: Some("163682".into()),
            firmware_version: Some("1.0.4".into()),
            system_name: Some("Rack PDU".into()),
        })
    }

    async fn set_outlets_enabled(
        &self,
        outlets: &BTreeSet<usize>,
        enabled: bool,
    ) -> Result<(), ClientError> {
        self.enter(Call::Set(outlets.clone(), enabled)).await;
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(ClientError::Protocol("HTTP 500".into()));
        }
        let state = if enabled { "on" } else { "off" };
        let mut status = self.status.lock().unwrap();
        for &outlet in outlets {
            if let Some(slot) = status.outlet_states.get_mut(outlet) {
                *slot = state.to_owned();
            }
        }
        Ok(())
    }
}

pub fn test_config() -> PduConfig {
    let mut config = PduConfig::new("10.0.0.5");
    config.entry_id = "entry-1".into();
    config
}
