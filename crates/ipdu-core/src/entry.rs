// ── PDU entry lifecycle ──
//
// One configured PDU: validation before it is saved, setup that wires
// the coordinator and its projections, and unload.

use std::sync::Arc;

use strum::IntoEnumIterator;
use tracing::{debug, info};

use crate::client::DeviceClient;
use crate::config::{OUTLET_COUNT, PduConfig, entry_title};
use crate::coordinator::PollCoordinator;
use crate::entity::{EntityView, SensorKind, SensorView, SwitchView, ViewContext};
use crate::error::PduError;
use crate::model::{DeviceIdentity, DeviceInfo};

/// Check that a PDU answers before its entry is created.
///
/// Reads the status page once. Returns the title for the new entry.
pub async fn validate_connection<C: DeviceClient>(
    host: &str,
    client: &C,
) -> Result<String, PduError> {
    debug!(host, "validating PDU connection");
    client
        .fetch_status()
        .await
        .map_err(|e| cannot_connect(host, Arc::new(e.into())))?;
    Ok(entry_title(host))
}

fn cannot_connect(host: &str, source: Arc<PduError>) -> PduError {
    PduError::CannotConnect {
        host: host.to_owned(),
        source,
    }
}

/// A set-up PDU: its coordinator plus every projection built on it.
pub struct PduEntry<C> {
    config: PduConfig,
    identity: DeviceIdentity,
    coordinator: PollCoordinator<C>,
    sensors: Vec<SensorView<C>>,
    switches: Vec<SwitchView<C>>,
}

impl<C: DeviceClient> PduEntry<C> {
    /// Read the device identity, run the first poll, start scheduled
    /// polling, and build four sensor and eight switch projections.
    ///
    /// Any device failure here is fatal to the entry and reported as
    /// [`PduError::CannotConnect`]; nothing keeps running on failure.
    pub async fn setup(config: PduConfig, client: Arc<C>) -> Result<Self, PduError> {
        let host = config.host.clone();

        let identity = client
            .fetch_identity()
            .await
            .map_err(|e| cannot_connect(&host, Arc::new(e.into())))?;
        debug!(host = %host, mac = ?identity.mac_address, "fetched PDU identity");

        let coordinator = PollCoordinator::new(client, config.poll_interval);

        if let Err(e) = coordinator.refresh(false).await {
            coordinator.shutdown().await;
            return Err(cannot_connect(&host, e.shared_cause()));
        }
        coordinator.start();

        let device_info = DeviceInfo::from_identity(&identity, &config.entry_id);
        let ctx = ViewContext::new(
            coordinator.clone(),
            &config.entry_id,
            device_info,
            config.stale_policy,
        );

        let sensors = SensorKind::iter()
            .map(|kind| SensorView::new(kind, config.voltage, ctx.clone()))
            .collect();
        let switches = (0..OUTLET_COUNT)
            .map(|outlet| SwitchView::new(outlet, ctx.clone()))
            .collect();

        info!(
            host = %host,
            entry_id = %config.entry_id,
            voltage = %config.voltage,
            "PDU entry set up"
        );

        Ok(Self {
            config,
            identity,
            coordinator,
            sensors,
            switches,
        })
    }

    pub fn config(&self) -> &PduConfig {
        &self.config
    }

    pub fn title(&self) -> String {
        self.config.title()
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn coordinator(&self) -> &PollCoordinator<C> {
        &self.coordinator
    }

    pub fn sensors(&self) -> &[SensorView<C>] {
        &self.sensors
    }

    pub fn switches(&self) -> &[SwitchView<C>] {
        &self.switches
    }

    pub fn switch(&self, outlet: usize) -> Option<&SwitchView<C>> {
        self.switches.get(outlet)
    }

    pub fn sensor(&self, kind: SensorKind) -> Option<&SensorView<C>> {
        self.sensors.iter().find(|s| s.kind() == kind)
    }

    /// Every projection, switches first.
    pub fn entities(&self) -> Vec<EntityView<C>> {
        self.switches
            .iter()
            .cloned()
            .map(EntityView::Switch)
            .chain(self.sensors.iter().cloned().map(EntityView::Sensor))
            .collect()
    }

    /// Stop polling. Projections keep serving the last snapshot.
    pub async fn unload(&self) {
        self.coordinator.shutdown().await;
        info!(host = %self.config.host, "PDU entry unloaded");
    }
}
