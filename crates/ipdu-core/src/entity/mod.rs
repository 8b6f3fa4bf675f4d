// ── Entity projections ──
//
// Read-only views deriving one displayed value each from the
// coordinator's latest snapshot. Nothing here caches device state:
// every accessor reads `latest()` at call time.

mod sensor;
mod switch;

use std::sync::Arc;

use crate::client::DeviceClient;
use crate::config::StalePolicy;
use crate::coordinator::PollCoordinator;
use crate::model::{DeviceInfo, StateSnapshot};

pub use sensor::{SensorKind, SensorView};
pub use switch::SwitchView;

/// Per-projection lifecycle: `NoData` until the first successful poll,
/// then `Available`, or `Stale` while the most recent attempt has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    NoData,
    Available,
    Stale,
}

/// Rendered state of a projection after applying the stale policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityState {
    On,
    Off,
    Value(f64),
    /// Snapshot exists but this reading is absent or malformed.
    Unknown,
    Unavailable,
}

/// Capability shared by every projection variant.
pub trait Projection {
    fn unique_id(&self) -> String;
    fn name(&self) -> String;
    fn icon(&self) -> Option<&'static str>;
    fn device_info(&self) -> &DeviceInfo;
    fn availability(&self) -> Availability;
    fn state(&self) -> EntityState;
}

/// What every view of one entry shares.
pub struct ViewContext<C> {
    coordinator: PollCoordinator<C>,
    entry_id: Arc<str>,
    device_info: Arc<DeviceInfo>,
    stale_policy: StalePolicy,
}

impl<C> Clone for ViewContext<C> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            entry_id: Arc::clone(&self.entry_id),
            device_info: Arc::clone(&self.device_info),
            stale_policy: self.stale_policy,
        }
    }
}

impl<C: DeviceClient> ViewContext<C> {
    pub fn new(
        coordinator: PollCoordinator<C>,
        entry_id: &str,
        device_info: DeviceInfo,
        stale_policy: StalePolicy,
    ) -> Self {
        Self {
            coordinator,
            entry_id: Arc::from(entry_id),
            device_info: Arc::new(device_info),
            stale_policy,
        }
    }

    pub fn coordinator(&self) -> &PollCoordinator<C> {
        &self.coordinator
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    pub(crate) fn snapshot(&self) -> Option<Arc<StateSnapshot>> {
        self.coordinator.latest()
    }

    pub(crate) fn availability(&self) -> Availability {
        if self.coordinator.latest().is_none() {
            Availability::NoData
        } else if self.coordinator.last_update_success() {
            Availability::Available
        } else {
            Availability::Stale
        }
    }

    /// Snapshot to render from, or `None` when the projection should
    /// show as unavailable.
    pub(crate) fn renderable(&self) -> Option<Arc<StateSnapshot>> {
        match (self.availability(), self.stale_policy) {
            (Availability::NoData, _) | (Availability::Stale, StalePolicy::Unavailable) => None,
            _ => self.snapshot(),
        }
    }
}

// ── EntityView ───────────────────────────────────────────────────

/// Every projection of one PDU entry.
pub enum EntityView<C> {
    Sensor(SensorView<C>),
    Switch(SwitchView<C>),
}

impl<C: DeviceClient> EntityView<C> {
    pub fn as_switch(&self) -> Option<&SwitchView<C>> {
        match self {
            Self::Switch(view) => Some(view),
            Self::Sensor(_) => None,
        }
    }

    pub fn as_sensor(&self) -> Option<&SensorView<C>> {
        match self {
            Self::Sensor(view) => Some(view),
            Self::Switch(_) => None,
        }
    }
}

impl<C: DeviceClient> Projection for EntityView<C> {
    fn unique_id(&self) -> String {
        match self {
            Self::Sensor(view) => view.unique_id(),
            Self::Switch(view) => view.unique_id(),
        }
    }

    fn name(&self) -> String {
        match self {
            Self::Sensor(view) => view.name(),
            Self::Switch(view) => view.name(),
        }
    }

    fn icon(&self) -> Option<&'static str> {
        match self {
            Self::Sensor(view) => view.icon(),
            Self::Switch(view) => view.icon(),
        }
    }

    fn device_info(&self) -> &DeviceInfo {
        match self {
            Self::Sensor(view) => view.device_info(),
            Self::Switch(view) => view.device_info(),
        }
    }

    fn availability(&self) -> Availability {
        match self {
            Self::Sensor(view) => view.availability(),
            Self::Switch(view) => view.availability(),
        }
    }

    fn state(&self) -> EntityState {
        match self {
            Self::Sensor(view) => view.state(),
            Self::Switch(view) => view.state(),
        }
    }
}
