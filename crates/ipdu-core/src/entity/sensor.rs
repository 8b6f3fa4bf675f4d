// ── Sensor projections ──

use strum::{Display, EnumIter};

use super::{Availability, EntityState, Projection, ViewContext};
use crate::client::DeviceClient;
use crate::config::LineVoltage;
use crate::model::{DeviceInfo, StateSnapshot};

/// The four environmental readings a PDU exposes.
///
/// `Display` yields the key used as the unique id suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum SensorKind {
    Temperature,
    Humidity,
    Current,
    /// Derived: current times the configured line voltage.
    Power,
}

impl SensorKind {
    /// Every reading is an instantaneous measurement.
    pub const STATE_CLASS: &'static str = "measurement";

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Temperature => "PDU Temperature",
            Self::Humidity => "PDU Humidity",
            Self::Current => "PDU Current",
            Self::Power => "PDU Power",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Humidity => "%",
            Self::Current => "A",
            Self::Power => "W",
        }
    }

    pub fn device_class(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Current => "current",
            Self::Power => "power",
        }
    }

    pub fn icon(self) -> Option<&'static str> {
        match self {
            Self::Power => Some("mdi:flash"),
            _ => None,
        }
    }
}

pub struct SensorView<C> {
    kind: SensorKind,
    voltage: LineVoltage,
    ctx: ViewContext<C>,
}

impl<C> Clone for SensorView<C> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            voltage: self.voltage,
            ctx: self.ctx.clone(),
        }
    }
}

impl<C: DeviceClient> SensorView<C> {
    pub fn new(kind: SensorKind, voltage: LineVoltage, ctx: ViewContext<C>) -> Self {
        Self { kind, voltage, ctx }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// Current reading from the latest snapshot; `None` when there is no
    /// snapshot yet or the device did not report a usable value.
    pub fn value(&self) -> Option<f64> {
        self.ctx.snapshot().and_then(|snap| self.read(&snap))
    }

    fn read(&self, snap: &StateSnapshot) -> Option<f64> {
        match self.kind {
            SensorKind::Temperature => snap.temperature_celsius(),
            SensorKind::Humidity => snap.humidity_percent(),
            SensorKind::Current => snap.current_amperes(),
            SensorKind::Power => snap
                .current_amperes()
                .map(|amps| self.voltage.power_watts(amps)),
        }
    }
}

impl<C: DeviceClient> Projection for SensorView<C> {
    fn unique_id(&self) -> String {
        format!("{}_{}", self.ctx.entry_id(), self.kind)
    }

    fn name(&self) -> String {
        self.kind.display_name().to_owned()
    }

    fn icon(&self) -> Option<&'static str> {
        self.kind.icon()
    }

    fn device_info(&self) -> &DeviceInfo {
        self.ctx.device_info()
    }

    fn availability(&self) -> Availability {
        self.ctx.availability()
    }

    fn state(&self) -> EntityState {
        match self.ctx.renderable() {
            None => EntityState::Unavailable,
            Some(snap) => self
                .read(&snap)
                .map_or(EntityState::Unknown, EntityState::Value),
        }
    }
}
