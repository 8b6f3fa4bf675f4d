//! Polling synchronizer and entity projections for Intellinet IP PDUs.
//!
//! This crate keeps a local, periodically refreshed view of one PDU's
//! outlet relays and environmental sensors, and derives per-entity values
//! from it:
//!
//! - **[`PollCoordinator`]**: Single-flight poller. Concurrent
//!   [`refresh()`](PollCoordinator::refresh) calls share one device fetch;
//!   forced refreshes wait for a fetch that started after the call.
//!   [`start()`](PollCoordinator::start) spawns the fixed-interval schedule,
//!   [`shutdown()`](PollCoordinator::shutdown) stops it.
//!
//! - **[`StateSnapshot`]**: Immutable result of one successful poll:
//!   outlet states and names plus temperature, humidity, and current.
//!   Malformed readings become `None`, never a failed poll.
//!
//! - **[`SnapshotObserver`]** / **[`PollEventStream`]**: Two ways to hear
//!   about every poll outcome, failed ones included: callbacks invoked in
//!   registration order, or a `Stream` of [`PollEvent`]s.
//!
//! - **Projections** ([`entity`]): [`SwitchView`] per outlet and
//!   [`SensorView`] per reading, unified by [`EntityView`] and the
//!   [`Projection`] trait. Switch commands go straight to the device, then
//!   force a refresh.
//!
//! - **[`PduEntry`]**: Setup and teardown of one configured PDU.
//!
//! The device protocol itself is behind the [`DeviceClient`] trait.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod entity;
pub mod entry;
pub mod error;
pub mod model;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{ClientError, DeviceClient, OutletConfig, OutletConfigMap, RawStatus};
pub use config::{LineVoltage, PduConfig, SCAN_INTERVAL, StalePolicy};
pub use coordinator::{
    ObserverError, PollCoordinator, PollEvent, SnapshotObserver, SubscriptionId,
};
pub use entity::{
    Availability, EntityState, EntityView, Projection, SensorKind, SensorView, SwitchView,
};
pub use entry::{PduEntry, validate_connection};
pub use error::{PduError, PollError};
pub use model::{DeviceIdentity, DeviceInfo, StateSnapshot};
pub use stream::PollEventStream;
