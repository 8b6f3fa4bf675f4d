// ── Domain model ──
//
// Immutable types shared by the coordinator and the projections.

mod device;
mod snapshot;

pub use device::{DeviceIdentity, DeviceInfo};
pub use snapshot::StateSnapshot;
