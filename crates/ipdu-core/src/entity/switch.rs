// ── Outlet switch projection ──

use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::{Availability, EntityState, Projection, ViewContext};
use crate::client::DeviceClient;
use crate::error::PduError;
use crate::model::DeviceInfo;

const ICON: &str = "mdi:power-socket-de";

/// One switchable outlet, addressed by its 0-based index.
pub struct SwitchView<C> {
    outlet: usize,
    ctx: ViewContext<C>,
}

impl<C> Clone for SwitchView<C> {
    fn clone(&self) -> Self {
        Self {
            outlet: self.outlet,
            ctx: self.ctx.clone(),
        }
    }
}

impl<C: DeviceClient> SwitchView<C> {
    pub fn new(outlet: usize, ctx: ViewContext<C>) -> Self {
        Self { outlet, ctx }
    }

    pub fn outlet(&self) -> usize {
        self.outlet
    }

    /// Relay state from the latest snapshot.
    ///
    /// `false` when there is no snapshot yet or the device did not report
    /// this outlet; use [`availability`](Projection::availability) to tell
    /// "off" from "unknown".
    pub fn is_on(&self) -> bool {
        self.ctx
            .snapshot()
            .and_then(|snap| snap.outlet_state(self.outlet))
            .unwrap_or(false)
    }

    pub async fn turn_on(&self) -> Result<(), PduError> {
        self.switch(true).await
    }

    pub async fn turn_off(&self) -> Result<(), PduError> {
        self.switch(false).await
    }

    /// Send the command, then force a refresh whatever the command
    /// returned, so the view shows what the device actually did.
    async fn switch(&self, enabled: bool) -> Result<(), PduError> {
        let outlets = BTreeSet::from([self.outlet]);
        let coordinator = self.ctx.coordinator();

        debug!(outlet = self.outlet, enabled, "switching outlet");
        let command = coordinator
            .client()
            .set_outlets_enabled(&outlets, enabled)
            .await;

        if let Err(ref e) = command {
            warn!(outlet = self.outlet, enabled, error = %e, "outlet command failed");
        }

        // The refresh outcome reaches observers; callers only see the command's.
        if let Err(e) = coordinator.refresh(true).await {
            debug!(outlet = self.outlet, error = %e, "refresh after outlet command failed");
        }

        command.map_err(|e| PduError::Command {
            outlets: outlets.into_iter().collect(),
            enabled,
            reason: e.to_string(),
        })
    }
}

impl<C: DeviceClient> Projection for SwitchView<C> {
    fn unique_id(&self) -> String {
        format!("{}_outlet_{}", self.ctx.entry_id(), self.outlet)
    }

    /// `"Outlet N: <name>"` when the device has a name for it, else `"Outlet N"`.
    fn name(&self) -> String {
        let number = self.outlet + 1;
        match self
            .ctx
            .snapshot()
            .as_deref()
            .and_then(|snap| snap.outlet_name(self.outlet))
        {
            Some(name) => format!("Outlet {number}: {name}"),
            None => format!("Outlet {number}"),
        }
    }

    fn icon(&self) -> Option<&'static str> {
        Some(ICON)
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
            Some(snap) => match snap.outlet_state(self.outlet) {
                Some(true) => EntityState::On,
                Some(false) => EntityState::Off,
                None => EntityState::Unknown,
            },
        }
    }
}
