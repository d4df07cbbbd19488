//! Active device/profile glue over the store and the connection.
//!
//! Once started, the controller keeps exactly one connection, always aimed
//! at the active device. Any operation that can change the active device
//! re-targets it, which tears the previous session down before the new one
//! starts. A controller that was only loaded never opens a connection.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::connection::{ConnectionManager, ConnectionSnapshot, Connector, OutboundCommand, Target};
use crate::error::{RdError, Result};
use crate::layout::{self, GridUsage};
use crate::model::tabs::{self, Direction};
use crate::model::{Button, Device, Profile};
use crate::store::{LoadReport, NewDevice, ProfileSource, ProfileStore};
use crate::translate::translate;

/// What pressing a grid cell did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PressOutcome {
    /// An empty cell was pressed and a default button was created there.
    Added { button_id: String },
    /// The command was handed to the live connection.
    Sent { action: String, params: Vec<String> },
    /// Not connected; the command was dropped.
    Dropped { action: String },
}

pub struct AppController<C: Connector> {
    store: ProfileStore,
    connection: ConnectionManager<C>,
    online: bool,
}

impl<C: Connector> AppController<C> {
    pub fn new(store: ProfileStore, connection: ConnectionManager<C>) -> Self {
        Self {
            store,
            connection,
            online: false,
        }
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.connection
    }

    /// Load the store and connect to the active device.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> LoadReport {
        let report = self.store.load().await;
        self.connect();
        report
    }

    /// Connect to the active device and keep following it.
    pub fn connect(&mut self) {
        self.online = true;
        self.retarget();
    }

    /// Load the store without connecting.
    pub async fn load(&mut self) -> LoadReport {
        self.store.load().await
    }

    /// Wait for background sync, flush queued commands and close the
    /// connection. Each phase is bounded by `timeout`.
    #[instrument(skip(self))]
    pub async fn shutdown(&mut self, timeout: Duration) {
        if !self.store.settle(timeout).await {
            warn!("Remote sync still running at shutdown");
        }
        self.connection.shutdown(timeout).await;
        self.online = false;
    }

    pub fn select_device(&mut self, id: &str) -> Result<()> {
        self.store.select_device(id)?;
        self.retarget();
        Ok(())
    }

    pub fn select_profile(&mut self, id: &str) -> Result<()> {
        self.store.select_profile(id)
    }

    pub fn add_device(&mut self, new: NewDevice, source: ProfileSource) -> Result<String> {
        let id = self.store.add_device(new, source)?;
        self.retarget();
        Ok(id)
    }

    pub fn delete_device(&mut self, id: &str) -> Result<()> {
        self.store.delete_device(id)?;
        self.retarget();
        Ok(())
    }

    pub fn save_as_template(&mut self, device_id: &str, name: &str) -> Result<String> {
        self.store.save_as_template(device_id, name)
    }

    pub fn update_profiles(&mut self, device_id: &str, profiles: &[Profile]) -> Result<()> {
        self.store.update_profiles(device_id, profiles)
    }

    /// Append a fresh profile to the active device. Returns its id.
    pub fn add_profile(&mut self, name: Option<&str>) -> Result<String> {
        let mut profile = Profile::new_default();
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            profile.name = name.to_string();
        }
        let id = profile.id.clone();
        self.edit_active_profiles(|profiles| tabs::add_profile(profiles, profile))?;
        Ok(id)
    }

    pub fn remove_profile(&mut self, id: &str) -> Result<()> {
        self.require_profile(id)?;
        self.edit_active_profiles(|profiles| tabs::remove_profile(profiles, id))
    }

    pub fn rename_profile(&mut self, id: &str, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RdError::InvalidInput("Profile name is required".into()));
        }
        self.require_profile(id)?;
        self.edit_active_profiles(|profiles| tabs::rename_profile(profiles, id, name))
    }

    pub fn move_profile(&mut self, id: &str, direction: Direction) -> Result<()> {
        let index = self
            .active_device()?
            .profiles
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| RdError::ProfileNotFound { id: id.to_string() })?;
        self.edit_active_profiles(|profiles| tabs::move_profile(profiles, index, direction))
    }

    /// Change a profile's grid shape. Returns the resulting usage, which may
    /// report overflow.
    pub fn resize_grid(&mut self, id: &str, rows: u32, cols: u32) -> Result<GridUsage> {
        self.require_profile(id)?;
        self.edit_active_profiles(|profiles| tabs::resize_grid(profiles, id, rows, cols))?;
        let profile = self.require_profile(id)?;
        let usage = GridUsage::of(&profile.buttons, profile.rows, profile.cols);
        if usage.overflow {
            warn!(profile = %id, used = usage.used, total = usage.total, "Grid overflow after resize");
        }
        Ok(usage)
    }

    /// Move a button of the active profile into another button's slot.
    pub fn reorder_buttons(&mut self, from_id: &str, to_id: &str) -> Result<()> {
        let profile = self.active_profile()?;
        let buttons = layout::reorder(&profile.buttons, from_id, to_id);
        let profile_id = profile.id.clone();
        self.edit_active_profiles(|profiles| tabs::replace_buttons(profiles, &profile_id, &buttons))
    }

    /// Replace the active profile's button that has `button.id`.
    ///
    /// Returns the profile's usage; a larger span may leave it overflowing.
    #[instrument(skip(self, button), fields(button = %button.id))]
    pub fn update_button(&mut self, button: Button) -> Result<GridUsage> {
        let profile = self.active_profile()?;
        if button.is_placeholder || profile.button(&button.id).is_none() {
            return Err(RdError::ButtonNotFound { id: button.id });
        }
        let buttons = tabs::upsert_button(&profile.buttons, &button);
        let profile_id = profile.id.clone();
        self.edit_active_profiles(|profiles| tabs::replace_buttons(profiles, &profile_id, &buttons))?;

        let profile = self.require_profile(&profile_id)?;
        let usage = GridUsage::of(&profile.buttons, profile.rows, profile.cols);
        if usage.overflow {
            warn!(profile = %profile_id, used = usage.used, total = usage.total, "Grid overflow after button edit");
        }
        Ok(usage)
    }

    /// Delete a button from the active profile.
    #[instrument(skip(self))]
    pub fn remove_button(&mut self, id: &str) -> Result<()> {
        let profile = self.active_profile()?;
        if profile.button(id).is_none() {
            return Err(RdError::ButtonNotFound { id: id.to_string() });
        }
        let buttons = layout::remove_button(&profile.buttons, id);
        let profile_id = profile.id.clone();
        self.edit_active_profiles(|profiles| tabs::replace_buttons(profiles, &profile_id, &buttons))
    }

    /// Real buttons of the active profile followed by placeholders for the
    /// empty cells.
    #[must_use]
    pub fn display_buttons(&self) -> Vec<Button> {
        self.store
            .active_profile()
            .map(|p| layout::display_buttons(&p.buttons, p.rows, p.cols))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn grid_usage(&self) -> Option<GridUsage> {
        self.store
            .active_profile()
            .map(|p| GridUsage::of(&p.buttons, p.rows, p.cols))
    }

    /// Activate a cell of the active profile.
    ///
    /// A placeholder creates a default button in the profile. A real button
    /// is translated for the device's OS and sent.
    #[instrument(skip(self))]
    pub fn press(&mut self, button_id: &str) -> Result<PressOutcome> {
        let button = self
            .display_buttons()
            .into_iter()
            .find(|b| b.id == button_id)
            .ok_or_else(|| RdError::ButtonNotFound { id: button_id.to_string() })?;

        if button.is_placeholder {
            let profile = self.active_profile()?;
            let buttons = layout::add_button_at_placeholder(&profile.buttons);
            let profile_id = profile.id.clone();
            let added = buttons
                .last()
                .map(|b| b.id.clone())
                .ok_or_else(|| RdError::Other("Placeholder produced no button".into()))?;
            self.edit_active_profiles(|profiles| tabs::replace_buttons(profiles, &profile_id, &buttons))?;
            info!(button = %added, "Created button from empty cell");
            return Ok(PressOutcome::Added { button_id: added });
        }

        let os = self.active_device()?.os;
        let params = translate(&button.action, &button.params, os);
        let action = button.action.as_str().to_string();
        debug!(button = %button.id, %action, ?params, %os, "Pressing button");
        if self.connection.send(OutboundCommand::new(action.clone(), params.clone())) {
            Ok(PressOutcome::Sent { action, params })
        } else {
            Ok(PressOutcome::Dropped { action })
        }
    }

    /// Send an arbitrary command without translation.
    pub fn send_raw(&self, action: &str, params: Vec<String>) -> bool {
        self.connection.send(OutboundCommand::new(action, params))
    }

    pub fn reconnect(&mut self) {
        self.connection.reconnect();
    }

    #[must_use]
    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.connection.snapshot()
    }

    fn active_device(&self) -> Result<&Device> {
        self.store.active_device().ok_or(RdError::NoActiveDevice)
    }

    fn active_profile(&self) -> Result<&Profile> {
        self.active_device()?;
        self.store
            .active_profile()
            .ok_or_else(|| RdError::InvalidInput("Active device has no profiles".into()))
    }

    fn require_profile(&self, id: &str) -> Result<&Profile> {
        self.active_device()?
            .profile(id)
            .ok_or_else(|| RdError::ProfileNotFound { id: id.to_string() })
    }

    fn edit_active_profiles(&mut self, edit: impl FnOnce(&[Profile]) -> Vec<Profile>) -> Result<()> {
        let device = self.active_device()?;
        let next = edit(&device.profiles);
        let device_id = device.id.clone();
        self.store.update_profiles(&device_id, &next)
    }

    /// Point the connection at the active device, or drop it if there is none.
    fn retarget(&mut self) {
        if !self.online {
            return;
        }
        match self.store.active_device() {
            Some(device) => {
                let target = Target::new(device.host.clone(), device.port);
                self.connection.connect(target);
            }
            None => {
                debug!("No active device, disconnecting");
                self.connection.disconnect();
            }
        }
    }
}
