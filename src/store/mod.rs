//! Device, profile and template state with local-first persistence.
//!
//! The store is the single owner of the device graph. Every mutation builds
//! a fresh collection and swaps the `Arc`, so a snapshot handed out by
//! [`ProfileStore::devices`] never changes underneath its holder. Storage
//! and agent failures are logged and absorbed; mutations only return input
//! errors. A key that could not be read is never written back during the
//! session, so whatever is stored there survives for a later run.

mod agent;
mod kv;
pub mod mock;
mod selection;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

pub use agent::{AgentClient, AgentConfig, HttpAgentClient, LEGACY_PROFILE_ID, LEGACY_PROFILE_NAME};
pub use kv::{KvStore, MemoryKv, SqliteKv};
pub use selection::Selection;

use crate::connection::Target;
use crate::error::{RdError, Result};
use crate::model::defaults::{builtin_templates, default_devices};
use crate::model::{DEFAULT_PORT, Device, Os, Profile, Template, deep_copy_profiles, new_id};

/// Storage key holding the full device list.
pub const DEVICES_KEY: &str = "devices";
/// Storage key holding user-saved templates.
pub const TEMPLATES_KEY: &str = "user_templates";

/// Store tuning.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Upper bound on each migration fetch.
    pub fetch_timeout: Duration,
    /// Port used when a new device does not name one.
    pub default_port: u16,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(3),
            default_port: DEFAULT_PORT,
        }
    }
}

/// Input for [`ProfileStore::add_device`].
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub name: String,
    pub host: String,
    pub port: Option<u16>,
    pub os: Os,
    pub theme_color: Option<String>,
}

/// Where a new device's initial profiles come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSource {
    Empty,
    /// Deep copy of the active device's profiles.
    CloneActive,
    /// Deep copy of the template with this id.
    Template(String),
}

/// Result summary of [`ProfileStore::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Storage held no device list and defaults were seeded.
    pub seeded: bool,
    /// The stored device list could not be read. Defaults are used in
    /// memory and storage is left untouched.
    pub storage_unreadable: bool,
    /// Devices whose profiles were adopted from their agent.
    pub migrated: Vec<String>,
    /// Devices whose agent could not supply profiles.
    pub migration_failed: Vec<String>,
}

pub struct ProfileStore {
    kv: Box<dyn KvStore>,
    agent: Arc<dyn AgentClient>,
    options: StoreOptions,
    devices: Arc<Vec<Device>>,
    templates: Arc<Vec<Template>>,
    selection: Selection,
    /// Latest background push per device. Each push waits for the one
    /// before it, so the agent applies them in edit order.
    pending_pushes: HashMap<String, JoinHandle<()>>,
    devices_writable: bool,
    templates_writable: bool,
}

impl ProfileStore {
    /// Create an empty store. Call [`load`](Self::load) before use.
    pub fn new(kv: impl KvStore + 'static, agent: Arc<dyn AgentClient>, options: StoreOptions) -> Self {
        Self {
            kv: Box::new(kv),
            agent,
            options,
            devices: Arc::new(Vec::new()),
            templates: Arc::new(builtin_templates()),
            selection: Selection::default(),
            pending_pushes: HashMap::new(),
            devices_writable: true,
            templates_writable: true,
        }
    }

    /// Read storage, seed defaults if needed, migrate devices without
    /// profiles from their agents and merge templates.
    ///
    /// Never fails: unreadable storage means in-memory defaults, unreachable
    /// agents leave devices empty.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> LoadReport {
        let mut report = LoadReport::default();

        let mut devices = match self.read_json::<Vec<Device>>(DEVICES_KEY) {
            Ok(Some(devices)) => {
                debug!(count = devices.len(), "Loaded devices from storage");
                devices
            }
            Ok(None) => {
                info!("No stored devices, seeding defaults");
                report.seeded = true;
                default_devices()
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored devices, using defaults without saving");
                report.storage_unreadable = true;
                self.devices_writable = false;
                default_devices()
            }
        };

        self.migrate(&mut devices, &mut report).await;

        let user_templates = match self.read_json::<Vec<Template>>(TEMPLATES_KEY) {
            Ok(templates) => templates.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored templates, using built-ins without saving");
                self.templates_writable = false;
                Vec::new()
            }
        };
        let mut templates = builtin_templates();
        templates.extend(user_templates.into_iter().filter(|t| !t.is_builtin()));
        self.templates = Arc::new(templates);

        self.devices = Arc::new(devices);
        self.selection.reconcile(&self.devices);
        if report.seeded || !report.migrated.is_empty() {
            self.persist_devices();
        }

        info!(
            devices = self.devices.len(),
            templates = self.templates.len(),
            migrated = report.migrated.len(),
            "Store loaded"
        );
        report
    }

    /// Fetch profiles for every device that has none, concurrently.
    async fn migrate(&self, devices: &mut [Device], report: &mut LoadReport) {
        let fetches = devices
            .iter()
            .enumerate()
            .filter(|(_, d)| d.profiles.is_empty())
            .map(|(index, device)| {
                let target = Target::new(device.host.clone(), device.port);
                let fetch = self.agent.fetch_config(&target);
                let timeout = self.options.fetch_timeout;
                async move { (index, target, tokio::time::timeout(timeout, fetch).await) }
            })
            .collect::<Vec<_>>();
        if fetches.is_empty() {
            return;
        }
        debug!(count = fetches.len(), "Migrating devices without profiles");

        for (index, target, outcome) in futures::future::join_all(fetches).await {
            let device = &mut devices[index];
            match outcome {
                Ok(Ok(profiles)) => {
                    info!(device = %device.id, %target, profiles = profiles.len(), "Adopted agent profiles");
                    device.profiles = deep_copy_profiles(&profiles);
                    report.migrated.push(device.id.clone());
                }
                Ok(Err(e)) => {
                    warn!(device = %device.id, %target, error = %e, "Profile migration failed");
                    report.migration_failed.push(device.id.clone());
                }
                Err(_) => {
                    warn!(device = %device.id, %target, "Profile migration timed out");
                    report.migration_failed.push(device.id.clone());
                }
            }
        }
    }

    /// Current device list.
    #[must_use]
    pub fn devices(&self) -> Arc<Vec<Device>> {
        Arc::clone(&self.devices)
    }

    /// Built-in templates followed by user templates.
    #[must_use]
    pub fn templates(&self) -> Arc<Vec<Template>> {
        Arc::clone(&self.templates)
    }

    #[must_use]
    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    #[must_use]
    pub fn template(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn active_device(&self) -> Option<&Device> {
        self.selection.device_id.as_deref().and_then(|id| self.device(id))
    }

    #[must_use]
    pub fn active_profile(&self) -> Option<&Profile> {
        let device = self.active_device()?;
        self.selection.profile_id.as_deref().and_then(|id| device.profile(id))
    }

    /// Make `id` the active device. Selecting a different device resets
    /// the active profile to its first.
    pub fn select_device(&mut self, id: &str) -> Result<()> {
        if self.device(id).is_none() {
            return Err(RdError::DeviceNotFound { id: id.to_string() });
        }
        if self.selection.device_id.as_deref() != Some(id) {
            self.selection.device_id = Some(id.to_string());
            self.selection.profile_id = None;
        }
        self.selection.reconcile(&self.devices);
        Ok(())
    }

    /// Make `id` the active profile of the active device.
    pub fn select_profile(&mut self, id: &str) -> Result<()> {
        let device = self.active_device().ok_or(RdError::NoActiveDevice)?;
        if device.profile(id).is_none() {
            return Err(RdError::ProfileNotFound { id: id.to_string() });
        }
        self.selection.profile_id = Some(id.to_string());
        Ok(())
    }

    /// Append a new device and make it active. Returns its id.
    #[instrument(skip(self, new), fields(name = %new.name, host = %new.host))]
    pub fn add_device(&mut self, new: NewDevice, source: ProfileSource) -> Result<String> {
        let name = new.name.trim();
        let host = new.host.trim();
        if name.is_empty() {
            return Err(RdError::InvalidInput("Device name is required".into()));
        }
        if host.is_empty() {
            return Err(RdError::InvalidInput("Device host is required".into()));
        }
        let port = new.port.unwrap_or(self.options.default_port);
        if port == 0 {
            return Err(RdError::InvalidInput("Device port must be non-zero".into()));
        }

        let profiles = match &source {
            ProfileSource::Empty => Vec::new(),
            ProfileSource::CloneActive => {
                let active = self.active_device().ok_or(RdError::NoActiveDevice)?;
                deep_copy_profiles(&active.profiles)
            }
            ProfileSource::Template(id) => {
                let template = self
                    .template(id)
                    .ok_or_else(|| RdError::TemplateNotFound { id: id.clone() })?;
                deep_copy_profiles(&template.profiles)
            }
        };

        let mut id = new_id("device");
        while self.device(&id).is_some() {
            id = new_id("device");
        }

        let device = Device {
            id: id.clone(),
            name: name.to_string(),
            host: host.to_string(),
            port,
            os: new.os,
            theme_color: new.theme_color.filter(|c| !c.trim().is_empty()),
            profiles,
        };
        info!(device = %id, ?source, profiles = device.profiles.len(), "Adding device");

        let mut next = self.devices.as_ref().clone();
        next.push(device);
        self.selection.device_id = Some(id.clone());
        self.selection.profile_id = None;
        self.commit_devices(next);
        Ok(id)
    }

    /// Remove a device. If it was active, the first remaining device
    /// becomes active.
    #[instrument(skip(self))]
    pub fn delete_device(&mut self, id: &str) -> Result<()> {
        if self.device(id).is_none() {
            return Err(RdError::DeviceNotFound { id: id.to_string() });
        }
        let next = self
            .devices
            .iter()
            .filter(|d| d.id != id)
            .cloned()
            .collect();
        info!(device = %id, "Deleting device");
        self.commit_devices(next);
        Ok(())
    }

    /// Snapshot a device's profiles into a new user template. Returns its id.
    #[instrument(skip(self))]
    pub fn save_as_template(&mut self, device_id: &str, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RdError::InvalidInput("Template name is required".into()));
        }
        let device = self
            .device(device_id)
            .ok_or_else(|| RdError::DeviceNotFound { id: device_id.to_string() })?;

        let template = Template {
            id: new_id("tpl"),
            name: name.to_string(),
            os: device.os,
            profiles: deep_copy_profiles(&device.profiles),
        };
        let id = template.id.clone();
        info!(template = %id, profiles = template.profiles.len(), "Saving template");

        let mut next = self.templates.as_ref().clone();
        next.push(template);
        self.templates = Arc::new(next);
        self.persist_templates();
        Ok(id)
    }

    /// Replace a device's profile list, persist it and push it to the
    /// device's agent in the background.
    ///
    /// The push is not awaited; its failure is logged and the local edit
    /// stands.
    #[instrument(skip(self, profiles), fields(profiles = profiles.len()))]
    pub fn update_profiles(&mut self, device_id: &str, profiles: &[Profile]) -> Result<()> {
        let index = self
            .devices
            .iter()
            .position(|d| d.id == device_id)
            .ok_or_else(|| RdError::DeviceNotFound { id: device_id.to_string() })?;

        let mut next = self.devices.as_ref().clone();
        next[index].profiles = deep_copy_profiles(profiles);
        let target = Target::new(next[index].host.clone(), next[index].port);
        let pushed = next[index].profiles.clone();
        self.commit_devices(next);

        self.spawn_push(device_id, target, pushed);
        Ok(())
    }

    /// Push a device's current profiles to its agent and wait for the
    /// outcome.
    #[instrument(skip(self))]
    pub async fn sync_device(&self, device_id: &str) -> Result<()> {
        let device = self
            .device(device_id)
            .ok_or_else(|| RdError::DeviceNotFound { id: device_id.to_string() })?;
        let target = Target::new(device.host.clone(), device.port);
        self.agent.push_config(&target, device.profiles.clone()).await?;
        info!(device = %device_id, %target, "Profiles synced");
        Ok(())
    }

    /// Wait for background pushes started by `update_profiles`, up to
    /// `timeout`. Returns false if some were still running.
    pub async fn settle(&mut self, timeout: Duration) -> bool {
        let pending: Vec<_> = self.pending_pushes.drain().map(|(_, handle)| handle).collect();
        if pending.is_empty() {
            return true;
        }
        debug!(devices = pending.len(), "Waiting for remote sync");
        tokio::time::timeout(timeout, futures::future::join_all(pending))
            .await
            .is_ok()
    }

    fn spawn_push(&mut self, device_id: &str, target: Target, profiles: Vec<Profile>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(device = %device_id, "No async runtime, skipping remote sync");
            return;
        };
        let previous = self.pending_pushes.remove(device_id);
        let agent = Arc::clone(&self.agent);
        let device = device_id.to_string();
        let handle = runtime.spawn(async move {
            if let Some(previous) = previous {
                // A failed or panicked earlier push does not block this one.
                let _ = previous.await;
            }
            match agent.push_config(&target, profiles).await {
                Ok(()) => debug!(device = %device, %target, "Remote sync succeeded"),
                Err(e) => warn!(device = %device, %target, error = %e, "Remote sync failed, keeping local edit"),
            }
        });
        self.pending_pushes.retain(|_, h| !h.is_finished());
        self.pending_pushes.insert(device_id.to_string(), handle);
    }

    fn commit_devices(&mut self, next: Vec<Device>) {
        self.devices = Arc::new(next);
        self.selection.reconcile(&self.devices);
        self.persist_devices();
    }

    fn persist_devices(&self) {
        if !self.devices_writable {
            warn!("Stored devices were unreadable, change kept in memory only");
            return;
        }
        if let Err(e) = self.write_json(DEVICES_KEY, self.devices.as_ref()) {
            warn!(error = %e, "Failed to save devices, change kept in memory only");
        }
    }

    fn persist_templates(&self) {
        if !self.templates_writable {
            warn!("Stored templates were unreadable, change kept in memory only");
            return;
        }
        let user: Vec<&Template> = self.templates.iter().filter(|t| !t.is_builtin()).collect();
        if let Err(e) = self.write_json(TEMPLATES_KEY, &user) {
            warn!(error = %e, "Failed to save templates, change kept in memory only");
        }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.kv.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.kv.set(key, &raw)
    }
}
