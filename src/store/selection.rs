use serde::Serialize;
use tracing::debug;

use crate::model::Device;

/// Which device and profile are active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub device_id: Option<String>,
    pub profile_id: Option<String>,
}

impl Selection {
    /// Make the selection valid for `devices`.
    ///
    /// The active device must exist, else the first device is chosen, else
    /// none. The active profile must exist in the active device, else its
    /// first profile is chosen, else none. A change of device always resets
    /// the profile. Returns true when the active device changed.
    pub fn reconcile(&mut self, devices: &[Device]) -> bool {
        let device = self
            .device_id
            .as_deref()
            .and_then(|id| devices.iter().find(|d| d.id == id))
            .or_else(|| devices.first());

        let Some(device) = device else {
            let changed = self.device_id.is_some();
            self.device_id = None;
            self.profile_id = None;
            return changed;
        };

        let changed = self.device_id.as_deref() != Some(device.id.as_str());
        if changed {
            debug!(from = ?self.device_id, to = %device.id, "Active device changed");
            self.device_id = Some(device.id.clone());
            self.profile_id = None;
        }

        let keep = self
            .profile_id
            .as_deref()
            .is_some_and(|id| device.profile(id).is_some());
        if !keep {
            let first = device.profiles.first().map(|p| p.id.clone());
            if first != self.profile_id {
                debug!(from = ?self.profile_id, to = ?first, "Active profile reset");
            }
            self.profile_id = first;
        }
        changed
    }
}
