//! Profile-list editing used by the settings screen.
//!
//! Each function takes the current list by reference and returns a new one,
//! ready to be handed to `ProfileStore::update_profiles` as a whole value.

use tracing::{debug, trace};

use super::{Button, Profile};

/// Number of profiles surfaced as primary tabs.
pub const MAX_ACTIVE_TABS: usize = 5;

/// Direction for [`move_profile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// The profiles shown as tabs (the first five).
#[must_use]
pub fn active_tabs(profiles: &[Profile]) -> &[Profile] {
    &profiles[..profiles.len().min(MAX_ACTIVE_TABS)]
}

/// The profiles persisted but not shown as tabs.
#[must_use]
pub fn stored_profiles(profiles: &[Profile]) -> &[Profile] {
    &profiles[profiles.len().min(MAX_ACTIVE_TABS)..]
}

/// Append a profile to the end of the list.
#[must_use]
pub fn add_profile(profiles: &[Profile], profile: Profile) -> Vec<Profile> {
    debug!(id = %profile.id, name = %profile.name, "Adding profile");
    let mut next = profiles.to_vec();
    next.push(profile);
    next
}

/// Remove the profile with `id`. No-op if absent.
#[must_use]
pub fn remove_profile(profiles: &[Profile], id: &str) -> Vec<Profile> {
    debug!(id, "Removing profile");
    profiles.iter().filter(|p| p.id != id).cloned().collect()
}

/// Swap the profile at `index` with its neighbour.
///
/// Out-of-range indices and moves past either end leave the order unchanged.
#[must_use]
pub fn move_profile(profiles: &[Profile], index: usize, direction: Direction) -> Vec<Profile> {
    let mut next = profiles.to_vec();
    let target = match direction {
        Direction::Up => index.checked_sub(1),
        Direction::Down => index.checked_add(1),
    };
    match target {
        Some(target) if index < next.len() && target < next.len() => {
            trace!(index, target, "Moving profile");
            next.swap(index, target);
        }
        _ => trace!(index, ?direction, "Profile move out of range, ignoring"),
    }
    next
}

/// Rename the profile with `id`.
#[must_use]
pub fn rename_profile(profiles: &[Profile], id: &str, name: &str) -> Vec<Profile> {
    map_profile(profiles, id, |p| p.name = name.to_string())
}

/// Change a profile's grid shape. Both dimensions are clamped to at least 1.
///
/// Shrinking the grid below the buttons' footprint is allowed; the result is
/// an overflowing profile the user resolves from the editor.
#[must_use]
pub fn resize_grid(profiles: &[Profile], id: &str, rows: u32, cols: u32) -> Vec<Profile> {
    map_profile(profiles, id, |p| {
        p.rows = rows.max(1);
        p.cols = cols.max(1);
    })
}

/// Replace a profile's buttons. Placeholder entries are stripped.
#[must_use]
pub fn replace_buttons(profiles: &[Profile], id: &str, buttons: &[Button]) -> Vec<Profile> {
    map_profile(profiles, id, |p| {
        p.buttons = buttons.iter().filter(|b| !b.is_placeholder).cloned().collect();
    })
}

/// Replace the button with the same id as `button`. No-op if absent.
#[must_use]
pub fn upsert_button(buttons: &[Button], button: &Button) -> Vec<Button> {
    buttons
        .iter()
        .map(|b| if b.id == button.id { button.clone() } else { b.clone() })
        .collect()
}

fn map_profile(profiles: &[Profile], id: &str, f: impl FnOnce(&mut Profile)) -> Vec<Profile> {
    let mut next = profiles.to_vec();
    if let Some(profile) = next.iter_mut().find(|p| p.id == id) {
        f(profile);
    }
    next
}
