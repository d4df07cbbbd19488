//! OS-aware command translation.
//!
//! Buttons are authored once and pressed against hosts running different
//! operating systems. For hotkeys the primary modifier is remapped so a
//! `cmd+c` button copies on Windows and a `ctrl+v` button pastes on a Mac.
//! This is a heuristic covering the common shortcuts, not a full keymap:
//! shortcuts whose meaning differs beyond the modifier are not corrected.

use tracing::trace;

use crate::model::{ActionKind, Os};

/// Rewrite `params` for `action` as it should be sent to a host running `os`.
///
/// Only [`ActionKind::Hotkey`] is rewritten; every other action passes its
/// parameters through untouched. Matching is case-insensitive and tokens that
/// are not rewritten keep their original casing.
#[must_use]
pub fn translate(action: &ActionKind, params: &[String], os: Os) -> Vec<String> {
    if *action != ActionKind::Hotkey {
        return params.to_vec();
    }

    let out: Vec<String> = params
        .iter()
        .map(|token| remap_token(token, os).map_or_else(|| token.clone(), str::to_string))
        .collect();
    trace!(?params, ?out, %os, "Translated hotkey");
    out
}

fn remap_token(token: &str, os: Os) -> Option<&'static str> {
    let lower = token.to_ascii_lowercase();
    match os {
        Os::Windows => matches!(lower.as_str(), "command" | "cmd" | "meta").then_some("ctrl"),
        Os::Mac => matches!(lower.as_str(), "ctrl" | "control").then_some("command"),
        Os::Linux => None,
    }
}
