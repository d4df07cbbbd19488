//! Grid capacity accounting for a profile's buttons.
//!
//! A profile is a `rows x cols` grid and each button covers
//! `col_span x row_span` cells. Buttons may claim more cells than the grid
//! has; that overflow is reported, never clipped or auto-resized, so the
//! user decides whether to grow the grid or remove buttons.

use tracing::{debug, trace};

use crate::model::{ActionKind, Button};

/// Id prefix of synthesized placeholder cells.
pub const PLACEHOLDER_PREFIX: &str = "placeholder_";

/// Cell usage summary for one grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct GridUsage {
    pub used: u32,
    pub total: u32,
    pub overflow: bool,
}

impl GridUsage {
    /// Usage of a `rows x cols` grid. Zero dimensions count as 1, matching
    /// `Profile::capacity`.
    #[must_use]
    pub fn of(buttons: &[Button], rows: u32, cols: u32) -> Self {
        let used = used_cells(buttons);
        let total = rows.max(1).saturating_mul(cols.max(1));
        Self {
            used,
            total,
            overflow: used > total,
        }
    }

    /// Empty cells left (zero when full or overflowing).
    #[must_use]
    pub const fn free(&self) -> u32 {
        self.total.saturating_sub(self.used)
    }
}

/// Total cells covered by real buttons. Missing spans count as 1.
#[must_use]
pub fn used_cells(buttons: &[Button]) -> u32 {
    buttons
        .iter()
        .filter(|b| !b.is_placeholder)
        .map(Button::cells)
        .fold(0u32, u32::saturating_add)
}

/// True when the buttons need more cells than the grid provides.
#[must_use]
pub fn is_overflow(buttons: &[Button], rows: u32, cols: u32) -> bool {
    GridUsage::of(buttons, rows, cols).overflow
}

/// Synthesize one 1x1 placeholder per empty cell.
///
/// Returns nothing when the grid is exactly full or overflowing. Ids are
/// stable (`placeholder_0`, `placeholder_1`, ...) so a UI can key on them.
#[must_use]
pub fn placeholders(buttons: &[Button], rows: u32, cols: u32) -> Vec<Button> {
    if is_overflow(buttons, rows, cols) {
        debug!(rows, cols, "Grid overflow, no placeholders");
        return Vec::new();
    }

    (0..GridUsage::of(buttons, rows, cols).free())
        .map(|i| {
            let mut cell = Button::new(
                format!("{PLACEHOLDER_PREFIX}{i}"),
                "+",
                "plus",
                ActionKind::Other("placeholder".to_string()),
                Vec::new(),
            );
            cell.is_placeholder = true;
            cell
        })
        .collect()
}

/// Real buttons followed by the placeholders that fill the remaining cells.
#[must_use]
pub fn display_buttons(buttons: &[Button], rows: u32, cols: u32) -> Vec<Button> {
    let mut out: Vec<Button> = buttons.iter().filter(|b| !b.is_placeholder).cloned().collect();
    out.extend(placeholders(buttons, rows, cols));
    out
}

/// Move the button `from_id` into the slot currently held by `to_id`.
///
/// All other buttons keep their relative order. No-op if either id is
/// missing, the ids are equal, or either side is a placeholder. Placeholders
/// present in the input are dropped from the result, which only ever holds
/// real buttons.
#[must_use]
pub fn reorder(buttons: &[Button], from_id: &str, to_id: &str) -> Vec<Button> {
    let mut real: Vec<Button> = buttons.iter().filter(|b| !b.is_placeholder).cloned().collect();

    let from = real.iter().position(|b| b.id == from_id);
    let to = real.iter().position(|b| b.id == to_id);
    match (from, to) {
        (Some(from), Some(to)) if from != to => {
            trace!(from_id, to_id, from, to, "Reordering button");
            let moved = real.remove(from);
            real.insert(to, moved);
        }
        _ => trace!(from_id, to_id, "Reorder ignored"),
    }
    real
}

/// Append a fresh default button (used when a placeholder is activated).
#[must_use]
pub fn add_button_at_placeholder(buttons: &[Button]) -> Vec<Button> {
    let mut out: Vec<Button> = buttons.iter().filter(|b| !b.is_placeholder).cloned().collect();
    let button = Button::new_default();
    debug!(id = %button.id, "Adding button at placeholder");
    out.push(button);
    out
}

/// Remove the button with `id`. No-op if absent.
#[must_use]
pub fn remove_button(buttons: &[Button], id: &str) -> Vec<Button> {
    buttons.iter().filter(|b| b.id != id).cloned().collect()
}
