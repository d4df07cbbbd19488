//! Remote deck library - devices, profiles and the live link to host agents.
//!
//! This library exposes the core of the `rdeck` driver for use in tests and
//! by front ends.
//!
//! # Modules
//!
//! - `model`: Device/Profile/Button/Template data and profile-list editing
//! - `layout`: Grid capacity, placeholders and reordering
//! - `translate`: OS-aware hotkey parameter rewriting
//! - `connection`: Auto-reconnecting command/telemetry channel
//! - `store`: Local-first persistence, migration and remote sync
//! - `controller`: Active selection glue over the store and the connection
//! - `config`: Settings file handling
//! - `error`: Error types with user-recoverable hints
//! - `output`: Output mode abstraction (robot/human)
#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod connection;
pub mod controller;
pub mod error;
pub mod layout;
pub mod logging;
pub mod model;
pub mod output;
pub mod store;
pub mod translate;
