//! Tracker subsystem
//!
//! A [`Tracker`] binds a mutable field map to one schema section and keeps
//! its [`Issues`] current on every mutation. Issues are accumulated, never
//! raised; the owning resource decides when they block a save.

mod coerce;
mod issues;
#[allow(clippy::module_inception)]
mod tracker;

pub use coerce::{coerce, is_zero_length, parse_identifier};
pub use issues::{InvalidField, InvalidReference, IssueKind, Issues, ReferenceFault};
pub use tracker::Tracker;
