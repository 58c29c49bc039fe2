//! Pipeline entry points.
//!
//! - `Dispatcher`: relays one announcement to every channel
//! - `PollLoop`: watches the sources and drives detection and dispatch

pub mod dispatch;
pub mod poll;

pub use dispatch::{DispatchReport, Dispatcher};
pub use poll::{CycleReport, PollLoop, SourceOutcome};
