#![allow(clippy::missing_docs_in_private_items)]

pub mod export;
pub mod probe;
pub mod reports;
pub mod roster;
pub mod sweep;

pub use probe::{HttpTransport, UrlProbe};
pub use sweep::{LivenessSweep, SweepOutcome};
