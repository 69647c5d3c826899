//! Stale participant reclamation.

pub mod monitor;

pub use monitor::LivenessMonitor;
