//! Port traits: the boundaries between the backtest core and its collaborators.

pub mod config_port;
pub mod data_port;
pub mod interpretation_port;
pub mod narrative_port;
pub mod report_port;
pub mod sandbox_port;
