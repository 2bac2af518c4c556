//! Port traits for the external collaborators.

pub mod config_port;
pub mod exchange_port;
pub mod history_port;
pub mod notifier_port;
