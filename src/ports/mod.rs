//! Port traits: the collaborators the domain talks to.

pub mod alert_store;
pub mod candle_port;
pub mod config_port;
pub mod notification_port;
pub mod pattern_port;
pub mod report_port;
pub mod result_store;
