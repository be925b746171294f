//! Port traits: the seams between domain logic and the outside world.

pub mod broker_port;
pub mod config_port;
pub mod data_port;
pub mod model_store;
pub mod report_port;
