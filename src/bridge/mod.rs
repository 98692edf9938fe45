//! Glue between the correlator and the delivery layer.
//!
//! ## Module Structure
//!
//! - `channels`: Communication channel structures
//! - `formatter`: Content templates with placeholder substitution
//! - `payload`: Outbound webhook JSON
//! - `orchestrator`: Routes events and hands requests to delivery (`Orchestrator`)

pub mod channels;
pub mod formatter;
pub mod orchestrator;
pub mod payload;

pub use channels::ChannelBundle;
pub use orchestrator::Orchestrator;
