//! Inbound side of the game client.
//!
//! This module contains:
//! - Feed decoding from a followed file or stdin
//! - The session loop that drives parsing and correlation
//! - Item pricing and the screenshot source

pub mod catalog;
pub mod feed;
pub mod screenshot;
pub mod session;

// Re-export commonly used types
pub use catalog::ConfigItemCatalog;
pub use feed::FeedSource;
pub use screenshot::ConfiguredScreenshots;
pub use session::{GameSession, SessionEnd};
