//! Word-cloud plugin: renders a chat's recent history as a hosted image.

pub mod cache;
pub mod client;
pub mod command;
pub mod handler;
pub mod normalize;


pub use handler::{FAILURE_REPLY, WordCloudError, WordCloudPlugin};
