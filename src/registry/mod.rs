//! Support for talking to registries and the remote content store

mod auth;
mod client;
mod default;
mod progress;
mod search;

pub use auth::*;
pub use client::*;
pub use default::*;
pub use progress::*;
pub use search::*;
