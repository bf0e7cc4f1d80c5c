//! Shared types and wire conventions for talking to a Vintage Pi TV device.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use protocol::*;
