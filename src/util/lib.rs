//! Shared types used by every crate in the routing tier: the error enum,
//! configuration loading, a 64-bit address/key hash, monotonic time, and a
//! small JSON-backed persister for on-disk node identity.

#[macro_use]
extern crate tracing;

pub mod config;
pub mod data;
pub mod error;
pub mod persister;
pub mod time;

pub use error::{Error, OkOrMessage};
