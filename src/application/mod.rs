//! Controllers and the ports they depend on.

pub mod auth;
pub mod context;
pub mod error;
pub mod listing;
pub mod ports;
pub mod post;

#[cfg(test)]
pub(crate) mod testing;
