//! writedesk: a headless client for the "writing" section of a blog.
//!
//! The crate is layered the usual way:
//!
//! - [`domain`]: post rules (templates, ordering, tag filtering, validation).
//! - [`cache`]: the session cache and the collection invalidation signal.
//! - [`application`]: the post and listing controllers plus the ports they
//!   talk through (HTTP API, navigation, confirmation, notices).
//! - [`infra`]: reqwest-backed API client, key/value stores, telemetry.
//! - [`presentation`]: markdown rendering and the console shell.
//! - [`config`]: layered settings (file → environment → CLI).

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
pub mod util;

pub use writedesk_api_types as api_types;
