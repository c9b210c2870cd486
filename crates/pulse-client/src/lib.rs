//! HTTP + gateway client for a Pulseboard server.
//!
//! `PulseClient` wraps the REST routes, `subscribe` opens the live feed and
//! `load_dashboard` runs the overview pipeline over freshly fetched rows.

pub mod client;
pub mod dashboard;
pub mod error;
pub mod gateway;

pub use client::PulseClient;
pub use error::ClientError;
