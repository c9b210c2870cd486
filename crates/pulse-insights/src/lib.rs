//! Dashboard core: everything between "rows came back from the store" and
//! "something is drawn". Aggregation and filter composition are pure; the
//! debouncer and notification bridge are small tokio loops around pure
//! state transitions.

pub mod aggregate;
pub mod board;
pub mod controller;
pub mod debounce;
pub mod filter;
pub mod notifications;
pub mod pagination;
pub mod username;
pub mod validation;
