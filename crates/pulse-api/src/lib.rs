pub mod auth;
pub mod error;
pub mod feedbacks;
pub mod insights;
pub mod issues;
pub mod middleware;
pub mod routes;
pub mod settings;
pub mod team;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use routes::router;
