//! HTTP surface — thin REST plumbing over the analysis core.

pub mod routes;

pub use routes::{ApiState, email_routes};
