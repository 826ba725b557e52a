pub mod api;
pub mod auth;
pub mod blog;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod language;
pub mod retry;
pub mod session;
pub mod translation;
pub mod user;
pub mod validation;

pub use api::ApiClient;
pub use error::ApiError;
