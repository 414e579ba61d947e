// API Middleware
//
// Session gating for the web app.

pub mod auth;

pub use auth::{auth_middleware, extract_token, is_public_path, AuthenticatedUser};
