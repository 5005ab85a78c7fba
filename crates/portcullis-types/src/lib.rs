//! Portcullis Types - Shared data contracts
//!
//! This crate contains the types exchanged with the authentication engine:
//! - User identity and sessions
//! - Authentication methods, steps and results
//! - Security levels and error codes

pub mod api_key;
pub mod auth;
pub mod error;
pub mod level;
pub mod session;
pub mod user;

pub use api_key::*;
pub use auth::*;
pub use error::*;
pub use level::*;
pub use session::*;
pub use user::*;
