//! Google Cloud Storage 驱动
//!
//! JSON API over reqwest; service account tokens handled in `auth`.

pub mod auth;
pub mod driver;

pub use driver::{GcsClient, DEFAULT_ENDPOINT};
