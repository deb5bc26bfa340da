//! Utility functions and helpers.

pub mod time;
pub mod url;

pub use url::extract_id_param;
