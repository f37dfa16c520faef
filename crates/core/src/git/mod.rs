//! Git index access: conflicted-file enumeration and staging.

pub mod client;

pub use client::GitClient;
