//! CRMS REST API client, domain types, and their caching glue.

pub mod api_types;
pub mod cache;
pub mod cached_client;
pub mod client;
pub mod minimize;
pub mod types;
