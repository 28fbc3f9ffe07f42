//! Small helpers shared across modules.

pub mod http_client;
