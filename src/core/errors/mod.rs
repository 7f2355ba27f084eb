//! Error types for VectorGate
//!
//! Each concern owns one `thiserror` enum. The HTTP layer converts them into
//! status codes; nothing below the network layer knows about HTTP.

pub mod auth_error;
pub mod backend_error;
pub mod query_error;
pub mod registry_error;

pub use auth_error::*;
pub use backend_error::*;
pub use query_error::*;
pub use registry_error::*;
