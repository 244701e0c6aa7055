//! # cinder-api
//!
//! Safe method dispatch from the JSON-RPC boundary into the blockchain's
//! public surface.
//!
//! Method names arrive as arbitrary untrusted input. The executor accepts a
//! name only when it is a string, is not `constructor`, and names one of the
//! declared chain methods; everything else is rejected with the offending
//! name. This is the Rust rendering of denying prototype-walking attacks.

mod error;
mod executor;

pub use error::{ApiError, ApiResult};
pub use executor::Executor;
