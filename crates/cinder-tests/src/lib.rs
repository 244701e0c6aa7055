//! # cinder-tests
//!
//! Integration tests for the Cinder simulator.
//!
//! This crate exercises the system end to end:
//! - Genesis determinism and instant mining
//! - Pause/resume and interval-mode batching
//! - Snapshot/revert time travel and storage garbage collection
//! - Persistence round trips and restart recovery

pub mod generators;





pub use generators::*;
