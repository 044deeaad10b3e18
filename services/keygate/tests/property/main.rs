//! Property-based tests.
//!
//! Categories:
//! - Signature verification: tampered keys and undecodable signatures
//! - Gate: rejected requests never reach the handler
//! - Renewal schedule arithmetic
//!
//! Each property runs at least 100 cases.

#[path = "../common/mod.rs"]
mod common;

mod generators;
