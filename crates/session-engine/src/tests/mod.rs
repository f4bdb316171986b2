//! Integration tests for the session engine against a mock admin API.
//!
//! - `harness.rs`      - Mock server wiring and canned admin API responses
//! - `login.rs`        - Interactive login and logout
//! - `restore.rs`      - Boot-time restore and re-verification
//! - `refresh.rs`      - Refresh-and-retry on 401, including coalescing
//! - `cancellation.rs` - Requests and refreshes racing a teardown
//! - `gate.rs`         - Route gating around the login flow
//! - `password.rs`     - Password change and reset flows

mod cancellation;
mod gate;
