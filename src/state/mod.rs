//! State module for tracking authentication progress
//!
//! # Components
//!
//! - `AuthState`: login state machine for one source family
//! - `AuthEvent`: observations that drive the machine
//! - `SessionStatus`: per-family tri-state kept for the run's browser context

mod auth_state;

// Re-export main types
pub use auth_state::{AuthEvent, AuthState, SessionStatus};
