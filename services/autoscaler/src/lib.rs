//! Adaptive horizontal autoscaler service.
//!
//! Wires the control algorithms from `hpa-core` into three periodic loops
//! sharing per-field guarded state. The binary in `main.rs` is a thin
//! wrapper; everything testable lives here.

pub mod controller;

pub use controller::{Autoscaler, ControlState};
