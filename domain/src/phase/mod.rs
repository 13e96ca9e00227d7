//! Phase transition detection
//!
//! ```text
//! Contested ──(agreement > low, completions rising)──▶ Converging
//! Converging ──(agreement > high, steals quiet)──────▶ Stable
//! Stable: terminal for the epoch, the coordinator may close it
//! ```

pub mod detector;
pub mod state;

pub use detector::{PhaseDetector, PhaseWatermarks, TickSample};
pub use state::{PhaseState, PhaseTransition};
