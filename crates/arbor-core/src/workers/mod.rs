//! Built-in workers.
//!
//! - **Timers** ([`Every`], [`After`]) -- repeating and one-shot timers.

mod timer;

pub use timer::*;
