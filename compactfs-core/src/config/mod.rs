//! Filesystem configuration
//!
//! The chip layout describes where each region lives in flash; the
//! policy tunes the self-healing behaviour of `init`. Both are supplied
//! once when the engine is created.

pub mod layout;
pub mod policy;

pub use layout::*;
pub use policy::*;
