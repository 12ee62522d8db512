//! Utility Module
//!
//! - [`interner`]: string interning for bone names
//! - [`time`]: the simulation frame clock
//!
//! # String Interning
//!
//! Bone names are compared and hashed far more often than they are printed.
//! Interned names ([`Symbol`]) compare in O(1) and hash as a single integer.
//!
//! ```rust,ignore
//! use crowd::utils::interner;
//!
//! let a = interner::intern("spine_01");
//! let b = interner::intern("spine_01");
//! assert_eq!(a, b);
//! ```

pub mod interner;
pub mod time;

pub use interner::Symbol;
pub use time::FrameClock;
