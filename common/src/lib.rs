//! Snapworth Common Types
//!
//! This crate contains shared types used across the Snapworth rate services,
//! including currency codes, currency pairs, monetary amounts and timing
//! constants.

pub mod monetary;
pub mod error;
pub mod time;

pub use monetary::*;
pub use error::*;
pub use time::*;
