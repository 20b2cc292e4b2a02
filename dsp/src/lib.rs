#![cfg_attr(not(test), no_std)]

mod tools;
pub use tools::*;
pub mod biquad;
pub use biquad::{Biquad, Cascade, FilterError};

#[cfg(test)]
pub mod testing;
