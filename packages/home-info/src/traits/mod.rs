//! Trait seams of the library.

pub mod client;
