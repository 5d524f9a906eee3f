//! Data types for the home-info library.

pub mod address;
pub mod discovery;
pub mod property;
pub mod request;
pub mod source;
