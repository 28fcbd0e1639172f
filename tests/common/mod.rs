//! Common test utilities

#![allow(dead_code)]

pub mod driver;
pub mod fixtures;

pub use driver::{SequenceDriver, Step};
pub use fixtures::*;
