#![allow(dead_code)]

pub mod agents;
pub mod fixtures;

pub use agents::*;
pub use fixtures::*;
