#![allow(dead_code)]

pub mod fixtures;
pub mod invokers;

pub use fixtures::*;
pub use invokers::*;
