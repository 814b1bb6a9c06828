#![allow(dead_code)]

pub mod fixtures;
pub mod substrate;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use substrate::*;
