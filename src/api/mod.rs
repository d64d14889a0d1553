//! API endpoint handlers module

pub mod proxy;
