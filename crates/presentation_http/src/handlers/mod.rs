//! Request handlers

pub mod query;
pub mod system;
