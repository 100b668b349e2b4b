//! Domain layer for Switchboard
//!
//! Contains the value objects and entities shared by the orchestration core:
//! query categories, routing priorities, and the static model catalog entry.
//! This layer has no I/O and no async.

pub mod entities;
pub mod value_objects;

pub use entities::*;
pub use value_objects::*;
