//! Domain entities

mod model;

pub use model::ModelDescriptor;
