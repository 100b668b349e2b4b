//! Value objects

mod category;
mod priority;

pub use category::ModelCategory;
pub use priority::Priority;
