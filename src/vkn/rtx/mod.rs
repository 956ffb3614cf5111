mod acceleration_structure;
pub use acceleration_structure::*;

#[cfg(test)]
pub(crate) mod mock;
