mod accel_struct;
mod container;
mod desc;
mod geometry;
mod instance;
mod scratch;
mod transform;

pub use container::*;
pub use desc::*;
pub use geometry::*;
pub use instance::*;
pub use scratch::*;
pub use transform::*;
