mod error;
pub use error::*;

mod context;
pub use context::*;

mod allocator;
pub use allocator::*;

mod memory;
pub use memory::*;

pub mod rtx;
