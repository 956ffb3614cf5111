mod device;
pub use device::*;

mod vulkan_context;
pub use vulkan_context::*;
