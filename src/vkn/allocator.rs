use super::AccelError;
use ash::vk;
use gpu_allocator::{
    vulkan::{
        Allocation, AllocationCreateDesc, AllocationScheme, Allocator as GpuAllocator,
        AllocatorCreateDesc,
    },
    AllocationSizes, AllocatorDebugSettings, MemoryLocation,
};
use std::{
    collections::HashMap,
    ffi::c_void,
    ptr::NonNull,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// A region of device memory handed out by a [`MemoryAllocator`].
///
/// The block does not own the `vk::DeviceMemory` it lives in, that heap belongs
/// to the allocator. It must be handed back through [`MemoryAllocator::free`].
#[derive(Debug)]
pub struct MemoryBlock {
    id: u64,
    memory: vk::DeviceMemory,
    offset: vk::DeviceSize,
    size: vk::DeviceSize,
    mapped_ptr: Option<NonNull<c_void>>,
}

// the mapped pointer stays valid until the block is freed
unsafe impl Send for MemoryBlock {}
unsafe impl Sync for MemoryBlock {}

impl MemoryBlock {
    /// # Safety
    ///
    /// When `mapped_ptr` is set it must point to at least `size` bytes of host
    /// memory that stay mapped until the block is handed back to its allocator.
    pub unsafe fn new(
        id: u64,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
        mapped_ptr: Option<NonNull<c_void>>,
    ) -> Self {
        Self {
            id,
            memory,
            offset,
            size,
            mapped_ptr,
        }
    }

    /// Allocator-defined key of this block.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The heap this block lives in.
    pub fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }

    pub fn offset(&self) -> vk::DeviceSize {
        self.offset
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    pub fn mapped_ptr(&self) -> Option<NonNull<c_void>> {
        self.mapped_ptr
    }

    fn check_bounds(&self, requested: vk::DeviceSize) -> Result<(), AccelError> {
        if requested > self.size {
            return Err(AccelError::OutOfBounds {
                requested,
                available: self.size,
            });
        }
        Ok(())
    }

    /// Copies `data` to the start of the mapped region.
    pub fn write<T: Copy>(&self, data: &[T]) -> Result<(), AccelError> {
        let ptr = self.mapped_ptr.ok_or(AccelError::MemoryNotMapped)?;
        let size = std::mem::size_of_val(data) as vk::DeviceSize;
        self.check_bounds(size)?;
        unsafe {
            let mut align = ash::util::Align::new(
                ptr.as_ptr(),
                std::mem::align_of::<T>() as vk::DeviceSize,
                size,
            );
            align.copy_from_slice(data);
        }
        Ok(())
    }

    /// Reads `len` bytes from the start of the mapped region.
    pub fn read(&self, len: usize) -> Result<Vec<u8>, AccelError> {
        let ptr = self.mapped_ptr.ok_or(AccelError::MemoryNotMapped)?;
        self.check_bounds(len as vk::DeviceSize)?;
        let mut data = vec![0u8; len];
        unsafe {
            let mapped = std::slice::from_raw_parts(ptr.as_ptr().cast::<u8>(), len);
            data.copy_from_slice(mapped);
        }
        Ok(data)
    }
}

/// Device-wide memory allocator shared by every container.
///
/// Implementations serialize access internally, callers take no locks.
pub trait MemoryAllocator: Send + Sync {
    /// Allocates memory satisfying `requirements`. Host visible locations must
    /// come back with a mapped pointer.
    fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
    ) -> Result<MemoryBlock, AccelError>;

    fn free(&self, block: MemoryBlock) -> Result<(), AccelError>;
}

/// Debug switches forwarded to `gpu-allocator`.
#[derive(Debug, Clone, Copy)]
pub struct AllocatorDesc {
    pub log_leaks_on_shutdown: bool,
    pub log_allocations: bool,
    pub log_frees: bool,
}

impl Default for AllocatorDesc {
    fn default() -> Self {
        Self {
            log_leaks_on_shutdown: true,
            log_allocations: false,
            log_frees: false,
        }
    }
}

impl AllocatorDesc {
    fn debug_settings(&self) -> AllocatorDebugSettings {
        AllocatorDebugSettings {
            log_leaks_on_shutdown: self.log_leaks_on_shutdown,
            log_allocations: self.log_allocations,
            log_frees: self.log_frees,
            ..Default::default()
        }
    }
}

struct AllocatorState {
    allocator: GpuAllocator,
    allocations: HashMap<u64, Allocation>,
    next_id: u64,
}

/// [`MemoryAllocator`] backed by `gpu-allocator`.
#[derive(Clone)]
pub struct Allocator {
    state: Arc<Mutex<AllocatorState>>,
}

impl Allocator {
    pub fn new(
        instance: &ash::Instance,
        device: &ash::Device,
        physical_device: vk::PhysicalDevice,
        desc: &AllocatorDesc,
    ) -> Result<Self, AccelError> {
        let allocator = GpuAllocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: desc.debug_settings(),
            buffer_device_address: false,
            allocation_sizes: AllocationSizes::default(),
        })?;

        Ok(Self {
            state: Arc::new(Mutex::new(AllocatorState {
                allocator,
                allocations: HashMap::new(),
                next_id: 1,
            })),
        })
    }

    fn get_state(&self) -> MutexGuard<AllocatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MemoryAllocator for Allocator {
    fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
    ) -> Result<MemoryBlock, AccelError> {
        let mut state = self.get_state();

        let allocation = state.allocator.allocate(&AllocationCreateDesc {
            name,
            requirements,
            location,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;

        let id = state.next_id;
        state.next_id += 1;

        // gpu-allocator keeps the mapping alive as long as the allocation
        let block = unsafe {
            MemoryBlock::new(
                id,
                allocation.memory(),
                allocation.offset(),
                allocation.size(),
                allocation.mapped_ptr(),
            )
        };
        state.allocations.insert(id, allocation);
        Ok(block)
    }

    fn free(&self, block: MemoryBlock) -> Result<(), AccelError> {
        let mut state = self.get_state();
        match state.allocations.remove(&block.id) {
            Some(allocation) => Ok(state.allocator.free(allocation)?),
            None => {
                log::warn!("Freeing unknown memory block {}", block.id);
                Ok(())
            }
        }
    }
}
