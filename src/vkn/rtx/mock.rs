//! In-memory stand-ins for the device and allocator, used by unit tests.

use crate::vkn::{
    AccelError, Buffer, BufferUsage, MemoryAllocator, MemoryBlock, RayTracingDevice,
    VulkanContext,
};
use ash::{
    prelude::VkResult,
    vk::{self, Handle},
};
use gpu_allocator::MemoryLocation;
use std::{
    collections::HashMap,
    ffi::c_void,
    ptr::NonNull,
    sync::{Arc, Mutex, MutexGuard},
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone)]
pub struct MockStructure {
    pub ty: vk::AccelerationStructureTypeNV,
    pub flags: vk::BuildAccelerationStructureFlagsNV,
    pub instance_count: u32,
    pub geometry_count: u32,
    pub bound_memory: Option<vk::DeviceMemory>,
}

struct MockDeviceState {
    next_handle: u64,
    structures: HashMap<vk::AccelerationStructureNV, MockStructure>,
    buffers: HashMap<vk::Buffer, vk::DeviceSize>,
    // object, build scratch, update scratch
    memory_sizes: [vk::DeviceSize; 3],
    failures: HashMap<&'static str, vk::Result>,
}

pub struct MockDevice {
    ray_tracing: bool,
    state: Mutex<MockDeviceState>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            ray_tracing: true,
            state: Mutex::new(MockDeviceState {
                next_handle: 1,
                structures: HashMap::new(),
                buffers: HashMap::new(),
                memory_sizes: [65536, 16384, 8192],
                failures: HashMap::new(),
            }),
        }
    }

    pub fn without_ray_tracing() -> Self {
        Self {
            ray_tracing: false,
            ..Self::new()
        }
    }

    fn state(&self) -> MutexGuard<MockDeviceState> {
        self.state.lock().unwrap()
    }

    pub fn set_memory_sizes(&self, object: u64, build: u64, update: u64) {
        self.state().memory_sizes = [object, build, update];
    }

    /// Makes the next call to the named entry point fail with `result`.
    pub fn fail_next(&self, call: &'static str, result: vk::Result) {
        self.state().failures.insert(call, result);
    }

    fn check(&self, call: &'static str) -> VkResult<()> {
        match self.state().failures.remove(call) {
            Some(result) => Err(result),
            None => Ok(()),
        }
    }

    pub fn structure(&self, acc: vk::AccelerationStructureNV) -> Option<MockStructure> {
        self.state().structures.get(&acc).cloned()
    }

    pub fn bound_memory(&self, acc: vk::AccelerationStructureNV) -> Option<vk::DeviceMemory> {
        self.structure(acc).and_then(|s| s.bound_memory)
    }

    pub fn live_structures(&self) -> usize {
        self.state().structures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.state().buffers.len()
    }

    fn next_handle(&self) -> u64 {
        let mut state = self.state();
        let handle = state.next_handle;
        state.next_handle += 1;
        handle
    }
}

impl RayTracingDevice for MockDevice {
    fn ray_tracing_supported(&self) -> bool {
        self.ray_tracing
    }

    fn create_acceleration_structure(
        &self,
        create_info: &vk::AccelerationStructureCreateInfoNV,
    ) -> VkResult<vk::AccelerationStructureNV> {
        assert!(self.ray_tracing);
        self.check("vkCreateAccelerationStructureNV")?;
        let acc = vk::AccelerationStructureNV::from_raw(self.next_handle());
        let info = &create_info.info;
        self.state().structures.insert(
            acc,
            MockStructure {
                ty: info.ty,
                flags: info.flags,
                instance_count: info.instance_count,
                geometry_count: info.geometry_count,
                bound_memory: None,
            },
        );
        Ok(acc)
    }

    fn destroy_acceleration_structure(&self, accel_struct: vk::AccelerationStructureNV) {
        let removed = self.state().structures.remove(&accel_struct);
        assert!(removed.is_some(), "double destroy of {accel_struct:?}");
    }

    fn acceleration_structure_memory_requirements(
        &self,
        accel_struct: vk::AccelerationStructureNV,
        ty: vk::AccelerationStructureMemoryRequirementsTypeNV,
    ) -> VkResult<vk::MemoryRequirements> {
        self.check("vkGetAccelerationStructureMemoryRequirementsNV")?;
        let state = self.state();
        assert!(state.structures.contains_key(&accel_struct));
        let size = match ty {
            vk::AccelerationStructureMemoryRequirementsTypeNV::OBJECT => state.memory_sizes[0],
            vk::AccelerationStructureMemoryRequirementsTypeNV::BUILD_SCRATCH => {
                state.memory_sizes[1]
            }
            vk::AccelerationStructureMemoryRequirementsTypeNV::UPDATE_SCRATCH => {
                state.memory_sizes[2]
            }
            _ => unreachable!("unknown requirement type {ty:?}"),
        };
        Ok(vk::MemoryRequirements {
            size,
            alignment: 256,
            memory_type_bits: !0,
        })
    }

    fn bind_acceleration_structure_memory(
        &self,
        bind_info: &vk::BindAccelerationStructureMemoryInfoNV,
    ) -> VkResult<()> {
        self.check("vkBindAccelerationStructureMemoryNV")?;
        let mut state = self.state();
        let structure = state
            .structures
            .get_mut(&bind_info.acceleration_structure)
            .expect("bind of unknown structure");
        assert!(structure.bound_memory.is_none(), "structure bound twice");
        structure.bound_memory = Some(bind_info.memory);
        Ok(())
    }

    fn acceleration_structure_handle(
        &self,
        accel_struct: vk::AccelerationStructureNV,
    ) -> VkResult<u64> {
        self.check("vkGetAccelerationStructureHandleNV")?;
        let state = self.state();
        let structure = state
            .structures
            .get(&accel_struct)
            .expect("handle of unknown structure");
        assert!(structure.bound_memory.is_some(), "handle fetched before bind");
        Ok(0xacc0_0000 + accel_struct.as_raw())
    }

    fn create_buffer(&self, create_info: &vk::BufferCreateInfo) -> VkResult<vk::Buffer> {
        self.check("vkCreateBuffer")?;
        let buffer = vk::Buffer::from_raw(self.next_handle());
        self.state().buffers.insert(buffer, create_info.size);
        Ok(buffer)
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        let size = self.state().buffers[&buffer];
        vk::MemoryRequirements {
            size,
            alignment: 16,
            memory_type_bits: !0,
        }
    }

    fn bind_buffer_memory(
        &self,
        buffer: vk::Buffer,
        _memory: vk::DeviceMemory,
        _offset: vk::DeviceSize,
    ) -> VkResult<()> {
        self.check("vkBindBufferMemory")?;
        assert!(self.state().buffers.contains_key(&buffer));
        Ok(())
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        let removed = self.state().buffers.remove(&buffer);
        assert!(removed.is_some(), "double destroy of {buffer:?}");
    }
}

struct MockAllocatorState {
    next_id: u64,
    // host backing of mapped allocations, `u64` keeps it 8 byte aligned
    live: HashMap<u64, Option<Vec<u64>>>,
    total_allocations: usize,
    // allocations left before one reports null memory
    null_memory_in: Option<usize>,
}

pub struct MockAllocator {
    state: Mutex<MockAllocatorState>,
}

impl MockAllocator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockAllocatorState {
                next_id: 1,
                live: HashMap::new(),
                total_allocations: 0,
                null_memory_in: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<MockAllocatorState> {
        self.state.lock().unwrap()
    }

    /// The next allocation reports a null `vk::DeviceMemory`.
    pub fn null_memory_for_next(&self) {
        self.null_memory_after(0);
    }

    /// Lets `skip` allocations succeed, then reports null memory once.
    pub fn null_memory_after(&self, skip: usize) {
        self.state().null_memory_in = Some(skip);
    }

    pub fn live_allocations(&self) -> usize {
        self.state().live.len()
    }

    pub fn total_allocations(&self) -> usize {
        self.state().total_allocations
    }
}

impl MemoryAllocator for MockAllocator {
    fn allocate(
        &self,
        _name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
    ) -> Result<MemoryBlock, AccelError> {
        // gpu-allocator refuses empty allocations
        if requirements.size == 0 {
            return Err(gpu_allocator::AllocationError::InvalidAllocationCreateDesc.into());
        }

        let mut state = self.state();
        let id = state.next_id;
        state.next_id += 1;
        state.total_allocations += 1;

        let memory = match state.null_memory_in.take() {
            Some(0) => vk::DeviceMemory::null(),
            left => {
                state.null_memory_in = left.map(|n| n - 1);
                vk::DeviceMemory::from_raw(0x1000 + id)
            }
        };

        let mut backing = match location {
            MemoryLocation::GpuOnly => None,
            _ => Some(vec![0u64; (requirements.size as usize).div_ceil(8)]),
        };
        let mapped_ptr = backing
            .as_mut()
            .and_then(|host| NonNull::new(host.as_mut_ptr().cast::<c_void>()));
        state.live.insert(id, backing);

        // the backing vector lives in `live` until the block is freed
        Ok(unsafe {
            MemoryBlock::new(
                id,
                memory,
                id * requirements.alignment.max(1),
                requirements.size,
                mapped_ptr,
            )
        })
    }

    fn free(&self, block: MemoryBlock) -> Result<(), AccelError> {
        let removed = self.state().live.remove(&block.id());
        assert!(removed.is_some(), "double free of block {}", block.id());
        Ok(())
    }
}

/// A [`VulkanContext`] over the mocks, with the mocks kept at hand.
pub struct MockContext {
    pub device: Arc<MockDevice>,
    pub allocator: Arc<MockAllocator>,
    pub ctx: VulkanContext,
}

impl MockContext {
    pub fn new() -> Self {
        Self::with_device(MockDevice::new())
    }

    pub fn with_device(device: MockDevice) -> Self {
        init_logger();
        let device = Arc::new(device);
        let allocator = Arc::new(MockAllocator::new());
        let ctx = VulkanContext::new(device.clone(), allocator.clone());
        Self {
            device,
            allocator,
            ctx,
        }
    }

    fn host_buffer<T: Copy>(&self, data: &[T]) -> Buffer {
        let buffer = Buffer::new_sized(
            &self.ctx,
            BufferUsage::geometry_input(),
            MemoryLocation::CpuToGpu,
            std::mem::size_of_val(data) as vk::DeviceSize,
        )
        .unwrap();
        buffer.fill(data).unwrap();
        buffer
    }

    pub fn vertex_buffer<T: Copy>(&self, vertices: &[T]) -> Buffer {
        self.host_buffer(vertices)
    }

    pub fn index_buffer<T: Copy>(&self, indices: &[T]) -> Buffer {
        self.host_buffer(indices)
    }
}
