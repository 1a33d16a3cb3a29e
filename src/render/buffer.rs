//! Storage behind the chunk atlas.
//!
//! The atlas only needs three things from its storage: a capacity, a way to
//! throw the contents away for a larger allocation, and float writes at an
//! offset. `WgpuAtlasBuffer` is the GPU version, `CpuAtlasBuffer` mirrors it in
//! memory for headless runs and tests.

use crate::constants::BYTES_PER_FLOAT;

pub trait AtlasBuffer {
    fn capacity_bytes(&self) -> u64;

    /// Replaces the storage with a new allocation of `capacity_bytes`.
    /// Previous contents are discarded.
    fn reallocate(&mut self, capacity_bytes: u64);

    fn write(&mut self, offset_floats: usize, data: &[f32]);
}

/// In-memory atlas storage.
#[derive(Debug, Default, Clone)]
pub struct CpuAtlasBuffer {
    data: Vec<f32>,
    writes: u64,
}

impl CpuAtlasBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, offset_floats: usize, len_floats: usize) -> &[f32] {
        &self.data[offset_floats..offset_floats + len_floats]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Number of `write` calls since creation.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl AtlasBuffer for CpuAtlasBuffer {
    fn capacity_bytes(&self) -> u64 {
        self.data.len() as u64 * BYTES_PER_FLOAT
    }

    fn reallocate(&mut self, capacity_bytes: u64) {
        self.data = vec![0.0; (capacity_bytes / BYTES_PER_FLOAT) as usize];
    }

    fn write(&mut self, offset_floats: usize, data: &[f32]) {
        self.data[offset_floats..offset_floats + data.len()].copy_from_slice(data);
        self.writes += 1;
    }
}

/// Atlas storage in a single `wgpu::Buffer` bound as the chunk vertex buffer.
pub struct WgpuAtlasBuffer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffer: wgpu::Buffer,
    capacity_bytes: u64,
}

impl WgpuAtlasBuffer {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let buffer = Self::create_buffer(device, wgpu::COPY_BUFFER_ALIGNMENT);
        Self {
            device: device.clone(),
            queue: queue.clone(),
            buffer,
            capacity_bytes: wgpu::COPY_BUFFER_ALIGNMENT,
        }
    }

    fn create_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Chunk Atlas Vertex Buffer"),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

impl AtlasBuffer for WgpuAtlasBuffer {
    fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    fn reallocate(&mut self, capacity_bytes: u64) {
        let size = capacity_bytes.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        self.buffer.destroy();
        self.buffer = Self::create_buffer(&self.device, size);
        self.capacity_bytes = size;
    }

    fn write(&mut self, offset_floats: usize, data: &[f32]) {
        if data.is_empty() {
            return;
        }
        self.queue.write_buffer(
            &self.buffer,
            offset_floats as u64 * BYTES_PER_FLOAT,
            bytemuck::cast_slice(data),
        );
    }
}
