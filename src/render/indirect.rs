//! GPU Indirect Drawing
//!
//! Turns the frame's draw batches into indirect draw commands against the
//! chunk atlas vertex buffer. Every batch is replayed with a single
//! `multi_draw_indirect` call.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};

use crate::render::batch::{DrawBatch, DrawSink};
use crate::render::buffer::WgpuAtlasBuffer;

/// Initial number of commands the indirect buffer can hold
const INITIAL_COMMAND_CAPACITY: usize = 1024;

/// wgpu DrawIndirect command structure (matches GPU layout)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndirect {
    /// Number of vertices to draw
    pub vertex_count: u32,
    /// Number of instances to draw (always 1 for us)
    pub instance_count: u32,
    /// First vertex in the atlas buffer
    pub first_vertex: u32,
    /// First instance to draw (always 0)
    pub first_instance: u32,
}

/// One indirect command per sub-draw of `batch`
pub fn indirect_commands(batch: &DrawBatch) -> impl Iterator<Item = DrawIndirect> + '_ {
    batch
        .iter()
        .map(|(first_vertex, vertex_count)| DrawIndirect {
            vertex_count,
            instance_count: 1,
            first_vertex,
            first_instance: 0,
        })
}

/// Collects draw batches for a frame and replays them from an indirect buffer
pub struct IndirectDrawer {
    commands: Vec<DrawIndirect>,
    batches: Vec<Range<u32>>,
    command_buffer: wgpu::Buffer,
    command_capacity: usize,
}

impl IndirectDrawer {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            commands: Vec::with_capacity(INITIAL_COMMAND_CAPACITY),
            batches: Vec::new(),
            command_buffer: Self::create_command_buffer(device, INITIAL_COMMAND_CAPACITY),
            command_capacity: INITIAL_COMMAND_CAPACITY,
        }
    }

    fn create_command_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Chunk Draw Commands Buffer"),
            size: (capacity * std::mem::size_of::<DrawIndirect>()) as u64,
            usage: wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Forget the previous frame's commands
    pub fn begin_frame(&mut self) {
        self.commands.clear();
        self.batches.clear();
    }

    pub fn commands(&self) -> &[DrawIndirect] {
        &self.commands
    }

    /// Command range of each recorded batch, in submission order
    pub fn batch_ranges(&self) -> &[Range<u32>] {
        &self.batches
    }

    /// Commands the indirect buffer currently holds
    pub fn command_capacity(&self) -> usize {
        self.command_capacity
    }

    /// Upload recorded commands, growing the indirect buffer if needed
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.commands.is_empty() {
            return;
        }
        if self.commands.len() > self.command_capacity {
            self.command_capacity = self.commands.len().next_power_of_two();
            self.command_buffer.destroy();
            self.command_buffer = Self::create_command_buffer(device, self.command_capacity);
            tracing::debug!(
                capacity = self.command_capacity,
                "Grew indirect command buffer"
            );
        }
        queue.write_buffer(
            &self.command_buffer,
            0,
            bytemuck::cast_slice(&self.commands),
        );
    }

    /// Issue one multi-draw per recorded batch. `upload` must have been called.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, atlas: &WgpuAtlasBuffer) {
        if self.commands.is_empty() {
            return;
        }
        pass.set_vertex_buffer(0, atlas.buffer().slice(..));
        let stride = std::mem::size_of::<DrawIndirect>() as u64;
        for range in &self.batches {
            pass.multi_draw_indirect(
                &self.command_buffer,
                range.start as u64 * stride,
                range.end - range.start,
            );
        }
    }
}

impl DrawSink for IndirectDrawer {
    fn multi_draw(&mut self, batch: &DrawBatch) {
        if batch.is_empty() {
            return;
        }
        let start = self.commands.len() as u32;
        self.commands.extend(indirect_commands(batch));
        self.batches.push(start..self.commands.len() as u32);
    }
}
