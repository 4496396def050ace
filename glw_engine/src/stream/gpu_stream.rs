/// Typed CPU array mirrored into a GPU buffer object.
///
/// A stream owns its elements, a dirty flag and the buffer handle of the
/// last upload. Synchronization is lazy: the render cycle calls `sync`
/// before drawing and the stream decides between an in-place update (same
/// length as the last upload) and a full recreation (length changed).

use std::fmt::Debug;
use bytemuck::Pod;
use glam::{Vec2, Vec3};
use crate::device::{BufferId, BufferTarget, BufferUsage, GraphicsDevice, VertexAttribute};
use crate::error::{Error, Result};
use crate::engine_err;

// ===== ELEMENT LAYOUT =====

/// One float attribute inside a stream element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeLayout {
    /// Shader attribute location
    pub location: u32,
    /// Number of f32 components
    pub components: u32,
    /// Byte offset inside the element
    pub offset: u32,
}

/// Element types a [`GpuStream`] can hold
pub trait StreamElement: Pod + Default + Debug + PartialEq {
    /// Attributes this element feeds (empty for index data)
    const LAYOUT: &'static [AttributeLayout];
    /// Buffer binding point
    const TARGET: BufferTarget;
    /// Buffer update frequency hint
    const USAGE: BufferUsage;
}

/// Attribute locations shared by every shader program
pub mod locations {
    pub const POSITION: u32 = 0;
    pub const NORMAL: u32 = 1;
    pub const TEX_COORD: u32 = 2;
    pub const SCALAR: u32 = 3;
    pub const VECTOR: u32 = 4;

    /// Attribute names bound at program link time
    pub const BINDINGS: [(&str, u32); 5] = [
        ("in_Position", POSITION),
        ("in_Normal", NORMAL),
        ("in_TexCoord", TEX_COORD),
        ("in_Scalar", SCALAR),
        ("in_Vector", VECTOR),
    ];
}

/// Position, normal and texture coordinate of one vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, tex_coord: Vec2) -> Self {
        Self { position, normal, tex_coord }
    }

    /// Vertex with only a position
    pub fn at(position: Vec3) -> Self {
        Self { position, ..Self::default() }
    }
}

impl StreamElement for Vertex {
    const LAYOUT: &'static [AttributeLayout] = &[
        AttributeLayout { location: locations::POSITION, components: 3, offset: 0 },
        AttributeLayout { location: locations::NORMAL, components: 3, offset: 12 },
        AttributeLayout { location: locations::TEX_COORD, components: 2, offset: 24 },
    ];
    const TARGET: BufferTarget = BufferTarget::Vertex;
    const USAGE: BufferUsage = BufferUsage::Dynamic;
}

impl StreamElement for f32 {
    const LAYOUT: &'static [AttributeLayout] = &[
        AttributeLayout { location: locations::SCALAR, components: 1, offset: 0 },
    ];
    const TARGET: BufferTarget = BufferTarget::Vertex;
    const USAGE: BufferUsage = BufferUsage::Dynamic;
}

impl StreamElement for Vec3 {
    const LAYOUT: &'static [AttributeLayout] = &[
        AttributeLayout { location: locations::VECTOR, components: 3, offset: 0 },
    ];
    const TARGET: BufferTarget = BufferTarget::Vertex;
    const USAGE: BufferUsage = BufferUsage::Dynamic;
}

impl StreamElement for u32 {
    const LAYOUT: &'static [AttributeLayout] = &[];
    const TARGET: BufferTarget = BufferTarget::Index;
    const USAGE: BufferUsage = BufferUsage::Static;
}

// ===== GPU STREAM =====

/// What `GpuStream::update_buffer` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSync {
    /// Stream empty, nothing uploaded
    Skipped,
    /// Existing buffer overwritten in place
    Updated,
    /// Buffer (re)created with the current length
    Created,
}

/// CPU array plus the GPU buffer it is mirrored into
#[derive(Debug)]
pub struct GpuStream<T: StreamElement> {
    data: Vec<T>,
    dirty: bool,
    buffer: Option<BufferId>,
    uploaded_len: usize,
}

/// Positions, normals and texture coordinates
pub type VertexStream = GpuStream<Vertex>;

/// One float per vertex (iso-lines, color maps)
pub type ScalarStream = GpuStream<f32>;

/// One 3-vector per vertex
pub type VectorStream = GpuStream<Vec3>;

impl<T: StreamElement> GpuStream<T> {
    pub fn new() -> Self {
        Self { data: Vec::new(), dirty: false, buffer: None, uploaded_len: 0 }
    }

    /// Stream initialized with `data`, dirty until the first upload
    pub fn from_vec(data: Vec<T>) -> Self {
        Self { data, dirty: true, buffer: None, uploaded_len: 0 }
    }

    /// Resize to `len` elements, keeping the first `min(old, len)` ones
    pub fn alloc(&mut self, len: usize) {
        self.data.resize(len, T::default());
        self.dirty = true;
    }

    /// Replace the whole content
    pub fn set_data(&mut self, data: Vec<T>) {
        self.data = data;
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable access to every element; marks the stream dirty
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.dirty = true;
        &mut self.data
    }

    /// Bounds-checked element access
    pub fn get(&self, index: usize) -> Result<&T> {
        let length = self.data.len();
        self.data
            .get(index)
            .ok_or_else(|| engine_err!("glw::Stream", error = Error::IndexError { index, length }))
    }

    /// Bounds-checked mutable element access; marks the stream dirty
    pub fn get_mut(&mut self, index: usize) -> Result<&mut T> {
        let length = self.data.len();
        match self.data.get_mut(index) {
            Some(element) => {
                self.dirty = true;
                Ok(element)
            }
            None => Err(engine_err!("glw::Stream", error = Error::IndexError { index, length })),
        }
    }

    /// Overwrite one element
    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        *self.get_mut(index)? = value;
        Ok(())
    }

    /// Legacy access: out-of-range reads are logged and fall back to the
    /// first element (`None` only when the stream is empty)
    pub fn element_or_first(&self, index: usize) -> Option<&T> {
        self.get(index).ok().or_else(|| self.data.first())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Request a re-upload at the next synchronization
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Buffer of the last upload
    pub fn buffer(&self) -> Option<&BufferId> {
        self.buffer.as_ref()
    }

    /// Element count of the last upload
    pub fn uploaded_len(&self) -> usize {
        self.uploaded_len
    }

    /// Whether the next synchronization has work to do
    pub fn needs_sync(&self) -> bool {
        !self.data.is_empty() && (self.buffer.is_none() || self.dirty)
    }

    /// Upload the CPU content
    ///
    /// No-op on an empty stream. Recreates the buffer when the length
    /// differs from the last upload, otherwise updates it in place.
    pub fn update_buffer(&mut self, device: &mut dyn GraphicsDevice) -> Result<BufferSync> {
        if self.data.is_empty() {
            return Ok(BufferSync::Skipped);
        }

        let bytes: &[u8] = bytemuck::cast_slice(&self.data);
        let sync = match &self.buffer {
            Some(buffer) if self.uploaded_len == self.data.len() => {
                device.update_buffer(buffer, 0, bytes)?;
                BufferSync::Updated
            }
            _ => {
                if let Some(old) = self.buffer.take() {
                    device.delete_buffer(old);
                }
                self.uploaded_len = 0;
                let buffer = device.create_buffer(T::TARGET, T::USAGE, bytes)?;
                self.buffer = Some(buffer);
                self.uploaded_len = self.data.len();
                BufferSync::Created
            }
        };
        self.dirty = false;
        Ok(sync)
    }

    /// Upload only if the buffer is missing or the content changed
    pub fn sync(&mut self, device: &mut dyn GraphicsDevice) -> Result<BufferSync> {
        if self.needs_sync() {
            self.update_buffer(device)
        } else {
            Ok(BufferSync::Skipped)
        }
    }

    /// Release the GPU buffer; the next sync recreates it
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(buffer) = self.buffer.take() {
            device.delete_buffer(buffer);
        }
        self.uploaded_len = 0;
    }

    /// Detach the GPU buffer without deleting it (the caller owns the release)
    pub(crate) fn take_buffer(&mut self) -> Option<BufferId> {
        self.uploaded_len = 0;
        self.dirty = true;
        self.buffer.take()
    }

    /// Attribute bindings of this stream's buffer, empty before the first upload
    pub fn attributes(&self) -> Vec<VertexAttribute<'_>> {
        let Some(buffer) = self.buffer.as_ref() else {
            return Vec::new();
        };
        let stride = std::mem::size_of::<T>() as u32;
        T::LAYOUT
            .iter()
            .map(|layout| VertexAttribute {
                location: layout.location,
                buffer,
                components: layout.components,
                stride,
                offset: layout.offset,
            })
            .collect()
    }
}

impl<T: StreamElement> Default for GpuStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuStream<Vertex> {
    /// Vertex stream built from bare positions
    pub fn from_positions(positions: &[Vec3]) -> Self {
        Self::from_vec(positions.iter().map(|p| Vertex::at(*p)).collect())
    }

    /// Remap texture coordinates onto one cell of a texture mosaic
    ///
    /// The mosaic has `rows` x `cols` equal cells; cell `(row, col)` maps
    /// `uv` to `((col + u) / cols, (row + v) / rows)`.
    pub fn texture_slab(&mut self, row: u32, col: u32, rows: u32, cols: u32) {
        if rows == 0 || cols == 0 {
            return;
        }
        let (rows, cols) = (rows as f32, cols as f32);
        for vertex in self.as_mut_slice() {
            vertex.tex_coord = Vec2::new(
                (col as f32 + vertex.tex_coord.x) / cols,
                (row as f32 + vertex.tex_coord.y) / rows,
            );
        }
    }
}

#[cfg(test)]
#[path = "gpu_stream_tests.rs"]
mod tests;
