/// Index (connectivity) stream: a `u32` GPU stream tagged with its primitive type

use std::ops::{Deref, DerefMut};
use crate::device::Primitive;
use super::gpu_stream::GpuStream;

/// Indices into a vertex stream plus the primitive they assemble
#[derive(Debug)]
pub struct IndexStream {
    stream: GpuStream<u32>,
    primitive: Primitive,
}

impl IndexStream {
    pub fn new(primitive: Primitive) -> Self {
        Self { stream: GpuStream::new(), primitive }
    }

    pub fn from_indices(primitive: Primitive, indices: Vec<u32>) -> Self {
        Self { stream: GpuStream::from_vec(indices), primitive }
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    /// Change the primitive type (buffer content is unaffected)
    pub fn set_primitive(&mut self, primitive: Primitive) {
        self.primitive = primitive;
    }

    /// Number of complete primitives described by the indices
    pub fn primitive_count(&self) -> usize {
        let n = self.stream.len();
        match self.primitive {
            Primitive::Points => n,
            Primitive::Lines => n / 2,
            Primitive::LineStrip => n.saturating_sub(1),
            Primitive::LineLoop => if n > 2 { n } else { n.saturating_sub(1) },
            Primitive::Triangles => n / 3,
            Primitive::TriangleStrip => n.saturating_sub(2),
        }
    }
}

impl Deref for IndexStream {
    type Target = GpuStream<u32>;

    fn deref(&self) -> &Self::Target {
        &self.stream
    }
}

impl DerefMut for IndexStream {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.stream
    }
}
