//! Typed GPU streams
//!
//! Vertex, scalar, vector and index data share one allocate / upload /
//! release state machine ([`GpuStream`]) and differ only in element layout
//! and buffer binding point.

mod gpu_stream;
mod index_stream;

pub use gpu_stream::{
    locations, AttributeLayout, BufferSync, GpuStream, ScalarStream, StreamElement, VectorStream, Vertex,
    VertexStream,
};
pub use index_stream::IndexStream;
