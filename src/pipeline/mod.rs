//! Embedding pipeline: chunking, encoding policy, corpus and reference stores.

pub mod adapter;
pub mod chunk;
pub mod corpus;
pub mod reference;
pub mod types;

pub use adapter::EncodingAdapter;
pub use chunk::ChunkParams;
pub use corpus::CorpusStore;
pub use reference::ReferenceSet;
pub use types::{
    CorpusItem, OverflowPolicy, PlotData, PlotGroup, PlotPoint, ProjectedPoint, ReferenceItem,
    Row,
};
