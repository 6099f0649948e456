//! Embed a text corpus with a local sentence encoder and project it to 2D/3D.
//!
//! Scatterbrain keeps one in-memory session per process. Rows are embedded
//! (optionally chunked and averaged when longer than the model context),
//! accumulated into a corpus, projected with a neighbor-graph method, and
//! grouped into plot data for a browser client. A separate labelled reference
//! set supports nearest-label classification of free text.
//!
//! # Modules
//!
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`embedding`]: encoder contracts, the local ONNX encoder and model downloads
//! - [`pipeline`]: chunking, encoding policy, corpus store and reference matcher
//! - [`projection`]: batch reduction to 2 or 3 dimensions
//! - [`plot`]: grouping, label wrapping and colors for the scatter plot
//! - [`session`]: the session object and its operations
//! - [`server`]: HTTP routes over a shared session

pub mod config;
pub mod embedding;
pub mod error;
pub mod pipeline;
pub mod plot;
pub mod projection;
pub mod server;
pub mod session;

pub use error::{ErrorKind, PipelineError};
pub use session::Session;
