//! OpenSCAD integration: an isolated-per-call compiler adapter that turns
//! source text into binary STL, and a small software rasterizer that renders
//! the compiled mesh into PNG snapshots for visual verification.

pub mod compiler;
pub mod connector;
pub mod error;
pub mod snapshot;
pub mod stl;

pub use compiler::OpenScadCompiler;
pub use error::{Error, Result};
pub use snapshot::SnapshotRenderer;
