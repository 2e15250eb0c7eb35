//! # coedit Core
//!
//! Document model and operational-transform engine for collaborative block
//! documents.
//!
//! This crate provides:
//! - The block/run document model with normalized styled text
//! - The closed union of edit operations and a pure, total `apply`
//! - Pairwise operation transforms and server-side history rebasing
//!
//! Everything here is pure and synchronous; transport, persistence, and the
//! reconciliation state machines live in the sibling crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod apply;
pub mod document;
pub mod operation;
pub mod transform;

pub use apply::{apply, apply_all};
pub use document::{
    normalize_runs, Alignment, Block, BlockId, BlockType, Document, LineSpacing, Position, Range,
    TableCell, TableData, TextRun, TextStyle, MAX_INDENT, NO_BLOCK,
};
pub use operation::{Operation, NO_ANCHOR};
pub use transform::{transform_against_history, transform_pair, transform_single};
