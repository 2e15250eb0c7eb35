//! The closed union of user-intent-level edit operations.
//!
//! Every edit a client can make is one of these kinds; the transform engine
//! covers every ordered pair of them. Operations address blocks by index
//! into the document they were created against; rebasing those addresses
//! across concurrent edits is [`crate::transform`]'s job.

use crate::document::{
    Alignment, BlockType, LineSpacing, Position, Range, TableData, TextStyle, NO_BLOCK,
};
use serde::{Deserialize, Serialize};

/// Sentinel anchor for an `insert_block` whose gap no longer exists.
///
/// The block-index analogue of [`NO_BLOCK`]: transforms rebase an
/// `insert_block` onto this anchor when the gap it addressed was swallowed
/// by a concurrent multi-block deletion, and `apply` treats it as a no-op.
pub const NO_ANCHOR: i64 = i64::MIN;

/// An atomic document edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Insert text at a position, inheriting the style at the insertion
    /// point.
    InsertText {
        /// Where the text goes
        position: Position,
        /// The inserted text
        text: String,
    },
    /// Delete the text inside a range; a multi-block range merges the span
    /// into its first block.
    DeleteText {
        /// The span to remove
        range: Range,
    },
    /// Set the named style fields on every run inside the range.
    ApplyFormatting {
        /// The span to restyle
        range: Range,
        /// Fields to set (unset fields are untouched)
        style: TextStyle,
    },
    /// Clear the style fields named by truthy/non-empty values.
    RemoveFormatting {
        /// The span to restyle
        range: Range,
        /// Fields to clear
        style: TextStyle,
    },
    /// Split a block in two at a position. The tail becomes a new paragraph
    /// inheriting alignment and line spacing.
    SplitBlock {
        /// The split point
        position: Position,
    },
    /// Merge block `block_index` into the block before it, which keeps its
    /// own attributes.
    MergeBlock {
        /// The absorbed block
        block_index: usize,
        /// Text length of the merge target when the operation was created.
        /// `apply` ignores this; the transform engine uses it to rebase
        /// positions from the absorbed block into the merged one, exactly
        /// as `split_block` uses its offset in the other direction.
        join_offset: usize,
    },
    /// Change a block's type.
    ChangeBlockType {
        /// The addressed block
        block_index: usize,
        /// The new type
        new_type: BlockType,
    },
    /// Change a block's alignment.
    ChangeBlockAlignment {
        /// The addressed block
        block_index: usize,
        /// The new alignment
        new_alignment: Alignment,
    },
    /// Insert a new empty block after the given index (`-1` inserts at the
    /// front; out-of-range anchors are clamped).
    InsertBlock {
        /// The block to insert after
        after_block_index: i64,
        /// The kind of the new block
        block_type: BlockType,
    },
    /// Delete a block. Deleting the only block converts it to an empty
    /// paragraph instead.
    DeleteBlock {
        /// The addressed block
        block_index: usize,
    },
    /// Set a block's indent level (clamped to `0..=MAX_INDENT`).
    SetIndent {
        /// The addressed block
        block_index: usize,
        /// The new indent level
        indent_level: u8,
    },
    /// Set a block's line spacing.
    SetLineSpacing {
        /// The addressed block
        block_index: usize,
        /// The new spacing
        line_spacing: LineSpacing,
    },
    /// Set an image block's URL.
    SetImage {
        /// The addressed block
        block_index: usize,
        /// The new image URL
        image_url: String,
    },
    /// Replace a table block's grid.
    SetTableData {
        /// The addressed block
        block_index: usize,
        /// The new grid
        table_data: TableData,
    },
}

impl Operation {
    /// Insert `text` at `(block_index, offset)`.
    #[must_use]
    pub fn insert_text(block_index: usize, offset: usize, text: impl Into<String>) -> Self {
        Self::InsertText {
            position: Position::new(block_index, offset),
            text: text.into(),
        }
    }

    /// Delete the given range.
    #[must_use]
    pub fn delete_text(range: Range) -> Self {
        Self::DeleteText { range }
    }

    /// Set style fields over a range.
    #[must_use]
    pub fn apply_formatting(range: Range, style: TextStyle) -> Self {
        Self::ApplyFormatting { range, style }
    }

    /// Clear named style fields over a range.
    #[must_use]
    pub fn remove_formatting(range: Range, style: TextStyle) -> Self {
        Self::RemoveFormatting { range, style }
    }

    /// Split the block at `(block_index, offset)`.
    #[must_use]
    pub fn split_block(block_index: usize, offset: usize) -> Self {
        Self::SplitBlock {
            position: Position::new(block_index, offset),
        }
    }

    /// Merge `block_index` into the block before it. `join_offset` is the
    /// current text length of that preceding block.
    #[must_use]
    pub fn merge_block(block_index: usize, join_offset: usize) -> Self {
        Self::MergeBlock {
            block_index,
            join_offset,
        }
    }

    /// Insert a block of `block_type` after `after_block_index`.
    #[must_use]
    pub fn insert_block(after_block_index: i64, block_type: BlockType) -> Self {
        Self::InsertBlock {
            after_block_index,
            block_type,
        }
    }

    /// Delete the block at `block_index`.
    #[must_use]
    pub fn delete_block(block_index: usize) -> Self {
        Self::DeleteBlock { block_index }
    }

    /// Whether this operation can no longer change any document.
    ///
    /// Transforms rebase operations whose target vanished into these
    /// degenerate forms instead of erroring; `apply` treats them as no-ops.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        match self {
            Self::InsertText { position, text } => {
                text.is_empty() || position.block_index == NO_BLOCK
            }
            Self::DeleteText { range }
            | Self::ApplyFormatting { range, .. }
            | Self::RemoveFormatting { range, .. } => {
                range.is_empty() || range.start.block_index == NO_BLOCK
            }
            Self::SplitBlock { position } => position.block_index == NO_BLOCK,
            Self::MergeBlock { block_index, .. } => {
                *block_index == 0 || *block_index == NO_BLOCK
            }
            Self::ChangeBlockType { block_index, .. }
            | Self::ChangeBlockAlignment { block_index, .. }
            | Self::DeleteBlock { block_index }
            | Self::SetIndent { block_index, .. }
            | Self::SetLineSpacing { block_index, .. }
            | Self::SetImage { block_index, .. }
            | Self::SetTableData { block_index, .. } => *block_index == NO_BLOCK,
            Self::InsertBlock {
                after_block_index, ..
            } => *after_block_index == NO_ANCHOR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_tag_by_snake_case_kind() {
        let op = Operation::insert_text(0, 5, "!");
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], "insert_text");
        assert_eq!(json["position"]["block_index"], 0);

        let op = Operation::merge_block(2, 7);
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], "merge_block");
        assert_eq!(json["join_offset"], 7);
    }

    #[test]
    fn wire_roundtrip_preserves_every_kind() {
        let ops = vec![
            Operation::insert_text(0, 0, "a"),
            Operation::delete_text(Range::in_block(0, 1, 3)),
            Operation::apply_formatting(
                Range::in_block(0, 0, 2),
                TextStyle {
                    bold: Some(true),
                    ..TextStyle::default()
                },
            ),
            Operation::split_block(1, 4),
            Operation::merge_block(1, 5),
            Operation::insert_block(-1, BlockType::Table),
            Operation::delete_block(3),
            Operation::SetLineSpacing {
                block_index: 0,
                line_spacing: LineSpacing::Relaxed,
            },
        ];
        for op in ops {
            let json = serde_json::to_string(&op).unwrap();
            let back: Operation = serde_json::from_str(&json).unwrap();
            assert_eq!(back, op);
        }
    }

    #[test]
    fn degenerate_forms_are_noops() {
        assert!(Operation::insert_text(NO_BLOCK, 0, "x").is_noop());
        assert!(Operation::insert_text(0, 0, "").is_noop());
        assert!(Operation::delete_text(Range::in_block(0, 2, 2)).is_noop());
        assert!(Operation::merge_block(0, 0).is_noop());
        assert!(!Operation::delete_block(0).is_noop());
    }
}
