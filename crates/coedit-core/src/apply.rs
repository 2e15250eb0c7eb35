//! Pure application of operations to documents.
//!
//! [`apply`] is total: it never panics and never errors. Stale addresses
//! are a normal consequence of concurrent editing, so an operation whose
//! block index is out of range is a no-op, and in-range offsets beyond a
//! block's text are clamped. The input document is never mutated; callers
//! get a new value.

use crate::document::{
    normalize_runs, split_runs, style_at, Block, BlockType, Document, Position, Range, TextRun,
    MAX_INDENT,
};
use crate::operation::Operation;

/// Apply one operation to a document, returning the resulting document.
#[must_use]
pub fn apply(doc: &Document, op: &Operation) -> Document {
    let mut next = doc.clone();
    match op {
        Operation::InsertText { position, text } => insert_text(&mut next, *position, text),
        Operation::DeleteText { range } => delete_text(&mut next, *range),
        Operation::ApplyFormatting { range, style } => {
            restyle(&mut next, *range, |run_style| run_style.merged_with(style));
        }
        Operation::RemoveFormatting { range, style } => {
            restyle(&mut next, *range, |run_style| run_style.cleared_by(style));
        }
        Operation::SplitBlock { position } => split_block(&mut next, *position),
        Operation::MergeBlock { block_index, .. } => merge_block(&mut next, *block_index),
        Operation::ChangeBlockType {
            block_index,
            new_type,
        } => {
            if let Some(block) = next.blocks.get_mut(*block_index) {
                block.kind = *new_type;
            }
        }
        Operation::ChangeBlockAlignment {
            block_index,
            new_alignment,
        } => {
            if let Some(block) = next.blocks.get_mut(*block_index) {
                block.alignment = *new_alignment;
            }
        }
        Operation::InsertBlock {
            after_block_index,
            block_type,
        } => insert_block(&mut next, *after_block_index, *block_type),
        Operation::DeleteBlock { block_index } => delete_block(&mut next, *block_index),
        Operation::SetIndent {
            block_index,
            indent_level,
        } => {
            if let Some(block) = next.blocks.get_mut(*block_index) {
                block.indent_level = (*indent_level).min(MAX_INDENT);
            }
        }
        Operation::SetLineSpacing {
            block_index,
            line_spacing,
        } => {
            if let Some(block) = next.blocks.get_mut(*block_index) {
                block.line_spacing = Some(*line_spacing);
            }
        }
        Operation::SetImage {
            block_index,
            image_url,
        } => {
            if let Some(block) = next.blocks.get_mut(*block_index) {
                block.image_url = Some(image_url.clone());
            }
        }
        Operation::SetTableData {
            block_index,
            table_data,
        } => {
            if table_data.is_rectangular() {
                if let Some(block) = next.blocks.get_mut(*block_index) {
                    block.table_data = Some(table_data.clone());
                }
            }
        }
    }
    next
}

/// Fold a slice of operations over a document.
#[must_use]
pub fn apply_all(doc: &Document, ops: &[Operation]) -> Document {
    ops.iter().fold(doc.clone(), |acc, op| apply(&acc, op))
}

/// Clamp a position into the document: the block must exist, the offset is
/// truncated to the block's text length. Returns `None` for out-of-range
/// block indices.
fn clamp_position(doc: &Document, pos: Position) -> Option<Position> {
    let block = doc.blocks.get(pos.block_index)?;
    Some(Position::new(
        pos.block_index,
        pos.offset.min(block.text_len()),
    ))
}

/// Clamp a range into the document, reordering the endpoints. `None` when
/// the start block does not exist; an end past the document is pulled back
/// to the final position.
fn clamp_range(doc: &Document, range: Range) -> Option<Range> {
    let range = Range::new(range.start, range.end);
    let start = clamp_position(doc, range.start)?;
    let end = clamp_position(doc, range.end).unwrap_or_else(|| {
        let last = doc.blocks.len() - 1;
        Position::new(last, doc.blocks[last].text_len())
    });
    Some(Range::new(start, end))
}

fn insert_text(doc: &mut Document, position: Position, text: &str) {
    if text.is_empty() {
        return;
    }
    let Some(position) = clamp_position(doc, position) else {
        return;
    };
    let block = &mut doc.blocks[position.block_index];
    let style = style_at(&block.runs, position.offset);
    let (mut left, right) = split_runs(&block.runs, position.offset);
    left.push(TextRun::new(text, style));
    left.extend(right);
    block.runs = normalize_runs(left);
}

fn delete_text(doc: &mut Document, range: Range) {
    let Some(range) = clamp_range(doc, range) else {
        return;
    };
    if range.is_empty() {
        return;
    }
    let (start, end) = (range.start, range.end);
    if range.is_single_block() {
        let block = &mut doc.blocks[start.block_index];
        let (left, rest) = split_runs(&block.runs, start.offset);
        let (_, right) = split_runs(&rest, end.offset - start.offset);
        let mut runs = left;
        runs.extend(right);
        block.runs = normalize_runs(runs);
        return;
    }
    // The span collapses into its first block: the first block keeps its
    // head, the last block's tail is appended, everything between goes.
    let (mut head, _) = split_runs(&doc.blocks[start.block_index].runs, start.offset);
    let (_, tail) = split_runs(&doc.blocks[end.block_index].runs, end.offset);
    head.extend(tail);
    doc.blocks[start.block_index].runs = normalize_runs(head);
    doc.blocks.drain(start.block_index + 1..=end.block_index);
}

fn restyle<F>(doc: &mut Document, range: Range, f: F)
where
    F: Fn(&crate::document::TextStyle) -> crate::document::TextStyle,
{
    let Some(range) = clamp_range(doc, range) else {
        return;
    };
    if range.is_empty() {
        return;
    }
    for index in range.start.block_index..=range.end.block_index {
        let block = &mut doc.blocks[index];
        let lo = if index == range.start.block_index {
            range.start.offset
        } else {
            0
        };
        let hi = if index == range.end.block_index {
            range.end.offset
        } else {
            block.text_len()
        };
        if lo >= hi {
            continue;
        }
        let (left, rest) = split_runs(&block.runs, lo);
        let (mut mid, right) = split_runs(&rest, hi - lo);
        for run in &mut mid {
            run.style = f(&run.style);
        }
        let mut runs = left;
        runs.extend(mid);
        runs.extend(right);
        block.runs = normalize_runs(runs);
    }
}

fn split_block(doc: &mut Document, position: Position) {
    let Some(position) = clamp_position(doc, position) else {
        return;
    };
    let source = &mut doc.blocks[position.block_index];
    let (head, tail) = split_runs(&source.runs, position.offset);
    // The tail is always a paragraph (headings and list items do not
    // propagate across a split) but keeps alignment and line spacing.
    let mut new_block = Block::paragraph();
    new_block.alignment = source.alignment;
    new_block.line_spacing = source.line_spacing;
    new_block.runs = normalize_runs(tail);
    source.runs = normalize_runs(head);
    doc.blocks.insert(position.block_index + 1, new_block);
}

fn merge_block(doc: &mut Document, block_index: usize) {
    if block_index == 0 || block_index >= doc.blocks.len() {
        return;
    }
    let absorbed = doc.blocks.remove(block_index);
    let target = &mut doc.blocks[block_index - 1];
    let mut runs = std::mem::take(&mut target.runs);
    runs.extend(absorbed.runs);
    target.runs = normalize_runs(runs);
}

fn insert_block(doc: &mut Document, after_block_index: i64, block_type: BlockType) {
    if after_block_index == crate::operation::NO_ANCHOR {
        return;
    }
    let last = i64::try_from(doc.blocks.len()).unwrap_or(i64::MAX) - 1;
    let anchor = after_block_index.clamp(-1, last);
    let index = usize::try_from(anchor + 1).unwrap_or(0);
    doc.blocks.insert(index, Block::new(block_type));
}

fn delete_block(doc: &mut Document, block_index: usize) {
    if block_index >= doc.blocks.len() {
        return;
    }
    if doc.blocks.len() == 1 {
        // Removing the only block would empty the document; convert it to
        // an empty paragraph instead.
        doc.blocks[0] = Block::paragraph();
    } else {
        doc.blocks.remove(block_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Alignment, LineSpacing, TableData, TextStyle};

    fn doc(texts: &[&str]) -> Document {
        Document::from_blocks(
            "doc-1",
            "Test",
            texts.iter().map(|t| Block::with_text(*t)).collect(),
        )
    }

    fn bold() -> TextStyle {
        TextStyle {
            bold: Some(true),
            ..TextStyle::default()
        }
    }

    #[test]
    fn insert_text_inherits_style_left_of_the_caret() {
        let mut d = doc(&["hello world"]);
        d = apply(
            &d,
            &Operation::apply_formatting(Range::in_block(0, 0, 5), bold()),
        );
        d = apply(&d, &Operation::insert_text(0, 5, "!"));
        assert_eq!(d.block_text(0).unwrap(), "hello! world");
        assert_eq!(d.blocks[0].runs.len(), 2);
        assert_eq!(d.blocks[0].runs[0].text, "hello!");
        assert!(d.blocks[0].runs[0].style.same_appearance(&bold()));
    }

    #[test]
    fn apply_formatting_splits_runs_at_the_boundaries() {
        let d = apply(
            &doc(&["hello world"]),
            &Operation::apply_formatting(Range::in_block(0, 0, 5), bold()),
        );
        let runs = &d.blocks[0].runs;
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text, "hello");
        assert!(runs[0].style.same_appearance(&bold()));
        assert_eq!(runs[1].text, " world");
        assert!(runs[1].style.is_plain());
    }

    #[test]
    fn remove_formatting_clears_only_named_fields() {
        let styled = TextStyle {
            bold: Some(true),
            italic: Some(true),
            ..TextStyle::default()
        };
        let mut d = apply(
            &doc(&["abc"]),
            &Operation::apply_formatting(Range::in_block(0, 0, 3), styled),
        );
        d = apply(
            &d,
            &Operation::remove_formatting(Range::in_block(0, 0, 3), bold()),
        );
        let style = &d.blocks[0].runs[0].style;
        assert_eq!(style.bold, None);
        assert_eq!(style.italic, Some(true));
    }

    #[test]
    fn delete_text_within_a_block() {
        let d = apply(
            &doc(&["abcdefghij"]),
            &Operation::delete_text(Range::in_block(0, 2, 6)),
        );
        assert_eq!(d.block_text(0).unwrap(), "abghij");
    }

    #[test]
    fn delete_text_across_blocks_merges_the_tail_into_the_first() {
        let d = apply(
            &doc(&["aaaa", "bbbb", "cccc"]),
            &Operation::delete_text(Range::new(Position::new(0, 2), Position::new(2, 1))),
        );
        assert_eq!(d.blocks.len(), 1);
        assert_eq!(d.block_text(0).unwrap(), "aaccc");
    }

    #[test]
    fn split_block_forces_paragraph_but_keeps_alignment_and_spacing() {
        let mut base = doc(&["heading text"]);
        base.blocks[0].kind = BlockType::Heading1;
        base.blocks[0].alignment = Alignment::Center;
        base.blocks[0].line_spacing = Some(LineSpacing::Double);
        let d = apply(&base, &Operation::split_block(0, 7));
        assert_eq!(d.blocks.len(), 2);
        assert_eq!(d.block_text(0).unwrap(), "heading");
        assert_eq!(d.block_text(1).unwrap(), " text");
        assert_eq!(d.blocks[0].kind, BlockType::Heading1);
        assert_eq!(d.blocks[1].kind, BlockType::Paragraph);
        assert_eq!(d.blocks[1].alignment, Alignment::Center);
        assert_eq!(d.blocks[1].line_spacing, Some(LineSpacing::Double));
        assert_ne!(d.blocks[1].id, d.blocks[0].id);
    }

    #[test]
    fn merge_block_keeps_the_target_attributes() {
        let mut base = doc(&["one", "two"]);
        base.blocks[0].kind = BlockType::Blockquote;
        base.blocks[1].kind = BlockType::Heading2;
        let d = apply(&base, &Operation::merge_block(1, 3));
        assert_eq!(d.blocks.len(), 1);
        assert_eq!(d.block_text(0).unwrap(), "onetwo");
        assert_eq!(d.blocks[0].kind, BlockType::Blockquote);
    }

    #[test]
    fn merge_block_of_the_first_block_is_a_noop() {
        let base = doc(&["one", "two"]);
        let d = apply(&base, &Operation::merge_block(0, 0));
        assert!(d.same_content(&base));
    }

    #[test]
    fn delete_sole_block_leaves_an_empty_paragraph() {
        let mut base = doc(&[""]);
        base.blocks[0].kind = BlockType::HorizontalRule;
        let d = apply(&base, &Operation::delete_block(0));
        assert_eq!(d.blocks.len(), 1);
        assert_eq!(d.blocks[0].kind, BlockType::Paragraph);
        assert_eq!(d.blocks[0].text_len(), 0);
    }

    #[test]
    fn insert_block_clamps_its_anchor() {
        let base = doc(&["a", "b"]);
        let front = apply(&base, &Operation::insert_block(-5, BlockType::Paragraph));
        assert_eq!(front.blocks.len(), 3);
        assert_eq!(front.block_text(0).unwrap(), "");
        let back = apply(&base, &Operation::insert_block(99, BlockType::Paragraph));
        assert_eq!(back.block_text(2).unwrap(), "");
    }

    #[test]
    fn new_table_blocks_get_an_empty_two_by_two_grid() {
        let d = apply(&doc(&["a"]), &Operation::insert_block(0, BlockType::Table));
        let grid = d.blocks[1].table_data.as_ref().unwrap();
        assert_eq!(grid.rows.len(), 2);
        assert_eq!(grid.rows[0].len(), 2);
    }

    #[test]
    fn ragged_table_data_is_rejected() {
        let base = apply(&doc(&["a"]), &Operation::insert_block(0, BlockType::Table));
        let mut ragged = TableData::empty(2, 2);
        ragged.rows[1].pop();
        let d = apply(
            &base,
            &Operation::SetTableData {
                block_index: 1,
                table_data: ragged,
            },
        );
        assert!(d.same_content(&base));
    }

    #[test]
    fn out_of_range_addresses_are_noops() {
        let base = doc(&["hello"]);
        for op in [
            Operation::insert_text(7, 0, "x"),
            Operation::delete_text(Range::in_block(3, 0, 2)),
            Operation::split_block(9, 0),
            Operation::merge_block(5, 0),
            Operation::delete_block(2),
            Operation::ChangeBlockType {
                block_index: 4,
                new_type: BlockType::CodeBlock,
            },
        ] {
            assert!(apply(&base, &op).same_content(&base), "{op:?}");
        }
    }

    #[test]
    fn offsets_past_the_text_are_clamped() {
        let d = apply(&doc(&["abc"]), &Operation::insert_text(0, 99, "!"));
        assert_eq!(d.block_text(0).unwrap(), "abc!");
    }

    #[test]
    fn set_indent_clamps_to_the_maximum() {
        let d = apply(
            &doc(&["a"]),
            &Operation::SetIndent {
                block_index: 0,
                indent_level: 99,
            },
        );
        assert_eq!(d.blocks[0].indent_level, MAX_INDENT);
    }

    #[test]
    fn apply_never_mutates_its_input() {
        let base = doc(&["hello"]);
        let snapshot = base.clone();
        let _ = apply(&base, &Operation::insert_text(0, 0, "x"));
        let _ = apply(&base, &Operation::delete_block(0));
        assert_eq!(base, snapshot);
    }
}
