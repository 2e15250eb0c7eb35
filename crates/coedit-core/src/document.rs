//! The block-document model.
//!
//! A [`Document`] is an ordered list of [`Block`]s; each block carries styled
//! text as a normalized list of [`TextRun`]s plus block-level attributes
//! (type, alignment, indent, line spacing, and image/table payloads).
//!
//! Documents are only ever mutated through [`crate::apply`], which returns a
//! new value; nothing in this module mutates shared state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum nesting depth for block indentation.
pub const MAX_INDENT: u8 = 8;

/// Sentinel block index addressing no block.
///
/// Transforms rebase operations whose target block has been deleted onto
/// this index; `apply` treats any out-of-range index as a no-op, so such
/// operations are inert without being errors.
pub const NO_BLOCK: usize = usize::MAX;

/// A location in a document: a block index plus a character offset into the
/// block's concatenated run text.
///
/// Offsets count Unicode scalar values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Index of the addressed block
    pub block_index: usize,
    /// Character offset into the block's text
    pub offset: usize,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub fn new(block_index: usize, offset: usize) -> Self {
        Self {
            block_index,
            offset,
        }
    }

    /// The sentinel position addressing no block.
    #[must_use]
    pub fn nowhere() -> Self {
        Self {
            block_index: NO_BLOCK,
            offset: 0,
        }
    }

    /// Document-order comparison: block-major, then offset.
    #[must_use]
    pub fn precedes(&self, other: &Self) -> bool {
        (self.block_index, self.offset) < (other.block_index, other.offset)
    }
}

/// A span of document content between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    /// First position of the span (inclusive)
    pub start: Position,
    /// End of the span (exclusive)
    pub end: Position,
}

impl Range {
    /// Create a range, reordering the endpoints into document order.
    #[must_use]
    pub fn new(a: Position, b: Position) -> Self {
        if b.precedes(&a) {
            Self { start: b, end: a }
        } else {
            Self { start: a, end: b }
        }
    }

    /// Convenience constructor for a range inside a single block.
    #[must_use]
    pub fn in_block(block_index: usize, start: usize, end: usize) -> Self {
        Self::new(
            Position::new(block_index, start),
            Position::new(block_index, end),
        )
    }

    /// Whether the range addresses no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether start and end fall in the same block.
    #[must_use]
    pub fn is_single_block(&self) -> bool {
        self.start.block_index == self.end.block_index
    }
}

/// Character-level style attributes.
///
/// Every field is optional; absence means "inherit/default". Comparisons go
/// through [`TextStyle::same_appearance`], which treats unset as equal to
/// false (booleans) or empty (strings).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextStyle {
    /// Bold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    /// Italic
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    /// Underline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    /// Strikethrough
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    /// Inline code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<bool>,
    /// Font size in points
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    /// Font family name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    /// Foreground color (CSS color string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Background color (CSS color string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

fn flag(value: Option<bool>) -> bool {
    value.unwrap_or(false)
}

fn text_attr(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

impl TextStyle {
    /// Whether this style sets nothing visible.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.same_appearance(&TextStyle::default())
    }

    /// Pointwise equality with unset treated as false/empty.
    #[must_use]
    pub fn same_appearance(&self, other: &Self) -> bool {
        flag(self.bold) == flag(other.bold)
            && flag(self.italic) == flag(other.italic)
            && flag(self.underline) == flag(other.underline)
            && flag(self.strikethrough) == flag(other.strikethrough)
            && flag(self.code) == flag(other.code)
            && self.font_size == other.font_size
            && text_attr(&self.font_family) == text_attr(&other.font_family)
            && text_attr(&self.color) == text_attr(&other.color)
            && text_attr(&self.background_color) == text_attr(&other.background_color)
    }

    /// Overlay the fields set in `patch` onto this style.
    #[must_use]
    pub fn merged_with(&self, patch: &Self) -> Self {
        Self {
            bold: patch.bold.or(self.bold),
            italic: patch.italic.or(self.italic),
            underline: patch.underline.or(self.underline),
            strikethrough: patch.strikethrough.or(self.strikethrough),
            code: patch.code.or(self.code),
            font_size: patch.font_size.or(self.font_size),
            font_family: patch.font_family.clone().or_else(|| self.font_family.clone()),
            color: patch.color.clone().or_else(|| self.color.clone()),
            background_color: patch
                .background_color
                .clone()
                .or_else(|| self.background_color.clone()),
        }
    }

    /// Unset every attribute that `named` names with a truthy value.
    #[must_use]
    pub fn cleared_by(&self, named: &Self) -> Self {
        Self {
            bold: if flag(named.bold) { None } else { self.bold },
            italic: if flag(named.italic) { None } else { self.italic },
            underline: if flag(named.underline) {
                None
            } else {
                self.underline
            },
            strikethrough: if flag(named.strikethrough) {
                None
            } else {
                self.strikethrough
            },
            code: if flag(named.code) { None } else { self.code },
            font_size: if named.font_size.is_some_and(|v| v != 0.0) {
                None
            } else {
                self.font_size
            },
            font_family: if text_attr(&named.font_family).is_empty() {
                self.font_family.clone()
            } else {
                None
            },
            color: if text_attr(&named.color).is_empty() {
                self.color.clone()
            } else {
                None
            },
            background_color: if text_attr(&named.background_color).is_empty() {
                self.background_color.clone()
            } else {
                None
            },
        }
    }
}

/// A maximal span of uniformly styled text inside a block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextRun {
    /// The run text
    pub text: String,
    /// The run style
    #[serde(default)]
    pub style: TextStyle,
}

impl TextRun {
    /// Create a run.
    #[must_use]
    pub fn new(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    /// Create an unstyled run.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, TextStyle::default())
    }

    /// Length of the run in characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the run holds no text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Text and style equality, with style compared by appearance.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.text == other.text && self.style.same_appearance(&other.style)
    }
}

/// Stable identifier for a block, assigned at creation and never reused.
///
/// Operations address blocks by index, so ids never travel on the wire;
/// they exist as stable handles for the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(Uuid);

impl BlockId {
    /// Mint a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockType {
    /// Plain paragraph
    Paragraph,
    /// Top-level heading
    #[serde(rename = "heading1")]
    Heading1,
    /// Second-level heading
    #[serde(rename = "heading2")]
    Heading2,
    /// Third-level heading
    #[serde(rename = "heading3")]
    Heading3,
    /// Bulleted list item
    BulletListItem,
    /// Numbered list item
    NumberedListItem,
    /// Block quotation
    Blockquote,
    /// Preformatted code block
    CodeBlock,
    /// Horizontal rule (no text content)
    HorizontalRule,
    /// Embedded image
    Image,
    /// Table grid
    Table,
}

/// Horizontal alignment of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Left-aligned (default)
    #[default]
    Left,
    /// Centered
    Center,
    /// Right-aligned
    Right,
}

/// Line spacing of a block, restricted to the four supported multiples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub enum LineSpacing {
    /// 1.0
    Single,
    /// 1.15
    Relaxed,
    /// 1.5
    OneAndHalf,
    /// 2.0
    Double,
}

impl From<LineSpacing> for f64 {
    fn from(spacing: LineSpacing) -> Self {
        match spacing {
            LineSpacing::Single => 1.0,
            LineSpacing::Relaxed => 1.15,
            LineSpacing::OneAndHalf => 1.5,
            LineSpacing::Double => 2.0,
        }
    }
}

impl TryFrom<f64> for LineSpacing {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        // Wire values come from JSON and must match one of the four
        // supported multiples exactly.
        if value == 1.0 {
            Ok(Self::Single)
        } else if value == 1.15 {
            Ok(Self::Relaxed)
        } else if value == 1.5 {
            Ok(Self::OneAndHalf)
        } else if value == 2.0 {
            Ok(Self::Double)
        } else {
            Err(format!("unsupported line spacing {value}"))
        }
    }
}

/// One cell of a table block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableCell {
    /// Cell content as a normalized run list
    pub runs: Vec<TextRun>,
}

impl TableCell {
    /// Create an empty cell.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            runs: vec![TextRun::default()],
        }
    }
}

/// The grid payload of a table block. All rows have equal length.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableData {
    /// Rows of cells
    pub rows: Vec<Vec<TableCell>>,
}

impl TableData {
    /// Create an empty grid of the given dimensions.
    #[must_use]
    pub fn empty(rows: usize, cols: usize) -> Self {
        Self {
            rows: (0..rows)
                .map(|_| (0..cols).map(|_| TableCell::empty()).collect())
                .collect(),
        }
    }

    /// Whether every row has the same number of cells.
    #[must_use]
    pub fn is_rectangular(&self) -> bool {
        let Some(first) = self.rows.first() else {
            return true;
        };
        self.rows.iter().all(|row| row.len() == first.len())
    }

    /// Cell-by-cell content equality.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.rows.len() == other.rows.len()
            && self.rows.iter().zip(&other.rows).all(|(a, b)| {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(ca, cb)| {
                        ca.runs.len() == cb.runs.len()
                            && ca.runs.iter().zip(&cb.runs).all(|(ra, rb)| ra.same_content(rb))
                    })
            })
    }
}

/// One block of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Stable block id
    pub id: BlockId,
    /// Block kind
    #[serde(rename = "type")]
    pub kind: BlockType,
    /// Horizontal alignment
    #[serde(default)]
    pub alignment: Alignment,
    /// Indent level, `0..=MAX_INDENT`
    #[serde(default)]
    pub indent_level: u8,
    /// Line spacing, if set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_spacing: Option<LineSpacing>,
    /// Normalized run list
    pub runs: Vec<TextRun>,
    /// Image URL (image blocks)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Table grid (table blocks)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_data: Option<TableData>,
}

impl Block {
    /// Create an empty block of the given kind.
    ///
    /// Table blocks start with an empty 2×2 grid.
    #[must_use]
    pub fn new(kind: BlockType) -> Self {
        Self {
            id: BlockId::new(),
            kind,
            alignment: Alignment::Left,
            indent_level: 0,
            line_spacing: None,
            runs: vec![TextRun::default()],
            image_url: None,
            table_data: if kind == BlockType::Table {
                Some(TableData::empty(2, 2))
            } else {
                None
            },
        }
    }

    /// Create an empty paragraph.
    #[must_use]
    pub fn paragraph() -> Self {
        Self::new(BlockType::Paragraph)
    }

    /// Create a paragraph holding the given unstyled text.
    #[must_use]
    pub fn with_text(text: impl Into<String>) -> Self {
        let mut block = Self::paragraph();
        block.runs = normalize_runs(vec![TextRun::plain(text)]);
        block
    }

    /// Total text length of the block in characters.
    #[must_use]
    pub fn text_len(&self) -> usize {
        self.runs.iter().map(TextRun::len).sum()
    }

    /// The block's concatenated run text.
    #[must_use]
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    /// Content equality ignoring the block id.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.alignment == other.alignment
            && self.indent_level == other.indent_level
            && self.line_spacing == other.line_spacing
            && self.image_url == other.image_url
            && self.runs.len() == other.runs.len()
            && self.runs.iter().zip(&other.runs).all(|(a, b)| a.same_content(b))
            && match (&self.table_data, &other.table_data) {
                (None, None) => true,
                (Some(a), Some(b)) => a.same_content(b),
                _ => false,
            }
    }
}

/// A complete document: at least one block at all times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier
    pub id: String,
    /// Document title
    pub title: String,
    /// Ordered blocks; never empty
    pub blocks: Vec<Block>,
}

impl Document {
    /// Create a document holding a single empty paragraph.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            blocks: vec![Block::paragraph()],
        }
    }

    /// Create a document from blocks, restoring the non-empty invariant if
    /// handed an empty list.
    #[must_use]
    pub fn from_blocks(
        id: impl Into<String>,
        title: impl Into<String>,
        mut blocks: Vec<Block>,
    ) -> Self {
        if blocks.is_empty() {
            blocks.push(Block::paragraph());
        }
        Self {
            id: id.into(),
            title: title.into(),
            blocks,
        }
    }

    /// The concatenated text of one block, if it exists.
    #[must_use]
    pub fn block_text(&self, index: usize) -> Option<String> {
        self.blocks.get(index).map(Block::text)
    }

    /// Content equality ignoring block ids.
    ///
    /// This is the equivalence the convergence property is stated over:
    /// block ids are replica-local and two replicas that agree on content
    /// may disagree on ids.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.blocks.len() == other.blocks.len()
            && self
                .blocks
                .iter()
                .zip(&other.blocks)
                .all(|(a, b)| a.same_content(b))
    }
}

/// Normalize a run list: drop empty runs, merge adjacent runs with
/// equivalent styles, and leave a single empty placeholder run when nothing
/// remains.
#[must_use]
pub fn normalize_runs(runs: Vec<TextRun>) -> Vec<TextRun> {
    let mut normalized: Vec<TextRun> = Vec::with_capacity(runs.len());
    for run in runs {
        if run.is_empty() {
            continue;
        }
        match normalized.last_mut() {
            Some(last) if last.style.same_appearance(&run.style) => {
                last.text.push_str(&run.text);
            }
            _ => normalized.push(run),
        }
    }
    if normalized.is_empty() {
        normalized.push(TextRun::default());
    }
    normalized
}

/// Split `text` at a character offset.
fn split_text(text: &str, offset: usize) -> (String, String) {
    let byte = text
        .char_indices()
        .nth(offset)
        .map_or(text.len(), |(i, _)| i);
    (text[..byte].to_string(), text[byte..].to_string())
}

/// Split a run list at a character offset into left and right halves.
///
/// The offset is clamped to the total text length. Neither half is
/// normalized; callers normalize after splicing.
pub(crate) fn split_runs(runs: &[TextRun], offset: usize) -> (Vec<TextRun>, Vec<TextRun>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut consumed = 0usize;
    for run in runs {
        let len = run.len();
        if consumed + len <= offset {
            left.push(run.clone());
        } else if consumed >= offset {
            right.push(run.clone());
        } else {
            let (head, tail) = split_text(&run.text, offset - consumed);
            left.push(TextRun::new(head, run.style.clone()));
            right.push(TextRun::new(tail, run.style.clone()));
        }
        consumed += len;
    }
    (left, right)
}

/// The style inherited by text inserted at a character offset.
///
/// Left-biased: the run ending exactly at the offset wins over the run
/// starting there.
pub(crate) fn style_at(runs: &[TextRun], offset: usize) -> TextStyle {
    let mut consumed = 0usize;
    for run in runs {
        let len = run.len();
        if len == 0 {
            continue;
        }
        if offset > consumed && offset <= consumed + len {
            return run.style.clone();
        }
        consumed += len;
    }
    runs.iter()
        .find(|run| !run.is_empty())
        .or_else(|| runs.first())
        .map(|run| run.style.clone())
        .unwrap_or_default()
}
