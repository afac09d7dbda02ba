//! Table handling for the streaming scanner.
//!
//! A `<table>` region is parsed into a grid, classified, and rendered into
//! text the anchor layer can treat as a single paragraph:
//!
//! - `data` grids become a Markdown pipe table, with a byte span recorded
//!   for every citable cell;
//! - `layout_prose` and `unknown` grids become `label: value` lines;
//! - regions without row markup are read as fixed-width `<TAG>value`
//!   schedules and rendered as a `Field | Value` Markdown table.
//!
//! Every rendered character keeps the provenance of the raw bytes it came
//! from; pipes, padding and generated headers carry none.

use std::collections::HashMap;

use crate::document::{CharSource, TableCellSpan, TableKind};
use crate::emit::decode_text;
use crate::tags::{self, parse_tag};

/// Glyphs EDGAR filers use to pad empty cells.
const PLACEHOLDER_GLYPHS: &[char] = &['■', '¨', '□', '☐', '\u{a0}', '•'];
/// Short filler runs made only of these are placeholders too.
const PLACEHOLDER_FILLERS: &[char] = &['.', '-', '–', '—'];
/// Upper bound for `rowspan`/`colspan` so hostile markup cannot explode the grid.
const MAX_SPAN: usize = 128;
/// Labels longer than this are not treated as a `label: value` pair.
const MAX_LABEL_CHARS: usize = 120;

/// Whitespace-collapsed cell text with provenance per character.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CellText {
    chars: Vec<(char, Option<CharSource>)>,
    pending_space: Option<Option<CharSource>>,
}

impl CellText {
    fn push(&mut self, ch: char, source: Option<CharSource>) {
        if ch.is_whitespace() {
            if !self.chars.is_empty() && self.pending_space.is_none() {
                self.pending_space = Some(source);
            }
            return;
        }
        if let Some(space_source) = self.pending_space.take() {
            self.chars.push((' ', space_source));
        }
        self.chars.push((ch, source));
    }

    fn push_break(&mut self) {
        self.push(' ', None);
    }

    pub(crate) fn as_string(&self) -> String {
        self.chars.iter().map(|(ch, _)| *ch).collect()
    }

    fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

/// Whether a cell carries no content worth citing.
pub fn is_placeholder_cell(text: &str) -> bool {
    let trimmed = text.trim_matches(|c: char| c.is_whitespace());
    if trimmed.is_empty() {
        return true;
    }
    let count = trimmed.chars().count();
    if count == 1 && trimmed.chars().all(|c| PLACEHOLDER_GLYPHS.contains(&c)) {
        return true;
    }
    count <= 3
        && trimmed
            .chars()
            .all(|c| PLACEHOLDER_GLYPHS.contains(&c) || PLACEHOLDER_FILLERS.contains(&c))
}

#[derive(Debug, Clone)]
struct RawCell {
    text: CellText,
    rowspan: usize,
    colspan: usize,
    is_header: bool,
}

#[derive(Debug, Clone)]
struct GridCell {
    text: CellText,
    is_header: bool,
}

/// What the table scan found between `<table>` and its matching close.
#[derive(Debug, Default)]
pub(crate) struct ParsedTable {
    rows: Vec<Vec<RawCell>>,
    saw_row_markup: bool,
    /// Start of the matching `</table>` (or end of input).
    pub content_end: usize,
    /// Index just past the matching `</table>`.
    pub resume_at: usize,
}

/// Scan a table body starting right after its `<table ...>` tag.
///
/// Nested tables are flattened into the enclosing cell's text.
pub(crate) fn parse_table(
    raw: &str,
    content_start: usize,
    decode_entities: bool,
    normalize_unicode: bool,
) -> ParsedTable {
    let bytes = raw.as_bytes();
    let len = raw.len();
    let mut parsed = ParsedTable::default();
    let mut current_row: Option<Vec<RawCell>> = None;
    let mut current_cell: Option<RawCell> = None;
    let mut nested_depth = 0usize;
    let mut skip_stack: Vec<String> = Vec::new();
    let mut i = content_start;

    let finish_cell = |row: &mut Option<Vec<RawCell>>, cell: &mut Option<RawCell>| {
        if let Some(done) = cell.take() {
            row.get_or_insert_with(Vec::new).push(done);
        }
    };

    while i < len {
        if let Some(top) = skip_stack.last() {
            if bytes[i] == b'<' {
                let (token, next) = parse_tag(raw, i);
                if matches!(&token, Some(t) if t.is_end_of(top)) {
                    skip_stack.pop();
                }
                i = next;
            } else {
                i = raw[i..].find('<').map_or(len, |offset| i + offset);
            }
            continue;
        }

        if bytes[i] != b'<' {
            let next = raw[i..].find('<').map_or(len, |offset| i + offset);
            if let Some(cell) = current_cell.as_mut() {
                decode_text(raw, i, next, decode_entities, normalize_unicode, |ch, src| {
                    cell.text.push(ch, Some(src));
                });
            }
            i = next;
            continue;
        }

        let tag_start = i;
        let (token, next) = parse_tag(raw, i);
        i = next;
        let Some(token) = token else {
            continue;
        };

        if token.is_start && tags::is_skip_content(&token.name) {
            skip_stack.push(token.name);
            continue;
        }

        if token.name == "table" {
            if token.is_start {
                if !token.is_self_closing {
                    nested_depth += 1;
                }
                if let Some(cell) = current_cell.as_mut() {
                    cell.text.push_break();
                }
                continue;
            }
            if nested_depth == 0 {
                finish_cell(&mut current_row, &mut current_cell);
                if let Some(row) = current_row.take() {
                    parsed.rows.push(row);
                }
                parsed.content_end = tag_start;
                parsed.resume_at = next;
                return parsed;
            }
            nested_depth -= 1;
            if let Some(cell) = current_cell.as_mut() {
                cell.text.push_break();
            }
            continue;
        }

        if nested_depth > 0 {
            if let Some(cell) = current_cell.as_mut() {
                if tags::is_block(&token.name) || tags::is_line_break(&token.name) {
                    cell.text.push_break();
                }
            }
            continue;
        }

        match token.name.as_str() {
            "tr" => {
                finish_cell(&mut current_row, &mut current_cell);
                if let Some(row) = current_row.take() {
                    parsed.rows.push(row);
                }
                if token.is_start {
                    parsed.saw_row_markup = true;
                    current_row = Some(Vec::new());
                }
            }
            "td" | "th" => {
                finish_cell(&mut current_row, &mut current_cell);
                if token.is_start {
                    current_cell = Some(RawCell {
                        text: CellText::default(),
                        rowspan: span_value(token.attribute("rowspan")),
                        colspan: span_value(token.attribute("colspan")),
                        is_header: token.name == "th",
                    });
                }
            }
            name if tags::is_block(name) || tags::is_line_break(name) => {
                if let Some(cell) = current_cell.as_mut() {
                    cell.text.push_break();
                }
            }
            _ => {}
        }
    }

    finish_cell(&mut current_row, &mut current_cell);
    if let Some(row) = current_row.take() {
        parsed.rows.push(row);
    }
    parsed.content_end = len;
    parsed.resume_at = len;
    parsed
}

fn span_value(value: Option<&str>) -> usize {
    value
        .and_then(|v| v.trim().trim_matches(|c| c == '"' || c == '\'').parse::<usize>().ok())
        .filter(|v| *v >= 1)
        .unwrap_or(1)
        .min(MAX_SPAN)
}

/// Materialize the row/cell lists into a rectangular-ish grid.
///
/// A spanning cell's text is copied forward into every position it covers.
/// The pending map is scratch state local to one table and is drained before
/// the column cursor moves past a covered position.
fn build_grid(rows: Vec<Vec<RawCell>>) -> Vec<Vec<GridCell>> {
    let mut pending: HashMap<(usize, usize), GridCell> = HashMap::new();
    let mut grid: Vec<Vec<GridCell>> = Vec::with_capacity(rows.len());

    for (row_idx, row) in rows.into_iter().enumerate() {
        let mut cells: Vec<GridCell> = Vec::with_capacity(row.len());
        let mut col_idx = 0usize;

        for cell in row {
            while let Some(spanned) = pending.remove(&(row_idx, col_idx)) {
                cells.push(spanned);
                col_idx += 1;
            }

            let grid_cell = GridCell {
                text: cell.text,
                is_header: cell.is_header,
            };
            for r in 0..cell.rowspan {
                for c in 0..cell.colspan {
                    if r == 0 && c == 0 {
                        continue;
                    }
                    pending.insert((row_idx + r, col_idx + c), grid_cell.clone());
                }
            }
            cells.push(grid_cell);
            col_idx += 1;
        }

        while let Some(spanned) = pending.remove(&(row_idx, col_idx)) {
            cells.push(spanned);
            col_idx += 1;
        }

        grid.push(cells);
    }
    grid
}

/// Classify a grid by shape and content.
fn classify(grid: &[Vec<GridCell>]) -> TableKind {
    let total_cells: usize = grid.iter().map(Vec::len).sum();
    if grid.is_empty() || total_cells == 0 {
        return TableKind::Empty;
    }
    let num_cols = grid.iter().map(Vec::len).max().unwrap_or(0);

    let texts: Vec<String> = grid
        .iter()
        .flat_map(|row| row.iter().map(|cell| cell.text.as_string()))
        .collect();
    let placeholders = texts.iter().filter(|t| is_placeholder_cell(t)).count();
    let placeholder_ratio = placeholders as f64 / total_cells as f64;

    let lengths: Vec<usize> = texts
        .iter()
        .filter(|t| !t.is_empty())
        .map(|t| t.chars().count())
        .collect();
    let avg_len = if lengths.is_empty() {
        0.0
    } else {
        lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
    };

    let has_numeric = texts.iter().any(|t| t.chars().any(|c| c.is_ascii_digit()));
    let has_header = grid.iter().flatten().any(|cell| {
        cell.is_header && !is_placeholder_cell(&cell.text.as_string())
    });

    if num_cols <= 2 && (avg_len > 60.0 || placeholder_ratio > 0.3) {
        return TableKind::LayoutProse;
    }
    if num_cols >= 3 && (has_numeric || has_header) {
        return TableKind::Data;
    }
    if placeholder_ratio > 0.5 {
        return TableKind::LayoutProse;
    }
    TableKind::Unknown
}

/// Rendered table text, with cell spans relative to its first byte.
#[derive(Debug, Default)]
pub(crate) struct RenderedTable {
    pub kind: TableKind,
    pub chars: Vec<(char, Option<CharSource>)>,
    pub cells: Vec<TableCellSpan>,
    byte_len: usize,
}

impl RenderedTable {
    fn new(kind: TableKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    fn push(&mut self, ch: char, source: Option<CharSource>) {
        self.byte_len += ch.len_utf8();
        self.chars.push((ch, source));
    }

    fn push_str(&mut self, text: &str) {
        for ch in text.chars() {
            self.push(ch, None);
        }
    }

    fn push_cell(&mut self, text: &CellText) {
        for (ch, source) in &text.chars {
            self.push(*ch, *source);
        }
    }

    /// Markdown-escaped cell text; returns the cell's relative byte range.
    fn push_markdown_cell(&mut self, text: &CellText) -> (usize, usize) {
        let start = self.byte_len;
        for (ch, source) in &text.chars {
            match ch {
                '|' => {
                    self.push('\\', None);
                    self.push('|', *source);
                }
                '\n' => self.push(' ', *source),
                other => self.push(*other, *source),
            }
        }
        (start, self.byte_len)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

/// Cell with placeholders blanked out.
fn cleaned(cell: Option<&GridCell>) -> CellText {
    match cell {
        Some(cell) if !is_placeholder_cell(&cell.text.as_string()) => cell.text.clone(),
        _ => CellText::default(),
    }
}

/// Render a parsed structured table. `None` when no row markup was found.
pub(crate) fn render_structured(parsed: ParsedTable) -> Option<RenderedTable> {
    if !parsed.saw_row_markup {
        return None;
    }
    let grid = build_grid(parsed.rows);
    let kind = classify(&grid);
    match kind {
        TableKind::Empty => Some(RenderedTable::new(TableKind::Empty)),
        TableKind::Data => {
            let rendered = render_markdown(&grid);
            if rendered.is_empty() {
                Some(render_layout(&grid, TableKind::Unknown))
            } else {
                Some(rendered)
            }
        }
        other => Some(render_layout(&grid, other)),
    }
}

/// `label: value` lines, one per row with content.
fn render_layout(grid: &[Vec<GridCell>], kind: TableKind) -> RenderedTable {
    let mut out = RenderedTable::new(kind);
    for row in grid {
        let cells: Vec<CellText> = row
            .iter()
            .map(|cell| cleaned(Some(cell)))
            .filter(|text| !text.is_empty())
            .collect();
        let Some((label, rest)) = cells.split_first() else {
            continue;
        };
        if !out.is_empty() {
            out.push('\n', None);
        }
        out.push_cell(label);
        if rest.is_empty() {
            continue;
        }
        let separator = if label.chars.len() <= MAX_LABEL_CHARS {
            ": "
        } else {
            " "
        };
        out.push_str(separator);
        for (idx, value) in rest.iter().enumerate() {
            if idx > 0 {
                out.push(' ', None);
            }
            out.push_cell(value);
        }
    }
    out
}

/// Markdown pipe table with a span for every non-placeholder cell.
fn render_markdown(grid: &[Vec<GridCell>]) -> RenderedTable {
    let mut out = RenderedTable::new(TableKind::Data);
    let num_cols = grid.iter().map(Vec::len).max().unwrap_or(0);

    let rows: Vec<(usize, Vec<CellText>)> = grid
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let cells: Vec<CellText> = (0..num_cols).map(|col| cleaned(row.get(col))).collect();
            (idx, cells)
        })
        .filter(|(_, cells)| cells.iter().any(|c| !c.is_empty()))
        .collect();

    let Some(((header_idx, header), body)) = rows.split_first() else {
        return out;
    };
    if body.is_empty() {
        return out;
    }
    let header_texts: Vec<Option<String>> = header
        .iter()
        .map(|cell| (!cell.is_empty()).then(|| cell.as_string()))
        .collect();

    out.push('|', None);
    for (col, cell) in header.iter().enumerate() {
        out.push(' ', None);
        if cell.is_empty() {
            out.push_str(&format!("Column {}", col + 1));
        } else {
            let (start, end) = out.push_markdown_cell(cell);
            out.cells.push(TableCellSpan {
                row: *header_idx,
                col,
                start,
                end,
                row_header: None,
                col_header: None,
            });
        }
        out.push_str(" |");
    }
    out.push_str("\n|");
    for _ in 0..num_cols {
        out.push_str(" --- |");
    }

    for (row_idx, cells) in body {
        out.push_str("\n|");
        let row_header = cells
            .first()
            .filter(|cell| !cell.is_empty())
            .map(CellText::as_string);
        for (col, cell) in cells.iter().enumerate() {
            // Spacer cell: a bare ` |`.
            if cell.is_empty() {
                out.push_str(" |");
                continue;
            }
            out.push(' ', None);
            let (start, end) = out.push_markdown_cell(cell);
            out.cells.push(TableCellSpan {
                row: *row_idx,
                col,
                start,
                end,
                row_header: if col > 0 { row_header.clone() } else { None },
                col_header: header_texts.get(col).cloned().flatten(),
            });
            out.push_str(" |");
        }
    }
    out
}

/// Read `<TAG>value` lines from a table region without row markup.
pub(crate) fn render_tag_table(
    raw: &str,
    start: usize,
    end: usize,
    decode_entities: bool,
    normalize_unicode: bool,
) -> RenderedTable {
    let mut pairs: Vec<(CellText, CellText)> = Vec::new();
    let mut line_start = start;
    while line_start < end {
        let line_end = raw[line_start..end]
            .find('\n')
            .map_or(end, |offset| line_start + offset);
        if let Some(pair) =
            parse_tag_line(raw, line_start, line_end, decode_entities, normalize_unicode)
        {
            pairs.push(pair);
        }
        line_start = line_end + 1;
    }

    let mut out = RenderedTable::new(TableKind::TagTable);
    if pairs.is_empty() {
        return out;
    }
    out.push_str("| Field | Value |\n| --- | --- |");
    for (key, value) in &pairs {
        out.push_str("\n| ");
        out.push_markdown_cell(key);
        out.push_str(" | ");
        out.push_markdown_cell(value);
        out.push_str(" |");
    }
    out
}

fn parse_tag_line(
    raw: &str,
    line_start: usize,
    line_end: usize,
    decode_entities: bool,
    normalize_unicode: bool,
) -> Option<(CellText, CellText)> {
    let line = &raw[line_start..line_end];
    let lead = line.len() - line.trim_start().len();
    let open = line_start + lead;
    if !raw[open..line_end].starts_with('<') {
        return None;
    }
    let bytes = raw.as_bytes();
    let key_start = open + 1;
    let mut key_end = key_start;
    while key_end < line_end
        && (bytes[key_end].is_ascii_alphanumeric() || bytes[key_end] == b'-')
    {
        key_end += 1;
    }
    if key_end == key_start || key_end >= line_end || bytes[key_end] != b'>' {
        return None;
    }

    let mut key = CellText::default();
    for (offset, ch) in raw[key_start..key_end].char_indices() {
        let at = key_start + offset;
        key.push(
            ch.to_ascii_uppercase(),
            Some(CharSource {
                start: at,
                end: at + 1,
            }),
        );
    }

    let mut value = CellText::default();
    let mut cursor = key_end + 1;
    while cursor < line_end {
        if bytes[cursor] == b'<' {
            cursor = raw[cursor..line_end]
                .find('>')
                .map_or(line_end, |offset| cursor + offset + 1);
            value.push_break();
            continue;
        }
        let next = raw[cursor..line_end]
            .find('<')
            .map_or(line_end, |offset| cursor + offset);
        decode_text(raw, cursor, next, decode_entities, normalize_unicode, |ch, src| {
            value.push(ch, Some(src));
        });
        cursor = next;
    }

    if value.is_empty() {
        return None;
    }
    Some((key, value))
}
