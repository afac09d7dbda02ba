//! The `⟦id⟧ text` view that language models read and cite from.
//!
//! One line per citable anchor (sentence, definition, table cell). A
//! sentence that is a whole Markdown table spans several lines inside a
//! fenced block; those continuation lines belong to the anchor above them.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use canonical::collapse_whitespace;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::document::CanonicalDocument;
use crate::error::AnchorError;
use crate::record::{AnchorKind, AnchorRecord, CellAttributes};
use crate::sentence::is_markdown_table;

pub const PROMPT_VIEW_FILE: &str = "prompt_view.txt";

static ANCHOR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*⟦([^⟧]+)⟧").expect("anchor line pattern is valid"));

/// Render the prompt view for `doc`.
///
/// Fails with [`AnchorError::EmptySnippet`] when a citable anchor covers
/// only whitespace.
pub fn render_prompt_view(doc: &CanonicalDocument) -> Result<String, AnchorError> {
    let mut lines = Vec::new();
    for anchor in doc.anchors().iter().filter(|a| a.kind.is_citable()) {
        let snippet = doc.snippet(anchor).trim();
        if snippet.is_empty() {
            return Err(AnchorError::EmptySnippet {
                anchor_id: anchor.anchor_id.clone(),
            });
        }
        lines.push(render_line(anchor, snippet));
    }
    Ok(lines.join("\n"))
}

fn render_line(anchor: &AnchorRecord, snippet: &str) -> String {
    let id = &anchor.anchor_id;
    match (&anchor.kind, &anchor.cell) {
        (AnchorKind::TableCell, Some(cell)) => {
            let value = collapse_whitespace(&snippet.replace("\\|", "|"));
            format!("⟦{id}⟧ {}: {value}", cell_label(cell))
        }
        _ if is_markdown_table(snippet) => format!("⟦{id}⟧ ```markdown\n{snippet}\n```"),
        _ => format!("⟦{id}⟧ {}", collapse_whitespace(snippet)),
    }
}

/// `row | col` headers when known, else the cell's grid position.
fn cell_label(cell: &CellAttributes) -> String {
    let headers: Vec<&str> = [cell.row_header.as_deref(), cell.col_header.as_deref()]
        .into_iter()
        .flatten()
        .filter(|h| !h.is_empty())
        .collect();
    if headers.is_empty() {
        format!(
            "Table {} r{} c{}",
            cell.table_index, cell.row_index, cell.col_index
        )
    } else {
        headers.join(" | ")
    }
}

/// Write `prompt_view` to `dir/prompt_view.txt`, returning the path.
pub fn write_prompt_view(prompt_view: &str, dir: &Path) -> Result<PathBuf, AnchorError> {
    fs::create_dir_all(dir).map_err(|err| AnchorError::io(dir, err))?;
    let path = dir.join(PROMPT_VIEW_FILE);
    fs::write(&path, prompt_view).map_err(|err| AnchorError::io(&path, err))?;
    debug!(path = %path.display(), bytes = prompt_view.len(), "prompt_view_written");
    Ok(path)
}

/// A parsed prompt view with line lookups by anchor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptView {
    pub lines: Vec<String>,
    pub anchor_to_line: HashMap<String, usize>,
    pub anchor_order: Vec<String>,
    pub anchor_positions: HashMap<String, usize>,
    /// Line of an anchor -> line of the following anchor (or line count).
    pub next_anchor_line: HashMap<usize, usize>,
}

/// Snippet blocks plus ids that were not in the view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnippetSelection {
    pub snippets: Vec<String>,
    pub missing: Vec<String>,
}

/// An anchor line together with its continuation lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptEntry {
    pub anchor_id: String,
    pub text: String,
}

impl PromptView {
    pub fn parse(text: &str) -> Self {
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        let mut anchor_to_line = HashMap::new();
        let mut anchor_order = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if let Some(id) = anchor_id_of(line) {
                anchor_to_line.insert(id.to_string(), idx);
                anchor_order.push(id.to_string());
            }
        }

        let anchor_positions = anchor_order
            .iter()
            .enumerate()
            .map(|(pos, id)| (id.clone(), pos))
            .collect();

        let mut next_anchor_line = HashMap::new();
        for pair in anchor_order.windows(2) {
            next_anchor_line.insert(anchor_to_line[&pair[0]], anchor_to_line[&pair[1]]);
        }
        if let Some(last) = anchor_order.last() {
            next_anchor_line
                .entry(anchor_to_line[last])
                .or_insert(lines.len());
        }

        Self {
            lines,
            anchor_to_line,
            anchor_order,
            anchor_positions,
            next_anchor_line,
        }
    }

    pub fn load(path: &Path) -> Result<Self, AnchorError> {
        let text = fs::read_to_string(path).map_err(|err| AnchorError::io(path, err))?;
        Ok(Self::parse(&text))
    }

    pub fn contains(&self, anchor_id: &str) -> bool {
        self.anchor_to_line.contains_key(anchor_id)
    }

    pub fn position(&self, anchor_id: &str) -> Option<usize> {
        self.anchor_positions.get(anchor_id).copied()
    }

    /// Lines from the `start` anchor through the `end` anchor line, trimmed.
    /// An inverted pair is swapped.
    pub fn slice(&self, start: &str, end: &str) -> Result<String, AnchorError> {
        let line_of = |id: &str| {
            self.anchor_to_line
                .get(id)
                .copied()
                .ok_or_else(|| AnchorError::unknown(id))
        };
        let mut from = line_of(start)?;
        let mut to = line_of(end)?;
        if to < from {
            std::mem::swap(&mut from, &mut to);
        }
        Ok(self.lines[from..=to].join("\n").trim().to_string())
    }

    /// Excerpts around `anchor_ids`, each widened by `bandwidth` anchors on
    /// either side. Overlapping or touching windows merge into one block and
    /// every block runs to the line before the next anchor.
    pub fn snippets<S: AsRef<str>>(&self, anchor_ids: &[S], bandwidth: usize) -> SnippetSelection {
        let requested = || anchor_ids.iter().map(|id| id.as_ref().to_string());
        if anchor_ids.is_empty() || self.anchor_order.is_empty() {
            return SnippetSelection {
                snippets: Vec::new(),
                missing: requested().collect(),
            };
        }

        let last = self.anchor_order.len() - 1;
        let mut missing = Vec::new();
        let mut selected = BTreeSet::new();
        for id in requested() {
            match self.position(&id) {
                Some(pos) => {
                    selected.extend(pos.saturating_sub(bandwidth)..=(pos + bandwidth).min(last));
                }
                None => missing.push(id),
            }
        }

        let mut blocks: Vec<(usize, usize)> = Vec::new();
        for pos in selected {
            match blocks.last_mut() {
                Some((_, end)) if pos == *end + 1 => *end = pos,
                _ => blocks.push((pos, pos)),
            }
        }

        let snippets = blocks
            .into_iter()
            .filter_map(|(first_pos, last_pos)| {
                let start_line = self.anchor_to_line[&self.anchor_order[first_pos]];
                let end_anchor_line = self.anchor_to_line[&self.anchor_order[last_pos]];
                let end_line = self
                    .next_anchor_line
                    .get(&end_anchor_line)
                    .copied()
                    .unwrap_or(self.lines.len());
                let excerpt = self.lines[start_line..end_line].join("\n").trim().to_string();
                (!excerpt.is_empty()).then_some(excerpt)
            })
            .collect();

        SnippetSelection { snippets, missing }
    }

    /// Anchor lines with their continuation lines. Lines before the first
    /// anchor are dropped.
    pub fn entries(&self) -> Vec<PromptEntry> {
        let mut entries: Vec<PromptEntry> = Vec::new();
        for line in &self.lines {
            if let Some(id) = anchor_id_of(line) {
                entries.push(PromptEntry {
                    anchor_id: id.to_string(),
                    text: line.clone(),
                });
            } else if let Some(current) = entries.last_mut() {
                current.text.push('\n');
                current.text.push_str(line);
            }
        }
        for entry in &mut entries {
            let trimmed = entry.text.trim_end_matches('\n').len();
            entry.text.truncate(trimmed);
        }
        entries
    }
}

fn anchor_id_of(line: &str) -> Option<&str> {
    ANCHOR_LINE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
