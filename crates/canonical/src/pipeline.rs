use std::time::Instant;

use tracing::{debug, warn};

use crate::config::CanonicalizeConfig;
use crate::document::{CanonicalizationResult, CharSource, TableKind, TableRegion};
use crate::emit::{decode_text, Emitter};
use crate::error::CanonicalError;
use crate::hash::hash_canonical_bytes;
use crate::table::{self, RenderedTable};
use crate::tags::{self, parse_tag, TagToken};

/// Main entry point. Scans `raw` once, left to right, and returns canonical
/// text with per-character provenance.
///
/// Malformed markup never fails the call; only an empty `source_id` or an
/// invalid config does.
pub fn canonicalize(
    source_id: impl Into<String>,
    raw: &str,
    cfg: &CanonicalizeConfig,
) -> Result<CanonicalizationResult, CanonicalError> {
    cfg.validate()?;

    let source_id: String = source_id.into();
    let trimmed = source_id.trim();
    if trimmed.is_empty() {
        return Err(CanonicalError::MissingSourceId);
    }
    let source_id = if source_id.len() == trimmed.len() {
        source_id
    } else {
        trimmed.to_string()
    };

    let start = Instant::now();
    let mut scanner = Scanner::new(raw, cfg);
    if cfg.treat_as_html {
        scanner.run_html();
    } else {
        scanner.run_plain();
    }
    let (text, char_sources, tables) = scanner.finish();

    let sha256_hex = hash_canonical_bytes(cfg.version, text.as_bytes());
    debug!(
        source_id = %source_id,
        raw_len = raw.len(),
        canonical_len = text.len(),
        tables = tables.len(),
        elapsed_micros = start.elapsed().as_micros(),
        "canonicalize_complete"
    );

    Ok(CanonicalizationResult::new(
        source_id,
        text,
        char_sources,
        tables,
        sha256_hex,
        cfg.version,
    ))
}

/// Single-pass scanner state. One per call; nothing is shared.
struct Scanner<'a> {
    raw: &'a str,
    cfg: &'a CanonicalizeConfig,
    emitter: Emitter,
    skip_stack: Vec<String>,
    tables: Vec<TableRegion>,
    next_table_index: usize,
}

impl<'a> Scanner<'a> {
    fn new(raw: &'a str, cfg: &'a CanonicalizeConfig) -> Self {
        Self {
            raw,
            cfg,
            emitter: Emitter::new(cfg.treat_as_html),
            skip_stack: Vec::new(),
            tables: Vec::new(),
            next_table_index: 1,
        }
    }

    fn run_html(&mut self) {
        let raw = self.raw;
        let bytes = raw.as_bytes();
        let len = raw.len();
        let mut i = 0;

        while i < len {
            if let Some(top) = self.skip_stack.last() {
                if bytes[i] == b'<' {
                    let (token, next) = parse_tag(raw, i);
                    if matches!(&token, Some(t) if t.is_end_of(top)) {
                        self.skip_stack.pop();
                    }
                    i = next;
                } else {
                    i = next_tag(raw, i);
                }
                continue;
            }

            if bytes[i] == b'<' {
                let (token, next) = parse_tag(raw, i);
                i = match token {
                    Some(token) if token.is_start_of("table") && !token.is_self_closing => {
                        self.handle_table(next)
                    }
                    Some(token) => {
                        self.handle_tag(token);
                        next
                    }
                    None => next,
                };
            } else {
                let next = next_tag(raw, i);
                self.append_text(i, next);
                i = next;
            }
        }
    }

    fn run_plain(&mut self) {
        let raw = self.raw;
        let mut chars = raw.char_indices().peekable();
        while let Some((pos, ch)) = chars.next() {
            if ch == '\r' {
                let end = match chars.peek() {
                    Some((next_pos, '\n')) => {
                        let end = next_pos + 1;
                        chars.next();
                        end
                    }
                    _ => pos + 1,
                };
                self.emitter
                    .emit_char('\n', Some(CharSource { start: pos, end }));
                continue;
            }
            decode_text(
                raw,
                pos,
                pos + ch.len_utf8(),
                false,
                self.cfg.normalize_unicode,
                |folded, src| self.emitter.emit_char(folded, Some(src)),
            );
        }
    }

    fn handle_tag(&mut self, token: TagToken<'_>) {
        if token.is_start && tags::is_skip_content(&token.name) {
            self.skip_stack.push(token.name);
            return;
        }
        if tags::is_block(&token.name) {
            self.emitter.mark_block_break();
        }
        if token.is_start && tags::is_line_break(&token.name) {
            self.emitter.emit_line_break(None);
        }
    }

    fn append_text(&mut self, start: usize, end: usize) {
        let emitter = &mut self.emitter;
        decode_text(
            self.raw,
            start,
            end,
            true,
            self.cfg.normalize_unicode,
            |ch, src| emitter.emit_char(ch, Some(src)),
        );
    }

    /// Render the table whose body starts at `content_start` and return the
    /// index to resume scanning from.
    fn handle_table(&mut self, content_start: usize) -> usize {
        self.emitter.mark_block_break();
        let table_index = self.next_table_index;
        self.next_table_index += 1;

        let normalize = self.cfg.normalize_unicode;
        let parsed = table::parse_table(self.raw, content_start, true, normalize);
        let (content_end, resume_at) = (parsed.content_end, parsed.resume_at);

        let rendered = match table::render_structured(parsed) {
            Some(rendered) => rendered,
            None => table::render_tag_table(self.raw, content_start, content_end, true, normalize),
        };

        if rendered.is_empty() {
            let no_grid = matches!(rendered.kind, TableKind::TagTable | TableKind::Empty);
            if no_grid && has_visible_text(&self.raw[content_start..content_end]) {
                warn!(
                    table_index,
                    kind = rendered.kind.as_str(),
                    "table_rendered_empty_falling_back_to_text"
                );
                // Rescan the body as ordinary markup; `table` is a block tag
                // so the closing tag still ends the paragraph.
                return content_start;
            }
            debug!(table_index, "table_empty");
            self.emitter.mark_block_break();
            return resume_at;
        }

        debug!(
            table_index,
            kind = rendered.kind.as_str(),
            cells = rendered.cells.len(),
            "table_rendered"
        );
        self.emit_table(table_index, rendered);
        self.emitter.mark_block_break();
        resume_at
    }

    fn emit_table(&mut self, table_index: usize, rendered: RenderedTable) {
        self.emitter.apply_pending_break();
        let base = self.emitter.len();
        for (ch, source) in rendered.chars {
            self.emitter.push_raw(ch, source);
        }
        let cells = rendered
            .cells
            .into_iter()
            .map(|mut cell| {
                cell.start += base;
                cell.end += base;
                cell
            })
            .collect();
        self.tables.push(TableRegion {
            table_index,
            kind: rendered.kind,
            start: base,
            end: self.emitter.len(),
            cells,
        });
    }

    fn finish(self) -> (String, Vec<Option<CharSource>>, Vec<TableRegion>) {
        let (text, sources) = self.emitter.finish();
        (text, sources, self.tables)
    }
}

fn next_tag(raw: &str, from: usize) -> usize {
    raw[from..].find('<').map_or(raw.len(), |offset| from + offset)
}

/// Whether a markup fragment has any non-whitespace text outside its tags.
fn has_visible_text(fragment: &str) -> bool {
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag && !c.is_whitespace() => return true,
            _ => {}
        }
    }
    false
}
