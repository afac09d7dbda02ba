//! Hot zones: the prompt-view text of the best-scoring plan segments.
//!
//! Segments at or above a score threshold (optionally with a given
//! verdict) are mapped back onto prompt-view entries and the covered
//! entries are emitted, in prompt order, under a short Markdown report.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anchor::{PromptEntry, PromptView};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::{ScoreReport, SegmentScore};
use crate::error::PlanError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotZoneConfig {
    /// Minimum score for a segment to be included.
    pub threshold: f64,
    /// Only include segments with exactly this verdict.
    pub verdict: Option<String>,
}

impl Default for HotZoneConfig {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            verdict: None,
        }
    }
}

impl HotZoneConfig {
    pub fn validate(&self) -> Result<(), PlanError> {
        if !self.threshold.is_finite() {
            return Err(PlanError::InvalidConfig("threshold must be finite".into()));
        }
        Ok(())
    }
}

/// Selected segments and the prompt entries they cover.
#[derive(Debug, Clone, PartialEq)]
pub struct HotZone {
    pub threshold: f64,
    pub question: String,
    pub plan_path: String,
    /// Included segments ordered by where their range starts.
    pub segments: Vec<SegmentScore>,
    /// Covered entries in prompt order, each once.
    pub entries: Vec<PromptEntry>,
}

impl HotZone {
    pub fn anchor_count(&self) -> usize {
        self.entries.len()
    }

    /// The Markdown report. `scores_path` and `prompt_view_path` are only
    /// echoed into the header.
    pub fn render_markdown(&self, scores_path: &str, prompt_view_path: &str) -> String {
        let mut lines = vec![
            format!("# Pricing Hot Zone (score ≥ {})\n", format_number(self.threshold)),
            format!("Source plan: {}", self.plan_path),
            format!("Scores: {scores_path}"),
        ];
        if !self.question.is_empty() {
            lines.push(format!("Question: {}", self.question));
        }
        lines.push(format!("Prompt view: {prompt_view_path}"));
        lines.push(String::new());
        lines.push("## Included segments".to_string());
        for seg in &self.segments {
            let name = if seg.name.is_empty() { "unnamed" } else { &seg.name };
            lines.push(format!(
                "- {}: {} (range {}–{}, score={})",
                seg.seg_id,
                name,
                seg.range[0],
                seg.range[1],
                format_number(seg.score)
            ));
        }
        lines.push(String::new());
        lines.push(format!("Total anchors included: {}\n", self.anchor_count()));
        lines.push("## Text\n".to_string());
        lines.extend(self.entries.iter().map(|entry| entry.text.clone()));

        let mut out = lines.join("\n").trim_end_matches('\n').to_string();
        out.push('\n');
        out
    }
}

/// Select and order the segments of `report` that pass `cfg` and collect
/// the prompt entries they cover.
pub fn build_hot_zone(
    report: &ScoreReport,
    view: &PromptView,
    cfg: &HotZoneConfig,
) -> Result<HotZone, PlanError> {
    cfg.validate()?;
    let entries = view.entries();
    if entries.is_empty() {
        return Err(PlanError::EmptyPromptView);
    }
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        if index.insert(entry.anchor_id.as_str(), idx).is_some() {
            return Err(PlanError::DuplicateAnchor {
                anchor_id: entry.anchor_id.clone(),
            });
        }
    }

    let mut selected = select_segments(report, cfg)?;
    selected.sort_by_key(|seg| index.get(seg.range[0].as_str()).copied().unwrap_or(usize::MAX));

    let mut included = vec![false; entries.len()];
    for seg in &selected {
        let (start, end) = (seg.range[0].as_str(), seg.range[1].as_str());
        let (Some(&start_idx), Some(&end_idx)) = (index.get(start), index.get(end)) else {
            return Err(PlanError::UnknownAnchor {
                seg_id: seg.seg_id.clone(),
                start: start.to_string(),
                end: end.to_string(),
            });
        };
        if start_idx > end_idx {
            return Err(PlanError::InvertedRange {
                seg_id: seg.seg_id.clone(),
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        included[start_idx..=end_idx].fill(true);
    }

    let entries: Vec<PromptEntry> = entries
        .into_iter()
        .zip(included)
        .filter_map(|(entry, keep)| keep.then_some(entry))
        .collect();
    info!(
        segments = selected.len(),
        anchors = entries.len(),
        threshold = cfg.threshold,
        "hot_zone_built"
    );
    Ok(HotZone {
        threshold: cfg.threshold,
        question: report.question.clone(),
        plan_path: report.plan_path.clone(),
        segments: selected,
        entries,
    })
}

fn select_segments(
    report: &ScoreReport,
    cfg: &HotZoneConfig,
) -> Result<Vec<SegmentScore>, PlanError> {
    let mut selected = Vec::new();
    for item in &report.scores {
        if item.score < cfg.threshold {
            continue;
        }
        if cfg.verdict.as_ref().is_some_and(|v| *v != item.verdict) {
            continue;
        }
        if item.range.len() != 2 {
            return Err(PlanError::MissingRange {
                seg_id: item.seg_id.clone(),
            });
        }
        selected.push(item.clone());
    }
    if selected.is_empty() {
        return Err(PlanError::NoSegmentsSelected {
            threshold: format_number(cfg.threshold),
            verdict: cfg.verdict.clone(),
        });
    }
    Ok(selected)
}

/// Read a scores JSON file and a prompt view, build the hot zone and write
/// its Markdown report to `output_path`.
pub fn write_hot_zone(
    scores_path: &Path,
    prompt_view_path: &Path,
    output_path: &Path,
    cfg: &HotZoneConfig,
) -> Result<HotZone, PlanError> {
    let raw = fs::read_to_string(scores_path).map_err(|err| PlanError::io(scores_path, err))?;
    let report: ScoreReport = serde_json::from_str(&raw)?;
    let view = PromptView::load(prompt_view_path)?;
    let zone = build_hot_zone(&report, &view, cfg)?;

    let markdown = zone.render_markdown(
        &scores_path.display().to_string(),
        &prompt_view_path.display().to_string(),
    );
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).map_err(|err| PlanError::io(parent, err))?;
    }
    fs::write(output_path, markdown).map_err(|err| PlanError::io(output_path, err))?;
    Ok(zone)
}

/// Whole numbers keep one decimal (`1.0`), others print as-is (`0.5`).
fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}
