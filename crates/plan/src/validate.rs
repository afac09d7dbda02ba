//! Structural checks for plan JSON produced by an external classifier.
//!
//! A plan must cover every sentence anchor exactly once with contiguous,
//! ordered segments. Overlays and frames may point anywhere, but only at
//! anchors that exist.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::debug;

const UNKNOWN: &str = "<unknown>";

/// Check `plan` against the ordered sentence anchor ids of its document.
///
/// Never fails: every problem found is returned as a message, in the order
/// found. An empty vector means the plan is valid.
///
/// ```rust
/// use plan::validate_plan;
/// use serde_json::json;
///
/// let ids: Vec<String> = ["s000001", "s000002", "s000003"].map(String::from).to_vec();
/// let plan = json!({"segments": [
///     {"seg_id": "a", "range": ["s000001", "s000002"]},
///     {"seg_id": "b", "range": ["s000003", "s000003"]},
/// ]});
/// assert!(validate_plan(&plan, &ids).is_empty());
/// ```
pub fn validate_plan(plan: &Value, sentence_ids: &[String]) -> Vec<String> {
    let ordinal: HashMap<&str, usize> = sentence_ids
        .iter()
        .enumerate()
        .map(|(idx, id)| (id.as_str(), idx))
        .collect();

    let segments = match plan.get("segments").and_then(Value::as_array) {
        Some(segments) if !segments.is_empty() => segments,
        _ => return vec!["segments array missing or empty".to_string()],
    };

    let mut errors = Vec::new();
    let mut last_idx: Option<usize> = None;
    for segment in segments {
        let seg_id = label(segment.get("seg_id"));
        let Some((start, end)) = pair(segment.get("range")) else {
            errors.push(format!("segment {seg_id} range must be [start,end]"));
            continue;
        };
        let (Some(start_idx), Some(end_idx)) = (lookup(&ordinal, start), lookup(&ordinal, end))
        else {
            errors.push(format!(
                "segment {seg_id} references unknown anchors {}-{}",
                label(Some(start)),
                label(Some(end))
            ));
            continue;
        };
        if start_idx > end_idx {
            errors.push(format!(
                "segment {seg_id} start {} > end {}",
                label(Some(start)),
                label(Some(end))
            ));
            continue;
        }
        let expected = last_idx.map_or(0, |idx| idx + 1);
        if start_idx != expected {
            errors.push(format!(
                "segment {seg_id} begins at {} but expected contiguous anchor",
                label(Some(start))
            ));
        }
        last_idx = Some(end_idx);
    }

    if let Some(final_id) = sentence_ids.last() {
        if last_idx != Some(sentence_ids.len() - 1) {
            let reached = last_idx.map_or("N/A", |idx| sentence_ids[idx].as_str());
            errors.push(format!(
                "segments end at {reached} but expected {final_id}"
            ));
        }
    }

    let valid: HashSet<&str> = ordinal.keys().copied().collect();
    if let Some(overlays) = plan.get("overlays").and_then(Value::as_array) {
        check_spans(overlays, "overlay", &valid, &mut errors);
    }
    if let Some(frames) = plan.get("frames").and_then(Value::as_array) {
        check_spans(frames, "frame", &valid, &mut errors);
        for frame in frames {
            let name = label(frame.get("name"));
            let deps = frame.get("dependencies").and_then(Value::as_array);
            for dep in deps.into_iter().flatten() {
                if !dep.as_str().is_some_and(|id| valid.contains(id)) {
                    errors.push(format!(
                        "frame {name} dependency {} is not a known sentence anchor",
                        label(Some(dep))
                    ));
                }
            }
        }
    }

    debug!(
        segments = segments.len(),
        sentence_anchors = sentence_ids.len(),
        problems = errors.len(),
        "plan_validated"
    );
    errors
}

fn check_spans(entries: &[Value], kind: &str, valid: &HashSet<&str>, errors: &mut Vec<String>) {
    for entry in entries {
        let name = label(entry.get("name"));
        let spans = entry.get("spans").and_then(Value::as_array);
        for span in spans.into_iter().flatten() {
            let Some((start, end)) = pair(Some(span)) else {
                errors.push(format!("{kind} {name} span must be [start,end]"));
                continue;
            };
            let known = |v: &Value| v.as_str().is_some_and(|id| valid.contains(id));
            if !known(start) || !known(end) {
                errors.push(format!(
                    "{kind} {name} references unknown anchors {}-{}",
                    label(Some(start)),
                    label(Some(end))
                ));
            }
        }
    }
}

/// A two-element JSON array.
fn pair(value: Option<&Value>) -> Option<(&Value, &Value)> {
    match value?.as_array()?.as_slice() {
        [start, end] => Some((start, end)),
        _ => None,
    }
}

fn lookup(ordinal: &HashMap<&str, usize>, value: &Value) -> Option<usize> {
    value.as_str().and_then(|id| ordinal.get(id).copied())
}

/// Display form of an id or name: strings verbatim, other JSON as JSON,
/// absent as `<unknown>`.
fn label(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => UNKNOWN.to_string(),
    }
}
