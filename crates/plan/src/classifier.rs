//! Relevance scoring of plan segments by an external classifier.
//!
//! The classifier is opaque: it receives prompt text and answers with text
//! that should be a JSON object `{score, verdict, rationale}`. Transport,
//! model choice and credentials live with the implementor.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, Level};

use crate::error::PlanError;
use crate::retry::{execute_with_retry, RetryConfig};

/// Anything that turns prompt text into response text.
pub trait Classifier: Send + Sync {
    fn classify(&self, prompt: &str) -> Result<String, String>;
}

impl<F> Classifier for F
where
    F: Fn(&str) -> Result<String, String> + Send + Sync,
{
    fn classify(&self, prompt: &str) -> Result<String, String> {
        self(prompt)
    }
}

/// A classifier with an attempt budget and backoff between failures.
#[derive(Debug, Clone)]
pub struct RetryingClassifier<C> {
    inner: C,
    retry: RetryConfig,
}

impl<C: Classifier> RetryingClassifier<C> {
    pub fn new(inner: C, retry: RetryConfig) -> Result<Self, PlanError> {
        retry.validate()?;
        Ok(Self { inner, retry })
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Trimmed response text, or [`PlanError::ClassifierExhausted`] once
    /// every attempt has failed.
    pub fn classify(&self, prompt: &str) -> Result<String, PlanError> {
        execute_with_retry(&self.retry, |_attempt| {
            self.inner
                .classify(prompt)
                .map(|text| text.trim().to_string())
        })
        .into_result()
    }
}

/// Segment fields offered to a prompt renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPrompt<'a> {
    pub question: &'a str,
    pub seg_id: String,
    pub name: String,
    pub summary: String,
    pub tags: Vec<String>,
    /// Plan-level keywords joined by `, `, or `N/A`.
    pub keywords: &'a str,
}

/// One scored segment. Also the row format of a scores file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentScore {
    pub seg_id: String,
    pub name: String,
    pub score: f64,
    pub verdict: String,
    pub rationale: String,
    pub range: Vec<String>,
    pub tags: Vec<String>,
}

impl Default for SegmentScore {
    fn default() -> Self {
        Self {
            seg_id: String::new(),
            name: String::new(),
            score: 0.0,
            verdict: String::new(),
            rationale: String::new(),
            range: Vec::new(),
            tags: Vec::new(),
        }
    }
}

/// Scores for one plan and question, as written to and read from disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreReport {
    pub question: String,
    pub plan_path: String,
    pub scores: Vec<SegmentScore>,
}

/// The default scoring prompt.
pub fn render_scoring_prompt(prompt: &SegmentPrompt<'_>) -> String {
    format!(
        "Question: {question}\n\
         \n\
         Segment metadata:\n\
         - id: {seg_id}\n\
         - name: {name}\n\
         - summary: {summary}\n\
         - tags: {tags}\n\
         - global_keywords: {keywords}\n\
         \n\
         Return JSON exactly:\n\
         {{\n  \"score\": <0|0.5|1>,\n  \"verdict\": \"<include|skip>\",\n  \"rationale\": \"<concise reason>\"\n}}\n\
         \n\
         Rules:\n\
         - Score 1 when the segment directly answers the question.\n\
         - Score 0.5 when it provides definitions or conditions needed to interpret the answer.\n\
         - Score 0 when it is unrelated.",
        question = prompt.question.trim(),
        seg_id = prompt.seg_id,
        name = prompt.name,
        summary = prompt.summary,
        tags = prompt.tags.join(", "),
        keywords = prompt.keywords,
    )
}

/// Ask the classifier about every segment of `plan` and return the scores,
/// highest first. Ties keep plan order.
pub fn score_segments<C, R>(
    plan: &Value,
    question: &str,
    classifier: &RetryingClassifier<C>,
    render: R,
) -> Result<Vec<SegmentScore>, PlanError>
where
    C: Classifier,
    R: Fn(&SegmentPrompt<'_>) -> String,
{
    let started = Instant::now();
    let span = tracing::span!(Level::DEBUG, "plan.score");
    let _guard = span.enter();

    let keywords = strings(plan.get("keywords")).join(", ");
    let keywords = if keywords.is_empty() {
        "N/A".to_string()
    } else {
        keywords
    };
    let segments = plan
        .get("segments")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut results = Vec::with_capacity(segments.len());
    for segment in segments {
        let seg_id = text(segment.get("seg_id"));
        let name = text(segment.get("name"));
        let prompt = SegmentPrompt {
            question,
            seg_id: if seg_id.is_empty() {
                "<unknown>".to_string()
            } else {
                seg_id.clone()
            },
            name: name.clone(),
            summary: text(segment.get("summary")),
            tags: strings(segment.get("tags")),
            keywords: &keywords,
        };
        let payload = classifier.classify(&render(&prompt))?;
        let mut score = parse_response(&seg_id, &payload)?;
        score.seg_id = seg_id;
        score.name = name;
        score.range = strings(segment.get("range"));
        score.tags = prompt.tags;
        debug!(seg_id = %score.seg_id, score = score.score, verdict = %score.verdict, "segment_scored");
        results.push(score);
    }

    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    info!(
        segments = results.len(),
        elapsed_micros = started.elapsed().as_micros(),
        "segments_scored"
    );
    Ok(results)
}

/// Pull `score`, `verdict` and `rationale` out of a classifier answer.
///
/// A missing score counts as 0 and a missing verdict as `skip`. Scores may
/// be numbers or numeric strings.
pub fn parse_response(seg_id: &str, payload: &str) -> Result<SegmentScore, PlanError> {
    let invalid = |reason: String| PlanError::InvalidResponse {
        seg_id: seg_id.to_string(),
        reason,
    };
    let value: Value =
        serde_json::from_str(payload.trim()).map_err(|err| invalid(format!("{err}: {payload}")))?;
    let Value::Object(map) = value else {
        return Err(invalid(format!("expected a JSON object: {payload}")));
    };

    let score = match map.get("score") {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| invalid(format!("score {n} is not a float")))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|err| invalid(format!("score {s:?}: {err}")))?,
        Some(other) => return Err(invalid(format!("score {other} is not a number"))),
    };

    Ok(SegmentScore {
        score,
        verdict: map
            .get("verdict")
            .and_then(Value::as_str)
            .unwrap_or("skip")
            .to_string(),
        rationale: text(map.get("rationale")),
        ..SegmentScore::default()
    })
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().map(|item| text(Some(item))).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use serde_json::json;

    fn fast_retry(attempts: u32) -> RetryConfig {
        RetryConfig::default()
            .with_max_attempts(attempts)
            .with_base_delay(Duration::ZERO)
            .with_jitter(false)
    }

    fn plan() -> Value {
        json!({
            "keywords": ["margin", "SOFR"],
            "segments": [
                {"seg_id": "defs", "name": "Definitions", "range": ["s000001", "s000004"], "summary": "defined terms", "tags": ["defs"]},
                {"seg_id": "rates", "name": "Interest", "range": ["s000005", "s000009"], "summary": "applicable margin grid", "tags": []},
                {"seg_id": "misc", "range": ["s000010", "s000010"]}
            ]
        })
    }

    #[test]
    fn scores_sorted_descending() {
        let classifier = |prompt: &str| -> Result<String, String> {
            let body = if prompt.contains("id: rates") {
                r#"{"score": 1, "verdict": "include", "rationale": "margin grid"}"#
            } else if prompt.contains("id: defs") {
                r#"{"score": "0.5", "verdict": "include"}"#
            } else {
                "{}"
            };
            Ok(format!("  {body}\n"))
        };
        let retrying = RetryingClassifier::new(classifier, fast_retry(1)).expect("config");
        let scores = score_segments(&plan(), "How is pricing set?", &retrying, render_scoring_prompt)
            .expect("scores");

        let order: Vec<(&str, f64, &str)> = scores
            .iter()
            .map(|s| (s.seg_id.as_str(), s.score, s.verdict.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("rates", 1.0, "include"), ("defs", 0.5, "include"), ("misc", 0.0, "skip")]
        );
        assert_eq!(scores[0].range, vec!["s000005", "s000009"]);
        assert_eq!(scores[1].tags, vec!["defs"]);
        assert_eq!(scores[0].rationale, "margin grid");
    }

    #[test]
    fn prompt_carries_segment_metadata() {
        let prompt = SegmentPrompt {
            question: "  What is the margin?  ",
            seg_id: "rates".into(),
            name: "Interest".into(),
            summary: "grid".into(),
            tags: vec!["pricing".into(), "grid".into()],
            keywords: "N/A",
        };
        let text = render_scoring_prompt(&prompt);
        assert!(text.starts_with("Question: What is the margin?\n"));
        assert!(text.contains("- tags: pricing, grid\n"));
        assert!(text.contains("- global_keywords: N/A\n"));
        assert!(text.contains("\"verdict\": \"<include|skip>\""));
    }

    #[test]
    fn keywords_default_to_na() {
        let seen = std::sync::Mutex::new(Vec::new());
        let classifier = |prompt: &str| -> Result<String, String> {
            if let Ok(mut prompts) = seen.lock() {
                prompts.push(prompt.to_string());
            }
            Ok(r#"{"score": 0}"#.to_string())
        };
        let retrying = RetryingClassifier::new(&classifier, fast_retry(1)).expect("config");
        let plan = json!({"segments": [{"seg_id": "only", "range": ["s000001", "s000001"]}]});
        score_segments(&plan, "q", &retrying, |p| p.keywords.to_string()).expect("scores");
        let prompts = seen.lock().expect("lock");
        assert_eq!(prompts.as_slice(), ["N/A"]);
    }

    #[test]
    fn transient_failures_are_retried() {
        let calls = AtomicU32::new(0);
        let flaky = |_prompt: &str| -> Result<String, String> {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err("HTTP 503".to_string())
            } else {
                Ok(r#"{"score": 1, "verdict": "include"}"#.to_string())
            }
        };
        let retrying = RetryingClassifier::new(&flaky, fast_retry(3)).expect("config");
        assert_eq!(
            retrying.classify("prompt"),
            Ok(r#"{"score": 1, "verdict": "include"}"#.to_string())
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn exhausted_classifier_surfaces_attempt_count() {
        let down = |_prompt: &str| -> Result<String, String> { Err("connection refused".into()) };
        let retrying = RetryingClassifier::new(down, fast_retry(3)).expect("config");
        let err = score_segments(&plan(), "q", &retrying, render_scoring_prompt)
            .expect_err("exhausted");
        assert_eq!(
            err,
            PlanError::ClassifierExhausted {
                attempts: 3,
                last_error: "connection refused".into()
            }
        );
    }

    #[test]
    fn unparseable_answers_are_rejected() {
        assert!(matches!(
            parse_response("rates", "Sure! Score: 1"),
            Err(PlanError::InvalidResponse { .. })
        ));
        assert!(matches!(
            parse_response("rates", "[1, 2]"),
            Err(PlanError::InvalidResponse { .. })
        ));
        assert!(matches!(
            parse_response("rates", r#"{"score": "high"}"#),
            Err(PlanError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn zero_attempt_budget_is_rejected() {
        let ok = |_prompt: &str| -> Result<String, String> { Ok("{}".into()) };
        assert!(matches!(
            RetryingClassifier::new(ok, fast_retry(0)),
            Err(PlanError::InvalidConfig(_))
        ));
    }
}
