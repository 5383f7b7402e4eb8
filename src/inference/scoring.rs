//! Confidence heuristic and answer normalization.

use rand::Rng;

use super::config::AnswerFormat;

/// Lowest confidence a provider-backed result can report.
pub const MIN_CONFIDENCE: f64 = 0.1;
/// Highest confidence a provider-backed result can report.
pub const MAX_CONFIDENCE: f64 = 0.95;
/// Half-width of the uniform jitter added to the base score.
pub const JITTER: f64 = 0.05;

const FALLBACK_ACTIVITY: &str = "Unknown activity";

// ─── Confidence ──────────────────────────────────────────────────────────────

/// Deterministic part of the confidence score.
///
/// Lengths are counted in characters of the trimmed input.
pub fn base_confidence(input: &str, answer: &str, prefix: &str) -> f64 {
    let mut score = 0.3;

    score += match input.trim().chars().count() {
        n if n < 20 => 0.1,
        n if n < 100 => 0.2,
        n if n < 500 => 0.3,
        _ => 0.4,
    };

    if answer.starts_with(prefix) {
        score += 0.1;
    }

    let substantive = answer.replace(prefix, "");
    let substantive_len = substantive.trim().chars().count();
    if substantive_len > 20 {
        score += 0.1;
    } else if substantive_len < 10 {
        score -= 0.1;
    }

    score
}

/// Apply `jitter` and clamp into `[MIN_CONFIDENCE, MAX_CONFIDENCE]`.
pub fn finalize_confidence(base: f64, jitter: f64) -> f64 {
    (base + jitter).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// Full confidence score with random jitter.
pub fn confidence(input: &str, answer: &str, prefix: &str) -> f64 {
    let jitter = rand::thread_rng().gen_range(-JITTER..=JITTER);
    finalize_confidence(base_confidence(input, answer, prefix), jitter)
}

// ─── Formatting ──────────────────────────────────────────────────────────────

/// The `{…}` span of `text`, from the first `{` to the last `}`.
pub fn extract_json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Turn a provider answer into a label carrying `prefix`.
pub fn format_label(answer: &str, prefix: &str, format: AnswerFormat) -> String {
    if format == AnswerFormat::JsonActivity {
        if let Some(activity) = activity_from_json(answer, prefix) {
            return format!("{prefix} {activity}");
        }
        tracing::debug!("answer is not a JSON activity object; using plain formatting");
    }

    if answer.starts_with(prefix) {
        answer.to_string()
    } else {
        format!("{prefix} {answer}")
    }
}

fn activity_from_json(answer: &str, prefix: &str) -> Option<String> {
    let stripped = answer.strip_prefix(prefix).unwrap_or(answer).trim();
    let candidate = if stripped.starts_with('{') {
        stripped
    } else {
        extract_json_span(answer)?
    };

    let value: serde_json::Value = serde_json::from_str(candidate).ok()?;
    let object = value.as_object()?;
    Some(match object.get("activity") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => FALLBACK_ACTIVITY.to_string(),
        Some(other) => other.to_string(),
    })
}

// ─── Prompt ──────────────────────────────────────────────────────────────────

/// Truncate to `max_chars` characters (appending `...` when cut) and wrap in
/// the screen-content envelope.
pub fn screen_prompt(text: &str, max_chars: usize) -> String {
    let truncated: String = if text.chars().count() > max_chars {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    };
    format!("<Screen Content>\n{truncated}\n</Screen Content>")
}
