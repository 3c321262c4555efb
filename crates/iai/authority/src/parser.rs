//! Turning raw oracle text into a decision.
//!
//! Oracle output is untrusted: it may wrap the JSON in prose or markdown
//! fences, omit optional fields, or not be JSON at all. Parsing either yields
//! a complete [`AuthorityDecision`] or a [`ParsedDecision::Failed`] that the
//! Authority folds into a fail-closed REJECT. A partially-read payload never
//! escapes this module.

use iai_types::{clamp_confidence, AuthorityDecision, FailureKind, ModifiedProposal, Verdict};
use serde_json::{Map, Value};

/// Concern added when a MODIFY payload cannot change anything.
pub const NOT_ACTIONABLE_CONCERN: &str = "modified proposal not actionable";

const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Outcome of parsing one oracle response.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedDecision {
    Parsed(AuthorityDecision),
    Failed { kind: FailureKind, reason: String },
}

impl ParsedDecision {
    fn failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        ParsedDecision::Failed {
            kind,
            reason: reason.into(),
        }
    }

    /// Fold a failure into the fail-closed decision.
    pub fn into_decision(self, decided_by: &str) -> AuthorityDecision {
        match self {
            ParsedDecision::Parsed(decision) => decision,
            ParsedDecision::Failed { kind, reason } => {
                AuthorityDecision::fail_closed(kind, reason, decided_by)
            }
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, ParsedDecision::Parsed(_))
    }
}

/// Parse `raw` into a decision attributed to `decided_by`.
pub fn parse_decision(raw: &str, decided_by: &str) -> ParsedDecision {
    let body = strip_fences(raw);
    let Some(obj) = first_json_object(&body) else {
        return ParsedDecision::failed(FailureKind::ParseError, "no JSON object in response");
    };

    let verdict = match obj.get("verdict") {
        Some(Value::String(s)) => match s.parse::<Verdict>() {
            Ok(v) => v,
            Err(e) => return ParsedDecision::failed(FailureKind::InvalidVerdict, e),
        },
        Some(other) => {
            return ParsedDecision::failed(
                FailureKind::InvalidVerdict,
                format!("verdict is not a string: {other}"),
            )
        }
        None => return ParsedDecision::failed(FailureKind::InvalidVerdict, "missing verdict"),
    };

    let rationale = match obj.get("rationale") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    let confidence = read_confidence(obj.get("confidence"));
    let concerns = read_concerns(obj.get("concerns"));

    let mut decision = match verdict {
        Verdict::Accept => AuthorityDecision::accept(rationale, confidence),
        Verdict::Reject => AuthorityDecision::reject(rationale, confidence),
        Verdict::Modify => {
            let payload = obj
                .get("modified_proposal")
                .and_then(ModifiedProposal::from_value);
            match payload {
                Some(m) if m.is_actionable() => AuthorityDecision::modify(rationale, confidence, Some(m)),
                Some(_) => AuthorityDecision::modify(rationale, confidence, None)
                    .with_concern(NOT_ACTIONABLE_CONCERN),
                None => AuthorityDecision::modify(rationale, confidence, None),
            }
        }
    };

    // Oracle concerns first, then anything the parser added.
    let added = std::mem::take(&mut decision.concerns);
    decision.concerns = concerns;
    decision.concerns.extend(added);
    decision.decided_by = decided_by.to_string();

    ParsedDecision::Parsed(decision)
}

fn read_confidence(value: Option<&Value>) -> f64 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(v) if v.is_finite() => clamp_confidence(v),
        _ => DEFAULT_CONFIDENCE,
    }
}

fn read_concerns(value: Option<&Value>) -> Vec<String> {
    let items = match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) => vec![s.trim().to_string()],
        _ => Vec::new(),
    };
    items.into_iter().filter(|c| !c.is_empty()).collect()
}

/// Drop markdown fence lines (```json, ```).
fn strip_fences(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The first top-level balanced `{...}` span that parses as a JSON object.
///
/// A span that fails to parse is skipped whole: objects nested inside a
/// malformed response are never considered. An unclosed `{` swallows the
/// rest of the text.
fn first_json_object(text: &str) -> Option<Map<String, Value>> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        let end = matching_brace(bytes, start)?;
        if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(&text[start..=end]) {
            return Some(obj);
        }
        search_from = end + 1;
    }
    None
}

/// Index of the `}` closing the `{` at `start`, honoring JSON string escapes.
fn matching_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
