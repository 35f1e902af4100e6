//! Diagram extraction from free-form model replies
//!
//! The extractor persona is asked for strict JSON, but replies routinely
//! arrive wrapped in prose or code fences. Candidates are found by scanning
//! balanced brace regions (string and escape aware) and decoded through an
//! explicit payload type.

use serde::Deserialize;
use serde_json::Value;

/// Substituted when a diagram payload is present but cannot be decoded
pub const FALLBACK_DIAGRAM: &str = "graph TD;\n  A[Analysis result] --> B[Diagram generation failed];\n  B --> C[Please review the dialogue];";

/// Key tokens that mark a candidate object. `mermaidCode` is what older
/// prompts asked for.
const KEY_TOKENS: [&str; 2] = ["\"diagram\"", "\"mermaidCode\""];

/// Outcome of scanning a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// A payload decoded cleanly
    Found(String),
    /// A payload was there but was not valid JSON of the expected shape
    Malformed,
    /// No object carrying a diagram key
    Missing,
}

impl Extraction {
    /// Collapse to the gateway contract: fallback text for malformed payloads
    pub fn into_diagram(self) -> Option<String> {
        match self {
            Extraction::Found(diagram) => Some(diagram),
            Extraction::Malformed => Some(FALLBACK_DIAGRAM.to_string()),
            Extraction::Missing => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DiagramPayload {
    #[serde(default, alias = "mermaidCode")]
    diagram: Option<Value>,
}

/// Extract the diagram text from a model reply
pub fn extract_diagram(text: &str) -> Option<String> {
    scan(text).into_diagram()
}

/// Classify a model reply
pub fn scan(text: &str) -> Extraction {
    for candidate in object_candidates(text) {
        if !contains_key_token(candidate) {
            continue;
        }
        match serde_json::from_str::<DiagramPayload>(candidate) {
            Ok(DiagramPayload {
                diagram: Some(Value::String(diagram)),
            }) => {
                if !diagram.trim().is_empty() {
                    return Extraction::Found(diagram);
                }
            }
            Ok(DiagramPayload { diagram: Some(_) }) | Err(_) => return Extraction::Malformed,
            // Key token sits in a nested object or inside a string value
            Ok(DiagramPayload { diagram: None }) => {}
        }
    }

    // Unbalanced quoting hides the region from the scanner above; a region
    // spanning the outermost braces that mentions the key but does not parse
    // is still a broken payload rather than an absent one.
    match outermost_region(text) {
        Some(region)
            if contains_key_token(region) && serde_json::from_str::<Value>(region).is_err() =>
        {
            Extraction::Malformed
        }
        _ => Extraction::Missing,
    }
}

fn contains_key_token(candidate: &str) -> bool {
    KEY_TOKENS.iter().any(|key| candidate.contains(key))
}

/// Every balanced `{...}` region, ordered by start offset (outer before inner)
fn object_candidates(text: &str) -> impl Iterator<Item = &str> {
    balanced_regions(text.as_bytes())
        .into_iter()
        .filter_map(move |(start, end)| text.get(start..=end))
}

/// Offsets of matching brace pairs, found in one pass with a stack of open
/// braces. Braces inside JSON strings are skipped. A raw newline also ends a
/// string, so a stray quote in prose only hides the rest of its line. Only ASCII bytes are compared, so the
/// offsets are always char boundaries.
fn balanced_regions(bytes: &[u8]) -> Vec<(usize, usize)> {
    let mut open = Vec::new();
    let mut regions = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' || b == b'\n' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => open.push(i),
            b'}' => {
                if let Some(start) = open.pop() {
                    regions.push((start, i));
                }
            }
            _ => {}
        }
    }

    regions.sort_unstable_by_key(|&(start, _)| start);
    regions
}

fn outermost_region(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    text.get(start..=end)
}
