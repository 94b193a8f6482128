use crate::types::StreamResponse;

/// Literal payload that terminates a stream successfully.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Classification of one delimited unit of the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine<'a> {
    /// Empty line, comment, or any non-payload field.
    Skip,
    /// The end-of-stream sentinel.
    Done,
    /// A `data:` payload, prefix and surrounding whitespace stripped.
    Payload(&'a str),
}

pub fn classify(line: &str) -> SseLine<'_> {
    let line = line.trim();
    if line.is_empty() {
        return SseLine::Skip;
    }
    // Both `data:` and `data: ` occur in the wild; trimming the remainder
    // covers either spelling.
    let Some(payload) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        SseLine::Done
    } else {
        SseLine::Payload(payload)
    }
}

/// Incremental text carried by one payload unit, if any.
///
/// `Ok(None)` covers payloads with no choices, no delta content, or an
/// explicit null; the caller emits nothing for those.
pub fn delta_text(payload: &str) -> Result<Option<String>, serde_json::Error> {
    let parsed: StreamResponse = serde_json::from_str(payload)?;
    Ok(parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content))
}
