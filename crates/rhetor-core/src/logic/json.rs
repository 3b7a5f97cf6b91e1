//! Pulling a JSON object out of free-form model output

/// Extract the first JSON object from `text`.
///
/// Tries the span from the first `{` to the last `}`. If that does not
/// parse, walks the braces from the first `{`: a balanced prefix is returned
/// as is, an unbalanced (truncated) one gets its missing `}` appended when
/// that yields valid JSON. Falls back to the partial text.
pub fn extract_json_block(text: &str) -> String {
    let Some(start) = text.find('{') else {
        tracing::warn!("no JSON object start found in model output");
        return text.to_string();
    };

    if let Some(end) = text.rfind('}') {
        if end > start {
            let candidate = &text[start..=end];
            if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
                return candidate.to_string();
            }
            tracing::warn!("JSON block does not parse, attempting repair");
        }
    }

    let partial = &text[start..];
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut balanced_end = None;

    for (i, c) in partial.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    balanced_end = Some(i + 1);
                    break;
                }
            }
            _ => {}
        }
    }

    if let Some(end) = balanced_end {
        return partial[..end].to_string();
    }

    if depth > 0 {
        let mut repaired = partial.trim_end().trim_end_matches(',').to_string();
        if in_string {
            repaired.push('"');
        }
        repaired.push_str(&"}".repeat(depth));
        if serde_json::from_str::<serde_json::Value>(&repaired).is_ok() {
            tracing::info!(missing = depth, "repaired truncated JSON");
            return repaired;
        }
        tracing::error!("JSON repair failed");
    }

    partial.to_string()
}
