//! Recovery of JSON objects from messy model output.
//!
//! Models asked for "ONLY valid JSON" still wrap it in prose or code fences
//! often enough that parsing the raw response directly is hopeless. The
//! recovery path strips fence markup, scans the text for balanced
//! brace-delimited candidates (supporting one level of nested braces), and
//! tries them longest-first: the most complete candidate is usually the
//! intended answer.

/// Strip surrounding code-fence markup, if any, and trim.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        trimmed
            .replace("```json", "")
            .replace("```", "")
            .trim()
            .to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lazy iterator over balanced `{...}` substrings of a text.
///
/// Tracks one level of nesting: a candidate may contain complete `{...}`
/// children, but anything nested deeper restarts the scan past the opening
/// brace. Candidates are non-overlapping, yielded left to right.
pub struct BraceCandidates<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> BraceCandidates<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }
}

impl<'a> Iterator for BraceCandidates<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let bytes = self.text.as_bytes();
        let mut open = self.pos;

        while open < bytes.len() {
            if bytes[open] != b'{' {
                open += 1;
                continue;
            }

            let mut depth = 0usize;
            let mut close = None;
            for (i, &b) in bytes.iter().enumerate().skip(open) {
                match b {
                    b'{' => {
                        depth += 1;
                        if depth > 2 {
                            break;
                        }
                    }
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            close = Some(i);
                            break;
                        }
                    }
                    _ => {}
                }
            }

            match close {
                Some(close) => {
                    self.pos = close + 1;
                    // Brace positions are ASCII, so these are char boundaries.
                    return Some(&self.text[open..=close]);
                }
                // Unbalanced or too deeply nested from here; retry one past
                // this opening brace.
                None => open += 1,
            }
        }

        self.pos = bytes.len();
        None
    }
}

/// Extract the first parseable JSON object from messy text.
///
/// Candidates are ordered longest-first and parsed until one succeeds.
/// Returns `None` when no candidate parses as an object.
pub fn recover_object(text: &str) -> Option<serde_json::Value> {
    let mut candidates: Vec<&str> = BraceCandidates::new(text).collect();
    candidates.sort_by(|a, b| b.len().cmp(&a.len()));

    for candidate in candidates {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate) {
            if value.is_object() {
                return Some(value);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(text), "{\"a\": 1}");
    }

    #[test]
    fn strips_bare_fence() {
        let text = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(text), "{\"a\": 1}");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn finds_single_object() {
        let candidates: Vec<&str> = BraceCandidates::new("before {\"a\": 1} after").collect();
        assert_eq!(candidates, vec!["{\"a\": 1}"]);
    }

    #[test]
    fn finds_multiple_objects() {
        let candidates: Vec<&str> = BraceCandidates::new("{\"a\": 1} and {\"b\": 2}").collect();
        assert_eq!(candidates, vec!["{\"a\": 1}", "{\"b\": 2}"]);
    }

    #[test]
    fn supports_one_level_of_nesting() {
        let text = "{\"outer\": {\"inner\": 1}}";
        let candidates: Vec<&str> = BraceCandidates::new(text).collect();
        assert_eq!(candidates, vec![text]);
    }

    #[test]
    fn deeper_nesting_yields_the_inner_object() {
        // The scanner gives up on the outermost brace and recovers the
        // deepest region it can still balance.
        let text = "{\"a\": {\"b\": {\"c\": 1}}}";
        let candidates: Vec<&str> = BraceCandidates::new(text).collect();
        assert_eq!(candidates, vec!["{\"b\": {\"c\": 1}}"]);
    }

    #[test]
    fn unclosed_brace_yields_nothing() {
        let candidates: Vec<&str> = BraceCandidates::new("{\"a\": 1").collect();
        assert!(candidates.is_empty());
    }

    #[test]
    fn iterator_is_restartable() {
        let text = "{\"a\": 1} {\"b\": 2}";
        let first: Vec<&str> = BraceCandidates::new(text).collect();
        let second: Vec<&str> = BraceCandidates::new(text).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn recovers_object_from_prose() {
        let text = "here you go: {\"symptoms\":[\"fever\"],\"category\":\"fever\"}";
        let value = recover_object(text).expect("recoverable");
        assert_eq!(value["category"], "fever");
    }

    #[test]
    fn prefers_longest_parseable_candidate() {
        let text = "{\"a\": 1} {\"longer\": \"object wins here\", \"b\": 2}";
        let value = recover_object(text).expect("recoverable");
        assert_eq!(value["b"], 2);
    }

    #[test]
    fn falls_back_to_shorter_candidate_when_longest_is_invalid() {
        let text = "{not json but quite long indeed........} {\"b\": 2}";
        let value = recover_object(text).expect("recoverable");
        assert_eq!(value["b"], 2);
    }

    #[test]
    fn no_braces_means_no_recovery() {
        assert!(recover_object("no json here at all").is_none());
    }

    #[test]
    fn non_object_json_is_rejected() {
        // An array is parseable JSON but not the object we asked for.
        assert!(recover_object("[1, 2, 3]").is_none());
    }

    #[test]
    fn handles_non_ascii_text() {
        let text = "voilà : {\"category\": \"fièvre\"} — c'est tout";
        let value = recover_object(text).expect("recoverable");
        assert_eq!(value["category"], "fièvre");
    }
}
