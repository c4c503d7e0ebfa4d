//! Disease-class label set
//!
//! The label list asset is a Python-style list literal (the training pipeline
//! wrote it with `repr`), e.g. `['Apple Apple scab', 'Apple Black rot', ...]`.
//! JSON arrays are the degenerate case and parse on a fast path. Order is
//! significant: index i names the runtime's output element i.

use crate::error::{Error, Result};

/// Ordered, immutable set of class labels aligned with the model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    /// Parse a label list from text (JSON array or Python list literal).
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let labels = match serde_json::from_str::<Vec<String>>(trimmed) {
            Ok(labels) => labels,
            Err(_) => parse_list_literal(trimmed)?,
        };
        if labels.is_empty() {
            return Err(Error::LabelParse("label list is empty".to_string()));
        }
        Ok(Self { labels })
    }

    /// Build a label set from already-parsed names. Rejects an empty list.
    pub fn from_labels(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::LabelParse("label list is empty".to_string()));
        }
        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }
}

/// Scan a Python list literal of strings.
///
/// Accepts single- or double-quoted elements, backslash escapes, arbitrary
/// whitespace, and a trailing comma. Anything else is a parse error.
fn parse_list_literal(text: &str) -> Result<Vec<String>> {
    let mut chars = text.chars();

    loop {
        match chars.next() {
            Some(c) if c.is_whitespace() => continue,
            Some('[') => break,
            Some(c) => {
                return Err(Error::LabelParse(format!(
                    "expected '[' at start of label list, found '{c}'"
                )))
            }
            None => return Err(Error::LabelParse("label list is empty".to_string())),
        }
    }

    let mut labels = Vec::new();
    let mut expect_separator = false;
    loop {
        // Between elements: whitespace, one comma, or the closing bracket.
        let quote = loop {
            match chars.next() {
                Some(c) if c.is_whitespace() => continue,
                Some(',') if expect_separator => {
                    expect_separator = false;
                    continue;
                }
                Some(']') => {
                    if chars.any(|c| !c.is_whitespace()) {
                        return Err(Error::LabelParse(
                            "trailing characters after label list".to_string(),
                        ));
                    }
                    return Ok(labels);
                }
                Some(q) if (q == '\'' || q == '"') && !expect_separator => break q,
                Some(c) => {
                    return Err(Error::LabelParse(format!(
                        "unexpected character '{c}' in label list"
                    )))
                }
                None => {
                    return Err(Error::LabelParse(
                        "unterminated label list (missing ']')".to_string(),
                    ))
                }
            }
        };

        let mut label = String::new();
        loop {
            match chars.next() {
                Some('\\') => match chars.next() {
                    Some('n') => label.push('\n'),
                    Some('t') => label.push('\t'),
                    Some('r') => label.push('\r'),
                    Some(c) => label.push(c),
                    None => {
                        return Err(Error::LabelParse(
                            "unterminated escape in label".to_string(),
                        ))
                    }
                },
                Some(c) if c == quote => break,
                Some(c) => label.push(c),
                None => {
                    return Err(Error::LabelParse(
                        "unterminated quoted label".to_string(),
                    ))
                }
            }
        }
        labels.push(label);
        expect_separator = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_array() {
        let set = LabelSet::parse(r#"["Apple healthy", "Tomato healthy"]"#).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0), Some("Apple healthy"));
        assert_eq!(set.get(1), Some("Tomato healthy"));
    }

    #[test]
    fn parses_python_single_quoted_literal() {
        let text = "['Apple Apple scab', 'Apple Black rot',\n 'Tomato healthy']";
        let set = LabelSet::parse(text).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.get(2), Some("Tomato healthy"));
    }

    #[test]
    fn preserves_order() {
        let set = LabelSet::parse("['b', 'a', 'c']").unwrap();
        let collected: Vec<&str> = set.iter().collect();
        assert_eq!(collected, vec!["b", "a", "c"]);
    }

    #[test]
    fn accepts_trailing_comma_and_mixed_quotes() {
        let set = LabelSet::parse(r#"['one', "two", 'three',]"#).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.get(1), Some("two"));
    }

    #[test]
    fn handles_escaped_quotes() {
        let set = LabelSet::parse(r"['it\'s blight', 'ok']").unwrap();
        assert_eq!(set.get(0), Some("it's blight"));
    }

    #[test]
    fn rejects_empty_list() {
        assert!(LabelSet::parse("[]").is_err());
        assert!(LabelSet::parse("   ").is_err());
    }

    #[test]
    fn rejects_unterminated_list() {
        assert!(LabelSet::parse("['a', 'b'").is_err());
        assert!(LabelSet::parse("['a").is_err());
    }

    #[test]
    fn rejects_junk() {
        assert!(LabelSet::parse("not a list").is_err());
        assert!(LabelSet::parse("['a'] extra").is_err());
        assert!(LabelSet::parse("['a' 'b']").is_err());
    }
}
