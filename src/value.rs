//! The `Value` type: an ordered sequence of strings tagged with the source
//! location that defined it.
//!
//! Grounded in `original_source/jjmake/parsercontext.hpp`'s nested `Value`
//! class. That class sets its line number into the same field as the
//! defining file (`value.definitionFile = line->value[0]`, twice, in
//! `parsercontext.cpp::setValue`) — a bug in the original, not a documented
//! invariant, so it is not reproduced here; `definition_line` is its own
//! field and is set correctly.

/// An ordered sequence of strings, as produced by `set`/`seta`/a builtin's
/// return, plus where it was defined.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Value {
    pub elements: Vec<String>,
    pub definition_file: Option<String>,
    pub definition_line: Option<u32>,
}

impl Value {
    pub fn new(elements: Vec<String>) -> Self {
        Value {
            elements,
            definition_file: None,
            definition_line: None,
        }
    }

    pub fn single(s: impl Into<String>) -> Self {
        Value::new(vec![s.into()])
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.definition_file = Some(file.into());
        self.definition_line = Some(line);
        self
    }

    /// `get`'s contract: the first element, or `""` if the value is missing
    /// or has no elements.
    pub fn first_or_empty(&self) -> &str {
        self.elements.first().map(|s| s.as_str()).unwrap_or("")
    }

    /// `get*`'s contract: non-empty elements joined by single spaces.
    /// Empty-string elements contribute nothing, not even a separator.
    pub fn joined_non_empty(&self) -> String {
        self.elements
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_non_empty_skips_blank_elements_without_extra_spaces() {
        let v = Value::new(vec!["a".into(), "".into(), "b".into(), "".into()]);
        assert_eq!(v.joined_non_empty(), "a b");
    }

    #[test]
    fn first_or_empty_handles_missing_elements() {
        let v = Value::new(vec![]);
        assert_eq!(v.first_or_empty(), "");
    }
}
