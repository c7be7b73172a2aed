//! Element IDs: issuing fresh names and validating user-chosen ones.

use std::collections::HashMap;

use crate::error::EditError;

/// `keyword.kwlist` of Python 3.
const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Module-level names every generated program binds, including loop variables.
const GENERATED_BINDINGS: &[&str] = &[
    "root", "tk", "ttk", "messagebox", "simpledialog", "headers", "rows", "row", "col", "item",
];

/// Per-base counters. Numbers only ever go up, so a deleted `button3` is never reissued.
///
/// Observed suffixes are capped at `u32::MAX` while counters are `u64`, so issuing past
/// the largest restorable name cannot overflow.
#[derive(Clone, Debug, Default)]
pub(crate) struct NameCounter {
    counters: HashMap<String, u64>,
}

impl NameCounter {
    /// Issue `base + n` where `n` is one past the highest number seen for `base`.
    pub(crate) fn next_name(&mut self, base: &str) -> String {
        let n = self.counters.entry(base.to_owned()).or_insert(0);
        *n = n.saturating_add(1);
        format!("{base}{n}")
    }

    /// Raise the counter for `name`'s prefix to at least its numeric suffix.
    pub(crate) fn observe(&mut self, name: &str) {
        let Some((base, n)) = split_numeric_suffix(name) else {
            return;
        };
        let counter = self.counters.entry(base.to_lowercase()).or_insert(0);
        *counter = (*counter).max(u64::from(n));
    }

    #[cfg(test)]
    pub(crate) fn current(&self, base: &str) -> u64 {
        self.counters.get(base).copied().unwrap_or(0)
    }
}

/// `button12` -> `("button", 12)`.
fn split_numeric_suffix(name: &str) -> Option<(&str, u32)> {
    let digits_at = name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits_at == 0 || digits_at == name.len() {
        return None;
    }
    let n = name[digits_at..].parse().ok()?;
    Some((&name[..digits_at], n))
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

pub(crate) fn is_keyword(s: &str) -> bool {
    PYTHON_KEYWORDS.contains(&s)
}

/// Check that `name` can be used verbatim as a Python variable in generated code.
pub(crate) fn validate_identifier(name: &str) -> Result<(), EditError> {
    if name.is_empty() {
        return Err(EditError::EmptyName);
    }
    if !is_identifier(name) {
        return Err(EditError::InvalidIdentifier(name.to_owned()));
    }
    if is_keyword(name) {
        return Err(EditError::ReservedKeyword(name.to_owned()));
    }
    if GENERATED_BINDINGS.contains(&name) {
        return Err(EditError::ReservedBinding(name.to_owned()));
    }
    Ok(())
}
