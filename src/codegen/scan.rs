//! Recovers user-authored text from a previously generated program.
//!
//! Two kinds of region survive regeneration:
//!
//! - the custom code between [`START_MARKER`] and [`END_MARKER`];
//! - the body of any top-level `def on_<x>_click():`, `def get_<x>_data():` or
//!   `def load_<x>_options():`.
//!
//! Everything else in the generated sections belongs to the generator.

use std::collections::BTreeMap;

use tracing::warn;

use super::{END_MARKER, START_MARKER};

/// The role a generated function plays for its element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HandlerRole {
    /// `on_<name>_click`, the Button command.
    Click,
    /// `get_<name>_data`, Treeview headers and rows.
    Data,
    /// `load_<name>_options`, Combobox values or Listbox items.
    Options,
}

impl HandlerRole {
    pub(crate) const ALL: [HandlerRole; 3] =
        [HandlerRole::Click, HandlerRole::Data, HandlerRole::Options];

    const fn affixes(self) -> (&'static str, &'static str) {
        match self {
            HandlerRole::Click => ("on_", "_click"),
            HandlerRole::Data => ("get_", "_data"),
            HandlerRole::Options => ("load_", "_options"),
        }
    }

    pub(crate) fn function_name(self, element: &str) -> String {
        let (prefix, suffix) = self.affixes();
        format!("{prefix}{element}{suffix}")
    }

    /// Split `on_submit_click` into `(Click, "submit")`.
    pub(crate) fn parse(function: &str) -> Option<(HandlerRole, &str)> {
        Self::ALL.into_iter().find_map(|role| {
            let (prefix, suffix) = role.affixes();
            let element = function.strip_prefix(prefix)?.strip_suffix(suffix)?;
            (!element.is_empty() && element.chars().all(is_word_char)).then_some((role, element))
        })
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Text between the markers, with leading/trailing blank lines removed.
///
/// Fails open: with no end marker (or one that precedes the start marker) everything
/// after the start marker is kept. With no start marker nothing is recovered.
pub(crate) fn extract_custom_code(source: &str) -> String {
    let Some(start) = source.find(START_MARKER) else {
        if !source.trim().is_empty() {
            warn!("custom code start marker missing; custom code cannot be recovered");
        }
        return String::new();
    };
    let body_start = start + START_MARKER.len();
    let body = match source.find(END_MARKER) {
        Some(end) if end > start => &source[body_start..end],
        _ => {
            warn!("custom code end marker missing or misplaced; keeping everything after start");
            &source[body_start..]
        }
    };
    trim_blank_lines(body)
}

/// Lines of `text` paired with their byte offset, line terminators excluded.
fn lines_with_offsets(text: &str) -> Vec<(usize, &str)> {
    let mut at = 0;
    text.split_inclusive('\n')
        .map(|raw| {
            let start = at;
            at += raw.len();
            (start, raw.trim_end_matches('\n').trim_end_matches('\r'))
        })
        .collect()
}

/// `text` from the start of `lines[first]` to the end of `lines[last]`, verbatim,
/// so CRLF line endings inside the span are kept.
fn span<'a>(text: &'a str, lines: &[(usize, &str)], first: usize, last: usize) -> &'a str {
    let (end_at, end_line) = lines[last];
    &text[lines[first].0..end_at + end_line.len()]
}

fn trim_blank_lines(s: &str) -> String {
    let lines = lines_with_offsets(s);
    let Some(first) = lines.iter().position(|(_, l)| !l.trim().is_empty()) else {
        return String::new();
    };
    let last = lines
        .iter()
        .rposition(|(_, l)| !l.trim().is_empty())
        .unwrap_or(first);
    span(s, &lines, first, last).to_owned()
}

/// Parse a top-level `def <name>():` line, returning `<name>` for handler names only.
fn handler_signature(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("def")?;
    let name_start = rest.trim_start();
    if name_start.len() == rest.len() {
        return None; // `define(...)`, `def_x = ...`
    }
    let name_len = name_start
        .find(|c: char| !is_word_char(c))
        .unwrap_or(name_start.len());
    let (name, after) = name_start.split_at(name_len);
    HandlerRole::parse(name)?;

    let after = after.trim_start().strip_prefix("()")?.trim_start();
    let trailer = after.strip_prefix(':')?.trim();
    (trailer.is_empty() || trailer.starts_with('#')).then_some(name)
}

fn is_indented(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

/// Bodies of every recognised handler, keyed by function name.
///
/// A body is the run of indented (or blank) lines after the signature, without
/// trailing blank lines, copied verbatim. A signature with no body maps to an empty
/// string so callers can tell a cleared body from a missing function. When a name
/// appears twice the later definition wins, matching what Python itself would bind.
pub(crate) fn extract_handlers(source: &str) -> BTreeMap<String, String> {
    let lines = lines_with_offsets(source);
    let mut handlers = BTreeMap::new();
    let mut i = 0;
    while i < lines.len() {
        let Some(name) = handler_signature(lines[i].1) else {
            i += 1;
            continue;
        };
        let body_start = i + 1;
        let mut end = body_start;
        while end < lines.len() && (is_indented(lines[end].1) || lines[end].1.trim().is_empty()) {
            end += 1;
        }
        let mut last = end;
        while last > body_start && lines[last - 1].1.trim().is_empty() {
            last -= 1;
        }
        let body = if last > body_start {
            span(source, &lines, body_start, last - 1).to_owned()
        } else {
            String::new()
        };
        handlers.insert(name.to_owned(), body);
        i = end.max(body_start);
    }
    handlers
}

/// Replace whole-word occurrences of `from` with `to`.
pub(crate) fn replace_whole_word(text: &str, from: &str, to: &str) -> String {
    if from.is_empty() {
        return text.to_owned();
    }
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    for (at, _) in text.match_indices(from) {
        if at < copied {
            continue;
        }
        let before = text[..at].chars().next_back();
        let after = text[at + from.len()..].chars().next();
        if before.is_some_and(is_word_char) || after.is_some_and(is_word_char) {
            continue;
        }
        out.push_str(&text[copied..at]);
        out.push_str(to);
        copied = at + from.len();
    }
    out.push_str(&text[copied..]);
    out
}

/// Carry every handler name of element `old` over to `new` across the whole text.
pub(crate) fn rename_handlers(source: &str, old: &str, new: &str) -> String {
    HandlerRole::ALL
        .into_iter()
        .fold(source.to_owned(), |text, role| {
            replace_whole_word(&text, &role.function_name(old), &role.function_name(new))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(custom: &str) -> String {
        format!("import tkinter as tk\n\n{START_MARKER}\n\n{custom}\n\n{END_MARKER}\n\nroot = tk.Tk()\n")
    }

    #[test]
    fn test_extract_custom_code_between_markers() {
        let custom = "import random\n\ndef helper():\n    return random.random()";
        assert_eq!(extract_custom_code(&wrap(custom)), custom);
    }

    #[test]
    fn test_extract_custom_code_keeps_indentation_of_first_line() {
        let text = format!("{START_MARKER}\n   \n    x = 1\ny = 2\n\n{END_MARKER}");
        assert_eq!(extract_custom_code(&text), "    x = 1\ny = 2");
    }

    #[test]
    fn test_extract_custom_code_without_end_marker_fails_open() {
        let text = format!("header\n{START_MARKER}\nkeep_me = 1\n\nroot = tk.Tk()\n");
        assert_eq!(extract_custom_code(&text), "keep_me = 1\n\nroot = tk.Tk()");
    }

    #[test]
    fn test_extract_custom_code_end_before_start() {
        let text = format!("{END_MARKER}\n{START_MARKER}\nafter = 1\n");
        assert_eq!(extract_custom_code(&text), "after = 1");
    }

    #[test]
    fn test_extract_custom_code_without_markers() {
        assert_eq!(extract_custom_code("x = 1\n"), "");
        assert_eq!(extract_custom_code(""), "");
        let only_end = format!("x = 1\n{END_MARKER}\n");
        assert_eq!(extract_custom_code(&only_end), "");
    }

    #[test]
    fn test_handler_role_parse() {
        assert_eq!(
            HandlerRole::parse("on_submit_click"),
            Some((HandlerRole::Click, "submit"))
        );
        assert_eq!(
            HandlerRole::parse("get_tree1_data"),
            Some((HandlerRole::Data, "tree1"))
        );
        assert_eq!(
            HandlerRole::parse("load_my_list_options"),
            Some((HandlerRole::Options, "my_list"))
        );
        assert_eq!(HandlerRole::parse("on__click"), None);
        assert_eq!(HandlerRole::parse("helper"), None);
    }

    #[test]
    fn test_handler_signature() {
        assert_eq!(handler_signature("def on_b_click():"), Some("on_b_click"));
        assert_eq!(handler_signature("def  on_b_click () :  "), Some("on_b_click"));
        assert_eq!(
            handler_signature("def on_b_click():  # wired to b"),
            Some("on_b_click")
        );
        assert_eq!(handler_signature("    def on_b_click():"), None);
        assert_eq!(handler_signature("def on_b_click(event):"), None);
        assert_eq!(handler_signature("def helper():"), None);
        assert_eq!(handler_signature("def on_b_click(): pass"), None);
        assert_eq!(handler_signature("defon_b_click():"), None);
    }

    #[test]
    fn test_extract_handlers() {
        let text = "\
def on_button1_click():
    print(\"hi\")

    if True:
\tprint(\"tab\")


def get_tree1_data():
    return (\"A\",), []
def helper():
    pass
def load_list1_options():

x = 1
";
        let handlers = extract_handlers(text);
        assert_eq!(handlers.len(), 3);
        assert_eq!(
            handlers["on_button1_click"],
            "    print(\"hi\")\n\n    if True:\n\tprint(\"tab\")"
        );
        assert_eq!(handlers["get_tree1_data"], "    return (\"A\",), []");
        // A cleared body is reported, not dropped
        assert_eq!(handlers["load_list1_options"], "");
    }

    #[test]
    fn test_crlf_text_is_recovered_verbatim() {
        let text = format!(
            "{START_MARKER}\r\n\r\nA = 1\r\nB = 2\r\n\r\n{END_MARKER}\r\n\
             def on_b_click():\r\n    one()\r\n    two()\r\n\r\nroot = 1\r\n"
        );
        assert_eq!(extract_custom_code(&text), "A = 1\r\nB = 2");
        assert_eq!(extract_handlers(&text)["on_b_click"], "    one()\r\n    two()");
    }

    #[test]
    fn test_extract_handlers_later_definition_wins() {
        let text = "def on_a_click():\n    first()\n\ndef on_a_click():\n    second()\n";
        assert_eq!(extract_handlers(text)["on_a_click"], "    second()");
    }

    #[test]
    fn test_replace_whole_word() {
        assert_eq!(
            replace_whole_word("on_a_click(); on_a_click2; xon_a_click", "on_a_click", "on_b_click"),
            "on_b_click(); on_a_click2; xon_a_click"
        );
        assert_eq!(replace_whole_word("aaa", "aa", "b"), "aaa");
        assert_eq!(replace_whole_word("aa aa", "aa", "b"), "b b");
    }

    #[test]
    fn test_rename_handlers_covers_all_roles_and_whole_text() {
        let text = format!(
            "{START_MARKER}\nbutton1_label = 'x'\non_button1_click()\n{END_MARKER}\n\
             def on_button1_click():\n    pass\n\
             def get_button1_data():\n    pass\n\
             def load_button1_options():\n    pass\n\
             def on_button10_click():\n    pass\n\
             button1 = ttk.Button(root, command=on_button1_click)\n"
        );
        let renamed = rename_handlers(&text, "button1", "submit");
        assert!(renamed.contains("\non_submit_click()\n"));
        assert!(renamed.contains("def on_submit_click():"));
        assert!(renamed.contains("def get_submit_data():"));
        assert!(renamed.contains("def load_submit_options():"));
        assert!(renamed.contains("command=on_submit_click"));
        // Only handler names move, other text is left alone
        assert!(renamed.contains("def on_button10_click():"));
        assert!(renamed.contains("button1_label = 'x'"));
        assert!(renamed.contains("button1 = ttk.Button"));
        assert!(!renamed.contains("on_button1_click"));
    }
}
