//! Syntax highlighting for the generated Python program using syntect.

use egui::Color32;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Style, Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

const DARK_THEME: &str = "base16-ocean.dark";
const LIGHT_THEME: &str = "InspiredGitHub";

/// Background for the line a check reported a fault on.
const FAULT_LINE_BG: Color32 = Color32::from_rgba_premultiplied(120, 20, 20, 120);

/// Cached syntax highlighting resources.
pub struct Highlighter {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    theme_name: &'static str,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter {
    pub fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
            theme_name: DARK_THEME,
        }
    }

    /// Follow the editor's light/dark visuals.
    pub fn set_dark(&mut self, dark: bool) {
        self.theme_name = if dark { DARK_THEME } else { LIGHT_THEME };
    }

    fn theme(&self) -> Option<&Theme> {
        self.theme_set
            .themes
            .get(self.theme_name)
            .or_else(|| self.theme_set.themes.values().next())
    }

    /// Highlight Python code into (line number, text, color) spans. Lines count from 1.
    pub fn highlight_python(&self, code: &str) -> Vec<(usize, String, Color32)> {
        let syntax = self
            .syntax_set
            .find_syntax_by_extension("py")
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let Some(theme) = self.theme() else {
            return LinesWithEndings::from(code)
                .enumerate()
                .map(|(i, line)| (i + 1, line.to_owned(), Color32::LIGHT_GRAY))
                .collect();
        };

        let mut highlighter = HighlightLines::new(syntax, theme);
        let mut result = Vec::new();

        for (i, line) in LinesWithEndings::from(code).enumerate() {
            match highlighter.highlight_line(line, &self.syntax_set) {
                Ok(ranges) => {
                    for (style, text) in ranges {
                        result.push((i + 1, text.to_owned(), style_to_color32(style)));
                    }
                }
                Err(_) => result.push((i + 1, line.to_owned(), Color32::LIGHT_GRAY)),
            }
        }

        result
    }

    /// Render highlighted code as a LayoutJob, marking `fault_line` if given.
    pub fn layout_job(&self, code: &str, fault_line: Option<u32>) -> egui::text::LayoutJob {
        let mut job = egui::text::LayoutJob::default();

        for (line, text, color) in self.highlight_python(code) {
            let background = if fault_line.is_some_and(|f| f as usize == line) {
                FAULT_LINE_BG
            } else {
                Color32::TRANSPARENT
            };
            job.append(
                &text,
                0.0,
                egui::TextFormat {
                    font_id: egui::FontId::monospace(12.0),
                    color,
                    background,
                    ..Default::default()
                },
            );
        }

        job
    }
}

/// Convert syntect Style to egui Color32.
fn style_to_color32(style: Style) -> Color32 {
    Color32::from_rgb(style.foreground.r, style.foreground.g, style.foreground.b)
}

/// Read-only highlighted view of the program.
pub fn code_viewer(ui: &mut egui::Ui, highlighter: &Highlighter, code: &str, fault_line: Option<u32>) {
    let job = highlighter.layout_job(code, fault_line);

    egui::ScrollArea::both()
        .id_salt("highlighted_code_scroll")
        .auto_shrink([false, false])
        .show(ui, |ui| {
            ui.add(
                egui::Label::new(job)
                    .selectable(true)
                    .wrap_mode(egui::TextWrapMode::Extend),
            );
        });
}

/// Plain editable view of the program. Returns true if the text was modified.
pub fn code_editor(ui: &mut egui::Ui, code: &mut String) -> bool {
    let mut changed = false;

    egui::ScrollArea::both()
        .id_salt("code_editor_scroll")
        .auto_shrink([false, false])
        .show(ui, |ui| {
            let response = ui.add(
                egui::TextEdit::multiline(code)
                    .code_editor()
                    .desired_rows(30)
                    .desired_width(f32::INFINITY),
            );
            changed = response.changed();
        });

    changed
}
