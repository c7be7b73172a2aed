use crate::{
    config::Settings,
    editor::{Editor, PropertyForm},
    error::RunError,
    highlight::{self, Highlighter},
    runner::{Runner, Verification},
    widget::{Element, ElementKind, GRID_SIZE, Geometry, ResizeHandle},
};
use egui::{Align2, Color32, CornerRadius, FontId, Painter, Rect, Sense, Stroke, pos2, vec2};
use egui_extras::{Column, TableBuilder};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

const APP_NAME: &str = "Tkinter RAD Builder";
/// Free space drawn past the canvas boundary.
const CANVAS_MARGIN: f32 = 40.0;
const STATUS_SECS: u64 = 3;

/// A press-and-drag on an element, measured from where it started.
struct DragState {
    name: String,
    origin: Geometry,
    handle: Option<ResizeHandle>,
    total: egui::Vec2,
}

enum CheckState {
    Idle,
    Running(mpsc::Receiver<Result<Verification, RunError>>),
    Done(Result<Verification, RunError>),
}

/// Action waiting on the unsaved-changes prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pending {
    New,
    Open,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RightTab {
    Inspector,
    Outline,
    Code,
}

pub(crate) struct RadBuilderApp {
    editor: Editor,
    runner: Runner,
    palette_open: bool,
    /// Currently selected element
    selected: Option<String>,
    /// Inspector fields as typed, applied together
    form: PropertyForm,
    /// Group given to radiobuttons added from the palette
    radio_group: String,
    /// Settings menu fields: width, height, title
    canvas_form: [String; 3],
    drag: Option<DragState>,
    /// Current project file path (for Save)
    current_file: Option<PathBuf>,
    /// Error/status message to display
    status_message: Option<(String, Instant)>,
    highlighter: Highlighter,
    /// Highlighted read-only view instead of the editable text
    syntax_highlighting: bool,
    show_grid: bool,
    dark_mode: bool,
    right_tab: RightTab,
    check: CheckState,
    pending: Option<Pending>,
    allow_close: bool,
    window_title: String,
}

impl RadBuilderApp {
    pub(crate) fn new(settings: &Settings, project: Option<PathBuf>) -> Self {
        let mut app = Self {
            editor: Editor::new(),
            runner: Runner::new(settings),
            palette_open: true,
            selected: None,
            form: PropertyForm::default(),
            radio_group: "group1".to_owned(),
            canvas_form: Default::default(),
            drag: None,
            current_file: None,
            status_message: None,
            highlighter: Highlighter::new(),
            syntax_highlighting: false,
            show_grid: true,
            dark_mode: true,
            right_tab: RightTab::Inspector,
            check: CheckState::Idle,
            pending: None,
            allow_close: false,
            window_title: String::new(),
        };
        if let Some(path) = project {
            app.load_project(path);
        }
        app.sync_canvas_form();
        app
    }

    /// Set a status message that will auto-clear after a few seconds
    fn set_status(&mut self, msg: String) {
        self.status_message = Some((msg, Instant::now()));
    }

    fn select(&mut self, name: Option<String>) {
        self.selected = name;
        self.sync_form();
    }

    /// Reload the inspector fields from the model.
    fn sync_form(&mut self) {
        let element = self
            .selected
            .as_deref()
            .and_then(|name| self.editor.model().get(name));
        match element {
            Some(e) => self.form = PropertyForm::from_element(e),
            None => {
                self.selected = None;
                self.form = PropertyForm::default();
            }
        }
    }

    fn sync_canvas_form(&mut self) {
        let canvas = self.editor.model().canvas();
        self.canvas_form = [
            canvas.width.to_string(),
            canvas.height.to_string(),
            canvas.title.clone(),
        ];
    }

    fn add_element(&mut self, kind: ElementKind) {
        let group = (kind == ElementKind::Radiobutton).then_some(self.radio_group.as_str());
        match self.editor.add(kind, group) {
            Ok(name) => {
                self.set_status(format!("Added {name}"));
                self.select(Some(name));
            }
            Err(e) => self.set_status(format!("Cannot add: {e}")),
        }
    }

    fn delete_selected(&mut self) {
        let Some(name) = self.selected.clone() else {
            return;
        };
        match self.editor.delete(&name) {
            Ok(()) => self.set_status(format!("Deleted {name}")),
            Err(e) => self.set_status(format!("Delete failed: {e}")),
        }
        self.select(None);
    }

    fn copy_selected(&mut self) {
        if let Some(name) = self.selected.clone()
            && self.editor.copy(&name).is_ok()
        {
            self.set_status(format!("Copied {name}"));
        }
    }

    fn nudge_selected(&mut self, dx: i32, dy: i32, resize: bool) {
        let Some(e) = self
            .selected
            .as_deref()
            .and_then(|name| self.editor.model().get(name))
        else {
            return;
        };
        let (name, g) = (e.name.clone(), e.geometry);
        let result = if resize {
            self.editor
                .resize_to(&name, g.w.saturating_add(dx), g.h.saturating_add(dy))
        } else {
            self.editor
                .move_to(&name, g.x.saturating_add(dx), g.y.saturating_add(dy))
        };
        if let Err(e) = result {
            self.set_status(format!("Cannot move {name}: {e}"));
        }
        self.sync_form();
    }

    fn paste(&mut self) {
        if let Some(name) = self.editor.paste() {
            self.set_status(format!("Pasted {name}"));
            self.select(Some(name));
        }
    }

    fn apply_form(&mut self) {
        let Some(name) = self.selected.clone() else {
            return;
        };
        let Some(current) = self
            .editor
            .model()
            .get(&name)
            .map(PropertyForm::from_element)
        else {
            return;
        };
        let form = &self.form;
        let only_name = form.name != current.name
            && PropertyForm {
                name: current.name.clone(),
                ..form.clone()
            } == current;
        let only_text = form.text != current.text
            && PropertyForm {
                text: current.text.clone(),
                ..form.clone()
            } == current;

        let result = if *form == current {
            return;
        } else if only_name {
            let new_name = form.name.trim().to_owned();
            self.editor.rename(&name, &new_name).map(|()| new_name)
        } else if only_text {
            let text = form.text.clone();
            self.editor.set_text(&name, &text).map(|()| name.clone())
        } else {
            self.editor.apply_properties(&name, &self.form)
        };
        match result {
            Ok(new_name) => {
                if new_name != name {
                    self.set_status(format!("Renamed {name} to {new_name}"));
                }
                self.select(Some(new_name));
            }
            Err(e) => {
                self.set_status(format!("Invalid property: {e}"));
                self.sync_form();
            }
        }
    }

    fn apply_canvas_form(&mut self) {
        let [width, height, title] = &self.canvas_form;
        match self.editor.set_canvas(width, height, title) {
            Ok(()) => self.set_status("Canvas updated".into()),
            Err(e) => {
                self.set_status(format!("Invalid canvas settings: {e}"));
                self.sync_canvas_form();
            }
        }
    }

    /// Save project to file. Returns false if nothing was written.
    fn save_project(&mut self, path: Option<PathBuf>) -> bool {
        let Some(path) = path.or_else(|| {
            rfd::FileDialog::new()
                .add_filter("RAD Project", &["json"])
                .set_file_name("project.json")
                .save_file()
        }) else {
            return false;
        };
        match self.editor.save_to(&path) {
            Ok(()) => {
                self.set_status(format!("Saved to {}", path.display()));
                self.current_file = Some(path);
                true
            }
            Err(e) => {
                error!(error = %e, "save failed");
                self.set_status(format!("Save failed: {e}"));
                false
            }
        }
    }

    /// Load project from file
    fn load_project(&mut self, path: PathBuf) {
        match self.editor.load_from(&path) {
            Ok(()) => {
                self.select(None);
                self.sync_canvas_form();
                self.check = CheckState::Idle;
                self.set_status(format!("Loaded {}", path.display()));
                self.current_file = Some(path);
            }
            Err(e) => {
                error!(error = %e, "load failed");
                self.set_status(format!("Load failed: {e}"));
            }
        }
    }

    fn export_program(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Python", &["py"])
            .set_file_name("app.py")
            .save_file()
        else {
            return;
        };
        match self.editor.export_to(&path) {
            Ok(()) => self.set_status(format!("Exported {}", path.display())),
            Err(e) => self.set_status(format!("Export failed: {e}")),
        }
    }

    /// Run `action` now, or ask first when there are unsaved changes.
    fn request(&mut self, ctx: &egui::Context, action: Pending) {
        if self.editor.is_dirty() {
            self.pending = Some(action);
        } else {
            self.perform(ctx, action);
        }
    }

    fn perform(&mut self, ctx: &egui::Context, action: Pending) {
        match action {
            Pending::New => {
                self.editor.new_project();
                self.current_file = None;
                self.check = CheckState::Idle;
                self.select(None);
                self.sync_canvas_form();
                self.set_status("New project created".into());
            }
            Pending::Open => {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("RAD Project", &["json"])
                    .pick_file()
                {
                    self.load_project(path);
                }
            }
            Pending::Quit => {
                self.allow_close = true;
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }
    }

    fn run_program(&mut self) {
        match self.runner.run_detached(self.editor.source()) {
            Ok(pid) => self.set_status(format!("Started program (pid {pid})")),
            Err(e) => self.set_status(format!("Run failed: {e}")),
        }
    }

    fn start_check(&mut self) {
        if matches!(self.check, CheckState::Running(_)) {
            return;
        }
        let (tx, rx) = mpsc::channel();
        let runner = self.runner.clone();
        let source = self.editor.source().to_owned();
        std::thread::spawn(move || {
            let _ = tx.send(runner.verify(&source));
        });
        self.check = CheckState::Running(rx);
        self.right_tab = RightTab::Code;
    }

    fn poll_check(&mut self, ctx: &egui::Context) {
        if let CheckState::Running(rx) = &self.check {
            match rx.try_recv() {
                Ok(result) => {
                    // The fault line is only marked in the highlighted view
                    if matches!(result, Ok(Verification::Fault(_))) {
                        self.syntax_highlighting = true;
                    }
                    self.check = CheckState::Done(result);
                }
                Err(mpsc::TryRecvError::Empty) => {
                    ctx.request_repaint_after(Duration::from_millis(100));
                }
                Err(mpsc::TryRecvError::Disconnected) => self.check = CheckState::Idle,
            }
        }
    }

    fn fault_line(&self) -> Option<u32> {
        match &self.check {
            CheckState::Done(Ok(Verification::Fault(fault))) => fault.line,
            _ => None,
        }
    }

    fn title(&self) -> String {
        let file = self
            .current_file
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_owned());
        let dirty = if self.editor.is_dirty() { "*" } else { "" };
        format!("{APP_NAME} - {file}{dirty}")
    }

    fn draw_grid(&self, painter: &Painter, rect: Rect) {
        let g = GRID_SIZE as f32;
        let cols = (rect.width() / g) as i32;
        let rows = (rect.height() / g) as i32;
        let stroke = Stroke::new(1.0, Color32::from_gray(222));
        for c in 0..=cols {
            let x = rect.left() + c as f32 * g;
            painter.line_segment([pos2(x, rect.top()), pos2(x, rect.bottom())], stroke);
        }
        for r in 0..=rows {
            let y = rect.top() + r as f32 * g;
            painter.line_segment([pos2(rect.left(), y), pos2(rect.right(), y)], stroke);
        }
    }

    fn canvas_ui(&mut self, ui: &mut egui::Ui) {
        let boundary = self.editor.boundary();
        let elements: Vec<Element> = self.editor.model().elements().values().cloned().collect();
        let extent = elements.iter().fold(
            vec2(boundary.w as f32, boundary.h as f32),
            |acc, e| {
                let g = e.geometry;
                acc.max(vec2((g.x + g.w) as f32, (g.y + g.h) as f32))
            },
        );

        let (background, painter) =
            ui.allocate_painter(extent + vec2(CANVAS_MARGIN, CANVAS_MARGIN), Sense::click());
        let origin = background.rect.min;
        painter.rect_filled(background.rect, 0.0, Color32::from_gray(240));
        if self.show_grid {
            self.draw_grid(&painter, background.rect);
        }

        let mut hit_element = false;
        let mut drag_to = None;
        for element in &elements {
            let g = element.geometry;
            let rect = Rect::from_min_size(
                origin + vec2(g.x as f32, g.y as f32),
                vec2(g.w as f32, g.h as f32),
            );
            let is_selected = self.selected.as_deref() == Some(element.name.as_str());
            paint_element(&painter, rect, element, is_selected);

            let id = ui.make_persistent_id(("element", &element.name));
            let resp = ui.interact(rect, id, Sense::click_and_drag());
            let handle_at = |pos: egui::Pos2| {
                let local = pos - rect.min;
                ResizeHandle::hit(local.x as i32, local.y as i32, g.w, g.h)
            };
            if let Some(pos) = resp.hover_pos() {
                ui.ctx().set_cursor_icon(match handle_at(pos) {
                    Some(ResizeHandle::Left | ResizeHandle::Right) => egui::CursorIcon::ResizeHorizontal,
                    Some(ResizeHandle::Top | ResizeHandle::Bottom) => egui::CursorIcon::ResizeVertical,
                    Some(ResizeHandle::BottomRight) => egui::CursorIcon::ResizeNwSe,
                    Some(ResizeHandle::TopRight) => egui::CursorIcon::ResizeNeSw,
                    None => egui::CursorIcon::Grab,
                });
            }
            if resp.clicked() || resp.drag_started() {
                hit_element = true;
                if !is_selected {
                    self.select(Some(element.name.clone()));
                }
            }
            if resp.drag_started() {
                self.drag = Some(DragState {
                    name: element.name.clone(),
                    origin: g,
                    handle: resp.interact_pointer_pos().and_then(handle_at),
                    total: egui::Vec2::ZERO,
                });
            }
            if resp.dragged()
                && let Some(drag) = self.drag.as_mut()
                && drag.name == element.name
            {
                drag.total += resp.drag_delta();
                drag_to = Some((
                    drag.name.clone(),
                    drag.origin,
                    drag.handle,
                    drag.total.x.round() as i32,
                    drag.total.y.round() as i32,
                ));
            }
            if resp.drag_stopped() {
                self.drag = None;
            }
        }

        draw_boundary(&painter, origin, boundary);

        if let Some((name, origin, handle, dx, dy)) = drag_to {
            if let Err(e) = self.editor.drag(&name, origin, handle, dx, dy) {
                self.set_status(format!("Cannot move {name}: {e}"));
                self.drag = None;
            }
            self.sync_form();
        }

        if background.clicked() && !hit_element {
            self.select(None);
        }
    }

    fn palette_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("Palette");
        ui.separator();
        ui.label("Click a control to add it to the canvas");
        ui.add_space(4.0);

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for kind in ElementKind::PALETTE {
                    if ui
                        .add_sized([140.0, 22.0], egui::Button::new(kind.type_name()))
                        .clicked()
                    {
                        self.add_element(kind);
                    }
                }

                ui.add_space(6.0);
                ui.label("Radiobutton group");
                ui.text_edit_singleline(&mut self.radio_group)
                    .on_hover_text("Radiobuttons sharing a group share one variable");

                ui.add_space(8.0);
                ui.separator();
                egui::CollapsingHeader::new("Shortcuts")
                    .default_open(false)
                    .show(ui, |ui| {
                        ui.small("Delete: remove");
                        ui.small("Ctrl+C/V: copy/paste");
                        ui.small("Ctrl+S: save");
                        ui.small("Ctrl+O: open");
                        ui.small("F5: run");
                        ui.small("F6: check");
                    });
            });
    }

    fn inspector_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("Inspector");
        ui.separator();
        let Some(kind) = self
            .selected
            .as_deref()
            .and_then(|name| self.editor.model().get(name))
            .map(|e| e.kind.clone())
        else {
            ui.label("Select an element on the canvas.");
            return;
        };

        ui.label(format!("Type: {kind}"));
        ui.add_space(6.0);
        let mut submitted = false;
        egui::Grid::new("properties")
            .num_columns(2)
            .spacing([8.0, 4.0])
            .show(ui, |ui| {
                ui.label("ID");
                submitted |= ui.text_edit_singleline(&mut self.form.name).lost_focus();
                ui.end_row();

                ui.label(kind.text_role());
                if kind == ElementKind::TextArea {
                    ui.add(egui::TextEdit::multiline(&mut self.form.text).desired_rows(4));
                } else {
                    submitted |= ui.text_edit_singleline(&mut self.form.text).lost_focus();
                }
                ui.end_row();

                for (label, value) in [
                    ("X", &mut self.form.x),
                    ("Y", &mut self.form.y),
                    ("Width", &mut self.form.w),
                    ("Height", &mut self.form.h),
                ] {
                    ui.label(label);
                    submitted |= ui.text_edit_singleline(value).lost_focus();
                    ui.end_row();
                }

                if kind == ElementKind::Radiobutton {
                    ui.label("Group");
                    submitted |= ui.text_edit_singleline(&mut self.form.group).lost_focus();
                    ui.end_row();
                }
            });
        let enter = submitted && ui.input(|i| i.key_pressed(egui::Key::Enter));

        ui.add_space(6.0);
        let (mut apply, mut delete, mut copy) = (enter, false, false);
        ui.horizontal(|ui| {
            apply |= ui.button("Apply").clicked();
            copy = ui.button("Copy").clicked();
            delete = ui.button("Delete").clicked();
        });
        if apply {
            self.apply_form();
        }
        if copy {
            self.copy_selected();
        }
        if delete {
            self.delete_selected();
        }
    }

    fn outline_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("Elements");
        ui.separator();
        let mut clicked = None;
        TableBuilder::new(ui)
            .striped(true)
            .column(Column::auto().at_least(100.0))
            .column(Column::auto().at_least(80.0))
            .columns(Column::auto(), 4)
            .header(20.0, |mut header| {
                for title in ["ID", "Type", "X", "Y", "W", "H"] {
                    header.col(|ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|mut body| {
                for e in self.editor.model().elements().values() {
                    body.row(18.0, |mut row| {
                        row.col(|ui| {
                            let selected = self.selected.as_deref() == Some(e.name.as_str());
                            if ui.selectable_label(selected, &e.name).clicked() {
                                clicked = Some(e.name.clone());
                            }
                        });
                        row.col(|ui| {
                            ui.label(e.kind.type_name());
                        });
                        let g = e.geometry;
                        for v in [g.x, g.y, g.w, g.h] {
                            row.col(|ui| {
                                ui.monospace(v.to_string());
                            });
                        }
                    });
                }
            });
        if clicked.is_some() {
            self.select(clicked);
        }
    }

    fn check_result_ui(&self, ui: &mut egui::Ui) {
        let red = Color32::from_rgb(230, 90, 90);
        match &self.check {
            CheckState::Idle => {
                ui.weak("Check (F6) compiles the program in a separate interpreter.");
            }
            CheckState::Running(_) => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Checking...");
                });
            }
            CheckState::Done(Ok(Verification::Passed { at })) => {
                let what = if self.runner.executes() {
                    "No syntax or runtime errors."
                } else {
                    "No syntax errors."
                };
                ui.colored_label(
                    Color32::from_rgb(100, 190, 100),
                    format!("{what}\nLast verified: {}", at.format("%Y-%m-%d %H:%M:%S")),
                );
            }
            CheckState::Done(Ok(Verification::Fault(fault))) => {
                ui.colored_label(red, fault.to_string());
            }
            CheckState::Done(Err(e)) => {
                ui.colored_label(red, format!("Check could not run: {e}"));
            }
        }
    }

    fn generated_panel(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Program");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.checkbox(&mut self.syntax_highlighting, "Syntax Highlighting")
                    .on_hover_text("Highlighted view is read-only; turn off to edit");
            });
        });
        ui.horizontal(|ui| {
            if ui.button("Run").on_hover_text("F5").clicked() {
                self.run_program();
            }
            if ui.button("Check").on_hover_text("F6").clicked() {
                self.start_check();
            }
            if ui.button("Regenerate").clicked() {
                self.editor.regenerate();
            }
        });
        self.check_result_ui(ui);
        ui.separator();

        if self.syntax_highlighting {
            highlight::code_viewer(ui, &self.highlighter, self.editor.source(), self.fault_line());
        } else {
            let mut text = self.editor.source().to_owned();
            if highlight::code_editor(ui, &mut text) {
                self.editor.set_source(text);
            }
        }
    }

    fn top_bar(&mut self, ui: &mut egui::Ui) {
        // Show status message if recent
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed().as_secs() < STATUS_SECS {
                ui.horizontal(|ui| {
                    ui.label(msg);
                });
            } else {
                self.status_message = None;
            }
        }

        let ctx = ui.ctx().clone();
        egui::MenuBar::new().ui(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui
                    .button("New Project")
                    .on_hover_text("Start over with an empty canvas")
                    .clicked()
                {
                    self.request(&ctx, Pending::New);
                    ui.close_kind(egui::UiKind::Menu);
                }
                ui.separator();
                if ui
                    .button("Open...")
                    .on_hover_text("Open a project file (Ctrl+O)")
                    .clicked()
                {
                    self.request(&ctx, Pending::Open);
                    ui.close_kind(egui::UiKind::Menu);
                }
                if ui
                    .button("Save")
                    .on_hover_text("Save project (Ctrl+S)")
                    .clicked()
                {
                    self.save_project(self.current_file.clone());
                    ui.close_kind(egui::UiKind::Menu);
                }
                if ui
                    .button("Save As...")
                    .on_hover_text("Save project to a new file")
                    .clicked()
                {
                    self.save_project(None);
                    ui.close_kind(egui::UiKind::Menu);
                }
                ui.separator();
                if ui
                    .button("Export .py...")
                    .on_hover_text("Write the program as a standalone Python file")
                    .clicked()
                {
                    self.export_program();
                    ui.close_kind(egui::UiKind::Menu);
                }
                ui.separator();
                if ui.button("Quit").clicked() {
                    self.request(&ctx, Pending::Quit);
                    ui.close_kind(egui::UiKind::Menu);
                }
            });

            ui.menu_button("Edit", |ui| {
                let has_selection = self.selected.is_some();
                ui.add_enabled_ui(has_selection, |ui| {
                    if ui.button("Copy").on_hover_text("Ctrl+C").clicked() {
                        self.copy_selected();
                        ui.close_kind(egui::UiKind::Menu);
                    }
                    if ui.button("Delete").on_hover_text("Del").clicked() {
                        self.delete_selected();
                        ui.close_kind(egui::UiKind::Menu);
                    }
                });
                ui.add_enabled_ui(self.editor.has_clipboard(), |ui| {
                    if ui.button("Paste").on_hover_text("Ctrl+V").clicked() {
                        self.paste();
                        ui.close_kind(egui::UiKind::Menu);
                    }
                });
            });

            ui.menu_button("Run", |ui| {
                if ui.button("Run").on_hover_text("F5").clicked() {
                    self.run_program();
                    ui.close_kind(egui::UiKind::Menu);
                }
                if ui.button("Check").on_hover_text("F6").clicked() {
                    self.start_check();
                    ui.close_kind(egui::UiKind::Menu);
                }
            });

            ui.menu_button("View", |ui| {
                ui.checkbox(&mut self.palette_open, "Show Palette");
                ui.checkbox(&mut self.show_grid, "Show Grid");
                ui.checkbox(&mut self.syntax_highlighting, "Syntax Highlighting");
                if ui.checkbox(&mut self.dark_mode, "Dark Mode").changed() {
                    ctx.set_visuals(if self.dark_mode {
                        egui::Visuals::dark()
                    } else {
                        egui::Visuals::light()
                    });
                    self.highlighter.set_dark(self.dark_mode);
                }
            });

            ui.menu_button("Settings", |ui| {
                ui.strong("Canvas");
                ui.add_space(4.0);
                egui::Grid::new("canvas_settings")
                    .num_columns(2)
                    .show(ui, |ui| {
                        for (label, value) in
                            ["Width", "Height", "Title"].into_iter().zip(self.canvas_form.iter_mut())
                        {
                            ui.label(label);
                            ui.text_edit_singleline(value);
                            ui.end_row();
                        }
                    });
                if ui.button("Apply").clicked() {
                    self.apply_canvas_form();
                    ui.close_kind(egui::UiKind::Menu);
                }
            });

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.strong(APP_NAME);
                if let Some(name) = &self.selected {
                    ui.separator();
                    ui.label(format!("{name} selected"));
                }
            });
        });
    }

    fn unsaved_dialog(&mut self, ctx: &egui::Context) {
        let Some(action) = self.pending else {
            return;
        };
        let mut choice = None;
        egui::Window::new("Unsaved changes")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("Save changes to the project before continuing?");
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        choice = Some(true);
                    }
                    if ui.button("Discard").clicked() {
                        choice = Some(false);
                    }
                    if ui.button("Cancel").clicked() {
                        self.pending = None;
                    }
                });
            });
        match choice {
            Some(true) => {
                if self.save_project(self.current_file.clone()) {
                    self.pending = None;
                    self.perform(ctx, action);
                }
            }
            Some(false) => {
                self.pending = None;
                self.perform(ctx, action);
            }
            None => {}
        }
    }
}

/// Dashed outline of the generated window's size.
fn draw_boundary(painter: &Painter, origin: egui::Pos2, boundary: Geometry) {
    let rect = Rect::from_min_size(
        origin + vec2(boundary.x as f32, boundary.y as f32),
        vec2(boundary.w as f32, boundary.h as f32),
    );
    let points = [
        rect.left_top(),
        rect.right_top(),
        rect.right_bottom(),
        rect.left_bottom(),
        rect.left_top(),
    ];
    painter.extend(egui::Shape::dashed_line(
        &points,
        Stroke::new(1.5, Color32::from_rgb(220, 60, 60)),
        6.0,
        4.0,
    ));
}

/// Approximate what Tk will draw for `e`.
fn paint_element(painter: &Painter, rect: Rect, e: &Element, selected: bool) {
    let p = painter.with_clip_rect(rect.intersect(painter.clip_rect()));
    let font = FontId::proportional(13.0);
    let ink = Color32::from_gray(20);
    let field = Color32::WHITE;
    let border = Stroke::new(1.0, Color32::from_gray(150));
    let pad = 4.0;
    let left_mid = pos2(rect.left() + pad, rect.center().y);

    let boxed = |fill: Color32| {
        p.rect_filled(rect, 2.0, fill);
        p.rect_stroke(rect, CornerRadius::same(2), border, egui::StrokeKind::Inside);
    };

    match &e.kind {
        ElementKind::Label => {
            p.text(left_mid, Align2::LEFT_CENTER, &e.text, font, ink);
        }
        ElementKind::Button => {
            boxed(Color32::from_gray(225));
            p.text(rect.center(), Align2::CENTER_CENTER, &e.text, font, ink);
        }
        ElementKind::Entry => {
            boxed(field);
            p.text(left_mid, Align2::LEFT_CENTER, &e.text, font, ink);
        }
        ElementKind::TextArea => {
            boxed(field);
            p.text(rect.left_top() + vec2(pad, pad), Align2::LEFT_TOP, &e.text, font, ink);
        }
        ElementKind::Listbox => {
            boxed(field);
            for i in 0..3 {
                let at = rect.left_top() + vec2(pad, pad + i as f32 * 16.0);
                p.text(at, Align2::LEFT_TOP, format!("Item {}", i + 1), font.clone(), ink);
            }
        }
        ElementKind::Combobox => {
            boxed(field);
            p.text(left_mid, Align2::LEFT_CENTER, &e.text, font.clone(), ink);
            let arrow = pos2(rect.right() - pad, rect.center().y);
            p.text(arrow, Align2::RIGHT_CENTER, "▾", font, ink);
        }
        ElementKind::Treeview => {
            boxed(field);
            let header = Rect::from_min_size(rect.min, vec2(rect.width(), 20.0));
            p.rect_filled(header, 0.0, Color32::from_gray(220));
            for (i, title) in ["Name", "Age", "Job"].into_iter().enumerate() {
                let at = pos2(rect.left() + pad + i as f32 * 70.0, header.center().y);
                p.text(at, Align2::LEFT_CENTER, title, font.clone(), ink);
            }
        }
        ElementKind::Checkbutton => {
            let tick = Rect::from_min_size(pos2(rect.left() + pad, rect.center().y - 6.0), vec2(12.0, 12.0));
            p.rect_stroke(tick, CornerRadius::same(2), Stroke::new(1.0, ink), egui::StrokeKind::Inside);
            p.text(pos2(tick.right() + 6.0, rect.center().y), Align2::LEFT_CENTER, &e.text, font, ink);
        }
        ElementKind::Radiobutton => {
            let center = pos2(rect.left() + pad + 6.0, rect.center().y);
            p.circle_stroke(center, 6.0, Stroke::new(1.0, ink));
            p.text(pos2(center.x + 12.0, center.y), Align2::LEFT_CENTER, &e.text, font, ink);
        }
        ElementKind::Unsupported(kind) => {
            boxed(Color32::from_rgb(250, 220, 220));
            let label = format!("Unsupported: {kind}");
            p.text(rect.center(), Align2::CENTER_CENTER, label, font, Color32::DARK_RED);
        }
    }

    let stroke = if selected {
        Stroke::new(2.0, Color32::LIGHT_BLUE)
    } else {
        Stroke::new(1.0, Color32::from_gray(170))
    };
    painter.rect_stroke(rect, CornerRadius::ZERO, stroke, egui::StrokeKind::Outside);
    if selected {
        let hs = 6.0;
        for corner in [rect.right_bottom(), rect.right_top(), rect.left_bottom(), rect.left_top()] {
            painter.rect_filled(
                Rect::from_center_size(corner, vec2(hs, hs)),
                1.0,
                Color32::from_rgb(100, 160, 255),
            );
        }
    }
}

impl eframe::App for RadBuilderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_check(ctx);

        // Intercept native window close requests (titlebar X)
        if ctx.input(|i| i.viewport().close_requested())
            && self.editor.is_dirty()
            && !self.allow_close
        {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.pending = Some(Pending::Quit);
        }

        // Keyboard shortcuts - check input first, then apply changes
        let typing = ctx.wants_keyboard_input();
        let (delete_pressed, copy_pressed, paste_pressed, save_pressed, open_pressed, run_pressed, check_pressed) =
            ctx.input(|i| {
                let del = !typing && i.key_pressed(egui::Key::Delete);
                let copy = !typing && i.modifiers.command && i.key_pressed(egui::Key::C);
                let paste = !typing && i.modifiers.command && i.key_pressed(egui::Key::V);
                let save = i.modifiers.command && i.key_pressed(egui::Key::S);
                let open = i.modifiers.command && i.key_pressed(egui::Key::O);
                let run = i.key_pressed(egui::Key::F5);
                let check = i.key_pressed(egui::Key::F6);
                (del, copy, paste, save, open, run, check)
            });
        // Arrow keys nudge by one grid step, Shift+arrows resize
        let (nudge, shift) = ctx.input(|i| {
            let step = |neg, pos| {
                (i.key_pressed(pos) as i32 - i.key_pressed(neg) as i32) * GRID_SIZE
            };
            (
                (
                    step(egui::Key::ArrowLeft, egui::Key::ArrowRight),
                    step(egui::Key::ArrowUp, egui::Key::ArrowDown),
                ),
                i.modifiers.shift,
            )
        });
        if !typing && nudge != (0, 0) {
            self.nudge_selected(nudge.0, nudge.1, shift);
        }

        if delete_pressed {
            self.delete_selected();
        }
        if copy_pressed {
            self.copy_selected();
        }
        if paste_pressed {
            self.paste();
        }
        if save_pressed {
            self.save_project(self.current_file.clone());
        }
        if open_pressed {
            self.request(ctx, Pending::Open);
        }
        if run_pressed {
            self.run_program();
        }
        if check_pressed {
            self.start_check();
        }

        egui::TopBottomPanel::top("menubar").show(ctx, |ui| self.top_bar(ui));
        if self.palette_open {
            egui::SidePanel::left("palette")
                .resizable(true)
                .show(ctx, |ui| {
                    self.palette_ui(ui);
                });
        }
        egui::SidePanel::right("inspector")
            .default_width(420.0)
            .resizable(true)
            .show(ctx, |ui| {
                // Tab bar for right panel
                ui.horizontal(|ui| {
                    for (tab, label) in [
                        (RightTab::Inspector, "Inspector"),
                        (RightTab::Outline, "Outline"),
                        (RightTab::Code, "Code"),
                    ] {
                        if ui.selectable_label(self.right_tab == tab, label).clicked() {
                            self.right_tab = tab;
                        }
                    }
                });
                ui.separator();

                match self.right_tab {
                    RightTab::Inspector => self.inspector_ui(ui),
                    RightTab::Outline => self.outline_ui(ui),
                    RightTab::Code => self.generated_panel(ui),
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::both()
                .id_salt("canvas_scroll")
                .show(ui, |ui| self.canvas_ui(ui));
        });

        self.unsaved_dialog(ctx);

        let title = self.title();
        if title != self.window_title {
            debug!(%title, "window title");
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(title.clone()));
            self.window_title = title;
        }
    }
}
