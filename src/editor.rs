//! One editing session: the element model, the live source text and the code
//! salvaged from it.
//!
//! Every action validates first and mutates second, so a rejected action leaves
//! the model and the text exactly as they were. Every accepted mutation ends with
//! one [`Editor::regenerate`] pass.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::codegen::{self, GenInput, scan};
use crate::error::{EditError, ProjectError};
use crate::model::{Canvas, ElementModel, parse_canvas_size};
use crate::project::Project;
use crate::widget::{Element, ElementKind, Geometry, ResizeHandle};

/// The inspector's fields as typed by the user, validated together on apply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct PropertyForm {
    pub(crate) name: String,
    pub(crate) text: String,
    pub(crate) x: String,
    pub(crate) y: String,
    pub(crate) w: String,
    pub(crate) h: String,
    pub(crate) group: String,
}

impl PropertyForm {
    pub(crate) fn from_element(e: &Element) -> Self {
        Self {
            name: e.name.clone(),
            text: e.text.clone(),
            x: e.geometry.x.to_string(),
            y: e.geometry.y.to_string(),
            w: e.geometry.w.to_string(),
            h: e.geometry.h.to_string(),
            group: e.group.clone().unwrap_or_default(),
        }
    }

    fn geometry(&self) -> Result<Geometry, EditError> {
        let int = |field, value: &str| {
            value
                .trim()
                .parse::<i32>()
                .map_err(|_| EditError::NotAnInteger {
                    field,
                    value: value.to_owned(),
                })
        };
        Ok(Geometry::new(
            int("x", &self.x)?,
            int("y", &self.y)?,
            int("w", &self.w)?,
            int("h", &self.h)?,
        ))
    }
}

pub(crate) struct Editor {
    model: ElementModel,
    source: String,
    /// Handler bodies seen so far, including ones whose element is gone.
    handlers: BTreeMap<String, String>,
    /// Custom code restored from a project file, used once by the next pass.
    seeded_custom: Option<String>,
    boundary: Geometry,
    dirty: bool,
    clipboard: Option<Element>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    pub(crate) fn new() -> Self {
        let mut editor = Self {
            model: ElementModel::default(),
            source: String::new(),
            handlers: BTreeMap::new(),
            seeded_custom: None,
            boundary: Canvas::default().boundary(),
            dirty: false,
            clipboard: None,
        };
        editor.regenerate();
        editor.dirty = false;
        editor
    }

    pub(crate) fn model(&self) -> &ElementModel {
        &self.model
    }

    pub(crate) fn source(&self) -> &str {
        &self.source
    }

    /// Replace the live text with the user's edit. Takes effect at the next pass.
    pub(crate) fn set_source(&mut self, source: String) {
        if source != self.source {
            self.source = source;
            self.dirty = true;
        }
    }

    /// Canvas boundary overlay, recomputed on every pass.
    pub(crate) fn boundary(&self) -> Geometry {
        self.boundary
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn has_clipboard(&self) -> bool {
        self.clipboard.is_some()
    }

    #[cfg(test)]
    pub(crate) fn handlers(&self) -> &BTreeMap<String, String> {
        &self.handlers
    }

    /// Salvage user code from the live text, then rebuild it from the model.
    pub(crate) fn regenerate(&mut self) {
        let custom = match self.seeded_custom.take() {
            Some(custom) => custom,
            None => scan::extract_custom_code(&self.source),
        };
        for (function, body) in scan::extract_handlers(&self.source) {
            // A cleared body falls back to the default stub instead of an older body
            if body.trim().is_empty() {
                self.handlers.remove(&function);
            } else {
                self.handlers.insert(function, body);
            }
        }

        let source = codegen::generate(&GenInput {
            elements: self.model.elements(),
            canvas: self.model.canvas(),
            custom_code: &custom,
            handlers: &self.handlers,
        });
        debug!(
            elements = self.model.len(),
            bytes = source.len(),
            "source regenerated"
        );
        self.source = source;
        self.boundary = self.model.canvas().boundary();
        self.dirty = true;
    }

    fn rejected<T>(action: &str, result: Result<T, EditError>) -> Result<T, EditError> {
        if let Err(e) = &result {
            warn!(%action, error = %e, "action rejected");
        }
        result
    }

    pub(crate) fn add(&mut self, kind: ElementKind, group: Option<&str>) -> Result<String, EditError> {
        let name = Self::rejected("add", self.model.add(kind, group))?;
        self.regenerate();
        Ok(name)
    }

    pub(crate) fn move_to(&mut self, name: &str, x: i32, y: i32) -> Result<(), EditError> {
        if Self::rejected("move", self.model.move_to(name, x, y))? {
            self.regenerate();
        }
        Ok(())
    }

    pub(crate) fn resize_to(&mut self, name: &str, w: i32, h: i32) -> Result<(), EditError> {
        if Self::rejected("resize", self.model.resize_to(name, w, h))? {
            self.regenerate();
        }
        Ok(())
    }

    /// Pointer drag from `origin` (the geometry at press time) by `(dx, dy)`.
    /// `handle` selects a resize; `None` moves the element.
    pub(crate) fn drag(
        &mut self,
        name: &str,
        origin: Geometry,
        handle: Option<ResizeHandle>,
        dx: i32,
        dy: i32,
    ) -> Result<(), EditError> {
        let geometry = match handle {
            Some(handle) => origin.resized(handle, dx, dy),
            None => origin.moved(dx, dy),
        };
        if Self::rejected("drag", self.model.set_geometry(name, geometry))? {
            self.regenerate();
        }
        Ok(())
    }

    pub(crate) fn set_text(&mut self, name: &str, text: &str) -> Result<(), EditError> {
        Self::rejected("set text", self.model.set_text(name, text))?;
        self.regenerate();
        Ok(())
    }

    /// Rename an element and carry its handler names along in the live text.
    pub(crate) fn rename(&mut self, old: &str, new: &str) -> Result<(), EditError> {
        let new = new.trim();
        Self::rejected("rename", self.model.check_rename(old, new))?;
        self.rename_unchecked(old, new)?;
        self.regenerate();
        Ok(())
    }

    fn rename_unchecked(&mut self, old: &str, new: &str) -> Result<(), EditError> {
        if old == new {
            return Ok(());
        }
        self.source = scan::rename_handlers(&self.source, old, new);
        self.model.rename(old, new)?;
        info!(%old, %new, "element renamed");
        Ok(())
    }

    /// Apply every inspector field at once. Returns the element's (possibly new) name.
    pub(crate) fn apply_properties(
        &mut self,
        name: &str,
        form: &PropertyForm,
    ) -> Result<String, EditError> {
        let new_name = form.name.trim();
        let validated = self.validate_form(name, new_name, form);
        let (geometry, group) = Self::rejected("apply properties", validated)?;

        self.rename_unchecked(name, new_name)?;
        self.model.set_text(new_name, &form.text)?;
        self.model.set_geometry(new_name, geometry)?;
        if let Some(group) = group {
            self.model.set_group(new_name, &group)?;
        }
        self.regenerate();
        Ok(new_name.to_owned())
    }

    fn validate_form(
        &self,
        name: &str,
        new_name: &str,
        form: &PropertyForm,
    ) -> Result<(Geometry, Option<String>), EditError> {
        self.model.check_rename(name, new_name)?;
        let geometry = form.geometry()?;
        let element = self
            .model
            .get(name)
            .ok_or_else(|| EditError::UnknownElement(name.to_owned()))?;
        let group = match element.kind {
            ElementKind::Radiobutton => Some(self.model.check_group(&form.group, Some(name))?),
            _ => None,
        };
        // Name and group were each checked alone; the pair must fit together too
        let mut candidate = element.clone();
        candidate.name = new_name.to_owned();
        if group.is_some() {
            candidate.group.clone_from(&group);
        }
        self.model.check_replacement(name, &candidate)?;
        Ok((geometry, group))
    }

    pub(crate) fn delete(&mut self, name: &str) -> Result<(), EditError> {
        Self::rejected("delete", self.model.delete(name))?;
        self.regenerate();
        Ok(())
    }

    pub(crate) fn copy(&mut self, name: &str) -> Result<(), EditError> {
        let element = self
            .model
            .get(name)
            .ok_or_else(|| EditError::UnknownElement(name.to_owned()))?;
        self.clipboard = Some(element.clone());
        Ok(())
    }

    /// Paste the copied element under a fresh name. `None` if nothing was copied.
    pub(crate) fn paste(&mut self) -> Option<String> {
        let template = self.clipboard.clone()?;
        let name = self.model.paste(&template);
        self.regenerate();
        Some(name)
    }

    /// Apply canvas settings typed by the user. Invalid sizes change nothing.
    pub(crate) fn set_canvas(&mut self, width: &str, height: &str, title: &str) -> Result<(), EditError> {
        let (width, height) = Self::rejected("canvas size", parse_canvas_size(width, height))?;
        self.model.set_canvas(Canvas {
            width,
            height,
            title: title.to_owned(),
        });
        self.regenerate();
        Ok(())
    }

    /// Start over with an empty canvas and no preserved code.
    pub(crate) fn new_project(&mut self) {
        *self = Self::new();
    }

    /// Capture the persisted state. Reads the live text, never writes it.
    pub(crate) fn snapshot(&self) -> Project {
        let canvas = self.model.canvas();
        Project {
            elements: self.model.elements().clone(),
            custom_code: scan::extract_custom_code(&self.source),
            preserved_handlers: scan::extract_handlers(&self.source)
                .into_iter()
                .filter(|(_, body)| !body.trim().is_empty())
                .collect(),
            canvas_width: canvas.width,
            canvas_height: canvas.height,
            canvas_title: canvas.title.clone(),
        }
    }

    /// Replace the whole session with `project` and generate once from it.
    pub(crate) fn load(&mut self, project: Project) {
        let canvas = project.canvas();
        self.model = ElementModel::restore(project.elements, canvas);
        self.handlers = project.preserved_handlers;
        self.seeded_custom = Some(project.custom_code);
        self.source.clear();
        self.regenerate();
        self.dirty = false;
    }

    pub(crate) fn save_to(&mut self, path: &Path) -> Result<(), ProjectError> {
        self.snapshot().save_to(path)?;
        self.dirty = false;
        info!(path = %path.display(), elements = self.model.len(), "project saved");
        Ok(())
    }

    pub(crate) fn load_from(&mut self, path: &Path) -> Result<(), ProjectError> {
        let project = Project::load_from(path)?;
        self.load(project);
        info!(path = %path.display(), elements = self.model.len(), "project loaded");
        Ok(())
    }

    /// Write the live text as a standalone program.
    pub(crate) fn export_to(&self, path: &Path) -> Result<(), ProjectError> {
        std::fs::write(path, &self.source).map_err(|source| ProjectError::Io {
            path: path.to_owned(),
            source,
        })?;
        info!(path = %path.display(), "program exported");
        Ok(())
    }
}
