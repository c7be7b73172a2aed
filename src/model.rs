//! The canonical, ordered set of elements on the canvas plus canvas settings.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use crate::codegen::scan::HandlerRole;
use crate::error::EditError;
use crate::widget::{
    Element, ElementKind, Geometry, MIN_SIZE, naming::NameCounter, naming::validate_identifier,
    snap_to_grid,
};

pub(crate) const DEFAULT_CANVAS_WIDTH: u32 = 800;
pub(crate) const DEFAULT_CANVAS_HEIGHT: u32 = 600;
pub(crate) const DEFAULT_CANVAS_TITLE: &str = "Generated GUI";

/// Size and title of the generated application window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Canvas {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) title: String,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
            title: DEFAULT_CANVAS_TITLE.to_owned(),
        }
    }
}

impl Canvas {
    /// Rectangle drawn as the dashed boundary overlay.
    pub(crate) fn boundary(&self) -> Geometry {
        Geometry::new(0, 0, self.width as i32, self.height as i32)
    }
}

/// Parse user-entered canvas dimensions; both must be positive integers.
pub(crate) fn parse_canvas_size(width: &str, height: &str) -> Result<(u32, u32), EditError> {
    let parse = |field: &'static str, value: &str| {
        value
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|v| *v > 0 && *v <= i32::MAX as u32)
            .ok_or_else(|| EditError::InvalidCanvasSize {
                field,
                value: value.to_owned(),
            })
    };
    Ok((parse("width", width)?, parse("height", height)?))
}

/// What a module-level name in the generated program is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Binding {
    Widget,
    Function,
    CheckVar,
    GroupVar,
}

/// Names `e` binds at module level in the generated program.
fn bindings_of(e: &Element) -> Vec<(String, Binding)> {
    let mut out = vec![(e.name.clone(), Binding::Widget)];
    let role = match e.kind {
        ElementKind::Button => Some(HandlerRole::Click),
        ElementKind::Combobox | ElementKind::Listbox => Some(HandlerRole::Options),
        ElementKind::Treeview => Some(HandlerRole::Data),
        _ => None,
    };
    if let Some(role) = role {
        out.push((role.function_name(&e.name), Binding::Function));
    }
    match e.kind {
        ElementKind::Checkbutton => out.push((format!("{}_var", e.name), Binding::CheckVar)),
        ElementKind::Radiobutton => out.push((e.group_var(), Binding::GroupVar)),
        _ => {}
    }
    out
}

/// Record one binding. Radiobuttons of one group share their variable; anything
/// else bound twice is returned as `Err`.
fn bind(seen: &mut HashMap<String, Binding>, ident: String, what: Binding) -> Result<(), String> {
    match seen.insert(ident.clone(), what) {
        Some(Binding::GroupVar) if what == Binding::GroupVar => Ok(()),
        Some(_) => Err(ident),
        None => Ok(()),
    }
}

/// A name the generated program for `elements` would bind to two different things.
pub(crate) fn binding_clash<'a>(elements: impl IntoIterator<Item = &'a Element>) -> Option<String> {
    let mut seen = HashMap::new();
    elements
        .into_iter()
        .flat_map(bindings_of)
        .find_map(|(ident, what)| bind(&mut seen, ident, what).err())
}

/// Elements keyed by name, iterated in insertion order.
#[derive(Clone, Debug, Default)]
pub(crate) struct ElementModel {
    elements: IndexMap<String, Element>,
    names: NameCounter,
    canvas: Canvas,
}

impl ElementModel {
    /// Rebuild a model from restored state, raising name counters past every restored ID.
    pub(crate) fn restore(elements: IndexMap<String, Element>, canvas: Canvas) -> Self {
        let mut names = NameCounter::default();
        for name in elements.keys() {
            names.observe(name);
        }
        Self {
            elements,
            names,
            canvas,
        }
    }

    pub(crate) fn elements(&self) -> &IndexMap<String, Element> {
        &self.elements
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Element> {
        self.elements.get(name)
    }

    pub(crate) fn len(&self) -> usize {
        self.elements.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub(crate) fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub(crate) fn set_canvas(&mut self, canvas: Canvas) {
        self.canvas = canvas;
    }

    /// Whether `extra` fits beside the bindings of every element except `skip`.
    /// `Err` names the clashing binding.
    fn check_bindings(
        &self,
        skip: Option<&str>,
        extra: Vec<(String, Binding)>,
    ) -> Result<(), String> {
        let mut seen: HashMap<String, Binding> = self
            .elements
            .values()
            .filter(|e| Some(e.name.as_str()) != skip)
            .flat_map(bindings_of)
            .collect();
        for (ident, what) in extra {
            bind(&mut seen, ident, what)?;
        }
        Ok(())
    }

    /// Issue a name for `template` that is free both as an ID and as every binding it implies.
    fn fresh_name(&mut self, template: &Element) -> String {
        let base = template.kind.name_base();
        let mut candidate = template.clone();
        loop {
            candidate.name = self.names.next_name(&base);
            if !self.elements.contains_key(&candidate.name)
                && validate_identifier(&candidate.name).is_ok()
                && self.check_bindings(None, bindings_of(&candidate)).is_ok()
            {
                return candidate.name;
            }
        }
    }

    /// Add a new element of `kind` with default properties and return its name.
    pub(crate) fn add(&mut self, kind: ElementKind, group: Option<&str>) -> Result<String, EditError> {
        let group = match kind {
            ElementKind::Radiobutton => Some(self.check_group(group.unwrap_or_default(), None)?),
            _ => None,
        };
        let offset = 50 + self.elements.len() as i32 * 20;
        let (w, h) = kind.default_size();
        let mut element = Element {
            name: String::new(),
            text: kind.default_text(),
            geometry: Geometry::new(offset, offset, w, h),
            kind,
            group,
        };
        let name = self.fresh_name(&element);
        element.name = name.clone();
        debug!(%name, kind = %element.kind, "element added");
        self.elements.insert(name.clone(), element);
        Ok(name)
    }

    /// Insert a copy of `template` under a fresh name, nudged down and right.
    pub(crate) fn paste(&mut self, template: &Element) -> String {
        let mut element = template.clone();
        element.geometry.x = element.geometry.x.saturating_add(20);
        element.geometry.y = element.geometry.y.saturating_add(20);
        if let Some(group) = &element.group
            && self.check_group(group, None).is_err()
        {
            element.group = None;
        }
        let name = self.fresh_name(&element);
        element.name = name.clone();
        self.elements.insert(name.clone(), element);
        name
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Element, EditError> {
        self.elements
            .get_mut(name)
            .ok_or_else(|| EditError::UnknownElement(name.to_owned()))
    }

    /// Interactive move: snaps to the grid. Returns whether anything changed.
    pub(crate) fn move_to(&mut self, name: &str, x: i32, y: i32) -> Result<bool, EditError> {
        let g = &mut self.get_mut(name)?.geometry;
        let (x, y) = (snap_to_grid(x), snap_to_grid(y));
        let changed = (g.x, g.y) != (x, y);
        g.x = x;
        g.y = y;
        Ok(changed)
    }

    /// Interactive resize: snaps to the grid and enforces the minimum size.
    pub(crate) fn resize_to(&mut self, name: &str, w: i32, h: i32) -> Result<bool, EditError> {
        let g = &mut self.get_mut(name)?.geometry;
        let w = snap_to_grid(w).max(MIN_SIZE);
        let h = snap_to_grid(h).max(MIN_SIZE);
        let changed = (g.w, g.h) != (w, h);
        g.w = w;
        g.h = h;
        Ok(changed)
    }

    /// Replace the whole geometry verbatim (property panel or a precomputed drag).
    pub(crate) fn set_geometry(&mut self, name: &str, geometry: Geometry) -> Result<bool, EditError> {
        let g = &mut self.get_mut(name)?.geometry;
        let changed = *g != geometry;
        *g = geometry;
        Ok(changed)
    }

    pub(crate) fn set_text(&mut self, name: &str, text: &str) -> Result<bool, EditError> {
        let e = self.get_mut(name)?;
        let changed = e.text != text;
        e.text = text.to_owned();
        Ok(changed)
    }

    pub(crate) fn set_group(&mut self, name: &str, group: &str) -> Result<bool, EditError> {
        let group = self.check_group(group, Some(name))?;
        let e = self.get_mut(name)?;
        if e.kind != ElementKind::Radiobutton {
            return Ok(false);
        }
        let changed = e.group.as_deref() != Some(group.as_str());
        e.group = Some(group);
        Ok(changed)
    }

    /// Validate a radiobutton group name without mutating anything. `owner` is the
    /// radiobutton being regrouped, `None` for one about to be added.
    pub(crate) fn check_group(&self, group: &str, owner: Option<&str>) -> Result<String, EditError> {
        let group = group.trim();
        let invalid = |reason: String| EditError::InvalidGroup {
            group: group.to_owned(),
            reason,
        };
        validate_identifier(group).map_err(|e| invalid(e.to_string()))?;
        let extra = match owner.and_then(|name| self.elements.get(name)) {
            Some(e) => {
                let mut regrouped = e.clone();
                regrouped.group = Some(group.to_owned());
                bindings_of(&regrouped)
            }
            None => vec![(format!("{group}_var"), Binding::GroupVar)],
        };
        self.check_bindings(owner, extra)
            .map_err(|ident| invalid(format!("'{ident}' is already bound by another element")))?;
        Ok(group.to_owned())
    }

    /// Check that `old` may be renamed to `new`. Never mutates.
    pub(crate) fn check_rename(&self, old: &str, new: &str) -> Result<(), EditError> {
        let Some(element) = self.elements.get(old) else {
            return Err(EditError::UnknownElement(old.to_owned()));
        };
        validate_identifier(new)?;
        if new != old && self.elements.contains_key(new) {
            return Err(EditError::DuplicateName(new.to_owned()));
        }
        let mut renamed = element.clone();
        renamed.name = new.to_owned();
        self.check_replacement(old, &renamed)
    }

    /// Check that `old` may be replaced by `candidate` without two bindings colliding.
    pub(crate) fn check_replacement(&self, old: &str, candidate: &Element) -> Result<(), EditError> {
        self.check_bindings(Some(old), bindings_of(candidate))
            .map_err(EditError::BindingClash)
    }

    /// Rename in place, keeping the element's position in model order.
    pub(crate) fn rename(&mut self, old: &str, new: &str) -> Result<bool, EditError> {
        self.check_rename(old, new)?;
        if old == new {
            return Ok(false);
        }
        let Some((index, _, mut element)) = self.elements.shift_remove_full(old) else {
            return Err(EditError::UnknownElement(old.to_owned()));
        };
        element.name = new.to_owned();
        self.elements.shift_insert(index, new.to_owned(), element);
        self.names.observe(new);
        debug!(%old, %new, "element renamed");
        Ok(true)
    }

    pub(crate) fn delete(&mut self, name: &str) -> Result<Element, EditError> {
        let element = self
            .elements
            .shift_remove(name)
            .ok_or_else(|| EditError::UnknownElement(name.to_owned()))?;
        debug!(%name, "element deleted");
        Ok(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_assigns_names_and_defaults() {
        let mut model = ElementModel::default();
        let a = model.add(ElementKind::Button, None).unwrap();
        let b = model.add(ElementKind::Button, None).unwrap();
        let c = model.add(ElementKind::TextArea, None).unwrap();
        assert_eq!((a.as_str(), b.as_str(), c.as_str()), ("button1", "button2", "textarea1"));

        let first = model.get("button1").unwrap();
        assert_eq!(first.geometry, Geometry::new(50, 50, 100, 30));
        assert_eq!(first.text, "Button");
        let third = model.get("textarea1").unwrap();
        assert_eq!(third.geometry, Geometry::new(90, 90, 200, 100));
        assert!(third.text.is_empty());
    }

    #[test]
    fn test_names_never_reused_after_delete() {
        let mut model = ElementModel::default();
        model.add(ElementKind::Label, None).unwrap();
        model.add(ElementKind::Label, None).unwrap();
        model.delete("label2").unwrap();
        assert_eq!(model.add(ElementKind::Label, None).unwrap(), "label3");
    }

    #[test]
    fn test_fresh_name_skips_taken_names() {
        let mut model = ElementModel::default();
        model.add(ElementKind::Label, None).unwrap();
        // A label renamed to what the next button would be called
        model.rename("label1", "button1").unwrap();
        assert_eq!(model.add(ElementKind::Button, None).unwrap(), "button2");
    }

    #[test]
    fn test_radiobutton_requires_valid_group() {
        let mut model = ElementModel::default();
        assert!(matches!(
            model.add(ElementKind::Radiobutton, None),
            Err(EditError::InvalidGroup { .. })
        ));
        assert!(model.is_empty());

        let r = model.add(ElementKind::Radiobutton, Some(" colors ")).unwrap();
        assert_eq!(model.get(&r).unwrap().group.as_deref(), Some("colors"));

        model.add(ElementKind::Checkbutton, None).unwrap();
        assert!(model.add(ElementKind::Radiobutton, Some("checkbutton1")).is_err());
        assert_eq!(model.len(), 2);
    }

    #[test]
    fn test_checkbutton_name_skips_radio_group() {
        let mut model = ElementModel::default();
        model.add(ElementKind::Radiobutton, Some("checkbutton1")).unwrap();
        assert_eq!(model.add(ElementKind::Checkbutton, None).unwrap(), "checkbutton2");
        assert_eq!(binding_clash(model.elements().values()), None);
    }

    #[test]
    fn test_rename_rejects_generated_bindings() {
        let mut model = ElementModel::default();
        model.add(ElementKind::Radiobutton, Some("colors")).unwrap();
        model.add(ElementKind::Checkbutton, None).unwrap();
        model.add(ElementKind::Label, None).unwrap();
        model.add(ElementKind::Button, None).unwrap();

        for taken in ["colors_var", "checkbutton1_var", "on_button1_click"] {
            assert_eq!(
                model.check_rename("label1", taken),
                Err(EditError::BindingClash(taken.into())),
            );
        }
        // A checkbutton may not take over the group's variable
        assert_eq!(
            model.rename("checkbutton1", "colors"),
            Err(EditError::BindingClash("colors_var".into()))
        );
        // A button's handler may not collide with an existing widget
        model.rename("label1", "on_x_click").unwrap();
        assert_eq!(
            model.check_rename("button1", "x"),
            Err(EditError::BindingClash("on_x_click".into()))
        );
        assert!(model.get("checkbutton1").is_some());
        assert_eq!(binding_clash(model.elements().values()), None);
    }

    #[test]
    fn test_group_rejects_bound_variable() {
        let mut model = ElementModel::default();
        model.add(ElementKind::Label, None).unwrap();
        model.rename("label1", "size_var").unwrap();
        assert!(matches!(
            model.add(ElementKind::Radiobutton, Some("size")),
            Err(EditError::InvalidGroup { .. })
        ));

        let r = model.add(ElementKind::Radiobutton, Some("shape")).unwrap();
        assert!(model.set_group(&r, "size").is_err());
        assert_eq!(model.get(&r).unwrap().group.as_deref(), Some("shape"));
        // Joining an existing group is fine
        let other = model.add(ElementKind::Radiobutton, Some("shape")).unwrap();
        assert!(!model.set_group(&other, "shape").unwrap());
    }

    #[test]
    fn test_paste_saturates_geometry() {
        let mut model = ElementModel::default();
        let n = model.add(ElementKind::Label, None).unwrap();
        model
            .set_geometry(&n, Geometry::new(i32::MAX - 5, i32::MAX, 100, 30))
            .unwrap();
        let template = model.get(&n).unwrap().clone();
        let pasted = model.paste(&template);
        let g = model.get(&pasted).unwrap().geometry;
        assert_eq!((g.x, g.y), (i32::MAX, i32::MAX));
    }

    #[test]
    fn test_move_and_resize_snap() {
        let mut model = ElementModel::default();
        let n = model.add(ElementKind::Entry, None).unwrap();
        assert!(model.move_to(&n, 123, 67).unwrap());
        assert!(model.resize_to(&n, 3, 44).unwrap());
        assert_eq!(model.get(&n).unwrap().geometry, Geometry::new(120, 70, 20, 40));
        assert!(!model.move_to(&n, 118, 72).unwrap());
    }

    #[test]
    fn test_set_geometry_allows_arbitrary_integers() {
        let mut model = ElementModel::default();
        let n = model.add(ElementKind::Label, None).unwrap();
        model.set_geometry(&n, Geometry::new(13, 7, 5, 3)).unwrap();
        assert_eq!(model.get(&n).unwrap().geometry, Geometry::new(13, 7, 5, 3));
    }

    #[test]
    fn test_rename_keeps_order_and_uniqueness() {
        let mut model = ElementModel::default();
        model.add(ElementKind::Label, None).unwrap();
        model.add(ElementKind::Button, None).unwrap();
        model.add(ElementKind::Entry, None).unwrap();

        assert_eq!(
            model.rename("button1", "label1"),
            Err(EditError::DuplicateName("label1".into()))
        );
        assert_eq!(
            model.rename("button1", "for"),
            Err(EditError::ReservedKeyword("for".into()))
        );
        assert!(model.rename("button1", "submit").unwrap());

        let order: Vec<_> = model.elements().keys().cloned().collect();
        assert_eq!(order, ["label1", "submit", "entry1"]);
        assert_eq!(model.get("submit").unwrap().name, "submit");
        assert!(model.get("button1").is_none());
    }

    #[test]
    fn test_restore_raises_counters() {
        let mut model = ElementModel::default();
        model.add(ElementKind::Button, None).unwrap();
        model.add(ElementKind::Button, None).unwrap();
        let elements = model.elements().clone();
        let mut restored = ElementModel::restore(elements, Canvas::default());
        assert_eq!(restored.add(ElementKind::Button, None).unwrap(), "button3");
    }

    #[test]
    fn test_parse_canvas_size() {
        assert_eq!(parse_canvas_size("800", " 600 "), Ok((800, 600)));
        assert!(matches!(
            parse_canvas_size("0", "600"),
            Err(EditError::InvalidCanvasSize { field: "width", .. })
        ));
        assert!(parse_canvas_size("800", "-1").is_err());
        assert!(parse_canvas_size("80.5", "600").is_err());
    }
}
