pub(crate) mod naming;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel increment interactive moves and resizes snap to.
pub(crate) const GRID_SIZE: i32 = 10;
/// Smallest width/height an interactive resize can produce.
pub(crate) const MIN_SIZE: i32 = 20;
/// Distance from an element edge that starts a resize instead of a move.
pub(crate) const HANDLE_THRESHOLD: i32 = 8;

/// The closed set of Tkinter widgets the builder knows how to emit.
///
/// Project files written by other tools may carry a type this build does not know;
/// those load as [`ElementKind::Unsupported`] and generate a comment placeholder.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub(crate) enum ElementKind {
    Label,
    Button,
    Entry,
    TextArea,
    Listbox,
    Combobox,
    Treeview,
    Checkbutton,
    Radiobutton,
    Unsupported(String),
}

impl ElementKind {
    /// Kinds offered by the palette, in palette order.
    pub(crate) const PALETTE: [ElementKind; 9] = [
        ElementKind::Label,
        ElementKind::Button,
        ElementKind::Entry,
        ElementKind::TextArea,
        ElementKind::Listbox,
        ElementKind::Combobox,
        ElementKind::Treeview,
        ElementKind::Checkbutton,
        ElementKind::Radiobutton,
    ];

    pub(crate) fn type_name(&self) -> &str {
        match self {
            ElementKind::Label => "Label",
            ElementKind::Button => "Button",
            ElementKind::Entry => "Entry",
            ElementKind::TextArea => "TextArea",
            ElementKind::Listbox => "Listbox",
            ElementKind::Combobox => "Combobox",
            ElementKind::Treeview => "Treeview",
            ElementKind::Checkbutton => "Checkbutton",
            ElementKind::Radiobutton => "Radiobutton",
            ElementKind::Unsupported(other) => other,
        }
    }

    /// Base used by the naming authority: `button` -> `button1`, `button2`, ...
    pub(crate) fn name_base(&self) -> String {
        let base: String = self
            .type_name()
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect::<String>()
            .to_lowercase();
        if base.is_empty() {
            "element".to_owned()
        } else {
            base
        }
    }

    /// Returns the default (w, h) for a freshly added element of this kind.
    pub fn default_size(&self) -> (i32, i32) {
        match self {
            ElementKind::TextArea => (200, 100),
            ElementKind::Listbox => (120, 80),
            ElementKind::Combobox => (120, 30),
            _ => (100, 30),
        }
    }

    /// Returns the default text for a freshly added element of this kind.
    pub fn default_text(&self) -> String {
        match self {
            ElementKind::Entry
            | ElementKind::TextArea
            | ElementKind::Listbox
            | ElementKind::Combobox => String::new(),
            other => other.type_name().to_owned(),
        }
    }

    /// Label for the text field in the inspector.
    pub(crate) fn text_role(&self) -> &'static str {
        match self {
            ElementKind::Entry | ElementKind::TextArea => "Initial value",
            ElementKind::Combobox => "Initial selection",
            ElementKind::Listbox | ElementKind::Treeview => "Text (unused)",
            _ => "Text",
        }
    }
}

impl From<String> for ElementKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Label" => ElementKind::Label,
            "Button" => ElementKind::Button,
            "Entry" => ElementKind::Entry,
            "TextArea" => ElementKind::TextArea,
            "Listbox" => ElementKind::Listbox,
            "Combobox" => ElementKind::Combobox,
            "Treeview" => ElementKind::Treeview,
            "Checkbutton" => ElementKind::Checkbutton,
            "Radiobutton" => ElementKind::Radiobutton,
            _ => ElementKind::Unsupported(s),
        }
    }
}

impl From<ElementKind> for String {
    fn from(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Unsupported(s) => s,
            other => other.type_name().to_owned(),
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Canvas-relative placement in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub(crate) struct Geometry {
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) w: i32,
    pub(crate) h: i32,
}

impl Geometry {
    pub(crate) const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Position after dragging by `(dx, dy)` from this geometry, snapped to the grid.
    pub(crate) fn moved(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: snap_to_grid(self.x.saturating_add(dx)),
            y: snap_to_grid(self.y.saturating_add(dy)),
            ..*self
        }
    }

    /// Geometry after dragging `handle` by `(dx, dy)` from this geometry.
    pub(crate) fn resized(&self, handle: ResizeHandle, dx: i32, dy: i32) -> Self {
        let Geometry { x: x0, y: y0, w: w0, h: h0 } = *self;
        let (mut x, mut y, mut w, mut h) = (x0, y0, w0, h0);

        let grow_right = |w: &mut i32| *w = w0.saturating_add(dx).max(MIN_SIZE);
        let grow_down = |h: &mut i32| *h = h0.saturating_add(dy).max(MIN_SIZE);
        // A clamped left/top edge pins the opposite edge in place.
        let pull_left = |x: &mut i32, w: &mut i32| {
            *w = w0.saturating_sub(dx).max(MIN_SIZE);
            *x = if *w == MIN_SIZE {
                x0.saturating_add(w0.saturating_sub(MIN_SIZE))
            } else {
                x0.saturating_add(dx)
            };
        };
        let pull_up = |y: &mut i32, h: &mut i32| {
            *h = h0.saturating_sub(dy).max(MIN_SIZE);
            *y = if *h == MIN_SIZE {
                y0.saturating_add(h0.saturating_sub(MIN_SIZE))
            } else {
                y0.saturating_add(dy)
            };
        };

        match handle {
            ResizeHandle::Right => grow_right(&mut w),
            ResizeHandle::Bottom => grow_down(&mut h),
            ResizeHandle::BottomRight => {
                grow_right(&mut w);
                grow_down(&mut h);
            }
            ResizeHandle::Left => pull_left(&mut x, &mut w),
            ResizeHandle::Top => pull_up(&mut y, &mut h),
            ResizeHandle::TopRight => {
                pull_up(&mut y, &mut h);
                grow_right(&mut w);
            }
        }

        Self {
            x: snap_to_grid(x),
            y: snap_to_grid(y),
            w: snap_to_grid(w).max(MIN_SIZE),
            h: snap_to_grid(h).max(MIN_SIZE),
        }
    }
}

/// Edge or corner grabbed for an interactive resize.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ResizeHandle {
    Right,
    Bottom,
    BottomRight,
    Left,
    Top,
    TopRight,
}

impl ResizeHandle {
    /// Which handle (if any) a press at element-local `(x, y)` grabs.
    ///
    /// Left beats right and top beats bottom when an element is too small to tell.
    pub(crate) fn hit(x: i32, y: i32, w: i32, h: i32) -> Option<Self> {
        let t = HANDLE_THRESHOLD;
        let mut handle = None;
        if (w - t..=w).contains(&x) {
            handle = Some(ResizeHandle::Right);
        }
        if (h - t..=h).contains(&y) {
            handle = Some(match handle {
                Some(_) => ResizeHandle::BottomRight,
                None => ResizeHandle::Bottom,
            });
        }
        if (0..=t).contains(&x) {
            handle = Some(ResizeHandle::Left);
        }
        if (0..=t).contains(&y) {
            handle = Some(match handle {
                Some(ResizeHandle::Right | ResizeHandle::BottomRight) => ResizeHandle::TopRight,
                _ => ResizeHandle::Top,
            });
        }
        handle
    }
}

/// One widget placed on the canvas.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Element {
    pub(crate) name: String,
    #[serde(rename = "type")]
    pub(crate) kind: ElementKind,
    #[serde(default)]
    pub(crate) text: String,
    #[serde(flatten)]
    pub(crate) geometry: Geometry,
    // Radiobutton only
    #[serde(
        rename = "_radio_group_name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) group: Option<String>,
}

impl Element {
    /// Selection variable shared by every radiobutton in this element's group.
    pub(crate) fn group_var(&self) -> String {
        let group = self.group.as_deref().unwrap_or(&self.name);
        format!("{group}_var")
    }
}

pub(crate) fn snap_to_grid(v: i32) -> i32 {
    // Round half away from zero, like the canvas does for positive coordinates.
    let g = i64::from(GRID_SIZE);
    let v = i64::from(v);
    let half = g / 2;
    let snapped = if v >= 0 {
        (v + half) / g * g
    } else {
        -((-v + half) / g * g)
    };
    // The outermost grid lines that still fit in an i32
    let lo = i64::from(i32::MIN) / g * g;
    let hi = i64::from(i32::MAX) / g * g;
    snapped.clamp(lo, hi) as i32
}

/// Quote `s` as a Python string literal.
pub(crate) fn py_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_to_grid() {
        assert_eq!(snap_to_grid(5), 10);
        assert_eq!(snap_to_grid(4), 0);
        assert_eq!(snap_to_grid(15), 20);
        assert_eq!(snap_to_grid(120), 120);
        assert_eq!(snap_to_grid(-4), 0);
        assert_eq!(snap_to_grid(-6), -10);
        assert_eq!(snap_to_grid(i32::MAX), 2_147_483_640);
        assert_eq!(snap_to_grid(i32::MIN), -2_147_483_640);
    }

    #[test]
    fn test_geometry_saturates_at_range_ends() {
        let g = Geometry::new(i32::MAX, i32::MIN, i32::MAX, 30);
        assert_eq!(g.moved(50, -50), Geometry::new(2_147_483_640, -2_147_483_640, i32::MAX, 30));
        let r = g.resized(ResizeHandle::Right, 100, 0);
        assert_eq!(r.w, 2_147_483_640);
        let r = Geometry::new(0, 0, i32::MIN, 30).resized(ResizeHandle::Left, 10, 0);
        assert_eq!((r.x, r.w), (-2_147_483_640, MIN_SIZE));
    }

    #[test]
    fn test_py_str() {
        // Test basic strings
        assert_eq!(py_str("hello"), "\"hello\"");

        // Test backslash and quote escaping
        assert_eq!(py_str("c:\\path"), "\"c:\\\\path\"");
        assert_eq!(py_str("say \"hi\""), "\"say \\\"hi\\\"\"");

        // Control characters stay on one source line
        assert_eq!(py_str("a\nb\tc"), "\"a\\nb\\tc\"");
        assert_eq!(py_str("\u{1}"), "\"\\x01\"");

        // Non-ASCII passes through (generated files are UTF-8)
        assert_eq!(py_str("café"), "\"café\"");
    }

    #[test]
    fn test_element_kind_roundtrips_type_name() {
        for kind in ElementKind::PALETTE {
            let s: String = kind.clone().into();
            assert_eq!(ElementKind::from(s), kind);
        }
        assert_eq!(
            ElementKind::from("Scale".to_owned()),
            ElementKind::Unsupported("Scale".into())
        );
    }

    #[test]
    fn test_element_kind_defaults() {
        assert_eq!(ElementKind::Button.default_text(), "Button");
        assert_eq!(ElementKind::Entry.default_text(), "");
        assert_eq!(ElementKind::Combobox.default_text(), "");
        assert_eq!(ElementKind::TextArea.default_size(), (200, 100));
        assert_eq!(ElementKind::Listbox.default_size(), (120, 80));
        assert_eq!(ElementKind::Label.default_size(), (100, 30));
        assert_eq!(ElementKind::Checkbutton.name_base(), "checkbutton");
        assert_eq!(
            ElementKind::Unsupported("Spin Box".into()).name_base(),
            "spinbox"
        );
    }

    #[test]
    fn test_geometry_moved_snaps() {
        let g = Geometry::new(50, 50, 100, 30);
        assert_eq!(g.moved(13, -7), Geometry::new(60, 40, 100, 30));
    }

    #[test]
    fn test_geometry_resized_respects_minimum() {
        let g = Geometry::new(50, 50, 100, 30);

        assert_eq!(
            g.resized(ResizeHandle::BottomRight, 24, 16),
            Geometry::new(50, 50, 120, 50)
        );
        assert_eq!(
            g.resized(ResizeHandle::Right, -500, 0),
            Geometry::new(50, 50, 20, 30)
        );
        // Left edge pinned: the right edge stays at x + w
        assert_eq!(
            g.resized(ResizeHandle::Left, 500, 0),
            Geometry::new(130, 50, 20, 30)
        );
        assert_eq!(
            g.resized(ResizeHandle::Top, 0, -20),
            Geometry::new(50, 30, 100, 50)
        );
        assert_eq!(
            g.resized(ResizeHandle::TopRight, 10, 5),
            Geometry::new(50, 60, 110, 30)
        );
    }

    #[test]
    fn test_resize_handle_hit() {
        assert_eq!(ResizeHandle::hit(50, 15, 100, 30), None);
        assert_eq!(ResizeHandle::hit(97, 15, 100, 30), Some(ResizeHandle::Right));
        assert_eq!(ResizeHandle::hit(50, 28, 100, 30), Some(ResizeHandle::Bottom));
        assert_eq!(
            ResizeHandle::hit(98, 29, 100, 30),
            Some(ResizeHandle::BottomRight)
        );
        assert_eq!(ResizeHandle::hit(2, 15, 100, 30), Some(ResizeHandle::Left));
        assert_eq!(ResizeHandle::hit(50, 1, 100, 30), Some(ResizeHandle::Top));
        assert_eq!(ResizeHandle::hit(99, 1, 100, 30), Some(ResizeHandle::TopRight));
    }

    #[test]
    fn test_group_var_falls_back_to_name() {
        let mut e = Element {
            name: "radiobutton1".into(),
            kind: ElementKind::Radiobutton,
            text: "Red".into(),
            geometry: Geometry::new(0, 0, 100, 30),
            group: None,
        };
        assert_eq!(e.group_var(), "radiobutton1_var");
        e.group = Some("colors".into());
        assert_eq!(e.group_var(), "colors_var");
    }

    #[test]
    fn test_element_serde_shape() {
        let e = Element {
            name: "radiobutton1".into(),
            kind: ElementKind::Radiobutton,
            text: "Red".into(),
            geometry: Geometry::new(10, 20, 100, 30),
            group: Some("colors".into()),
        };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "Radiobutton");
        assert_eq!(v["x"], 10);
        assert_eq!(v["h"], 30);
        assert_eq!(v["_radio_group_name"], "colors");

        let back: Element = serde_json::from_value(v).unwrap();
        assert_eq!(back, e);
    }
}
