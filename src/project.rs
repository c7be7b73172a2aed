//! The persisted project file.

use std::collections::BTreeMap;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{EditError, ProjectError};
use crate::model::{
    Canvas, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_TITLE, DEFAULT_CANVAS_WIDTH, binding_clash,
};
use crate::widget::{Element, ElementKind, naming::validate_identifier};

/// Everything needed to rebuild an editing session.
///
/// The live source text is not stored: custom code and handler bodies are
/// extracted from it at save time and fed back into generation at load time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Project {
    #[serde(default)]
    pub(crate) elements: IndexMap<String, Element>,
    #[serde(default)]
    pub(crate) custom_code: String,
    #[serde(default)]
    pub(crate) preserved_handlers: BTreeMap<String, String>,
    #[serde(default = "default_width")]
    pub(crate) canvas_width: u32,
    #[serde(default = "default_height")]
    pub(crate) canvas_height: u32,
    #[serde(default = "default_title")]
    pub(crate) canvas_title: String,
}

fn default_width() -> u32 {
    DEFAULT_CANVAS_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_CANVAS_HEIGHT
}

fn default_title() -> String {
    DEFAULT_CANVAS_TITLE.to_owned()
}

impl Default for Project {
    fn default() -> Self {
        Self {
            elements: IndexMap::new(),
            custom_code: String::new(),
            preserved_handlers: BTreeMap::new(),
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            canvas_title: DEFAULT_CANVAS_TITLE.to_owned(),
        }
    }
}

impl Project {
    pub(crate) fn canvas(&self) -> Canvas {
        Canvas {
            width: self.canvas_width,
            height: self.canvas_height,
            title: self.canvas_title.clone(),
        }
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, ProjectError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self, ProjectError> {
        let mut project: Project = serde_json::from_slice(bytes)?;
        project.normalize()?;
        Ok(project)
    }

    /// The map key is the element's identity; the copy inside the record follows it.
    fn normalize(&mut self) -> Result<(), ProjectError> {
        for field in [("width", self.canvas_width), ("height", self.canvas_height)] {
            if field.1 == 0 || field.1 > i32::MAX as u32 {
                return Err(ProjectError::InvalidCanvas(EditError::InvalidCanvasSize {
                    field: field.0,
                    value: field.1.to_string(),
                }));
            }
        }
        for (name, element) in self.elements.iter_mut() {
            let invalid = |reason| ProjectError::InvalidElement {
                name: name.clone(),
                reason,
            };
            validate_identifier(name).map_err(invalid)?;
            element.name = name.clone();
            match element.kind {
                ElementKind::Radiobutton => {
                    if let Some(group) = &element.group {
                        validate_identifier(group).map_err(|e| {
                            invalid(EditError::InvalidGroup {
                                group: group.clone(),
                                reason: e.to_string(),
                            })
                        })?;
                    }
                }
                _ => element.group = None,
            }
        }
        if let Some(ident) = binding_clash(self.elements.values()) {
            return Err(ProjectError::InvalidElement {
                name: ident.clone(),
                reason: EditError::BindingClash(ident),
            });
        }
        Ok(())
    }

    pub(crate) fn save_to(&self, path: &Path) -> Result<(), ProjectError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|source| ProjectError::Io {
            path: path.to_owned(),
            source,
        })
    }

    pub(crate) fn load_from(path: &Path) -> Result<Self, ProjectError> {
        let bytes = std::fs::read(path).map_err(|source| ProjectError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
pub(crate) fn temp_path(prefix: &str) -> std::path::PathBuf {
    let now_ns = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "tk_rad_builder_{prefix}_{}_{}",
        std::process::id(),
        now_ns
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::Geometry;

    fn sample() -> Project {
        let mut project = Project::default();
        for (name, kind, group) in [
            ("submit", ElementKind::Button, None),
            ("label1", ElementKind::Label, None),
            ("radiobutton1", ElementKind::Radiobutton, Some("colors")),
        ] {
            project.elements.insert(
                name.into(),
                Element {
                    name: name.into(),
                    text: kind.default_text(),
                    kind,
                    geometry: Geometry::new(50, 60, 100, 30),
                    group: group.map(Into::into),
                },
            );
        }
        project.custom_code = "import os".into();
        project
            .preserved_handlers
            .insert("on_submit_click".into(), "    print(\"hi\")".into());
        project.canvas_title = "Demo".into();
        project
    }

    #[test]
    fn test_bytes_round_trip() {
        let project = sample();
        let back = Project::from_bytes(&project.to_bytes().unwrap()).unwrap();
        assert_eq!(back, project);
        // Model order survives
        let order: Vec<_> = back.elements.keys().cloned().collect();
        assert_eq!(order, ["submit", "label1", "radiobutton1"]);
    }

    #[test]
    fn test_reads_legacy_layout() {
        let json = r#"{
            "elements": {
                "button1": {"type": "Button", "name": "button1", "text": "Go",
                            "x": 50, "y": 50, "w": 100, "h": 30},
                "radiobutton1": {"type": "Radiobutton", "name": "radiobutton1", "text": "A",
                                 "x": 70, "y": 70, "w": 100, "h": 30,
                                 "_radio_group_name": "grp"},
                "scale1": {"type": "Scale", "name": "scale1", "text": "",
                           "x": 0, "y": 0, "w": 10, "h": 10}
            },
            "custom_code": "",
            "preserved_handlers": {"on_button1_click": "    pass"}
        }"#;
        let project = Project::from_bytes(json.as_bytes()).unwrap();
        assert_eq!(project.canvas(), Canvas::default());
        assert_eq!(project.elements["button1"].text, "Go");
        assert_eq!(project.elements["radiobutton1"].group.as_deref(), Some("grp"));
        assert_eq!(
            project.elements["scale1"].kind,
            ElementKind::Unsupported("Scale".into())
        );
    }

    #[test]
    fn test_key_wins_over_inner_name() {
        let json = r#"{"elements": {"ok": {"type": "Label", "name": "stale",
                        "text": "", "x": 0, "y": 0, "w": 10, "h": 10}}}"#;
        let project = Project::from_bytes(json.as_bytes()).unwrap();
        assert_eq!(project.elements["ok"].name, "ok");
    }

    #[test]
    fn test_rejects_invalid_content() {
        let bad_name = r#"{"elements": {"not valid": {"type": "Label", "name": "x",
                        "text": "", "x": 0, "y": 0, "w": 10, "h": 10}}}"#;
        assert!(matches!(
            Project::from_bytes(bad_name.as_bytes()),
            Err(ProjectError::InvalidElement { .. })
        ));

        let zero_canvas = r#"{"canvas_width": 0}"#;
        assert!(matches!(
            Project::from_bytes(zero_canvas.as_bytes()),
            Err(ProjectError::InvalidCanvas(_))
        ));

        // The checkbutton's variable would also be the radio group's variable
        let shared_var = r#"{"elements": {
            "opt": {"type": "Checkbutton", "name": "opt", "text": "",
                    "x": 0, "y": 0, "w": 10, "h": 10},
            "r": {"type": "Radiobutton", "name": "r", "text": "",
                  "x": 0, "y": 0, "w": 10, "h": 10, "_radio_group_name": "opt"}}}"#;
        assert!(matches!(
            Project::from_bytes(shared_var.as_bytes()),
            Err(ProjectError::InvalidElement {
                reason: EditError::BindingClash(_),
                ..
            })
        ));

        assert!(matches!(
            Project::from_bytes(b"not json"),
            Err(ProjectError::Json(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let path = temp_path("project").with_extension("json");
        let project = sample();
        project.save_to(&path).unwrap();
        let back = Project::load_from(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(back, project);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let path = temp_path("missing");
        assert!(matches!(
            Project::load_from(&path),
            Err(ProjectError::Io { .. })
        ));
    }
}
