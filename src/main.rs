//! A visual builder for Tkinter user interfaces, written in Rust.

mod app;
mod codegen;
mod config;
mod editor;
mod error;
mod highlight;
mod model;
mod project;
mod runner;
mod widget;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::RadBuilderApp;
use crate::config::Cli;
use crate::editor::Editor;

fn initial_inner_size() -> egui::Vec2 {
    let canvas = model::Canvas::default();

    // Base: canvas plus the margin drawn past its boundary
    let mut w = canvas.width as f32 + 40.0;
    let mut h = canvas.height as f32 + 40.0;

    // Right panel (default width = 420)
    w += 420.0;

    // Left palette is open by default
    w += 170.0;

    // Small padding for menubar + side padding
    h += 40.0;
    w += 16.0;

    egui::vec2(w, h)
}

/// Write the program for `project` to `out` without opening a window.
fn export(project: &Path, out: &Path) -> Result<()> {
    let mut editor = Editor::new();
    editor
        .load_from(project)
        .with_context(|| format!("failed to open {}", project.display()))?;
    editor
        .export_to(out)
        .with_context(|| format!("failed to write {}", out.display()))?;
    info!(project = %project.display(), out = %out.display(), "exported");
    Ok(())
}

fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    cli.settings.validate().context("invalid configuration")?;

    if let (Some(project), Some(out)) = (&cli.project, &cli.export) {
        return export(project, out);
    }

    let mut native_options = eframe::NativeOptions::default();
    let size = initial_inner_size();
    native_options.viewport = egui::ViewportBuilder::default()
        .with_inner_size(size)
        .with_min_inner_size([640.0, 400.0])
        .with_resizable(true);

    let settings = cli.settings;
    let project = cli.project;
    eframe::run_native(
        "Tkinter RAD Builder",
        native_options,
        Box::new(move |_cc| Ok(Box::new(RadBuilderApp::new(&settings, project)))),
    )
    .map_err(|error| anyhow::anyhow!("failed to run the editor window: {error}"))
}

fn init_tracing() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tk_rad_builder=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))
}
