//! Python/Tkinter source generation from the element model.
//!
//! The output is a pure function of its [`GenInput`]: the same elements, canvas,
//! custom code and preserved handler bodies always produce byte-identical text.

pub(crate) mod scan;

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;

use crate::model::Canvas;
use crate::widget::{Element, ElementKind, py_str};
use scan::HandlerRole;

pub(crate) const START_MARKER: &str =
    "# !!!!!!!!!!!! INSERT YOUR CODE BELOW THIS COMMENT !!!!!!!!!!!! #";
pub(crate) const END_MARKER: &str =
    "# !!!!!!!!!!!! INSERT YOUR CODE ABOVE THIS COMMENT !!!!!!!!!!!! #";

const RULE: &str = "##############################################################################";

/// Everything a generation pass reads.
pub(crate) struct GenInput<'a> {
    pub(crate) elements: &'a IndexMap<String, Element>,
    pub(crate) canvas: &'a Canvas,
    pub(crate) custom_code: &'a str,
    pub(crate) handlers: &'a BTreeMap<String, String>,
}

pub(crate) fn generate(input: &GenInput<'_>) -> String {
    let mut out = String::new();

    out.push_str("import tkinter as tk\n");
    out.push_str("from tkinter import ttk, messagebox, simpledialog\n\n");

    emit_custom_region(&mut out, input.custom_code);
    emit_functions_region(&mut out, input);
    emit_ui_region(&mut out, input);

    out
}

fn emit_custom_region(out: &mut String, custom_code: &str) {
    out.push_str(START_MARKER);
    out.push_str("\n\n");
    let custom = custom_code.trim_end_matches(['\n', '\r']);
    if !custom.trim().is_empty() {
        out.push_str(custom);
        out.push('\n');
    }
    out.push('\n');
    out.push_str(END_MARKER);
    out.push_str("\n\n\n");
}

fn section(out: &mut String, title: &str, notes: &[&str]) {
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!("# {title}\n"));
    out.push_str(RULE);
    out.push('\n');
    for note in notes {
        out.push_str(&format!("# {note}\n"));
    }
    out.push('\n');
}

fn emit_functions_region(out: &mut String, input: &GenInput<'_>) {
    section(
        out,
        "GENERATED FUNCTIONS",
        &[
            "One function is generated per button, combobox, listbox and treeview.",
            "Do not rename these functions: changing an element's ID renames them for you.",
            "Edit freely inside a function body; code outside a function body is regenerated.",
        ],
    );

    let subsections = [
        ("BUTTON CLICK HANDLERS", ElementKind::Button, HandlerRole::Click),
        ("COMBOBOX OPTION LOADERS", ElementKind::Combobox, HandlerRole::Options),
        ("LISTBOX OPTION LOADERS", ElementKind::Listbox, HandlerRole::Options),
        ("TREEVIEW DATA LOADERS", ElementKind::Treeview, HandlerRole::Data),
    ];

    for (title, kind, role) in subsections {
        out.push_str(&format!("# --- {title} ---\n\n"));
        for element in input.elements.values().filter(|e| e.kind == kind) {
            let function = role.function_name(&element.name);
            out.push_str(&format!("def {function}():\n"));
            match input.handlers.get(&function) {
                Some(body) if !body.trim().is_empty() => out.push_str(body),
                _ => out.push_str(&default_body(element, &function)),
            }
            out.push_str("\n\n");
        }
        out.push('\n');
    }
}

fn default_body(element: &Element, function: &str) -> String {
    match element.kind {
        ElementKind::Button => format!("    # Code for {function}\n    pass"),
        ElementKind::Combobox => format!(
            "    # Return the list of options for {}\n    return ['Option 1', 'Option 2', 'Option 3']",
            element.name
        ),
        ElementKind::Listbox => format!(
            "    # Return the list of items for {}\n    return ['Item 1', 'Item 2', 'Item 3']",
            element.name
        ),
        ElementKind::Treeview => "    # Replace this sample data with your own code.\n\
             \x20   headers = (\"Name\", \"Age\", \"Job\")\n\
             \x20   sample_data = [\n\
             \x20       (\"Alice\", \"25\", \"Teacher\"),\n\
             \x20       (\"Bob\", \"30\", \"Engineer\"),\n\
             \x20       (\"Charlie\", \"35\", \"Designer\"),\n\
             \x20   ]\n\
             \x20   return headers, sample_data"
            .to_owned(),
        _ => "    pass".to_owned(),
    }
}

fn emit_ui_region(out: &mut String, input: &GenInput<'_>) {
    section(
        out,
        "GENERATED GUI",
        &["Everything below is regenerated on every change; manual edits here are lost."],
    );

    let canvas = input.canvas;
    out.push_str("root = tk.Tk()\n");
    out.push_str(&format!("root.title({})\n", py_str(&canvas.title)));
    out.push_str(&format!("root.geometry(\"{}x{}\")\n\n", canvas.width, canvas.height));

    // One variable per checkbutton, one per radiobutton group
    let mut groups_done = HashSet::new();
    for element in input.elements.values() {
        match element.kind {
            ElementKind::Checkbutton => {
                out.push_str(&format!("{}_var = tk.BooleanVar()\n", element.name));
            }
            ElementKind::Radiobutton => {
                let var = element.group_var();
                if groups_done.insert(var.clone()) {
                    out.push_str(&format!("{var} = tk.StringVar()\n"));
                }
            }
            _ => {}
        }
    }
    out.push('\n');

    for element in input.elements.values() {
        emit_element(out, element);
    }

    out.push_str("root.mainloop()\n");
}

fn emit_element(out: &mut String, e: &Element) {
    let name = &e.name;
    let text = py_str(&e.text);
    match &e.kind {
        ElementKind::Label => {
            out.push_str(&format!("{name} = ttk.Label(root, text={text})\n"));
        }
        ElementKind::Button => {
            let command = HandlerRole::Click.function_name(name);
            out.push_str(&format!(
                "{name} = ttk.Button(root, text={text}, command={command})\n"
            ));
        }
        ElementKind::Entry => {
            out.push_str(&format!("{name} = ttk.Entry(root)\n"));
            if !e.text.is_empty() {
                out.push_str(&format!("{name}.insert(0, {text})\n"));
            }
        }
        ElementKind::TextArea => {
            out.push_str(&format!("{name} = tk.Text(root, wrap='word')\n"));
            if !e.text.is_empty() {
                out.push_str(&format!("{name}.insert('1.0', {text})\n"));
            }
        }
        ElementKind::Listbox => {
            let loader = HandlerRole::Options.function_name(name);
            out.push_str(&format!("{name} = tk.Listbox(root)\n"));
            out.push_str(&format!("for item in {loader}():\n"));
            out.push_str(&format!("    {name}.insert(tk.END, item)\n"));
        }
        ElementKind::Combobox => {
            let loader = HandlerRole::Options.function_name(name);
            out.push_str(&format!("{name} = ttk.Combobox(root, values={loader}())\n"));
            if !e.text.is_empty() {
                out.push_str(&format!("{name}.set({text})\n"));
            }
        }
        ElementKind::Treeview => {
            let loader = HandlerRole::Data.function_name(name);
            out.push_str(&format!("headers, rows = {loader}()\n"));
            out.push_str(&format!(
                "{name} = ttk.Treeview(root, columns=headers, show='headings')\n"
            ));
            out.push_str("for col in headers:\n");
            out.push_str(&format!("    {name}.heading(col, text=col)\n"));
            out.push_str(&format!(
                "    {name}.column(col, width=max(len(str(col)), 10) * 10)\n"
            ));
            out.push_str("for row in rows:\n");
            out.push_str(&format!("    {name}.insert('', 'end', values=row)\n"));
        }
        ElementKind::Checkbutton => {
            out.push_str(&format!(
                "{name} = ttk.Checkbutton(root, text={text}, variable={name}_var)\n"
            ));
        }
        ElementKind::Radiobutton => {
            out.push_str(&format!(
                "{name} = ttk.Radiobutton(root, text={text}, variable={}, value={text})\n",
                e.group_var()
            ));
        }
        ElementKind::Unsupported(kind) => {
            // No widget exists, so there is nothing to place either.
            out.push_str(&format!("# Unsupported type: {kind} ({name})\n\n"));
            return;
        }
    }
    let g = e.geometry;
    out.push_str(&format!(
        "{name}.place(x={}, y={}, width={}, height={})\n\n",
        g.x, g.y, g.w, g.h
    ));
}
