//! Side panels and popups around the canvas: code view, node info, search,
//! the add-node dialog, the text annotation editor and the color picker.

use callgrid_canvas::{AnnotationTool, Canvas};
use callgrid_events::NewNode;
use callgrid_graph::{Node, Vec2};
use eframe::egui;

use crate::input_map::{color32, from_color32};

/// What the right-hand panel is showing.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Inspector {
    #[default]
    Hidden,
    Code(String),
    Info(String),
}

impl Inspector {
    pub fn node(&self) -> Option<&str> {
        match self {
            Inspector::Hidden => None,
            Inspector::Code(name) | Inspector::Info(name) => Some(name),
        }
    }
}

pub fn inspector_panel(ctx: &egui::Context, inspector: &mut Inspector, canvas: &Canvas) {
    let Some(name) = inspector.node().map(str::to_string) else {
        return;
    };
    let Some(node) = canvas.model().node(&name) else {
        *inspector = Inspector::Hidden;
        return;
    };

    let mut open = true;
    egui::SidePanel::right("inspector")
        .resizable(true)
        .default_width(380.0)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(&node.name);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("✕").clicked() {
                        open = false;
                    }
                });
            });
            ui.separator();
            match inspector {
                Inspector::Code(_) => code_view(ui, node),
                Inspector::Info(_) => info_view(ui, node),
                Inspector::Hidden => {}
            }
        });
    if !open {
        *inspector = Inspector::Hidden;
    }
}

fn code_view(ui: &mut egui::Ui, node: &Node) {
    let Some(decl) = &node.declaration else {
        ui.label("No source for this node.");
        return;
    };
    ui.label(format!("Lines {}–{}", decl.start_line, decl.end_line));
    egui::ScrollArea::both().show(ui, |ui| {
        ui.add(
            egui::Label::new(egui::RichText::new(&decl.source).monospace())
                .selectable(true)
                .wrap_mode(egui::TextWrapMode::Extend),
        );
    });
}

fn info_view(ui: &mut egui::Ui, node: &Node) {
    egui::Grid::new("node_info")
        .num_columns(2)
        .spacing([12.0, 4.0])
        .show(ui, |ui| {
            ui.label("Kind");
            ui.label(format!("{:?}", node.kind));
            ui.end_row();
            if let Some(decl) = &node.declaration {
                ui.label("Declaration");
                ui.label(format!("{:?}", decl.kind));
                ui.end_row();
                ui.label("Qualified name");
                ui.label(&decl.qualified_name);
                ui.end_row();
                ui.label("Lines");
                ui.label(format!(
                    "{}–{} ({})",
                    decl.start_line,
                    decl.end_line,
                    decl.line_count()
                ));
                ui.end_row();
                ui.label("Parameters");
                ui.label(decl.params.join(", "));
                ui.end_row();
                if let Some(ret) = &decl.return_type {
                    ui.label("Returns");
                    ui.label(ret);
                    ui.end_row();
                }
                ui.label("Complexity");
                ui.label(decl.complexity.to_string());
                ui.end_row();
            }
            if let Some(file) = &node.file {
                ui.label("File");
                ui.label(file);
                ui.end_row();
            }
            ui.label("Calls");
            ui.label(node.calls.join(", "));
            ui.end_row();
            ui.label("Called by");
            ui.label(node.called_by.join(", "));
            ui.end_row();
        });
    if let Some(doc) = node.declaration.as_ref().map(|d| d.doc.trim()).filter(|d| !d.is_empty()) {
        ui.separator();
        ui.label(doc);
    }
    if let Some(error) = &node.error {
        ui.separator();
        ui.colored_label(
            color32(callgrid_graph::style::COLOR_ERROR),
            format!("line {}: {}", error.line, error.message),
        );
    }
}

#[derive(Debug, Default)]
pub struct SearchBar {
    pub open: bool,
    pub query: String,
    focus: bool,
    pub not_found: bool,
}

impl SearchBar {
    pub fn show_bar(&mut self) {
        self.open = true;
        self.focus = true;
        self.not_found = false;
    }

    /// Returns the query when the user submitted it.
    pub fn show(&mut self, ctx: &egui::Context) -> Option<String> {
        if !self.open {
            return None;
        }
        let mut submitted = None;
        egui::TopBottomPanel::top("search").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Find node:");
                let response = ui.text_edit_singleline(&mut self.query);
                if std::mem::take(&mut self.focus) {
                    response.request_focus();
                }
                if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    submitted = Some(self.query.clone());
                }
                if ui.button("Go").clicked() {
                    submitted = Some(self.query.clone());
                }
                if self.not_found {
                    ui.colored_label(egui::Color32::LIGHT_RED, "No match");
                }
                if ui.button("✕").clicked() || ui.input(|i| i.key_pressed(egui::Key::Escape)) {
                    self.open = false;
                }
            });
        });
        submitted.filter(|q| !q.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NewNodeKind {
    #[default]
    Declaration,
    Text,
    Image,
    Video,
}

/// The dialog shown after a connection drag ends on empty canvas, or after
/// the add tool is clicked.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewNodeDialog {
    pub source: Option<String>,
    /// World position for the new node.
    pub at: Vec2,
    pub kind: NewNodeKind,
    pub value: String,
}

impl NewNodeDialog {
    pub fn new(source: Option<String>, at: Vec2) -> Self {
        Self {
            source,
            at,
            ..Self::default()
        }
    }

    /// The node to create, if the form is complete.
    pub fn to_new_node(&self) -> Option<NewNode> {
        let value = self.value.trim();
        if value.is_empty() {
            return None;
        }
        let value = value.to_string();
        Some(match self.kind {
            NewNodeKind::Declaration => {
                if !value.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return None;
                }
                NewNode::Declaration { name: value }
            }
            NewNodeKind::Text => NewNode::Text { text: value },
            NewNodeKind::Image => NewNode::Image { path: value },
            NewNodeKind::Video => NewNode::Video { path: value },
        })
    }
}

pub enum DialogOutcome {
    Pending,
    Cancelled,
    Create(NewNode),
}

pub fn new_node_dialog(ctx: &egui::Context, dialog: &mut NewNodeDialog) -> DialogOutcome {
    let mut outcome = DialogOutcome::Pending;
    egui::Window::new("Add node")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            if let Some(source) = &dialog.source {
                ui.label(format!("Called from `{source}`"));
            }
            ui.horizontal(|ui| {
                ui.selectable_value(&mut dialog.kind, NewNodeKind::Declaration, "Function");
                ui.selectable_value(&mut dialog.kind, NewNodeKind::Text, "Text");
                ui.selectable_value(&mut dialog.kind, NewNodeKind::Image, "Image");
                ui.selectable_value(&mut dialog.kind, NewNodeKind::Video, "Video");
            });
            ui.horizontal(|ui| {
                let hint = match dialog.kind {
                    NewNodeKind::Declaration => "function name",
                    NewNodeKind::Text => "text",
                    NewNodeKind::Image | NewNodeKind::Video => "file path",
                };
                ui.add(egui::TextEdit::singleline(&mut dialog.value).hint_text(hint));
                if matches!(dialog.kind, NewNodeKind::Image | NewNodeKind::Video)
                    && ui.button("Browse…").clicked()
                    && let Some(path) = pick_media(dialog.kind)
                {
                    dialog.value = path.to_string_lossy().into_owned();
                }
            });
            ui.horizontal(|ui| {
                let new_node = dialog.to_new_node();
                if ui
                    .add_enabled(new_node.is_some(), egui::Button::new("Add"))
                    .clicked()
                    && let Some(new_node) = new_node
                {
                    outcome = DialogOutcome::Create(new_node);
                }
                if ui.button("Cancel").clicked() {
                    outcome = DialogOutcome::Cancelled;
                }
            });
        });
    outcome
}

fn pick_media(kind: NewNodeKind) -> Option<std::path::PathBuf> {
    let dialog = rfd::FileDialog::new();
    let dialog = match kind {
        NewNodeKind::Image => dialog.add_filter("Images", &["png", "jpg", "jpeg", "gif", "webp"]),
        _ => dialog.add_filter("Videos", &["mp4", "webm", "mov", "mkv"]),
    };
    dialog.pick_file()
}

/// Inline editor for a text annotation at the pending position. Returns the
/// text once the user commits it; an empty string cancels.
pub fn text_popup(
    ctx: &egui::Context,
    canvas: &mut Canvas,
    draft: &mut String,
    anchor: egui::Pos2,
) -> Option<String> {
    if canvas.interaction().pending_text().is_none() {
        return None;
    }
    let mut committed = None;
    egui::Area::new(egui::Id::new("text_annotation"))
        .fixed_pos(anchor)
        .show(ctx, |ui| {
            let response = ui.add(
                egui::TextEdit::singleline(draft)
                    .hint_text("Label")
                    .desired_width(180.0),
            );
            response.request_focus();
            if ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                committed = Some(std::mem::take(draft));
            } else if ui.input(|i| i.key_pressed(egui::Key::Escape)) {
                draft.clear();
                committed = Some(String::new());
            }
        });
    canvas.interaction_mut().text_editing = committed.is_none();
    committed
}

/// Small tool palette with the annotation color.
pub fn tool_palette(ctx: &egui::Context, canvas: &mut Canvas, color_open: &mut bool) {
    if canvas.interaction_mut().take_color_picker_request() {
        *color_open = true;
    }
    egui::Area::new(egui::Id::new("tool_palette"))
        .anchor(egui::Align2::LEFT_TOP, [12.0, 40.0])
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                let interaction = canvas.interaction_mut();
                for tool in [
                    AnnotationTool::Cursor,
                    AnnotationTool::Brush,
                    AnnotationTool::Text,
                    AnnotationTool::Erase,
                ] {
                    if ui
                        .selectable_label(interaction.tool == tool, tool.label())
                        .clicked()
                    {
                        interaction.set_tool(tool);
                    }
                }
                let mut color = color32(interaction.annotation_color);
                if ui.color_edit_button_srgba(&mut color).changed() {
                    interaction.annotation_color = from_color32(color);
                }
                if *color_open {
                    egui::color_picker::color_picker_color32(
                        ui,
                        &mut color,
                        egui::color_picker::Alpha::Opaque,
                    );
                    interaction.annotation_color = from_color32(color);
                    if ui.button("Done").clicked() {
                        *color_open = false;
                        interaction.set_tool(AnnotationTool::Cursor);
                    }
                }
            });
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_form_validation() {
        let mut dialog = NewNodeDialog::new(Some("main".into()), Vec2::new(10.0, 20.0));
        assert_eq!(dialog.to_new_node(), None);

        dialog.value = "  parse_args ".into();
        assert_eq!(
            dialog.to_new_node(),
            Some(NewNode::Declaration {
                name: "parse_args".into()
            })
        );

        dialog.value = "not a name".into();
        assert_eq!(dialog.to_new_node(), None);

        dialog.kind = NewNodeKind::Text;
        assert_eq!(
            dialog.to_new_node(),
            Some(NewNode::Text {
                text: "not a name".into()
            })
        );

        dialog.kind = NewNodeKind::Video;
        dialog.value = "/tmp/demo.mp4".into();
        assert_eq!(
            dialog.to_new_node(),
            Some(NewNode::Video {
                path: "/tmp/demo.mp4".into()
            })
        );
    }

    #[test]
    fn test_inspector_node() {
        assert_eq!(Inspector::Hidden.node(), None);
        assert_eq!(Inspector::Code("a".into()).node(), Some("a"));
        assert_eq!(Inspector::Info("b".into()).node(), Some("b"));
    }
}
