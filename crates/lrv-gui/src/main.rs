use chrono::{Datelike, NaiveDate};
use eframe::{App, egui};
use lrv_core::{
    DirStore, DocumentStore, EditorInput, FieldPath, FieldRules, PathMatcher, ReviewSession,
    RowId, TreeIndex, WidgetKind, WidgetNode,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::SubscriberBuilder;

#[derive(Default)]
struct State {
    root_dir: Option<PathBuf>,
    matcher: Option<Arc<PathMatcher>>,
    docs: Vec<String>,
    selected_doc: Option<usize>,
    session: Option<ReviewSession>,
    backup_on_save: bool,
    status: String,
    // Confirmation flags
    confirm_save: bool,
    confirm_reload: bool,
    show_preview: bool,
}

impl State {
    fn store(&self) -> Option<DirStore> {
        self.root_dir
            .as_ref()
            .map(|d| DirStore::new(d).with_backup(self.backup_on_save))
    }
}

/// Row changes requested while the tree is borrowed for drawing.
enum ListAction {
    Add(FieldPath),
    Remove(FieldPath, RowId),
}

struct AppGui {
    state: State,
}

impl AppGui {
    fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        Self {
            state: State {
                backup_on_save: true,
                status: "Open a document folder to begin".into(),
                ..Default::default()
            },
        }
    }

    fn pick_root_dir(&mut self) {
        if let Some(dir) = rfd::FileDialog::new().set_directory(".").pick_folder() {
            self.state.root_dir = Some(dir);
            self.refresh_docs();
        }
    }

    fn refresh_docs(&mut self) {
        let Some(root) = self.state.root_dir.clone() else {
            return;
        };
        let matcher = FieldRules::discover(&root)
            .map_err(|e| e.to_string())
            .and_then(|r| PathMatcher::new(&r).map_err(|e| e.to_string()));
        match matcher {
            Ok(m) => self.state.matcher = Some(Arc::new(m)),
            Err(e) => {
                self.state.status = format!("Rules error: {}", e);
                self.state.matcher = None;
                return;
            }
        }
        let Some(store) = self.state.store() else {
            return;
        };
        match store.list_documents() {
            Ok(docs) => {
                self.state.status = if docs.is_empty() {
                    "No <id>.json documents found".into()
                } else {
                    format!("Found {} document(s)", docs.len())
                };
                self.state.docs = docs;
            }
            Err(e) => self.state.status = format!("List error: {}", e),
        }
        self.state.selected_doc = None;
        self.state.session = None;
    }

    /// Replaces the open session only when the new one loads cleanly.
    fn open_doc(&mut self, i: usize) {
        let (Some(store), Some(matcher), Some(id)) = (
            self.state.store(),
            self.state.matcher.clone(),
            self.state.docs.get(i).cloned(),
        ) else {
            return;
        };
        match ReviewSession::open(&store, matcher, &id) {
            Ok(session) => {
                self.state.status = format!(
                    "Loaded {} ({} fields)",
                    id,
                    session.index().editors.len()
                );
                self.state.session = Some(session);
                self.state.selected_doc = Some(i);
            }
            Err(e) => {
                tracing::error!("load of {} failed: {}", id, e);
                self.state.status = format!("Load error: {}", e);
            }
        }
    }

    fn save(&mut self) {
        let Some(store) = self.state.store() else {
            return;
        };
        let Some(session) = &mut self.state.session else {
            return;
        };
        match session.save(&store) {
            Ok(_) => {
                self.state.status = format!(
                    "Saved {} ({} flagged)",
                    session.doc_id(),
                    session.collect_flags().len()
                );
            }
            Err(e) => self.state.status = format!("Save error: {}", e),
        }
    }

    fn apply_actions(&mut self, actions: Vec<ListAction>) {
        let Some(session) = &mut self.state.session else {
            return;
        };
        for action in actions {
            let res = match &action {
                ListAction::Add(path) => session.add_item(path).map(|_| ()),
                ListAction::Remove(path, row) => session.remove_item(path, *row),
            };
            if let Err(e) = res {
                self.state.status = format!("List error: {}", e);
            }
        }
    }
}

impl App for AppGui {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Open Document Folder").clicked() {
                    self.pick_root_dir();
                }
                if ui.button("Refresh").clicked() {
                    self.refresh_docs();
                }
                ui.separator();
                ui.checkbox(&mut self.state.backup_on_save, "Zip backup on save");
                ui.label(self.state.status.as_str());
            });
        });

        egui::SidePanel::left("left").show(ctx, |ui| {
            ui.heading("Documents");
            if let Some(root) = &self.state.root_dir {
                ui.label(format!("Folder: {}", root.display()));
            }
            let mut clicked_index: Option<usize> = None;
            egui::ScrollArea::vertical()
                .id_source("docs_scroll")
                .show(ui, |ui| {
                    for (i, id) in self.state.docs.iter().enumerate() {
                        let sel = Some(i) == self.state.selected_doc;
                        if ui.selectable_label(sel, id.as_str()).clicked() {
                            clicked_index = Some(i);
                        }
                    }
                });
            if let Some(i) = clicked_index {
                self.open_doc(i);
            }
        });

        egui::TopBottomPanel::bottom("bottom_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let has_session = self.state.session.is_some();
                if ui
                    .add_enabled(has_session, egui::Button::new("Save corrections"))
                    .clicked()
                {
                    self.state.confirm_save = true;
                }
                if ui
                    .add_enabled(has_session, egui::Button::new("Discard edits"))
                    .clicked()
                {
                    self.state.confirm_reload = true;
                }
                ui.checkbox(&mut self.state.show_preview, "Preview JSON");
                if let Some(session) = &self.state.session {
                    let index = session.index();
                    let dirty = index.editors.values().filter(|e| e.is_dirty()).count();
                    let flagged = index.flags.values().filter(|f| f.checked).count();
                    ui.label(format!(
                        "{} fields, {} edited, {} flagged",
                        index.editors.len(),
                        dirty,
                        flagged
                    ));
                }
            });
            if self.state.confirm_save {
                ui.horizontal(|ui| {
                    ui.label("Confirm save?");
                    if ui.button("Confirm").clicked() {
                        self.save();
                        self.state.confirm_save = false;
                    }
                    if ui.button("Cancel").clicked() {
                        self.state.confirm_save = false;
                    }
                });
            }
            if self.state.confirm_reload {
                ui.horizontal(|ui| {
                    ui.label("Discard all unsaved edits?");
                    if ui.button("Confirm").clicked() {
                        if let Some(i) = self.state.selected_doc {
                            self.open_doc(i);
                        }
                        self.state.confirm_reload = false;
                    }
                    if ui.button("Cancel").clicked() {
                        self.state.confirm_reload = false;
                    }
                });
            }
        });

        if self.state.show_preview
            && let Some(session) = &self.state.session
        {
            let text = session
                .collect_tree()
                .map_err(|e| e.to_string())
                .and_then(|v| serde_json::to_string_pretty(&v).map_err(|e| e.to_string()))
                .unwrap_or_else(|e| format!("cannot collect: {}", e));
            egui::Window::new("Corrected JSON")
                .open(&mut self.state.show_preview)
                .default_size([500.0, 600.0])
                .show(ctx, |ui| {
                    egui::ScrollArea::both().show(ui, |ui| {
                        ui.monospace(text);
                    });
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            let mut actions = Vec::new();
            match &mut self.state.session {
                Some(session) => {
                    ui.horizontal(|ui| {
                        ui.heading(session.doc_id());
                        if let Some(pdf) = session.pdf() {
                            ui.hyperlink_to("Open PDF", format!("file://{}", pdf.display()));
                        }
                    });
                    ui.separator();
                    let (tree, index) = session.view_mut();
                    egui::ScrollArea::vertical()
                        .id_source("tree_scroll")
                        .show(ui, |ui| match tree {
                            Some(root) => render_node(ui, root, index, &mut actions),
                            None => {
                                ui.label("Every field of this document is hidden by the rules.");
                            }
                        });
                }
                None => {
                    ui.label("Select a document on the left.");
                }
            }
            if !actions.is_empty() {
                self.apply_actions(actions);
            }
        });
    }
}

fn render_node(
    ui: &mut egui::Ui,
    node: &WidgetNode,
    index: &mut TreeIndex,
    actions: &mut Vec<ListAction>,
) {
    match node {
        WidgetNode::Group { fields } => {
            for f in fields {
                ui.push_id(&f.label, |ui| match &f.node {
                    WidgetNode::Leaf { path } => {
                        ui.horizontal(|ui| {
                            ui.label(egui::RichText::new(&f.label).strong());
                            render_leaf(ui, path, index);
                        });
                    }
                    other => {
                        ui.collapsing(egui::RichText::new(&f.label).strong(), |ui| {
                            render_node(ui, other, index, actions)
                        });
                    }
                });
            }
        }
        WidgetNode::List { path, rows } => {
            for (i, row) in rows.iter().enumerate() {
                ui.push_id(row.id, |ui| {
                    ui.horizontal(|ui| {
                        let caption = row.caption.as_deref().unwrap_or("");
                        ui.label(format!("#{} {}", i + 1, caption));
                        if ui.small_button("Remove").clicked() {
                            actions.push(ListAction::Remove(path.clone(), row.id));
                        }
                    });
                    if let Some(n) = &row.node {
                        ui.indent(row.id, |ui| render_node(ui, n, index, actions));
                    }
                });
            }
            if ui.button("Add item").clicked() {
                actions.push(ListAction::Add(path.clone()));
            }
        }
        WidgetNode::Leaf { path } => {
            ui.horizontal(|ui| render_leaf(ui, path, index));
        }
    }
}

fn render_leaf(ui: &mut egui::Ui, path: &FieldPath, index: &mut TreeIndex) {
    let Some(editor) = index.editor_mut(path) else {
        ui.colored_label(egui::Color32::RED, format!("unbound: {}", path));
        return;
    };
    let kind = editor.widget.kind;
    let choices = editor.widget.choices.clone();
    match &mut editor.input {
        EditorInput::Text(t) if kind == WidgetKind::Textarea => {
            ui.text_edit_multiline(t);
        }
        EditorInput::Text(t) => {
            ui.text_edit_singleline(t);
        }
        EditorInput::Checked(b) => {
            ui.checkbox(b, "");
        }
        EditorInput::Choice(sel) => {
            egui::ComboBox::from_id_source(path.to_string())
                .selected_text(sel.clone().unwrap_or_default())
                .show_ui(ui, |ui| {
                    for c in &choices {
                        ui.selectable_value(sel, Some(c.clone()), c.as_str());
                    }
                });
        }
        EditorInput::Date(date) => render_date(ui, date),
    }
    if editor.is_dirty() {
        ui.label(egui::RichText::new("edited").italics());
    }
    if let Some(flag) = index.flag_mut(path) {
        ui.checkbox(&mut flag.checked, "flag")
            .on_hover_text(format!("Flag field: {}", path));
    }
}

fn render_date(ui: &mut egui::Ui, date: &mut Option<NaiveDate>) {
    let mut clear = false;
    match date {
        Some(d) => {
            let (mut y, mut m, mut day) = (d.year(), d.month(), d.day());
            let mut changed = false;
            changed |= ui.add(egui::DragValue::new(&mut y).speed(1)).changed();
            ui.label("-");
            changed |= ui.add(egui::DragValue::new(&mut m).speed(1)).changed();
            ui.label("-");
            changed |= ui.add(egui::DragValue::new(&mut day).speed(1)).changed();
            if changed
                && let Some(nd) = NaiveDate::from_ymd_opt(y, m.clamp(1, 12), day.clamp(1, 31))
            {
                *d = nd;
            }
            clear = ui.small_button("Clear").clicked();
        }
        None => {
            ui.label("(no date)");
            if ui.small_button("Set").clicked() {
                *date = Some(chrono::Local::now().date_naive());
            }
        }
    }
    if clear {
        *date = None;
    }
}

fn main() -> eframe::Result<()> {
    let _ = SubscriberBuilder::default()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let native_options = eframe::NativeOptions {
        viewport: egui::viewport::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([900.0, 600.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Lease Review",
        native_options,
        Box::new(|cc| Ok(Box::new(AppGui::new(cc)))),
    )
}
