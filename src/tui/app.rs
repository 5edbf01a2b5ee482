use log::{info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use tui_logger::TuiWidgetState;

use crate::config::Config;
use crate::engine::cards::{CardView, DetailLine};
use crate::engine::editor::{Draft, FieldKind};
use crate::engine::error::EditorError;
use crate::engine::imaging::{self, ImageSpec};
use crate::engine::records::RecordKind;
use crate::engine::wiki::Wiki;
use crate::remote::events::WeeklyEvent;
use crate::remote::settings::SharedSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Catalog(RecordKind),
    Events,
    Settings,
    Logs,
}

impl Tab {
    pub fn title(&self) -> &'static str {
        match self {
            Tab::Catalog(kind) => kind.label(),
            Tab::Events => "Events",
            Tab::Settings => "Settings",
            Tab::Logs => "Logs",
        }
    }
}

/// Open record form.
pub struct EditorState {
    pub kind: RecordKind,
    pub draft: Draft,
    pub field_index: usize,
    /// Text being typed into the selected field, when a field is open.
    pub input: Option<String>,
    /// Inline messages keyed by field.
    pub errors: BTreeMap<String, String>,
}

impl EditorState {
    fn new(kind: RecordKind, draft: Draft) -> Self {
        Self { kind, draft, field_index: 0, input: None, errors: BTreeMap::new() }
    }

    pub fn selected_key(&self) -> &'static str {
        self.draft.fields()[self.field_index].key
    }
}

pub enum Mode {
    Browse,
    Search,
    Edit(Box<EditorState>),
    ConfirmDelete { kind: RecordKind, id: String },
}

/// Remote work requested by a key press, run by the main loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ReloadRemote,
    DeleteEvent(String),
}

pub struct App {
    pub config: Config,
    pub wiki: Wiki,
    pub tabs: Vec<Tab>,
    pub tab_index: usize,
    pub query: String,
    pub category_index: usize,
    pub selected: usize,
    pub mode: Mode,
    pub status: String,
    /// Blocking message, dismissed with any key.
    pub alert: Option<String>,
    pub store_error: Option<String>,
    pub remote_enabled: bool,
    pub events: Vec<WeeklyEvent>,
    pub settings: Option<SharedSettings>,
    pub logger_state: TuiWidgetState,
    pub should_quit: bool,
}

impl App {
    pub fn new(config: Config, mut wiki: Wiki) -> Self {
        wiki.set_dev_mode(config.menu.dev_mode);
        let mut tabs: Vec<Tab> = RecordKind::ALL.iter().map(|&k| Tab::Catalog(k)).collect();
        tabs.extend([Tab::Events, Tab::Settings, Tab::Logs]);

        Self {
            remote_enabled: config.remote.enabled,
            config,
            wiki,
            tabs,
            tab_index: 0,
            query: String::new(),
            category_index: 0,
            selected: 0,
            mode: Mode::Browse,
            status: "Ready".to_string(),
            alert: None,
            store_error: None,
            events: Vec::new(),
            settings: None,
            logger_state: TuiWidgetState::new(),
            should_quit: false,
        }
    }

    pub fn tab(&self) -> Tab {
        self.tabs[self.tab_index]
    }

    pub fn kind(&self) -> Option<RecordKind> {
        match self.tab() {
            Tab::Catalog(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn next_tab(&mut self) {
        self.tab_index = (self.tab_index + 1) % self.tabs.len();
        self.reset_view();
    }

    pub fn previous_tab(&mut self) {
        if self.tab_index > 0 {
            self.tab_index -= 1;
        } else {
            self.tab_index = self.tabs.len() - 1;
        }
        self.reset_view();
    }

    fn reset_view(&mut self) {
        self.category_index = 0;
        self.selected = 0;
        self.query.clear();
    }

    pub fn category_label(&self) -> String {
        self.kind()
            .and_then(|kind| self.wiki.category_labels(kind).get(self.category_index).cloned())
            .unwrap_or_else(|| "ALL".to_string())
    }

    pub fn cycle_category(&mut self) {
        if let Some(kind) = self.kind() {
            let count = self.wiki.category_labels(kind).len().max(1);
            self.category_index = (self.category_index + 1) % count;
            self.selected = 0;
        }
    }

    pub fn cards(&self) -> Vec<CardView> {
        match self.kind() {
            Some(kind) => self.wiki.view(kind, &self.category_label(), &self.query),
            None => Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        match self.tab() {
            Tab::Catalog(_) => self.cards().len(),
            Tab::Events => self.events.len(),
            _ => 0,
        }
    }

    pub fn select_next(&mut self) {
        let count = self.row_count();
        if count > 0 {
            self.selected = (self.selected + 1).min(count - 1);
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn selected_id(&self) -> Option<String> {
        match self.tab() {
            Tab::Catalog(_) => self.cards().get(self.selected).map(|c| c.id.clone()),
            Tab::Events => self.events.get(self.selected).map(|e| e.id.clone()),
            _ => None,
        }
    }

    pub fn selected_detail(&self) -> Vec<DetailLine> {
        match (self.kind(), self.selected_id()) {
            (Some(kind), Some(id)) => self.wiki.detail(kind, &id).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub fn push_query(&mut self, c: char) {
        self.query.push(c);
        self.selected = 0;
    }

    pub fn pop_query(&mut self) {
        self.query.pop();
        self.selected = 0;
    }

    pub fn toggle_dev_mode(&mut self) {
        let enabled = !self.wiki.dev_mode();
        self.wiki.set_dev_mode(enabled);
        self.status = format!("Dev mode {}", if enabled { "ON" } else { "OFF" });
    }

    fn require_dev_mode(&mut self) -> bool {
        if !self.wiki.dev_mode() {
            self.status = "Dev mode is off (press d)".to_string();
        }
        self.wiki.dev_mode()
    }

    pub fn open_new(&mut self) {
        let Some(kind) = self.kind() else { return };
        if !self.require_dev_mode() {
            return;
        }
        match self.wiki.new_draft(kind) {
            Ok(draft) => self.mode = Mode::Edit(Box::new(EditorState::new(kind, draft))),
            Err(e) => self.status = e.to_string(),
        }
    }

    pub fn open_edit(&mut self) {
        let (Some(kind), Some(id)) = (self.kind(), self.selected_id()) else { return };
        if !self.require_dev_mode() {
            return;
        }
        match self.wiki.edit_draft(kind, &id) {
            Ok(Some(draft)) => self.mode = Mode::Edit(Box::new(EditorState::new(kind, draft))),
            Ok(None) => self.status = format!("{} not found", id),
            Err(e) => self.status = e.to_string(),
        }
    }

    pub fn ask_delete(&mut self) {
        if !self.require_dev_mode() {
            return;
        }
        if let (Some(kind), Some(id)) = (self.kind(), self.selected_id()) {
            self.mode = Mode::ConfirmDelete { kind, id };
        }
    }

    pub fn confirm_delete(&mut self) {
        let Mode::ConfirmDelete { kind, id } = std::mem::replace(&mut self.mode, Mode::Browse) else { return };
        match self.wiki.delete_record(kind, &id) {
            Ok(removed) => {
                self.status = format!("Deleted {} ({} removed)", id, removed);
                let count = self.row_count();
                self.selected = self.selected.min(count.saturating_sub(1));
            }
            Err(e) => self.status = e.to_string(),
        }
    }

    pub fn cancel(&mut self) {
        self.mode = Mode::Browse;
    }

    // --- Editor ---

    pub fn editor(&mut self) -> Option<&mut EditorState> {
        match &mut self.mode {
            Mode::Edit(editor) => Some(editor),
            _ => None,
        }
    }

    pub fn editor_move(&mut self, down: bool) {
        if let Some(editor) = self.editor() {
            let count = editor.draft.fields().len();
            editor.field_index = if down {
                (editor.field_index + 1).min(count - 1)
            } else {
                editor.field_index.saturating_sub(1)
            };
        }
    }

    /// Opens the selected field for typing, prefilled with its current text.
    pub fn editor_open_field(&mut self) {
        if let Some(editor) = self.editor() {
            let text = editor.draft.field_text(editor.selected_key());
            editor.input = Some(text);
        }
    }

    /// Parses the typed text into the draft. Image fields take a file path
    /// and store the processed image.
    pub fn editor_commit_field(&mut self) {
        let images = self.config.images.clone();
        let Some(editor) = self.editor() else { return };
        let Some(input) = editor.input.take() else { return };
        let spec = editor.draft.fields()[editor.field_index];
        if input == editor.draft.field_text(spec.key) {
            return;
        }

        let result = match spec.kind {
            FieldKind::Image(role) if is_local_path(&input) => {
                match imaging::process_file(input.trim(), &ImageSpec::for_role(role, &images)) {
                    Ok(processed) => {
                        info!("Attached {}x{} image to {}", processed.width, processed.height, spec.key);
                        editor.draft.set_raw(spec.key, Value::String(processed.data_uri));
                        Ok(())
                    }
                    Err(e) => Err(format!("{:#}", e)),
                }
            }
            _ => editor.draft.set_field(spec.key, &input).map_err(|e| e.to_string()),
        };

        match result {
            Ok(()) => {
                editor.errors.remove(spec.key);
            }
            Err(message) => {
                editor.errors.insert(spec.key.to_string(), message);
            }
        }
    }

    pub fn editor_cancel_field(&mut self) {
        if let Some(editor) = self.editor() {
            editor.input = None;
        }
    }

    pub fn editor_save(&mut self) {
        let Mode::Edit(editor) = std::mem::replace(&mut self.mode, Mode::Browse) else { return };
        let mut editor = *editor;
        let kind = editor.kind;
        let id = editor.draft.id().to_string();

        match self.wiki.save_draft(kind, editor.draft.clone()) {
            Ok(outcome) => self.status = format!("{:?} {}", outcome, id),
            Err(EditorError::Invalid(errors)) => {
                warn!("{}: {} validation error(s)", kind, errors.len());
                editor.errors = errors.iter().map(|e| (e.field_key().to_string(), e.to_string())).collect();
                self.status = "Fix the highlighted fields".to_string();
                self.mode = Mode::Edit(Box::new(editor));
            }
            Err(e) => {
                self.status = e.to_string();
                self.mode = Mode::Edit(Box::new(editor));
            }
        }
    }

    pub fn on_tick(&mut self, store_error: Option<String>) {
        if store_error != self.store_error {
            if let Some(e) = &store_error {
                self.status = format!("Not saved: {}", e);
            }
            self.store_error = store_error;
        }
    }

    pub fn show_alert(&mut self, message: impl Into<String>) {
        self.alert = Some(message.into());
    }
}

/// Anything that is not already an embedded image or a web URL is read as a
/// file path.
fn is_local_path(input: &str) -> bool {
    let input = input.trim();
    !(input.is_empty() || input.starts_with("data:") || input.starts_with("http://") || input.starts_with("https://"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        App::new(Config::default(), Wiki::seeded())
    }

    fn type_into(app: &mut App, key: &str, text: &str) {
        let editor = app.editor().unwrap();
        editor.field_index = editor.draft.fields().iter().position(|f| f.key == key).unwrap();
        editor.input = Some(text.to_string());
        app.editor_commit_field();
    }

    #[test]
    fn search_and_category_narrow_the_list() {
        let mut app = app();
        assert_eq!(app.cards().len(), 6);

        app.cycle_category();
        assert_eq!(app.category_label(), "COMMON");
        assert_eq!(app.cards().len(), 2);

        app.cycle_category();
        app.push_query('M');
        let titles: Vec<_> = app.cards().into_iter().map(|c| c.title).collect();
        assert_eq!(titles, vec!["Mudskipper"]);
    }

    #[test]
    fn editing_is_blocked_without_dev_mode() {
        let mut app = app();
        app.open_new();
        assert!(matches!(app.mode, Mode::Browse));
        app.toggle_dev_mode();
        app.open_new();
        assert!(matches!(app.mode, Mode::Edit(_)));
    }

    #[test]
    fn invalid_save_keeps_the_form_open_with_field_errors() {
        let mut app = app();
        app.toggle_dev_mode();
        app.open_new();
        type_into(&mut app, "id", "001");
        app.editor_save();

        let editor = app.editor().unwrap();
        assert!(editor.errors.contains_key("id"));
        assert!(editor.errors.contains_key("name"));
    }

    #[test]
    fn bad_field_input_is_reported_inline() {
        let mut app = app();
        app.toggle_dev_mode();
        app.next_tab();
        app.open_new();
        type_into(&mut app, "recipe", "m-001 x lots");
        assert!(app.editor().unwrap().errors.contains_key("recipe"));

        type_into(&mut app, "recipe", "m-001 x 2");
        assert!(!app.editor().unwrap().errors.contains_key("recipe"));
    }

    #[test]
    fn missing_image_file_is_reported_inline() {
        let mut app = app();
        app.toggle_dev_mode();
        app.open_edit();
        type_into(&mut app, "images.normalMale", "/no/such/file.png");
        assert!(app.editor().unwrap().errors.contains_key("images.normalMale"));
    }

    #[test]
    fn delete_needs_confirmation() {
        let mut app = app();
        app.toggle_dev_mode();
        app.ask_delete();
        assert!(matches!(app.mode, Mode::ConfirmDelete { .. }));
        app.cancel();
        assert_eq!(app.wiki.len(RecordKind::Fish), 6);

        app.ask_delete();
        app.confirm_delete();
        assert_eq!(app.wiki.len(RecordKind::Fish), 5);
    }

    #[test]
    fn tabs_wrap_around() {
        let mut app = app();
        app.previous_tab();
        assert_eq!(app.tab(), Tab::Logs);
        app.next_tab();
        assert_eq!(app.tab(), Tab::Catalog(RecordKind::Fish));
    }
}
