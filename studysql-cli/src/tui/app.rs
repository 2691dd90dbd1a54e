//! Core application state, routes and dialogs

use std::time::{Duration, Instant};

use studysql_core::console::ConsoleOutcome;
use studysql_core::{DatabaseHandler, Document, Paginated, Pagination};
use tui_textarea::TextArea;

use super::form::DocumentForm;

/// Hint shown in the empty SQL console
const QUERY_PLACEHOLDER: &str = "e.g. SELECT * FROM documents WHERE title LIKE '%keyword%'";

/// How long a notification stays on screen
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(4);

/// Screens of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    /// Backend switch and connect action
    #[default]
    Connect,
    /// Paginated document table
    Documents,
    /// Ad-hoc SQL console
    Query,
}

impl Route {
    /// Resolve a route path; unknown paths land on the connection screen
    pub fn from_path(path: &str) -> Self {
        match path {
            "/documents" => Self::Documents,
            "/query" => Self::Query,
            _ => Self::Connect,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Connect => "/connect",
            Self::Documents => "/documents",
            Self::Query => "/query",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Connect => "Connect",
            Self::Documents => "Documents",
            Self::Query => "Query",
        }
    }

    pub const ALL: [Route; 3] = [Route::Connect, Route::Documents, Route::Query];
}

/// Result of a user workflow, shown as a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Failure(String),
}

impl Outcome {
    pub fn success(msg: impl Into<String>) -> Self {
        Self::Success(msg.into())
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self::Failure(msg.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success(msg) | Self::Failure(msg) => msg,
        }
    }
}

/// A transient outcome message
#[derive(Debug, Clone)]
pub struct Notification {
    pub outcome: Outcome,
    pub shown_at: Instant,
}

/// Open document plus its editor
#[derive(Debug, Clone)]
pub struct DetailState {
    pub document: Document,
    pub form: DocumentForm,
}

/// Modal overlays; at most one is open
#[derive(Debug, Clone)]
pub enum Dialog {
    NewDocument(DocumentForm),
    Detail(DetailState),
    /// Delete confirmation; cancelling returns to the detail dialog
    ConfirmDelete(DetailState),
    Samples { selected: usize },
}

/// Main application state
pub struct App {
    /// Current screen
    pub route: Route,
    /// Backend switch on the connection screen
    pub use_postgres: bool,
    /// The only path to the database
    pub db: DatabaseHandler,
    /// Page currently shown in the document table
    pub documents: Paginated<Document>,
    /// Requested page
    pub pagination: Pagination,
    /// Selected row in the document table
    pub selected: usize,
    /// Open dialog, if any
    pub dialog: Option<Dialog>,
    /// SQL console input
    pub query_editor: TextArea<'static>,
    /// Last console result
    pub query_result: Option<ConsoleOutcome>,
    /// `<n> rows selected`, `Query executed` or `Error: ...`
    pub query_summary: Option<String>,
    /// First visible row of the console result table
    pub result_offset: usize,
    /// Status line text
    pub status: String,
    /// Transient message from the last workflow
    pub notification: Option<Notification>,
    /// Whether the app should quit
    pub should_quit: bool,
}

impl App {
    pub fn new(db: DatabaseHandler, use_postgres: bool) -> Self {
        let mut query_editor = TextArea::default();
        query_editor.set_placeholder_text(QUERY_PLACEHOLDER);

        Self {
            route: Route::Connect,
            use_postgres,
            db,
            documents: Paginated::default(),
            pagination: Pagination::default(),
            selected: 0,
            dialog: None,
            query_editor,
            query_result: None,
            query_summary: None,
            result_offset: 0,
            status: "Ready".to_string(),
            notification: None,
            should_quit: false,
        }
    }

    /// Whether the handler holds a live connection
    pub fn is_connected(&self) -> bool {
        self.db.is_connected().unwrap_or(false)
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status = msg.into();
    }

    pub fn notify(&mut self, outcome: Outcome) {
        self.notification = Some(Notification {
            outcome,
            shown_at: Instant::now(),
        });
    }

    /// Drop the notification once it has been visible long enough
    pub fn expire_notification(&mut self, now: Instant) {
        if let Some(n) = &self.notification {
            if now.duration_since(n.shown_at) >= NOTIFICATION_TTL {
                self.notification = None;
            }
        }
    }

    pub fn toggle_backend(&mut self) {
        self.use_postgres = !self.use_postgres;
    }

    pub fn selected_document(&self) -> Option<&Document> {
        self.documents.items.get(self.selected)
    }

    pub fn select_next(&mut self) {
        let len = self.documents.items.len();
        if len > 0 {
            self.selected = (self.selected + 1).min(len - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Keep the selection inside the loaded page
    pub fn clamp_selection(&mut self) {
        let len = self.documents.items.len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    pub fn open_new_document(&mut self) {
        self.dialog = Some(Dialog::NewDocument(DocumentForm::default()));
    }

    pub fn open_samples(&mut self) {
        self.dialog = Some(Dialog::Samples { selected: 0 });
    }

    pub fn close_dialog(&mut self) {
        self.dialog = None;
    }

    /// Current console text
    pub fn query_text(&self) -> String {
        self.query_editor.lines().join("\n")
    }

    /// Replace the console text, e.g. with a sample query
    pub fn set_query_text(&mut self, text: &str) {
        let mut editor = TextArea::new(text.lines().map(str::to_string).collect());
        editor.set_placeholder_text(QUERY_PLACEHOLDER);
        editor.move_cursor(tui_textarea::CursorMove::Bottom);
        editor.move_cursor(tui_textarea::CursorMove::End);
        self.query_editor = editor;
    }

    /// Empty the console input and result
    pub fn clear_query(&mut self) {
        self.set_query_text("");
        self.query_result = None;
        self.query_summary = None;
        self.result_offset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studysql_core::db::StaticConnector;

    fn app() -> App {
        App::new(DatabaseHandler::new(StaticConnector::default()), false)
    }

    #[test]
    fn unknown_routes_fall_back_to_connect() {
        assert_eq!(Route::from_path("/documents"), Route::Documents);
        assert_eq!(Route::from_path("/query"), Route::Query);
        assert_eq!(Route::from_path("/connect"), Route::Connect);
        assert_eq!(Route::from_path("/settings"), Route::Connect);
        assert_eq!(Route::from_path(""), Route::Connect);

        for route in Route::ALL {
            assert_eq!(Route::from_path(route.path()), route);
        }
    }

    #[test]
    fn new_app_is_disconnected() {
        let app = app();
        assert_eq!(app.route, Route::Connect);
        assert!(!app.is_connected());
        assert_eq!(app.status, "Ready");
    }

    #[test]
    fn notifications_expire() {
        let mut app = app();
        app.notify(Outcome::failure("Title is required"));
        let shown = app.notification.as_ref().unwrap().shown_at;

        app.expire_notification(shown + Duration::from_secs(1));
        assert!(app.notification.is_some());

        app.expire_notification(shown + NOTIFICATION_TTL);
        assert!(app.notification.is_none());
    }

    #[test]
    fn query_text_round_trips_lines() {
        let mut app = app();
        app.set_query_text("SELECT *\nFROM documents");
        assert_eq!(app.query_text(), "SELECT *\nFROM documents");

        app.clear_query();
        assert_eq!(app.query_text(), "");
        assert!(app.query_summary.is_none());
    }

    #[test]
    fn selection_stays_in_bounds() {
        let mut app = app();
        app.select_next();
        assert_eq!(app.selected, 0);
        app.select_prev();
        assert_eq!(app.selected, 0);

        app.selected = 5;
        app.clamp_selection();
        assert_eq!(app.selected, 0);
    }
}
