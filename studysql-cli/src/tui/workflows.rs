//! Database-backed workflows triggered from the UI
//!
//! Each workflow awaits the handler inline and reports an [`Outcome`];
//! no error leaves this module as a panic or a propagated `Err`.

use tracing::{info, warn};

use studysql_core::console::{self, ConsoleError};
use studysql_core::{DbError, Pagination, SAMPLE_QUERIES};

use super::app::{App, DetailState, Dialog, Outcome, Route};
use super::form::DocumentForm;

impl App {
    /// Connect with the current backend switch, then show the documents.
    pub async fn connect(&mut self) -> Outcome {
        match self.db.connect(self.use_postgres).await {
            Ok(()) => {
                let kind = self.db.backend_kind().map(|k| k.to_string()).unwrap_or_default();
                let msg = format!("Connected to {}", kind);
                self.set_status(&msg);
                self.pagination = Pagination::default();
                self.selected = 0;
                self.load_documents().await;
                self.route = Route::Documents;
                Outcome::success(msg)
            }
            Err(e) => {
                warn!(error = %e, "connect failed");
                let msg = format!("Connection error: {}", e);
                self.set_status(&msg);
                Outcome::failure(msg)
            }
        }
    }

    /// Reload the current page of documents into the table.
    pub async fn load_documents(&mut self) -> Outcome {
        if !self.is_connected() {
            self.documents = Default::default();
            let msg = "Not connected to a database";
            self.set_status(msg);
            return Outcome::failure(msg);
        }

        let mut result = self.db.documents().list_page(self.pagination).await;

        // A delete can leave us past the last page
        let last_page = match &result {
            Ok(page) if page.items.is_empty() && page.page > page.total_pages() => {
                Some(page.total_pages())
            }
            _ => None,
        };
        if let Some(last) = last_page {
            self.pagination = Pagination::new(last, self.pagination.per_page);
            result = self.db.documents().list_page(self.pagination).await;
        }

        match result {
            Ok(page) => {
                let msg = format!("{} documents loaded", page.total);
                self.documents = page;
                self.clamp_selection();
                self.set_status(&msg);
                Outcome::success(msg)
            }
            Err(e) => {
                self.documents = Default::default();
                self.selected = 0;
                let msg = format!("Error: {}", e);
                self.set_status(&msg);
                Outcome::failure(msg)
            }
        }
    }

    pub async fn next_page(&mut self) -> Outcome {
        if !self.documents.has_next() {
            return Outcome::failure("Already on the last page");
        }
        self.pagination = Pagination::new(self.pagination.page + 1, self.pagination.per_page);
        self.selected = 0;
        self.load_documents().await
    }

    pub async fn prev_page(&mut self) -> Outcome {
        if self.pagination.page <= 1 {
            return Outcome::failure("Already on the first page");
        }
        self.pagination = Pagination::new(self.pagination.page - 1, self.pagination.per_page);
        self.selected = 0;
        self.load_documents().await
    }

    /// Switch screens; the document table is reloaded on entry.
    pub async fn navigate(&mut self, route: Route) {
        self.route = route;
        if route == Route::Documents {
            self.load_documents().await;
        }
    }

    /// Fetch a document by id and open the detail dialog.
    pub async fn open_detail(&mut self, id: i64) -> Option<Outcome> {
        match self.db.documents().get(id).await {
            Ok(Some(document)) => {
                let form = DocumentForm::from_document(&document);
                self.dialog = Some(Dialog::Detail(DetailState { document, form }));
                None
            }
            Ok(None) => Some(Outcome::failure(format!("Document {} not found", id))),
            Err(e) => Some(Outcome::failure(format!("Error: {}", e))),
        }
    }

    /// Save the new-document dialog. An empty title keeps the dialog open.
    pub async fn save_new_document(&mut self) -> Outcome {
        let Some(Dialog::NewDocument(form)) = &self.dialog else {
            return Outcome::failure("No document is being created");
        };
        let title = form.title_text();
        let content = form.content_text();

        if title.trim().is_empty() {
            return Outcome::failure("Title is required");
        }

        match self.db.documents().create(&title, &content).await {
            Ok(id) => {
                info!(id, "document created");
                self.close_dialog();
                self.load_documents().await;
                Outcome::success("Document created")
            }
            Err(DbError::Validation(reason)) => Outcome::failure(reason),
            Err(e) => Outcome::failure(format!("Error: {}", e)),
        }
    }

    /// Write the detail dialog's edits back to the table.
    pub async fn update_document(&mut self) -> Outcome {
        let Some(Dialog::Detail(state)) = &self.dialog else {
            return Outcome::failure("No document is open");
        };
        let id = state.document.id;
        let title = state.form.title_text();
        let content = state.form.content_text();

        match self.db.documents().update(id, &title, &content).await {
            Ok(true) => {
                info!(id, "document updated");
                self.close_dialog();
                self.load_documents().await;
                Outcome::success("Document updated")
            }
            Ok(false) => {
                self.close_dialog();
                self.load_documents().await;
                Outcome::failure(format!("Document {} no longer exists", id))
            }
            Err(e) => Outcome::failure(format!("Error: {}", e)),
        }
    }

    /// Ask for confirmation before deleting the open document.
    pub fn request_delete(&mut self) {
        if let Some(Dialog::Detail(state)) = self.dialog.take() {
            self.dialog = Some(Dialog::ConfirmDelete(state));
        }
    }

    /// Back from the confirmation to the detail dialog.
    pub fn cancel_delete(&mut self) {
        if let Some(Dialog::ConfirmDelete(state)) = self.dialog.take() {
            self.dialog = Some(Dialog::Detail(state));
        }
    }

    pub async fn confirm_delete(&mut self) -> Outcome {
        let Some(Dialog::ConfirmDelete(state)) = &self.dialog else {
            return Outcome::failure("Nothing to delete");
        };
        let id = state.document.id;

        match self.db.documents().delete(id).await {
            Ok(deleted) => {
                self.close_dialog();
                self.load_documents().await;
                if deleted {
                    info!(id, "document deleted");
                    Outcome::success("Document deleted")
                } else {
                    Outcome::failure(format!("Document {} no longer exists", id))
                }
            }
            Err(e) => {
                self.cancel_delete();
                Outcome::failure(format!("Error: {}", e))
            }
        }
    }

    /// Run the console text through the read/write classifier.
    pub async fn run_query(&mut self) -> Outcome {
        let text = self.query_text();
        self.result_offset = 0;

        if !self.is_connected() {
            let msg = "Not connected to a database";
            self.query_summary = Some(format!("Error: {}", msg));
            return Outcome::failure(msg);
        }

        match console::run(&mut self.db, &text).await {
            Ok(outcome) => {
                let summary = outcome.summary();
                self.query_summary = Some(summary.clone());
                self.query_result = Some(outcome);
                Outcome::success(summary)
            }
            Err(ConsoleError::EmptyQuery) => Outcome::failure(ConsoleError::EmptyQuery.to_string()),
            Err(e) => {
                let msg = format!("Error: {}", e);
                self.query_summary = Some(msg.clone());
                self.query_result = None;
                Outcome::failure(msg)
            }
        }
    }

    /// Copy the highlighted sample into the console.
    pub fn apply_sample(&mut self) {
        if let Some(Dialog::Samples { selected }) = self.dialog {
            if let Some((_, sql)) = SAMPLE_QUERIES.get(selected) {
                self.set_query_text(sql);
            }
            self.close_dialog();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studysql_core::db::StaticConnector;
    use studysql_core::{DatabaseHandler, InitScript, SqliteSettings};
    use tempfile::TempDir;

    fn sqlite_app(dir: &TempDir) -> App {
        let settings = SqliteSettings::new(dir.path().join("app.db"), InitScript::Embedded);
        App::new(DatabaseHandler::new(StaticConnector::sqlite(settings)), false)
    }

    fn fill_form(app: &mut App, title: &str, content: &str) {
        if let Some(Dialog::NewDocument(form)) = &mut app.dialog {
            *form = DocumentForm::default();
            form.title.insert_str(title);
            form.content.insert_str(content);
        }
    }

    #[tokio::test]
    async fn connect_routes_to_documents() {
        let dir = TempDir::new().unwrap();
        let mut app = sqlite_app(&dir);

        let outcome = app.connect().await;
        assert_eq!(outcome, Outcome::success("Connected to SQLite"));
        assert_eq!(app.route, Route::Documents);
        assert_eq!(app.status, "0 documents loaded");
    }

    #[tokio::test]
    async fn connect_failure_stays_on_connect_screen() {
        // No PostgreSQL settings configured
        let dir = TempDir::new().unwrap();
        let mut app = sqlite_app(&dir);
        app.toggle_backend();

        let outcome = app.connect().await;
        assert!(!outcome.is_success());
        assert!(outcome.message().starts_with("Connection error:"));
        assert_eq!(app.route, Route::Connect);
    }

    #[tokio::test]
    async fn load_without_connection_reports_status() {
        let dir = TempDir::new().unwrap();
        let mut app = sqlite_app(&dir);

        let outcome = app.load_documents().await;
        assert!(!outcome.is_success());
        assert_eq!(app.status, "Not connected to a database");
    }

    #[tokio::test]
    async fn new_document_dialog_flow() {
        let dir = TempDir::new().unwrap();
        let mut app = sqlite_app(&dir);
        app.connect().await;

        app.open_new_document();
        let outcome = app.save_new_document().await;
        assert_eq!(outcome, Outcome::failure("Title is required"));
        assert!(matches!(app.dialog, Some(Dialog::NewDocument(_))));

        fill_form(&mut app, "Report", "draft text");
        let outcome = app.save_new_document().await;
        assert_eq!(outcome, Outcome::success("Document created"));
        assert!(app.dialog.is_none());
        assert_eq!(app.documents.items.len(), 1);
        assert_eq!(app.status, "1 documents loaded");
    }

    #[tokio::test]
    async fn detail_update_and_delete() {
        let dir = TempDir::new().unwrap();
        let mut app = sqlite_app(&dir);
        app.connect().await;
        app.db.documents().create("Report", "draft text").await.unwrap();
        app.load_documents().await;

        assert!(app.open_detail(1).await.is_none());
        if let Some(Dialog::Detail(state)) = &mut app.dialog {
            state.form.title = tui_textarea::TextArea::new(vec!["Revised".to_string()]);
        }
        assert_eq!(app.update_document().await, Outcome::success("Document updated"));
        assert_eq!(app.documents.items[0].title, "Revised");

        app.open_detail(1).await;
        app.request_delete();
        assert!(matches!(app.dialog, Some(Dialog::ConfirmDelete(_))));
        app.cancel_delete();
        assert!(matches!(app.dialog, Some(Dialog::Detail(_))));

        app.request_delete();
        assert_eq!(app.confirm_delete().await, Outcome::success("Document deleted"));
        assert!(app.documents.items.is_empty());

        let missing = app.open_detail(1).await.unwrap();
        assert_eq!(missing, Outcome::failure("Document 1 not found"));
    }

    #[tokio::test]
    async fn console_reports_summaries() {
        let dir = TempDir::new().unwrap();
        let mut app = sqlite_app(&dir);

        app.set_query_text("SELECT 1");
        assert!(!app.run_query().await.is_success());

        app.connect().await;
        app.set_query_text("   ");
        assert_eq!(app.run_query().await, Outcome::failure("Please enter a query"));

        app.open_samples();
        if let Some(Dialog::Samples { selected }) = &mut app.dialog {
            *selected = 2;
        }
        app.apply_sample();
        assert!(app.query_text().starts_with("INSERT INTO documents"));
        assert_eq!(app.run_query().await, Outcome::success("Query executed"));
        assert_eq!(app.query_summary.as_deref(), Some("Query executed"));

        app.set_query_text("SELECT * FROM documents");
        assert_eq!(app.run_query().await, Outcome::success("1 rows selected"));

        app.set_query_text("SELECT * FROM missing_table");
        let outcome = app.run_query().await;
        assert!(outcome.message().starts_with("Error:"));
        assert!(app.query_result.is_none());
    }

    #[tokio::test]
    async fn paging_moves_through_the_table() {
        let dir = TempDir::new().unwrap();
        let mut app = sqlite_app(&dir);
        app.connect().await;
        app.pagination = Pagination::new(1, 2);
        for i in 0..3 {
            app.db
                .documents()
                .create(&format!("Doc {}", i), "")
                .await
                .unwrap();
        }
        app.load_documents().await;

        assert!(!app.prev_page().await.is_success());
        assert!(app.next_page().await.is_success());
        assert_eq!(app.documents.items.len(), 1);
        assert!(!app.next_page().await.is_success());

        // Emptying the last page falls back to the previous one
        app.db.documents().delete(3).await.unwrap();
        app.load_documents().await;
        assert_eq!(app.documents.page, 1);
        assert_eq!(app.documents.items.len(), 2);
    }
}
