//! Event handling for the TUI
//!
//! Key handlers only touch in-memory state. Anything that needs the
//! database is returned as a [`HandleResult`] for the run loop to await.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use studysql_core::SAMPLE_QUERIES;

use super::app::{App, Dialog, Route};

/// Poll for events with timeout
pub fn poll_event(timeout: Duration) -> std::io::Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Result of handling a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleResult {
    /// Continue running
    Continue,
    /// Quit the application
    Quit,
    /// Switch screens
    Navigate(Route),
    /// Connect with the current backend switch
    Connect,
    /// Reload the document table
    Refresh,
    NextPage,
    PrevPage,
    /// Open the detail dialog for a document id
    OpenDetail(i64),
    /// Save the new-document dialog
    SaveNew,
    /// Save edits from the detail dialog
    UpdateDocument,
    /// Delete after confirmation
    DeleteDocument,
    /// Run the console text
    RunQuery,
}

/// Handle a key event
pub fn handle_key(app: &mut App, key: KeyEvent) -> HandleResult {
    // Windows reports releases too
    if key.kind == KeyEventKind::Release {
        return HandleResult::Continue;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global quit shortcuts (Ctrl+C, Ctrl+Q)
    if ctrl {
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => return HandleResult::Quit,
            _ => {}
        }
    }

    if app.dialog.is_some() {
        return handle_dialog(app, key, ctrl);
    }

    // Function keys switch screens from anywhere
    match key.code {
        KeyCode::F(1) => return HandleResult::Navigate(Route::Connect),
        KeyCode::F(2) => return HandleResult::Navigate(Route::Documents),
        KeyCode::F(3) => return HandleResult::Navigate(Route::Query),
        _ => {}
    }

    match app.route {
        Route::Connect => handle_connect(app, key),
        Route::Documents => handle_documents(app, key),
        Route::Query => handle_query(app, key, ctrl),
    }
}

fn handle_connect(app: &mut App, key: KeyEvent) -> HandleResult {
    match key.code {
        KeyCode::Char('q') => HandleResult::Quit,
        KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') | KeyCode::Char('t') => {
            app.toggle_backend();
            HandleResult::Continue
        }
        KeyCode::Enter | KeyCode::Char('c') => HandleResult::Connect,
        KeyCode::Char('2') => HandleResult::Navigate(Route::Documents),
        KeyCode::Char('3') => HandleResult::Navigate(Route::Query),
        _ => HandleResult::Continue,
    }
}

fn handle_documents(app: &mut App, key: KeyEvent) -> HandleResult {
    match key.code {
        KeyCode::Char('q') => HandleResult::Quit,

        // Navigation
        KeyCode::Char('j') | KeyCode::Down => {
            app.select_next();
            HandleResult::Continue
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.select_prev();
            HandleResult::Continue
        }
        KeyCode::Home | KeyCode::Char('g') => {
            app.selected = 0;
            HandleResult::Continue
        }
        KeyCode::End | KeyCode::Char('G') => {
            app.selected = app.documents.items.len().saturating_sub(1);
            HandleResult::Continue
        }

        // Paging
        KeyCode::Char(']') | KeyCode::PageDown | KeyCode::Right => HandleResult::NextPage,
        KeyCode::Char('[') | KeyCode::PageUp | KeyCode::Left => HandleResult::PrevPage,

        KeyCode::Enter => match app.selected_document() {
            Some(doc) => HandleResult::OpenDetail(doc.id),
            None => HandleResult::Continue,
        },
        KeyCode::Char('n') => {
            app.open_new_document();
            HandleResult::Continue
        }
        KeyCode::Char('r') => HandleResult::Refresh,

        KeyCode::Esc | KeyCode::Char('1') => HandleResult::Navigate(Route::Connect),
        KeyCode::Char('3') => HandleResult::Navigate(Route::Query),
        _ => HandleResult::Continue,
    }
}

/// The console editor owns plain keys; commands use Ctrl or function keys.
fn handle_query(app: &mut App, key: KeyEvent, ctrl: bool) -> HandleResult {
    match key.code {
        KeyCode::Esc => HandleResult::Navigate(Route::Documents),
        KeyCode::F(5) => HandleResult::RunQuery,
        KeyCode::Char('r') if ctrl => HandleResult::RunQuery,
        KeyCode::Char('l') if ctrl => {
            app.clear_query();
            HandleResult::Continue
        }
        KeyCode::Char('p') if ctrl => {
            app.open_samples();
            HandleResult::Continue
        }
        KeyCode::PageDown => {
            app.result_offset = app.result_offset.saturating_add(10);
            HandleResult::Continue
        }
        KeyCode::PageUp => {
            app.result_offset = app.result_offset.saturating_sub(10);
            HandleResult::Continue
        }
        _ => {
            app.query_editor.input(key);
            HandleResult::Continue
        }
    }
}

fn handle_dialog(app: &mut App, key: KeyEvent, ctrl: bool) -> HandleResult {
    let Some(dialog) = app.dialog.as_mut() else {
        return HandleResult::Continue;
    };

    match dialog {
        Dialog::NewDocument(form) => match key.code {
            KeyCode::Esc => {
                app.close_dialog();
                HandleResult::Continue
            }
            KeyCode::Tab => {
                form.toggle_focus();
                HandleResult::Continue
            }
            KeyCode::Char('s') if ctrl => HandleResult::SaveNew,
            _ => {
                form.input(key);
                HandleResult::Continue
            }
        },
        Dialog::Detail(state) => match key.code {
            KeyCode::Esc => {
                app.close_dialog();
                HandleResult::Continue
            }
            KeyCode::Tab => {
                state.form.toggle_focus();
                HandleResult::Continue
            }
            KeyCode::Char('s') if ctrl => HandleResult::UpdateDocument,
            KeyCode::Char('d') if ctrl => {
                app.request_delete();
                HandleResult::Continue
            }
            _ => {
                state.form.input(key);
                HandleResult::Continue
            }
        },
        Dialog::ConfirmDelete(_) => match key.code {
            KeyCode::Char('y') | KeyCode::Enter => HandleResult::DeleteDocument,
            KeyCode::Char('n') | KeyCode::Esc => {
                app.cancel_delete();
                HandleResult::Continue
            }
            _ => HandleResult::Continue,
        },
        Dialog::Samples { selected } => match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                app.close_dialog();
                HandleResult::Continue
            }
            KeyCode::Char('j') | KeyCode::Down => {
                *selected = (*selected + 1).min(SAMPLE_QUERIES.len() - 1);
                HandleResult::Continue
            }
            KeyCode::Char('k') | KeyCode::Up => {
                *selected = selected.saturating_sub(1);
                HandleResult::Continue
            }
            KeyCode::Enter => {
                app.apply_sample();
                HandleResult::Continue
            }
            // Quick pick (1-9)
            KeyCode::Char(c @ '1'..='9') => {
                let idx = (c as usize) - ('1' as usize);
                if idx < SAMPLE_QUERIES.len() {
                    *selected = idx;
                    app.apply_sample();
                }
                HandleResult::Continue
            }
            _ => HandleResult::Continue,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studysql_core::db::StaticConnector;
    use studysql_core::{DatabaseHandler, Document};

    fn app() -> App {
        App::new(DatabaseHandler::new(StaticConnector::default()), false)
    }

    fn press(app: &mut App, code: KeyCode) -> HandleResult {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(app: &mut App, c: char) -> HandleResult {
        handle_key(app, KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    fn doc(id: i64) -> Document {
        Document {
            id,
            title: format!("Doc {}", id),
            content: String::new(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn quit_shortcuts() {
        let mut app = app();
        assert_eq!(ctrl(&mut app, 'c'), HandleResult::Quit);
        assert_eq!(press(&mut app, KeyCode::Char('q')), HandleResult::Quit);

        // 'q' is text inside the console
        app.route = Route::Query;
        assert_eq!(press(&mut app, KeyCode::Char('q')), HandleResult::Continue);
        assert_eq!(app.query_text(), "q");
        assert_eq!(ctrl(&mut app, 'q'), HandleResult::Quit);
    }

    #[test]
    fn connect_screen_keys() {
        let mut app = app();
        press(&mut app, KeyCode::Char(' '));
        assert!(app.use_postgres);
        assert_eq!(press(&mut app, KeyCode::Enter), HandleResult::Connect);
        assert_eq!(
            press(&mut app, KeyCode::F(3)),
            HandleResult::Navigate(Route::Query)
        );
    }

    #[test]
    fn document_table_keys() {
        let mut app = app();
        app.route = Route::Documents;
        app.documents.items = vec![doc(4), doc(9)];

        press(&mut app, KeyCode::Char('j'));
        assert_eq!(press(&mut app, KeyCode::Enter), HandleResult::OpenDetail(9));
        assert_eq!(press(&mut app, KeyCode::Char(']')), HandleResult::NextPage);
        assert_eq!(press(&mut app, KeyCode::Char('r')), HandleResult::Refresh);

        press(&mut app, KeyCode::Char('n'));
        assert!(matches!(app.dialog, Some(Dialog::NewDocument(_))));
        // Dialog captures typing
        assert_eq!(press(&mut app, KeyCode::Char('q')), HandleResult::Continue);
        assert_eq!(ctrl(&mut app, 's'), HandleResult::SaveNew);
        press(&mut app, KeyCode::Esc);
        assert!(app.dialog.is_none());
    }

    #[test]
    fn console_keys() {
        let mut app = app();
        app.route = Route::Query;

        for c in "SELECT 1".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        assert_eq!(app.query_text(), "SELECT 1");
        assert_eq!(ctrl(&mut app, 'r'), HandleResult::RunQuery);
        assert_eq!(press(&mut app, KeyCode::F(5)), HandleResult::RunQuery);

        ctrl(&mut app, 'p');
        press(&mut app, KeyCode::Char('5'));
        assert!(app.dialog.is_none());
        assert_eq!(app.query_text(), SAMPLE_QUERIES[4].1);

        ctrl(&mut app, 'l');
        assert_eq!(app.query_text(), "");
        assert_eq!(
            press(&mut app, KeyCode::Esc),
            HandleResult::Navigate(Route::Documents)
        );
    }

    #[test]
    fn delete_needs_confirmation() {
        let mut app = app();
        app.route = Route::Documents;
        let document = doc(2);
        app.dialog = Some(Dialog::Detail(super::super::app::DetailState {
            form: super::super::form::DocumentForm::from_document(&document),
            document,
        }));

        assert_eq!(ctrl(&mut app, 'd'), HandleResult::Continue);
        assert!(matches!(app.dialog, Some(Dialog::ConfirmDelete(_))));
        assert_eq!(press(&mut app, KeyCode::Char('n')), HandleResult::Continue);
        assert!(matches!(app.dialog, Some(Dialog::Detail(_))));

        ctrl(&mut app, 'd');
        assert_eq!(press(&mut app, KeyCode::Char('y')), HandleResult::DeleteDocument);
    }
}
