//! Title/content editor shared by the new-document and detail dialogs

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::style::{Modifier, Style};
use studysql_core::Document;
use tui_textarea::TextArea;

/// Which field receives key input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Title,
    Content,
}

/// Two-field document editor
#[derive(Debug, Clone)]
pub struct DocumentForm {
    pub title: TextArea<'static>,
    pub content: TextArea<'static>,
    pub focus: FormField,
}

impl Default for DocumentForm {
    fn default() -> Self {
        Self::new(String::new(), String::new())
    }
}

impl DocumentForm {
    fn new(title: String, content: String) -> Self {
        let mut title = TextArea::new(vec![title]);
        title.set_placeholder_text("Title");
        title.set_cursor_line_style(Style::default());

        let mut content = TextArea::new(content.lines().map(str::to_string).collect());
        content.set_placeholder_text("Content");
        content.set_cursor_line_style(Style::default());

        let mut form = Self {
            title,
            content,
            focus: FormField::Title,
        };
        form.sync_cursors();
        form
    }

    /// Form prefilled from a stored document
    pub fn from_document(doc: &Document) -> Self {
        Self::new(doc.title.clone(), doc.content.clone())
    }

    pub fn title_text(&self) -> String {
        self.title.lines().join(" ")
    }

    pub fn content_text(&self) -> String {
        self.content.lines().join("\n")
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            FormField::Title => FormField::Content,
            FormField::Content => FormField::Title,
        };
        self.sync_cursors();
    }

    /// Feed a key to the focused field. Enter in the title moves to content.
    pub fn input(&mut self, key: KeyEvent) {
        match (self.focus, key.code) {
            (FormField::Title, KeyCode::Enter) => self.toggle_focus(),
            (FormField::Title, _) => {
                self.title.input(key);
            }
            (FormField::Content, _) => {
                self.content.input(key);
            }
        }
    }

    // Only the focused field shows a cursor
    fn sync_cursors(&mut self) {
        let shown = Style::default().add_modifier(Modifier::REVERSED);
        let (title, content) = match self.focus {
            FormField::Title => (shown, Style::default()),
            FormField::Content => (Style::default(), shown),
        };
        self.title.set_cursor_style(title);
        self.content.set_cursor_style(content);
    }
}
