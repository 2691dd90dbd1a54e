//! UI rendering using ratatui

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, TableState, Tabs, Wrap},
    Frame,
};
use studysql_core::console::ResultTable;
use studysql_core::text::{single_line, truncate, MAX_CONTENT_LENGTH};
use studysql_core::SAMPLE_QUERIES;

use super::app::{App, DetailState, Dialog, Outcome, Route};
use super::form::{DocumentForm, FormField};

/// Primary accent color
const ACCENT: Color = Color::Cyan;
/// Secondary color for less important elements
const SECONDARY: Color = Color::DarkGray;
/// Highlight color for selected items
const HIGHLIGHT: Color = Color::Yellow;
/// Success color
const SUCCESS: Color = Color::Green;
/// Failure color
const FAILURE: Color = Color::Red;
/// Dim text color
const DIM: Color = Color::Rgb(100, 100, 100);

/// Render the entire UI
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Route header
            Constraint::Min(8),    // Screen body
            Constraint::Length(1), // Key help
            Constraint::Length(1), // Status line
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);

    match app.route {
        Route::Connect => render_connect(frame, app, chunks[1]),
        Route::Documents => render_documents(frame, app, chunks[1]),
        Route::Query => render_query(frame, app, chunks[1]),
    }

    render_help_line(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    match &app.dialog {
        Some(Dialog::NewDocument(form)) => render_form_dialog(frame, " New Document ", form, None),
        Some(Dialog::Detail(state)) => render_detail_dialog(frame, state),
        Some(Dialog::ConfirmDelete(state)) => render_confirm_delete(frame, state),
        Some(Dialog::Samples { selected }) => render_samples(frame, *selected),
        None => {}
    }

    if let Some(n) = &app.notification {
        render_notification(frame, &n.outcome);
    }
}

/// Render the route tabs
fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<String> = Route::ALL
        .iter()
        .enumerate()
        .map(|(i, r)| format!("F{}:{}", i + 1, r.title()))
        .collect();
    let selected = Route::ALL.iter().position(|r| *r == app.route).unwrap_or(0);

    let title = match app.db.backend_kind() {
        Some(kind) if app.is_connected() => format!(" Study SQL [{}] ", kind),
        _ => " Study SQL ".to_string(),
    };

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .title(title)
                .title_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(SECONDARY)),
        )
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().fg(HIGHLIGHT).add_modifier(Modifier::BOLD));

    frame.render_widget(tabs, area);
}

/// Render the connection screen
fn render_connect(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Database Connection ")
        .title_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT));

    let option = |label: &'static str, active: bool| {
        if active {
            Span::styled(
                format!("[ {} ]", label),
                Style::default().fg(Color::Black).bg(ACCENT).add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(format!("  {}  ", label), Style::default().fg(DIM))
        }
    };

    let text = Text::from(vec![
        Line::from(""),
        Line::from("Select the database to use:"),
        Line::from(""),
        Line::from(vec![
            Span::raw("  "),
            option("SQLite", !app.use_postgres),
            Span::raw("   "),
            option("PostgreSQL", app.use_postgres),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "Space/←/→ toggles, Enter connects",
            Style::default().fg(DIM),
        )),
    ]);

    frame.render_widget(Paragraph::new(text).block(block), area);
}

/// Cells for one document row
fn document_cells(doc: &studysql_core::Document) -> Vec<Cell<'static>> {
    vec![
        Cell::from(doc.id.to_string()),
        Cell::from(truncate(&single_line(&doc.title), MAX_CONTENT_LENGTH)),
        Cell::from(truncate(&single_line(&doc.content), MAX_CONTENT_LENGTH)),
        Cell::from(doc.created_display()),
        Cell::from(doc.updated_display()),
    ]
}

/// Render the document table
fn render_documents(frame: &mut Frame, app: &App, area: Rect) {
    let page = &app.documents;
    let title = format!(
        " Documents (page {}/{}, {} total) ",
        page.page,
        page.total_pages(),
        page.total
    );

    let block = Block::default()
        .title(title)
        .title_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT));

    if page.items.is_empty() {
        let placeholder = if app.is_connected() {
            "  No documents"
        } else {
            "  Not connected (F1 to connect)"
        };
        frame.render_widget(
            Paragraph::new(Span::styled(placeholder, Style::default().fg(DIM))).block(block),
            area,
        );
        return;
    }

    let header = Row::new(["ID", "Title", "Content", "Created", "Updated"])
        .style(Style::default().fg(HIGHLIGHT).add_modifier(Modifier::BOLD));
    let rows: Vec<Row> = page.items.iter().map(|d| Row::new(document_cells(d))).collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Percentage(25),
            Constraint::Percentage(35),
            Constraint::Length(26),
            Constraint::Length(26),
        ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(
        Style::default()
            .fg(Color::Black)
            .bg(ACCENT)
            .add_modifier(Modifier::BOLD),
    );

    let mut state = TableState::default().with_selected(Some(app.selected));
    frame.render_stateful_widget(table, area, &mut state);
}

/// Render the SQL console
fn render_query(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8), // Editor
            Constraint::Length(1), // Summary
            Constraint::Min(3),    // Results
        ])
        .split(area);

    let mut editor = app.query_editor.clone();
    editor.set_block(
        Block::default()
            .title(" SQL ")
            .title_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(ACCENT)),
    );
    frame.render_widget(&editor, chunks[0]);

    let summary = match &app.query_summary {
        Some(s) if s.starts_with("Error") => Span::styled(s.clone(), Style::default().fg(FAILURE)),
        Some(s) => Span::styled(s.clone(), Style::default().fg(SUCCESS)),
        None => Span::styled("No query run yet", Style::default().fg(DIM)),
    };
    frame.render_widget(Paragraph::new(Line::from(summary)), chunks[1]);

    let block = Block::default()
        .title(" Results ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(SECONDARY));

    match app.query_result.as_ref().and_then(|r| r.table()) {
        Some(table) if !table.is_empty() => {
            frame.render_widget(result_table(table, app.result_offset).block(block), chunks[2]);
        }
        _ => frame.render_widget(
            Paragraph::new(Span::styled("  No rows", Style::default().fg(DIM))).block(block),
            chunks[2],
        ),
    }
}

fn result_table(table: &ResultTable, offset: usize) -> Table<'static> {
    let offset = offset.min(table.len().saturating_sub(1));
    let header = Row::new(table.labels.clone())
        .style(Style::default().fg(HIGHLIGHT).add_modifier(Modifier::BOLD));
    let rows: Vec<Row> = table
        .rows
        .iter()
        .skip(offset)
        .map(|cells| {
            Row::new(
                cells
                    .iter()
                    .map(|c| Cell::from(truncate(&single_line(c), MAX_CONTENT_LENGTH)))
                    .collect::<Vec<_>>(),
            )
        })
        .collect();
    let widths = vec![Constraint::Fill(1); table.labels.len().max(1)];

    Table::new(rows, widths).header(header)
}

/// Render the key help line
fn render_help_line(frame: &mut Frame, app: &App, area: Rect) {
    let help = match (&app.dialog, app.route) {
        (Some(Dialog::NewDocument(_)), _) => "Tab:field  Ctrl+S:save  Esc:cancel",
        (Some(Dialog::Detail(_)), _) => "Tab:field  Ctrl+S:update  Ctrl+D:delete  Esc:close",
        (Some(Dialog::ConfirmDelete(_)), _) => "y:delete  n:cancel",
        (Some(Dialog::Samples { .. }), _) => "j/k:nav  Enter:use  1-5:quick  Esc:cancel",
        (None, Route::Connect) => "Space:switch  Enter:connect  F2:documents  F3:query  q:quit",
        (None, Route::Documents) => {
            "j/k:nav  Enter:open  n:new  r:refresh  [/]:page  F1:connect  F3:query  q:quit"
        }
        (None, Route::Query) => {
            "Ctrl+R/F5:run  Ctrl+L:clear  Ctrl+P:samples  PgUp/PgDn:scroll  Esc:documents"
        }
    };

    frame.render_widget(
        Paragraph::new(Span::styled(help, Style::default().fg(DIM))),
        area,
    );
}

/// Render the status bar
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let indicator = Span::styled(
        format!(" {} ", app.route.path()),
        Style::default().bg(ACCENT).fg(Color::Black),
    );

    let line = Line::from(vec![
        indicator,
        Span::raw(" "),
        Span::styled(app.status.as_str(), Style::default().fg(HIGHLIGHT)),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}

/// Centered popup rectangle
fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}

fn field_block(label: &'static str, focused: bool) -> Block<'static> {
    let color = if focused { ACCENT } else { SECONDARY };
    Block::default()
        .title(label)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}

/// Render a title/content editor, optionally with timestamp lines
fn render_form_dialog(frame: &mut Frame, title: &str, form: &DocumentForm, meta: Option<Line>) {
    let area = popup_area(frame.area(), 70, 20);
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(title.to_string())
        .title_style(Style::default().fg(HIGHLIGHT).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(HIGHLIGHT));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(3),    // Content
            Constraint::Length(1), // Timestamps
        ])
        .split(inner);

    let mut title_input = form.title.clone();
    title_input.set_block(field_block(" Title ", form.focus == FormField::Title));
    frame.render_widget(&title_input, chunks[0]);

    let mut content_input = form.content.clone();
    content_input.set_block(field_block(" Content ", form.focus == FormField::Content));
    frame.render_widget(&content_input, chunks[1]);

    if let Some(meta) = meta {
        frame.render_widget(Paragraph::new(meta), chunks[2]);
    }
}

fn render_detail_dialog(frame: &mut Frame, state: &DetailState) {
    let doc = &state.document;
    let meta = Line::from(Span::styled(
        format!(
            "Created: {}  Updated: {}",
            doc.created_display(),
            doc.updated_display()
        ),
        Style::default().fg(DIM),
    ));
    let title = format!(" Document #{} ", doc.id);
    render_form_dialog(frame, &title, &state.form, Some(meta));
}

fn render_confirm_delete(frame: &mut Frame, state: &DetailState) {
    let area = popup_area(frame.area(), 50, 6);
    frame.render_widget(Clear, area);

    let text = Text::from(vec![
        Line::from(format!(
            "Delete document #{} \"{}\"?",
            state.document.id,
            truncate(&state.document.title, 30)
        )),
        Line::from(""),
        Line::from(Span::styled("y: delete   n: cancel", Style::default().fg(DIM))),
    ]);

    let block = Block::default()
        .title(" Confirm Delete ")
        .title_style(Style::default().fg(FAILURE).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(FAILURE));

    frame.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn render_samples(frame: &mut Frame, selected: usize) {
    let height = (SAMPLE_QUERIES.len() + 2) as u16;
    let area = popup_area(frame.area(), 90, height);
    frame.render_widget(Clear, area);

    let items: Vec<ListItem> = SAMPLE_QUERIES
        .iter()
        .enumerate()
        .map(|(idx, (name, sql))| {
            let style = if idx == selected {
                Style::default()
                    .fg(Color::Black)
                    .bg(HIGHLIGHT)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(Span::styled(
                format!("[{}] {} - {}", idx + 1, name, sql),
                style,
            )))
        })
        .collect();

    let block = Block::default()
        .title(" Sample Queries ")
        .title_style(Style::default().fg(HIGHLIGHT).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(HIGHLIGHT));

    frame.render_widget(List::new(items).block(block), area);
}

/// Transient outcome box in the bottom right corner
fn render_notification(frame: &mut Frame, outcome: &Outcome) {
    let full = frame.area();
    let color = if outcome.is_success() { SUCCESS } else { FAILURE };
    let area = notification_area(full, outcome.message().chars().count());

    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(outcome.message().to_string())
            .style(Style::default().fg(color))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color)),
            ),
        area,
    );
}

/// Bottom-right box sized to the message, always inside `full`
fn notification_area(full: Rect, message_len: usize) -> Rect {
    let width = u16::try_from(message_len)
        .unwrap_or(u16::MAX)
        .saturating_add(4)
        .min(full.width.saturating_sub(2))
        .max(10)
        .min(full.width);
    let height = 3.min(full.height);
    Rect {
        x: full.x + full.width.saturating_sub(width.saturating_add(1)).min(full.width - width),
        y: full.y + full.height.saturating_sub(6).min(full.height - height),
        width,
        height,
    }
}
