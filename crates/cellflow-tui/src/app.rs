use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use cellflow_core::document::{CreateDocument, Document, DocumentStatus};
use cellflow_service::{BlockingHttpService, ServiceError, SubmitOutcome};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

use crate::components::document_grid::DocumentGrid;
use crate::components::popover::{self, PanelFocus, PopoverView, NARROW_VIEWPORT_WIDTH};
use crate::notify::NoticeCenter;
use crate::session::Session;

/// What the app is currently doing
#[derive(Debug, Clone)]
pub enum Mode {
    /// Grid navigation
    Normal,
    /// A cell's edit panel is open
    Popover { view: PopoverView },
    /// Document list/switcher
    DocumentList {
        documents: Vec<Document>,
        list_state: ListState,
    },
    /// Typing a CSV path to import
    ImportDocument { input: String },
}

/// The document on screen, with its grid of cell views.
pub struct OpenDocument {
    pub id: String,
    pub name: String,
    pub status: DocumentStatus,
    pub grid: DocumentGrid,
}

impl OpenDocument {
    fn from_detail(detail: &cellflow_core::document::DocumentDetail) -> Self {
        Self {
            id: detail.document.chain_id().to_string(),
            name: detail.document.name.clone(),
            status: detail.document.status,
            grid: DocumentGrid::from_detail(detail),
        }
    }
}

pub struct App {
    service: BlockingHttpService,
    pub mode: Mode,
    session: Session,
    doc: Option<OpenDocument>,
    notices: NoticeCenter,
    status_message: Option<String>,
    viewport: (u16, u16),
}

impl App {
    pub fn new(service: BlockingHttpService) -> Result<Self> {
        let mut app = Self {
            service,
            mode: Mode::Normal,
            session: Session::new(),
            doc: None,
            notices: NoticeCenter::new(),
            status_message: None,
            viewport: (80, 24),
        };
        let documents = app.service.list_documents()?;
        if let Some(first) = documents.first() {
            app.open_document(&first.id);
        }
        Ok(app)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn grid(&self) -> Option<&DocumentGrid> {
        self.doc.as_ref().map(|d| &d.grid)
    }

    pub fn document(&self) -> Option<&OpenDocument> {
        self.doc.as_ref()
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn notices(&self) -> &NoticeCenter {
        &self.notices
    }

    pub fn is_input_mode(&self) -> bool {
        match &self.mode {
            Mode::ImportDocument { .. } => true,
            Mode::Popover { view } => view.focus == PanelFocus::Input,
            _ => false,
        }
    }

    /// Returns true if the event loop should use a poll timeout instead
    /// of blocking, so notices age out without a keypress.
    pub fn needs_polling(&self) -> bool {
        self.notices.has_notices()
    }

    /// Called on poll timeout from the event loop.
    pub fn tick(&mut self) {
        self.notices.tick(Instant::now());
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.viewport = (width, height);
        // A panel that held input focus gives it up when the terminal
        // gets too narrow to show the input comfortably.
        if width < NARROW_VIEWPORT_WIDTH {
            if let Mode::Popover { view } = &mut self.mode {
                view.focus = PanelFocus::Browse;
            }
        }
    }

    /// Reload the open document from the server, keeping the cursor.
    pub fn refresh(&mut self) {
        let Some(doc) = &self.doc else { return };
        let id = doc.id.clone();
        let cursor = doc.grid.cursor();
        match self.service.get_document(&id) {
            Ok(detail) => {
                let mut open = OpenDocument::from_detail(&detail);
                open.grid.move_cursor(cursor.0 as i32, cursor.1 as i32);
                self.doc = Some(open);
            }
            Err(e) => self.status_message = Some(format!("Refresh failed: {e}")),
        }
    }

    fn open_document(&mut self, id: &str) {
        match self.service.get_document(id) {
            Ok(detail) => {
                self.doc = Some(OpenDocument::from_detail(&detail));
                self.close_session();
            }
            Err(e) => self.status_message = Some(format!("Could not open document: {e}")),
        }
    }

    fn drain_notices(&mut self) {
        for message in self.service.take_messages() {
            self.notices.push(message);
        }
    }

    /// Open or toggle the edit panel for a cell. Activating the cell
    /// that already owns the session closes it; activating any other
    /// cell replaces the session. A failed panel fetch leaves no
    /// session behind, so the cell can simply be activated again.
    fn activate(&mut self, cell_id: &str) {
        if self.session.is_active(cell_id) {
            self.close_session();
            return;
        }
        self.close_session();

        let result = self.service.fetch_popover(cell_id);
        self.drain_notices();
        match result {
            Ok(panel) => {
                let coordinate = self
                    .grid()
                    .and_then(|g| g.cell_by_id(cell_id))
                    .map(|c| c.coordinate.clone())
                    .unwrap_or_default();
                let view = PopoverView::new(panel, coordinate, self.viewport.0);
                self.session.open(cell_id);
                self.mode = Mode::Popover { view };
            }
            Err(e) => {
                self.status_message = Some(format!("Could not open cell: {e}"));
            }
        }
    }

    fn close_session(&mut self) {
        self.session.close();
        self.mode = Mode::Normal;
    }

    // ---- Key handling ----

    pub fn handle_key(&mut self, key: KeyEvent) {
        match self.mode {
            Mode::Normal => self.handle_normal(key),
            Mode::Popover { .. } => self.handle_popover(key),
            Mode::DocumentList { .. } => self.handle_document_list(key),
            Mode::ImportDocument { .. } => self.handle_import(key),
        }
    }

    fn handle_normal(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('o') => self.show_document_list(),
            KeyCode::Char('n') => {
                self.mode = Mode::ImportDocument {
                    input: String::new(),
                };
            }
            KeyCode::Char('R') => self.refresh(),
            KeyCode::Char('h') | KeyCode::Left => self.move_cursor(0, -1),
            KeyCode::Char('l') | KeyCode::Right => self.move_cursor(0, 1),
            KeyCode::Char('j') | KeyCode::Down => self.move_cursor(1, 0),
            KeyCode::Char('k') | KeyCode::Up => self.move_cursor(-1, 0),
            KeyCode::Enter => {
                let selected = self
                    .grid()
                    .and_then(|g| g.selected_cell())
                    .map(|c| c.id.clone());
                if let Some(id) = selected {
                    self.activate(&id);
                }
            }
            _ => {}
        }
    }

    fn move_cursor(&mut self, d_row: i32, d_col: i32) {
        if let Some(doc) = self.doc.as_mut() {
            doc.grid.move_cursor(d_row, d_col);
        }
    }

    fn handle_popover(&mut self, key: KeyEvent) {
        let focus = match &self.mode {
            Mode::Popover { view } => view.focus,
            _ => return,
        };
        match key.code {
            KeyCode::Esc => self.close_session(),
            KeyCode::Tab => {
                if let Mode::Popover { view } = &mut self.mode {
                    if view.edit.is_some() && !view.submitting {
                        view.focus = match view.focus {
                            PanelFocus::Browse => PanelFocus::Input,
                            PanelFocus::Input => PanelFocus::Browse,
                        };
                    }
                }
            }
            _ => match focus {
                PanelFocus::Input => self.handle_popover_input(key),
                PanelFocus::Browse => self.handle_popover_browse(key),
            },
        }
    }

    fn handle_popover_input(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.submit_edit(),
            _ => {
                if let Mode::Popover { view } = &mut self.mode {
                    if view.submitting {
                        return;
                    }
                    if let Some(edit) = view.edit.as_mut() {
                        match key.code {
                            KeyCode::Char(c) => edit.input.push(c),
                            KeyCode::Backspace => {
                                edit.input.pop();
                            }
                            _ => {}
                        }
                    }
                }
            }
        }
    }

    fn handle_popover_browse(&mut self, key: KeyEvent) {
        match key.code {
            // Toggle: activating the open cell again closes the panel.
            KeyCode::Enter => self.close_session(),
            KeyCode::Char('i') => {
                if let Mode::Popover { view } = &mut self.mode {
                    if view.edit.is_some() && !view.submitting {
                        view.focus = PanelFocus::Input;
                    }
                }
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if let Mode::Popover { view } = &mut self.mode {
                    view.next_request();
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if let Mode::Popover { view } = &mut self.mode {
                    view.prev_request();
                }
            }
            KeyCode::Char('a') => self.accept_selected(),
            KeyCode::Char('r') => self.revoke_selected(),
            KeyCode::Char('x') => self.delete_applied(),
            KeyCode::Left => self.activate_adjacent(0, -1),
            KeyCode::Right => self.activate_adjacent(0, 1),
            _ => {}
        }
    }

    /// Move the cursor and open the panel for the cell it lands on,
    /// closing the current panel first.
    fn activate_adjacent(&mut self, d_row: i32, d_col: i32) {
        let next = {
            let Some(doc) = self.doc.as_mut() else { return };
            doc.grid.move_cursor(d_row, d_col);
            doc.grid.selected_cell().map(|c| c.id.clone())
        };
        if let Some(id) = next {
            if !self.session.is_active(&id) {
                self.activate(&id);
            }
        }
    }

    fn submit_edit(&mut self) {
        let payload = match &mut self.mode {
            Mode::Popover { view } if !view.submitting => view.edit.as_ref().map(|edit| {
                (
                    edit.action_url.clone(),
                    view.cell_id.clone(),
                    edit.input.clone(),
                )
            }),
            _ => None,
        };
        let Some((action_url, cell_id, value)) = payload else {
            return;
        };
        if let Mode::Popover { view } = &mut self.mode {
            view.submitting = true;
            view.error = None;
        }

        let result = self.service.submit_change(&action_url, &cell_id, &value);
        self.drain_notices();
        match result {
            Ok(SubmitOutcome::Applied { new_value }) => {
                if let Some(doc) = self.doc.as_mut() {
                    doc.grid.apply_value(&cell_id, &new_value, true);
                }
                self.status_message = Some(format!("Cell updated to {new_value}"));
                self.close_session();
            }
            Ok(SubmitOutcome::Queued) => {
                if let Some(doc) = self.doc.as_mut() {
                    doc.grid.mark_pending(&cell_id);
                }
                self.close_session();
            }
            // Validation keeps the panel open with the message and the
            // controls re-enabled.
            Err(ServiceError::InvalidInput(msg)) => {
                if let Mode::Popover { view } = &mut self.mode {
                    view.submitting = false;
                    view.error = Some(msg);
                }
            }
            Err(e) => {
                self.status_message = Some(format!("Submit failed: {e}"));
                self.close_session();
            }
        }
    }

    fn accept_selected(&mut self) {
        let payload = match &self.mode {
            Mode::Popover { view } if !view.submitting => view
                .selected_request()
                .map(|r| (r.id.clone(), view.cell_id.clone())),
            _ => None,
        };
        let Some((request_id, cell_id)) = payload else {
            return;
        };
        if let Mode::Popover { view } = &mut self.mode {
            view.submitting = true;
            view.error = None;
        }

        let result = self.service.accept_request(&request_id);
        self.drain_notices();
        match result {
            Ok(receipt) => {
                if let Some(doc) = self.doc.as_mut() {
                    doc.grid.apply_value(&cell_id, &receipt.new_value, true);
                    // Accepting settles every request on the cell.
                    doc.grid.clear_pending(&cell_id);
                }
                self.status_message = Some(format!("Accepted: {}", receipt.new_value));
                self.close_session();
            }
            Err(e) => self.reenable_with_error(e),
        }
    }

    fn revoke_selected(&mut self) {
        let payload = match &self.mode {
            Mode::Popover { view } if !view.submitting => view
                .selected_request()
                .map(|r| (r.id.clone(), view.cell_id.clone())),
            _ => None,
        };
        let Some((request_id, cell_id)) = payload else {
            return;
        };
        if let Mode::Popover { view } = &mut self.mode {
            view.submitting = true;
            view.error = None;
        }

        let result = self.service.revoke_request(&request_id);
        self.drain_notices();
        match result {
            Ok(receipt) => {
                if let Some(doc) = self.doc.as_mut() {
                    // Restore the displayed value; the badge only goes
                    // once no requests remain against the cell.
                    doc.grid.apply_value(&cell_id, &receipt.old_value, false);
                    if !receipt.other_requests {
                        doc.grid.clear_pending(&cell_id);
                    }
                }
                self.close_session();
            }
            Err(e) => self.reenable_with_error(e),
        }
    }

    fn delete_applied(&mut self) {
        let payload = match &self.mode {
            Mode::Popover { view } if !view.submitting => view
                .delete_action
                .clone()
                .map(|action| (action, view.cell_id.clone())),
            _ => None,
        };
        let Some((action, cell_id)) = payload else {
            return;
        };
        if let Mode::Popover { view } = &mut self.mode {
            view.submitting = true;
            view.error = None;
        }

        let result = self.service.delete_value(&action);
        self.drain_notices();
        match result {
            Ok(receipt) => {
                if let Some(doc) = self.doc.as_mut() {
                    doc.grid.apply_value(&cell_id, &receipt.old_value, false);
                }
                self.close_session();
            }
            Err(e) => self.reenable_with_error(e),
        }
    }

    fn reenable_with_error(&mut self, e: ServiceError) {
        if let Mode::Popover { view } = &mut self.mode {
            view.submitting = false;
            view.error = Some(e.to_string());
        }
    }

    fn show_document_list(&mut self) {
        match self.service.list_documents() {
            Ok(documents) => {
                let mut list_state = ListState::default();
                if !documents.is_empty() {
                    list_state.select(Some(0));
                }
                self.close_session();
                self.mode = Mode::DocumentList {
                    documents,
                    list_state,
                };
            }
            Err(e) => self.status_message = Some(format!("Could not list documents: {e}")),
        }
    }

    fn handle_document_list(&mut self, key: KeyEvent) {
        let Mode::DocumentList {
            documents,
            list_state,
        } = &mut self.mode
        else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Char('j') | KeyCode::Down => {
                let current = list_state.selected().unwrap_or(0);
                if current + 1 < documents.len() {
                    list_state.select(Some(current + 1));
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                let current = list_state.selected().unwrap_or(0);
                if current > 0 {
                    list_state.select(Some(current - 1));
                }
            }
            KeyCode::Char('n') => {
                self.mode = Mode::ImportDocument {
                    input: String::new(),
                };
            }
            KeyCode::Enter => {
                let selected = list_state
                    .selected()
                    .and_then(|i| documents.get(i))
                    .map(|d| d.id.clone());
                if let Some(id) = selected {
                    self.open_document(&id);
                }
            }
            _ => {}
        }
    }

    fn handle_import(&mut self, key: KeyEvent) {
        let Mode::ImportDocument { input } = &mut self.mode else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Char(c) => input.push(c),
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Enter => {
                let path = input.clone();
                self.import_csv(&path);
            }
            _ => {}
        }
    }

    fn import_csv(&mut self, path_str: &str) {
        let path = Path::new(path_str);
        let rows = match read_csv_rows(path) {
            Ok(rows) => rows,
            Err(e) => {
                self.status_message = Some(format!("Import failed: {e}"));
                return;
            }
        };
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "imported".to_string());
        match self.service.create_document(&CreateDocument {
            name,
            status: DocumentStatus::Open,
            rows,
        }) {
            Ok(document) => {
                self.status_message = Some(format!("Imported {}", document.name));
                self.open_document(&document.id.clone());
            }
            Err(e) => self.status_message = Some(format!("Import failed: {e}")),
        }
    }

    // ---- Rendering ----

    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();
        self.viewport = (area.width, area.height);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        self.render_title_bar(frame, layout[0]);
        if let Some(doc) = &self.doc {
            doc.grid.render(frame, layout[1]);
        } else {
            frame.render_widget(
                Paragraph::new("No document open. Press n to import one.")
                    .style(Style::default().fg(Color::DarkGray)),
                layout[1],
            );
        }
        self.render_status_bar(frame, layout[2]);

        // Overlays
        match &self.mode {
            Mode::Normal => {}
            Mode::Popover { view } => {
                let anchor = self.doc.as_ref().and_then(|doc| {
                    doc.grid.cell_by_id(&view.cell_id).and_then(|cell| {
                        doc.grid.cell_rect(layout[1], cell.row, cell.column)
                    })
                });
                popover::render(frame, view, anchor, layout[1]);
            }
            Mode::DocumentList {
                documents,
                list_state,
            } => render_document_list(frame, documents, list_state, area),
            Mode::ImportDocument { input } => {
                render_input_bar(frame, "CSV path: ", input, area)
            }
        }

        self.notices.render(frame, layout[1]);
    }

    fn render_title_bar(&self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::styled(
            " cellflow ",
            Style::default().bold().fg(Color::Cyan),
        )];
        if let Some(doc) = &self.doc {
            spans.push(Span::raw("| "));
            spans.push(Span::styled(&doc.name, Style::default().fg(Color::Yellow)));
            spans.push(Span::styled(
                format!(" ({})", doc.status.display_name()),
                Style::default().fg(Color::DarkGray),
            ));
        }
        frame.render_widget(Line::from(spans), area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        if let Some(ref msg) = self.status_message {
            let line = Line::from(Span::styled(
                format!(" {msg}"),
                Style::default().fg(Color::Green),
            ));
            frame.render_widget(line, area);
            return;
        }

        let hints = match &self.mode {
            Mode::Normal => vec![
                ("q", "quit"),
                ("h/j/k/l", "move"),
                ("Enter", "edit cell"),
                ("o", "documents"),
                ("n", "import"),
                ("R", "refresh"),
            ],
            Mode::Popover { view } => {
                let mut hints = vec![("Esc", "close")];
                match view.focus {
                    PanelFocus::Input => {
                        hints.push(("Enter", "submit"));
                        hints.push(("Tab", "requests"));
                    }
                    PanelFocus::Browse => {
                        hints.push(("Enter", "close"));
                        if view.edit.is_some() {
                            hints.push(("i", "edit"));
                        }
                        if !view.requests.is_empty() {
                            hints.push(("j/k", "requests"));
                            hints.push(("a", "accept"));
                            hints.push(("r", "revoke"));
                        }
                        if view.delete_action.is_some() {
                            hints.push(("x", "delete value"));
                        }
                    }
                }
                hints
            }
            Mode::DocumentList { .. } => vec![
                ("j/k", "move"),
                ("Enter", "open"),
                ("n", "import"),
                ("Esc", "back"),
            ],
            Mode::ImportDocument { .. } => vec![("Enter", "import"), ("Esc", "cancel")],
        };

        let spans: Vec<Span> = hints
            .into_iter()
            .flat_map(|(key, desc)| {
                vec![
                    Span::styled(format!(" {key}"), Style::default().fg(Color::Yellow).bold()),
                    Span::raw(format!(" {desc} ")),
                ]
            })
            .collect();

        frame.render_widget(Line::from(spans), area);
    }
}

fn render_document_list(
    frame: &mut Frame,
    documents: &[Document],
    list_state: &ListState,
    area: Rect,
) {
    let popup = centered_rect(50, 50, area);
    frame.render_widget(Clear, popup);

    let items: Vec<ListItem> = documents
        .iter()
        .map(|doc| {
            ListItem::new(Line::from(vec![
                Span::raw(doc.name.as_str()),
                Span::styled(
                    format!(" ({})", doc.status.display_name()),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .title(" Documents ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan).bold())
        .highlight_symbol("> ");

    let mut state = list_state.clone();
    frame.render_stateful_widget(list, popup, &mut state);
}

fn render_input_bar(frame: &mut Frame, label: &str, input: &str, area: Rect) {
    let input_area = Rect {
        x: area.x,
        y: area.y + area.height.saturating_sub(3),
        width: area.width,
        height: 3,
    };
    frame.render_widget(Clear, input_area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(label);
    frame.render_widget(Paragraph::new(input).block(block), input_area);
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<String>>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| e.to_string())?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
