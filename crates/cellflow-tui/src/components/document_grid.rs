use cellflow_core::document::DocumentDetail;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

pub const CELL_WIDTH: u16 = 14;
pub const CELL_HEIGHT: u16 = 3;

const BADGE_TEXT: &str = " Request ";

/// One cell as the grid renders it, with the review flags that drive
/// its badge and highlight.
#[derive(Debug, Clone)]
pub struct CellView {
    pub id: String,
    pub row: u32,
    pub column: u32,
    pub coordinate: String,
    pub value: String,
    /// An accepted change produced this value.
    pub changed: bool,
    /// At least one change request awaits review.
    pub pending: bool,
}

/// The tabular document plus a cursor. All mutation goes through cell
/// ids so stale completions for cells that no longer exist are no-ops.
pub struct DocumentGrid {
    cells: Vec<CellView>,
    rows: u32,
    cols: u32,
    cursor: (u32, u32),
}

impl DocumentGrid {
    pub fn from_detail(detail: &DocumentDetail) -> Self {
        let cells: Vec<CellView> = detail
            .cells
            .iter()
            .map(|cell| CellView {
                id: cell.id.clone(),
                row: cell.row,
                column: cell.column,
                coordinate: cell.coordinate.clone(),
                value: cell.value.clone(),
                changed: detail.changed_cells.contains(&cell.id),
                pending: detail.pending_cells.contains(&cell.id),
            })
            .collect();
        let rows = cells.iter().map(|c| c.row + 1).max().unwrap_or(0);
        let cols = cells.iter().map(|c| c.column + 1).max().unwrap_or(0);
        Self {
            cells,
            rows,
            cols,
            cursor: (0, 0),
        }
    }

    pub fn cells(&self) -> &[CellView] {
        &self.cells
    }

    pub fn cell_at(&self, row: u32, column: u32) -> Option<&CellView> {
        self.cells
            .iter()
            .find(|c| c.row == row && c.column == column)
    }

    pub fn cell_by_id(&self, cell_id: &str) -> Option<&CellView> {
        self.cells.iter().find(|c| c.id == cell_id)
    }

    pub fn selected_cell(&self) -> Option<&CellView> {
        self.cell_at(self.cursor.0, self.cursor.1)
    }

    pub fn cursor(&self) -> (u32, u32) {
        self.cursor
    }

    pub fn move_cursor(&mut self, d_row: i32, d_col: i32) {
        if self.rows == 0 || self.cols == 0 {
            return;
        }
        let row = self.cursor.0 as i32 + d_row;
        let col = self.cursor.1 as i32 + d_col;
        self.cursor = (
            row.clamp(0, self.rows as i32 - 1) as u32,
            col.clamp(0, self.cols as i32 - 1) as u32,
        );
    }

    pub fn select_cell_by_id(&mut self, cell_id: &str) -> bool {
        if let Some(cell) = self.cells.iter().find(|c| c.id == cell_id) {
            self.cursor = (cell.row, cell.column);
            true
        } else {
            false
        }
    }

    /// Write a completed edit into the grid. Unknown ids are ignored so
    /// a response for a replaced document cannot corrupt the view.
    pub fn apply_value(&mut self, cell_id: &str, value: &str, changed: bool) -> bool {
        if let Some(cell) = self.cells.iter_mut().find(|c| c.id == cell_id) {
            cell.value = value.to_string();
            cell.changed = changed;
            true
        } else {
            false
        }
    }

    pub fn mark_pending(&mut self, cell_id: &str) {
        if let Some(cell) = self.cells.iter_mut().find(|c| c.id == cell_id) {
            cell.pending = true;
        }
    }

    pub fn clear_pending(&mut self, cell_id: &str) {
        if let Some(cell) = self.cells.iter_mut().find(|c| c.id == cell_id) {
            cell.pending = false;
        }
    }

    pub fn pending_count(&self) -> usize {
        self.cells.iter().filter(|c| c.pending).count()
    }

    /// Screen rectangle of a cell within the grid area, if it fits.
    /// Row zero is pushed one line down to leave room for badges.
    pub fn cell_rect(&self, area: Rect, row: u32, column: u32) -> Option<Rect> {
        let x = area.x + column as u16 * CELL_WIDTH;
        let y = area.y + 1 + row as u16 * CELL_HEIGHT;
        if x + CELL_WIDTH > area.x + area.width || y + CELL_HEIGHT > area.y + area.height {
            return None;
        }
        Some(Rect {
            x,
            y,
            width: CELL_WIDTH,
            height: CELL_HEIGHT,
        })
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        for cell in &self.cells {
            let Some(rect) = self.cell_rect(area, cell.row, cell.column) else {
                continue;
            };
            let is_cursor = (cell.row, cell.column) == self.cursor;
            let border_style = if is_cursor {
                Style::default().fg(Color::Cyan)
            } else if cell.pending {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let value_style = if cell.changed {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };

            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(cell.coordinate.as_str());
            let inner = block.inner(rect);
            frame.render_widget(block, rect);
            frame.render_widget(
                Paragraph::new(cell.value.as_str()).style(value_style),
                inner,
            );

            if cell.pending {
                let value_area = value_area(inner, &cell.value);
                let (x, y) = badge_position(rect, value_area, BADGE_TEXT.len() as u16);
                let badge_rect = Rect {
                    x,
                    y,
                    width: (BADGE_TEXT.len() as u16).min(area.x + area.width - x),
                    height: 1,
                };
                frame.render_widget(Clear, badge_rect);
                frame.render_widget(
                    Paragraph::new(BADGE_TEXT)
                        .style(Style::default().fg(Color::Black).bg(Color::Yellow)),
                    badge_rect,
                );
            }
        }
    }
}

/// The rectangle the cell's value text occupies, when there is any.
pub fn value_area(inner: Rect, value: &str) -> Option<Rect> {
    if value.is_empty() || inner.width == 0 {
        return None;
    }
    Some(Rect {
        x: inner.x,
        y: inner.y,
        width: (value.len() as u16).min(inner.width),
        height: 1,
    })
}

/// Where the pending badge goes: centered over the value text when the
/// cell has one, otherwise over the cell itself, one line above. Pure
/// in its inputs, so repositioning an already-placed badge lands it on
/// the same spot.
pub fn badge_position(cell: Rect, value_area: Option<Rect>, badge_width: u16) -> (u16, u16) {
    let anchor = value_area.unwrap_or(cell);
    let x = (anchor.x + anchor.width / 2).saturating_sub(badge_width / 2);
    let y = anchor.y.saturating_sub(1);
    (x, y)
}
