use cellflow_core::popover::{PopoverPanel, RequestSummary};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Below this terminal width the panel opens with the request list
/// focused instead of grabbing the text input.
pub const NARROW_VIEWPORT_WIDTH: u16 = 60;

pub const PANEL_WIDTH: u16 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelFocus {
    Browse,
    Input,
}

#[derive(Debug, Clone)]
pub struct EditInput {
    pub action_url: String,
    pub input: String,
}

/// Client-side state of an open edit panel. Controls are disabled while
/// `submitting` is set; `error` holds a validation message that keeps
/// the panel open.
#[derive(Debug, Clone)]
pub struct PopoverView {
    pub cell_id: String,
    pub coordinate: String,
    pub edit: Option<EditInput>,
    pub requests: Vec<RequestSummary>,
    pub selected_request: usize,
    pub delete_action: Option<String>,
    pub focus: PanelFocus,
    pub submitting: bool,
    pub error: Option<String>,
}

impl PopoverView {
    pub fn new(panel: PopoverPanel, coordinate: String, viewport_width: u16) -> Self {
        let edit = panel.edit_form.map(|form| EditInput {
            action_url: form.action_url,
            input: form.initial_value,
        });
        let focus = if edit.is_some() && viewport_width >= NARROW_VIEWPORT_WIDTH {
            PanelFocus::Input
        } else {
            PanelFocus::Browse
        };
        Self {
            cell_id: panel.cell_id,
            coordinate,
            edit,
            requests: panel.requests,
            selected_request: 0,
            delete_action: panel.delete_action,
            focus,
            submitting: false,
            error: None,
        }
    }

    pub fn selected_request(&self) -> Option<&RequestSummary> {
        self.requests.get(self.selected_request)
    }

    pub fn next_request(&mut self) {
        if self.selected_request + 1 < self.requests.len() {
            self.selected_request += 1;
        }
    }

    pub fn prev_request(&mut self) {
        self.selected_request = self.selected_request.saturating_sub(1);
    }

    pub fn has_controls(&self) -> bool {
        self.edit.is_some() || !self.requests.is_empty() || self.delete_action.is_some()
    }
}

/// Draw the panel anchored under its cell, clamped to the frame.
pub fn render(frame: &mut Frame, view: &PopoverView, anchor: Option<Rect>, area: Rect) {
    let height = panel_height(view);
    let rect = panel_rect(anchor, area, height);
    frame.render_widget(Clear, rect);

    let title = format!(" Cell {} ", view.coordinate);
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(rect);
    frame.render_widget(block, rect);

    let mut lines: Vec<Line> = Vec::new();

    if let Some(edit) = &view.edit {
        let label_style = if view.focus == PanelFocus::Input {
            Style::default().fg(Color::Cyan).bold()
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::styled("Value: ", label_style),
            Span::raw(edit.input.as_str()),
            Span::styled(
                if view.focus == PanelFocus::Input { "_" } else { "" },
                Style::default().fg(Color::Cyan),
            ),
        ]));
    } else {
        lines.push(Line::from(Span::styled(
            "Document is locked",
            Style::default().fg(Color::Red),
        )));
    }

    if let Some(error) = &view.error {
        lines.push(Line::from(Span::styled(
            error.as_str(),
            Style::default().fg(Color::Red),
        )));
    }

    if !view.requests.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Pending requests",
            Style::default().bold(),
        )));
        for (i, request) in view.requests.iter().enumerate() {
            let marker = if i == view.selected_request && view.focus == PanelFocus::Browse {
                "> "
            } else {
                "  "
            };
            lines.push(Line::from(format!(
                "{marker}{} by {}",
                request.new_value, request.author
            )));
        }
    }

    if view.delete_action.is_some() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "x: delete applied value",
            Style::default().fg(Color::Yellow),
        )));
    }

    if view.submitting {
        lines.push(Line::from(Span::styled(
            "...",
            Style::default().fg(Color::DarkGray),
        )));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn panel_height(view: &PopoverView) -> u16 {
    let mut height = 3;
    if view.error.is_some() {
        height += 1;
    }
    if !view.requests.is_empty() {
        height += 2 + view.requests.len() as u16;
    }
    if view.delete_action.is_some() {
        height += 2;
    }
    if view.submitting {
        height += 1;
    }
    height
}

fn panel_rect(anchor: Option<Rect>, area: Rect, height: u16) -> Rect {
    let width = PANEL_WIDTH.min(area.width);
    let height = height.min(area.height);
    let (mut x, mut y) = match anchor {
        Some(cell) => (cell.x, cell.y + cell.height),
        None => (area.x, area.y),
    };
    if x + width > area.x + area.width {
        x = area.x + area.width - width;
    }
    if y + height > area.y + area.height {
        y = (area.y + area.height).saturating_sub(height);
    }
    Rect {
        x,
        y,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellflow_core::popover::EditForm;

    fn make_panel(with_form: bool) -> PopoverPanel {
        PopoverPanel {
            cell_id: "c1".into(),
            edit_form: with_form.then(|| EditForm {
                action_url: "/api/change-requests/".into(),
                initial_value: "10".into(),
            }),
            requests: vec![],
            delete_action: None,
        }
    }

    #[test]
    fn wide_viewport_focuses_the_input() {
        let view = PopoverView::new(make_panel(true), "A1".into(), 80);
        assert_eq!(view.focus, PanelFocus::Input);
        assert_eq!(view.edit.as_ref().unwrap().input, "10");
    }

    #[test]
    fn narrow_viewport_defers_input_focus() {
        let view = PopoverView::new(make_panel(true), "A1".into(), 50);
        assert_eq!(view.focus, PanelFocus::Browse);
    }

    #[test]
    fn locked_panel_has_no_input_to_focus() {
        let view = PopoverView::new(make_panel(false), "A1".into(), 80);
        assert_eq!(view.focus, PanelFocus::Browse);
        assert!(!view.has_controls());
    }

    #[test]
    fn panel_is_clamped_inside_the_frame() {
        let area = Rect::new(0, 0, 80, 24);
        let anchor = Some(Rect::new(70, 22, 14, 3));
        let rect = panel_rect(anchor, area, 6);
        assert!(rect.x + rect.width <= 80);
        assert!(rect.y + rect.height <= 24);
    }
}
