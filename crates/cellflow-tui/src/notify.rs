use std::time::{Duration, Instant};

use cellflow_core::message::ServerMessage;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// How long a notice stays fully visible.
pub const DISPLAY_MS: u64 = 3000;
/// How long a notice lingers in its faded state before removal.
pub const FADE_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub tags: String,
    posted: Instant,
}

/// Holds server-pushed notices and ages them out: a notice displays for
/// three seconds, fades for half a second, then disappears.
#[derive(Debug, Default)]
pub struct NoticeCenter {
    notices: Vec<Notice>,
}

impl NoticeCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ServerMessage) {
        self.push_at(message, Instant::now());
    }

    pub fn push_at(&mut self, message: ServerMessage, now: Instant) {
        self.notices.push(Notice {
            message: message.message,
            tags: message.extra_tags,
            posted: now,
        });
    }

    /// Drop notices whose display and fade windows have both elapsed.
    pub fn tick(&mut self, now: Instant) {
        let lifetime = Duration::from_millis(DISPLAY_MS + FADE_MS);
        self.notices
            .retain(|n| now.duration_since(n.posted) < lifetime);
    }

    /// A notice past its display window renders dimmed until removal.
    pub fn is_fading(&self, notice: &Notice, now: Instant) -> bool {
        now.duration_since(notice.posted) >= Duration::from_millis(DISPLAY_MS)
    }

    pub fn has_notices(&self) -> bool {
        !self.notices.is_empty()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Render notices stacked in the top-right corner.
    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let now = Instant::now();
        let width = 36u16.min(area.width);
        for (i, notice) in self.notices.iter().enumerate() {
            let y = area.y + (i as u16) * 3;
            if y + 3 > area.y + area.height {
                break;
            }
            let rect = Rect {
                x: area.x + area.width - width,
                y,
                width,
                height: 3,
            };
            let style = if self.is_fading(notice, now) {
                Style::default().fg(Color::DarkGray)
            } else {
                tag_style(&notice.tags)
            };
            frame.render_widget(Clear, rect);
            let block = Block::default().borders(Borders::ALL).border_style(style);
            frame.render_widget(
                Paragraph::new(notice.message.as_str()).style(style).block(block),
                rect,
            );
        }
    }
}

fn tag_style(tags: &str) -> Style {
    match tags {
        "success" => Style::default().fg(Color::Green),
        "warning" => Style::default().fg(Color::Yellow),
        "danger" => Style::default().fg(Color::Red),
        _ => Style::default().fg(Color::Cyan),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice_center_with(message: &str, now: Instant) -> NoticeCenter {
        let mut center = NoticeCenter::new();
        center.push_at(ServerMessage::new(message, "info"), now);
        center
    }

    #[test]
    fn notice_survives_its_display_window() {
        let start = Instant::now();
        let mut center = notice_center_with("saved", start);

        center.tick(start + Duration::from_millis(DISPLAY_MS - 1));
        assert!(center.has_notices());
        assert!(!center.is_fading(&center.notices()[0], start));
    }

    #[test]
    fn notice_fades_after_display_window() {
        let start = Instant::now();
        let mut center = notice_center_with("saved", start);

        let during_fade = start + Duration::from_millis(DISPLAY_MS + 100);
        center.tick(during_fade);
        assert!(center.has_notices());
        assert!(center.is_fading(&center.notices()[0], during_fade));
    }

    #[test]
    fn notice_is_removed_after_fade() {
        let start = Instant::now();
        let mut center = notice_center_with("saved", start);

        center.tick(start + Duration::from_millis(DISPLAY_MS + FADE_MS));
        assert!(!center.has_notices());
    }

    #[test]
    fn notices_age_independently() {
        let start = Instant::now();
        let mut center = notice_center_with("first", start);
        center.push_at(
            ServerMessage::new("second", "success"),
            start + Duration::from_millis(2000),
        );

        center.tick(start + Duration::from_millis(DISPLAY_MS + FADE_MS));
        assert_eq!(center.notices().len(), 1);
        assert_eq!(center.notices()[0].message, "second");
    }
}
