/// Tracks which cell, if any, has an open edit panel.
///
/// At most one cell is active at a time; opening a session for a new
/// cell replaces the previous one, and activating the active cell again
/// is how callers implement toggle-to-close.
#[derive(Debug, Default)]
pub struct Session {
    active: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, cell_id: &str) {
        self.active = Some(cell_id.to_string());
    }

    pub fn close(&mut self) {
        self.active = None;
    }

    pub fn is_active(&self, cell_id: &str) -> bool {
        self.active.as_deref() == Some(cell_id)
    }

    pub fn active_cell(&self) -> Option<&str> {
        self.active.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_no_active_cell() {
        let session = Session::new();
        assert!(session.active_cell().is_none());
        assert!(!session.is_active("c1"));
    }

    #[test]
    fn opening_replaces_the_active_cell() {
        let mut session = Session::new();
        session.open("c1");
        assert!(session.is_active("c1"));

        session.open("c2");
        assert!(session.is_active("c2"));
        assert!(!session.is_active("c1"));
        assert_eq!(session.active_cell(), Some("c2"));
    }

    #[test]
    fn close_clears_the_session() {
        let mut session = Session::new();
        session.open("c1");
        session.close();
        assert!(session.active_cell().is_none());
    }
}
