use serde::{Deserialize, Serialize};

/// An editable unit of document data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: String,
    pub document_id: String,
    pub row: u32,
    pub column: u32,
    /// A1-style coordinate derived from `row` and `column`.
    pub coordinate: String,
    pub value: String,
}

/// Spreadsheet-style coordinate for a zero-based (row, column) pair:
/// (0, 0) → "A1", (0, 26) → "AA1".
pub fn coordinate(row: u32, column: u32) -> String {
    let mut letters = Vec::new();
    let mut col = column;
    loop {
        letters.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.reverse();
    let mut out = String::from_utf8(letters).unwrap_or_default();
    out.push_str(&(row + 1).to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_letter_coordinates() {
        assert_eq!(coordinate(0, 0), "A1");
        assert_eq!(coordinate(2, 1), "B3");
        assert_eq!(coordinate(9, 25), "Z10");
    }

    #[test]
    fn multi_letter_coordinates() {
        assert_eq!(coordinate(0, 26), "AA1");
        assert_eq!(coordinate(0, 27), "AB1");
        assert_eq!(coordinate(4, 51), "AZ5");
        assert_eq!(coordinate(0, 52), "BA1");
    }
}
