pub mod document_grid;
pub mod popover;
