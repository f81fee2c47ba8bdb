pub mod cell;
pub mod change_request;
pub mod document;
pub mod error;
pub mod message;
pub mod popover;

pub use cell::Cell;
pub use change_request::{ChangeRequest, RequestStatus};
pub use document::{Document, DocumentStatus};
pub use error::CellflowError;
pub use message::ServerMessage;
pub use popover::PopoverPanel;
