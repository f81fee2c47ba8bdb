pub mod app;
pub mod components;
pub mod notify;
pub mod session;
