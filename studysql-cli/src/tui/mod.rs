//! Study SQL terminal interface
//!
//! Three screens (connect, documents, query) plus modal dialogs for
//! creating, editing and deleting documents.

pub mod app;
pub mod event;
pub mod form;
pub mod terminal;
pub mod ui;
mod workflows;

pub use app::App;
pub use terminal::run;
