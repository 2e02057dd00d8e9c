//! Toolkit-independent view models for the chat panes.

pub mod details;
pub mod nav;
pub mod sidebar;
pub mod thread;
