//! Terminal user interface
//!
//! [`render`] draws the scanner screen from a session snapshot; [`run`] owns the
//! terminal and feeds key presses and session events into the controller.

mod render;
mod run;

pub use render::render;
pub use run::{UiAction, key_action, run};
