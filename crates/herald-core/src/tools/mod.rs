// ABOUTME: Local function tools available to catalog agents.
// ABOUTME: Each submodule implements the Tool trait for one capability.

pub mod current_time;

pub use current_time::CurrentTimeTool;
