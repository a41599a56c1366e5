//! TUI debugger for the LS-8 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register and PC/SP visualization
//! - Hex memory view
//! - Step/run/breakpoint controls
//! - Disassembly and PRN output views

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
