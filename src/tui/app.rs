//! Debugger application state and logic.

use crate::Cpu;
use crate::asm::disasm::{disassemble_at, format_instruction, listing};
use crate::cpu::memory::MEMORY_SIZE;
use std::collections::HashSet;

/// Bytes shown per row of the memory view.
pub const MEMORY_ROW_WIDTH: usize = 8;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// The loaded program, reloaded on reset.
    pub program: Vec<u8>,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<u16>,
    /// Everything PRN has printed since the last reset.
    pub output: Vec<u8>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset, in rows.
    pub mem_scroll: usize,
    /// Set when resuming, so the breakpoint under PC is stepped over once.
    leaving_breakpoint: bool,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Vec<u8>) -> Self {
        let mut app = Self {
            cpu: Cpu::new(),
            program,
            breakpoints: HashSet::new(),
            output: Vec::new(),
            running: false,
            should_quit: false,
            status: String::new(),
            mem_scroll: 0,
            leaving_breakpoint: false,
        };
        app.load();
        app.status = "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into();
        app
    }

    fn load(&mut self) {
        self.cpu = Cpu::new();
        self.output.clear();
        if let Err(e) = self.cpu.load_program(&self.program) {
            self.status = format!("Load error: {}", e);
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU halted: {:?}", self.cpu.state);
            self.running = false;
            return;
        }

        let pc = self.cpu.regs.pc;
        match self.cpu.step() {
            Ok(instr) => {
                self.output.extend(self.cpu.take_output());
                self.status = format!("PC={:02X}: {}", pc, format_instruction(&instr));
            }
            Err(e) => {
                self.status = format!("Error at PC={:02X}: {}", pc, e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.leaving_breakpoint = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.cpu.is_running() {
            self.running = false;
            self.status = format!("Halted after {} cycles", self.cpu.cycles);
            return;
        }

        let pc = self.cpu.regs.pc;
        let resuming = std::mem::take(&mut self.leaving_breakpoint);
        if self.breakpoints.contains(&pc) && !resuming {
            self.running = false;
            self.status = format!("Breakpoint at PC={:02X}", pc);
            return;
        }

        self.step();
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.regs.pc;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={:02X}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={:02X}", pc);
        }
    }

    /// Reset CPU to initial state.
    pub fn reset(&mut self) {
        self.running = false;
        self.status = "Reset. Ready.".into();
        self.load();
    }

    /// Scroll the memory view by `rows` (negative scrolls up).
    pub fn scroll_memory(&mut self, rows: isize) {
        let max = MEMORY_SIZE / MEMORY_ROW_WIDTH - 1;
        self.mem_scroll = self.mem_scroll.saturating_add_signed(rows).min(max);
    }

    /// Get disassembly around current PC: `(address, text, is_current)`.
    ///
    /// Instructions are decoded from the program start so operand bytes are
    /// never shown as instructions; the current PC is always included.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(usize, String, bool)> {
        let pc = self.cpu.regs.pc as usize;
        let code = self.cpu.mem.as_slice();

        let mut rows: Vec<(usize, String, bool)> = listing(&code[..pc])
            .into_iter()
            .filter(|(addr, width, _)| addr + width <= pc)
            .map(|(addr, _, text)| (addr, text, false))
            .collect();

        let mut addr = pc;
        while addr < MEMORY_SIZE && rows.len() < pc + lines {
            let (text, width) = disassemble_at(code, addr);
            rows.push((addr, text, addr == pc));
            addr += width;
        }

        let current = rows.iter().position(|(_, _, is_current)| *is_current).unwrap_or(0);
        let start = current.saturating_sub(lines / 2);
        rows.into_iter().skip(start).take(lines).collect()
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<u8>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create app
    let mut app = DebuggerApp::new(program);

    // Main loop
    loop {
        // Draw
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        // Handle input
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => app.scroll_memory(-1),
                        KeyCode::Down => app.scroll_memory(1),
                        KeyCode::PageUp => app.scroll_memory(-8),
                        KeyCode::PageDown => app.scroll_memory(8),
                        _ => {}
                    }
                }
            }
        }

        // Tick for continuous running
        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble;

    fn app_for(source: &str) -> DebuggerApp {
        DebuggerApp::new(assemble(source).unwrap())
    }

    #[test]
    fn test_step_collects_output() {
        let mut app = app_for("LDI R0,8\nPRN R0\nHLT\n");

        app.step();
        app.step();

        assert_eq!(app.output, vec![8]);
        assert!(app.status.contains("PRN R0"));
    }

    #[test]
    fn test_run_stops_at_breakpoint() {
        let mut app = app_for("LDI R0,1\nLDI R1,2\nHLT\n");
        app.step();
        app.toggle_breakpoint();
        app.reset();

        app.run();
        for _ in 0..10 {
            app.tick();
        }

        assert!(!app.running);
        assert_eq!(app.cpu.regs.pc, 3);
        assert_eq!(app.status, "Breakpoint at PC=03");

        // Resuming continues past the breakpoint to HLT
        app.run();
        for _ in 0..10 {
            app.tick();
        }
        assert!(app.cpu.is_halted());
    }

    #[test]
    fn test_disassembly_marks_pc() {
        let mut app = app_for("LDI R0,1\nPRN R0\nHLT\n");
        app.step();

        let rows = app.get_disassembly(3);
        assert_eq!(rows[0], (0, "LDI R0,1".to_string(), false));
        assert_eq!(rows[1], (3, "PRN R0".to_string(), true));
        assert_eq!(rows[2], (5, "HLT".to_string(), false));
    }

    #[test]
    fn test_reset_clears_output() {
        let mut app = app_for("LDI R0,8\nPRN R0\nHLT\n");
        app.run();
        for _ in 0..5 {
            app.tick();
        }
        assert_eq!(app.output, vec![8]);

        app.reset();
        assert!(app.output.is_empty());
        assert_eq!(app.cpu.regs.pc, 0);
    }

    #[test]
    fn test_scroll_memory_is_clamped() {
        let mut app = app_for("HLT\n");
        app.scroll_memory(-3);
        assert_eq!(app.mem_scroll, 0);
        app.scroll_memory(1000);
        assert_eq!(app.mem_scroll, MEMORY_SIZE / MEMORY_ROW_WIDTH - 1);
    }
}
