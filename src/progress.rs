//! Concurrent progress renderer: an inline `ratatui` viewport driven from a
//! second OS thread, reading shared counters for display only.
//!
//! Grounded on `ui::build::BuildUI` in the original kernel build tool, which
//! redraws on receipt of a `BuildEvent`; here the engine's counters are plain
//! atomics the engine thread updates in place, and this thread redraws on a
//! fixed tick instead, so a momentarily stale display is fine and there's no
//! channel or other synchronization with the engine beyond the atomics
//! themselves.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use ratatui::prelude::{Alignment, CrosstermBackend};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Widget};
use ratatui::{Terminal, TerminalOptions, Viewport};

/// Counters the engine thread updates as it runs; the progress thread only
/// ever reads them.
#[derive(Default)]
pub struct ProgressCounters {
    pub dirs_walked: AtomicU64,
    pub files_walked: AtomicU64,
    pub new_links: AtomicU64,
    done: AtomicBool,
}

pub type SharedCounters = Arc<ProgressCounters>;

pub fn new_counters() -> SharedCounters {
    Arc::new(ProgressCounters::default())
}

/// Spawns the inline progress renderer on its own thread. Call
/// [`finish`] once the engine is done to signal the thread to tear
/// itself down and to join it.
pub fn spawn(counters: SharedCounters) -> io::Result<thread::JoinHandle<()>> {
    enable_raw_mode()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::with_options(
        backend,
        TerminalOptions {
            viewport: Viewport::Inline(1),
        },
    )?;

    Ok(thread::spawn(move || {
        loop {
            let dirs = counters.dirs_walked.load(Ordering::Relaxed);
            let files = counters.files_walked.load(Ordering::Relaxed);
            let links = counters.new_links.load(Ordering::Relaxed);
            let done = counters.done.load(Ordering::Relaxed);

            let _ = terminal.draw(|f| {
                let line = Line::from(vec![
                    Span::styled("hardlinkable", Style::default().add_modifier(Modifier::BOLD)),
                    Span::from(format!(
                        "  dirs {dirs}  files {files}  links planned {links}"
                    )),
                ]);
                Paragraph::new(line)
                    .alignment(Alignment::Left)
                    .render(f.size(), f.buffer_mut());
            });

            if done {
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }
        let _ = disable_raw_mode();
    }))
}

/// Signals the progress thread to stop and waits for it to tear down the
/// terminal state.
pub fn finish(counters: &SharedCounters, handle: thread::JoinHandle<()>) {
    counters.done.store(true, Ordering::Relaxed);
    let _ = handle.join();
}
