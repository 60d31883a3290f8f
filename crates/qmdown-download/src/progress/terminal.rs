//! Terminal rendering of task events.
//!
//! Presentation only: one `indicatif` bar per running task when stdout is
//! a terminal, otherwise one plain line per lifecycle change.

use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use qmdown_core::download::{ProgressEvent, TaskId};
use qmdown_core::ports::ProgressSinkPort;

const MAX_LABEL: usize = 40;

/// Progress sink that draws to the terminal.
pub struct TerminalProgressSink {
    inner: Mutex<Render>,
}

enum Render {
    Fancy(FancyProgress),
    Plain(PlainProgress),
}

impl TerminalProgressSink {
    /// Pick bars or plain lines depending on whether stdout is a terminal.
    pub fn new() -> Self {
        if io::stdout().is_terminal() {
            Self::fancy(ProgressDrawTarget::stdout())
        } else {
            Self::plain(Box::new(io::stdout()))
        }
    }

    /// Render bars to `target`.
    pub fn fancy(target: ProgressDrawTarget) -> Self {
        Self {
            inner: Mutex::new(Render::Fancy(FancyProgress::new(target))),
        }
    }

    /// Write one line per lifecycle change to `out`.
    pub fn plain(out: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Mutex::new(Render::Plain(PlainProgress {
                out,
                names: HashMap::new(),
            })),
        }
    }

    /// Number of bars currently on screen (always zero in plain mode).
    pub fn active_bars(&self) -> usize {
        self.inner.lock().map_or(0, |render| match &*render {
            Render::Fancy(fancy) => fancy.bars.len(),
            Render::Plain(_) => 0,
        })
    }
}

impl Default for TerminalProgressSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSinkPort for TerminalProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        let Ok(mut render) = self.inner.lock() else {
            return;
        };
        match &mut *render {
            Render::Fancy(fancy) => fancy.handle(event),
            Render::Plain(plain) => plain.handle(event),
        }
    }
}

fn format_label(raw: &str) -> String {
    if raw.chars().count() <= MAX_LABEL {
        return raw.to_string();
    }
    let mut buf: String = raw.chars().take(MAX_LABEL - 1).collect();
    buf.push('…');
    buf
}

// ============================================================================
// Fancy Terminal Progress (indicatif)
// ============================================================================

struct FancyProgress {
    multi: MultiProgress,
    names: HashMap<TaskId, String>,
    bars: HashMap<TaskId, ProgressBar>,
}

impl FancyProgress {
    fn new(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            names: HashMap::new(),
            bars: HashMap::new(),
        }
    }

    fn name(&self, id: TaskId) -> String {
        self.names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    fn bar(&mut self, id: TaskId) -> &ProgressBar {
        let label = format_label(&self.name(id));
        let multi = &self.multi;
        self.bars.entry(id).or_insert_with(|| {
            let bar = multi.add(ProgressBar::new_spinner());
            bar.set_style(spinner_style());
            bar.set_message(label);
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        })
    }

    fn finish(&mut self, id: TaskId, line: String) {
        if let Some(bar) = self.bars.remove(&id) {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        let _ = self.multi.println(line);
        self.names.remove(&id);
    }

    fn handle(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::TaskCreated { id, name, .. } => {
                self.names.insert(id, name);
            }
            ProgressEvent::TaskStarted { id, attempt } => {
                let label = format_label(&self.name(id));
                let bar = self.bar(id);
                if attempt > 1 {
                    bar.set_message(format!("{label} (attempt {attempt})"));
                }
                bar.set_position(0);
            }
            ProgressEvent::TaskAdvanced {
                id,
                transferred,
                total,
            } => {
                let bar = self.bar(id);
                if let Some(total) = total {
                    if bar.length() != Some(total) {
                        bar.set_style(bar_style());
                        bar.set_length(total);
                    }
                }
                bar.set_position(transferred);
            }
            ProgressEvent::TaskRetrying {
                id,
                attempt,
                max_attempts,
                error,
            } => {
                let label = format_label(&self.name(id));
                self.bar(id)
                    .set_message(format!("{label} retrying {attempt}/{max_attempts}: {error}"));
            }
            ProgressEvent::TaskSkipped { id } => {
                let line = format!("- {} (already exists)", self.name(id));
                self.finish(id, line);
            }
            ProgressEvent::TaskCompleted { id, bytes } => {
                let line = format!("✓ {} ({})", self.name(id), HumanBytes(bytes));
                self.finish(id, line);
            }
            ProgressEvent::TaskFailed { id, attempts, error } => {
                let line = format!("✗ {} after {attempts} attempt(s): {error}", self.name(id));
                self.finish(id, line);
            }
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{msg:40} {bar:28.cyan/blue} {bytes:>9} / {total_bytes:>9} @ {binary_bytes_per_sec} ETA {eta}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

// ============================================================================
// Plain Progress (non-terminal)
// ============================================================================

struct PlainProgress {
    out: Box<dyn Write + Send>,
    names: HashMap<TaskId, String>,
}

impl PlainProgress {
    fn name(&self, id: TaskId) -> String {
        self.names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    fn handle(&mut self, event: ProgressEvent) {
        let line = match event {
            ProgressEvent::TaskCreated { id, name, .. } => {
                self.names.insert(id, name);
                return;
            }
            ProgressEvent::TaskAdvanced { .. } => return,
            ProgressEvent::TaskStarted { id, attempt } => {
                format!("downloading {} (attempt {attempt})", self.name(id))
            }
            ProgressEvent::TaskRetrying {
                id,
                attempt,
                max_attempts,
                error,
            } => format!(
                "retrying {} after attempt {attempt}/{max_attempts}: {error}",
                self.name(id)
            ),
            ProgressEvent::TaskSkipped { id } => {
                let line = format!("skipped {} (already exists)", self.name(id));
                self.names.remove(&id);
                line
            }
            ProgressEvent::TaskCompleted { id, bytes } => {
                let line = format!("completed {} ({})", self.name(id), HumanBytes(bytes));
                self.names.remove(&id);
                line
            }
            ProgressEvent::TaskFailed { id, attempts, error } => {
                let line = format!(
                    "failed {} after {attempts} attempt(s): {error}",
                    self.name(id)
                );
                self.names.remove(&id);
                line
            }
        };
        let _ = writeln!(self.out, "{line}");
        let _ = self.out.flush();
    }
}
