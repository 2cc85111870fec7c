// ABOUTME: Console output for the CLI in normal, quiet (CI) and JSON-lines modes.
// ABOUTME: Library code reports through here or tracing, never println! directly.

use std::time::Instant;

use serde::Serialize;

use crate::diagnostics::Diagnostics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Progress lines, then a summary with timing.
    Normal,
    /// Summary, warnings and errors only.
    Quiet,
    /// One JSON object per line on stdout; errors and hints on stderr.
    Json,
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn write(self, line: &str) {
        match self {
            Stream::Stdout => println!("{line}"),
            Stream::Stderr => eprintln!("{line}"),
        }
    }
}

/// One JSON-mode line. `message` and `result` are mutually exclusive in practice.
#[derive(Serialize)]
struct Event<'a, T: Serialize> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

pub struct Output {
    mode: OutputMode,
    started: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            started: None,
        }
    }

    /// Start timing the command; `success` reports the elapsed time.
    pub fn start_timer(&mut self) {
        self.started = Some(Instant::now());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn emit<T: Serialize>(&self, stream: Stream, event: &str, message: Option<&str>, result: Option<&T>) {
        let line = Event {
            event,
            message,
            result,
            duration_secs: self.started.map(|_| self.elapsed_secs()),
        };
        match serde_json::to_string(&line) {
            Ok(json) => stream.write(&json),
            Err(e) => tracing::warn!("could not encode {} event: {}", event, e),
        }
    }

    fn emit_message(&self, stream: Stream, event: &str, message: &str) {
        self.emit::<()>(stream, event, Some(message), None);
    }

    /// Step-by-step progress; normal mode only.
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            Stream::Stdout.write(message);
        }
    }

    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal if self.started.is_some() => {
                Stream::Stdout.write(&format!("{message} ({:.1}s)", self.elapsed_secs()))
            }
            OutputMode::Normal | OutputMode::Quiet => Stream::Stdout.write(message),
            OutputMode::Json => self.emit_message(Stream::Stdout, "success", message),
        }
    }

    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Json => self.emit_message(Stream::Stdout, "warning", message),
            _ => Stream::Stderr.write(&format!("Warning: {message}")),
        }
    }

    /// Print every collected non-fatal warning, in the order they were recorded.
    pub fn warnings(&self, diagnostics: &Diagnostics) {
        for warning in diagnostics.warnings() {
            self.warning(&warning.message);
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Json => self.emit_message(Stream::Stderr, "error", message),
            _ => Stream::Stderr.write(&format!("Error: {message}")),
        }
    }

    /// Remediation printed after an error.
    pub fn hint(&self, hint: &str) {
        match self.mode {
            OutputMode::Json => self.emit_message(Stream::Stderr, "hint", hint),
            _ => Stream::Stderr.write(&format!("Hint: {hint}")),
        }
    }

    /// Structured command result; a `result` event in JSON mode, silent otherwise.
    pub fn result<T: Serialize>(&self, result: &T) {
        if self.mode == OutputMode::Json {
            self.emit(Stream::Stdout, "result", None, Some(result));
        }
    }

    /// Listing output: the text line in normal and quiet mode, a `data` event in JSON.
    pub fn data<T: Serialize>(&self, text: &str, value: &T) {
        match self.mode {
            OutputMode::Json => self.emit(Stream::Stdout, "data", None, Some(value)),
            _ => Stream::Stdout.write(text),
        }
    }
}
