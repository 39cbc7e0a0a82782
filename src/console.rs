//! The console and debug facade (§4.7): a thin, capability-resolvable
//! surface applications print through. Specified only at its boundary.
//!
//! Grounded directly on `acb/console.py` (width precedence: `CONSOLE_WIDTH`
//! env var, then a setting, then terminal auto-detection; plain-output
//! detection via `NO_COLOR`/`CI`/non-tty stdout) and `acb/debug.py`
//! (production/deployed builds route through the structured logger,
//! everything else prints straight to stderr) — the teacher crate has no
//! console abstraction of its own, so this module borrows only the
//! `tracing`-facade idiom from it, not its shape.

use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::bootstrap::{env_truthy, DebugInfo};
use crate::settings::Settings;

/// `settings/console.yaml`: just the optional width override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default)]
    pub width: Option<u16>,
}

impl Settings for ConsoleSettings {
    fn category() -> &'static str {
        "console"
    }
}

fn detect_plain() -> bool {
    if env_truthy("NO_COLOR") {
        return true;
    }
    if env_truthy("CI") {
        return true;
    }
    !std::io::stdout().is_terminal()
}

fn resolve_width(setting_width: Option<u16>) -> Option<u16> {
    if let Ok(value) = std::env::var("CONSOLE_WIDTH") {
        if let Ok(width) = value.parse::<u16>() {
            return Some(width);
        }
    }
    if setting_width.is_some() {
        return setting_width;
    }
    terminal_size::terminal_size().map(|(terminal_size::Width(w), _)| w)
}

/// Strip ANSI escape sequences so plain-mode output never leaks control
/// codes into redirected/CI logs.
fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Process-wide console: width + plain-mode resolved once at construction.
pub struct Console {
    plain: bool,
    width: Option<u16>,
}

impl Console {
    pub fn new(settings: &ConsoleSettings) -> Self {
        Self {
            plain: detect_plain(),
            width: resolve_width(settings.width),
        }
    }

    pub fn is_plain(&self) -> bool {
        self.plain
    }

    pub fn width(&self) -> Option<u16> {
        self.width
    }

    /// Render `text` for output, stripping ANSI codes in plain mode.
    pub fn render(&self, text: &str) -> String {
        if self.plain {
            strip_ansi(text)
        } else {
            text.to_string()
        }
    }

    pub fn print(&self, text: &str) {
        println!("{}", self.render(text));
    }
}

/// Debug print helper: routes through `tracing` in deployed/production
/// builds (so output lands in structured logs), straight to stderr
/// otherwise.
pub struct Debug {
    structured: bool,
}

impl Debug {
    pub fn new(deployed: bool, debug_info: &DebugInfo) -> Self {
        Self {
            structured: deployed || debug_info.production,
        }
    }

    pub fn print(&self, message: &str) {
        if self.structured {
            tracing::debug!(target: "acb::debug", "{message}");
        } else {
            eprintln!("debug: {message}");
        }
    }
}
