//! Output mode and terminal capabilities.

use std::io::IsTerminal;

const FALLBACK_WIDTH: usize = 80;

/// How results are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// A single JSON document, nothing else
    Json,
    /// `key=value` lines and tab-separated rows for scripts
    #[default]
    Plain,
    /// Colors, badges and tables for a terminal
    Pretty,
}

impl OutputMode {
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }

    pub fn is_pretty(&self) -> bool {
        matches!(self, Self::Pretty)
    }
}

/// What the process can learn about its terminal.
#[derive(Debug, Clone, Copy)]
struct Terminal {
    stdout_tty: bool,
    dumb: bool,
    no_color_env: bool,
    columns: Option<usize>,
}

impl Terminal {
    fn detect() -> Self {
        Self {
            stdout_tty: std::io::stdout().is_terminal(),
            dumb: std::env::var("TERM").is_ok_and(|term| term == "dumb"),
            no_color_env: std::env::var_os("NO_COLOR").is_some(),
            columns: columns_from_env().or_else(columns_from_tty),
        }
    }
}

/// Rendering decisions shared by every command.
#[derive(Debug, Clone)]
pub struct UiContext {
    pub is_tty: bool,
    pub color: bool,
    pub unicode: bool,
    pub width: usize,
    pub mode: OutputMode,
}

impl UiContext {
    /// Detect the terminal and apply `--json`, `--no-color` and `--ascii`.
    pub fn from_env(json: bool, no_color: bool, ascii: bool) -> Self {
        Self::resolve(Terminal::detect(), json, no_color, ascii)
    }

    fn resolve(term: Terminal, json: bool, no_color: bool, ascii: bool) -> Self {
        let decorated = term.stdout_tty && !term.dumb;
        let mode = match (json, decorated) {
            (true, _) => OutputMode::Json,
            (false, true) => OutputMode::Pretty,
            (false, false) => OutputMode::Plain,
        };
        Self {
            is_tty: term.stdout_tty,
            color: decorated && !no_color && !term.no_color_env,
            unicode: !ascii,
            width: term.columns.unwrap_or(FALLBACK_WIDTH),
            mode,
        }
    }

    /// Spinners only make sense on a decorated terminal.
    pub fn allows_animation(&self) -> bool {
        self.is_tty && self.mode.is_pretty()
    }
}

fn columns_from_env() -> Option<usize> {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|cols| cols.parse::<usize>().ok())
        .filter(|&width| width > 0)
}

#[cfg(unix)]
fn columns_from_tty() -> Option<usize> {
    use std::mem::MaybeUninit;

    let mut size = MaybeUninit::<libc::winsize>::uninit();
    // SAFETY: TIOCGWINSZ fills the winsize it is pointed at when it returns 0
    let rc = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, size.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: the ioctl above succeeded
    let size = unsafe { size.assume_init() };
    (size.ws_col > 0).then_some(usize::from(size.ws_col))
}

#[cfg(not(unix))]
fn columns_from_tty() -> Option<usize> {
    None
}
