use std::error::Error as _;

use glam::{Vec2, Vec4};

use crate::assets::FontHandle;
use crate::error::HostError;
use crate::surface::{SpriteBatch, SurfaceHandle, BLACK, WHITE};

/// The diagnostic font is fixed-cell and cannot soft-wrap, so formatted
/// error text is hard-chunked to this many characters per line.
pub const DIAG_WRAP_COLUMNS: usize = 100;
pub const DIAG_BACKGROUND: Vec4 = BLACK;
pub const DIAG_TEXT_COLOR: Vec4 = WHITE;

/// Captured-failure state. A fault suspends script dispatch until the next
/// successful reload; the render path reads it to choose between script
/// drawing and the diagnostic screen.
#[derive(Debug, Default)]
pub struct FaultState {
    error: Option<HostError>,
    shown: bool,
    reloading: bool,
}

impl FaultState {
    pub fn record(&mut self, error: HostError) {
        self.error = Some(error);
        self.shown = false;
    }

    pub fn clear(&mut self) {
        self.error = None;
        self.shown = false;
    }

    pub fn is_faulted(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&HostError> {
        self.error.as_ref()
    }

    /// True exactly once per recorded fault; drives the log-once policy.
    pub fn take_first_show(&mut self) -> bool {
        !std::mem::replace(&mut self.shown, true)
    }

    /// Marks a reload in flight. Returns false if one already is, which
    /// rejects re-entrant reload attempts as a no-op.
    pub fn begin_reload(&mut self) -> bool {
        !std::mem::replace(&mut self.reloading, true)
    }

    pub fn end_reload(&mut self) {
        self.reloading = false;
    }

    pub fn reloading(&self) -> bool {
        self.reloading
    }
}

/// Formats a fault for the diagnostic screen, surfacing the first wrapped
/// cause on its own line when there is one.
pub fn format_error(error: &HostError) -> String {
    match error.source() {
        Some(source) => format!("{error}\nInnerException:{source}"),
        None => error.to_string(),
    }
}

/// Splits `text` into fixed-width buckets by character index, joined with
/// newlines. Characters keep their order; nothing is inserted or dropped.
pub fn wrap_columns(text: &str, columns: usize) -> String {
    if columns == 0 {
        return text.to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(columns)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Draws the diagnostic screen for `error`: solid background, wrapped error
/// text at the origin. Safe to call every frame while faulted. Without a
/// fallback font the clear still happens and the text is skipped.
pub fn draw_diagnostics(
    surface: &SurfaceHandle,
    batch: &SpriteBatch,
    font: Option<&FontHandle>,
    error: &HostError,
) {
    surface.clear(DIAG_BACKGROUND);
    if let Some(font) = font {
        let text = wrap_columns(&format_error(error), DIAG_WRAP_COLUMNS);
        batch.draw_text(font.clone(), &text, Vec2::ZERO, DIAG_TEXT_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetError;
    use std::path::PathBuf;

    fn runtime_error(message: &str) -> HostError {
        HostError::ScriptRuntime { hook: "Update", message: message.to_string() }
    }

    #[test]
    fn wrap_produces_ceil_div_lines_and_reassembles() {
        for len in [1usize, 99, 100, 101, 250, 300] {
            let text: String = "x".repeat(len);
            let wrapped = wrap_columns(&text, DIAG_WRAP_COLUMNS);
            let lines: Vec<&str> = wrapped.split('\n').collect();
            assert_eq!(lines.len(), len.div_ceil(DIAG_WRAP_COLUMNS), "len {len}");
            assert!(lines.iter().all(|line| line.chars().count() <= DIAG_WRAP_COLUMNS));
            assert_eq!(lines.concat(), text, "len {len}");
        }
    }

    #[test]
    fn wrap_counts_characters_not_bytes() {
        let text: String = "é".repeat(150);
        let wrapped = wrap_columns(&text, DIAG_WRAP_COLUMNS);
        let lines: Vec<&str> = wrapped.split('\n').collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].chars().count(), 100);
        assert_eq!(lines[1].chars().count(), 50);
    }

    #[test]
    fn format_appends_inner_cause_when_present() {
        let plain = runtime_error("boom");
        assert!(!format_error(&plain).contains("InnerException:"));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked");
        let chained = HostError::Asset(AssetError::Io {
            kind: "font",
            name: "errorfont".to_string(),
            path: PathBuf::from("assets/fonts/errorfont.json"),
            source: io,
        });
        let formatted = format_error(&chained);
        let (summary, inner) = formatted.split_once("\nInnerException:").expect("inner clause");
        assert!(summary.contains("errorfont"));
        assert!(inner.contains("locked"));
    }

    #[test]
    fn fault_logs_once_until_the_next_record() {
        let mut fault = FaultState::default();
        fault.record(runtime_error("boom"));
        assert!(fault.take_first_show());
        assert!(!fault.take_first_show());
        assert!(!fault.take_first_show());
        fault.record(runtime_error("boom again"));
        assert!(fault.take_first_show(), "a new fault logs again");
    }

    #[test]
    fn reload_guard_rejects_reentry() {
        let mut fault = FaultState::default();
        assert!(fault.begin_reload());
        assert!(!fault.begin_reload(), "nested reload must be refused");
        fault.end_reload();
        assert!(fault.begin_reload());
    }
}
