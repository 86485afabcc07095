use serde::{Deserialize, Serialize};
use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex};
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Severity tag of a diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Progress or status line.
    Normal,
    /// Something the operator should look at.
    Warning,
    /// Error line.
    Error,
}

impl Severity {
    /// Decode the severity passed across the guest boundary.
    ///
    /// Unknown values render as [`Severity::Normal`].
    pub fn from_raw(kind: i32) -> Self {
        match kind {
            1 => Severity::Warning,
            2 => Severity::Error,
            _ => Severity::Normal,
        }
    }
}

/// Where diagnostic lines end up.
///
/// Surfaces are append-only: lines must appear in the order they are
/// handed over, without batching or reordering.
pub trait LogSurface {
    /// Remove output left over from a previous run.
    fn clear(&mut self);

    /// Render one key/value line.
    fn line(&mut self, severity: Severity, key: &str, value: &str);

    /// Render the banner for the first error of a run.
    fn banner(&mut self, message: &str);
}

/// Renders severity-tagged lines and chains errors under a single banner.
pub struct DiagnosticChannel {
    surface: Box<dyn LogSurface + Send>,
    error_count: u32,
}

impl DiagnosticChannel {
    /// Create a channel rendering to `surface`.
    pub fn new(surface: Box<dyn LogSurface + Send>) -> Self {
        Self {
            surface,
            error_count: 0,
        }
    }

    /// Number of errors reported so far in this run.
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Clear the surface before a run.
    pub fn clear(&mut self) {
        self.surface.clear();
    }

    /// Render one line. Used for host status lines and guest lines alike.
    pub fn render_line(&mut self, key: &str, value: &str, severity: Severity) {
        log::debug!("{:>12} {}", key, value);
        self.surface.line(severity, key, value);
    }

    /// Guest-originated key/value line.
    pub fn report_key_value(&mut self, severity: Severity, key: &str, value: &str) {
        self.render_line(key, value, severity);
    }

    /// Guest-originated error. The first one becomes the banner, later ones
    /// are chained beneath it.
    pub fn report_error(&mut self, message: &str) {
        if self.error_count == 0 {
            log::debug!("{:>12} {}", "Error", message);
            self.surface.banner(message);
        } else {
            self.render_line("Caused by", message, Severity::Error);
        }
        self.error_count += 1;
    }
}

impl std::fmt::Debug for DiagnosticChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticChannel")
            .field("error_count", &self.error_count)
            .finish_non_exhaustive()
    }
}

/// When the terminal surface emits colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Colour when stderr is a terminal and the environment allows it.
    #[default]
    Auto,
    /// Always colour.
    Always,
    /// Never colour.
    Never,
}

impl ColorMode {
    /// The `termcolor` choice for stderr.
    pub fn choice(self) -> ColorChoice {
        match self {
            ColorMode::Always => ColorChoice::Always,
            ColorMode::Never => ColorChoice::Never,
            ColorMode::Auto if std::io::stderr().is_terminal() => ColorChoice::Auto,
            ColorMode::Auto => ColorChoice::Never,
        }
    }
}

/// Renders diagnostics to stderr with right-aligned keys.
pub struct TerminalSurface {
    key_width: usize,
    writer: BufferWriter,
}

impl TerminalSurface {
    /// Create a terminal surface.
    pub fn new(key_width: usize, color: ColorMode) -> Self {
        Self {
            key_width,
            writer: BufferWriter::stderr(color.choice()),
        }
    }

    fn write_line<W: WriteColor>(
        &self,
        out: &mut W,
        severity: Severity,
        key: &str,
        value: &str,
    ) -> io::Result<()> {
        let color = match severity {
            Severity::Normal => Color::Green,
            Severity::Warning => Color::Yellow,
            Severity::Error => Color::Red,
        };
        out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(out, "{:>width$}", key, width = self.key_width)?;
        out.reset()?;
        writeln!(out, " {}", value)
    }

    fn write_banner<W: WriteColor>(&self, out: &mut W, message: &str) -> io::Result<()> {
        writeln!(out)?;
        out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        write!(out, "Error")?;
        out.reset()?;
        out.set_color(ColorSpec::new().set_bold(true))?;
        writeln!(out, ": {}", message)?;
        out.reset()
    }
}

impl std::fmt::Debug for TerminalSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSurface")
            .field("key_width", &self.key_width)
            .finish_non_exhaustive()
    }
}

// A terminal cannot take back printed lines.
impl LogSurface for TerminalSurface {
    fn clear(&mut self) {}

    fn line(&mut self, severity: Severity, key: &str, value: &str) {
        let mut buffer = self.writer.buffer();
        self.write_line(&mut buffer, severity, key, value).ok();
        self.writer.print(&buffer).ok();
    }

    fn banner(&mut self, message: &str) {
        let mut buffer = self.writer.buffer();
        self.write_banner(&mut buffer, message).ok();
        self.writer.print(&buffer).ok();
    }
}

/// Discards every line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSurface;

impl LogSurface for NullSurface {
    fn clear(&mut self) {}
    fn line(&mut self, _severity: Severity, _key: &str, _value: &str) {}
    fn banner(&mut self, _message: &str) {}
}

/// Kind of a recorded line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// First-error banner.
    Banner,
    /// Ordinary key/value line.
    Entry(Severity),
}

/// A line captured by [`MemorySurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    /// Banner or entry.
    pub kind: LineKind,
    /// Key column (`"Error"` for the banner).
    pub key: String,
    /// Value column.
    pub value: String,
}

/// Records lines in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    lines: Arc<Mutex<Vec<RenderedLine>>>,
}

impl MemorySurface {
    /// Create an empty surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded lines, in render order.
    pub fn lines(&self) -> Vec<RenderedLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn push(&self, line: RenderedLine) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

impl LogSurface for MemorySurface {
    fn clear(&mut self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }

    fn line(&mut self, severity: Severity, key: &str, value: &str) {
        self.push(RenderedLine {
            kind: LineKind::Entry(severity),
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    fn banner(&mut self, message: &str) {
        self.push(RenderedLine {
            kind: LineKind::Banner,
            key: "Error".to_string(),
            value: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termcolor::Buffer;

    #[test]
    fn test_first_error_is_banner_rest_are_chained() {
        let surface = MemorySurface::new();
        let mut channel = DiagnosticChannel::new(Box::new(surface.clone()));

        channel.report_error("Couldn't apply the patch");
        channel.report_error("Couldn't parse the DOL");
        channel.report_error("unexpected end of file");

        let lines = surface.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].kind, LineKind::Banner);
        assert_eq!(lines[0].value, "Couldn't apply the patch");
        for line in &lines[1..] {
            assert_eq!(line.kind, LineKind::Entry(Severity::Error));
            assert_eq!(line.key, "Caused by");
        }
        assert_eq!(channel.error_count(), 3);
    }

    #[test]
    fn test_lines_render_in_order() {
        let surface = MemorySurface::new();
        let mut channel = DiagnosticChannel::new(Box::new(surface.clone()));

        channel.render_line("Opening", "Patch", Severity::Normal);
        channel.report_key_value(Severity::Warning, "Skipping", "banner.bin");
        channel.report_key_value(Severity::Normal, "Linking", "");

        let keys: Vec<_> = surface.lines().into_iter().map(|l| l.key).collect();
        assert_eq!(keys, ["Opening", "Skipping", "Linking"]);
    }

    #[test]
    fn test_clear_empties_memory_surface() {
        let surface = MemorySurface::new();
        let mut channel = DiagnosticChannel::new(Box::new(surface.clone()));
        channel.render_line("Opening", "Patch", Severity::Normal);
        channel.clear();
        assert!(surface.lines().is_empty());
    }

    #[test]
    fn test_severity_from_raw() {
        assert_eq!(Severity::from_raw(0), Severity::Normal);
        assert_eq!(Severity::from_raw(1), Severity::Warning);
        assert_eq!(Severity::from_raw(2), Severity::Error);
        assert_eq!(Severity::from_raw(9), Severity::Normal);
    }

    fn plain(render: impl FnOnce(&TerminalSurface, &mut Buffer) -> io::Result<()>) -> String {
        let surface = TerminalSurface::new(12, ColorMode::Never);
        let mut buffer = Buffer::no_color();
        render(&surface, &mut buffer).unwrap();
        String::from_utf8(buffer.into_inner()).unwrap()
    }

    #[test]
    fn test_terminal_key_is_right_aligned() {
        let text = plain(|s, b| s.write_line(b, Severity::Error, "Caused by", "bad header"));
        assert_eq!(text, "   Caused by bad header\n");
    }

    #[test]
    fn test_terminal_banner_is_unpadded() {
        let text = plain(|s, b| s.write_banner(b, "Couldn't apply the patch"));
        assert_eq!(text, "\nError: Couldn't apply the patch\n");
    }

    #[test]
    fn test_terminal_colors_key_by_severity() {
        let surface = TerminalSurface::new(12, ColorMode::Never);
        let mut buffer = Buffer::ansi();
        surface
            .write_line(&mut buffer, Severity::Warning, "Skipping", "banner.bin")
            .unwrap();
        let text = String::from_utf8(buffer.into_inner()).unwrap();
        // Bold yellow key, then reset before the value.
        assert!(text.contains("\x1b[1m"));
        assert!(text.contains("\x1b[33m    Skipping"));
        assert!(text.ends_with("\x1b[0m banner.bin\n"));
    }
}
