//! Display sink for everything the wizard shows the user.
//!
//! Components receive a `&mut dyn Console` instead of printing directly, so
//! tests can capture output and the poll loop can report progress without
//! knowing about the terminal.
use crate::output::format_size;
use crate::result::{AudioResult, MetaValue};
use crossterm::cursor::MoveToColumn;
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{Clear, ClearType};
use crossterm::QueueableCommand;
use std::io::{self, Write};
use std::time::Duration;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const SPINNER_FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Simple text table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(title: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            title: title.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

pub trait Console {
    fn banner(&mut self, base_url: &str, connected: bool);
    fn heading(&mut self, text: &str);
    fn line(&mut self, text: &str);
    /// De-emphasized hint text.
    fn note(&mut self, text: &str);
    fn warn(&mut self, text: &str);
    fn error(&mut self, title: &str, message: &str);
    fn success(&mut self, message: &str);
    /// Replace the live progress line.
    fn progress(&mut self, message: &str, elapsed: Duration);
    /// Leave the live progress line.
    fn end_progress(&mut self);
    fn table(&mut self, table: &Table);
}

/// Render a table as aligned plain text.
pub fn render_table(table: &Table) -> String {
    let columns = table
        .rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(table.headers.len()))
        .max()
        .unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in std::iter::once(&table.headers).chain(table.rows.iter()) {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }
    let render_row = |row: &Vec<String>| {
        let cells: Vec<String> = (0..columns)
            .map(|idx| {
                let cell = row.get(idx).map(String::as_str).unwrap_or("");
                format!("{cell:<width$}", width = widths[idx])
            })
            .collect();
        cells.join("  ").trim_end().to_string()
    };

    let mut out = String::new();
    if !table.title.is_empty() {
        out.push_str(&table.title);
        out.push('\n');
    }
    if !table.headers.is_empty() {
        out.push_str(&render_row(&table.headers));
        out.push('\n');
        let rule: usize = widths.iter().sum::<usize>() + 2 * columns.saturating_sub(1);
        out.push_str(&"-".repeat(rule));
        out.push('\n');
    }
    for row in &table.rows {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out
}

/// Table of downloaded samples: index, remote file, duration, size.
pub fn results_table(audios: &[AudioResult], output_dir: &str) -> Table {
    let mut table = Table::new(
        format!("Generated Audio ({output_dir})"),
        &["#", "File", "Duration", "Size"],
    );
    for (idx, audio) in audios.iter().enumerate() {
        let duration = match audio.metas.get("duration") {
            Some(value) => match value.as_f64() {
                Some(seconds) => format!("{seconds:.1}s"),
                None => meta_text(value),
            },
            None => "N/A".to_string(),
        };
        let size = match audio.metas.get("size") {
            Some(value) => match value.as_f64() {
                Some(bytes) if bytes >= 0.0 => format_size(bytes as u64),
                _ => meta_text(value),
            },
            None => "N/A".to_string(),
        };
        table.push_row(vec![
            (idx + 1).to_string(),
            audio.file.clone(),
            duration,
            size,
        ]);
    }
    table
}

fn meta_text(value: &MetaValue) -> String {
    match value {
        MetaValue::Null => "N/A".to_string(),
        MetaValue::Bool(flag) => flag.to_string(),
        MetaValue::Int(int) => int.to_string(),
        MetaValue::Float(float) => float.to_string(),
        MetaValue::Text(text) => text.clone(),
        MetaValue::Other(value) => value.to_string(),
    }
}

/// Styled terminal output on stdout.
#[derive(Debug, Default)]
pub struct TerminalConsole {
    frame: usize,
    progress_active: bool,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self::default()
    }

    fn clear_progress(&mut self) {
        if self.progress_active {
            self.progress_active = false;
            let mut out = io::stdout();
            let _ = out.queue(MoveToColumn(0));
            let _ = out.queue(Clear(ClearType::CurrentLine));
            let _ = out.flush();
        }
    }
}

impl Console for TerminalConsole {
    fn banner(&mut self, base_url: &str, connected: bool) {
        self.clear_progress();
        let status = if connected {
            "Connected".green()
        } else {
            "Disconnected".red()
        };
        println!();
        println!("{} v{VERSION}", "AUTO MUSIC GEN".cyan().bold());
        println!("Server: {base_url} [{status}]");
    }

    fn heading(&mut self, text: &str) {
        self.clear_progress();
        println!();
        println!("{}", text.cyan().bold());
    }

    fn line(&mut self, text: &str) {
        self.clear_progress();
        println!("{text}");
    }

    fn note(&mut self, text: &str) {
        self.clear_progress();
        println!("{}", text.dim());
    }

    fn warn(&mut self, text: &str) {
        self.clear_progress();
        println!("{}", text.yellow());
    }

    fn error(&mut self, title: &str, message: &str) {
        self.clear_progress();
        println!("{}", format!("[{title}]").red().bold());
        println!("{}", message.red());
    }

    fn success(&mut self, message: &str) {
        self.clear_progress();
        println!("{}", "[Success]".green().bold());
        println!("{}", message.green());
    }

    fn progress(&mut self, message: &str, elapsed: Duration) {
        let frame = SPINNER_FRAMES[self.frame % SPINNER_FRAMES.len()];
        self.frame = self.frame.wrapping_add(1);
        self.progress_active = true;
        let text = format!(
            "{frame} {}  {}",
            message.cyan(),
            format!("({}s)", elapsed.as_secs()).dim()
        );
        let mut out = io::stdout();
        let _ = out.queue(MoveToColumn(0));
        let _ = out.queue(Clear(ClearType::CurrentLine));
        let _ = out.queue(Print(text));
        let _ = out.flush();
    }

    fn end_progress(&mut self) {
        self.clear_progress();
    }

    fn table(&mut self, table: &Table) {
        self.clear_progress();
        print!("{}", render_table(table));
    }
}

/// Console that records output as plain lines.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct CaptureConsole {
    pub lines: Vec<String>,
    pub progress: Vec<(String, Duration)>,
}

#[cfg(test)]
impl CaptureConsole {
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }
}

#[cfg(test)]
impl Console for CaptureConsole {
    fn banner(&mut self, base_url: &str, connected: bool) {
        self.lines
            .push(format!("banner: {base_url} connected={connected}"));
    }

    fn heading(&mut self, text: &str) {
        self.lines.push(format!("heading: {text}"));
    }

    fn line(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }

    fn note(&mut self, text: &str) {
        self.lines.push(format!("note: {text}"));
    }

    fn warn(&mut self, text: &str) {
        self.lines.push(format!("warn: {text}"));
    }

    fn error(&mut self, title: &str, message: &str) {
        self.lines.push(format!("error: {title}: {message}"));
    }

    fn success(&mut self, message: &str) {
        self.lines.push(format!("success: {message}"));
    }

    fn progress(&mut self, message: &str, elapsed: Duration) {
        self.progress.push((message.to_string(), elapsed));
    }

    fn end_progress(&mut self) {}

    fn table(&mut self, table: &Table) {
        self.lines.extend(render_table(table).lines().map(str::to_string));
    }
}

#[cfg(test)]
#[path = "display_tests.rs"]
mod tests;
