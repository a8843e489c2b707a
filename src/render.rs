// src/render.rs

//! Terminal output: status lines, boxed panels, package tables, spinners
//!
//! Styling is only applied when stdout is a terminal and `NO_COLOR` is not
//! set; otherwise every helper produces plain text.

use crate::packages::PackageInfo;
use anstyle::{AnsiColor, Effects, Style};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::{ASCII_FULL, UTF8_FULL};
use comfy_table::{ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

impl OutputStyle {
    pub fn current() -> Self {
        if std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal() {
            OutputStyle::Rich
        } else {
            OutputStyle::Plain
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Status {
    Success,
    Failure,
    Warning,
    Info,
}

impl Status {
    fn marker(self) -> &'static str {
        match self {
            Status::Success => "✓",
            Status::Failure => "✗",
            Status::Warning => "!",
            Status::Info => "•",
        }
    }

    fn style(self) -> Style {
        let color = match self {
            Status::Success => AnsiColor::Green,
            Status::Failure => AnsiColor::Red,
            Status::Warning => AnsiColor::Yellow,
            Status::Info => AnsiColor::Blue,
        };
        Style::new().fg_color(Some(color.into())).effects(Effects::BOLD)
    }
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

fn name_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::Green.into()))
        .effects(Effects::BOLD)
}

fn version_style() -> Style {
    Style::new().fg_color(Some(AnsiColor::Blue.into()))
}

pub fn render_status_line(output: OutputStyle, status: Status, message: &str) -> String {
    match output {
        OutputStyle::Plain => format!("{} {}", status.marker(), message),
        OutputStyle::Rich => format!(
            "{} {}",
            colorize(status.style(), status.marker()),
            colorize(status.style(), message)
        ),
    }
}

/// `name v1.2.3`, omitting unknown versions
pub fn render_package(output: OutputStyle, name: &str, version: Option<&str>) -> String {
    let version = version.map(|v| format!("v{}", v));
    match (output, version) {
        (OutputStyle::Plain, Some(v)) => format!("{} {}", name, v),
        (OutputStyle::Plain, None) => name.to_string(),
        (OutputStyle::Rich, Some(v)) => {
            format!("{} {}", colorize(name_style(), name), colorize(version_style(), &v))
        }
        (OutputStyle::Rich, None) => colorize(name_style(), name),
    }
}

fn new_table(output: OutputStyle) -> Table {
    let mut table = Table::new();
    match output {
        OutputStyle::Plain => {
            table.load_preset(ASCII_FULL);
        }
        OutputStyle::Rich => {
            table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
        }
    }
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// A rounded panel with an optional title row
pub fn render_panel(output: OutputStyle, title: Option<&str>, lines: &[String]) -> String {
    let mut table = new_table(output);
    if let Some(title) = title {
        table.set_header(vec![title]);
    }
    table.add_row(vec![lines.join("\n")]);
    table.to_string()
}

/// Table of packages with name, version and description columns
pub fn render_package_table(output: OutputStyle, packages: &[PackageInfo]) -> String {
    let mut table = new_table(output);
    table.set_header(vec!["Name", "Version", "Description"]);
    for pkg in packages {
        table.add_row(vec![
            pkg.name.clone(),
            pkg.version.clone(),
            pkg.description.clone().unwrap_or_default(),
        ]);
    }
    table.to_string()
}

/// Printing front-end used by the CLI commands
#[derive(Copy, Clone, Debug)]
pub struct Renderer {
    pub style: OutputStyle,
}

impl Renderer {
    pub fn current() -> Self {
        Self {
            style: OutputStyle::current(),
        }
    }

    pub fn status(&self, status: Status, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    pub fn success(&self, message: &str) {
        self.status(Status::Success, message);
    }

    pub fn failure(&self, message: &str) {
        self.status(Status::Failure, message);
    }

    pub fn warning(&self, message: &str) {
        self.status(Status::Warning, message);
    }

    pub fn info(&self, message: &str) {
        self.status(Status::Info, message);
    }

    pub fn panel(&self, title: Option<&str>, lines: &[String]) {
        println!("{}", render_panel(self.style, title, lines));
    }

    pub fn package_table(&self, packages: &[PackageInfo]) {
        println!("{}", render_package_table(self.style, packages));
    }

    pub fn package(&self, name: &str, version: Option<&str>) -> String {
        render_package(self.style, name, version)
    }

    /// Spinner shown while `message` is in progress; silent in plain mode
    pub fn spinner(&self, message: &str) -> Spinner {
        let bar = (self.style == OutputStyle::Rich).then(|| {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg}") {
                bar.set_style(style);
            }
            bar.set_message(message.to_string());
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        Spinner {
            renderer: *self,
            bar,
        }
    }
}

pub struct Spinner {
    renderer: Renderer,
    bar: Option<ProgressBar>,
}

impl Spinner {
    pub fn set_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    fn clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    pub fn succeed(mut self, message: &str) {
        self.clear();
        self.renderer.success(message);
    }

    pub fn fail(mut self, message: &str) {
        self.clear();
        self.renderer.failure(message);
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_status_line() {
        assert_eq!(
            render_status_line(OutputStyle::Plain, Status::Success, "done"),
            "✓ done"
        );
        let rich = render_status_line(OutputStyle::Rich, Status::Failure, "boom");
        assert!(rich.contains("boom"));
        assert!(rich.contains('\u{1b}'));
    }

    #[test]
    fn test_render_package() {
        assert_eq!(render_package(OutputStyle::Plain, "git", Some("2.44.0")), "git v2.44.0");
        assert_eq!(render_package(OutputStyle::Plain, "git", None), "git");
    }

    #[test]
    fn test_panel_and_table() {
        let panel = render_panel(
            OutputStyle::Plain,
            Some("Project: demo"),
            &["Blob ID: abc".to_string()],
        );
        assert!(panel.contains("Project: demo"));
        assert!(panel.contains("Blob ID: abc"));

        let mut pkg = PackageInfo::new("hello", "2.12.1");
        pkg.description = Some("Greets the world".to_string());
        let table = render_package_table(OutputStyle::Plain, &[pkg]);
        assert!(table.contains("hello"));
        assert!(table.contains("2.12.1"));
        assert!(table.contains("Greets the world"));
    }
}
