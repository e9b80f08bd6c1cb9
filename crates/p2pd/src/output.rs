//! Output formatting: table, JSON, YAML, plain.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Green for success, red for anything else.
pub fn paint_status(status: &str, success: bool, color: bool) -> String {
    match (color, success) {
        (false, _) => status.to_owned(),
        (true, true) => status.green().to_string(),
        (true, false) => status.red().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render `data` in a structured format, or `None` for table / plain,
/// which every caller lays out itself.
pub fn render_structured<T: serde::Serialize + ?Sized>(
    format: OutputFormat,
    data: &T,
) -> Option<String> {
    match format {
        OutputFormat::Json => Some(render_json(data, false)),
        OutputFormat::JsonCompact => Some(render_json(data, true)),
        OutputFormat::Yaml => Some(render_yaml(data)),
        OutputFormat::Table | OutputFormat::Plain => None,
    }
}

/// Titled table; empty input renders nothing.
pub fn render_table<R: Tabled>(title: &str, rows: &[R]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    format!("{title}\n{table}")
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.unwrap_or_else(|e| format!("{{\"error\":\"serialization failed: {e}\"}}"))
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("error: serialization failed: {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, Tabled)]
    struct Row {
        name: &'static str,
        value: u32,
    }

    #[test]
    fn structured_formats() {
        let rows = [Row { name: "a", value: 1 }];
        let json = render_structured(OutputFormat::JsonCompact, &rows).unwrap();
        assert_eq!(json, r#"[{"name":"a","value":1}]"#);
        let yaml = render_structured(OutputFormat::Yaml, &rows).unwrap();
        assert!(yaml.contains("name: a"));
        assert!(render_structured(OutputFormat::Table, &rows).is_none());
    }

    #[test]
    fn empty_table_renders_nothing() {
        let rows: [Row; 0] = [];
        assert!(render_table("Rows", &rows).is_empty());
        let rows = [Row { name: "a", value: 1 }];
        assert!(render_table("Rows", &rows).starts_with("Rows\n"));
    }

    #[test]
    fn uncolored_status_is_untouched() {
        assert_eq!(paint_status("SUCCESS", true, false), "SUCCESS");
        assert_ne!(paint_status("SUCCESS", true, true), "SUCCESS");
    }
}
