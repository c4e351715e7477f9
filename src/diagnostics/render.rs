//! Panel rendering for diagnostic records.
//!
//! Pure transform: record in, bounded-width text panel out. Wrapping uses
//! visible character counts (ANSI escapes stripped before measuring), so
//! styled fragments inside messages never skew the layout.

use std::sync::OnceLock;

use owo_colors::OwoColorize;
use regex::Regex;

use super::DiagnosticRecord;

/// Maximum visible width of wrapped message/suggestion content.
const CONTENT_WIDTH: usize = 72;

/// Fixed identification footer appended to every panel.
const FOOTER: &str = "— titan —";

/// Strip ANSI escape codes from string.
pub(crate) fn strip_ansi(s: &str) -> std::borrow::Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());
    re.replace_all(s, "")
}

/// Visible width of a string: character count after ANSI stripping.
fn visible_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}

/// Wrap text to `width` visible characters, preserving explicit newlines.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for raw_line in text.lines() {
        if visible_width(raw_line) <= width {
            lines.push(raw_line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in raw_line.split_whitespace() {
            if current.is_empty() {
                current = word.to_string();
            } else if visible_width(&current) + 1 + visible_width(word) <= width {
                current.push(' ');
                current.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current));
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Render a single diagnostic record into a displayable panel.
pub fn render(record: &DiagnosticRecord) -> String {
    render_numbered(record, None)
}

/// Render a sequence of records as "Error i/N" panels.
pub fn render_all(records: &[DiagnosticRecord]) -> String {
    let total = records.len();
    records
        .iter()
        .enumerate()
        .map(|(i, record)| render_numbered(record, Some((i + 1, total))))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_numbered(record: &DiagnosticRecord, index: Option<(usize, usize)>) -> String {
    let mut out = String::new();

    // Header: "✗ Error 1/3 · Unresolved import"
    let header = match index {
        Some((i, n)) if n > 1 => format!("Error {i}/{n} · {}", record.title),
        _ => record.title.clone(),
    };
    out.push_str(&format!("{} {}\n", "✗".red().bold(), header.bold()));

    // Location line: file:line:column when positions are known.
    let location = match (record.line, record.column) {
        (Some(line), Some(column)) => format!("{}:{line}:{column}", record.file),
        (Some(line), None) => format!("{}:{line}", record.file),
        _ => record.file.clone(),
    };
    out.push_str(&format!("  {}\n", location.cyan()));

    for line in wrap(&record.message, CONTENT_WIDTH) {
        out.push_str(&format!("  {line}\n"));
    }

    if let Some(frame) = &record.code_frame {
        let gutter = frame.line.to_string();
        out.push_str(&format!(
            "    {} {} {}\n",
            gutter.dimmed(),
            "│".dimmed(),
            frame.text.trim_end()
        ));
        // Caret under the offending column (column is 1-based)
        let pad = " ".repeat(gutter.len());
        let caret_offset = frame.column.saturating_sub(1);
        out.push_str(&format!(
            "    {} {} {}{}\n",
            pad,
            "│".dimmed(),
            " ".repeat(caret_offset),
            "^".red().bold()
        ));
    }

    if let Some(suggestion) = &record.suggestion {
        let mut first = true;
        for line in wrap(suggestion, CONTENT_WIDTH.saturating_sub(6)) {
            if first {
                out.push_str(&format!("  {} {line}\n", "hint:".yellow()));
                first = false;
            } else {
                out.push_str(&format!("        {line}\n"));
            }
        }
    }

    out.push_str(&format!("  {}\n", FOOTER.dimmed()));
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CodeFrame;

    fn record() -> DiagnosticRecord {
        DiagnosticRecord::new(
            "Unresolved import",
            "actions/login.js",
            "Cannot resolve module './db'",
        )
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[31mRed\x1b[0m"), "Red");
        assert_eq!(strip_ansi("Plain text"), "Plain text");
    }

    #[test]
    fn test_visible_width_ignores_styling() {
        assert_eq!(visible_width("\x1b[1;32mok\x1b[0m"), 2);
    }

    #[test]
    fn test_wrap_respects_width() {
        let text = "word ".repeat(40);
        for line in wrap(&text, 20) {
            assert!(visible_width(&line) <= 20, "line too wide: {line:?}");
        }
    }

    #[test]
    fn test_wrap_styled_text_measures_visible_chars() {
        // 10 visible chars styled; raw length far exceeds the width
        let styled = format!("\x1b[31m{}\x1b[0m", "a".repeat(10));
        let lines = wrap(&styled, 12);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_render_includes_location_and_footer() {
        let out = render(&record().at(3, 8));
        let plain = strip_ansi(&out).to_string();
        assert!(plain.contains("actions/login.js:3:8"));
        assert!(plain.contains("— titan —"));
        assert!(plain.contains("Cannot resolve module './db'"));
    }

    #[test]
    fn test_render_caret_position() {
        let out = render(&record().at(3, 8).with_frame(CodeFrame {
            line: 3,
            column: 8,
            text: "import db from './db'".to_string(),
        }));
        let plain = strip_ansi(&out).to_string();
        let caret_line = plain
            .lines()
            .find(|l| l.trim_end().ends_with('^'))
            .expect("caret line");
        // caret sits under column 8 of the frame text
        let frame_line = plain.lines().find(|l| l.contains("import db")).unwrap();
        let text_start = frame_line.find("import").unwrap();
        let caret_pos = caret_line.find('^').unwrap();
        assert_eq!(caret_pos, text_start + 7); // column 8, 1-based
    }

    #[test]
    fn test_render_all_numbers_records() {
        let records = vec![record(), record(), record()];
        let out = strip_ansi(&render_all(&records)).to_string();
        assert!(out.contains("Error 1/3"));
        assert!(out.contains("Error 2/3"));
        assert!(out.contains("Error 3/3"));
    }

    #[test]
    fn test_render_single_record_unnumbered() {
        let out = strip_ansi(&render_all(&[record()])).to_string();
        assert!(!out.contains("Error 1/1"));
        assert!(out.contains("Unresolved import"));
    }

    #[test]
    fn test_suggestion_rendered_with_hint_prefix() {
        let out = render(&record().with_suggestion("create the module or remove the import"));
        let plain = strip_ansi(&out).to_string();
        assert!(plain.contains("hint: create the module"));
    }
}
