//! Renderer for the small markdown dialect used by chapter files.
//!
//! Only headers, strong/emphasis spans and paragraphs are recognized. Raw HTML
//! in the source passes through untouched.

use std::path::Path;

use anyhow::Context as _;

use crate::cli::RenderArgs;

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let input = Path::new(&args.input);
    let markdown = std::fs::read_to_string(input)
        .with_context(|| format!("read markdown: {}", input.display()))?;

    let html = render(&markdown);
    tracing::debug!(input = %input.display(), bytes = html.len(), "rendered markdown");

    crate::output::write_output(args.out.as_deref(), &html, args.force)
}

/// Converts chapter markdown to an HTML fragment.
#[must_use]
pub fn render(markdown: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_paragraph = false;

    for line in markdown.lines() {
        let converted = render_inline(&render_header(line));
        let line = converted.trim();

        if line.is_empty() {
            if in_paragraph {
                out.push("</p>".to_owned());
                in_paragraph = false;
            }
        } else if is_block_tag(line) {
            if in_paragraph {
                out.push("</p>".to_owned());
                in_paragraph = false;
            }
            out.push(line.to_owned());
        } else {
            if !in_paragraph {
                out.push("<p>".to_owned());
                in_paragraph = true;
            }
            out.push(line.to_owned());
        }
    }

    if in_paragraph {
        out.push("</p>".to_owned());
    }

    out.join("\n")
}

fn render_header(line: &str) -> String {
    for (prefix, tag) in [("### ", "h3"), ("## ", "h2"), ("# ", "h1")] {
        if let Some(rest) = line.strip_prefix(prefix) {
            return format!("<{tag}>{rest}</{tag}>");
        }
    }
    line.to_owned()
}

fn render_inline(line: &str) -> String {
    let line = replace_strong(line, "**");
    let line = replace_strong(&line, "__");
    let line = replace_emphasis(&line, '*');
    replace_emphasis(&line, '_')
}

fn is_block_tag(line: &str) -> bool {
    line.starts_with("<h") || line.starts_with("<ul") || line.starts_with("<ol")
}

/// `**text**` -> `<strong>text</strong>`, shortest match first. Empty spans are allowed.
fn replace_strong(line: &str, marker: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(start) = rest.find(marker) {
        let after_open = &rest[start + marker.len()..];
        let Some(len) = after_open.find(marker) else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str("<strong>");
        out.push_str(&after_open[..len]);
        out.push_str("</strong>");
        rest = &after_open[len + marker.len()..];
    }

    out.push_str(rest);
    out
}

/// `*text*` -> `<em>text</em>`. The span must be non-empty and must not contain the marker.
fn replace_emphasis(line: &str, marker: char) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(start) = rest.find(marker) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 1..];
        match after_open.find(marker) {
            Some(len) if len > 0 => {
                out.push_str("<em>");
                out.push_str(&after_open[..len]);
                out.push_str("</em>");
                rest = &after_open[len + 1..];
            }
            _ => {
                out.push(marker);
                rest = after_open;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_renders_nothing() {
        assert_eq!(render(""), "");
        assert_eq!(render("\n\n   \n"), "");
    }

    #[test]
    fn header_only_has_no_paragraph() {
        assert_eq!(render("# Hi"), "<h1>Hi</h1>");
        assert_eq!(
            render("# One\n## Two\n### Three"),
            "<h1>One</h1>\n<h2>Two</h2>\n<h3>Three</h3>"
        );
    }

    #[test]
    fn plain_text_is_wrapped_with_tags_on_own_lines() {
        assert_eq!(render("plain text"), "<p>\nplain text\n</p>");
    }

    #[test]
    fn header_markers_need_a_space_and_line_start() {
        assert_eq!(render("#Hi"), "<p>\n#Hi\n</p>");
        assert_eq!(render("#### Deep"), "<p>\n#### Deep\n</p>");
        assert_eq!(render("  # Indented"), "<p>\n# Indented\n</p>");
    }

    #[test]
    fn strong_is_applied_before_emphasis() {
        let html = render("**a** *b*");
        assert!(html.contains("<strong>a</strong>"));
        assert!(html.contains("<em>b</em>"));
        assert!(!html.contains("<em><strong>"));

        let html = render("__a__ _b_");
        assert_eq!(html, "<p>\n<strong>a</strong> <em>b</em>\n</p>");
    }

    #[test]
    fn strong_match_is_non_greedy() {
        assert_eq!(
            render_inline("**a** and **b**"),
            "<strong>a</strong> and <strong>b</strong>"
        );
        assert_eq!(render_inline("****"), "<strong></strong>");
        assert_eq!(render_inline("**open only"), "**open only");
    }

    #[test]
    fn emphasis_requires_content() {
        assert_eq!(render_inline("a ** b"), "a ** b");
        assert_eq!(render_inline("snake_case_name"), "snake<em>case</em>name");
        assert_eq!(render_inline("lone * star"), "lone * star");
        assert_eq!(render_inline("**x*"), "*<em>x</em>");
    }

    #[test]
    fn spans_do_not_cross_lines() {
        assert_eq!(render("*start\nend*"), "<p>\n*start\nend*\n</p>");
        assert_eq!(render("**start\nend**"), "<p>\n**start\nend**\n</p>");
    }

    #[test]
    fn blank_lines_and_headers_close_paragraphs() {
        let markdown = "# Title\nfirst line\nsecond line\n\nnext para\n## Break\ntail";
        let expected = "<h1>Title</h1>\n<p>\nfirst line\nsecond line\n</p>\n<p>\nnext para\n</p>\n<h2>Break</h2>\n<p>\ntail\n</p>";
        assert_eq!(render(markdown), expected);
    }

    #[test]
    fn headers_carry_inline_markup() {
        assert_eq!(render("## The *Shore*"), "<h2>The <em>Shore</em></h2>");
    }

    #[test]
    fn raw_list_markup_is_treated_as_block() {
        assert_eq!(
            render("intro\n<ul><li>x</li></ul>\noutro"),
            "<p>\nintro\n</p>\n<ul><li>x</li></ul>\n<p>\noutro\n</p>"
        );
    }

    #[test]
    fn crlf_line_endings_are_tolerated() {
        assert_eq!(render("# Hi\r\nline\r\n"), "<h1>Hi</h1>\n<p>\nline\n</p>");
    }
}
