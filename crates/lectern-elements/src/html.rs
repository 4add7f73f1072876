//! HTML helpers shared by the reference elements.

use comrak::{Options, markdown_to_html};

/// Escape text for use inside HTML element content or quoted attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render Markdown to HTML.
///
/// Raw HTML in the input is omitted rather than passed through, and single
/// newlines become hard breaks.
pub fn render_markdown(input: &str) -> String {
    let mut options = Options::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    options.render.hardbreaks = true;
    markdown_to_html(input, &options)
}
