//! Markdown-style message formatting.
//!
//! Converts a plain-text chat message into HTML-safe markup for display.
//! The pipeline is a fixed sequence of regex-based transforms: escape,
//! table detection, incidental-HTML wrapping, fenced code blocks, inline
//! code, then per-segment markdown on everything outside code spans.
//! Malformed markdown is never an error; unmatched syntax simply passes
//! through as escaped literal text.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static TABLE_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\|.*\|$").expect("table line pattern is valid"));
static SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\|\-\s:]+$").expect("separator pattern is valid"));
static CODE_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(\w+)?\n(.*?)```").expect("code block pattern is valid"));
static INLINE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`]+)`").expect("inline code pattern is valid"));
static CODE_SPAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<pre>.*?</pre>|<code>.*?</code>").expect("code span pattern is valid")
});
static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(#+)\s+(.*)$").expect("header pattern is valid"));
static BOLD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern is valid"));
static ITALIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*(.*?)\*").expect("italic pattern is valid"));
static STRIKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"~~(.*?)~~").expect("strikethrough pattern is valid"));
static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(.*?)\]\((https?://[^\s)]+)\)").expect("link pattern is valid")
});
static BLOCKQUOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^&gt;\s+(.*)$").expect("blockquote pattern is valid"));
static LIST_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(-|\*|\d+\.)\s+(.*)$").expect("list item pattern is valid"));
static HR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^---$").expect("horizontal rule pattern is valid"));

// Incidental-HTML detection runs on already-escaped text, so tag names are
// matched in their entity-escaped form.
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)&lt;/?(!DOCTYPE|html|head|body|div|span|p|h[1-6]|a|img|script|style|link|meta|title|header|footer|nav|section|article|main|aside|ul|ol|li|table|tr|td|th|form|input|button|textarea|select|option|label)(\s|&gt;|/)",
    )
    .expect("html tag pattern is valid")
});
static XML_DECL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)&lt;\?xml").expect("xml declaration pattern is valid"));
// An entity the user actually typed shows up double-escaped (`&amp;name;`).
static USER_ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&amp;[a-zA-Z]+;").expect("entity pattern is valid"));

/// Replace `&`, `<`, `>`, `"`, `'` with their entity equivalents.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Format a chat message as HTML-safe markup.
///
/// Total function: worst case the result is the escaped input with literal
/// newlines replaced by `<br>`. Not idempotent - feeding already-formatted
/// output back in re-escapes the generated tags.
pub fn format_message(text: &str) -> String {
    // Escaping must run first and exactly once; every later stage assumes
    // entity-escaped input and injects raw structural tags.
    let escaped = escape_html(text);

    let with_tables = process_tables(&escaped);
    let guarded = wrap_incidental_html(with_tables);

    // Fenced code blocks before any inline markdown so formatting characters
    // inside code are never transformed.
    let with_blocks = CODE_BLOCK_RE.replace_all(&guarded, |caps: &Captures| {
        let code = caps.get(2).map_or("", |m| m.as_str()).trim();
        match caps.get(1) {
            Some(lang) => format!(
                "<pre><code class=\"language-{}\">{}</code></pre>",
                lang.as_str(),
                code
            ),
            None => format!("<pre><code>{}</code></pre>", code),
        }
    });

    let with_inline =
        INLINE_CODE_RE.replace_all(&with_blocks, |caps: &Captures| format!("<code>{}</code>", &caps[1]));

    // Markdown rules apply only to the segments between code spans; code
    // segments pass through verbatim, newlines included.
    let mut out = String::with_capacity(with_inline.len());
    for segment in split_code_segments(&with_inline) {
        match segment {
            Segment::Code(code) => out.push_str(code),
            Segment::Text(text) => out.push_str(&apply_markdown(text).replace('\n', "<br>")),
        }
    }
    out
}

/// A substring of the message, classified by whether it is a rendered code
/// span (verbatim) or ordinary text (markdown rules apply).
enum Segment<'a> {
    Code(&'a str),
    Text(&'a str),
}

fn split_code_segments(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut last = 0;
    for m in CODE_SPAN_RE.find_iter(text) {
        if m.start() > last {
            segments.push(Segment::Text(&text[last..m.start()]));
        }
        segments.push(Segment::Code(m.as_str()));
        last = m.end();
    }
    if last < text.len() {
        segments.push(Segment::Text(&text[last..]));
    }
    segments
}

/// Replace maximal runs of pipe-delimited lines with `<table>` markup.
///
/// A run qualifies only with at least two lines and a plausible separator as
/// the second line. The newline following a rendered table is swallowed so
/// the table butts directly against the following text.
fn process_tables(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < lines.len() {
        if TABLE_LINE_RE.is_match(lines[i]) {
            let mut j = i + 1;
            while j < lines.len() && TABLE_LINE_RE.is_match(lines[j]) {
                j += 1;
            }
            let run = &lines[i..j];
            if run.len() >= 2 && is_separator_line(run[1]) {
                out.push_str(&render_table(run));
                i = j;
                continue;
            }
        }
        out.push_str(lines[i]);
        if i + 1 < lines.len() {
            out.push('\n');
        }
        i += 1;
    }
    out
}

fn is_separator_line(line: &str) -> bool {
    SEPARATOR_RE.is_match(line.trim()) || line.contains("---")
}

fn render_table(lines: &[&str]) -> String {
    let mut html = String::from("<table><thead><tr>");
    for cell in split_cells(lines[0]) {
        html.push_str("<th>");
        html.push_str(&format_cell(cell));
        html.push_str("</th>");
    }
    html.push_str("</tr></thead><tbody>");
    for line in &lines[1..] {
        if is_separator_line(line) {
            continue;
        }
        let cells = split_cells(line);
        if cells.is_empty() {
            continue;
        }
        html.push_str("<tr>");
        for cell in cells {
            html.push_str("<td>");
            html.push_str(&format_cell(cell));
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

fn split_cells(line: &str) -> Vec<&str> {
    line.split('|')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect()
}

/// Cells get inline bold/italic/inline-code substitution only, not the full
/// recursive pipeline.
fn format_cell(cell: &str) -> String {
    let cell = BOLD_RE.replace_all(cell, |c: &Captures| format!("<strong>{}</strong>", &c[1]));
    let cell = ITALIC_RE.replace_all(&cell, |c: &Captures| format!("<em>{}</em>", &c[1]));
    INLINE_CODE_RE
        .replace_all(&cell, |c: &Captures| format!("<code>{}</code>", &c[1]))
        .into_owned()
}

/// Wrap text that looks like literal HTML in a ```html fence so the markdown
/// pass leaves it alone.
///
/// The tag-count threshold (>3) and the table/code-fence exclusions are
/// deliberately kept as-is even though the heuristic can misfire on short
/// snippets; see the guard tests below for the intended tie-breaks.
fn wrap_incidental_html(text: String) -> String {
    if text.contains("<table>") && text.contains("</table>") {
        return text;
    }
    if text.contains("```") || text.contains("<pre>") || text.contains("<code>") {
        return text;
    }
    if text.contains('|') && text.contains("---") {
        return text;
    }
    let hits = HTML_TAG_RE.find_iter(&text).count()
        + USER_ENTITY_RE.find_iter(&text).count()
        + XML_DECL_RE.find_iter(&text).count();
    if hits > 3 {
        format!("```html\n{}\n```", text)
    } else {
        text
    }
}

/// Apply line and inline markdown rules to a non-code segment.
fn apply_markdown(part: &str) -> String {
    let part = HEADER_RE.replace_all(part, |caps: &Captures| {
        let level = caps[1].len().min(6);
        format!("<h{}>{}</h{}>", level, &caps[2], level)
    });
    let part = BOLD_RE.replace_all(&part, |c: &Captures| format!("<strong>{}</strong>", &c[1]));
    let part = ITALIC_RE.replace_all(&part, |c: &Captures| format!("<em>{}</em>", &c[1]));
    let part = STRIKE_RE.replace_all(&part, |c: &Captures| format!("<del>{}</del>", &c[1]));
    let part = LINK_RE.replace_all(&part, |c: &Captures| {
        format!(
            "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
            &c[2], &c[1]
        )
    });
    let part = BLOCKQUOTE_RE.replace_all(&part, |c: &Captures| {
        format!("<blockquote>{}</blockquote>", &c[1])
    });
    let part = wrap_list_items(&part);
    HR_RE.replace_all(&part, "<hr>").into_owned()
}

/// Turn list-item lines into `<li>` elements and wrap each consecutive run
/// in a single `<ol>` (any numeric marker) or `<ul>`.
fn wrap_list_items(part: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut items: Vec<String> = Vec::new();
    let mut ordered = false;
    for line in part.split('\n') {
        if let Some(caps) = LIST_ITEM_RE.captures(line) {
            if caps[1].ends_with('.') {
                ordered = true;
            }
            items.push(format!("<li>{}</li>", &caps[2]));
        } else {
            flush_list(&mut out, &mut items, &mut ordered);
            out.push(line.to_string());
        }
    }
    flush_list(&mut out, &mut items, &mut ordered);
    out.join("\n")
}

fn flush_list(out: &mut Vec<String>, items: &mut Vec<String>, ordered: &mut bool) {
    if items.is_empty() {
        return;
    }
    let tag = if *ordered { "ol" } else { "ul" };
    out.push(format!("<{}>{}</{}>", tag, items.join(""), tag));
    items.clear();
    *ordered = false;
}
