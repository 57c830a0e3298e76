use serde::{Deserialize, Serialize};

/// Structured body of a post, comment or wiki page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub paragraphs: Vec<String>,
}

impl Document {
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    /// Paragraphs joined by blank lines.
    pub fn to_plain_text(&self) -> String {
        self.paragraphs.join("\n\n")
    }

    /// First paragraph, truncated to `max` characters.
    pub fn summary(&self, max: usize) -> String {
        let first = self.paragraphs.first().map(String::as_str).unwrap_or_default();
        if first.chars().count() <= max {
            first.to_string()
        } else {
            let cut: String = first.chars().take(max).collect();
            format!("{cut}…")
        }
    }
}

/// Where a body being formatted comes from.
#[derive(Clone, Copy, Debug)]
pub struct FormatContext<'a> {
    pub subreddit: &'a str,
    pub kind: &'a str,
}

/// Raw body to document conversion.
pub trait Formatter: Send + Sync {
    fn format(&self, raw_body: &str, context: &FormatContext<'_>) -> Document;
}

/// Splits bodies into paragraphs on blank lines and undoes the HTML entity
/// escaping the remote applies to markdown sources.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainFormatter;

impl Formatter for PlainFormatter {
    fn format(&self, raw_body: &str, _context: &FormatContext<'_>) -> Document {
        let text = unescape(&raw_body.replace("\r\n", "\n"));
        let paragraphs = text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        Document { paragraphs }
    }
}

fn unescape(text: &str) -> String {
    // `&amp;` last, so `&amp;lt;` stays `&lt;`.
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
