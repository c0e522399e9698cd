//! Markup rendering and reading statistics for article text.
//!
//! Both functions are pure; they are re-run on the full cumulative text for
//! every stream update.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const PARAGRAPH_OPEN: &str = r#"<p class="article-paragraph">"#;
pub const TYPING_CURSOR: &str = r#"<span class="typing-cursor"></span>"#;

/// Average reading speed used for the read-time estimate.
pub const WORDS_PER_MINUTE: usize = 200;

static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?mR)^# ([^\r\n]*)$").unwrap());
static H2: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?mR)^## ([^\r\n]*)$").unwrap());
static H3: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?mR)^### ([^\r\n]*)$").unwrap());

/// Convert markdown-flavoured article text into HTML.
///
/// Paragraph breaks are replaced first, then `**bold**` and `*italic*`,
/// then line-leading `#`/`##`/`###` headings. Output that does not already
/// open with a heading or paragraph tag is wrapped in one paragraph.
pub fn render(text: &str) -> String {
    let closed_open = format!("</p>{PARAGRAPH_OPEN}");
    let formatted = PARAGRAPH_BREAK.replace_all(text, closed_open.as_str());
    let formatted = BOLD.replace_all(&formatted, "<strong>$1</strong>");
    let formatted = ITALIC.replace_all(&formatted, "<em>$1</em>");
    let formatted = H1.replace_all(&formatted, "<h1>$1</h1>");
    let formatted = H2.replace_all(&formatted, "<h2>$1</h2>");
    let formatted = H3.replace_all(&formatted, "<h3>$1</h3>");

    if formatted.starts_with("<h") || formatted.starts_with("<p") {
        formatted.into_owned()
    } else {
        format!("{PARAGRAPH_OPEN}{formatted}</p>")
    }
}

/// [`render`] plus a trailing typing cursor, for text still arriving.
pub fn render_streaming(text: &str) -> String {
    let mut out = render(text);
    out.push_str(TYPING_CURSOR);
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleStats {
    pub word_count: usize,
    pub char_count: usize,
    pub paragraph_count: usize,
    pub estimated_read_minutes: usize,
}

/// Derive display statistics from plain article text.
///
/// Counting follows a plain whitespace split, so empty text still reports
/// one word and one paragraph.
pub fn stats(text: &str) -> ArticleStats {
    let word_count = text.split_whitespace().count().max(1);
    let char_count = text.chars().count();
    let paragraph_count = PARAGRAPH_BREAK.split(text).count();
    ArticleStats {
        word_count,
        char_count,
        paragraph_count,
        estimated_read_minutes: word_count.div_ceil(WORDS_PER_MINUTE),
    }
}

impl std::fmt::Display for ArticleStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} words | {} chars | {} paragraphs | {} min read",
            self.word_count, self.char_count, self.paragraph_count, self.estimated_read_minutes
        )
    }
}
