//! Embedded-URL extraction for message rendering.
//!
//! Message content is plain text that may carry `http(s)` URLs; the UIs
//! render those as links. This mirrors what the portal widget does before
//! display, without any fetching or preview resolution.

use regex::Regex;

use crate::chat::core::errors::ChatResult;

/// Punctuation that ends a sentence rather than a URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')'];

/// One renderable slice of a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageSegment<'a> {
    /// Plain text.
    Text(&'a str),
    /// An embedded URL to render as a link.
    Link(&'a str),
}

/// Compiled URL matcher for message content.
pub struct LinkExtractor {
    url_pattern: Regex,
}

impl LinkExtractor {
    /// Compile the matcher.
    ///
    /// # Errors
    /// Returns an error if the pattern fails to compile.
    pub fn new() -> ChatResult<Self> {
        Ok(Self {
            url_pattern: Regex::new(r#"https?://[^\s<>"']+"#)?,
        })
    }

    /// All embedded URLs in `content`, in order of appearance.
    #[must_use]
    pub fn extract<'a>(&self, content: &'a str) -> Vec<&'a str> {
        self.url_pattern
            .find_iter(content)
            .map(|found| found.as_str().trim_end_matches(TRAILING_PUNCTUATION))
            .collect()
    }

    /// Split `content` into text and link segments for rendering.
    #[must_use]
    pub fn segments<'a>(&self, content: &'a str) -> Vec<MessageSegment<'a>> {
        let mut segments = Vec::new();
        let mut cursor = 0;

        for found in self.url_pattern.find_iter(content) {
            let url = found.as_str().trim_end_matches(TRAILING_PUNCTUATION);
            if found.start() > cursor {
                segments.push(MessageSegment::Text(&content[cursor..found.start()]));
            }
            segments.push(MessageSegment::Link(url));
            cursor = found.start() + url.len();
        }

        if cursor < content.len() {
            segments.push(MessageSegment::Text(&content[cursor..]));
        }

        segments
    }
}
