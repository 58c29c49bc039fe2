//! Announcement data extracted from a watched page.

use serde::{Deserialize, Serialize};

/// Inline formatting carried by a run of text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Style {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub code: bool,
    pub pre: bool,
    /// Absolute link target
    pub link: Option<String>,
}

impl Style {
    /// Whether the text renders without any markup.
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }

    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Self::default()
        }
    }
}

/// A run of text sharing one style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub style: Style,
}

impl Segment {
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Style::default())
    }
}

/// One region of the page in every form the pipeline needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichText {
    /// Source markup of the region
    pub markup: String,

    /// Visible text, whitespace-normalized
    pub plain: String,

    /// Ordered styled runs; their texts concatenate to `plain`
    pub segments: Vec<Segment>,
}

impl RichText {
    /// Build from segments, deriving the plain text.
    pub fn from_segments(markup: impl Into<String>, segments: Vec<Segment>) -> Self {
        let plain = segments.iter().map(|s| s.text.as_str()).collect();
        Self {
            markup: markup.into(),
            plain,
            segments,
        }
    }
}

/// The latest announcement of a watched source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// Source identifier
    pub source_id: String,

    /// Page the announcement was found on
    pub source_url: String,

    pub title: RichText,

    pub body: RichText,

    /// Absolute image URLs found in the body, in document order
    pub images: Vec<String>,
}
