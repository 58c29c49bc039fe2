//! Announcement extraction.
//!
//! Walks the title and body elements of a page and turns them into ordered
//! runs of styled text. Channel formatters render from these runs, so a
//! fragment that appears twice in the body keeps the style of each
//! occurrence.

use scraper::ElementRef;
use scraper::node::Node;

use crate::error::{AppError, Result};
use crate::models::{Announcement, RichText, Segment, Style, WatchedSource};
use crate::utils::resolve_url;

use super::PageDocument;
use super::document::parse_selector;

/// Elements whose content is never relayed.
const SKIPPED: &[&str] = &["script", "style", "noscript", "template", "img", "svg"];

/// Elements that start and end on their own line.
const BLOCKS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "ul", "ol", "li", "table", "tr",
    "blockquote", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "figure", "figcaption",
];

/// Extract the latest announcement of `source` from a parsed page.
pub fn extract(source: &WatchedSource, document: &PageDocument) -> Result<Announcement> {
    let title = document
        .select_first(&source.title)?
        .ok_or_else(|| AppError::no_announcement(&source.id, &source.title))?;
    let body = document
        .select_first(&source.body)?
        .ok_or_else(|| AppError::no_announcement(&source.id, &source.body))?;

    Ok(Announcement {
        source_id: source.id.clone(),
        source_url: source.url.clone(),
        title: rich_text(title, document),
        body: rich_text(body, document),
        images: image_urls(body, document)?,
    })
}

/// Styled rendering of one element, including the element's own tag.
pub fn rich_text(element: ElementRef<'_>, document: &PageDocument) -> RichText {
    let mut builder = SegmentBuilder::default();
    walk(element, &Style::default(), document, &mut builder);
    RichText::from_segments(element.html(), builder.finish())
}

/// Absolute `src` of every image below `element`, without duplicates.
pub fn image_urls(element: ElementRef<'_>, document: &PageDocument) -> Result<Vec<String>> {
    let selector = parse_selector("img[src]")?;
    let mut urls: Vec<String> = Vec::new();
    for img in element.select(&selector) {
        let Some(src) = img.value().attr("src") else {
            continue;
        };
        if src.trim().is_empty() {
            continue;
        }
        let url = resolve_url(document.url(), src);
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    Ok(urls)
}

fn walk(
    element: ElementRef<'_>,
    inherited: &Style,
    document: &PageDocument,
    out: &mut SegmentBuilder,
) {
    let name = element.value().name();
    if SKIPPED.contains(&name) {
        return;
    }
    if name == "br" {
        out.push_newline();
        return;
    }

    let style = apply_tag(name, element, inherited, document);
    let block = BLOCKS.contains(&name);
    if block {
        out.push_break();
    }
    if name == "li" {
        out.push_text("• ", &Style::default());
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_text(text, &style),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    walk(child, &style, document, out);
                }
            }
            _ => {}
        }
    }

    if block {
        out.push_break();
    }
}

/// Style of an element's content given the style around it.
fn apply_tag(
    name: &str,
    element: ElementRef<'_>,
    inherited: &Style,
    document: &PageDocument,
) -> Style {
    let mut style = inherited.clone();
    match name {
        "strong" | "b" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => style.bold = true,
        "em" | "i" => style.italic = true,
        "u" | "ins" => style.underline = true,
        "s" | "strike" | "del" => style.strike = true,
        "code" => style.code = true,
        "pre" => style.pre = true,
        "a" => {
            if let Some(href) = element.value().attr("href") {
                let href = href.trim();
                if !href.is_empty() && !href.starts_with('#') && !href.starts_with("javascript:") {
                    style.link = Some(resolve_url(document.url(), href));
                }
            }
        }
        _ => {}
    }
    style
}

/// Accumulates segments with HTML-like whitespace handling.
#[derive(Default)]
struct SegmentBuilder {
    segments: Vec<Segment>,
}

impl SegmentBuilder {
    fn last_char(&self) -> Option<char> {
        self.segments.last().and_then(|s| s.text.chars().last())
    }

    fn push_raw(&mut self, text: &str, style: &Style) {
        if text.is_empty() {
            return;
        }
        match self.segments.last_mut() {
            Some(last) if last.style == *style => last.text.push_str(text),
            _ => self.segments.push(Segment::new(text, style.clone())),
        }
    }

    fn push_text(&mut self, text: &str, style: &Style) {
        if style.pre {
            self.push_raw(text, style);
            return;
        }

        let mut collapsed = String::with_capacity(text.len());
        let mut pending_space = false;
        for c in text.chars() {
            if c.is_whitespace() {
                pending_space = true;
                continue;
            }
            if pending_space {
                let at_line_start = collapsed.is_empty()
                    && matches!(self.last_char(), None | Some('\n') | Some(' '));
                if !at_line_start && !collapsed.ends_with(' ') {
                    collapsed.push(' ');
                }
                pending_space = false;
            }
            collapsed.push(c);
        }
        if pending_space && !collapsed.is_empty() {
            collapsed.push(' ');
        } else if pending_space && !matches!(self.last_char(), None | Some('\n') | Some(' ')) {
            // whitespace-only node between inline elements
            collapsed.push(' ');
        }
        self.push_raw(&collapsed, style);
    }

    /// End the current line unless already at a line start.
    fn push_break(&mut self) {
        self.trim_trailing_spaces();
        if !matches!(self.last_char(), None | Some('\n')) {
            self.push_raw("\n", &Style::default());
        }
    }

    /// Unconditional line break (`<br>`).
    fn push_newline(&mut self) {
        self.trim_trailing_spaces();
        if !self.segments.is_empty() {
            self.push_raw("\n", &Style::default());
        }
    }

    fn trim_trailing_spaces(&mut self) {
        while let Some(last) = self.segments.last_mut() {
            if last.style.pre {
                return;
            }
            let trimmed = last.text.trim_end_matches(' ').len();
            last.text.truncate(trimmed);
            if !last.text.is_empty() {
                return;
            }
            self.segments.pop();
        }
    }

    fn finish(mut self) -> Vec<Segment> {
        // at most one blank line in a row, no trailing whitespace
        let mut segments: Vec<Segment> = Vec::with_capacity(self.segments.len());
        let mut newlines = 0;
        for segment in self.segments.drain(..) {
            let mut text = String::with_capacity(segment.text.len());
            for c in segment.text.chars() {
                if c == '\n' && !segment.style.pre {
                    newlines += 1;
                    if newlines > 2 {
                        continue;
                    }
                } else {
                    newlines = 0;
                }
                text.push(c);
            }
            if text.is_empty() {
                continue;
            }
            match segments.last_mut() {
                Some(last) if last.style == segment.style => last.text.push_str(&text),
                _ => segments.push(Segment::new(text, segment.style)),
            }
        }

        while let Some(last) = segments.last_mut() {
            let trimmed = last.text.trim_end().len();
            last.text.truncate(trimmed);
            if !last.text.is_empty() {
                break;
            }
            segments.pop();
        }
        segments
    }
}
