//! Parsed page with selector-based region lookup.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};

/// A fetched page, parsed once per poll cycle.
pub struct PageDocument {
    url: Url,
    html: Html,
}

impl PageDocument {
    /// Parse a page body fetched from `url`.
    pub fn parse(url: &str, body: &str) -> Result<Self> {
        Ok(Self {
            url: Url::parse(url)?,
            html: Html::parse_document(body),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// First element matching `selector`, in document order.
    pub fn select_first(&self, selector: &str) -> Result<Option<ElementRef<'_>>> {
        let selector = parse_selector(selector)?;
        Ok(self.html.select(&selector).next())
    }
}

pub(crate) fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_first_returns_earliest_match() {
        let doc = PageDocument::parse(
            "https://example.com/",
            "<article><h1>One</h1></article><article><h1>Two</h1></article>",
        )
        .unwrap();
        let first = doc.select_first("article h1").unwrap().unwrap();
        assert_eq!(first.text().collect::<String>(), "One");
        assert!(doc.select_first("table").unwrap().is_none());
    }

    #[test]
    fn test_parse_selector_invalid() {
        assert!(parse_selector("div.class").is_ok());
        assert!(parse_selector(r#"div[class="timeline-body"]"#).is_ok());
        assert!(parse_selector("[[invalid").is_err());
    }

    #[test]
    fn test_parse_rejects_relative_url() {
        assert!(PageDocument::parse("not a url", "<p></p>").is_err());
    }
}
