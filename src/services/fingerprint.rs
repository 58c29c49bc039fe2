//! Content fingerprints of watched page regions.

use sha2::{Digest, Sha224};

use crate::error::Result;

use super::PageDocument;

/// Hex-encoded SHA-224 digest of the given markup.
pub fn fingerprint(markup: &str) -> String {
    hex::encode(Sha224::digest(markup.as_bytes()))
}

/// Fingerprint of the outer markup of the first element matching `selector`.
///
/// Returns `None` when nothing on the page matches.
pub fn fingerprint_region(document: &PageDocument, selector: &str) -> Result<Option<String>> {
    Ok(document
        .select_first(selector)?
        .map(|region| fingerprint(&region.html())))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <article>
          <h1 class="entry-title">Raspored ispita</h1>
          <div class="entry-content"><p>Jun</p></div>
        </article>
        <article><h1 class="entry-title">Stari</h1></article>
    </body></html>"#;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            fingerprint(""),
            "d14a028c2a3a2bc9476102bb288234c415a2b01f828ea62ac5b3e42f"
        );
        assert_eq!(fingerprint("abc").len(), 56);
    }

    #[test]
    fn test_region_fingerprint_is_deterministic() {
        let a = PageDocument::parse("https://example.com/", PAGE).unwrap();
        let b = PageDocument::parse("https://example.com/", PAGE).unwrap();
        assert_eq!(
            fingerprint_region(&a, "article").unwrap(),
            fingerprint_region(&b, "article").unwrap()
        );
    }

    #[test]
    fn test_region_fingerprint_ignores_content_outside_region() {
        let a = PageDocument::parse("https://example.com/", PAGE).unwrap();
        let changed = PAGE.replace("Stari", "Drugi");
        let b = PageDocument::parse("https://example.com/", &changed).unwrap();
        assert_eq!(
            fingerprint_region(&a, "article").unwrap(),
            fingerprint_region(&b, "article").unwrap()
        );

        let edited = PAGE.replace("<p>Jun</p>", "<p>Jul</p>");
        let c = PageDocument::parse("https://example.com/", &edited).unwrap();
        assert_ne!(
            fingerprint_region(&a, "article").unwrap(),
            fingerprint_region(&c, "article").unwrap()
        );
    }

    #[test]
    fn test_missing_region() {
        let doc = PageDocument::parse("https://example.com/", PAGE).unwrap();
        assert_eq!(fingerprint_region(&doc, "div.timeline-body").unwrap(), None);
    }
}
