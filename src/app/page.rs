use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::error::FetchError;

/// A fetched, parsed document together with the URL it was served from.
///
/// `scraper::Html` is not `Send`, so a `Page` lives only inside the
/// synchronous parse step and never across an `.await`.
pub struct Page {
    url: Url,
    doc: Html,
}

impl Page {
    pub fn parse(url: Url, body: &str) -> Self {
        Self {
            url,
            doc: Html::parse_document(body),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Every element matching `selector`, in document order.
    pub fn select<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = Node<'a>> + 'a {
        self.doc.select(selector).map(Node)
    }
}

/// One matched element; queries are scoped to its descendants.
#[derive(Clone, Copy)]
pub struct Node<'a>(ElementRef<'a>);

impl Node<'_> {
    /// Attribute of the first descendant matching `selector`, empty when missing.
    pub fn child_attr(&self, selector: &Selector, name: &str) -> String {
        self.0
            .select(selector)
            .find_map(|el| el.value().attr(name))
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    }

    /// Trimmed text of every descendant matching `selector`, concatenated.
    pub fn child_text(&self, selector: &Selector) -> String {
        self.0
            .select(selector)
            .map(|el| el.text().collect::<String>())
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Trimmed text of this element.
    pub fn text(&self) -> String {
        self.0.text().collect::<String>().trim().to_string()
    }
}

pub fn resolve_href(base: &Url, href: &str) -> Result<Url, FetchError> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return Err(FetchError::BadLink {
            base: base.to_string(),
            href: href.to_string(),
        });
    }
    base.join(href).map_err(|_| FetchError::BadLink {
        base: base.to_string(),
        href: href.to_string(),
    })
}
