use std::collections::BTreeMap;

use tracing::debug;

use super::page::Page;
use super::selectors::CompiledSelectors;

/// Attribute name -> value for one product. Keys are unique by construction.
pub type Characteristics = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub name: String,
    pub characteristics: Characteristics,
}

impl Product {
    pub fn new(name: impl Into<String>, characteristics: Characteristics) -> Self {
        Self {
            name: name.into(),
            characteristics,
        }
    }

    /// A product whose detail page could not be read. It still gets a row.
    pub fn without_characteristics(name: impl Into<String>) -> Self {
        Self::new(name, Characteristics::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Names exactly one product; its link is a detail page.
    Leaf,
    /// Names a family of variants; its link is a secondary listing.
    Internal,
}

/// Only leaf entries render the marker field, so an empty marker means a family.
pub fn classify_entry(leaf_marker: &str) -> NodeKind {
    if leaf_marker.trim().is_empty() {
        NodeKind::Internal
    } else {
        NodeKind::Leaf
    }
}

/// One row of the root listing, alive only until it is resolved. `link` may
/// be empty when the entry renders no usable anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub link: String,
    pub display_name: String,
    pub kind: NodeKind,
}

impl CatalogEntry {
    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }
}

pub fn parse_listing_entries(page: &Page, selectors: &CompiledSelectors) -> Vec<CatalogEntry> {
    let mut entries = Vec::new();
    for (idx, node) in page.select(&selectors.entry).enumerate() {
        let link = node.child_attr(&selectors.entry_link, "href");
        if link.is_empty() {
            debug!(position = idx + 1, page = %page.url(), "listing entry has no link");
        }

        let mut display_name = node.child_attr(&selectors.entry_link, "title");
        if display_name.is_empty() {
            display_name = node.child_text(&selectors.entry_link);
        }
        if display_name.is_empty() {
            display_name = link.clone();
        }

        let marker = node.child_text(&selectors.leaf_marker);
        entries.push(CatalogEntry {
            link,
            display_name,
            kind: classify_entry(&marker),
        });
    }
    entries
}

/// Detail-page link of every variant row on a secondary listing, in page
/// order. A row without an anchor yields an empty link, never a gap.
pub fn parse_variant_links(page: &Page, selectors: &CompiledSelectors) -> Vec<String> {
    page.select(&selectors.variant_row)
        .enumerate()
        .map(|(idx, row)| {
            let link = row.child_attr(&selectors.variant_link, "href");
            if link.is_empty() {
                debug!(row = idx + 1, page = %page.url(), "variant row has no link");
            }
            link
        })
        .collect()
}
