use std::fs;
use std::path::Path;

use scraper::Selector;
use serde::Deserialize;

use super::error::ConfigError;

/// CSS selectors describing where each catalog tier keeps its data.
///
/// The defaults match the shop layout the tool was first written against;
/// any subset can be overridden from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatalogSelectors {
    /// One element per entry on the root listing.
    pub entry: String,
    /// Inside an entry: the anchor carrying `href` and the `title` display name.
    pub entry_link: String,
    /// Inside an entry: text that only leaf products render.
    pub leaf_marker: String,
    /// One element per variant on a secondary listing.
    pub variant_row: String,
    /// Inside a variant row: the anchor to the detail page.
    pub variant_link: String,
    /// Flat name/value cells on a detail page, in document order.
    pub detail_cell: String,
}

impl Default for CatalogSelectors {
    fn default() -> Self {
        Self {
            entry: ".product-item".to_string(),
            entry_link: ".product__listing.product__grid .details .name".to_string(),
            leaf_marker: ".product__listing.product__grid .details .order-number".to_string(),
            variant_row: "table.dataTable tbody tr".to_string(),
            variant_link: ".datatable-slim-style a".to_string(),
            detail_cell: ".product-classifications table.table td".to_string(),
        }
    }
}

impl CatalogSelectors {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::SelectorFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::SelectorJson {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn compile(&self) -> Result<CompiledSelectors, ConfigError> {
        Ok(CompiledSelectors {
            entry: parse_selector("entry", &self.entry)?,
            entry_link: parse_selector("entry_link", &self.entry_link)?,
            leaf_marker: parse_selector("leaf_marker", &self.leaf_marker)?,
            variant_row: parse_selector("variant_row", &self.variant_row)?,
            variant_link: parse_selector("variant_link", &self.variant_link)?,
            detail_cell: parse_selector("detail_cell", &self.detail_cell)?,
        })
    }
}

fn parse_selector(field: &'static str, raw: &str) -> Result<Selector, ConfigError> {
    Selector::parse(raw).map_err(|_| ConfigError::Selector {
        field,
        selector: raw.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub entry: Selector,
    pub entry_link: Selector,
    pub leaf_marker: Selector,
    pub variant_row: Selector,
    pub variant_link: Selector,
    pub detail_cell: Selector,
}
