use scraper::Selector;
use tracing::debug;
use url::Url;

use super::catalog::Characteristics;
use super::error::FetchError;
use super::fetch::PageSource;
use super::page::Page;

/// Fetch one detail page and fold its name/value cells into a mapping.
///
/// Nothing is returned on failure; the caller decides what an unreadable
/// product looks like.
pub async fn extract_characteristics(
    source: &dyn PageSource,
    url: &Url,
    detail_cell: &Selector,
) -> Result<Characteristics, FetchError> {
    let body = source.fetch(url).await?;
    let cells = detail_cells(&Page::parse(url.clone(), &body), detail_cell);
    debug!(url = %url, cells = cells.len(), "detail page parsed");
    Ok(pair_cells(cells))
}

pub fn detail_cells(page: &Page, detail_cell: &Selector) -> Vec<String> {
    page.select(detail_cell).map(|cell| cell.text()).collect()
}

/// Fold `[name, value, name, value, ...]` into a map.
///
/// An unpaired trailing cell is dropped and a repeated name keeps its last value.
pub fn pair_cells<I, S>(cells: I) -> Characteristics
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = Characteristics::new();
    let mut cells = cells.into_iter();
    while let (Some(name), Some(value)) = (cells.next(), cells.next()) {
        out.insert(
            name.as_ref().trim().to_string(),
            value.as_ref().trim().to_string(),
        );
    }
    out
}
