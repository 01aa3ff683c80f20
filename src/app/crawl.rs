use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

use super::catalog::{Product, parse_listing_entries, parse_variant_links};
use super::error::{CrawlError, FetchError};
use super::extract::extract_characteristics;
use super::fetch::PageSource;
use super::page::{Page, resolve_href};
use super::selectors::CompiledSelectors;

pub const MAX_FETCH_CONCURRENCY: usize = 64;

pub fn sanitize_fetch_concurrency(value: usize) -> usize {
    value.clamp(1, MAX_FETCH_CONCURRENCY)
}

/// A product whose name is known but whose characteristics are not yet.
struct PendingProduct {
    name: String,
    detail: Option<Url>,
}

/// Run-scoped result collection. Slots fill in completion order and are read
/// back in discovery order.
struct Harvest {
    slots: Vec<Option<Product>>,
}

impl Harvest {
    fn with_len(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    fn publish(&mut self, index: usize, product: Product) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(product);
        }
    }

    fn into_products(self) -> Vec<Product> {
        self.slots.into_iter().flatten().collect()
    }
}

pub struct Crawler {
    source: Arc<dyn PageSource>,
    selectors: Arc<CompiledSelectors>,
    fetch_concurrency: usize,
}

impl Crawler {
    pub fn new(
        source: Arc<dyn PageSource>,
        selectors: CompiledSelectors,
        fetch_concurrency: usize,
    ) -> Self {
        Self {
            source,
            selectors: Arc::new(selectors),
            fetch_concurrency: sanitize_fetch_concurrency(fetch_concurrency),
        }
    }

    /// Walk the whole catalog below `root`.
    ///
    /// Only an unreachable root listing is an error; every other failure
    /// shrinks the result instead.
    pub async fn crawl(&self, root: &Url) -> Result<Vec<Product>, CrawlError> {
        let body = self
            .source
            .fetch(root)
            .await
            .map_err(|source| CrawlError::RootListing {
                url: root.clone(),
                source,
            })?;
        let entries = {
            let page = Page::parse(root.clone(), &body);
            parse_listing_entries(&page, &self.selectors)
        };
        info!(entries = entries.len(), url = %root, "root listing parsed");

        let mut pending = Vec::new();
        for (idx, entry) in entries.into_iter().enumerate() {
            info!(
                entry = idx + 1,
                name = %entry.display_name,
                leaf = entry.is_leaf(),
                "processing entry"
            );
            if entry.is_leaf() {
                pending.push(PendingProduct {
                    detail: resolve_detail(root, &entry.link, &entry.display_name),
                    name: entry.display_name,
                });
            } else {
                pending.extend(self.variant_targets(root, &entry.link, &entry.display_name).await);
            }
        }

        Ok(self.resolve_details(pending).await)
    }

    /// Secondary listing of an internal node. Every variant inherits the
    /// family's display name.
    async fn variant_targets(&self, base: &Url, link: &str, family: &str) -> Vec<PendingProduct> {
        let listing = match resolve_href(base, link) {
            Ok(url) => url,
            Err(err) => {
                warn!(family, error = %err, "variant listing link unusable, node skipped");
                return Vec::new();
            }
        };

        let body = match self.source.fetch(&listing).await {
            Ok(body) => body,
            Err(err) => {
                warn!(family, url = %listing, error = %err, "variant listing unreachable, node skipped");
                return Vec::new();
            }
        };

        let links = {
            let page = Page::parse(listing.clone(), &body);
            parse_variant_links(&page, &self.selectors)
        };
        debug!(family, url = %listing, variants = links.len(), "variant listing parsed");

        links
            .iter()
            .map(|href| PendingProduct {
                name: family.to_string(),
                detail: resolve_detail(&listing, href, family),
            })
            .collect()
    }

    /// Fetch every pending detail page with at most `fetch_concurrency`
    /// requests in flight. Each request keeps its own timeout.
    async fn resolve_details(&self, pending: Vec<PendingProduct>) -> Vec<Product> {
        let mut harvest = Harvest::with_len(pending.len());
        let mut queue = pending.into_iter().enumerate().collect::<VecDeque<_>>();
        let mut in_flight = HashMap::new();
        let mut set = JoinSet::new();

        loop {
            while set.len() < self.fetch_concurrency {
                let Some((index, item)) = queue.pop_front() else {
                    break;
                };
                let Some(url) = item.detail else {
                    harvest.publish(index, Product::without_characteristics(item.name));
                    continue;
                };

                let source = Arc::clone(&self.source);
                let selectors = Arc::clone(&self.selectors);
                let task_url = url.clone();
                let handle = set.spawn(async move {
                    extract_characteristics(source.as_ref(), &task_url, &selectors.detail_cell)
                        .await
                });
                in_flight.insert(handle.id(), (index, item.name, url));
            }

            let Some(joined) = set.join_next_with_id().await else {
                break;
            };
            let (id, outcome) = match joined {
                Ok((id, result)) => (id, Ok(result)),
                Err(err) => (err.id(), Err(err)),
            };
            let Some((index, name, url)) = in_flight.remove(&id) else {
                continue;
            };

            let product = match outcome {
                Ok(Ok(characteristics)) => Product::new(name, characteristics),
                Ok(Err(err)) => {
                    log_detail_failure(&url, &err);
                    Product::without_characteristics(name)
                }
                Err(err) => {
                    error!(url = %url, error = %err, "detail worker failed");
                    Product::without_characteristics(name)
                }
            };
            harvest.publish(index, product);
        }

        harvest.into_products()
    }
}

/// A missing or unusable link still yields a product, just without a page to read.
fn resolve_detail(base: &Url, href: &str, name: &str) -> Option<Url> {
    match resolve_href(base, href) {
        Ok(url) => Some(url),
        Err(err) => {
            warn!(name, error = %err, "detail link unusable, characteristics left empty");
            None
        }
    }
}

fn log_detail_failure(url: &Url, err: &FetchError) {
    warn!(url = %url, error = %err, "characteristics unavailable, product kept without them");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::fetch::testing::StaticSource;
    use crate::app::selectors::CatalogSelectors;

    const ROOT: &str = "https://shop.test/c/root?page=0";

    fn entry(link: &str, title: &str, order_number: &str) -> String {
        format!(
            r#"<div class="product-item"><div class="product__listing product__grid"><div class="details">
                 <a class="name" href="{link}" title="{title}">{title}</a>
                 <span class="order-number">{order_number}</span>
               </div></div></div>"#
        )
    }

    fn listing(entries: &[String]) -> String {
        format!("<html><body>{}</body></html>", entries.concat())
    }

    fn variants(links: &[&str]) -> String {
        let rows = links
            .iter()
            .map(|link| {
                format!(r#"<tr><td class="datatable-slim-style"><a href="{link}">{link}</a></td></tr>"#)
            })
            .collect::<String>();
        format!(r#"<table class="dataTable"><tbody>{rows}</tbody></table>"#)
    }

    fn detail(pairs: &[(&str, &str)]) -> String {
        let rows = pairs
            .iter()
            .map(|(k, v)| format!("<tr><td>{k}</td><td>{v}</td></tr>"))
            .collect::<String>();
        format!(
            r#"<div class="product-classifications"><table class="table"><tbody>{rows}</tbody></table></div>"#
        )
    }

    fn crawler(source: StaticSource, concurrency: usize) -> (Crawler, Arc<StaticSource>) {
        let source = Arc::new(source);
        let selectors = CatalogSelectors::default().compile().unwrap();
        (
            Crawler::new(source.clone(), selectors, concurrency),
            source,
        )
    }

    fn root() -> Url {
        Url::parse(ROOT).unwrap()
    }

    #[tokio::test]
    async fn leaf_and_internal_entries_resolve_in_discovery_order() {
        let source = StaticSource::default()
            .with_page(
                ROOT,
                listing(&[entry("/p/a", "A", "100"), entry("/c/b", "B", "")]),
            )
            .with_page(
                "https://shop.test/p/a",
                detail(&[("Color", "Red"), ("Size", "M")]),
            )
            .with_page("https://shop.test/c/b", variants(&["/p/b1"]))
            .with_page("https://shop.test/p/b1", detail(&[("Color", "Blue")]));
        let (crawler, _) = crawler(source, 4);

        let products = crawler.crawl(&root()).await.unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].name, "A");
        assert_eq!(products[0].characteristics["Color"], "Red");
        assert_eq!(products[0].characteristics["Size"], "M");
        assert_eq!(products[1].name, "B");
        assert_eq!(products[1].characteristics.len(), 1);
        assert_eq!(products[1].characteristics["Color"], "Blue");
    }

    #[tokio::test]
    async fn variants_inherit_the_family_name() {
        let source = StaticSource::default()
            .with_page(ROOT, listing(&[entry("/c/fam", "Hinge family", "")]))
            .with_page("https://shop.test/c/fam", variants(&["/p/1", "/p/2", "/p/3"]))
            .with_page("https://shop.test/p/1", detail(&[("Angle", "95")]))
            .with_page("https://shop.test/p/2", detail(&[("Angle", "110")]))
            .with_page("https://shop.test/p/3", detail(&[("Angle", "165")]));
        let (crawler, _) = crawler(source, 2);

        let products = crawler.crawl(&root()).await.unwrap();
        assert_eq!(products.len(), 3);
        assert!(products.iter().all(|p| p.name == "Hinge family"));
        let angles = products
            .iter()
            .map(|p| p.characteristics["Angle"].as_str())
            .collect::<Vec<_>>();
        assert_eq!(angles, ["95", "110", "165"]);
    }

    #[tokio::test]
    async fn failed_detail_page_keeps_an_empty_product() {
        let source = StaticSource::default()
            .with_page(
                ROOT,
                listing(&[
                    entry("/p/1", "One", "1"),
                    entry("/p/dead", "Dead", "2"),
                    entry("/p/3", "Three", "3"),
                ]),
            )
            .with_page("https://shop.test/p/1", detail(&[("K", "1")]))
            .with_page("https://shop.test/p/3", detail(&[("K", "3")]));
        let (crawler, _) = crawler(source, 1);

        let products = crawler.crawl(&root()).await.unwrap();
        assert_eq!(products.len(), 3);
        assert_eq!(products[1].name, "Dead");
        assert!(products[1].characteristics.is_empty());
        assert_eq!(products[2].characteristics["K"], "3");
    }

    #[tokio::test]
    async fn unreachable_variant_listing_skips_only_that_node() {
        let source = StaticSource::default()
            .with_page(
                ROOT,
                listing(&[entry("/c/gone", "Gone", ""), entry("/p/1", "Kept", "7")]),
            )
            .with_page("https://shop.test/p/1", detail(&[("K", "v")]));
        let (crawler, _) = crawler(source, 4);

        let products = crawler.crawl(&root()).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Kept");
    }

    #[tokio::test]
    async fn variant_rows_without_usable_links_keep_their_products() {
        let rows = r##"<table class="dataTable"><tbody>
            <tr><td class="datatable-slim-style"><a href="/p/1">1</a></td></tr>
            <tr><td class="datatable-slim-style">no anchor</td></tr>
            <tr><td class="datatable-slim-style"><a href="#">hash</a></td></tr>
        </tbody></table>"##;
        let source = StaticSource::default()
            .with_page(ROOT, listing(&[entry("/c/fam", "Family", "")]))
            .with_page("https://shop.test/c/fam", rows)
            .with_page("https://shop.test/p/1", detail(&[("K", "v")]));
        let (crawler, source) = crawler(source, 2);

        let products = crawler.crawl(&root()).await.unwrap();
        assert_eq!(products.len(), 3);
        assert!(products.iter().all(|p| p.name == "Family"));
        assert_eq!(products[0].characteristics["K"], "v");
        assert!(products[1].characteristics.is_empty());
        assert!(products[2].characteristics.is_empty());
        assert_eq!(source.requests().len(), 3);
    }

    #[tokio::test]
    async fn entries_without_links_follow_their_kind() {
        let no_href = |title: &str, order_number: &str| {
            format!(
                r#"<div class="product-item"><div class="product__listing product__grid"><div class="details">
                     <a class="name" title="{title}">{title}</a>
                     <span class="order-number">{order_number}</span>
                   </div></div></div>"#
            )
        };
        let source = StaticSource::default().with_page(
            ROOT,
            listing(&[
                no_href("NoHref", "1"),
                entry("#", "HashHref", "2"),
                no_href("Family", ""),
            ]),
        );
        let (crawler, source) = crawler(source, 4);

        let products = crawler.crawl(&root()).await.unwrap();
        let names = products.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["NoHref", "HashHref"]);
        assert!(products.iter().all(|p| p.characteristics.is_empty()));
        assert_eq!(source.requests(), vec![ROOT.to_string()]);
    }

    #[tokio::test]
    async fn unreachable_root_is_fatal() {
        let (crawler, source) = crawler(StaticSource::default(), 4);
        let err = crawler.crawl(&root()).await.unwrap_err();
        assert!(matches!(err, CrawlError::RootListing { .. }));
        assert_eq!(source.requests(), vec![ROOT.to_string()]);
    }

    #[tokio::test]
    async fn many_details_with_bounded_concurrency() {
        let links = (0..25).map(|i| format!("/p/{i}")).collect::<Vec<_>>();
        let link_refs = links.iter().map(String::as_str).collect::<Vec<_>>();
        let mut source = StaticSource::default()
            .with_page(ROOT, listing(&[entry("/c/big", "Big", "")]))
            .with_page("https://shop.test/c/big", variants(&link_refs));
        for i in 0..25 {
            if i % 5 != 0 {
                let value = i.to_string();
                source = source.with_page(
                    &format!("https://shop.test/p/{i}"),
                    detail(&[("Index", value.as_str())]),
                );
            }
        }
        let (crawler, _) = crawler(source, 3);

        let products = crawler.crawl(&root()).await.unwrap();
        assert_eq!(products.len(), 25);
        for (i, product) in products.iter().enumerate() {
            if i % 5 == 0 {
                assert!(product.characteristics.is_empty());
            } else {
                assert_eq!(product.characteristics["Index"], i.to_string());
            }
        }
    }

    #[test]
    fn concurrency_is_clamped() {
        assert_eq!(sanitize_fetch_concurrency(0), 1);
        assert_eq!(sanitize_fetch_concurrency(8), 8);
        assert_eq!(sanitize_fetch_concurrency(10_000), MAX_FETCH_CONCURRENCY);
    }
}
