use std::collections::HashSet;
use std::sync::LazyLock;

use anyhow::{Result, bail};
use reqwest::Url;
use scraper::{Html, Selector};
use tracing::{debug, info};

use crate::category::CategoryJob;
use crate::dom::selector;
use crate::http::{WikiApi, resolve_url};

static RESULT_TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table.smwtable"));
static RESULT_CELL: LazyLock<Selector> = LazyLock::new(|| selector("td.smwtype_wpg"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub href: String,
    pub display_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    pub links: Vec<PageLink>,
    pub next_href: Option<String>,
}

/// Follows the listing's "Next" control until it disappears.
pub fn list_category_pages<A: WikiApi>(
    api: &mut A,
    base_url: &Url,
    job: &CategoryJob,
) -> Result<Vec<PageLink>> {
    let mut url = resolve_url(base_url, job.listing_path)?;
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    let mut page_count = 0usize;

    loop {
        let html = api.get_text(&url)?;
        let page = parse_listing_page(&html, &url)?;
        page_count += 1;
        debug!(url = %url, links = page.links.len(), "parsed listing page");

        for link in page.links {
            if seen.insert(link.href.clone()) {
                links.push(link);
            }
        }

        match page.next_href {
            Some(next) => url = resolve_url(base_url, &next)?,
            None => break,
        }
    }

    info!(
        entry_type = job.entry_type.as_str(),
        pages = page_count,
        links = links.len(),
        "listed category"
    );
    Ok(links)
}

pub fn parse_listing_page(html: &str, url: &Url) -> Result<ListingPage> {
    let document = Html::parse_document(html);
    let Some(table) = document.select(&RESULT_TABLE).next() else {
        bail!("listing page {url} has no result table");
    };

    let mut links = Vec::new();
    for cell in table.select(&RESULT_CELL) {
        let Some(anchor) = cell.select(&ANCHOR).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if is_variant_path(href) {
            continue;
        }
        links.push(PageLink {
            href: href.to_string(),
            display_text: anchor.text().collect::<String>().trim().to_string(),
        });
    }

    let next_href = document
        .select(&ANCHOR)
        .find(|anchor| anchor.text().collect::<String>() == "Next")
        .and_then(|anchor| anchor.value().attr("href"))
        .map(str::to_string);

    Ok(ListingPage { links, next_href })
}

/// Localized and disambiguation pages end in a parenthesized suffix.
fn is_variant_path(href: &str) -> bool {
    href.ends_with(')')
}
