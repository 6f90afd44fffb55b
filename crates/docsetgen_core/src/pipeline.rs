use std::fs;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::Serialize;
use tracing::info;

use crate::category::{CATEGORY_JOBS, CategoryJob};
use crate::config::DocsetConfig;
use crate::fetcher::{StylesheetState, fetch_page};
use crate::http::WikiApi;
use crate::index::{IndexStats, SearchIndex};
use crate::lister::{PageLink, list_category_pages};
use crate::links::rewrite_links;
use crate::media::download_media;
use crate::runtime::{BundlePaths, InitOptions, init_layout};
use crate::sanitize::{SanitizeReport, sanitize_documents};
use crate::slug::slugify;

#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub entry_type: String,
    pub listed: usize,
    pub written: usize,
    pub inserted: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub categories: Vec<CategoryReport>,
    pub pages_written: usize,
    pub entries_inserted: usize,
    pub media_downloaded: usize,
    pub media_cached: usize,
    pub links_kept: usize,
    pub links_unwrapped: usize,
    pub requests: usize,
    pub sanitize: SanitizeReport,
    pub index: IndexStats,
}

struct BuildContext<'a, A> {
    api: &'a mut A,
    paths: &'a BundlePaths,
    base_url: Url,
    media_base_url: Url,
    title_suffix: &'a str,
    index: SearchIndex,
    stylesheet: StylesheetState,
    totals: PageTotals,
}

#[derive(Default)]
struct PageTotals {
    media_downloaded: usize,
    media_cached: usize,
    links_kept: usize,
    links_unwrapped: usize,
}

/// Crawls every category into the bundle, then runs the link post-pass.
pub fn run_build<A: WikiApi>(
    paths: &BundlePaths,
    config: &DocsetConfig,
    api: &mut A,
) -> Result<BuildReport> {
    init_layout(paths, &InitOptions::default())?;

    let mut context = BuildContext {
        base_url: config.site.base_url()?,
        media_base_url: config.site.media_base_url()?,
        title_suffix: config.site.title_suffix(),
        index: SearchIndex::create(&paths.index_path)?,
        stylesheet: StylesheetState::default(),
        totals: PageTotals::default(),
        api,
        paths,
    };

    let mut categories = Vec::with_capacity(CATEGORY_JOBS.len());
    for job in &CATEGORY_JOBS {
        categories.push(build_category(&mut context, job)?);
    }

    let sanitize = sanitize_documents(&paths.documents_dir)?;
    let index = context.index.stats()?;
    let totals = context.totals;

    let report = BuildReport {
        pages_written: categories.iter().map(|category| category.written).sum(),
        entries_inserted: categories.iter().map(|category| category.inserted).sum(),
        categories,
        media_downloaded: totals.media_downloaded,
        media_cached: totals.media_cached,
        links_kept: totals.links_kept,
        links_unwrapped: totals.links_unwrapped,
        requests: context.api.request_count(),
        sanitize,
        index,
    };
    info!(
        pages = report.pages_written,
        entries = report.entries_inserted,
        requests = report.requests,
        "docset build complete"
    );
    Ok(report)
}

fn build_category<A: WikiApi>(
    context: &mut BuildContext<'_, A>,
    job: &CategoryJob,
) -> Result<CategoryReport> {
    let links = list_category_pages(&mut *context.api, &context.base_url, job)?;
    let mut report = CategoryReport {
        entry_type: job.entry_type.as_str().to_string(),
        listed: links.len(),
        written: 0,
        inserted: 0,
        duplicates: 0,
    };

    for link in &links {
        let (name, filename) = build_page(context, link)?;
        report.written += 1;

        let inserted = context
            .index
            .insert_entry(&name, job.entry_type.as_str(), &filename)?;
        if inserted {
            report.inserted += 1;
            info!(
                name = %name,
                entry_type = job.entry_type.as_str(),
                path = %filename,
                "indexed entry"
            );
        } else {
            report.duplicates += 1;
        }
    }

    Ok(report)
}

/// Fetches, localizes and writes one article; returns its entry name and filename.
fn build_page<A: WikiApi>(
    context: &mut BuildContext<'_, A>,
    link: &PageLink,
) -> Result<(String, String)> {
    let page = fetch_page(
        &mut *context.api,
        &context.base_url,
        link,
        context.paths,
        &mut context.stylesheet,
        context.title_suffix,
    )?;
    let media = download_media(
        &mut *context.api,
        &context.media_base_url,
        &context.paths.documents_dir,
        &page.html,
    )?;
    let rewritten = rewrite_links(&media.html)?;

    context.totals.media_downloaded += media.downloaded;
    context.totals.media_cached += media.cached;
    context.totals.links_kept += rewritten.kept;
    context.totals.links_unwrapped += rewritten.unwrapped;

    let filename = document_filename(&link.href);
    let target = context.paths.document_path(&filename);
    fs::write(&target, &rewritten.html)
        .with_context(|| format!("failed to write {}", target.display()))?;
    Ok((page.entry_name, filename))
}

/// `<slug of the last path segment>.html`
pub fn document_filename(href: &str) -> String {
    let last_segment = href.rsplit('/').next().unwrap_or(href);
    format!("{}.html", slugify(last_segment))
}
