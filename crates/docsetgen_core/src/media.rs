use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use lol_html::{HtmlRewriter, Settings, element};
use reqwest::Url;
use tracing::debug;

use crate::http::{WikiApi, resolve_url};
use crate::slug::slugify_filename;

/// An image referenced by a page, keyed by its slugified local name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub source: String,
    pub local_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct MediaReport {
    pub html: String,
    pub downloaded: usize,
    pub cached: usize,
}

/// Points every `<img src>` at its local file and lists the distinct assets.
pub fn rewrite_media_sources(html: &str) -> Result<(String, Vec<MediaAsset>)> {
    let mut assets = Vec::new();
    let mut seen = HashSet::new();
    let mut output = Vec::with_capacity(html.len());

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("img[src]", |el| {
                let Some(source) = el.get_attribute("src") else {
                    return Ok(());
                };
                let local_name = slugify_filename(&source);
                el.set_attribute("src", &local_name)?;
                if seen.insert(local_name.clone()) {
                    assets.push(MediaAsset { source, local_name });
                }
                Ok(())
            })],
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|e| anyhow::anyhow!("failed to rewrite media sources: {e}"))?;
    rewriter
        .end()
        .map_err(|e| anyhow::anyhow!("failed to finish media rewrite: {e}"))?;

    let html = String::from_utf8(output).context("media rewrite produced invalid UTF-8")?;
    Ok((html, assets))
}

/// Rewrites image sources and fetches every asset not yet on disk.
pub fn download_media<A: WikiApi>(
    api: &mut A,
    media_base_url: &Url,
    documents_dir: &Path,
    html: &str,
) -> Result<MediaReport> {
    let (html, assets) = rewrite_media_sources(html)?;
    let mut report = MediaReport {
        html,
        ..MediaReport::default()
    };

    for asset in assets {
        let target = documents_dir.join(&asset.local_name);
        if target.exists() {
            debug!(file = %asset.local_name, "media already cached");
            report.cached += 1;
            continue;
        }

        let url = resolve_url(media_base_url, &asset.source)?;
        let bytes = api.get_bytes(&url)?;
        fs::write(&target, &bytes)
            .with_context(|| format!("failed to write {}", target.display()))?;
        debug!(url = %url, file = %asset.local_name, bytes = bytes.len(), "downloaded media");
        report.downloaded += 1;
    }

    Ok(report)
}
