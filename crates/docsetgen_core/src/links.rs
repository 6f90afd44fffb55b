use std::collections::HashSet;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use lol_html::{HtmlRewriter, Settings, element};
use regex::Regex;

use crate::slug::slugify;

static VERSION_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+").expect("valid version regex"));

const WIKI_PREFIX: &str = "/wiki";
const RESTRICTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "php"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnwrapReason {
    /// Release-notes pages such as `/wiki/0.10.2`.
    Version,
    OutOfScope,
    /// Localized or disambiguated page variants.
    Variant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    Keep,
    Unwrap(UnwrapReason),
}

#[derive(Debug, Clone, Default)]
pub struct RewriteReport {
    pub html: String,
    pub kept: usize,
    pub unwrapped: usize,
}

pub fn classify_href(href: &str) -> LinkAction {
    let last_segment = href.rsplit('/').next().unwrap_or(href);
    if VERSION_SEGMENT.is_match(last_segment) {
        return LinkAction::Unwrap(UnwrapReason::Version);
    }
    if !href.starts_with(WIKI_PREFIX) || has_restricted_extension(href) {
        return LinkAction::Unwrap(UnwrapReason::OutOfScope);
    }
    if href.contains(['(', ')']) {
        return LinkAction::Unwrap(UnwrapReason::Variant);
    }
    LinkAction::Keep
}

fn has_restricted_extension(href: &str) -> bool {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.rsplit_once('.').is_some_and(|(_, extension)| {
        RESTRICTED_EXTENSIONS
            .iter()
            .any(|restricted| extension.eq_ignore_ascii_case(restricted))
    })
}

/// Local filename a kept wiki link points at after rewriting.
pub fn local_target(href: &str) -> String {
    let page = href.strip_prefix("/wiki/").unwrap_or(href);
    format!("{}.html", slugify(page))
}

/// Unwraps anchors that leave the docset, then retargets the rest at local files.
pub fn rewrite_links(html: &str) -> Result<RewriteReport> {
    let mut candidates = Vec::new();
    let mut seen = HashSet::new();
    let mut kept = 0usize;
    let mut unwrapped = 0usize;
    let mut output = Vec::with_capacity(html.len());

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("a", |el| {
                let action = match el.get_attribute("href") {
                    Some(href) => {
                        let action = classify_href(&href);
                        if action == LinkAction::Keep && seen.insert(href.clone()) {
                            candidates.push(href);
                        }
                        action
                    }
                    None => LinkAction::Unwrap(UnwrapReason::OutOfScope),
                };
                match action {
                    LinkAction::Keep => kept += 1,
                    LinkAction::Unwrap(_) => {
                        el.remove_and_keep_content();
                        unwrapped += 1;
                    }
                }
                Ok(())
            })],
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|e| anyhow::anyhow!("failed to rewrite links: {e}"))?;
    rewriter
        .end()
        .map_err(|e| anyhow::anyhow!("failed to finish link rewrite: {e}"))?;

    let mut html = String::from_utf8(output).context("link rewrite produced invalid UTF-8")?;
    for href in candidates {
        html = html.replace(
            &format!("href=\"{href}\""),
            &format!("href=\"{}\"", local_target(&href)),
        );
    }

    Ok(RewriteReport {
        html,
        kept,
        unwrapped,
    })
}
