//! Post-pass run once every page of the build exists on disk.
//!
//! Prunes "See Also" entries whose targets were never written and unwraps
//! every remaining anchor that does not resolve to a local file.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::dom::{self, selector};
use crate::slug::slugify_filename;

static WITH_ID: LazyLock<Selector> = LazyLock::new(|| selector("[id]"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a"));

const SEE_ALSO_MARKER: &str = "see_also";
const HEADINGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedPage {
    pub html: String,
    pub unwrapped_links: usize,
    pub removed_see_also_items: usize,
    pub removed_see_also_section: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SanitizeReport {
    pub scanned: usize,
    pub rewritten: usize,
    pub unwrapped_links: usize,
    pub removed_see_also_items: usize,
    pub removed_see_also_sections: usize,
}

/// Returns `None` when the page already only links to existing documents.
pub fn sanitize_html(html: &str, documents_dir: &Path) -> Option<SanitizedPage> {
    let mut document = Html::parse_document(html);
    let resolves = |href: &str| link_resolves(documents_dir, href);

    let (removed_see_also_items, removed_see_also_section) =
        prune_see_also(&mut document, &resolves);

    let dangling = dom::select_ids(&document, &ANCHOR)
        .into_iter()
        .filter(|id| !dom::attribute(&document, *id, "href").is_some_and(&resolves))
        .collect::<Vec<_>>();
    let unwrapped_links = dangling.len();
    for id in dangling {
        dom::unwrap_node(&mut document, id);
    }

    if unwrapped_links == 0 && removed_see_also_items == 0 && !removed_see_also_section {
        return None;
    }
    Some(SanitizedPage {
        html: document.html(),
        unwrapped_links,
        removed_see_also_items,
        removed_see_also_section,
    })
}

pub fn sanitize_documents(documents_dir: &Path) -> Result<SanitizeReport> {
    let mut report = SanitizeReport::default();

    for entry in WalkDir::new(documents_dir)
        .max_depth(1)
        .sort_by_file_name()
        .follow_links(false)
    {
        let entry = entry.with_context(|| format!("failed to walk {}", documents_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("html") {
            continue;
        }

        report.scanned += 1;
        let html = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let Some(page) = sanitize_html(&html, documents_dir) else {
            continue;
        };

        fs::write(path, &page.html)
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!(
            file = %path.display(),
            unwrapped = page.unwrapped_links,
            see_also_items = page.removed_see_also_items,
            "sanitized page"
        );
        report.rewritten += 1;
        report.unwrapped_links += page.unwrapped_links;
        report.removed_see_also_items += page.removed_see_also_items;
        if page.removed_see_also_section {
            report.removed_see_also_sections += 1;
        }
    }

    info!(
        scanned = report.scanned,
        rewritten = report.rewritten,
        unwrapped = report.unwrapped_links,
        "sanitized documents"
    );
    Ok(report)
}

fn link_resolves(documents_dir: &Path, href: &str) -> bool {
    let local_name = slugify_filename(href);
    !local_name.is_empty() && documents_dir.join(local_name).is_file()
}

/// Removes See Also items that only point at missing pages, and the whole
/// section once its list is empty.
fn prune_see_also<F>(document: &mut Html, resolves: &F) -> (usize, bool)
where
    F: Fn(&str) -> bool,
{
    let Some(heading) = see_also_heading(document) else {
        return (0, false);
    };
    let Some(list) = dom::next_sibling_named(document, heading, "ul") else {
        return (0, false);
    };

    let items = list_items(document, list);
    let doomed = items
        .iter()
        .copied()
        .filter(|item| {
            let Some(element) = document.tree.get(*item).and_then(ElementRef::wrap) else {
                return false;
            };
            let mut anchors = element.select(&ANCHOR).peekable();
            anchors.peek().is_some()
                && !anchors.any(|anchor| anchor.value().attr("href").is_some_and(resolves))
        })
        .collect::<Vec<_>>();

    let removed = doomed.len();
    for item in doomed {
        dom::remove_node(document, item);
    }

    if list_items(document, list).is_empty() {
        dom::remove_node(document, heading);
        dom::remove_node(document, list);
        return (removed, true);
    }
    (removed, false)
}

fn see_also_heading(document: &Html) -> Option<NodeId> {
    let marker = document.root_element().select(&WITH_ID).find(|element| {
        element
            .value()
            .id()
            .is_some_and(|id| id.to_ascii_lowercase().contains(SEE_ALSO_MARKER))
    })?;

    if HEADINGS.contains(&marker.value().name()) {
        return Some(marker.id());
    }
    marker.parent().map(|parent| parent.id())
}

fn list_items(document: &Html, list: NodeId) -> Vec<NodeId> {
    document
        .tree
        .get(list)
        .map(|node| {
            node.children()
                .filter(|child| dom::element_name(document, child.id()) == Some("li"))
                .map(|child| child.id())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{sanitize_documents, sanitize_html};

    fn page(body: &str) -> String {
        format!(
            "<!DOCTYPE html>\n<html><head><title>t</title></head><body>{body}</body></html>"
        )
    }

    #[test]
    fn clean_page_is_left_alone() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("love-load.html"), "x").expect("write target");
        let html = page("<p><a href=\"love-load.html\">love.load</a></p>");
        assert!(sanitize_html(&html, temp.path()).is_none());
    }

    #[test]
    fn dangling_links_are_unwrapped() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("love-load.html"), "x").expect("write target");
        let html = page(
            "<p><a href=\"love-load.html\">ok</a> <a href=\"missing.html\">gone</a> <a>bare</a> <a href=\"\">empty</a></p>",
        );

        let sanitized = sanitize_html(&html, temp.path()).expect("changed");
        assert_eq!(sanitized.unwrapped_links, 3);
        assert!(sanitized.html.contains("<a href=\"love-load.html\">ok</a>"));
        assert!(sanitized.html.contains(" gone bare empty"));
        assert!(!sanitized.html.contains("missing.html"));
    }

    #[test]
    fn see_also_items_pointing_nowhere_are_removed() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("love-graphics.html"), "x").expect("write target");
        let html = page(concat!(
            "<h2><span class=\"mw-headline\" id=\"See_Also\">See Also</span></h2>",
            "<ul>",
            "<li><a href=\"love-graphics.html\">love.graphics</a></li>",
            "<li><a href=\"love-graphics-missing.html\">missing</a></li>",
            "<li>plain text</li>",
            "</ul>"
        ));

        let sanitized = sanitize_html(&html, temp.path()).expect("changed");
        assert_eq!(sanitized.removed_see_also_items, 1);
        assert!(!sanitized.removed_see_also_section);
        assert!(sanitized.html.contains("See Also"));
        assert!(sanitized.html.contains("love.graphics"));
        assert!(sanitized.html.contains("plain text"));
        assert!(!sanitized.html.contains("missing"));
    }

    #[test]
    fn empty_see_also_section_is_dropped() {
        let temp = tempdir().expect("tempdir");
        let html = page(concat!(
            "<h2 id=\"see_also\">See Also</h2>",
            "<p>between</p>",
            "<ul><li><a href=\"nowhere.html\">nowhere</a></li></ul>",
            "<p>after</p>"
        ));

        let sanitized = sanitize_html(&html, temp.path()).expect("changed");
        assert_eq!(sanitized.removed_see_also_items, 1);
        assert!(sanitized.removed_see_also_section);
        assert!(!sanitized.html.contains("See Also"));
        assert!(!sanitized.html.contains("<ul>"));
        assert!(sanitized.html.contains("<p>between</p>"));
        assert!(sanitized.html.contains("<p>after</p>"));
    }

    #[test]
    fn second_pass_leaves_files_byte_identical() {
        let temp = tempdir().expect("tempdir");
        let dir = temp.path();
        fs::write(
            dir.join("love-draw.html"),
            page(concat!(
                "<p>Calls <a href=\"love-load.html\">love.load</a> and <a href=\"love-quit.html\">quit</a>.</p>",
                "<h2><span id=\"See_Also\">See Also</span></h2>",
                "<ul><li><a href=\"love-quit.html\">love.quit</a></li></ul>"
            )),
        )
        .expect("write draw");
        fs::write(
            dir.join("love-load.html"),
            page("<p>Back to <a href=\"love-draw.html\">love.draw</a></p>"),
        )
        .expect("write load");
        fs::write(dir.join("main.css"), "a {}").expect("write css");

        let first = sanitize_documents(dir).expect("first pass");
        assert_eq!(first.scanned, 2);
        assert_eq!(first.rewritten, 1);
        assert_eq!(first.unwrapped_links, 1);
        assert_eq!(first.removed_see_also_items, 1);
        assert_eq!(first.removed_see_also_sections, 1);

        let draw = fs::read(dir.join("love-draw.html")).expect("read draw");
        let load = fs::read(dir.join("love-load.html")).expect("read load");

        let second = sanitize_documents(dir).expect("second pass");
        assert_eq!(second.scanned, 2);
        assert_eq!(second.rewritten, 0);
        assert_eq!(fs::read(dir.join("love-draw.html")).expect("reread draw"), draw);
        assert_eq!(fs::read(dir.join("love-load.html")).expect("reread load"), load);
    }
}
