use std::fs;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use reqwest::Url;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use crate::dom::{self, selector};
use crate::http::{WikiApi, resolve_url};
use crate::lister::PageLink;
use crate::runtime::{BundlePaths, STYLESHEET_FILENAME};

static STYLESHEET_LINK: LazyLock<Selector> =
    LazyLock::new(|| selector("link[rel~=\"stylesheet\"][href]"));
static PRINT_FOOTER: LazyLock<Selector> = LazyLock::new(|| selector("div.printfooter"));
static CATEGORY_LINKS: LazyLock<Selector> = LazyLock::new(|| selector("div.catlinks"));
static LANGUAGES: LazyLock<Selector> = LazyLock::new(|| selector("div.i18n"));
static FIRST_HEADING: LazyLock<Selector> = LazyLock::new(|| selector("h1#firstHeading"));
static BODY_CONTENT: LazyLock<Selector> = LazyLock::new(|| selector("div#bodyContent"));

/// Tracks whether the shared stylesheet has been handled during this run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StylesheetState {
    pub downloaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPage {
    /// Text of the page heading; empty when the wiki page has none.
    pub title: String,
    /// Name recorded in the search index.
    pub entry_name: String,
    pub html: String,
}

pub fn fetch_page<A: WikiApi>(
    api: &mut A,
    base_url: &Url,
    link: &PageLink,
    paths: &BundlePaths,
    stylesheet: &mut StylesheetState,
    title_suffix: &str,
) -> Result<NormalizedPage> {
    let url = resolve_url(base_url, &link.href)?;
    let raw = api.get_text(&url)?;
    debug!(url = %url, bytes = raw.len(), "fetched article");

    if !stylesheet.downloaded {
        ensure_stylesheet(api, &url, &raw, paths)?;
        stylesheet.downloaded = true;
    }

    let mut page = normalize_document(&raw, title_suffix);
    if page.title.is_empty() {
        warn!(url = %url, "article has no heading; falling back to link text");
        page.entry_name = link.display_text.clone();
    }
    Ok(page)
}

fn ensure_stylesheet<A: WikiApi>(
    api: &mut A,
    page_url: &Url,
    raw: &str,
    paths: &BundlePaths,
) -> Result<()> {
    if paths.stylesheet_path.exists() {
        debug!(path = %paths.stylesheet_path.display(), "stylesheet already present");
        return Ok(());
    }

    let href = {
        let document = Html::parse_document(raw);
        match document
            .select(&STYLESHEET_LINK)
            .next()
            .and_then(|link| link.value().attr("href"))
        {
            Some(href) => href.to_string(),
            None => bail!("article {page_url} has no stylesheet link"),
        }
    };

    let css_url = resolve_url(page_url, &href)?;
    let css = api.get_bytes(&css_url)?;
    fs::write(&paths.stylesheet_path, &css)
        .with_context(|| format!("failed to write {}", paths.stylesheet_path.display()))?;
    info!(url = %css_url, "downloaded stylesheet");
    Ok(())
}

/// Strips wiki chrome and wraps heading and content in the standalone template.
pub fn normalize_document(raw: &str, title_suffix: &str) -> NormalizedPage {
    let mut document = Html::parse_document(raw);

    for block in [&*PRINT_FOOTER, &*CATEGORY_LINKS] {
        for id in dom::select_ids(&document, block) {
            dom::remove_node(&mut document, id);
        }
    }

    if let Some(languages) = dom::select_ids(&document, &LANGUAGES).into_iter().next() {
        if let Some(heading) = dom::previous_sibling_named(&document, languages, "h2") {
            dom::remove_node(&mut document, heading);
        }
        dom::remove_node(&mut document, languages);
    }

    let heading = dom::select_ids(&document, &FIRST_HEADING).into_iter().next();
    let content = dom::select_ids(&document, &BODY_CONTENT).into_iter().next();

    let title = heading
        .and_then(|id| dom::text_content(&document, id))
        .map(|text| text.trim().to_string())
        .unwrap_or_default();
    let heading_html = heading
        .and_then(|id| dom::outer_html(&document, id))
        .unwrap_or_default();
    let content_html = content
        .and_then(|id| dom::outer_html(&document, id))
        .unwrap_or_default();

    let html = render_template(&title, title_suffix, &format!("{heading_html}{content_html}"));
    NormalizedPage {
        entry_name: title.clone(),
        title,
        html,
    }
}

fn render_template(title: &str, title_suffix: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<title>{} - {}</title>\n<meta charset=\"UTF-8\">\n<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n<link href=\"{STYLESHEET_FILENAME}\" rel=\"stylesheet\">\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        escape_text(title),
        escape_text(title_suffix),
    )
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use reqwest::Url;
    use tempfile::tempdir;

    use super::{StylesheetState, fetch_page, normalize_document};
    use crate::http::WikiApi;
    use crate::http::testing::MockWikiApi;
    use crate::lister::PageLink;
    use crate::runtime::{BundlePaths, InitOptions, init_layout};

    const ARTICLE: &str = r#"<!DOCTYPE html>
<html><head>
<link rel="stylesheet" href="/w/load.php?modules=skins.love&amp;only=styles">
</head><body>
<div id="content">
<h1 id="firstHeading" class="firstHeading">love.graphics.draw</h1>
<div id="bodyContent">
<p>Draws a <a href="/wiki/Drawable">Drawable</a> object.</p>
<h2>See Also</h2>
<ul><li><a href="/wiki/love.graphics">love.graphics</a></li></ul>
<h2>Other Languages</h2>
<div class="i18n"><a href="/wiki/love.graphics.draw_(Deutsch)">Deutsch</a></div>
<div class="printfooter">Retrieved from the wiki</div>
<div class="catlinks">Categories: Functions</div>
</div>
</div>
</body></html>"#;

    fn link() -> PageLink {
        PageLink {
            href: "/wiki/love.graphics.draw".to_string(),
            display_text: "love.graphics.draw".to_string(),
        }
    }

    #[test]
    fn normalize_document_strips_chrome_and_wraps_template() {
        let page = normalize_document(ARTICLE, "LOVE");
        assert_eq!(page.title, "love.graphics.draw");
        assert!(page.html.starts_with("<!DOCTYPE html>"));
        assert!(page.html.contains("<title>love.graphics.draw - LOVE</title>"));
        assert!(page.html.contains("<meta charset=\"UTF-8\">"));
        assert!(page.html.contains("<link href=\"main.css\" rel=\"stylesheet\">"));
        assert!(page.html.contains("id=\"firstHeading\""));
        assert!(page.html.contains("Draws a <a href=\"/wiki/Drawable\">Drawable</a> object."));
        assert!(page.html.contains("See Also"));
        assert!(!page.html.contains("Other Languages"));
        assert!(!page.html.contains("Deutsch"));
        assert!(!page.html.contains("printfooter"));
        assert!(!page.html.contains("catlinks"));
    }

    #[test]
    fn missing_blocks_degrade_without_failing() {
        let page = normalize_document("<html><body><p>stray</p></body></html>", "LOVE");
        assert_eq!(page.title, "");
        assert!(page.html.contains("<title> - LOVE</title>"));
        assert!(!page.html.contains("stray"));
    }

    #[test]
    fn footer_is_removed_even_without_category_links() {
        let page = normalize_document(
            "<h1 id=\"firstHeading\">T</h1><div id=\"bodyContent\"><p>x</p><div class=\"printfooter\">f</div></div>",
            "LOVE",
        );
        assert!(page.html.contains("<p>x</p>"));
        assert!(!page.html.contains("printfooter"));
    }

    #[test]
    fn headings_inside_removed_blocks_are_ignored() {
        let page = normalize_document(
            concat!(
                "<div class=\"catlinks\"><h1 id=\"firstHeading\">Category</h1></div>",
                "<h1 id=\"firstHeading\">love.load</h1>",
                "<div id=\"bodyContent\"><p>x</p></div>"
            ),
            "LOVE",
        );
        assert_eq!(page.title, "love.load");
        assert!(!page.html.contains("Category"));
    }

    #[test]
    fn stylesheet_is_fetched_once_per_run() {
        let temp = tempdir().expect("tempdir");
        let paths = BundlePaths::under(
            &temp.path().join("love2d.docset"),
            &temp.path().join("docsetgen.toml"),
        );
        init_layout(&paths, &InitOptions::default()).expect("init");
        let base = Url::parse("https://wiki.test").expect("base");
        let mut api = MockWikiApi::new()
            .with_page("https://wiki.test/wiki/love.graphics.draw", ARTICLE)
            .with_page(
                "https://wiki.test/w/load.php?modules=skins.love&only=styles",
                "body { color: black; }",
            );
        let mut stylesheet = StylesheetState::default();

        let fetched =
            fetch_page(&mut api, &base, &link(), &paths, &mut stylesheet, "LOVE").expect("fetch");
        assert_eq!(fetched.entry_name, "love.graphics.draw");
        assert!(stylesheet.downloaded);
        assert_eq!(api.request_count(), 2);
        assert_eq!(
            fs::read_to_string(&paths.stylesheet_path).expect("css"),
            "body { color: black; }"
        );

        fetch_page(&mut api, &base, &link(), &paths, &mut stylesheet, "LOVE").expect("refetch");
        assert_eq!(api.request_count(), 3);
    }

    #[test]
    fn existing_stylesheet_is_reused() {
        let temp = tempdir().expect("tempdir");
        let paths = BundlePaths::under(
            &temp.path().join("love2d.docset"),
            &temp.path().join("docsetgen.toml"),
        );
        init_layout(&paths, &InitOptions::default()).expect("init");
        fs::write(&paths.stylesheet_path, "cached").expect("write css");
        let base = Url::parse("https://wiki.test").expect("base");
        let mut api =
            MockWikiApi::new().with_page("https://wiki.test/wiki/love.graphics.draw", ARTICLE);
        let mut stylesheet = StylesheetState::default();

        fetch_page(&mut api, &base, &link(), &paths, &mut stylesheet, "LOVE").expect("fetch");
        assert!(stylesheet.downloaded);
        assert_eq!(api.request_count(), 1);
    }

    #[test]
    fn heading_fallback_uses_link_text() {
        let temp = tempdir().expect("tempdir");
        let paths = BundlePaths::under(
            &temp.path().join("love2d.docset"),
            &temp.path().join("docsetgen.toml"),
        );
        let base = Url::parse("https://wiki.test").expect("base");
        let mut api = MockWikiApi::new().with_page(
            "https://wiki.test/wiki/love.graphics.draw",
            "<div id=\"bodyContent\">body</div>",
        );
        let mut stylesheet = StylesheetState { downloaded: true };

        let fetched =
            fetch_page(&mut api, &base, &link(), &paths, &mut stylesheet, "LOVE").expect("fetch");
        assert_eq!(fetched.entry_name, "love.graphics.draw");
        assert_eq!(fetched.title, "");
    }
}
