//! Main-text extraction from fetched markup
//!
//! Non-content subtrees (scripts, media, forms, navigation chrome) are
//! detached from the parsed tree first. Every node matching one of the
//! content selectors is then measured by visible text length and the
//! longest one wins; without any match the cleaned body is used.

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

use slopscan_core::{normalize_text, ExtractionPayload, TextSource};

/// Subtrees that never contribute prose
const REMOVED_SELECTOR: &str = "script, style, noscript, template, iframe, object, embed, \
     video, audio, canvas, svg, picture, form, button, input, select, textarea, \
     nav, footer, header, aside";

/// Content block candidates, in priority order
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    "[itemprop='articleBody']",
    ".article-body",
    ".article-content",
    ".post-content",
    ".entry-content",
    ".post-body",
    ".story-body",
    ".content",
    "#content",
    "#main",
];

/// Elements that break the text flow
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "h1", "h2",
    "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre", "section", "table", "td", "th",
    "tr", "ul",
];

static REMOVED: LazyLock<Selector> = LazyLock::new(|| Selector::parse(REMOVED_SELECTOR).unwrap());

static CANDIDATES: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    CONTENT_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});

static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());

static HEADINGS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1, h2, h3").unwrap());

static LINKS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Extract a scoring sample from `markup` served at `base_url`
pub fn extract(markup: &str, base_url: &str) -> ExtractionPayload {
    if markup.trim().is_empty() {
        return ExtractionPayload::empty(TextSource::Fetched);
    }

    let mut document = Html::parse_document(markup);
    strip_non_content(&mut document);

    let Some((main, text)) = select_main(&document) else {
        return ExtractionPayload::empty(TextSource::Fetched);
    };

    let headings_text = normalize_text(
        &main
            .select(&HEADINGS)
            .map(|h| normalize_text(&visible_text(h)))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
    );

    let external_link_count = count_external_links(main, base_url);

    debug!(
        "Extracted {} chars, {} external links from {}",
        text.chars().count(),
        external_link_count,
        base_url
    );

    ExtractionPayload {
        text,
        headings_text,
        external_link_count,
        source: TextSource::Fetched,
    }
}

/// Detach every non-content subtree from the document
fn strip_non_content(document: &mut Html) {
    let doomed: Vec<_> = document.select(&REMOVED).map(|el| el.id()).collect();
    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Longest matching content block with its normalized text, or the body
fn select_main(document: &Html) -> Option<(ElementRef<'_>, String)> {
    let mut best: Option<(ElementRef<'_>, String, usize)> = None;

    for selector in CANDIDATES.iter() {
        for candidate in document.select(selector) {
            let text = normalize_text(&visible_text(candidate));
            let len = text.chars().count();
            if len == 0 {
                continue;
            }
            if best.as_ref().map_or(true, |(_, _, best_len)| len > *best_len) {
                best = Some((candidate, text, len));
            }
        }
    }

    if let Some((el, text, _)) = best {
        return Some((el, text));
    }

    let body = document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element());
    Some((body, normalize_text(&visible_text(body))))
}

/// Text content with line breaks around block elements
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_ELEMENTS.contains(&el.name());
                if block {
                    out.push('\n');
                }
                collect_text(child_el, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Links whose resolved host differs from the page host.
/// Unparseable and host-less links are skipped.
fn count_external_links(element: ElementRef<'_>, base_url: &str) -> usize {
    let base = Url::parse(base_url).ok();
    let page_host = base.as_ref().and_then(|b| b.host_str().map(str::to_string));

    element
        .select(&LINKS)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| {
            let resolved = match &base {
                Some(b) => b.join(href.trim()),
                None => Url::parse(href.trim()),
            };
            resolved.ok()
        })
        .filter_map(|link| link.host_str().map(str::to_string))
        .filter(|host| page_host.as_deref() != Some(host.as_str()))
        .count()
}
