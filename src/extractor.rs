use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::data_model::{LinkContext, LinkItem, PageMetadata};
use crate::error::Result;
use crate::utils::retry::BackoffPolicy;
use crate::utils::text::{aggregate_text, normalize_whitespace};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36";
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Elements whose text counts as link context.
const BLOCK_ELEMENTS: [&str; 5] = ["p", "h1", "h2", "h3", "li"];

/// Produces candidate link records for a page. The pipeline core treats
/// this as a black box; swapping in a rendering fetcher or a fixture-backed
/// stub only touches this seam.
#[async_trait]
pub trait LinkExtractor: Send + Sync {
    /// Fetch `url` and return one record per link found, tagged with
    /// `keyword` and `source_url`.
    async fn extract(&self, url: &str, keyword: &str) -> Result<Vec<LinkItem>>;
}

/// HTTP-backed extractor: fetch with retry and a polite randomized delay,
/// parse with CSS selectors.
pub struct HttpLinkExtractor {
    client: reqwest::Client,
    backoff: BackoffPolicy,
}

impl HttpLinkExtractor {
    pub fn new(backoff: BackoffPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(HttpLinkExtractor { client, backoff })
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        self.backoff
            .retry("page fetch", || async {
                let response = self.client.get(url).send().await?.error_for_status()?;
                Ok(response.text().await?)
            })
            .await
    }
}

#[async_trait]
impl LinkExtractor for HttpLinkExtractor {
    async fn extract(&self, url: &str, keyword: &str) -> Result<Vec<LinkItem>> {
        // Rate limiting: a randomized pause before hitting the target.
        let delay = rand::thread_rng().gen_range(2.0..5.0);
        tokio::time::sleep(Duration::from_secs_f64(delay)).await;

        info!(%url, %keyword, "Fetching target page");
        let html = self.fetch(url).await?;
        let links = parse_links(&html, url, keyword, Utc::now().timestamp());
        debug!(count = links.len(), %url, "Parsed links");
        if links.is_empty() {
            warn!(%url, "No links found on page");
        }
        Ok(links)
    }
}

/// Parse every `<a>` element out of `html`, attaching surrounding context,
/// the heading trail and page metadata. Synchronous on purpose:
/// `scraper::Html` is not `Send` and must not live across an await point.
pub fn parse_links(html: &str, source_url: &str, keyword: &str, scraped_at: i64) -> Vec<LinkItem> {
    let document = Html::parse_document(html);
    let metadata = extract_metadata(&document);

    let mut items: Vec<LinkItem> = Vec::new();
    // Indices of links still waiting for the next block element's text.
    let mut awaiting_next: Vec<usize> = Vec::new();
    let mut previous_text: Option<String> = None;
    // Trail of the most recent h1/h2/h3 above the current position,
    // outermost first.
    let mut heading_trail: Vec<(u8, String)> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        let name = element.value().name();

        if name == "a" {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let mut item = LinkItem {
                href: href.to_string(),
                text: non_empty(element_text(&element)),
                title: attr(&element, "title"),
                aria_label: attr(&element, "aria-label"),
                rel: attr(&element, "rel"),
                context: LinkContext {
                    previous_text: previous_text.clone(),
                    next_text: None,
                    heading_hierarchy: heading_trail.iter().map(|(_, t)| t.clone()).collect(),
                },
                metadata: metadata.clone(),
                source_url: source_url.to_string(),
                keyword: keyword.to_string(),
                scraped_at,
                ..Default::default()
            };
            item.processed_text = aggregate_text(&item);
            awaiting_next.push(items.len());
            items.push(item);
        } else if BLOCK_ELEMENTS.contains(&name) {
            let text = element_text(&element);
            if text.is_empty() {
                continue;
            }
            for index in awaiting_next.drain(..) {
                // Re-aggregate: next_text is part of the searchable text.
                items[index].context.next_text = Some(text.clone());
                let refreshed = aggregate_text(&items[index]);
                items[index].processed_text = refreshed;
            }
            if let Some(level) = heading_level(name) {
                heading_trail.retain(|(l, _)| *l < level);
                heading_trail.push((level, text.clone()));
            }
            previous_text = Some(text);
        }
    }

    items
}

fn extract_metadata(document: &Html) -> PageMetadata {
    let title_selector = Selector::parse("title").expect("static selector");
    let meta_selector = Selector::parse("meta[name=description]").expect("static selector");

    let title = document
        .select(&title_selector)
        .next()
        .map(|t| normalize_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());
    let description = document
        .select(&meta_selector)
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(normalize_whitespace)
        .filter(|d| !d.is_empty());
    PageMetadata { title, description }
}

fn element_text(element: &ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn attr(element: &ElementRef, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(normalize_whitespace)
        .filter(|v| !v.is_empty())
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        _ => None,
    }
}
