//! Headless browser scrape tier
//!
//! Last resort before the placeholder. A Chromium-family binary renders the
//! page (`--dump-dom`) and the resulting DOM is read with `scraper`. Selector
//! coverage is best effort; pages that never render a `<video>` element still
//! yield their textual metadata.

use crate::extractor::models::{FormatDescriptor, MetadataPatch};
use crate::extractor::traits::MetadataSource;
use crate::resolver::VideoReference;
use crate::utils::error::LoopError;
use anyhow::Result;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

fn first<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector).next()
}

fn text_of(doc: &Html, css: &str) -> Option<String> {
    first(doc, css)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn attr_of(doc: &Html, css: &str, attr: &str) -> Option<String> {
    first(doc, css)
        .and_then(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn meta_content(doc: &Html, key: &str) -> Option<String> {
    attr_of(doc, &format!(r#"meta[property="{key}"]"#), "content")
        .or_else(|| attr_of(doc, &format!(r#"meta[name="{key}"]"#), "content"))
}

/// Read metadata out of a rendered DOM.
///
/// Fields that come from the `<video>` element (poster, source, formats) are
/// only kept when one is present.
pub fn parse_dom(html: &str) -> MetadataPatch {
    let doc = Html::parse_document(html);
    let video = first(&doc, "video");

    let title = meta_content(&doc, "og:title")
        .or_else(|| text_of(&doc, r#"h1, h2, [data-testid="post_message"]"#))
        .or_else(|| text_of(&doc, "title"));

    let description = meta_content(&doc, "og:description")
        .or_else(|| text_of(&doc, r#"[data-testid="post_message"]"#))
        .or_else(|| text_of(&doc, r#"[data-testid="post_caption"]"#));

    let author_name = text_of(&doc, r#"[data-testid="post_actor_name"]"#)
        .or_else(|| meta_content(&doc, "author"));

    let poster = video
        .and_then(|v| v.value().attr("poster"))
        .map(str::to_string);

    let source_url = video.and_then(|v| {
        v.value()
            .attr("src")
            .map(str::to_string)
            .or_else(|| {
                let selector = Selector::parse("source[src]").ok()?;
                v.select(&selector)
                    .next()
                    .and_then(|s| s.value().attr("src"))
                    .map(str::to_string)
            })
            // MSE blob URLs are useless outside the page
            .filter(|src| !src.starts_with("blob:"))
    });

    let formats = video.map(|_| {
        vec![FormatDescriptor {
            quality_label: "HD".to_string(),
            container: "mp4".to_string(),
            approx_size_bytes: None,
            source_url,
        }]
    });

    MetadataPatch {
        title,
        description,
        thumbnail_url: poster.or_else(|| meta_content(&doc, "og:image")),
        duration_seconds: meta_content(&doc, "video:duration").and_then(|d| d.parse().ok()),
        author_name,
        formats,
        ..Default::default()
    }
    .normalized()
}

/// Metadata tier that renders the page in a headless browser
pub struct BrowserScrapeSource {
    browser_path: PathBuf,
    timeout: Duration,
    media_wait: Duration,
}

impl BrowserScrapeSource {
    pub fn new(browser_path: impl Into<PathBuf>, timeout: Duration, media_wait: Duration) -> Self {
        Self {
            browser_path: browser_path.into(),
            timeout,
            media_wait,
        }
    }

    async fn dump_dom(&self, url: &str) -> Result<String> {
        let budget_ms = self.media_wait.as_millis().max(1);
        debug!(
            "Scraping {} with {:?} (media wait {}ms)",
            url, self.browser_path, budget_ms
        );

        let child = AsyncCommand::new(&self.browser_path)
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg(format!("--user-agent={}", USER_AGENT))
            .arg(format!("--virtual-time-budget={}", budget_ms))
            .arg("--dump-dom")
            .arg(url)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                LoopError::UpstreamUnavailable(format!(
                    "browser scrape timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| LoopError::from_spawn("chromium", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Headless browser exited with {}: {}", output.status, stderr.trim());
            return Err(LoopError::UpstreamUnavailable(format!(
                "browser exited with {}",
                output.status
            ))
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl MetadataSource for BrowserScrapeSource {
    fn id(&self) -> &'static str {
        "browser"
    }

    async fn fetch(&self, video: &VideoReference) -> Result<MetadataPatch> {
        let html = self.dump_dom(&video.url).await?;
        let patch = parse_dom(&html);
        if patch.formats.is_none() {
            debug!("No <video> element rendered for {}", video.url);
        }
        Ok(patch)
    }
}
