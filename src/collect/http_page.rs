//! A page driver that fetches the directions document over plain HTTP.
//!
//! It cannot run scripts, so only what the server sends inline is available:
//! a JSON body from a captured endpoint, inline `<script>` state, and text in
//! elements whose class names mark durations and distances.
//!
//! Only the top-level document is ever fetched. For a `/maps/dir/` URL that
//! document is HTML, so the background directions responses a real browser
//! would receive while the page loads are never seen and captured-response
//! extraction only applies when a JSON endpoint is fetched directly. Collecting
//! those background responses needs a script-capable [`Browser`]
//! implementation that records network traffic into
//! [`PageSnapshot::captured`].

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::extract::{CapturedResponse, PageSnapshot, should_capture};
use super::session::{Browser, PageDriver};
use crate::fetch::{FetchedPage, HttpClient, fetch_page};

/// Class names of elements holding the duration label, most specific first.
const DURATION_CLASSES: &[&str] = &["mDr44d", "duration"];
const DISTANCE_CLASSES: &[&str] = &["ivN21e", "distance"];

static SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>(.*?)</script>").expect("valid regex"));

static CLASS_TEXT: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    DURATION_CLASSES
        .iter()
        .chain(DISTANCE_CLASSES)
        .map(|class| {
            let pattern = format!(
                r#"(?s)class="[^"]*{}[^"]*"[^>]*>\s*(?:<[a-z]+[^>]*>\s*)*([^<]+)"#,
                regex::escape(class)
            );
            (*class, Regex::new(&pattern).expect("valid regex"))
        })
        .collect()
});

/// Launches [`HttpPage`]s sharing one client.
pub struct HttpBrowser<C> {
    client: Arc<C>,
}

impl<C: HttpClient + 'static> HttpBrowser<C> {
    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[async_trait]
impl<C: HttpClient + 'static> Browser for HttpBrowser<C> {
    async fn launch(&self) -> anyhow::Result<Box<dyn PageDriver>> {
        Ok(Box::new(HttpPage {
            client: Arc::clone(&self.client),
            captured: Vec::new(),
        }))
    }
}

pub struct HttpPage<C> {
    client: Arc<C>,
    captured: Vec<CapturedResponse>,
}

#[async_trait]
impl<C: HttpClient + 'static> PageDriver for HttpPage<C> {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> anyhow::Result<PageSnapshot> {
        let page = tokio::time::timeout(timeout, fetch_page(self.client.as_ref(), url))
            .await
            .with_context(|| format!("navigation timed out after {timeout:?}"))??;
        if !page.is_success() {
            bail!("navigation returned HTTP {}", page.status);
        }
        self.captured.extend(captured_from_page(&page));
        let mut snapshot = snapshot_from_page(&page);
        snapshot.captured = self.captured.clone();
        debug!(url = %page.url, captured = snapshot.captured.len(), scripts = snapshot.scripts.len(), "Page loaded");
        Ok(snapshot)
    }

    fn clear_captured(&mut self) {
        self.captured.clear();
    }

    async fn shutdown(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The fetched document as a captured response, when it is a JSON body from
/// one of the capture endpoints. HTML pages are read by [`snapshot_from_page`].
pub fn captured_from_page(page: &FetchedPage) -> Option<CapturedResponse> {
    (page.is_json() && should_capture(&page.url)).then(|| CapturedResponse {
        url: page.url.clone(),
        body: page.body.clone(),
    })
}

/// Reads scripts and labelled text out of a fetched document.
pub fn snapshot_from_page(page: &FetchedPage) -> PageSnapshot {
    let mut snapshot = PageSnapshot {
        url: page.url.clone(),
        ..Default::default()
    };
    if page.is_json() {
        return snapshot;
    }

    snapshot.scripts = SCRIPT
        .captures_iter(&page.body)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    for (class, re) in CLASS_TEXT.iter() {
        let texts = re.captures_iter(&page.body).map(|c| clean_text(&c[1]));
        if DURATION_CLASSES.contains(class) {
            snapshot.duration_texts.extend(texts);
        } else {
            snapshot.distance_texts.extend(texts);
        }
    }
    snapshot.duration_texts.retain(|t| !t.is_empty());
    snapshot.distance_texts.retain(|t| !t.is_empty());
    snapshot
}

fn clean_text(raw: &str) -> String {
    raw.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace('\u{a0}', " ")
        .trim()
        .to_string()
}
