//! HTTP access behind a small trait so page sessions and the geocoder can be
//! exercised without a network.

mod basic;
mod client;
mod headers;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use headers::{DESKTOP_USER_AGENT, WithHeaders};

use anyhow::Result;
use reqwest::header::CONTENT_TYPE;

/// A fetched document with the metadata needed to decide how to read it.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl FetchedPage {
    pub fn is_json(&self) -> bool {
        self.content_type.contains("application/json")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let resp = client.get(url.parse()?).await?;
    Ok(resp.bytes().await?.to_vec())
}

/// GETs `url` and returns its body as text along with status and content type.
pub async fn fetch_page<C: HttpClient>(client: &C, url: &str) -> Result<FetchedPage> {
    let resp = client.get(url.parse()?).await?;
    let status = resp.status().as_u16();
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let final_url = resp.url().to_string();
    let body = resp.text().await?;

    Ok(FetchedPage {
        url: final_url,
        status,
        content_type,
        body,
    })
}
