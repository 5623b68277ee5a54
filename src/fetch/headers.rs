use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};

/// Desktop browser identity presented to the directions page.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// An [`HttpClient`] wrapper that sets a fixed set of headers on every request.
///
/// Headers already present on the request are overwritten.
pub struct WithHeaders<C> {
    pub inner: C,
    pub headers: HeaderMap,
}

impl<C> WithHeaders<C> {
    /// Browser-like `User-Agent` plus an `Accept-Language` for `locale`
    /// (e.g. `"id-ID"`), so visible text comes back in a predictable language.
    pub fn browser(inner: C, locale: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DESKTOP_USER_AGENT));
        if let Ok(value) = HeaderValue::from_str(locale) {
            headers.insert(ACCEPT_LANGUAGE, value);
        }
        Self { inner, headers }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for WithHeaders<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        for (name, value) in &self.headers {
            req.headers_mut().insert(name.clone(), value.clone());
        }
        self.inner.execute(req).await
    }
}
