use async_trait::async_trait;
use reqwest::{Method, Request, Response};

/// Sends prepared requests. Decorators such as [`super::WithHeaders`] wrap
/// another client and adjust the request on the way through.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;

    /// Plain GET of an already-validated URL.
    async fn get(&self, url: reqwest::Url) -> reqwest::Result<Response> {
        self.execute(Request::new(Method::GET, url)).await
    }
}
