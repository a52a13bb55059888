use async_trait::async_trait;
use reqwest::{Request, Response};

/// Seam for swapping the transport used by [`fetch_bytes`](super::fetch_bytes).
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
