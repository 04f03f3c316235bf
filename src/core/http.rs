use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

use crate::core::error::{LauncherError, LauncherResult};

const APP_USER_AGENT: &str = "MCLaunch/0.1.0";

/// Build the shared HTTP client.
///
/// Compression is disabled so `Content-Length` always describes the bytes
/// we are about to write.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .build()
}

/// An open response body.
pub struct RemoteBody {
    /// Length announced by the server, if any.
    pub content_length: Option<u64>,
    pub stream: BoxStream<'static, std::io::Result<Bytes>>,
}

/// Plain GET access to remote content.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch a whole (small) document into memory.
    async fn get_bytes(&self, url: &str) -> LauncherResult<Bytes>;

    /// Start a streaming download.
    async fn open(&self, url: &str) -> LauncherResult<RemoteBody>;
}

/// `Transport` over a reqwest client.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> LauncherResult<Self> {
        Ok(Self {
            client: build_http_client()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn send(&self, url: &str) -> LauncherResult<reqwest::Response> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_bytes(&self, url: &str) -> LauncherResult<Bytes> {
        let response = self.send(url).await?;
        Ok(response.bytes().await?)
    }

    async fn open(&self, url: &str) -> LauncherResult<RemoteBody> {
        let response = self.send(url).await?;
        let content_length = response.content_length();
        let stream = response
            .bytes_stream()
            .map_err(std::io::Error::other)
            .boxed();

        Ok(RemoteBody {
            content_length,
            stream,
        })
    }
}
