use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared, WeakShared};
use log::{debug, info, warn};
use reqwest::Client;

use crate::config::FETCH_TIMEOUT;
use crate::engine::models::ManifestDocument;
use crate::error::FetchError;

/// Source of the remote version manifest.
///
/// Implementations perform exactly one request per call and never retry.
/// Dropping the returned future abandons the request.
pub trait ManifestFetcher: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<ManifestDocument, FetchError>> + Send;
}

impl<F: ManifestFetcher> ManifestFetcher for Arc<F> {
    fn fetch(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<ManifestDocument, FetchError>> + Send {
        (**self).fetch(url, timeout)
    }
}

#[derive(Clone)]
pub struct NetworkClient {
    client: Client,
}

impl Default for NetworkClient {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("guru-sdk-installer/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|err| {
                warn!("network client: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        Self { client }
    }

    async fn get_text(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let map_send = |err: reqwest::Error| {
            if err.is_timeout() {
                FetchError::Timeout {
                    url: url.to_owned(),
                    after: timeout,
                }
            } else {
                FetchError::Request {
                    url: url.to_owned(),
                    message: err.to_string(),
                }
            }
        };

        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_send)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(map_send)
    }
}

impl ManifestFetcher for NetworkClient {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<ManifestDocument, FetchError> {
        info!("fetch: requesting manifest from {url}");
        // The request timeout also bounds body streaming; the outer guard covers connect stalls.
        let text = match tokio::time::timeout(timeout, self.get_text(url, timeout)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(FetchError::Timeout {
                    url: url.to_owned(),
                    after: timeout,
                });
            }
        };
        let doc = parse_remote_manifest(url, &text)?;
        debug!(
            "fetch: manifest lists {} versions (latest {:?})",
            doc.versions.len(),
            doc.latest
        );
        Ok(doc)
    }
}

/// Strict parse of a remote payload.
pub fn parse_remote_manifest(url: &str, body: &str) -> Result<ManifestDocument, FetchError> {
    let doc: ManifestDocument = serde_json::from_str(body).map_err(|err| FetchError::Malformed {
        url: url.to_owned(),
        message: err.to_string(),
    })?;
    if doc.versions.is_empty() {
        return Err(FetchError::Malformed {
            url: url.to_owned(),
            message: "manifest lists no versions".into(),
        });
    }
    Ok(doc)
}

type SharedFetch = BoxFuture<'static, Result<ManifestDocument, FetchError>>;

/// Weak handle on the request in flight: once every waiter has dropped its
/// future, the request is cancelled and the slot can no longer be joined.
struct PendingSlot {
    url: String,
    timeout: Duration,
    fetch: WeakShared<SharedFetch>,
}

impl PendingSlot {
    fn matches(&self, url: &str, timeout: Duration) -> bool {
        self.url == url && self.timeout == timeout
    }
}

/// Shares one in-flight request between concurrent fetches of the same URL.
///
/// Only callers asking with the same timeout are joined; a different timeout
/// starts its own request.
pub struct CoalescingFetcher<F> {
    inner: Arc<F>,
    pending: Mutex<Option<PendingSlot>>,
}

impl<F> CoalescingFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner: Arc::new(inner),
            pending: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F: ManifestFetcher + 'static> CoalescingFetcher<F> {
    fn attach(&self, url: &str, timeout: Duration) -> Shared<SharedFetch> {
        let mut slot = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = slot.as_ref()
            && pending.matches(url, timeout)
            && let Some(fetch) = pending.fetch.upgrade()
            && fetch.peek().is_none()
        {
            debug!("fetch: joining in-flight request for {url}");
            return fetch;
        }

        let inner = Arc::clone(&self.inner);
        let owned_url = url.to_owned();
        let fetch = async move { inner.fetch(&owned_url, timeout).await }
            .boxed()
            .shared();
        *slot = fetch.downgrade().map(|weak| PendingSlot {
            url: url.to_owned(),
            timeout,
            fetch: weak,
        });
        fetch
    }

    fn release(&self, url: &str, timeout: Duration) {
        let mut slot = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|pending| {
            pending.matches(url, timeout)
                && pending
                    .fetch
                    .upgrade()
                    .is_none_or(|fetch| fetch.peek().is_some())
        }) {
            *slot = None;
        }
    }
}

impl<F: ManifestFetcher + 'static> ManifestFetcher for CoalescingFetcher<F> {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<ManifestDocument, FetchError> {
        let result = self.attach(url, timeout).await;
        self.release(url, timeout);
        result
    }
}
