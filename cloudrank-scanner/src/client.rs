use crate::api::{ApiTrack, ApiUser, Collection, Page};
use crate::error::{Result, ScanError};
use crate::result::{UserId, UserRecord};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.soundcloud.com";
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// Track ids per `/tracks?ids=` request.
const RESOLVE_BATCH_SIZE: usize = 50;

/// Client for the remote social graph API.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    client_id: String,
    page_size: usize,
}

impl ApiClient {
    pub fn new(client_id: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent("cloudrank/0.1 (https://github.com/trapdoorsec/cloudrank)")
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            http,
            base_url: parse_base_url(DEFAULT_API_URL)?,
            client_id: client_id.into(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetches a user's attributes. Track aggregates start at zero.
    pub async fn get_user(&self, id: UserId) -> Result<UserRecord> {
        let url = self.endpoint(&format!("users/{}", id))?;
        match self.get_json::<ApiUser>(url.as_str(), &[]).await {
            Ok(user) => Ok(user.into()),
            Err(ScanError::Status { status: 404, .. }) => Err(ScanError::NotFound(id)),
            Err(e) => Err(e),
        }
    }

    /// Fetches one page of a user's collection. Without a cursor the first
    /// page is requested; otherwise `cursor` is the previous page's
    /// `next_href`.
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        kind: Collection,
        id: UserId,
        cursor: Option<&str>,
    ) -> Result<Page<T>> {
        match cursor {
            Some(next_href) => self.get_json(next_href, &[]).await,
            None => {
                let url = self.endpoint(&format!("users/{}/{}", id, kind.path()))?;
                self.get_json(
                    url.as_str(),
                    &[
                        ("limit", self.page_size.to_string()),
                        ("linked_partitioning", "1".to_string()),
                    ],
                )
                .await
            }
        }
    }

    /// Follows `next_href` until the collection is exhausted or `max_pages`
    /// pages were read. Items come back in page order.
    pub async fn collect_all<T: DeserializeOwned>(
        &self,
        kind: Collection,
        id: UserId,
        max_pages: Option<usize>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;

        loop {
            let page: Page<T> = self.fetch_page(kind, id, cursor.as_deref()).await?;
            pages += 1;

            let next = page.next_cursor().map(str::to_string);
            items.extend(page.collection);

            match next {
                Some(next) if max_pages.is_none_or(|max| pages < max) => cursor = Some(next),
                Some(_) => {
                    debug!(
                        "Stopping {} of user {} after {} pages",
                        kind.path(),
                        id,
                        pages
                    );
                    break;
                }
                None => break,
            }
        }

        Ok(items)
    }

    /// Maps track ids to the ids of the users who uploaded them. Tracks the
    /// API does not return are left out of the map.
    pub async fn resolve_track_owners(&self, track_ids: &[u64]) -> Result<HashMap<u64, UserId>> {
        let mut owners = HashMap::with_capacity(track_ids.len());
        if track_ids.is_empty() {
            return Ok(owners);
        }

        let url = self.endpoint("tracks")?;
        for batch in track_ids.chunks(RESOLVE_BATCH_SIZE) {
            let ids = batch
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let tracks: Vec<ApiTrack> = self.get_json(url.as_str(), &[("ids", ids)]).await?;
            owners.extend(tracks.into_iter().map(|track| (track.id, track.user_id)));
        }

        Ok(owners)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", path, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        debug!("Fetching {}", url);

        let response = self
            .http
            .get(url)
            .query(&[("client_id", self.client_id.as_str())])
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| ScanError::MalformedResponse {
            url: url.to_string(),
            source,
        })
    }
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    let mut url =
        Url::parse(base_url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", base_url, e)))?;
    // Url::join drops the last segment unless the path ends in a slash
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
