// Ranking fetcher
//
// Walks the InfiniGAG "hot" listing page by page (strictly in sequence) until
// the target number of links is collected. Entries above the vote threshold
// are handed to the popularity registrar as they are seen.

use crate::error::FetchError;
use crate::popular::PopularityRegistrar;
use serde::Deserialize;
use tracing::{debug, info, warn};
use yo9gag_config::RankingConfig;

/// Cursor of the first page of the hot listing
pub const FIRST_PAGE: &str = "0";

#[derive(Debug, Deserialize)]
struct HotPage {
    #[serde(default)]
    data: Option<Vec<HotEntry>>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct HotEntry {
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    votes: Option<Votes>,
}

#[derive(Debug, Deserialize)]
struct Votes {
    #[serde(default)]
    count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    next: Option<String>,
}

pub struct RankingFetcher {
    client: reqwest::Client,
    base_url: String,
    target_count: usize,
    popular_votes: u64,
}

impl RankingFetcher {
    pub fn new(config: &RankingConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            target_count: config.target_count,
            popular_votes: config.popular_votes,
        })
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    /// Collect up to `target_count` hot links, registering popular ones on the way.
    ///
    /// The first transport, status, decode, empty-page or missing-cursor error
    /// aborts the whole fetch. A final count different from the target is only
    /// logged.
    pub async fn fetch(&self, registrar: &mut PopularityRegistrar) -> Result<Vec<String>, FetchError> {
        let mut links: Vec<String> = Vec::with_capacity(self.target_count);
        let mut cursor = FIRST_PAGE.to_string();

        while links.len() < self.target_count {
            let url = format!("{}/hot/{}", self.base_url, cursor);
            let page = self.fetch_page(&url).await?;

            let entries = match page.data {
                Some(entries) if !entries.is_empty() => entries,
                _ => return Err(FetchError::EmptyPage { url }),
            };

            for entry in entries {
                if links.len() >= self.target_count {
                    break;
                }
                self.collect(entry, &mut links, registrar).await;
            }

            match page.paging.and_then(|p| p.next).filter(|n| !n.is_empty()) {
                Some(next) => {
                    debug!(next = %next, collected = links.len(), "Next ranking page");
                    cursor = next;
                }
                None if links.len() < self.target_count => {
                    return Err(FetchError::MissingCursor {
                        url,
                        collected: links.len(),
                    });
                }
                None => debug!(url = %url, "Last ranking page has no next cursor"),
            }
        }

        if links.len() != self.target_count {
            warn!(
                collected = links.len(),
                expected = self.target_count,
                "Collected link count differs from the target"
            );
        }
        info!(collected = links.len(), "Fetched hot links");

        Ok(links)
    }

    async fn collect(
        &self,
        entry: HotEntry,
        links: &mut Vec<String>,
        registrar: &mut PopularityRegistrar,
    ) {
        let Some(link) = entry.link.filter(|l| !l.is_empty()) else {
            warn!("Ranking entry has no link, skipping");
            return;
        };

        links.push(link.clone());
        debug!(collected = links.len(), link = %link, "Collected hot link");

        match entry.votes.and_then(|v| v.count).filter(|c| *c > 0) {
            None => warn!(link = %link, "Ranking entry has no votes.count"),
            Some(count) if count > self.popular_votes => {
                debug!(link = %link, count, threshold = self.popular_votes, "Link is above the vote threshold");
                registrar.register(&link).await;
            }
            Some(_) => {}
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<HotPage, FetchError> {
        info!(url = %url, "Requesting ranking page");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
