//! GitHub implementation of the event feed.
//!
//! Reads `GET /users/{handle}/received_events`, which is paginated via the
//! `Link` header and rate-limited via `X-Poll-Interval`. GitHub rejects
//! requests without a `User-Agent`, and an optional bearer token raises
//! the rate limit and unlocks private events the token can see.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::header;
use std::time::{Duration, Instant};

use crate::event::RawEvent;
use crate::feed::{EventFeed, FeedPage};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("feedsift/", env!("CARGO_PKG_VERSION"));

pub struct GitHubFeed {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubFeed {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("building feed http client")?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self {
            client,
            base_url,
            token,
        })
    }
}

#[async_trait]
impl EventFeed for GitHubFeed {
    async fn received_events(&self, handle: &str, page: u32) -> Result<FeedPage> {
        let url = format!("{}/users/{handle}/received_events", self.base_url);
        let t0 = Instant::now();

        let mut request = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .query(&[("page", page)]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("GET {url} page {page}"))?
            .error_for_status()
            .context("received_events answered with an error status")?;

        let poll_interval = response
            .headers()
            .get("X-Poll-Interval")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let next_page = response
            .headers()
            .get(header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_page_from_link);

        let events: Vec<RawEvent> = response
            .json()
            .await
            .context("decoding received_events page")?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("feed_page_fetch_ms").record(ms);

        Ok(FeedPage {
            events,
            next_page,
            poll_interval,
        })
    }
}

static NEXT_LINK: OnceCell<Regex> = OnceCell::new();

/// Pulls the page number out of the `rel="next"` segment of a `Link`
/// header, e.g. `<https://api.github.com/...?page=2>; rel="next"`.
fn next_page_from_link(link: &str) -> Option<u32> {
    let re = NEXT_LINK
        .get_or_init(|| Regex::new(r#"<[^>]*[?&]page=(\d+)[^>]*>;\s*rel="next""#).unwrap());
    re.captures(link).and_then(|caps| caps[1].parse().ok())
}
