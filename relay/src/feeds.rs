//! Upstream stock feed client.
//!
//! Six HTTP JSON endpoints make up one stock report. Four live on the public
//! stock API and two (honey stock and the seed emoji table) on an auxiliary
//! host, so [`FeedEndpoints`] carries one base URL for each.
//!
//! Every field of every body is optional. A missing list or timestamp is not
//! an error at this layer; the report builder substitutes a placeholder.
//! What *is* an error is a transport failure, a non-success status or a body
//! that is not the expected JSON shape, each reported as a [`FeedError`]
//! naming the feed.
//!
//! # Example
//!
//! ```rust,ignore
//! use garden_relay::feeds::{FeedEndpoints, StockApiClient};
//!
//! let client = StockApiClient::new(FeedEndpoints::default(), None)?;
//! let feeds = client.fetch_all().await?;
//! println!("{} gear items", feeds.gear_seeds.gear.unwrap_or_default().len());
//! ```

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Default base URL for the gear/seed, egg, weather and cosmetics feeds.
const DEFAULT_STOCK_BASE_URL: &str = "https://growagardenstock.com";

/// Default base URL for the honey and seed emoji feeds.
const DEFAULT_AUX_BASE_URL: &str = "http://65.108.103.151:22377";

/// Errors that can occur while fetching a feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The request did not complete within the configured timeout.
    #[error("{feed} feed timed out")]
    Timeout {
        /// The feed that timed out.
        feed: Feed,
    },

    /// The upstream host could not be reached.
    #[error("{feed} feed unavailable: {message}")]
    Unavailable {
        /// The feed that failed.
        feed: Feed,
        /// Transport error description.
        message: String,
    },

    /// The upstream answered with a non-success status.
    #[error("{feed} feed returned status {status}")]
    Status {
        /// The feed that failed.
        feed: Feed,
        /// HTTP status code.
        status: u16,
    },

    /// The body was not the expected JSON shape.
    #[error("{feed} feed returned an invalid body: {message}")]
    Decode {
        /// The feed that failed.
        feed: Feed,
        /// Decoder error description.
        message: String,
    },

    /// The HTTP client could not be built.
    #[error("client configuration error: {0}")]
    Configuration(String),
}

/// The six upstream feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    GearSeeds,
    Eggs,
    Weather,
    Honey,
    Cosmetics,
    SeedEmoji,
}

impl Feed {
    /// Short name used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::GearSeeds => "gear-seeds",
            Self::Eggs => "egg",
            Self::Weather => "weather",
            Self::Honey => "honey",
            Self::Cosmetics => "cosmetics",
            Self::SeedEmoji => "seed-emoji",
        }
    }

    /// Path and query appended to the feed's base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::GearSeeds => "/api/stock?type=gear-seeds",
            Self::Eggs => "/api/stock?type=egg",
            Self::Weather => "/api/stock/weather",
            Self::Honey => "/api/stocks?type=honeyStock",
            Self::Cosmetics => "/api/special-stock?type=cosmetics",
            Self::SeedEmoji => "/api/stocks?type=seedsStock",
        }
    }

    /// Returns `true` if the feed is served by the auxiliary host.
    fn on_aux_host(self) -> bool {
        matches!(self, Self::Honey | Self::SeedEmoji)
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Base URLs of the two upstream hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEndpoints {
    /// Host serving gear/seed, egg, weather and cosmetics.
    pub stock_base_url: String,

    /// Host serving honey stock and the seed emoji table.
    pub aux_base_url: String,
}

impl FeedEndpoints {
    /// Creates endpoints from two base URLs, trimming trailing slashes.
    pub fn new(stock_base_url: impl Into<String>, aux_base_url: impl Into<String>) -> Self {
        Self {
            stock_base_url: stock_base_url.into().trim_end_matches('/').to_string(),
            aux_base_url: aux_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Points both hosts at the same base URL.
    pub fn single(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self::new(base_url.clone(), base_url)
    }

    /// Full URL of a feed.
    pub fn url(&self, feed: Feed) -> String {
        let base = if feed.on_aux_host() {
            &self.aux_base_url
        } else {
            &self.stock_base_url
        };
        format!("{base}{}", feed.path())
    }
}

impl Default for FeedEndpoints {
    fn default() -> Self {
        Self::new(DEFAULT_STOCK_BASE_URL, DEFAULT_AUX_BASE_URL)
    }
}

/// `GET /api/stock?type=gear-seeds`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GearSeedFeed {
    #[serde(default)]
    pub gear: Option<Vec<String>>,
    #[serde(default)]
    pub seeds: Option<Vec<String>>,
    /// Last restock, epoch milliseconds.
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// `GET /api/stock?type=egg`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EggFeed {
    #[serde(default)]
    pub egg: Option<Vec<String>>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// `GET /api/stock/weather`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherFeed {
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub current_weather: Option<String>,
    #[serde(default)]
    pub crop_bonuses: Option<String>,
}

/// One honey shop entry. The upstream sends `value` as either a number or a
/// string, so it is kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoneyItem {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// `GET /api/stocks?type=honeyStock`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoneyFeed {
    #[serde(default)]
    pub honey_stock: Option<Vec<HoneyItem>>,
}

/// `GET /api/special-stock?type=cosmetics`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmeticsFeed {
    #[serde(default)]
    pub cosmetics: Option<Vec<String>>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// One row of the seed emoji lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedEmoji {
    pub name: String,
    #[serde(default)]
    pub emoji: Option<String>,
}

/// `GET /api/stocks?type=seedsStock`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedEmojiFeed {
    #[serde(default)]
    pub seeds_stock: Option<Vec<SeedEmoji>>,
}

/// The decoded bodies of all six feeds from one aggregation round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSet {
    pub gear_seeds: GearSeedFeed,
    pub eggs: EggFeed,
    pub weather: WeatherFeed,
    pub honey: HoneyFeed,
    pub cosmetics: CosmeticsFeed,
    pub seed_emoji: SeedEmojiFeed,
}

/// HTTP client for the upstream stock feeds.
///
/// Cheap to clone; the inner `reqwest::Client` pools connections.
#[derive(Debug, Clone)]
pub struct StockApiClient {
    /// The underlying HTTP client.
    http_client: Client,

    /// Where each feed lives.
    endpoints: FeedEndpoints,
}

impl StockApiClient {
    /// Creates a new feed client.
    ///
    /// With `timeout` set to `None` no timeout is applied beyond whatever
    /// the transport does on its own.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Configuration`] if the HTTP client cannot be created.
    pub fn new(endpoints: FeedEndpoints, timeout: Option<Duration>) -> Result<Self, FeedError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let http_client = builder
            .build()
            .map_err(|e| FeedError::Configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            endpoints,
        })
    }

    /// Fetches all six feeds concurrently.
    ///
    /// All requests are in flight at the same time. The call resolves once
    /// every feed has been decoded, or as soon as any one fails, in which case
    /// the remaining requests are dropped.
    ///
    /// # Errors
    ///
    /// Returns the first [`FeedError`] encountered.
    pub async fn fetch_all(&self) -> Result<FeedSet, FeedError> {
        let (gear_seeds, eggs, weather, honey, cosmetics, seed_emoji) = tokio::try_join!(
            self.fetch::<GearSeedFeed>(Feed::GearSeeds),
            self.fetch::<EggFeed>(Feed::Eggs),
            self.fetch::<WeatherFeed>(Feed::Weather),
            self.fetch::<HoneyFeed>(Feed::Honey),
            self.fetch::<CosmeticsFeed>(Feed::Cosmetics),
            self.fetch::<SeedEmojiFeed>(Feed::SeedEmoji),
        )?;

        Ok(FeedSet {
            gear_seeds,
            eggs,
            weather,
            honey,
            cosmetics,
            seed_emoji,
        })
    }

    /// Fetches and decodes a single feed.
    ///
    /// # Errors
    ///
    /// - [`FeedError::Timeout`] - The configured timeout elapsed
    /// - [`FeedError::Unavailable`] - The host could not be reached
    /// - [`FeedError::Status`] - Non-success HTTP status
    /// - [`FeedError::Decode`] - The body is not the expected JSON
    pub async fn fetch<T: DeserializeOwned>(&self, feed: Feed) -> Result<T, FeedError> {
        let url = self.endpoints.url(feed);

        debug!(feed = %feed, url = %url, "Fetching feed");

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                FeedError::Timeout { feed }
            } else {
                FeedError::Unavailable {
                    feed,
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(feed = %feed, status = %status, "Feed returned unexpected status");
            return Err(FeedError::Status {
                feed,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FeedError::Timeout { feed }
            } else {
                FeedError::Unavailable {
                    feed,
                    message: format!("failed to read body: {e}"),
                }
            }
        })?;

        serde_json::from_slice(&body).map_err(|e| FeedError::Decode {
            feed,
            message: e.to_string(),
        })
    }
}
