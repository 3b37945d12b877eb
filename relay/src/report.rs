//! Stock report types.
//!
//! A [`StockReport`] is built fresh from one round of feed data and is never
//! cached. It is either a full set of formatted sections or a single error
//! message; there is no partially filled variant.
//!
//! Reports are delivered as a [`ReportMessage`]: an embed-style layout of a
//! title, a color, ordered fields and a footer, which chat front-ends can
//! render directly.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::countdown::{
    honey_countdown, restock_countdown, COSMETICS_RESTOCK_SECS, EGG_RESTOCK_SECS,
    GEAR_SEED_RESTOCK_SECS,
};
use crate::feeds::{FeedSet, SeedEmoji};

/// Footer shown under every message.
pub const FOOTER_TEXT: &str = "Grow A Garden Tracker";

/// Accent color of a stock report.
pub const STOCK_COLOR: u32 = 0x43B581;

/// Accent color of an error report.
pub const ERROR_COLOR: u32 = 0xED4245;

/// Body of the error report.
pub const UNAVAILABLE_MESSAGE: &str =
    "Failed to fetch Grow A Garden stock data. Please try again later.";

const NO_GEAR: &str = "No gear.";
const NO_SEEDS: &str = "No seeds.";
const NO_EGGS: &str = "No eggs.";
const NO_COSMETICS: &str = "No cosmetics.";
const NO_HONEY: &str = "No honey stock.";
const DEFAULT_WEATHER_ICON: &str = "🌦️";
const DEFAULT_WEATHER: &str = "Unknown";
const DEFAULT_CROP_BONUS: &str = "None";

/// Shown in place of a feed countdown when the feed omits `updatedAt`.
const UNKNOWN_COUNTDOWN: &str = "unknown";

/// Separator between a seed's name and its quantity markup.
const SEED_QUANTITY_SEPARATOR: &str = " **";

/// Formatted sections of a successful report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSections {
    pub gear: String,
    pub seeds: String,
    pub eggs: String,
    pub cosmetics: String,
    pub honey: String,
    pub weather: String,
    pub crop_bonus: String,
    pub gear_seed_restock: String,
    pub egg_restock: String,
    pub cosmetics_restock: String,
    pub honey_restock: String,
}

/// One aggregation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StockReport {
    /// Every feed answered; all sections are filled.
    Stock {
        sections: StockSections,
        generated_at: DateTime<Utc>,
    },

    /// At least one feed failed; nothing but the message is reported.
    Unavailable {
        message: String,
        generated_at: DateTime<Utc>,
    },
}

impl StockReport {
    /// Builds a report from a complete feed set.
    ///
    /// `now` drives every countdown, so the same inputs always produce the
    /// same report.
    pub fn from_feeds(feeds: &FeedSet, now: DateTime<Utc>) -> Self {
        let emoji_table = feeds.seed_emoji.seeds_stock.as_deref().unwrap_or(&[]);

        let seeds = bullet_list(feeds.gear_seeds.seeds.as_deref(), NO_SEEDS, |seed| {
            match seed_emoji(seed, emoji_table) {
                Some(emoji) => format!("{emoji} {seed}"),
                None => seed.clone(),
            }
        });

        let honey = bullet_list(feeds.honey.honey_stock.as_deref(), NO_HONEY, |item| {
            let value = match &item.value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{}: {value}", item.name)
        });

        let icon = non_empty(feeds.weather.icon.as_deref()).unwrap_or(DEFAULT_WEATHER_ICON);
        let current =
            non_empty(feeds.weather.current_weather.as_deref()).unwrap_or(DEFAULT_WEATHER);

        let sections = StockSections {
            gear: bullet_list(feeds.gear_seeds.gear.as_deref(), NO_GEAR, String::clone),
            seeds,
            eggs: bullet_list(feeds.eggs.egg.as_deref(), NO_EGGS, String::clone),
            cosmetics: bullet_list(
                feeds.cosmetics.cosmetics.as_deref(),
                NO_COSMETICS,
                String::clone,
            ),
            honey,
            weather: format!("{icon} {current}"),
            crop_bonus: non_empty(feeds.weather.crop_bonuses.as_deref())
                .unwrap_or(DEFAULT_CROP_BONUS)
                .to_string(),
            gear_seed_restock: feed_countdown(
                feeds.gear_seeds.updated_at,
                GEAR_SEED_RESTOCK_SECS,
                now,
            ),
            egg_restock: feed_countdown(feeds.eggs.updated_at, EGG_RESTOCK_SECS, now),
            cosmetics_restock: feed_countdown(
                feeds.cosmetics.updated_at,
                COSMETICS_RESTOCK_SECS,
                now,
            ),
            honey_restock: honey_countdown(now),
        };

        Self::Stock {
            sections,
            generated_at: now,
        }
    }

    /// The error report returned when any feed fails.
    pub fn unavailable(now: DateTime<Utc>) -> Self {
        Self::Unavailable {
            message: UNAVAILABLE_MESSAGE.to_string(),
            generated_at: now,
        }
    }

    /// Returns `true` for the error variant.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// When the report was produced.
    pub fn generated_at(&self) -> DateTime<Utc> {
        match self {
            Self::Stock { generated_at, .. } | Self::Unavailable { generated_at, .. } => {
                *generated_at
            }
        }
    }

    /// Renders the report as an embed-style message.
    pub fn to_message(&self) -> ReportMessage {
        match self {
            Self::Stock {
                sections,
                generated_at,
            } => ReportMessage {
                title: "🌾 Grow A Garden — Tracker".to_string(),
                description: None,
                color: STOCK_COLOR,
                fields: vec![
                    ReportField::new("🛠️ Gear", &sections.gear, true),
                    ReportField::new("🌱 Seeds", &sections.seeds, true),
                    ReportField::new("🥚 Eggs", &sections.eggs, true),
                    ReportField::new(
                        "🎨 Cosmetics",
                        format!(
                            "{}\n⏳ Restock in: {}",
                            sections.cosmetics, sections.cosmetics_restock
                        ),
                        false,
                    ),
                    ReportField::new(
                        "🍯 Honey Stock",
                        format!(
                            "{}\n⏳ Restock in: {}",
                            sections.honey, sections.honey_restock
                        ),
                        false,
                    ),
                    ReportField::new("🌤️ Weather", &sections.weather, true),
                    ReportField::new("🪴 Crop Bonus", &sections.crop_bonus, true),
                    ReportField::new(
                        "⏳ Restocks",
                        format!(
                            "• Gear/Seed: {}\n• Egg: {}",
                            sections.gear_seed_restock, sections.egg_restock
                        ),
                        false,
                    ),
                ],
                footer: FOOTER_TEXT.to_string(),
                timestamp: Some(*generated_at),
            },
            Self::Unavailable { message, .. } => ReportMessage {
                title: "❌ Error".to_string(),
                description: Some(message.clone()),
                color: ERROR_COLOR,
                fields: Vec::new(),
                footer: FOOTER_TEXT.to_string(),
                timestamp: None,
            },
        }
    }
}

impl fmt::Display for StockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_message(), f)
    }
}

/// One named block of an embed-style message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl ReportField {
    pub fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }
}

/// Embed-style rendering of a report or a command reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMessage {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<ReportField>,
    pub footer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl fmt::Display for ReportMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        if let Some(description) = &self.description {
            writeln!(f, "{description}")?;
        }
        for field in &self.fields {
            writeln!(f)?;
            writeln!(f, "{}", field.name)?;
            writeln!(f, "{}", field.value)?;
        }
        writeln!(f)?;
        write!(f, "{}", self.footer)
    }
}

/// Renders one `• item` line per entry, or the placeholder if there are none.
fn bullet_list<T>(items: Option<&[T]>, placeholder: &str, render: impl Fn(&T) -> String) -> String {
    match items {
        Some(items) if !items.is_empty() => items
            .iter()
            .map(|item| format!("• {}", render(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => placeholder.to_string(),
    }
}

/// Looks up a seed's emoji by case-insensitive name.
///
/// The name is the part of the stock line before its quantity markup, so
/// `"Carrot **x5**"` is looked up as `"Carrot"`.
fn seed_emoji<'a>(seed_line: &str, table: &'a [SeedEmoji]) -> Option<&'a str> {
    let name = seed_line
        .split(SEED_QUANTITY_SEPARATOR)
        .next()
        .unwrap_or(seed_line);
    let name = name.to_lowercase();

    table
        .iter()
        .find(|entry| entry.name.to_lowercase() == name)
        .and_then(|entry| non_empty(entry.emoji.as_deref()))
}

fn feed_countdown(updated_at: Option<i64>, interval_secs: i64, now: DateTime<Utc>) -> String {
    match updated_at {
        Some(updated_at) => restock_countdown(updated_at, interval_secs, now),
        None => UNKNOWN_COUNTDOWN.to_string(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
