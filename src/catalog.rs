// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Catalog snapshots built from the upstream listings.
//!
//! A `Catalog` is fetched whole and replaced whole; nothing mutates it after
//! construction.

use crate::xtream_api::{
    ApiEpisode, Category as ApiCategory, SeriesInfo, SeriesInfoResponse, Stream, XTreamAPI,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Live,
    Movie,
    Series,
}

impl CatalogKind {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "live" | "tv" => Ok(Self::Live),
            "movie" | "movies" | "vod" => Ok(Self::Movie),
            "series" => Ok(Self::Series),
            _ => anyhow::bail!("Invalid type: {}. Use 'live', 'movie', or 'series'", s),
        }
    }

    /// Stream type used in playback URLs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Movie => "movie",
            Self::Series => "series",
        }
    }
}

impl std::fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no {0} streams or categories found")]
    Empty(CatalogKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

impl From<ApiCategory> for Category {
    fn from(category: ApiCategory) -> Self {
        Self {
            id: category.category_id,
            name: category.category_name,
        }
    }
}

/// A playable channel, movie or series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamItem {
    pub id: u32,
    pub name: String,
    pub category_id: String,
    pub kind: CatalogKind,
    pub icon: Option<String>,
    /// Rating on a 0-5 scale
    pub rating: Option<f64>,
    pub extension: Option<String>,
    pub epg_channel_id: Option<String>,
}

impl StreamItem {
    pub fn from_stream(stream: Stream, kind: CatalogKind) -> Self {
        Self {
            id: stream.stream_id,
            name: stream.name,
            category_id: stream.category_id.unwrap_or_default(),
            kind,
            icon: stream.stream_icon.filter(|s| !s.is_empty()),
            rating: parse_rating(stream.rating_5based.as_ref()),
            extension: stream.container_extension.filter(|s| !s.is_empty()),
            epg_channel_id: stream.epg_channel_id,
        }
    }

    pub fn from_series(series: SeriesInfo) -> Self {
        Self {
            id: series.series_id,
            name: series.name,
            category_id: series.category_id.unwrap_or_default(),
            kind: CatalogKind::Series,
            icon: series.cover.filter(|s| !s.is_empty()),
            rating: parse_rating(series.rating_5based.as_ref()),
            extension: None,
            epg_channel_id: None,
        }
    }
}

/// Read a rating that may arrive as a number or as text.
///
/// Text is read like a lenient float parse: the leading numeric part counts
/// and trailing garbage is ignored, so `"3.7 stars"` is 3.7.
pub fn parse_rating(value: Option<&Value>) -> Option<f64> {
    let rating = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float_prefix(s),
        _ => None,
    }?;

    rating.is_finite().then_some(rating)
}

fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > digits_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start {
            has_digits = true;
            end = frac_end;
        } else if has_digits {
            end = frac_start;
        }
    }

    if !has_digits {
        return None;
    }
    s[..end].trim_end_matches('.').parse().ok()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub kind: CatalogKind,
    pub categories: Vec<Category>,
    pub items: Vec<StreamItem>,
}

impl Catalog {
    pub fn find(&self, id: u32) -> Option<&StreamItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn category_name(&self, category_id: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.id == category_id)
            .map(|c| c.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Case-insensitive name ordering with a byte-wise tie break
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Assemble a catalog from freshly fetched categories and items
pub fn build_catalog(
    kind: CatalogKind,
    categories: Vec<ApiCategory>,
    items: Vec<StreamItem>,
) -> Result<Catalog, CatalogError> {
    let mut categories: Vec<Category> = categories
        .into_iter()
        .filter(|c| !c.category_name.trim().is_empty())
        .map(Category::from)
        .collect();
    categories.sort_by(|a, b| compare_names(&a.name, &b.name));

    if items.is_empty() {
        if categories.is_empty() {
            return Err(CatalogError::Empty(kind));
        }
        warn!(
            "No {} streams found, but {} categories were loaded",
            kind,
            categories.len()
        );
    }

    Ok(Catalog {
        kind,
        categories,
        items,
    })
}

/// Fetch categories and streams concurrently. Either request failing fails the whole fetch.
pub async fn fetch_catalog(api: &XTreamAPI, kind: CatalogKind) -> Result<Catalog> {
    debug!("Fetching {} catalog from {}", kind, api.base_url());

    let (categories, items) = match kind {
        CatalogKind::Live => {
            let (categories, streams) =
                tokio::try_join!(api.get_live_categories(), api.get_live_streams(None))?;
            (categories, into_items(streams, kind))
        }
        CatalogKind::Movie => {
            let (categories, streams) =
                tokio::try_join!(api.get_vod_categories(), api.get_vod_streams(None))?;
            (categories, into_items(streams, kind))
        }
        CatalogKind::Series => {
            let (categories, series) =
                tokio::try_join!(api.get_series_categories(), api.get_series(None))?;
            (
                categories,
                series.into_iter().map(StreamItem::from_series).collect(),
            )
        }
    };

    let catalog = build_catalog(kind, categories, items)
        .with_context(|| format!("Failed to load {} catalog", kind))?;

    debug!(
        "Loaded {} {} items in {} categories",
        catalog.items.len(),
        kind,
        catalog.categories.len()
    );
    Ok(catalog)
}

fn into_items(streams: Vec<Stream>, kind: CatalogKind) -> Vec<StreamItem> {
    streams
        .into_iter()
        .map(|s| StreamItem::from_stream(s, kind))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub season: u32,
    pub number: u32,
    pub title: Option<String>,
    pub extension: Option<String>,
    pub plot: Option<String>,
    pub duration: Option<String>,
}

impl Episode {
    fn from_api(episode: ApiEpisode, season: u32) -> Self {
        let (plot, duration) = episode
            .info
            .map(|info| (info.plot, info.duration))
            .unwrap_or_default();

        Self {
            id: episode.id,
            season: if episode.season > 0 {
                episode.season
            } else {
                season
            },
            number: episode.episode_num,
            title: episode.title.filter(|t| !t.trim().is_empty()),
            extension: episode.container_extension.filter(|e| !e.is_empty()),
            plot,
            duration,
        }
    }

    /// Episodes without a container extension cannot be turned into a URL
    pub fn is_playable(&self) -> bool {
        self.extension.is_some()
    }

    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("Episode {}", self.number))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub number: u32,
    pub episodes: Vec<Episode>,
}

/// Seasons in numeric order, episodes ordered by episode number
pub fn seasons_from_response(response: SeriesInfoResponse) -> Vec<Season> {
    let mut seasons: Vec<Season> = response
        .episodes
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, episodes)| {
            let Ok(number) = key.trim().parse::<u32>() else {
                warn!("Ignoring season with non-numeric key {:?}", key);
                return None;
            };
            let mut episodes: Vec<Episode> = episodes
                .into_iter()
                .map(|e| Episode::from_api(e, number))
                .collect();
            episodes.sort_by_key(|e| e.number);
            Some(Season { number, episodes })
        })
        .collect();

    seasons.sort_by_key(|s| s.number);
    seasons
}

pub async fn fetch_episodes(api: &XTreamAPI, series_id: u32) -> Result<Vec<Season>> {
    let response = api
        .get_series_info(series_id)
        .await
        .with_context(|| format!("Failed to load episodes for series {}", series_id))?;
    Ok(seasons_from_response(response))
}
