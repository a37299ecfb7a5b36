// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Session state for one signed-in provider.
//!
//! Holds the current catalog snapshot, the selected item and its EPG listing.
//! Favorites and recents live in the tracker and survive `logout`.

use crate::catalog::{Catalog, CatalogKind, Episode, StreamItem, fetch_catalog};
use crate::epg::{self, EpgWindow, ProgramEntry};
use crate::filter::{self, FilterCriteria, ListView};
use crate::store::KeyValueStore;
use crate::tracker::Tracker;
use crate::xtream_api::{EpgListing, XTreamAPI};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Number of upcoming listings requested from `get_short_epg`
pub const SHORT_EPG_LIMIT: u32 = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub item: StreamItem,
    pub url: String,
}

#[derive(Debug)]
pub struct Dashboard<S: KeyValueStore> {
    api: XTreamAPI,
    tracker: Tracker<S>,
    catalog: Option<Catalog>,
    selection: Option<Selection>,
    epg: Vec<ProgramEntry>,
}

impl<S: KeyValueStore> Dashboard<S> {
    pub fn new(api: XTreamAPI, tracker: Tracker<S>) -> Self {
        Self {
            api,
            tracker,
            catalog: None,
            selection: None,
            epg: Vec::new(),
        }
    }

    pub fn api(&self) -> &XTreamAPI {
        &self.api
    }

    pub fn tracker(&self) -> &Tracker<S> {
        &self.tracker
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn epg(&self) -> &[ProgramEntry] {
        &self.epg
    }

    /// Fetch a fresh catalog. On failure nothing from the old one is kept.
    pub async fn load(&mut self, kind: CatalogKind) -> Result<&Catalog> {
        self.catalog = None;
        let catalog = fetch_catalog(&self.api, kind).await?;
        Ok(&*self.catalog.insert(catalog))
    }

    pub fn set_catalog(&mut self, catalog: Catalog) {
        self.catalog = Some(catalog);
    }

    /// Items of the current catalog after filtering. Live channels honour the
    /// view and are sorted by name; movies and series keep upstream order.
    pub fn listing(&self, view: ListView, criteria: &FilterCriteria) -> Vec<&StreamItem> {
        let Some(catalog) = self.catalog.as_ref() else {
            return Vec::new();
        };

        match catalog.kind {
            CatalogKind::Live => filter::live_listing(
                &catalog.items,
                view,
                self.tracker.favorites(),
                self.tracker.recent(),
                criteria,
            ),
            CatalogKind::Movie | CatalogKind::Series => filter::filter(&catalog.items, criteria),
        }
    }

    /// Select an item for playback. Live channels are recorded as recent.
    pub fn select(&mut self, id: u32) -> Result<&Selection> {
        let item = self
            .catalog
            .as_ref()
            .and_then(|c| c.find(id))
            .cloned()
            .with_context(|| format!("Stream {} is not in the loaded catalog", id))?;

        let url = match item.kind {
            CatalogKind::Live => self.api.get_stream_url(item.id, "live", None),
            CatalogKind::Movie => {
                self.api
                    .get_stream_url(item.id, "movie", item.extension.as_deref())
            }
            CatalogKind::Series => {
                anyhow::bail!("'{}' is a series, pick an episode to play", item.name)
            }
        };

        if item.kind == CatalogKind::Live {
            self.tracker.add_recent(item.id);
        }

        info!("Selected {} {} ({})", item.kind, item.name, item.id);
        self.epg.clear();
        Ok(&*self.selection.insert(Selection { item, url }))
    }

    pub fn episode_url(&self, episode: &Episode) -> Result<String> {
        let extension = episode
            .extension
            .as_deref()
            .with_context(|| format!("Episode {} has no container extension", episode.id))?;
        Ok(self.api.get_episode_stream_url(&episode.id, extension))
    }

    /// Fetch the short EPG for the selected live channel
    pub async fn refresh_epg(&mut self) -> Result<&[ProgramEntry]> {
        let Some(selection) = self.selection.as_ref() else {
            anyhow::bail!("No channel selected");
        };
        if selection.item.kind != CatalogKind::Live {
            self.epg.clear();
            return Ok(self.epg.as_slice());
        }

        let listings = self
            .api
            .get_short_epg(selection.item.id, Some(SHORT_EPG_LIMIT))
            .await
            .with_context(|| format!("Failed to load EPG for {}", selection.item.name))?;
        self.set_epg(listings);
        Ok(self.epg.as_slice())
    }

    /// Replace the EPG listing. The latest call wins.
    pub fn set_epg(&mut self, listings: Vec<EpgListing>) {
        self.epg = epg::entries_from_listings(listings);
        debug!("EPG now holds {} entries", self.epg.len());
    }

    pub fn now_next(&self, now: DateTime<Utc>) -> EpgWindow {
        epg::resolve(&self.epg, now)
    }

    /// Returns true when `id` is now a favorite
    pub fn toggle_favorite(&mut self, id: u32) -> bool {
        self.tracker.toggle_favorite(id).contains(id)
    }

    pub fn close_player(&mut self) {
        self.selection = None;
        self.epg.clear();
    }

    /// Drop everything fetched during the session
    pub fn logout(&mut self) {
        self.close_player();
        self.catalog = None;
        info!("Session cleared");
    }
}
