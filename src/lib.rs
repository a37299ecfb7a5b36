// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod epg;
pub mod filter;
pub mod player;
pub mod store;
pub mod tracker;
pub mod xtream_api;

pub use catalog::{Catalog, CatalogKind, StreamItem};
pub use config::Config;
pub use dashboard::Dashboard;
pub use filter::{FilterCriteria, ListView, MinRating};
pub use player::{Player, PlayerEvent};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use tracker::Tracker;
pub use xtream_api::XTreamAPI;
