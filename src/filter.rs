// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Narrowing of channel, movie and series lists.
//!
//! Everything here is pure and cheap enough to rerun on every keystroke.

use crate::catalog::{Category, StreamItem, compare_names};
use crate::tracker::{FavoriteSet, RecentList};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Rating floor selected by the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MinRating {
    #[default]
    All,
    AtLeast(u8),
}

impl MinRating {
    pub fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") || s.is_empty() {
            return Ok(Self::All);
        }
        match s.parse::<u8>() {
            Ok(floor) if floor <= 5 => Ok(Self::AtLeast(floor)),
            _ => anyhow::bail!("Invalid minimum rating: {}. Use 'all' or 0-5", s),
        }
    }

    /// Unknown ratings pass only when there is no floor
    pub fn accepts(&self, rating: Option<f64>) -> bool {
        match self {
            Self::All => true,
            Self::AtLeast(floor) => rating.is_some_and(|r| r >= f64::from(*floor)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub search: String,
    /// Empty means every category
    pub categories: HashSet<String>,
    pub min_rating: MinRating,
}

impl FilterCriteria {
    fn matches_with_term(&self, item: &StreamItem, term: &str) -> bool {
        (self.categories.is_empty() || self.categories.contains(&item.category_id))
            && (term.is_empty() || item.name.to_lowercase().contains(term))
            && self.min_rating.accepts(item.rating)
    }
}

/// Keep the items matching every criterion, in input order
pub fn filter<'a, I>(items: I, criteria: &FilterCriteria) -> Vec<&'a StreamItem>
where
    I: IntoIterator<Item = &'a StreamItem>,
{
    let term = criteria.search.to_lowercase();
    items
        .into_iter()
        .filter(|item| criteria.matches_with_term(item, &term))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListView {
    #[default]
    All,
    Favorites,
    Recent,
}

impl ListView {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "favorites" | "favourites" | "fav" => Ok(Self::Favorites),
            "recent" => Ok(Self::Recent),
            _ => anyhow::bail!("Invalid view: {}. Use 'all', 'favorites', or 'recent'", s),
        }
    }
}

/// Items visible in `view`. The recent view follows recency order and skips
/// ids that are no longer in the catalog.
pub fn items_in_view<'a>(
    items: &'a [StreamItem],
    view: ListView,
    favorites: &FavoriteSet,
    recent: &RecentList,
) -> Vec<&'a StreamItem> {
    match view {
        ListView::All => items.iter().collect(),
        ListView::Favorites => items.iter().filter(|i| favorites.contains(i.id)).collect(),
        ListView::Recent => {
            let by_id: HashMap<u32, &StreamItem> = items.iter().map(|i| (i.id, i)).collect();
            recent
                .ids()
                .iter()
                .filter_map(|id| by_id.get(id).copied())
                .collect()
        }
    }
}

/// Live TV list: view, then filter, then sort by name except in the recent view
pub fn live_listing<'a>(
    items: &'a [StreamItem],
    view: ListView,
    favorites: &FavoriteSet,
    recent: &RecentList,
    criteria: &FilterCriteria,
) -> Vec<&'a StreamItem> {
    let mut result = filter(items_in_view(items, view, favorites, recent), criteria);
    if view != ListView::Recent {
        result.sort_by(|a, b| compare_names(&a.name, &b.name));
    }
    result
}

/// Categories that still have something to show, optionally narrowed by a
/// name prefix, sorted by name. Only the category name is trimmed, so a term
/// with leading whitespace matches nothing.
pub fn available_categories<'a>(
    categories: &'a [Category],
    visible: &[&StreamItem],
    term: &str,
) -> Vec<&'a Category> {
    let present: HashSet<&str> = visible.iter().map(|i| i.category_id.as_str()).collect();
    let term = term.to_lowercase();

    let mut result: Vec<&Category> = categories
        .iter()
        .filter(|c| present.contains(c.id.as_str()))
        .filter(|c| term.is_empty() || c.name.trim().to_lowercase().starts_with(&term))
        .collect();
    result.sort_by(|a, b| compare_names(&a.name, &b.name));
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorySelection<'a> {
    All,
    Id(&'a str),
}

/// Number of visible items for a category entry. "All" only counts items in
/// `available` so the total agrees with a narrowed category list.
pub fn category_count(
    visible: &[&StreamItem],
    selection: CategorySelection<'_>,
    available: Option<&[&Category]>,
) -> usize {
    match selection {
        CategorySelection::Id(id) => visible.iter().filter(|i| i.category_id == id).count(),
        CategorySelection::All => match available {
            Some(available) => {
                let ids: HashSet<&str> = available.iter().map(|c| c.id.as_str()).collect();
                visible
                    .iter()
                    .filter(|i| ids.contains(i.category_id.as_str()))
                    .count()
            }
            None => visible.len(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogKind;

    fn item(id: u32, name: &str, category: &str, rating: Option<f64>) -> StreamItem {
        StreamItem {
            id,
            name: name.to_string(),
            category_id: category.to_string(),
            kind: CatalogKind::Movie,
            icon: None,
            rating,
            extension: None,
            epg_channel_id: None,
        }
    }

    fn category(id: &str, name: &str) -> Category {
        Category {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn sample() -> Vec<StreamItem> {
        vec![
            item(1, "Zulu News", "news", Some(3.7)),
            item(2, "alpha Sports", "sports", Some(4.5)),
            item(3, "Beta News", "news", None),
            item(4, "Gamma Kids", "kids", Some(2.0)),
        ]
    }

    fn ids(items: &[&StreamItem]) -> Vec<u32> {
        items.iter().map(|i| i.id).collect()
    }

    #[test]
    fn test_default_criteria_keeps_everything() {
        let items = sample();
        let result = filter(&items, &FilterCriteria::default());
        assert_eq!(ids(&result), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let items = sample();
        let criteria = FilterCriteria {
            search: "NEWS".to_string(),
            ..Default::default()
        };
        assert_eq!(ids(&filter(&items, &criteria)), vec![1, 3]);
    }

    #[test]
    fn test_predicates_are_anded() {
        let items = sample();
        let criteria = FilterCriteria {
            search: "s".to_string(),
            categories: HashSet::from(["news".to_string(), "sports".to_string()]),
            min_rating: MinRating::AtLeast(3),
        };
        assert_eq!(ids(&filter(&items, &criteria)), vec![1, 2]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let items = sample();
        let criteria = FilterCriteria {
            search: "a".to_string(),
            categories: HashSet::new(),
            min_rating: MinRating::AtLeast(2),
        };
        let once = filter(&items, &criteria);
        let twice = filter(once.iter().copied(), &criteria);
        assert_eq!(ids(&once), ids(&twice));
    }

    #[test]
    fn test_rating_floor() {
        assert!(MinRating::from_str("3").unwrap().accepts(Some(3.7)));
        assert!(!MinRating::from_str("4").unwrap().accepts(Some(3.7)));
        assert!(!MinRating::AtLeast(0).accepts(None));
        assert!(MinRating::from_str("all").unwrap().accepts(None));
        assert!(MinRating::from_str("9").is_err());
        assert!(MinRating::from_str("high").is_err());
    }

    #[test]
    fn test_string_rating_passes_floor() {
        let rating = crate::catalog::parse_rating(Some(&serde_json::json!("3.7")));
        let items = vec![item(1, "Film", "x", rating)];

        let three = FilterCriteria {
            min_rating: MinRating::AtLeast(3),
            ..Default::default()
        };
        let four = FilterCriteria {
            min_rating: MinRating::AtLeast(4),
            ..Default::default()
        };
        assert_eq!(filter(&items, &three).len(), 1);
        assert!(filter(&items, &four).is_empty());
    }

    #[test]
    fn test_live_listing_sorts_by_name() {
        let items = sample();
        let result = live_listing(
            &items,
            ListView::All,
            &FavoriteSet::new(),
            &RecentList::default(),
            &FilterCriteria::default(),
        );
        assert_eq!(ids(&result), vec![2, 3, 4, 1]);
    }

    #[test]
    fn test_recent_view_keeps_recency_order() {
        let items = sample();
        let mut recent = RecentList::default();
        recent.push_front(3);
        recent.push_front(99);
        recent.push_front(1);

        let result = live_listing(
            &items,
            ListView::Recent,
            &FavoriteSet::new(),
            &recent,
            &FilterCriteria::default(),
        );
        assert_eq!(ids(&result), vec![1, 3]);
    }

    #[test]
    fn test_favorites_view() {
        let items = sample();
        let favorites: FavoriteSet = [4, 2].into_iter().collect();
        let result = items_in_view(&items, ListView::Favorites, &favorites, &RecentList::default());
        assert_eq!(ids(&result), vec![2, 4]);
    }

    #[test]
    fn test_available_categories_and_counts() {
        let items = sample();
        let categories = vec![
            category("sports", "Sports"),
            category("news", "News"),
            category("kids", " Kids"),
            category("empty", "Nothing Here"),
        ];
        let visible = items_in_view(
            &items,
            ListView::All,
            &FavoriteSet::new(),
            &RecentList::default(),
        );

        let all = available_categories(&categories, &visible, "");
        let names: Vec<&str> = all.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(names, vec!["kids", "news", "sports"]);

        let narrowed = available_categories(&categories, &visible, "ki");
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].id, "kids");
        assert!(available_categories(&categories, &visible, " ki").is_empty());

        assert_eq!(category_count(&visible, CategorySelection::Id("news"), None), 2);
        assert_eq!(category_count(&visible, CategorySelection::All, None), 4);
        assert_eq!(
            category_count(&visible, CategorySelection::All, Some(narrowed.as_slice())),
            1
        );
    }

    #[test]
    fn test_list_view_from_str() {
        assert_eq!(ListView::from_str("Favourites").unwrap(), ListView::Favorites);
        assert!(ListView::from_str("later").is_err());
    }
}
