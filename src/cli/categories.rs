// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::{CommandContext, OutputFormat, print_json};
use anyhow::Result;
use serde_json::json;
use xtream_dash::catalog::Category;
use xtream_dash::filter::{self, CategorySelection};
use xtream_dash::{CatalogKind, ListView, StreamItem};

pub struct CategoriesCommand {
    pub kind: CatalogKind,
    pub view: ListView,
    /// Name prefix narrowing the list
    pub term: Option<String>,
    pub format: OutputFormat,
}

/// One row of the category picker; `id` is `None` for the "All" entry
#[derive(Debug, PartialEq, Eq)]
pub struct CategoryRow<'a> {
    pub id: Option<&'a str>,
    pub name: &'a str,
    pub count: usize,
}

impl CategoriesCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let (mut dash, provider_name) = context.open_dashboard()?;
        eprintln!("Fetching {} categories from {}...", self.kind, provider_name);
        dash.load(self.kind).await?;

        let Some(catalog) = dash.catalog() else {
            return Ok(());
        };
        let view = if self.kind == CatalogKind::Live {
            self.view
        } else {
            ListView::All
        };
        let tracker = dash.tracker();
        let visible =
            filter::items_in_view(&catalog.items, view, tracker.favorites(), tracker.recent());
        let rows = category_rows(&catalog.categories, &visible, self.term.as_deref());

        match self.format {
            OutputFormat::Json => {
                let results: Vec<_> = rows
                    .iter()
                    .map(|row| json!({ "id": row.id, "name": row.name, "count": row.count }))
                    .collect();
                print_json(&results)?;
            }
            OutputFormat::Text => {
                for row in &rows {
                    println!("{:>8} | {} ({})", row.id.unwrap_or("*"), row.name, row.count);
                }
            }
        }

        Ok(())
    }
}

/// "All" followed by every category that has visible items
pub fn category_rows<'a>(
    categories: &'a [Category],
    visible: &[&StreamItem],
    term: Option<&str>,
) -> Vec<CategoryRow<'a>> {
    let term = term.unwrap_or_default();
    let available = filter::available_categories(categories, visible, term);
    let narrowed = !term.is_empty();

    let mut rows = vec![CategoryRow {
        id: None,
        name: "All",
        count: filter::category_count(
            visible,
            CategorySelection::All,
            narrowed.then_some(available.as_slice()),
        ),
    }];
    rows.extend(available.iter().map(|c| CategoryRow {
        id: Some(c.id.as_str()),
        name: c.name.as_str(),
        count: filter::category_count(visible, CategorySelection::Id(&c.id), None),
    }));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u32, category: &str) -> StreamItem {
        StreamItem {
            id,
            name: format!("Channel {}", id),
            category_id: category.to_string(),
            kind: CatalogKind::Live,
            icon: None,
            rating: None,
            extension: None,
            epg_channel_id: None,
        }
    }

    fn categories() -> Vec<Category> {
        [("1", "News"), ("2", "Sports"), ("3", "Nature")]
            .into_iter()
            .map(|(id, name)| Category {
                id: id.to_string(),
                name: name.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_rows_start_with_all() {
        let categories = categories();
        let items = vec![item(1, "1"), item(2, "1"), item(3, "2")];
        let visible: Vec<&StreamItem> = items.iter().collect();

        let rows = category_rows(&categories, &visible, None);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], CategoryRow { id: None, name: "All", count: 3 });
        assert_eq!(rows[1], CategoryRow { id: Some("1"), name: "News", count: 2 });
        assert_eq!(rows[2], CategoryRow { id: Some("2"), name: "Sports", count: 1 });
    }

    #[test]
    fn test_prefix_narrows_all_count() {
        let categories = categories();
        let items = vec![item(1, "1"), item(2, "3"), item(3, "2")];
        let visible: Vec<&StreamItem> = items.iter().collect();

        let rows = category_rows(&categories, &visible, Some("n"));
        let names: Vec<&str> = rows.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["All", "Nature", "News"]);
        assert_eq!(rows[0].count, 2);
    }
}
