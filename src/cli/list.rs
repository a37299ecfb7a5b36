// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::{CommandContext, OutputFormat, print_json};
use anyhow::Result;
use serde_json::{Value, json};
use std::collections::HashSet;
use xtream_dash::{Catalog, CatalogKind, FilterCriteria, ListView, MinRating, StreamItem};

pub struct ListCommand {
    pub kind: CatalogKind,
    pub search: Option<String>,
    pub categories: Vec<String>,
    pub min_rating: MinRating,
    pub view: ListView,
    pub format: OutputFormat,
    pub limit: Option<usize>,
}

impl ListCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let (mut dash, provider_name) = context.open_dashboard()?;
        eprintln!("Fetching {} from {}...", self.kind, provider_name);
        dash.load(self.kind).await?;

        if self.kind != CatalogKind::Live && self.view != ListView::All {
            eprintln!("Favorites and recents are tracked for live channels only");
        }

        let criteria = self.criteria();
        let Some(catalog) = dash.catalog() else {
            return Ok(());
        };
        let items: Vec<&StreamItem> = dash
            .listing(self.view, &criteria)
            .into_iter()
            .take(self.limit.unwrap_or(usize::MAX))
            .collect();

        match self.format {
            OutputFormat::Json => {
                let results: Vec<Value> = items
                    .iter()
                    .map(|item| item_json(item, catalog, dash.tracker().is_favorite(item.id)))
                    .collect();
                print_json(&results)?;
            }
            OutputFormat::Text => {
                if items.is_empty() {
                    println!("No {} found", self.kind);
                }
                for item in items {
                    println!(
                        "{}",
                        format_item(item, catalog, dash.tracker().is_favorite(item.id))
                    );
                }
            }
        }

        Ok(())
    }

    fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            search: self.search.clone().unwrap_or_default(),
            categories: self.categories.iter().cloned().collect::<HashSet<_>>(),
            min_rating: self.min_rating,
        }
    }
}

fn item_json(item: &StreamItem, catalog: &Catalog, favorite: bool) -> Value {
    json!({
        "id": item.id,
        "name": item.name,
        "type": item.kind,
        "category_id": item.category_id,
        "category": catalog.category_name(&item.category_id),
        "rating": item.rating,
        "favorite": favorite,
    })
}

fn format_item(item: &StreamItem, catalog: &Catalog, favorite: bool) -> String {
    let mut line = format!(
        "{:6} | {}{}",
        item.id,
        if favorite { "* " } else { "" },
        item.name
    );
    if let Some(category) = catalog.category_name(&item.category_id) {
        line.push_str(&format!(" [{}]", category));
    }
    if let Some(rating) = item.rating {
        line.push_str(&format!(" ({:.1})", rating));
    }
    line
}
