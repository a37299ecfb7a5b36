// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::{CommandContext, OutputFormat, print_json};
use anyhow::Result;
use serde_json::json;

/// Toggle a live channel in the favorites, or list them without an id
pub struct FavoriteCommand {
    pub id: Option<u32>,
    pub format: OutputFormat,
}

impl FavoriteCommand {
    pub fn execute(self, context: CommandContext) -> Result<()> {
        let (mut dash, provider_name) = context.open_dashboard()?;

        let Some(id) = self.id else {
            let favorites: Vec<u32> = dash.tracker().favorites().iter().collect();
            match self.format {
                OutputFormat::Json => print_json(&favorites)?,
                OutputFormat::Text if favorites.is_empty() => {
                    println!("No favorites for {}", provider_name)
                }
                OutputFormat::Text => favorites.iter().for_each(|id| println!("{}", id)),
            }
            return Ok(());
        };

        let added = dash.toggle_favorite(id);
        match self.format {
            OutputFormat::Json => print_json(&json!({ "id": id, "favorite": added }))?,
            OutputFormat::Text if added => println!("Added {} to favorites", id),
            OutputFormat::Text => println!("Removed {} from favorites", id),
        }
        Ok(())
    }
}

/// Recently played live channels, most recent first
pub struct RecentCommand {
    pub format: OutputFormat,
}

impl RecentCommand {
    pub fn execute(self, context: CommandContext) -> Result<()> {
        let (dash, provider_name) = context.open_dashboard()?;
        let recent = dash.tracker().recent().ids();

        match self.format {
            OutputFormat::Json => print_json(&recent)?,
            OutputFormat::Text if recent.is_empty() => {
                println!("No recent channels for {}", provider_name)
            }
            OutputFormat::Text => recent.iter().for_each(|id| println!("{}", id)),
        }
        Ok(())
    }
}
