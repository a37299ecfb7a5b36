// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::{CommandContext, OutputFormat, print_json};
use anyhow::Result;
use xtream_dash::catalog::{Season, fetch_episodes};

pub struct EpisodesCommand {
    pub series_id: u32,
    pub format: OutputFormat,
}

impl EpisodesCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let (api, provider_name) = context.get_single_provider()?;
        eprintln!("Fetching episodes from {}...", provider_name);
        let seasons = fetch_episodes(&api, self.series_id).await?;

        match self.format {
            OutputFormat::Json => print_json(&seasons)?,
            OutputFormat::Text => {
                if seasons.is_empty() {
                    println!("No episodes found for series {}", self.series_id);
                }
                for line in season_lines(&seasons) {
                    println!("{}", line);
                }
            }
        }

        Ok(())
    }
}

fn season_lines(seasons: &[Season]) -> Vec<String> {
    let mut lines = Vec::new();
    for season in seasons {
        lines.push(format!("Season {}", season.number));
        for episode in &season.episodes {
            let mut line = format!(
                "  {:>8} | E{:02} {}",
                episode.id,
                episode.number,
                episode.display_title()
            );
            if let Some(duration) = &episode.duration {
                line.push_str(&format!(" ({})", duration));
            }
            if !episode.is_playable() {
                line.push_str(" [unavailable]");
            }
            lines.push(line);
        }
    }
    lines
}
