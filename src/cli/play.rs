// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::{CommandContext, epg::window_lines};
use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::warn;
use xtream_dash::catalog::{Episode, Season, fetch_episodes};
use xtream_dash::{CatalogKind, Player, PlayerEvent};

pub struct PlayCommand {
    pub kind: CatalogKind,
    pub id: u32,
    /// Episode id, required when `kind` is series
    pub episode: Option<String>,
    pub detached: bool,
}

impl PlayCommand {
    pub async fn execute(self, context: CommandContext, player: Player) -> Result<()> {
        if !player.is_available().await {
            anyhow::bail!(
                "Player '{}' not found or not working. Check the [player] section of your config.",
                player.command()
            );
        }

        let (mut dash, provider_name) = context.open_dashboard()?;
        eprintln!("Using provider: {}", provider_name);

        let (title, url) = match self.kind {
            CatalogKind::Series => {
                let episode_id = self
                    .episode
                    .as_deref()
                    .context("Series playback needs an episode id (--episode)")?;
                let seasons = fetch_episodes(dash.api(), self.id).await?;
                let episode = find_episode(&seasons, episode_id).with_context(|| {
                    format!("Episode {} not found in series {}", episode_id, self.id)
                })?;
                (episode.display_title(), dash.episode_url(episode)?)
            }
            CatalogKind::Live | CatalogKind::Movie => {
                dash.load(self.kind).await?;
                let selection = dash.select(self.id)?;
                (selection.item.name.clone(), selection.url.clone())
            }
        };

        if self.kind == CatalogKind::Live {
            match dash.refresh_epg().await {
                Ok(_) => {
                    for line in window_lines(&dash.now_next(Utc::now())) {
                        eprintln!("{}", line);
                    }
                }
                Err(e) => warn!("{:#}", e),
            }
        }

        eprintln!("Playing: {}", title);

        if self.detached {
            player.play_detached(&url)?;
            println!("Stream started in detached window");
        } else {
            let (tx, rx) = mpsc::channel(8);
            let printer = tokio::spawn(print_events(rx));
            let result = player.play(&url, tx).await;
            printer.await?;
            result?;
        }

        dash.close_player();
        Ok(())
    }
}

async fn print_events(mut events: mpsc::Receiver<PlayerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            PlayerEvent::Ready { pid: Some(pid) } => eprintln!("Player started (pid {})", pid),
            PlayerEvent::Ready { pid: None } => eprintln!("Player started"),
            PlayerEvent::Ended => eprintln!("Playback ended"),
            PlayerEvent::Error(message) => eprintln!("Error: {}", message),
        }
    }
}

fn find_episode<'a>(seasons: &'a [Season], episode_id: &str) -> Option<&'a Episode> {
    seasons
        .iter()
        .flat_map(|s| s.episodes.iter())
        .find(|e| e.id == episode_id)
}
