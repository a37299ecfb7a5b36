// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::{CommandContext, OutputFormat, print_json};
use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;
use xtream_dash::dashboard::SHORT_EPG_LIMIT;
use xtream_dash::epg::{self, EpgWindow, ProgramEntry};

pub struct EpgCommand {
    pub stream_id: u32,
    pub limit: Option<u32>,
    pub format: OutputFormat,
}

impl EpgCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let (api, provider_name) = context.get_single_provider()?;
        eprintln!("Fetching EPG from {}...", provider_name);

        let listings = api
            .get_short_epg(self.stream_id, Some(self.limit.unwrap_or(SHORT_EPG_LIMIT)))
            .await
            .with_context(|| format!("Failed to load EPG for stream {}", self.stream_id))?;
        let entries = epg::entries_from_listings(listings);
        let window = epg::resolve(&entries, Utc::now());

        match self.format {
            OutputFormat::Json => print_json(&json!({
                "stream_id": self.stream_id,
                "current": window.current,
                "next": window.next,
                "entries": entries,
            }))?,
            OutputFormat::Text => {
                for line in window_lines(&window) {
                    println!("{}", line);
                }
                if !entries.is_empty() {
                    println!();
                    for entry in &entries {
                        println!("{}", entry_line(entry));
                    }
                }
            }
        }

        Ok(())
    }
}

/// "Now" and "Next" lines, or a notice when nothing is scheduled
pub fn window_lines(window: &EpgWindow) -> Vec<String> {
    if window.is_empty() {
        return vec!["No program information available".to_string()];
    }

    let mut lines = Vec::new();
    if let Some(current) = &window.current {
        lines.push(format!("Now:  {}", entry_line(&current.entry)));
    }
    if let Some(next) = &window.next {
        lines.push(format!("Next: {}", entry_line(&next.entry)));
    }
    lines
}

fn entry_line(entry: &ProgramEntry) -> String {
    format!(
        "{} - {} {}",
        epg::format_clock(&entry.start),
        epg::format_clock(&entry.stop),
        entry.title.as_deref().unwrap_or("(untitled)")
    )
}
