// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::Result;
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use xtream_dash::{CatalogKind, Config, ListView, MinRating, Player, XTreamAPI};

mod cli;
use cli::{
    CategoriesCommand, CommandContext, EpgCommand, EpisodesCommand, FavoriteCommand, ListCommand,
    OutputFormat, PlayCommand, RecentCommand,
};

fn cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default())
}

#[derive(Parser)]
#[command(name = "xtream-dash")]
#[command(about = "Browse and play Xtream-Codes IPTV catalogs from the terminal")]
#[command(version)]
#[command(styles = cargo_style())]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging to file (xtream_dash_debug.log)
    #[arg(long, global = true)]
    debug_log: bool,

    /// Provider name to use (case-insensitive, or set XTREAM_DASH_PROVIDER)
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ListArgs {
    /// Case-insensitive substring of the name
    #[arg(short, long)]
    search: Option<String>,

    /// Category id to include (repeatable)
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Maximum number of results
    #[arg(short, long)]
    limit: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// List live channels
    Live {
        #[command(flatten)]
        list: ListArgs,

        /// Which channels to show (all, favorites, recent)
        #[arg(long, default_value = "all")]
        view: String,
    },

    /// List movies
    Movies {
        #[command(flatten)]
        list: ListArgs,

        /// Minimum rating on a 0-5 scale, or "all"
        #[arg(long, default_value = "all")]
        min_rating: String,
    },

    /// List series
    Series {
        #[command(flatten)]
        list: ListArgs,

        /// Minimum rating on a 0-5 scale, or "all"
        #[arg(long, default_value = "all")]
        min_rating: String,
    },

    /// List the episodes of a series
    Episodes { series_id: u32 },

    /// List categories with item counts
    Categories {
        /// Content type (live, movie, series)
        r#type: String,

        /// Only categories whose name starts with this
        #[arg(long)]
        filter: Option<String>,

        /// Count only favorites or recents (live only)
        #[arg(long, default_value = "all")]
        view: String,
    },

    /// Show what is on now and next for a live channel
    Epg {
        stream_id: u32,

        /// Number of listings to request
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Play a channel, movie or series episode
    Play {
        /// Content type (live, movie, series)
        r#type: String,

        /// Stream id, or series id for series
        id: u32,

        /// Episode id to play from the series
        #[arg(short, long)]
        episode: Option<String>,

        /// Start the player and return immediately
        #[arg(short, long)]
        detached: bool,
    },

    /// Toggle a favorite channel, or list favorites
    Favorite { id: Option<u32> },

    /// List recently played channels
    Recent,

    /// Show account status for the provider
    Account,

    /// Execute raw API calls
    #[command(subcommand)]
    Api(ApiSubcommand),
}

#[derive(Subcommand)]
enum ApiSubcommand {
    /// Get user info
    UserInfo,
    /// Get live categories
    LiveCategories,
    /// Get VOD categories
    VodCategories,
    /// Get series categories
    SeriesCategories,
    /// Get live streams
    LiveStreams {
        #[arg(long)]
        category: Option<String>,
    },
    /// Get VOD streams
    VodStreams {
        #[arg(long)]
        category: Option<String>,
    },
    /// Get series
    Series {
        #[arg(long)]
        category: Option<String>,
    },
    /// Get series info
    SeriesInfo { id: u32 },
    /// Get short EPG for a live stream
    ShortEpg {
        id: u32,
        #[arg(short, long)]
        limit: Option<u32>,
    },
}

async fn run_api_command(api: &XTreamAPI, cmd: ApiSubcommand) -> Result<()> {
    // Raw JSON responses without any interpretation or deserialization
    let category_params =
        |category: Option<String>| category.map(|c| vec![("category_id", c)]).unwrap_or_default();

    let result = match cmd {
        ApiSubcommand::UserInfo => api.make_request_raw("get_user_info", &[]).await?,
        ApiSubcommand::LiveCategories => api.make_request_raw("get_live_categories", &[]).await?,
        ApiSubcommand::VodCategories => api.make_request_raw("get_vod_categories", &[]).await?,
        ApiSubcommand::SeriesCategories => {
            api.make_request_raw("get_series_categories", &[]).await?
        }
        ApiSubcommand::LiveStreams { category } => {
            api.make_request_raw("get_live_streams", &category_params(category))
                .await?
        }
        ApiSubcommand::VodStreams { category } => {
            api.make_request_raw("get_vod_streams", &category_params(category))
                .await?
        }
        ApiSubcommand::Series { category } => {
            api.make_request_raw("get_series", &category_params(category))
                .await?
        }
        ApiSubcommand::SeriesInfo { id } => {
            api.make_request_raw("get_series_info", &[("series_id", id.to_string())])
                .await?
        }
        ApiSubcommand::ShortEpg { id, limit } => {
            let mut params = vec![("stream_id", id.to_string())];
            if let Some(limit) = limit {
                params.push(("limit", limit.to_string()));
            }
            api.make_request_raw("get_short_epg", &params).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn list_catalog(
    kind: CatalogKind,
    list: ListArgs,
    min_rating: &str,
    format: OutputFormat,
    context: CommandContext,
) -> Result<()> {
    let cmd = ListCommand {
        kind,
        search: list.search,
        categories: list.categories,
        min_rating: MinRating::from_str(min_rating)?,
        view: ListView::All,
        format,
        limit: list.limit,
    };
    cmd.execute(context).await
}

async fn show_account(api: &XTreamAPI, provider_name: &str, format: OutputFormat) -> Result<()> {
    let info = api.get_user_info().await?;
    match format {
        OutputFormat::Json => cli::print_json(&info)?,
        OutputFormat::Text => {
            let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
            println!("Provider:    {}", provider_name);
            println!("Username:    {}", info.username);
            println!("Status:      {}", field(&info.status));
            println!("Expires:     {}", field(&info.exp_date));
            println!(
                "Connections: {}/{}",
                field(&info.active_cons),
                field(&info.max_connections)
            );
        }
    }
    Ok(())
}

fn init_logging(cli: &Cli) -> Result<()> {
    if cli.debug_log {
        let file = File::create("xtream_dash_debug.log")?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_level(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(
                EnvFilter::from_default_env()
                    .add_directive("xtream_dash=debug".parse()?)
                    .add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else if cli.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::from_default_env()
                    .add_directive(tracing::Level::DEBUG.into())
                    .add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("hyper_util=error".parse()?),
            )
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    if !config_path.exists() {
        if cli.config.is_some() {
            anyhow::bail!("Config file not found: {}", config_path.display());
        }
        Config::default().save(&config_path)?;
        eprintln!(
            "Created {}. Add your provider details there and run again.",
            config_path.display()
        );
        return Ok(());
    }
    let config = Config::load(&config_path)?;

    let player = Player::from_config(&config.player);
    let format = OutputFormat::from_str(&cli.format)?;
    let selected_provider = cli
        .provider
        .or_else(|| std::env::var("XTREAM_DASH_PROVIDER").ok());
    let context = CommandContext::new(config, selected_provider);

    match cli.command {
        Commands::Live { list, view } => {
            let cmd = ListCommand {
                kind: CatalogKind::Live,
                search: list.search,
                categories: list.categories,
                min_rating: MinRating::All,
                view: ListView::from_str(&view)?,
                format,
                limit: list.limit,
            };
            cmd.execute(context).await?;
        }
        Commands::Movies { list, min_rating } => {
            list_catalog(CatalogKind::Movie, list, &min_rating, format, context).await?;
        }
        Commands::Series { list, min_rating } => {
            list_catalog(CatalogKind::Series, list, &min_rating, format, context).await?;
        }
        Commands::Episodes { series_id } => {
            EpisodesCommand { series_id, format }.execute(context).await?;
        }
        Commands::Categories {
            r#type,
            filter,
            view,
        } => {
            let cmd = CategoriesCommand {
                kind: CatalogKind::from_str(&r#type)?,
                view: ListView::from_str(&view)?,
                term: filter,
                format,
            };
            cmd.execute(context).await?;
        }
        Commands::Epg { stream_id, limit } => {
            let cmd = EpgCommand {
                stream_id,
                limit,
                format,
            };
            cmd.execute(context).await?;
        }
        Commands::Play {
            r#type,
            id,
            episode,
            detached,
        } => {
            let cmd = PlayCommand {
                kind: CatalogKind::from_str(&r#type)?,
                id,
                episode,
                detached,
            };
            cmd.execute(context, player).await?;
        }
        Commands::Favorite { id } => {
            FavoriteCommand { id, format }.execute(context)?;
        }
        Commands::Recent => {
            RecentCommand { format }.execute(context)?;
        }
        Commands::Account => {
            let (api, provider_name) = context.get_single_provider()?;
            show_account(&api, &provider_name, format).await?;
        }
        Commands::Api(cmd) => {
            let (api, provider_name) = context.get_single_provider()?;
            eprintln!("Using provider: {}", provider_name);
            run_api_command(&api, cmd).await?;
        }
    }

    Ok(())
}
