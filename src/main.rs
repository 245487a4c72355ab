use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use inkframe::{EngineConfig, Playlist, RenderContext, RenderResponse, SourceRegistry, ViewType};

#[derive(Parser)]
#[command(name = "inkframe", version, about = "Render e-paper playlists")]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, short, global = true, default_value = "inkframe.json")]
    config: PathBuf,

    /// Playlist file (JSON array of items)
    #[arg(long, short, global = true, default_value = "playlist.json")]
    playlist: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render playlist items and print the responses as JSON
    Render {
        /// png, bmp, html or json
        #[arg(long, default_value = "png")]
        view: String,
        /// Render this item instead of rotating
        #[arg(long)]
        item: Option<String>,
        /// Number of rotation steps to render
        #[arg(long, default_value_t = 1)]
        ticks: usize,
    },
    /// Validate the configuration and playlist without rendering
    Check,
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // try_init also bridges `log` records emitted by the library
    let _ = fmt().with_env_filter(filter).with_target(true).finish().try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        EngineConfig::load(&cli.config).with_context(|| format!("loading {}", cli.config.display()))?
    } else {
        EngineConfig::default()
    };
    init_logging(&config.log_level);

    let items = inkframe::playlist::load_playlist(&cli.playlist)?;
    let context = Arc::new(RenderContext::from_config(&config).await?);
    let registry = Arc::new(SourceRegistry::with_builtin_sources());
    let backends: Vec<String> = context.pool.backend_names().into_iter().map(String::from).collect();
    let sources: Vec<String> = registry.names().into_iter().map(String::from).collect();
    let playlist = Playlist::new(context, registry);
    playlist
        .register_instances(items)
        .with_context(|| format!("registering {}", cli.playlist.display()))?;

    match cli.command {
        Command::Check => {
            println!(
                "{} items OK (sources: {}; backends: {})",
                playlist.len(),
                sources.join(", "),
                backends.join(", ")
            );
        }
        Command::Render { view, item, ticks } => {
            let view: ViewType = view.parse()?;
            let mut failed = false;
            let responses: Vec<RenderResponse> = match item {
                Some(id) => vec![playlist.render_by_id(&id, view).await],
                None => {
                    let mut out = Vec::with_capacity(ticks);
                    for _ in 0..ticks {
                        out.push(playlist.tick(view).await);
                    }
                    out
                }
            };
            for response in &responses {
                failed |= response.is_error();
                println!("{}", serde_json::to_string(response)?);
            }
            if failed {
                bail!("one or more renders failed");
            }
        }
    }

    Ok(())
}
