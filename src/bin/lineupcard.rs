use std::{collections::BTreeMap, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use lineupcard::{
    AppState, AssetStore, CardConfig, Fetcher, LineupService, RequestId, TextRenderer,
    compose::glow::render_overlay,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lineupcard", version)]
struct Cli {
    /// Directory holding the background, fallback tiles and fonts.
    #[arg(long, global = true, default_value = ".")]
    assets: PathBuf,

    /// JSON file overriding the built-in deployment config.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// Render a lineup card to a PNG file.
    Render(RenderArgs),
    /// Render the glow overlay composition to a PNG file.
    Overlay(OverlayArgs),
    /// Print the configured slot table as JSON.
    Slots,
}

#[derive(Parser, Debug)]
struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0:7860")]
    bind: SocketAddr,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Image source as `key=url`; repeatable.
    #[arg(long = "slot", value_parser = parse_slot)]
    slots: Vec<(String, String)>,

    /// Label text; the configured default when omitted.
    #[arg(long)]
    text: Option<String>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct OverlayArgs {
    /// Overlay image URL.
    #[arg(long)]
    img: String,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn parse_slot(raw: &str) -> Result<(String, String), String> {
    let (key, url) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=url, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty slot key in '{raw}'"));
    }
    Ok((key.to_string(), url.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => CardConfig::from_path(path)?,
        None => CardConfig::default(),
    };

    match cli.cmd {
        Command::Serve(args) => cmd_serve(cfg, cli.assets, args).await,
        Command::Render(args) => cmd_render(cfg, cli.assets, args).await,
        Command::Overlay(args) => cmd_overlay(cfg, args).await,
        Command::Slots => cmd_slots(&cfg),
    }
}

async fn cmd_serve(cfg: CardConfig, assets: PathBuf, args: ServeArgs) -> anyhow::Result<()> {
    tracing::info!(assets = %assets.display(), slots = cfg.slots.len(), "starting service");
    let state = AppState::new(cfg, assets)?;
    lineupcard::server::bind_and_serve(args.bind, state).await?;
    Ok(())
}

async fn cmd_render(cfg: CardConfig, assets: PathBuf, args: RenderArgs) -> anyhow::Result<()> {
    cfg.validate()?;
    let store = AssetStore::new(assets);
    let text_renderer = TextRenderer::from_chain(&TextRenderer::strategies(&cfg.fonts, &store));
    let fetcher = Fetcher::new(&cfg.fetch)?;
    let text = args.text.unwrap_or_else(|| cfg.default_text.clone());
    let service = LineupService::new(Arc::new(cfg), store, fetcher, Arc::new(text_renderer));

    let sources: BTreeMap<String, String> = args.slots.into_iter().collect();
    let request_id = RequestId::generate();
    let card = service.render(&sources, &text, &request_id).await?;

    std::fs::write(&args.out, &card.png)
        .with_context(|| format!("write '{}'", args.out.display()))?;
    println!(
        "wrote {} ({} of {} slots painted)",
        args.out.display(),
        card.painted(),
        card.slots.len()
    );
    Ok(())
}

async fn cmd_overlay(cfg: CardConfig, args: OverlayArgs) -> anyhow::Result<()> {
    cfg.validate()?;
    let fetcher = Fetcher::new(&cfg.fetch)?;
    let staging_dir = cfg.staging_dir.as_deref().map(std::path::Path::new);
    let staged = render_overlay(
        &fetcher,
        &cfg.glow,
        staging_dir,
        Some(&args.img),
        &RequestId::generate(),
    )
    .await?;

    std::fs::write(&args.out, &staged.png)
        .with_context(|| format!("write '{}'", args.out.display()))?;
    println!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_slots(cfg: &CardConfig) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&cfg.slots).context("serialize slots")?;
    println!("{json}");
    Ok(())
}
