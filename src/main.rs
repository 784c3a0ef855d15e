mod picker;
mod render;
mod repl;
mod spinner;

use anyhow::Result;
use clap::Parser;
use relay_core::config::{resolve_token, token_sources, AppConfig};
use render::{CYAN, GOLD, GRAY, RED, RESET};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "relay",
    about = "Terminal agent for a remote model with user-defined shortcuts, tools and personas",
    version,
    author
)]
struct Cli {
    /// Path to config file (default: ~/.config/relay-shell/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the model name
    #[arg(short, long)]
    model: Option<String>,

    /// Override the chat API base URL
    #[arg(long)]
    api_base: Option<String>,

    /// Identity whose token file (~/.relay-token-<user>) is tried first
    #[arg(short, long)]
    user: Option<String>,

    /// Do not offer tools to the model; replies are streamed
    #[arg(long)]
    no_tools: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// `list` prints the server's models; anything else is a one-shot query
    #[arg(trailing_var_arg = true)]
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(model) = &cli.model {
        config.endpoint.model = model.clone();
    }
    if let Some(api_base) = &cli.api_base {
        config.endpoint.api_base = api_base.clone();
    }
    if cli.no_tools {
        config.agent.tools_enabled = false;
    }

    let user = cli.user.as_deref().map(str::to_lowercase);
    let Some(token) = resolve_token(&token_sources(&config, user.as_deref())) else {
        print_token_help(&config, user.as_deref());
        std::process::exit(1);
    };
    if let Some(user) = &user {
        println!("\n  {GOLD}◉ identity:{RESET}  {user}");
    }

    match cli.query.as_slice() {
        [] => repl::run(config, token).await,
        [cmd] if cmd == "list" => repl::list(config, token).await,
        words => repl::one_shot(config, token, &words.join(" ")).await,
    }
}

fn print_token_help(config: &AppConfig, user: Option<&str>) {
    println!("\n{RED}  no token{RESET}");
    if let Some(user) = user {
        println!("  {GRAY}write your token:   {CYAN}echo 'tok' > ~/.relay-token-{user}{RESET}");
    } else {
        println!("  {GRAY}write your token:   {CYAN}echo 'tok' > ~/.relay-token{RESET}");
    }
    println!("  {GRAY}or env:             {CYAN}export {}=tok{RESET}", config.endpoint.token_env);
    println!(
        "  {GRAY}or config:          {CYAN}token = \"tok\" under [endpoint] in {}{RESET}\n",
        AppConfig::default_path().display()
    );
}
