use clap::Parser;
use lq_app::cli::Cli;
use lq_app::cli::Commands;
use lq_app::commands;
use lq_app::config_loader;
use lq_endpoints::EndpointRegistry;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let loaded = config_loader::load_config_or_default(&cli.config.to_string_lossy());
    let _guard = lq_app::tracing_setup::init("liqi", &loaded.config.logging);
    loaded.log();
    let config = loaded.config;

    info!(base_url = %config.base_url, rate_limit_ms = config.rate_limit_ms, "Starting liqi");

    let registry = EndpointRegistry::liqi();
    let output = match cli.command {
        Commands::Endpoints { tier, json } => commands::endpoints(registry, tier, json)?,
        Commands::Lookup { key } => commands::lookup(registry, &key)?,
        Commands::Call { key, params } => {
            let client = config.client_builder().build()?;
            commands::call(&client, &key, params).await?
        }
    };

    println!("{output}");
    Ok(())
}
