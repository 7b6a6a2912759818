// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use conduit_config::Config;
use conduit_core::Pipeline;
use conduit_mcp::{AgentAccess, McpServerSpec, ToolManager};
use conduit_pricing::{derive_provider, PricingTable};
use conduit_providers::embedding::OpenAiEmbeddingClient;
use conduit_providers::{driver_for, ProviderKeys};
use conduit_server::state::AppState;
use conduit_storage::{spawn_cache_sweeper, spawn_session_sweeper, Store};
use conduit_trace::{Alerter, AuditLogger, NullSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    if let Some(Commands::ShowConfig) = &cli.command {
        println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
        return Ok(());
    }

    run(config).await
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    if let Some(path) = path {
        return conduit_config::load_file(path);
    }
    let default_path = std::path::Path::new("conduit.yaml");
    if default_path.exists() {
        return conduit_config::load_file(default_path);
    }
    conduit_config::load_str("{}")
}

async fn run(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);

    let database = config.database.clone().unwrap_or_else(|| "conduit.db".to_string());
    let store = Store::connect(&database).await.context("opening storage backend")?;

    let audit = Arc::new(AuditLogger::spawn(store.clone()));
    let alerter = Arc::new(Alerter::new());
    let keys = convert_keys(&config.keys);

    let tools = if config.tools.servers.is_empty() {
        None
    } else {
        let specs = config
            .tools
            .servers
            .iter()
            .map(|(name, spec)| McpServerSpec {
                name: name.clone(),
                command: spec.command.clone(),
                args: spec.args.clone(),
                env: spec.env.clone(),
            })
            .collect();
        let access = config
            .tools
            .agents
            .iter()
            .map(|(name, cfg)| (name.clone(), AgentAccess { allow: cfg.allow.clone(), deny: cfg.deny.clone() }))
            .collect();
        let manager = ToolManager::start(specs, access).await.context("starting MCP tool manager")?;
        Some(Arc::new(manager))
    };

    let embedder = if config.cache.enabled {
        config.keys.openai.clone().map(|key| Arc::new(OpenAiEmbeddingClient::new(key, "text-embedding-3-small")) as Arc<dyn conduit_providers::embedding::EmbeddingClient>)
    } else {
        None
    };

    let summarizer = if config.compression.enabled {
        config
            .compression
            .summary_model
            .as_deref()
            .and_then(|model| driver_for(derive_provider(model), &keys))
    } else {
        None
    };

    let pricing = PricingTable::with_defaults();
    let pipeline = Arc::new(Pipeline::new(pricing.clone(), Arc::new(NullSink), embedder, summarizer));

    let session_sweeper = spawn_session_sweeper(store.clone(), Duration::from_secs(300));
    let cache_ttl = Duration::from_secs((config.cache.ttl_minutes.max(1) as u64) * 60);
    let cache_sweeper = spawn_cache_sweeper(store.clone(), Duration::from_secs(60), cache_ttl);

    let state = AppState {
        pipeline,
        config: config.clone(),
        store,
        tools,
        keys,
        audit,
        alerter,
        pricing: Arc::new(pricing),
    };

    let result = conduit_server::run_http(state, config.port).await;

    session_sweeper.stop();
    cache_sweeper.stop();
    result
}

fn convert_keys(keys: &conduit_config::ProviderKeys) -> ProviderKeys {
    ProviderKeys {
        openai: keys.openai.clone(),
        anthropic: keys.anthropic.clone(),
        deepseek: keys.deepseek.clone(),
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
