use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::parse_api_server_flags;
use crate::core::config::{self, RelayConfig};
use crate::core::jobs::{CleanupPolicy, CleanupScheduler, JobSettings, JobStore, ResearchManager};
use crate::core::lifecycle::LifecycleManager;
use crate::core::terminal;
use crate::core::upstream::ResponsesClient;
use crate::interfaces::web::ApiServer;
use crate::logging;

pub(super) async fn run(args: &[String]) -> Result<()> {
    let log_tx = logging::init("info", false);

    let data_dir = config::data_dir()?;
    let config = RelayConfig::load(&data_dir).await?;
    let (api_host, api_port) =
        parse_api_server_flags(args, 2, config.server.host.clone(), config.server.port);

    let upstream = Arc::new(ResponsesClient::new(
        &config.upstream.base_url,
        config.api_key(),
        config.connect_timeout(),
    )?);
    let store = JobStore::new();
    let settings = JobSettings::from_config(&config.jobs, &config.upstream.default_model)?;
    let manager = ResearchManager::new(store.clone(), upstream, settings);

    let mut lifecycle = LifecycleManager::new().await?;
    let cleanup = CleanupScheduler::new(
        store,
        CleanupPolicy::from_config(&config.jobs)?,
        config.jobs.cleanup_cron.clone(),
        lifecycle.scheduler.clone(),
    );
    lifecycle.attach(Arc::new(Mutex::new(cleanup)));
    lifecycle.attach(Arc::new(Mutex::new(ApiServer::new(
        manager,
        log_tx,
        api_host.clone(),
        api_port,
    ))));

    lifecycle.start().await?;

    terminal::print_banner();
    terminal::print_link("API", &format!("http://{}:{}", api_host, api_port));
    terminal::print_status("Upstream", &config.upstream.base_url);
    terminal::print_status("Model", &config.upstream.default_model);
    terminal::print_status("Data dir", &data_dir.display().to_string());
    terminal::print_success("Ready. Press Ctrl-C to stop.");
    info!("research-relay ready on {}:{}", api_host, api_port);

    tokio::signal::ctrl_c().await?;
    lifecycle.shutdown().await?;
    terminal::print_goodbye();
    Ok(())
}
