mod handlers;
mod router;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use std::convert::Infallible;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info};

use crate::core::jobs::ResearchManager;
use crate::core::lifecycle::LifecycleComponent;

use router::build_api_router;

pub struct ApiServer {
    manager: ResearchManager,
    log_tx: broadcast::Sender<String>,
    api_host: String,
    api_port: u16,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) manager: ResearchManager,
    pub(crate) log_tx: broadcast::Sender<String>,
    pub(crate) api_port: u16,
}

impl ApiServer {
    pub fn new(
        manager: ResearchManager,
        log_tx: broadcast::Sender<String>,
        api_host: String,
        api_port: u16,
    ) -> Self {
        Self {
            manager,
            log_tx,
            api_host,
            api_port,
        }
    }
}

async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| match msg {
        Ok(log) => Ok(Event::default().data(log)),
        Err(_) => Ok(Event::default().data("Log stream lagged")),
    });

    Sse::new(stream)
}

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("API Server Interface initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.api_host, self.api_port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let app = build_api_router(AppState {
            manager: self.manager.clone(),
            log_tx: self.log_tx.clone(),
            api_port: self.api_port,
        });

        tokio::spawn(async move {
            info!("API Server running at http://{addr}");
            if let Err(e) = axum::serve(listener, app).await {
                error!("API Server crashed: {}", e);
            }
        });
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API Server Interface shutting down...");
        Ok(())
    }
}
