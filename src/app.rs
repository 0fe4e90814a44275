use crate::api::CallsApiClient;
use crate::assistant::AssistantCache;
use crate::config::Config;
use crate::event::{event_channel, EventSender};
use crate::mappings::{self, MappingStore};
use crate::service::CallService;
use anyhow::{anyhow, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

pub struct AppStateInner {
    pub config: Arc<Config>,
    pub service: Arc<CallService>,
    pub mappings: Arc<dyn MappingStore>,
    pub events: EventSender,
    pub token: CancellationToken,
}

pub type AppState = Arc<AppStateInner>;

pub struct AppStateBuilder {
    pub config: Option<Config>,
    pub service: Option<Arc<CallService>>,
    pub mappings: Option<Arc<dyn MappingStore>>,
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            service: None,
            mappings: None,
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn service(mut self, service: Arc<CallService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn mappings(mut self, mappings: Arc<dyn MappingStore>) -> Self {
        self.mappings = Some(mappings);
        self
    }

    pub fn build(self) -> Result<AppState> {
        let config = Arc::new(self.config.unwrap_or_default());
        let (events, _) = event_channel();

        let mappings = self
            .mappings
            .unwrap_or_else(|| mappings::create_mapping_store(&config.mapping_store));

        let service = match self.service {
            Some(service) => service,
            None => {
                let client = Arc::new(CallsApiClient::new(&config.calls_api)?);
                Arc::new(CallService::new(
                    client,
                    Arc::new(AssistantCache::new()),
                    mappings.clone(),
                    config.fetch_strategy,
                    events.clone(),
                ))
            }
        };

        Ok(Arc::new(AppStateInner {
            config,
            service,
            mappings,
            events,
            token: CancellationToken::new(),
        }))
    }
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn run(state: AppState) -> Result<()> {
    let token = state.token.clone();
    let app = create_router(state.clone());

    let addr: SocketAddr = state.config.http_addr.parse()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow!("failed to bind {}: {}", addr, e))?;
    info!("listening on {}", addr);

    let server = async move { axum::serve(listener, app).await };
    select! {
        result = server => {
            if let Err(e) = result {
                return Err(anyhow!("server error: {}", e));
            }
            info!("server shut down gracefully");
        }
        _ = token.cancelled() => {
            info!("shutting down due to cancellation");
        }
    }
    Ok(())
}

fn create_router(state: AppState) -> Router {
    // CORS configuration to allow the browser dashboard cross-origin
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ]);

    crate::handler::router().with_state(state).layer(cors)
}
