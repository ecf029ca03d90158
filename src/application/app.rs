use crate::application::signal::shutdown_signal;
use crate::config::{AuditBackend, AuditSettings, Settings};
use crate::infrastructure::audit_store::{AuditStore, MemoryAuditStore};
use crate::infrastructure::database::PostgresAuditStore;
use crate::infrastructure::log_messages::{application, audit, database, upstream};
use crate::providers::bedrock::{AwsCredentialChain, AwsRegion, BedrockProvider};
use crate::providers::{build_client, Adapter, AzureOpenAiProvider};
use crate::proxy::audit_path::{AuditLogger, AuditWorker};
use crate::proxy::capture::CaptureState;
use crate::proxy::dispatcher::Dispatcher;
use crate::proxy::middleware::AuthConfig;
use crate::proxy::service::GatewayService;
use crate::proxy::types::{ApiKey, BodySizeLimit, QueueCapacity, RouteKey, UpstreamBaseUrl};
use crate::{Error, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Main application struct that coordinates all components
pub struct Application {
    settings: Settings,
    router: Router,
    worker: JoinHandle<usize>,
}

impl Application {
    /// Build the gateway: connect the audit store, start the audit worker,
    /// resolve provider credentials and assemble the router
    #[instrument(skip(settings))]
    pub async fn new(settings: Settings) -> Result<Self> {
        info!(environment = %settings.application.environment, "{}", application::STARTING);

        let store = connect_store(&settings.audit).await?;
        let capacity = QueueCapacity::try_new(settings.audit.queue_capacity)
            .map_err(|e| Error::invalid_setting("audit.queue_capacity", e.to_string()))?;
        let (logger, rx) = AuditLogger::channel(capacity);
        let worker =
            tokio::spawn(AuditWorker::new(rx, store, settings.audit.insert_timeout()).run());

        let max_body = BodySizeLimit::try_new(settings.upstream.max_request_body_bytes).map_err(
            |e| Error::invalid_setting("upstream.max_request_body_bytes", e.to_string()),
        )?;
        let dispatcher = build_dispatcher(&settings, max_body).await?;

        let router = GatewayService::new(
            dispatcher,
            CaptureState { logger, max_body },
            AuthConfig::hs256(&settings.auth.jwt_secret),
        )
        .into_router();

        Ok(Self {
            settings,
            router,
            worker,
        })
    }

    /// Serve until a shutdown signal, then wait for the audit queue to drain
    #[instrument(skip(self))]
    pub async fn run(self) -> Result<()> {
        let Self {
            settings,
            router,
            worker,
        } = self;

        let listener = TcpListener::bind(settings.listen_address()).await?;
        info!(address = %listener.local_addr()?, "{}", application::LISTENING);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        // The router owned the last audit senders; the worker exits once the
        // queue is empty
        match tokio::time::timeout(settings.audit.drain_timeout(), worker).await {
            Ok(Ok(persisted)) => info!(persisted, "{}", application::STOPPED),
            Ok(Err(e)) => error!(error = %e, "Audit worker task failed"),
            Err(_) => warn!(
                timeout_ms = settings.audit.drain_timeout_ms,
                "{}",
                audit::DRAIN_TIMEOUT
            ),
        }

        Ok(())
    }

    /// The assembled gateway router, without connect info
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

async fn connect_store(settings: &AuditSettings) -> Result<Arc<dyn AuditStore>> {
    match settings.backend {
        AuditBackend::Postgres => {
            let store = PostgresAuditStore::connect(settings).await?;
            store.health_check().await?;
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
        AuditBackend::Memory => {
            warn!("{}", database::MEMORY_BACKEND);
            Ok(Arc::new(MemoryAuditStore::new()))
        }
    }
}

/// Register the rewrite adapter (when an Azure endpoint is configured) and
/// the sign adapter under their route keys
async fn build_dispatcher(settings: &Settings, max_body: BodySizeLimit) -> Result<Dispatcher> {
    let client = build_client(settings.upstream.connect_timeout())?;
    let mut dispatcher = Dispatcher::new();

    if settings.azure.endpoint.trim().is_empty() {
        warn!(
            prefix = %settings.routing.azure_prefix,
            "Azure OpenAI endpoint not configured, route disabled"
        );
    } else {
        let base_url = UpstreamBaseUrl::try_new(settings.azure.endpoint.clone())
            .map_err(|e| Error::invalid_setting("azure.endpoint", e.to_string()))?;
        let api_key = ApiKey::try_new(settings.azure.api_key.clone())
            .map_err(|e| Error::invalid_setting("azure.api_key", e.to_string()))?;
        let key = route_key("routing.azure_prefix", &settings.routing.azure_prefix)?;
        dispatcher.register(
            key,
            Adapter::Rewrite(AzureOpenAiProvider::new(
                base_url,
                api_key,
                client.clone(),
                max_body,
            )),
        )?;
    }

    let region = AwsRegion::try_new(settings.bedrock.region.clone())
        .map_err(|e| Error::invalid_setting("bedrock.region", e.to_string()))?;
    let credentials = AwsCredentialChain::load(&region).await?;
    info!(region = %region, "{}", upstream::CREDENTIALS_LOADED);

    let mut bedrock = BedrockProvider::new(region, Arc::new(credentials), client, max_body)
        .with_credential_timeout(settings.bedrock.credential_timeout());
    if let Some(endpoint) = settings
        .bedrock
        .endpoint_override
        .as_deref()
        .filter(|endpoint| !endpoint.trim().is_empty())
    {
        let base_url = UpstreamBaseUrl::try_new(endpoint.to_string())
            .map_err(|e| Error::invalid_setting("bedrock.endpoint_override", e.to_string()))?;
        bedrock = bedrock.with_base_url(base_url);
    }
    debug!(endpoint = bedrock.base_url(), "Bedrock runtime endpoint");
    let key = route_key("routing.bedrock_prefix", &settings.routing.bedrock_prefix)?;
    dispatcher.register(key, Adapter::Sign(bedrock))?;

    info!(
        routes = ?dispatcher.route_keys().map(ToString::to_string).collect::<Vec<_>>(),
        "Provider routes registered"
    );
    Ok(dispatcher)
}

fn route_key(field: &'static str, prefix: &str) -> Result<RouteKey> {
    RouteKey::try_new(prefix.trim_matches('/'))
        .map_err(|e| Error::invalid_setting(field, e.to_string()))
}
