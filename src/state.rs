use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::inference::{BiEncoderModel, Embedder};
use crate::ingestion::{load_manifest, register_builtins, register_manifest};
use crate::registry::ToolRegistry;
use crate::search::{SearchOptions, SearchService};
use crate::transport::{HttpTransport, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Application state shared across all request handlers.
///
/// Built once by the composition root. Registry, catalog and search index are
/// read-only after construction.
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
    pub search: Arc<SearchService>,
    pub dispatcher: Dispatcher,
    pub transport: Arc<dyn Transport>,
    /// Bounds concurrent discovery embeddings.
    pub semaphore: Arc<Semaphore>,
    /// Set once registration and index build/load have completed.
    pub ready: AtomicBool,
    pub config: Arc<Config>,
}

impl AppState {
    /// Initialize application state.
    ///
    /// Registration failures (unreadable manifest, invalid builtin schema) are
    /// fatal. A missing or broken embedding model is not: discovery then runs
    /// in keyword mode. Blocking: run it off the async runtime.
    pub fn new(config: Config) -> Result<Self> {
        let num_cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        tracing::info!(num_cores, "Detected CPU cores");

        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(
            config.target_host.clone(),
            config.target_ports.clone(),
            Duration::from_millis(config.target_timeout_ms),
            config.target_identity_command.clone(),
        )?);

        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry, transport.clone())?;

        if let Some(tools_path) = &config.tools_path {
            let tools = load_manifest(tools_path)?;
            register_manifest(&mut registry, tools, transport.clone());
        } else {
            tracing::warn!("TOOLS_PATH not set. Only built-in tools are available");
        }

        tracing::info!(tools = registry.len(), "Tool registration complete");
        let registry = Arc::new(registry);

        let embedder = match BiEncoderModel::load(
            &config.embedding_model_path,
            &config.embedding_tokenizer_path,
            config.max_sequence_length,
            config.pool_size.unwrap_or(num_cores),
            config.intra_threads,
        ) {
            Ok(model) => Some(Arc::new(model) as Arc<dyn Embedder>),
            Err(e) => {
                tracing::error!(error = %e, "Failed to load embedding model");
                None
            }
        };

        let search = SearchService::build_or_load(
            registry.clone(),
            embedder,
            &config.index_path,
            SearchOptions {
                limit: config.search_limit,
                threshold: config.similarity_threshold,
                keyword_enrichment: config.keyword_enrichment,
            },
        );

        let permits = config.search_permits.unwrap_or(num_cores);
        Ok(Self::from_parts(config, registry, search, transport, permits))
    }

    /// Assemble state from already-built parts.
    pub fn from_parts(
        config: Config,
        registry: Arc<ToolRegistry>,
        search: SearchService,
        transport: Arc<dyn Transport>,
        permits: usize,
    ) -> Self {
        let state = Self {
            dispatcher: Dispatcher::new(registry.clone()),
            registry,
            search: Arc::new(search),
            transport,
            semaphore: Arc::new(Semaphore::new(permits.max(1))),
            ready: AtomicBool::new(false),
            config: Arc::new(config),
        };

        state.ready.store(true, Ordering::SeqCst);
        state
    }

    /// Check if the service is ready to handle requests.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
