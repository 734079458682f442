//! Builder and handle for a running logger
//!
//! [`LoggerRuntimeBuilder`] wires the queue, store adapter, flusher and every
//! event source together and spawns them on the current tokio runtime.

use std::sync::Arc;

use placelog_core::host::{FriendsLookup, RegionLookup, SessionDirectory};
use placelog_core::store::DebugPrintStore;
use placelog_core::{
    BlobStore, Clock, ConfigError, HostEnvironment, LogQueue, LoggerConfig, OrderedIndex,
    SessionId, SystemClock,
};
use placelog_events::BatchMetadata;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapter::StoreAdapter;
use crate::flusher::{BatchFlusher, FlushStats};
use crate::sink::{ClientLogger, InboundChannel, LogSink, ServerLogger};
use crate::sources::{
    ChatMessage, ChatRelay, ErrorRelay, InboundRelay, PositionSampler, SessionEvent, SessionRelay,
};

/// Error during builder configuration
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("No store configured - use .with_store() or .with_stores() in production")]
    MissingStore,
    #[error("No session directory configured - use .with_host() or .with_directory()")]
    MissingDirectory,
    #[error("No region/friends lookups configured - use .with_host() or .with_lookups()")]
    MissingLookups,
    #[error("Invalid logger config: {0}")]
    Config(#[from] ConfigError),
}

/// Builder for [`LoggerRuntime`]
pub struct LoggerRuntimeBuilder {
    config: LoggerConfig,
    environment: HostEnvironment,
    clock: Option<Arc<dyn Clock>>,
    blobs: Option<Arc<dyn BlobStore>>,
    index: Option<Arc<dyn OrderedIndex>>,
    directory: Option<Arc<dyn SessionDirectory>>,
    regions: Option<Arc<dyn RegionLookup>>,
    friends: Option<Arc<dyn FriendsLookup>>,
    run_id: Option<String>,
    panic_hook: bool,
}

impl Default for LoggerRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggerRuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
            environment: HostEnvironment::local(),
            clock: None,
            blobs: None,
            index: None,
            directory: None,
            regions: None,
            friends: None,
            run_id: None,
            panic_hook: false,
        }
    }

    pub fn with_config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn environment(mut self, environment: HostEnvironment) -> Self {
        self.environment = environment;
        self
    }

    /// Override the record clock (default: [`SystemClock`])
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use one backend for both the blob collection and the ordered index
    pub fn with_store<S>(self, store: Arc<S>) -> Self
    where
        S: BlobStore + OrderedIndex + 'static,
    {
        self.with_stores(store.clone(), store)
    }

    pub fn with_stores(mut self, blobs: Arc<dyn BlobStore>, index: Arc<dyn OrderedIndex>) -> Self {
        self.blobs = Some(blobs);
        self.index = Some(index);
        self
    }

    /// Use one host for the session directory and both lookups
    pub fn with_host<H>(self, host: Arc<H>) -> Self
    where
        H: SessionDirectory + RegionLookup + FriendsLookup + 'static,
    {
        self.with_directory(host.clone())
            .with_lookups(host.clone(), host)
    }

    pub fn with_directory(mut self, directory: Arc<dyn SessionDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_lookups(
        mut self,
        regions: Arc<dyn RegionLookup>,
        friends: Arc<dyn FriendsLookup>,
    ) -> Self {
        self.regions = Some(regions);
        self.friends = Some(friends);
        self
    }

    /// Fix the run identifier (default: a fresh v4 UUID)
    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Install the process-wide panic hook on build (default: false)
    pub fn install_panic_hook(mut self, install: bool) -> Self {
        self.panic_hook = install;
        self
    }

    /// Spawn every task. Must be called from within a tokio runtime.
    pub fn build(self) -> Result<LoggerRuntime, BuildError> {
        self.config.validate()?;
        let logging_delay = self.config.logging_delay()?;
        let position_period = self.config.position_logging_period()?;

        let directory = self.directory.ok_or(BuildError::MissingDirectory)?;
        let (regions, friends) = match (self.regions, self.friends) {
            (Some(regions), Some(friends)) => (regions, friends),
            _ => return Err(BuildError::MissingLookups),
        };

        let live = self.config.is_live(self.environment);
        let stores: Option<(Arc<dyn BlobStore>, Arc<dyn OrderedIndex>)> =
            if self.config.prints_instead_of_writing(self.environment) {
                let store = Arc::new(DebugPrintStore::new());
                Some((store.clone(), store))
            } else if live {
                match (self.blobs, self.index) {
                    (Some(blobs), Some(index)) => Some((blobs, index)),
                    _ => return Err(BuildError::MissingStore),
                }
            } else {
                None
            };

        let run_id = self
            .run_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let queue = LogQueue::new(clock).with_warn_len(self.config.queue_warn_len);
        let logger = ServerLogger::new(queue.clone(), live);
        let sink: Arc<dyn LogSink> = Arc::new(logger.clone());

        let errors = ErrorRelay::new(sink.clone());
        if self.panic_hook {
            errors.install_panic_hook();
        }

        let (sources_tx, sources_rx) = watch::channel(false);
        let (flusher_tx, flusher_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        let flusher = stores.map(|(blobs, index)| {
            let adapter = StoreAdapter::new(
                blobs,
                index,
                self.config.blob_collection.clone(),
                self.config.index_collection.clone(),
                queue.clone(),
            );
            let flusher = BatchFlusher::new(
                queue.clone(),
                adapter,
                BatchMetadata::new(self.config.world_id.clone(), run_id.clone()),
                logging_delay,
            );
            tokio::spawn(flusher.run(flusher_rx))
        });

        let sampler = PositionSampler::new(
            directory.clone(),
            sink.clone(),
            position_period,
        );
        tasks.push(tokio::spawn(sampler.run(sources_rx.clone())));

        let (sessions, session_rx) = mpsc::unbounded_channel();
        let relay = SessionRelay::new(directory.clone(), regions, friends, sink.clone());
        tasks.push(tokio::spawn(relay.run(session_rx, sources_rx.clone())));

        let chat = if live {
            let (chat_tx, chat_rx) = mpsc::unbounded_channel();
            let relay = ChatRelay::new(directory.clone(), sink.clone());
            tasks.push(tokio::spawn(relay.run(chat_rx, sources_rx.clone())));
            Some(chat_tx)
        } else {
            None
        };

        let (inbound, inbound_rx) = InboundChannel::new(&self.config.log_event_name);
        let relay = InboundRelay::new(directory, sink);
        tasks.push(tokio::spawn(relay.run(inbound_rx, sources_rx)));

        info!(
            target: "runtime",
            "Logger started: run {}, live {}, flushing every {:?}",
            run_id,
            live,
            logging_delay
        );

        Ok(LoggerRuntime {
            run_id,
            logger,
            errors,
            inbound,
            sessions,
            chat,
            sources_tx,
            flusher_tx,
            flusher,
            tasks,
        })
    }
}

/// Handle to a running logger
pub struct LoggerRuntime {
    run_id: String,
    logger: ServerLogger,
    errors: ErrorRelay,
    inbound: InboundChannel,
    sessions: mpsc::UnboundedSender<SessionEvent>,
    chat: Option<mpsc::UnboundedSender<ChatMessage>>,
    sources_tx: watch::Sender<bool>,
    flusher_tx: watch::Sender<bool>,
    flusher: Option<JoinHandle<FlushStats>>,
    tasks: Vec<JoinHandle<()>>,
}

impl LoggerRuntime {
    pub fn builder() -> LoggerRuntimeBuilder {
        LoggerRuntimeBuilder::new()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn is_live(&self) -> bool {
        self.logger.is_live()
    }

    /// Server-side logging handle
    pub fn logger(&self) -> &ServerLogger {
        &self.logger
    }

    pub fn queue(&self) -> &LogQueue {
        self.logger.queue()
    }

    pub fn errors(&self) -> &ErrorRelay {
        &self.errors
    }

    /// The named client-to-server channel
    pub fn inbound(&self) -> &InboundChannel {
        &self.inbound
    }

    /// Logging handle for a client process connected as `session`
    pub fn client(&self, session: SessionId) -> ClientLogger {
        self.inbound.client(session)
    }

    /// Where the host reports joins and leaves
    pub fn sessions(&self) -> mpsc::UnboundedSender<SessionEvent> {
        self.sessions.clone()
    }

    /// Where the host reports chat lines. `None` when the process is not live.
    pub fn chat(&self) -> Option<mpsc::UnboundedSender<ChatMessage>> {
        self.chat.clone()
    }

    /// Stop every source, then let the flusher write what is left.
    ///
    /// Returns the flusher's totals, or defaults when no flusher was running.
    pub async fn shutdown(self) -> FlushStats {
        info!(target: "runtime", "Shutting down logger run {}", self.run_id);

        let _ = self.sources_tx.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(target: "runtime", "Source task ended abnormally: {}", e);
            }
        }

        let _ = self.flusher_tx.send(true);
        match self.flusher {
            Some(flusher) => match flusher.await {
                Ok(stats) => stats,
                Err(e) => {
                    warn!(target: "runtime", "Flusher task ended abnormally: {}", e);
                    FlushStats::default()
                }
            },
            None => FlushStats::default(),
        }
    }
}
