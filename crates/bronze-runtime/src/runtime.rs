//! Runtime bootstrap.
//!
//! [`BronzeRuntime`] ties the pieces together: it owns the configuration,
//! one OneBot connection, the dispatcher and the command router.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! let runtime = BronzeRuntime::builder().profile("production").build()?;
//!
//! runtime
//!     .command(
//!         CommandDescriptor::new("echo", "复读").trigger("echo"),
//!         command_fn(|ctx: MessageContext| async move {
//!             ctx.quick_reply(ctx.args(), QuickReplyOptions::default()).await?;
//!             Ok(())
//!         }),
//!     )
//!     .help_command(["帮助", "help"]);
//!
//! // Until Ctrl+C, SIGTERM, or reconnection gives up.
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tracing::{debug, error, info, warn};

use bronze_framework::{CommandDescriptor, CommandExecutor, CommandRouter, Dispatcher, EventHandler};
use bronze_onebot::{EventType, OneBotBot, OneBotConnection};
use bronze_transport::ClientTransport;

use crate::config::{BronzeConfig, ConfigLoader, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// One bot client: configuration, connection, dispatcher and commands.
pub struct BronzeRuntime {
    config: BronzeConfig,
    connection: OneBotConnection,
    dispatcher: Arc<Dispatcher>,
    router: Arc<CommandRouter>,
    running: AtomicBool,
}

impl BronzeRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// A runtime connecting over WebSocket to `config.connection.url`.
    pub fn from_config(config: BronzeConfig) -> Self {
        let transport = ClientTransport::websocket(&config.connection.to_ws_config());
        Self::with_transport(config, transport)
    }

    /// A runtime over an already-built transport.
    pub fn with_transport(config: BronzeConfig, transport: ClientTransport) -> Self {
        let connection =
            OneBotConnection::new(transport, config.codec.clone(), config.calls.to_policy());
        let dispatcher = match config.dispatch.max_concurrency {
            Some(limit) => Dispatcher::with_concurrency(limit),
            None => Dispatcher::new(),
        };
        let router = CommandRouter::new().with_error_reply(config.commands.error_reply.clone());

        debug!(
            url = %config.connection.url,
            max_concurrency = dispatcher.max_concurrency(),
            "Runtime created"
        );

        Self {
            config,
            connection,
            dispatcher: Arc::new(dispatcher),
            router: Arc::new(router),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &BronzeConfig {
        &self.config
    }

    pub fn connection(&self) -> &OneBotConnection {
        &self.connection
    }

    pub fn bot(&self) -> Arc<OneBotBot> {
        self.connection.bot()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn router(&self) -> &Arc<CommandRouter> {
        &self.router
    }

    /// Registers an event handler.
    pub fn on(&self, event_type: EventType, handler: impl EventHandler) -> &Self {
        self.dispatcher.register(event_type, handler);
        self
    }

    /// Registers a command.
    pub fn command(&self, descriptor: CommandDescriptor, executor: impl CommandExecutor) -> &Self {
        self.router.register_command(descriptor, executor);
        self
    }

    /// Registers the help command under `triggers`.
    pub fn help_command<I, S>(&self, triggers: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.router.register_help(triggers);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Connects and starts dispatching. Commands are routed for every
    /// message event.
    pub async fn start(&self) -> RuntimeResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::AlreadyStarted);
        }

        self.router.attach(&self.dispatcher);
        if let Err(e) = self.connection.start(self.dispatcher.sink()).await {
            self.running.store(false, Ordering::SeqCst);
            return Err(RuntimeError::Connect(e));
        }

        info!(
            url = %self.config.connection.url,
            commands = self.router.commands().len(),
            handlers = self.dispatcher.handler_count(),
            "Runtime started"
        );
        Ok(())
    }

    /// Closes the connection and fails pending calls.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Runtime is not running");
            return;
        }
        self.connection.stop().await;
        info!("Runtime stopped");
    }

    /// Runs until Ctrl+C or SIGTERM, or until the connection is lost.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes, or until the connection is lost.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;

        let outcome = tokio::select! {
            _ = shutdown => Ok(()),
            lost = self.connection.lost() => {
                error!(error = %lost, "Giving up on the connection");
                Err(RuntimeError::ConnectionLost(lost))
            }
        };

        self.stop().await;
        outcome
    }
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            // Without a signal source only a lost connection ends the run.
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Loads and validates configuration, initialises logging and builds the
/// runtime.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    init_logging: bool,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new()
                .with_current_dir()
                .with_user_config_dir(),
            init_logging: true,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: BronzeConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Leaves the global subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    pub fn build(self) -> RuntimeResult<BronzeRuntime> {
        let config = self.config_loader.load()?;
        validate_config(&config)?;

        if self.init_logging && !logging::init_from_config(&config.logging) {
            debug!("A global subscriber is already installed");
        }

        Ok(BronzeRuntime::from_config(config))
    }
}
