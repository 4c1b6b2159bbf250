//! The instance manager.
//!
//! [`InstanceManager`] owns the set of running bots. It compiles a bot's
//! blocks, opens a session through the injected `Transport`, attaches the
//! dispatcher and records the [`RunningInstance`]; `stop` reverses this and
//! returns only once the bot's event loop has quiesced.
//!
//! # State machine
//!
//! ```text
//!            start ok               stop
//! Stopped ─────────────► Running ─────────► Stopped
//!    │                      │
//!    │ start failed         │ session ended by transport
//!    ▼                      ▼
//!  Error ◄──────────────── Error ───start──► Running | Error
//! ```
//!
//! # Locking
//!
//! - The registry of running instances is one `parking_lot::Mutex`, held only
//!   for map reads and writes and never across an `.await`.
//! - Every lifecycle call takes the bot's async control lock for its whole
//!   duration, so start, stop, restart, update and delete of one id never
//!   interleave. Different bots never wait on each other.
//! - Handler actions run on the bot's own session loop, outside both locks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use blockbot_core::{
    BotConfig, BotConfigPatch, BotStatus, BoxedRepository, BoxedTransport, RepositoryError,
};
use blockbot_framework::{BlockCompiler, Compilation, Dispatcher};

use crate::config::ManagerConfig;
use crate::error::{RuntimeError, RuntimeResult, StartFailure};
use crate::instance::{InstanceInfo, RunningInstance, SessionLoop, inbound_channel};

type ControlLock = Arc<tokio::sync::Mutex<()>>;

/// Runs, stops and restarts bots.
///
/// Cloning is cheap; clones share the same registry.
#[derive(Clone)]
pub struct InstanceManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    repository: BoxedRepository,
    transport: BoxedTransport,
    options: ManagerConfig,
    compiler: BlockCompiler,
    instances: Mutex<HashMap<String, RunningInstance>>,
    controls: Mutex<HashMap<String, ControlLock>>,
    generation: AtomicU64,
}

impl InstanceManager {
    /// Creates a manager over a configuration store and a transport.
    pub fn new(repository: BoxedRepository, transport: BoxedTransport, options: ManagerConfig) -> Self {
        info!(
            transport = transport.name(),
            close_timeout_ms = options.close_timeout_ms,
            connect_timeout_ms = options.connect_timeout_ms,
            "Instance manager created"
        );
        Self {
            inner: Arc::new(ManagerInner {
                repository,
                transport,
                options,
                compiler: BlockCompiler::new(),
                instances: Mutex::new(HashMap::new()),
                controls: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(1),
            }),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts a bot.
    ///
    /// Fails with [`BotNotFound`](RuntimeError::BotNotFound),
    /// [`AlreadyRunning`](RuntimeError::AlreadyRunning) or
    /// [`StartFailed`](RuntimeError::StartFailed). Of concurrent starts of the
    /// same id exactly one succeeds.
    pub async fn start(&self, id: &str) -> RuntimeResult<()> {
        let control = self.inner.control(id);
        let _guard = control.lock().await;
        self.inner.start_locked(id, None).await
    }

    /// Stops a bot. Stopping a bot that is not running succeeds and changes
    /// nothing.
    ///
    /// When this returns, no handler of the bot runs or will run. If the
    /// session does not quiesce within the close timeout it is torn down
    /// forcibly and [`SessionCloseTimeout`](RuntimeError::SessionCloseTimeout)
    /// is returned; the bot is stopped either way.
    pub async fn stop(&self, id: &str) -> RuntimeResult<()> {
        let control = self.inner.control(id);
        let _guard = control.lock().await;
        self.inner.stop_locked(id).await
    }

    /// Stops and starts a bot as one operation.
    ///
    /// `token`, when given, is used for the new session instead of the stored
    /// credential. Returns `Ok` only if the bot is running afterwards.
    pub async fn restart(&self, id: &str, token: Option<String>) -> RuntimeResult<()> {
        let control = self.inner.control(id);
        let _guard = control.lock().await;

        match self.inner.stop_locked(id).await {
            Ok(()) => {}
            Err(e @ RuntimeError::SessionCloseTimeout { .. }) => {
                warn!(bot_id = %id, error = %e, "Old session was torn down forcibly");
            }
            Err(e) => return Err(e),
        }
        self.inner.start_locked(id, token).await
    }

    /// Stops a bot if it is running, then removes its configuration.
    pub async fn delete(&self, id: &str) -> RuntimeResult<()> {
        let control = self.inner.control(id);
        {
            let _guard = control.lock().await;

            match self.inner.stop_locked(id).await {
                Ok(()) => {}
                Err(e @ RuntimeError::SessionCloseTimeout { .. }) => {
                    warn!(bot_id = %id, error = %e, "Deleting bot after forced close");
                }
                Err(e) => return Err(e),
            }
            if !self.inner.repository.remove(id).await? {
                return Err(RuntimeError::BotNotFound(id.to_string()));
            }
            info!(bot_id = %id, "Bot deleted");
        }
        self.inner.release_control(id, control);
        Ok(())
    }

    /// Stops every running bot. Returns the errors of bots that did not stop
    /// cleanly.
    pub async fn shutdown(&self) -> Vec<RuntimeError> {
        let ids = self.running_ids();
        info!(running = ids.len(), "Shutting down instance manager");

        let results = join_all(ids.iter().map(|id| self.stop(id))).await;
        let errors: Vec<RuntimeError> = results.into_iter().filter_map(Result::err).collect();

        for e in &errors {
            error!(bot_id = e.bot_id().unwrap_or("-"), error = %e, "Bot did not stop cleanly");
        }
        errors
    }

    /// Waits for Ctrl+C, then shuts down.
    pub async fn run_until_ctrl_c(&self) -> Vec<RuntimeError> {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
        }
        self.shutdown().await
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Stores a new configuration. Its status is reset to `stopped`.
    pub async fn register(&self, mut config: BotConfig) -> RuntimeResult<String> {
        config.status = BotStatus::Stopped;
        let id = config.id.clone();
        self.inner.repository.insert(config).await?;
        debug!(bot_id = %id, "Bot registered");
        Ok(id)
    }

    /// Applies a partial update. Rejected with
    /// [`BotRunning`](RuntimeError::BotRunning) while the bot runs.
    pub async fn update(&self, id: &str, patch: BotConfigPatch) -> RuntimeResult<BotConfig> {
        let control = self.inner.control(id);
        let _guard = control.lock().await;

        if self.is_running(id) {
            return Err(RuntimeError::BotRunning(id.to_string()));
        }
        self.inner
            .repository
            .update(id, patch)
            .await
            .map_err(not_found_as_bot)
    }

    /// Returns a stored configuration.
    pub async fn get(&self, id: &str) -> RuntimeResult<BotConfig> {
        self.inner.config(id).await
    }

    /// Returns every stored configuration.
    pub async fn list(&self) -> RuntimeResult<Vec<BotConfig>> {
        Ok(self.inner.repository.list().await?)
    }

    /// Returns the stored status of a bot.
    pub async fn status(&self, id: &str) -> RuntimeResult<BotStatus> {
        Ok(self.inner.config(id).await?.status)
    }

    /// Compiles a bot's blocks without starting it.
    pub async fn preview(&self, id: &str) -> RuntimeResult<Compilation> {
        let config = self.inner.config(id).await?;
        Ok(self.inner.compiler.compile(&config.blocks))
    }

    /// Returns `true` if a running instance exists for `id`.
    pub fn is_running(&self, id: &str) -> bool {
        self.inner.instances.lock().contains_key(id)
    }

    /// Ids of running bots, sorted.
    pub fn running_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.instances.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Describes the running instance of `id`, if any.
    pub fn instance_info(&self, id: &str) -> Option<InstanceInfo> {
        self.inner.instances.lock().get(id).map(RunningInstance::info)
    }
}

impl std::fmt::Debug for InstanceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceManager")
            .field("transport", &self.inner.transport.name())
            .field("running", &self.running_ids())
            .finish()
    }
}

// =============================================================================
// Internals
// =============================================================================

impl ManagerInner {
    fn control(&self, id: &str) -> ControlLock {
        Arc::clone(self.controls.lock().entry(id.to_string()).or_default())
    }

    /// Drops the control lock of a deleted bot unless someone else holds it.
    fn release_control(&self, id: &str, control: ControlLock) {
        let mut controls = self.controls.lock();
        // One reference in the map, one in `control`.
        if Arc::strong_count(&control) == 2 {
            controls.remove(id);
        }
    }

    async fn config(&self, id: &str) -> RuntimeResult<BotConfig> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| RuntimeError::BotNotFound(id.to_string()))
    }

    async fn start_locked(self: &Arc<Self>, id: &str, token: Option<String>) -> RuntimeResult<()> {
        let config = self.config(id).await?;
        if self.instances.lock().contains_key(id) {
            return Err(RuntimeError::AlreadyRunning(id.to_string()));
        }

        let Compilation { handlers, warnings } = self.compiler.compile(&config.blocks);
        let handlers = Arc::new(handlers);

        let token = token.unwrap_or(config.token);
        let connect_timeout = self.options.connect_timeout();
        let session = match timeout(connect_timeout, self.transport.open(&token)).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Err(self.fail_start(id, StartFailure::Connect(e)).await),
            Err(_) => return Err(self.fail_start(id, StartFailure::Timeout(connect_timeout)).await),
        };

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (handler, events) = inbound_channel(id, self.options.event_buffer);

        let task = SessionLoop {
            bot_id: id.to_string(),
            generation,
            dispatcher: Dispatcher::new(Arc::clone(&handlers)).with_bot_id(id),
            session: Arc::clone(&session),
            events,
            cancel: cancel.clone(),
        }
        .spawn(Self::on_session_ended(Arc::downgrade(self), id.to_string(), generation));
        session.on_inbound_event(handler);

        let instance = RunningInstance {
            config_id: id.to_string(),
            handler_set: Arc::clone(&handlers),
            session,
            started_at: Utc::now(),
            generation,
            cancel,
            task,
        };

        if let Err(e) = self.repository.set_status(id, BotStatus::Running).await {
            error!(bot_id = %id, error = %e, "Failed to record running status, closing session");
            if let Err(close) = self.teardown(instance).await {
                warn!(bot_id = %id, error = %close, "Session close after failed start timed out");
            }
            return Err(not_found_as_bot(e));
        }
        self.instances.lock().insert(id.to_string(), instance);

        info!(
            bot_id = %id,
            generation,
            handlers = handlers.len(),
            warnings = warnings.len(),
            fallback = handlers.is_fallback(),
            "Bot started"
        );
        Ok(())
    }

    async fn fail_start(&self, id: &str, reason: StartFailure) -> RuntimeError {
        warn!(bot_id = %id, reason = %reason, "Bot failed to start");
        if let Err(e) = self.repository.set_status(id, BotStatus::Error).await {
            error!(bot_id = %id, error = %e, "Failed to record error status");
        }
        RuntimeError::StartFailed {
            id: id.to_string(),
            reason,
        }
    }

    async fn stop_locked(&self, id: &str) -> RuntimeResult<()> {
        let taken = self.instances.lock().remove(id);
        let Some(instance) = taken else {
            // Not running: only the existence check remains.
            self.config(id).await?;
            debug!(bot_id = %id, "Stop requested for a bot that is not running");
            return Ok(());
        };

        let generation = instance.generation;
        let closed = self.teardown(instance).await;

        match self.repository.set_status(id, BotStatus::Stopped).await {
            Ok(()) | Err(RepositoryError::NotFound { .. }) => {}
            Err(e) => error!(bot_id = %id, error = %e, "Failed to record stopped status"),
        }
        info!(bot_id = %id, generation, "Bot stopped");
        closed
    }

    /// Cancels and joins the session loop, then closes the session. Each step
    /// is bounded by the close timeout; a step that overruns is forced.
    async fn teardown(&self, instance: RunningInstance) -> RuntimeResult<()> {
        let RunningInstance {
            config_id,
            session,
            cancel,
            mut task,
            ..
        } = instance;
        let close_timeout = self.options.close_timeout();
        let mut timed_out = false;

        cancel.cancel();
        if timeout(close_timeout, &mut task).await.is_err() {
            warn!(bot_id = %config_id, "Session loop did not quiesce in time, aborting it");
            task.abort();
            let _ = task.await;
            timed_out = true;
        }

        match timeout(close_timeout, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(bot_id = %config_id, error = %e, "Session close failed"),
            Err(_) => {
                warn!(bot_id = %config_id, "Session close timed out");
                timed_out = true;
            }
        }

        if timed_out {
            Err(RuntimeError::SessionCloseTimeout {
                id: config_id,
                timeout: close_timeout,
            })
        } else {
            Ok(())
        }
    }

    /// Builds the callback a session loop runs when its session ends on its
    /// own.
    fn on_session_ended(
        manager: Weak<Self>,
        id: String,
        generation: u64,
    ) -> impl FnOnce() + Send + 'static {
        move || {
            // The loop task must not wait on the control lock: `stop` holds it
            // while joining that very task.
            tokio::spawn(async move {
                if let Some(manager) = manager.upgrade() {
                    manager.reap(&id, generation).await;
                }
            });
        }
    }

    /// Removes an instance whose session ended on its own, unless a lifecycle
    /// call already replaced or removed it.
    async fn reap(&self, id: &str, generation: u64) {
        let control = self.control(id);
        let _guard = control.lock().await;

        let instance = {
            let mut instances = self.instances.lock();
            match instances.get(id) {
                Some(current) if current.generation == generation => instances.remove(id),
                _ => None,
            }
        };
        let Some(instance) = instance else {
            debug!(bot_id = %id, generation, "Ended session already cleaned up");
            return;
        };

        if let Err(e) = self.teardown(instance).await {
            warn!(bot_id = %id, error = %e, "Ended session did not close cleanly");
        }
        if let Err(e) = self.repository.set_status(id, BotStatus::Error).await {
            error!(bot_id = %id, error = %e, "Failed to record error status");
        }
        warn!(bot_id = %id, generation, "Session ended unexpectedly, bot marked as error");
    }
}

fn not_found_as_bot(e: RepositoryError) -> RuntimeError {
    match e {
        RepositoryError::NotFound { id } => RuntimeError::BotNotFound(id),
        other => RuntimeError::Repository(other),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use blockbot_core::{Block, BlockKind, InMemoryBotRepository, InboundEvent};
    use blockbot_framework::NOT_CONFIGURED_TEXT;
    use blockbot_transport::{MemoryTransport, Outbound};

    use super::*;

    fn greeter(id: &str, token: &str) -> BotConfig {
        let blocks = vec![
            Block::new("b1", BlockKind::Start).with("message", "Hi there"),
            Block::new("b2", BlockKind::Message)
                .with("trigger", "ping")
                .with("response", "pong"),
        ];
        BotConfig::with_id(id, id, token, blocks)
    }

    fn options(close_timeout_ms: u64, connect_timeout_ms: u64) -> ManagerConfig {
        ManagerConfig {
            close_timeout_ms,
            connect_timeout_ms,
            ..Default::default()
        }
    }

    fn setup(bots: Vec<BotConfig>, options: ManagerConfig) -> (InstanceManager, MemoryTransport) {
        let transport = MemoryTransport::new();
        let repository = Arc::new(InMemoryBotRepository::with_bots(bots));
        let manager = InstanceManager::new(repository, Arc::new(transport.clone()), options);
        (manager, transport)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    async fn wait_for_status(manager: &InstanceManager, id: &str, expected: BotStatus) {
        for _ in 0..200 {
            if manager.status(id).await.unwrap() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("bot {id} never reached {expected:?}");
    }

    #[tokio::test]
    async fn test_start_dispatches_events() {
        let (manager, transport) = setup(vec![greeter("g", "tok")], ManagerConfig::default());

        manager.start("g").await.unwrap();
        assert!(manager.is_running("g"));
        assert_eq!(manager.status("g").await.unwrap(), BotStatus::Running);
        assert_eq!(manager.instance_info("g").unwrap().handlers.len(), 2);

        assert!(transport.inject("tok", InboundEvent::text(7, "/start")));
        assert!(transport.inject("tok", InboundEvent::text(7, "ping?")));
        wait_until(|| transport.sent("tok").len() == 2).await;

        assert_eq!(
            transport.sent("tok"),
            vec![Outbound::message(7, "Hi there"), Outbound::message(7, "pong")]
        );
    }

    #[tokio::test]
    async fn test_empty_blocks_run_fallback() {
        let bot = BotConfig::with_id("empty", "empty", "tok", Vec::new());
        let (manager, transport) = setup(vec![bot], ManagerConfig::default());

        manager.start("empty").await.unwrap();
        transport.inject("tok", InboundEvent::text(1, "anything"));
        wait_until(|| !transport.sent("tok").is_empty()).await;

        assert_eq!(
            transport.sent("tok"),
            vec![Outbound::message(1, NOT_CONFIGURED_TEXT)]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_start_single_winner() {
        let (manager, transport) = setup(vec![greeter("g", "tok")], ManagerConfig::default());
        transport.set_open_delay(Duration::from_millis(20));

        let (a, b) = tokio::join!(manager.start("g"), manager.start("g"));
        let errors: Vec<RuntimeError> = [a, b].into_iter().filter_map(Result::err).collect();

        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], RuntimeError::AlreadyRunning(id) if id == "g"));
        assert_eq!(transport.opened(), 1);
        assert_eq!(manager.running_ids(), ["g"]);
    }

    #[tokio::test]
    async fn test_unknown_bot() {
        let (manager, _transport) = setup(Vec::new(), ManagerConfig::default());

        assert!(matches!(
            manager.start("nope").await,
            Err(RuntimeError::BotNotFound(_))
        ));
        assert!(matches!(
            manager.stop("nope").await,
            Err(RuntimeError::BotNotFound(_))
        ));
        assert!(matches!(
            manager.delete("nope").await,
            Err(RuntimeError::BotNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (manager, transport) = setup(vec![greeter("g", "tok")], ManagerConfig::default());

        manager.stop("g").await.unwrap();
        manager.start("g").await.unwrap();
        manager.stop("g").await.unwrap();
        manager.stop("g").await.unwrap();

        assert!(!manager.is_running("g"));
        assert_eq!(manager.status("g").await.unwrap(), BotStatus::Stopped);
        assert_eq!(transport.closed(), 1);
    }

    #[tokio::test]
    async fn test_no_dispatch_after_stop() {
        let (manager, transport) = setup(vec![greeter("g", "tok")], ManagerConfig::default());

        manager.start("g").await.unwrap();
        manager.stop("g").await.unwrap();

        assert!(!transport.inject("tok", InboundEvent::text(1, "/start")));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(transport.sent("tok").is_empty());
    }

    #[tokio::test]
    async fn test_stop_drops_queued_events_and_waits_for_in_flight() {
        let (manager, transport) = setup(vec![greeter("g", "tok")], ManagerConfig::default());
        manager.start("g").await.unwrap();
        transport.set_send_delay(Duration::from_millis(100));

        for chat in 1..=4 {
            assert!(transport.inject("tok", InboundEvent::text(chat, "/start")));
        }
        wait_until(|| transport.sends_started() == 1).await;

        manager.stop("g").await.unwrap();
        let sent_at_stop = transport.sent("tok");
        assert_eq!(sent_at_stop, vec![Outbound::message(1, "Hi there")]);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(transport.sent("tok"), sent_at_stop);
        assert_eq!(transport.sends_started(), 1);
    }

    #[tokio::test]
    async fn test_stop_aborts_dispatch_outlasting_close_timeout() {
        let (manager, transport) = setup(vec![greeter("g", "tok")], options(20, 5000));
        manager.start("g").await.unwrap();
        transport.set_send_delay(Duration::from_millis(300));

        assert!(transport.inject("tok", InboundEvent::text(1, "/start")));
        assert!(transport.inject("tok", InboundEvent::text(2, "/start")));
        wait_until(|| transport.sends_started() == 1).await;

        let err = manager.stop("g").await.unwrap_err();
        assert!(matches!(err, RuntimeError::SessionCloseTimeout { ref id, .. } if id == "g"));
        assert!(transport.sent("tok").is_empty());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(transport.sent("tok").is_empty());
        assert_eq!(transport.sends_started(), 1);
    }

    #[tokio::test]
    async fn test_rejected_token_marks_error() {
        let (manager, transport) = setup(vec![greeter("g", "bad")], ManagerConfig::default());
        transport.reject_token("bad");

        let err = manager.start("g").await.unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::StartFailed {
                reason: StartFailure::Connect(_),
                ..
            }
        ));
        assert!(!manager.is_running("g"));
        assert_eq!(manager.status("g").await.unwrap(), BotStatus::Error);

        // Error is not terminal.
        transport.accept_token("bad");
        manager.start("g").await.unwrap();
        assert_eq!(manager.status("g").await.unwrap(), BotStatus::Running);
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let (manager, transport) = setup(vec![greeter("g", "tok")], options(5000, 20));
        transport.set_open_delay(Duration::from_millis(200));

        let err = manager.start("g").await.unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::StartFailed {
                reason: StartFailure::Timeout(_),
                ..
            }
        ));
        assert_eq!(manager.status("g").await.unwrap(), BotStatus::Error);
    }

    #[tokio::test]
    async fn test_restart_with_new_token() {
        let (manager, transport) = setup(vec![greeter("g", "old")], ManagerConfig::default());

        manager.start("g").await.unwrap();
        let first = manager.instance_info("g").unwrap().generation;
        manager.restart("g", Some("new".to_string())).await.unwrap();

        assert!(manager.instance_info("g").unwrap().generation > first);
        assert!(!transport.is_open("old"));
        assert!(transport.inject("new", InboundEvent::text(3, "/start")));
        wait_until(|| !transport.sent("new").is_empty()).await;
        assert_eq!(transport.sent("new"), vec![Outbound::message(3, "Hi there")]);
    }

    #[tokio::test]
    async fn test_failed_restart_leaves_error() {
        let (manager, transport) = setup(vec![greeter("g", "tok")], ManagerConfig::default());
        transport.reject_token("revoked");

        manager.start("g").await.unwrap();
        let err = manager
            .restart("g", Some("revoked".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, RuntimeError::StartFailed { .. }));
        assert!(!manager.is_running("g"));
        assert!(!transport.is_open("tok"));
        assert_eq!(manager.status("g").await.unwrap(), BotStatus::Error);
    }

    #[tokio::test]
    async fn test_close_timeout_still_stops() {
        let (manager, transport) = setup(vec![greeter("g", "tok")], options(20, 5000));

        manager.start("g").await.unwrap();
        transport.set_close_delay(Duration::from_millis(300));

        let err = manager.stop("g").await.unwrap_err();
        assert!(matches!(err, RuntimeError::SessionCloseTimeout { ref id, .. } if id == "g"));
        assert!(!manager.is_running("g"));
        assert_eq!(manager.status("g").await.unwrap(), BotStatus::Stopped);

        transport.set_close_delay(Duration::ZERO);
        manager.start("g").await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_proceeds_after_close_timeout() {
        let (manager, transport) = setup(vec![greeter("g", "tok")], options(20, 5000));

        manager.start("g").await.unwrap();
        transport.set_close_delay(Duration::from_millis(300));

        manager.restart("g", None).await.unwrap();
        assert!(manager.is_running("g"));
        assert_eq!(transport.opened(), 2);
    }

    #[tokio::test]
    async fn test_ended_session_is_reaped() {
        let (manager, transport) = setup(vec![greeter("g", "tok")], ManagerConfig::default());

        manager.start("g").await.unwrap();
        assert!(transport.end_session("tok"));

        wait_for_status(&manager, "g", BotStatus::Error).await;
        assert!(!manager.is_running("g"));

        manager.start("g").await.unwrap();
        assert!(manager.is_running("g"));
    }

    #[tokio::test]
    async fn test_update_rejected_while_running() {
        let (manager, _transport) = setup(vec![greeter("g", "tok")], ManagerConfig::default());
        let patch = BotConfigPatch {
            name: Some("renamed".to_string()),
            ..Default::default()
        };

        manager.start("g").await.unwrap();
        assert!(matches!(
            manager.update("g", patch.clone()).await,
            Err(RuntimeError::BotRunning(_))
        ));

        manager.stop("g").await.unwrap();
        let updated = manager.update("g", patch).await.unwrap();
        assert_eq!(updated.name, "renamed");
    }

    #[tokio::test]
    async fn test_delete_stops_first() {
        let (manager, transport) = setup(vec![greeter("g", "tok")], ManagerConfig::default());

        manager.start("g").await.unwrap();
        manager.delete("g").await.unwrap();

        assert!(!manager.is_running("g"));
        assert!(!transport.is_open("tok"));
        assert!(matches!(
            manager.get("g").await,
            Err(RuntimeError::BotNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_register_resets_status() {
        let (manager, _transport) = setup(Vec::new(), ManagerConfig::default());
        let mut config = greeter("g", "tok");
        config.status = BotStatus::Running;

        let id = manager.register(config).await.unwrap();
        assert_eq!(manager.status(&id).await.unwrap(), BotStatus::Stopped);
        assert!(manager.register(greeter("g", "tok")).await.is_err());
    }

    #[tokio::test]
    async fn test_preview_reports_warnings() {
        let blocks = vec![
            Block::new("c", BlockKind::Command).with("command", "two words"),
            Block::new("x", BlockKind::Unknown("video".to_string())),
        ];
        let bot = BotConfig::with_id("p", "p", "tok", blocks);
        let (manager, _transport) = setup(vec![bot], ManagerConfig::default());

        let compilation = manager.preview("p").await.unwrap();
        assert!(compilation.handlers.is_fallback());
        assert_eq!(compilation.warnings.len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_stops_everything() {
        let bots = vec![greeter("a", "ta"), greeter("b", "tb")];
        let (manager, transport) = setup(bots, ManagerConfig::default());

        manager.start("a").await.unwrap();
        manager.start("b").await.unwrap();
        assert!(manager.shutdown().await.is_empty());

        assert!(manager.running_ids().is_empty());
        assert_eq!(transport.closed(), 2);
    }
}
