//! Lifecycle Orchestrator
//!
//! Brings the bootstrap scene and the declared services up in order, tells
//! observers when everything is ready, and tears the services down in
//! reverse order.

use super::observer::Notification;
use super::{
    HostControl, LifecycleError, LifecycleEvent, LifecycleObserver, LifecycleState, Result,
    Service, ShutdownHandler, TerminationReason, host_for,
};
use crate::config::CoreConfig;
use crate::error::SingletonError;
use crate::scene::{ContentRef, SceneBackend, SceneCache};
use crate::singleton::{Adoption, Singleton, SingletonRegistry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

type Resolver = Box<dyn Fn(&SingletonRegistry) -> std::result::Result<Arc<dyn Service>, SingletonError> + Send + Sync>;

#[derive(Debug, Clone, Copy, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
enum Hook {
    Initialize,
    Shutdown,
}

/// How a declared service is obtained at startup
enum ServiceSource {
    /// Resolved through the registry when its turn comes
    Singleton { name: &'static str, resolve: Resolver },
    Instance(Arc<dyn Service>),
}

impl ServiceSource {
    fn resolve(&self, registry: &SingletonRegistry) -> Result<Arc<dyn Service>> {
        match self {
            Self::Singleton { name, resolve } => resolve(registry).map_err(|e| {
                tracing::error!("Failed to resolve service {}: {}", name, e);
                LifecycleError::from(e)
            }),
            Self::Instance(service) => Ok(Arc::clone(service)),
        }
    }
}

/// Outcome of a completed shutdown
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Services that shut down cleanly, in shutdown order
    pub stopped: Vec<String>,
    /// Services whose shutdown failed or timed out; the walk went on
    pub failures: Vec<(String, LifecycleError)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Builder for [`Orchestrator`]
///
/// The configuration and scene cache given here are adopted into the
/// registry, so singleton services resolving them get the same instances.
pub struct OrchestratorBuilder<B: SceneBackend<Key = ContentRef> + Default> {
    registry: SingletonRegistry,
    config: Option<CoreConfig>,
    scenes: Option<Arc<SceneCache<B>>>,
    services: Vec<ServiceSource>,
    observers: Vec<Arc<dyn LifecycleObserver>>,
    host: Option<Arc<dyn HostControl>>,
}

impl<B: SceneBackend<Key = ContentRef> + Default> OrchestratorBuilder<B> {
    fn new(registry: SingletonRegistry) -> Self {
        Self {
            registry,
            config: None,
            scenes: None,
            services: Vec::new(),
            observers: Vec::new(),
            host: None,
        }
    }

    pub fn config(mut self, config: CoreConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn scenes(mut self, scenes: Arc<SceneCache<B>>) -> Self {
        self.scenes = Some(scenes);
        self
    }

    /// Declare a singleton-backed service, resolved at its turn in startup
    pub fn service<T: Singleton + Service>(mut self) -> Self {
        self.services.push(ServiceSource::Singleton {
            name: std::any::type_name::<T>(),
            resolve: Box::new(|registry: &SingletonRegistry| {
                let service: Arc<dyn Service> = registry.instance::<T>()?;
                Ok(service)
            }),
        });
        self
    }

    /// Declare an already built service
    pub fn with_service(mut self, service: Arc<dyn Service>) -> Self {
        self.services.push(ServiceSource::Instance(service));
        self
    }

    pub fn observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Override the host control chosen from `CoreConfig::host_policy`
    pub fn host(mut self, host: Arc<dyn HostControl>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn build(self) -> Result<Orchestrator<B>> {
        let config = match self.config {
            Some(config) => adopt_into(&self.registry, Arc::new(config))?,
            None => self.registry.instance::<CoreConfig>()?,
        };

        let scenes = match self.scenes {
            Some(scenes) => adopt_into(&self.registry, scenes)?,
            None => self.registry.instance::<SceneCache<B>>()?,
        };

        let host = self.host.unwrap_or_else(|| host_for(config.host_policy));
        let (state, _) = watch::channel(LifecycleState::Uninitialized);
        let (events, _) = broadcast::channel(64);

        Ok(Orchestrator {
            registry: self.registry,
            config,
            scenes,
            declared: self.services,
            observers: self.observers,
            host,
            live: Mutex::new(Vec::new()),
            state,
            initialized: AtomicBool::new(false),
            shutdown_claimed: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            events,
            notifications: Mutex::new(Vec::new()),
        })
    }
}

/// Register `instance` unless a different one is already live
fn adopt_into<T: Singleton>(registry: &SingletonRegistry, instance: Arc<T>) -> Result<Arc<T>> {
    match registry.adopt(instance)? {
        Adoption::Rejected { .. } => Err(LifecycleError::init_failed(format!(
            "A different {} is already registered",
            std::any::type_name::<T>()
        ))),
        adoption => Ok(adoption.into_instance()),
    }
}

/// Ordered startup and reverse-order shutdown of a set of services
///
/// # Example
///
/// ```rust,ignore
/// use forgecore::lifecycle::Orchestrator;
/// use forgecore::scene::MemorySceneBackend;
/// use forgecore::session::Session;
///
/// let orchestrator = Orchestrator::<MemorySceneBackend>::builder(registry)
///     .scenes(scenes)
///     .service::<Session<MemorySceneBackend>>()
///     .observer(Arc::new(FadeIn))
///     .build()?;
///
/// orchestrator.start().await?;
/// // ... application runs ...
/// orchestrator.shutdown().await?;
/// ```
pub struct Orchestrator<B: SceneBackend<Key = ContentRef> + Default> {
    registry: SingletonRegistry,
    config: Arc<CoreConfig>,
    scenes: Arc<SceneCache<B>>,
    declared: Vec<ServiceSource>,
    observers: Vec<Arc<dyn LifecycleObserver>>,
    host: Arc<dyn HostControl>,
    live: Mutex<Vec<Arc<dyn Service>>>,
    state: watch::Sender<LifecycleState>,
    initialized: AtomicBool,
    shutdown_claimed: AtomicBool,
    terminated: AtomicBool,
    events: broadcast::Sender<LifecycleEvent>,
    notifications: Mutex<Vec<JoinHandle<()>>>,
}

impl<B: SceneBackend<Key = ContentRef> + Default> Orchestrator<B> {
    pub fn builder(registry: SingletonRegistry) -> OrchestratorBuilder<B> {
        OrchestratorBuilder::new(registry)
    }

    /// Run startup; allowed once, from `Uninitialized`
    ///
    /// A failure anywhere is fatal: services already initialized are shut
    /// down in reverse order, the host is terminated and the error returned.
    pub async fn start(&self) -> Result<()> {
        let mut claimed = false;
        self.state.send_if_modified(|state| {
            if *state == LifecycleState::Uninitialized {
                *state = LifecycleState::Initializing;
                claimed = true;
            }
            claimed
        });
        if !claimed {
            return Err(LifecycleError::invalid_state("start", self.state()));
        }
        self.emit(LifecycleEvent::StateChanged {
            from: LifecycleState::Uninitialized,
            to: LifecycleState::Initializing,
        });

        tracing::info!("Starting lifecycle...");
        if let Err(err) = self.run_startup().await {
            tracing::error!("Startup failed: {}", err);
            self.rollback().await;
            self.transition(LifecycleState::Shutdown);
            self.terminate(TerminationReason::StartupFailed);
            return Err(err);
        }

        self.transition(LifecycleState::Ready);
        self.initialized.store(true, Ordering::Release);
        self.emit(LifecycleEvent::Ready);
        self.notify(Notification::Ready);
        tracing::info!(
            "Lifecycle ready ({} services initialized)",
            self.lock_live().len()
        );
        Ok(())
    }

    async fn run_startup(&self) -> Result<()> {
        let bootstrap = &self.config.bootstrap_scene;
        tracing::info!(scene = %bootstrap, "Loading bootstrap scene");
        self.scenes
            .load(bootstrap, true)
            .await
            .map_err(LifecycleError::Bootstrap)?;

        for source in &self.declared {
            let service = source.resolve(&self.registry)?;
            let name = service.name().to_string();

            tracing::debug!("Initializing: {}", name);
            self.bounded(Hook::Initialize, &service)
                .await
                .inspect_err(|e| tracing::error!("Initialization failed for {}: {}", name, e))?;
            self.lock_live().push(service);
            tracing::debug!("Initialized: {}", name);
            self.emit(LifecycleEvent::ServiceInitialized { name });
        }

        let settle = self.config.settle_delay();
        if !settle.is_zero() {
            tracing::debug!(?settle, "Waiting for services to settle");
            tokio::time::sleep(settle).await;
        }
        Ok(())
    }

    /// Best-effort reverse shutdown of whatever startup managed to bring up
    async fn rollback(&self) {
        let started = std::mem::take(&mut *self.lock_live());
        if started.is_empty() {
            return;
        }

        tracing::warn!("Rolling back {} initialized services", started.len());
        for service in started.iter().rev() {
            let name = service.name().to_string();
            if let Err(e) = self.bounded(Hook::Shutdown, service).await {
                tracing::error!("Rollback failed for {}: {}", name, e);
            }
        }
    }

    /// Shut every live service down in reverse initialization order
    ///
    /// Runs once. A request made while startup is still running waits for
    /// it to settle; any other request outside `Ready` is rejected.
    pub async fn shutdown(&self) -> Result<ShutdownReport> {
        let mut state = self.state.subscribe();
        let settled = match state
            .wait_for(|state| *state != LifecycleState::Initializing)
            .await
        {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        if settled != LifecycleState::Ready {
            return Err(LifecycleError::invalid_state("shut down", settled));
        }
        if self
            .shutdown_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let current = match self.state() {
                LifecycleState::Shutdown => LifecycleState::Shutdown,
                _ => LifecycleState::ShuttingDown,
            };
            return Err(LifecycleError::invalid_state("shut down", current));
        }

        tracing::info!("Shutting down lifecycle...");
        self.emit(LifecycleEvent::ShuttingDown);
        self.notify(Notification::ShuttingDown);
        self.initialized.store(false, Ordering::Release);
        self.transition(LifecycleState::ShuttingDown);

        let services: Vec<_> = self.lock_live().clone();
        let mut report = ShutdownReport::default();
        for service in services.iter().rev() {
            let name = service.name().to_string();
            tracing::debug!("Shutting down: {}", name);
            match self.bounded(Hook::Shutdown, service).await {
                Ok(()) => {
                    tracing::debug!("Shutdown complete: {}", name);
                    self.emit(LifecycleEvent::ServiceStopped { name: name.clone() });
                    report.stopped.push(name);
                }
                Err(e) => {
                    // Log error but continue with other services
                    tracing::error!("Shutdown failed for {}: {}", name, e);
                    report.failures.push((name, e));
                }
            }
        }
        self.lock_live().clear();

        self.transition(LifecycleState::Shutdown);
        tracing::info!(
            "Lifecycle shutdown complete ({} stopped, {} failed)",
            report.stopped.len(),
            report.failures.len()
        );
        self.terminate(TerminationReason::Shutdown);
        Ok(report)
    }

    /// Run a service hook on its own task, bounded by the per-service timeout
    ///
    /// A hook that panics is reported as a failure of that service.
    async fn bounded(&self, hook: Hook, service: &Arc<dyn Service>) -> Result<()> {
        let name = service.name().to_string();
        let target = Arc::clone(service);
        let mut task = tokio::spawn(async move {
            match hook {
                Hook::Initialize => target.initialize().await,
                Hook::Shutdown => target.shutdown().await,
            }
        });

        let joined = match self.config.service_timeout() {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    return Err(LifecycleError::timeout(
                        format!("{} of {}", hook, name),
                        format!("Timeout after {:?}", limit),
                    ));
                }
            },
            None => task.await,
        };

        match joined {
            Ok(outcome) => outcome.map_err(|e| LifecycleError::hook_failed(&name, e.to_string())),
            Err(e) if e.is_panic() => {
                tracing::error!("Service {} panicked during {}", name, hook);
                Err(LifecycleError::hook_failed(name, "panicked"))
            }
            Err(_) => Err(LifecycleError::hook_failed(name, "cancelled")),
        }
    }

    fn notify(&self, notification: Notification) {
        let mut handles = Vec::with_capacity(self.observers.len());
        for observer in &self.observers {
            let observer = Arc::clone(observer);
            handles.push(tokio::spawn(async move {
                let name = observer.name().to_string();
                let task = tokio::spawn(async move {
                    match notification {
                        Notification::Ready => observer.on_ready().await,
                        Notification::ShuttingDown => observer.on_shutting_down().await,
                    }
                });
                match task.await {
                    Ok(Ok(())) => tracing::trace!("Observer {} handled {:?}", name, notification),
                    Ok(Err(e)) => {
                        tracing::warn!("Observer {} failed on {:?}: {:#}", name, notification, e)
                    }
                    Err(e) if e.is_panic() => {
                        tracing::error!("Observer {} panicked on {:?}", name, notification)
                    }
                    Err(_) => tracing::warn!("Observer {} was cancelled", name),
                }
            }));
        }
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(handles);
    }

    /// Wait until every observer notification sent so far has finished
    pub async fn flush_observers(&self) {
        let pending = std::mem::take(
            &mut *self
                .notifications
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in pending {
            let _ = handle.await;
        }
    }

    fn transition(&self, to: LifecycleState) {
        let from = self.state.send_replace(to);
        tracing::info!(%from, %to, "Lifecycle state changed");
        self.emit(LifecycleEvent::StateChanged { from, to });
    }

    fn terminate(&self, reason: TerminationReason) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        self.emit(LifecycleEvent::Terminated(reason));
        self.host.terminate(reason);
    }

    fn emit(&self, event: LifecycleEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    fn lock_live(&self) -> MutexGuard<'_, Vec<Arc<dyn Service>>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True only while the orchestrator is `Ready`
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Wait until no startup or shutdown is in progress
    pub async fn wait_until_settled(&self) -> LifecycleState {
        let mut state = self.state.subscribe();
        match state.wait_for(|state| state.is_settled()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    /// Names of the live services, in initialization order
    pub fn live_services(&self) -> Vec<String> {
        self.lock_live()
            .iter()
            .map(|service| service.name().to_string())
            .collect()
    }

    pub fn scenes(&self) -> &Arc<SceneCache<B>> {
        &self.scenes
    }

    pub fn registry(&self) -> &SingletonRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Handler that runs [`shutdown`](Self::shutdown) on Ctrl+C or SIGTERM
    pub fn shutdown_handler(self: &Arc<Self>) -> ShutdownHandler<B> {
        ShutdownHandler::new(Arc::clone(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::StopSignal;
    use crate::scene::{MemorySceneBackend, SceneError};
    use std::time::Duration;
    use tokio::sync::RwLock;

    type Journal = Arc<RwLock<Vec<String>>>;

    struct Recorded {
        id: &'static str,
        journal: Journal,
        fail_init: bool,
        fail_shutdown: bool,
        panic_init: bool,
        panic_shutdown: bool,
        init_delay: Duration,
    }

    impl Recorded {
        fn new(id: &'static str, journal: &Journal) -> Self {
            Self {
                id,
                journal: Arc::clone(journal),
                fail_init: false,
                fail_shutdown: false,
                panic_init: false,
                panic_shutdown: false,
                init_delay: Duration::ZERO,
            }
        }
    }

    #[async_trait::async_trait]
    impl Service for Recorded {
        fn name(&self) -> &str {
            self.id
        }

        async fn initialize(&self) -> Result<()> {
            if !self.init_delay.is_zero() {
                tokio::time::sleep(self.init_delay).await;
            }
            self.journal.write().await.push(format!("init {}", self.id));
            if self.panic_init {
                panic!("{} driver crashed", self.id);
            }
            if self.fail_init {
                return Err(LifecycleError::init_failed("device missing"));
            }
            Ok(())
        }

        async fn shutdown(&self) -> Result<()> {
            self.journal.write().await.push(format!("shutdown {}", self.id));
            if self.panic_shutdown {
                panic!("{} driver crashed", self.id);
            }
            if self.fail_shutdown {
                return Err(LifecycleError::shutdown_failed("handle already closed"));
            }
            Ok(())
        }
    }

    fn fast_config() -> CoreConfig {
        CoreConfig {
            settle_delay_ms: 0,
            ..CoreConfig::default()
        }
    }

    fn orchestrator(
        config: CoreConfig,
        services: Vec<Recorded>,
    ) -> (Orchestrator<MemorySceneBackend>, StopSignal) {
        let stop = StopSignal::new();
        let scenes = Arc::new(SceneCache::new(Arc::new(MemorySceneBackend::new())));
        let mut builder = Orchestrator::builder(SingletonRegistry::new())
            .config(config)
            .scenes(scenes)
            .host(Arc::new(stop.clone()));
        for service in services {
            builder = builder.with_service(Arc::new(service));
        }
        (builder.build().unwrap(), stop)
    }

    #[tokio::test]
    async fn test_startup_and_shutdown_order() {
        let journal = Journal::default();
        let (orchestrator, stop) = orchestrator(
            fast_config(),
            vec![
                Recorded::new("A", &journal),
                Recorded::new("B", &journal),
                Recorded::new("C", &journal),
            ],
        );

        orchestrator.start().await.unwrap();
        assert_eq!(orchestrator.live_services(), vec!["A", "B", "C"]);
        assert!(orchestrator.scenes().is_loaded(&ContentRef::from("SC_MainMenu")));

        let report = orchestrator.shutdown().await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.stopped, vec!["C", "B", "A"]);
        assert!(orchestrator.live_services().is_empty());

        assert_eq!(
            *journal.read().await,
            vec!["init A", "init B", "init C", "shutdown C", "shutdown B", "shutdown A"]
        );
        assert_eq!(stop.reason(), Some(TerminationReason::Shutdown));
    }

    #[tokio::test]
    async fn test_failed_init_stops_startup_and_rolls_back() {
        let journal = Journal::default();
        let mut failing = Recorded::new("B", &journal);
        failing.fail_init = true;
        let (orchestrator, stop) = orchestrator(
            fast_config(),
            vec![
                Recorded::new("A", &journal),
                failing,
                Recorded::new("C", &journal),
            ],
        );

        let err = orchestrator.start().await.unwrap_err();

        assert!(matches!(err, LifecycleError::HookFailed { ref service, .. } if service == "B"));
        assert_eq!(*journal.read().await, vec!["init A", "init B", "shutdown A"]);
        assert_eq!(orchestrator.state(), LifecycleState::Shutdown);
        assert!(!orchestrator.is_initialized());
        assert_eq!(stop.reason(), Some(TerminationReason::StartupFailed));
    }

    #[tokio::test]
    async fn test_bootstrap_failure_is_fatal() {
        let journal = Journal::default();
        let (orchestrator, stop) = orchestrator(fast_config(), vec![Recorded::new("A", &journal)]);
        orchestrator
            .scenes()
            .backend()
            .refuse(&ContentRef::from("SC_MainMenu"));

        let err = orchestrator.start().await.unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::Bootstrap(SceneError::NotStarted { .. })
        ));
        assert!(journal.read().await.is_empty());
        assert_eq!(stop.reason(), Some(TerminationReason::StartupFailed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialized_only_after_settle_delay() {
        let (orchestrator, _stop) = orchestrator(CoreConfig::default(), Vec::new());
        let orchestrator = Arc::new(orchestrator);

        let starting = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.start().await })
        };
        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(orchestrator.state(), LifecycleState::Initializing);
        assert!(!orchestrator.is_initialized());

        starting.await.unwrap().unwrap();
        assert!(orchestrator.is_initialized());
        assert_eq!(orchestrator.state(), LifecycleState::Ready);

        orchestrator.shutdown().await.unwrap();
        assert!(!orchestrator.is_initialized());
    }

    #[tokio::test]
    async fn test_duplicate_start_and_shutdown_are_rejected() {
        let (orchestrator, _stop) = orchestrator(fast_config(), Vec::new());

        assert!(matches!(
            orchestrator.shutdown().await,
            Err(LifecycleError::InvalidState {
                state: LifecycleState::Uninitialized,
                ..
            })
        ));

        orchestrator.start().await.unwrap();
        assert!(matches!(
            orchestrator.start().await,
            Err(LifecycleError::InvalidState { .. })
        ));

        orchestrator.shutdown().await.unwrap();
        assert!(matches!(
            orchestrator.shutdown().await,
            Err(LifecycleError::InvalidState {
                state: LifecycleState::Shutdown,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_shutdowns_run_once() {
        let journal = Journal::default();
        let (orchestrator, _stop) = orchestrator(fast_config(), vec![Recorded::new("A", &journal)]);
        orchestrator.start().await.unwrap();

        let (first, second) = tokio::join!(orchestrator.shutdown(), orchestrator.shutdown());

        assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
        assert_eq!(*journal.read().await, vec!["init A", "shutdown A"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_startup_is_queued() {
        let journal = Journal::default();
        let mut slow = Recorded::new("A", &journal);
        slow.init_delay = Duration::from_millis(200);
        let (orchestrator, _stop) = orchestrator(fast_config(), vec![slow]);
        let orchestrator = Arc::new(orchestrator);

        let starting = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.start().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(orchestrator.state(), LifecycleState::Initializing);

        let report = orchestrator.shutdown().await.unwrap();

        assert!(starting.await.unwrap().is_ok());
        assert_eq!(report.stopped, vec!["A"]);
        assert_eq!(*journal.read().await, vec!["init A", "shutdown A"]);
        assert_eq!(orchestrator.state(), LifecycleState::Shutdown);
    }

    #[tokio::test]
    async fn test_shutdown_failures_do_not_stop_the_walk() {
        let journal = Journal::default();
        let mut flaky = Recorded::new("B", &journal);
        flaky.fail_shutdown = true;
        let (orchestrator, stop) = orchestrator(
            fast_config(),
            vec![Recorded::new("A", &journal), flaky, Recorded::new("C", &journal)],
        );
        orchestrator.start().await.unwrap();

        let report = orchestrator.shutdown().await.unwrap();

        assert_eq!(report.stopped, vec!["C", "A"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "B");
        assert_eq!(stop.reason(), Some(TerminationReason::Shutdown));
    }

    #[tokio::test]
    async fn test_panicking_shutdown_is_reported_and_walk_continues() {
        let journal = Journal::default();
        let mut crashing = Recorded::new("B", &journal);
        crashing.panic_shutdown = true;
        let (orchestrator, stop) = orchestrator(
            fast_config(),
            vec![Recorded::new("A", &journal), crashing, Recorded::new("C", &journal)],
        );
        orchestrator.start().await.unwrap();

        let report = orchestrator.shutdown().await.unwrap();

        assert_eq!(report.stopped, vec!["C", "A"]);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            &report.failures[0],
            (name, LifecycleError::HookFailed { message, .. }) if name == "B" && message == "panicked"
        ));
        assert!(orchestrator.live_services().is_empty());
        assert_eq!(orchestrator.state(), LifecycleState::Shutdown);
        assert_eq!(stop.reason(), Some(TerminationReason::Shutdown));
    }

    #[tokio::test]
    async fn test_panicking_initialize_rolls_back_and_terminates() {
        let journal = Journal::default();
        let mut crashing = Recorded::new("B", &journal);
        crashing.panic_init = true;
        let (orchestrator, stop) = orchestrator(
            fast_config(),
            vec![Recorded::new("A", &journal), crashing, Recorded::new("C", &journal)],
        );

        let err = orchestrator.start().await.unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::HookFailed { ref service, ref message } if service == "B" && message == "panicked"
        ));
        assert_eq!(*journal.read().await, vec!["init A", "init B", "shutdown A"]);
        assert_eq!(orchestrator.state(), LifecycleState::Shutdown);
        assert_eq!(stop.reason(), Some(TerminationReason::StartupFailed));
        assert!(matches!(
            orchestrator.shutdown().await,
            Err(LifecycleError::InvalidState {
                state: LifecycleState::Shutdown,
                ..
            })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_initialized_flag_never_leads_ready_state() {
        let (orchestrator, _stop) = orchestrator(fast_config(), Vec::new());
        let orchestrator = Arc::new(orchestrator);

        let watcher = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                while !orchestrator.is_initialized() {
                    tokio::task::yield_now().await;
                }
                orchestrator.state()
            })
        };
        orchestrator.start().await.unwrap();

        assert_eq!(watcher.await.unwrap(), LifecycleState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_timeout_is_fatal() {
        let journal = Journal::default();
        let mut stuck = Recorded::new("A", &journal);
        stuck.init_delay = Duration::from_secs(60);
        let config = CoreConfig {
            service_timeout_ms: Some(1_000),
            ..fast_config()
        };
        let (orchestrator, _stop) = orchestrator(config, vec![stuck]);

        let err = orchestrator.start().await.unwrap_err();

        assert!(matches!(err, LifecycleError::Timeout { .. }));
        assert!(journal.read().await.is_empty());
    }

    struct Counting {
        ready: Arc<std::sync::atomic::AtomicUsize>,
        shutting_down: Arc<std::sync::atomic::AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl LifecycleObserver for Counting {
        async fn on_ready(&self) -> anyhow::Result<()> {
            self.ready.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_shutting_down(&self) -> anyhow::Result<()> {
            self.shutting_down.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Panicking;

    #[async_trait::async_trait]
    impl LifecycleObserver for Panicking {
        async fn on_ready(&self) -> anyhow::Result<()> {
            panic!("fade-in shader missing");
        }

        async fn on_shutting_down(&self) -> anyhow::Result<()> {
            anyhow::bail!("nothing to fade out")
        }
    }

    #[tokio::test]
    async fn test_observers_are_isolated_from_each_other() {
        let ready = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let shutting_down = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let stop = StopSignal::new();
        let orchestrator = Orchestrator::builder(SingletonRegistry::new())
            .config(fast_config())
            .scenes(Arc::new(SceneCache::new(Arc::new(MemorySceneBackend::new()))))
            .observer(Arc::new(Panicking))
            .observer(Arc::new(Counting {
                ready: Arc::clone(&ready),
                shutting_down: Arc::clone(&shutting_down),
            }))
            .host(Arc::new(stop.clone()))
            .build()
            .unwrap();

        orchestrator.start().await.unwrap();
        orchestrator.flush_observers().await;
        assert_eq!(ready.load(Ordering::SeqCst), 1);
        assert!(orchestrator.is_initialized());

        orchestrator.shutdown().await.unwrap();
        orchestrator.flush_observers().await;
        assert_eq!(shutting_down.load(Ordering::SeqCst), 1);
        assert!(stop.is_stopped());
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let (orchestrator, _stop) = orchestrator(fast_config(), Vec::new());
        let mut events = orchestrator.subscribe();

        orchestrator.start().await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                LifecycleEvent::StateChanged {
                    from: LifecycleState::Uninitialized,
                    to: LifecycleState::Initializing,
                },
                LifecycleEvent::StateChanged {
                    from: LifecycleState::Initializing,
                    to: LifecycleState::Ready,
                },
                LifecycleEvent::Ready,
            ]
        );
    }

    #[test]
    fn test_build_shares_registry_instances() {
        let registry = SingletonRegistry::new();
        let orchestrator = Orchestrator::<MemorySceneBackend>::builder(registry.clone())
            .config(fast_config())
            .host(Arc::new(StopSignal::new()))
            .build()
            .unwrap();

        let scenes = registry.get::<SceneCache<MemorySceneBackend>>().unwrap();
        assert!(Arc::ptr_eq(orchestrator.scenes(), &scenes));
        assert_eq!(registry.instance::<CoreConfig>().unwrap().settle_delay_ms, 0);

        let rejected = Orchestrator::<MemorySceneBackend>::builder(registry)
            .config(CoreConfig::default())
            .build();
        assert!(matches!(rejected, Err(LifecycleError::InitializationFailed(_))));
    }
}
