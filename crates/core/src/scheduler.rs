//! Poll scheduler - one polling task per enabled widget
//!
//! A single reconciler task owns the set of polling tasks. Snapshots from the
//! instance source and commands from the handle reach it over channels, so
//! the timer set is only ever touched from one place. Each polling task runs
//! its own interval, performs at most one fetch at a time, and writes its
//! result into the status aggregate under its generation.

use crate::capability::{CapabilityDescriptor, FetchOperation, FetchRequest};
use crate::classify::{Outcome, RecordTarget};
use crate::constants::{COMMAND_QUEUE_DEPTH, DEFAULT_FETCH_TIMEOUT, REFRESH_QUEUE_DEPTH};
use crate::error::{FetchError, SchedulerError};
use crate::registry::CapabilityRegistry;
use crate::source::{InstanceSource, Snapshot};
use crate::status::{Generation, StatusAggregate};
use crate::subscription::{Subscription, SubscriptionHandle};
use log::{debug, error, info, trace, warn};
use pulseboard_types::{FetchPayload, InstanceId, StatusMap, WidgetConfig, WidgetInstance};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Upper bound for a single fetch; exceeding it counts as a fatal cycle
    pub fetch_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Introspection entry for one scheduled widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledInstance {
    pub id: InstanceId,
    pub type_id: String,
    pub period: Duration,
    pub generation: Generation,
}

enum Command {
    Refresh {
        id: InstanceId,
        reply: oneshot::Sender<bool>,
    },
    Scheduled {
        reply: oneshot::Sender<Vec<ScheduledInstance>>,
    },
}

/// Handle to the running scheduler
///
/// Dropping the handle stops every polling task.
pub struct PollScheduler {
    commands: mpsc::Sender<Command>,
    status: Arc<StatusAggregate>,
    shutdown: CancellationToken,
    reconciler: Mutex<Option<JoinHandle<()>>>,
}

impl PollScheduler {
    /// Start reacting to `source` snapshots
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(registry: Arc<CapabilityRegistry>, source: &InstanceSource, config: SchedulerConfig) -> Self {
        let status = Arc::new(StatusAggregate::new());
        let (commands, mailbox) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let shutdown = CancellationToken::new();

        let reconciler = Reconciler {
            registry,
            status: Arc::clone(&status),
            fetch_timeout: config.fetch_timeout,
            tasks: HashMap::new(),
            next_generation: 0,
        };
        let handle = tokio::spawn(reconciler.run(source.subscribe(), mailbox, shutdown.clone()));

        Self {
            commands,
            status,
            shutdown,
            reconciler: Mutex::new(Some(handle)),
        }
    }

    /// The published status view
    pub fn status(&self) -> Arc<StatusAggregate> {
        Arc::clone(&self.status)
    }

    /// Subscribe to the full status map
    pub fn subscribe_status(&self) -> Subscription<Arc<StatusMap>> {
        self.status.subscribe()
    }

    /// Call `listener` with the full status map on every change
    pub fn subscribe_status_with<F>(&self, listener: F) -> SubscriptionHandle
    where
        F: FnMut(&Arc<StatusMap>) + Send + 'static,
    {
        self.status.subscribe_with(listener)
    }

    /// Ask for an out-of-band fetch of one widget
    ///
    /// Runs after any fetch already in flight for that widget; repeated
    /// requests while one is pending are coalesced. Returns `false` when the
    /// widget is not scheduled.
    pub async fn trigger_refresh(&self, id: InstanceId) -> Result<bool, SchedulerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Refresh { id, reply })
            .await
            .map_err(|_| SchedulerError::Stopped)?;
        response.await.map_err(|_| SchedulerError::Stopped)
    }

    /// Currently scheduled widgets, sorted by id
    pub async fn scheduled(&self) -> Result<Vec<ScheduledInstance>, SchedulerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Scheduled { reply })
            .await
            .map_err(|_| SchedulerError::Stopped)?;
        response.await.map_err(|_| SchedulerError::Stopped)
    }

    /// Cancel every polling task and wait for them to stop
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(handle) = self.reconciler.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Poll scheduler task failed: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollScheduler")
            .field("status", &self.status)
            .field("running", &self.is_running())
            .finish()
    }
}

/// A running polling task owned by the reconciler
struct PollTask {
    generation: Generation,
    instance: WidgetInstance,
    period: Duration,
    cancel: CancellationToken,
    refresh: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl PollTask {
    /// Whether `widget` would be polled exactly the way this task polls
    fn polls_same(&self, widget: &WidgetInstance) -> bool {
        self.instance.type_id == widget.type_id && self.instance.config == widget.config
    }

    async fn join(self) {
        let id = self.instance.id;
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                error!("Polling task for widget {} panicked", id);
            }
        }
    }
}

/// Owner of the timer set
struct Reconciler {
    registry: Arc<CapabilityRegistry>,
    status: Arc<StatusAggregate>,
    fetch_timeout: Duration,
    tasks: HashMap<InstanceId, PollTask>,
    next_generation: Generation,
}

impl Reconciler {
    async fn run(
        mut self,
        mut snapshots: Subscription<Snapshot>,
        mut mailbox: mpsc::Receiver<Command>,
        shutdown: CancellationToken,
    ) {
        info!("Poll scheduler started");
        let mut source_open = true;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                command = mailbox.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                snapshot = snapshots.next(), if source_open => match snapshot {
                    Some(snapshot) => self.reconcile(&snapshot).await,
                    None => {
                        debug!("Instance source closed, keeping current timers");
                        source_open = false;
                    }
                },
            }
        }

        self.stop_all().await;
        info!("Poll scheduler stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Refresh { id, reply } => {
                let accepted = match self.tasks.get(&id) {
                    Some(task) => {
                        match task.refresh.try_send(()) {
                            Ok(()) => debug!("Queued manual refresh for widget {}", id),
                            Err(TrySendError::Full(())) => {
                                debug!("Manual refresh for widget {} already pending", id)
                            }
                            Err(TrySendError::Closed(())) => {
                                warn!("Polling task for widget {} is gone", id)
                            }
                        }
                        true
                    }
                    None => false,
                };
                let _ = reply.send(accepted);
            }
            Command::Scheduled { reply } => {
                let mut scheduled: Vec<_> = self
                    .tasks
                    .values()
                    .map(|task| ScheduledInstance {
                        id: task.instance.id,
                        type_id: task.instance.type_id.clone(),
                        period: task.period,
                        generation: task.generation,
                    })
                    .collect();
                scheduled.sort_by_key(|s| s.id);
                let _ = reply.send(scheduled);
            }
        }
    }

    /// Bring the timer set in line with `snapshot`
    async fn reconcile(&mut self, snapshot: &[WidgetInstance]) {
        let mut desired: HashMap<InstanceId, &WidgetInstance> = HashMap::with_capacity(snapshot.len());
        for widget in snapshot {
            if desired.insert(widget.id, widget).is_some() {
                warn!("Widget {} appears twice in snapshot, using the last entry", widget.id);
            }
        }

        let removed: Vec<InstanceId> = self
            .tasks
            .keys()
            .filter(|id| !desired.contains_key(id))
            .copied()
            .collect();
        let changed: Vec<InstanceId> = self
            .tasks
            .iter()
            .filter(|(id, task)| desired.get(id).is_some_and(|w| !task.polls_same(w)))
            .map(|(id, _)| *id)
            .collect();

        // Cancel first so every stopping task winds down concurrently, then
        // wait for each one: a replacement must not start while the old
        // task could still be fetching.
        let mut stopping = Vec::with_capacity(removed.len() + changed.len());
        for id in removed.iter().chain(changed.iter()) {
            if let Some(task) = self.tasks.remove(id) {
                task.cancel.cancel();
                if let Some(widget) = desired.get(id) {
                    let new_period = widget.refresh_interval();
                    if new_period != task.period {
                        info!(
                            "Widget {} interval changed from {}s to {}s, restarting timer",
                            id,
                            task.period.as_secs(),
                            new_period.as_secs()
                        );
                    } else {
                        info!("Widget {} configuration changed, restarting timer", id);
                    }
                }
                stopping.push(task);
            }
        }
        for task in stopping {
            task.join().await;
        }

        for id in removed {
            self.status.release(id);
            info!("Removed timer for widget {}", id);
        }

        for widget in snapshot {
            if self.tasks.contains_key(&widget.id) {
                continue;
            }
            if let Some(latest) = desired.get(&widget.id) {
                self.schedule(latest);
            }
        }

        debug!("Reconciled: {} widgets scheduled", self.tasks.len());
    }

    fn schedule(&mut self, widget: &WidgetInstance) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let period = widget.refresh_interval();
        let cancel = CancellationToken::new();
        let (refresh, refresh_rx) = mpsc::channel(REFRESH_QUEUE_DEPTH);

        self.status.claim(widget.id, generation);

        let poller = Poller {
            id: widget.id,
            type_id: widget.type_id.clone(),
            title: widget.title().map(str::to_string),
            config: Arc::new(widget.config.clone()),
            generation,
            registry: Arc::clone(&self.registry),
            status: Arc::clone(&self.status),
            fetch_timeout: self.fetch_timeout,
        };
        let handle = tokio::spawn(poller.run(period, refresh_rx, cancel.clone()));

        info!(
            "Set up timer for widget {} ({}): {}s interval",
            widget.id,
            widget.type_id,
            period.as_secs()
        );

        self.tasks.insert(
            widget.id,
            PollTask {
                generation,
                instance: widget.clone(),
                period,
                cancel,
                refresh,
                handle,
            },
        );
    }

    async fn stop_all(&mut self) {
        let tasks: Vec<PollTask> = self.tasks.drain().map(|(_, task)| task).collect();
        for task in &tasks {
            task.cancel.cancel();
        }
        let count = tasks.len();
        for task in tasks {
            task.join().await;
        }
        self.status.release_all();
        debug!("Stopped {} polling tasks", count);
    }
}

/// Polling loop for one widget generation
struct Poller {
    id: InstanceId,
    type_id: String,
    title: Option<String>,
    config: Arc<WidgetConfig>,
    generation: Generation,
    registry: Arc<CapabilityRegistry>,
    status: Arc<StatusAggregate>,
    fetch_timeout: Duration,
}

impl Poller {
    async fn run(self, period: Duration, mut refresh: mpsc::Receiver<()>, cancel: CancellationToken) {
        // The first tick completes immediately, so a new widget is fetched
        // right away. Ticks that come due while a fetch is running are
        // dropped and the next fetch waits for the regular grid.
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                Some(()) = refresh.recv() => trace!("Manual refresh for widget {}", self.id),
            }

            if !self.poll(&cancel).await {
                break;
            }

            // Skip only moves the deadline forward; a tick that came due
            // during the fetch is still ready and must not start another one
            tokio::select! {
                biased;
                _ = ticker.tick() => trace!("Dropped tick missed by widget {}", self.id),
                _ = std::future::ready(()) => {}
            }
        }

        trace!(
            "Polling task for widget {} (generation {}) exited",
            self.id,
            self.generation
        );
    }

    /// One fetch-classify-publish cycle; `false` if cancelled mid-fetch
    async fn poll(&self, cancel: &CancellationToken) -> bool {
        let descriptor = self.registry.get(&self.type_id);
        let target = self.target(descriptor.as_deref());

        let (outcome, latency) = match descriptor.as_ref().and_then(|d| d.fetch.clone()) {
            None => {
                debug!(
                    "No fetch operation for widget {} ({}), reporting online",
                    self.id, self.type_id
                );
                (Outcome::without_fetch(), None)
            }
            Some(fetch) => {
                let started = Instant::now();
                match self.invoke(fetch, cancel).await {
                    Some(result) => (Outcome::classify(result), Some(started.elapsed())),
                    None => return false,
                }
            }
        };

        match &outcome {
            Outcome::Success { state, .. } => debug!(
                "Updated widget {} ({}): {} (generation {})",
                self.id, self.type_id, state, self.generation
            ),
            Outcome::Recoverable { error } => {
                warn!("Widget {} ({}) returned error: {}", self.id, self.type_id, error)
            }
            Outcome::Fatal(err) => warn!(
                "Failed to fetch data for widget {} ({}), removing status: {}",
                self.id, self.type_id, err
            ),
        }

        let record = outcome.into_record(target, latency);
        self.status.apply(self.id, self.generation, record);
        true
    }

    /// Run the fetch on its own task under the timeout
    ///
    /// Returns `None` when cancelled. The fetch task has always finished by
    /// the time this returns.
    async fn invoke(
        &self,
        fetch: Arc<dyn FetchOperation>,
        cancel: &CancellationToken,
    ) -> Option<Result<FetchPayload, FetchError>> {
        let request = FetchRequest::poll(self.id, Arc::clone(&self.config));
        let mut call = tokio::spawn(async move { fetch.fetch(request).await });

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            joined = time::timeout(self.fetch_timeout, &mut call) => Some(match joined {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(FetchError::Other(format!("fetch task failed: {}", e))),
                Err(_) => Err(FetchError::Timeout(self.fetch_timeout)),
            }),
        };

        if !call.is_finished() {
            call.abort();
            let _ = call.await;
        }
        result
    }

    fn target(&self, descriptor: Option<&CapabilityDescriptor>) -> RecordTarget {
        let name = self
            .title
            .clone()
            .or_else(|| descriptor.map(|d| d.metadata.name.clone()))
            .unwrap_or_else(|| self.type_id.clone());
        RecordTarget {
            id: self.id,
            name,
            icon: descriptor.map(|d| d.metadata.icon.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{fetch_fn, CapabilityDescriptor};
    use crate::source::MemoryWidgetStore;
    use pulseboard_types::{
        CapabilityMetadata, Category, ConfigTemplate, ServiceState, WidgetConfig,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls, records start times and tracks the highest number of
    /// concurrent fetches
    struct FetchLog {
        origin: Instant,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        starts: std::sync::Mutex<Vec<u64>>,
    }

    impl Default for FetchLog {
        fn default() -> Self {
            Self {
                origin: Instant::now(),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                starts: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    /// Leaves the in-flight count when dropped, including on abort
    struct InFlight<'a>(&'a FetchLog);

    impl Drop for InFlight<'_> {
        fn drop(&mut self) {
            self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl FetchLog {
        fn enter(&self) -> (usize, InFlight<'_>) {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.starts
                .lock()
                .unwrap()
                .push(self.origin.elapsed().as_secs());
            (call, InFlight(self))
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        /// Whole seconds since the log was created, one entry per fetch
        fn starts(&self) -> Vec<u64> {
            self.starts.lock().unwrap().clone()
        }
    }

    fn metadata(id: &str) -> CapabilityMetadata {
        CapabilityMetadata::new(id, id.to_uppercase(), "test", Category::Service)
    }

    /// Capability whose fetch takes `delay` and reports success
    fn slow_capability(id: &str, fetches: Arc<FetchLog>, delay: Duration) -> CapabilityDescriptor {
        CapabilityDescriptor::new(metadata(id), ConfigTemplate::default()).with_fetch(fetch_fn(
            move |_request| {
                let fetches = Arc::clone(&fetches);
                async move {
                    let _in_flight = fetches.enter();
                    time::sleep(delay).await;
                    Ok(FetchPayload::ok(json!({ "ok": true })))
                }
            },
        ))
    }

    /// Capability that answers once, then never again
    fn hangs_after_first(id: &str, fetches: Arc<FetchLog>) -> CapabilityDescriptor {
        CapabilityDescriptor::new(metadata(id), ConfigTemplate::default()).with_fetch(fetch_fn(
            move |_request| {
                let fetches = Arc::clone(&fetches);
                async move {
                    let (call, _in_flight) = fetches.enter();
                    if call > 0 {
                        std::future::pending::<()>().await;
                    }
                    Ok(FetchPayload::ok(json!({ "call": call })))
                }
            },
        ))
    }

    fn widget(id: i64, type_id: &str, refresh: u64) -> WidgetInstance {
        let mut config = WidgetConfig::new();
        config.insert("refreshRate".to_string(), json!(refresh));
        WidgetInstance::new(id, type_id, config)
    }

    fn harness(registry: CapabilityRegistry, timeout: Duration) -> (InstanceSource, PollScheduler) {
        let source = InstanceSource::new(Arc::new(MemoryWidgetStore::default()));
        let scheduler = PollScheduler::start(
            Arc::new(registry),
            &source,
            SchedulerConfig {
                fetch_timeout: timeout,
            },
        );
        (source, scheduler)
    }

    /// Let spawned tasks run without moving the paused clock meaningfully
    async fn settle() {
        time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_widget_is_fetched_immediately() {
        let fetches = Arc::new(FetchLog::default());
        let registry = CapabilityRegistry::new();
        registry.register(slow_capability("svc", fetches.clone(), Duration::ZERO));
        let (source, scheduler) = harness(registry, Duration::from_secs(5));

        source.publish(vec![widget(1, "svc", 60)]);
        settle().await;

        assert_eq!(fetches.calls(), 1);
        let record = scheduler.status().get(InstanceId(1)).unwrap();
        assert_eq!(record.state, ServiceState::Online);
        assert_eq!(record.name, "SVC");
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_once_per_interval() {
        let fetches = Arc::new(FetchLog::default());
        let registry = CapabilityRegistry::new();
        registry.register(slow_capability("svc", fetches.clone(), Duration::ZERO));
        let (source, scheduler) = harness(registry, Duration::from_secs(5));

        source.publish(vec![widget(1, "svc", 10)]);
        time::sleep(Duration::from_secs(35)).await;

        // t = 0, 10, 20, 30
        assert_eq!(fetches.calls(), 4);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_drops_missed_ticks() {
        let fetches = Arc::new(FetchLog::default());
        let registry = CapabilityRegistry::new();
        registry.register(slow_capability("slow", fetches.clone(), Duration::from_secs(25)));
        let (source, scheduler) = harness(registry, Duration::from_secs(60));

        source.publish(vec![widget(1, "slow", 10)]);
        time::sleep(Duration::from_secs(65)).await;

        // Ticks at 10, 20, 40 and 50 fall inside a running fetch
        assert_eq!(fetches.starts(), vec![0, 30, 60]);
        assert_eq!(fetches.max_in_flight(), 1);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_tick_waits_for_regular_grid() {
        let fetches = Arc::new(FetchLog::default());
        let recorder = fetches.clone();
        let registry = CapabilityRegistry::new();
        registry.register(
            CapabilityDescriptor::new(metadata("svc"), ConfigTemplate::default()).with_fetch(
                fetch_fn(move |_request| {
                    let fetches = Arc::clone(&recorder);
                    async move {
                        let (call, _in_flight) = fetches.enter();
                        if call == 0 {
                            time::sleep(Duration::from_secs(25)).await;
                        }
                        Ok(FetchPayload::ok(json!({})))
                    }
                }),
            ),
        );
        let (source, scheduler) = harness(registry, Duration::from_secs(60));

        source.publish(vec![widget(1, "svc", 10)]);
        time::sleep(Duration::from_secs(41)).await;

        assert_eq!(fetches.starts(), vec![0, 30, 40]);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_refresh_waits_for_in_flight_fetch() {
        let fetches = Arc::new(FetchLog::default());
        let registry = CapabilityRegistry::new();
        registry.register(slow_capability("slow", fetches.clone(), Duration::from_secs(25)));
        let (source, scheduler) = harness(registry, Duration::from_secs(60));

        source.publish(vec![widget(1, "slow", 10)]);
        for _ in 0..10 {
            time::sleep(Duration::from_secs(10)).await;
            assert!(scheduler.trigger_refresh(InstanceId(1)).await.unwrap());
        }

        assert_eq!(fetches.max_in_flight(), 1);
        assert!(fetches.calls() >= 3);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_readd_while_removal_is_joining() {
        let fetches = Arc::new(FetchLog::default());
        let registry = CapabilityRegistry::new();
        registry.register(hangs_after_first("svc", fetches.clone()));
        let (source, scheduler) = harness(registry, Duration::from_secs(120));

        source.publish(vec![widget(1, "svc", 10)]);
        time::sleep(Duration::from_secs(15)).await;
        assert_eq!(fetches.calls(), 2);

        // The reconciler starts removing the hung task before the widget
        // comes back with a new interval
        source.publish(vec![]);
        tokio::task::yield_now().await;
        source.publish(vec![widget(1, "svc", 20)]);
        settle().await;

        let scheduled = scheduler.scheduled().await.unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].period, Duration::from_secs(20));
        assert_eq!(scheduled[0].generation, 2);
        assert_eq!(fetches.calls(), 3);
        assert_eq!(fetches.max_in_flight(), 1);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_removal_cancels_in_flight_fetch_and_clears_status() {
        let fetches = Arc::new(FetchLog::default());
        let registry = CapabilityRegistry::new();
        registry.register(hangs_after_first("svc", fetches.clone()));
        let (source, scheduler) = harness(registry, Duration::from_secs(120));

        source.publish(vec![widget(1, "svc", 10)]);
        time::sleep(Duration::from_secs(15)).await;
        assert_eq!(fetches.calls(), 2);
        assert!(scheduler.status().get(InstanceId(1)).is_some());

        source.publish(vec![]);
        settle().await;

        assert!(scheduler.status().get(InstanceId(1)).is_none());
        assert!(scheduler.scheduled().await.unwrap().is_empty());

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fetches.calls(), 2);
        assert!(scheduler.status().is_empty());
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_restarts_timer() {
        let fetches = Arc::new(FetchLog::default());
        let registry = CapabilityRegistry::new();
        registry.register(slow_capability("svc", fetches.clone(), Duration::ZERO));
        let (source, scheduler) = harness(registry, Duration::from_secs(5));

        source.publish(vec![widget(1, "svc", 300)]);
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fetches.calls(), 1);

        source.publish(vec![widget(1, "svc", 10)]);
        settle().await;
        assert_eq!(fetches.calls(), 2);

        let scheduled = scheduler.scheduled().await.unwrap();
        assert_eq!(scheduled[0].period, Duration::from_secs(10));

        time::sleep(Duration::from_secs(11)).await;
        assert_eq!(fetches.calls(), 3);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_widgets_keep_their_timer() {
        let fetches = Arc::new(FetchLog::default());
        let registry = CapabilityRegistry::new();
        registry.register(slow_capability("svc", fetches.clone(), Duration::ZERO));
        let (source, scheduler) = harness(registry, Duration::from_secs(5));

        source.publish(vec![widget(1, "svc", 30)]);
        settle().await;
        let before = scheduler.scheduled().await.unwrap();

        // Reordering and adding a sibling must leave widget 1 alone
        source.publish(vec![widget(2, "svc", 30), widget(1, "svc", 30).with_order(4)]);
        settle().await;
        let after = scheduler.scheduled().await.unwrap();

        assert_eq!(after.len(), 2);
        assert_eq!(after[0].generation, before[0].generation);
        assert_eq!(fetches.calls(), 2);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_outcomes() {
        let fetches_b = Arc::new(FetchLog::default());
        let registry = CapabilityRegistry::new();
        registry.register(
            CapabilityDescriptor::new(metadata("keyed"), ConfigTemplate::default())
                .with_fetch(fetch_fn(|_request| async { Ok(FetchPayload::failed("bad key")) })),
        );
        registry.register(hangs_after_first("flaky", fetches_b.clone()));
        let (source, scheduler) = harness(registry, Duration::from_secs(5));

        source.publish(vec![
            widget(1, "keyed", 10),
            widget(2, "flaky", 10),
            widget(3, "not-installed", 10),
        ]);
        settle().await;

        let status = scheduler.status();
        let a = status.get(InstanceId(1)).unwrap();
        assert_eq!(a.state, ServiceState::Offline);
        assert_eq!(a.error.as_deref(), Some("bad key"));
        assert!(status.get(InstanceId(2)).is_some());
        let c = status.get(InstanceId(3)).unwrap();
        assert_eq!(c.state, ServiceState::Online);
        assert_eq!(c.stats, json!({}));
        assert_eq!(c.name, "not-installed");

        // B's second fetch (t=10) hangs and times out at t=15
        time::sleep(Duration::from_secs(16)).await;
        assert!(status.get(InstanceId(2)).is_none());
        assert!(status.get(InstanceId(1)).is_some());
        assert_eq!(fetches_b.calls(), 2);

        // and is retried on its next tick
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fetches_b.calls(), 3);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregistered_type_falls_back_to_online() {
        let registry = Arc::new(CapabilityRegistry::new());
        registry.register(
            CapabilityDescriptor::new(metadata("down"), ConfigTemplate::default()).with_fetch(
                fetch_fn(|_request| async { Err(FetchError::Transport("refused".into())) }),
            ),
        );
        let source = InstanceSource::new(Arc::new(MemoryWidgetStore::default()));
        let scheduler = PollScheduler::start(registry.clone(), &source, SchedulerConfig::default());

        source.publish(vec![widget(1, "down", 10)]);
        settle().await;
        assert!(scheduler.status().get(InstanceId(1)).is_none());

        registry.unregister("down");
        assert!(scheduler.trigger_refresh(InstanceId(1)).await.unwrap());
        settle().await;

        let record = scheduler.status().get(InstanceId(1)).unwrap();
        assert_eq!(record.state, ServiceState::Online);
        assert_eq!(record.stats, json!({}));
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_unknown_widget_and_shutdown() {
        let (_source, scheduler) = harness(CapabilityRegistry::new(), Duration::from_secs(5));

        assert!(!scheduler.trigger_refresh(InstanceId(42)).await.unwrap());
        scheduler.shutdown().await;
        assert!(!scheduler.is_running());
        assert_eq!(
            scheduler.trigger_refresh(InstanceId(42)).await,
            Err(SchedulerError::Stopped)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_clears_status() {
        let fetches = Arc::new(FetchLog::default());
        let registry = CapabilityRegistry::new();
        registry.register(slow_capability("svc", fetches.clone(), Duration::ZERO));
        let (source, scheduler) = harness(registry, Duration::from_secs(5));

        source.publish(vec![widget(1, "svc", 10), widget(2, "svc", 10)]);
        settle().await;
        assert_eq!(scheduler.status().len(), 2);

        scheduler.shutdown().await;
        assert!(scheduler.status().is_empty());
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fetches.calls(), 2);
    }
}
