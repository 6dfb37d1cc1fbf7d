/*!
Core Toplevels instance - owns the session lifecycle and event broadcasting.

# Module Structure

- `mod.rs` - Toplevels struct, builder, lifecycle, public calls
- `reconciler.rs` - per-handle transient state, turns session events into registry mutations
- `registry/` - Registry (committed window list) with private fields + operations + event emission
- `worker.rs` - the thread that owns the session, request/reply plumbing, connect retry

# Example

```ignore
use toplevels::Toplevels;

let toplevels = Toplevels::builder().focus_delay_ms(100).build();
toplevels.bootstrap()?;

for window in toplevels.list_windows()? {
    println!("{} {:?}", window.id, window.title);
}
toplevels.focus(WindowId(0))?;

let mut events = toplevels.subscribe();
while let Ok(event) = events.recv().await {
    // handle event
}
```
*/

mod reconciler;
mod registry;
mod worker;

#[cfg(test)]
pub(crate) use worker::Request;
pub(crate) use worker::WorkerClient;

use crate::platform::{Connector, CurrentConnector};
use crate::polling::{self, PollingHandle};
use crate::query::{self, QueryMatch};
use crate::types::{
  Event, IdAllocator, SessionState, Snapshot, ToplevelsError, ToplevelsResult, Window, WindowId,
};
use async_broadcast::{InactiveReceiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use worker::{SessionConfig, WorkerContext, WorkerHandle};

const EVENT_CHANNEL_CAPACITY: usize = 1000;

type Spawner = dyn Fn(WorkerContext) -> ToplevelsResult<WorkerHandle> + Send + Sync;

/// A running session: worker thread plus optional refresh poller.
#[derive(Debug)]
struct LiveSession {
  // Dropped first so it stops before the worker it feeds.
  poller: Option<PollingHandle>,
  worker: WorkerHandle,
}

/// Main Toplevels instance - owns the session worker and event broadcasting.
///
/// Nothing connects until [`Toplevels::bootstrap`]. The session stops on
/// [`Toplevels::shutdown`] or when the last clone is dropped.
/// Clone is cheap (Arc bumps) - share freely across threads.
///
/// Every call except `subscribe` and `state` blocks the calling thread; call
/// them from `spawn_blocking` inside async code.
#[derive(Clone)]
pub struct Toplevels {
  config: SessionConfig,
  ids: Arc<IdAllocator>,
  events_tx: Sender<Event>,
  events_keepalive: InactiveReceiver<Event>,
  state: Arc<RwLock<SessionState>>,
  session: Arc<Mutex<Option<LiveSession>>>,
  spawner: Arc<Spawner>,
}

impl std::fmt::Debug for Toplevels {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Toplevels")
      .field("state", &*self.state.read())
      .finish_non_exhaustive()
  }
}

/// Builder for configuring a Toplevels instance.
///
/// # Example
///
/// ```ignore
/// let toplevels = Toplevels::builder()
///     .connect_attempts(3)
///     .refresh_interval_ms(250)
///     .focus_delay_ms(100)
///     .build();
/// ```
#[derive(Debug, Default, Clone, Copy)]
#[must_use = "Builder does nothing until .build() is called"]
pub struct ToplevelsBuilder {
  config: SessionConfig,
}

impl ToplevelsBuilder {
  /// Connect attempts during bootstrap. Default: 10.
  ///
  /// Only connection failures are retried; a compositor without the toplevel
  /// manager fails immediately.
  pub const fn connect_attempts(mut self, attempts: u32) -> Self {
    self.config.connect_attempts = attempts;
    self
  }

  /// Pause between connect attempts. Default: 1000ms.
  pub const fn retry_delay_ms(mut self, ms: u64) -> Self {
    self.config.retry_delay_ms = ms;
    self
  }

  /// Drain compositor events in the background every `ms` milliseconds, so
  /// subscribers see changes without anyone calling `snapshot()`.
  ///
  /// Default: off.
  pub const fn refresh_interval_ms(mut self, ms: u64) -> Self {
    self.config.refresh_interval_ms = Some(ms);
    self
  }

  /// Sleep before each focus request. Default: 0.
  ///
  /// Gives a launcher time to close its own surface before the compositor
  /// moves focus.
  pub const fn focus_delay_ms(mut self, ms: u64) -> Self {
    self.config.focus_delay_ms = ms;
    self
  }

  /// Query results must score strictly above this. Default: 20.
  pub const fn min_score(mut self, score: i32) -> Self {
    self.config.min_score = score;
    self
  }

  /// Build the instance. Does not connect; call [`Toplevels::bootstrap`].
  #[must_use = "Toplevels instance must be stored to keep the session alive"]
  pub fn build(self) -> Toplevels {
    Toplevels::with_connector(self.config, CurrentConnector)
  }

  /// Build against a scripted compositor.
  #[cfg(test)]
  pub(crate) fn build_with<C>(self, connector: C) -> Toplevels
  where
    C: Connector + Clone + Sync,
  {
    Toplevels::with_connector(self.config, connector)
  }
}

impl Default for Toplevels {
  fn default() -> Self {
    Self::new()
  }
}

impl Toplevels {
  /// Create a new instance with default options.
  ///
  /// For custom configuration, use [`Toplevels::builder()`].
  #[must_use = "Toplevels instance must be stored to keep the session alive"]
  pub fn new() -> Self {
    Self::builder().build()
  }

  /// Create a builder for configuring a new instance.
  pub fn builder() -> ToplevelsBuilder {
    ToplevelsBuilder::default()
  }

  fn with_connector<C>(config: SessionConfig, connector: C) -> Self
  where
    C: Connector + Clone + Sync,
  {
    let (mut tx, rx) = async_broadcast::broadcast(EVENT_CHANNEL_CAPACITY);
    tx.set_overflow(true); // Drop oldest messages when full

    let spawner: Arc<Spawner> = Arc::new(move |ctx| WorkerHandle::spawn(connector.clone(), ctx));

    Self {
      config,
      ids: Arc::new(IdAllocator::new()),
      events_tx: tx,
      events_keepalive: rx.deactivate(),
      state: Arc::new(RwLock::new(SessionState::Uninitialized)),
      session: Arc::new(Mutex::new(None)),
      spawner,
    }
  }

  /// Connect to the compositor and reconcile the windows that already exist.
  ///
  /// Returns once the session is `Live`. Calling it on a live instance is a
  /// no-op. On failure nothing is left running and the state is back to
  /// `Uninitialized`, so bootstrap may be attempted again.
  pub fn bootstrap(&self) -> ToplevelsResult<()> {
    let mut session = self.session.lock();
    if session.is_some() {
      return Ok(());
    }

    *self.state.write() = SessionState::Bootstrapping;
    match self.start_session() {
      Ok(live) => {
        *session = Some(live);
        *self.state.write() = SessionState::Live;
        log::info!("Toplevels session live");
        Ok(())
      }
      Err(e) => {
        *self.state.write() = SessionState::Uninitialized;
        log::error!("Bootstrap failed: {e}");
        Err(e)
      }
    }
  }

  fn start_session(&self) -> ToplevelsResult<LiveSession> {
    let ctx = WorkerContext {
      config: self.config,
      ids: Arc::clone(&self.ids),
      events_tx: self.events_tx.clone(),
    };
    let worker = (self.spawner)(ctx)?;

    let poller = match self.config.refresh_interval_ms {
      Some(ms) => Some(polling::start_polling(
        worker.client(),
        Duration::from_millis(ms),
      )?),
      None => None,
    };
    Ok(LiveSession { poller, worker })
  }

  /// Tear the session down: release every handle, empty the registry
  /// (emitting `window:removed` for each entry) and disconnect.
  ///
  /// Window ids keep counting up if the instance is bootstrapped again.
  pub fn shutdown(&self) {
    let mut session = self.session.lock();
    *self.state.write() = SessionState::Uninitialized;
    if let Some(live) = session.take() {
      drop(live);
      log::info!("Toplevels session shut down");
    }
  }

  /// Current session lifecycle state.
  pub fn state(&self) -> SessionState {
    *self.state.read()
  }

  /// Subscribe to registry change events.
  pub fn subscribe(&self) -> async_broadcast::Receiver<Event> {
    self.events_keepalive.activate_cloned()
  }

  /// Drain pending compositor events, then copy the registry.
  pub fn snapshot(&self) -> ToplevelsResult<Snapshot> {
    self.client()?.snapshot()
  }

  /// Windows in order of first publication, after draining pending events.
  pub fn list_windows(&self) -> ToplevelsResult<Vec<Window>> {
    self.snapshot().map(|snapshot| snapshot.windows)
  }

  /// Ask the compositor to give `id` input focus.
  ///
  /// Fails with `NoSeat` when the compositor advertised no seat (checked
  /// first), `NotFound` when no such window is published.
  pub fn focus(&self, id: WindowId) -> ToplevelsResult<()> {
    let client = self.client()?;
    if self.config.focus_delay_ms > 0 {
      std::thread::sleep(Duration::from_millis(self.config.focus_delay_ms));
    }
    client.focus(id)
  }

  /// Fuzzy-search the current windows by title and app id, best match first.
  ///
  /// An empty `text` returns every window unscored.
  pub fn query(&self, text: &str, exact: bool) -> ToplevelsResult<Vec<QueryMatch>> {
    let windows = self.list_windows()?;
    Ok(query::rank(windows, text, exact, self.config.min_score))
  }

  /// Clone the request sender out of the lock; requests block.
  fn client(&self) -> ToplevelsResult<WorkerClient> {
    if !self.state().is_live() {
      return Err(ToplevelsError::NotLive);
    }
    self
      .session
      .lock()
      .as_ref()
      .map(|live| live.worker.client())
      .ok_or(ToplevelsError::NotLive)
  }
}
