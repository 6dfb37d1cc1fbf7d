/*!
Session worker - the thread that owns the compositor session.

The session, reconciler and registry live on one dedicated thread. Everything
else talks to it through `WorkerClient`, which sends a `Request` over an
unbounded channel and blocks on a oneshot reply. All reconciliation therefore
happens at explicit drain points: bootstrap, `Snapshot` and `Refresh`.

At most one `Refresh` is queued at a time. Further refreshes requested before
the worker picks it up are folded into it, so a slow compositor can't build a
backlog in front of `Snapshot` or `Focus`.

Bootstrap runs on the worker thread too, so the session never has to be `Send`.
Its outcome is reported back before `WorkerHandle::spawn` returns.
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use async_broadcast::Sender;
use tokio::sync::{mpsc, oneshot};

use super::reconciler::Reconciler;
use super::registry::Registry;
use crate::platform::{Connector, Session};
use crate::types::{Event, IdAllocator, Snapshot, ToplevelsError, ToplevelsResult, WindowId};

const WORKER_THREAD_NAME: &str = "toplevels-session";

pub(crate) const DEFAULT_CONNECT_ATTEMPTS: u32 = 10;
pub(crate) const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Session settings, filled in by `ToplevelsBuilder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionConfig {
  /// Connect attempts before bootstrap gives up. Only `ConnectionFailed` is retried.
  pub(crate) connect_attempts: u32,
  pub(crate) retry_delay_ms: u64,
  /// Background `Refresh` interval. `None` disables the poller.
  pub(crate) refresh_interval_ms: Option<u64>,
  /// Caller-side sleep before a focus request is sent.
  pub(crate) focus_delay_ms: u64,
  /// Query results must score above this.
  pub(crate) min_score: i32,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
      retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
      refresh_interval_ms: None,
      focus_delay_ms: 0,
      min_score: crate::query::DEFAULT_MIN_SCORE,
    }
  }
}

/// What a new worker needs from the owning `Toplevels` handle.
#[derive(Debug, Clone)]
pub(crate) struct WorkerContext {
  pub(crate) config: SessionConfig,
  pub(crate) ids: Arc<IdAllocator>,
  pub(crate) events_tx: Sender<Event>,
}

#[derive(Debug)]
pub(crate) enum Request {
  Snapshot(oneshot::Sender<ToplevelsResult<Snapshot>>),
  Focus(WindowId, oneshot::Sender<ToplevelsResult<()>>),
  /// Drain pending events. Fire and forget, coalesced.
  Refresh,
  Shutdown,
}

/// Cloneable sending side of the worker's request channel.
#[derive(Debug, Clone)]
pub(crate) struct WorkerClient {
  requests: mpsc::UnboundedSender<Request>,
  /// Set while a `Refresh` sits in the queue. Cleared by the worker.
  refresh_pending: Arc<AtomicBool>,
}

impl WorkerClient {
  /// Drain pending events and return the registry contents.
  pub(crate) fn snapshot(&self) -> ToplevelsResult<Snapshot> {
    self.request(Request::Snapshot)
  }

  pub(crate) fn focus(&self, id: WindowId) -> ToplevelsResult<()> {
    self.request(|reply| Request::Focus(id, reply))
  }

  /// Queue a refresh unless one is already waiting. Returns false once the
  /// worker is gone.
  pub(crate) fn refresh(&self) -> bool {
    if self.refresh_pending.swap(true, Ordering::AcqRel) {
      return !self.requests.is_closed();
    }
    if self.requests.send(Request::Refresh).is_ok() {
      return true;
    }
    self.refresh_pending.store(false, Ordering::Release);
    false
  }

  /// Blocks the calling thread. Must not be called from an async task.
  fn request<T>(
    &self,
    make: impl FnOnce(oneshot::Sender<ToplevelsResult<T>>) -> Request,
  ) -> ToplevelsResult<T> {
    let (reply_tx, reply_rx) = oneshot::channel();
    self
      .requests
      .send(make(reply_tx))
      .map_err(|_| ToplevelsError::NotLive)?;
    reply_rx.blocking_recv().map_err(|_| ToplevelsError::NotLive)?
  }

  /// A client wired to a bare receiver instead of a worker thread. The flag
  /// is the one a worker would clear when it takes a `Refresh`.
  #[cfg(test)]
  pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<Request>, Arc<AtomicBool>) {
    let (requests, rx) = mpsc::unbounded_channel();
    let refresh_pending = Arc::new(AtomicBool::new(false));
    let client = Self {
      requests,
      refresh_pending: Arc::clone(&refresh_pending),
    };
    (client, rx, refresh_pending)
  }
}

/// Owns the worker thread. Drop sends `Shutdown` and joins.
#[derive(Debug)]
pub(crate) struct WorkerHandle {
  client: WorkerClient,
  thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
  /// Start a worker and bootstrap a session on it.
  ///
  /// Blocks until bootstrap finished. On failure the thread has already
  /// exited and nothing is left running.
  pub(crate) fn spawn<C: Connector>(connector: C, ctx: WorkerContext) -> ToplevelsResult<Self> {
    let (requests_tx, requests_rx) = mpsc::unbounded_channel();
    let (ready_tx, ready_rx) = oneshot::channel();
    let refresh_pending = Arc::new(AtomicBool::new(false));
    let worker_refresh_pending = Arc::clone(&refresh_pending);

    let thread = thread::Builder::new()
      .name(WORKER_THREAD_NAME.to_string())
      .spawn(move || match Worker::bootstrap(&connector, ctx) {
        Ok(worker) => {
          drop(ready_tx.send(Ok(())));
          worker.run(requests_rx, &worker_refresh_pending);
        }
        Err(e) => drop(ready_tx.send(Err(e))),
      })
      .map_err(|e| ToplevelsError::Internal(format!("failed to spawn session thread: {e}")))?;

    let handle = Self {
      client: WorkerClient {
        requests: requests_tx,
        refresh_pending,
      },
      thread: Some(thread),
    };

    let outcome = ready_rx.blocking_recv().map_err(|_| {
      ToplevelsError::Internal("session thread exited during bootstrap".to_string())
    })?;
    outcome.map(|()| handle)
  }

  pub(crate) fn client(&self) -> WorkerClient {
    self.client.clone()
  }
}

impl Drop for WorkerHandle {
  fn drop(&mut self) {
    // Fails only if the thread already exited.
    drop(self.client.requests.send(Request::Shutdown));
    if let Some(thread) = self.thread.take() {
      if thread.join().is_err() {
        log::error!("Session worker panicked");
      }
    }
  }
}

/// State owned by the worker thread.
struct Worker<S: Session> {
  session: S,
  reconciler: Reconciler<S::Handle>,
  registry: Registry<S::Handle>,
  /// Consecutive failed refreshes. Only the first of a streak is a warning.
  refresh_failures: u32,
}

impl<S: Session> Worker<S> {
  fn bootstrap<C>(connector: &C, ctx: WorkerContext) -> ToplevelsResult<Self>
  where
    C: Connector<Session = S>,
  {
    let session = connect_with_retry(
      connector,
      ctx.config.connect_attempts,
      Duration::from_millis(ctx.config.retry_delay_ms),
    )?;
    if !session.seat_available() {
      log::warn!("Compositor advertised no seat, focus requests will fail");
    }

    let mut worker = Self {
      session,
      reconciler: Reconciler::new(ctx.ids),
      registry: Registry::new(ctx.events_tx),
      refresh_failures: 0,
    };
    // Second sync: toplevels that existed before we bound the manager.
    worker.drain()?;
    log::info!(
      "Session live with {} existing windows ({} handles tracked)",
      worker.registry.len(),
      worker.reconciler.tracked()
    );
    Ok(worker)
  }

  fn run(mut self, mut requests: mpsc::UnboundedReceiver<Request>, refresh_pending: &AtomicBool) {
    while let Some(request) = requests.blocking_recv() {
      match request {
        Request::Snapshot(reply) => drop(reply.send(self.snapshot())),
        Request::Focus(id, reply) => drop(reply.send(self.focus(id))),
        Request::Refresh => {
          // Cleared first: changes arriving during the drain get a new refresh.
          refresh_pending.store(false, Ordering::Release);
          self.refresh();
        }
        Request::Shutdown => break,
      }
    }
    log::debug!("Session worker stopping");
  }

  fn refresh(&mut self) {
    match self.drain() {
      Ok(()) => {
        if self.refresh_failures > 0 {
          log::info!("Refresh recovered after {} failures", self.refresh_failures);
        }
        self.refresh_failures = 0;
      }
      Err(e) => {
        self.refresh_failures = self.refresh_failures.saturating_add(1);
        if self.refresh_failures == 1 {
          log::warn!("Refresh failed: {e}");
        } else {
          log::debug!("Refresh failed again ({}): {e}", self.refresh_failures);
        }
      }
    }
  }

  /// Deliver everything the session has buffered to the reconciler.
  fn drain(&mut self) -> ToplevelsResult<()> {
    for event in self.session.sync()? {
      self.reconciler.handle_event(&mut self.registry, event);
    }
    Ok(())
  }

  fn snapshot(&mut self) -> ToplevelsResult<Snapshot> {
    self.drain()?;
    Ok(Snapshot {
      windows: self.registry.snapshot(),
      seat_available: self.session.seat_available(),
    })
  }

  /// Seat is checked before the registry. Never mutates the registry.
  fn focus(&mut self, id: WindowId) -> ToplevelsResult<()> {
    if !self.session.seat_available() {
      return Err(ToplevelsError::NoSeat);
    }
    let entry = self
      .registry
      .lookup(id)
      .ok_or(ToplevelsError::NotFound(id))?;
    self.session.activate(&entry.handle)?;
    log::debug!("Activated window {id}");
    Ok(())
  }
}

impl<S: Session> Drop for Worker<S> {
  fn drop(&mut self) {
    // Handles go before the session disconnects.
    self.reconciler.teardown(&mut self.registry);
  }
}

/// Connect, retrying `ConnectionFailed` up to `attempts` times in total.
fn connect_with_retry<C: Connector>(
  connector: &C,
  attempts: u32,
  delay: Duration,
) -> ToplevelsResult<C::Session> {
  let attempts = attempts.max(1);
  let mut attempt = 1;
  loop {
    match connector.connect() {
      Ok(session) => return Ok(session),
      Err(e) if e.is_retryable() && attempt < attempts => {
        log::warn!("Connect attempt {attempt}/{attempts} failed: {e}, retrying in {delay:?}");
        thread::sleep(delay);
        attempt += 1;
      }
      Err(e) => return Err(e),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::fake::{FakeCompositor, FakeEvent};
  use crate::types::Window;
  use async_broadcast::Receiver;

  fn context(config: SessionConfig) -> (WorkerContext, Receiver<Event>) {
    let (mut tx, rx) = async_broadcast::broadcast(256);
    tx.set_overflow(true);
    let ctx = WorkerContext {
      config,
      ids: Arc::new(IdAllocator::new()),
      events_tx: tx,
    };
    (ctx, rx)
  }

  fn quick_config() -> SessionConfig {
    SessionConfig {
      retry_delay_ms: 0,
      ..SessionConfig::default()
    }
  }

  fn spawn(compositor: &FakeCompositor) -> ToplevelsResult<WorkerHandle> {
    let (ctx, _rx) = context(quick_config());
    WorkerHandle::spawn(compositor.clone(), ctx)
  }

  mod retry_tests {
    use super::*;

    #[test]
    fn retries_connection_failures_until_success() {
      let compositor = FakeCompositor::new().failing_connects(3);
      let session = connect_with_retry(&compositor, 10, Duration::ZERO);
      assert!(session.is_ok());
      assert_eq!(compositor.connect_attempts(), 4);
    }

    #[test]
    fn gives_up_after_configured_attempts() {
      let compositor = FakeCompositor::new().failing_connects(5);
      let result = connect_with_retry(&compositor, 3, Duration::ZERO);
      assert!(matches!(result, Err(ToplevelsError::ConnectionFailed(_))));
      assert_eq!(compositor.connect_attempts(), 3);
    }

    #[test]
    fn missing_manager_is_not_retried() {
      let compositor = FakeCompositor::new().without_manager();
      let result = connect_with_retry(&compositor, 10, Duration::ZERO);
      assert!(matches!(result, Err(ToplevelsError::NoCompositorSupport)));
      assert_eq!(compositor.connect_attempts(), 1);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
      let compositor = FakeCompositor::new();
      assert!(connect_with_retry(&compositor, 0, Duration::ZERO).is_ok());
      assert_eq!(compositor.connect_attempts(), 1);
    }
  }

  mod client_tests {
    use super::*;

    #[test]
    fn refresh_is_queued_once_until_taken() {
      let (client, mut rx, pending) = WorkerClient::detached();
      for _ in 0..5 {
        assert!(client.refresh());
      }
      assert!(matches!(rx.try_recv(), Ok(Request::Refresh)));
      assert!(rx.try_recv().is_err());

      pending.store(false, Ordering::Release);
      assert!(client.refresh());
      assert!(matches!(rx.try_recv(), Ok(Request::Refresh)));
    }

    #[test]
    fn coalesced_refresh_reports_a_gone_worker() {
      let (client, rx, _pending) = WorkerClient::detached();
      assert!(client.refresh());
      drop(rx);
      assert!(!client.refresh());
    }

    #[test]
    fn live_worker_clears_pending_refresh() -> ToplevelsResult<()> {
      let compositor = FakeCompositor::new();
      let worker = spawn(&compositor)?;
      let client = worker.client();

      assert!(client.refresh());
      // Requests are handled in order, so the refresh was taken by now.
      client.snapshot()?;
      assert!(!client.refresh_pending.load(Ordering::Acquire));
      Ok(())
    }
  }

  mod bootstrap_tests {
    use super::*;

    #[test]
    fn existing_windows_are_reconciled_before_spawn_returns() {
      let compositor = FakeCompositor::new();
      compositor.open_window(1, "Editor", "editor.app");

      let (ctx, mut rx) = context(quick_config());
      let worker = WorkerHandle::spawn(compositor.clone(), ctx);
      assert!(worker.is_ok());

      // Already in the registry: the add event was emitted during bootstrap.
      assert!(matches!(rx.try_recv(), Ok(Event::WindowAdded { .. })));
    }

    #[test]
    fn failed_bootstrap_leaves_no_session() {
      let compositor = FakeCompositor::new().without_manager();
      let result = spawn(&compositor);
      assert!(matches!(result, Err(ToplevelsError::NoCompositorSupport)));
      assert_eq!(compositor.sessions_dropped(), 0);
    }

    #[test]
    fn failed_second_sync_drops_session() {
      let compositor = FakeCompositor::new();
      compositor.break_connection();
      let result = spawn(&compositor);
      assert!(matches!(result, Err(ToplevelsError::Transport(_))));
      assert_eq!(compositor.sessions_dropped(), 1);
    }
  }

  mod request_tests {
    use super::*;

    #[test]
    fn snapshot_drains_new_events() -> ToplevelsResult<()> {
      let compositor = FakeCompositor::new();
      let worker = spawn(&compositor)?;
      let client = worker.client();

      assert!(client.snapshot()?.windows.is_empty());
      compositor.open_window(4, "Terminal", "term");
      let snapshot = client.snapshot()?;
      assert_eq!(
        snapshot.windows,
        vec![Window {
          id: WindowId(0),
          title: Some("Terminal".into()),
          app_id: Some("term".into()),
        }]
      );
      assert!(snapshot.seat_available);
      Ok(())
    }

    #[test]
    fn focus_activates_the_window_handle() -> ToplevelsResult<()> {
      let compositor = FakeCompositor::new();
      compositor.open_window(9, "Editor", "editor.app");
      let worker = spawn(&compositor)?;

      worker.client().focus(WindowId(0))?;
      assert_eq!(compositor.activated(), vec![9]);
      Ok(())
    }

    #[test]
    fn focus_unknown_id_is_not_found() -> ToplevelsResult<()> {
      let compositor = FakeCompositor::new();
      let worker = spawn(&compositor)?;
      assert_eq!(
        worker.client().focus(WindowId(5)),
        Err(ToplevelsError::NotFound(WindowId(5)))
      );
      Ok(())
    }

    #[test]
    fn focus_without_seat_checks_seat_first() -> ToplevelsResult<()> {
      let compositor = FakeCompositor::new().without_seat();
      let worker = spawn(&compositor)?;
      // No window 5 either, but the seat is checked before the registry.
      assert_eq!(
        worker.client().focus(WindowId(5)),
        Err(ToplevelsError::NoSeat)
      );
      assert!(compositor.activated().is_empty());
      Ok(())
    }

    #[test]
    fn refresh_failure_keeps_worker_alive() -> ToplevelsResult<()> {
      let compositor = FakeCompositor::new();
      let worker = spawn(&compositor)?;
      let client = worker.client();

      compositor.break_connection();
      assert!(client.refresh());
      assert!(matches!(
        client.snapshot(),
        Err(ToplevelsError::Transport(_))
      ));
      Ok(())
    }

    #[test]
    fn refresh_failures_are_counted_as_one_streak() -> ToplevelsResult<()> {
      let compositor = FakeCompositor::new();
      let (ctx, _rx) = context(quick_config());
      let mut worker = Worker::bootstrap(&compositor, ctx)?;

      compositor.break_connection();
      for _ in 0..3 {
        worker.refresh();
      }
      assert_eq!(worker.refresh_failures, 3);

      compositor.restore_connection();
      worker.refresh();
      assert_eq!(worker.refresh_failures, 0);
      Ok(())
    }

    #[test]
    fn ignored_events_do_not_disturb_registry() -> ToplevelsResult<()> {
      let compositor = FakeCompositor::new();
      compositor.open_window(1, "A", "a");
      let worker = spawn(&compositor)?;
      let client = worker.client();
      let before = client.snapshot()?;

      compositor.emit(FakeEvent::StateChanged(1));
      assert_eq!(client.snapshot()?, before);
      Ok(())
    }
  }

  mod shutdown_tests {
    use super::*;

    #[test]
    fn drop_tears_down_and_disconnects() -> ToplevelsResult<()> {
      let compositor = FakeCompositor::new();
      compositor.open_window(1, "A", "a");
      compositor.emit(FakeEvent::Discovered(2));
      let worker = spawn(&compositor)?;
      let client = worker.client();

      drop(worker);

      let mut released = compositor.released();
      released.sort_unstable();
      assert_eq!(released, vec![1, 2]);
      assert_eq!(compositor.sessions_dropped(), 1);
      assert_eq!(client.snapshot(), Err(ToplevelsError::NotLive));
      assert!(!client.refresh());
      Ok(())
    }

    #[test]
    fn teardown_emits_removals() -> ToplevelsResult<()> {
      let compositor = FakeCompositor::new();
      compositor.open_window(1, "A", "a");
      let (ctx, mut rx) = context(quick_config());
      let worker = WorkerHandle::spawn(compositor.clone(), ctx)?;
      drop(worker);

      assert!(matches!(rx.try_recv(), Ok(Event::WindowAdded { .. })));
      assert_eq!(
        rx.try_recv().ok(),
        Some(Event::WindowRemoved {
          window_id: WindowId(0)
        })
      );
      Ok(())
    }
  }
}
