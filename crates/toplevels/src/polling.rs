/*!
Background refresh polling.

Sends `Refresh` to the session worker at a fixed interval so change events
reach subscribers without anyone calling `snapshot()`. Owned by `Toplevels`;
consumers don't interact with this directly.
*/

use crate::core::WorkerClient;
use crate::types::{ToplevelsError, ToplevelsResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLLING_THREAD_NAME: &str = "toplevels-refresh";

/// Handle to control polling lifetime. Stops on drop.
pub(crate) struct PollingHandle {
  stop_signal: Arc<AtomicBool>,
  thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for PollingHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PollingHandle").finish_non_exhaustive()
  }
}

impl PollingHandle {
  fn stop(&self) {
    self.stop_signal.store(true, Ordering::SeqCst);
    if let Some(thread) = &self.thread {
      thread.thread().unpark();
    }
  }
}

impl Drop for PollingHandle {
  fn drop(&mut self) {
    self.stop();
    if let Some(t) = self.thread.take() {
      drop(t.join());
    }
  }
}

pub(crate) fn start_polling(client: WorkerClient, interval: Duration) -> ToplevelsResult<PollingHandle> {
  let stop_signal = Arc::new(AtomicBool::new(false));
  let stop_signal_clone = Arc::clone(&stop_signal);

  let thread = thread::Builder::new()
    .name(POLLING_THREAD_NAME.to_string())
    .spawn(move || {
      while !stop_signal_clone.load(Ordering::SeqCst) {
        let deadline = Instant::now() + interval;

        if !client.refresh() {
          log::debug!("Session worker gone, refresh polling stops");
          break;
        }

        // Parked so `stop()` can cut the wait short.
        while !stop_signal_clone.load(Ordering::SeqCst) {
          let now = Instant::now();
          if now >= deadline {
            break;
          }
          thread::park_timeout(deadline - now);
        }
      }
    })
    .map_err(|e| ToplevelsError::Internal(format!("failed to spawn refresh thread: {e}")))?;

  Ok(PollingHandle {
    stop_signal,
    thread: Some(thread),
  })
}
