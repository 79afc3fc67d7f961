//! Async hooks that batch (debounce) incoming events.

use std::time::Duration;

use futures_executor::block_on;
use tokio::{
  sync::mpsc::{
    self,
    Sender,
    error::TrySendError,
  },
  time::Instant,
};

/// Channel capacity used unless a hook overrides [`AsyncHook::capacity`].
pub const DEFAULT_CAPACITY: usize = 256;

/// Longest a synchronous sender blocks on a full channel before dropping
/// the event.
const SEND_TIMEOUT_MS: u64 = 2;

/// A hook runs as a background tokio task and receives its events through a
/// channel. Each event may be handled right away or deferred until a
/// deadline, at which point [`finish_debounce`](AsyncHook::finish_debounce)
/// runs.
pub trait AsyncHook: Sync + Send + 'static + Sized {
  type Event: Sync + Send + 'static;

  /// Called for every received event with the current deadline, if any.
  /// Returns the deadline to wait for next; `None` means nothing is
  /// pending.
  fn handle_event(&mut self, event: Self::Event, timeout: Option<Instant>) -> Option<Instant>;

  /// Called once the deadline passes, and once more if the channel closes
  /// while a deadline is pending.
  fn finish_debounce(&mut self);

  fn capacity(&self) -> usize {
    DEFAULT_CAPACITY
  }

  /// Starts the hook on the current tokio runtime. Outside a runtime nothing
  /// is spawned and the returned sender is already closed.
  fn spawn(self) -> mpsc::Sender<Self::Event> {
    let (tx, rx) = mpsc::channel(self.capacity().max(1));
    if tokio::runtime::Handle::try_current().is_ok() {
      tokio::spawn(run(self, rx));
    } else {
      log::debug!("no tokio runtime, async hook not started");
    }
    tx
  }
}

async fn run<Hook: AsyncHook>(mut hook: Hook, mut rx: mpsc::Receiver<Hook::Event>) {
  let mut deadline = None;
  loop {
    let event = match deadline {
      Some(deadline_) => {
        match tokio::time::timeout_at(deadline_, rx.recv()).await {
          Ok(event) => event,
          Err(_) => {
            hook.finish_debounce();
            deadline = None;
            continue;
          },
        }
      },
      None => rx.recv().await,
    };
    let Some(event) = event else {
      if deadline.is_some() {
        hook.finish_debounce();
      }
      break;
    };
    deadline = hook.handle_event(event, deadline);
  }
}

/// Sends from synchronous code, blocking for at most a couple of
/// milliseconds when the channel is full. Returns whether the event was
/// delivered.
pub fn send_blocking<T>(tx: &Sender<T>, data: T) -> bool {
  match tx.try_send(data) {
    Ok(()) => true,
    Err(TrySendError::Full(data)) => {
      let sent = block_on(tx.send_timeout(data, Duration::from_millis(SEND_TIMEOUT_MS))).is_ok();
      if !sent {
        log::warn!("async hook channel full, dropping event");
      }
      sent
    },
    Err(TrySendError::Closed(_)) => {
      log::warn!("attempted to send to closed channel");
      false
    },
  }
}

/// Sends without blocking. Returns false if the channel was full or closed.
pub fn try_send<T>(tx: &Sender<T>, data: T) -> bool {
  tx.try_send(data).is_ok()
}
