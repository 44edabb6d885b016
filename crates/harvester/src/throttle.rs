//! Politeness interval shared by every request a component sends.
//!
//! A [`Throttle`] keeps one interval of quiet time after each request completes, across all of
//! its holders. [`Throttle::wait`] hands out a [`ThrottlePermit`] for the request; the interval
//! is counted from the moment that permit is dropped, so a slow transfer never eats into the
//! pause before the next one. Request starts are also spaced by the interval, which keeps a
//! pool of workers sharing one `Arc<Throttle>` at the same aggregate rate as a single worker.

use std::sync::{Mutex as SyncMutex, PoisonError};

use tokio::{
  sync::Mutex,
  time::{sleep_until, Instant},
};

use super::*;

/// Aggregate politeness interval between requests.
#[derive(Debug)]
pub struct Throttle {
  /// Quiet time after each request, and minimum spacing of request starts
  interval: Duration,
  /// Queues callers of [`Throttle::wait`] in arrival order
  turn:     Mutex<()>,
  /// Earliest instant the next request may start
  next:     SyncMutex<Option<Instant>>,
}

/// Held for the duration of one request. Dropping it starts the quiet interval.
#[derive(Debug)]
#[must_use = "the interval is counted from when the permit is dropped"]
pub struct ThrottlePermit<'a> {
  /// The throttle to release
  throttle: &'a Throttle,
}

impl Throttle {
  /// Creates a throttle with the given interval. A zero interval never waits.
  pub fn new(interval: Duration) -> Self {
    Self { interval, turn: Mutex::new(()), next: SyncMutex::new(None) }
  }

  /// The configured interval.
  pub fn interval(&self) -> Duration { self.interval }

  /// Waits until a request may start and returns the permit covering it.
  ///
  /// Concurrent callers are released one at a time in the order they arrived.
  pub async fn wait(&self) -> ThrottlePermit<'_> {
    let permit = ThrottlePermit { throttle: self };
    if self.interval.is_zero() {
      return permit;
    }
    let _turn = self.turn.lock().await;
    // A request finishing while we sleep can push the slot further out.
    while let Some(at) = self.next_slot().filter(|at| *at > Instant::now()) {
      trace!("Throttling for {:?}", at - Instant::now());
      sleep_until(at).await;
    }
    self.push_next(Instant::now() + self.interval);
    permit
  }

  /// The reserved start of the next request.
  fn next_slot(&self) -> Option<Instant> {
    *self.next.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Moves the next slot to `at` unless it is already later.
  fn push_next(&self, at: Instant) {
    let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
    if next.map_or(true, |current| current < at) {
      *next = Some(at);
    }
  }
}

impl Drop for ThrottlePermit<'_> {
  fn drop(&mut self) {
    if !self.throttle.interval.is_zero() {
      self.throttle.push_next(Instant::now() + self.throttle.interval);
    }
  }
}
