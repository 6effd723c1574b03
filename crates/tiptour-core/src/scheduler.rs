//! Timers and animation frames behind an injectable scheduler
//!
//! Frames are one-shot and fire on the next frame boundary, like
//! `requestAnimationFrame`. Timers fire `ms` after they were set. Wakes with
//! equal deadlines come out in the order they were requested.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::thread;
use std::time::{Duration, Instant};

/// Milliseconds since the clock's origin.
pub type Millis = u64;

pub const FRAME_INTERVAL_MS: Millis = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Token(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakeKind {
    Frame,
    Timer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wake {
    pub token: Token,
    pub kind: WakeKind,
    pub at: Millis,
}

pub trait Clock {
    fn now(&self) -> Millis;
    /// Moves the clock forward to `t`. Never moves backwards.
    fn advance_to(&mut self, t: Millis);
}

/// Virtual time, only moved by `advance_to`.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Millis,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        self.now
    }

    fn advance_to(&mut self, t: Millis) {
        self.now = self.now.max(t);
    }
}

/// Wall time; `advance_to` sleeps until the target instant.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }

    fn advance_to(&mut self, t: Millis) {
        let now = self.now();
        if t > now {
            thread::sleep(Duration::from_millis(t - now));
        }
    }
}

pub trait Scheduler {
    fn now(&self) -> Millis;
    fn request_frame(&mut self) -> Token;
    fn set_timeout(&mut self, ms: Millis) -> Token;
    /// Cancelling an unknown or already fired token is a no-op.
    fn cancel(&mut self, token: Token);
    fn is_pending(&self, token: Token) -> bool;
    fn next_deadline(&self) -> Option<Millis>;
    /// Removes and returns the earliest wake whose deadline has passed.
    fn pop_due(&mut self) -> Option<Wake>;
    fn advance_to(&mut self, t: Millis);
}

#[derive(Debug, Clone)]
pub struct TimerQueue<C: Clock> {
    clock: C,
    frame_interval: Millis,
    next_token: u64,
    queue: BTreeMap<(Millis, Token), WakeKind>,
    deadlines: HashMap<Token, Millis>,
}

impl<C: Clock> TimerQueue<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            frame_interval: FRAME_INTERVAL_MS,
            next_token: 0,
            queue: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn with_frame_interval(mut self, ms: Millis) -> Self {
        self.frame_interval = ms.max(1);
        self
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn schedule(&mut self, at: Millis, kind: WakeKind) -> Token {
        self.next_token += 1;
        let token = Token(self.next_token);
        self.queue.insert((at, token), kind);
        self.deadlines.insert(token, at);
        token
    }
}

impl TimerQueue<ManualClock> {
    /// Virtual-time queue starting at 0.
    pub fn manual() -> Self {
        Self::new(ManualClock::new())
    }
}

impl TimerQueue<SystemClock> {
    pub fn system() -> Self {
        Self::new(SystemClock::new())
    }
}

impl<C: Clock> Scheduler for TimerQueue<C> {
    fn now(&self) -> Millis {
        self.clock.now()
    }

    fn request_frame(&mut self) -> Token {
        let now = self.clock.now();
        let at = (now / self.frame_interval + 1) * self.frame_interval;
        self.schedule(at, WakeKind::Frame)
    }

    fn set_timeout(&mut self, ms: Millis) -> Token {
        let at = self.clock.now().saturating_add(ms);
        self.schedule(at, WakeKind::Timer)
    }

    fn cancel(&mut self, token: Token) {
        if let Some(at) = self.deadlines.remove(&token) {
            self.queue.remove(&(at, token));
        }
    }

    fn is_pending(&self, token: Token) -> bool {
        self.deadlines.contains_key(&token)
    }

    fn next_deadline(&self) -> Option<Millis> {
        self.queue.keys().next().map(|(at, _)| *at)
    }

    fn pop_due(&mut self) -> Option<Wake> {
        let now = self.clock.now();
        let (&(at, token), _) = self.queue.iter().next().filter(|((at, _), _)| *at <= now)?;
        let kind = self.queue.remove(&(at, token))?;
        self.deadlines.remove(&token);
        Some(Wake { token, kind, at })
    }

    fn advance_to(&mut self, t: Millis) {
        self.clock.advance_to(t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timers_fire_in_deadline_order() {
        let mut q = TimerQueue::manual();
        let late = q.set_timeout(50);
        let early = q.set_timeout(10);
        assert_eq!(q.next_deadline(), Some(10));
        assert!(q.pop_due().is_none());

        q.advance_to(60);
        assert_eq!(q.pop_due().map(|w| w.token), Some(early));
        assert_eq!(q.pop_due().map(|w| w.token), Some(late));
        assert!(q.pop_due().is_none());
    }

    #[test]
    fn equal_deadlines_keep_request_order() {
        let mut q = TimerQueue::manual();
        let a = q.set_timeout(0);
        let b = q.set_timeout(0);
        assert_eq!(q.pop_due().map(|w| w.token), Some(a));
        assert_eq!(q.pop_due().map(|w| w.token), Some(b));
    }

    #[test]
    fn frames_land_on_next_boundary() {
        let mut q = TimerQueue::manual();
        q.request_frame();
        assert_eq!(q.next_deadline(), Some(16));

        q.advance_to(16);
        let wake = q.pop_due().unwrap();
        assert_eq!(wake.kind, WakeKind::Frame);
        q.request_frame();
        assert_eq!(q.next_deadline(), Some(32));
    }

    #[test]
    fn cancel_removes_wake() {
        let mut q = TimerQueue::manual();
        let t = q.set_timeout(5);
        assert!(q.is_pending(t));
        q.cancel(t);
        q.cancel(t);
        assert!(!q.is_pending(t));
        assert_eq!(q.next_deadline(), None);
        q.advance_to(10);
        assert!(q.pop_due().is_none());
    }

    #[test]
    fn manual_clock_never_goes_back() {
        let mut clock = ManualClock::new();
        clock.advance_to(100);
        clock.advance_to(40);
        assert_eq!(clock.now(), 100);
    }
}
