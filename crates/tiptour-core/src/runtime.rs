//! Single-threaded event loop driving components against a [`Page`]

use crate::event::{EventSource, HostEvent};
use crate::page::Page;
use crate::scheduler::{Millis, Wake};

/// Upper bound on turns processed without the clock moving.
const MAX_TURNS_PER_INSTANT: usize = 10_000;

/// A component that reacts to host events and to its own timers/frames.
///
/// Every driver sees every event and every wake; drivers ignore tokens they
/// did not request.
pub trait Driver {
    fn on_event(&mut self, page: &mut Page, event: &HostEvent);
    fn on_wake(&mut self, page: &mut Page, wake: &Wake);

    /// A finished driver ends [`EventLoop::run_until`] early.
    fn finished(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Event,
    Wake,
    Idle,
}

#[derive(Debug, Default)]
pub struct EventLoop {
    source: Option<EventSource>,
    max_step: Option<Millis>,
    turns: u64,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pulls events from an external stream before every turn.
    pub fn with_source(mut self, source: EventSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Caps how far the clock jumps at once, so a wall-clock loop keeps
    /// polling its source while waiting for a distant deadline.
    pub fn with_max_step(mut self, ms: Millis) -> Self {
        self.max_step = Some(ms.max(1));
        self
    }

    pub fn turns(&self) -> u64 {
        self.turns
    }

    /// Delivers the oldest pending event, otherwise the earliest due wake.
    pub fn turn(&mut self, page: &mut Page, drivers: &mut [&mut dyn Driver]) -> Turn {
        if let Some(source) = &self.source {
            for event in source.drain() {
                page.dispatch(event);
            }
        }

        if let Some(event) = page.next_event() {
            self.turns += 1;
            tracing::trace!("event {}", event.kind());
            for driver in drivers.iter_mut() {
                driver.on_event(page, &event);
            }
            return Turn::Event;
        }

        if let Some(wake) = page.scheduler_mut().pop_due() {
            self.turns += 1;
            for driver in drivers.iter_mut() {
                driver.on_wake(page, &wake);
            }
            return Turn::Wake;
        }

        Turn::Idle
    }

    /// Processes everything due at the current instant. Returns the number
    /// of turns taken.
    pub fn run_until_idle(&mut self, page: &mut Page, drivers: &mut [&mut dyn Driver]) -> usize {
        let mut n = 0;
        while !page.has_navigated() && self.turn(page, drivers) != Turn::Idle {
            n += 1;
            if n >= MAX_TURNS_PER_INSTANT {
                tracing::warn!("event loop made no progress in time after {} turns", n);
                break;
            }
        }
        n
    }

    /// Runs for `ms` of clock time, advancing deadline by deadline. Stops
    /// early if the page navigates.
    pub fn run_for(&mut self, page: &mut Page, drivers: &mut [&mut dyn Driver], ms: Millis) {
        let horizon = page.now().saturating_add(ms);
        self.run_until(page, drivers, horizon, |_| false);
    }

    /// Runs until `done` holds, a driver reports itself finished, the page
    /// navigates, or the clock reaches `horizon`.
    pub fn run_until(
        &mut self,
        page: &mut Page,
        drivers: &mut [&mut dyn Driver],
        horizon: Millis,
        mut done: impl FnMut(&Page) -> bool,
    ) {
        loop {
            self.run_until_idle(page, drivers);
            if page.has_navigated() || done(page) || drivers.iter().any(|d| d.finished()) {
                return;
            }
            let now = page.now();
            if now >= horizon {
                return;
            }
            let mut next = page
                .scheduler()
                .next_deadline()
                .map_or(horizon, |t| t.min(horizon))
                .max(now);
            if let Some(step) = self.max_step {
                next = next.min(now + step);
            }
            if next == now {
                // Due wakes were cut off by the turn cap; move on.
                next = now + 1;
            }
            page.scheduler_mut().advance_to(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::event::event_channel;
    use crate::scheduler::Token;

    /// Counts events and re-arms a timer a fixed number of times.
    #[derive(Default)]
    struct Ticker {
        events: Vec<String>,
        timer: Option<Token>,
        fired_at: Vec<Millis>,
        remaining: usize,
    }

    impl Driver for Ticker {
        fn on_event(&mut self, _page: &mut Page, event: &HostEvent) {
            self.events.push(event.kind().to_string());
        }

        fn on_wake(&mut self, page: &mut Page, wake: &Wake) {
            if Some(wake.token) != self.timer {
                return;
            }
            self.fired_at.push(wake.at);
            self.timer = None;
            if self.remaining > 0 {
                self.remaining -= 1;
                self.timer = Some(page.scheduler_mut().set_timeout(100));
            }
        }
    }

    #[test]
    fn events_before_wakes() {
        let mut page = Page::headless(Document::new());
        let mut ticker = Ticker::default();
        ticker.timer = Some(page.scheduler_mut().set_timeout(0));
        page.key_down("a");

        let mut lp = EventLoop::new();
        assert_eq!(lp.turn(&mut page, &mut [&mut ticker]), Turn::Event);
        assert_eq!(lp.turn(&mut page, &mut [&mut ticker]), Turn::Wake);
        assert_eq!(lp.turn(&mut page, &mut [&mut ticker]), Turn::Idle);
    }

    #[test]
    fn run_for_advances_through_deadlines() {
        let mut page = Page::headless(Document::new());
        let mut ticker = Ticker {
            remaining: 3,
            ..Ticker::default()
        };
        ticker.timer = Some(page.scheduler_mut().set_timeout(100));

        EventLoop::new().run_for(&mut page, &mut [&mut ticker], 250);
        assert_eq!(ticker.fired_at, vec![100, 200]);
        assert_eq!(page.now(), 250);

        EventLoop::new().run_for(&mut page, &mut [&mut ticker], 1000);
        assert_eq!(ticker.fired_at, vec![100, 200, 300, 400]);
    }

    #[test]
    fn source_events_are_pulled_in() {
        let (sink, source) = event_channel();
        let mut page = Page::headless(Document::new());
        let mut ticker = Ticker::default();
        sink.send(HostEvent::KeyDown {
            target: None,
            key: "x".into(),
        })
        .unwrap();

        let mut lp = EventLoop::new().with_source(source);
        lp.run_until_idle(&mut page, &mut [&mut ticker]);
        assert_eq!(ticker.events, vec!["keyDown"]);
    }

    #[test]
    fn navigation_stops_the_loop() {
        let mut page = Page::headless(Document::new());
        let mut ticker = Ticker {
            remaining: 100,
            ..Ticker::default()
        };
        ticker.timer = Some(page.scheduler_mut().set_timeout(10));
        page.navigate("https://example.com");

        EventLoop::new().run_for(&mut page, &mut [&mut ticker], 1000);
        assert!(ticker.fired_at.is_empty());
    }
}
