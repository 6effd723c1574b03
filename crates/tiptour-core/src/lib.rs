//! tiptour-core - pointer smoothing and element targeting for cursor-following tooltips
//!
//! Everything runs on one thread against an injected [`Page`]: an in-memory
//! document, a scheduler for frames and timers, and a queue of host events.
//! Components implement [`Driver`] and are pumped by an [`EventLoop`], so the
//! same code runs on virtual time in tests and on wall time in the CLI.

pub mod css;
pub mod cursor;
pub mod dom;
pub mod error;
pub mod event;
pub mod html;
pub mod page;
pub mod point;
pub mod runtime;
pub mod scheduler;
pub mod selector;

pub use cursor::{CursorConfig, SmoothCursor, UpdateOptions};
pub use dom::{Document, NodeId, Rect};
pub use error::{Error, ErrorCode, Result};
pub use event::{event_channel, EventSink, EventSource, HostEvent};
pub use page::{Notification, Page, Viewport};
pub use point::{Easing, Point};
pub use runtime::{Driver, EventLoop, Turn};
pub use scheduler::{Millis, Scheduler, TimerQueue, Token, Wake, WakeKind};
pub use selector::{build_selector, query_selector_best, Selector};

pub mod prelude {
    pub use crate::cursor::{CursorConfig, SmoothCursor, UpdateOptions};
    pub use crate::dom::{Document, NodeId, Rect};
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::event::HostEvent;
    pub use crate::page::Page;
    pub use crate::point::Point;
    pub use crate::runtime::{Driver, EventLoop};
    pub use crate::scheduler::{Millis, Scheduler};
    pub use crate::selector::{build_selector, query_selector_best, Selector};
}
