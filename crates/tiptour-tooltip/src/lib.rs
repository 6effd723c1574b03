//! tiptour-tooltip - a tooltip that follows the pointer with smoothing
//!
//! ```no_run
//! use tiptour_core::prelude::*;
//! use tiptour_tooltip::{TooltipConfig, TooltipController};
//!
//! let mut page = Page::headless(Document::from_html("<button id=go>Go</button>"));
//! let mut tip = TooltipController::new(&mut page, TooltipConfig::default().with_arrow())?;
//! tip.set_content(&mut page, "Click <b>Go</b>");
//! tip.add_arrow(&mut page, &["#go"][..]);
//! page.pointer_move(Point::new(120.0, 80.0));
//! EventLoop::new().run_for(&mut page, &mut [&mut tip], 500);
//! # Ok::<(), tiptour_core::Error>(())
//! ```

pub mod arrow;
pub mod config;
pub mod controller;
pub mod overlay;

pub use arrow::ArrowPose;
pub use config::{ArrowConfig, TooltipConfig};
pub use controller::{ArrowTargets, TooltipController, TooltipState};
pub use overlay::{HoverTracker, TipContent};
