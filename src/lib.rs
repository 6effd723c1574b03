//! # tiptour
//!
//! A tooltip that follows the pointer with smoothing, finds page elements
//! again from recorded selectors, and guides users through recordable,
//! replayable workflows.
//!
//! ## Features
//!
//! - **Smoothing**: dead-zone cursor smoothing with friction
//! - **Tooltip**: pointer-following tooltip with arrow, inline input and edge flipping
//! - **Targeting**: stable selectors with a text fallback
//! - **Workflows**: record clicks, validate, store and replay in guide or auto mode
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tiptour::prelude::*;
//!
//! let mut page = Page::headless(Document::from_html(r#"<button id="go">Go</button>"#));
//!
//! // Recording
//! let mut recorder = Recorder::new();
//! recorder.start();
//! let go = page.document().get_element_by_id("go").unwrap();
//! page.click(go);
//! EventLoop::new().run_until_idle(&mut page, &mut [&mut recorder]);
//! let workflow = recorder.get_workflow("go", Some("Press go"));
//!
//! // Replay
//! let mut player = Player::new(&mut page, workflow, PlayerConfig::auto())?;
//! let stats = player.run_to_completion(&mut page, 10_000);
//! println!("{} clicks", stats.clicks);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub use tiptour_core::*;

pub use tiptour_tooltip as tooltip;
pub use tiptour_workflow as workflow;

pub use tiptour_tooltip::{ArrowConfig, HoverTracker, TooltipConfig, TooltipController};
pub use tiptour_workflow::{
    validate, CommandHandler, Player, PlayerConfig, Recorder, Step, TourRegistry, Workflow,
    WorkflowError, WorkflowStorage,
};

/// Prelude - import everything you need
pub mod prelude {
    pub use tiptour_core::prelude::*;
    pub use tiptour_tooltip::{HoverTracker, TooltipConfig, TooltipController};
    pub use tiptour_workflow::prelude::*;
}
