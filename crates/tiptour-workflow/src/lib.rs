//! tiptour-workflow - record, validate, store and replay guided workflows
//!
//! ```no_run
//! use tiptour_core::prelude::*;
//! use tiptour_workflow::{Player, PlayerConfig, Step, Workflow};
//!
//! let mut page = Page::headless(Document::from_html("<button id=a>A</button>"));
//! let wf = Workflow::new("demo", vec![Step::message("Hi"), Step::click(Selector::css("#a"))]);
//! let mut player = Player::new(&mut page, wf, PlayerConfig::auto())?;
//! let stats = player.run_to_completion(&mut page, 10_000);
//! assert_eq!(stats.clicks, 1);
//! # Ok::<(), tiptour_workflow::WorkflowError>(())
//! ```

pub mod completion;
pub mod config;
pub mod error;
pub mod guide;
pub mod player;
pub mod recorder;
pub mod storage;
pub mod types;
pub mod validate;

pub use completion::{complete_or_fallback, ChatCompletionClient, Completion};
pub use config::{CompletionConfig, PlayerConfig};
pub use error::{Result, WorkflowError};
pub use guide::{CommandHandler, GuideSurface, Tour, TourRegistry, TourStep};
pub use player::{PlayStats, Player, PlayerState};
pub use recorder::{Recorder, RecorderState};
pub use storage::WorkflowStorage;
pub use types::{Mode, Step, StepPayload, StepType, StepUi, Workflow};
pub use validate::{validate, validate_workflow, ValidationResult};

pub mod prelude {
    pub use crate::completion::{Completion, ChatCompletionClient};
    pub use crate::config::{CompletionConfig, PlayerConfig};
    pub use crate::guide::{CommandHandler, GuideSurface, TourRegistry};
    pub use crate::player::{PlayStats, Player, PlayerState};
    pub use crate::recorder::Recorder;
    pub use crate::storage::WorkflowStorage;
    pub use crate::types::{Mode, Step, StepType, Workflow};
    pub use crate::validate::{validate, ValidationResult};
}
