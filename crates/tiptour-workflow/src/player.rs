//! Workflow player
//!
//! Runs steps strictly in order on the page's event loop. Steps that need to
//! wait (grace periods, polling, a guided click) park the player until the
//! matching timer or event arrives; everything else completes in the same
//! turn and the next step starts immediately.

use crate::config::PlayerConfig;
use crate::error::{Result, WorkflowError};
use crate::types::{Mode, Step, StepType, Workflow};
use crate::validate::validate_workflow;
use crossbeam_channel::{unbounded, Receiver};
use serde::Serialize;
use tiptour_core::prelude::*;
use tiptour_core::{Token, Wake, WakeKind};
use tiptour_tooltip::TooltipController;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    #[default]
    Idle,
    Playing,
    Finished,
    Stopped,
    /// A `navigate` step left the page; later steps did not run.
    Navigated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayStats {
    pub messages: usize,
    pub clicks: usize,
    pub inputs: usize,
    pub waits: usize,
    pub timeouts: usize,
    /// Click and input steps whose target could not be resolved.
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waiting {
    Nothing,
    Timer(Token),
    /// A user click on the element, guide mode.
    Click(NodeId),
    /// Delivery of the click the player synthesized itself.
    AutoClick(NodeId),
    Poll {
        token: Token,
        started: Millis,
        timeout: Millis,
    },
}

pub struct Player {
    workflow: Workflow,
    config: PlayerConfig,
    tooltip: TooltipController,
    state: PlayerState,
    index: usize,
    waiting: Waiting,
    stats: PlayStats,
    submissions: Receiver<String>,
}

impl Player {
    /// Validates `workflow` and attaches the player's tooltip to the page.
    /// The tooltip always has its arrow enabled.
    pub fn new(page: &mut Page, workflow: Workflow, config: PlayerConfig) -> Result<Self> {
        let report = validate_workflow(&workflow);
        if !report.ok {
            return Err(WorkflowError::Invalid(report.errors));
        }

        let mut tooltip = TooltipController::new(page, config.tooltip.clone().with_arrow())?;
        let (tx, submissions) = unbounded();
        if config.include_input {
            tooltip.add_input(page, &config.input_placeholder, move |value| {
                if tx.send(value).is_err() {
                    tracing::trace!("input submission dropped, no receiver");
                }
            });
        }

        Ok(Self {
            workflow,
            config,
            tooltip,
            state: PlayerState::Idle,
            index: 0,
            waiting: Waiting::Nothing,
            stats: PlayStats::default(),
            submissions,
        })
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn stats(&self) -> &PlayStats {
        &self.stats
    }

    /// Index of the step in progress while playing.
    pub fn current_step(&self) -> Option<usize> {
        (self.state == PlayerState::Playing).then_some(self.index)
    }

    pub fn tooltip(&self) -> &TooltipController {
        &self.tooltip
    }

    pub fn tooltip_mut(&mut self) -> &mut TooltipController {
        &mut self.tooltip
    }

    /// Values submitted through the tooltip input, if enabled.
    pub fn submissions(&self) -> &Receiver<String> {
        &self.submissions
    }

    /// Starts from the first step. Ignored while already playing or after
    /// the tooltip was torn down by [`stop`](Self::stop).
    pub fn play(&mut self, page: &mut Page) {
        if matches!(self.state, PlayerState::Playing | PlayerState::Stopped) {
            return;
        }
        tracing::debug!(
            "playing {} ({} steps)",
            self.workflow.display_name(),
            self.workflow.steps.len()
        );
        self.state = PlayerState::Playing;
        self.index = 0;
        self.stats = PlayStats::default();
        self.run_steps(page);
    }

    /// Abandons the current step and destroys the tooltip.
    pub fn stop(&mut self, page: &mut Page) {
        self.cancel_wait(page);
        self.tooltip.destroy(page);
        if self.state != PlayerState::Stopped {
            tracing::debug!("player stopped at step {}", self.index);
        }
        self.state = PlayerState::Stopped;
    }

    /// Plays and drives a fresh event loop until the workflow finishes,
    /// navigates, is stopped, or `limit` ms of clock time pass.
    pub fn run_to_completion(&mut self, page: &mut Page, limit: Millis) -> PlayStats {
        self.run_with(&mut EventLoop::new(), page, limit)
    }

    /// Like [`run_to_completion`](Self::run_to_completion) on a caller's loop,
    /// e.g. one fed by an external event source.
    pub fn run_with(&mut self, lp: &mut EventLoop, page: &mut Page, limit: Millis) -> PlayStats {
        self.play(page);
        let horizon = page.now().saturating_add(limit);
        lp.run_until(page, &mut [&mut *self], horizon, |_| false);
        if self.state == PlayerState::Playing {
            tracing::warn!(
                "{} still at step {} after {} ms",
                self.workflow.display_name(),
                self.index,
                limit
            );
        }
        self.stats.clone()
    }

    fn cancel_wait(&mut self, page: &mut Page) {
        match std::mem::replace(&mut self.waiting, Waiting::Nothing) {
            Waiting::Timer(token) | Waiting::Poll { token, .. } => page.scheduler_mut().cancel(token),
            Waiting::Click(_) | Waiting::AutoClick(_) | Waiting::Nothing => {}
        }
    }

    /// Runs steps until one has to wait or the workflow ends.
    fn run_steps(&mut self, page: &mut Page) {
        while self.state == PlayerState::Playing {
            let Some(step) = self.workflow.steps.get(self.index).cloned() else {
                self.finish(page);
                return;
            };
            tracing::debug!("step {} {}", self.index, step.kind.as_str());
            self.run_step(page, &step);
            if self.waiting != Waiting::Nothing || self.state != PlayerState::Playing {
                return;
            }
            self.index += 1;
        }
    }

    fn advance(&mut self, page: &mut Page) {
        self.waiting = Waiting::Nothing;
        self.index += 1;
        self.run_steps(page);
    }

    fn finish(&mut self, page: &mut Page) {
        self.tooltip.hide(page);
        self.state = PlayerState::Finished;
        tracing::debug!("{} finished: {:?}", self.workflow.display_name(), self.stats);
    }

    fn mode(&self, step: &Step) -> Mode {
        step.mode.unwrap_or(self.config.mode)
    }

    fn wait_ms(&mut self, page: &mut Page, ms: Millis) {
        self.waiting = Waiting::Timer(page.scheduler_mut().set_timeout(ms));
    }

    fn show_step(&mut self, page: &mut Page, step: &Step) {
        self.tooltip.set_content(page, step.content());
        let targets = step.arrow_targets();
        if !targets.is_empty() {
            self.tooltip.add_arrow(page, targets);
        }
        self.tooltip.show(page);
    }

    fn resolve(&self, page: &Page, step: &Step) -> Option<NodeId> {
        let selector = step.selector.as_ref()?;
        let found = query_selector_best(page.document(), selector);
        if found.is_none() {
            tracing::warn!("step {}: nothing matches {}", self.index, selector);
        }
        found
    }

    fn run_step(&mut self, page: &mut Page, step: &Step) {
        match step.kind {
            StepType::Message => {
                self.show_step(page, step);
                self.stats.messages += 1;
                self.wait_ms(page, self.config.message_grace_ms);
            }
            StepType::Click => {
                self.show_step(page, step);
                let Some(el) = self.resolve(page, step) else {
                    self.stats.skipped += 1;
                    return;
                };
                match self.mode(step) {
                    Mode::Auto => {
                        page.click(el);
                        self.stats.clicks += 1;
                        self.waiting = Waiting::AutoClick(el);
                    }
                    Mode::Guide => self.waiting = Waiting::Click(el),
                }
            }
            StepType::Input => {
                self.show_step(page, step);
                let Some(el) = self.resolve(page, step) else {
                    self.stats.skipped += 1;
                    return;
                };
                self.stats.inputs += 1;
                match self.mode(step) {
                    Mode::Auto => {
                        page.focus(el);
                        page.set_input_value(el, step.value());
                    }
                    // The typed value is not checked.
                    Mode::Guide => self.wait_ms(page, self.config.input_grace_ms),
                }
            }
            StepType::WaitFor => {
                self.stats.waits += 1;
                let timeout = step
                    .timeout
                    .filter(|t| *t > 0)
                    .unwrap_or(self.config.wait_timeout_ms);
                let now = page.now();
                self.poll(page, now, timeout);
            }
            StepType::Navigate => {
                if let Some(url) = step.url() {
                    let url = url.to_string();
                    page.navigate(&url);
                    self.stats.navigation = Some(url);
                    self.state = PlayerState::Navigated;
                }
            }
        }
    }

    /// One `waitFor` check. Re-arms itself until the selector resolves or
    /// the timeout has elapsed.
    fn poll(&mut self, page: &mut Page, started: Millis, timeout: Millis) {
        let elapsed = page.now().saturating_sub(started);
        if elapsed >= timeout {
            tracing::debug!("step {}: waitFor timed out after {} ms", self.index, elapsed);
            self.stats.timeouts += 1;
            self.waiting = Waiting::Nothing;
            return;
        }
        let found = self
            .workflow
            .steps
            .get(self.index)
            .and_then(|s| s.selector.as_ref())
            .and_then(|sel| query_selector_best(page.document(), sel));
        if found.is_some() {
            self.waiting = Waiting::Nothing;
            return;
        }
        let token = page.scheduler_mut().set_timeout(self.config.poll_interval_ms);
        self.waiting = Waiting::Poll {
            token,
            started,
            timeout,
        };
    }

    fn on_click(&mut self, page: &mut Page, target: NodeId, path: &[NodeId]) {
        match self.waiting {
            // Advance only once the synthesized click has been delivered.
            Waiting::AutoClick(el) if target == el => self.advance(page),
            Waiting::Click(el) if target == el || path.contains(&el) => {
                self.stats.clicks += 1;
                self.advance(page);
            }
            _ => {}
        }
    }

    fn on_timer(&mut self, page: &mut Page, token: Token) {
        match self.waiting {
            Waiting::Timer(t) if t == token => self.advance(page),
            Waiting::Poll {
                token: t,
                started,
                timeout,
            } if t == token => {
                self.poll(page, started, timeout);
                if self.waiting == Waiting::Nothing {
                    self.advance(page);
                }
            }
            _ => {}
        }
    }
}

impl Driver for Player {
    fn on_event(&mut self, page: &mut Page, event: &HostEvent) {
        self.tooltip.on_event(page, event);
        if self.state != PlayerState::Playing {
            return;
        }
        if let HostEvent::Click { target, path } = event {
            self.on_click(page, *target, path);
        }
    }

    fn on_wake(&mut self, page: &mut Page, wake: &Wake) {
        self.tooltip.on_wake(page, wake);
        if self.state == PlayerState::Playing && wake.kind == WakeKind::Timer {
            self.on_timer(page, wake.token);
        }
    }

    fn finished(&self) -> bool {
        matches!(
            self.state,
            PlayerState::Finished | PlayerState::Stopped | PlayerState::Navigated
        )
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("workflow", &self.workflow.id)
            .field("state", &self.state)
            .field("index", &self.index)
            .field("waiting", &self.waiting)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiptour_core::Selector;

    fn page() -> Page {
        Page::headless(Document::from_html(
            r#"<button id="a">A</button>
               <form><input name="email"><button id="send"><span>Send</span></button></form>
               <div id="slot"></div>"#,
        ))
    }

    /// Records every click the page delivers.
    #[derive(Default)]
    struct Clicks(Vec<NodeId>);

    impl Driver for Clicks {
        fn on_event(&mut self, _page: &mut Page, event: &HostEvent) {
            if let HostEvent::Click { target, .. } = event {
                self.0.push(*target);
            }
        }

        fn on_wake(&mut self, _page: &mut Page, _wake: &Wake) {}
    }

    fn run(player: &mut Player, page: &mut Page, clicks: &mut Clicks, ms: Millis) {
        EventLoop::new().run_for(page, &mut [player, clicks], ms);
    }

    #[test]
    fn auto_workflow_completes_without_user() {
        let mut page = page();
        let a = page.document().get_element_by_id("a").unwrap();
        let wf = Workflow::new(
            "w",
            vec![Step::message("Welcome"), Step::click(Selector::css("#a"))],
        );
        let mut player = Player::new(&mut page, wf, PlayerConfig::auto()).unwrap();
        let mut clicks = Clicks::default();

        player.play(&mut page);
        assert_eq!(player.current_step(), Some(0));
        assert!(player.tooltip().is_visible());
        assert_eq!(player.tooltip().state().content, "Welcome");

        run(&mut player, &mut page, &mut clicks, 1500);
        assert_eq!(player.state(), PlayerState::Finished);
        assert_eq!(clicks.0, vec![a]);
        assert_eq!(player.stats().messages, 1);
        assert_eq!(player.stats().clicks, 1);
        assert!(!player.tooltip().is_visible());
        assert!(!player.tooltip().is_destroyed());
    }

    #[test]
    fn auto_click_is_not_taken_for_the_next_guide_click() {
        let mut page = page();
        let a = page.document().get_element_by_id("a").unwrap();
        let wf = Workflow::new(
            "w",
            vec![
                Step::click(Selector::css("#a")).with_mode(Mode::Auto),
                Step::click(Selector::css("#a")),
            ],
        );
        let mut player = Player::new(&mut page, wf, PlayerConfig::default()).unwrap();
        let mut clicks = Clicks::default();

        player.play(&mut page);
        assert_eq!(player.current_step(), Some(0));
        run(&mut player, &mut page, &mut clicks, 1000);
        assert_eq!(player.state(), PlayerState::Playing);
        assert_eq!(player.current_step(), Some(1));
        assert_eq!(player.stats().clicks, 1);
        assert_eq!(clicks.0, vec![a]);

        page.click(a);
        run(&mut player, &mut page, &mut clicks, 100);
        assert_eq!(player.state(), PlayerState::Finished);
        assert_eq!(player.stats().clicks, 2);
    }

    #[test]
    fn guide_click_waits_for_the_user() {
        let mut page = page();
        let send = page.document().get_element_by_id("send").unwrap();
        let span = page.document().query_selector("#send span").unwrap().unwrap();
        let a = page.document().get_element_by_id("a").unwrap();
        let wf = Workflow::new("w", vec![Step::click(Selector::css("#send"))]);
        let mut player = Player::new(&mut page, wf, PlayerConfig::default()).unwrap();
        let mut clicks = Clicks::default();

        player.play(&mut page);
        run(&mut player, &mut page, &mut clicks, 60_000);
        assert_eq!(player.state(), PlayerState::Playing);
        assert_eq!(player.tooltip().arrow_targets(), &[send]);

        page.click(a);
        run(&mut player, &mut page, &mut clicks, 100);
        assert_eq!(player.state(), PlayerState::Playing);

        // A click inside the target matches through the dispatch path.
        page.click(span);
        run(&mut player, &mut page, &mut clicks, 100);
        assert_eq!(player.state(), PlayerState::Finished);
        assert_eq!(player.stats().clicks, 1);
    }

    #[test]
    fn unresolved_targets_are_skipped() {
        let mut page = page();
        let wf = Workflow::new(
            "w",
            vec![
                Step::click(Selector::css("#missing")),
                Step::input(Selector::text("nowhere"), "x"),
            ],
        );
        let mut player = Player::new(&mut page, wf, PlayerConfig::default()).unwrap();
        player.play(&mut page);
        assert_eq!(player.state(), PlayerState::Finished);
        assert_eq!(player.stats().skipped, 2);
    }

    #[test]
    fn auto_input_sets_value() {
        let mut page = page();
        let email = page.document().query_selector("[name=\"email\"]").unwrap().unwrap();
        let wf = Workflow::new(
            "w",
            vec![Step::input(Selector::css("[name=\"email\"]"), "a@b.c").with_mode(Mode::Auto)],
        );
        let mut player = Player::new(&mut page, wf, PlayerConfig::default()).unwrap();
        player.play(&mut page);
        assert_eq!(page.document().value(email), Some("a@b.c"));
        assert_eq!(page.document().active_element(), Some(email));
        assert_eq!(player.stats().inputs, 1);
        assert_eq!(player.state(), PlayerState::Finished);
    }

    #[test]
    fn guide_input_waits_a_grace_period() {
        let mut page = page();
        let wf = Workflow::new("w", vec![Step::input(Selector::css("[name=\"email\"]"), "v")]);
        let mut player = Player::new(&mut page, wf, PlayerConfig::default()).unwrap();
        let mut clicks = Clicks::default();
        player.play(&mut page);
        run(&mut player, &mut page, &mut clicks, 499);
        assert_eq!(player.state(), PlayerState::Playing);
        run(&mut player, &mut page, &mut clicks, 1);
        assert_eq!(player.state(), PlayerState::Finished);
    }

    #[test]
    fn wait_for_polls_until_present() {
        let mut page = page();
        let wf = Workflow::new(
            "w",
            vec![Step::wait_for(Selector::css("#late"), Some(5000)), Step::message("ok")],
        );
        let mut player = Player::new(&mut page, wf, PlayerConfig::default()).unwrap();
        let mut clicks = Clicks::default();
        player.play(&mut page);
        assert!(!player.tooltip().is_visible());

        run(&mut player, &mut page, &mut clicks, 450);
        assert_eq!(player.current_step(), Some(0));
        let slot = page.document().get_element_by_id("slot").unwrap();
        page.document_mut().set_inner_html(slot, r#"<p id="late">here</p>"#);

        // Next poll lands at 600 ms.
        run(&mut player, &mut page, &mut clicks, 150);
        assert_eq!(player.current_step(), Some(1));
        assert_eq!(player.stats().timeouts, 0);
    }

    #[test]
    fn wait_for_times_out_silently() {
        let mut page = page();
        let wf = Workflow::new("w", vec![Step::wait_for(Selector::css("#never"), Some(500))]);
        let mut player = Player::new(&mut page, wf, PlayerConfig::default()).unwrap();
        let stats = player.run_to_completion(&mut page, 10_000);
        assert_eq!(player.state(), PlayerState::Finished);
        assert_eq!(stats.waits, 1);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(page.now(), 600);
    }

    #[test]
    fn navigate_ends_the_session() {
        let mut page = page();
        let wf = Workflow::new(
            "w",
            vec![Step::navigate("https://example.com/next"), Step::message("never")],
        );
        let mut player = Player::new(&mut page, wf, PlayerConfig::default()).unwrap();
        let stats = player.run_to_completion(&mut page, 5000);
        assert_eq!(player.state(), PlayerState::Navigated);
        assert_eq!(page.navigation(), Some("https://example.com/next"));
        assert_eq!(stats.navigation.as_deref(), Some("https://example.com/next"));
        assert_eq!(stats.messages, 0);
    }

    #[test]
    fn stop_destroys_tooltip_and_cancels_waits() {
        let mut page = page();
        let wf = Workflow::new("w", vec![Step::message("hi"), Step::message("there")]);
        let mut player = Player::new(&mut page, wf, PlayerConfig::default()).unwrap();
        let mut clicks = Clicks::default();
        player.play(&mut page);
        player.stop(&mut page);
        player.stop(&mut page);
        run(&mut player, &mut page, &mut clicks, 5000);
        assert_eq!(player.state(), PlayerState::Stopped);
        assert_eq!(player.stats().messages, 1);
        assert!(player.tooltip().is_destroyed());
        assert!(page.document().query_selector(".tiptour-tooltip").unwrap().is_none());
    }

    #[test]
    fn invalid_workflow_is_rejected() {
        let mut page = page();
        let wf = Workflow::new("w", vec![]);
        match Player::new(&mut page, wf, PlayerConfig::default()) {
            Err(WorkflowError::Invalid(errors)) => assert_eq!(errors, vec!["steps cannot be empty"]),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn input_submissions_reach_the_caller() {
        let mut page = page();
        let wf = Workflow::new("w", vec![Step::message("Ask me")]);
        let config = PlayerConfig::default().with_input("Ask...");
        let mut player = Player::new(&mut page, wf, config).unwrap();
        let input = player.tooltip().input_element().unwrap();
        assert_eq!(
            page.document().get_attribute(input, "placeholder").as_deref(),
            Some("Ask...")
        );

        page.focus(input);
        page.document_mut().set_value(input, "  how? ");
        page.key_down("Enter");
        let mut clicks = Clicks::default();
        run(&mut player, &mut page, &mut clicks, 0);
        assert_eq!(player.submissions().try_recv().unwrap(), "how?");
    }
}
