//! Guided tours driven from free-form commands
//!
//! A [`CommandHandler`] matches user input against the keywords of the tours
//! in its [`TourRegistry`]. A match starts that tour: the first target is
//! highlighted and the tooltip points at it. Any other input goes to the AI
//! completion, with the current tour step as context when a tour is running.

use crate::completion::{complete_or_fallback, Completion};
use serde::{Deserialize, Serialize};
use tiptour_core::html;
use tiptour_core::prelude::*;
use tiptour_tooltip::TooltipController;

pub const HIGHLIGHT_CLASS: &str = "tiptour-highlight";
pub const NO_TOUR_MESSAGE: &str = "No workflow active.";
pub const DONE_MESSAGE: &str = "Done! Try \"make pizza\" or \"bake cake\".";

const HIGHLIGHT_STYLE: [(&str, &str); 4] = [
    ("background", "#fff3cd"),
    ("border-color", "#ffc107"),
    ("box-shadow", "0 0 0 3px rgba(255, 193, 7, 0.3)"),
    ("animation", "pulse 2s infinite"),
];

/// What a guide needs from the tooltip.
pub trait GuideSurface {
    fn set_content(&mut self, page: &mut Page, content: &str);
    fn show(&mut self, page: &mut Page);
    fn set_current_target(&mut self, page: &mut Page, target: NodeId);
}

impl GuideSurface for TooltipController {
    fn set_content(&mut self, page: &mut Page, content: &str) {
        TooltipController::set_content(self, page, content);
    }

    fn show(&mut self, page: &mut Page) {
        TooltipController::show(self, page);
    }

    fn set_current_target(&mut self, page: &mut Page, target: NodeId) {
        self.add_arrow(page, vec![target]);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourStep {
    /// CSS selector of the element to press.
    pub target: String,
    /// How the target is named to the user, e.g. "Button 3".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub action: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tips: Vec<String>,
}

impl TourStep {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.target)
    }

    fn instruction(&self) -> String {
        format!("{}. Click {}.", self.description, self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Persona handed to the completion while this tour runs.
    pub context: String,
    /// Lowercase words that start the tour when contained in the input.
    pub keywords: Vec<String>,
    pub steps: Vec<TourStep>,
}

impl Tour {
    fn matches(&self, lower_input: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && lower_input.contains(&k.to_lowercase()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TourRegistry {
    tours: Vec<Tour>,
}

impl TourRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tours(tours: Vec<Tour>) -> Self {
        Self { tours }
    }

    /// Replaces a tour with the same id, else appends.
    pub fn register(&mut self, tour: Tour) {
        match self.tours.iter_mut().find(|t| t.id == tour.id) {
            Some(existing) => *existing = tour,
            None => self.tours.push(tour),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Tour> {
        self.tours.iter().find(|t| t.id == id)
    }

    /// First tour, in registration order, with a keyword in `input`.
    pub fn find_for(&self, input: &str) -> Option<&Tour> {
        let lower = input.to_lowercase();
        self.tours.iter().find(|t| t.matches(&lower))
    }

    pub fn tours(&self) -> &[Tour] {
        &self.tours
    }

    pub fn is_empty(&self) -> bool {
        self.tours.is_empty()
    }

    /// The three playful tours of the demo page, over buttons
    /// `#button-one` .. `#button-five`.
    pub fn demo() -> Self {
        fn step(n: usize, action: &str, description: &str) -> TourStep {
            const WORDS: [&str; 5] = ["one", "two", "three", "four", "five"];
            TourStep {
                target: format!("#button-{}", WORDS[(n - 1) % WORDS.len()]),
                label: Some(format!("Button {}", n)),
                action: action.to_string(),
                description: description.to_string(),
                tips: Vec::new(),
            }
        }
        fn words(list: &[&str]) -> Vec<String> {
            list.iter().map(|w| w.to_string()).collect()
        }

        Self::from_tours(vec![
            Tour {
                id: "cake".into(),
                name: "Bake a Cake".into(),
                description: "Create a Cake".into(),
                context: "You are a quirky, enthusiastic baking assistant with a sense of humor. You can bake.".into(),
                keywords: words(&["cake", "bake", "rainbow"]),
                steps: vec![
                    step(3, "Mix flour", "Mix the flour"),
                    step(1, "Add colors", "Add food coloring"),
                    step(5, "Pour into pans", "Pour batter into pans"),
                    step(2, "Bake", "Put in oven"),
                ],
            },
            Tour {
                id: "superhero".into(),
                name: "Become a Superhero (Office Edition)".into(),
                description: "Transform from boring office human into CAPTAIN PRODUCTIVITY!".into(),
                context: "You are a superhero mentor with a great sense of humor. Everything should sound epic and over-the-top, but about mundane office tasks.".into(),
                keywords: words(&["superhero", "productivity", "office"]),
                steps: vec![
                    step(2, "Get ready", "Prepare workspace"),
                    step(4, "Get coffee", "Make some coffee"),
                    step(1, "Clean desk", "Organize your desk"),
                    step(3, "Do tasks", "Work on your tasks"),
                ],
            },
            Tour {
                id: "pizza".into(),
                name: "Create the Ultimate Pizza Masterpiece".into(),
                description: "Build a pizza so amazing that even the Italians will cry tears of joy!".into(),
                context: "You are a passionate pizza chef who takes pizza VERY seriously but is also completely ridiculous. Everything about pizza is life or death dramatic.".into(),
                keywords: words(&["pizza", "italian", "cheese"]),
                steps: vec![
                    step(1, "Make dough", "Knead the dough"),
                    step(4, "Add sauce", "Spread tomato sauce"),
                    step(5, "Add cheese", "Put cheese on top"),
                    step(3, "Bake pizza", "Put in oven"),
                ],
            },
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    tour: usize,
    step: usize,
}

pub struct CommandHandler<C> {
    registry: TourRegistry,
    completion: C,
    current: Option<Position>,
    highlighted: Option<NodeId>,
    done_message: String,
}

impl<C: Completion> CommandHandler<C> {
    pub fn new(registry: TourRegistry, completion: C) -> Self {
        Self {
            registry,
            completion,
            current: None,
            highlighted: None,
            done_message: DONE_MESSAGE.to_string(),
        }
    }

    pub fn with_done_message(mut self, message: &str) -> Self {
        self.done_message = message.to_string();
        self
    }

    pub fn registry(&self) -> &TourRegistry {
        &self.registry
    }

    pub fn is_tour_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_tour(&self) -> Option<&Tour> {
        self.current.and_then(|p| self.registry.tours.get(p.tour))
    }

    pub fn current_step(&self) -> Option<&TourStep> {
        let pos = self.current?;
        self.registry.tours.get(pos.tour)?.steps.get(pos.step)
    }

    /// Element currently highlighted, if its target resolved.
    pub fn highlighted(&self) -> Option<NodeId> {
        self.highlighted
    }

    /// Starts a tour on a keyword match, otherwise asks the completion.
    pub fn handle_command(
        &mut self,
        page: &mut Page,
        surface: &mut dyn GuideSurface,
        input: &str,
    ) -> String {
        let started = self
            .registry
            .tours
            .iter()
            .position(|t| t.matches(&input.to_lowercase()));
        if let Some(tour) = started {
            return self.start(page, surface, tour);
        }

        let prompt = match self.context() {
            Some(context) => format!(
                "{}\n\nCurrent workflow context above. Answer the user's question about the current step, workflow, or any general topic.\n\nUser question: {}",
                context, input
            ),
            None => self.general_prompt(input),
        };
        complete_or_fallback(&self.completion, &prompt)
    }

    /// [`handle_command`](Self::handle_command), then shows the answer in
    /// the tooltip as plain text.
    pub fn respond(&mut self, page: &mut Page, surface: &mut dyn GuideSurface, input: &str) -> String {
        let answer = self.handle_command(page, surface, input);
        surface.set_content(page, &html::escape_text(&answer));
        surface.show(page);
        answer
    }

    /// Moves to the next step, or ends the tour after the last one.
    pub fn auto_advance(&mut self, page: &mut Page, surface: &mut dyn GuideSurface) -> String {
        let Some(pos) = self.current else {
            return NO_TOUR_MESSAGE.to_string();
        };
        let next = Position {
            tour: pos.tour,
            step: pos.step + 1,
        };
        let Some(step) = self
            .registry
            .tours
            .get(next.tour)
            .and_then(|t| t.steps.get(next.step))
            .cloned()
        else {
            tracing::debug!("tour finished");
            self.current = None;
            self.reset_highlight(page);
            return self.done_message.clone();
        };
        self.current = Some(next);
        self.point_to(page, surface, &step);
        step.instruction()
    }

    /// Advances when a click lands on the highlighted element.
    pub fn advance_on_click(
        &mut self,
        page: &mut Page,
        surface: &mut dyn GuideSurface,
        target: NodeId,
        path: &[NodeId],
    ) -> Option<String> {
        let el = self.highlighted?;
        if target == el || path.contains(&el) {
            Some(self.auto_advance(page, surface))
        } else {
            None
        }
    }

    fn start(&mut self, page: &mut Page, surface: &mut dyn GuideSurface, tour: usize) -> String {
        let Some(first) = self.registry.tours.get(tour).and_then(|t| t.steps.first()).cloned()
        else {
            return "Workflow not found.".to_string();
        };
        tracing::debug!("starting tour {}", self.registry.tours[tour].id);
        self.current = Some(Position { tour, step: 0 });
        self.point_to(page, surface, &first);
        first.instruction()
    }

    fn point_to(&mut self, page: &mut Page, surface: &mut dyn GuideSurface, step: &TourStep) {
        self.reset_highlight(page);
        let found = match page.document().query_selector(&step.target) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("tour target {}: {}", step.target, e);
                None
            }
        };
        let Some(el) = found else {
            tracing::warn!("tour target {} not found", step.target);
            return;
        };
        let doc = page.document_mut();
        for (prop, value) in HIGHLIGHT_STYLE {
            doc.set_style(el, prop, value);
        }
        doc.add_class(el, HIGHLIGHT_CLASS);
        self.highlighted = Some(el);
        surface.set_current_target(page, el);
    }

    fn reset_highlight(&mut self, page: &mut Page) {
        let Some(el) = self.highlighted.take() else {
            return;
        };
        let doc = page.document_mut();
        for (prop, _) in HIGHLIGHT_STYLE {
            doc.set_style(el, prop, "");
        }
        doc.remove_class(el, HIGHLIGHT_CLASS);
    }

    fn context(&self) -> Option<String> {
        let tour = self.current_tour()?;
        let step = self.current_step()?;
        let pos = self.current?;
        let mut context = format!(
            "{}\n\nCurrent workflow: {}\nCurrent step: {}/{}\nAction: {}\nDescription: {}\nTarget: {}",
            tour.context,
            tour.name,
            pos.step + 1,
            tour.steps.len(),
            step.action,
            step.description,
            step.label()
        );
        if !step.tips.is_empty() {
            context.push_str(&format!("\nTips: {}", step.tips.join(", ")));
        }
        Some(context)
    }

    fn general_prompt(&self, input: &str) -> String {
        let mut prompt = String::from(
            "You are a helpful AI assistant. Answer the user's question naturally.\n\n",
        );
        if !self.registry.is_empty() {
            prompt.push_str("Available workflows you can start:\n");
            for tour in &self.registry.tours {
                prompt.push_str(&format!("- \"{}\" - {}\n", tour.name, tour.description));
            }
            prompt.push('\n');
        }
        prompt.push_str(&format!("User question: {}", input));
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn page() -> Page {
        Page::headless(Document::from_html(
            r#"<button id="button-one">1</button><button id="button-two">2</button>
               <button id="button-three">3</button><button id="button-four">4</button>
               <button id="button-five">5</button>"#,
        ))
    }

    #[derive(Default)]
    struct Surface {
        content: Vec<String>,
        shown: usize,
        target: Option<NodeId>,
    }

    impl GuideSurface for Surface {
        fn set_content(&mut self, _page: &mut Page, content: &str) {
            self.content.push(content.to_string());
        }

        fn show(&mut self, _page: &mut Page) {
            self.shown += 1;
        }

        fn set_current_target(&mut self, _page: &mut Page, target: NodeId) {
            self.target = Some(target);
        }
    }

    /// Echoes prompts and remembers them.
    fn recording() -> (impl Fn(&str) -> Result<String>, Rc<RefCell<Vec<String>>>) {
        let prompts = Rc::new(RefCell::new(Vec::new()));
        let seen = prompts.clone();
        let f = move |p: &str| -> Result<String> {
            seen.borrow_mut().push(p.to_string());
            Ok("answer".to_string())
        };
        (f, prompts)
    }

    #[test]
    fn keyword_starts_a_tour() {
        let mut page = page();
        let mut surface = Surface::default();
        let (completion, prompts) = recording();
        let mut handler = CommandHandler::new(TourRegistry::demo(), completion);

        let reply = handler.handle_command(&mut page, &mut surface, "Let's BAKE something");
        assert_eq!(reply, "Mix the flour. Click Button 3.");
        assert!(prompts.borrow().is_empty());

        let three = page.document().get_element_by_id("button-three").unwrap();
        assert_eq!(surface.target, Some(three));
        assert_eq!(handler.highlighted(), Some(three));
        let doc = page.document();
        assert!(doc.has_class(three, HIGHLIGHT_CLASS));
        assert_eq!(doc.style(three, "background").as_deref(), Some("#fff3cd"));
        assert_eq!(doc.style(three, "animation").as_deref(), Some("pulse 2s infinite"));
    }

    #[test]
    fn questions_inside_a_tour_carry_context() {
        let mut page = page();
        let mut surface = Surface::default();
        let (completion, prompts) = recording();
        let mut registry = TourRegistry::demo();
        let mut pizza = registry.get("pizza").unwrap().clone();
        pizza.steps[0].tips = vec!["flour the board".into(), "be gentle".into()];
        registry.register(pizza);
        let mut handler = CommandHandler::new(registry, completion);

        handler.handle_command(&mut page, &mut surface, "make pizza");
        let reply = handler.handle_command(&mut page, &mut surface, "how long?");
        assert_eq!(reply, "answer");
        let prompt = prompts.borrow()[0].clone();
        assert!(prompt.starts_with("You are a passionate pizza chef"));
        assert!(prompt.contains("Current workflow: Create the Ultimate Pizza Masterpiece\nCurrent step: 1/4\nAction: Make dough"));
        assert!(prompt.contains("\nTips: flour the board, be gentle"));
        assert!(prompt.ends_with("User question: how long?"));
    }

    #[test]
    fn general_questions_list_tours() {
        let mut page = page();
        let mut surface = Surface::default();
        let (completion, prompts) = recording();
        let mut handler = CommandHandler::new(TourRegistry::demo(), completion);
        handler.handle_command(&mut page, &mut surface, "what is this page?");
        let prompt = prompts.borrow()[0].clone();
        assert!(prompt.contains("Available workflows you can start:\n- \"Bake a Cake\" - Create a Cake\n"));
        assert!(prompt.ends_with("User question: what is this page?"));
    }

    #[test]
    fn advancing_through_to_the_end() {
        let mut page = page();
        let mut surface = Surface::default();
        let (completion, _) = recording();
        let mut handler = CommandHandler::new(TourRegistry::demo(), completion);
        assert_eq!(handler.auto_advance(&mut page, &mut surface), NO_TOUR_MESSAGE);

        handler.handle_command(&mut page, &mut surface, "cake");
        let three = page.document().get_element_by_id("button-three").unwrap();
        assert_eq!(handler.auto_advance(&mut page, &mut surface), "Add food coloring. Click Button 1.");
        assert!(!page.document().has_class(three, HIGHLIGHT_CLASS));
        assert_eq!(page.document().style(three, "background"), None);
        handler.auto_advance(&mut page, &mut surface);
        handler.auto_advance(&mut page, &mut surface);

        let done = handler.auto_advance(&mut page, &mut surface);
        assert_eq!(done, "Done! Try \"make pizza\" or \"bake cake\".");
        assert!(!handler.is_tour_active());
        assert_eq!(handler.highlighted(), None);
        assert!(page.document().query_selector(".tiptour-highlight").unwrap().is_none());
    }

    #[test]
    fn click_on_highlight_advances() {
        let mut page = page();
        let mut surface = Surface::default();
        let (completion, _) = recording();
        let mut handler = CommandHandler::new(TourRegistry::demo(), completion);
        handler.handle_command(&mut page, &mut surface, "office");
        let one = page.document().get_element_by_id("button-one").unwrap();
        let two = page.document().get_element_by_id("button-two").unwrap();

        assert_eq!(handler.advance_on_click(&mut page, &mut surface, one, &[]), None);
        let reply = handler.advance_on_click(&mut page, &mut surface, two, &[]);
        assert_eq!(reply.as_deref(), Some("Make some coffee. Click Button 4."));
    }

    #[test]
    fn failed_completion_is_shown_as_fallback() {
        let mut page = page();
        let mut tip = TooltipController::new(&mut page, Default::default()).unwrap();
        let broken = |_: &str| -> Result<String> {
            Err(crate::error::WorkflowError::Completion("offline".into()))
        };
        let mut handler = CommandHandler::new(TourRegistry::new(), broken);
        let reply = handler.respond(&mut page, &mut tip, "hello?");
        assert_eq!(reply, crate::completion::FALLBACK_MESSAGE);
        assert!(tip.is_visible());
        assert_eq!(tip.state().content, crate::completion::FALLBACK_MESSAGE);
    }

    #[test]
    fn tooltip_points_at_tour_target() {
        let mut page = page();
        let mut tip = TooltipController::new(&mut page, Default::default()).unwrap();
        let (completion, _) = recording();
        let mut handler = CommandHandler::new(TourRegistry::demo(), completion);
        handler.respond(&mut page, &mut tip, "pizza please");
        let one = page.document().get_element_by_id("button-one").unwrap();
        assert_eq!(tip.arrow_targets(), &[one]);
        assert!(tip.config().arrow.enabled);
    }
}
