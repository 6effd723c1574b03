use tiptour::prelude::*;
use tiptour::workflow::validate_workflow;

const PAGE: &str = r#"
<main>
  <button id="save">Save</button>
  <div role="button" data-testid="menu">Menu</div>
  <p>Not a button</p>
  <div id="slot"></div>
</main>
"#;

fn click(page: &mut Page, css: &str) {
    let el = page.document().query_selector(css).unwrap().unwrap();
    page.click(el);
}

fn recorded() -> Workflow {
    let mut page = Page::headless(Document::from_html(PAGE));
    let mut recorder = Recorder::new();
    recorder.start();
    let steps = recorder.subscribe();

    click(&mut page, "#save");
    click(&mut page, "p");
    click(&mut page, "[data-testid=\"menu\"]");
    EventLoop::new().run_until_idle(&mut page, &mut [&mut recorder]);
    recorder.stop();

    assert_eq!(steps.try_iter().count(), 2);
    recorder.get_workflow("save-then-menu", Some("Save, then open the menu"))
}

#[test]
fn recorded_workflow_validates_and_survives_storage() -> anyhow::Result<()> {
    let wf = recorded();
    assert!(validate_workflow(&wf).ok);
    assert!(wf.steps.iter().all(|s| s.kind == StepType::Click));

    let tmp = tempfile::tempdir()?;
    let storage = WorkflowStorage::with_dir(tmp.path())?;
    storage.save(&wf)?;
    assert_eq!(storage.list()?, vec!["save-then-menu".to_string()]);

    let loaded = storage.load("save-then-menu")?;
    assert_eq!(loaded, wf);
    assert!(loaded.metadata.is_some());
    Ok(())
}

#[test]
fn auto_replay_clicks_the_recorded_targets() -> anyhow::Result<()> {
    let mut wf = recorded();
    wf.steps.insert(0, Step::message("Watch this"));

    let mut page = Page::headless(Document::from_html(PAGE));
    let mut observer = Recorder::new();
    observer.start();
    let mut player = Player::new(&mut page, wf, PlayerConfig::auto())?;

    player.play(&mut page);
    EventLoop::new().run_until(&mut page, &mut [&mut player, &mut observer], 10_000, |_| false);

    assert_eq!(player.state(), PlayerState::Finished);
    assert_eq!(player.stats().messages, 1);
    assert_eq!(player.stats().clicks, 2);
    assert_eq!(observer.steps().len(), 2);
    assert!(!player.tooltip().is_visible());
    Ok(())
}

#[test]
fn guided_replay_waits_for_the_user() -> anyhow::Result<()> {
    let wf = recorded();
    let mut page = Page::headless(Document::from_html(PAGE));
    let mut player = Player::new(&mut page, wf, PlayerConfig::default())?;
    player.play(&mut page);

    let mut lp = EventLoop::new();
    lp.run_for(&mut page, &mut [&mut player], 5_000);
    assert_eq!(player.state(), PlayerState::Playing);
    assert_eq!(player.current_step(), Some(0));
    assert!(player.tooltip().is_visible());

    click(&mut page, "#save");
    lp.run_until_idle(&mut page, &mut [&mut player]);
    assert_eq!(player.current_step(), Some(1));

    click(&mut page, "[data-testid=\"menu\"]");
    lp.run_until_idle(&mut page, &mut [&mut player]);
    assert_eq!(player.state(), PlayerState::Finished);
    assert_eq!(player.stats().clicks, 2);
    Ok(())
}

#[test]
fn invalid_documents_never_reach_storage() {
    let report = validate(&serde_json::json!({
        "id": "broken",
        "version": "1.0",
        "steps": [{ "type": "click" }, { "type": "navigate", "payload": {} }]
    }));
    assert!(!report.ok);
    assert_eq!(
        report.errors,
        vec![
            "steps[0].selector required for type click".to_string(),
            "steps[1].payload.url required for navigate".to_string(),
        ]
    );
    assert!(Workflow::from_json(&serde_json::json!({ "id": "x", "steps": [] }).to_string()).is_err());
}
