use clubcore::simulation::{ScenarioStep, Target, Transform};
use clubcore::{
    Command, CommandOutcome, HistoryState, Panel, PanelConfig, PanelKind, RecordDraft, RecordId,
    Scenario,
};

fn sponsor(name: &str, committed: f64, roi: f64) -> RecordDraft {
    RecordDraft::new()
        .with("sponsor", name)
        .with("tier", "silver")
        .with("committed_value", committed)
        .with("roi", roi)
        .with("engagement", 55.0)
        .with("months_remaining", 9.0)
        .with("activations_completed", 3)
        .with("activations_total", 5)
}

fn panel() -> (Panel, RecordId) {
    let panel = Panel::with_seed(
        PanelKind::Sponsorship,
        PanelConfig::default(),
        vec![
            sponsor("Harbour Bank", 8000.0, 2.1),
            sponsor("Northline", 12_000.0, 1.4),
            sponsor("Kestrel", 4000.0, 0.9),
        ],
    )
    .unwrap();
    let id = panel.get().cohort().records()[0].id;
    (panel, id)
}

fn raise_committed(id: RecordId) -> Scenario {
    Scenario::new("raise committed value to 10000").step(ScenarioStep::on(
        id,
        Transform::retarget("committed_value", 10_000.0, ["roi"]),
    ))
}

#[test]
fn raising_committed_value_projects_roi() {
    let (mut panel, id) = panel();

    let CommandOutcome::Projected(delta) = panel.dispatch(Command::Project(raise_committed(id))).unwrap()
    else {
        panic!("expected Projected");
    };

    let projection = delta.get(id).unwrap();
    let baseline_roi = projection.baseline.value("sponsorship_roi").unwrap();
    let projected_roi = projection.projected.as_ref().unwrap().value("sponsorship_roi").unwrap();
    assert!((baseline_roi - 2.1).abs() < 1e-9);
    assert!((projected_roi - 2.1 * (1.0 + 2000.0 / 8000.0)).abs() < 1e-9);
    assert!((projected_roi - 2.625).abs() < 1e-9);

    let live = panel.get();
    assert_eq!(live.cohort().get(id).unwrap().number("committed_value"), Some(8000.0));
    assert_eq!(live.history, HistoryState::Clean);
}

#[test]
fn projection_is_pure_across_one_and_many_calls() {
    let (panel, id) = panel();
    let scenario = raise_committed(id)
        .step(ScenarioStep::new(Target::All, Transform::increase_by("engagement", 30.0)));

    let before = panel.get();
    let snapshot = before.snapshot.clone();
    let fingerprint = snapshot.fingerprint();

    let first = panel.project(&scenario).unwrap();
    assert_eq!(panel.get(), before);
    assert_eq!(snapshot.fingerprint(), fingerprint);

    for _ in 0..100 {
        let again = panel.project(&scenario).unwrap();
        assert_eq!(again.records, first.records);
    }
    assert_eq!(panel.get(), before);
    assert_eq!(panel.get().cohort(), snapshot.cohort());
    assert_eq!(snapshot.fingerprint(), fingerprint);
}

#[test]
fn projection_does_not_touch_history_or_redo() {
    let (mut panel, id) = panel();
    panel
        .dispatch(Command::Update {
            id,
            patch: clubcore::RecordPatch::new().set("engagement", 80.0),
        })
        .unwrap();
    panel.dispatch(Command::Undo).unwrap();
    assert_eq!(panel.get().redo_depth, 1);

    panel.dispatch(Command::Project(raise_committed(id))).unwrap();
    assert_eq!(panel.get().redo_depth, 1);
    assert_eq!(panel.get().undo_depth, 0);
}

#[test]
fn removal_scenario_reports_ripple() {
    let (panel, harbour) = panel();
    let northline = panel.get().cohort().records()[1].id;

    let delta = panel
        .project(&Scenario::new("lose top sponsor").step(ScenarioStep::on(northline, Transform::Remove)))
        .unwrap();

    let removed = delta.get(northline).unwrap();
    assert!(removed.is_removed());
    assert!(removed.diff.is_empty());

    // 8000 sits mid-cohort before the removal and on top after it.
    let ripple = delta.get(harbour).unwrap();
    assert!(!ripple.targeted);
    let moved = ripple.diff["committed_value_percentile"].unwrap();
    assert!((moved + 50.0).abs() < 1e-9);
    assert_eq!(panel.get().cohort().len(), 3);
}

#[test]
fn limits_exceeded_is_an_error_not_a_panic() {
    let config = PanelConfig::from_json_str(r#"{"simulate": {"max_affected_records": 1}}"#).unwrap();
    let panel = Panel::with_seed(
        PanelKind::Sponsorship,
        config,
        vec![sponsor("a", 1.0, 1.0), sponsor("b", 2.0, 1.0)],
    )
    .unwrap();
    let scenario = Scenario::new("all")
        .step(ScenarioStep::new(Target::All, Transform::increase_by("roi", 1.0)));
    let err = panel.project(&scenario).unwrap_err();
    assert!(!err.is_validation());
    assert!(format!("{err}").contains("max_affected_records"));
}
