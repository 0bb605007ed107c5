mod common;

use common::{FakePage, Op, ScriptedOracle, snapshot, values};
use form_pilot::config::AgentSettings;
use form_pilot::{AgentError, FormFillingAgent};

#[tokio::test]
async fn fills_submits_and_stops_on_completion() {
    let page = FakePage::new(vec![
        snapshot(&[("firstName", "", true)], &[], false),
        snapshot(&[("firstName", "John", true)], &[], false),
        snapshot(&[("firstName", "John", true)], &[], true),
    ]);
    let oracle = ScriptedOracle::new();
    oracle.decide(r#"{"type":"SUBMIT","reason":"every field is filled"}"#);
    oracle
        .plan(r##"{"command":"fill","selector":"#firstName","value":"John","reason":"fill"}"##)
        .plan(r##"{"command":"click","selector":"button[type=submit]","reason":"submit"}"##);

    let mut agent = FormFillingAgent::new(
        page.clone(),
        oracle.clone(),
        values(&[("firstName", "John")]),
        AgentSettings::immediate(),
    );
    let report = agent.run().await.unwrap();

    assert_eq!(report.cycles, 3);
    assert_eq!(page.captures(), 3);
    assert_eq!(report.fields_filled, 1);
    assert_eq!(
        page.ops(),
        vec![
            Op::Fill("#firstName".into(), "John".into()),
            Op::Click("button[type=submit]".into()),
        ]
    );
    assert_eq!(oracle.decision_prompts().len(), 1);
    assert!(oracle.plan_prompts()[1].contains(r#""target":"submit""#));
}

#[tokio::test]
async fn prefilled_fields_are_not_refilled() {
    let page = FakePage::new(vec![
        snapshot(&[("a", "", true), ("b", "x", true)], &[], false),
        snapshot(&[("a", "1", true), ("b", "x", true)], &[], true),
    ]);
    let oracle = ScriptedOracle::new();

    let mut agent = FormFillingAgent::new(
        page.clone(),
        oracle.clone(),
        values(&[("a", "1"), ("b", "2")]),
        AgentSettings::immediate(),
    );
    let report = agent.run().await.unwrap();

    let plans = oracle.plan_prompts();
    assert_eq!(plans.len(), 1);
    assert!(plans[0].contains(r#""target":"a""#));
    assert!(oracle.decision_prompts().is_empty());
    assert_eq!(report.cycles, 2);
    assert!(agent.completion().has_field("a"));
    assert!(agent.completion().has_field("b"));
}

#[tokio::test]
async fn completed_sections_are_never_reopened() {
    let sections = [("Personal", true), ("Medical", false)];
    let page = FakePage::new(vec![
        snapshot(&[], &sections, false),
        snapshot(&[], &sections, false),
        snapshot(&[], &sections, false),
        snapshot(&[], &sections, true),
    ]);
    page.add_section_control("Personal", true);
    page.add_section_control("Medical", true);
    let oracle = ScriptedOracle::new();
    oracle
        .decide(r#"{"type":"OPEN_SECTION","target":"Personal","reason":"again"}"#)
        .decide(r#"{"type":"OPEN_SECTION","target":"Medical","reason":"next"}"#)
        .decide(r#"{"type":"OPEN_SECTION","target":"Medical","reason":"again"}"#);

    let mut agent =
        FormFillingAgent::new(page.clone(), oracle.clone(), values(&[]), AgentSettings::immediate());
    let report = agent.run().await.unwrap();

    assert_eq!(report.cycles, 4);
    assert_eq!(page.locates(), ["Medical"]);
    assert_eq!(page.ops(), vec![Op::Click("#section-Medical".into())]);
    assert!(report.completed_sections.contains("Personal"));
    assert!(report.completed_sections.contains("Medical"));
}

#[tokio::test]
async fn failed_actions_do_not_stop_the_loop() {
    let page = FakePage::new(vec![
        snapshot(&[], &[], false),
        snapshot(&[], &[], false),
        snapshot(&[], &[], true),
    ]);
    let oracle = ScriptedOracle::new();
    // the submit plan is garbage; the second decision call has nothing scripted
    oracle.plan("no plan here").decide(r#"{"type":"SUBMIT","reason":"try it"}"#);

    let mut agent =
        FormFillingAgent::new(page.clone(), oracle.clone(), values(&[]), AgentSettings::immediate());
    let report = agent.run().await.unwrap();

    assert_eq!(report.cycles, 3);
    let plans = oracle.plan_prompts();
    assert_eq!(plans.len(), 2);
    assert!(plans[0].contains(r#""target":"submit""#));
    assert!(plans[1].contains(r#""type":"RECOVER""#));
    assert!(plans[1].contains("retry_analysis"));
    assert_eq!(page.ops(), vec![Op::Fill("#field".into(), "x".into())]);
}

#[tokio::test]
async fn cycle_budget_ends_a_stuck_run() {
    let page = FakePage::new(vec![snapshot(&[], &[], false)]);
    let oracle = ScriptedOracle::new();

    let mut agent = FormFillingAgent::new(
        page.clone(),
        oracle.clone(),
        values(&[]),
        AgentSettings {
            max_cycles: Some(3),
            ..AgentSettings::immediate()
        },
    );
    let err = agent.run().await.unwrap_err();

    assert!(matches!(err, AgentError::CycleBudgetExhausted(3)));
    assert_eq!(page.captures(), 3);
}
