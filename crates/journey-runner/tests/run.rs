//! End-to-end runs against an in-memory page

use journey_browser::mock::{ClickEffect, MockElement, MockPage};
use journey_capture::read_jsonl;
use journey_core::{Charter, FindingKind, RawNetworkEvent, RunConfig, Severity, Timeouts};
use journey_runner::{Orchestrator, RunInputs, RunReport};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const START_URL: &str = "https://shop.example/de1/konfigurator.html?session=abc";

fn config(root: &Path) -> RunConfig {
    RunConfig {
        results_root: root.join("results"),
        timeouts: Timeouts::immediate(),
        auto_advance: false,
        auto_repair_click: false,
        discovery_click: false,
        ..RunConfig::default()
    }
}

fn inputs(root: &Path, charter: &str) -> RunInputs {
    let charter_path = root.join("charter.json");
    std::fs::write(&charter_path, charter).unwrap();
    RunInputs {
        start_url: START_URL.to_string(),
        charter_path,
        run_id: Some("run-1".to_string()),
        http_auth: false,
    }
}

async fn run(temp: &TempDir, config: RunConfig, charter: &str, page: Arc<MockPage>) -> RunReport {
    let parsed = Charter::from_json_str(charter).unwrap();
    Orchestrator::new(config)
        .run(&parsed, inputs(temp.path(), charter), page)
        .await
        .unwrap()
}

fn step_results(report: &RunReport) -> Vec<Value> {
    read_jsonl(&report.run_dir.join("step_results.jsonl"))
}

fn configurator() -> Arc<MockPage> {
    let page = Arc::new(MockPage::new("about:blank"));
    page.set_title("Konfigurator");
    page.add(MockElement::button("Modell wählen").test_id("cta-a"));
    page.add(MockElement::button("Farbe").test_id("cta-b"));
    page
}

#[tokio::test]
async fn test_one_step_result_per_executed_step() {
    let temp = tempfile::tempdir().unwrap();
    let charter = r#"[{"testScenario": "Smoke", "testCases": [
        {"id": "TC-01", "steps": [
            {"action": "Open URL", "value": null},
            {"action": "Click CTA", "data-testid": "cta-a"},
            {"action": "verify", "data-testid": "missing-element"},
            {"action": "wait", "value": 0}
        ]}
    ]}]"#;
    let mut config = config(temp.path());
    config.stop_on_blocker = false;

    let report = run(&temp, config, charter, configurator()).await;

    let results = step_results(&report);
    let verdicts: Vec<&str> = results.iter().map(|r| r["verdict"].as_str().unwrap()).collect();
    assert_eq!(verdicts, vec!["Pass", "Pass", "Fail", "Pass"]);
    let indices: Vec<u64> = results.iter().map(|r| r["step_index"].as_u64().unwrap()).collect();
    assert_eq!(indices, vec![1, 2, 3, 4]);
    assert_eq!(results[1]["step_id"], "TC-01-Step2-ClickCTA");
    assert_eq!(results[1]["locator"]["strategy"], 3);
    assert_eq!(
        results[1]["screenshot"],
        "screenshots/TC-01_Step-2_Click-CTA.png"
    );

    assert_eq!(report.totals.steps_total, 4);
    assert_eq!(report.totals.fail, 1);
    assert!(!report.totals.aborted);
    assert!(!report.passed());

    let script: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.kind == FindingKind::Script)
        .collect();
    assert_eq!(script.len(), 1);
    assert_eq!(script[0].severity, Severity::Medium);
    assert_eq!(script[0].step_num, 3);

    for file in [
        "findings.json",
        "findings.md",
        "summary.md",
        "run_meta.json",
        "dataflow_inventory.json",
        "technical_checkpoints.json",
        "inputs/charter.json",
        "start_url_redacted.txt",
        "screenshots/_setup_00_initial.png",
    ] {
        assert!(report.run_dir.join(file).exists(), "missing {}", file);
    }
    let meta: Value =
        serde_json::from_str(&std::fs::read_to_string(report.run_dir.join("run_meta.json")).unwrap())
            .unwrap();
    assert!(meta["finished_at"].is_string());
    assert_eq!(
        meta["start_url_redacted"],
        "https://shop.example/de1/konfigurator.html"
    );
}

#[tokio::test]
async fn test_blocker_stops_remaining_cases() {
    let temp = tempfile::tempdir().unwrap();
    let charter = r#"[{"testScenario": "Smoke", "testCases": [
        {"id": "TC-01", "steps": [
            {"action": "Click CTA", "data-testid": "does-not-exist"},
            {"action": "Click CTA", "data-testid": "cta-a"}
        ]},
        {"id": "TC-02", "steps": [
            {"action": "Click CTA", "data-testid": "cta-b"}
        ]}
    ]}]"#;
    let page = configurator();

    let report = run(&temp, config(temp.path()), charter, page.clone()).await;

    assert_eq!(step_results(&report).len(), 1);
    assert!(report.totals.aborted);
    assert!(report
        .totals
        .abort_reason
        .as_deref()
        .unwrap()
        .starts_with("Could not find element"));
    assert!(page.clicks().is_empty());
    let summary = std::fs::read_to_string(report.run_dir.join("summary.md")).unwrap();
    assert!(summary.contains("- Aborted: Could not find element"));
}

#[tokio::test]
async fn test_setup_error_page_ends_run_with_report() {
    let temp = tempfile::tempdir().unwrap();
    let charter = r#"[{"testScenario": "Smoke", "testCases": [
        {"id": "TC-01", "steps": [
            {"action": "Click CTA", "data-testid": "cta-a"}
        ]}
    ]}]"#;
    let page = configurator();
    page.set_content("<title>Konfigurator</title><h1>HTTP Status 404</h1>");

    let report = run(&temp, config(temp.path()), charter, page.clone()).await;

    assert!(report.totals.aborted);
    assert!(report
        .totals
        .abort_reason
        .as_deref()
        .unwrap()
        .starts_with("setup failed: Critical Error: Detected '404 Not Found' page"));
    let setup = &report.findings[0];
    assert_eq!(setup.case_id, "SETUP");
    assert_eq!(setup.kind, FindingKind::App);
    assert_eq!(setup.severity, Severity::Critical);
    assert!(step_results(&report).is_empty());
    assert!(report.run_dir.join("summary.md").exists());
}

#[tokio::test]
async fn test_max_steps_does_not_count_open_url() {
    let temp = tempfile::tempdir().unwrap();
    let charter = r#"[{"testScenario": "Smoke", "testCases": [
        {"id": "TC-01", "steps": [
            {"action": "Open URL", "value": null},
            {"action": "Click CTA", "data-testid": "cta-a"},
            {"action": "Click CTA", "data-testid": "cta-b"},
            {"action": "Click CTA", "data-testid": "cta-a"}
        ]}
    ]}]"#;
    let mut config = config(temp.path());
    config.max_steps = Some(2);
    let page = configurator();

    let report = run(&temp, config, charter, page.clone()).await;

    assert_eq!(step_results(&report).len(), 3);
    assert_eq!(page.clicks().len(), 2);
    assert!(!report.totals.aborted);
}

#[tokio::test]
async fn test_abort_flag_stops_before_first_step() {
    let temp = tempfile::tempdir().unwrap();
    let charter = r#"[{"testScenario": "Smoke", "testCases": [
        {"id": "TC-01", "steps": [{"action": "Click CTA", "data-testid": "cta-a"}]}
    ]}]"#;
    let parsed = Charter::from_json_str(charter).unwrap();
    let orchestrator = Orchestrator::new(config(temp.path()));
    orchestrator.abort_flag().abort();

    let report = orchestrator
        .run(&parsed, inputs(temp.path(), charter), configurator())
        .await
        .unwrap();

    assert!(report.totals.aborted);
    assert_eq!(report.totals.abort_reason.as_deref(), Some("interrupted"));
    assert!(step_results(&report).is_empty());
}

#[tokio::test]
async fn test_network_events_are_tagged_with_their_step() {
    let temp = tempfile::tempdir().unwrap();
    let charter = r#"[{"testScenario": "Smoke", "testCases": [
        {"id": "TC-01", "steps": [
            {"action": "Click CTA", "data-testid": "submit"}
        ]}
    ]}]"#;
    let page = configurator();
    page.add(
        MockElement::button("Absenden")
            .test_id("submit")
            .on_click(ClickEffect::Emit(RawNetworkEvent::response(
                503,
                "https://shop.example/bff/processOpportunities?token=x",
            ))),
    );

    let report = run(&temp, config(temp.path()), charter, page).await;

    let trace = read_jsonl(&report.run_dir.join("network_trace.jsonl"));
    let response = trace
        .iter()
        .find(|ev| ev["kind"] == "response")
        .expect("response recorded");
    assert_eq!(response["step"], "TC-01-Step1-ClickCTA");
    assert_eq!(
        response["url"],
        "https://shop.example/bff/processOpportunities"
    );
    for marker in ["network_capture_enabled", "goto", "step_start", "step_end"] {
        assert!(
            trace.iter().any(|ev| ev["event"] == marker),
            "missing marker {}",
            marker
        );
    }

    let backend: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.case_id == "NETWORK")
        .collect();
    assert_eq!(backend.len(), 1);
    assert_eq!(backend[0].kind, FindingKind::App);
    assert_eq!(backend[0].severity, Severity::High);
    assert!(report.passed());
}

#[tokio::test]
async fn test_auto_advance_after_journey_driver() {
    let temp = tempfile::tempdir().unwrap();
    let charter = r#"[{"testScenario": "Checkout", "testCases": [
        {"id": "TC-01", "steps": [
            {"action": "Click CTA", "data-testid": "cta-start"}
        ]}
    ]}]"#;
    let page = Arc::new(MockPage::new("about:blank"));
    page.add(
        MockElement::button("Online leasen")
            .test_id("cta-start")
            .on_click(ClickEffect::Navigate(
                "https://shop.example/de1/checkout/personal".into(),
            )),
    );
    let next = page.add(MockElement::button("Weiter").test_id("cta-next-step"));
    let mut config = config(temp.path());
    config.auto_advance = true;
    config.auto_fill = false;

    let report = run(&temp, config, charter, page.clone()).await;

    assert_eq!(page.click_count(next), 5);
    let trace = read_jsonl(&report.run_dir.join("network_trace.jsonl"));
    let advance = trace
        .iter()
        .find(|ev| ev["event"] == "auto_advance")
        .expect("auto_advance marker");
    assert_eq!(advance["ok"], true);
    assert_eq!(
        advance["message"],
        "auto-advance: clicked 5x; no url change observed"
    );
    assert_eq!(step_results(&report).len(), 1);
}
