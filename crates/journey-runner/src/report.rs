//! End-of-run documents: run metadata, findings and the summary

use crate::findings::sorted;
use journey_core::{Finding, FindingKind, Result, RunMeta, Totals};
use std::path::Path;
use tracing::debug;

pub const RUN_META_FILE: &str = "run_meta.json";
pub const FINDINGS_FILE: &str = "findings.json";
pub const FINDINGS_MD_FILE: &str = "findings.md";
pub const SUMMARY_FILE: &str = "summary.md";
pub const STEP_RESULTS_FILE: &str = "step_results.jsonl";
pub const LOGIN_VERIFICATION_FILE: &str = "login_verification.json";
pub const FORM_SNAPSHOT_AFTER_LOGIN: &str = "form_snapshot_after_login.json";

pub fn write_run_meta(run_dir: &Path, meta: &RunMeta) -> Result<()> {
    std::fs::write(run_dir.join(RUN_META_FILE), serde_json::to_string_pretty(meta)?)?;
    debug!("Run metadata written");
    Ok(())
}

fn finding_line(finding: &Finding) -> String {
    format!(
        "- [{}] {} Step {}: {}",
        finding.severity, finding.case_id, finding.step_num, finding.summary
    )
}

pub fn render_findings_markdown(findings: &[Finding]) -> String {
    let ordered = sorted(findings);
    let (app, script): (Vec<&Finding>, Vec<&Finding>) =
        ordered.into_iter().partition(|f| f.kind == FindingKind::App);

    let mut md = vec![
        "# Findings".to_string(),
        String::new(),
        "## Application findings (APP)".to_string(),
        String::new(),
    ];
    if app.is_empty() {
        md.push("- No application findings (script issues only, or all green).".to_string());
    } else {
        md.extend(app.iter().map(|f| finding_line(f)));
    }
    md.extend([
        String::new(),
        "## Script issues (SCRIPT)".to_string(),
        String::new(),
    ]);
    if script.is_empty() {
        md.push("- No script issues.".to_string());
    } else {
        md.extend(script.iter().map(|f| finding_line(f)));
    }
    md.join("\n")
}

pub fn write_findings(run_dir: &Path, findings: &[Finding]) -> Result<()> {
    std::fs::write(run_dir.join(FINDINGS_FILE), serde_json::to_string_pretty(findings)?)?;
    std::fs::write(run_dir.join(FINDINGS_MD_FILE), render_findings_markdown(findings))?;
    Ok(())
}

pub fn render_summary(run_dir: &Path, totals: &Totals, http_auth: bool) -> String {
    let mut md = vec![
        "# Run Summary".to_string(),
        String::new(),
        format!(
            "- Steps: {} (Pass={} Warn={} Fail={})",
            totals.steps_total, totals.pass, totals.warn, totals.fail
        ),
    ];
    if totals.aborted {
        md.push(format!(
            "- Aborted: {}",
            totals.abort_reason.as_deref().unwrap_or("blocker")
        ));
    }
    if totals.evidence_gaps > 0 {
        md.push(format!("- Evidence gaps: {}", totals.evidence_gaps));
    }
    md.push(format!("- HTTP auth: {}", if http_auth { "yes" } else { "no" }));
    md.extend([
        String::new(),
        "Artifacts:".to_string(),
        "- screenshots/".to_string(),
        format!("- {}", STEP_RESULTS_FILE),
        "- network_trace.jsonl".to_string(),
        "- technical_checkpoints.md / technical_checkpoints.json".to_string(),
        "- dataflow_inventory.md / dataflow_inventory.json".to_string(),
        format!("- {} / {}", FINDINGS_MD_FILE, FINDINGS_FILE),
        format!("- {}", RUN_META_FILE),
    ]);
    for optional in [FORM_SNAPSHOT_AFTER_LOGIN, LOGIN_VERIFICATION_FILE] {
        if run_dir.join(optional).exists() {
            md.push(format!("- {}", optional));
        }
    }
    md.join("\n")
}

pub fn write_summary(run_dir: &Path, totals: &Totals, http_auth: bool) -> Result<()> {
    std::fs::write(
        run_dir.join(SUMMARY_FILE),
        render_summary(run_dir, totals, http_auth),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use journey_core::Severity;

    #[test]
    fn test_findings_markdown_sections() {
        let findings = vec![
            Finding {
                kind: FindingKind::Script,
                severity: Severity::Medium,
                case_id: "TC-02".into(),
                step_num: 3,
                action: "click".into(),
                selector: None,
                summary: "Could not find element".into(),
                screenshot: None,
            },
            Finding {
                kind: FindingKind::App,
                severity: Severity::Critical,
                case_id: "TC-01".into(),
                step_num: 1,
                action: "click".into(),
                selector: None,
                summary: "Critical Error: Detected '404 Not Found' page".into(),
                screenshot: None,
            },
        ];
        let md = render_findings_markdown(&findings);
        let app = md.find("- [critical] TC-01 Step 1").unwrap();
        let script_heading = md.find("## Script issues").unwrap();
        let script = md.find("- [medium] TC-02 Step 3").unwrap();
        assert!(app < script_heading && script_heading < script);

        let empty = render_findings_markdown(&[]);
        assert!(empty.contains("No application findings"));
        assert!(empty.contains("No script issues."));
    }

    #[test]
    fn test_summary_lists_optional_artifacts() {
        let temp = tempfile::tempdir().unwrap();
        let totals = Totals {
            steps_total: 3,
            pass: 1,
            warn: 1,
            fail: 1,
            aborted: true,
            abort_reason: Some("blocker".into()),
            evidence_gaps: 2,
        };
        let md = render_summary(temp.path(), &totals, false);
        assert!(md.contains("- Steps: 3 (Pass=1 Warn=1 Fail=1)"));
        assert!(md.contains("- Aborted: blocker"));
        assert!(md.contains("- Evidence gaps: 2"));
        assert!(md.contains("- HTTP auth: no"));
        assert!(!md.contains(LOGIN_VERIFICATION_FILE));

        std::fs::write(temp.path().join(LOGIN_VERIFICATION_FILE), "{}").unwrap();
        write_summary(temp.path(), &totals, true).unwrap();
        let written = std::fs::read_to_string(temp.path().join(SUMMARY_FILE)).unwrap();
        assert!(written.contains(LOGIN_VERIFICATION_FILE));
        assert!(written.contains("- HTTP auth: yes"));
    }
}
