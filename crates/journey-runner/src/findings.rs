//! Triage of non-passing steps into APP and SCRIPT findings

use journey_core::{Finding, FindingKind, Severity, Verdict};

/// Message prefix produced by the error-page guard
pub const ERROR_PAGE_MARKER: &str = "Critical Error: Detected";

/// Kind and severity for a non-passing step message
pub fn classify(verdict: Verdict, message: &str) -> (FindingKind, Severity) {
    if message.contains(ERROR_PAGE_MARKER) {
        return (FindingKind::App, Severity::Critical);
    }
    let lower = message.to_lowercase();
    if verdict == Verdict::Fail && lower.contains("timeout") {
        return (FindingKind::Script, Severity::Medium);
    }
    if lower.contains("could not find element") {
        return (FindingKind::Script, Severity::Medium);
    }
    (FindingKind::Script, Severity::Low)
}

/// Where a finding came from
#[derive(Debug, Clone, Copy)]
pub struct StepRef<'a> {
    pub case_id: &'a str,
    pub step_num: usize,
    pub action: &'a str,
}

/// Finding for a `Warn` or `Fail` step, `None` for `Pass`
pub fn step_finding(
    step: StepRef<'_>,
    verdict: Verdict,
    message: &str,
    selector: Option<&str>,
    screenshot: Option<&str>,
) -> Option<Finding> {
    if verdict == Verdict::Pass {
        return None;
    }
    let (kind, severity) = classify(verdict, message);
    let summary = if message.is_empty() {
        format!("{} on {}", verdict, selector.unwrap_or("step"))
    } else {
        message.to_string()
    };
    Some(Finding {
        kind,
        severity,
        case_id: step.case_id.to_string(),
        step_num: step.step_num,
        action: step.action.to_string(),
        selector: selector.map(str::to_string),
        summary,
        screenshot: screenshot.map(str::to_string),
    })
}

/// Findings ordered for reading: APP before SCRIPT, then by severity
pub fn sorted(findings: &[Finding]) -> Vec<&Finding> {
    let mut out: Vec<&Finding> = findings.iter().collect();
    out.sort_by_key(|f| (f.kind != FindingKind::App, f.severity));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        assert_eq!(
            classify(Verdict::Fail, "Critical Error: Detected '404 Not Found' page"),
            (FindingKind::App, Severity::Critical)
        );
        assert_eq!(
            classify(Verdict::Fail, "Timeout: waiting for navigation"),
            (FindingKind::Script, Severity::Medium)
        );
        assert_eq!(
            classify(Verdict::Warn, "navigation timeout tolerated"),
            (FindingKind::Script, Severity::Low)
        );
        assert_eq!(
            classify(
                Verdict::Fail,
                "Could not find element using provided locators (data-testid='x')"
            ),
            (FindingKind::Script, Severity::Medium)
        );
        assert_eq!(
            classify(Verdict::Warn, "intent assert_price_box_present: anchor visible"),
            (FindingKind::Script, Severity::Low)
        );
    }

    #[test]
    fn test_pass_has_no_finding() {
        let step = StepRef {
            case_id: "TC-01",
            step_num: 2,
            action: "Click CTA",
        };
        assert!(step_finding(step, Verdict::Pass, "ok", None, None).is_none());
        let finding = step_finding(step, Verdict::Fail, "", Some("#cta"), Some("a.png")).unwrap();
        assert_eq!(finding.summary, "Fail on #cta");
        assert_eq!(finding.screenshot.as_deref(), Some("a.png"));
    }

    #[test]
    fn test_sorted_puts_app_first() {
        let make = |kind, severity| Finding {
            kind,
            severity,
            case_id: "TC".into(),
            step_num: 1,
            action: "click".into(),
            selector: None,
            summary: String::new(),
            screenshot: None,
        };
        let findings = vec![
            make(FindingKind::Script, Severity::Medium),
            make(FindingKind::App, Severity::High),
            make(FindingKind::App, Severity::Critical),
        ];
        let order: Vec<_> = sorted(&findings).iter().map(|f| (f.kind, f.severity)).collect();
        assert_eq!(
            order,
            vec![
                (FindingKind::App, Severity::Critical),
                (FindingKind::App, Severity::High),
                (FindingKind::Script, Severity::Medium),
            ]
        );
    }
}
