//! Run setup: start page, setup evidence and the optional login gate

use crate::context::RunContext;
use crate::report::{FORM_SNAPSHOT_AFTER_LOGIN, LOGIN_VERIFICATION_FILE};
use chrono::Utc;
use journey_browser::guards::{check_for_error_page, handle_cookie_banner, stabilize};
use journey_browser::ScreenshotOptions;
use journey_capture::form_snapshot;
use journey_core::fail_open::fail_open_sync;
use journey_core::{redact_url, NetworkKind, Result};
use serde::Serialize;
use serde_json::json;
use std::io::IsTerminal;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Navigate to the start URL and get the page into a known state
///
/// An error page at the start URL is an error: there is nothing to test.
pub async fn run_setup(ctx: &mut RunContext) -> Result<()> {
    let timeouts = ctx.config.timeouts;
    let start_url = ctx.start_url.clone();
    let parsed = Url::parse(&start_url).ok();
    ctx.mark(
        "goto",
        json!({
            "url": redact_url(&start_url),
            "had_query": parsed.as_ref().is_some_and(|u| u.query().is_some()),
            "had_fragment": parsed.as_ref().is_some_and(|u| u.fragment().is_some()),
        }),
    )
    .await;

    info!("Opening start URL {}", redact_url(&start_url));
    let page = ctx.page.clone();
    page.goto(&start_url).await?;
    stabilize(page.as_ref(), &timeouts).await;
    ctx.screenshot("_setup_00_initial.png", ScreenshotOptions::step())
        .await;

    if let Err(e) = handle_cookie_banner(page.as_ref(), &timeouts).await {
        debug!("Cookie banner handling failed: {}", e);
    }
    ctx.screenshot("_setup_01_ready.png", ScreenshotOptions::stabilized())
        .await;
    check_for_error_page(page.as_ref()).await?;
    ctx.drain_network().await;

    if ctx.config.pause_for_login {
        wait_for_login(Duration::from_secs(ctx.config.pause_for_login_seconds)).await;
        after_login(ctx).await;
    }
    Ok(())
}

/// ENTER on an interactive terminal, otherwise a timed wait
async fn wait_for_login(fallback: Duration) {
    if std::io::stdin().is_terminal() {
        info!("Log in in the browser window, then press ENTER to continue");
        let read = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)
        })
        .await;
        if matches!(read, Ok(Ok(n)) if n > 0) {
            return;
        }
    }
    info!("Waiting {}s for login", fallback.as_secs());
    tokio::time::sleep(fallback).await;
}

async fn after_login(ctx: &mut RunContext) {
    ctx.drain_network().await;
    ctx.screenshot("_setup_02_after_login.png", ScreenshotOptions::stabilized())
        .await;
    match form_snapshot(ctx.page.as_ref()).await {
        Ok(snapshot) => {
            let written = ctx
                .capture
                .store()
                .write_plain(FORM_SNAPSHOT_AFTER_LOGIN, &snapshot);
            fail_open_sync("setup::form_snapshot", &ctx.gaps, written);
        }
        Err(e) => debug!("Form snapshot after login failed: {}", e),
    }
    if ctx.config.verify_login {
        verify_login(ctx).await;
    }
}

/// `login_verification.json`
#[derive(Debug, Clone, Serialize)]
pub struct LoginVerification {
    pub ok: bool,
    pub status: Option<u16>,
    pub url: Option<String>,
    pub ts: String,
    pub note: String,
}

fn is_user_endpoint(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("/app/authproxy/") && lower.contains("/user")
}

/// Reload and wait for the auth proxy's `/user` call to answer 200
pub async fn verify_login(ctx: &mut RunContext) -> LoginVerification {
    let timeout = ctx.config.timeouts.verify_login();
    let poll = ctx.config.timeouts.poll();
    ctx.mark(
        "login_verification_start",
        json!({"timeout_seconds": timeout.as_secs()}),
    )
    .await;
    if let Err(e) = ctx.page.reload().await {
        debug!("Reload before login verification failed: {}", e);
    }

    let deadline = Instant::now() + timeout;
    let confirmed = loop {
        let found = ctx.drain_network().await.into_iter().find(|event| {
            event.kind == NetworkKind::Response
                && event.status == Some(200)
                && is_user_endpoint(&event.url)
        });
        if found.is_some() || Instant::now() >= deadline {
            break found;
        }
        tokio::time::sleep(poll).await;
    };

    let verification = LoginVerification {
        ok: confirmed.is_some(),
        status: confirmed.as_ref().and_then(|e| e.status),
        url: confirmed.map(|e| e.url),
        ts: Utc::now().to_rfc3339(),
        note: "Expected authproxy /user to return 200 after manual login.".to_string(),
    };
    if verification.ok {
        info!("Login verified");
    } else {
        warn!("Login not confirmed within {}s", timeout.as_secs());
    }

    let written = serde_json::to_value(&verification)
        .map_err(Into::into)
        .and_then(|doc| ctx.capture.store().write_plain(LOGIN_VERIFICATION_FILE, &doc));
    fail_open_sync("setup::login_verification", &ctx.gaps, written);
    ctx.mark(
        "login_verification_result",
        json!({"ok": verification.ok, "status": verification.status, "url": verification.url}),
    )
    .await;
    verification
}
