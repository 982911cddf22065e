use crate::outcome::{IntentContext, IntentOutcome};
use journey_browser::PageHandle;
use journey_capture::read_duc_continuation;
use journey_core::Result;

/// Look for the leasing continuation in the persisted response
///
/// Runs often end before the leasing call fires, so a missing capture only
/// warns.
pub(crate) async fn assert_duc_entrypoint_captured(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
) -> Result<IntentOutcome> {
    const INTENT: &str = "intent assert_duc_entrypoint_captured";

    let Some(continuation) = read_duc_continuation(ctx.run_dir) else {
        return Ok(IntentOutcome::warn(
            page,
            format!("{}: no leasing response captured yet", INTENT),
        ));
    };
    if continuation.continuation_links.is_empty() {
        return Ok(IntentOutcome::warn(
            page,
            format!(
                "{}: leasing response captured without continuation link (token present: {})",
                INTENT, continuation.token_present
            ),
        ));
    }
    let keys: Vec<&str> = continuation.continuation_links.keys().map(String::as_str).collect();
    Ok(IntentOutcome::pass(
        page,
        format!("{}: continuation link(s) captured: {}", INTENT, keys.join(", ")),
    ))
}
