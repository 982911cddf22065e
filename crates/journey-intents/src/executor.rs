//! Intent dispatch
//!
//! Every catalog entry maps to one async function. Errors raised inside an
//! intent (a detached page, a failed click) become a `Fail` on the page the
//! step started on, so the orchestrator always gets an outcome.

use crate::outcome::{IntentContext, IntentOutcome};
use crate::{anchors, checkout, dealer, evidence, financing, forms, slider};
use journey_browser::PageHandle;
use journey_core::{IntentKind, IntentStep, Result};
use tracing::{debug, warn};

async fn dispatch(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
    step: &IntentStep,
) -> Result<IntentOutcome> {
    let params = &step.params;
    match step.intent {
        IntentKind::StartCheckout => checkout::start_checkout(ctx, page).await,
        IntentKind::AssertCheckoutLoaded => checkout::assert_checkout_loaded(ctx, page).await,
        IntentKind::AssertTabSliderPresent => {
            slider::assert_tab_slider_present(ctx, page, params).await
        }
        IntentKind::NavigateToTab => slider::navigate_to_tab(ctx, page, params).await,
        IntentKind::AssertActiveTab => slider::assert_active_tab(ctx, page, params).await,
        IntentKind::AssertPriceBoxPresent => {
            anchors::assert_price_box_present(ctx, page, params).await
        }
        IntentKind::AssertStickyBarPresent => {
            anchors::assert_sticky_bar_present(ctx, page, params).await
        }
        IntentKind::AssertStickyBehaviorOnScroll => {
            anchors::assert_sticky_behavior_on_scroll(ctx, page).await
        }
        IntentKind::AssertSummarySections => {
            anchors::assert_summary_sections(ctx, page, params).await
        }
        IntentKind::AssertThankYou => anchors::assert_thank_you(ctx, page, params).await,
        IntentKind::SearchDealer => dealer::search_dealer(ctx, page, params).await,
        IntentKind::AssertDealerResults => dealer::assert_dealer_results(ctx, page, params).await,
        IntentKind::SelectDealer => dealer::select_dealer(ctx, page, params).await,
        IntentKind::AssertPickupOptions => dealer::assert_pickup_options(ctx, page, params).await,
        IntentKind::SelectPickup => dealer::select_pickup(ctx, page, params).await,
        IntentKind::OpenFinancingLayer => financing::open_financing_layer(ctx, page, params).await,
        IntentKind::ChangeFinancingParameter => {
            financing::change_financing_parameter(ctx, page, params).await
        }
        IntentKind::FillPersonalDataRequired => forms::fill_personal_data_required(ctx, page).await,
        IntentKind::AssertNextStepGate => forms::assert_next_step_gate(ctx, page, params).await,
        IntentKind::AssertDucEntrypointCaptured => {
            evidence::assert_duc_entrypoint_captured(ctx, page).await
        }
    }
}

/// Run one intent step against `page`
pub async fn execute(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
    step: &IntentStep,
) -> IntentOutcome {
    debug!("Executing intent {:?}", step.intent);
    match dispatch(ctx, page.clone(), step).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Intent {:?} errored: {}", step.intent, e);
            IntentOutcome::fail(page, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use journey_browser::mock::{MockElement, MockPage};
    use journey_core::{IntentParams, Verdict};
    use std::sync::Arc;

    fn step(intent: IntentKind, params: IntentParams) -> IntentStep {
        IntentStep {
            intent,
            label: None,
            params,
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_intent() {
        let mut harness = Harness::new();
        let page = Arc::new(MockPage::new("https://shop.example/de/checkout.html"));
        page.add(MockElement::new("div").test_id("nav-bar").text("Fahrzeug"));
        page.add(MockElement::button("Weiter").test_id("cta-next-step"));

        let outcome = execute(
            &mut harness.ctx(),
            page,
            &step(IntentKind::AssertCheckoutLoaded, IntentParams::default()),
        )
        .await;
        assert_eq!(outcome.verdict, Verdict::Pass, "{}", outcome.message);
    }

    #[tokio::test]
    async fn test_errors_become_failures() {
        let mut harness = Harness::new();
        let page = Arc::new(MockPage::new("https://shop.example/de/checkout.html"));
        page.close();
        let outcome = execute(
            &mut harness.ctx(),
            page,
            &step(IntentKind::AssertCheckoutLoaded, IntentParams::default()),
        )
        .await;
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert_eq!(outcome.message, "Browser error: target closed");
    }
}
