//! Promotional popup dismissal

use serde::Serialize;
use std::time::Duration;

use lumimeds_common::Viewport;

use crate::context::TestContext;
use crate::error::E2eResult;
use crate::protocol::WaitState;

const CLOSE_CLICK_TIMEOUT: Duration = Duration::from_secs(5);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// How a popup went away, or didn't
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PopupOutcome {
    NotPresent,
    ClosedBySelector,
    ClosedByEscape,
    ClosedByCoordinates,
    StillVisible,
}

impl PopupOutcome {
    /// Nothing is left covering the page
    pub fn is_clear(&self) -> bool {
        !matches!(self, PopupOutcome::StillVisible)
    }
}

/// Points near the top-right corner where close icons usually sit
fn corner_points(viewport: Viewport) -> [(f64, f64); 3] {
    let w = viewport.width as f64;
    [(w - 20.0, 20.0), (w - 40.0, 40.0), (w - 60.0, 60.0)]
}

/// Selector of an overlay still on screen after giving it a moment to animate out
async fn remaining_overlay(ctx: &mut TestContext, overlays: &[String]) -> E2eResult<Option<String>> {
    let Some(overlay) = ctx.session.first_visible(overlays).await? else {
        return Ok(None);
    };
    if ctx.session.wait_for(&overlay, WaitState::Hidden, SETTLE_TIMEOUT).await? {
        return Ok(None);
    }
    Ok(Some(overlay))
}

/// Close whatever promotional popup is covering the page.
///
/// Close buttons are tried first, then Escape, and only then blind clicks in
/// the top-right corner. The last step is a known weak spot: it can land on
/// page content when the overlay has no close icon there.
///
/// With nothing on screen this only probes, so calling it again is a no-op.
pub async fn close_popup(ctx: &mut TestContext, close: &[String], overlays: &[String]) -> E2eResult<PopupOutcome> {
    let mut outcome = PopupOutcome::NotPresent;

    if let Some(button) = ctx.session.first_visible(close).await? {
        match ctx.session.click_with(&button, CLOSE_CLICK_TIMEOUT, false).await {
            Ok(()) => {
                ctx.log(format!("✓ Closed popup via {}", button));
                outcome = PopupOutcome::ClosedBySelector;
            }
            Err(e) => ctx.log(format!("ℹ️ Popup close button {} not clickable: {}", button, e)),
        }
    }

    let Some(overlay) = remaining_overlay(ctx, overlays).await? else {
        if outcome == PopupOutcome::NotPresent {
            ctx.log("ℹ️ No popup found");
        }
        return Ok(outcome);
    };

    ctx.log(format!("ℹ️ Overlay {} still visible, pressing Escape", overlay));
    ctx.session.press(None, "Escape").await?;
    if remaining_overlay(ctx, overlays).await?.is_none() {
        ctx.log("✓ Closed popup via Escape");
        return Ok(PopupOutcome::ClosedByEscape);
    }

    ctx.log("⚠️ Falling back to corner clicks to close the popup");
    let viewport = ctx.session.viewport().await?;
    for (x, y) in corner_points(viewport) {
        ctx.session.mouse_click(x, y).await?;
        if remaining_overlay(ctx, overlays).await?.is_none() {
            ctx.log(format!("✓ Closed popup by clicking at ({}, {})", x, y));
            return Ok(PopupOutcome::ClosedByCoordinates);
        }
    }

    ctx.log("⚠️ Popup still visible after every fallback");
    Ok(PopupOutcome::StillVisible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBrowser;
    use lumimeds_common::HarnessConfig;
    use std::sync::Arc;

    const CLOSE: &str = "[aria-label=\"Close\"]";
    const OVERLAY: &str = "[role=\"dialog\"]";

    fn selectors() -> (Vec<String>, Vec<String>) {
        (vec![CLOSE.to_string()], vec![OVERLAY.to_string()])
    }

    fn context(fake: &FakeBrowser) -> TestContext {
        TestContext::new(fake.session(), Arc::new(HarnessConfig::default()), "popup")
    }

    #[tokio::test]
    async fn test_close_button_dismisses_popup() {
        let fake = FakeBrowser::new("https://lumimeds.com/ad/holiday-weight-goals");
        fake.show(&[CLOSE, OVERLAY]);
        fake.state().hides.insert(CLOSE.into(), vec![CLOSE.into(), OVERLAY.into()]);

        let (close, overlays) = selectors();
        let mut ctx = context(&fake);
        let outcome = close_popup(&mut ctx, &close, &overlays).await.unwrap();
        assert_eq!(outcome, PopupOutcome::ClosedBySelector);
        assert!(!fake.commands().contains(&"press".to_string()));
    }

    #[tokio::test]
    async fn test_escape_before_coordinates() {
        let fake = FakeBrowser::new("https://lumimeds.com/ad/glp1-weight-loss");
        fake.show(&[OVERLAY]);
        fake.state().escape_hides.push(OVERLAY.into());

        let (close, overlays) = selectors();
        let mut ctx = context(&fake);
        let outcome = close_popup(&mut ctx, &close, &overlays).await.unwrap();
        assert_eq!(outcome, PopupOutcome::ClosedByEscape);
        assert!(!fake.commands().contains(&"mouse_click".to_string()));
    }

    #[tokio::test]
    async fn test_coordinate_fallback_and_still_visible() {
        let fake = FakeBrowser::new("https://lumimeds.com/ad/semaglutide");
        fake.show(&[OVERLAY]);
        fake.state().mouse_hides.push(OVERLAY.into());

        let (close, overlays) = selectors();
        let mut ctx = context(&fake);
        assert_eq!(
            close_popup(&mut ctx, &close, &overlays).await.unwrap(),
            PopupOutcome::ClosedByCoordinates
        );

        fake.show(&[OVERLAY]);
        let outcome = close_popup(&mut ctx, &close, &overlays).await.unwrap();
        assert_eq!(outcome, PopupOutcome::StillVisible);
        assert!(!outcome.is_clear());
    }

    #[tokio::test]
    async fn test_idempotent_when_nothing_present() {
        let fake = FakeBrowser::new("https://lumimeds.com/ad/holiday-weight-goals");
        let (close, overlays) = selectors();
        let mut ctx = context(&fake);

        for _ in 0..3 {
            assert_eq!(
                close_popup(&mut ctx, &close, &overlays).await.unwrap(),
                PopupOutcome::NotPresent
            );
        }
        let commands = fake.commands();
        assert!(commands.iter().all(|c| c == "visible"), "{:?}", commands);
        assert_eq!(fake.state().url, "https://lumimeds.com/ad/holiday-weight-goals");
    }

    #[test]
    fn test_corner_points_stay_inside_viewport() {
        for (x, y) in corner_points(Viewport::IPHONE_PRO_MAX) {
            assert!(x > 0.0 && x < 430.0);
            assert!(y > 0.0 && y < 932.0);
        }
    }
}
