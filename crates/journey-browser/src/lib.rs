//! Browser layer for the checkout journey runner
//!
//! Everything that touches a live page goes through the [`Page`] trait. The
//! Chrome DevTools Protocol implementation lives in [`browser`]; tests use
//! [`mock::MockPage`] (enable the `mock` feature from other crates).
//!
//! # Architecture
//!
//! - [`page`]: the `Page` seam, typed element queries and wait helpers
//! - [`browser`]: Chrome lifecycle and the CDP-backed page
//! - [`locator`]: charter hints → element, in fixed strategy order
//! - [`inventory`]: ranked snapshots of visible interactive elements
//! - [`discovery`]: discovery and auto-repair fallback clicks
//! - [`guards`]: cookie banners, error pages, settling, page heuristics
//! - [`screenshot`]: screenshot evidence
//!
//! # Requirements
//!
//! - Chrome or Chromium installed for [`browser::BrowserSession`]

pub mod browser;
pub mod discovery;
pub mod guards;
pub mod inventory;
pub mod locator;
pub mod page;
pub mod screenshot;
mod script;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use browser::{BrowserConfig, BrowserSession, ChromePage, HttpCredentials};
pub use discovery::{auto_repair_click, discovery_click, FallbackClick};
pub use inventory::{InventoryBudget, InventorySnapshot};
pub use journey_core::{JourneyError, Result};
pub use locator::{resolve, Resolution};
pub use page::{
    ElementInfo, ElementQuery, ElementTarget, FormField, FrameRef, NetworkSink, Page, PageHandle,
    SelectOption, TextMatch,
};
pub use screenshot::{capture_to_file, ScreenshotOptions};
