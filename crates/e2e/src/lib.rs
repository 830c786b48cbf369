//! LumiMeds browser E2E harness
//!
//! Drives real browsers through a Node Playwright bridge and checks the
//! marketing landing pages, the onboarding funnel, checkout and login gating.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TestRunner (Rust)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  scenarios × projects  ──buffer_unordered──▶  attempts      │
//! │    └── TestContext { BrowserSession, HarnessConfig, log }   │
//! │          └── page objects (AdPage, CheckoutPage, ...)       │
//! │                └── BrowserSession ──JSON lines──▶ node      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Catalog (YAML)                                             │
//! │    ├── defaults: selectors, footer links, retries           │
//! │    ├── languages: es                                        │
//! │    └── pages: [slug, tags, overrides]                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod bridge;
pub mod catalog;
pub mod context;
pub mod error;
pub mod links;
pub mod pages;
pub mod playwright;
pub mod protocol;
pub mod runner;
pub mod scenarios;

#[cfg(test)]
mod testing;

pub use catalog::{Catalog, PageDefinition};
pub use context::TestContext;
pub use error::{E2eError, E2eResult};
pub use playwright::BrowserSession;
pub use runner::{RunnerConfig, TestRunner};
pub use scenarios::Scenario;
