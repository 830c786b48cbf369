//! LumiMeds E2E common library
//!
//! Configuration, fixtures, URL helpers and the result-report schema shared
//! by the browser harness and the reporting CLI.

pub mod config;
pub mod error;
pub mod fixtures;
pub mod report;
pub mod urls;

pub use config::{BrowserKind, Credentials, HarnessConfig, Project, TestEnv, Timeouts, Viewport};
pub use error::{Error, Result};
pub use fixtures::{Address, Coupon, PaymentCard, TestIdentity};
pub use report::{Report, Summary};

/// Suite version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
