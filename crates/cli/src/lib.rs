//! LumiMeds E2E reporting CLI
//!
//! Posts run summaries to Slack and uploads recorded videos to Google Drive
//! or Slack. Reads the report the browser harness writes.

pub mod commands;
pub mod github;
pub mod output;
