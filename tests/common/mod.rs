//! Shared test utilities

#![allow(dead_code, unused_imports)]

pub mod mock_platform;

pub use mock_platform::{
    Call, FailOn, MockDirectory, MockPlatformService, MockPr, at, failed, passed, running, t0,
};

use pr_sisyphus::config::QueueSettings;
use pr_sisyphus::queue::Reconciler;
use pr_sisyphus::types::RepoRef;

/// Repository every single-repo test runs against
pub fn test_repo() -> RepoRef {
    RepoRef::new("acme", "widgets")
}

/// Reconciler with default labels and a 15 minute threshold
pub fn reconciler() -> Reconciler {
    Reconciler::new(QueueSettings::default())
}
