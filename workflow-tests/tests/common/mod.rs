//! Common setup for workflow tests.

#![allow(dead_code)]

use azdo_core::config::PollSettings;
use workflow_tests::WorkflowTestContext;

/// Fresh provider and mock organization with millisecond poll timings.
pub async fn setup() -> WorkflowTestContext {
    WorkflowTestContext::new()
        .await
        .expect("Failed to create workflow test context")
}

/// Same as [`setup`] with custom poll timings.
pub async fn setup_with_poll(poll: PollSettings) -> WorkflowTestContext {
    WorkflowTestContext::with_poll(poll)
        .await
        .expect("Failed to create workflow test context")
}
