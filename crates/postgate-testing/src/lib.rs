//! Testing utilities for postgate workflows.
//!
//! Every collaborator has an in-memory fake that records its calls and can
//! be told to fail, so tests can assert both outcomes and side effects.
//!
//! ```rust,ignore
//! use postgate_testing::{candidate, TestHarness};
//!
//! let harness = TestHarness::new();
//! harness.records.fail_puts(true);
//!
//! let err = harness
//!     .orchestrator()
//!     .submit(SubmissionRequest::new("u1", candidate("cat", "animals")))
//!     .await
//!     .unwrap_err();
//! assert_eq!(err.failed_steps(), vec![FanOutStep::PersistRecord]);
//! ```

mod guard;
mod harness;
mod records;
mod resources;
mod scheduler;

pub use guard::FlakyGuardStore;
pub use harness::{candidate, TestHarness};
pub use records::{MemoryRecordStore, RecordOp};
pub use resources::{Attachment, FakeResourceService};
pub use scheduler::RecordingScheduler;
