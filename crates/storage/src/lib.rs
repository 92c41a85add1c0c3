pub mod session;
pub mod submission;

pub use session::{PlatformSessionStore, SessionRecord};
pub use submission::{SubmissionLog, SubmissionRecord};
