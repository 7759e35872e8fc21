pub mod application;
pub mod assignment;
pub mod forms;
pub mod identifier;
pub mod reviewer;

pub use application::{Application, ApplicationDetails, ApplicationStatus, FileCategory, FileMeta};
pub use assignment::{AssignedForm, Assignment, Slot, SlotStatus};
pub use forms::{FormHeader, FormKind, FormRecord, ReviewForm};
pub use identifier::{current_year, initials, SubmissionId};
pub use reviewer::{Reviewer, ReviewerIdentity, ReviewerSummary, SeedReviewer};
