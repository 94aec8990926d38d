pub mod job;
pub mod request;
pub mod spec;

pub use job::{JobRecord, JobStatus, JobStatusView, JobSummary, JobTransition, NewJob};
pub use request::WorksheetRequest;
pub use spec::{Element, Position, Size, TextStyle, WorksheetSpec, PAGE_HEIGHT, PAGE_WIDTH};
