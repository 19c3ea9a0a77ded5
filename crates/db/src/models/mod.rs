pub mod commit;
pub mod push_event;

pub use commit::{NewCommit, NewCommitRole};
pub use push_event::PushEvent;
