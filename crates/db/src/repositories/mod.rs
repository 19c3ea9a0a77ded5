pub mod commit_repo;
pub mod payload_repo;
pub mod push_event_repo;

pub use commit_repo::CommitRepo;
pub use payload_repo::PayloadRepo;
pub use push_event_repo::PushEventRepo;
