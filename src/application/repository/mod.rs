mod aggregate_repository;
mod errors;
mod recovery;
mod save_flags;

pub use aggregate_repository::{Repository, SaveContext};
pub use errors::{RepositoryError, Result};
pub use recovery::recover_unpublished;
pub use save_flags::{SaveFlags, SaveMode, SnapshotPolicy};
