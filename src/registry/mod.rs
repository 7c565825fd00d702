pub mod backup;
pub mod record;
pub mod repository;

pub use backup::{backup_registry, BACKUP_FILE_PREFIX};
pub use record::{NewRun, Run, RunStatus};
pub use repository::{RegistryError, RunRegistry};
