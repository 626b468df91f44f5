/// Fjall-based persistence for tasks, files, sensors and groups
///
/// Documents are stored as JSON in one partition per collection, with
/// secondary index partitions for the natural keys that must stay unique:
///
/// - Task name (`task_names`)
/// - Sensor managed-object triple (`sensor_index`)
/// - Group managed object id (`group_index`)
///
/// Files created by a task are also indexed by task, sensor and file name
/// (`file_task_index`) so result handling never scans the file collection.
///
/// The rest of the crate only sees the repository traits in [`repository`];
/// [`FjallStore`] implements all of them.
///
/// ## Usage
///
/// ```rust,ignore
/// use sensorbox::ledger::{FjallStore, Repositories};
///
/// let store = FjallStore::open("data/ledger")?;
/// let repos = Repositories::from_store(store);
/// let task = repos.tasks.find_by_name("nightly-fetch").await?;
/// ```

pub mod error;
pub mod partitions;
pub mod query;
pub mod repository;
pub mod store;

pub use error::{LedgerError, Result};
pub use query::{Page, PageInfo, Paging, SortField, TaskFilter, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use repository::{
    FilePatch, FileRepository, GroupRepository, Repositories, SensorRepository, TaskPatch,
    TaskRepository,
};
pub use store::{FjallStore, StoreStats};
