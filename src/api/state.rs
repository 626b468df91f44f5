use std::sync::Arc;

use crate::config::Config;
use crate::files::FileService;
use crate::ledger::FjallStore;
use crate::messaging::MessageBus;
use crate::observability::Metrics;
use crate::tasks::TaskService;
use crate::users::UserService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: FjallStore,
    pub bus: Arc<dyn MessageBus>,
    pub tasks: TaskService,
    pub files: FileService,
    pub users: UserService,
    pub metrics: Arc<Metrics>,
}
