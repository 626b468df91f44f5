use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, routing::get, routing::post};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::info;

use super::{
    services::{
        create_task, delete_files, get_task, health, publish_user, request_visibility,
        search_tasks, set_task_mode,
    },
    state::AppState,
};
use crate::config::Config;
use crate::files::FileService;
use crate::handlers::HandlerRegistry;
use crate::ledger::{FjallStore, Repositories};
use crate::messaging::{InProcessBus, MessageBus, MessageConsumer, MessageProducer, SchemaRegistry};
use crate::observability::Metrics;
use crate::tasks::TaskService;
use crate::users::UserService;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything a running instance needs, wired over one store and one bus
pub struct App {
    pub state: AppState,
    pub consumer: MessageConsumer,
}

impl App {
    pub fn new(config: Config, store: FjallStore, bus: Arc<dyn MessageBus>) -> Self {
        let config = Arc::new(config);
        let repos = Repositories::from_store(store.clone());
        let registry = Arc::new(SchemaRegistry::standard());
        let metrics = Arc::new(Metrics::new());

        let producer = MessageProducer::new(
            bus.clone(),
            registry.clone(),
            config.messaging.exchange.clone(),
            metrics.clone(),
        );
        let consumer = MessageConsumer::new(
            registry,
            Arc::new(HandlerRegistry::with_defaults(repos.clone())),
            config.messaging.prefetch,
            metrics.clone(),
        );

        let state = AppState {
            tasks: TaskService::new(repos.clone(), producer.clone(), metrics.clone()),
            files: FileService::new(repos.files.clone(), producer.clone()),
            users: UserService::new(producer),
            config,
            store,
            bus,
            metrics,
        };

        Self { state, consumer }
    }
}

pub fn router(state: AppState) -> Router {
    let max_body_bytes = state.config.server.max_body_bytes;

    Router::new()
        .route("/tasks", post(create_task).get(search_tasks))
        .route("/tasks/mode", post(set_task_mode))
        .route("/tasks/{id}", get(get_task))
        .route("/files/delete", post(delete_files))
        .route("/files/{id}/visibility", post(request_visibility))
        .route("/users", post(publish_user))
        .route("/health", get(health))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                // Automatically decompress gzip request bodies
                .layer(RequestDecompressionLayer::new())
                .layer(DefaultBodyLimit::max(max_body_bytes)),
        )
}

pub async fn run(config: Config) -> Result<(), AnyError> {
    info!(path = %config.server.fjall_path.display(), "Opening Fjall store");
    let store = FjallStore::open(&config.server.fjall_path)?;

    let bus: Arc<dyn MessageBus> = Arc::new(InProcessBus::new(config.messaging.channel_capacity));
    let address = config.server.bind_addr;
    let app = App::new(config, store.clone(), bus.clone());

    let consumer = app.consumer.spawn(bus).await?;

    let listener = TcpListener::bind(address).await?;
    info!(%address, "SensorBox API listening");

    axum::serve(listener, router(app.state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    consumer.shutdown();
    store.persist()?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
