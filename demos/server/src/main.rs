//! Demo backend wired entirely with in-memory collaborators.
//!
//! Run with: cargo run -p relay-server-demo
//!
//! Connect a WebSocket client to ws://localhost:3000/ws and send:
//! `{"event":"sendMessage","accessToken":"dev-token","conversationId":"c1","message":"hi"}`

use std::{net::SocketAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_relay_bridge::{BridgeConfig, CommandBridge, PubSub, pubsub::memory::MemoryPubSub};
use agent_relay_core::{
    AgentRun, AgentRunner, MemoryMetrics, RunChunk, RunMetrics, RunRequest, StaticTokenVerifier,
    traits::{MediaError, MediaStore, MetricsSink, NoopContextSource, RunError},
};
use agent_relay_session::{
    SessionConfig, SessionStore, backend::memory::MemoryStore, sandbox::NoopSandboxClient,
};
use agent_relay_stream::{StreamConfig, StreamMultiplexer, TurnComposer};
use agent_relay_tasks::{
    ExecutorConfig, SchedulerConfig, TaskExecutor, TaskScheduler, TaskStore,
    store::memory::MemoryTaskStore,
};
use agent_relay_transport::{AppContext, websocket};

/// Stand-in agent: echoes the message back as coordinator output.
struct EchoRunner;

#[async_trait]
impl AgentRunner for EchoRunner {
    async fn start(&self, request: RunRequest) -> Result<AgentRun, RunError> {
        let reply = format!("You said: {}", request.message);
        let chunks = vec![Ok(RunChunk::content("coordinator", reply).with_metrics(
            RunMetrics {
                input_tokens: 1,
                output_tokens: 1,
            },
        ))];
        Ok(AgentRun {
            events: futures::stream::iter(chunks).boxed(),
        })
    }
}

/// Media store with nothing in it.
struct EmptyMediaStore;

#[async_trait]
impl MediaStore for EmptyMediaStore {
    async fn download(&self, path: &str) -> Result<bytes::Bytes, MediaError> {
        Err(MediaError::NotFound(path.to_string()))
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let sessions = Arc::new(SessionStore::new(
        Arc::new(MemoryStore::new()),
        Arc::new(NoopSandboxClient),
        SessionConfig::default(),
    ));
    let media: Arc<dyn MediaStore> = Arc::new(EmptyMediaStore);
    let runner: Arc<dyn AgentRunner> = Arc::new(EchoRunner);
    let metrics: Arc<dyn MetricsSink> = Arc::new(MemoryMetrics::new());
    let pubsub: Arc<dyn PubSub> = Arc::new(MemoryPubSub::new());

    let composer = Arc::new(TurnComposer::new(
        Arc::clone(&sessions),
        Arc::clone(&media),
        Arc::new(NoopContextSource),
    ));
    let multiplexer = Arc::new(StreamMultiplexer::new(
        Arc::clone(&runner),
        metrics,
        StreamConfig::default(),
    ));
    let bridge = Arc::new(CommandBridge::new(
        Arc::clone(&pubsub),
        Arc::clone(&media),
        BridgeConfig::default(),
    ));

    let ctx = Arc::new(AppContext::new(
        Arc::new(StaticTokenVerifier::new().with_token("dev-token", "dev-user")),
        sessions,
        composer,
        multiplexer,
        bridge,
        pubsub,
    ));

    // Background task scheduler
    let tasks: Arc<dyn TaskStore> = Arc::new(MemoryTaskStore::new());
    let executor = Arc::new(TaskExecutor::new(
        Arc::clone(&tasks),
        runner,
        ExecutorConfig::default(),
    ));
    let scheduler = Arc::new(TaskScheduler::new(
        tasks,
        executor,
        SchedulerConfig {
            poll_interval: Duration::from_secs(60),
        },
    ));
    let shutdown = CancellationToken::new();
    let scheduler_handle = scheduler.start(shutdown.clone());

    // Build router
    let app = websocket::router(ctx).layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    tracing::info!("server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind failed");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .expect("server failed");

    shutdown.cancel();
    let _ = scheduler_handle.await;
}
