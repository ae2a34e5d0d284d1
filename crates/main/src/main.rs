//! 主应用程序入口
//!
//! 装配持久化、认证与聊天核心，启动 Axum Web API 服务。

use std::{sync::Arc, time::Duration};

use application::{
    BroadcastEngine, Clock, ConnectionHub, RoomRegistry, RoomRegistryDependencies,
    SessionDependencies, SystemClock,
};
use config::AppConfig;
use domain::{RoomRepository, Store, TokenVerifier, UserDirectory};
use infrastructure::{
    create_pg_pool, JwtAuthService, PgRoomRepository, PgStore, PgUserDirectory,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app_config = AppConfig::from_env_with_defaults();

    tracing::info!(
        "连接数据库: {}",
        app_config
            .database
            .url
            .split('@')
            .next_back()
            .unwrap_or("unknown")
    );

    let pg_pool = create_pg_pool(
        &app_config.database.url,
        app_config.database.max_connections,
    )
    .await?;

    // 运行迁移
    sqlx::migrate!("../../migrations").run(&pg_pool).await?;

    // 持久化与认证协作者
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pg_pool.clone()));
    let rooms: Arc<dyn RoomRepository> = Arc::new(PgRoomRepository::new(pg_pool.clone()));
    let directory: Arc<dyn UserDirectory> = Arc::new(PgUserDirectory::new(pg_pool));
    let verifier: Arc<dyn TokenVerifier> = Arc::new(JwtAuthService::new(&app_config.jwt));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // 聊天核心
    let hub = Arc::new(ConnectionHub::new());
    let engine = Arc::new(BroadcastEngine::new(
        hub.clone(),
        Duration::from_millis(app_config.chat.send_timeout_ms),
    ));

    let registry = Arc::new(RoomRegistry::new(RoomRegistryDependencies {
        rooms,
        store: store.clone(),
        hub: hub.clone(),
        engine: engine.clone(),
        clock: clock.clone(),
    }));

    let session_deps = Arc::new(SessionDependencies {
        verifier,
        directory,
        store,
        registry: registry.clone(),
        hub,
        engine,
        clock,
        replay_limit: app_config.chat.replay_limit,
    });

    let state = AppState::new(registry, session_deps, app_config.chat.clone());

    // 启动 Web 服务器
    let app = router(state);
    let bind_addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("聊天服务器启动在 http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
