//! 集成测试共用的应用装配：真实监听端口 + 内存协作者。

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use application::{
    BroadcastEngine, Clock, ConnectionHub, RoomRegistry, RoomRegistryDependencies,
    SessionDependencies, SystemClock,
};
use config::{ChatConfig, JwtConfig};
use domain::{Role, Room, RoomName, RoomRepository, Store, TokenVerifier, UserDirectory, Username};
use infrastructure::{
    InMemoryRoomRepository, InMemoryStore, InMemoryUserDirectory, JwtAuthService,
};
use tokio::net::TcpListener;
use web_api::{router, AppState};

pub struct TestApp {
    pub addr: SocketAddr,
    jwt: JwtAuthService,
}

impl TestApp {
    pub fn token_for(&self, username: &str, role: Role) -> String {
        self.jwt
            .issue_token(&Username::parse(username).expect("valid username"), role)
            .expect("token issued")
    }

    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, room: &str, token: Option<&str>) -> String {
        match token {
            Some(token) => format!("ws://{}/ws/{}?token={}", self.addr, room, token),
            None => format!("ws://{}/ws/{}", self.addr, room),
        }
    }
}

/// 启动一个完整的测试服务：内存存储、内存房间仓储、真实 JWT 验证。
/// 预置 `general`（开放）与 `admin_room`（受限）两个房间，以及
/// alice/bob/carol/root 四个用户（root 为管理员）。
pub async fn spawn_app() -> TestApp {
    let jwt_config = JwtConfig {
        secret: "test-secret-key".to_string(),
        expiration_hours: 24,
    };
    let chat = ChatConfig::default();

    let hub = Arc::new(ConnectionHub::new());
    let engine = Arc::new(BroadcastEngine::new(
        hub.clone(),
        Duration::from_millis(chat.send_timeout_ms),
    ));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let rooms: Arc<dyn RoomRepository> = Arc::new(InMemoryRoomRepository::new());
    let root = Username::parse("root").expect("valid username");
    for (name, restricted) in [("general", false), ("admin_room", true)] {
        rooms
            .insert(Room::new(
                RoomName::parse(name).expect("valid room name"),
                None,
                restricted,
                root.clone(),
                clock.now(),
            ))
            .await
            .expect("seed room");
    }

    let directory: Arc<dyn UserDirectory> = Arc::new(InMemoryUserDirectory::with_users([
        "alice", "bob", "carol", "root",
    ]));
    let verifier: Arc<dyn TokenVerifier> = Arc::new(JwtAuthService::new(&jwt_config));

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
        replay_limit: chat.replay_limit,
    });

    let state = AppState::new(registry, session_deps, chat);
    let app = router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    TestApp {
        addr,
        jwt: JwtAuthService::new(&jwt_config),
    }
}
