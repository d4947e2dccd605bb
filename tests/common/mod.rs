use engagee::{app, auth::SessionKeys, db::connect_memory, rtc::TokenBuilder, AppState};
use tokio::net::TcpListener;

pub const APP_ID: &str = "0123456789abcdef0123456789abcdef";

/// Serves the whole app on an ephemeral port over a fresh in-memory database.
pub async fn spawn_app() -> String {
    let app_state = AppState {
        db_pool: connect_memory().await.unwrap(),
        keys: SessionKeys::new(b"test-secret"),
        tokens: TokenBuilder::new(APP_ID, "fedcba9876543210fedcba9876543210"),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(app_state)).await.unwrap();
    });
    format!("http://{addr}")
}
