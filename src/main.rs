use gerardify::{
    api::{
        cors::{add_cors_headers, cors_preflight},
        router::{route, AppState},
    },
    assets::DiskStore,
    db,
};

use dotenvy::dotenv;
use std::{
    convert::Infallible,
    env::var,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tower::ServiceBuilder;

use axum::{
    body::Body,
    extract::connect_info::ConnectInfo,
    http::{Method, Request},
    middleware::{from_fn, Next},
    response::Response,
    serve,
};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::net::TcpListener;
use tower::limit::RateLimitLayer;

// upload cap has drifted between 3MB and 50MB over the life of this thing,
// so it stays configurable; this is the floor
const DEFAULT_MAX_UPLOAD: usize = 3 * 1024 * 1024;

#[tokio::main]
async fn main() {
    dotenv().ok();

    let port: u16 = var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(5000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let url = var("DATABASE_URL").unwrap_or_else(|_| "sqlite://gerardify.db?mode=rwc".to_string());
    let media_dir = var("MEDIA_DIR").unwrap_or_else(|_| "./media".to_string());
    let max_upload_bytes = var("MAX_UPLOAD_BYTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_UPLOAD);

    println!("\nDatabase: {url}");
    println!("Listening on http://{addr}");

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("Failed to connect to sqlite. Is DATABASE_URL sane?");

    db::init(&pool).await.expect("Failed to initialize schema.");

    let store = DiskStore::new(&media_dir);
    store
        .ensure_root()
        .await
        .expect("Failed to create media directory.");

    let state = AppState {
        pool,
        assets: Arc::new(store),
        media_dir: media_dir.into(),
        max_upload_bytes,
    };

    // base router with request logging/cors middleware
    let app = route(state).layer(from_fn(handle_request));

    let make_service = ServiceBuilder::new()
        .layer(RateLimitLayer::new(20, Duration::from_secs(1)))
        .service(app.into_make_service_with_connect_info::<SocketAddr>());

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");

    if let Err(err) = serve(listener, make_service).await {
        eprintln!("Server error: {err}");
    }
}

// general sendback handler
async fn handle_request(req: Request<Body>, next: Next) -> Result<Response, Infallible> {
    let start: Instant = Instant::now();
    let path: String = req.uri().path().to_owned();
    let method: &Method = req.method();

    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    // options preflight
    if method == Method::OPTIONS {
        return Ok(cors_preflight());
    }

    // route to api
    let mut response = next.run(req).await;

    // add headers and print how long it took
    add_cors_headers(&mut response);
    let duration_us = start.elapsed().as_micros();

    println!(
        "{}{} {} - {}μs",
        remote_addr.map(|a| format!("{a} ")).unwrap_or_default(),
        path,
        response.status(),
        duration_us
    );

    Ok(response)
}
