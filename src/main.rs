use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use artanalyx::{
    AppState, build_router,
    analysis::service::{AnalysisService, RateLimitPolicy},
    config::{Config, HistoryBackendKind},
    database::PgRecordStore,
    history::{FileHistoryStore, HistoryStore},
    infrastructure::{OpenAiVisionClient, VercelBlobStorage},
    rate_limit::RateLimiter,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

fn history_store(config: &Config) -> HistoryStore {
    let file_store = || HistoryStore::File(Arc::new(FileHistoryStore::new(&config.history_dir)));

    match (config.history_backend, config.redis_url.as_deref()) {
        (HistoryBackendKind::Redis, Some(url)) => match redis::Client::open(url) {
            Ok(client) => {
                tracing::info!("Using Redis history backend");
                HistoryStore::Redis(Arc::new(client))
            }
            Err(e) => {
                tracing::warn!("Invalid REDIS_URL, falling back to file history: {}", e);
                file_store()
            }
        },
        (HistoryBackendKind::Redis, None) => {
            tracing::warn!("HISTORY_BACKEND=redis without REDIS_URL, using file history");
            file_store()
        }
        (HistoryBackendKind::File, _) => {
            tracing::info!("Using file history backend at {}", config.history_dir);
            file_store()
        }
    }
}

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Arc::new(Config::from_env().expect("Failed to load configuration"));

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 数据库只用于审计记录，连接失败不影响启动
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'artanalyx';").await?;
                Ok(())
            })
        })
        .connect_lazy(&config.database_url)
        .expect("Invalid DATABASE_URL");

    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::warn!("Database migration skipped: {}", e);
    }

    // 限流器及定期清理
    let limiter = Arc::new(RateLimiter::new(config.rate_limit_max_keys));
    {
        let limiter = limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RATE_LIMIT_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let removed = limiter.sweep_expired();
                if removed > 0 {
                    tracing::debug!(
                        "Swept {} expired rate limit records, {} tracked",
                        removed,
                        limiter.tracked_keys()
                    );
                }
            }
        });
    }

    let http = reqwest::Client::new();
    let history = history_store(&config);

    let analysis = AnalysisService::new(
        limiter,
        RateLimitPolicy {
            limit: config.rate_limit_requests,
            window: config.rate_limit_window(),
        },
        Arc::new(OpenAiVisionClient::new(http.clone(), &config)),
        Arc::new(PgRecordStore::new(pool)),
        history.clone(),
        config.openai_timeout(),
    );

    // 设置应用状态
    let state = AppState {
        config: config.clone(),
        analysis: Arc::new(analysis),
        history,
        blobs: Arc::new(VercelBlobStorage::new(http, &config)),
    };

    let router = build_router(state);

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
