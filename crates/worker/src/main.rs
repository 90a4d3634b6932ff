//! Saga worker entry point.

use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{
    CustomerRepository, InMemoryCustomerRepository, InMemoryOrderRepository, OrderRepository,
    PostgresCustomerRepository, PostgresOrderRepository,
};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use worker::Worker;
use worker::config::Config;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn serve<R, Cu>(config: Config, orders: R, customers: Cu, metrics_handle: PrometheusHandle)
where
    R: OrderRepository + Clone + 'static,
    Cu: CustomerRepository + 'static,
{
    let worker = Worker::start(orders, customers, config.saga.clone(), config.demo_services);
    let app = worker::create_app(worker.app_state(), metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting worker");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    worker.shutdown().await;
    tracing::info!("worker shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick storage and run
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to database");
            let orders = PostgresOrderRepository::new(pool.clone());
            orders.run_migrations().await.expect("migrations failed");
            tracing::info!("using PostgreSQL order store");

            let customers = PostgresCustomerRepository::new(pool);
            serve(config, orders, customers, metrics_handle).await;
        }
        None => {
            tracing::info!("using in-memory order store");
            serve(
                config,
                InMemoryOrderRepository::new(),
                InMemoryCustomerRepository::new(),
                metrics_handle,
            )
            .await;
        }
    }
}
