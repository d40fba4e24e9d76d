use anyhow::Context;
use axum::routing::get;
use axum::Router;
use ecto_domain::config::Config;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env();
    run_server(config).await
}

/// A `tracing-subscriber` `fmt` layer always runs; an OTLP exporter stacks
/// on top of it when `OTEL_EXPORTER_OTLP_ENDPOINT` is set, otherwise it's
/// structured stdout logging only.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ecto_gateway=debug"));
    let fmt_layer = tracing_subscriber::fmt::layer().json();

    if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        match build_otlp_tracer() {
            Ok(tracer) => {
                let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
                tracing_subscriber::registry().with(env_filter).with(fmt_layer).with(otel_layer).init();
                return;
            }
            Err(e) => eprintln!("failed to initialize OTLP exporter, falling back to stdout only: {e}"),
        }
    }

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
}

fn build_otlp_tracer() -> anyhow::Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry_otlp::WithExportConfig;

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_env())
        .with_trace_config(
            opentelemetry_sdk::trace::config()
                .with_resource(opentelemetry_sdk::Resource::new(vec![opentelemetry::KeyValue::new("service.name", "ecto-gateway")])),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)
        .context("building OTLP tracer provider")
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("ecto gateway starting");

    let port = config.port;
    let state = ecto_gateway::bootstrap::build_app_state(config).await.context("building app state")?;

    let app: Router<()> = ecto_gateway::api::router(state.clone())
        .route("/ws", get(ecto_gateway::ws::ws_handler))
        .route("/notify", get(ecto_gateway::ws::notify_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "ecto gateway listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("axum server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
