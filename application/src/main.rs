use std::{
    future::IntoFuture as _,
    io,
    sync::{Arc, OnceLock},
    time,
};

use application::{api, graphql, webhook, Args, Config};
use axum::{
    extract::MatchedPath,
    routing::{on, post, MethodFilter},
    Extension, Router,
};
use axum_client_ip::InsecureClientIp;
use service::infra::{postgres, Postgres};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing as log;
use tracing_subscriber::{
    filter::{filter_fn, FilterFn},
    layer::{Layer as _, SubscriberExt as _},
    util::SubscriberInitExt as _,
};

/// Levels written to `stderr` instead of `stdout`.
const STDERR_LEVELS: &[log::Level] = &[log::Level::WARN, log::Level::ERROR];

/// Maximum [`log::Level`] to emit, set once the [`Config`] is loaded.
static LOG_LEVEL: OnceLock<log::Level> = OnceLock::new();

postgres::embed_migrations!("../migrations");

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(true)
                .with_thread_names(true)
                .with_writer(io::stdout)
                .with_filter(stream_filter(false)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(true)
                .with_thread_names(true)
                .with_writer(io::stderr)
                .with_filter(stream_filter(true)),
        )
        .init();

    _ = start().await;
}

/// Creates a filter passing spans and the events of the configured
/// [`LOG_LEVEL`], either the [`STDERR_LEVELS`] ones or all the others.
fn stream_filter(
    stderr: bool,
) -> FilterFn<impl Fn(&log::Metadata<'_>) -> bool> {
    filter_fn(move |meta| {
        meta.is_span()
            || (STDERR_LEVELS.contains(meta.level()) == stderr
                && LOG_LEVEL.get().copied().unwrap_or(log::Level::INFO)
                    >= *meta.level())
    })
}

async fn start() -> Result<(), ()> {
    let Args { config } = Args::parse().map_err(|e| {
        log::error!("failed to parse command line arguments: {e}");
    })?;

    let Config {
        postgres,
        service,
        server,
        log,
    } = Config::new(config).map_err(|e| {
        log::error!("failed to load `Config`: {e}");
    })?;

    LOG_LEVEL
        .set(log.level.into())
        .unwrap_or_else(|_| unreachable!("first initialization"));

    let mut postgres = Postgres::new(&postgres.into(), service.lock_timeout)
        .map_err(|e| {
            log::error!("failed to initialize `Postgres` client: {e}");
        })?;

    let report = migrations::runner()
        .run_async(&mut postgres)
        .await
        .map_err(|e| {
            log::error!("failed to run database migrations: {e}");
        })?;
    for m in report.applied_migrations() {
        log::info!("applied database migration `{m}`");
    }

    let (service, background) =
        application::Service::new(service.into(), postgres);
    log::info!(
        tasks = ?background.names().collect::<Vec<_>>(),
        "background tasks spawned",
    );

    let app = router(service, &server.cors)?;

    let listener = TcpListener::bind((server.host.clone(), server.port))
        .await
        .map_err(|e| {
            log::error!(
                "failed to listen on `{}:{}`: {e}",
                server.host,
                server.port,
            );
        })?;

    log::info!("listening on `{}:{}`", server.host, server.port);

    let serve = axum::serve(listener, app).with_graceful_shutdown(async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("failed to listen for shutdown signal: {e}");
        }
        log::info!("shutting down");
    });

    // Background tasks live as long as the `Service` does, so the webserver
    // stopping gracefully ends the whole application.
    tokio::select! {
        res = serve.into_future() => {
            res.map_err(|e| log::error!("webserver failed: {e}"))
        }
        res = background.into_future() => {
            res.map_err(|e| log::error!("background tasks failed: {e}"))
        }
    }
}

/// Builds the HTTP [`Router`] serving the GraphQL API and the payment
/// provider webhooks.
fn router(
    service: application::Service,
    cors: &application::config::Cors,
) -> Result<Router, ()> {
    let schema = api::Schema::new(
        api::Query,
        api::Mutation,
        juniper::EmptySubscription::new(),
    );

    let mut cors_layer = CorsLayer::new()
        .allow_methods([
            http::Method::GET,
            http::Method::OPTIONS,
            http::Method::POST,
        ])
        .allow_headers([http::header::CONTENT_TYPE]);
    for origin in &cors.origins {
        cors_layer = cors_layer.allow_origin(
            origin.parse::<http::header::HeaderValue>().map_err(|e| {
                log::error!("`{origin}` is not correct CORS origin: {e}");
            })?,
        );
    }

    Ok(Router::new()
        .route(
            "/graphql",
            on(MethodFilter::GET.or(MethodFilter::POST), graphql),
        )
        .route(
            "/webhooks/payments",
            post(webhook::payment::<application::Service>),
        )
        .layer(Extension(Arc::new(schema)))
        .layer(Extension(service))
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|r: &http::Request<_>| {
                    tracing::info_span!(
                        "HTTP request",
                        http.client_ip = InsecureClientIp::from(
                            r.headers(),
                            r.extensions()
                        )
                            .map(|ip| ip.0.to_string())
                            .ok(),
                        http.flavor = ?r.version(),
                        http.host = r.uri().host(),
                        http.method = r.method().as_str(),
                        http.route = r
                            .extensions()
                            .get::<MatchedPath>()
                            .map(MatchedPath::as_str),
                        http.target = r
                            .uri()
                            .path_and_query()
                            .map(http::uri::PathAndQuery::as_str),
                        http.user_agent = r
                            .headers()
                            .get("User-Agent")
                            .and_then(|h| h.to_str().ok()),
                        http.status_code = tracing::field::Empty,
                    )
                })
                .on_response(
                    |r: &http::Response<_>,
                     dur: time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(r.status().as_u16()),
                        );

                        let duration = format!("{}ms", dur.as_millis());
                        if r.status().is_server_error() {
                            tracing::error!(duration = %duration);
                        } else if r.status().is_client_error() {
                            tracing::warn!(duration = %duration);
                        } else {
                            tracing::info!(duration = %duration);
                        }
                    },
                ),
        ))
}
