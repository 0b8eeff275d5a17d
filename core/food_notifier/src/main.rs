mod audio;
mod desktop;
mod error;
mod notifier;
mod platform;
mod restaurant;
mod schedule;
mod status;

use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde::Serialize;
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::audio::SystemAudio;
use crate::desktop::DesktopNotifications;
use crate::error::NotifyError;
use crate::notifier::{Notifier, Ports, Snapshot, TestOutcome, Timing};
use crate::platform::{Permission, SystemClock, SystemOpener, UrlOpener};
use crate::restaurant::{PageAction, RestaurantInfo, RESTAURANT};
use crate::schedule::{SlotTime, FOOD_TIMES};
use crate::status::{StatusBoard, StatusLine};

const DEFAULT_PORT: u16 = 17610;

#[derive(Parser, Debug)]
#[command(name = "food_notifier", version)]
struct Args {
    /// Listen address of the control surface.
    ///
    /// Accepts:
    /// - ip:port (recommended), e.g. 127.0.0.1:17610
    /// - ip (implies port 17610), e.g. 127.0.0.1
    #[arg(long, default_value = "127.0.0.1:17610")]
    listen: String,

    /// Icon shown on alerts (also used as badge).
    #[arg(long)]
    icon: Option<PathBuf>,

    /// Notification permission the desktop starts with.
    ///
    /// `default` means undecided: the first "Test Notification" asks on the terminal.
    #[arg(long, value_enum, default_value_t = Permission::Default)]
    permission: Permission,

    /// Delay before the automatic startup check (milliseconds).
    #[arg(long, default_value_t = 2000)]
    startup_delay_ms: u64,
}

#[derive(Clone)]
struct AppState {
    notifier: Arc<Notifier>,
    status: Arc<StatusBoard>,
    opener: Arc<dyn UrlOpener>,
}

#[derive(Serialize)]
struct OkResponse<T: Serialize> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

#[derive(Serialize)]
struct ErrResponse {
    ok: bool,
    error: &'static str,
    /// Text to show the user verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "food_notifier=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let opener: Arc<dyn UrlOpener> = Arc::new(SystemOpener);
    let status = Arc::new(StatusBoard::new());
    let ports = Ports {
        notifications: Arc::new(DesktopNotifications::new(args.permission, opener.clone())),
        audio: Arc::new(SystemAudio),
        status: status.clone(),
        clock: Arc::new(SystemClock),
    };
    let notifier = Arc::new(Notifier::new(
        ports,
        RESTAURANT,
        args.icon.clone(),
        Timing::default(),
    ));

    let startup = Arc::clone(&notifier);
    let startup_delay = Duration::from_millis(args.startup_delay_ms);
    tokio::spawn(async move {
        tokio::time::sleep(startup_delay).await;
        startup.initialize().await;
    });

    let state = AppState {
        notifier,
        status,
        opener,
    };

    let addr = parse_listen(&args.listen)?;
    info!("{} notifier listening on http://{addr}", RESTAURANT.name);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/status", get(get_status))
        .route("/schedule", get(get_schedule))
        .route(
            "/notifications/test",
            post(post_test_notification).options(options_ok),
        )
        .route(
            "/actions/directions",
            post(post_directions).options(options_ok),
        )
        .route("/actions/call", post(post_call).options(options_ok))
        .route("/actions/chat", post(post_chat).options(options_ok))
        .with_state(state)
        .layer(cors)
}

fn parse_listen(input: &str) -> anyhow::Result<SocketAddr> {
    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = input.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    if let Some((host, port_str)) = input.rsplit_once(':') {
        if host == "localhost" {
            let port: u16 = port_str.parse().map_err(|_| {
                anyhow::anyhow!(
                    "invalid --listen '{}': bad port. Example: 127.0.0.1:{}",
                    input,
                    DEFAULT_PORT
                )
            })?;
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), port));
        }
    }

    if input == "localhost" {
        return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), DEFAULT_PORT));
    }

    Err(anyhow::anyhow!(
        "invalid --listen '{}'. Use ip:port (e.g. 127.0.0.1:{}) or ip (e.g. 127.0.0.1).",
        input,
        DEFAULT_PORT
    ))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}

async fn options_ok() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Serialize)]
struct HealthInfo {
    service: &'static str,
    version: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(OkResponse {
        ok: true,
        data: Some(HealthInfo {
            service: "food_notifier",
            version: env!("CARGO_PKG_VERSION"),
        }),
    })
}

#[derive(Serialize)]
struct StatusView {
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<StatusLine>,
    #[serde(flatten)]
    notifier: Snapshot,
}

async fn get_status(State(state): State<AppState>) -> Response {
    let view = StatusView {
        line: state.status.current(),
        notifier: state.notifier.snapshot().await,
    };
    Json(OkResponse {
        ok: true,
        data: Some(view),
    })
    .into_response()
}

#[derive(Serialize)]
struct ScheduleView {
    times: Vec<SlotTime>,
    restaurant: RestaurantInfo,
}

async fn get_schedule() -> Response {
    Json(OkResponse {
        ok: true,
        data: Some(ScheduleView {
            times: FOOD_TIMES.to_vec(),
            restaurant: RESTAURANT,
        }),
    })
    .into_response()
}

#[derive(Serialize)]
struct TestResult {
    outcome: TestOutcome,
}

async fn post_test_notification(State(state): State<AppState>) -> Response {
    match state.notifier.test_notification().await {
        Ok(outcome) => Json(OkResponse {
            ok: true,
            data: Some(TestResult { outcome }),
        })
        .into_response(),
        Err(err) => notify_error_response(err),
    }
}

fn notify_error_response(err: NotifyError) -> Response {
    let status = match err {
        NotifyError::Unsupported | NotifyError::PermissionDenied => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrResponse {
            ok: false,
            error: err.code(),
            message: Some(err.to_string()),
        }),
    )
        .into_response()
}

#[derive(Serialize)]
struct DispatchResult {
    url: String,
}

async fn post_directions(State(state): State<AppState>) -> Response {
    dispatch(&state, PageAction::Directions).await
}

async fn post_call(State(state): State<AppState>) -> Response {
    dispatch(&state, PageAction::Call).await
}

async fn post_chat(State(state): State<AppState>) -> Response {
    dispatch(&state, PageAction::Chat).await
}

async fn dispatch(state: &AppState, action: PageAction) -> Response {
    let url = match action.url(&RESTAURANT) {
        Ok(url) => url,
        Err(err) => {
            error!("building {action:?} url failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrResponse {
                    ok: false,
                    error: "invalid_url",
                    message: None,
                }),
            )
                .into_response();
        }
    };

    // Launchers are waited on so they get reaped.
    let opener = state.opener.clone();
    let target = url.clone();
    let opened = match tokio::task::spawn_blocking(move || opener.open(&target)).await {
        Ok(opened) => opened,
        Err(err) => Err(NotifyError::Dispatch {
            url: url.clone(),
            reason: err.to_string(),
        }),
    };
    if let Err(err) = opened {
        error!("{err}");
        return notify_error_response(err);
    }

    Json(OkResponse {
        ok: true,
        data: Some(DispatchResult { url }),
    })
    .into_response()
}
