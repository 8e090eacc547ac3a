//! Live transport: one task ticks the engine on a wall-clock interval and
//! publishes every snapshot; HTTP handlers only ever read what was published.

use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::{
    net::TcpListener,
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{error, info, warn};

use crate::{
    course::{Hazards, Hole},
    engine::Engine,
    snapshot::SimSnapshot,
};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone, Serialize)]
pub struct StateEnvelope {
    pub scenario: String,
    pub snapshot: Option<SimSnapshot>,
}

/// Geometry as loaded, for drawing the course once.
#[derive(Clone, Serialize)]
pub struct CourseView {
    pub scenario: String,
    pub holes: Vec<Hole>,
    pub hazards: Hazards,
    pub routes: usize,
}

#[derive(Clone)]
struct AppState {
    broadcaster: broadcast::Sender<Arc<str>>,
    latest: watch::Receiver<Option<SimSnapshot>>,
    course: Arc<CourseView>,
    scenario_name: String,
}

pub struct WebServerConfig {
    pub engine: Engine,
    pub ticks: Option<u64>,
    pub tick_interval: Duration,
    pub host: String,
    pub port: u16,
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        engine,
        ticks,
        tick_interval,
        host,
        port,
    } = config;

    let scenario_name = engine.scenario_name().to_string();
    let course = Arc::new(CourseView {
        scenario: scenario_name.clone(),
        holes: engine.course().holes().cloned().collect(),
        hazards: engine.course().hazards.clone(),
        routes: engine.navigator().len(),
    });

    let (tx, _) = broadcast::channel::<Arc<str>>(CHANNEL_CAPACITY);
    let (latest_tx, latest_rx) = watch::channel(Some(engine.get_state()));
    let ticker = spawn_ticker(engine, ticks, tick_interval, tx.clone(), latest_tx);

    let state = AppState {
        broadcaster: tx,
        latest: latest_rx,
        course,
        scenario_name,
    };
    let router = Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/course", get(course_view))
        .route("/api/events", get(stream_events))
        .with_state(state);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "serving simulation");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    ticker.abort();
    Ok(())
}

/// The only owner of the engine. The interval lives on the async side and
/// each tick runs on the blocking pool. Publishing never waits on observers:
/// the broadcast drops the oldest frames for slow readers and the watch cell
/// only keeps the newest.
fn spawn_ticker(
    mut engine: Engine,
    ticks: Option<u64>,
    tick_interval: Duration,
    tx: broadcast::Sender<Arc<str>>,
    latest: watch::Sender<Option<SimSnapshot>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        loop {
            interval.tick().await;
            if ticks.is_some_and(|limit| engine.current_tick() >= limit) {
                info!(tick = engine.current_tick(), "tick budget reached; holding last state");
                break;
            }
            // The tick is CPU-bound; run it off the async workers and take
            // the engine back afterwards.
            let stepped = tokio::task::spawn_blocking(move || {
                let result = engine.tick();
                (engine, result)
            })
            .await;
            let snapshot = match stepped {
                Ok((returned, Ok(snapshot))) => {
                    engine = returned;
                    snapshot
                }
                Ok((_, Err(err))) => {
                    error!(error = %err, "simulation stopped");
                    break;
                }
                Err(err) => {
                    error!(error = %err, "tick task failed");
                    break;
                }
            };
            match serde_json::to_string(&snapshot) {
                Ok(payload) => {
                    // No subscribers is not an error.
                    let _ = tx.send(Arc::from(payload));
                }
                Err(err) => warn!(error = %err, "failed to encode snapshot"),
            }
            latest.send_replace(Some(snapshot));
        }
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        return;
    }
    info!("shutting down");
}

async fn latest_state(State(state): State<AppState>) -> Json<StateEnvelope> {
    let snapshot = state.latest.borrow().clone();
    Json(StateEnvelope {
        scenario: state.scenario_name.clone(),
        snapshot,
    })
}

async fn course_view(State(state): State<AppState>) -> Json<CourseView> {
    Json(state.course.as_ref().clone())
}

/// A reader that falls behind the channel is disconnected instead of
/// silently skipping frames.
async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx)
        .take_while(|msg| match msg {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "dropping lagging observer");
                false
            }
        })
        .filter_map(|msg| msg.ok())
        .map(|payload| Ok::<_, Infallible>(Event::default().event("snapshot").data(&*payload)));
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}
