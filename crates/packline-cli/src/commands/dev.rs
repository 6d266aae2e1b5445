//! `packline dev` command implementation.
//!
//! Builds the project in development mode, serves the output root and
//! rebuilds when a source file changes:
//!
//! ```text
//! GET /app/settings
//!   → DevServerDescriptor::resolve_request
//!   → Static(file) | Fallback(index.html) | NotFound
//!   → ServeDir over the output root
//! ```
//!
//! A failed rebuild leaves the previous output in place, so the server keeps
//! serving the last good build.

use axum::{
    extract::{Request, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use miette::{IntoDiagnostic, Result};
use notify::{Config as WatchConfig, RecommendedWatcher, RecursiveMode, Watcher};
use packline_core::{Config, DevResponse, DevServerDescriptor, Mode, ResolvedConfig};
use packline_util::hash::blake3_file;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tower_http::services::ServeDir;
use tracing::{debug, error, info, warn};

/// Quiet period before a burst of file events triggers one rebuild.
const DEBOUNCE: Duration = Duration::from_millis(50);

/// Dev server action.
#[derive(Debug, Clone)]
pub struct DevAction {
    pub config: Config,
    /// Overrides `devServer.port`.
    pub port: Option<u16>,
    /// Overrides `devServer.host`.
    pub host: Option<String>,
}

/// Shared server state.
struct DevState {
    output_dir: PathBuf,
    descriptor: DevServerDescriptor,
}

pub async fn run(action: DevAction) -> Result<()> {
    let config = action.config.clone().with_mode(Mode::Development);
    let resolved = ResolvedConfig::load(&config).into_diagnostic()?;

    let mut descriptor = resolved.dev_server.clone();
    if let Some(port) = action.port {
        descriptor.port = port;
    }
    if let Some(host) = action.host {
        descriptor.host = host;
    }
    let addr = descriptor.bind_addr().into_diagnostic()?;

    rebuild(config.clone()).await;

    let state = Arc::new(DevState {
        output_dir: resolved.output_dir.clone(),
        descriptor: descriptor.clone(),
    });

    let (change_tx, mut change_rx) = mpsc::channel::<Vec<PathBuf>>(16);
    let watch_root = resolved.root.clone();
    let ignore_dir = resolved.output_dir.clone();
    std::thread::spawn(move || {
        if let Err(e) = watch_files(&watch_root, &ignore_dir, &change_tx) {
            error!(error = %e, "file watcher stopped");
        }
    });

    tokio::spawn(async move {
        let mut fingerprints: HashMap<PathBuf, String> = HashMap::new();
        while let Some(changed) = change_rx.recv().await {
            let modified: Vec<PathBuf> = changed
                .into_iter()
                .filter(|p| content_changed(&mut fingerprints, p))
                .collect();
            if modified.is_empty() {
                debug!("file events without content changes");
                continue;
            }
            for path in &modified {
                info!(path = %path.display(), "file changed");
            }
            rebuild(config.clone()).await;
        }
    });

    let app = Router::new().fallback(serve).with_state(state);

    println!();
    println!("  Dev server running at {}", descriptor.url());
    println!("  Serving {}", resolved.output_dir.display());
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await.into_diagnostic()?;
    axum::serve(listener, app).await.into_diagnostic()?;
    Ok(())
}

/// Reload the configuration and build. Errors are logged, not returned.
async fn rebuild(config: Config) {
    let result = tokio::task::spawn_blocking(move || {
        let resolved = ResolvedConfig::load(&config).map_err(packline_core::BuildError::from)?;
        packline_core::build(&resolved)
    })
    .await;

    match result {
        Ok(Ok(report)) => info!(
            modules = report.modules,
            files = report.files.len(),
            duration_ms = report.duration_ms,
            "rebuilt"
        ),
        Ok(Err(e)) => error!(code = e.code, "{}", e.message),
        Err(e) => error!(error = %e, "build task failed"),
    }
}

async fn serve(State(state): State<Arc<DevState>>, mut req: Request) -> Response {
    let root = &state.output_dir;
    let decision = state
        .descriptor
        .resolve_request(req.uri().path(), |rel| root.join(rel).is_file());
    debug!(path = %req.uri().path(), ?decision, "request");

    let file = match decision {
        DevResponse::Static(file) | DevResponse::Fallback(file) => file,
        DevResponse::NotFound => return StatusCode::NOT_FOUND.into_response(),
    };
    let Ok(uri) = format!("/{file}").parse::<Uri>() else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    *req.uri_mut() = uri;

    match ServeDir::new(root).try_call(req).await {
        Ok(res) => res.into_response(),
        Err(e) => {
            warn!(error = %e, file = %file, "failed to serve file");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Watch `root` and send debounced batches of changed source paths.
fn watch_files(root: &Path, output_dir: &Path, tx: &mpsc::Sender<Vec<PathBuf>>) -> Result<()> {
    let (events_tx, events_rx) = std::sync::mpsc::channel();

    let mut watcher = RecommendedWatcher::new(events_tx, WatchConfig::default()).into_diagnostic()?;
    watcher.watch(root, RecursiveMode::Recursive).into_diagnostic()?;

    let mut pending: HashSet<PathBuf> = HashSet::new();
    let mut last_event = Instant::now();

    loop {
        let timeout = if pending.is_empty() {
            Duration::from_secs(3600)
        } else {
            DEBOUNCE.saturating_sub(last_event.elapsed())
        };

        match events_rx.recv_timeout(timeout) {
            Ok(Ok(event)) => {
                let relevant: Vec<PathBuf> = event
                    .paths
                    .into_iter()
                    .filter(|p| !should_ignore(root, output_dir, p))
                    .collect();
                if !relevant.is_empty() {
                    pending.extend(relevant);
                    last_event = Instant::now();
                }
            }
            Ok(Err(e)) => warn!(error = %e, "watch error"),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                if pending.is_empty() {
                    continue;
                }
                let mut changed: Vec<PathBuf> = pending.drain().collect();
                changed.sort();
                if tx.blocking_send(changed).is_err() {
                    break;
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    Ok(())
}

/// Whether `path` differs from the last content seen for it.
///
/// A path seen for the first time, or one that cannot be hashed, counts as
/// changed.
fn content_changed(fingerprints: &mut HashMap<PathBuf, String>, path: &Path) -> bool {
    match blake3_file(path) {
        Ok(hash) => fingerprints.insert(path.to_path_buf(), hash.clone()) != Some(hash),
        Err(_) => {
            fingerprints.remove(path);
            true
        }
    }
}

/// Paths a rebuild never depends on. Hidden entries include VCS metadata and
/// the build's own staging directories.
fn should_ignore(root: &Path, output_dir: &Path, path: &Path) -> bool {
    if path.starts_with(output_dir) {
        return true;
    }
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components().any(|c| match c {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            name == "node_modules" || name.starts_with('.')
        }
        _ => false,
    })
}
