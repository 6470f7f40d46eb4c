//! Live-reload notifier: a broadcast hub exposed as server-sent events.

use std::convert::Infallible;
use std::path::PathBuf;

use axum::{
    extract::State,
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Router,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Browser client served at `/livereload.js`. It connects back to the
/// `/livereload` event stream of the host it was loaded from.
pub const CLIENT_SCRIPT: &str = r#"(function () {
  var script = document.currentScript;
  var base = script ? script.src.replace(/\/livereload\.js.*$/, '') : '';
  var source = new EventSource(base + '/livereload');
  source.addEventListener('reload', function () {
    window.location.reload();
  });
})();
"#;

const CHANNEL_CAPACITY: usize = 16;

/// Tag inserted into served HTML pages to load the client.
pub fn snippet(port: u16) -> String {
    format!(
        "<script>document.write('<script src=\"//' + (location.hostname || 'localhost') + ':{}/livereload.js\"></' + 'script>')</script>",
        port
    )
}

/// Inserts `snippet` before the last `</body>`, or appends it when the page
/// has no body end tag.
pub fn inject_snippet(html: &str, snippet: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(index) => {
            let mut out = String::with_capacity(html.len() + snippet.len());
            out.push_str(&html[..index]);
            out.push_str(snippet);
            out.push_str(&html[index..]);
            out
        }
        None => format!("{}{}", html, snippet),
    }
}

/// Fan-out of reload notifications to every connected browser.
#[derive(Debug, Clone)]
pub struct LiveReload {
    sender: broadcast::Sender<Vec<String>>,
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveReload {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Notifies connected clients, returning how many were reached.
    pub fn notify(&self, changed: &[PathBuf]) -> usize {
        let paths = changed
            .iter()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect();
        let reached = self.sender.send(paths).unwrap_or(0);
        debug!(clients = reached, "Sent reload notification");
        reached
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<String>> {
        self.sender.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Routes of the live-reload port.
pub fn router(hub: LiveReload) -> Router {
    Router::new()
        .route("/livereload.js", get(client_script))
        .route("/livereload", get(events))
        .layer(TraceLayer::new_for_http())
        .with_state(hub)
}

async fn client_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        CLIENT_SCRIPT,
    )
}

async fn events(State(hub): State<LiveReload>) -> impl IntoResponse {
    let stream = futures::stream::unfold(hub.subscribe(), |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(paths) => {
                    let data = serde_json::json!({ "command": "reload", "paths": paths });
                    let event = Event::default().event("reload").data(data.to_string());
                    return Some((Ok::<_, Infallible>(event), rx));
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    });

    (
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_before_body_end() {
        let out = inject_snippet("<html><body><p>x</p></BODY></html>", "<s></s>");
        assert_eq!(out, "<html><body><p>x</p><s></s></BODY></html>");
    }

    #[test]
    fn test_inject_appends_without_body() {
        assert_eq!(inject_snippet("<p>x</p>", "<s></s>"), "<p>x</p><s></s>");
    }

    #[test]
    fn test_snippet_names_port() {
        assert!(snippet(35749).contains(":35749/livereload.js"));
    }

    #[tokio::test]
    async fn test_notify_reaches_subscribers() {
        let hub = LiveReload::new();
        assert_eq!(hub.notify(&[]), 0);

        let mut rx = hub.subscribe();
        assert_eq!(hub.notify(&[PathBuf::from("js/app.es6.js")]), 1);
        assert_eq!(rx.recv().await.unwrap(), vec!["js/app.es6.js".to_string()]);
    }
}
