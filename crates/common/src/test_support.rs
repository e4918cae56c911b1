//! In-process HTTP stand-ins for the graph store and model providers

use axum::Router;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Serve the router built by `build` on an ephemeral local port
///
/// `build` receives the base URL so handlers can hand out absolute links.
pub(crate) async fn serve(build: impl FnOnce(&str) -> Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let router = build(&base_url);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    base_url
}

/// Calls received by a stand-in, in arrival order
#[derive(Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub(crate) fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}
