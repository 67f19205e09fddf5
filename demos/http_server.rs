//! Serves the supervisor's own metrics over HTTP, restarting the server
//! whenever it exits. Stop it with ctrl-c or SIGTERM.
//!
//! ```bash
//! cargo run --example http_server
//! curl http://127.0.0.1:9010/metrics
//! ```

use std::{convert::Infallible, net::SocketAddr, time::Duration};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{server::conn::http1, service::service_fn, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use task_warden::{signals, StatusRegistry, SupervisorBuilder, TaskResult, Worker};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Clone)]
struct HttpServer {
    addr: SocketAddr,
    registry: StatusRegistry,
}

impl Worker for HttpServer {
    async fn run(&mut self, token: CancellationToken) -> TaskResult {
        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %self.addr, "http server online");

        loop {
            let (tcp, _) = tokio::select! {
                _ = token.cancelled() => break,
                accepted = listener.accept() => accepted?,
            };
            let registry = self.registry.clone();
            let token = token.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| metrics(req, registry.clone()));
                let conn = http1::Builder::new().serve_connection(TokioIo::new(tcp), service);
                tokio::pin!(conn);
                tokio::select! {
                    res = conn.as_mut() => {
                        if let Err(err) = res {
                            tracing::warn!(error = %err, "error serving connection");
                        }
                    }
                    _ = token.cancelled() => {
                        conn.as_mut().graceful_shutdown();
                        let _ = conn.as_mut().await;
                    }
                }
            });
        }

        tracing::info!("http server offline");
        Ok(())
    }
}

async fn metrics(
    req: Request<hyper::body::Incoming>,
    registry: StatusRegistry,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (status, body) = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => (StatusCode::OK, registry.render()),
        _ => (StatusCode::NOT_FOUND, "not found\n".to_string()),
    };
    let mut resp = Response::new(Full::new(Bytes::from(body)));
    *resp.status_mut() = status;
    Ok(resp)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let registry = StatusRegistry::new();
    let server = HttpServer {
        addr: ([127, 0, 0, 1], 9010).into(),
        registry: registry.clone(),
    };

    let supervisor = SupervisorBuilder::new(server)
        .with_name("http_server")
        .with_max_restarts(-1)
        .with_restart_delay(Duration::from_secs(1))
        .with_cancellation_source(signals::shutdown_token())
        .build()?;
    supervisor.with_exporter(&registry, "http_server")?.start();

    supervisor.wait().await;
    supervisor.terminate().await;
    Ok(())
}
