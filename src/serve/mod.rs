//! Development server.
//!
//! Requests go through a fixed chain:
//!
//! ```text
//! LiveServer (variant delivery paths) → public dir → 404
//! ```

mod lifecycle;
mod live;
mod path;
mod response;

pub use lifecycle::setup_shutdown_handler;
pub use live::{Handled, LiveServer};

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tiny_http::{Request, Server};

use crate::log;
use crate::store::VariantStore;

/// Worker threads answering requests.
const REQUEST_THREADS: usize = 4;

/// Request handler chain.
pub struct DevServer {
    live: LiveServer,
    public: PathBuf,
}

impl DevServer {
    pub fn new(store: Arc<VariantStore>, public: impl Into<PathBuf>) -> Self {
        Self {
            live: LiveServer::new(store),
            public: public.into(),
        }
    }

    /// Handle a single HTTP request.
    pub fn handle(&self, request: Request) -> Result<()> {
        if lifecycle::is_shutdown() {
            return response::respond_unavailable(request);
        }

        let request = match self.live.respond(request)? {
            Handled::Served => return Ok(()),
            Handled::Next(request) => request,
        };

        if let Some(path) = path::resolve_path(request.url(), &self.public) {
            return response::respond_file(request, &path);
        }

        response::respond_not_found(request)
    }
}

/// Bound server ready to accept requests.
pub struct BoundServer {
    server: Arc<Server>,
    addr: SocketAddr,
}

/// Bind without starting the request loop.
pub fn bind(interface: IpAddr, port: u16) -> Result<BoundServer> {
    let (server, addr) = lifecycle::bind_with_retry(interface, port)?;
    log!("serve"; "http://{}", addr);
    Ok(BoundServer {
        server: Arc::new(server),
        addr,
    })
}

impl BoundServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Run the request loop until Ctrl+C unblocks the server.
    pub fn run(self, handler: Arc<DevServer>) -> Result<()> {
        lifecycle::register_server(Arc::clone(&self.server));
        run_request_loop(&self.server, handler)
    }
}

fn run_request_loop(server: &Server, handler: Arc<DevServer>) -> Result<()> {
    // Streamed variants encode on first read; keep that off the accept loop.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .thread_name(|i| format!("serve-{i}"))
        .build()
        .context("failed to create request thread pool")?;

    for request in server.incoming_requests() {
        let handler = Arc::clone(&handler);
        pool.spawn(move || {
            if let Err(e) = handler.handle(request) {
                log!("serve"; "request error: {e:#}");
            }
        });
    }
    Ok(())
}
