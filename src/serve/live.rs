//! Serves completed file-mode variants straight from memory.

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use tiny_http::{Request, Response, StatusCode};

use super::response::{is_head_request, make_header, respond_error};
use crate::store::{Variant, VariantStore};
use crate::{debug, log};

/// Outcome of [`LiveServer::respond`].
pub enum Handled {
    Served,
    /// Not a variant path; the request goes to the next handler.
    Next(Request),
}

/// Dev-mode handler for variant delivery paths.
pub struct LiveServer {
    store: Arc<VariantStore>,
}

impl LiveServer {
    pub fn new(store: Arc<VariantStore>) -> Self {
        Self { store }
    }

    pub fn respond(&self, request: Request) -> Result<Handled> {
        let Some(variant) = self.store.lookup_by_delivery_path(request.url()) else {
            return Ok(Handled::Next(request));
        };
        debug!("serve"; "{}", variant.key);

        if is_head_request(&request) {
            let response = Response::empty(StatusCode(200));
            let response = with_variant_headers(response, &variant)?;
            request.respond(response)?;
            return Ok(Handled::Served);
        }

        match variant.payload.reader() {
            Ok(reader) => {
                let response = Response::new(
                    StatusCode(200),
                    Vec::new(),
                    reader,
                    variant.payload.len_hint(),
                    None,
                );
                let response = with_variant_headers(response, &variant)?;
                request
                    .respond(response)
                    .with_context(|| format!("failed to send {}", variant.key))?;
            }
            Err(e) => {
                // Unreadable payload: drop it so the next dispatch recomputes.
                log!("error"; "{}: {}", variant.key, e);
                self.store.evict(&variant.key);
                respond_error(request, &e)?;
            }
        }
        Ok(Handled::Served)
    }
}

fn with_variant_headers<R: io::Read>(response: Response<R>, variant: &Variant) -> Result<Response<R>> {
    Ok(response
        .with_header(make_header("Content-Type", &variant.mime)?)
        .with_header(make_header("Cache-Control", "no-cache")?))
}
