//! HTTP surface for the streaming chat endpoint.
//!
//! `POST /api/chat` takes the request body described in
//! [`quill_core::ChatRequestBody`] and answers with a chunked
//! `text/plain; charset=utf-8` stream. Failures of any kind inside the
//! chat pipeline are part of that body; only a dead connection surfaces
//! as a transport error to the client.

use bytes::Bytes;
use futures::StreamExt;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::server::conn::http1;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use quill_core::{ChatHandler, ChatRequestBody, ClassifiedError};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

type BoxBody = http_body_util::combinators::UnsyncBoxBody<Bytes, Infallible>;

/// Handle to a running server that can be used to stop it
pub struct ServerHandle {
    shutdown_tx: oneshot::Sender<()>,
    port: u16,
}

impl ServerHandle {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}/api/chat", self.port)
    }

    pub fn stop(self) {
        let _ = self.shutdown_tx.send(());
    }
}

fn stream_headers(builder: http::response::Builder) -> http::response::Builder {
    builder
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Transfer-Encoding", "chunked")
        .header("Cache-Control", "no-cache")
        .header("Connection", "keep-alive")
}

fn chat_response(handler: &ChatHandler, body: ChatRequestBody) -> Response<BoxBody> {
    let stream = handler
        .respond(body)
        .map(|chunk| Ok::<_, Infallible>(Frame::data(chunk)));

    stream_headers(Response::builder())
        .status(StatusCode::OK)
        .body(StreamBody::new(stream).boxed_unsync())
        .expect("static headers are valid")
}

/// Malformed request bodies still answer with a parseable one-tag stream.
fn bad_body_response(detail: &str) -> Response<BoxBody> {
    tracing::warn!("Rejecting malformed chat request: {}", detail);
    let tag = ClassifiedError::validation("Messages array is required").error_tag();

    stream_headers(Response::builder())
        .status(StatusCode::OK)
        .body(
            Full::new(Bytes::from(tag))
                .map_err(|_| -> Infallible { unreachable!() })
                .boxed_unsync(),
        )
        .expect("static headers are valid")
}

fn not_found_response() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(
            Full::new(Bytes::from(r#"{"error":"not found"}"#))
                .map_err(|_| -> Infallible { unreachable!() })
                .boxed_unsync(),
        )
        .expect("static headers are valid")
}

async fn route(
    handler: Arc<ChatHandler>,
    req: Request<hyper::body::Incoming>,
) -> Result<Response<BoxBody>, Infallible> {
    if req.method() != Method::POST || req.uri().path() != "/api/chat" {
        return Ok(not_found_response());
    }

    let bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => return Ok(bad_body_response(&e.to_string())),
    };

    match serde_json::from_slice::<ChatRequestBody>(&bytes) {
        Ok(body) => Ok(chat_response(&handler, body)),
        Err(e) => Ok(bad_body_response(&e.to_string())),
    }
}

/// Start the chat server on the specified host and port.
///
/// Use port 0 to get a random available port.
pub async fn start_server_on(
    host: &str,
    port: u16,
    handler: Arc<ChatHandler>,
) -> anyhow::Result<ServerHandle> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let actual_port = local_addr.port();

    info!("Starting chat server on {}", local_addr);

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Shutting down chat server");
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let io = TokioIo::new(stream);
                            let handler = handler.clone();

                            tokio::spawn(async move {
                                if let Err(err) = http1::Builder::new()
                                    .serve_connection(
                                        io,
                                        hyper::service::service_fn(move |req| {
                                            route(handler.clone(), req)
                                        }),
                                    )
                                    .await
                                {
                                    tracing::error!("Error serving connection: {:?}", err);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }
    });

    Ok(ServerHandle {
        shutdown_tx,
        port: actual_port,
    })
}
