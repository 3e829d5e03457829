// Server module - HTTP/1.1 front end for the directive pipeline
//
// hyper accepts connections and hands each request to the pipeline on the
// blocking pool, since directives read files synchronously.

pub mod static_files;

use std::convert::Infallible;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::modules::ModuleRegistry;
use crate::pipeline::{DirectivePipeline, ModuleRequest, ModuleResponse, Services};
use crate::reload::load_rules;
use crate::resource::DocumentRoot;
use crate::rules::RuleError;

pub use static_files::StaticFileHandler;

/// Wire the pipeline for a configuration: rules, cache and static file handler
pub fn build_pipeline(config: &Config, registry: &ModuleRegistry) -> Result<DirectivePipeline, RuleError> {
    let rules = load_rules(config.rules.path.as_deref(), config.rules.optional, registry)?;
    let root = DocumentRoot::new(&config.site.root);
    let cache = Arc::new(ResponseCache::new(&config.cache));
    let services = Services::new(root.clone(), cache);
    Ok(DirectivePipeline::new(
        rules,
        services,
        Arc::new(StaticFileHandler::new(root)),
    ))
}

/// State shared by all connections
pub struct AppState {
    pipeline: Arc<DirectivePipeline>,
    context_path: String,
    request_timeout: Duration,
    max_body_size: usize,
}

impl AppState {
    pub fn new(pipeline: Arc<DirectivePipeline>, config: &Config) -> Self {
        Self {
            pipeline,
            context_path: config.context_path().to_string(),
            request_timeout: Duration::from_secs(config.server.request_timeout),
            max_body_size: config.server.max_body_size,
        }
    }

    pub fn pipeline(&self) -> &Arc<DirectivePipeline> {
        &self.pipeline
    }
}

/// Accept connections until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    tracing::info!(address = %listener.local_addr()?, "Listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                        continue;
                    }
                };
                let state = state.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |request| {
                        let state = state.clone();
                        async move { Ok::<_, Infallible>(handle_request(&state, request, Some(remote)).await) }
                    });
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        tracing::debug!(remote = %remote, error = %e, "Connection closed with error");
                    }
                });
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested, no longer accepting connections");
                return Ok(());
            }
        }
    }
}

/// Run one HTTP request through the pipeline
///
/// The request body is never read; requests announcing one larger than the
/// configured limit are refused up front.
pub async fn handle_request<B>(
    state: &AppState,
    request: Request<B>,
    remote: Option<SocketAddr>,
) -> Response<Full<Bytes>> {
    let head = request.method() == Method::HEAD;

    let declared_length = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_length.is_some_and(|len| len > state.max_body_size) {
        return error_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
    }

    let module_request = match to_module_request(
        request,
        remote.map(|addr| addr.ip()),
        &state.context_path,
    ) {
        Ok(r) => r,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, &message),
    };

    let method = module_request.method().clone();
    let path = module_request.path().to_string();
    let pipeline = state.pipeline.clone();
    let work = tokio::task::spawn_blocking(move || pipeline.handle(module_request));

    let response = match tokio::time::timeout(state.request_timeout, work).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            tracing::error!(error = %e, path = %path, "Request task failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
        Err(_) => {
            tracing::warn!(path = %path, "Request timed out");
            return error_response(StatusCode::GATEWAY_TIMEOUT, "Request Timeout");
        }
    };

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        bytes = response.body().len(),
        "Request completed"
    );
    to_http_response(response, head)
}

/// Decode the path and query of an HTTP request
pub fn to_module_request<B>(
    request: Request<B>,
    remote: Option<IpAddr>,
    context_path: &str,
) -> Result<ModuleRequest, String> {
    let (parts, _body) = request.into_parts();
    let path = urlencoding::decode(parts.uri.path())
        .map_err(|e| format!("Invalid request path: {}", e))?
        .into_owned();

    let mut module_request = ModuleRequest::new(parts.method, path)
        .with_query(parts.uri.query().unwrap_or(""))
        .with_headers(parts.headers)
        .with_context_path(context_path);
    if let Some(ip) = remote {
        module_request = module_request.with_remote_addr(ip);
    }
    Ok(module_request)
}

/// Convert a committed pipeline response; HEAD keeps the headers but drops the body
pub fn to_http_response(response: ModuleResponse, head: bool) -> Response<Full<Bytes>> {
    let (status, headers, body) = response.into_parts();
    let body = if head { Bytes::new() } else { body };
    let mut http_response = Response::new(Full::new(body));
    *http_response.status_mut() = status;
    *http_response.headers_mut() = headers;
    http_response
}

fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let mut response = ModuleResponse::new();
    response.send_error(status, message);
    response.commit();
    to_http_response(response, false)
}
