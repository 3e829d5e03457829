//! Static file downstream handler
//!
//! Serves single files from the document root for requests no directive
//! completed. Composite paths that reach this handler name no real file and
//! end up as 404.

use http::header::{ALLOW, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use http::{Method, StatusCode};

use crate::error::{Result, WebError};
use crate::freshness::{self, ConditionalHeaders, Freshness};
use crate::pipeline::{Downstream, ModuleRequest, ModuleResponse};
use crate::resource::fingerprint::aggregate_from;
use crate::resource::path::{normalize, strip_context};
use crate::resource::{fingerprint_of, mime, remove_fingerprint, DocumentRoot, ResourcePath};

#[derive(Debug, Clone)]
pub struct StaticFileHandler {
    root: DocumentRoot,
}

impl StaticFileHandler {
    pub fn new(root: DocumentRoot) -> Self {
        Self { root }
    }

    /// Resource a request path maps onto, `None` for the root itself
    fn resource_for(&self, request: &ModuleRequest) -> Option<ResourcePath> {
        let url = remove_fingerprint(request.path());
        normalize(strip_context(request.context_path(), &url)).map(ResourcePath::new)
    }
}

impl Downstream for StaticFileHandler {
    fn invoke(&self, request: &ModuleRequest, response: &mut ModuleResponse) -> Result<()> {
        if request.method() != Method::GET && request.method() != Method::HEAD {
            response.send_error(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
            response.set_header(ALLOW, "GET, HEAD");
            return Ok(());
        }

        let resource = self
            .resource_for(request)
            .ok_or_else(|| WebError::ResourceNotFound(request.path().to_string()))?;
        let body = self
            .root
            .read(&resource)?
            .ok_or_else(|| WebError::ResourceNotFound(resource.to_string()))?;

        let current = aggregate_from([fingerprint_of(&self.root, &resource)]);
        if let Some(current) = &current {
            let conditional = ConditionalHeaders::from_headers(request.headers());
            if !conditional.is_empty()
                && freshness::evaluate(&conditional, Some(current)) == Freshness::NotModified
            {
                response.set_status(StatusCode::NOT_MODIFIED);
                response.set_header(ETAG, &current.etag_header());
                return Ok(());
            }
            response.set_header(ETAG, &current.etag_header());
            response.set_header(
                LAST_MODIFIED,
                &freshness::format_http_date(current.last_modified_ms),
            );
        }

        let extension = resource
            .as_str()
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.contains('/'));
        response.set_header(CONTENT_TYPE, mime::content_type_for_extension(extension));
        response.set_status(StatusCode::OK);
        response.set_body(body);

        tracing::debug!(path = %resource, bytes = response.body().len(), "Served static file");
        Ok(())
    }
}
