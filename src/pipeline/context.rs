// Request context - state threaded through every directive of one request

use std::fmt;
use std::sync::Arc;

use http::Extensions;

use super::request::{ModuleRequest, ModuleResponse};
use crate::cache::ResponseCache;
use crate::modules::minify::{Minifier, WhitespaceMinifier};
use crate::resource::DocumentRoot;

/// Shared, long-lived collaborators available to every request
///
/// Built once by the composition root and handed to the pipeline.
#[derive(Clone)]
pub struct Services {
    pub root: DocumentRoot,
    pub cache: Arc<ResponseCache>,
    pub minifier: Arc<dyn Minifier>,
}

impl Services {
    pub fn new(root: DocumentRoot, cache: Arc<ResponseCache>) -> Self {
        Self {
            root,
            cache,
            minifier: Arc::new(WhitespaceMinifier),
        }
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("root", &self.root)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Per-request state
///
/// Directives communicate through typed attributes (`attributes()`), e.g. the
/// negotiated content coding recorded by the compression pre-step and read
/// back by its post-step.
pub struct RequestContext {
    request: ModuleRequest,
    response: ModuleResponse,
    services: Arc<Services>,
    attributes: Extensions,
    aborted: bool,
}

impl RequestContext {
    pub fn new(request: ModuleRequest, services: Arc<Services>) -> Self {
        Self {
            request,
            response: ModuleResponse::new(),
            services,
            attributes: Extensions::new(),
            aborted: false,
        }
    }

    pub fn request(&self) -> &ModuleRequest {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut ModuleRequest {
        &mut self.request
    }

    pub fn response(&self) -> &ModuleResponse {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ModuleResponse {
        &mut self.response
    }

    /// Borrow the request and the response at the same time
    pub fn exchange_mut(&mut self) -> (&ModuleRequest, &mut ModuleResponse) {
        (&self.request, &mut self.response)
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Owned handle to the shared services, for use while mutating the context
    pub fn shared(&self) -> Arc<Services> {
        self.services.clone()
    }

    pub fn attributes(&self) -> &Extensions {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Extensions {
        &mut self.attributes
    }

    /// Mark the request as aborted; post-directives see it and skip storing
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn into_response(self) -> ModuleResponse {
        self.response
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request", &self.request)
            .field("status", &self.response.status())
            .field("aborted", &self.aborted)
            .finish_non_exhaustive()
    }
}
