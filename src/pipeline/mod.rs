// Request pipeline module - runs configured directives around the downstream handler
//
// PRE_CHAIN → DOWNSTREAM → POST_CHAIN → DONE. Post-directives run in reverse
// order of registration, and every request ends with exactly one commit.

pub mod context;
pub mod directive;
pub mod downstream;
pub mod request;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use arc_swap::ArcSwap;

pub use context::{RequestContext, Services};
pub use directive::{DirectiveOutcome, DirectivePair, PostDirective, PreDirective};
pub use downstream::Downstream;
pub use request::{ModuleRequest, ModuleResponse};

use crate::error::WebError;
use crate::rules::RuleSet;

/// Executes eligible directive pairs for each request
pub struct DirectivePipeline {
    rules: Arc<ArcSwap<RuleSet>>,
    services: Arc<Services>,
    downstream: Arc<dyn Downstream>,
}

impl DirectivePipeline {
    pub fn new(rules: RuleSet, services: Services, downstream: Arc<dyn Downstream>) -> Self {
        Self {
            rules: Arc::new(ArcSwap::from_pointee(rules)),
            services: Arc::new(services),
            downstream,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Current rule set
    pub fn rules(&self) -> Arc<RuleSet> {
        self.rules.load_full()
    }

    /// Atomically swap in a new rule set; in-flight requests finish with the old one
    pub fn replace_rules(&self, rules: RuleSet) {
        tracing::info!(mappings = rules.len(), "Installing rule set");
        self.rules.store(Arc::new(rules));
    }

    /// Run one request through the pipeline and return the committed response
    pub fn handle(&self, request: ModuleRequest) -> ModuleResponse {
        let rules = self.rules.load();
        let pairs = rules.eligible(&request);

        tracing::debug!(
            method = %request.method(),
            path = %request.path(),
            directives = pairs.len(),
            "Handling request"
        );

        let mut ctx = RequestContext::new(request, self.services.clone());
        let mut unwind: Vec<&DirectivePair> = Vec::with_capacity(pairs.len());
        let mut invoke_downstream = true;

        for pair in pairs.iter() {
            let outcome = match pair.pre() {
                Some(pre) => pre.execute(&mut ctx),
                None => DirectiveOutcome::Continue,
            };
            tracing::trace!(directive = %pair.id(), ?outcome, "Pre-directive finished");

            match outcome {
                DirectiveOutcome::Continue => unwind.push(pair),
                DirectiveOutcome::SkipRemainingPre => {
                    unwind.push(pair);
                    break;
                }
                DirectiveOutcome::Abort => {
                    ctx.abort();
                    invoke_downstream = false;
                    break;
                }
                DirectiveOutcome::StopAndCommit => {
                    invoke_downstream = false;
                    break;
                }
            }
        }

        if invoke_downstream {
            self.invoke_downstream(&mut ctx);
        }

        while let Some(pair) = unwind.pop() {
            if let Some(post) = pair.post() {
                post.execute(&mut ctx);
                tracing::trace!(directive = %pair.id(), "Post-directive finished");
            }
        }

        let mut response = ctx.into_response();
        response.commit();
        response
    }

    /// Call the downstream handler, turning errors and panics into an abort
    fn invoke_downstream(&self, ctx: &mut RequestContext) {
        let downstream = self.downstream.clone();
        let result = {
            let (request, response) = ctx.exchange_mut();
            catch_unwind(AssertUnwindSafe(|| downstream.invoke(request, response)))
        };

        let error = match result {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(panic) => WebError::Downstream(panic_message(panic.as_ref())),
        };

        log_downstream_error(ctx.request().path(), &error);
        ctx.abort();

        let response = ctx.response_mut();
        if response.body().is_empty() {
            response.send_error(error.to_http_status(), &error.to_string());
        } else {
            // Partial output stays; the error is reported after it
            response.write(format!("\n{}", error).as_bytes());
        }
    }
}

/// Missing or malformed resources are ordinary client errors
fn log_downstream_error(path: &str, error: &WebError) {
    match error {
        WebError::ResourceNotFound(_) => {
            tracing::debug!(path = %path, error = %error, "Downstream found no resource")
        }
        WebError::MalformedRequest(_) => {
            tracing::warn!(path = %path, error = %error, "Downstream rejected request")
        }
        _ => tracing::error!(path = %path, error = %error, "Downstream handler failed"),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked".to_string()
    }
}
