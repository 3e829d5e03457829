//! Directive traits
//!
//! A rule-file module line becomes a `DirectivePair`: an optional step run
//! before the downstream handler and an optional step run after it. Directives
//! hold only their configuration; per-request state lives in the context.

use std::fmt;

use super::context::RequestContext;

/// Control flow returned by a pre-directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveOutcome {
    /// Run the next pre-directive
    Continue,
    /// Skip the remaining pre-directives and invoke the downstream handler
    SkipRemainingPre,
    /// Stop: skip downstream, unwind already registered post-directives
    /// with the request marked aborted
    Abort,
    /// The response is complete: skip downstream, unwind registered
    /// post-directives, commit
    StopAndCommit,
}

/// Step executed on the way in
pub trait PreDirective: Send + Sync + fmt::Debug {
    fn execute(&self, ctx: &mut RequestContext) -> DirectiveOutcome;
}

/// Step executed on the way out
pub trait PostDirective: Send + Sync + fmt::Debug {
    fn execute(&self, ctx: &mut RequestContext);
}

/// Pre/post steps created from one configured module
#[derive(Debug)]
pub struct DirectivePair {
    id: String,
    pre: Option<Box<dyn PreDirective>>,
    post: Option<Box<dyn PostDirective>>,
}

impl DirectivePair {
    /// `id` identifies the configured module (name and arguments) so the
    /// same module matched by several rules runs once
    pub fn new(
        id: impl Into<String>,
        pre: Option<Box<dyn PreDirective>>,
        post: Option<Box<dyn PostDirective>>,
    ) -> Self {
        Self {
            id: id.into(),
            pre,
            post,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pre(&self) -> Option<&dyn PreDirective> {
        self.pre.as_deref()
    }

    pub fn post(&self) -> Option<&dyn PostDirective> {
        self.post.as_deref()
    }
}
