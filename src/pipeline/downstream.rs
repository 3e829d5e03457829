//! Downstream handler interface
//!
//! Whatever produces the response when no directive completes it: the static
//! file handler in the server, or any closure in tests.

use super::request::{ModuleRequest, ModuleResponse};
use crate::error::Result;

pub trait Downstream: Send + Sync {
    /// Write the response for `request` into `response`
    ///
    /// An error aborts the request; whatever was already written is kept.
    fn invoke(&self, request: &ModuleRequest, response: &mut ModuleResponse) -> Result<()>;
}

impl<F> Downstream for F
where
    F: Fn(&ModuleRequest, &mut ModuleResponse) -> Result<()> + Send + Sync,
{
    fn invoke(&self, request: &ModuleRequest, response: &mut ModuleResponse) -> Result<()> {
        self(request, response)
    }
}
