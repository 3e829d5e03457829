//! ResponseCache: replay stored responses and store new ones
//!
//! The pre-step answers conditional requests and replays fresh entries; the
//! post-step stores what the rest of the chain produced. Entries are keyed by
//! the request path without its URL fingerprint.

use std::sync::Arc;

use super::{current_fingerprint, is_debug, not_modified, ModuleArgs};
use crate::cache::{now_millis, CachedResponse};
use crate::constants::{PARAM_EXPIRE_CACHE, PARAM_RESET_CACHE, PARAM_SKIP_CACHE};
use crate::freshness::{evaluate, ConditionalHeaders, Freshness};
use crate::pipeline::{DirectiveOutcome, DirectivePair, PostDirective, PreDirective, RequestContext};
use crate::resource::{remove_fingerprint, AggregateFingerprint};

/// Timing policies of a `ResponseCache` line, zero disables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheTiming {
    /// Seconds between full cache resets
    pub reset_time_secs: u64,
    /// Maximum age of an entry in seconds
    pub reload_time_secs: u64,
}

impl CacheTiming {
    pub fn from_args(args: &ModuleArgs) -> Result<Self, String> {
        args.expect_keys(&["resetTime", "reloadTime"])?;
        Ok(Self {
            reset_time_secs: args.parsed_value("resetTime", 0)?,
            reload_time_secs: args.parsed_value("reloadTime", 0)?,
        })
    }

    fn reset_time_ms(&self) -> Option<i64> {
        secs_to_ms(self.reset_time_secs)
    }

    fn reload_time_ms(&self) -> Option<i64> {
        secs_to_ms(self.reload_time_secs)
    }
}

fn secs_to_ms(secs: u64) -> Option<i64> {
    (secs > 0).then(|| i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX))
}

pub fn build(args: &ModuleArgs) -> Result<DirectivePair, String> {
    let timing = CacheTiming::from_args(args)?;
    Ok(DirectivePair::new(
        args.id(),
        Some(Box::new(CacheLookup { timing })),
        Some(Box::new(CacheStore)),
    ))
}

/// What the lookup decided for the store step
#[derive(Debug, Clone)]
struct PendingStore {
    key: String,
    fingerprint: Option<AggregateFingerprint>,
}

#[derive(Debug)]
pub struct CacheLookup {
    timing: CacheTiming,
}

impl PreDirective for CacheLookup {
    fn execute(&self, ctx: &mut RequestContext) -> DirectiveOutcome {
        let services = ctx.shared();
        let cache = &services.cache;
        let request = ctx.request();
        let key = remove_fingerprint(request.path());
        let now = now_millis();

        let reset_requested = request.has_any_param(&PARAM_RESET_CACHE);
        let expire_requested = request.has_any_param(&PARAM_EXPIRE_CACHE);
        if reset_requested {
            cache.reset_all();
        } else if let Some(reset_ms) = self.timing.reset_time_ms() {
            cache.reset_if_due(reset_ms, now);
        }
        if expire_requested {
            tracing::debug!(key = %key, "Expiring cache entry on request");
            cache.invalidate(&key);
        }

        if request.has_any_param(&PARAM_SKIP_CACHE) || is_debug(request) {
            tracing::debug!(key = %key, "Skipping response cache");
            return DirectiveOutcome::Continue;
        }

        // Malformed paths are reported by the stage that serves them
        let Ok((_, current)) = current_fingerprint(&services, request) else {
            return DirectiveOutcome::Continue;
        };

        let conditional = ConditionalHeaders::from_headers(request.headers());
        if !conditional.is_empty() && evaluate(&conditional, current.as_ref()) == Freshness::NotModified {
            cache.evict_if_stale(&key, current.as_ref());
            not_modified(ctx.response_mut(), current.as_ref(), true);
            return DirectiveOutcome::StopAndCommit;
        }

        if let Some(entry) = cache.get_fresh(&key, current.as_ref()) {
            let expired = self
                .timing
                .reload_time_ms()
                .is_some_and(|max_age| entry.is_older_than(max_age, now));
            if expired {
                tracing::debug!(key = %key, age_ms = entry.age_ms(now), "Cache entry past reload time");
                cache.evict(&key);
            } else {
                tracing::debug!(key = %key, "Serving cached response");
                let payload = Arc::clone(&entry.payload);
                let response = ctx.response_mut();
                response.set_status(payload.status);
                *response.headers_mut() = payload.headers.clone();
                response.set_body(payload.body.to_vec());
                return DirectiveOutcome::StopAndCommit;
            }
        }

        // A request that just expired or reset the cache does not refill it
        if !(reset_requested || expire_requested) {
            ctx.attributes_mut().insert(PendingStore {
                key,
                fingerprint: current,
            });
        }
        DirectiveOutcome::Continue
    }
}

#[derive(Debug)]
pub struct CacheStore;

impl PostDirective for CacheStore {
    fn execute(&self, ctx: &mut RequestContext) {
        let Some(pending) = ctx.attributes_mut().remove::<PendingStore>() else {
            return;
        };
        let services = ctx.shared();
        let response = ctx.response();
        if !services
            .cache
            .policy()
            .is_cacheable(response.status(), response.headers(), ctx.is_aborted())
        {
            tracing::trace!(key = %pending.key, status = %response.status(), "Response not cacheable");
            return;
        }

        services.cache.put(
            &pending.key,
            pending.fingerprint,
            CachedResponse {
                status: response.status(),
                headers: response.headers().clone(),
                body: bytes::Bytes::copy_from_slice(response.body()),
            },
        );
    }
}
