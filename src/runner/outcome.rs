//! Outcome classification.
//!
//! Pure functions turning a (request, response-or-error) pair into a
//! uniform [`DoneResource`]. Success is derived from the status code
//! range and transport error absence only, never from the body.

use crate::client::{ClientError, HttpRequest, HttpResponse};
use crate::domain::{DoneResource, ResourceCacheControl};

/// Status recorded when a downstream call times out.
pub const TIMEOUT_STATUS: u16 = 408;

/// Per-statement flags carried into every outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoneResourceOptions {
    pub debug: bool,
    pub ignore_errors: bool,
    pub hidden: bool,
    pub max_age: Option<u64>,
    pub s_max_age: Option<u64>,
}

/// Classify a normal downstream response.
pub fn from_response(
    request: &HttpRequest,
    response: HttpResponse,
    options: DoneResourceOptions,
) -> DoneResource {
    let success = (200..400).contains(&response.status);
    let cache_control = resolve_cache_control(&options, header(&response, "cache-control"));

    let mut done = DoneResource {
        status: response.status,
        success,
        ignore_errors: options.ignore_errors,
        hidden: options.hidden,
        cache_control,
        body: response.body,
        response_headers: response.headers,
        ..DoneResource::default()
    };
    if options.debug {
        done.url = Some(request.url.to_string());
        done.request_headers = Some(request.headers.clone());
        done.request_params = Some(request.query_params.clone());
        done.response_time_ms = Some(response.elapsed.as_millis() as u64);
    }
    done
}

/// Classify a failed downstream call. A timeout records its dedicated
/// status; any other transport failure records status 0. The error
/// detail stays in the logs, never in the outcome.
pub fn from_error(
    error: &ClientError,
    request: &HttpRequest,
    options: DoneResourceOptions,
) -> DoneResource {
    let status = if error.is_timeout() { TIMEOUT_STATUS } else { 0 };

    let mut done = DoneResource {
        status,
        success: false,
        ignore_errors: options.ignore_errors,
        hidden: options.hidden,
        cache_control: hint_cache_control(&options),
        ..DoneResource::default()
    };
    if options.debug {
        done.url = Some(request.url.to_string());
        done.request_headers = Some(request.headers.clone());
        done.request_params = Some(request.query_params.clone());
    }
    done
}

/// Synthesize the outcome of a statement skipped because a chained
/// parameter resolved to nothing: a successful, bodiless result that
/// keeps the statement's flags so aggregation treats it uniformly.
pub fn empty_chained(params: &[String], options: DoneResourceOptions) -> DoneResource {
    tracing::debug!(params = ?params, "synthesizing response for empty chained statement");
    DoneResource {
        status: 200,
        success: true,
        ignore_errors: options.ignore_errors,
        hidden: options.hidden,
        cache_control: hint_cache_control(&options),
        ..DoneResource::default()
    }
}

fn hint_cache_control(options: &DoneResourceOptions) -> ResourceCacheControl {
    ResourceCacheControl {
        max_age: options.max_age,
        s_max_age: options.s_max_age,
        no_cache: false,
    }
}

fn header<'a>(response: &'a HttpResponse, name: &str) -> Option<&'a str> {
    response
        .headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Merge the statement's cache hints with the upstream response's own
/// Cache-Control header, taking the tighter window per directive.
fn resolve_cache_control(
    options: &DoneResourceOptions,
    header: Option<&str>,
) -> ResourceCacheControl {
    let mut resolved = hint_cache_control(options);
    let Some(header) = header else {
        return resolved;
    };

    for token in header.split(',').map(str::trim) {
        if token.eq_ignore_ascii_case("no-cache") {
            resolved.no_cache = true;
        } else if let Some(value) = directive_value(token, "max-age") {
            resolved.max_age = Some(min_opt(resolved.max_age, value));
        } else if let Some(value) = directive_value(token, "s-maxage") {
            resolved.s_max_age = Some(min_opt(resolved.s_max_age, value));
        }
    }
    resolved
}

fn directive_value(token: &str, name: &str) -> Option<u64> {
    let (key, value) = token.split_once('=')?;
    if !key.trim().eq_ignore_ascii_case(name) {
        return None;
    }
    value.trim().parse().ok()
}

fn min_opt(current: Option<u64>, candidate: u64) -> u64 {
    match current {
        Some(existing) => existing.min(candidate),
        None => candidate,
    }
}
