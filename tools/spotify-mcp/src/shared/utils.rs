use std::future::Future;
use std::time::Instant;

/// Upstream ceiling for most paged endpoints.
pub const DEFAULT_LIMIT_CEILING: u32 = 50;
/// `recommendations` accepts up to 100 tracks per call.
pub const RECOMMENDATIONS_LIMIT_CEILING: u32 = 100;

/// Reduce a Spotify URI (`spotify:track:ID`) to its bare id.
///
/// Values without a `:` pass through unchanged. A trailing separator
/// (`spotify:track:`) keeps the original value rather than yielding an empty id.
pub fn extract_id(uri_or_id: &str) -> &str {
    match uri_or_id.rsplit_once(':') {
        Some((_, id)) if !id.is_empty() => id,
        _ => uri_or_id,
    }
}

/// Clamp a caller supplied page size into `1..=ceiling`.
pub fn clamp_limit(limit: u32, ceiling: u32) -> u32 {
    limit.clamp(1, ceiling)
}

pub async fn measure_latency<F, Fut, T>(f: F) -> (T, u64)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let start = Instant::now();
    let res = f().await;
    let elapsed = start.elapsed().as_millis() as u64;
    (res, elapsed)
}
