//! Label and bucket policy for the built-in HTTP instruments.
//!
//! These values are part of the observable contract of `/metrics`: changing
//! them changes the series scrapers see. Every label value produced here comes
//! from a closed set so per-request data cannot grow cardinality.

/// Label value for responses with status `< 400`.
pub const STATUS_SUCCESS: &str = "success";
/// Label value for responses with status `>= 400`.
pub const STATUS_ERROR: &str = "error";
/// Endpoint label used when no route template matched (fallback 404).
pub const ENDPOINT_UNMATCHED: &str = "unmatched";
/// Method label for non-standard request methods.
pub const METHOD_OTHER: &str = "OTHER";

/// `http_request_duration_seconds`: linear buckets, 10ms wide, starting at 10ms.
pub const DURATION_BUCKET_START: f64 = 0.01;
pub const DURATION_BUCKET_WIDTH: f64 = 0.01;
pub const DURATION_BUCKET_COUNT: usize = 10;

/// Size histograms: exponential buckets 1KiB, 2KiB, ... 512KiB.
pub const SIZE_BUCKET_START: f64 = 1024.0;
pub const SIZE_BUCKET_FACTOR: f64 = 2.0;
pub const SIZE_BUCKET_COUNT: usize = 10;

/// Derive the `status` label from an HTTP status code.
pub fn status_label(code: u16) -> &'static str {
    if code < 400 {
        STATUS_SUCCESS
    } else {
        STATUS_ERROR
    }
}

/// Derive the `method` label; unknown/extension methods collapse to `OTHER`.
pub fn method_label(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "PATCH" => "PATCH",
        "DELETE" => "DELETE",
        "OPTIONS" => "OPTIONS",
        "CONNECT" => "CONNECT",
        "TRACE" => "TRACE",
        _ => METHOD_OTHER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_boundary_is_400() {
        assert_eq!(status_label(200), STATUS_SUCCESS);
        assert_eq!(status_label(399), STATUS_SUCCESS);
        assert_eq!(status_label(400), STATUS_ERROR);
        assert_eq!(status_label(404), STATUS_ERROR);
        assert_eq!(status_label(503), STATUS_ERROR);
    }

    #[test]
    fn extension_methods_are_bucketed() {
        assert_eq!(method_label("GET"), "GET");
        assert_eq!(method_label("PURGE"), METHOD_OTHER);
        assert_eq!(method_label("get"), METHOD_OTHER);
    }
}
