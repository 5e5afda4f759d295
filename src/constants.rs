pub mod shaping {
    /// Maximum characters a string field keeps before truncation.
    pub const MAX_TEXT_LENGTH: usize = 500;
    /// Marker appended to truncated strings.
    pub const TRUNCATION_SUFFIX: &str = "...";
}

pub mod auth {
    /// Seconds subtracted from `expires_in` to absorb clock skew and
    /// in-flight request latency.
    pub const TOKEN_EXPIRY_BUFFER_SECS: u64 = 60;
}

pub mod download {
    /// Bytes read from the head of a finished download for signature sniffing.
    pub const SNIFF_BYTES: usize = 16;
    /// Content-Type prefixes that route a response into the download pipeline.
    pub const STREAM_CONTENT_TYPES: &[&str] =
        &["audio/", "video/", "image/", "application/octet-stream"];
}

pub mod network {
    pub const TIMEOUT_API_REQUEST_MS: u64 = 30_000;
    pub const TIMEOUT_TOKEN_REQUEST_MS: u64 = 15_000;
}
