//! Compression policy.
//!
//! Decides from the origin's declared metadata alone whether re-encoding is
//! worth it. Nothing here looks at the image bytes.

use crate::config::CompressionConfig;

/// Below this, WebP container overhead eats the savings.
pub const MIN_COMPRESS_LENGTH: u64 = 512;

/// PNG/GIF below this rarely shrink when flattened to JPEG.
pub const MIN_TRANSPARENT_COMPRESS_LENGTH: u64 = 100_000;

/// Output format chosen for a compressed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    WebP,
    /// Drops alpha; transparent pixels come out on black.
    Jpeg,
}

impl TargetFormat {
    pub fn negotiate(supports_webp: bool) -> Self {
        if supports_webp {
            TargetFormat::WebP
        } else {
            TargetFormat::Jpeg
        }
    }

    /// Subtype used in `image/<format>`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFormat::WebP => "webp",
            TargetFormat::Jpeg => "jpeg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            TargetFormat::WebP => "image/webp",
            TargetFormat::Jpeg => "image/jpeg",
        }
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size thresholds for the eligibility decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPolicy {
    pub min_compress_length: u64,
    pub min_transparent_compress_length: u64,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self {
            min_compress_length: MIN_COMPRESS_LENGTH,
            min_transparent_compress_length: MIN_TRANSPARENT_COMPRESS_LENGTH,
        }
    }
}

impl From<&CompressionConfig> for CompressionPolicy {
    fn from(config: &CompressionConfig) -> Self {
        Self {
            min_compress_length: config.min_compress_length,
            min_transparent_compress_length: config.min_transparent_compress_length,
        }
    }
}

impl CompressionPolicy {
    /// Whether an origin response with this declared type and length should
    /// be re-encoded for a client with the given WebP support.
    pub fn eligible(
        &self,
        content_type: Option<&str>,
        content_length: Option<u64>,
        supports_webp: bool,
    ) -> bool {
        let content_type = match content_type {
            Some(t) if t.starts_with("image") => t,
            _ => return false,
        };

        let length = match content_length {
            Some(0) | None => return false,
            Some(length) => length,
        };

        if supports_webp && length < self.min_compress_length {
            return false;
        }

        if !supports_webp
            && (content_type.ends_with("png") || content_type.ends_with("gif"))
            && length < self.min_transparent_compress_length
        {
            return false;
        }

        true
    }
}

/// [`CompressionPolicy::eligible`] with the default thresholds.
pub fn should_compress(
    content_type: Option<&str>,
    content_length: Option<u64>,
    supports_webp: bool,
) -> bool {
    CompressionPolicy::default().eligible(content_type, content_length, supports_webp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_image_types_never_compress() {
        for content_type in ["text/html", "application/octet-stream", "video/mp4", ""] {
            for length in [Some(1), Some(10_000), Some(10_000_000), None] {
                for webp in [true, false] {
                    assert!(!should_compress(Some(content_type), length, webp));
                }
            }
        }
    }

    #[test]
    fn missing_type_never_compresses() {
        assert!(!should_compress(None, Some(1_000_000), true));
    }

    #[test]
    fn zero_or_missing_length_never_compresses() {
        assert!(!should_compress(Some("image/jpeg"), Some(0), true));
        assert!(!should_compress(Some("image/jpeg"), None, true));
        assert!(!should_compress(Some("image/jpeg"), None, false));
    }

    #[test]
    fn png_below_transparency_threshold_without_webp() {
        assert!(!should_compress(Some("image/png"), Some(50_000), false));
        assert!(should_compress(Some("image/png"), Some(50_000), true));
        assert!(should_compress(Some("image/png"), Some(100_000), false));
    }

    #[test]
    fn gif_follows_png_rule() {
        assert!(!should_compress(Some("image/gif"), Some(99_999), false));
        assert!(should_compress(Some("image/gif"), Some(99_999), true));
    }

    #[test]
    fn jpeg_minimum_length_with_webp() {
        assert!(!should_compress(Some("image/jpeg"), Some(100), true));
        assert!(should_compress(Some("image/jpeg"), Some(1000), true));
        assert!(should_compress(Some("image/jpeg"), Some(512), true));
    }

    #[test]
    fn small_jpeg_without_webp_is_eligible() {
        // The 512 floor only applies on the WebP path.
        assert!(should_compress(Some("image/jpeg"), Some(100), false));
    }

    #[test]
    fn decision_is_stable() {
        let inputs = [
            (Some("image/png"), Some(50_000), false),
            (Some("image/jpeg"), Some(1000), true),
            (Some("text/plain"), Some(1000), true),
        ];
        for (t, l, w) in inputs {
            let first = should_compress(t, l, w);
            for _ in 0..10 {
                assert_eq!(should_compress(t, l, w), first);
            }
        }
    }

    #[test]
    fn configured_thresholds_apply() {
        let policy = CompressionPolicy::from(&CompressionConfig {
            min_compress_length: 10,
            min_transparent_compress_length: 20,
            ..CompressionConfig::default()
        });
        assert!(policy.eligible(Some("image/jpeg"), Some(11), true));
        assert!(policy.eligible(Some("image/png"), Some(25), false));
        assert!(!policy.eligible(Some("image/png"), Some(15), false));
    }

    #[test]
    fn format_negotiation() {
        assert_eq!(TargetFormat::negotiate(true), TargetFormat::WebP);
        assert_eq!(TargetFormat::negotiate(false), TargetFormat::Jpeg);
        assert_eq!(TargetFormat::WebP.content_type(), "image/webp");
        assert_eq!(TargetFormat::Jpeg.to_string(), "jpeg");
    }
}
