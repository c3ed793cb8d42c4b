use vidveil::server::services::upstream_services::{
    HeaderTier, infer_content_type, is_strict_cdn, manifest_headers, segment_headers,
};

const SEGMENT: &str = "https://cdn.example/hls/seg-001.ts";
const STRICT_SEGMENT: &str = "https://edge.shadowlandschronicles.net/hls/seg-001.ts";
const REFERER: &str = "https://embed.example/player";

fn names(headers: &[(&'static str, String)]) -> Vec<&'static str> {
    headers.iter().map(|(n, _)| *n).collect()
}

#[test]
fn test_full_tier_sends_cross_origin_headers() {
    let headers = segment_headers(SEGMENT, REFERER, HeaderTier::Full);
    let names = names(&headers);

    assert!(names.contains(&"User-Agent"));
    assert!(names.contains(&"Referer"));
    assert!(names.contains(&"Origin"));
    assert!(names.contains(&"Sec-Fetch-Mode"));

    // origin is the referer's origin, not its full path
    let origin = headers.iter().find(|(n, _)| *n == "Origin").unwrap();
    assert_eq!(origin.1, "https://embed.example");
}

#[test]
fn test_tiers_strictly_shrink() {
    let full = segment_headers(SEGMENT, REFERER, HeaderTier::Full);
    let stripped = segment_headers(SEGMENT, REFERER, HeaderTier::Stripped);
    let minimal = segment_headers(SEGMENT, REFERER, HeaderTier::Minimal);

    assert!(full.len() > stripped.len());
    assert!(stripped.len() > minimal.len());

    // each tier is a subset of the previous one
    for (name, _) in &stripped {
        assert!(full.iter().any(|(n, _)| n == name));
    }
    for (name, _) in &minimal {
        assert!(stripped.iter().any(|(n, _)| n == name));
    }
}

#[test]
fn test_downgrade_ladder_bottoms_out_at_minimal() {
    assert_eq!(HeaderTier::Full.downgrade(), HeaderTier::Stripped);
    assert_eq!(HeaderTier::Stripped.downgrade(), HeaderTier::Minimal);
    assert_eq!(HeaderTier::Minimal.downgrade(), HeaderTier::Minimal);
}

#[test]
fn test_stripped_tier_drops_referer_and_origin() {
    let names = names(&segment_headers(SEGMENT, REFERER, HeaderTier::Stripped));

    assert!(!names.contains(&"Referer"));
    assert!(!names.contains(&"Origin"));
    assert!(!names.contains(&"Sec-Fetch-Mode"));
}

#[test]
fn test_strict_cdn_never_gets_origin_or_sec_fetch() {
    assert!(is_strict_cdn(STRICT_SEGMENT));

    let names = names(&segment_headers(STRICT_SEGMENT, REFERER, HeaderTier::Full));
    assert!(!names.contains(&"Origin"));
    assert!(!names.contains(&"Sec-Fetch-Mode"));
    // referer itself is still allowed at the full tier
    assert!(names.contains(&"Referer"));
}

#[test]
fn test_manifest_headers_skip_origin_for_strict_cdn() {
    let normal = names(&manifest_headers(SEGMENT, REFERER));
    let strict = names(&manifest_headers(STRICT_SEGMENT, REFERER));

    assert!(normal.contains(&"Origin"));
    assert!(!strict.contains(&"Origin"));
}

#[test]
fn test_empty_referer_omits_referer_and_origin() {
    let names = names(&segment_headers(SEGMENT, "", HeaderTier::Full));

    assert!(!names.contains(&"Referer"));
    assert!(!names.contains(&"Origin"));
}

#[test]
fn test_content_type_inference_by_extension() {
    assert_eq!(infer_content_type("https://a/x.vtt", None), "text/vtt");
    assert_eq!(infer_content_type("https://a/x.srt", None), "text/plain");
    assert_eq!(
        infer_content_type("https://a/x.m3u8", None),
        "application/vnd.apple.mpegurl"
    );
    assert_eq!(infer_content_type("https://a/x.ts", None), "video/mp2t");
    assert_eq!(infer_content_type("https://a/x.m4s", None), "video/mp2t");
    assert_eq!(
        infer_content_type("https://a/x.bin", None),
        "application/octet-stream"
    );
}

#[test]
fn test_upstream_content_type_wins_unless_generic() {
    assert_eq!(
        infer_content_type("https://a/x.ts", Some("video/mp4")),
        "video/mp4"
    );
    // octet-stream is a hedge, the extension is more trustworthy
    assert_eq!(
        infer_content_type("https://a/x.vtt", Some("application/octet-stream")),
        "text/vtt"
    );
    // query strings don't confuse the extension check
    assert_eq!(
        infer_content_type("https://a/x.ts?token=abc.vtt", None),
        "video/mp2t"
    );
}
