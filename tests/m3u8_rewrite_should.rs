use vidveil::server::utils::m3u8_utils::rewrite_playlist;
use vidveil::server::utils::url_utils::{decode_url, encode_url};

const PUBLIC_BASE: &str = "http://localhost:5000";
const MANIFEST: &str = "https://cdn.example/hls/720p/index.m3u8";
const REFERER: &str = "https://embed.example/";

#[test]
fn test_relative_segments_route_through_segment_endpoint() {
    let playlist = "#EXTM3U\n#EXTINF:4.0,\nseg-001.ts\n#EXTINF:4.0,\nseg-002.ts";

    let out = rewrite_playlist(playlist, MANIFEST, REFERER, PUBLIC_BASE);
    let lines: Vec<&str> = out.lines().collect();

    assert_eq!(lines[0], "#EXTM3U");
    assert!(lines[2].starts_with("http://localhost:5000/api/proxy/segment?url="));

    // the url param decodes back to the absolutized origin target
    let encoded = lines[2]
        .split("url=")
        .nth(1)
        .unwrap()
        .split('&')
        .next()
        .unwrap();
    assert_eq!(
        decode_url(encoded).unwrap(),
        "https://cdn.example/hls/720p/seg-001.ts"
    );
}

#[test]
fn test_variant_playlists_route_through_m3u8_endpoint() {
    let playlist = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\n360p/index.m3u8";

    let out = rewrite_playlist(playlist, MANIFEST, REFERER, PUBLIC_BASE);
    let last = out.lines().last().unwrap();

    assert!(last.starts_with("http://localhost:5000/api/proxy/m3u8?url="));
}

#[test]
fn test_absolute_urls_pass_through_unresolved() {
    let playlist = "#EXTM3U\n#EXTINF:4.0,\nhttps://other-cdn.example/media/seg.ts";

    let out = rewrite_playlist(playlist, MANIFEST, REFERER, PUBLIC_BASE);
    let last = out.lines().last().unwrap();

    let encoded = last.split("url=").nth(1).unwrap().split('&').next().unwrap();
    assert_eq!(
        decode_url(encoded).unwrap(),
        "https://other-cdn.example/media/seg.ts"
    );
}

#[test]
fn test_uri_attributes_inside_tags_are_rewritten() {
    let playlist = r#"#EXTM3U
#EXT-X-KEY:METHOD=AES-128,URI="key/enc.key",IV=0x1234
#EXTINF:4.0,
seg-001.ts"#;

    let out = rewrite_playlist(playlist, MANIFEST, REFERER, PUBLIC_BASE);
    let key_line = out.lines().nth(1).unwrap();

    assert!(key_line.starts_with("#EXT-X-KEY:METHOD=AES-128,URI=\""));
    assert!(key_line.contains("/api/proxy/segment?url="));
    assert!(key_line.ends_with("\",IV=0x1234"));
}

#[test]
fn test_comment_lines_without_uri_are_untouched() {
    let playlist = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:4\n";

    let out = rewrite_playlist(playlist, MANIFEST, REFERER, PUBLIC_BASE);
    assert_eq!(out, "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:4");
}

#[test]
fn test_blank_lines_are_preserved() {
    let playlist = "#EXTM3U\n\n#EXTINF:4.0,\nseg-001.ts";

    let out = rewrite_playlist(playlist, MANIFEST, REFERER, PUBLIC_BASE);
    assert_eq!(out.lines().nth(1).unwrap(), "");
}

#[test]
fn test_referer_parameter_is_carried() {
    let playlist = "#EXTM3U\n#EXTINF:4.0,\nseg-001.ts";

    let out = rewrite_playlist(playlist, MANIFEST, REFERER, PUBLIC_BASE);
    let last = out.lines().last().unwrap();

    assert!(last.contains(&format!(
        "referer={}",
        urlencoding::encode(REFERER)
    )));
}

#[test]
fn test_strict_cdn_segments_get_manifest_as_referer() {
    let manifest = "https://edge.shadowlandschronicles.net/hls/index.m3u8";
    let playlist = "#EXTM3U\n#EXTINF:4.0,\nseg-001.ts";

    let out = rewrite_playlist(playlist, manifest, REFERER, PUBLIC_BASE);
    let last = out.lines().last().unwrap();

    assert!(last.contains(&format!(
        "referer={}",
        urlencoding::encode(manifest)
    )));
}

#[test]
fn test_rewriting_is_idempotent() {
    let playlist = "#EXTM3U\n#EXTINF:4.0,\nseg-001.ts";

    let once = rewrite_playlist(playlist, MANIFEST, REFERER, PUBLIC_BASE);
    let twice = rewrite_playlist(&once, MANIFEST, REFERER, PUBLIC_BASE);

    assert_eq!(once, twice);
}

#[test]
fn test_url_codec_round_trips() {
    let url = "https://cdn.example/hls/seg.ts?token=a+b/c=";
    assert_eq!(decode_url(&encode_url(url)).unwrap(), url);

    // raw urls with percent-encoded query parts are accepted too
    assert_eq!(
        decode_url("https://cdn.example/hls/seg.ts%3Ftoken%3Dabc").unwrap(),
        "https://cdn.example/hls/seg.ts?token=abc"
    );
}
