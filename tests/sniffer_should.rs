use vidveil::browser::sniffer::NetworkSniffer;
use vidveil::model::SubtitleSource;

const MANIFEST: &str = "https://cdn.example/hls/master.m3u8";

#[test]
fn test_discards_manifests_before_server_switch() {
    let sniffer = NetworkSniffer::new();

    sniffer.observe_response(MANIFEST, 200, Some("https://embed.example/"));
    assert!(sniffer.manifest().is_none());

    sniffer.mark_switched();
    sniffer.observe_response(MANIFEST, 200, Some("https://embed.example/"));

    let hit = sniffer.manifest().expect("post-switch manifest kept");
    assert_eq!(hit.url, MANIFEST);
    assert_eq!(hit.referer, "https://embed.example/");
}

#[test]
fn test_first_manifest_wins() {
    let sniffer = NetworkSniffer::new();
    sniffer.mark_switched();

    sniffer.observe_response(MANIFEST, 200, None);
    sniffer.observe_response("https://other.example/alt.m3u8", 200, None);

    assert_eq!(sniffer.manifest().unwrap().url, MANIFEST);
}

#[test]
fn test_ignores_error_responses_and_blob_urls() {
    let sniffer = NetworkSniffer::new();
    sniffer.mark_switched();

    sniffer.observe_response(MANIFEST, 403, None);
    sniffer.observe_response("blob:https://embed.example/abc123", 200, None);

    assert!(sniffer.manifest().is_none());
}

#[test]
fn test_manifest_with_query_string_is_recognized() {
    let sniffer = NetworkSniffer::new();
    sniffer.mark_switched();

    sniffer.observe_response("https://cdn.example/hls/master.m3u8?token=xyz", 200, None);
    assert!(sniffer.manifest().is_some());
}

#[test]
fn test_missing_referer_falls_back_to_page_url() {
    let sniffer = NetworkSniffer::new();
    sniffer.set_page_url("https://embed.example/movie/550");
    sniffer.mark_switched();

    sniffer.observe_response(MANIFEST, 200, None);
    assert_eq!(
        sniffer.manifest().unwrap().referer,
        "https://embed.example/movie/550"
    );
}

#[test]
fn test_collects_network_subtitles_with_dedup() {
    let sniffer = NetworkSniffer::new();

    // subtitle capture doesn't wait for the switch
    sniffer.observe_response("https://cdn.example/subs/en.vtt", 200, None);
    sniffer.observe_response("https://cdn.example/subs/en.vtt", 200, None);
    sniffer.observe_response("https://cdn.example/subs/other.srt", 200, None);

    let subs = sniffer.subtitles();
    assert_eq!(subs.len(), 2);
    assert!(subs.iter().all(|t| t.source == SubtitleSource::Network));
}

#[test]
fn test_player_body_scan_keeps_only_english_tracks() {
    let sniffer = NetworkSniffer::new();

    let body = r#"{"tracks":"[English]https://cdn.example/subs/en.vtt[Spanish]https://cdn.example/subs/es.vtt[en]https://cdn.example/subs/en2.vtt"}"#;
    sniffer.scan_player_body(body);

    let subs = sniffer.subtitles();
    assert_eq!(subs.len(), 2);
    assert!(subs.iter().all(|t| t.language_code == "en"));
    assert!(subs.iter().all(|t| t.source == SubtitleSource::Embedded));
}

#[test]
fn test_player_endpoint_detection() {
    assert!(NetworkSniffer::is_player_endpoint(
        "https://embed.example/ajax/getSources?id=1"
    ));
    assert!(NetworkSniffer::is_player_endpoint(
        "https://embed.example/api/source/550"
    ));
    assert!(!NetworkSniffer::is_player_endpoint(
        "https://cdn.example/hls/seg-001.ts"
    ));
}
