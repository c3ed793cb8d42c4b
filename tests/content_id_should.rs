use vidveil::model::{ContentId, MediaType};

#[test]
fn test_movie_round_trips_through_string_form() {
    let id = ContentId::movie("550");
    assert_eq!(id.to_string(), "movie-550");
    assert_eq!(ContentId::parse("movie-550"), Some(id));
}

#[test]
fn test_tv_round_trips_through_string_form() {
    let id = ContentId::tv("1399", 1, 10);
    assert_eq!(id.to_string(), "tv-1399-s1e10");
    assert_eq!(ContentId::parse("tv-1399-s1e10"), Some(id));
}

#[test]
fn test_imdb_style_ids_with_dashes_survive() {
    // external ids can themselves contain dashes
    let id = ContentId::parse("tv-some-show-id-s2e5").unwrap();
    assert_eq!(id.external_id, "some-show-id");
    assert_eq!(id.season, Some(2));
    assert_eq!(id.episode, Some(5));
}

#[test]
fn test_parse_rejects_malformed_input() {
    assert!(ContentId::parse("").is_none());
    assert!(ContentId::parse("series-550").is_none());
    assert!(ContentId::parse("tv-1399").is_none());
    assert!(ContentId::parse("tv-1399-s1").is_none());
    assert!(ContentId::parse("tv-1399-sxey").is_none());
}

#[test]
fn test_media_type_parse() {
    assert_eq!(MediaType::parse("movie"), Some(MediaType::Movie));
    assert_eq!(MediaType::parse("tv"), Some(MediaType::Tv));
    assert_eq!(MediaType::parse("show"), None);
}
