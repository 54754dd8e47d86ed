use rstest::rstest;
use serde_json::{Value, json};
use spotify_mcp::{
    domain::music::{SearchType, TimeRange},
    infra::spotify::{RecommendationSeeds, SpotifyClient, SpotifyError},
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

fn client_for(server: &MockServer) -> SpotifyClient {
    SpotifyClient::with_http(reqwest::Client::new(), format!("{}/v1/", server.uri()))
}

fn track(id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Track {id}"),
        "uri": format!("spotify:track:{id}"),
        "artists": [{"id": "a1", "name": "Artist"}],
    })
}

#[tokio::test]
async fn sends_bearer_token_and_decodes_album() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/albums/4aawyAB9vmqN3uQ7FjRGTy"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "4aawyAB9vmqN3uQ7FjRGTy",
            "name": "Global Warming",
            "label": "Mr.305",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let album = client_for(&server)
        .get_album("Bearer abc", "spotify:album:4aawyAB9vmqN3uQ7FjRGTy")
        .await
        .expect("album");
    assert_eq!(album.name, "Global Warming");
    assert_eq!(album.extra.get("label"), Some(&json!("Mr.305")));
}

#[tokio::test]
async fn oversized_limits_are_clamped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/top/tracks"))
        .and(query_param("limit", "50"))
        .and(query_param("time_range", "short_term"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/recommendations"))
        .and(query_param("limit", "100"))
        .and(query_param("seed_genres", "jazz,soul"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tracks": [], "seeds": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let page = client
        .get_top_tracks("t", TimeRange::ShortTerm, 999)
        .await
        .expect("top tracks");
    assert!(page.items.is_empty());

    let seeds = RecommendationSeeds {
        genres: Some(vec!["jazz".into(), "soul".into()]),
        ..Default::default()
    };
    client
        .get_recommendations("t", &seeds, 500)
        .await
        .expect("recommendations");
}

#[rstest]
#[case::empty("")]
#[case::whitespace("   ")]
#[case::bare_prefix("Bearer ")]
#[tokio::test]
async fn missing_token_makes_no_request(#[case] token: &str) {
    let server = MockServer::start().await;
    let client = client_for(&server);
    let failures = vec![
        client.get_user_profile(token).await.err(),
        client.get_liked_tracks(token, 20, 0).await.err(),
        client.set_volume(token, 40.0, None).await.err(),
        client.create_playlist(token, "Modal", "", true).await.err(),
        client.search_and_play(token, "so what").await.err(),
    ];
    for err in failures {
        let err = err.expect("call must fail");
        assert!(matches!(err, SpotifyError::MissingToken), "{token:?}: {err}");
        assert_eq!(err.to_string(), "Access token is required");
    }
    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
}

#[tokio::test]
async fn api_errors_carry_status_and_upstream_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tracks/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"status": 404, "message": "Non existing id"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get_track("t", "missing").await.unwrap_err();
    assert_eq!(err.to_string(), "Spotify API Error: 404 - Non existing id");
    assert_eq!(err.status(), Some(404));
    assert!(!err.is_retryable());

    let err = client.get_devices("t").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Spotify API Error: 503 - Service Unavailable"
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn unreachable_upstream_is_retryable() {
    let client = SpotifyClient::with_http(reqwest::Client::new(), "http://127.0.0.1:9/v1");
    let err = client.get_user_profile("t").await.unwrap_err();
    assert!(matches!(err, SpotifyError::Unreachable(_)));
    assert_eq!(err.to_string(), "Unable to connect to Spotify API");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn search_and_play_plays_first_hit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("q", "so what"))
        .and(query_param("type", "track"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tracks": {"items": [track("T1"), track("T2")], "total": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/me/player/play"))
        .and(body_json(json!({"uris": ["spotify:track:T1"]})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let played = client_for(&server)
        .search_and_play("t", "so what")
        .await
        .expect("search and play");
    assert_eq!(played.id.as_deref(), Some("T1"));
}

#[tokio::test]
async fn search_and_play_without_hits_never_plays() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tracks": {"items": [], "total": 0}
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/me/player/play"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .search_and_play("t", "zzzz")
        .await
        .unwrap_err();
    assert!(matches!(err, SpotifyError::NoResults { ref query } if query == "zzzz"));
    assert_eq!(err.to_string(), "No tracks found for the search query");
}

#[tokio::test]
async fn search_and_play_skips_local_files() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tracks": {"items": [
                {"id": null, "name": "demo.mp3", "is_local": true, "artists": []},
                track("T2")
            ]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/me/player/play"))
        .and(body_json(json!({"uris": ["spotify:track:T2"]})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let played = client_for(&server)
        .search_and_play("t", "demo")
        .await
        .expect("search and play");
    assert_eq!(played.id.as_deref(), Some("T2"));
}

#[tokio::test]
async fn recently_played_keeps_cursors_and_local_tracks() {
    let server = MockServer::start().await;
    let body = json!({
        "items": [{
            "track": {"id": null, "name": "local", "is_local": true, "artists": []},
            "played_at": "2024-03-01T10:00:00.000Z",
            "context": null
        }],
        "next": null,
        "cursors": {"after": "1709287200000", "before": "1709287200000"},
        "limit": 1,
        "href": "https://api.spotify.com/v1/me/player/recently-played?limit=1"
    });
    Mock::given(method("GET"))
        .and(path("/v1/me/player/recently-played"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
        .mount(&server)
        .await;

    let page = client_for(&server)
        .get_recently_played("t", 1)
        .await
        .expect("recently played");
    assert!(page.items[0].track.id.is_none());
    assert_eq!(serde_json::to_value(&page).expect("encode"), body);
}

#[tokio::test]
async fn create_playlist_looks_up_user_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "miles",
            "display_name": "Miles"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/users/miles/playlists"))
        .and(body_json(json!({
            "name": "Modal",
            "description": "late night",
            "public": false
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "p1",
            "name": "Modal"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let playlist = client_for(&server)
        .create_playlist("t", "Modal", "late night", false)
        .await
        .expect("playlist");
    assert_eq!(playlist.id, "p1");
}

#[tokio::test]
async fn idle_player_reports_no_playback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let state = client_for(&server)
        .get_current_playback("t")
        .await
        .expect("playback");
    assert!(state.is_none());
}

#[tokio::test]
async fn playlist_track_removal_sends_uri_objects() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/playlists/p1/tracks"))
        .and(body_json(json!({
            "tracks": [{"uri": "spotify:track:T1"}, {"uri": "spotify:track:T2"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"snapshot_id": "s2"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("type", "album"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "albums": {"items": [null, {"id": "al1", "name": "Kind of Blue"}]}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let uris = vec!["spotify:track:T1".to_string(), "spotify:track:T2".to_string()];
    client
        .remove_tracks_from_playlist("t", "p1", &uris)
        .await
        .expect("remove");

    let results = client
        .search("t", "kind of blue", SearchType::Album, 5)
        .await
        .expect("search");
    let albums = results.albums.expect("albums page");
    assert_eq!(albums.items.len(), 2);
    assert!(albums.items[0].is_none());
}
