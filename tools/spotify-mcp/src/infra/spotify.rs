//! Thin client over the Spotify Web API.
//!
//! Every operation maps to one REST call (two for `create_playlist` and
//! `search_and_play`). The caller supplies the access token on each call; the
//! client never stores one.

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Instant;
use thiserror::Error;

use crate::domain::music::{
    Album, AlbumGroup, Artist, ArtistList, AudioFeatures, Categories, Devices, FeaturedPlaylists,
    FollowedArtists, NewReleases, Paging, PlayHistory, PlaybackState, Playlist, PlaylistItem,
    Recommendations, SavedTrack, SearchResults, SearchType, Snapshot, TimeRange, Track, TrackList,
    UserProfile,
};
use crate::infra::metrics;
use crate::shared::utils::{
    DEFAULT_LIMIT_CEILING, RECOMMENDATIONS_LIMIT_CEILING, clamp_limit, extract_id,
};

pub const DEFAULT_BASE_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_MARKET: &str = "US";
const SEARCH_AND_PLAY_LIMIT: u32 = 10;

#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error("Access token is required")]
    MissingToken,
    #[error("Spotify API Error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Unable to connect to Spotify API")]
    Unreachable(String),
    #[error("Request error: {0}")]
    Request(String),
    #[error("Unexpected response from Spotify API: {0}")]
    InvalidResponse(String),
    #[error("No tracks found for the search query")]
    NoResults { query: String },
}

impl SpotifyError {
    /// HTTP status of the upstream response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            SpotifyError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a retry could plausibly succeed. This client never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            SpotifyError::Api { status, .. } => *status >= 500 || *status == 429,
            SpotifyError::Unreachable(_) => true,
            _ => false,
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> SpotifyError {
    if err.is_builder() {
        SpotifyError::Request(err.to_string())
    } else if err.is_decode() {
        SpotifyError::InvalidResponse(err.to_string())
    } else {
        SpotifyError::Unreachable(err.to_string())
    }
}

/// Strip an optional `Bearer ` prefix and reject empty tokens.
fn clean_token(token: &str) -> Result<&str, SpotifyError> {
    let trimmed = token.trim();
    let bare = match trimmed.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => trimmed[7..].trim_start(),
        _ if trimmed.eq_ignore_ascii_case("bearer") => "",
        _ => trimmed,
    };
    if bare.is_empty() {
        return Err(SpotifyError::MissingToken);
    }
    Ok(bare)
}

fn upstream_message(status: StatusCode, body: &[u8]) -> String {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let from_body = parsed.as_ref().and_then(|v| match v.get("error") {
        Some(Value::Object(err)) => err.get("message").and_then(Value::as_str),
        Some(Value::String(_)) => v
            .get("error_description")
            .and_then(Value::as_str)
            .or_else(|| v.get("error").and_then(Value::as_str)),
        _ => None,
    });
    match from_body {
        Some(message) if !message.is_empty() => message.to_string(),
        _ => status
            .canonical_reason()
            .unwrap_or("Unknown Error")
            .to_string(),
    }
}

type Query = Vec<(&'static str, String)>;

#[derive(Clone, Debug)]
pub struct SpotifyClient {
    http: reqwest::Client,
    base_url: String,
}

impl SpotifyClient {
    pub fn new(base_url: impl Into<String>, user_agent: Option<&str>) -> Result<Self, SpotifyError> {
        let mut builder = reqwest::Client::builder();
        if let Some(agent) = user_agent {
            let mut headers = reqwest::header::HeaderMap::new();
            let value = reqwest::header::HeaderValue::from_str(agent)
                .map_err(|err| SpotifyError::Request(format!("invalid user agent: {err}")))?;
            headers.insert(USER_AGENT, value);
            builder = builder.default_headers(headers);
        }
        let http = builder.build().map_err(map_transport_error)?;
        Ok(Self::with_http(http, base_url))
    }

    pub fn with_http(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one request and return the raw body of a 2xx response.
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        token: &str,
        query: Query,
        body: Option<Value>,
    ) -> Result<Vec<u8>, SpotifyError> {
        let token = clean_token(token)?;
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json");
        if !query.is_empty() {
            request = request.query(&query);
        }
        if let Some(body) = body {
            let encoded =
                serde_json::to_vec(&body).map_err(|err| SpotifyError::Request(err.to_string()))?;
            request = request.body(encoded);
        }

        let started = Instant::now();
        tracing::debug!(%method, endpoint, "spotify request");
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                metrics::record_upstream(method.as_str(), None);
                tracing::warn!(%method, endpoint, %err, "spotify request failed without response");
                return Err(map_transport_error(err));
            }
        };
        let status = response.status();
        metrics::record_upstream(method.as_str(), Some(status.as_u16()));
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if !status.is_success() {
            let message = upstream_message(status, &bytes);
            tracing::warn!(%method, endpoint, status = status.as_u16(), elapsed_ms, %message, "spotify api error");
            return Err(SpotifyError::Api {
                status: status.as_u16(),
                message,
            });
        }
        tracing::debug!(%method, endpoint, status = status.as_u16(), elapsed_ms, bytes = bytes.len(), "spotify response");
        Ok(bytes.to_vec())
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        token: &str,
        query: Query,
        body: Option<Value>,
    ) -> Result<T, SpotifyError> {
        self.request_optional(method, endpoint, token, query, body)
            .await?
            .ok_or_else(|| SpotifyError::InvalidResponse(format!("empty body from {endpoint}")))
    }

    /// Like `request`, but an empty 2xx body decodes to `None`.
    async fn request_optional<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        token: &str,
        query: Query,
        body: Option<Value>,
    ) -> Result<Option<T>, SpotifyError> {
        let bytes = self.send(method, endpoint, token, query, body).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| SpotifyError::InvalidResponse(format!("{endpoint}: {err}")))
    }

    /// For mutation endpoints whose response body carries nothing of interest.
    async fn request_empty(
        &self,
        method: Method,
        endpoint: &str,
        token: &str,
        query: Query,
        body: Option<Value>,
    ) -> Result<(), SpotifyError> {
        self.send(method, endpoint, token, query, body).await?;
        Ok(())
    }

    // -- user -------------------------------------------------------------

    pub async fn get_user_profile(&self, token: &str) -> Result<UserProfile, SpotifyError> {
        self.request(Method::GET, "me", token, vec![], None).await
    }

    pub async fn get_top_tracks(
        &self,
        token: &str,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Paging<Track>, SpotifyError> {
        let query = vec![
            ("time_range", time_range.as_str().to_string()),
            ("limit", clamp_limit(limit, DEFAULT_LIMIT_CEILING).to_string()),
        ];
        self.request(Method::GET, "me/top/tracks", token, query, None)
            .await
    }

    pub async fn get_top_artists(
        &self,
        token: &str,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Paging<Artist>, SpotifyError> {
        let query = vec![
            ("time_range", time_range.as_str().to_string()),
            ("limit", clamp_limit(limit, DEFAULT_LIMIT_CEILING).to_string()),
        ];
        self.request(Method::GET, "me/top/artists", token, query, None)
            .await
    }

    pub async fn get_followed_artists(
        &self,
        token: &str,
        limit: u32,
    ) -> Result<FollowedArtists, SpotifyError> {
        let query = vec![
            ("type", "artist".to_string()),
            ("limit", clamp_limit(limit, DEFAULT_LIMIT_CEILING).to_string()),
        ];
        self.request(Method::GET, "me/following", token, query, None)
            .await
    }

    // -- albums -----------------------------------------------------------

    pub async fn get_album(&self, token: &str, album_id: &str) -> Result<Album, SpotifyError> {
        let endpoint = format!("albums/{}", extract_id(album_id));
        self.request(Method::GET, &endpoint, token, vec![], None)
            .await
    }

    pub async fn get_album_tracks(
        &self,
        token: &str,
        album_id: &str,
        limit: u32,
    ) -> Result<Paging<Track>, SpotifyError> {
        let endpoint = format!("albums/{}/tracks", extract_id(album_id));
        let query = vec![("limit", clamp_limit(limit, DEFAULT_LIMIT_CEILING).to_string())];
        self.request(Method::GET, &endpoint, token, query, None)
            .await
    }

    pub async fn get_new_releases(
        &self,
        token: &str,
        limit: u32,
        country: Option<&str>,
    ) -> Result<NewReleases, SpotifyError> {
        let mut query = vec![("limit", clamp_limit(limit, DEFAULT_LIMIT_CEILING).to_string())];
        if let Some(country) = country {
            query.push(("country", country.to_string()));
        }
        self.request(Method::GET, "browse/new-releases", token, query, None)
            .await
    }

    // -- search -----------------------------------------------------------

    pub async fn search(
        &self,
        token: &str,
        query_text: &str,
        kind: SearchType,
        limit: u32,
    ) -> Result<SearchResults, SpotifyError> {
        let query = vec![
            ("q", query_text.to_string()),
            ("type", kind.as_str().to_string()),
            ("limit", clamp_limit(limit, DEFAULT_LIMIT_CEILING).to_string()),
        ];
        self.request(Method::GET, "search", token, query, None)
            .await
    }

    /// Search for a track and start playing the first hit that has an id. The
    /// play request is only sent once the search has produced such a hit.
    pub async fn search_and_play(&self, token: &str, query_text: &str) -> Result<Track, SpotifyError> {
        let results = self
            .search(token, query_text, SearchType::Track, SEARCH_AND_PLAY_LIMIT)
            .await?;
        let (track, track_id) = results
            .first_playable()
            .ok_or_else(|| SpotifyError::NoResults {
                query: query_text.to_string(),
            })?;
        tracing::info!(track_id, "search matched, starting playback");
        let uris = vec![format!("spotify:track:{}", extract_id(track_id))];
        let track = track.clone();
        self.play(token, None, Some(&uris), None).await?;
        Ok(track)
    }

    // -- artists ----------------------------------------------------------

    pub async fn get_artist(&self, token: &str, artist_id: &str) -> Result<Artist, SpotifyError> {
        let endpoint = format!("artists/{}", extract_id(artist_id));
        self.request(Method::GET, &endpoint, token, vec![], None)
            .await
    }

    pub async fn get_artist_albums(
        &self,
        token: &str,
        artist_id: &str,
        group: AlbumGroup,
        limit: u32,
    ) -> Result<Paging<Album>, SpotifyError> {
        let endpoint = format!("artists/{}/albums", extract_id(artist_id));
        let query = vec![
            ("include_groups", group.as_str().to_string()),
            ("limit", clamp_limit(limit, DEFAULT_LIMIT_CEILING).to_string()),
        ];
        self.request(Method::GET, &endpoint, token, query, None)
            .await
    }

    pub async fn get_related_artists(
        &self,
        token: &str,
        artist_id: &str,
    ) -> Result<ArtistList, SpotifyError> {
        let endpoint = format!("artists/{}/related-artists", extract_id(artist_id));
        self.request(Method::GET, &endpoint, token, vec![], None)
            .await
    }

    pub async fn get_artist_top_tracks(
        &self,
        token: &str,
        artist_id: &str,
        market: Option<&str>,
    ) -> Result<TrackList, SpotifyError> {
        let endpoint = format!("artists/{}/top-tracks", extract_id(artist_id));
        let query = vec![("market", market.unwrap_or(DEFAULT_MARKET).to_string())];
        self.request(Method::GET, &endpoint, token, query, None)
            .await
    }

    // -- tracks & library -------------------------------------------------

    pub async fn get_liked_tracks(
        &self,
        token: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Paging<SavedTrack>, SpotifyError> {
        let query = vec![
            ("limit", clamp_limit(limit, DEFAULT_LIMIT_CEILING).to_string()),
            ("offset", offset.to_string()),
        ];
        self.request(Method::GET, "me/tracks", token, query, None)
            .await
    }

    pub async fn save_tracks(&self, token: &str, track_ids: &[String]) -> Result<(), SpotifyError> {
        let query = vec![("ids", join_ids(track_ids))];
        self.request_empty(Method::PUT, "me/tracks", token, query, None)
            .await
    }

    pub async fn remove_tracks(
        &self,
        token: &str,
        track_ids: &[String],
    ) -> Result<(), SpotifyError> {
        let query = vec![("ids", join_ids(track_ids))];
        self.request_empty(Method::DELETE, "me/tracks", token, query, None)
            .await
    }

    pub async fn get_track(&self, token: &str, track_id: &str) -> Result<Track, SpotifyError> {
        let endpoint = format!("tracks/{}", extract_id(track_id));
        self.request(Method::GET, &endpoint, token, vec![], None)
            .await
    }

    pub async fn get_audio_features(
        &self,
        token: &str,
        track_id: &str,
    ) -> Result<AudioFeatures, SpotifyError> {
        let endpoint = format!("audio-features/{}", extract_id(track_id));
        self.request(Method::GET, &endpoint, token, vec![], None)
            .await
    }

    pub async fn get_recommendations(
        &self,
        token: &str,
        seeds: &RecommendationSeeds,
        limit: u32,
    ) -> Result<Recommendations, SpotifyError> {
        let mut query = vec![(
            "limit",
            clamp_limit(limit, RECOMMENDATIONS_LIMIT_CEILING).to_string(),
        )];
        for (key, values) in [
            ("seed_tracks", &seeds.tracks),
            ("seed_artists", &seeds.artists),
            ("seed_genres", &seeds.genres),
        ] {
            if let Some(values) = values {
                query.push((key, values.join(",")));
            }
        }
        self.request(Method::GET, "recommendations", token, query, None)
            .await
    }

    pub async fn get_recently_played(
        &self,
        token: &str,
        limit: u32,
    ) -> Result<Paging<PlayHistory>, SpotifyError> {
        let query = vec![("limit", clamp_limit(limit, DEFAULT_LIMIT_CEILING).to_string())];
        self.request(Method::GET, "me/player/recently-played", token, query, None)
            .await
    }

    // -- playlists --------------------------------------------------------

    pub async fn get_user_playlists(
        &self,
        token: &str,
        limit: u32,
    ) -> Result<Paging<Playlist>, SpotifyError> {
        let query = vec![("limit", clamp_limit(limit, DEFAULT_LIMIT_CEILING).to_string())];
        self.request(Method::GET, "me/playlists", token, query, None)
            .await
    }

    pub async fn get_playlist(
        &self,
        token: &str,
        playlist_id: &str,
    ) -> Result<Playlist, SpotifyError> {
        let endpoint = format!("playlists/{}", extract_id(playlist_id));
        self.request(Method::GET, &endpoint, token, vec![], None)
            .await
    }

    pub async fn get_playlist_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        limit: u32,
    ) -> Result<Paging<PlaylistItem>, SpotifyError> {
        let endpoint = format!("playlists/{}/tracks", extract_id(playlist_id));
        let query = vec![("limit", clamp_limit(limit, DEFAULT_LIMIT_CEILING).to_string())];
        self.request(Method::GET, &endpoint, token, query, None)
            .await
    }

    /// Looks up the current user first; playlists are created under their id.
    pub async fn create_playlist(
        &self,
        token: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<Playlist, SpotifyError> {
        let profile = self.get_user_profile(token).await?;
        let endpoint = format!("users/{}/playlists", profile.id);
        let body = json!({
            "name": name,
            "description": description,
            "public": public,
        });
        self.request(Method::POST, &endpoint, token, vec![], Some(body))
            .await
    }

    pub async fn add_tracks_to_playlist(
        &self,
        token: &str,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<Snapshot, SpotifyError> {
        let endpoint = format!("playlists/{}/tracks", extract_id(playlist_id));
        let body = json!({ "uris": track_uris });
        self.request(Method::POST, &endpoint, token, vec![], Some(body))
            .await
    }

    pub async fn remove_tracks_from_playlist(
        &self,
        token: &str,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<Snapshot, SpotifyError> {
        let endpoint = format!("playlists/{}/tracks", extract_id(playlist_id));
        let tracks: Vec<Value> = track_uris.iter().map(|uri| json!({ "uri": uri })).collect();
        let body = json!({ "tracks": tracks });
        self.request(Method::DELETE, &endpoint, token, vec![], Some(body))
            .await
    }

    pub async fn save_playlist(&self, token: &str, playlist_id: &str) -> Result<(), SpotifyError> {
        let endpoint = format!("playlists/{}/followers", extract_id(playlist_id));
        self.request_empty(Method::PUT, &endpoint, token, vec![], None)
            .await
    }

    pub async fn unsave_playlist(
        &self,
        token: &str,
        playlist_id: &str,
    ) -> Result<(), SpotifyError> {
        let endpoint = format!("playlists/{}/followers", extract_id(playlist_id));
        self.request_empty(Method::DELETE, &endpoint, token, vec![], None)
            .await
    }

    // -- browse -----------------------------------------------------------

    pub async fn get_categories(
        &self,
        token: &str,
        limit: u32,
        country: Option<&str>,
    ) -> Result<Categories, SpotifyError> {
        let mut query = vec![("limit", clamp_limit(limit, DEFAULT_LIMIT_CEILING).to_string())];
        if let Some(country) = country {
            query.push(("country", country.to_string()));
        }
        self.request(Method::GET, "browse/categories", token, query, None)
            .await
    }

    pub async fn get_featured_playlists(
        &self,
        token: &str,
        limit: u32,
        country: Option<&str>,
    ) -> Result<FeaturedPlaylists, SpotifyError> {
        let mut query = vec![("limit", clamp_limit(limit, DEFAULT_LIMIT_CEILING).to_string())];
        if let Some(country) = country {
            query.push(("country", country.to_string()));
        }
        self.request(Method::GET, "browse/featured-playlists", token, query, None)
            .await
    }

    pub async fn get_category_playlists(
        &self,
        token: &str,
        category_id: &str,
        limit: u32,
    ) -> Result<FeaturedPlaylists, SpotifyError> {
        let endpoint = format!("browse/categories/{}/playlists", extract_id(category_id));
        let query = vec![("limit", clamp_limit(limit, DEFAULT_LIMIT_CEILING).to_string())];
        self.request(Method::GET, &endpoint, token, query, None)
            .await
    }

    // -- player -----------------------------------------------------------

    /// `None` when nothing is playing (upstream answers `204 No Content`).
    pub async fn get_current_playback(
        &self,
        token: &str,
    ) -> Result<Option<PlaybackState>, SpotifyError> {
        self.request_optional(Method::GET, "me/player", token, vec![], None)
            .await
    }

    pub async fn get_devices(&self, token: &str) -> Result<Devices, SpotifyError> {
        self.request(Method::GET, "me/player/devices", token, vec![], None)
            .await
    }

    pub async fn add_to_queue(
        &self,
        token: &str,
        track_uri: &str,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let mut query = vec![("uri", track_uri.to_string())];
        push_device(&mut query, device_id);
        self.request_empty(Method::POST, "me/player/queue", token, query, None)
            .await
    }

    pub async fn play(
        &self,
        token: &str,
        context_uri: Option<&str>,
        track_uris: Option<&[String]>,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let mut body = serde_json::Map::new();
        if let Some(uris) = track_uris {
            body.insert("uris".into(), json!(uris));
        }
        if let Some(context) = context_uri {
            body.insert("context_uri".into(), json!(context));
        }
        let mut query = Vec::new();
        push_device(&mut query, device_id);
        self.request_empty(
            Method::PUT,
            "me/player/play",
            token,
            query,
            Some(Value::Object(body)),
        )
        .await
    }

    pub async fn pause(&self, token: &str, device_id: Option<&str>) -> Result<(), SpotifyError> {
        let mut query = Vec::new();
        push_device(&mut query, device_id);
        self.request_empty(Method::PUT, "me/player/pause", token, query, None)
            .await
    }

    pub async fn skip_to_next(
        &self,
        token: &str,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let mut query = Vec::new();
        push_device(&mut query, device_id);
        self.request_empty(Method::POST, "me/player/next", token, query, None)
            .await
    }

    pub async fn skip_to_previous(
        &self,
        token: &str,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let mut query = Vec::new();
        push_device(&mut query, device_id);
        self.request_empty(Method::POST, "me/player/previous", token, query, None)
            .await
    }

    pub async fn set_volume(
        &self,
        token: &str,
        volume_percent: f64,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let volume = volume_percent.clamp(0.0, 100.0).round() as u8;
        let mut query = vec![("volume_percent", volume.to_string())];
        push_device(&mut query, device_id);
        self.request_empty(Method::PUT, "me/player/volume", token, query, None)
            .await
    }

    pub async fn transfer_playback(
        &self,
        token: &str,
        device_id: &str,
        play: bool,
    ) -> Result<(), SpotifyError> {
        let body = json!({ "device_ids": [device_id], "play": play });
        self.request_empty(Method::PUT, "me/player", token, vec![], Some(body))
            .await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecommendationSeeds {
    pub tracks: Option<Vec<String>>,
    pub artists: Option<Vec<String>>,
    pub genres: Option<Vec<String>>,
}

fn join_ids(ids: &[String]) -> String {
    ids.iter()
        .map(|id| extract_id(id))
        .collect::<Vec<_>>()
        .join(",")
}

fn push_device(query: &mut Query, device_id: Option<&str>) {
    if let Some(device) = device_id {
        query.push(("device_id", device.to_string()));
    }
}
