//! Response models for the Spotify Web API.
//!
//! Only the fields this server reads are typed. Everything else the upstream
//! returns is kept in `extra` so payloads are handed back to callers unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    ShortTerm,
    #[default]
    MediumTerm,
    LongTerm,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlbumGroup {
    #[default]
    Album,
    Single,
    AppearsOn,
    Compilation,
}

impl AlbumGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlbumGroup::Album => "album",
            AlbumGroup::Single => "single",
            AlbumGroup::AppearsOn => "appears_on",
            AlbumGroup::Compilation => "compilation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    #[default]
    Track,
    Album,
    Artist,
    Playlist,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Track => "track",
            SearchType::Album => "album",
            SearchType::Artist => "artist",
            SearchType::Playlist => "playlist",
        }
    }
}

// Typed fields are either required upstream or nullable but always sent.
// Nullable ones are `Option` without `default`, so `null` round-trips as `null`.
// Anything optional upstream stays in `extra` and is never invented on output.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `id` is `null` for artists of local files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: Option<String>,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `id` is `null` for local files (`is_local: true`); such tracks cannot be
/// played through the Web API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: Option<String>,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Playlist entry. `track` is `null` for items that are no longer available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub track: Option<Track>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTrack {
    pub track: Track,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayHistory {
    pub track: Track,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Offset or cursor page. Pagination fields (`total`, `next`, `cursors`, ...)
/// differ per endpoint and travel in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Search pages can contain `null` entries, hence the optional items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SearchResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Paging<Option<Track>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub albums: Option<Paging<Option<Album>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artists: Option<Paging<Option<Artist>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlists: Option<Paging<Option<Playlist>>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchResults {
    /// First track hit that carries an id, with that id.
    pub fn first_playable(&self) -> Option<(&Track, &str)> {
        self.tracks
            .as_ref()?
            .items
            .iter()
            .flatten()
            .find_map(|track| track.id.as_deref().map(|id| (track, id)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowedArtists {
    pub artists: Paging<Artist>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReleases {
    pub albums: Paging<Album>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistList {
    pub artists: Vec<Artist>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackList {
    pub tracks: Vec<Track>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub tracks: Vec<Track>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Categories {
    pub categories: Paging<Category>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturedPlaylists {
    pub playlists: Paging<Option<Playlist>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: Option<String>,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Devices {
    pub devices: Vec<Device>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde::de::DeserializeOwned;
    use serde_json::json;

    fn round_trip<T: DeserializeOwned + Serialize>(raw: &Value) -> Value {
        let decoded: T = serde_json::from_value(raw.clone()).expect("decodes");
        serde_json::to_value(&decoded).expect("encodes")
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let raw = json!({
            "id": "T1",
            "name": "Bohemian Rhapsody",
            "uri": "spotify:track:T1",
            "popularity": 83,
            "explicit": false,
            "artists": [{"id": "A1", "name": "Queen", "genres": ["rock"]}]
        });
        let track: Track = serde_json::from_value(raw.clone()).expect("track decodes");
        assert_eq!(track.extra.get("popularity"), Some(&json!(83)));
        assert_eq!(serde_json::to_value(&track).expect("encode"), raw);
    }

    #[test]
    fn cursor_pages_pass_through_unchanged() {
        let raw = json!({
            "artists": {
                "cursors": {"after": "abc"},
                "href": "https://api.spotify.com/v1/me/following?type=artist&limit=20",
                "items": [{"id": "A1", "name": "Nina Simone", "followers": {"total": 10}}],
                "limit": 20,
                "next": null,
                "total": 1
            }
        });
        assert_eq!(round_trip::<FollowedArtists>(&raw), raw);
    }

    #[test]
    fn local_tracks_decode_with_null_ids() {
        let raw = json!({
            "items": [{
                "track": {
                    "id": null,
                    "name": "local",
                    "is_local": true,
                    "uri": "spotify:local:::local:180",
                    "artists": [{"id": null, "name": "Someone", "uri": null}]
                },
                "played_at": "2024-01-01T00:00:00Z",
                "context": null
            }],
            "next": null,
            "cursors": {"after": "1", "before": "0"},
            "limit": 1
        });
        let page: Paging<PlayHistory> = serde_json::from_value(raw.clone()).expect("decodes");
        assert!(page.items[0].track.id.is_none());
        assert_eq!(serde_json::to_value(&page).expect("encode"), raw);
    }

    #[rstest]
    #[case::categories(round_trip::<Categories>, json!({
        "categories": {
            "href": "h",
            "items": [{"href": "c", "icons": [], "id": "jazz", "name": "Jazz"}],
            "limit": 1,
            "next": null,
            "offset": 0,
            "previous": null,
            "total": 1
        }
    }))]
    #[case::devices(round_trip::<Devices>, json!({
        "devices": [{"id": null, "name": "Kitchen", "is_active": false, "volume_percent": null}]
    }))]
    fn wrappers_pass_through_unchanged(#[case] codec: fn(&Value) -> Value, #[case] raw: Value) {
        assert_eq!(codec(&raw), raw);
    }

    #[test]
    fn playlist_items_keep_null_tracks() {
        let raw = json!({"added_at": "2020-01-01T00:00:00Z", "track": null, "is_local": false});
        assert_eq!(round_trip::<PlaylistItem>(&raw), raw);
    }

    #[test]
    fn search_skips_null_and_unplayable_hits() {
        let raw = json!({
            "tracks": {
                "items": [
                    null,
                    {"id": null, "name": "local", "is_local": true},
                    {"id": "T2", "name": "Second"}
                ],
                "total": 3, "limit": 10, "offset": 0
            }
        });
        let results: SearchResults = serde_json::from_value(raw).expect("decodes");
        let (track, id) = results.first_playable().expect("playable hit");
        assert_eq!((track.name.as_str(), id), ("Second", "T2"));
    }

    #[test]
    fn empty_search_has_no_playable_track() {
        let results: SearchResults =
            serde_json::from_value(json!({"tracks": {"items": []}})).expect("decodes");
        assert!(results.first_playable().is_none());
        assert!(SearchResults::default().first_playable().is_none());
    }
}
