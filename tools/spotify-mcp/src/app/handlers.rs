//! Tool name to service client call.
//!
//! Arguments reach a handler already validated and defaulted; each handler
//! decodes them into a typed struct and forwards to one `SpotifyClient` method.

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::app::registry::ToolError;
use crate::domain::music::{AlbumGroup, SearchType, TimeRange};
use crate::domain::schema::{JsonObject, ValidationError};
use crate::infra::spotify::{RecommendationSeeds, SpotifyClient, SpotifyError};

pub type ToolHandler = Arc<
    dyn Fn(JsonObject, Arc<SpotifyClient>) -> BoxFuture<'static, Result<Value, ToolError>>
        + Send
        + Sync,
>;

/// Wrap a typed call as a [`ToolHandler`]. A decode failure is reported as
/// invalid arguments for `tool`.
pub fn bind<A, R, F, Fut>(tool: &str, call: F) -> ToolHandler
where
    A: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(A, Arc<SpotifyClient>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, SpotifyError>> + Send + 'static,
{
    let tool = tool.to_string();
    Arc::new(move |args: JsonObject, client: Arc<SpotifyClient>| {
        let decoded = serde_json::from_value::<A>(Value::Object(args)).map_err(|err| {
            ToolError::InvalidArguments {
                tool: tool.clone(),
                source: ValidationError::single("arguments", err.to_string()),
            }
        });
        let pending = decoded.map(|args| call(args, client));
        Box::pin(async move {
            let result = pending?.await?;
            serde_json::to_value(result)
                .map_err(|err| ToolError::Service(SpotifyError::InvalidResponse(err.to_string())))
        })
    })
}

/// Page sizes arrive as JSON numbers; the client clamps them afterwards.
fn count(value: f64) -> u32 {
    value.max(0.0).min(u32::MAX as f64) as u32
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenArgs {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LimitArgs {
    token: String,
    limit: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalizedListArgs {
    token: String,
    limit: f64,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs {
    token: String,
    query: String,
    limit: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchMusicArgs {
    token: String,
    query: String,
    #[serde(rename = "type")]
    kind: SearchType,
    limit: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchAndPlayArgs {
    token: String,
    query: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumArgs {
    token: String,
    album_id: String,
    #[serde(default)]
    limit: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtistArgs {
    token: String,
    artist_id: String,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtistAlbumsArgs {
    token: String,
    artist_id: String,
    album_type: AlbumGroup,
    limit: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopItemsArgs {
    token: String,
    time_range: TimeRange,
    limit: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackArgs {
    token: String,
    track_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LikedTracksArgs {
    token: String,
    limit: f64,
    offset: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackIdsArgs {
    token: String,
    track_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationArgs {
    token: String,
    seed_tracks: Option<Vec<String>>,
    seed_artists: Option<Vec<String>>,
    seed_genres: Option<Vec<String>>,
    limit: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistArgs {
    token: String,
    playlist_id: String,
    #[serde(default)]
    limit: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePlaylistArgs {
    token: String,
    name: String,
    description: Option<String>,
    is_public: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistTracksArgs {
    token: String,
    playlist_id: String,
    track_uris: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryPlaylistsArgs {
    token: String,
    category_id: String,
    limit: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayArgs {
    token: String,
    context_uri: Option<String>,
    track_uris: Option<Vec<String>>,
    device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceArgs {
    token: String,
    device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeArgs {
    token: String,
    volume_percent: f64,
    device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueArgs {
    token: String,
    track_uri: String,
    device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferArgs {
    token: String,
    device_id: String,
    play: bool,
}

fn play(name: &str) -> ToolHandler {
    bind(name, |a: PlayArgs, c: Arc<SpotifyClient>| async move {
        c.play(
            &a.token,
            a.context_uri.as_deref(),
            a.track_uris.as_deref(),
            a.device_id.as_deref(),
        )
        .await
    })
}

fn search_as(name: &str, kind: SearchType) -> ToolHandler {
    bind(name, move |a: SearchArgs, c: Arc<SpotifyClient>| async move {
        c.search(&a.token, &a.query, kind, count(a.limit)).await
    })
}

/// Handler for a catalog tool, or `None` when no client call backs `name`.
pub fn handler_for(name: &str) -> Option<ToolHandler> {
    let handler = match name {
        // albums
        "get_album" => bind(name, |a: AlbumArgs, c: Arc<SpotifyClient>| async move {
            c.get_album(&a.token, &a.album_id).await
        }),
        "get_new_releases" => bind(name, |a: LocalizedListArgs, c: Arc<SpotifyClient>| async move {
            c.get_new_releases(&a.token, count(a.limit), a.country.as_deref())
                .await
        }),
        "get_album_tracks" => bind(name, |a: AlbumArgs, c: Arc<SpotifyClient>| async move {
            let limit = count(a.limit.unwrap_or(50.0));
            c.get_album_tracks(&a.token, &a.album_id, limit).await
        }),
        "search_albums" => search_as(name, SearchType::Album),

        // artists
        "get_artist" => bind(name, |a: ArtistArgs, c: Arc<SpotifyClient>| async move {
            c.get_artist(&a.token, &a.artist_id).await
        }),
        "get_artist_albums" => bind(name, |a: ArtistAlbumsArgs, c: Arc<SpotifyClient>| async move {
            c.get_artist_albums(&a.token, &a.artist_id, a.album_type, count(a.limit))
                .await
        }),
        "get_related_artists" => bind(name, |a: ArtistArgs, c: Arc<SpotifyClient>| async move {
            c.get_related_artists(&a.token, &a.artist_id).await
        }),
        "get_artist_top_tracks" => bind(name, |a: ArtistArgs, c: Arc<SpotifyClient>| async move {
            c.get_artist_top_tracks(&a.token, &a.artist_id, a.country.as_deref())
                .await
        }),
        "search_artists" => search_as(name, SearchType::Artist),
        "get_followed_artists" => bind(name, |a: LimitArgs, c: Arc<SpotifyClient>| async move {
            c.get_followed_artists(&a.token, count(a.limit)).await
        }),
        "get_top_artists" => bind(name, |a: TopItemsArgs, c: Arc<SpotifyClient>| async move {
            c.get_top_artists(&a.token, a.time_range, count(a.limit))
                .await
        }),

        // tracks
        "get_track" => bind(name, |a: TrackArgs, c: Arc<SpotifyClient>| async move {
            c.get_track(&a.token, &a.track_id).await
        }),
        "get_audio_features" => bind(name, |a: TrackArgs, c: Arc<SpotifyClient>| async move {
            c.get_audio_features(&a.token, &a.track_id).await
        }),
        "search_tracks" => search_as(name, SearchType::Track),
        "get_liked_tracks" => bind(name, |a: LikedTracksArgs, c: Arc<SpotifyClient>| async move {
            c.get_liked_tracks(&a.token, count(a.limit), count(a.offset))
                .await
        }),
        "save_tracks" => bind(name, |a: TrackIdsArgs, c: Arc<SpotifyClient>| async move {
            c.save_tracks(&a.token, &a.track_ids).await
        }),
        "remove_tracks" => bind(name, |a: TrackIdsArgs, c: Arc<SpotifyClient>| async move {
            c.remove_tracks(&a.token, &a.track_ids).await
        }),
        "get_top_tracks" => bind(name, |a: TopItemsArgs, c: Arc<SpotifyClient>| async move {
            c.get_top_tracks(&a.token, a.time_range, count(a.limit))
                .await
        }),
        "get_recently_played" => bind(name, |a: LimitArgs, c: Arc<SpotifyClient>| async move {
            c.get_recently_played(&a.token, count(a.limit)).await
        }),
        "get_recommendations" => bind(name, |a: RecommendationArgs, c: Arc<SpotifyClient>| async move {
            let seeds = RecommendationSeeds {
                tracks: a.seed_tracks,
                artists: a.seed_artists,
                genres: a.seed_genres,
            };
            c.get_recommendations(&a.token, &seeds, count(a.limit))
                .await
        }),

        // playlists
        "get_playlist" => bind(name, |a: PlaylistArgs, c: Arc<SpotifyClient>| async move {
            c.get_playlist(&a.token, &a.playlist_id).await
        }),
        "get_user_playlists" => bind(name, |a: LimitArgs, c: Arc<SpotifyClient>| async move {
            c.get_user_playlists(&a.token, count(a.limit)).await
        }),
        "get_playlist_tracks" => bind(name, |a: PlaylistArgs, c: Arc<SpotifyClient>| async move {
            let limit = count(a.limit.unwrap_or(50.0));
            c.get_playlist_tracks(&a.token, &a.playlist_id, limit).await
        }),
        "create_playlist" => bind(name, |a: CreatePlaylistArgs, c: Arc<SpotifyClient>| async move {
            let description = a.description.unwrap_or_default();
            c.create_playlist(&a.token, &a.name, &description, a.is_public)
                .await
        }),
        "add_to_playlist" => bind(name, |a: PlaylistTracksArgs, c: Arc<SpotifyClient>| async move {
            c.add_tracks_to_playlist(&a.token, &a.playlist_id, &a.track_uris)
                .await
        }),
        "remove_from_playlist" => bind(name, |a: PlaylistTracksArgs, c: Arc<SpotifyClient>| async move {
            c.remove_tracks_from_playlist(&a.token, &a.playlist_id, &a.track_uris)
                .await
        }),
        "search_playlists" => search_as(name, SearchType::Playlist),
        "get_categories" => bind(name, |a: LocalizedListArgs, c: Arc<SpotifyClient>| async move {
            c.get_categories(&a.token, count(a.limit), a.country.as_deref())
                .await
        }),
        "get_featured_playlists" => bind(name, |a: LocalizedListArgs, c: Arc<SpotifyClient>| async move {
            c.get_featured_playlists(&a.token, count(a.limit), a.country.as_deref())
                .await
        }),
        "get_category_playlists" => bind(name, |a: CategoryPlaylistsArgs, c: Arc<SpotifyClient>| async move {
            c.get_category_playlists(&a.token, &a.category_id, count(a.limit))
                .await
        }),
        "save_playlist" => bind(name, |a: PlaylistArgs, c: Arc<SpotifyClient>| async move {
            c.save_playlist(&a.token, &a.playlist_id).await
        }),
        "unsave_playlist" => bind(name, |a: PlaylistArgs, c: Arc<SpotifyClient>| async move {
            c.unsave_playlist(&a.token, &a.playlist_id).await
        }),

        // playback
        "get_currently_playing" => bind(name, |a: TokenArgs, c: Arc<SpotifyClient>| async move {
            c.get_current_playback(&a.token).await
        }),
        "start_playback" | "resume_player" => play(name),
        "pause_player" => bind(name, |a: DeviceArgs, c: Arc<SpotifyClient>| async move {
            c.pause(&a.token, a.device_id.as_deref()).await
        }),
        "skip_to_next" => bind(name, |a: DeviceArgs, c: Arc<SpotifyClient>| async move {
            c.skip_to_next(&a.token, a.device_id.as_deref()).await
        }),
        "skip_to_previous" => bind(name, |a: DeviceArgs, c: Arc<SpotifyClient>| async move {
            c.skip_to_previous(&a.token, a.device_id.as_deref()).await
        }),
        "set_volume" => bind(name, |a: VolumeArgs, c: Arc<SpotifyClient>| async move {
            c.set_volume(&a.token, a.volume_percent, a.device_id.as_deref())
                .await
        }),
        "add_to_queue" => bind(name, |a: QueueArgs, c: Arc<SpotifyClient>| async move {
            c.add_to_queue(&a.token, &a.track_uri, a.device_id.as_deref())
                .await
        }),
        "get_devices" => bind(name, |a: TokenArgs, c: Arc<SpotifyClient>| async move {
            c.get_devices(&a.token).await
        }),
        "transfer_playback" => bind(name, |a: TransferArgs, c: Arc<SpotifyClient>| async move {
            c.transfer_playback(&a.token, &a.device_id, a.play).await
        }),

        // user
        "get_user_profile" => bind(name, |a: TokenArgs, c: Arc<SpotifyClient>| async move {
            c.get_user_profile(&a.token).await
        }),

        // search
        "search_music" => bind(name, |a: SearchMusicArgs, c: Arc<SpotifyClient>| async move {
            c.search(&a.token, &a.query, a.kind, count(a.limit)).await
        }),
        "search_and_play_music" => bind(name, |a: SearchAndPlayArgs, c: Arc<SpotifyClient>| async move {
            c.search_and_play(&a.token, &a.query).await
        }),
        _ => return None,
    };
    Some(handler)
}
