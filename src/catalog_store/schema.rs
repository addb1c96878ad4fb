//! SQLite schema for the catalog and listening-activity tables.
//!
//! Embedding columns are nullable BLOBs of little-endian `f32` written by the
//! background embedding worker. Timestamps are unix seconds.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artists",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const ALBUM_FK: ForeignKey = ForeignKey {
    foreign_table: "albums",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::SetNull,
};

const TRACK_FK: ForeignKey = ForeignKey {
    foreign_table: "tracks",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const PLAYLIST_FK: ForeignKey = ForeignKey {
    foreign_table: "playlists",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const ADVERTISEMENT_FK: ForeignKey = ForeignKey {
    foreign_table: "advertisements",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("bio", &SqlType::Text),
        sqlite_column!("is_verified", &SqlType::Integer, non_null = true, default_value = Some("0")),
        // JSON array of genre tags
        sqlite_column!("genres", &SqlType::Text, non_null = true, default_value = Some("'[]'")),
        sqlite_column!("meta_embedding", &SqlType::Blob),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true, default_value = Some(DEFAULT_TIMESTAMP)),
    ],
    indices: &[("idx_artists_created", "created_at")],
    unique_constraints: &[],
};

const ALBUMS_TABLE: Table = Table {
    name: "albums",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("artist_id", &SqlType::Text, non_null = true, foreign_key = Some(&ARTIST_FK)),
        sqlite_column!("meta_embedding", &SqlType::Blob),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true, default_value = Some(DEFAULT_TIMESTAMP)),
    ],
    indices: &[
        ("idx_albums_artist", "artist_id"),
        ("idx_albums_created", "created_at"),
    ],
    unique_constraints: &[],
};

const TRACKS_TABLE: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("artist_id", &SqlType::Text, non_null = true, foreign_key = Some(&ARTIST_FK)),
        sqlite_column!("album_id", &SqlType::Text, foreign_key = Some(&ALBUM_FK)),
        sqlite_column!("genre_id", &SqlType::Text),
        sqlite_column!("duration_secs", &SqlType::Integer, non_null = true, default_value = Some("0")),
        // JSON array of free-form tags
        sqlite_column!("tags", &SqlType::Text, non_null = true, default_value = Some("'[]'")),
        sqlite_column!("popularity", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("meta_embedding", &SqlType::Blob),
        sqlite_column!("audio_embedding", &SqlType::Blob),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true, default_value = Some(DEFAULT_TIMESTAMP)),
    ],
    indices: &[
        ("idx_tracks_artist", "artist_id"),
        ("idx_tracks_album", "album_id"),
        ("idx_tracks_created", "created_at"),
    ],
    unique_constraints: &[],
};

const PLAYLISTS_TABLE: Table = Table {
    name: "playlists",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("owner_id", &SqlType::Text, non_null = true),
        sqlite_column!("is_public", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("meta_embedding", &SqlType::Blob),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true, default_value = Some(DEFAULT_TIMESTAMP)),
    ],
    indices: &[("idx_playlists_owner", "owner_id")],
    unique_constraints: &[],
};

const PLAYLIST_ITEMS_TABLE: Table = Table {
    name: "playlist_items",
    columns: &[
        sqlite_column!("playlist_id", &SqlType::Text, non_null = true, foreign_key = Some(&PLAYLIST_FK)),
        sqlite_column!("track_id", &SqlType::Text, non_null = true, foreign_key = Some(&TRACK_FK)),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_playlist_items_track", "track_id")],
    unique_constraints: &[&["playlist_id", "position"]],
};

const PLAY_HISTORY_TABLE: Table = Table {
    name: "play_history",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("user_id", &SqlType::Text, non_null = true),
        sqlite_column!("track_id", &SqlType::Text, non_null = true, foreign_key = Some(&TRACK_FK)),
        sqlite_column!("played_at", &SqlType::Integer, non_null = true, default_value = Some(DEFAULT_TIMESTAMP)),
    ],
    indices: &[
        ("idx_play_history_user", "user_id, played_at"),
        ("idx_play_history_track", "track_id, played_at"),
    ],
    unique_constraints: &[],
};

const TRACK_LIKES_TABLE: Table = Table {
    name: "track_likes",
    columns: &[
        sqlite_column!("user_id", &SqlType::Text, non_null = true),
        sqlite_column!("track_id", &SqlType::Text, non_null = true, foreign_key = Some(&TRACK_FK)),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true, default_value = Some(DEFAULT_TIMESTAMP)),
    ],
    indices: &[("idx_track_likes_track", "track_id")],
    unique_constraints: &[&["user_id", "track_id"]],
};

const ARTIST_FOLLOWS_TABLE: Table = Table {
    name: "artist_follows",
    columns: &[
        sqlite_column!("user_id", &SqlType::Text, non_null = true),
        sqlite_column!("artist_id", &SqlType::Text, non_null = true, foreign_key = Some(&ARTIST_FK)),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true, default_value = Some(DEFAULT_TIMESTAMP)),
    ],
    indices: &[("idx_artist_follows_artist", "artist_id")],
    unique_constraints: &[&["user_id", "artist_id"]],
};

/// Free-text taste description entered by a listener, plus its embedding.
const LISTENER_PREFERENCES_TABLE: Table = Table {
    name: "listener_preferences",
    columns: &[
        sqlite_column!("user_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("description", &SqlType::Text, non_null = true),
        sqlite_column!("meta_embedding", &SqlType::Blob),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true, default_value = Some(DEFAULT_TIMESTAMP)),
    ],
    indices: &[],
    unique_constraints: &[],
};

const ADVERTISEMENTS_TABLE: Table = Table {
    name: "advertisements",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        // Identifier understood by the media signing service
        sqlite_column!("audio_id", &SqlType::Text, non_null = true),
        sqlite_column!("is_active", &SqlType::Integer, non_null = true, default_value = Some("1")),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true, default_value = Some(DEFAULT_TIMESTAMP)),
    ],
    indices: &[],
    unique_constraints: &[],
};

const AD_IMPRESSIONS_TABLE: Table = Table {
    name: "ad_impressions",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("ad_id", &SqlType::Text, non_null = true, foreign_key = Some(&ADVERTISEMENT_FK)),
        sqlite_column!("user_id", &SqlType::Text, non_null = true),
        sqlite_column!("shown_at", &SqlType::Integer, non_null = true, default_value = Some(DEFAULT_TIMESTAMP)),
    ],
    indices: &[("idx_ad_impressions_ad", "ad_id")],
    unique_constraints: &[],
};

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        ARTISTS_TABLE,
        ALBUMS_TABLE,
        TRACKS_TABLE,
        PLAYLISTS_TABLE,
        PLAYLIST_ITEMS_TABLE,
        PLAY_HISTORY_TABLE,
        TRACK_LIKES_TABLE,
        ARTIST_FOLLOWS_TABLE,
        LISTENER_PREFERENCES_TABLE,
        ADVERTISEMENTS_TABLE,
        AD_IMPRESSIONS_TABLE,
    ],
    migration: None,
}];
