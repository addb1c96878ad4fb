//! Test fixture creation for the catalog database
//!
//! The service never writes catalog entities itself (an upstream ingestion
//! pipeline does), so fixtures use direct SQL inserts on a schema created by
//! `SqliteCatalogStore`.

use super::constants::*;
use anyhow::Result;
use cadence_server::catalog_store::{encode_embedding, SqliteCatalogStore};
use rusqlite::{params, Connection};
use std::path::PathBuf;
use tempfile::TempDir;

fn blob(vector: &[f32]) -> Vec<u8> {
    encode_embedding(vector)
}

fn insert_track(
    conn: &Connection,
    id: &str,
    title: &str,
    artist_id: &str,
    album_id: Option<&str>,
    created_at: i64,
    embedding: Option<&[f32]>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO tracks (id, title, artist_id, album_id, duration_secs, meta_embedding, audio_embedding, created_at)
         VALUES (?1, ?2, ?3, ?4, 240, ?5, ?5, ?6)",
        params![id, title, artist_id, album_id, embedding.map(blob), created_at],
    )?;
    Ok(())
}

/// Creates a temporary catalog with 2 artists, 2 albums, 6 tracks, one
/// playlist and two advertisements.
/// Returns (temp_dir, catalog_db_path)
pub fn create_test_catalog() -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let catalog_db_path = dir.path().join("catalog.db");

    // Initialize the store (creates schema)
    let _store = SqliteCatalogStore::new(&catalog_db_path, 1)?;

    let conn = Connection::open(&catalog_db_path)?;

    // Insert artists
    conn.execute(
        "INSERT INTO artists (id, name, created_at) VALUES (?1, 'The Test Band', 100)",
        [ARTIST_1_ID],
    )?;
    conn.execute(
        "INSERT INTO artists (id, name, is_verified, created_at) VALUES (?1, 'Jazz Ensemble', 1, 200)",
        [ARTIST_2_ID],
    )?;

    // Insert albums
    conn.execute(
        "INSERT INTO albums (id, title, artist_id, created_at) VALUES (?1, 'First Album', ?2, 100)",
        [ALBUM_1_ID, ARTIST_1_ID],
    )?;
    conn.execute(
        "INSERT INTO albums (id, title, artist_id, created_at) VALUES (?1, 'Jazz Collection', ?2, 300)",
        [ALBUM_2_ID, ARTIST_2_ID],
    )?;

    // Insert tracks, oldest first
    insert_track(&conn, TRACK_1_ID, "Opening Track", ARTIST_1_ID, Some(ALBUM_1_ID), 100, None)?;
    insert_track(&conn, TRACK_2_ID, "Middle Track", ARTIST_1_ID, Some(ALBUM_1_ID), 110, None)?;
    insert_track(
        &conn,
        PIANO_TRACK_ID,
        "Piano Study No. 1",
        ARTIST_1_ID,
        None,
        120,
        Some(&PIANO_AXIS[..]),
    )?;
    insert_track(
        &conn,
        PIANO_TRACK_2_ID,
        "Piano Study No. 2",
        ARTIST_1_ID,
        None,
        130,
        Some(&[0.9, 0.1, 0.0][..]),
    )?;
    insert_track(
        &conn,
        JAZZ_TRACK_ID,
        "Smooth Jazz",
        ARTIST_2_ID,
        Some(ALBUM_2_ID),
        140,
        Some(&JAZZ_AXIS[..]),
    )?;
    insert_track(&conn, UNPROCESSED_TRACK_ID, "Fresh Upload", ARTIST_1_ID, None, 150, None)?;

    // Insert playlist
    conn.execute(
        "INSERT INTO playlists (id, title, owner_id, is_public, created_at) VALUES (?1, 'Road Trip', ?2, 1, 100)",
        [PLAYLIST_1_ID, LISTENER_2_ID],
    )?;
    for (position, track_id) in [TRACK_1_ID, TRACK_2_ID].iter().enumerate() {
        conn.execute(
            "INSERT INTO playlist_items (playlist_id, track_id, position) VALUES (?1, ?2, ?3)",
            params![PLAYLIST_1_ID, track_id, position as i64],
        )?;
    }

    // Listener activity
    conn.execute(
        "INSERT INTO listener_preferences (user_id, description, meta_embedding) VALUES (?1, 'quiet piano', ?2)",
        params![PIANO_FAN_ID, blob(&PIANO_AXIS)],
    )?;
    // Likes give the piano fan an audio taste as well
    conn.execute(
        "INSERT INTO track_likes (user_id, track_id, created_at) VALUES (?1, ?2, 100)",
        [PIANO_FAN_ID, PIANO_TRACK_ID],
    )?;
    // A stated preference alone only yields a meta taste
    conn.execute(
        "INSERT INTO listener_preferences (user_id, description, meta_embedding) VALUES (?1, 'mellow jazz', ?2)",
        params![PREFERENCE_ONLY_ID, blob(&JAZZ_AXIS)],
    )?;
    conn.execute(
        "INSERT INTO artist_follows (user_id, artist_id) VALUES (?1, ?2)",
        [JAZZ_FAN_ID, ARTIST_2_ID],
    )?;

    // Advertisements
    conn.execute(
        "INSERT INTO advertisements (id, title, audio_id, is_active) VALUES (?1, 'Coffee Spot', ?2, 1)",
        [AD_1_ID, AD_1_AUDIO_ID],
    )?;
    conn.execute(
        "INSERT INTO advertisements (id, title, audio_id, is_active) VALUES (?1, 'Old Campaign', 'ad-audio-off', 0)",
        [INACTIVE_AD_ID],
    )?;

    Ok((dir, catalog_db_path))
}
