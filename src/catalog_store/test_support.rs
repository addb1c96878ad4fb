//! Temporary catalog databases for unit tests.

use super::store::SqliteCatalogStore;
use super::vector_functions::encode_embedding;
use rusqlite::{params, Connection};
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestCatalog {
    pub store: Arc<SqliteCatalogStore>,
    conn: Connection,
    _dir: TempDir,
}

fn blob(vector: Option<&[f32]>) -> Option<Vec<u8>> {
    vector.map(encode_embedding)
}

impl TestCatalog {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.db");
        let store = Arc::new(SqliteCatalogStore::new(&path, 2).unwrap());
        let conn = Connection::open(&path).unwrap();
        Self {
            store,
            conn,
            _dir: dir,
        }
    }

    pub fn artist(&self, id: &str) {
        self.artist_with(id, 100, None);
    }

    pub fn artist_with(&self, id: &str, created_at: i64, meta: Option<&[f32]>) {
        self.conn
            .execute(
                "INSERT INTO artists (id, name, meta_embedding, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, format!("Artist {}", id), blob(meta), created_at],
            )
            .unwrap();
    }

    pub fn album(&self, id: &str, artist_id: &str, created_at: i64, meta: Option<&[f32]>) {
        self.conn
            .execute(
                "INSERT INTO albums (id, title, artist_id, meta_embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, format!("Album {}", id), artist_id, blob(meta), created_at],
            )
            .unwrap();
    }

    pub fn track(
        &self,
        id: &str,
        artist_id: &str,
        created_at: i64,
        meta: Option<&[f32]>,
        audio: Option<&[f32]>,
    ) {
        self.conn
            .execute(
                "INSERT INTO tracks (id, title, artist_id, meta_embedding, audio_embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    format!("Track {}", id),
                    artist_id,
                    blob(meta),
                    blob(audio),
                    created_at
                ],
            )
            .unwrap();
    }

    pub fn track_titled(&self, id: &str, artist_id: &str, title: &str) {
        self.conn
            .execute(
                "INSERT INTO tracks (id, title, artist_id, created_at) VALUES (?1, ?2, ?3, 100)",
                params![id, title, artist_id],
            )
            .unwrap();
    }

    pub fn playlist(&self, id: &str, owner_id: &str, is_public: bool, meta: Option<&[f32]>) {
        self.conn
            .execute(
                "INSERT INTO playlists (id, title, owner_id, is_public, meta_embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 100)",
                params![id, format!("Playlist {}", id), owner_id, is_public, blob(meta)],
            )
            .unwrap();
    }

    pub fn playlist_item(&self, playlist_id: &str, track_id: &str, position: i64) {
        self.conn
            .execute(
                "INSERT INTO playlist_items (playlist_id, track_id, position) VALUES (?1, ?2, ?3)",
                params![playlist_id, track_id, position],
            )
            .unwrap();
    }

    pub fn play(&self, user_id: &str, track_id: &str, played_at: i64) {
        self.conn
            .execute(
                "INSERT INTO play_history (user_id, track_id, played_at) VALUES (?1, ?2, ?3)",
                params![user_id, track_id, played_at],
            )
            .unwrap();
    }

    pub fn like(&self, user_id: &str, track_id: &str, created_at: i64) {
        self.conn
            .execute(
                "INSERT INTO track_likes (user_id, track_id, created_at) VALUES (?1, ?2, ?3)",
                params![user_id, track_id, created_at],
            )
            .unwrap();
    }

    pub fn follow(&self, user_id: &str, artist_id: &str) {
        self.conn
            .execute(
                "INSERT INTO artist_follows (user_id, artist_id) VALUES (?1, ?2)",
                params![user_id, artist_id],
            )
            .unwrap();
    }

    pub fn preference(&self, user_id: &str, description: &str, meta: Option<&[f32]>) {
        self.conn
            .execute(
                "INSERT INTO listener_preferences (user_id, description, meta_embedding)
                 VALUES (?1, ?2, ?3)",
                params![user_id, description, blob(meta)],
            )
            .unwrap();
    }

    pub fn advertisement(&self, id: &str, audio_id: &str, is_active: bool) {
        self.conn
            .execute(
                "INSERT INTO advertisements (id, title, audio_id, is_active) VALUES (?1, ?2, ?3, ?4)",
                params![id, format!("Ad {}", id), audio_id, is_active],
            )
            .unwrap();
    }

    pub fn play_count(&self, user_id: &str, track_id: &str) -> i64 {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM play_history WHERE user_id = ?1 AND track_id = ?2",
                params![user_id, track_id],
                |r| r.get(0),
            )
            .unwrap()
    }

    pub fn impression_count(&self, ad_id: &str) -> i64 {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM ad_impressions WHERE ad_id = ?1",
                params![ad_id],
                |r| r.get(0),
            )
            .unwrap()
    }
}
