//! SQLite-backed catalog store.
//!
//! Reads go through a small round-robin pool of read-only connections, writes
//! through a single connection. Every connection carries the vector operators
//! from [`super::vector_functions`].

use super::models::*;
use super::queries::*;
use super::schema::CATALOG_VERSIONED_SCHEMAS;
use super::scoring::{EmbeddingColumn, PopularitySignal, ScoreExpr, SqlBinds};
use super::trait_def::CatalogStore;
use super::vector_functions::{decode_embedding, encode_embedding, register_vector_functions};
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// SQLite VM instructions between two cancellation checks.
const PROGRESS_CHECK_OPS: i32 = 1_000;

pub const DEFAULT_READ_POOL_SIZE: usize = 4;

#[derive(Clone)]
pub struct SqliteCatalogStore {
    read_pool: Vec<Arc<Mutex<Connection>>>,
    write_conn: Arc<Mutex<Connection>>,
    read_index: Arc<AtomicUsize>,
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| anyhow!("catalog connection mutex poisoned"))
}

fn embedding_at(row: &Row, idx: usize) -> rusqlite::Result<Option<Embedding>> {
    Ok(row
        .get::<_, Option<Vec<u8>>>(idx)?
        .and_then(|blob| decode_embedding(&blob)))
}

fn json_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Escapes LIKE wildcards so user text matches literally.
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Runs `query` with a progress handler that interrupts SQLite as soon as
/// `cancel` is raised.
fn with_cancellation<T>(
    conn: &Connection,
    cancel: &QueryCancellation,
    query: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    if cancel.is_cancelled() {
        return Err(QueryCancelled.into());
    }
    let flag = cancel.flag();
    conn.progress_handler(
        PROGRESS_CHECK_OPS,
        Some(move || flag.load(Ordering::Relaxed)),
    );
    let result = query(conn);
    conn.progress_handler(PROGRESS_CHECK_OPS, None::<fn() -> bool>);
    match result {
        Err(_) if cancel.is_cancelled() => Err(QueryCancelled.into()),
        other => other,
    }
}

/// Rejects score terms referring to columns the candidate set lacks.
fn ensure_supported(
    entity: &str,
    score: &ScoreExpr,
    has_audio: bool,
    signals: &[PopularitySignal],
) -> Result<()> {
    if !has_audio && score.uses_column(EmbeddingColumn::Audio) {
        bail!("{} candidates have no audio embedding", entity);
    }
    for signal in [
        PopularitySignal::RecentPlays,
        PopularitySignal::Followers,
        PopularitySignal::MemberLikes,
        PopularitySignal::MemberPlays,
    ] {
        if score.uses_signal(signal) && !signals.contains(&signal) {
            bail!("{} candidates do not expose {}", entity, signal.column());
        }
    }
    Ok(())
}

fn page_clause(page: Page, binds: &mut SqlBinds) -> String {
    let limit = binds.push(page.limit() as i64);
    let offset = binds.push(page.offset());
    format!("LIMIT {} OFFSET {}", limit, offset)
}

impl SqliteCatalogStore {
    pub fn new<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let db_path = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open catalog database {:?}", db_path))?;

        migrate_if_needed(&mut write_conn, CATALOG_VERSIONED_SCHEMAS)?;
        write_conn.pragma_update(None, "journal_mode", "WAL")?;
        write_conn.pragma_update(None, "foreign_keys", "ON")?;
        register_vector_functions(&write_conn)?;

        let mut read_pool = Vec::with_capacity(read_pool_size.max(1));
        for _ in 0..read_pool_size.max(1) {
            let read_conn = Connection::open_with_flags(
                db_path,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            register_vector_functions(&read_conn)?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        let store = SqliteCatalogStore {
            read_pool,
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_index: Arc::new(AtomicUsize::new(0)),
        };
        let counts = store.get_counts()?;
        info!(
            "Opened catalog: {} artists, {} albums, {} tracks, {} playlists",
            counts.artists, counts.albums, counts.tracks, counts.playlists
        );
        Ok(store)
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.get_read_conn();
        let conn = lock(&conn)?;
        f(&conn)
    }

    fn count(conn: &Connection, table: &str) -> Result<usize> {
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
        Ok(count as usize)
    }

    fn embeddings_query(
        &self,
        sql: &str,
        listener_id: &str,
        limit: usize,
    ) -> Result<Vec<TrackEmbeddings>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(params![listener_id, limit as i64], |row| {
                    Ok(TrackEmbeddings {
                        meta: embedding_at(row, 0)?,
                        audio: embedding_at(row, 1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn meta_embedding_target(target: ReembedTarget) -> Result<(&'static str, &'static str)> {
        match target {
            ReembedTarget::Track => Ok(("tracks", "id")),
            ReembedTarget::Album => Ok(("albums", "id")),
            ReembedTarget::Artist => Ok(("artists", "id")),
            ReembedTarget::UserPlaylist => Ok(("playlists", "id")),
            ReembedTarget::UserPref => Ok(("listener_preferences", "user_id")),
            ReembedTarget::TrackAudio => {
                bail!("audio embeddings are not derived from text")
            }
        }
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn get_track(&self, id: &str) -> Result<Option<Track>> {
        self.read(|conn| {
            let track = conn
                .query_row(
                    "SELECT id, title, artist_id, album_id, genre_id, duration_secs, tags,
                            popularity, created_at
                     FROM tracks WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok(Track {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            artist_id: row.get(2)?,
                            album_id: row.get(3)?,
                            genre_id: row.get(4)?,
                            duration_secs: row.get(5)?,
                            tags: json_list(&row.get::<_, String>(6)?),
                            popularity: row.get(7)?,
                            created_at: row.get(8)?,
                        })
                    },
                )
                .optional()?;
            Ok(track)
        })
    }

    fn get_track_embeddings(&self, id: &str) -> Result<Option<TrackEmbeddings>> {
        self.read(|conn| {
            Ok(conn
                .query_row(
                    "SELECT meta_embedding, audio_embedding FROM tracks WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok(TrackEmbeddings {
                            meta: embedding_at(row, 0)?,
                            audio: embedding_at(row, 1)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    fn get_advertisement(&self, id: &str) -> Result<Option<Advertisement>> {
        self.read(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, title, audio_id, is_active FROM advertisements WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok(Advertisement {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            audio_id: row.get(2)?,
                            is_active: row.get(3)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    fn list_active_advertisement_ids(&self) -> Result<Vec<String>> {
        self.read(|conn| {
            let mut stmt =
                conn.prepare("SELECT id FROM advertisements WHERE is_active = 1 ORDER BY id")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(ids)
        })
    }

    fn get_counts(&self) -> Result<CatalogCounts> {
        self.read(|conn| {
            Ok(CatalogCounts {
                artists: Self::count(conn, "artists")?,
                albums: Self::count(conn, "albums")?,
                tracks: Self::count(conn, "tracks")?,
                playlists: Self::count(conn, "playlists")?,
            })
        })
    }

    fn record_play(
        &self,
        listener_id: &str,
        track_id: &str,
        played_at: i64,
        dedupe_since: Option<i64>,
    ) -> Result<bool> {
        let conn = lock(&self.write_conn)?;
        let inserted = match dedupe_since {
            None => conn.execute(
                "INSERT INTO play_history (user_id, track_id, played_at) VALUES (?1, ?2, ?3)",
                params![listener_id, track_id, played_at],
            )?,
            Some(since) => conn.execute(
                "INSERT INTO play_history (user_id, track_id, played_at)
                 SELECT ?1, ?2, ?3
                 WHERE NOT EXISTS (
                     SELECT 1 FROM play_history
                     WHERE user_id = ?1 AND track_id = ?2 AND played_at >= ?4
                 )",
                params![listener_id, track_id, played_at, since],
            )?,
        };
        Ok(inserted > 0)
    }

    fn record_ad_impression(&self, ad_id: &str, listener_id: &str, shown_at: i64) -> Result<()> {
        let conn = lock(&self.write_conn)?;
        conn.execute(
            "INSERT INTO ad_impressions (ad_id, user_id, shown_at) VALUES (?1, ?2, ?3)",
            params![ad_id, listener_id, shown_at],
        )?;
        Ok(())
    }

    fn rank_tracks(
        &self,
        query: &TrackRankQuery,
        cancel: &QueryCancellation,
    ) -> Result<Vec<RankedTrack>> {
        let window = match query.order {
            TrackOrder::PlayCountSince(since) => Some(since),
            _ => None,
        };
        if window.is_none() && query.score.uses_signal(PopularitySignal::RecentPlays) {
            bail!("recent-play popularity needs a play-count window");
        }
        ensure_supported("track", &query.score, true, &[PopularitySignal::RecentPlays])?;

        let mut binds = SqlBinds::new();
        let mut conditions = vec!["1 = 1".to_string()];
        let filter = &query.filter;

        if let Some((listener_id, n)) = &filter.exclude_recent_plays {
            let user = binds.push(listener_id.clone());
            let n = binds.push(*n as i64);
            conditions.push(format!(
                "t.id NOT IN (SELECT track_id FROM play_history WHERE user_id = {}
                              ORDER BY played_at DESC, id DESC LIMIT {})",
                user, n
            ));
        }
        if let Some((listener_id, since)) = &filter.exclude_played_since {
            let user = binds.push(listener_id.clone());
            let since = binds.push(*since);
            conditions.push(format!(
                "NOT EXISTS (SELECT 1 FROM play_history ph WHERE ph.user_id = {}
                             AND ph.track_id = t.id AND ph.played_at >= {})",
                user, since
            ));
        }
        if let Some(listener_id) = &filter.followed_by {
            let user = binds.push(listener_id.clone());
            conditions.push(format!(
                "t.artist_id IN (SELECT artist_id FROM artist_follows WHERE user_id = {})",
                user
            ));
        }
        if !filter.exclude_ids.is_empty() {
            let ids = filter
                .exclude_ids
                .iter()
                .map(|id| binds.push(id.clone()))
                .collect::<Vec<_>>()
                .join(", ");
            conditions.push(format!("t.id NOT IN ({})", ids));
        }
        if let Some((vector, max_distance)) = &filter.audio_within {
            let v = binds.push_vector(vector);
            let d = binds.push(*max_distance);
            conditions.push(format!("cosine_distance(t.audio_embedding, {}) < {}", v, d));
        }

        let (play_count_join, play_count_expr) = match window {
            Some(since) => {
                let since = binds.push(since);
                (
                    format!(
                        "LEFT JOIN (SELECT track_id, COUNT(*) AS play_count FROM play_history
                                    WHERE played_at >= {} GROUP BY track_id) pc
                         ON pc.track_id = t.id",
                        since
                    ),
                    "COALESCE(pc.play_count, 0)",
                )
            }
            None => (String::new(), "NULL"),
        };

        let score = query.score.render(&mut binds);
        let order = match query.order {
            TrackOrder::Score => "score DESC, c.created_at DESC, c.id ASC",
            TrackOrder::Newest => "c.created_at DESC, c.id ASC",
            TrackOrder::PlayCountSince(_) => {
                "c.recent_play_count DESC, score DESC, c.created_at DESC, c.id ASC"
            }
        };
        let page = page_clause(query.page, &mut binds);

        let sql = format!(
            "SELECT c.id, c.title, c.artist_id, c.album_id, c.genre_id, c.duration_secs, c.tags,
                    c.popularity, c.created_at, c.artist_name, c.artist_is_verified,
                    c.recent_play_count, {score} AS score
             FROM (
                 SELECT t.id, t.title, t.artist_id, t.album_id, t.genre_id, t.duration_secs,
                        t.tags, t.popularity, t.created_at, t.meta_embedding, t.audio_embedding,
                        a.name AS artist_name, a.is_verified AS artist_is_verified,
                        {play_count_expr} AS recent_play_count
                 FROM tracks t
                 JOIN artists a ON a.id = t.artist_id
                 {play_count_join}
                 WHERE {conditions}
             ) c
             ORDER BY {order}
             {page}",
            conditions = conditions.join(" AND "),
        );

        let conn = self.get_read_conn();
        let conn = lock(&conn)?;
        with_cancellation(&conn, cancel, |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(binds.into_values()), |row| {
                    Ok(RankedTrack {
                        track: Track {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            artist_id: row.get(2)?,
                            album_id: row.get(3)?,
                            genre_id: row.get(4)?,
                            duration_secs: row.get(5)?,
                            tags: json_list(&row.get::<_, String>(6)?),
                            popularity: row.get(7)?,
                            created_at: row.get(8)?,
                        },
                        artist: ArtistSummary {
                            id: row.get(2)?,
                            name: row.get(9)?,
                            is_verified: row.get(10)?,
                        },
                        play_count: row.get(11)?,
                        score: row.get(12)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn rank_albums(
        &self,
        query: &EntityRankQuery,
        cancel: &QueryCancellation,
    ) -> Result<Vec<RankedAlbum>> {
        ensure_supported("album", &query.score, false, &[])?;
        let mut binds = SqlBinds::new();
        let score = query.score.render(&mut binds);
        let page = page_clause(query.page, &mut binds);
        let sql = format!(
            "SELECT c.id, c.title, c.artist_id, c.artist_name, c.artist_is_verified,
                    c.created_at, {score} AS score
             FROM (
                 SELECT al.id, al.title, al.artist_id, al.created_at, al.meta_embedding,
                        a.name AS artist_name, a.is_verified AS artist_is_verified
                 FROM albums al
                 JOIN artists a ON a.id = al.artist_id
             ) c
             ORDER BY score DESC, c.created_at DESC, c.id ASC
             {page}"
        );

        let conn = self.get_read_conn();
        let conn = lock(&conn)?;
        with_cancellation(&conn, cancel, |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(binds.into_values()), |row| {
                    Ok(RankedAlbum {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        artist: ArtistSummary {
                            id: row.get(2)?,
                            name: row.get(3)?,
                            is_verified: row.get(4)?,
                        },
                        created_at: row.get(5)?,
                        score: row.get(6)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn rank_artists(
        &self,
        query: &EntityRankQuery,
        cancel: &QueryCancellation,
    ) -> Result<Vec<RankedArtist>> {
        ensure_supported("artist", &query.score, false, &[PopularitySignal::Followers])?;
        let mut binds = SqlBinds::new();
        let score = query.score.render(&mut binds);
        let page = page_clause(query.page, &mut binds);
        let sql = format!(
            "SELECT c.id, c.name, c.bio, c.is_verified, c.genres, c.follower_count,
                    c.created_at, {score} AS score
             FROM (
                 SELECT ar.id, ar.name, ar.bio, ar.is_verified, ar.genres, ar.created_at,
                        ar.meta_embedding,
                        (SELECT COUNT(*) FROM artist_follows f WHERE f.artist_id = ar.id)
                            AS follower_count
                 FROM artists ar
             ) c
             ORDER BY score DESC, c.follower_count DESC, c.created_at DESC, c.id ASC
             {page}"
        );

        let conn = self.get_read_conn();
        let conn = lock(&conn)?;
        with_cancellation(&conn, cancel, |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(binds.into_values()), |row| {
                    Ok(RankedArtist {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        bio: row.get(2)?,
                        is_verified: row.get(3)?,
                        genres: json_list(&row.get::<_, String>(4)?),
                        follower_count: row.get(5)?,
                        created_at: row.get(6)?,
                        score: row.get(7)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn rank_playlists(
        &self,
        query: &EntityRankQuery,
        cancel: &QueryCancellation,
    ) -> Result<Vec<RankedPlaylist>> {
        ensure_supported(
            "playlist",
            &query.score,
            false,
            &[PopularitySignal::MemberLikes, PopularitySignal::MemberPlays],
        )?;
        let mut binds = SqlBinds::new();
        let score = query.score.render(&mut binds);
        let page = page_clause(query.page, &mut binds);
        let sql = format!(
            "SELECT c.id, c.title, c.owner_id, c.track_count, c.created_at, {score} AS score
             FROM (
                 SELECT p.id, p.title, p.owner_id, p.created_at, p.meta_embedding,
                        (SELECT COUNT(*) FROM playlist_items pi WHERE pi.playlist_id = p.id)
                            AS track_count,
                        (SELECT COUNT(*) FROM playlist_items pi
                         JOIN track_likes l ON l.track_id = pi.track_id
                         WHERE pi.playlist_id = p.id) AS member_like_count,
                        (SELECT COUNT(*) FROM playlist_items pi
                         JOIN play_history ph ON ph.track_id = pi.track_id
                         WHERE pi.playlist_id = p.id) AS member_play_count
                 FROM playlists p
                 WHERE p.is_public = 1
             ) c
             ORDER BY score DESC, c.created_at DESC, c.id ASC
             {page}"
        );

        let conn = self.get_read_conn();
        let conn = lock(&conn)?;
        with_cancellation(&conn, cancel, |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(binds.into_values()), |row| {
                    Ok(RankedPlaylist {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        owner_id: row.get(2)?,
                        track_count: row.get(3)?,
                        created_at: row.get(4)?,
                        score: row.get(5)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn nearest_by_meta(
        &self,
        kind: EntityKind,
        vector: &[f32],
        max_distance: f64,
        page: Page,
        cancel: &QueryCancellation,
    ) -> Result<Vec<SearchHit>> {
        let visibility = match kind {
            EntityKind::Playlist => "AND is_public = 1",
            _ => "",
        };
        let sql = format!(
            "SELECT id, name, created_at, distance FROM (
                 SELECT id, {name} AS name, created_at,
                        cosine_distance(meta_embedding, ?1) AS distance
                 FROM {table}
                 WHERE meta_embedding IS NOT NULL {visibility}
             )
             WHERE distance <= ?2
             ORDER BY distance ASC, created_at DESC, id ASC
             LIMIT ?3 OFFSET ?4",
            name = kind.name_column(),
            table = kind.table(),
        );
        let blob = encode_embedding(vector);

        let conn = self.get_read_conn();
        let conn = lock(&conn)?;
        with_cancellation(&conn, cancel, |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![blob, max_distance, page.limit() as i64, page.offset()],
                    |row| {
                        let distance: f64 = row.get(3)?;
                        Ok(SearchHit {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            created_at: row.get(2)?,
                            similarity: Some(1.0 - distance),
                        })
                    },
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn search_by_text(
        &self,
        kind: EntityKind,
        text: &str,
        page: Page,
        cancel: &QueryCancellation,
    ) -> Result<Vec<SearchHit>> {
        let visibility = match kind {
            EntityKind::Playlist => "AND is_public = 1",
            _ => "",
        };
        let sql = format!(
            "SELECT id, {name}, created_at FROM {table}
             WHERE {name} LIKE ?1 ESCAPE '\\' {visibility}
             ORDER BY created_at DESC, id ASC
             LIMIT ?2 OFFSET ?3",
            name = kind.name_column(),
            table = kind.table(),
        );

        let conn = self.get_read_conn();
        let conn = lock(&conn)?;
        with_cancellation(&conn, cancel, |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![like_pattern(text), page.limit() as i64, page.offset()],
                    |row| {
                        Ok(SearchHit {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            created_at: row.get(2)?,
                            similarity: None,
                        })
                    },
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn recent_play_embeddings(
        &self,
        listener_id: &str,
        limit: usize,
    ) -> Result<Vec<TrackEmbeddings>> {
        self.embeddings_query(
            "SELECT t.meta_embedding, t.audio_embedding
             FROM tracks t
             JOIN (SELECT track_id, MAX(played_at) AS last_played, MAX(id) AS last_id
                   FROM play_history WHERE user_id = ?1 GROUP BY track_id) ph
               ON ph.track_id = t.id
             ORDER BY ph.last_played DESC, ph.last_id DESC
             LIMIT ?2",
            listener_id,
            limit,
        )
    }

    fn recent_like_embeddings(
        &self,
        listener_id: &str,
        limit: usize,
    ) -> Result<Vec<TrackEmbeddings>> {
        self.embeddings_query(
            "SELECT t.meta_embedding, t.audio_embedding
             FROM track_likes l
             JOIN tracks t ON t.id = l.track_id
             WHERE l.user_id = ?1
             ORDER BY l.created_at DESC, l.rowid DESC
             LIMIT ?2",
            listener_id,
            limit,
        )
    }

    fn preference_embedding(&self, listener_id: &str) -> Result<Option<Embedding>> {
        self.read(|conn| {
            let embedding = conn
                .query_row(
                    "SELECT meta_embedding FROM listener_preferences WHERE user_id = ?1",
                    params![listener_id],
                    |row| embedding_at(row, 0),
                )
                .optional()?;
            Ok(embedding.flatten())
        })
    }

    fn embedding_source_text(&self, target: ReembedTarget, id: &str) -> Result<Option<String>> {
        self.read(|conn| {
            let text = match target {
                ReembedTarget::Track => conn
                    .query_row(
                        "SELECT t.title, a.name, t.genre_id, t.tags
                         FROM tracks t JOIN artists a ON a.id = t.artist_id
                         WHERE t.id = ?1",
                        params![id],
                        |row| {
                            let title: String = row.get(0)?;
                            let artist: String = row.get(1)?;
                            let genre: Option<String> = row.get(2)?;
                            let tags = json_list(&row.get::<_, String>(3)?);
                            let mut text = format!("{} by {}", title, artist);
                            if let Some(genre) = genre {
                                text.push_str(&format!(". Genre: {}", genre));
                            }
                            if !tags.is_empty() {
                                text.push_str(&format!(". Tags: {}", tags.join(", ")));
                            }
                            Ok(text)
                        },
                    )
                    .optional()?,
                ReembedTarget::Album => conn
                    .query_row(
                        "SELECT al.title, a.name FROM albums al
                         JOIN artists a ON a.id = al.artist_id WHERE al.id = ?1",
                        params![id],
                        |row| {
                            Ok(format!(
                                "{} by {}",
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?
                            ))
                        },
                    )
                    .optional()?,
                ReembedTarget::Artist => conn
                    .query_row(
                        "SELECT name, bio, genres FROM artists WHERE id = ?1",
                        params![id],
                        |row| {
                            let mut text: String = row.get(0)?;
                            if let Some(bio) = row.get::<_, Option<String>>(1)? {
                                text.push_str(&format!(". {}", bio));
                            }
                            let genres = json_list(&row.get::<_, String>(2)?);
                            if !genres.is_empty() {
                                text.push_str(&format!(". Genres: {}", genres.join(", ")));
                            }
                            Ok(text)
                        },
                    )
                    .optional()?,
                ReembedTarget::UserPref => conn
                    .query_row(
                        "SELECT description FROM listener_preferences WHERE user_id = ?1",
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()?,
                ReembedTarget::UserPlaylist => {
                    let title: Option<String> = conn
                        .query_row(
                            "SELECT title FROM playlists WHERE id = ?1",
                            params![id],
                            |row| row.get(0),
                        )
                        .optional()?;
                    match title {
                        None => None,
                        Some(title) => {
                            let mut stmt = conn.prepare(
                                "SELECT t.title FROM playlist_items pi
                                 JOIN tracks t ON t.id = pi.track_id
                                 WHERE pi.playlist_id = ?1
                                 ORDER BY pi.position LIMIT 20",
                            )?;
                            let titles = stmt
                                .query_map(params![id], |row| row.get::<_, String>(0))?
                                .collect::<rusqlite::Result<Vec<_>>>()?;
                            if titles.is_empty() {
                                Some(title)
                            } else {
                                Some(format!("{}. Tracks: {}", title, titles.join(", ")))
                            }
                        }
                    }
                }
                ReembedTarget::TrackAudio => None,
            };
            Ok(text)
        })
    }

    fn set_meta_embedding(
        &self,
        target: ReembedTarget,
        id: &str,
        embedding: &[f32],
    ) -> Result<bool> {
        let (table, key) = Self::meta_embedding_target(target)?;
        let conn = lock(&self.write_conn)?;
        let updated = conn.execute(
            &format!("UPDATE {} SET meta_embedding = ?1 WHERE {} = ?2", table, key),
            params![encode_embedding(embedding), id],
        )?;
        Ok(updated > 0)
    }
}
