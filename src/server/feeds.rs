//! Personalized feed routes.

use super::error::{ok, ServiceError};
use super::session::Session;
use super::state::GuardedRanker;
use crate::catalog_store::{Page, DEFAULT_PAGE_LIMIT};
use crate::streaming::is_valid_id;

use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Raw `page`/`limit` query values, validated by [`PageQuery::page`] so bad
/// input gets the JSON error envelope.
#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    pub fn page(&self) -> Result<Page, ServiceError> {
        let page = parse_positive(self.page.as_deref(), 1, "page")?;
        let limit = parse_positive(self.limit.as_deref(), DEFAULT_PAGE_LIMIT, "limit")?;
        Page::new(page, limit).map_err(|err| ServiceError::BadRequest(err.to_string()))
    }
}

fn parse_positive(raw: Option<&str>, default: usize, name: &str) -> Result<usize, ServiceError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(raw) => match raw.parse::<usize>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ServiceError::BadRequest(format!(
                "{} must be a positive integer",
                name
            ))),
        },
    }
}

#[derive(Serialize)]
struct FeedPage<T: Serialize> {
    page: usize,
    limit: usize,
    items: Vec<T>,
}

fn feed_page<T: Serialize>(page: Page, items: Vec<T>) -> Response {
    ok(FeedPage {
        page: page.page(),
        limit: page.limit(),
        items,
    })
}

pub async fn get_feed(
    session: Option<Session>,
    State(ranker): State<GuardedRanker>,
    Path(feed): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ServiceError> {
    let page = query.page()?;
    let listener = session.as_ref().map(|s| s.listener_id.as_str());
    debug!("Feed {} for {:?}, {:?}", feed, listener, page);

    let response = match feed.as_str() {
        "for-you" => feed_page(page, ranker.for_you(listener, page).await?),
        "trending-now" => feed_page(page, ranker.trending_now(listener, page).await?),
        "similar-sounding" => feed_page(page, ranker.similar_sounding(listener, page).await?),
        "followed-artists" => feed_page(page, ranker.from_followed_artists(listener, page).await?),
        "new-albums" => feed_page(page, ranker.new_albums(listener, page).await?),
        "featured-artists" => feed_page(page, ranker.featured_artists(listener, page).await?),
        "popular-playlists" => feed_page(page, ranker.popular_playlists(listener, page).await?),
        _ => return Err(ServiceError::NotFound(format!("Unknown feed: {}", feed))),
    };
    Ok(response)
}

pub async fn get_similar_to_track(
    State(ranker): State<GuardedRanker>,
    Path(track_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ServiceError> {
    if !is_valid_id(&track_id) {
        return Err(ServiceError::BadRequest(format!("Invalid id: {}", track_id)));
    }
    let page = query.page()?;
    match ranker.similar_to_track(&track_id, page).await? {
        Some(items) => Ok(feed_page(page, items)),
        None => Err(ServiceError::NotFound("Track not found".to_string())),
    }
}
