//! Search API routes

use super::error::{ok, ServiceError};
use super::feeds::PageQuery;
use super::state::GuardedSemanticSearch;
use crate::catalog_store::EntityKind;

use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(flatten)]
    pub paging: PageQuery,
}

fn parse_kind(kind: &str) -> Option<EntityKind> {
    match kind {
        "tracks" => Some(EntityKind::Track),
        "albums" => Some(EntityKind::Album),
        "artists" => Some(EntityKind::Artist),
        "playlists" => Some(EntityKind::Playlist),
        _ => None,
    }
}

pub async fn search(
    State(search): State<GuardedSemanticSearch>,
    Path(kind): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, ServiceError> {
    let kind = parse_kind(&kind)
        .ok_or_else(|| ServiceError::NotFound(format!("Unknown search kind: {}", kind)))?;
    let page = query.paging.page()?;
    let results = search.search(kind, &query.q, page).await?;
    Ok(ok(results))
}
