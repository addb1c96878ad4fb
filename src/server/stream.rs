use super::error::{ok, ServiceError};
use super::session::Session;
use super::state::GuardedStreamAssembler;
use crate::streaming::MANIFEST_CONTENT_TYPE;

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

fn manifest_response(manifest: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, MANIFEST_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        manifest,
    )
        .into_response()
}

pub async fn stream_manifest(
    session: Session,
    State(assembler): State<GuardedStreamAssembler>,
    Path(track_id): Path<String>,
) -> Result<Response, ServiceError> {
    let manifest = assembler
        .stream_manifest(&track_id, &session.listener())
        .await?;
    Ok(manifest_response(manifest))
}

pub async fn ad_manifest(
    session: Session,
    State(assembler): State<GuardedStreamAssembler>,
    Path(ad_id): Path<String>,
) -> Result<Response, ServiceError> {
    let manifest = assembler.ad_manifest(&ad_id, &session.listener()).await?;
    Ok(manifest_response(manifest))
}

pub async fn stream_info(
    session: Session,
    State(assembler): State<GuardedStreamAssembler>,
    Path(track_id): Path<String>,
) -> Result<Response, ServiceError> {
    let info = assembler.stream_info(&track_id, &session.listener()).await?;
    Ok(ok(info))
}
