use crate::error::AppError;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use mime_guess::from_path;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    expires: Option<i64>,
    signature: Option<String>,
}

/// `GET /api/storage/{bucket}/{path}?expires=..&signature=..`
pub async fn process(
    state: web::Data<AppState>,
    target: web::Path<(String, String)>,
    query: web::Query<SignedQuery>,
) -> Result<HttpResponse, AppError> {
    let (bucket, path) = target.into_inner();
    state
        .objects
        .verify_signature(&bucket, &path, query.expires, query.signature.as_deref())?;
    let bytes = state.objects.fetch(&bucket, &path)?;
    let mime = from_path(&path).first_or_octet_stream();
    Ok(HttpResponse::Ok().content_type(mime.as_ref()).body(bytes))
}
