use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::error::{AppError, AppResult};
use crate::utils::jwt::verify_token;
use crate::AppState;

/// Resolve the rider behind the bearer token and attach it to the request.
/// Anything short of a known rider is a 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let TypedHeader(auth) =
        auth.ok_or_else(|| AppError::Unauthorized("No authentication found".to_string()))?;

    let claims = verify_token(auth.token(), &state.config.jwt_secret)?;
    let rider = state
        .store
        .find_rider(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unknown rider".to_string()))?;

    request.extensions_mut().insert(rider);
    Ok(next.run(request).await)
}
