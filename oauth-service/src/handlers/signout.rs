use axum::{
    extract::State,
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::CookieJar;

use crate::AppState;

/// Clear the auth cookie
#[utoipa::path(
    get,
    path = "/signout",
    responses(
        (status = 307, description = "Auth cookie cleared, redirect to the site root")
    ),
    tag = "OAuth"
)]
pub async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    (jar.add(state.cookies.clear()), Redirect::temporary("/"))
}
