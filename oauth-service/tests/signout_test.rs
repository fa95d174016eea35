mod common;

use axum::http::StatusCode;
use common::*;

#[tokio::test]
async fn test_signout_clears_auth_cookie() {
    let app = spawn_app().await;
    let user = app.register_user(TENANT_HOST, None, ("facebook", "FB1234")).await;
    let auth = app.auth_cookie_for(&user);

    let response = app
        .get(TENANT_HOST, "/signout", &[(AUTH_COOKIE, &auth)])
        .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/");

    let header = set_cookies(&response)
        .into_iter()
        .find(|c| c.starts_with("auth="))
        .expect("auth cookie is cleared");
    assert!(header.contains("Max-Age=0"));
    assert!(header.contains("HttpOnly"));
    assert!(header.contains("Path=/"));
    assert_eq!(cookie_value(&response, AUTH_COOKIE).as_deref(), Some(""));
}

#[tokio::test]
async fn test_signout_without_session_still_clears() {
    let app = spawn_app().await;

    let response = app.get(TENANT_HOST, "/signout", &[]).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(set_cookies(&response).iter().any(|c| c.starts_with("auth=")));
}
