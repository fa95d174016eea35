mod common;

use axum::http::StatusCode;
use common::*;
use oauth_service::models::{Role, UserProvider};

#[tokio::test]
async fn test_new_user_is_registered_and_signed_in() {
    let app = spawn_app().await;

    let response = app
        .get(
            TENANT_HOST,
            "/oauth/facebook/token?code=P1&identifier=S1&redirect=/x",
            &[(SESSION_COOKIE, "S1")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/x");

    let users = app.users(TENANT_HOST).await;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].providers, vec![UserProvider::new("facebook", "P1")]);
    assert_eq!(users[0].email.as_deref(), Some("e@x.com"));
    assert_eq!(users[0].role, Role::Visitor);

    let auth = cookie_value(&response, AUTH_COOKIE).expect("auth cookie is issued");
    let claims = app.state.cookies.authenticate(&auth).unwrap();
    assert_eq!(claims.user_id, users[0].user_id);

    let header = set_cookies(&response)
        .into_iter()
        .find(|c| c.starts_with("auth="))
        .unwrap();
    assert!(header.contains("HttpOnly"));
    assert!(header.contains("Path=/"));
}

#[tokio::test]
async fn test_identifier_mismatch_never_issues_cookie() {
    let app = spawn_app().await;

    for identifier in ["888", ""] {
        let response = app
            .get(
                TENANT_HOST,
                &format!(
                    "/oauth/facebook/token?code=123&identifier={}&redirect=/posts/1",
                    identifier
                ),
                &[(SESSION_COOKIE, "999")],
            )
            .await;

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/");
        assert_eq!(cookie_value(&response, AUTH_COOKIE), None);
    }

    assert_eq!(app.fetcher.calls(), 0);
    assert!(app.users(TENANT_HOST).await.is_empty());
}

#[tokio::test]
async fn test_missing_session_is_a_mismatch() {
    let app = spawn_app().await;

    let response = app
        .get(
            TENANT_HOST,
            "/oauth/facebook/token?code=123&identifier=888&redirect=/",
            &[],
        )
        .await;

    assert_eq!(location(&response), "/");
    assert_eq!(cookie_value(&response, AUTH_COOKIE), None);
}

#[tokio::test]
async fn test_failed_profile_fetch_returns_without_cookie() {
    let app = spawn_app().await;

    let response = app
        .get(
            TENANT_HOST,
            "/oauth/facebook/token?code=999&identifier=S1&redirect=/posts/1",
            &[(SESSION_COOKIE, "S1")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/posts/1");
    assert_eq!(cookie_value(&response, AUTH_COOKIE), None);
    assert_eq!(app.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_linked_user_signs_in_unchanged() {
    let app = spawn_app().await;
    let jon = app
        .register_user(TENANT_HOST, Some("jon.snow@got.com"), ("facebook", "FB1234"))
        .await;

    let response = app
        .get(
            TENANT_HOST,
            "/oauth/facebook/token?code=123&identifier=S1&redirect=/",
            &[(SESSION_COOKIE, "S1")],
        )
        .await;

    assert_eq!(location(&response), "/");
    let auth = cookie_value(&response, AUTH_COOKIE).unwrap();
    assert_eq!(app.state.cookies.authenticate(&auth).unwrap().user_id, jon.user_id);
    assert_eq!(app.users(TENANT_HOST).await, vec![jon]);
}

#[tokio::test]
async fn test_matching_email_links_provider() {
    let app = spawn_app().await;
    let jon = app
        .register_user(TENANT_HOST, Some("jon.snow@got.com"), ("google", "GO1"))
        .await;

    let response = app
        .get(
            TENANT_HOST,
            "/oauth/facebook/token?code=123&identifier=S1&redirect=/",
            &[(SESSION_COOKIE, "S1")],
        )
        .await;

    assert!(cookie_value(&response, AUTH_COOKIE).is_some());
    let users = app.users(TENANT_HOST).await;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].user_id, jon.user_id);
    assert_eq!(
        users[0].providers,
        vec![
            UserProvider::new("google", "GO1"),
            UserProvider::new("facebook", "FB1234"),
        ]
    );
}

#[tokio::test]
async fn test_new_user_without_email_is_valid() {
    let app = spawn_app().await;

    let response = app
        .get(
            TENANT_HOST,
            "/oauth/facebook/token?code=456&identifier=S1&redirect=/",
            &[(SESSION_COOKIE, "S1")],
        )
        .await;

    assert!(cookie_value(&response, AUTH_COOKIE).is_some());
    let users = app.users(TENANT_HOST).await;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "Arya Stark");
    assert_eq!(users[0].email, None);
}

#[tokio::test]
async fn test_private_tenant_rejects_untrusted_signups() {
    let app = spawn_app().await;

    for provider in ["facebook", UNTRUSTED_PROVIDER] {
        let response = app
            .get(
                PRIVATE_HOST,
                &format!("/oauth/{}/token?code=123&identifier=S1&redirect=/", provider),
                &[(SESSION_COOKIE, "S1")],
            )
            .await;

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/not-invited");
        assert_eq!(cookie_value(&response, AUTH_COOKIE), None);
    }

    assert!(app.users(PRIVATE_HOST).await.is_empty());
}

#[tokio::test]
async fn test_private_tenant_accepts_trusted_provider() {
    let app = spawn_app().await;

    let response = app
        .get(
            PRIVATE_HOST,
            &format!("/oauth/{}/token?code=AD1&identifier=S1&redirect=/", TRUSTED_PROVIDER),
            &[(SESSION_COOKIE, "S1")],
        )
        .await;

    assert_eq!(location(&response), "/");
    assert!(cookie_value(&response, AUTH_COOKIE).is_some());

    let users = app.users(PRIVATE_HOST).await;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].role, Role::Collaborator);
    assert_eq!(users[0].providers, vec![UserProvider::new(TRUSTED_PROVIDER, "AD1")]);
}

#[tokio::test]
async fn test_private_tenant_members_still_sign_in() {
    let app = spawn_app().await;
    app.register_user(PRIVATE_HOST, None, ("facebook", "FB1234")).await;

    let response = app
        .get(
            PRIVATE_HOST,
            "/oauth/facebook/token?code=123&identifier=S1&redirect=/",
            &[(SESSION_COOKIE, "S1")],
        )
        .await;

    assert_eq!(location(&response), "/");
    assert!(cookie_value(&response, AUTH_COOKIE).is_some());
}

#[tokio::test]
async fn test_foreign_redirect_is_forbidden() {
    let app = spawn_app().await;

    for redirect in ["//evil.com", "http://evil.com/", "http://avengers.test.fider.io.evil.com"] {
        let response = app
            .get(
                TENANT_HOST,
                &format!("/oauth/facebook/token?code=123&identifier=S1&redirect={}", redirect),
                &[(SESSION_COOKIE, "S1")],
            )
            .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", redirect);
        assert_eq!(cookie_value(&response, AUTH_COOKIE), None);
    }

    assert_eq!(app.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_draft_code_is_appended_after_sign_in() {
    let app = spawn_app().await;

    let response = app
        .get(
            TENANT_HOST,
            "/oauth/facebook/token?code=123&identifier=S1&redirect=/x&draft=ABC",
            &[(SESSION_COOKIE, "S1")],
        )
        .await;

    assert_eq!(location(&response), "/x?draft=ABC");
}

#[tokio::test]
async fn test_echo_redirect_skips_resolution() {
    let app = spawn_app().await;

    let response = app
        .get(
            TENANT_HOST,
            "/oauth/facebook/token?code=123&identifier=S1&redirect=/oauth/facebook/echo",
            &[(SESSION_COOKIE, "S1")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "/oauth/facebook/echo?code=123&identifier=S1"
    );
    assert_eq!(app.fetcher.calls(), 0);
    assert!(app.users(TENANT_HOST).await.is_empty());
}

#[tokio::test]
async fn test_full_flow_across_hosts() {
    let app = spawn_app().await;

    let initiate = app
        .get(
            TENANT_HOST,
            "/oauth/facebook?redirect=/posts/1",
            &[(SESSION_COOKIE, "S1")],
        )
        .await;
    let state = query_param(&location(&initiate), "state").unwrap();

    let callback = app
        .get(
            LOGIN_HOST,
            &format!("/oauth/facebook/callback?state={}&code=123", state),
            &[],
        )
        .await;
    let finalize = location(&callback);
    let finalize_path = finalize
        .strip_prefix("http://avengers.test.fider.io")
        .expect("finalize runs on the tenant host");

    let token = app
        .get(TENANT_HOST, finalize_path, &[(SESSION_COOKIE, "S1")])
        .await;

    assert_eq!(token.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&token), "/posts/1");
    assert!(cookie_value(&token, AUTH_COOKIE).is_some());
}

#[tokio::test]
async fn test_replayed_finalize_link_in_other_browser_is_rejected() {
    let app = spawn_app().await;
    let state = app.state_token("facebook", "http://avengers.test.fider.io/", "S1");

    let callback = app
        .get(
            LOGIN_HOST,
            &format!("/oauth/callback?state={}&code=123", state),
            &[],
        )
        .await;
    let finalize = location(&callback);
    let finalize_path = finalize.strip_prefix("http://avengers.test.fider.io").unwrap();

    let token = app.get(TENANT_HOST, finalize_path, &[(SESSION_COOKIE, "OTHER")]).await;

    assert_eq!(location(&token), "/");
    assert_eq!(cookie_value(&token, AUTH_COOKIE), None);
}
