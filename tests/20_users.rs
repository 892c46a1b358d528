mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{TestApp, PASSWORD};

#[tokio::test]
async fn registration_validates_input() -> Result<()> {
    let app = TestApp::new();

    let cases = [
        json!({ "nick": "ana", "email": "ana@example.com", "password": "pw" }),
        json!({ "name": "Ana", "nick": "ana", "email": "not-an-email", "password": "pw" }),
        json!({ "name": "Ana", "nick": "ana", "email": "ana@example.com" }),
        json!({ "name": "   ", "nick": "ana", "email": "ana@example.com", "password": "pw" }),
    ];
    for body in cases {
        let (status, response) = app.call(Method::POST, "/users", None, Some(body.clone())).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body} -> {response}");
    }
    Ok(())
}

#[tokio::test]
async fn registration_never_returns_the_password() -> Result<()> {
    let app = TestApp::new();
    let (status, body) = app
        .call(
            Method::POST,
            "/users",
            None,
            Some(json!({
                "name": " Ana ",
                "nick": "ana",
                "email": "ana@example.com",
                "password": PASSWORD,
            })),
        )
        .await?;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["name"], "Ana");
    assert!(body["data"].get("password").is_none());
    Ok(())
}

#[tokio::test]
async fn duplicate_nick_or_email_conflicts() -> Result<()> {
    let app = TestApp::new();
    app.register("ana").await?;

    let (status, _) = app
        .call(
            Method::POST,
            "/users",
            None,
            Some(json!({
                "name": "Other",
                "nick": "ana",
                "email": "other@example.com",
                "password": PASSWORD,
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn search_matches_name_or_nick() -> Result<()> {
    let app = TestApp::new();
    let (_, token) = app.user("ana").await?;
    app.register("bruno").await?;

    let (status, body) = app.call(Method::GET, "/users?user=ANA", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let nicks: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["nick"].as_str().unwrap())
        .collect();
    assert_eq!(nicks, vec!["ana"]);
    Ok(())
}

#[tokio::test]
async fn unknown_user_is_not_found_and_bad_id_is_rejected() -> Result<()> {
    let app = TestApp::new();
    let (_, token) = app.user("ana").await?;

    let (status, _) = app.call(Method::GET, "/users/999", Some(&token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.call(Method::GET, "/users/abc", Some(&token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn only_the_owner_edits_or_deletes_a_profile() -> Result<()> {
    let app = TestApp::new();
    let (ana, ana_token) = app.user("ana").await?;
    let (_, bruno_token) = app.user("bruno").await?;
    let edit = json!({ "name": "Ana Maria", "nick": "ana", "email": "ana@example.com" });

    let uri = format!("/users/{}", ana);
    let (status, body) = app
        .call(Method::PUT, &uri, Some(&bruno_token), Some(edit.clone()))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = app.call(Method::DELETE, &uri, Some(&bruno_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call(Method::PUT, &uri, Some(&ana_token), Some(edit)).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app.call(Method::GET, &uri, Some(&bruno_token), None).await?;
    assert_eq!(body["data"]["name"], "Ana Maria");

    let (status, _) = app.call(Method::DELETE, &uri, Some(&ana_token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call(Method::GET, &uri, Some(&bruno_token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn ownership_is_checked_before_the_body() -> Result<()> {
    let app = TestApp::new();
    let (ana, ana_token) = app.user("ana").await?;
    let (_, bruno_token) = app.user("bruno").await?;
    let profile = format!("/users/{}", ana);
    let password = format!("/users/{}/update-password", ana);

    let cases = [
        (Method::PUT, &profile, json!({ "name": "" })),
        (Method::PUT, &profile, json!({ "name": 5 })),
        (Method::POST, &password, json!({ "current": "", "new": "" })),
        (Method::POST, &password, json!({})),
    ];
    for (method, uri, body) in cases {
        let (status, response) = app
            .call(method.clone(), uri, Some(&bruno_token), Some(body.clone()))
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri} {body}");
        assert_eq!(response["code"], "FORBIDDEN");

        let (status, _) = app.call(method, uri, Some(&ana_token), Some(body)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = app.login("ana", PASSWORD).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn following_yourself_is_forbidden_and_changes_nothing() -> Result<()> {
    let app = TestApp::new();
    let (ana, token) = app.user("ana").await?;

    for action in ["follow", "unfollow"] {
        let (status, _) = app
            .call(Method::POST, &format!("/users/{}/{}", ana, action), Some(&token), None)
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    let (_, body) = app
        .call(Method::GET, &format!("/users/{}/followers", ana), Some(&token), None)
        .await?;
    assert_eq!(body["data"], json!([]));
    Ok(())
}

#[tokio::test]
async fn follow_is_idempotent() -> Result<()> {
    let app = TestApp::new();
    let (ana, ana_token) = app.user("ana").await?;
    let (bruno, _) = app.user("bruno").await?;
    let follow = format!("/users/{}/follow", bruno);

    for _ in 0..2 {
        let (status, _) = app.call(Method::POST, &follow, Some(&ana_token), None).await?;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let (_, followers) = app
        .call(Method::GET, &format!("/users/{}/followers", bruno), Some(&ana_token), None)
        .await?;
    assert_eq!(followers["data"].as_array().unwrap().len(), 1);
    assert_eq!(followers["data"][0]["id"], ana);

    let (_, following) = app
        .call(Method::GET, &format!("/users/{}/following", ana), Some(&ana_token), None)
        .await?;
    assert_eq!(following["data"][0]["id"], bruno);
    Ok(())
}

#[tokio::test]
async fn unfollow_without_edge_succeeds() -> Result<()> {
    let app = TestApp::new();
    let (_, ana_token) = app.user("ana").await?;
    let (bruno, _) = app.user("bruno").await?;
    let unfollow = format!("/users/{}/unfollow", bruno);

    let (status, _) = app.call(Method::POST, &unfollow, Some(&ana_token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    app.call(Method::POST, &format!("/users/{}/follow", bruno), Some(&ana_token), None)
        .await?;
    let (status, _) = app.call(Method::POST, &unfollow, Some(&ana_token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, followers) = app
        .call(Method::GET, &format!("/users/{}/followers", bruno), Some(&ana_token), None)
        .await?;
    assert_eq!(followers["data"], json!([]));
    Ok(())
}

#[tokio::test]
async fn following_a_missing_user_is_not_found() -> Result<()> {
    let app = TestApp::new();
    let (_, token) = app.user("ana").await?;

    let (status, _) = app.call(Method::POST, "/users/999/follow", Some(&token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn password_rotation_replaces_the_stored_hash() -> Result<()> {
    let app = TestApp::new();
    let (ana, token) = app.user("ana").await?;
    let uri = format!("/users/{}/update-password", ana);

    let (status, _) = app
        .call(
            Method::POST,
            &uri,
            Some(&token),
            Some(json!({ "current": PASSWORD, "new": "a brand new secret" })),
        )
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.login("ana", "a brand new secret").await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.login("ana", PASSWORD).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn wrong_current_password_leaves_hash_unchanged() -> Result<()> {
    let app = TestApp::new();
    let (ana, token) = app.user("ana").await?;

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/users/{}/update-password", ana),
            Some(&token),
            Some(json!({ "current": "guess", "new": "a brand new secret" })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.login("ana", PASSWORD).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.login("ana", "a brand new secret").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn password_of_another_user_cannot_be_changed() -> Result<()> {
    let app = TestApp::new();
    let (ana, _) = app.user("ana").await?;
    let (_, bruno_token) = app.user("bruno").await?;

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/users/{}/update-password", ana),
            Some(&bruno_token),
            Some(json!({ "current": PASSWORD, "new": "hijacked" })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.login("ana", PASSWORD).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn every_request_releases_its_handle() -> Result<()> {
    let app = TestApp::new();
    let (ana, token) = app.user("ana").await?;
    app.call(Method::GET, "/users/999", Some(&token), None).await?;
    app.call(Method::GET, &format!("/users/{}", ana), Some(&token), None)
        .await?;

    assert!(app.provider.call_count() > 0);
    assert_eq!(app.provider.open_handles(), 0);
    Ok(())
}
