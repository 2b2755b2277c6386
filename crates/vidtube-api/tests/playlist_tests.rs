//! End-to-end tests for playlist ownership and membership rules.

mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

async fn create_playlist(app: &TestApp, token: &str, name: &str) -> String {
    let response = app
        .json(
            Method::POST,
            "/playlists",
            Some(token),
            json!({ "name": name, "description": format!("{name} description") }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    response.data()["id"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn created_playlist_is_empty_and_owned() {
    let app = TestApp::new();
    let (alice_id, alice) = app.signup("alice").await;

    let response = app
        .json(
            Method::POST,
            "/playlists",
            Some(&alice),
            json!({ "name": "Favourites", "description": "the good stuff" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.data()["owner"], alice_id.as_str());
    assert_eq!(response.data()["name"], "Favourites");
    assert_eq!(response.data()["videos"], json!([]));

    let missing = app
        .json(Method::POST, "/playlists", Some(&alice), json!({ "name": "No description" }))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn add_and_remove_videos() {
    let app = TestApp::new();
    let (_, alice) = app.signup("alice").await;
    let playlist = create_playlist(&app, &alice, "Mix").await;
    let first = app.upload_video(&alice, "First").await;
    let second = app.upload_video(&alice, "Second").await;

    for video in [&second, &first] {
        let added = app
            .request(
                Method::PATCH,
                &format!("/playlists/add/{video}/{playlist}"),
                Some(&alice),
            )
            .await;
        assert_eq!(added.status, StatusCode::OK);
    }

    let detail = app.get(&format!("/playlists/{playlist}"), &alice).await;
    assert_eq!(detail.status, StatusCode::OK);
    let order: Vec<&str> = detail.data()["videos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_str().unwrap())
        .collect();
    assert_eq!(order, vec![second.as_str(), first.as_str()]);

    let duplicate = app
        .request(
            Method::PATCH,
            &format!("/playlists/add/{first}/{playlist}"),
            Some(&alice),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.error(), "Video is already part of this playlist");

    let removed = app
        .request(
            Method::PATCH,
            &format!("/playlists/remove/{first}/{playlist}"),
            Some(&alice),
        )
        .await;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(removed.data()["videos"], json!([second.as_str()]));

    let not_there = app
        .request(
            Method::PATCH,
            &format!("/playlists/remove/{first}/{playlist}"),
            Some(&alice),
        )
        .await;
    assert_eq!(not_there.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unpublished_and_missing_videos_cannot_be_added() {
    let app = TestApp::new();
    let (_, alice) = app.signup("alice").await;
    let playlist = create_playlist(&app, &alice, "Drafts").await;
    let draft = app.upload_video(&alice, "Draft").await;
    app.request(
        Method::PATCH,
        &format!("/videos/toggle/publish/{draft}"),
        Some(&alice),
    )
    .await;

    let unpublished = app
        .request(
            Method::PATCH,
            &format!("/playlists/add/{draft}/{playlist}"),
            Some(&alice),
        )
        .await;
    assert_eq!(unpublished.status, StatusCode::BAD_REQUEST);

    let missing = app
        .request(
            Method::PATCH,
            &format!("/playlists/add/{}/{playlist}", uuid::Uuid::new_v4()),
            Some(&alice),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let malformed = app
        .request(
            Method::PATCH,
            &format!("/playlists/add/nope/{playlist}"),
            Some(&alice),
        )
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn concurrent_adds_of_the_same_video_insert_once() {
    let app = TestApp::new();
    let (_, alice) = app.signup("alice").await;
    let playlist = create_playlist(&app, &alice, "Race").await;
    let video = app.upload_video(&alice, "Contested").await;
    let path = format!("/playlists/add/{video}/{playlist}");

    let (a, b) = tokio::join!(
        app.request(Method::PATCH, &path, Some(&alice)),
        app.request(Method::PATCH, &path, Some(&alice)),
    );

    let mut statuses = [a.status, b.status];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::BAD_REQUEST]);

    let detail = app.get(&format!("/playlists/{playlist}"), &alice).await;
    assert_eq!(detail.data()["videos"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn playlists_are_private_to_their_owner() {
    let app = TestApp::new();
    let (alice_id, alice) = app.signup("alice").await;
    let (_, bob) = app.signup("bob").await;
    let playlist = create_playlist(&app, &alice, "Private").await;
    let video = app.upload_video(&bob, "Bob's video").await;

    let peek = app.get(&format!("/playlists/{playlist}"), &bob).await;
    assert_eq!(peek.status, StatusCode::UNAUTHORIZED);

    let list = app.get(&format!("/playlists/user/{alice_id}"), &bob).await;
    assert_eq!(list.status, StatusCode::UNAUTHORIZED);

    let add = app
        .request(
            Method::PATCH,
            &format!("/playlists/add/{video}/{playlist}"),
            Some(&bob),
        )
        .await;
    assert_eq!(add.status, StatusCode::UNAUTHORIZED);

    let rename = app
        .json(
            Method::PATCH,
            &format!("/playlists/{playlist}"),
            Some(&bob),
            json!({ "name": "Stolen" }),
        )
        .await;
    assert_eq!(rename.status, StatusCode::UNAUTHORIZED);

    let delete = app
        .request(Method::DELETE, &format!("/playlists/{playlist}"), Some(&bob))
        .await;
    assert_eq!(delete.status, StatusCode::UNAUTHORIZED);

    let missing = app
        .get(&format!("/playlists/{}", uuid::Uuid::new_v4()), &alice)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_playlists_include_empty_ones() {
    let app = TestApp::new();
    let (alice_id, alice) = app.signup("alice").await;
    let full = create_playlist(&app, &alice, "Full").await;
    create_playlist(&app, &alice, "Empty").await;
    let video = app.upload_video(&alice, "Song").await;
    app.request(
        Method::PATCH,
        &format!("/playlists/add/{video}/{full}"),
        Some(&alice),
    )
    .await;

    let response = app.get(&format!("/playlists/user/{alice_id}"), &alice).await;
    assert_eq!(response.status, StatusCode::OK);
    let playlists = response.data().as_array().unwrap();
    assert_eq!(playlists.len(), 2);

    let sizes: Vec<usize> = playlists
        .iter()
        .map(|p| p["videos"].as_array().unwrap().len())
        .collect();
    assert!(sizes.contains(&0) && sizes.contains(&1));
}

#[tokio::test]
async fn contains_video_flags_each_playlist() {
    let app = TestApp::new();
    let (_, alice) = app.signup("alice").await;
    let with = create_playlist(&app, &alice, "With").await;
    let without = create_playlist(&app, &alice, "Without").await;
    let video = app.upload_video(&alice, "Track").await;
    app.request(
        Method::PATCH,
        &format!("/playlists/add/{video}/{with}"),
        Some(&alice),
    )
    .await;

    let response = app
        .get(&format!("/playlists/contains-video/{video}"), &alice)
        .await;
    assert_eq!(response.status, StatusCode::OK);

    for entry in response.data().as_array().unwrap() {
        let id = entry["id"].as_str().unwrap();
        let expected = id == with;
        assert!(id == with || id == without);
        assert_eq!(entry["containsVideo"], expected);
    }
}

#[tokio::test]
async fn unpublished_videos_are_hidden_from_playlist_reads() {
    let app = TestApp::new();
    let (_, alice) = app.signup("alice").await;
    let playlist = create_playlist(&app, &alice, "Shifting").await;
    let video = app.upload_video(&alice, "Soon hidden").await;
    app.request(
        Method::PATCH,
        &format!("/playlists/add/{video}/{playlist}"),
        Some(&alice),
    )
    .await;
    app.request(
        Method::PATCH,
        &format!("/videos/toggle/publish/{video}"),
        Some(&alice),
    )
    .await;

    let detail = app.get(&format!("/playlists/{playlist}"), &alice).await;
    assert_eq!(detail.data()["videos"], json!([]));
}

#[tokio::test]
async fn update_and_delete_playlist() {
    let app = TestApp::new();
    let (_, alice) = app.signup("alice").await;
    let playlist = create_playlist(&app, &alice, "Before").await;
    let path = format!("/playlists/{playlist}");

    let empty = app
        .json(Method::PATCH, &path, Some(&alice), json!({ "name": "  " }))
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let renamed = app
        .json(Method::PATCH, &path, Some(&alice), json!({ "name": "After" }))
        .await;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.data()["name"], "After");
    assert_eq!(renamed.data()["description"], "Before description");

    let deleted = app.request(Method::DELETE, &path, Some(&alice)).await;
    assert_eq!(deleted.status, StatusCode::OK);

    let gone = app.get(&path, &alice).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}
