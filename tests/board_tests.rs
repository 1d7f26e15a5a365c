mod common;

use axum::http::StatusCode;
use boardgate::db::{NewArticle, Rank};
use boardgate::permissions::{PermissionMap, PermissionRule};
use common::{TestContext, body_json, get, json, set_cookies, setup};
use serde_json::json as body;

fn rank_at_least(min: Rank) -> PermissionRule {
    PermissionRule::RankThreshold {
        min,
        scoped_user: None,
    }
}

async fn allowed(ctx: &TestContext, board: i64, key: &str, cookie: Option<&str>) -> bool {
    let response = ctx
        .send(get(
            &format!("/api/boards/{}/permissions/{}", board, key),
            cookie,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["allowed"].as_bool().unwrap()
}

#[tokio::test]
async fn test_list_public_boards() {
    let ctx = setup().await;
    ctx.db
        .boards()
        .create("general", true, &PermissionMap::new())
        .await
        .unwrap();
    ctx.db
        .boards()
        .create("staff", false, &PermissionMap::new())
        .await
        .unwrap();

    let response = ctx.send(get("/api/boards", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let boards = json["boards"].as_array().unwrap();
    assert_eq!(boards.len(), 1);
    assert_eq!(boards[0]["name"], "general");
}

#[tokio::test]
async fn test_create_board_requires_admin() {
    let ctx = setup().await;
    ctx.create_user("alice", Rank::USER).await;
    ctx.create_user("root", Rank::ADMIN).await;
    let payload = body!({"name": "news", "permissions": {"write": {"min": 50}}});

    let response = ctx
        .send(json("POST", "/api/boards", None, payload.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(set_cookies(&response).len(), 2);

    let user = ctx.session_cookie("alice", Rank::USER);
    let response = ctx
        .send(json("POST", "/api/boards", Some(&user), payload.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = ctx.session_cookie("root", Rank::ADMIN);
    let response = ctx
        .send(json("POST", "/api/boards", Some(&admin), payload))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["id"].as_i64().unwrap();

    let map = ctx.db.boards().permission_map(id).await.unwrap().unwrap();
    assert_eq!(map.get("write"), Some(&rank_at_least(Rank::MODERATOR)));
}

#[tokio::test]
async fn test_admin_claim_in_token_is_not_enough() {
    let ctx = setup().await;
    ctx.create_user("alice", Rank::USER).await;
    // Token says admin, the directory says otherwise.
    let cookie = ctx.session_cookie("alice", Rank::ADMIN);

    let response = ctx
        .send(json("POST", "/api/boards", Some(&cookie), body!({"name": "news"})))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_permission_checks() {
    let ctx = setup().await;
    ctx.create_user("alice", Rank::USER).await;
    ctx.create_user("mod", Rank::MODERATOR).await;
    ctx.create_user("troll", Rank::BANNED).await;

    let map = PermissionMap::new()
        .with("read", PermissionRule::AlwaysAllow)
        .with("delete", PermissionRule::AlwaysDeny)
        .with("write", rank_at_least(Rank::MODERATOR))
        .with(
            "pin",
            PermissionRule::RankThreshold {
                min: Rank::USER,
                scoped_user: Some("alice".to_string()),
            },
        );
    let board = ctx.db.boards().create("news", true, &map).await.unwrap();

    let alice = ctx.session_cookie("alice", Rank::USER);
    let moderator = ctx.session_cookie("mod", Rank::MODERATOR);
    let troll = ctx.session_cookie("troll", Rank::BANNED);

    // Anonymous readers never hold a permission.
    assert!(!allowed(&ctx, board, "read", None).await);

    assert!(allowed(&ctx, board, "read", Some(&alice)).await);
    assert!(allowed(&ctx, board, "unlisted", Some(&alice)).await);
    assert!(!allowed(&ctx, board, "delete", Some(&moderator)).await);
    assert!(!allowed(&ctx, board, "write", Some(&alice)).await);
    assert!(allowed(&ctx, board, "write", Some(&moderator)).await);
    assert!(allowed(&ctx, board, "pin", Some(&alice)).await);
    assert!(!allowed(&ctx, board, "pin", Some(&moderator)).await);

    // Banned users are vetoed everywhere, even on open keys.
    assert!(!allowed(&ctx, board, "read", Some(&troll)).await);
    assert!(!allowed(&ctx, board, "unlisted", Some(&troll)).await);
}

#[tokio::test]
async fn test_permission_check_unknown_board() {
    let ctx = setup().await;
    ctx.create_user("alice", Rank::USER).await;
    let alice = ctx.session_cookie("alice", Rank::USER);

    let response = ctx
        .send(get("/api/boards/42/permissions/write", Some(&alice)))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = ctx.send(get("/api/boards/42/permissions/write", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_permission_uses_current_rank() {
    let ctx = setup().await;
    ctx.create_user("alice", Rank::USER).await;
    let map = PermissionMap::new().with("write", rank_at_least(Rank::MODERATOR));
    let board = ctx.db.boards().create("news", true, &map).await.unwrap();
    let cookie = ctx.session_cookie("alice", Rank::USER);

    assert!(!allowed(&ctx, board, "write", Some(&cookie)).await);

    ctx.db
        .users()
        .set_rank("alice", Rank::MODERATOR)
        .await
        .unwrap();
    assert!(allowed(&ctx, board, "write", Some(&cookie)).await);

    ctx.db.users().set_rank("alice", Rank::BANNED).await.unwrap();
    assert!(!allowed(&ctx, board, "write", Some(&cookie)).await);
}

#[tokio::test]
async fn test_create_article_requires_write_permission() {
    let ctx = setup().await;
    ctx.create_user("alice", Rank::USER).await;
    ctx.create_user("mod", Rank::MODERATOR).await;
    let map = PermissionMap::new().with("write", rank_at_least(Rank::MODERATOR));
    let board = ctx.db.boards().create("news", true, &map).await.unwrap();
    let uri = format!("/api/boards/{}/articles", board);
    let article = body!({"title": "Hello", "content": "First post", "tags": ["intro"]});

    let response = ctx
        .send(json("POST", &uri, None, article.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let alice = ctx.session_cookie("alice", Rank::USER);
    let response = ctx
        .send(json("POST", &uri, Some(&alice), article.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let moderator = ctx.session_cookie("mod", Rank::MODERATOR);
    let response = ctx
        .send(json("POST", &uri, Some(&moderator), article))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let listed = ctx.db.articles().list_recent(board, None, 10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].author_id, "mod");
    assert_eq!(listed[0].tags, vec!["intro".to_string()]);
}

#[tokio::test]
async fn test_open_board_accepts_any_user() {
    let ctx = setup().await;
    ctx.create_user("alice", Rank::USER).await;
    let board = ctx
        .db
        .boards()
        .create("general", true, &PermissionMap::new())
        .await
        .unwrap();
    let alice = ctx.session_cookie("alice", Rank::USER);
    let uri = format!("/api/boards/{}/articles", board);

    let response = ctx
        .send(json("POST", &uri, Some(&alice), body!({"title": "  "})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = ctx
        .send(json("POST", &uri, Some(&alice), body!({"title": "Hi"})))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_list_articles_newest_first() {
    let ctx = setup().await;
    let board = ctx
        .db
        .boards()
        .create("general", true, &PermissionMap::new())
        .await
        .unwrap();
    for title in ["one", "two", "three"] {
        ctx.db
            .articles()
            .create(&NewArticle {
                board_id: board,
                author_id: "alice",
                title,
                content: "",
                tags: &[],
            })
            .await
            .unwrap();
    }

    let response = ctx
        .send(get(&format!("/api/boards/{}/articles", board), None))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let titles: Vec<&str> = json["articles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["three", "two", "one"]);

    let response = ctx.send(get("/api/boards/999/articles", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_replace_permissions_requires_admin() {
    let ctx = setup().await;
    ctx.create_user("alice", Rank::USER).await;
    ctx.create_user("root", Rank::ADMIN).await;
    let board = ctx
        .db
        .boards()
        .create("general", true, &PermissionMap::new())
        .await
        .unwrap();
    let uri = format!("/api/boards/{}/permissions", board);
    let payload = body!({"write": {"min": 50}, "delete": false});
    let alice = ctx.session_cookie("alice", Rank::USER);
    let admin = ctx.session_cookie("root", Rank::ADMIN);

    let response = ctx
        .send(json("PUT", &uri, Some(&alice), payload.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(allowed(&ctx, board, "write", Some(&alice)).await);

    let response = ctx
        .send(json("PUT", &uri, Some(&admin), payload.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let map = ctx.db.boards().permission_map(board).await.unwrap().unwrap();
    assert_eq!(map.get("write"), Some(&rank_at_least(Rank::MODERATOR)));
    assert_eq!(map.get("delete"), Some(&PermissionRule::AlwaysDeny));
    assert!(!allowed(&ctx, board, "write", Some(&alice)).await);

    let response = ctx
        .send(json("PUT", "/api/boards/999/permissions", Some(&admin), payload))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_hidden_articles_do_not_shorten_the_page() {
    let ctx = setup().await;
    ctx.create_user("alice", Rank::USER).await;
    ctx.create_user("bob", Rank::USER).await;
    let board = ctx
        .db
        .boards()
        .create("general", true, &PermissionMap::new())
        .await
        .unwrap();

    // Three old articles by alice, buried under a full page by bob.
    let authors = std::iter::repeat_n("alice", 3).chain(std::iter::repeat_n("bob", 60));
    for author in authors {
        ctx.db
            .articles()
            .create(&NewArticle {
                board_id: board,
                author_id: author,
                title: "post",
                content: "",
                tags: &[],
            })
            .await
            .unwrap();
    }
    ctx.db.users().block_user("alice", "bob", "").await.unwrap();
    let uri = format!("/api/boards/{}/articles", board);

    let response = ctx.send(get(&uri, None)).await;
    let json = body_json(response).await;
    assert_eq!(json["articles"].as_array().unwrap().len(), 50);

    let alice = ctx.session_cookie("alice", Rank::USER);
    let response = ctx.send(get(&uri, Some(&alice))).await;
    let json = body_json(response).await;
    let articles = json["articles"].as_array().unwrap();
    assert_eq!(articles.len(), 3);
    assert!(articles.iter().all(|a| a["author_id"] == "alice"));
}
