use agora_app::rest_api::Page;
use agora_dal::user::User;
use agora_e2e_tests::{
    TEST_PASSWORD, TestUser, launch_env, prepare_env, server_url, spawn_server,
};
use agora_types::claim::Role;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::info;
use tracing_test::traced_test;

fn cookie_client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap()
}

#[tokio::test]
#[traced_test]
async fn test_register_and_session() {
    let (args, _config_guard) = prepare_env("test_register").await.unwrap();
    let base_url = server_url(&args).unwrap();
    let _state = spawn_server(args).await.unwrap();
    let client = cookie_client();
    let register_url = base_url.join("auth/register").unwrap();

    let payload = json!({
        "username": "newbie",
        "email": "newbie@example.com",
        "password": "long enough",
        "password2": "long enough"
    });
    let response = client
        .post(register_url.clone())
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    info!("Registered: {body:#?}");
    assert_eq!(body["user"]["username"], "newbie");
    assert_eq!(body["user"]["roles"], json!(["member"]));
    assert!(body["user"].get("password").is_none());
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));

    let response = reqwest::Client::new()
        .post(register_url.clone())
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "A user with that username already exists");

    let response = reqwest::Client::new()
        .post(register_url)
        .json(&json!({
            "username": "other",
            "email": "other@example.com",
            "password": "long enough",
            "password2": "different one"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["errors"]["password2"].is_array());

    // token cookie authenticates further requests
    let response = client
        .post(base_url.join("api/posts/").unwrap())
        .json(&json!({"title": "Hi", "content": "from cookie"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .get(base_url.join("auth/token").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = response.text().await.unwrap();
    assert!(!token.is_empty());

    let response = client
        .get(base_url.join("auth/logout").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client
        .get(base_url.join("auth/token").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .post(base_url.join("api/posts/").unwrap())
        .json(&json!({"title": "Hi", "content": "after logout"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // token handed out earlier still works as bearer
    let response = reqwest::Client::new()
        .get(base_url.join("api/accounts/following/").unwrap())
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[traced_test]
async fn test_login() {
    let (args, _config_guard) = prepare_env("test_login").await.unwrap();
    let (_client, env) = launch_env(args, TestUser::Member).await.unwrap();
    let login_url = env.url("auth/login");

    let client = cookie_client();
    let response = client
        .post(login_url.clone())
        .json(&json!({"username": "member", "password": TEST_PASSWORD}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["id"], env.user.id);
    let response = client.get(env.url("auth/token")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = reqwest::Client::new()
        .post(login_url.clone())
        .form(&[("username", "member"), ("password", TEST_PASSWORD)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = reqwest::Client::new()
        .post(login_url.clone())
        .json(&json!({"username": "member", "password": "wrong password"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = reqwest::Client::new()
        .post(login_url.clone())
        .json(&json!({"username": "nobody", "password": TEST_PASSWORD}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = reqwest::Client::new()
        .post(login_url)
        .body("member:password")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = reqwest::Client::new()
        .get(env.url("auth/token"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[traced_test]
async fn test_user_admin() {
    let (args, _config_guard) = prepare_env("test_user_admin").await.unwrap();
    let (admin, env) = launch_env(args, TestUser::Admin).await.unwrap();
    let (_, member) = env.other_user("member", &[Role::Member]).await.unwrap();
    let users_url = env.url("users");

    let response = member.get(users_url.clone()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = admin
        .post(users_url.clone())
        .json(&json!({
            "username": "clerk",
            "email": "clerk@example.com",
            "password": "secret password",
            "roles": ["librarian"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let clerk: User = response.json().await.unwrap();
    assert_eq!(clerk.roles, vec![Role::Librarian]);

    let response = admin
        .post(users_url.clone())
        .json(&json!({
            "username": "ghost",
            "email": "ghost@example.com",
            "roles": ["superuser"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = admin.get(users_url.clone()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page: Page<User> = response.json().await.unwrap();
    assert_eq!(page.total, 3);

    let clerk_session = cookie_client();
    let response = clerk_session
        .post(env.url("auth/login"))
        .json(&json!({"username": "clerk", "password": "secret password"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let roles_url = env.url(&format!("users/{}/roles", clerk.id));
    let response = member
        .put(roles_url.clone())
        .json(&json!({"roles": ["admin"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = admin
        .put(roles_url.clone())
        .json(&json!({"roles": ["admin"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let promoted: User = response.json().await.unwrap();
    assert_eq!(promoted.roles, vec![Role::Admin]);

    let response = admin
        .put(roles_url)
        .json(&json!({"roles": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = admin
        .put(env.url("users/9999/roles"))
        .json(&json!({"roles": ["member"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // token from the session carries roles changed after login
    let response = clerk_session
        .get(env.url("auth/token"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = response.text().await.unwrap();
    let response = reqwest::Client::new()
        .get(users_url.clone())
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = admin
        .delete(env.url(&format!("users/{}", clerk.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = admin
        .delete(env.url(&format!("users/{}", clerk.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // deleted user cannot get new token from old session
    let response = clerk_session
        .get(env.url("auth/token"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = reqwest::Client::new()
        .get(env.url("health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
