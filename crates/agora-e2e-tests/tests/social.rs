use agora_dal::{comment::Comment, notification::Notification, post::Post, user::UserShort};
use agora_e2e_tests::{
    TestUser, launch_env, prepare_env,
    rest::{create_post, get_page},
};
use agora_types::claim::Role;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing_test::traced_test;

#[tokio::test]
#[traced_test]
async fn test_posts_and_comments() {
    let (args, _config_guard) = prepare_env("test_posts_and_comments").await.unwrap();
    let (client, env) = launch_env(args, TestUser::Member).await.unwrap();
    let (_other, other_client) = env.other_user("reader", &[Role::Member]).await.unwrap();

    let post = create_post(&client, &env.base_url, "First post", "Hello agora")
        .await
        .unwrap();
    assert_eq!(post.author, "member");
    assert_eq!(post.author_id, env.user.id);
    assert_eq!(post.comments_count, 0);

    let post_url = env.url(&format!("api/posts/{}/", post.id));

    // only author can edit
    let response = other_client
        .patch(post_url.clone())
        .json(&json!({"title": "Hijacked"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .patch(post_url.clone())
        .json(&json!({"title": "First post, edited"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let edited: Post = response.json().await.unwrap();
    assert_eq!(edited.title, "First post, edited");
    assert_eq!(edited.content, "Hello agora");

    let response = client
        .patch(post_url.clone())
        .json(&json!({"content": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let comments_url = env.url("api/comments/");
    let response = other_client
        .post(comments_url.clone())
        .json(&json!({"post": post.id, "content": "ok"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["errors"]["content"][0],
        "Comment must be at least 3 characters long."
    );

    let response = other_client
        .post(comments_url.clone())
        .json(&json!({"post": post.id, "content": "Nice one"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let comment: Comment = response.json().await.unwrap();
    assert_eq!(comment.author, "reader");

    let response = other_client
        .post(comments_url.clone())
        .json(&json!({"post": 9999, "content": "Into the void"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let comment_url = env.url(&format!("api/comments/{}/", comment.id));
    let response = client
        .put(comment_url.clone())
        .json(&json!({"content": "Not mine"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = other_client
        .patch(comment_url.clone())
        .json(&json!({"content": "Very nice one"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client.get(post_url.clone()).send().await.unwrap();
    let detail: Post = response.json().await.unwrap();
    assert_eq!(detail.comments_count, 1);
    assert_eq!(detail.comments[0].content, "Very nice one");

    let page = get_page::<Comment>(&client, env.url(&format!("api/comments/?post={}", post.id)))
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    let response = other_client.delete(comment_url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = other_client.delete(post_url.clone()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = client.delete(post_url.clone()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = client.get(post_url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[traced_test]
async fn test_likes_and_notifications() {
    let (args, _config_guard) = prepare_env("test_likes").await.unwrap();
    let (client, env) = launch_env(args, TestUser::Member).await.unwrap();
    let (fan, fan_client) = env.other_user("fan", &[Role::Member]).await.unwrap();

    let post = create_post(&client, &env.base_url, "Likeable", "Like me")
        .await
        .unwrap();
    let like_url = env.url(&format!("api/posts/{}/like/", post.id));
    let unlike_url = env.url(&format!("api/posts/{}/unlike/", post.id));

    let response = fan_client.post(like_url.clone()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Post liked successfully");

    let response = fan_client.post(like_url.clone()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "You already liked this post");

    // own likes do not notify
    let response = client.post(like_url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let page = get_page::<Notification>(&client, env.url("api/notifications/"))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    let notification = &page.rows[0];
    assert_eq!(notification.actor_id, fan.id);
    assert_eq!(notification.verb, "liked your post");
    assert_eq!(notification.target_object_id, Some(post.id));
    assert!(!notification.read);

    // other user's notification looks missing
    let read_url = env.url(&format!("api/notifications/{}/read/", notification.id));
    let response = fan_client.post(read_url.clone()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.post(read_url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Notification marked as read");

    let page = get_page::<Notification>(&client, env.url("api/notifications/"))
        .await
        .unwrap();
    assert!(page.rows[0].read);

    let response = fan_client.post(unlike_url.clone()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Post unliked successfully");

    let response = fan_client.post(unlike_url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = fan_client
        .post(env.url("api/posts/9999/like/"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let anonymous = reqwest::Client::new();
    let response = anonymous
        .get(env.url("api/notifications/"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[traced_test]
async fn test_follow_and_feed() {
    let (args, _config_guard) = prepare_env("test_follow_and_feed").await.unwrap();
    let (client, env) = launch_env(args, TestUser::Member).await.unwrap();
    let (writer, writer_client) = env.other_user("writer", &[Role::Member]).await.unwrap();
    let (_, stranger_client) = env.other_user("stranger", &[Role::Member]).await.unwrap();

    create_post(&writer_client, &env.base_url, "Older", "first")
        .await
        .unwrap();
    create_post(&writer_client, &env.base_url, "Newer", "second")
        .await
        .unwrap();
    create_post(&stranger_client, &env.base_url, "Unrelated", "noise")
        .await
        .unwrap();

    let page = get_page::<Post>(&client, env.url("api/feed/")).await.unwrap();
    assert_eq!(page.total, 0);

    let follow_url = env.url(&format!("api/accounts/follow/{}/", writer.id));
    let response = client.post(follow_url.clone()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "User followed successfully");

    let response = client.post(follow_url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(env.url(&format!("api/accounts/follow/{}/", env.user.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "You cannot follow yourself");

    let response = client
        .post(env.url("api/accounts/follow/9999/"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let page = get_page::<Post>(&client, env.url("api/feed/")).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.rows[0].title, "Newer");
    assert_eq!(page.rows[1].title, "Older");

    let response = client
        .get(env.url("api/accounts/following/"))
        .send()
        .await
        .unwrap();
    let following: Vec<UserShort> = response.json().await.unwrap();
    assert_eq!(following.len(), 1);
    assert_eq!(following[0].username, "writer");

    let response = writer_client
        .get(env.url("api/accounts/followers/"))
        .send()
        .await
        .unwrap();
    let followers: Vec<UserShort> = response.json().await.unwrap();
    assert_eq!(followers.len(), 1);
    assert_eq!(followers[0].id, env.user.id);

    let page = get_page::<Notification>(&writer_client, env.url("api/notifications/"))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0].verb, "started following you");

    let unfollow_url = env.url(&format!("api/accounts/unfollow/{}/", writer.id));
    let response = client.post(unfollow_url.clone()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "User unfollowed successfully");

    let response = client.post(unfollow_url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let page = get_page::<Post>(&client, env.url("api/feed/")).await.unwrap();
    assert_eq!(page.total, 0);
}
