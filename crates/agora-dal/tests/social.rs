use agora_dal::{
    Error, ListingParams,
    comment::{CommentFilter, CommentRepositoryImpl, CreateComment, UpdateComment},
    follow::FollowRepositoryImpl,
    like::LikeRepositoryImpl,
    notification::{NotificationRepositoryImpl, VERB_FOLLOWED, VERB_LIKED_POST},
    post::{CreatePost, PostFilter, PostRepositoryImpl},
    user::{CreateUser, UserRepositoryImpl},
};
use sqlx::Executor;

type Pool = sqlx::Pool<sqlx::Sqlite>;

async fn init_db() -> Pool {
    let conn = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    conn.execute("PRAGMA foreign_keys = ON").await.unwrap();
    agora_dal::migrate(&conn).await.unwrap();
    conn
}

async fn create_user(conn: &Pool, username: &str) -> i64 {
    let repo = UserRepositoryImpl::new(conn.clone());
    repo.create(CreateUser {
        username: username.to_string(),
        email: format!("{username}@example.com").parse().unwrap(),
        password: None,
        roles: None,
        date_of_birth: None,
        profile_photo: None,
    })
    .await
    .unwrap()
    .id
}

fn post(title: &str, content: &str) -> CreatePost {
    CreatePost {
        title: title.to_string(),
        content: content.to_string(),
    }
}

#[tokio::test]
async fn test_posts_and_comments() {
    let conn = init_db().await;
    let alice = create_user(&conn, "alice").await;
    let bob = create_user(&conn, "bob").await;
    let posts = PostRepositoryImpl::new(conn.clone());
    let comments = CommentRepositoryImpl::new(conn.clone());

    let first = posts.create(alice, post("Rust", "Ownership rules")).await.unwrap();
    let second = posts.create(bob, post("Gardening", "Tomatoes")).await.unwrap();
    assert_eq!(first.author, "alice");
    assert_eq!(first.comments_count, 0);

    // newest first
    let listed = posts
        .list(ListingParams::new(0, 10), &PostFilter::default())
        .await
        .unwrap();
    assert_eq!(listed.total, 2);
    assert_eq!(listed.rows[0].id, second.id);

    let found = posts
        .list(ListingParams::new(0, 10).with_search("tomato"), &PostFilter::default())
        .await
        .unwrap();
    assert_eq!(found.total, 1);
    assert_eq!(found.rows[0].id, second.id);

    let by_alice = posts
        .list(
            ListingParams::new(0, 10),
            &PostFilter {
                author: Some(alice),
            },
        )
        .await
        .unwrap();
    assert_eq!(by_alice.total, 1);

    let comment = comments
        .create(
            bob,
            CreateComment {
                post: first.id,
                content: "  Great read  ".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(comment.content, "Great read");
    assert_eq!(comment.author, "bob");

    let missing_post = comments
        .create(
            bob,
            CreateComment {
                post: 999,
                content: "Hello".to_string(),
            },
        )
        .await;
    assert!(matches!(missing_post, Err(Error::InvalidReference(_))));

    let updated = comments
        .update(
            comment.id,
            UpdateComment {
                content: "Really great".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.content, "Really great");

    let detail = posts.get(first.id).await.unwrap();
    assert_eq!(detail.comments_count, 1);
    assert_eq!(detail.comments[0].id, comment.id);

    let for_post = comments
        .list(
            ListingParams::new(0, 10),
            &CommentFilter {
                post: Some(second.id),
            },
        )
        .await
        .unwrap();
    assert_eq!(for_post.total, 0);

    posts.delete(first.id).await.unwrap();
    assert!(matches!(
        comments.get(comment.id).await,
        Err(Error::RecordNotFound(_))
    ));
}

#[tokio::test]
async fn test_like_unlike() {
    let conn = init_db().await;
    let alice = create_user(&conn, "alice").await;
    let bob = create_user(&conn, "bob").await;
    let posts = PostRepositoryImpl::new(conn.clone());
    let likes = LikeRepositoryImpl::new(conn.clone());
    let notifications = NotificationRepositoryImpl::new(conn.clone());

    let post = posts.create(alice, post("Hello", "World")).await.unwrap();

    let like = likes.like(bob, post.id).await.unwrap();
    assert_eq!(like.user, bob);
    assert_eq!(likes.count(post.id).await.unwrap(), 1);

    let again = likes.like(bob, post.id).await;
    match again {
        Err(Error::AlreadyExists(msg)) => assert_eq!(msg, "You already liked this post"),
        other => panic!("Unexpected result {other:?}"),
    }
    assert_eq!(likes.count(post.id).await.unwrap(), 1);

    let received = notifications
        .list(alice, ListingParams::new(0, 10))
        .await
        .unwrap();
    assert_eq!(received.total, 1);
    let notification = &received.rows[0];
    assert_eq!(notification.verb, VERB_LIKED_POST);
    assert_eq!(notification.actor, "bob");
    assert_eq!(notification.target_content_type.as_deref(), Some("post"));
    assert_eq!(notification.target_object_id, Some(post.id));
    assert!(!notification.read);

    // no notification for own post
    likes.like(alice, post.id).await.unwrap();
    assert_eq!(notifications.unread_count(alice).await.unwrap(), 1);

    assert!(matches!(
        likes.like(bob, 12345).await,
        Err(Error::RecordNotFound(_))
    ));

    likes.unlike(bob, post.id).await.unwrap();
    match likes.unlike(bob, post.id).await {
        Err(Error::InvalidOperation(msg)) => assert_eq!(msg, "You have not liked this post"),
        other => panic!("Unexpected result {other:?}"),
    }
    assert!(matches!(
        likes.unlike(bob, 12345).await,
        Err(Error::RecordNotFound(_))
    ));

    // like is possible again after unlike
    likes.like(bob, post.id).await.unwrap();
    assert_eq!(likes.count(post.id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_follow_and_feed() {
    let conn = init_db().await;
    let alice = create_user(&conn, "alice").await;
    let bob = create_user(&conn, "bob").await;
    let carol = create_user(&conn, "carol").await;
    let posts = PostRepositoryImpl::new(conn.clone());
    let follows = FollowRepositoryImpl::new(conn.clone());
    let notifications = NotificationRepositoryImpl::new(conn.clone());

    let bob_post = posts.create(bob, post("Bob", "first")).await.unwrap();
    posts.create(carol, post("Carol", "not followed")).await.unwrap();
    let bob_second = posts.create(bob, post("Bob again", "second")).await.unwrap();

    let empty = posts.feed(alice, ListingParams::new(0, 10)).await.unwrap();
    assert_eq!(empty.total, 0);

    follows.follow(alice, bob).await.unwrap();
    assert!(matches!(
        follows.follow(alice, bob).await,
        Err(Error::AlreadyExists(_))
    ));
    assert!(matches!(
        follows.follow(alice, alice).await,
        Err(Error::InvalidOperation(_))
    ));
    assert!(matches!(
        follows.follow(alice, 999).await,
        Err(Error::RecordNotFound(_))
    ));

    let feed = posts.feed(alice, ListingParams::new(0, 10)).await.unwrap();
    assert_eq!(feed.total, 2);
    let ids: Vec<_> = feed.rows.iter().map(|p| p.id).collect();
    assert_eq!(ids, [bob_second.id, bob_post.id]);

    let following = follows.following(alice).await.unwrap();
    assert_eq!(following.len(), 1);
    assert_eq!(following[0].username, "bob");
    let followers = follows.followers(bob).await.unwrap();
    assert_eq!(followers[0].id, alice);

    let received = notifications.list(bob, ListingParams::new(0, 10)).await.unwrap();
    assert_eq!(received.rows[0].verb, VERB_FOLLOWED);

    follows.unfollow(alice, bob).await.unwrap();
    assert!(matches!(
        follows.unfollow(alice, bob).await,
        Err(Error::InvalidOperation(_))
    ));
    let feed = posts.feed(alice, ListingParams::new(0, 10)).await.unwrap();
    assert_eq!(feed.total, 0);
}

#[tokio::test]
async fn test_notification_ownership() {
    let conn = init_db().await;
    let alice = create_user(&conn, "alice").await;
    let bob = create_user(&conn, "bob").await;
    let follows = FollowRepositoryImpl::new(conn.clone());
    let notifications = NotificationRepositoryImpl::new(conn.clone());

    follows.follow(alice, bob).await.unwrap();
    let id = notifications
        .list(bob, ListingParams::new(0, 10))
        .await
        .unwrap()
        .rows[0]
        .id;

    assert!(matches!(
        notifications.mark_read(id, alice).await,
        Err(Error::RecordNotFound(_))
    ));
    let read = notifications.mark_read(id, bob).await.unwrap();
    assert!(read.read);
    assert_eq!(notifications.unread_count(bob).await.unwrap(), 0);
    assert_eq!(
        notifications
            .list(alice, ListingParams::new(0, 10))
            .await
            .unwrap()
            .total,
        0
    );
}

#[tokio::test]
async fn test_search_matches_wildcards_literally() {
    let conn = init_db().await;
    let alice = create_user(&conn, "alice").await;
    let posts = PostRepositoryImpl::new(conn.clone());
    for title in ["Plain title", "snake_case guide", "100% pure", "back\\slash"] {
        posts.create(alice, post(title, "text")).await.unwrap();
    }

    for (term, expected) in [("_", "snake_case guide"), ("%", "100% pure"), ("\\", "back\\slash")] {
        let found = posts
            .list(ListingParams::new(0, 10).with_search(term), &PostFilter::default())
            .await
            .unwrap();
        assert_eq!(found.total, 1, "search {term}");
        assert_eq!(found.rows[0].title, expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_likes_and_follows() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("agora.db").display());
    let conn = agora_dal::new_pool(&url).await.unwrap();
    agora_dal::migrate(&conn).await.unwrap();

    let author = create_user(&conn, "author").await;
    let post = PostRepositoryImpl::new(conn.clone())
        .create(author, post("Popular", "Everybody likes it"))
        .await
        .unwrap();
    let mut users = Vec::new();
    for i in 0..40 {
        users.push(create_user(&conn, &format!("user{i}")).await);
    }

    let tasks = users
        .iter()
        .map(|&user| {
            let conn = conn.clone();
            let post_id = post.id;
            tokio::spawn(async move {
                let like = LikeRepositoryImpl::new(conn.clone())
                    .like(user, post_id)
                    .await;
                let follow = FollowRepositoryImpl::new(conn).follow(user, author).await;
                like.and(follow)
            })
        })
        .collect::<Vec<_>>();
    let results = futures::future::join_all(tasks).await;
    let failures = results
        .into_iter()
        .map(|r| r.unwrap())
        .filter_map(|r| r.err())
        .map(|e| e.to_string())
        .collect::<Vec<_>>();
    assert!(failures.is_empty(), "failed requests: {failures:?}");

    let likes = LikeRepositoryImpl::new(conn.clone());
    assert_eq!(likes.count(post.id).await.unwrap(), 40);
    let followers = FollowRepositoryImpl::new(conn.clone())
        .followers(author)
        .await
        .unwrap();
    assert_eq!(followers.len(), 40);
    let received = NotificationRepositoryImpl::new(conn)
        .list(author, ListingParams::new(0, 100))
        .await
        .unwrap();
    assert_eq!(received.total, 80);
}
