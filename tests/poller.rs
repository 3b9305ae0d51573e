//! Poller lifecycle tests against a local feed server.

mod common;

use std::time::Duration;

use common::{create_feed, rss_document, setup_db, test_fetcher, wait_until, FeedServer, Item};
use rssy::{Poller, PollerStatus, PostRepository, RssyError};

#[tokio::test]
async fn test_start_fetches_immediately() {
    let server = FeedServer::start().await;
    server.set_document("news", rss_document("News", &[Item::new("a", "A")]));

    let db = setup_db().await;
    let feed = create_feed(&db, "News", &server.feed_url("news")).await;
    let poller = Poller::with_fetcher(test_fetcher(&db), Duration::from_secs(3600));

    poller.start().unwrap();
    assert!(wait_until(|| server.hits("news") >= 1).await);

    poller.stop();
    poller.join().await;

    assert_eq!(poller.cycles_started(), 1);
    assert_eq!(server.hits("news"), 1);
    let posts = PostRepository::new(db.pool());
    assert_eq!(posts.count_by_feed(feed.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_polls_on_interval_until_stopped() {
    let server = FeedServer::start().await;
    server.set_document("news", rss_document("News", &[Item::new("a", "A")]));

    let db = setup_db().await;
    create_feed(&db, "News", &server.feed_url("news")).await;
    let poller = Poller::with_fetcher(test_fetcher(&db), Duration::from_millis(50));

    poller.start().unwrap();
    assert!(wait_until(|| server.hits("news") >= 3).await);

    poller.stop();
    poller.join().await;
    assert_eq!(poller.status(), PollerStatus::Stopped);

    let cycles = poller.cycles_started();
    let hits = server.hits("news");
    assert!(cycles >= 3);

    // Several intervals later, nothing new has started
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(poller.cycles_started(), cycles);
    assert_eq!(server.hits("news"), hits);
}

#[tokio::test]
async fn test_stop_during_cycle_lets_it_finish() {
    let server = FeedServer::start().await;
    server.set_document("slow", rss_document("Slow", &[Item::new("s", "S")]));
    server.set_document("news", rss_document("News", &[Item::new("a", "A")]));

    let db = setup_db().await;
    // Fetched in registration order: the slow feed first
    let slow = create_feed(
        &db,
        "Slow",
        &server.slow_url("slow", Duration::from_millis(500)),
    )
    .await;
    let news = create_feed(&db, "News", &server.feed_url("news")).await;
    let poller = Poller::with_fetcher(test_fetcher(&db), Duration::from_millis(50));

    poller.start().unwrap();
    assert!(wait_until(|| server.hits("slow") >= 1).await);

    // First cycle is waiting on the slow feed
    poller.stop();
    assert_eq!(poller.cycles_started(), 1);
    assert_eq!(server.hits("news"), 0);

    poller.join().await;

    // The in-flight cycle ran to completion
    let posts = PostRepository::new(db.pool());
    assert_eq!(posts.count_by_feed(slow.id).await.unwrap(), 1);
    assert_eq!(posts.count_by_feed(news.id).await.unwrap(), 1);

    // and no further cycle began
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(poller.cycles_started(), 1);
    assert_eq!(server.hits("slow"), 1);
    assert_eq!(server.hits("news"), 1);
}

#[tokio::test]
async fn test_poller_survives_failing_feeds() {
    let server = FeedServer::start().await;

    let db = setup_db().await;
    create_feed(&db, "Broken", &server.error_url()).await;
    let poller = Poller::with_fetcher(test_fetcher(&db), Duration::from_millis(30));

    poller.start().unwrap();
    assert!(wait_until(|| poller.cycles_started() >= 3).await);
    assert_eq!(poller.status(), PollerStatus::Running);

    poller.stop();
    poller.join().await;
}

#[tokio::test]
async fn test_double_start_is_rejected() {
    let db = setup_db().await;
    let poller = Poller::new(db, Duration::from_secs(3600)).unwrap();

    poller.start().unwrap();
    let err = poller.start().unwrap_err();
    assert!(matches!(err, RssyError::Poller(_)));

    poller.stop();
    poller.stop();
    poller.join().await;
    assert_eq!(poller.status(), PollerStatus::Stopped);
}

#[tokio::test]
async fn test_manual_refresh_while_running() {
    let server = FeedServer::start().await;
    server.set_document("news", rss_document("News", &[Item::new("a", "A")]));

    let db = setup_db().await;
    let feed = create_feed(&db, "News", &server.feed_url("news")).await;
    let poller = Poller::with_fetcher(test_fetcher(&db), Duration::from_secs(3600));
    poller.start().unwrap();

    server.set_document(
        "news",
        rss_document("News", &[Item::new("a", "A"), Item::new("b", "B")]),
    );
    poller.fetcher().refresh_feed(feed.id).await.unwrap();

    poller.stop();
    poller.join().await;

    let posts = PostRepository::new(db.pool());
    assert_eq!(posts.count_by_feed(feed.id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_dropping_running_poller_stops_it() {
    let server = FeedServer::start().await;
    server.set_document("news", rss_document("News", &[Item::new("a", "A")]));

    let db = setup_db().await;
    create_feed(&db, "News", &server.feed_url("news")).await;
    let poller = Poller::with_fetcher(test_fetcher(&db), Duration::from_millis(20));
    poller.start().unwrap();
    assert!(wait_until(|| server.hits("news") >= 1).await);

    drop(poller);
    // Let an in-flight cycle finish
    tokio::time::sleep(Duration::from_millis(200)).await;
    let hits = server.hits("news");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.hits("news"), hits);
}
