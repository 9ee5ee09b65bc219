mod common;

use common::{address, board_on, memory_board, wallet, SlowStore, StubMetadata};
use std::sync::Arc;
use std::time::Duration;
use token_vote_board::error::Error;
use token_vote_board::models::VoteType;
use tokio::time::timeout;

const QUIET: Duration = Duration::from_millis(150);
const DELIVERY: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_first_delivery_is_immediate_snapshot() {
    let (_store, board) = memory_board();
    let existing = board.submit(&wallet(), &address()).await.unwrap();

    let mut subscription = board.subscribe_tokens();
    let snapshot = timeout(DELIVERY, subscription.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].address, existing.address);
}

#[tokio::test]
async fn test_each_write_produces_full_snapshot() {
    let (_store, board) = memory_board();
    let mut subscription = board.subscribe_tokens();
    assert!(subscription.next().await.unwrap().unwrap().is_empty());

    let listing = board.submit(&wallet(), &address()).await.unwrap();
    let snapshot = timeout(DELIVERY, subscription.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(snapshot.len(), 1);

    board.vote(&wallet(), &listing.address, VoteType::Bullish).await.unwrap();
    let snapshot = timeout(DELIVERY, subscription.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(snapshot[0].buy_votes, 1);
}

#[tokio::test]
async fn test_resubscribe_delivers_current_state() {
    let (_store, board) = memory_board();
    let mut first = board.subscribe_tokens();
    assert!(first.next().await.unwrap().unwrap().is_empty());
    first.unsubscribe();

    let a = board.submit(&wallet(), &address()).await.unwrap();
    let b = board.submit(&wallet(), &address()).await.unwrap();
    board.vote(&wallet(), &a.address, VoteType::Bearish).await.unwrap();

    let mut second = board.subscribe_tokens();
    let snapshot = timeout(DELIVERY, second.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(snapshot.len(), 2);
    let voted = snapshot.iter().find(|l| l.address == a.address).unwrap();
    assert_eq!(voted.bye_votes, 1);
    assert!(snapshot.iter().any(|l| l.address == b.address));
}

#[tokio::test]
async fn test_single_token_skips_unchanged_counters() {
    let (_store, board) = memory_board();
    let listing = board.submit(&wallet(), &address()).await.unwrap();

    let mut subscription = board.subscribe_token(&listing.address).await.unwrap();
    let initial = subscription.next().await.unwrap().unwrap();
    assert_eq!(initial.total(), 0);

    // Another listing changes the collection but not these counters.
    board.submit(&wallet(), &address()).await.unwrap();
    assert!(timeout(QUIET, subscription.next()).await.is_err());

    board.vote(&wallet(), &listing.address, VoteType::Bullish).await.unwrap();
    let counts = timeout(DELIVERY, subscription.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(counts.buy_votes, 1);
    assert_eq!(counts.bye_votes, 0);
}

#[tokio::test]
async fn test_single_token_subscription_requires_listing() {
    let (_store, board) = memory_board();
    let err = board.subscribe_token(&address()).await.unwrap_err();
    assert!(matches!(err, Error::TokenNotFound(_)));
}

const SLOW_READ: Duration = Duration::from_millis(200);
const CANCEL_AFTER: Duration = Duration::from_millis(20);

#[tokio::test]
async fn test_cancelled_read_is_delivered_on_next_call() {
    let store = Arc::new(SlowStore::new());
    let board = board_on(store.clone(), StubMetadata::Unknown);
    let mut subscription = board.subscribe_tokens();
    assert!(subscription.next().await.unwrap().unwrap().is_empty());

    board.submit(&wallet(), &address()).await.unwrap();
    store.set_read_delay(SLOW_READ);

    // Dropped while the snapshot read is in flight.
    assert!(timeout(CANCEL_AFTER, subscription.next()).await.is_err());

    let snapshot = timeout(DELIVERY, subscription.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(snapshot.len(), 1);
}

#[tokio::test]
async fn test_cancelled_first_read_still_delivers_current_state() {
    let store = Arc::new(SlowStore::new());
    let board = board_on(store.clone(), StubMetadata::Unknown);
    board.submit(&wallet(), &address()).await.unwrap();

    let mut subscription = board.subscribe_tokens();
    store.set_read_delay(SLOW_READ);
    assert!(timeout(CANCEL_AFTER, subscription.next()).await.is_err());

    let snapshot = timeout(DELIVERY, subscription.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(snapshot.len(), 1);
}

#[tokio::test]
async fn test_cancelled_counter_read_is_delivered_on_next_call() {
    let store = Arc::new(SlowStore::new());
    let board = board_on(store.clone(), StubMetadata::Unknown);
    let listing = board.submit(&wallet(), &address()).await.unwrap();

    let mut subscription = board.subscribe_token(&listing.address).await.unwrap();
    assert_eq!(subscription.next().await.unwrap().unwrap().total(), 0);

    board.vote(&wallet(), &listing.address, VoteType::Bearish).await.unwrap();
    store.set_read_delay(SLOW_READ);
    assert!(timeout(CANCEL_AFTER, subscription.next()).await.is_err());

    let counts = timeout(DELIVERY, subscription.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(counts.bye_votes, 1);
}

#[tokio::test]
async fn test_comment_stream_follows_one_thread() {
    let (_store, board) = memory_board();
    let watched = board.submit(&wallet(), &address()).await.unwrap();
    let other = board.submit(&wallet(), &address()).await.unwrap();

    let mut subscription = board.subscribe_comments(&watched.address).await.unwrap();
    assert!(subscription.next().await.unwrap().unwrap().is_empty());

    board.comment(&wallet(), &other.address, "elsewhere").await.unwrap();
    assert!(timeout(QUIET, subscription.next()).await.is_err());

    board.comment(&wallet(), &watched.address, "gm").await.unwrap();
    let comments = timeout(DELIVERY, subscription.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].content, "gm");
}

#[tokio::test]
async fn test_comment_stream_requires_listing() {
    let (_store, board) = memory_board();
    let err = board.subscribe_comments(&address()).await.unwrap_err();
    assert!(matches!(err, Error::TokenNotFound(_)));
}
