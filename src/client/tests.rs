use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{ClientHandle, ClientId};
use crate::utils::error::DeliveryError;

const PATIENCE: Duration = Duration::from_millis(50);

#[test]
fn test_client_new() {
    let (tx, _) = mpsc::channel::<Arc<str>>(1);
    let client = ClientHandle::new(tx, CancellationToken::new());
    assert!(client.id().to_string().starts_with("client-"));
    assert!(!client.is_closed());
}

#[test]
fn test_client_ids_are_unique() {
    assert_ne!(ClientId::new(), ClientId::new());

    let (tx, _) = mpsc::channel::<Arc<str>>(1);
    let a = ClientHandle::new(tx.clone(), CancellationToken::new());
    let b = ClientHandle::new(tx, CancellationToken::new());
    assert_ne!(a, b);
    assert_eq!(a, a.clone());
}

#[tokio::test]
async fn test_deliver_queues_payload() {
    let (tx, mut rx) = mpsc::channel::<Arc<str>>(2);
    let client = ClientHandle::new(tx, CancellationToken::new());

    client.deliver(Arc::from("{}"), PATIENCE).await.unwrap();
    assert_eq!(&*rx.try_recv().unwrap(), "{}");
}

#[tokio::test]
async fn test_deliver_to_full_queue_times_out() {
    let (tx, _rx) = mpsc::channel::<Arc<str>>(1);
    let client = ClientHandle::new(tx, CancellationToken::new());

    client.deliver(Arc::from("{}"), PATIENCE).await.unwrap();
    assert_eq!(
        client.deliver(Arc::from("{}"), PATIENCE).await,
        Err(DeliveryError::Lagging)
    );
}

#[tokio::test]
async fn test_deliver_waits_for_room_in_queue() {
    let (tx, mut rx) = mpsc::channel::<Arc<str>>(1);
    let client = ClientHandle::new(tx, CancellationToken::new());
    client.deliver(Arc::from("first"), PATIENCE).await.unwrap();

    let reader = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        (first, second)
    });

    client
        .deliver(Arc::from("second"), Duration::from_secs(5))
        .await
        .unwrap();

    let (first, second) = reader.await.unwrap();
    assert_eq!(&*first, "first");
    assert_eq!(&*second, "second");
}

#[tokio::test]
async fn test_deliver_after_receiver_dropped() {
    let (tx, rx) = mpsc::channel::<Arc<str>>(1);
    let client = ClientHandle::new(tx, CancellationToken::new());
    drop(rx);

    assert_eq!(
        client.deliver(Arc::from("{}"), PATIENCE).await,
        Err(DeliveryError::Closed)
    );
}

#[tokio::test]
async fn test_deliver_after_disconnect() {
    let (tx, mut rx) = mpsc::channel::<Arc<str>>(4);
    let token = CancellationToken::new();
    let client = ClientHandle::new(tx, token.clone());

    client.disconnect();
    client.disconnect();

    assert!(token.is_cancelled());
    assert_eq!(
        client.deliver(Arc::from("{}"), PATIENCE).await,
        Err(DeliveryError::Closed)
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_disconnect_interrupts_pending_delivery() {
    let (tx, _rx) = mpsc::channel::<Arc<str>>(1);
    let client = ClientHandle::new(tx, CancellationToken::new());
    client.deliver(Arc::from("{}"), PATIENCE).await.unwrap();

    let waiting = {
        let client = client.clone();
        tokio::spawn(async move { client.deliver(Arc::from("{}"), Duration::from_secs(30)).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.disconnect();

    let outcome = tokio::time::timeout(Duration::from_secs(5), waiting)
        .await
        .expect("delivery kept waiting after disconnect")
        .unwrap();
    assert_eq!(outcome, Err(DeliveryError::Closed));
}
