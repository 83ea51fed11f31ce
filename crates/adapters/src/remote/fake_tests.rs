// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleetlog_core::OriginId;

fn record(seq: u64, payload: &str) -> Record {
    Record::new(
        OriginId::new("node-a").unwrap(),
        seq,
        seq,
        0,
        payload.as_bytes().to_vec(),
    )
}

#[tokio::test]
async fn fake_remote_put_is_idempotent() {
    let remote = FakeRemote::new("bucket");
    let records = vec![record(1, "a"), record(2, "b")];

    let first = remote.put(&records).await.unwrap();
    let second = remote.put(&records).await.unwrap();

    assert_eq!(first.stored, 2);
    assert_eq!(second.already_present, 2);
    assert_eq!(remote.records().len(), 2);
    assert_eq!(
        remote.calls(),
        vec![RemoteCall::Put { count: 2 }, RemoteCall::Put { count: 2 }]
    );
}

#[tokio::test]
async fn fake_remote_fetches_above_watermark() {
    let remote = FakeRemote::default();
    remote.insert(record(1, "a"));
    remote.insert(record(2, "b"));

    let after: Watermark = [(OriginId::new("node-a").unwrap(), 1)].into_iter().collect();
    let fetched = remote.fetch_after(&after).await.unwrap();

    assert_eq!(fetched.records, vec![record(2, "b")]);
    assert!(fetched.damaged.is_empty());
}

#[tokio::test]
async fn fake_remote_reports_damaged_objects_above_watermark() {
    let remote = FakeRemote::default();
    let origin = OriginId::new("node-a").unwrap();
    remote.insert_damaged(DamagedObject {
        object: "records/node-a/2".to_string(),
        id: Some(RecordId::new(origin.clone(), 2)),
        reason: "crc mismatch".to_string(),
    });

    let below: Watermark = [(origin.clone(), 1)].into_iter().collect();
    let past: Watermark = [(origin, 2)].into_iter().collect();

    assert_eq!(remote.fetch_after(&below).await.unwrap().damaged.len(), 1);
    assert!(remote.fetch_after(&past).await.unwrap().damaged.is_empty());
}

#[tokio::test]
async fn fake_remote_injected_failures_are_transient_then_clear() {
    let remote = FakeRemote::default();
    remote.fail_next(2);

    assert!(remote.acknowledged().await.unwrap_err().is_transient());
    assert!(remote.acknowledged().await.unwrap_err().is_transient());
    assert!(remote.acknowledged().await.is_ok());
}

#[tokio::test]
async fn fake_remote_permanent_failure_is_not_transient() {
    let remote = FakeRemote::default();
    remote.set_permanent_failure(Some("quota exceeded"));

    let err = remote.put(&[record(1, "a")]).await.unwrap_err();
    assert!(!err.is_transient());
    assert!(err.to_string().contains("quota exceeded"));
}

#[tokio::test]
async fn fake_remote_acknowledgements_join() {
    let remote = FakeRemote::default();
    let a = OriginId::new("a").unwrap();
    let b = OriginId::new("b").unwrap();

    remote
        .acknowledge(&[(a.clone(), 5)].into_iter().collect())
        .await
        .unwrap();
    remote
        .acknowledge(&[(a.clone(), 2), (b.clone(), 1)].into_iter().collect())
        .await
        .unwrap();

    let acked = remote.acknowledged().await.unwrap();
    assert_eq!(acked.get(&a), 5);
    assert_eq!(acked.get(&b), 1);
}
