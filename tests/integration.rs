use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rendezvous_state::{
    AffiliateExport, Endpoint, Error, Maintenance, Notification, Registry, Service, StateConfig,
    WatchEvent,
};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{timeout, Instant};
use tracing::info;

const CLUSTER: &str = "0b6a3f4e-1c2d-4e5f-8a9b-0c1d2e3f4a5b";

fn key(byte: u8) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode([byte; 32])
}

fn ip(s: &str) -> Endpoint {
    Endpoint::Ip(s.parse::<IpAddr>().expect("valid ip"))
}

fn drain(rx: &mut mpsc::Receiver<Arc<Notification>>) -> Vec<Arc<Notification>> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

#[test_log::test(tokio::test)]
async fn test_cluster_lifecycle() {
    let registry = Registry::with_config(StateConfig::default().affiliate_ttl(Duration::from_secs(60)));
    let cluster = registry.get_or_create("C");

    let (early_tx, mut early_rx) = mpsc::channel(8);
    let (_, _early) = cluster.subscribe(early_tx);

    cluster.with_affiliate("A", |a| a.add_endpoints([ip("10.0.0.1")]));
    let created = drain(&mut early_rx);
    assert_eq!(created.len(), 1);
    assert_eq!(
        created[0].affiliate,
        Some(AffiliateExport {
            id: "A".into(),
            endpoints: vec![ip("10.0.0.1")],
        })
    );

    let (tx, mut rx) = mpsc::channel(8);
    let (snapshot, _subscription) = cluster.subscribe(tx);
    assert_eq!(
        snapshot,
        vec![AffiliateExport {
            id: "A".into(),
            endpoints: vec![ip("10.0.0.1")],
        }]
    );

    cluster.with_affiliate("A", |a| a.add_endpoints([ip("10.0.0.1")]));
    assert!(drain(&mut rx).is_empty(), "duplicate endpoint must not notify");

    cluster.delete_affiliate("A");
    let deleted = drain(&mut rx);
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].affiliate_id, "A");
    assert!(deleted[0].is_deletion());
    assert!(cluster.list().is_empty());

    assert!(cluster.garbage_collect(Instant::now() + Duration::from_secs(120)));
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_subscribe_sees_every_later_write_in_order() {
    let registry = Arc::new(Registry::new());
    registry.with_affiliate("c", "seed", |_| {});

    let writer = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            for i in 0..200u32 {
                registry.with_affiliate("c", &format!("w{i}"), |_| {});
                if i % 16 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };

    tokio::task::yield_now().await;
    let (tx, mut rx) = mpsc::channel(512);
    let (snapshot, _subscription) = registry.subscribe("c", tx);
    writer.await.expect("writer task");

    let mut seen: Vec<String> = snapshot.into_iter().map(|a| a.id).collect();
    let updates: Vec<String> = drain(&mut rx)
        .into_iter()
        .map(|n| n.affiliate_id.clone())
        .collect();
    info!(snapshot = seen.len(), updates = updates.len(), "subscribed mid-stream");

    // updates continue exactly where the snapshot stopped, in commit order
    let first_update = seen.len() - 1;
    let expected: Vec<String> = (first_update..200).map(|i| format!("w{i}")).collect();
    assert_eq!(updates, expected);

    seen.extend(updates);
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 201);
}

#[test_log::test(tokio::test)]
async fn test_service_watch_stream() -> anyhow::Result<()> {
    let service = Service::default();
    service.add_endpoints(CLUSTER, &key(1), vec![ip("10.0.0.1")])?;

    let mut watch = service.watch(CLUSTER)?;
    let first = timeout(Duration::from_secs(1), watch.next()).await?;
    match first {
        Some(Ok(WatchEvent::Snapshot(snapshot))) => assert_eq!(snapshot.len(), 1),
        other => anyhow::bail!("expected snapshot, got {other:?}"),
    }

    service.add_endpoints(CLUSTER, &key(2), vec![Endpoint::name("peer.example")])?;
    service.delete(CLUSTER, &key(1))?;

    let update = timeout(Duration::from_secs(1), watch.next()).await?;
    match update {
        Some(Ok(WatchEvent::Update(n))) => {
            assert_eq!(n.affiliate_id, key(2));
            assert!(!n.is_deletion());
        }
        other => anyhow::bail!("expected update, got {other:?}"),
    }

    let deletion = timeout(Duration::from_secs(1), watch.next()).await?;
    match deletion {
        Some(Ok(WatchEvent::Update(n))) => {
            assert_eq!(n.affiliate_id, key(1));
            assert!(n.is_deletion());
        }
        other => anyhow::bail!("expected deletion, got {other:?}"),
    }

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_watch_reports_slow_consumer() -> anyhow::Result<()> {
    let service = Service::new(StateConfig::default().subscription_buffer(2));
    let mut watch = service.watch(CLUSTER)?;
    assert!(matches!(watch.next().await, Some(Ok(WatchEvent::Snapshot(_)))));

    for b in 0..5 {
        service.add_endpoints(CLUSTER, &key(b), vec![ip("10.0.0.1")])?;
    }

    let err = watch.next().await;
    assert!(matches!(err, Some(Err(Error::Delivery(_)))));
    assert!(watch.next().await.is_none());
    Ok(())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_maintenance_reclaims_abandoned_clusters() -> anyhow::Result<()> {
    let config = StateConfig::default()
        .affiliate_ttl(Duration::from_secs(30 * 60))
        .gc_interval(Duration::from_secs(60 * 60));
    let service = Service::new(config);
    service.add_endpoints(CLUSTER, &key(1), vec![ip("10.0.0.1")])?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let mut maintenance = Maintenance::new(Arc::clone(service.registry()));
    maintenance.start(shutdown_tx.subscribe());

    tokio::time::sleep(Duration::from_secs(61 * 60)).await;
    assert_eq!(
        service.list(CLUSTER),
        Err(Error::ClusterNotFound(CLUSTER.to_string()))
    );

    // a new write brings the cluster back
    service.add_endpoints(CLUSTER, &key(1), vec![ip("10.0.0.2")])?;
    assert_eq!(service.list(CLUSTER)?.len(), 1);

    let _ = shutdown_tx.send(());
    maintenance.stop().await;
    Ok(())
}

#[test]
fn test_exported_shape() -> anyhow::Result<()> {
    let notification = Notification {
        affiliate_id: "A".into(),
        affiliate: Some(AffiliateExport {
            id: "A".into(),
            endpoints: vec![ip("10.0.0.1"), Endpoint::name("node.example")],
        }),
    };

    let json = serde_json::to_value(&notification)?;
    assert_eq!(
        json,
        serde_json::json!({
            "affiliate_id": "A",
            "affiliate": {
                "id": "A",
                "endpoints": [{"ip": "10.0.0.1"}, {"name": "node.example"}],
            },
        })
    );

    let deletion: Notification =
        serde_json::from_value(serde_json::json!({"affiliate_id": "A", "affiliate": null}))?;
    assert!(deletion.is_deletion());
    Ok(())
}
