//! Concurrent callers racing on the same keys

use minidht::peers::{PeerAddress, PeerMap};
use minidht::replication::{EventRecorder, Replication, ResponsibilityEvent};
use minidht::storage::{MemoryLedger, ResponsibilityLedger, RocksLedger};
use minidht::Number160;
use std::sync::{Arc, Barrier};
use tempfile::TempDir;

const THREADS: usize = 16;

fn peer(id: u64) -> PeerAddress {
    let addr = format!("127.0.0.1:{}", 4000 + id % 1000).parse().unwrap();
    PeerAddress::new(Number160::from_u64(id), addr)
}

fn race_checks(
    ledger: Arc<dyn ResponsibilityLedger>,
    keys: &[Number160],
) -> Vec<ResponsibilityEvent> {
    let me = peer(10);
    let peer_map = Arc::new(PeerMap::new(me.id));
    peer_map.peer_found(peer(3)).unwrap();
    peer_map.peer_found(peer(1 << 20)).unwrap();

    let replication = Replication::new(ledger, Some(me), Some(peer_map));
    let events = Arc::new(EventRecorder::new());
    replication.add_listener(events.clone());

    let barrier = Barrier::new(THREADS);
    std::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                barrier.wait();
                for key in keys {
                    replication.check_responsibility(key).unwrap();
                }
            });
        }
    });

    events.events()
}

#[test]
fn concurrent_checks_notify_once() {
    let key = Number160::ZERO;
    let events = race_checks(Arc::new(MemoryLedger::new()), &[key]);

    assert_eq!(
        events,
        vec![ResponsibilityEvent::OtherResponsible { key, peer: peer(3) }]
    );
}

#[test]
fn concurrent_checks_across_many_keys() {
    let keys: Vec<Number160> = (0..200)
        .map(|i| Number160::from_key(&format!("key-{}", i)))
        .collect();
    let ledger = Arc::new(MemoryLedger::new());
    let events = race_checks(ledger.clone(), &keys);

    // One notification per key, whoever wins it
    assert_eq!(events.len(), keys.len());
    let mut notified: Vec<Number160> = events.iter().map(|e| *e.key()).collect();
    notified.sort();
    notified.dedup();
    assert_eq!(notified.len(), keys.len());
    assert_eq!(ledger.len(), keys.len());
}

#[test]
fn concurrent_checks_on_rocks_ledger() {
    let dir = TempDir::new().unwrap();
    let ledger = Arc::new(RocksLedger::open(dir.path().join("ledger"), 8).unwrap());
    let keys: Vec<Number160> = (0..50).map(Number160::from_u64).collect();

    let events = race_checks(ledger, &keys);
    assert_eq!(events.len(), keys.len());
}

#[test]
fn concurrent_membership_and_requests() {
    let me = peer(10);
    let peer_map = Arc::new(PeerMap::new(me.id));
    let ledger = Arc::new(MemoryLedger::new());
    let replication = Replication::new(ledger.clone(), Some(me.clone()), Some(peer_map.clone()));
    let events = Arc::new(EventRecorder::new());
    replication.add_listener(events.clone());

    let keys: Vec<Number160> = (0..64).map(|i| Number160::from_u64(i * 7)).collect();

    std::thread::scope(|s| {
        s.spawn(|| {
            for id in [3u64, 5, 12, 40] {
                peer_map.peer_found(peer(id)).unwrap();
            }
            peer_map.peer_failed(&Number160::from_u64(5)).unwrap();
        });
        for _ in 0..4 {
            s.spawn(|| {
                for key in &keys {
                    replication.check_responsibility(key).unwrap();
                }
            });
        }
    });

    // Requests arriving after the churn settle every key
    for key in &keys {
        replication.check_responsibility(key).unwrap();
    }

    let members: Vec<PeerAddress> = std::iter::once(me.clone()).chain(peer_map.all()).collect();
    for key in &keys {
        let expected = minidht::peers::close_peers_in(key, 1, &members)[0].id;
        assert_eq!(ledger.find_responsible_peer(key).unwrap(), Some(expected));
    }

    // Every key's first assignment was announced
    let mut notified: Vec<Number160> = events.events().iter().map(|e| *e.key()).collect();
    notified.sort();
    notified.dedup();
    assert_eq!(notified.len(), keys.len());
}
