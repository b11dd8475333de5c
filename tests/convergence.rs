//! Property tests: random request/membership sequences against one peer

use minidht::peers::{close_peers_in, PeerAddress, PeerMap};
use minidht::replication::{EventRecorder, Replication, ResponsibilityEvent};
use minidht::storage::{MemoryLedger, ResponsibilityLedger};
use minidht::Number160;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const SELF_ID: u64 = 7;
const KEYS: u64 = 6;

#[derive(Debug, Clone)]
enum Op {
    Join(u64),
    Leave(u64),
    Check(u64),
    Candidate(u64, u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u64..16).prop_map(Op::Join),
        (1u64..16).prop_map(Op::Leave),
        (0..KEYS).prop_map(Op::Check),
        ((0..KEYS), (1u64..16)).prop_map(|(k, p)| Op::Candidate(k, p)),
    ]
}

fn peer(id: u64) -> PeerAddress {
    let addr = format!("127.0.0.1:{}", 4000 + id).parse().unwrap();
    PeerAddress::new(Number160::from_u64(id), addr)
}

fn key(k: u64) -> Number160 {
    Number160::from_u64(k * 5 + 1)
}

struct Harness {
    me: PeerAddress,
    peer_map: Arc<PeerMap>,
    ledger: Arc<MemoryLedger>,
    replication: Arc<Replication>,
    events: Arc<EventRecorder>,
}

impl Harness {
    fn new() -> Self {
        let me = peer(SELF_ID);
        let peer_map = Arc::new(PeerMap::new(me.id));
        let ledger = Arc::new(MemoryLedger::new());
        let replication =
            Replication::new(ledger.clone(), Some(me.clone()), Some(peer_map.clone()));
        let events = Arc::new(EventRecorder::new());
        replication.add_listener(events.clone());
        Self {
            me,
            peer_map,
            ledger,
            replication,
            events,
        }
    }

    fn apply(&self, op: &Op) {
        match op {
            Op::Join(id) => {
                self.peer_map.peer_found(peer(*id)).unwrap();
            }
            Op::Leave(id) => {
                self.peer_map.peer_failed(&Number160::from_u64(*id)).unwrap();
            }
            Op::Check(k) => self.replication.check_responsibility(&key(*k)).unwrap(),
            Op::Candidate(k, p) => self
                .replication
                .consider_candidate(&key(*k), &Number160::from_u64(*p))
                .unwrap(),
        }
    }

    fn recorded(&self) -> HashMap<Number160, Number160> {
        (0..KEYS)
            .filter_map(|k| {
                self.ledger
                    .find_responsible_peer(&key(k))
                    .unwrap()
                    .map(|p| (key(k), p))
            })
            .collect()
    }

    fn closest(&self, key: &Number160) -> Number160 {
        let mut members = self.peer_map.all();
        members.push(self.me.clone());
        close_peers_in(key, 1, &members)[0].id
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Every notification matches a real ledger change, once per key per step
    #[test]
    fn notifications_match_ledger_changes(ops in prop::collection::vec(op(), 1..60)) {
        let h = Harness::new();

        for op in &ops {
            let before = h.recorded();
            h.apply(op);
            let after = h.recorded();
            let events = h.events.drain();

            if matches!(op, Op::Candidate(..)) {
                prop_assert!(events.is_empty());
            }

            let mut seen = HashSet::new();
            for event in &events {
                let key = *event.key();
                prop_assert!(seen.insert(key), "duplicate notification for {:?}", key);
                prop_assert_ne!(before.get(&key), after.get(&key));
                prop_assert_eq!(after.get(&key), Some(&event.responsible_id(&h.me.id)));
                if let ResponsibilityEvent::OtherResponsible { peer, .. } = event {
                    prop_assert_ne!(peer.id, h.me.id);
                }
            }
        }
    }

    /// The local peer never keeps a key someone closer has joined for
    #[test]
    fn self_ownership_is_never_stale(ops in prop::collection::vec(op(), 1..60)) {
        let h = Harness::new();

        for op in &ops {
            h.apply(op);
            for (key, owner) in h.recorded() {
                if owner == h.me.id {
                    prop_assert_eq!(h.closest(&key), h.me.id);
                }
            }
        }
    }

    /// After a request for every key, every entry names the closest member
    #[test]
    fn request_sweep_converges(ops in prop::collection::vec(op(), 0..60)) {
        let h = Harness::new();
        for op in &ops {
            h.apply(op);
        }

        for k in 0..KEYS {
            h.replication.check_responsibility(&key(k)).unwrap();
        }
        h.events.drain();

        for k in 0..KEYS {
            let expected = h.closest(&key(k));
            prop_assert_eq!(h.ledger.find_responsible_peer(&key(k)).unwrap(), Some(expected));
        }

        // A second sweep is silent
        for k in 0..KEYS {
            h.replication.check_responsibility(&key(k)).unwrap();
        }
        prop_assert!(h.events.is_empty());
    }
}
