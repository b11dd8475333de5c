//! In-process overlay simulation
//!
//! Spins up a set of peers, each with its own peer map, ledger and
//! replication coordinator, fully meshed in memory. Membership churn is
//! delivered through each peer's map, request handling is modelled by
//! periodic sweeps of `check_responsibility` over every key, and the run ends
//! by checking that every ledger names the truly closest peer.

use crate::common::{pluralize, LedgerBackend, LedgerConfig, Number160, Result, SimulationConfig};
use crate::peers::{close_peers_in, PeerAddress, PeerMap};
use crate::replication::{EventRecorder, LoggingListener, Replication, ResponsibilityEvent};
use crate::storage::{open_ledger, MemoryLedger, ResponsibilityLedger};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct SimulatedPeer {
    pub address: PeerAddress,
    pub peer_map: Arc<PeerMap>,
    pub replication: Arc<Replication>,
    pub events: Arc<EventRecorder>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationReport {
    pub peers_online: usize,
    pub keys: usize,
    pub joins: usize,
    pub leaves: usize,
    pub sweeps: usize,
    pub me_responsible: usize,
    pub other_responsible: usize,
    pub converged_entries: usize,
    pub divergent_entries: usize,
}

impl SimulationReport {
    pub fn converged(&self) -> bool {
        self.divergent_entries == 0
    }

    fn count(&mut self, events: Vec<ResponsibilityEvent>) {
        for event in events {
            match event {
                ResponsibilityEvent::MeResponsible { .. } => self.me_responsible += 1,
                ResponsibilityEvent::OtherResponsible { .. } => self.other_responsible += 1,
            }
        }
    }
}

pub struct Simulation {
    config: SimulationConfig,
    ledger: LedgerConfig,
    rng: StdRng,
    peers: Vec<SimulatedPeer>,
    keys: Vec<Number160>,
    spawned: usize,
    report: SimulationReport,
}

impl Simulation {
    pub fn new(config: SimulationConfig, ledger: LedgerConfig) -> Result<Self> {
        config.validate()?;
        ledger.validate()?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let keys = (0..config.keys).map(|_| Number160::random(&mut rng)).collect();

        Ok(Self {
            config,
            ledger,
            rng,
            peers: Vec::new(),
            keys,
            spawned: 0,
            report: SimulationReport::default(),
        })
    }

    pub fn peers(&self) -> &[SimulatedPeer] {
        &self.peers
    }

    pub fn keys(&self) -> &[Number160] {
        &self.keys
    }

    fn open_peer_ledger(&self, index: usize) -> Result<Arc<dyn ResponsibilityLedger>> {
        match self.ledger.backend {
            LedgerBackend::Memory => Ok(Arc::new(MemoryLedger::new())),
            LedgerBackend::RocksDb => open_ledger(&LedgerConfig {
                path: self.ledger.path.join(format!("peer-{}", index)),
                ..self.ledger.clone()
            }),
        }
    }

    fn spawn_peer(&mut self) -> Result<SimulatedPeer> {
        let index = self.spawned;
        self.spawned += 1;

        let id = Number160::random(&mut self.rng);
        let port = 4000 + (index % 60_000) as u16;
        let address = PeerAddress::new(id, SocketAddr::from(([127, 0, 0, 1], port)));

        let peer_map = Arc::new(PeerMap::new(id));
        let replication = Replication::new(
            self.open_peer_ledger(index)?,
            Some(address.clone()),
            Some(peer_map.clone()),
        );
        let events = Arc::new(EventRecorder::new());
        replication.add_listener(events.clone());
        replication.add_listener(Arc::new(LoggingListener::new(id)));

        Ok(SimulatedPeer {
            address,
            peer_map,
            replication,
            events,
        })
    }

    /// Bring a new peer online and introduce it to every online peer
    pub fn join(&mut self) -> Result<Number160> {
        let joined = self.spawn_peer()?;
        for peer in &self.peers {
            joined.peer_map.peer_found(peer.address.clone())?;
            peer.peer_map.peer_found(joined.address.clone())?;
        }

        let id = joined.address.id;
        tracing::debug!(peer = %joined.address, "peer joined");
        self.peers.push(joined);
        self.report.joins += 1;
        Ok(id)
    }

    /// Take a random peer offline. The last peer never leaves.
    pub fn leave(&mut self) -> Result<Option<Number160>> {
        if self.peers.len() <= 1 {
            return Ok(None);
        }

        let index = self.rng.gen_range(0..self.peers.len());
        let departed = self.peers.swap_remove(index);
        self.report.count(departed.events.drain());

        for peer in &self.peers {
            peer.peer_map.peer_failed(&departed.address.id)?;
        }

        tracing::debug!(peer = %departed.address, "peer left");
        self.report.leaves += 1;
        Ok(Some(departed.address.id))
    }

    /// Every online peer handles a request for every key
    pub fn sweep(&mut self) -> Result<()> {
        for peer in &self.peers {
            for key in &self.keys {
                peer.replication.check_responsibility(key)?;
            }
        }
        self.report.sweeps += 1;
        Ok(())
    }

    /// Compare every ledger entry against the closest peer in that peer's view.
    /// Returns `(converged, divergent)` entry counts.
    pub fn verify(&self) -> Result<(usize, usize)> {
        let mut converged = 0;
        let mut divergent = 0;

        for peer in &self.peers {
            let mut members = peer.peer_map.all();
            members.push(peer.address.clone());

            for key in &self.keys {
                let expected = close_peers_in(key, 1, &members)
                    .first()
                    .map(|p| p.id)
                    .unwrap_or(peer.address.id);
                let recorded = peer.replication.ledger().find_responsible_peer(key)?;
                if recorded == Some(expected) {
                    converged += 1;
                } else {
                    divergent += 1;
                    tracing::warn!(
                        node = %peer.address.id,
                        key = %key,
                        ?recorded,
                        %expected,
                        "ledger diverged"
                    );
                }
            }
        }

        Ok((converged, divergent))
    }

    pub fn run(mut self) -> Result<SimulationReport> {
        tracing::info!(
            "Simulating {} with {} and {} of churn",
            pluralize(self.config.peers, "peer"),
            pluralize(self.keys.len(), "key"),
            pluralize(self.config.churn_rounds, "round")
        );

        for _ in 0..self.config.peers {
            self.join()?;
        }
        self.sweep()?;

        for round in 1..=self.config.churn_rounds {
            if self.rng.gen_bool(0.5) {
                self.join()?;
            } else {
                self.leave()?;
            }
            if self.config.sweep_every > 0 && round % self.config.sweep_every == 0 {
                self.sweep()?;
            }
        }
        self.sweep()?;

        let (converged, divergent) = self.verify()?;
        let mut report = std::mem::take(&mut self.report);
        for peer in &self.peers {
            report.count(peer.events.drain());
        }
        report.peers_online = self.peers.len();
        report.keys = self.keys.len();
        report.converged_entries = converged;
        report.divergent_entries = divergent;

        tracing::info!(
            "Simulation finished: {} online, {} divergent",
            pluralize(report.peers_online, "peer"),
            pluralize(report.divergent_entries, "entry")
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u64) -> SimulationConfig {
        SimulationConfig {
            peers: 5,
            keys: 40,
            churn_rounds: 10,
            sweep_every: 0,
            seed,
        }
    }

    #[test]
    fn test_join_meshes_peers() {
        let mut sim = Simulation::new(small_config(1), LedgerConfig::default()).unwrap();
        sim.join().unwrap();
        sim.join().unwrap();
        sim.join().unwrap();

        for peer in sim.peers() {
            assert_eq!(peer.peer_map.len(), 2);
            // Event recorder plus transition log
            assert_eq!(peer.replication.listener_count(), 2);
        }
    }

    #[test]
    fn test_last_peer_never_leaves() {
        let mut sim = Simulation::new(small_config(2), LedgerConfig::default()).unwrap();
        sim.join().unwrap();
        assert_eq!(sim.leave().unwrap(), None);
        assert_eq!(sim.peers().len(), 1);
    }

    #[test]
    fn test_run_converges() {
        let sim = Simulation::new(small_config(3), LedgerConfig::default()).unwrap();
        let report = sim.run().unwrap();
        assert!(report.converged());
        assert_eq!(report.converged_entries, report.peers_online * report.keys);
        assert!(report.me_responsible > 0);
    }
}
