//! End-to-end churn simulation

use minidht::common::{LedgerBackend, LedgerConfig, SimulationConfig};
use minidht::sim::Simulation;
use tempfile::TempDir;

#[test]
fn churn_with_periodic_sweeps_converges() {
    let config = SimulationConfig {
        peers: 12,
        keys: 120,
        churn_rounds: 30,
        sweep_every: 5,
        seed: 42,
    };

    let report = Simulation::new(config, LedgerConfig::default())
        .unwrap()
        .run()
        .unwrap();

    assert!(report.converged());
    assert!(report.joins >= 12);
    assert!(report.joins + report.leaves <= 12 + 30);
    assert_eq!(report.sweeps, 1 + 30 / 5 + 1);
    assert!(report.other_responsible > 0);
}

#[test]
fn simulation_over_rocksdb() {
    let dir = TempDir::new().unwrap();
    let ledger = LedgerConfig {
        backend: LedgerBackend::RocksDb,
        path: dir.path().to_path_buf(),
        stripes: 4,
    };
    let config = SimulationConfig {
        peers: 4,
        keys: 30,
        churn_rounds: 6,
        sweep_every: 0,
        seed: 9,
    };

    let report = Simulation::new(config, ledger).unwrap().run().unwrap();
    assert!(report.converged());
    assert_eq!(report.converged_entries, report.peers_online * 30);
}

#[test]
fn same_seed_same_report() {
    let config = SimulationConfig {
        peers: 6,
        keys: 50,
        churn_rounds: 10,
        sweep_every: 3,
        seed: 1234,
    };

    let a = Simulation::new(config.clone(), LedgerConfig::default())
        .unwrap()
        .run()
        .unwrap();
    let b = Simulation::new(config, LedgerConfig::default())
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}
