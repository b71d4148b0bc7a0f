// Portfolio module - aggregation of positions and point-in-time snapshots

pub mod aggregator;
pub mod snapshot;

pub use aggregator::{build_summary, PortfolioSummary};
pub use snapshot::{build_snapshot, SnapshotRequest};
