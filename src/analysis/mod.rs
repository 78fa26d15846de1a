mod poller;
mod tracker;

#[cfg(test)]
mod tests;

pub use poller::{AnalysisPoller, StatusStream, DEFAULT_POLL_INTERVAL};
pub use tracker::{validate_upload, AnalysisTracker};
