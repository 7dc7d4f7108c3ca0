pub mod buffer;
pub mod schema;
pub mod acquisition;
pub mod structuring;
pub mod enrichment;
pub mod processor;
pub mod diagnostic; // Per-stage buffer snapshots (SHELFSCAN_DUMP_DIR)
