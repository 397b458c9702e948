//! Default values shared between cli settings and their validators
//!

/// Min MAPQ for reads entering a group read store
pub const MIN_EXTRACT_MAPQ: u32 = 20;

/// Min MAPQ for consensus records kept after window realignment
pub const MIN_REALIGN_MAPQ: u8 = 30;

/// Min MAPQ for records kept after the post-alt remap
pub const MIN_REMAP_MAPQ: u8 = 20;

/// Wall-clock limit on one region's assembler run
pub const ASSEMBLY_TIMEOUT_SECS: u64 = 1800;

pub const ASSEMBLY_MIN_READ_LENGTH: u32 = 1000;
pub const ASSEMBLY_PARTITION_COUNT: u32 = 2;
pub const ASSEMBLY_MIN_COVERAGE: u32 = 3;

/// Flank added on each side of the candidate region to form the realignment window
pub const REALIGN_WINDOW_FLANK: i64 = 5000;
