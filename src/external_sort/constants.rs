pub const DEFAULT_BATCH_SIZE: usize = 1_000_000;
pub const DEFAULT_MEMORY_USAGE_PERCENT: f64 = 25.0;
pub const DEFAULT_IO_BUFFER_SIZE_KB: usize = 64;
pub const DEFAULT_MERGE_PROGRESS_INTERVAL_SECONDS: u64 = 10;

pub const MIN_MEMORY_USAGE_PERCENT: f64 = 1.0;
pub const MAX_MEMORY_USAGE_PERCENT: f64 = 90.0;
pub const MIN_IO_BUFFER_SIZE_KB: usize = 4;
pub const MAX_IO_BUFFER_SIZE_KB: usize = 65_536;
pub const MAX_BATCH_SIZE: usize = 500_000_000;

// "k,v,0\n" is the shortest line that still decodes.
pub const MIN_RECORD_WIDTH: usize = 6;

pub const BYTES_PER_KB: usize = 1024;
pub const BYTES_PER_MB: usize = 1024 * 1024;

pub const CHUNK_FILE_PREFIX: &str = "chunk_";
pub const CHUNK_FILE_EXTENSION: &str = ".csv";
// Partitions live in this subdirectory of the configured temp directory so
// the stale-partition sweep never touches files it did not create.
pub const PARTITION_DIR_NAME: &str = "skudex_partitions";

pub const FIELD_SEPARATOR: char = ',';
pub const LINE_TERMINATOR: u8 = b'\n';
pub const RECORD_FIELD_COUNT: usize = 3;

// In-memory cost of one buffered record on top of its text, used when the
// batch size is derived from available memory.
pub const ESTIMATED_RECORD_OVERHEAD_BYTES: usize = 48;
pub const ESTIMATED_RECORD_TEXT_BYTES: usize = 64;

pub const MERGE_HEAP_INITIAL_CAPACITY: usize = 1024;
pub const MAX_PREALLOCATED_RECORDS: usize = 65_536;
pub const OUTPUT_BUFFER_SIZE_KB: usize = 512;
