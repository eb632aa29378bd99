//! Hard limits enforced by the store and the domain managers.

/// Max segments in a document path (`a/b/c/d/e/f`).
pub const MAX_PATH_DEPTH: usize = 12;

/// Max bytes in a single path segment.
pub const MAX_SEGMENT_LEN: usize = 256;

/// Max bytes of a document's JSON encoding.
pub const MAX_DOCUMENT_BYTES: usize = 1 << 20;

/// Max document writes in one commit.
pub const MAX_WRITES_PER_COMMIT: usize = 500;

/// Optimistic transactions are re-run at most this many times on conflict.
pub const MAX_TXN_ATTEMPTS: usize = 5;

/// Snapshots buffered per subscription before the producer waits.
pub const SUBSCRIPTION_BUFFER: usize = 16;

/// Max documents written per WAL record when compacting.
pub const COMPACT_CHUNK: usize = 256;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_NOTES_LEN: usize = 2_000;
pub const MAX_REASON_LEN: usize = 1_000;
pub const MAX_MESSAGE_LEN: usize = 4_000;
pub const MAX_OCCUPANTS: u32 = 20;
pub const MAX_MEDIA_ASSETS: usize = 30;
