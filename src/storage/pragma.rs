//! Shared PRAGMA tuning for every store connection.
//!
//! WAL journaling lets readers proceed without blocking the single writer;
//! `synchronous = NORMAL` trades the durability of the last WAL frame for
//! throughput, acceptable since a crash only loses in-flight writes that are
//! re-derived from the frontier/write queue on restart; `mmap_size` keeps hot
//! pages memory-mapped for read-heavy access (the search store in particular).

use rusqlite::Connection;

pub fn tune(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
        PRAGMA mmap_size = 268435456;
        ",
    )
}

/// Forces a WAL checkpoint, truncating the WAL file back to empty on success.
/// Called periodically by the DB writer (§4.8) and by the indexer.
pub fn checkpoint_truncate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
}
