//! Blocking pipe-reader threads.
//!
//! Each child stream gets a dedicated thread performing blocking reads.
//! Readiness multiplexing on these pipes is deliberately not used: agent
//! binaries that reset terminal attributes have been observed to make
//! poll-style readiness return spurious zero-byte reads and hang readers.
//! The reader appends every chunk to the log file (the authoritative
//! record), feeds the bounded tail ring, and offers chunks to an optional
//! subscriber queue without ever blocking on it.

use std::fs::File;
use std::io::{Read, Write};
use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::trace;

use crate::tail::TailBuffer;

/// Read chunk size; matches the pipe buffer granularity we care about.
const READ_BUF_BYTES: usize = 8_192;

/// Spawns a reader thread for one child stream.
///
/// Runs until the stream reaches EOF (child exited and the pipe drained) or
/// an unrecoverable read error. Chunks are delivered in read order; stdout
/// and stderr readers are independent, so their mutual interleaving in the
/// log is not guaranteed -- per-stream order is.
pub fn spawn_reader<R: Read + Send + 'static>(
    name: &'static str,
    mut stream: R,
    log_file: Arc<Mutex<File>>,
    tail: Arc<Mutex<TailBuffer>>,
    subscriber: Option<SyncSender<Vec<u8>>>,
) -> JoinHandle<std::io::Result<u64>> {
    std::thread::Builder::new()
        .name(format!("emdx-reader-{name}"))
        .spawn(move || {
            let mut buf = [0u8; READ_BUF_BYTES];
            let mut total: u64 = 0;
            loop {
                match stream.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        total += n as u64;
                        let chunk = &buf[..n];
                        {
                            let mut file = log_file
                                .lock()
                                .unwrap_or_else(|poisoned| poisoned.into_inner());
                            file.write_all(chunk)?;
                        }
                        {
                            let mut ring = tail
                                .lock()
                                .unwrap_or_else(|poisoned| poisoned.into_inner());
                            ring.push(chunk);
                        }
                        if let Some(ref tx) = subscriber {
                            // Dropped or saturated subscribers never stall
                            // the reader; the log file keeps everything.
                            let _ = tx.try_send(chunk.to_vec());
                        }
                        trace!(name, n, "read chunk");
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
            Ok(total)
        })
        .expect("reader thread spawn")
}
