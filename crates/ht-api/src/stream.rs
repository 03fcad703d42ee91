//! Newline-delimited JSON push streams (`/traffic`, `/logs`, `/memory`).
//!
//! The body is read on a helper thread and handed over line by line through a
//! bounded channel. The caller waits on that channel in `CANCEL_CHECK` slices
//! and stops as soon as its token fires. Reads on the helper thread are bounded
//! by the client's idle timeout: a timed out read only re-checks the token, so
//! a quiet stream stays open while a cancelled one releases its connection
//! within one idle period. The caller waits for the helper before returning.

use std::io::{self, BufRead, BufReader, Read};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;

use ht_base::api::ApiError;
use ht_base::cancel::CancelToken;
use ht_base::constants::CANCEL_CHECK;

/// Lines buffered between the reader thread and the consumer
const LINE_BUFFER: usize = 64;

/// Decode one stream line. Blank and malformed lines yield None.
pub fn decode_line<E: DeserializeOwned>(line: &str) -> Option<E> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            log::debug!("skipping malformed stream line: {}", e);
            None
        }
    }
}

/// A read that gave up because nothing arrived in time.
fn is_idle(e: &io::Error) -> bool {
    if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
        return true;
    }
    e.get_ref().and_then(|inner| inner.downcast_ref::<reqwest::Error>()).is_some_and(|re| re.is_timeout())
}

fn read_lines<R: Read>(body: R, cancel: &CancelToken, tx: &SyncSender<Result<String, String>>) {
    let mut reader = BufReader::new(body);
    let mut buf = Vec::new();
    while !cancel.is_cancelled() {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                if !buf.is_empty() {
                    let _ = tx.send(Ok(String::from_utf8_lossy(&buf).into_owned()));
                }
                return;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).into_owned();
                buf.clear();
                if tx.send(Ok(line)).is_err() {
                    return;
                }
            }
            // Bytes read so far stay in `buf`; the line continues on the next read
            Err(e) if is_idle(&e) || e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.send(Err(e.to_string()));
                return;
            }
        }
    }
}

/// Pump `body` into `on_event` until it ends, fails, or `cancel` fires.
///
/// `idle` is the longest a single read of `body` may block. On cancellation
/// the reader thread gets that long (plus one check interval) to let go of
/// `body` before this returns.
///
/// `Ok(())` when the server closed the stream, `Err(ApiError::Cancelled)` on
/// cancellation, `Err(ApiError::StreamRead)` on a read error.
pub fn consume<R, E>(
    name: &str,
    body: R,
    idle: Duration,
    cancel: &CancelToken,
    on_event: &mut dyn FnMut(E),
) -> Result<(), ApiError>
where
    R: Read + Send + 'static,
    E: DeserializeOwned,
{
    let (tx, rx) = mpsc::sync_channel::<Result<String, String>>(LINE_BUFFER);
    let token = cancel.clone();
    let reader = thread::Builder::new()
        .name(format!("{}-reader", name))
        .spawn(move || read_lines(body, &token, &tx))
        .map_err(|e| ApiError::StreamRead(format!("failed to spawn reader: {}", e)))?;

    loop {
        if cancel.is_cancelled() {
            break;
        }
        match rx.recv_timeout(CANCEL_CHECK) {
            Ok(Ok(line)) => {
                if let Some(event) = decode_line(&line) {
                    on_event(event);
                }
            }
            Ok(Err(e)) => return Err(ApiError::StreamRead(e)),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }

    drop(rx);
    let deadline = Instant::now() + idle + CANCEL_CHECK;
    while !reader.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    if reader.is_finished() {
        let _ = reader.join();
    } else {
        log::debug!("{} reader still blocked after cancellation", name);
    }
    Err(ApiError::Cancelled)
}
