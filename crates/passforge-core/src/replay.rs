//! Client for the long-lived replay workers.
//!
//! A replay worker is an external process listening on a unix stream
//! socket. Each request is one connection: the client sends the path of a
//! freshly linked shared library, the worker loads it, times the entry
//! point and answers with one fixed-size reply. Workers are not safe for
//! concurrent dials, so replay mode runs strictly serial evaluations.

use crate::error::{PassForgeError, PfResult};
use std::fs;
use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Timed invocations requested per worker; the extremes are discarded.
pub const SAMPLES_PER_WORKER: usize = 6;

const MSG_LEN: usize = 200;
/// `{ success: i32, elapsed: f64, msg: [200]u8 }` in native byte order.
const REPLY_LEN: usize = 4 + 8 + MSG_LEN;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("worker {worker}: {source}")]
    Io {
        worker: String,
        source: std::io::Error,
    },

    #[error("worker {worker}: {msg}")]
    Worker { worker: String, msg: String },
}

struct Reply {
    success: i32,
    elapsed_ns: f64,
    msg: String,
}

fn decode_reply(buf: &[u8; REPLY_LEN]) -> Reply {
    let success = i32::from_ne_bytes(buf[0..4].try_into().unwrap());
    let elapsed_ns = f64::from_ne_bytes(buf[4..12].try_into().unwrap());
    let tail = &buf[12..];
    let end = tail.iter().position(|&b| b == 0).unwrap_or(MSG_LEN);
    let msg = String::from_utf8_lossy(&tail[..end]).into_owned();
    Reply {
        success,
        elapsed_ns,
        msg,
    }
}

pub struct ReplayClient {
    workers: Vec<PathBuf>,
    weights: Vec<f64>,
}

impl ReplayClient {
    pub fn new(workers: Vec<PathBuf>, weights: Vec<f64>) -> Self {
        Self { workers, weights }
    }

    /// Load the worker socket list and the parallel weight list.
    pub fn from_manifests(worker_file: &Path, weight_file: &Path) -> PfResult<Self> {
        let workers: Vec<PathBuf> = fs::read_to_string(worker_file)?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect();

        let mut weights = Vec::with_capacity(workers.len());
        for (lineno, line) in fs::read_to_string(weight_file)?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
        {
            let w: f64 = line.parse().map_err(|_| {
                PassForgeError::Manifest(format!(
                    "error parsing worker weight file (line {})",
                    lineno + 1
                ))
            })?;
            if w <= 0.0 {
                return Err(PassForgeError::Manifest(format!(
                    "worker weight must be positive (line {})",
                    lineno + 1
                )));
            }
            weights.push(w);
        }

        if workers.is_empty() {
            return Err(PassForgeError::Manifest("no replay workers listed".into()));
        }
        if workers.len() != weights.len() {
            return Err(PassForgeError::Manifest(format!(
                "{} workers but {} weights",
                workers.len(),
                weights.len()
            )));
        }
        Ok(Self { workers, weights })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Weighted total of all worker measurements for `lib`.
    pub fn measure(&self, lib: &Path) -> Result<Duration, ReplayError> {
        let mut total_ns = 0.0f64;
        for (worker, weight) in self.workers.iter().zip(&self.weights) {
            let elapsed = self.measure_worker(worker, lib)?;
            total_ns += elapsed.as_nanos() as f64 * weight;
        }
        Ok(Duration::from_nanos(total_ns as u64))
    }

    /// Trimmed mean of `SAMPLES_PER_WORKER` invocations on one worker:
    /// sorted, minimum and maximum discarded, rest averaged.
    fn measure_worker(&self, worker: &Path, lib: &Path) -> Result<Duration, ReplayError> {
        let mut samples = Vec::with_capacity(SAMPLES_PER_WORKER);
        for _ in 0..SAMPLES_PER_WORKER {
            let reply = self.request(worker, lib)?;
            if reply.success != 1 {
                warn!("replay worker {} failed: {}", worker.display(), reply.msg);
                return Err(ReplayError::Worker {
                    worker: worker.display().to_string(),
                    msg: reply.msg,
                });
            }
            samples.push(reply.elapsed_ns as u64);
        }
        samples.sort_unstable();
        let central = &samples[1..SAMPLES_PER_WORKER - 1];
        let sum: u64 = central.iter().sum();
        Ok(Duration::from_nanos(sum / central.len() as u64))
    }

    fn request(&self, worker: &Path, lib: &Path) -> Result<Reply, ReplayError> {
        let io_err = |source| ReplayError::Io {
            worker: worker.display().to_string(),
            source,
        };
        let mut conn = UnixStream::connect(worker).map_err(io_err)?;
        conn.write_all(lib.to_string_lossy().as_bytes())
            .map_err(io_err)?;
        let _ = conn.shutdown(Shutdown::Write);
        let mut buf = [0u8; REPLY_LEN];
        conn.read_exact(&mut buf).map_err(io_err)?;
        Ok(decode_reply(&buf))
    }

    /// Dial every worker once and send the single kill byte.
    pub fn shutdown(&self) {
        for worker in &self.workers {
            match UnixStream::connect(worker) {
                Ok(mut conn) => {
                    let _ = conn.write_all(&[0u8]);
                }
                Err(e) => warn!("could not reach replay worker {}: {e}", worker.display()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_successful_reply() {
        let mut buf = [0u8; REPLY_LEN];
        buf[0..4].copy_from_slice(&1i32.to_ne_bytes());
        buf[4..12].copy_from_slice(&1500.0f64.to_ne_bytes());
        let reply = decode_reply(&buf);
        assert_eq!(reply.success, 1);
        assert_eq!(reply.elapsed_ns, 1500.0);
        assert_eq!(reply.msg, "");
    }

    #[test]
    fn decodes_a_nul_terminated_diagnostic() {
        let mut buf = [0u8; REPLY_LEN];
        buf[0..4].copy_from_slice(&0i32.to_ne_bytes());
        buf[12..12 + 6].copy_from_slice(b"dlopen");
        let reply = decode_reply(&buf);
        assert_eq!(reply.success, 0);
        assert_eq!(reply.msg, "dlopen");
    }

    #[test]
    fn diagnostic_without_nul_uses_the_whole_tail() {
        let mut buf = [1u8; REPLY_LEN];
        buf[0..4].copy_from_slice(&0i32.to_ne_bytes());
        buf[4..12].copy_from_slice(&0.0f64.to_ne_bytes());
        let reply = decode_reply(&buf);
        assert_eq!(reply.msg.len(), MSG_LEN);
    }
}
