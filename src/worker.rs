extern crate std;

use std::sync::mpsc;

use crate::result;
use crate::snapshot;

/// Runs snapshot fetches off the render thread. The loop asks for a fetch
/// with `request` and picks the answer up with `try_result`; at most one
/// fetch is outstanding. Dropping the worker closes the request channel and
/// the thread exits once its current fetch (bounded by the timeout) ends.
pub struct FetchWorker {
    requests: Option<mpsc::SyncSender<()>>,
    results: mpsc::Receiver<result::DashResult<snapshot::Snapshot>>,
    in_flight: bool,
}

impl FetchWorker {
    pub fn spawn(url: &str, timeout: std::time::Duration) -> result::DashResult<FetchWorker> {
        return FetchWorker::spawn_ext(url, timeout, snapshot::real_fetch_json_fn);
    }

    pub fn spawn_ext(url: &str, timeout: std::time::Duration, fetch_json_fn: snapshot::FetchFn) -> result::DashResult<FetchWorker> {
        let (request_tx, request_rx) = mpsc::sync_channel::<()>(1);
        let (result_tx, result_rx) = mpsc::sync_channel(1);
        let url = url.to_string();

        std::thread::Builder::new()
            .name("snapshot-fetch".to_string())
            .spawn(move || {
                for () in request_rx.iter() {
                    let fetched = snapshot::fetch_snapshot_ext(&url, timeout, fetch_json_fn);
                    if result_tx.send(fetched).is_err() {
                        break;
                    }
                }
                debug!("Fetch worker exiting");
            })?;

        return Ok(FetchWorker{
            requests: Some(request_tx),
            results: result_rx,
            in_flight: false,
        });
    }

    pub fn is_in_flight(&self) -> bool {
        return self.in_flight;
    }

    /// Starts a fetch unless one is already running. Returns whether a new
    /// one was started.
    pub fn request(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        let sent = match self.requests {
            Some(ref requests) => requests.try_send(()).is_ok(),
            None => false,
        };
        self.in_flight = sent;
        return sent;
    }

    /// The finished fetch, if there is one. Never blocks.
    pub fn try_result(&mut self) -> Option<result::DashResult<snapshot::Snapshot>> {
        match self.results.try_recv() {
            Ok(fetched) => {
                self.in_flight = false;
                return Some(fetched);
            },
            Err(mpsc::TryRecvError::Empty) => return None,
            Err(mpsc::TryRecvError::Disconnected) => {
                if !self.in_flight {
                    return None;
                }
                self.in_flight = false;
                return Some(Err(result::make_error("fetch worker exited")));
            },
        }
    }
}

impl Drop for FetchWorker {
    fn drop(&mut self) {
        self.requests.take();
    }
}
