//! Background fit worker.
//!
//! A fit runs on its own thread and reports through an unbounded channel, so
//! the worker never waits for the consumer. The consumer drains events at its
//! own pace and can request cancellation through the handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::data::{ObservedSeries, SamplingConfig};
use crate::error::{FitError, Result};
use crate::lm::{FitObserver, FitReport, IterationSnapshot, LevenbergMarquardt};
use crate::model::ForwardModel;
use crate::parameters::FitParameters;

/// Message from a running fit.
#[derive(Debug)]
pub enum FitEvent {
    /// Coarse progress in percent.
    Progress(u32),

    /// Initial state, an accepted step, or the final state.
    Iteration(IterationSnapshot),

    /// Always the last event of a run.
    Finished(Result<FitReport>),
}

/// Everything the worker thread takes ownership of.
pub(crate) struct FitJob<M: ForwardModel + ?Sized> {
    pub model: Arc<M>,
    pub parameters: FitParameters,
    pub observed: ObservedSeries,
    pub sampling: SamplingConfig,
    pub weight: f64,
    pub fitter: LevenbergMarquardt,
}

/// Clears the session's running flag when the worker ends, panics included.
pub(crate) struct RunningGuard(pub Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct ChannelObserver {
    tx: Sender<FitEvent>,
}

impl FitObserver for ChannelObserver {
    fn on_progress(&mut self, percent: u32) {
        // a dropped handle just means nobody is listening
        let _ = self.tx.send(FitEvent::Progress(percent));
    }

    fn on_iteration(&mut self, snapshot: &IterationSnapshot) {
        let _ = self.tx.send(FitEvent::Iteration(snapshot.clone()));
    }
}

/// Spawn the worker thread for `job`.
///
/// `running` is cleared before the `Finished` event is sent, so a consumer
/// reacting to it can start the next fit straight away.
pub(crate) fn spawn<M>(job: FitJob<M>, running: RunningGuard) -> Result<FitHandle>
where
    M: ForwardModel + ?Sized + 'static,
{
    let cancel = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();

    let worker_cancel = Arc::clone(&cancel);
    let thread = thread::Builder::new()
        .name("pta-fit-worker".to_string())
        .spawn(move || {
            let mut observer = ChannelObserver { tx };
            let result = job.fitter.fit(
                &*job.model,
                &job.parameters,
                &job.observed,
                &job.sampling,
                job.weight,
                &worker_cancel,
                &mut observer,
            );
            drop(running);
            let _ = observer.tx.send(FitEvent::Finished(result));
        })?;

    Ok(FitHandle {
        cancel,
        events: rx,
        thread: Some(thread),
    })
}

/// Handle to a fit running in the background.
#[derive(Debug)]
pub struct FitHandle {
    cancel: Arc<AtomicBool>,
    events: Receiver<FitEvent>,
    thread: Option<JoinHandle<()>>,
}

impl FitHandle {
    /// Ask the worker to stop at the start of its next iteration.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Events queued so far, without blocking.
    pub fn try_events(&self) -> Vec<FitEvent> {
        self.events.try_iter().collect()
    }

    /// Block until the next event. `None` once the worker is gone.
    pub fn recv(&self) -> Option<FitEvent> {
        self.events.recv().ok()
    }

    /// Block until the run ends, discarding intermediate events.
    pub fn wait(mut self) -> Result<FitReport> {
        let mut outcome = None;
        while let Ok(event) = self.events.recv() {
            if let FitEvent::Finished(result) = event {
                outcome = Some(result);
                break;
            }
        }
        self.join()?;
        outcome.unwrap_or_else(|| {
            Err(FitError::WorkerFailed(
                "worker exited without reporting a result".to_string(),
            ))
        })
    }

    fn join(&mut self) -> Result<()> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| FitError::WorkerFailed("worker thread panicked".to_string())),
            None => Ok(()),
        }
    }
}
