use crate::transport::Transport;
use crate::vu::{LiveGuard, Shared, VirtualUser, Workload};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Client ceiling of {ceiling} reached")]
pub(crate) struct CeilingReached {
    pub ceiling: usize,
}

/// Result of one [`VirtualUserPool::reconcile`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Reconciled {
    pub spawned: usize,
    pub retired: usize,
    /// Slots of the target that could not be filled because of the ceiling.
    pub rejected: usize,
}

struct Member {
    id: u64,
    retire: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns every client of a run.
///
/// The ceiling is checked against live tasks, which includes clients still finishing their
/// last iteration after being asked to retire. Retirement is LIFO.
pub(crate) struct VirtualUserPool<T> {
    shared: Arc<Shared<T>>,
    members: Vec<Member>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    ceiling: usize,
    next_id: u64,
    peak: usize,
}

impl<T: Transport> VirtualUserPool<T> {
    pub fn new(shared: Arc<Shared<T>>, ceiling: usize) -> Self {
        Self {
            shared,
            members: Vec::new(),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            ceiling,
            next_id: 0,
            peak: 0,
        }
    }

    pub fn spawn(&mut self, workload: Workload) -> Result<u64, CeilingReached> {
        if self.shared.live() >= self.ceiling {
            return Err(CeilingReached {
                ceiling: self.ceiling,
            });
        }

        let id = self.next_id;
        self.next_id += 1;

        let retire = self.shutdown.child_token();
        let guard = LiveGuard::new(self.shared.clone());
        self.peak = self.peak.max(self.shared.live());

        let user = VirtualUser::new(id);
        let handle = self
            .tracker
            .spawn(user.run(self.shared.clone(), retire.clone(), workload, guard));

        self.members.push(Member { id, retire, handle });
        Ok(id)
    }

    /// Bring the number of active clients to `target`.
    ///
    /// New clients get their workload from `workload`. Excess clients are signalled to retire,
    /// newest first, and exit after their current iteration.
    pub fn reconcile(&mut self, target: usize, mut workload: impl FnMut() -> Workload) -> Reconciled {
        self.prune();
        let mut reconciled = Reconciled::default();

        if self.members.len() > target {
            for member in self.members.drain(target..).rev() {
                trace!("Retiring client {}", member.id);
                member.retire.cancel();
                reconciled.retired += 1;
            }
        }

        while self.members.len() < target {
            match self.spawn(workload()) {
                Ok(_) => reconciled.spawned += 1,
                Err(_) => {
                    reconciled.rejected = target - self.members.len();
                    break;
                }
            }
        }

        if reconciled.spawned > 0 || reconciled.retired > 0 {
            debug!(
                "Reconciled to {target}: +{} -{} (live={}, rejected={})",
                reconciled.spawned,
                reconciled.retired,
                self.live(),
                reconciled.rejected
            );
        }

        reconciled
    }

    /// Signal every client to retire. Nothing is aborted.
    pub fn retire_all(&mut self) {
        self.shutdown.cancel();
        self.members.clear();
    }

    /// Wait until every client task has exited and return the peak live count.
    pub async fn drain(self) -> usize {
        self.tracker.close();
        self.tracker.wait().await;
        self.peak
    }

    pub fn live(&self) -> usize {
        self.shared.live()
    }

    pub fn idle(&self) -> usize {
        self.shared.idle()
    }

    /// Clients that have neither exited nor been asked to retire.
    pub fn active(&mut self) -> usize {
        self.prune();
        self.members.len()
    }

    pub fn peak(&self) -> usize {
        self.peak
    }

    fn prune(&mut self) {
        self.members.retain(|member| !member.handle.is_finished());
    }

    #[cfg(test)]
    fn ids(&self) -> Vec<u64> {
        self.members.iter().map(|member| member.id).collect()
    }
}
