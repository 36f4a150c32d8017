//! Tracked stage processes of one supervisor run.

use tokio::time::Instant;

use crate::stages::{StageHandle, StageRole};

/// A launched stage and its restart bookkeeping.
pub(crate) struct ManagedProcess {
    pub role: StageRole,
    pub handle: Box<dyn StageHandle>,
    /// Pid captured at launch; still known after the process is reaped.
    pub pid: Option<u32>,
    pub started_at: Instant,
    /// Restart attempts so far (0 = only the initial launch).
    pub restarts: u32,
    /// Crashes since the stage was last seen healthy.
    pub crashes: u32,
    /// Crashed under a no-restart policy; ignored from now on.
    pub lost: bool,
}

impl ManagedProcess {
    pub fn new(role: StageRole, handle: Box<dyn StageHandle>) -> Self {
        Self {
            role,
            pid: handle.pid(),
            handle,
            started_at: Instant::now(),
            restarts: 0,
            crashes: 0,
            lost: false,
        }
    }

    /// Swaps in the handle of a relaunched process.
    pub fn replace(&mut self, handle: Box<dyn StageHandle>) {
        self.pid = handle.pid();
        self.handle = handle;
        self.started_at = Instant::now();
    }
}

/// Stages in start order. Handed to shutdown at most once.
#[derive(Default)]
pub(crate) struct Pipeline {
    procs: Vec<ManagedProcess>,
    drained: bool,
}

impl Pipeline {
    pub fn push(&mut self, proc: ManagedProcess) -> &mut ManagedProcess {
        let idx = self.procs.len();
        self.procs.push(proc);
        &mut self.procs[idx]
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ManagedProcess> {
        self.procs.iter_mut()
    }

    /// Takes every process in reverse start order. Empty on every call after the first.
    pub fn drain(&mut self) -> Vec<ManagedProcess> {
        if std::mem::replace(&mut self.drained, true) {
            return Vec::new();
        }
        let mut procs = std::mem::take(&mut self.procs);
        procs.reverse();
        procs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::FakeLauncher;
    use crate::stages::{CommandSpec, Launcher};

    fn managed(launcher: &FakeLauncher, role: StageRole) -> ManagedProcess {
        let handle = launcher.launch(role, &CommandSpec::new("true")).unwrap();
        ManagedProcess::new(role, handle)
    }

    #[tokio::test]
    async fn test_drain_reverses_start_order_once() {
        let launcher = FakeLauncher::new();
        let mut pipeline = Pipeline::default();
        for role in StageRole::ALL {
            pipeline.push(managed(&launcher, role));
        }

        let first: Vec<_> = pipeline.drain().iter().map(|p| p.role).collect();
        assert_eq!(first, [StageRole::Encoder, StageRole::Renderer, StageRole::Display]);
        assert!(pipeline.drain().is_empty());
    }

    #[tokio::test]
    async fn test_stage_pushed_after_drain_is_not_handed_out() {
        let launcher = FakeLauncher::new();
        let mut pipeline = Pipeline::default();
        pipeline.push(managed(&launcher, StageRole::Display));
        assert_eq!(pipeline.drain().len(), 1);

        pipeline.push(managed(&launcher, StageRole::Renderer));
        assert!(pipeline.drain().is_empty());
    }

    #[tokio::test]
    async fn test_replace_keeps_bookkeeping_and_updates_pid() {
        let launcher = FakeLauncher::new();
        let mut proc = managed(&launcher, StageRole::Encoder);
        proc.restarts = 2;
        proc.crashes = 1;
        let old_pid = proc.pid;

        let next = launcher
            .launch(StageRole::Encoder, &CommandSpec::new("true"))
            .unwrap();
        proc.replace(next);
        assert_ne!(proc.pid, old_pid);
        assert_eq!(proc.pid, Some(launcher.last(StageRole::Encoder).pid));
        assert_eq!((proc.restarts, proc.crashes), (2, 1));
    }
}
