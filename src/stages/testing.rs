//! In-memory launcher used by supervisor tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CommandSpec, Launcher, StageExit, StageHandle, StageRole};
use crate::error::StageError;

const SIGTERM: i32 = 15;
const SIGKILL: i32 = 9;

/// Held by tests that raise real signals at the test process.
pub static SIGNAL_TESTS: Mutex<()> = parking_lot::const_mutex(());

/// Shared state of one fake process, visible to the test.
#[derive(Debug, Default)]
pub struct FakeState {
    pub exit: Option<StageExit>,
    pub terminated: bool,
    pub killed: bool,
    pub ignores_term: bool,
}

/// Record of one `launch` call.
#[derive(Clone)]
pub struct Launched {
    pub role: StageRole,
    pub cmd: CommandSpec,
    pub pid: u32,
    pub state: Arc<Mutex<FakeState>>,
}

impl Launched {
    /// Makes the process exit as if it crashed.
    pub fn crash(&self, code: i32) {
        self.state.lock().exit = Some(StageExit::code(code));
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().exit.is_none()
    }
}

#[derive(Clone, Copy, Debug)]
enum Plan {
    /// Process is dead before its settle delay ends.
    DiesOnStart(i32),
    /// Spawning fails.
    SpawnFails,
    /// Process ignores SIGTERM.
    IgnoresTerm,
}

/// Launcher that records every launch and hands out fake processes.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    launched: Arc<Mutex<Vec<Launched>>>,
    plans: Arc<Mutex<HashMap<StageRole, Plan>>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn die_on_start(&self, role: StageRole, code: i32) {
        self.plans.lock().insert(role, Plan::DiesOnStart(code));
    }

    pub fn fail_spawn(&self, role: StageRole) {
        self.plans.lock().insert(role, Plan::SpawnFails);
    }

    pub fn ignore_term(&self, role: StageRole) {
        self.plans.lock().insert(role, Plan::IgnoresTerm);
    }

    /// Clears the plan of `role`, so later launches behave normally.
    pub fn heal(&self, role: StageRole) {
        self.plans.lock().remove(&role);
    }

    pub fn launches(&self) -> Vec<Launched> {
        self.launched.lock().clone()
    }

    pub fn launches_of(&self, role: StageRole) -> Vec<Launched> {
        self.launches().into_iter().filter(|l| l.role == role).collect()
    }

    /// Latest launch of `role`.
    pub fn last(&self, role: StageRole) -> Launched {
        self.launches_of(role)
            .pop()
            .unwrap_or_else(|| panic!("{role} never launched"))
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, role: StageRole, cmd: &CommandSpec) -> Result<Box<dyn StageHandle>, StageError> {
        let plan = self.plans.lock().get(&role).copied();
        if let Some(Plan::SpawnFails) = plan {
            return Err(StageError::Spawn {
                program: cmd.program.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        let state = Arc::new(Mutex::new(FakeState {
            exit: match plan {
                Some(Plan::DiesOnStart(code)) => Some(StageExit::code(code)),
                _ => None,
            },
            ignores_term: matches!(plan, Some(Plan::IgnoresTerm)),
            ..FakeState::default()
        }));

        let mut launched = self.launched.lock();
        let pid = 1000 + launched.len() as u32;
        launched.push(Launched {
            role,
            cmd: cmd.clone(),
            pid,
            state: state.clone(),
        });
        Ok(Box::new(FakeProcess { pid, state }))
    }
}

struct FakeProcess {
    pid: u32,
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl StageHandle for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn try_exit(&mut self) -> Result<Option<StageExit>, StageError> {
        Ok(self.state.lock().exit)
    }

    fn terminate(&mut self) -> Result<(), StageError> {
        let mut st = self.state.lock();
        st.terminated = true;
        if !st.ignores_term && st.exit.is_none() {
            st.exit = Some(StageExit::signal(SIGTERM));
        }
        Ok(())
    }

    async fn wait(&mut self) -> Result<StageExit, StageError> {
        loop {
            if let Some(exit) = self.state.lock().exit {
                return Ok(exit);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    async fn kill(&mut self) -> Result<(), StageError> {
        let mut st = self.state.lock();
        st.killed = true;
        if st.exit.is_none() {
            st.exit = Some(StageExit::signal(SIGKILL));
        }
        Ok(())
    }

    fn stderr_tail(&self) -> Option<String> {
        self.state
            .lock()
            .exit
            .filter(|e| !e.success() && e.signal.is_none())
            .map(|e| format!("fake stage {e}"))
    }
}
