//! The native side of a launch: starting the game and asking whether it is
//! still running.
//!
//! `ProcessHost` spawns the game executable from the build directory.
//! `ScriptedHost` answers from a script and records what it was asked, so the
//! supervisor's state machine can be exercised without a real process.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sysinfo::{Pid, ProcessRefreshKind, System};

/// Everything the host needs to start one game session.
#[derive(Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub build_path: String,
    pub email: String,
    pub password: String,
    pub eor: bool,
}

impl std::fmt::Debug for LaunchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchRequest")
            .field("build_path", &self.build_path)
            .field("email", &self.email)
            .field("eor", &self.eor)
            .finish_non_exhaustive()
    }
}

/// Capability interface to whatever actually runs the game.
///
/// Implementors should:
/// - Return `Err(reason)` from `launch` when the game could not be started
/// - Never block for long in `is_running`; it is called on every poll tick
pub trait LaunchHost: Send + Sync {
    fn launch(&self, request: &LaunchRequest) -> Result<(), String>;

    fn is_running(&self) -> Result<bool, String>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Process host
// ═══════════════════════════════════════════════════════════════════════════════

/// How `ProcessHost` finds and starts the game inside a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostConfig {
    /// Game executable, relative to the build root.
    pub executable: PathBuf,
    /// Process name that counts as "the game is running".
    pub process_name: String,
    /// Appended after the credential arguments.
    pub extra_args: Vec<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            executable: ["Game", "Binaries", "Win64", "GameClient.exe"]
                .iter()
                .collect(),
            process_name: "GameClient.exe".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Cached process table for the name-based liveness check. Once a matching
/// process is found only its PID is refreshed on later polls.
struct ProcessTable {
    system: System,
    tracked: Option<Pid>,
}

pub struct ProcessHost {
    config: HostConfig,
    child: Mutex<Option<Child>>,
    table: Mutex<ProcessTable>,
}

impl ProcessHost {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            child: Mutex::new(None),
            table: Mutex::new(ProcessTable {
                system: System::new(),
                tracked: None,
            }),
        }
    }

    fn launch_args(&self, request: &LaunchRequest) -> Vec<String> {
        let mut args = vec![
            format!("-AUTH_LOGIN={}", request.email),
            format!("-AUTH_PASSWORD={}", request.password),
        ];
        if request.eor {
            args.push("-EOR".to_string());
        }
        args.extend(self.config.extra_args.iter().cloned());
        args
    }

    /// Our own child, if we still hold one that has not exited.
    fn child_running(&self) -> Result<bool, String> {
        let mut guard = self
            .child
            .lock()
            .map_err(|_| "Game process lock poisoned.".to_string())?;
        let Some(child) = guard.as_mut() else {
            return Ok(false);
        };
        match child.try_wait() {
            Ok(None) => Ok(true),
            Ok(Some(status)) => {
                tracing::info!(pid = child.id(), %status, "Game process exited");
                *guard = None;
                Ok(false)
            }
            Err(err) => Err(format!("Failed to poll game process status: {err}")),
        }
    }

    /// Any process with the configured name, for launchers that hand off to a
    /// separate client process.
    fn named_process_running(&self) -> Result<bool, String> {
        let wanted = self.config.process_name.as_str();
        if wanted.is_empty() {
            return Ok(false);
        }
        let mut table = self
            .table
            .lock()
            .map_err(|_| "Process table lock poisoned.".to_string())?;
        let ProcessTable { system, tracked } = &mut *table;

        if let Some(pid) = *tracked {
            let alive = system.refresh_process_specifics(pid, ProcessRefreshKind::new())
                && system
                    .process(pid)
                    .is_some_and(|process| process.name().eq_ignore_ascii_case(wanted));
            if alive {
                return Ok(true);
            }
            *tracked = None;
        }

        system.refresh_processes_specifics(ProcessRefreshKind::new());
        *tracked = system
            .processes()
            .iter()
            .find(|(_, process)| process.name().eq_ignore_ascii_case(wanted))
            .map(|(pid, _)| *pid);
        Ok(tracked.is_some())
    }
}

impl LaunchHost for ProcessHost {
    fn launch(&self, request: &LaunchRequest) -> Result<(), String> {
        let build_root = PathBuf::from(&request.build_path);
        let executable = build_root.join(&self.config.executable);
        if !executable.is_file() {
            return Err(format!(
                "Game executable is missing: {}",
                executable.display()
            ));
        }

        let mut guard = self
            .child
            .lock()
            .map_err(|_| "Game process lock poisoned.".to_string())?;

        let child = Command::new(&executable)
            .args(self.launch_args(request))
            .current_dir(&build_root)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                format!(
                    "Failed to start {}: {}",
                    executable.display(),
                    err
                )
            })?;

        tracing::info!(pid = child.id(), executable = %executable.display(), "Game process started");
        *guard = Some(child);
        Ok(())
    }

    fn is_running(&self) -> Result<bool, String> {
        if self.child_running()? {
            return Ok(true);
        }
        self.named_process_running()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scripted host
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory host. Liveness answers are consumed in order; once the script
/// runs out every query reports "not running".
pub struct ScriptedHost {
    launch_result: Mutex<Result<(), String>>,
    liveness: Mutex<VecDeque<Result<bool, String>>>,
    requests: Mutex<Vec<LaunchRequest>>,
    queries: AtomicUsize,
}

impl Default for ScriptedHost {
    fn default() -> Self {
        Self {
            launch_result: Mutex::new(Ok(())),
            liveness: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            queries: AtomicUsize::new(0),
        }
    }
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `launch` fail with `reason`.
    pub fn reject_launches(&self, reason: &str) {
        *self.launch_result.lock().unwrap_or_else(|p| p.into_inner()) = Err(reason.to_string());
    }

    pub fn push_liveness(&self, answers: impl IntoIterator<Item = Result<bool, String>>) {
        self.liveness
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .extend(answers);
    }

    pub fn requests(&self) -> Vec<LaunchRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl LaunchHost for ScriptedHost {
    fn launch(&self, request: &LaunchRequest) -> Result<(), String> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request.clone());
        self.launch_result
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn is_running(&self) -> Result<bool, String> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.liveness
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front()
            .unwrap_or(Ok(false))
    }
}
