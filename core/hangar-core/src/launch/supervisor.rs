//! Launch state machine.
//!
//! `Idle --launch()--> Launching --(liveness: not running)--> Idle`, plus
//! `Launching --(host rejects)--> Idle` with no polling.
//!
//! The supervisor owns at most one polling task. The task is cancelled when a
//! new cycle starts, on `shutdown()`, and when the supervisor is dropped.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::host::{LaunchHost, LaunchRequest};
use super::notice::{Notice, NoticeBoard};
use crate::builds::{BuildRegistry, ValidateBuild};
use crate::error::LaunchError;
use crate::session::SessionStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_NOTICE_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchState {
    Idle,
    Launching,
}

impl std::fmt::Display for LaunchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchState::Idle => write!(f, "idle"),
            LaunchState::Launching => write!(f, "launching"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub poll_interval: Duration,
    pub notice_window: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            notice_window: DEFAULT_NOTICE_WINDOW,
        }
    }
}

/// Drives one launch cycle at a time against a `LaunchHost`.
///
/// Must be used inside a tokio runtime: polling and notice expiry run as
/// spawned tasks.
pub struct LaunchSupervisor<H: LaunchHost + 'static> {
    host: Arc<H>,
    config: SupervisorConfig,
    state: Arc<watch::Sender<LaunchState>>,
    notices: NoticeBoard,
    poller: Option<CancellationToken>,
}

impl<H: LaunchHost + 'static> LaunchSupervisor<H> {
    pub fn new(host: Arc<H>, config: SupervisorConfig) -> Self {
        let (state, _) = watch::channel(LaunchState::Idle);
        Self {
            host,
            notices: NoticeBoard::new(config.notice_window),
            config,
            state: Arc::new(state),
            poller: None,
        }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn state(&self) -> LaunchState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LaunchState> {
        self.state.subscribe()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notices.current()
    }

    /// Starts a launch cycle for the selected build.
    ///
    /// A call while `Launching` is a no-op and returns `Ok(())`. Precondition
    /// failures and host rejections raise a notice and leave the state `Idle`.
    pub fn launch<V: ValidateBuild>(
        &mut self,
        registry: &BuildRegistry<V>,
        session: &SessionStore,
    ) -> Result<(), LaunchError> {
        if self.state() == LaunchState::Launching {
            tracing::debug!("Launch already in progress; ignoring");
            return Ok(());
        }

        let Some(build_path) = registry.launch_path() else {
            return Err(self.refuse(LaunchError::NoBuildSelected));
        };
        let Some(credentials) = session.get() else {
            return Err(self.refuse(LaunchError::NotAuthenticated));
        };

        let request = LaunchRequest {
            build_path: build_path.to_string(),
            email: credentials.email.clone(),
            password: credentials.password.clone(),
            eor: session.eor(),
        };

        self.stop_polling();
        self.state.send_replace(LaunchState::Launching);
        tracing::info!(build = %request.build_path, eor = request.eor, "Launching build");

        if let Err(reason) = self.host.launch(&request) {
            tracing::warn!(build = %request.build_path, %reason, "Host rejected launch");
            self.notices.raise(reason.clone());
            self.state.send_replace(LaunchState::Idle);
            return Err(LaunchError::CommandRejected(reason));
        }

        let cancel = CancellationToken::new();
        tokio::spawn(poll_liveness(
            Arc::clone(&self.host),
            Arc::clone(&self.state),
            self.config.poll_interval,
            cancel.clone(),
        ));
        self.poller = Some(cancel);
        Ok(())
    }

    /// Cancels any polling task and returns to `Idle`.
    pub fn shutdown(&mut self) {
        self.stop_polling();
        self.state.send_if_modified(|state| {
            if *state == LaunchState::Idle {
                return false;
            }
            *state = LaunchState::Idle;
            true
        });
    }

    fn refuse(&self, err: LaunchError) -> LaunchError {
        tracing::warn!(error = %err, "Launch refused");
        self.notices.raise(err.to_string());
        err
    }

    fn stop_polling(&mut self) {
        if let Some(cancel) = self.poller.take() {
            cancel.cancel();
        }
    }
}

impl<H: LaunchHost + 'static> Drop for LaunchSupervisor<H> {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

async fn poll_liveness<H: LaunchHost + 'static>(
    host: Arc<H>,
    state: Arc<watch::Sender<LaunchState>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Liveness polling cancelled");
                return;
            }
            _ = ticker.tick() => {}
        }

        let running = match host.is_running() {
            Ok(running) => running,
            Err(err) => {
                tracing::warn!(error = %err, "Liveness query failed; treating as not running");
                false
            }
        };
        tracing::debug!(running, "Liveness poll");

        if !running {
            state.send_if_modified(|current| {
                if cancel.is_cancelled() || *current == LaunchState::Idle {
                    return false;
                }
                *current = LaunchState::Idle;
                true
            });
            tracing::info!("Game no longer running; launcher idle");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builds::BuildValidator;
    use crate::launch::host::ScriptedHost;
    use crate::session::Credentials;
    use crate::store::{MemoryStore, PersistentStore};
    use tokio::time::Instant;

    struct Fixture {
        registry: BuildRegistry,
        session: SessionStore,
        host: Arc<ScriptedHost>,
        supervisor: LaunchSupervisor<ScriptedHost>,
    }

    fn fixture(selected: bool, signed_in: bool) -> Fixture {
        let store: Arc<dyn PersistentStore> = Arc::new(MemoryStore::new());
        let mut registry = BuildRegistry::load(store.clone(), BuildValidator::default());
        let mut session = SessionStore::load(store);
        if selected {
            registry.select("/games/Foo").unwrap();
        }
        if signed_in {
            session
                .login(Credentials::new("player@example.com", "hunter2"))
                .unwrap();
        }
        let host = Arc::new(ScriptedHost::new());
        let supervisor = LaunchSupervisor::new(host.clone(), SupervisorConfig::default());
        Fixture {
            registry,
            session,
            host,
            supervisor,
        }
    }

    async fn wait_for_idle(rx: &mut watch::Receiver<LaunchState>) {
        rx.wait_for(|state| *state == LaunchState::Idle)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn runs_until_liveness_reports_stopped() {
        let mut f = fixture(true, true);
        f.host.push_liveness([Ok(true), Ok(false)]);
        let mut rx = f.supervisor.subscribe();
        let started = Instant::now();

        let mut seen = vec![f.supervisor.state()];
        f.supervisor.launch(&f.registry, &f.session).unwrap();
        seen.push(f.supervisor.state());

        tokio::task::yield_now().await;
        assert_eq!(f.host.query_count(), 1);
        seen.push(f.supervisor.state());

        wait_for_idle(&mut rx).await;
        seen.push(f.supervisor.state());

        assert_eq!(
            seen,
            vec![
                LaunchState::Idle,
                LaunchState::Launching,
                LaunchState::Launching,
                LaunchState::Idle,
            ]
        );
        assert_eq!(f.host.query_count(), 2);
        assert!(started.elapsed() >= DEFAULT_POLL_INTERVAL);
        assert!(started.elapsed() < DEFAULT_POLL_INTERVAL * 2);

        let requests = f.host.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].build_path, "/games/Foo");
        assert_eq!(requests[0].email, "player@example.com");
        assert!(!requests[0].eor);
    }

    #[tokio::test(start_paused = true)]
    async fn request_carries_eor_toggle() {
        let mut f = fixture(true, true);
        f.session.set_eor(true).unwrap();
        f.supervisor.launch(&f.registry, &f.session).unwrap();
        assert!(f.host.requests()[0].eor);
    }

    #[tokio::test(start_paused = true)]
    async fn no_build_selected_stays_idle() {
        let mut f = fixture(false, true);
        let err = f.supervisor.launch(&f.registry, &f.session).unwrap_err();

        assert_eq!(err, LaunchError::NoBuildSelected);
        assert_eq!(f.supervisor.state(), LaunchState::Idle);
        assert!(f.host.requests().is_empty());
        assert_eq!(f.supervisor.notice().unwrap().message, "No build selected");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_session_stays_idle() {
        let mut f = fixture(true, false);
        let err = f.supervisor.launch(&f.registry, &f.session).unwrap_err();

        assert_eq!(err, LaunchError::NotAuthenticated);
        assert_eq!(f.supervisor.state(), LaunchState::Idle);
        assert!(f.host.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_command_reverts_without_polling() {
        let mut f = fixture(true, true);
        f.host.reject_launches("Executable not found");

        let err = f.supervisor.launch(&f.registry, &f.session).unwrap_err();
        assert_eq!(
            err,
            LaunchError::CommandRejected("Executable not found".to_string())
        );
        assert_eq!(f.supervisor.state(), LaunchState::Idle);
        assert_eq!(
            f.supervisor.notice().unwrap().message,
            "Executable not found"
        );

        tokio::time::sleep(DEFAULT_POLL_INTERVAL * 4).await;
        assert_eq!(f.host.query_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn notice_clears_after_window() {
        let mut f = fixture(false, true);
        let _ = f.supervisor.launch(&f.registry, &f.session);
        assert!(f.supervisor.notice().is_some());

        tokio::time::sleep(DEFAULT_NOTICE_WINDOW + Duration::from_millis(1)).await;
        assert!(f.supervisor.notice().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_launch_does_not_start_second_loop() {
        let mut f = fixture(true, true);
        f.host.push_liveness([Ok(true), Ok(true), Ok(false)]);
        let mut rx = f.supervisor.subscribe();
        let started = Instant::now();

        f.supervisor.launch(&f.registry, &f.session).unwrap();
        for _ in 0..5 {
            f.supervisor.launch(&f.registry, &f.session).unwrap();
            tokio::task::yield_now().await;
        }

        wait_for_idle(&mut rx).await;
        assert_eq!(f.host.requests().len(), 1);
        assert_eq!(f.host.query_count(), 3);
        assert!(started.elapsed() >= DEFAULT_POLL_INTERVAL * 2);
        assert!(started.elapsed() < DEFAULT_POLL_INTERVAL * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn query_error_ends_cycle() {
        let mut f = fixture(true, true);
        f.host.push_liveness([Ok(true), Err("host went away".to_string())]);
        let mut rx = f.supervisor.subscribe();

        f.supervisor.launch(&f.registry, &f.session).unwrap();
        wait_for_idle(&mut rx).await;

        assert_eq!(f.host.query_count(), 2);
        assert!(f.supervisor.notice().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn completed_cycle_allows_fresh_launch() {
        let mut f = fixture(true, true);
        f.host.push_liveness([Ok(false)]);
        let mut rx = f.supervisor.subscribe();

        f.supervisor.launch(&f.registry, &f.session).unwrap();
        wait_for_idle(&mut rx).await;
        assert_eq!(f.host.query_count(), 1);

        f.host.push_liveness([Ok(true), Ok(false)]);
        f.supervisor.launch(&f.registry, &f.session).unwrap();
        assert_eq!(f.supervisor.state(), LaunchState::Launching);
        wait_for_idle(&mut rx).await;

        assert_eq!(f.host.requests().len(), 2);
        assert_eq!(f.host.query_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_polling() {
        let mut f = fixture(true, true);
        f.host.push_liveness(std::iter::repeat(Ok(true)).take(100));

        f.supervisor.launch(&f.registry, &f.session).unwrap();
        tokio::task::yield_now().await;
        assert_eq!(f.host.query_count(), 1);

        f.supervisor.shutdown();
        assert_eq!(f.supervisor.state(), LaunchState::Idle);

        tokio::time::sleep(DEFAULT_POLL_INTERVAL * 10).await;
        assert_eq!(f.host.query_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_polling() {
        let mut f = fixture(true, true);
        f.host.push_liveness(std::iter::repeat(Ok(true)).take(100));

        f.supervisor.launch(&f.registry, &f.session).unwrap();
        tokio::task::yield_now().await;

        let host = f.host.clone();
        drop(f);

        tokio::time::sleep(DEFAULT_POLL_INTERVAL * 10).await;
        assert_eq!(host.query_count(), 1);
    }
}
