//! Launch supervision: the host capability, the state machine that drives
//! it, and the ephemeral notices it raises.

mod host;
mod notice;
mod supervisor;

pub use host::{HostConfig, LaunchHost, LaunchRequest, ProcessHost, ScriptedHost};
pub use notice::{Notice, NoticeBoard};
pub use supervisor::{
    LaunchState, LaunchSupervisor, SupervisorConfig, DEFAULT_NOTICE_WINDOW, DEFAULT_POLL_INTERVAL,
};
