use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::collections::HashMap;
use tracing::{debug, warn};

/// A launched job: every stage of one command line, sharing a process group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Process group of all stages; the first stage leads it.
    pub pgid: Pid,
    /// Stage pids in pipeline order.
    pub pids: Vec<Pid>,
    pub cmdline: String,
}

impl Job {
    /// The rightmost stage, the one a foreground wait observes.
    pub fn primary(&self) -> Pid {
        self.pids[self.pids.len() - 1]
    }

    /// Stages feeding the primary one through the pipe.
    pub fn upstream(&self) -> &[Pid] {
        &self.pids[..self.pids.len() - 1]
    }
}

/// Processes nobody waits on explicitly, keyed by pid, with their command line.
#[derive(Debug, Default)]
pub struct JobList {
    pub procs: HashMap<Pid, String>,
}

impl JobList {
    /// Creates a new, empty job list.
    pub fn new() -> Self {
        JobList::default()
    }

    pub fn len(&self) -> usize {
        self.procs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }
}

/// Initializes and returns a new job list.
pub fn init_jobs() -> JobList {
    JobList::new()
}

/// Adds a process to the job list.
pub fn add_job(job_list: &mut JobList, pid: Pid, cmdline: &str) -> bool {
    if pid.as_raw() < 1 {
        return false;
    }
    job_list.procs.insert(pid, cmdline.to_string());
    true
}

/// Deletes the process with the given pid from the job list.
pub fn delete_job(job_list: &mut JobList, pid: Pid) -> bool {
    job_list.procs.remove(&pid).is_some()
}

/// Hands every stage of `job` over to asynchronous reaping.
pub fn detach_job(job_list: &mut JobList, job: &Job) {
    for &pid in &job.pids {
        add_job(job_list, pid, &job.cmdline);
    }
}

/// Collects every listed process that has terminated, without blocking.
///
/// Returns the pids reaped by this call.
pub fn reap_jobs(job_list: &mut JobList) -> Vec<Pid> {
    let mut reaped = Vec::new();
    if job_list.is_empty() {
        return reaped;
    }
    for (&pid, cmdline) in &job_list.procs {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => {}
            Ok(WaitStatus::Exited(_, code)) => {
                debug!(pid = pid.as_raw(), code, cmd = %cmdline, "background process exited");
                reaped.push(pid);
            }
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                debug!(pid = pid.as_raw(), signal = sig.as_str(), cmd = %cmdline, "background process killed");
                reaped.push(pid);
            }
            Ok(_) => {}
            // Already collected elsewhere.
            Err(Errno::ECHILD) => reaped.push(pid),
            Err(e) => warn!(pid = pid.as_raw(), error = %e, "waitpid failed"),
        }
    }
    for pid in &reaped {
        delete_job(job_list, *pid);
    }
    reaped
}
