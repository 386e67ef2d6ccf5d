use crate::error::ShellError;
use crate::jobs::{add_job, detach_job, reap_jobs, Job, JobList};
use crate::parser::CommandLine;
use crate::pipeline::launch_job;
use crate::signals::SIGNALS;
use crate::utils::report;
use nix::errno::Errno;
use nix::libc::STDIN_FILENO;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{self, alarm};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

pub const TIMEOUT_MESSAGE: &str = "Process terminated due to timeout.";

/// The SIGALRM countdown guarding a foreground job. Dropping it cancels the alarm.
#[derive(Debug)]
pub struct Countdown {
    secs: u32,
}

impl Countdown {
    /// Arms the alarm, or returns `None` when `secs` is zero.
    pub fn arm(secs: u32) -> Option<Self> {
        if secs == 0 {
            return None;
        }
        let _ = alarm::set(secs);
        debug!(secs, "countdown armed");
        Some(Countdown { secs })
    }

    pub fn disarm(self) {}
}

impl Drop for Countdown {
    fn drop(&mut self) {
        let _ = alarm::cancel();
        debug!(secs = self.secs, "countdown cancelled");
    }
}

/// How a command left the supervisor.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The foreground job's primary stage was reaped.
    Completed(WaitStatus),
    /// The countdown fired first; the job awaits [`Supervisor::terminate_expired`].
    TimedOut,
    /// Background job, left to the reaper.
    Detached,
    /// Nothing ran, or the wait failed. Already reported.
    Failed,
}

/// Runs jobs and owns the single foreground wait.
///
/// Per command: Idle, Armed (foreground only), Running, then Reaped or
/// Detached, and back to Idle.
pub struct Supervisor {
    job_list: Arc<Mutex<JobList>>,
    timeout_secs: u32,
    /// Stdin is a terminal that foreground jobs are handed.
    terminal: bool,
    /// A timed-out foreground job not yet terminated.
    expired: Option<Job>,
}

impl Supervisor {
    pub fn new(job_list: Arc<Mutex<JobList>>, timeout_secs: u32, terminal: bool) -> Self {
        Supervisor {
            job_list,
            timeout_secs,
            terminal,
            expired: None,
        }
    }

    /// Launches `line`, then waits for it (foreground) or detaches it (background).
    pub fn run(&mut self, line: &CommandLine) -> Outcome {
        let countdown = if line.background {
            None
        } else {
            Countdown::arm(self.timeout_secs)
        };

        let job = match launch_job(line, self.terminal && !line.background) {
            Ok(job) => job,
            Err(e) => {
                // A stage may have taken the terminal before its exec failed.
                self.restore_terminal();
                report(&e);
                return Outcome::Failed;
            }
        };

        if line.background {
            debug!(pgid = job.pgid.as_raw(), cmd = %job.cmdline, "detached");
            let mut jl = self.jobs();
            detach_job(&mut jl, &job);
            debug!(pending = jl.len(), "background processes tracked");
            return Outcome::Detached;
        }
        self.wait_foreground(job, countdown)
    }

    /// Blocks until the primary stage exits.
    ///
    /// The wait is interrupted by SIGINT and SIGALRM. A pending interrupt is
    /// forwarded to the job's group and the wait resumes; a pending timeout
    /// parks the job for [`Supervisor::terminate_expired`].
    fn wait_foreground(&mut self, job: Job, countdown: Option<Countdown>) -> Outcome {
        let primary = job.primary();
        let status = loop {
            if countdown.is_some() && SIGNALS.timeout_pending() {
                debug!(pgid = job.pgid.as_raw(), "foreground job timed out");
                self.expired = Some(job);
                return Outcome::TimedOut;
            }
            match waitpid(primary, None) {
                Ok(status @ (WaitStatus::Exited(..) | WaitStatus::Signaled(..))) => {
                    break Some(status)
                }
                Ok(_) => {}
                Err(Errno::EINTR) => {
                    if SIGNALS.interrupt_pending() && !SIGNALS.timeout_pending() {
                        debug!(pgid = job.pgid.as_raw(), "forwarding SIGINT");
                        let _ = killpg(job.pgid, Signal::SIGINT);
                    }
                }
                Err(e) => {
                    report(&ShellError::sys("wait", e));
                    break None;
                }
            }
        };
        if let Some(countdown) = countdown {
            countdown.disarm();
        }
        self.release(&job);

        match status {
            Some(status) => {
                debug!(?status, "foreground job finished");
                Outcome::Completed(status)
            }
            None => Outcome::Failed,
        }
    }

    /// Terminates the timed-out job's process group, reaps its primary stage
    /// and reports the timeout. Does nothing if no job timed out.
    pub fn terminate_expired(&mut self) {
        let Some(job) = self.expired.take() else {
            debug!("timeout with no job pending");
            return;
        };

        info!(pgid = job.pgid.as_raw(), cmd = %job.cmdline, "terminating timed-out job");
        if let Err(e) = killpg(job.pgid, Signal::SIGTERM) {
            report(&ShellError::sys("kill", e));
        }
        loop {
            match waitpid(job.primary(), None) {
                Ok(WaitStatus::Exited(..) | WaitStatus::Signaled(..)) => break,
                Ok(_) | Err(Errno::EINTR) => {}
                Err(e) => {
                    report(&ShellError::sys("wait", e));
                    break;
                }
            }
        }
        self.release(&job);
        println!("{}", TIMEOUT_MESSAGE);
    }

    /// Whether a timed-out job is waiting to be terminated.
    pub fn has_expired(&self) -> bool {
        self.expired.is_some()
    }

    /// Collects finished background processes.
    pub fn reap_background(&self) -> usize {
        reap_jobs(&mut self.jobs()).len()
    }

    /// Takes the terminal back and leaves any upstream stages to the reaper.
    fn release(&self, job: &Job) {
        self.restore_terminal();
        let mut jl = self.jobs();
        for &pid in job.upstream() {
            add_job(&mut jl, pid, &job.cmdline);
        }
        reap_jobs(&mut jl);
    }

    /// Makes the shell's own group the terminal's foreground group again.
    fn restore_terminal(&self) {
        if self.terminal {
            if let Err(e) = unistd::tcsetpgrp(STDIN_FILENO, unistd::getpgrp()) {
                debug!(error = %e, "could not take the terminal back");
            }
        }
    }

    fn jobs(&self) -> MutexGuard<'_, JobList> {
        self.job_list.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
