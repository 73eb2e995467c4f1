//! The executor: spawn, monitor, kill, and batch delegate runs.

use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use emdx_config::EmdxConfig;
use emdx_core::enums::{ExecStatus, SourceKind};
use emdx_core::execution::Execution;
use emdx_core::idgen::{branch_name, generate_execution_id, slug_from_prompt, worktree_name};
use emdx_git::repo::current_branch;
use emdx_git::WorktreeManager;
use emdx_storage::{SaveOptions, SqliteStore};

use crate::error::{ExecError, Result};
use crate::heartbeat::spawn_heartbeat;
use crate::job::DelegateJob;
use crate::postprocess::{detect_pr_url, push_and_maybe_pr, VcsHost};
use crate::preflight::run_preflight;
use crate::reader::spawn_reader;
use crate::runner::AgentRunner;
use crate::tail::TailBuffer;
use crate::terminal::TerminalGuard;

/// Marker line separating agent chatter from the final assistant message.
pub const RESULT_MARKER: &str = "---RESULT---";

/// Branch prefix for isolated runs.
const BRANCH_PREFIX: &str = "emdx";

/// Attempts at worktree/branch name generation before giving up.
const WORKTREE_ATTEMPTS: u32 = 5;

/// Monitor poll interval while the child runs.
const MONITOR_POLL: Duration = Duration::from_millis(100);

/// Capacity of the live-stream subscriber queue, in chunks.
const STREAM_QUEUE_CHUNKS: usize = 256;

/// Terminal summary of one finished run.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub execution_id: String,
    pub status: ExecStatus,
    pub exit_code: i32,
    /// Document the captured output was saved to, when substantive.
    pub doc_id: Option<i64>,
    pub pr_url: Option<String>,
}

/// Handle returned by [`Executor::spawn`].
///
/// The execution runs regardless of what happens to the handle; dropping it
/// only detaches the caller. `wait` joins the monitor thread for the
/// outcome; `take_stream` hands out the live output queue.
pub struct ExecHandle {
    pub execution_id: String,
    join: Option<JoinHandle<Result<ExecutionOutcome>>>,
    stream: Option<Receiver<Vec<u8>>>,
}

impl ExecHandle {
    /// Blocks until the execution reaches a terminal state.
    pub fn wait(mut self) -> Result<ExecutionOutcome> {
        match self.join.take() {
            Some(join) => join
                .join()
                .unwrap_or_else(|_| Err(ExecError::SpawnFailed("monitor thread panicked".into()))),
            None => Err(ExecError::SpawnFailed("execution already waited".into())),
        }
    }

    /// Returns `true` once the monitor thread has finished.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map(|j| j.is_finished()).unwrap_or(true)
    }

    /// Takes the bounded live-output queue. Chunks arrive in per-stream
    /// read order; a slow consumer loses chunks rather than stalling the
    /// readers (the log file keeps everything).
    pub fn take_stream(&mut self) -> Option<Receiver<Vec<u8>>> {
        self.stream.take()
    }
}

/// Per-execution state shared with kill/tail while the child runs.
struct Inflight {
    pid: i32,
    kill_requested: Arc<AtomicBool>,
    tail: Arc<Mutex<TailBuffer>>,
}

/// The delegate executor.
///
/// Holds the configuration, the store, and the two plugin seams. No global
/// state: construct one at system init and pass it where needed.
pub struct Executor {
    config: EmdxConfig,
    store: Arc<SqliteStore>,
    runner: Arc<dyn AgentRunner>,
    vcs: Option<Arc<dyn VcsHost>>,
    inflight: Arc<Mutex<HashMap<String, Inflight>>>,
}

impl Executor {
    pub fn new(
        config: EmdxConfig,
        store: Arc<SqliteStore>,
        runner: Arc<dyn AgentRunner>,
        vcs: Option<Arc<dyn VcsHost>>,
    ) -> Self {
        Self {
            config,
            store,
            runner,
            vcs,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Reconciles orphaned rows left by a previous engine instance.
    ///
    /// Called once at startup by the host; also reachable on demand via
    /// `maintain cleanup`.
    pub fn recover(&self) -> Result<Vec<String>> {
        crate::recovery::reconcile_stale_executions(
            &self.store,
            crate::recovery::DEFAULT_STALE_THRESHOLD,
        )
    }

    /// Launches a job and returns once the child is running.
    ///
    /// The monitor thread owns the rest of the lifecycle: timeout, kill,
    /// completion capture, postprocess, cleanup.
    pub fn spawn(&self, job: DelegateJob) -> Result<ExecHandle> {
        let preflight = run_preflight(&self.config, self.runner.as_ref(), &job)?;

        // Unique id: wall clock + pid + hash suffix, retried on the
        // (vanishingly unlikely) duplicate.
        let host_pid = std::process::id();
        let mut execution_id = None;
        for nonce in 0..WORKTREE_ATTEMPTS {
            let candidate = generate_execution_id(Utc::now(), host_pid, nonce);
            match self.store.get_execution(&candidate) {
                Err(e) if e.is_not_found() => {
                    execution_id = Some(candidate);
                    break;
                }
                Ok(_) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        let execution_id = execution_id.ok_or(ExecError::WorktreeCollision {
            attempts: WORKTREE_ATTEMPTS,
        })?;

        let log_path = self.config.log_dir.join(format!("{execution_id}.log"));
        let mut row = Execution::pending(
            execution_id.clone(),
            job.prompt.clone(),
            log_path.display().to_string(),
        );
        row.tool_allowlist = job.tool_allowlist.clone();
        row.model = job.model.clone();
        row.working_dir = job
            .working_dir
            .as_ref()
            .map(|d| d.display().to_string());
        self.store.insert_execution(&row)?;

        // Isolation after the row exists, so a collision is recorded on it.
        let worktree = if job.mode.needs_worktree() {
            let repo_root = preflight
                .repo_root
                .clone()
                .expect("preflight resolves repo for isolated modes");
            let manager =
                WorktreeManager::new(repo_root, self.config.state_dir.join("worktrees"));
            match create_isolated_worktree(&manager, &job.prompt, &execution_id) {
                Ok(worktree) => {
                    self.store.set_execution_worktree(
                        &execution_id,
                        &worktree.path.display().to_string(),
                        &worktree.branch,
                    )?;
                    Some((manager, worktree))
                }
                Err(e) => {
                    self.store.complete_execution(
                        &execution_id,
                        ExecStatus::Failed,
                        Some(-1),
                        Some(&e.to_string()),
                    )?;
                    return Err(e);
                }
            }
        } else {
            None
        };

        let working_dir: PathBuf = match worktree {
            Some((_, ref wt)) => wt.path.clone(),
            None => job
                .working_dir
                .clone()
                .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))),
        };

        // Launch. The terminal guard brackets the spawn: some agent
        // binaries clobber termios during their own startup.
        let child = {
            let _guard = TerminalGuard::new();
            let mut command = Command::new(&preflight.binary);
            command
                .args(self.runner.build_args(&job))
                .current_dir(&working_dir)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            constrain_env(&mut command, &execution_id);
            #[cfg(unix)]
            {
                use std::os::unix::process::CommandExt;
                // Own process group so kill reaches grandchildren too.
                command.process_group(0);
            }
            command.spawn()
        };

        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                self.store.complete_execution(
                    &execution_id,
                    ExecStatus::Failed,
                    Some(-1),
                    Some(&format!("spawn failed: {e}")),
                )?;
                return Err(ExecError::SpawnFailed(e.to_string()));
            }
        };

        let pid = child.id() as i32;
        self.store.mark_execution_running(&execution_id, pid)?;
        info!(execution = %execution_id, pid, "agent launched");

        // Wire the log file, tail ring, readers, and heartbeat.
        let log_file = Arc::new(Mutex::new(File::create(&log_path)?));
        let tail = Arc::new(Mutex::new(TailBuffer::new(self.config.tail_buffer_bytes)));
        let (stream_tx, stream_rx) = sync_channel::<Vec<u8>>(STREAM_QUEUE_CHUNKS);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecError::SpawnFailed("stdout pipe missing".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecError::SpawnFailed("stderr pipe missing".into()))?;

        let stdout_reader = spawn_reader(
            "stdout",
            stdout,
            Arc::clone(&log_file),
            Arc::clone(&tail),
            Some(stream_tx),
        );
        let stderr_reader = spawn_reader(
            "stderr",
            stderr,
            Arc::clone(&log_file),
            Arc::clone(&tail),
            None,
        );

        let heartbeat = spawn_heartbeat(
            Arc::clone(&self.store),
            execution_id.clone(),
            Duration::from_secs(self.config.heartbeat_interval_s),
        );

        let kill_requested = Arc::new(AtomicBool::new(false));
        self.inflight.lock().unwrap().insert(
            execution_id.clone(),
            Inflight {
                pid,
                kill_requested: Arc::clone(&kill_requested),
                tail: Arc::clone(&tail),
            },
        );

        let monitor = MonitorContext {
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            vcs: self.vcs.clone(),
            inflight: Arc::clone(&self.inflight),
            agent_type: self.runner.agent_type().to_string(),
            execution_id: execution_id.clone(),
            job,
            worktree,
            log_path,
            pid,
            kill_requested,
            tail,
        };
        let join = std::thread::Builder::new()
            .name(format!("emdx-monitor-{execution_id}"))
            .spawn(move || monitor.run(child, stdout_reader, stderr_reader, heartbeat))
            .expect("monitor thread spawn");

        Ok(ExecHandle {
            execution_id,
            join: Some(join),
            stream: Some(stream_rx),
        })
    }

    /// Current row state for an execution.
    pub fn status(&self, execution_id: &str) -> Result<Execution> {
        Ok(self.store.get_execution(execution_id)?)
    }

    /// The most recent output: live ring for running executions, stored
    /// tail otherwise.
    pub fn tail(&self, execution_id: &str) -> Result<String> {
        if let Some(entry) = self.inflight.lock().unwrap().get(execution_id) {
            return Ok(entry.tail.lock().unwrap().contents());
        }
        let row = self.store.get_execution(execution_id)?;
        Ok(row.stdout_tail.unwrap_or_default())
    }

    /// Requests cancellation of a running execution.
    ///
    /// In-process runs are flagged for the monitor, which handles the
    /// graceful TERM / grace window / KILL sequence and records
    /// status=killed, exit 130. Rows owned by a dead engine are signalled
    /// directly and finalized here.
    pub fn kill(&self, execution_id: &str) -> Result<()> {
        if let Some(entry) = self.inflight.lock().unwrap().get(execution_id) {
            entry.kill_requested.store(true, Ordering::SeqCst);
            return Ok(());
        }

        let row = self.store.get_execution(execution_id)?;
        if row.status != ExecStatus::Running {
            return Err(ExecError::Storage(emdx_storage::StorageError::conflict(
                format!("execution {execution_id} is not running"),
            )));
        }
        if let Some(pid) = row.pid {
            terminate_group(pid, Duration::from_secs(self.config.kill_grace_s));
        }
        self.store.complete_execution(
            execution_id,
            ExecStatus::Killed,
            Some(130),
            Some("killed by operator"),
        )?;
        Ok(())
    }

    /// Runs a set of jobs with bounded concurrency, returning one outcome
    /// slot per job in order.
    ///
    /// `concurrency` is clamped to the configured maximum. Jobs are
    /// independent; a failure in one never cancels the others.
    pub fn run_batch(
        &self,
        jobs: Vec<DelegateJob>,
        concurrency: usize,
    ) -> Vec<Result<ExecutionOutcome>> {
        let limit = concurrency.clamp(1, self.config.max_concurrent);
        let total = jobs.len();
        let mut queue = jobs.into_iter().enumerate().collect::<Vec<_>>();
        queue.reverse();

        let mut outcomes: Vec<Option<Result<ExecutionOutcome>>> =
            (0..total).map(|_| None).collect();
        let mut active: Vec<(usize, ExecHandle)> = Vec::new();

        loop {
            while active.len() < limit {
                let Some((index, job)) = queue.pop() else { break };
                match self.spawn(job) {
                    Ok(handle) => active.push((index, handle)),
                    Err(e) => outcomes[index] = Some(Err(e)),
                }
            }
            if active.is_empty() {
                break;
            }

            std::thread::sleep(Duration::from_millis(50));
            let mut still_active = Vec::with_capacity(active.len());
            for (index, handle) in active {
                if handle.is_finished() {
                    outcomes[index] = Some(handle.wait());
                } else {
                    still_active.push((index, handle));
                }
            }
            active = still_active;
        }

        outcomes
            .into_iter()
            .map(|slot| slot.expect("every job produced an outcome"))
            .collect()
    }

    /// Cancels every execution this engine currently has in flight.
    pub fn kill_all(&self) -> Vec<String> {
        let ids: Vec<String> = self.inflight.lock().unwrap().keys().cloned().collect();
        for id in &ids {
            let _ = self.kill(id);
        }
        ids
    }
}

/// Everything the monitor thread needs; moved into the thread whole.
struct MonitorContext {
    config: EmdxConfig,
    store: Arc<SqliteStore>,
    vcs: Option<Arc<dyn VcsHost>>,
    inflight: Arc<Mutex<HashMap<String, Inflight>>>,
    agent_type: String,
    execution_id: String,
    job: DelegateJob,
    worktree: Option<(WorktreeManager, emdx_git::Worktree)>,
    log_path: PathBuf,
    pid: i32,
    kill_requested: Arc<AtomicBool>,
    tail: Arc<Mutex<TailBuffer>>,
}

impl MonitorContext {
    fn run(
        self,
        mut child: Child,
        stdout_reader: JoinHandle<std::io::Result<u64>>,
        stderr_reader: JoinHandle<std::io::Result<u64>>,
        heartbeat: crate::heartbeat::HeartbeatHandle,
    ) -> Result<ExecutionOutcome> {
        let timeout = self
            .job
            .timeout
            .unwrap_or(Duration::from_secs(self.config.execution_timeout_s));
        let deadline = Instant::now() + timeout;
        let grace = Duration::from_secs(self.config.kill_grace_s);

        let mut killed = false;
        let mut timed_out = false;
        let exit_status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    warn!(execution = %self.execution_id, error = %e, "wait failed");
                    std::thread::sleep(MONITOR_POLL);
                    continue;
                }
            }
            if !killed && !timed_out {
                if self.kill_requested.load(Ordering::SeqCst) {
                    killed = true;
                    terminate_group_async(&mut child, self.pid, grace);
                } else if Instant::now() >= deadline {
                    timed_out = true;
                    terminate_group_async(&mut child, self.pid, grace);
                }
            }
            std::thread::sleep(MONITOR_POLL);
        };

        // Readers drain whatever the child left in the pipes before we
        // finalize anything.
        heartbeat.stop();
        let _ = stdout_reader.join();
        let _ = stderr_reader.join();

        let tail_text = self.tail.lock().unwrap().contents();
        self.store.set_execution_tail(&self.execution_id, &tail_text)?;

        let child_code = exit_status.code().unwrap_or(-1);
        let (status, exit_code, reason) = if killed {
            (ExecStatus::Killed, 130, Some("killed by operator".to_string()))
        } else if timed_out {
            (
                ExecStatus::Timeout,
                124,
                Some(format!("timed out after {}s", timeout.as_secs())),
            )
        } else if exit_status.success() {
            (ExecStatus::Completed, 0, None)
        } else {
            (
                ExecStatus::Failed,
                child_code,
                Some(format!("agent exited with code {child_code}")),
            )
        };
        self.store.complete_execution(
            &self.execution_id,
            status,
            Some(exit_code),
            reason.as_deref(),
        )?;
        // The entry must outlive row finalization; a late kill() must find
        // a terminal row, never a running one.
        self.inflight.lock().unwrap().remove(&self.execution_id);
        debug!(execution = %self.execution_id, %status, exit_code, "execution finished");

        // Capture and persist the result.
        let output = std::fs::read_to_string(&self.log_path).unwrap_or_default();
        let final_message = extract_final_message(&output);
        if let Some(usage) = extract_usage(&output) {
            self.store.set_execution_usage(
                &self.execution_id,
                usage.tokens_in,
                usage.tokens_out,
                usage.cost_usd,
            )?;
        }

        let mut doc_id = None;
        if status == ExecStatus::Completed
            && self.job.save_output
            && final_message.len() >= self.config.output_save_threshold_bytes
        {
            let mut tags = vec![self.agent_type.clone()];
            if detect_pr_url(&final_message).is_some() {
                tags.push("has-pr".to_string());
            }
            let title = format!("Delegate: {}", slug_from_prompt(&self.job.prompt));
            let saved = self.store.save_document(
                &title,
                &final_message,
                &SaveOptions {
                    tags,
                    source: Some((SourceKind::Execution, self.execution_id.clone())),
                    ..Default::default()
                },
            )?;
            self.store
                .set_execution_output_doc(&self.execution_id, saved)?;
            doc_id = Some(saved);
        }

        // PR/branch postprocess after a successful run.
        let mut pr_url = detect_pr_url(&final_message);
        if status == ExecStatus::Completed && self.job.mode.pushes() {
            let (manager, worktree) = self
                .worktree
                .as_ref()
                .expect("push modes always have a worktree");
            let base = current_branch(manager.repo_root()).unwrap_or_else(|_| "main".into());
            let title = self.job.prompt.lines().next().unwrap_or("delegate run");
            let body = format!("Automated delegate run `{}`.", self.execution_id);
            match push_and_maybe_pr(
                manager,
                worktree,
                &base,
                self.job.mode == crate::job::ExecMode::Pr,
                self.vcs.as_deref(),
                title,
                &body,
            ) {
                Ok(created) => {
                    if let Some(url) = created {
                        self.store.set_execution_pr_url(&self.execution_id, &url)?;
                        if let Some(doc) = doc_id {
                            self.store.add_tags(doc, &["has-pr".to_string()])?;
                        }
                        pr_url = Some(url);
                    }
                }
                Err(e) => {
                    // Completion stands as an event; the row flips to
                    // failed with the postprocess sub-kind in the reason.
                    self.store.complete_execution(
                        &self.execution_id,
                        ExecStatus::Failed,
                        Some(child_code),
                        Some(&format!("failed_postprocess: {e}")),
                    )?;
                    return Err(e);
                }
            }
        }

        // Worktree removal only for clean trees on explicit request.
        if self.job.cleanup {
            if let Some((manager, worktree)) = &self.worktree {
                match manager.is_clean(&worktree.path) {
                    Ok(true) => {
                        if let Err(e) = manager.remove(&worktree.path, false) {
                            warn!(execution = %self.execution_id, error = %e, "worktree removal failed");
                        }
                    }
                    Ok(false) => {
                        info!(execution = %self.execution_id, "worktree dirty, keeping");
                    }
                    Err(e) => {
                        warn!(execution = %self.execution_id, error = %e, "worktree state check failed");
                    }
                }
            }
        }

        match status {
            ExecStatus::Timeout => Err(ExecError::Timeout {
                execution_id: self.execution_id,
            }),
            ExecStatus::Killed => Err(ExecError::Killed {
                execution_id: self.execution_id,
            }),
            ExecStatus::Failed => Err(ExecError::NonZeroExit { code: child_code }),
            _ => Ok(ExecutionOutcome {
                execution_id: self.execution_id,
                status,
                exit_code,
                doc_id,
                pr_url,
            }),
        }
    }
}

/// Creates the isolated worktree, retrying the generated names.
fn create_isolated_worktree(
    manager: &WorktreeManager,
    prompt: &str,
    execution_id: &str,
) -> Result<emdx_git::Worktree> {
    for attempt in 0..WORKTREE_ATTEMPTS {
        let branch = branch_name(BRANCH_PREFIX, prompt, attempt);
        let name = worktree_name(prompt, &format!("{execution_id}-{attempt}"));
        match manager.add(&name, &branch) {
            Ok(worktree) => return Ok(worktree),
            Err(e) => {
                debug!(attempt, error = %e, "worktree attempt failed");
            }
        }
    }
    Err(ExecError::WorktreeCollision {
        attempts: WORKTREE_ATTEMPTS,
    })
}

/// Builds the constrained child environment: PATH and locale only, plus
/// the execution id for the cooperating sidecar.
fn constrain_env(command: &mut Command, execution_id: &str) {
    command.env_clear();
    for key in ["PATH", "HOME", "TERM", "LANG", "LC_ALL"] {
        if let Ok(value) = std::env::var(key) {
            command.env(key, value);
        }
    }
    command.env("EMDX_EXECUTION_ID", execution_id);
}

/// Graceful group termination for a child owned by another engine: TERM
/// the group, wait out the grace window, then KILL.
pub fn terminate_group(pid: i32, grace: Duration) {
    signal_group(pid, false);
    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if !crate::recovery::pid_alive(pid) {
            return;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    signal_group(pid, true);
}

/// Graceful group termination when we own the `Child` handle: TERM, wait
/// out the grace window, then KILL. The caller's wait loop reaps.
fn terminate_group_async(child: &mut Child, pid: i32, grace: Duration) {
    signal_group(pid, false);
    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    signal_group(pid, true);
    let _ = child.kill();
}

#[cfg(unix)]
fn signal_group(pid: i32, force: bool) {
    let signal = if force { libc::SIGKILL } else { libc::SIGTERM };
    // Negative pid addresses the whole process group.
    unsafe {
        libc::kill(-pid, signal);
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: i32, _force: bool) {}

/// The final assistant message: everything after the last result marker
/// line, or the whole (trimmed) output when no marker was emitted.
pub fn extract_final_message(output: &str) -> String {
    match output.rfind(RESULT_MARKER) {
        Some(pos) => output[pos + RESULT_MARKER.len()..].trim().to_string(),
        None => output.trim().to_string(),
    }
}

/// Usage figures the agent may emit as a trailing JSON line.
struct Usage {
    tokens_in: i64,
    tokens_out: i64,
    cost_usd: Option<f64>,
}

/// Scans backwards for a JSON line carrying token counts.
fn extract_usage(output: &str) -> Option<Usage> {
    for line in output.lines().rev().take(20) {
        let line = line.trim();
        if !line.starts_with('{') {
            continue;
        }
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        let tokens_in = value.get("tokens_in").and_then(|v| v.as_i64());
        let tokens_out = value.get("tokens_out").and_then(|v| v.as_i64());
        if let (Some(tokens_in), Some(tokens_out)) = (tokens_in, tokens_out) {
            return Some(Usage {
                tokens_in,
                tokens_out,
                cost_usd: value.get("cost_usd").and_then(|v| v.as_f64()),
            });
        }
    }
    None
}
