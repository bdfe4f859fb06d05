//! Process spawning inside isolated namespaces.
//!
//! [`ProcessExecutor`] clones a child directly into the requested
//! namespaces, has it exec the self-invocation program, and blocks until
//! the child reports over the readiness pipe that its setup is complete.

use std::ffi::{CString, OsStr, OsString};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use libc::c_char;
use nix::errno::Errno;
use nix::sched::{CloneCb, clone};
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;

use nsrun_common::constants::{
    DEFAULT_HANDSHAKE_TIMEOUT_MS, DEFAULT_STACK_SIZE, HOSTNAME_ENV, SYNC_FD, WORKDIR_ENV,
};
use nsrun_common::error::{NsrunError, Result};
use nsrun_core::namespace::NamespaceFlags;

use crate::container::ContainerProcess;
use crate::exec::{c_string, env_entry};
use crate::handshake::{self, ReadinessSender};
use crate::launcher::{ProcSelfExe, SelfInvocation};

/// Exit status of a cloned child whose descriptor setup failed.
const SETUP_EXIT: i32 = 126;
/// Exit status of a cloned child whose `execve(2)` failed.
const EXEC_EXIT: i32 = 127;

/// Parent-side spawner for container processes.
///
/// The namespace selection is fixed at construction.
#[derive(Debug)]
pub struct ProcessExecutor {
    namespaces: NamespaceFlags,
    launcher: Arc<dyn SelfInvocation>,
    stdio: [Option<OwnedFd>; 3],
    hostname: Option<String>,
    working_dir: Option<PathBuf>,
    env: Vec<String>,
    handshake_timeout: Option<Duration>,
    stack_size: usize,
}

impl ProcessExecutor {
    /// Creates an executor that re-executes this binary in `namespaces`.
    ///
    /// Standard streams are inherited and the handshake deadline is the
    /// runtime default.
    #[must_use]
    pub fn new(namespaces: NamespaceFlags) -> Self {
        Self {
            namespaces,
            launcher: Arc::new(ProcSelfExe),
            stdio: [None, None, None],
            hostname: None,
            working_dir: None,
            env: Vec::new(),
            handshake_timeout: Some(Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS)),
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    /// Replaces the self-invocation strategy.
    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn SelfInvocation>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Sets the hostname handed to the child. Only used with a UTS namespace.
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Sets the directory the command starts in, inside the new root.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Adds `KEY=VALUE` entries to the child's environment.
    #[must_use]
    pub fn with_env(mut self, env: Vec<String>) -> Self {
        self.env = env;
        self
    }

    /// Sets how long to wait for readiness. `None` waits forever.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the size of the stack given to the cloned child.
    #[must_use]
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    /// Substitutes the child's standard streams.
    pub fn set_io(
        &mut self,
        stdin: impl Into<OwnedFd>,
        stdout: impl Into<OwnedFd>,
        stderr: impl Into<OwnedFd>,
    ) {
        self.stdio = [Some(stdin.into()), Some(stdout.into()), Some(stderr.into())];
    }

    /// Namespaces this executor creates.
    #[must_use]
    pub const fn namespaces(&self) -> NamespaceFlags {
        self.namespaces
    }

    /// Spawns `command` inside `rootfs` and waits for its setup to finish.
    ///
    /// Returns only once the child has written the readiness byte; the
    /// record is `Running`. The rootfs is not checked here: a missing
    /// rootfs makes the child's setup fail, which surfaces as a handshake
    /// error.
    ///
    /// # Errors
    ///
    /// - [`NsrunError::NoCommandSpecified`] if `command` is empty (nothing is spawned).
    /// - [`NsrunError::NotImplemented`] for network or user namespaces.
    /// - [`NsrunError::Config`] if the launcher pivots without a mount namespace.
    /// - [`NsrunError::Resource`] if the readiness pipe cannot be created.
    /// - [`NsrunError::Spawn`] if `clone(2)` fails.
    /// - [`NsrunError::Handshake`] if the child dies, closes the pipe, sends
    ///   a wrong byte or misses the deadline. The child is killed and reaped.
    pub fn create_container(&self, command: &[String], rootfs: &Path) -> Result<ContainerProcess> {
        if command.is_empty() {
            return Err(NsrunError::NoCommandSpecified);
        }
        self.namespaces.validate()?;
        if self.launcher.pivots_root() && !self.namespaces.mount {
            return Err(NsrunError::Config {
                message: "a mount namespace is required to pivot into the rootfs".into(),
            });
        }

        let image = ExecImage::new(
            self.launcher.program(),
            self.launcher.arguments(rootfs, command),
            self.child_environment()?,
        )?;

        let (receiver, sender) = handshake::channel()?;
        let spawned = self.spawn(&image, &sender);
        // The child holds its own copy; ours must go or EOF never arrives.
        drop(sender);
        let pid = spawned?;
        tracing::debug!(
            pid = pid.as_raw(),
            rootfs = %rootfs.display(),
            "child cloned, awaiting readiness"
        );

        if let Err(failure) = receiver.wait(self.handshake_timeout) {
            tracing::warn!(pid = pid.as_raw(), %failure, "child did not signal readiness");
            kill_and_reap(pid);
            return Err(NsrunError::Handshake {
                pid: pid.as_raw(),
                reason: failure.to_string(),
            });
        }

        tracing::info!(pid = pid.as_raw(), cmd = ?command, "container process running");
        Ok(ContainerProcess::running(pid, self.namespaces, command.to_vec()))
    }

    /// Inherited environment plus configured entries and child settings.
    ///
    /// Configured entries override inherited variables of the same name.
    fn child_environment(&self) -> Result<Vec<CString>> {
        let overridden: Vec<&str> = self.env.iter().map(|entry| env_key(entry)).collect();
        let mut envp = std::env::vars_os()
            .filter(|(key, _)| key != HOSTNAME_ENV && key != WORKDIR_ENV)
            .filter(|(key, _)| !overridden.iter().any(|o| key == *o))
            .map(|(key, value)| env_entry(&key, &value))
            .collect::<Result<Vec<_>>>()?;
        for entry in &self.env {
            envp.push(c_string(OsStr::new(entry))?);
        }
        if self.namespaces.uts {
            if let Some(hostname) = &self.hostname {
                envp.push(env_entry(OsStr::new(HOSTNAME_ENV), OsStr::new(hostname))?);
            }
        }
        if let Some(dir) = &self.working_dir {
            envp.push(env_entry(OsStr::new(WORKDIR_ENV), dir.as_os_str())?);
        }
        Ok(envp)
    }

    fn spawn(&self, image: &ExecImage, sender: &ReadinessSender) -> Result<Pid> {
        let program = image.program.as_ptr();
        let argv = null_terminated(&image.argv);
        let envp = null_terminated(&image.envp);
        let sync_fd = sender.as_raw_fd();
        let stdio = self
            .stdio
            .each_ref()
            .map(|fd| fd.as_ref().map(AsRawFd::as_raw_fd));
        let mut stack = vec![0u8; self.stack_size];

        let callback: CloneCb<'_> = Box::new(move || {
            // SAFETY: runs in the freshly cloned child, which is single
            // threaded; the pointers reference `image`, which outlives the
            // clone call, and only async-signal-safe calls are made.
            unsafe { enter_child(program, argv.as_ptr(), envp.as_ptr(), sync_fd, stdio) }
        });

        // SAFETY: without CLONE_VM the child gets its own copy of the
        // address space, and the callback never returns into Rust code.
        let pid = unsafe {
            clone(
                callback,
                &mut stack,
                self.namespaces.to_clone_flags(),
                Some(libc::SIGCHLD),
            )
        }
        .map_err(|e| NsrunError::Spawn {
            program: self.launcher.program().to_path_buf(),
            source: e.into(),
        })?;
        Ok(pid)
    }
}

/// Program, arguments and environment, converted before cloning so the
/// child never allocates.
#[derive(Debug)]
struct ExecImage {
    program: CString,
    argv: Vec<CString>,
    envp: Vec<CString>,
}

impl ExecImage {
    fn new(program: &Path, args: Vec<OsString>, envp: Vec<CString>) -> Result<Self> {
        let program = c_string(program.as_os_str())?;
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(program.clone());
        for arg in args {
            argv.push(c_string(&arg)?);
        }
        Ok(Self {
            program,
            argv,
            envp,
        })
    }
}

/// Name part of a `KEY=VALUE` entry. An entry without `=` is all key.
fn env_key(entry: &str) -> &str {
    entry.split_once('=').map_or(entry, |(key, _)| key)
}

fn null_terminated(strings: &[CString]) -> Vec<*const c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

/// Installs descriptors and execs the launcher program. Never returns.
unsafe fn enter_child(
    program: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
    sync_fd: RawFd,
    stdio: [Option<RawFd>; 3],
) -> ! {
    // SAFETY: all calls are raw, async-signal-safe libc functions operating
    // on descriptors and pointers the parent prepared.
    unsafe {
        for (target, fd) in (0..).zip(stdio) {
            if let Some(fd) = fd {
                if libc::dup2(fd, target) == -1 {
                    libc::_exit(SETUP_EXIT);
                }
            }
        }
        // dup2 onto itself would keep close-on-exec set.
        if sync_fd == SYNC_FD {
            if libc::fcntl(sync_fd, libc::F_SETFD, 0) == -1 {
                libc::_exit(SETUP_EXIT);
            }
        } else if libc::dup2(sync_fd, SYNC_FD) == -1 {
            libc::_exit(SETUP_EXIT);
        }
        libc::execve(program, argv, envp);
        libc::_exit(EXEC_EXIT)
    }
}

/// Blocks until `pid` exits and returns its exit code.
///
/// A process killed by a signal reports `128 + signal`.
///
/// # Errors
///
/// Returns [`NsrunError::Wait`] if `waitpid(2)` fails, for example because
/// the process is not a child of this one or was already reaped.
pub fn wait_for_exit(pid: Pid) -> Result<i32> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(code),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(128 + signal as i32),
            Ok(_) | Err(Errno::EINTR) => {}
            Err(e) => {
                return Err(NsrunError::Wait {
                    pid: pid.as_raw(),
                    source: e.into(),
                });
            }
        }
    }
}

/// Kills and reaps a child that failed the handshake.
fn kill_and_reap(pid: Pid) {
    if let Err(e) = kill(pid, Signal::SIGKILL) {
        tracing::warn!(pid = pid.as_raw(), error = %e, "failed to kill child");
    }
    match wait_for_exit(pid) {
        Ok(code) => tracing::debug!(pid = pid.as_raw(), code, "child reaped"),
        Err(e) => tracing::warn!(pid = pid.as_raw(), error = %e, "failed to reap child"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_starts_with_program() {
        let image = ExecImage::new(
            Path::new("/proc/self/exe"),
            vec!["child".into(), "/rootfs".into(), "/bin/true".into()],
            Vec::new(),
        )
        .expect("image");
        let argv: Vec<&[u8]> = image.argv.iter().map(|a| a.as_bytes()).collect();
        let expected: [&[u8]; 4] = [b"/proc/self/exe", b"child", b"/rootfs", b"/bin/true"];
        assert_eq!(argv, expected);
    }

    #[test]
    fn pointer_arrays_are_null_terminated() {
        let strings = vec![CString::new("a").unwrap(), CString::new("b").unwrap()];
        let ptrs = null_terminated(&strings);
        assert_eq!(ptrs.len(), 3);
        assert!(ptrs[2].is_null());
    }

    #[test]
    fn hostname_travels_only_with_uts_namespace() {
        let with_uts = ProcessExecutor::new(NamespaceFlags::default()).with_hostname("box");
        let env = with_uts.child_environment().expect("env");
        assert!(env.iter().any(|e| e.as_bytes() == b"NSRUN_HOSTNAME=box"));

        let without_uts = ProcessExecutor::new(NamespaceFlags {
            uts: false,
            ..NamespaceFlags::default()
        })
        .with_hostname("box");
        let env = without_uts.child_environment().expect("env");
        assert!(!env.iter().any(|e| e.as_bytes().starts_with(b"NSRUN_HOSTNAME=")));
    }

    #[test]
    fn configured_env_overrides_inherited_variable() {
        let inherited = std::env::var_os("PATH").expect("test environment has PATH");
        assert_ne!(inherited, "/custom/bin");
        let executor = ProcessExecutor::new(NamespaceFlags::default())
            .with_env(vec!["PATH=/custom/bin".into()]);
        let env = executor.child_environment().expect("env");
        let paths: Vec<_> = env
            .iter()
            .filter(|e| e.as_bytes().starts_with(b"PATH="))
            .collect();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].as_bytes(), b"PATH=/custom/bin");
    }

    #[test]
    fn env_key_stops_at_first_equals() {
        assert_eq!(env_key("A=b=c"), "A");
        assert_eq!(env_key("FLAG"), "FLAG");
    }

    #[test]
    fn configured_env_is_appended() {
        let executor =
            ProcessExecutor::new(NamespaceFlags::default()).with_env(vec!["GREETING=hi".into()]);
        let env = executor.child_environment().expect("env");
        assert_eq!(env.last().map(|e| e.as_bytes()), Some(&b"GREETING=hi"[..]));
    }

    #[test]
    fn empty_command_spawns_nothing() {
        let executor = ProcessExecutor::new(NamespaceFlags::default());
        let err = executor
            .create_container(&[], Path::new("/nonexistent"))
            .unwrap_err();
        assert!(matches!(err, NsrunError::NoCommandSpecified));
    }

    #[test]
    fn pivot_without_mount_namespace_is_rejected() {
        let executor = ProcessExecutor::new(NamespaceFlags {
            mount: false,
            ..NamespaceFlags::default()
        });
        let err = executor
            .create_container(&["/bin/true".into()], Path::new("/nonexistent"))
            .unwrap_err();
        assert!(matches!(err, NsrunError::Config { .. }));
    }

    #[test]
    fn reserved_namespaces_fail_fast() {
        let executor = ProcessExecutor::new(NamespaceFlags {
            net: true,
            ..NamespaceFlags::default()
        });
        let err = executor
            .create_container(&["/bin/true".into()], Path::new("/nonexistent"))
            .unwrap_err();
        assert!(matches!(err, NsrunError::NotImplemented { .. }));
    }
}
