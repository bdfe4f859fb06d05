//! Process image replacement.
//!
//! The final step of container setup: resolve the command against `PATH`
//! inside the new root and `execve(2)` it. Success never returns.

use std::convert::Infallible;
use std::ffi::{CString, OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use nsrun_common::error::{NsrunError, Result};

/// Replaces the calling process with `command`, using exactly `env`.
///
/// `command[0]` is looked up in the `PATH` entry of `env`; names containing
/// a slash are taken relative to the current directory.
///
/// # Errors
///
/// Returns [`NsrunError::NoCommandSpecified`] for an empty command, or
/// [`NsrunError::Exec`] if the program cannot be found or exec'd.
pub fn replace_process(command: &[String], env: &[(OsString, OsString)]) -> Result<Infallible> {
    let program = command.first().ok_or(NsrunError::NoCommandSpecified)?;
    let cwd = std::env::current_dir().map_err(|e| NsrunError::Exec {
        program: program.clone(),
        message: format!("cannot read working directory: {e}"),
    })?;
    let binary = resolve_program(program, env, &cwd)?;

    let path = c_string(binary.as_os_str())?;
    let argv = command
        .iter()
        .map(|arg| c_string(OsStr::new(arg)))
        .collect::<Result<Vec<_>>>()?;
    let envp = env
        .iter()
        .map(|(key, value)| env_entry(key, value))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(binary = %binary.display(), argc = argv.len(), "replacing process image");
    nix::unistd::execve(&path, &argv, &envp).map_err(|e| NsrunError::Exec {
        program: program.clone(),
        message: e.to_string(),
    })
}

/// Finds the executable `program` names, searching the `PATH` in `env`.
///
/// # Errors
///
/// Returns [`NsrunError::Exec`] if no executable matches.
pub fn resolve_program(
    program: &str,
    env: &[(OsString, OsString)],
    cwd: &Path,
) -> Result<PathBuf> {
    let search_path = env
        .iter()
        .find(|(key, _)| key == "PATH")
        .map(|(_, value)| value.clone());
    which::which_in(program, search_path, cwd).map_err(|e| NsrunError::Exec {
        program: program.to_owned(),
        message: e.to_string(),
    })
}

/// Converts an OS string to a C string.
///
/// # Errors
///
/// Returns [`NsrunError::Config`] if the value contains a NUL byte.
pub fn c_string(value: &OsStr) -> Result<CString> {
    CString::new(value.as_bytes()).map_err(|_| NsrunError::Config {
        message: format!("{} contains a NUL byte", value.to_string_lossy()),
    })
}

/// Formats a `KEY=VALUE` environment entry.
///
/// # Errors
///
/// Returns [`NsrunError::Config`] if either half contains a NUL byte.
pub fn env_entry(key: &OsStr, value: &OsStr) -> Result<CString> {
    let mut entry = key.to_owned();
    entry.push("=");
    entry.push(value);
    c_string(&entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_entry_joins_with_equals() {
        let entry = env_entry(OsStr::new("PATH"), OsStr::new("/bin")).expect("entry");
        assert_eq!(entry.as_bytes(), b"PATH=/bin");
    }

    #[test]
    fn nul_bytes_are_rejected() {
        let err = c_string(OsStr::new("a\0b")).unwrap_err();
        assert!(matches!(err, NsrunError::Config { .. }));
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = replace_process(&[], &[]).unwrap_err();
        assert!(matches!(err, NsrunError::NoCommandSpecified));
    }

    fn executable(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
        path
    }

    #[test]
    fn unknown_program_is_an_exec_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = vec![(OsString::from("PATH"), dir.path().as_os_str().to_owned())];
        let err = replace_process(&["nsrun-no-such-program".into()], &env).unwrap_err();
        assert!(matches!(
            err,
            NsrunError::Exec { ref program, .. } if program == "nsrun-no-such-program"
        ));
    }

    #[test]
    fn relative_program_resolves_against_working_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = executable(dir.path(), "prog");
        let env = vec![(OsString::from("PATH"), OsString::from("/nonexistent"))];
        let resolved = resolve_program("./prog", &env, dir.path()).expect("resolve");
        assert_eq!(
            resolved.canonicalize().expect("canonical"),
            script.canonicalize().expect("canonical")
        );
    }

    #[test]
    fn bare_program_is_searched_in_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = executable(dir.path(), "prog");
        let env = vec![(OsString::from("PATH"), dir.path().as_os_str().to_owned())];
        let resolved = resolve_program("prog", &env, Path::new("/")).expect("resolve");
        assert_eq!(resolved, script);
    }
}
