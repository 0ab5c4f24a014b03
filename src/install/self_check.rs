use log::debug;
use std::path::Path;

use crate::error::InstallError;
use crate::runtime::Runtime;

/// Flag the installed binary must accept with a zero exit status.
pub const VERSION_FLAG: &str = "--version";

/// Run `<installed> --version` and return the first line it printed.
#[tracing::instrument(skip(runtime))]
pub fn self_check<R: Runtime>(runtime: &R, installed: &Path) -> Result<String, InstallError> {
    let output = runtime
        .run(installed, &[VERSION_FLAG.to_string()])
        .map_err(|e| InstallError::SelfCheckFailed {
            path: installed.to_path_buf(),
            reason: format!("{:#}", e),
        })?;

    if !output.success() {
        let status = match output.code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        };
        let stderr = output.stderr.trim();
        let reason = if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, stderr)
        };
        return Err(InstallError::SelfCheckFailed {
            path: installed.to_path_buf(),
            reason,
        });
    }

    let reported = output.stdout.lines().next().unwrap_or_default().trim().to_string();
    debug!("{:?} {} -> {:?}", installed, VERSION_FLAG, reported);
    Ok(reported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{CommandOutput, MockRuntime};
    use mockall::predicate::eq;
    use std::path::PathBuf;

    fn runtime_returning(output: anyhow::Result<CommandOutput>) -> MockRuntime {
        let mut runtime = MockRuntime::new();
        let mut output = Some(output);
        runtime
            .expect_run()
            .with(
                eq(Path::new("/usr/local/bin/unraidcli")),
                eq(vec!["--version".to_string()]),
            )
            .times(1)
            .returning(move |_, _| output.take().unwrap());
        runtime
    }

    #[test]
    fn test_self_check_success_reports_version_line() {
        let runtime = runtime_returning(Ok(CommandOutput {
            code: Some(0),
            stdout: "unraidcli version 0.1.0 (built 2025-01-01)\n".into(),
            stderr: String::new(),
        }));

        let reported = self_check(&runtime, Path::new("/usr/local/bin/unraidcli")).unwrap();
        assert_eq!(reported, "unraidcli version 0.1.0 (built 2025-01-01)");
    }

    #[test]
    fn test_self_check_non_zero_exit() {
        let runtime = runtime_returning(Ok(CommandOutput {
            code: Some(2),
            stdout: String::new(),
            stderr: "unknown flag\n".into(),
        }));

        match self_check(&runtime, Path::new("/usr/local/bin/unraidcli")) {
            Err(InstallError::SelfCheckFailed { path, reason }) => {
                assert_eq!(path, PathBuf::from("/usr/local/bin/unraidcli"));
                assert_eq!(reason, "exited with status 2: unknown flag");
            }
            other => panic!("expected SelfCheckFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_self_check_killed_by_signal() {
        let runtime = runtime_returning(Ok(CommandOutput {
            code: None,
            ..Default::default()
        }));

        let err = self_check(&runtime, Path::new("/usr/local/bin/unraidcli")).unwrap_err();
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_self_check_cannot_spawn() {
        let runtime = runtime_returning(Err(anyhow::anyhow!("exec format error")));

        let err = self_check(&runtime, Path::new("/usr/local/bin/unraidcli")).unwrap_err();
        assert!(matches!(err, InstallError::SelfCheckFailed { .. }));
        assert!(err.to_string().contains("exec format error"));
    }
}
