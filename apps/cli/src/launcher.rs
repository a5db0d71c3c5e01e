//! Runs a prepared game executable through the configured runner.

use std::process::Command;

use slotkeeper_install::{LaunchError, LaunchTarget, Launcher};

/// DLL overrides the level engines need under wine.
const DLL_OVERRIDES: &str = "winmm=n,b;ddraw=n,b";

/// Spawns `<runner> <executable>` in the executable's directory and waits
/// for it to exit.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    runner: String,
}

impl CommandLauncher {
    /// An empty `runner` executes the game directly.
    pub fn new(runner: impl Into<String>) -> Self {
        Self {
            runner: runner.into(),
        }
    }

    fn command(&self, target: &LaunchTarget) -> Command {
        let mut command = if self.runner.is_empty() {
            Command::new(&target.executable)
        } else {
            let mut command = Command::new(&self.runner);
            command.arg(&target.executable);
            command
        };
        command
            .current_dir(&target.working_dir)
            .env("WINEDLLOVERRIDES", DLL_OVERRIDES)
            .env("WINEFSYNC", "1");
        command
    }

    fn program(&self, target: &LaunchTarget) -> String {
        if self.runner.is_empty() {
            target.executable.display().to_string()
        } else {
            self.runner.clone()
        }
    }
}

impl Launcher for CommandLauncher {
    fn launch(&self, target: &LaunchTarget) -> Result<(), LaunchError> {
        tracing::info!(
            runner = %self.runner,
            executable = %target.executable.display(),
            "launching"
        );

        let status = self
            .command(target)
            .status()
            .map_err(|source| LaunchError::Spawn {
                program: self.program(target),
                source,
            })?;

        if status.success() {
            return Ok(());
        }
        match status.code() {
            Some(code) => Err(LaunchError::Exit(code)),
            None => Err(LaunchError::Killed),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn target(dir: &std::path::Path) -> LaunchTarget {
        LaunchTarget {
            working_dir: dir.to_path_buf(),
            executable: dir.join("tomb4.exe"),
        }
    }

    #[test]
    fn zero_exit_is_success() {
        let tmp = tempfile::tempdir().unwrap();
        CommandLauncher::new("true")
            .launch(&target(tmp.path()))
            .unwrap();
    }

    #[test]
    fn nonzero_exit_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let err = CommandLauncher::new("false")
            .launch(&target(tmp.path()))
            .unwrap_err();
        assert!(matches!(err, LaunchError::Exit(1)));
    }

    #[test]
    fn missing_runner_fails_to_spawn() {
        let tmp = tempfile::tempdir().unwrap();
        let err = CommandLauncher::new("slotkeeper-no-such-runner")
            .launch(&target(tmp.path()))
            .unwrap_err();
        match err {
            LaunchError::Spawn { program, .. } => assert_eq!(program, "slotkeeper-no-such-runner"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn runs_in_working_dir_with_wine_environment() {
        let tmp = tempfile::tempdir().unwrap();
        let script = tmp.path().join("tomb4.exe");
        std::fs::write(
            &script,
            "[ \"$WINEDLLOVERRIDES\" = 'winmm=n,b;ddraw=n,b' ] || exit 3\n[ -f tomb4.exe ] || exit 4\n",
        )
        .unwrap();

        CommandLauncher::new("sh")
            .launch(&target(tmp.path()))
            .unwrap();
    }
}
