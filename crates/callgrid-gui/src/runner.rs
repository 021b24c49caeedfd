//! External processes the canvas asks the host for: the traced program run
//! and editors for "go to file" / "open in editor".

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};

/// The traced program, started from a shell command line.
#[derive(Debug, Default)]
pub struct Runner {
    child: Option<Child>,
    command: Option<String>,
}

impl Runner {
    pub fn new(command: Option<String>) -> Self {
        Self {
            child: None,
            command,
        }
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    pub fn start(&mut self, cwd: Option<&Path>) -> anyhow::Result<()> {
        let Some(command) = self.command.clone() else {
            anyhow::bail!("no run command configured");
        };
        self.stop();
        let mut cmd = shell(&command);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let child = cmd
            .spawn()
            .with_context(|| format!("failed to start `{command}`"))?;
        tracing::info!("Started run `{}` (pid {})", command, child.id());
        self.child = Some(child);
        Ok(())
    }

    /// Exit status of a finished run, once. `Some(true)` on success.
    pub fn poll(&mut self) -> Option<bool> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::info!("Run exited with {}", status);
                self.child = None;
                Some(status.success())
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Could not query run status: {}", e);
                self.child = None;
                Some(false)
            }
        }
    }

    /// Kill the run. Returns false when nothing was running.
    pub fn stop(&mut self) -> bool {
        let Some(mut child) = self.child.take() else {
            return false;
        };
        if let Err(e) = child.kill() {
            tracing::warn!("Could not stop run: {}", e);
        }
        let _ = child.wait();
        true
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn shell(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    }
}

/// `$VISUAL` or `$EDITOR`, if set.
pub fn configured_editor() -> Option<String> {
    ["VISUAL", "EDITOR"]
        .into_iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.trim().is_empty())
}

/// Arguments for an editor invocation. Most terminal and GUI editors accept
/// `+LINE path`; VS Code style editors take `--goto path:LINE`.
pub fn editor_args(editor: &str, path: &Path, line: Option<usize>) -> Vec<String> {
    let program = Path::new(editor)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(editor);
    let path = path.to_string_lossy().into_owned();
    match (program, line) {
        ("code" | "codium" | "cursor", Some(line)) => {
            vec!["--goto".to_string(), format!("{path}:{line}")]
        }
        (_, Some(line)) => vec![format!("+{line}"), path],
        (_, None) => vec![path],
    }
}

pub fn open_in_editor(path: &Path, line: Option<usize>) -> anyhow::Result<()> {
    match configured_editor() {
        Some(editor) => {
            let mut parts = editor.split_whitespace();
            let program = parts.next().context("empty editor command")?;
            Command::new(program)
                .args(parts)
                .args(editor_args(program, path, line))
                .spawn()
                .with_context(|| format!("failed to start editor `{editor}`"))?;
            Ok(())
        }
        None => open_with_system(path),
    }
}

pub fn open_with_system(path: &Path) -> anyhow::Result<()> {
    let opener: PathBuf = if cfg!(target_os = "macos") {
        "open".into()
    } else if cfg!(windows) {
        "explorer".into()
    } else {
        "xdg-open".into()
    };
    Command::new(&opener)
        .arg(path)
        .spawn()
        .with_context(|| format!("failed to open {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_editor_args() {
        let path = Path::new("/src/app.rs");
        assert_eq!(editor_args("vim", path, Some(12)), vec!["+12", "/src/app.rs"]);
        assert_eq!(
            editor_args("/usr/bin/code", path, Some(3)),
            vec!["--goto", "/src/app.rs:3"]
        );
        assert_eq!(editor_args("hx", path, None), vec!["/src/app.rs"]);
    }

    #[test]
    fn test_runner_without_command_fails_to_start() {
        let mut runner = Runner::new(None);
        assert!(runner.start(None).is_err());
        assert!(!runner.stop());
        assert_eq!(runner.poll(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_reports_exit_status() {
        let mut runner = Runner::new(Some("exit 3".into()));
        runner.start(None).unwrap();
        let status = loop {
            if let Some(status) = runner.poll() {
                break status;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        };
        assert!(!status);
        assert!(!runner.is_running());
    }
}
