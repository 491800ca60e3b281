//! External process invocation.
//!
//! [`ToolCommand::execute`] runs a short-lived tool to completion and
//! captures its output under a deadline. [`ToolCommand::spawn_streaming`]
//! starts a long-running one and hands back the child with stdout and stderr
//! piped for the caller to consume.

use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use fp_core::Error;
use tokio::process::{Child, Command};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Lines of stderr quoted in failure messages.
const STDERR_TAIL_LINES: usize = 5;

/// Output of a captured run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Builder for one invocation of an external tool.
///
/// ```no_run
/// use fp_av::ToolCommand;
///
/// # async fn example() -> fp_core::Result<()> {
/// let output = ToolCommand::new("ffprobe")
///     .args(["-v", "error", "-of", "json", "-show_streams"])
///     .arg("/media/clip.mp4")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Deadline for [`execute`](Self::execute). Streaming runs ignore it.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Program file name, used as the tool name in errors.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        Error::tool(self.program_name(), format!("failed to spawn: {e}"))
    }

    /// Run to completion and capture stdout and stderr.
    ///
    /// # Errors
    ///
    /// [`Error::Tool`] when the process cannot be spawned, outlives the
    /// timeout (it is killed), or exits unsuccessfully. The last lines of
    /// stderr are quoted in the non-zero exit case.
    pub async fn execute(&self) -> fp_core::Result<ToolOutput> {
        let name = self.program_name();
        let child = self.build().spawn().map_err(|e| self.spawn_error(e))?;

        // On timeout the future, and with it the child, is dropped; kill_on_drop reaps it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::tool(&name, format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| Error::tool(&name, format!("I/O error waiting for process: {e}")))?;

        let output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !output.status.success() {
            return Err(Error::tool(
                name,
                format!(
                    "exited with {}: {}",
                    output.status,
                    stderr_tail(&output.stderr, STDERR_TAIL_LINES)
                ),
            ));
        }
        Ok(output)
    }

    /// Start the process with stdout and stderr piped and stdin closed.
    ///
    /// Dropping the returned child kills the process.
    pub fn spawn_streaming(&self) -> fp_core::Result<Child> {
        self.build().spawn().map_err(|e| self.spawn_error(e))
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program_name())?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// The last `lines` non-empty lines of `stderr`, joined with " | ".
fn stderr_tail(stderr: &str, lines: usize) -> String {
    let kept: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = kept.len().saturating_sub(lines);
    kept[start..].join(" | ")
}
