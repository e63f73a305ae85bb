//! SSH transport
//!
//! Every operation is one `ssh <host> <script>` invocation with paths quoted
//! for the remote POSIX shell. Publishing streams the artifact over stdin into
//! a temporary file next to the destination and renames it into place, so a
//! reader never sees a partial file.

use provision::{RemoteIoError, RemoteTarget};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

/// Remote target reached through the system `ssh` client
#[derive(Debug, Clone)]
pub struct SshTarget {
    host: String,
    options: Vec<String>,
    program: PathBuf,
}

impl SshTarget {
    pub fn new(host: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            host: host.into(),
            options,
            program: PathBuf::from("ssh"),
        }
    }

    /// Use another client binary instead of `ssh` from PATH
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Full argument list for `ssh`
    fn args(&self, script: &str) -> Vec<String> {
        let mut args = self.options.clone();
        args.push(self.host.clone());
        args.push(script.to_string());
        args
    }

    fn run(&self, script: &str, stdin: Option<&[u8]>) -> Result<Output, String> {
        log::debug!("ssh {}: {}", self.host, script);

        let mut child = Command::new(&self.program)
            .args(self.args(script))
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("Failed to execute ssh: {e}"))?;

        // The pipe is closed at the end of the match so the remote `cat` sees EOF
        let streamed = match (stdin, child.stdin.take()) {
            (Some(bytes), Some(mut pipe)) => pipe.write_all(bytes),
            _ => Ok(()),
        };

        let output = child
            .wait_with_output()
            .map_err(|e| format!("Failed to wait for ssh: {e}"))?;

        // A remote that exits early stops reading; its stderr says why
        if let Err(e) = streamed {
            if output.status.success() {
                return Err(format!("Failed to stream to ssh: {e}"));
            }
            log::debug!("ssh stopped reading input: {e}");
        }
        Ok(output)
    }

    /// Run a script that must succeed
    fn run_checked(&self, script: &str, stdin: Option<&[u8]>) -> Result<Vec<u8>, String> {
        let output = self.run(script, stdin)?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(failure_message(&output))
        }
    }
}

impl RemoteTarget for SshTarget {
    fn describe(&self) -> String {
        self.host.clone()
    }

    fn exists(&self, path: &str) -> Result<bool, RemoteIoError> {
        let probe_error = |message: String| RemoteIoError::Probe {
            target: self.describe(),
            path: path.to_string(),
            message,
        };

        let script = exists_script(path).map_err(probe_error)?;
        let output = self.run(&script, None).map_err(probe_error)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(probe_error(failure_message(&output))),
        }
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, RemoteIoError> {
        let read_error = |message: String| RemoteIoError::Read {
            target: self.describe(),
            path: path.to_string(),
            message,
        };

        let script = read_script(path).map_err(read_error)?;
        self.run_checked(&script, None).map_err(read_error)
    }

    fn create_dir_all(&self, path: &str) -> Result<(), RemoteIoError> {
        let mkdir_error = |message: String| RemoteIoError::CreateDir {
            target: self.describe(),
            path: path.to_string(),
            message,
        };

        let script = mkdir_script(path).map_err(mkdir_error)?;
        self.run_checked(&script, None).map_err(mkdir_error)?;
        Ok(())
    }

    fn write_atomic(&self, path: &str, contents: &[u8]) -> Result<(), RemoteIoError> {
        let publish_error = |message: String| RemoteIoError::Publish {
            target: self.describe(),
            path: path.to_string(),
            message,
        };

        let temp = format!("{path}.confseed-{}.tmp", std::process::id());
        let script = write_script(path, &temp).map_err(publish_error)?;
        self.run_checked(&script, Some(contents))
            .map_err(publish_error)?;
        Ok(())
    }

    fn copy(&self, from: &str, to: &str) -> Result<(), RemoteIoError> {
        let copy_error = |message: String| RemoteIoError::Copy {
            target: self.describe(),
            from: from.to_string(),
            to: to.to_string(),
            message,
        };

        let script = copy_script(from, to).map_err(copy_error)?;
        self.run_checked(&script, None).map_err(copy_error)?;
        Ok(())
    }
}

fn quote(path: &str) -> Result<String, String> {
    shlex::try_quote(path)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| format!("Cannot quote {path:?} for the remote shell: {e}"))
}

fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("ssh exited with {}", output.status)
    } else {
        stderr.to_string()
    }
}

fn exists_script(path: &str) -> Result<String, String> {
    Ok(format!("test -f {}", quote(path)?))
}

fn read_script(path: &str) -> Result<String, String> {
    Ok(format!("cat -- {}", quote(path)?))
}

fn mkdir_script(path: &str) -> Result<String, String> {
    Ok(format!("mkdir -p -- {}", quote(path)?))
}

fn write_script(path: &str, temp: &str) -> Result<String, String> {
    let path = quote(path)?;
    let temp = quote(temp)?;
    Ok(format!(
        "umask 027 && cat > {temp} && mv -f -- {temp} {path} || {{ rm -f -- {temp}; exit 1; }}"
    ))
}

fn copy_script(from: &str, to: &str) -> Result<String, String> {
    Ok(format!("cp -- {} {}", quote(from)?, quote(to)?))
}
