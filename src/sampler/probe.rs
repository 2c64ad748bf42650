use std::{ffi::OsString, process::Stdio};

use anyhow::Context as _;

/// Something a sampler reads on every tick.
pub trait Probe: Send + 'static {
    type Raw: Send + 'static;
    fn read(&mut self) -> impl Future<Output = anyhow::Result<Self::Raw>> + Send;
}

/// Runs an external command and captures its stdout.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    program: OsString,
    args: Vec<OsString>,
}
impl CommandProbe {
    pub fn new(
        program: impl Into<OsString>,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}
impl Probe for CommandProbe {
    type Raw = String;
    async fn read(&mut self) -> anyhow::Result<String> {
        run_command(&self.program, &self.args).await
    }
}

pub async fn run_command(
    program: impl AsRef<std::ffi::OsStr>,
    args: impl IntoIterator<Item = impl AsRef<std::ffi::OsStr>>,
) -> anyhow::Result<String> {
    let program = program.as_ref();
    let std::process::Output {
        status,
        stdout,
        stderr,
    } = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("Failed to run {}", program.to_string_lossy()))?;

    if !status.success() {
        anyhow::bail!(
            "{} exited with {status}. Stderr: {}",
            program.to_string_lossy(),
            String::from_utf8_lossy(&stderr).trim(),
        );
    }
    String::from_utf8(stdout)
        .with_context(|| format!("Output of {} is not UTF-8", program.to_string_lossy()))
}
