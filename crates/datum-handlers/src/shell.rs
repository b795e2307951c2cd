//! Platform shell invocation

use std::process::Stdio;

use datum_core::{HandlerError, HandlerResult, OpContext};
use tokio::process::Command;

#[cfg(windows)]
fn shell(cmdline: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(cmdline);
    cmd
}

#[cfg(not(windows))]
fn shell(cmdline: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(cmdline);
    cmd
}

/// Run `cmdline` through the platform shell and return its stdout.
///
/// The child inherits the environment plus `env`. A non-zero exit is an
/// error carrying stdout and stderr. The child is killed if the context is
/// cancelled or its deadline passes.
pub(crate) async fn run(ctx: &OpContext, cmdline: &str, env: &[(&str, &str)]) -> HandlerResult<String> {
    let mut cmd = shell(cmdline);
    cmd.envs(env.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(command = cmdline, "Running shell command");

    let child = cmd.spawn().map_err(|e| HandlerError::Command {
        command: cmdline.to_string(),
        status: "spawn failed".to_string(),
        output: e.to_string(),
    })?;

    let output = ctx
        .run(async {
            child
                .wait_with_output()
                .await
                .map_err(|e| HandlerError::Command {
                    command: cmdline.to_string(),
                    status: "wait failed".to_string(),
                    output: e.to_string(),
                })
        })
        .await?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(HandlerError::Command {
            command: cmdline.to_string(),
            status: output.status.to_string(),
            output: format!("{stdout}{stderr}").trim_end().to_string(),
        });
    }
    Ok(stdout)
}
