//! `command` sources: arbitrary shell commands
//!
//! ```yaml
//! source:
//!   type: command
//!   url: s3://bucket/model.bin
//!   fingerprint_cmd: aws s3api head-object --bucket b --key model.bin --query ETag
//!   fetch_cmd: aws s3 cp {{url}} {{dest}}
//! ```
//!
//! `{{url}}`, `{{path}}`, `{{ref}}` and `{{dest}}` are substituted before the
//! command runs; fetches also see the destination in `$DEST`.
//!
//! A fetch writes to a temporary sibling of the target. The target is
//! replaced only when the command exits 0 having written that file.

use std::path::Path;

use async_trait::async_trait;
use datum_core::{HandlerError, HandlerResult, OpContext, SourceHandler, SourceSpec};
use serde::Deserialize;

use crate::shell;

pub const TAG: &str = "command";

#[derive(Debug, Default, Deserialize)]
struct CommandSource {
    #[serde(default)]
    fingerprint_cmd: String,
    #[serde(default)]
    fetch_cmd: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    path: String,
    #[serde(default, rename = "ref")]
    reference: String,
}

impl CommandSource {
    fn substitute(&self, template: &str, dest: &str) -> String {
        template
            .replace("{{url}}", &self.url)
            .replace("{{path}}", &self.path)
            .replace("{{ref}}", &self.reference)
            .replace("{{dest}}", dest)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommandHandler;

impl CommandHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceHandler for CommandHandler {
    async fn fingerprint(&self, ctx: &OpContext, source: &SourceSpec) -> HandlerResult<String> {
        let params: CommandSource = source.decode()?;
        if params.fingerprint_cmd.trim().is_empty() {
            return Err(HandlerError::invalid(TAG, "missing fingerprint_cmd"));
        }
        let cmdline = params.substitute(&params.fingerprint_cmd, "");
        let stdout = shell::run(ctx, &cmdline, &[]).await?;
        Ok(stdout.trim().to_string())
    }

    async fn fetch(&self, ctx: &OpContext, source: &SourceSpec, dest: &Path) -> HandlerResult<()> {
        let params: CommandSource = source.decode()?;
        if params.fetch_cmd.trim().is_empty() {
            return Err(HandlerError::invalid(TAG, "missing fetch_cmd"));
        }
        let pending = datum_fs::io::PendingFile::for_dest(dest)?;
        let temp_arg = pending.path().to_string_lossy().into_owned();
        let cmdline = params.substitute(&params.fetch_cmd, &temp_arg);

        shell::run(ctx, &cmdline, &[("DEST", temp_arg.as_str())]).await?;
        if !pending.exists() {
            return Err(HandlerError::Command {
                command: cmdline,
                status: "exit status: 0".to_string(),
                output: "fetch_cmd did not write $DEST".to_string(),
            });
        }
        pending.persist_unless(|| ctx.is_cancelled())?;
        Ok(())
    }
}
