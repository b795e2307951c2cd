//! `datum fetch [ID ...]`

use datum_core::{Engine, Reporter, RunReport};
use tokio_util::sync::CancellationToken;

use super::RunContext;
use crate::error::Result;

pub async fn run_fetch(
    ctx: &RunContext,
    ids: &[String],
    cancel: &CancellationToken,
    reporter: &mut dyn Reporter,
) -> Result<RunReport> {
    let config = ctx.load_config()?;
    let engine = Engine::new(&ctx.registry, ctx.options);
    Ok(engine
        .fetch(&config, &ctx.lock_path, ids, cancel, reporter)
        .await?)
}
