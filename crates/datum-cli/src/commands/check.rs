//! `datum check`

use datum_core::{Engine, Reporter, RunReport};
use tokio_util::sync::CancellationToken;

use super::RunContext;
use crate::error::Result;

pub async fn run_check(
    ctx: &RunContext,
    cancel: &CancellationToken,
    reporter: &mut dyn Reporter,
) -> Result<RunReport> {
    let config = ctx.load_config()?;
    let engine = Engine::new(&ctx.registry, ctx.options);
    Ok(engine.check(&config, &ctx.lock_path, cancel, reporter).await?)
}
