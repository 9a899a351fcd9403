//! `nuload clean` command implementation.

use camino::Utf8PathBuf;

use nuload_cache::{CacheSummary, PackageCache};
use nuload_config::CliOverrides;
use nuload_core::error::NuloadResult;

use super::CommandContext;

/// Clear the download cache, or only entries idle for `older_than` days
pub async fn execute(older_than: Option<u32>, cache_dir: Option<Utf8PathBuf>, ctx: &CommandContext) -> NuloadResult<()> {
    let settings = ctx
        .settings(CliOverrides {
            cache_dir,
            ..CliOverrides::default()
        })
        .await?;

    let cache = PackageCache::new(&settings.cache_dir)?;
    let removed = clean_cache(&cache, older_than)?;

    if removed == CacheSummary::default() {
        ctx.output.info(&format!("Nothing to remove from {}", settings.cache_dir));
    } else {
        ctx.output.success(&format!(
            "Removed {} cached packages ({}) from {}",
            removed.entries,
            removed.format_size(),
            settings.cache_dir
        ));
    }
    Ok(())
}

pub fn clean_cache(cache: &PackageCache, older_than: Option<u32>) -> NuloadResult<CacheSummary> {
    match older_than {
        Some(days) => cache.prune(i64::from(days)),
        None => cache.clear(),
    }
}
