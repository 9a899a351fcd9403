//! `nuload versions` command implementation.

use nuload_config::CliOverrides;
use nuload_core::error::{NuloadError, NuloadResult};
use nuload_core::Version;

use super::{build_sources, CommandContext};

/// Print the versions of `id` known to the first source that lists it
pub async fn execute(id: &str, prerelease: bool, sources: Vec<String>, ctx: &CommandContext) -> NuloadResult<()> {
    let versions = list_versions(id, prerelease, sources, ctx).await?;

    for version in &versions {
        ctx.output.item(&version.to_string());
    }
    Ok(())
}

/// Sorted, deduplicated versions; stable only unless `prerelease`
pub async fn list_versions(
    id: &str,
    prerelease: bool,
    sources: Vec<String>,
    ctx: &CommandContext,
) -> NuloadResult<Vec<Version>> {
    let settings = ctx
        .settings(CliOverrides {
            sources,
            ..CliOverrides::default()
        })
        .await?;
    let source_set = build_sources(&settings.sources)?;

    let Some((origin, mut versions)) = source_set.list_versions(id, &ctx.cancel).await? else {
        return Err(NuloadError::PackageNotFound {
            id: id.to_string(),
            range: "any version".to_string(),
        });
    };

    versions.retain(|v| prerelease || !v.is_prerelease());
    versions.sort();
    versions.dedup();

    ctx.output.info(&format!("{} versions of {} at {}", versions.len(), id, origin));
    Ok(versions)
}
