//! `nuload restore` command implementation.

use nuload_core::error::{NuloadError, NuloadResult};

use super::install::install_packages;
use super::CommandContext;
use crate::InstallOptions;

/// Install the `[[package]]` entries of the project nuload.toml
pub async fn execute(options: InstallOptions, ctx: &CommandContext) -> NuloadResult<()> {
    let settings = ctx.settings(options.into()).await?;

    let Some(project_file) = &settings.project_file else {
        return Err(NuloadError::ConfigValidation {
            field: "nuload.toml".to_string(),
            reason: format!("no nuload.toml found in {} or its parents", ctx.cwd),
        });
    };

    if settings.packages.is_empty() {
        ctx.output.warn(&format!("{} lists no [[package]] entries", project_file));
        return Ok(());
    }

    install_packages(&settings.packages, &settings, ctx).await?;
    Ok(())
}
