//! Effective build configuration resolution

use crate::models::deployment::{BuildConfiguration, ConfigOverrides};
use crate::models::project::ProjectType;
use crate::models::repository::DeploymentSettings;

/// Merge type defaults, repository settings and call-site overrides.
///
/// Each field takes the call-site value when present, else the repository
/// value, else the type default. Environment variables merge per key with
/// the same precedence.
pub fn resolve(
    project_type: ProjectType,
    repository: &DeploymentSettings,
    overrides: &ConfigOverrides,
) -> BuildConfiguration {
    let defaults = project_type.defaults();

    let build_command = pick(
        &overrides.build_command,
        &repository.build_command,
        defaults.build_command,
    );
    let install_command = pick(
        &overrides.install_command,
        &repository.install_command,
        defaults.install_command,
    );
    let output_directory = pick(
        &overrides.output_directory,
        &repository.output_directory,
        Some(defaults.output_directory),
    )
    .unwrap_or_else(|| ".".to_string());

    let mut env_vars = repository.env_vars.clone();
    if let Some(call_site) = &overrides.env_vars {
        env_vars.extend(call_site.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    BuildConfiguration {
        build_command,
        install_command,
        output_directory,
        env_vars,
    }
}

fn pick(
    call_site: &Option<String>,
    repository: &Option<String>,
    default: Option<&'static str>,
) -> Option<String> {
    non_blank(call_site)
        .or_else(|| non_blank(repository))
        .or_else(|| default.map(str::to_string))
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
