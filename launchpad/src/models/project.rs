//! Project types and their build defaults

use serde::{Deserialize, Serialize};

/// Kind of project found in a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    React,
    NextJs,
    Vue,
    Angular,
    Svelte,
    Nuxt,
    Gatsby,
    NodeJs,
    Django,
    Flask,
    Python,
    Static,
    Unknown,
}

/// How the build step treats a project type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStrategy {
    /// Install dependencies, then compile the site
    InstallAndCompile,
    /// Interpreted runtimes: dependency install only
    InstallOnly,
    /// Static assets: nothing to run
    NoOp,
}

/// Build settings a project type starts from before any override
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefaults {
    pub install_command: Option<&'static str>,
    pub build_command: Option<&'static str>,
    pub output_directory: &'static str,
}

const NPM_INSTALL: &str = "npm install";
const NPM_BUILD: &str = "npm run build";
const PIP_INSTALL: &str = "pip install -r requirements.txt";

impl ProjectType {
    pub const ALL: [ProjectType; 13] = [
        ProjectType::React,
        ProjectType::NextJs,
        ProjectType::Vue,
        ProjectType::Angular,
        ProjectType::Svelte,
        ProjectType::Nuxt,
        ProjectType::Gatsby,
        ProjectType::NodeJs,
        ProjectType::Django,
        ProjectType::Flask,
        ProjectType::Python,
        ProjectType::Static,
        ProjectType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::React => "react",
            ProjectType::NextJs => "next_js",
            ProjectType::Vue => "vue",
            ProjectType::Angular => "angular",
            ProjectType::Svelte => "svelte",
            ProjectType::Nuxt => "nuxt",
            ProjectType::Gatsby => "gatsby",
            ProjectType::NodeJs => "node_js",
            ProjectType::Django => "django",
            ProjectType::Flask => "flask",
            ProjectType::Python => "python",
            ProjectType::Static => "static",
            ProjectType::Unknown => "unknown",
        }
    }

    pub fn defaults(&self) -> TypeDefaults {
        let compiled = |output_directory| TypeDefaults {
            install_command: Some(NPM_INSTALL),
            build_command: Some(NPM_BUILD),
            output_directory,
        };

        match self {
            ProjectType::React => compiled("build"),
            ProjectType::NextJs => compiled(".next"),
            ProjectType::Vue | ProjectType::Angular => compiled("dist"),
            ProjectType::Svelte | ProjectType::Gatsby => compiled("public"),
            ProjectType::Nuxt => TypeDefaults {
                install_command: Some(NPM_INSTALL),
                build_command: Some("npm run generate"),
                output_directory: ".output/public",
            },
            ProjectType::NodeJs => TypeDefaults {
                install_command: Some(NPM_INSTALL),
                build_command: None,
                output_directory: ".",
            },
            ProjectType::Django | ProjectType::Flask | ProjectType::Python => TypeDefaults {
                install_command: Some(PIP_INSTALL),
                build_command: None,
                output_directory: ".",
            },
            ProjectType::Static | ProjectType::Unknown => TypeDefaults {
                install_command: None,
                build_command: None,
                output_directory: ".",
            },
        }
    }

    /// Build strategy for this type; unknown projects compile only when a
    /// build command was configured for them explicitly.
    pub fn build_strategy(&self, has_build_command: bool) -> BuildStrategy {
        match self {
            ProjectType::React
            | ProjectType::NextJs
            | ProjectType::Vue
            | ProjectType::Angular
            | ProjectType::Svelte
            | ProjectType::Nuxt
            | ProjectType::Gatsby => BuildStrategy::InstallAndCompile,
            ProjectType::NodeJs | ProjectType::Django | ProjectType::Flask | ProjectType::Python => {
                BuildStrategy::InstallOnly
            }
            ProjectType::Static => BuildStrategy::NoOp,
            ProjectType::Unknown if has_build_command => BuildStrategy::InstallAndCompile,
            ProjectType::Unknown => BuildStrategy::NoOp,
        }
    }

    pub fn is_javascript(&self) -> bool {
        matches!(
            self,
            ProjectType::React
                | ProjectType::NextJs
                | ProjectType::Vue
                | ProjectType::Angular
                | ProjectType::Svelte
                | ProjectType::Nuxt
                | ProjectType::Gatsby
                | ProjectType::NodeJs
        )
    }

    pub fn is_python(&self) -> bool {
        matches!(
            self,
            ProjectType::Django | ProjectType::Flask | ProjectType::Python
        )
    }
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', '.'], "_");
        ProjectType::ALL
            .iter()
            .find(|t| t.as_str() == normalized || t.as_str().replace('_', "") == normalized)
            .copied()
            .ok_or_else(|| format!("Unknown project type: {}", s))
    }
}
