//! Project type detection from a repository tree

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::errors::PipelineError;
use crate::models::project::{ProjectType, TypeDefaults};
use crate::models::repository::TreeSnapshot;

const MARKER_WEIGHT: f64 = 0.6;
const DEPENDENCY_WEIGHT: f64 = 0.3;
const SCRIPT_WEIGHT: f64 = 0.1;
const SCORE_EPSILON: f64 = 1e-9;

/// Directories never descended into by `detect_dir`
const SKIPPED_DIRS: [&str; 6] = [".git", "node_modules", ".next", "dist", "venv", "__pycache__"];
const MAX_WALK_DEPTH: usize = 4;

/// Dependency and script names declared in a `package.json`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageManifest {
    pub dependencies: HashSet<String>,
    pub scripts: HashSet<String>,
}

#[derive(Deserialize)]
struct RawPackageJson {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    scripts: BTreeMap<String, serde_json::Value>,
}

impl PackageManifest {
    /// Parse dependencies, dev dependencies and script names
    pub fn from_package_json(text: &str) -> Result<Self, PipelineError> {
        let raw: RawPackageJson = serde_json::from_str(text)?;
        Ok(Self {
            dependencies: raw
                .dependencies
                .into_keys()
                .chain(raw.dev_dependencies.into_keys())
                .collect(),
            scripts: raw.scripts.into_keys().collect(),
        })
    }
}

/// Package names listed in a `requirements.txt`, lowercased
pub fn parse_requirements(text: &str) -> HashSet<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty() && !line.starts_with('-'))
        .filter_map(|line| {
            let name = line
                .split(|c: char| "=<>~![; ".contains(c))
                .next()
                .unwrap_or_default()
                .trim();
            (!name.is_empty()).then(|| name.to_lowercase())
        })
        .collect()
}

/// Everything the detector looks at
#[derive(Debug, Clone, Default)]
pub struct DetectionInput {
    /// Paths relative to the repository root, `/` separated
    pub files: Vec<String>,
    pub manifest: Option<PackageManifest>,
    /// Raw `requirements.txt` content
    pub requirements: Option<String>,
}

impl DetectionInput {
    /// Build detector input from a repository's last known tree
    pub fn from_tree(tree: &TreeSnapshot) -> Self {
        let manifest = tree.package_json.as_deref().and_then(|text| {
            PackageManifest::from_package_json(text)
                .map_err(|e| warn!("Ignoring unparsable package.json: {}", e))
                .ok()
        });

        Self {
            files: tree.files.clone(),
            manifest,
            requirements: tree.requirements_txt.clone(),
        }
    }

}

/// Result of a detection
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Accepted type, or `Unknown` when the best score missed its threshold
    pub project_type: ProjectType,
    /// Score of the best candidate in [0, 1]
    pub confidence: f64,
    /// Best scoring candidate, retained even when rejected
    pub best_candidate: ProjectType,
}

impl Detection {
    pub fn defaults(&self) -> TypeDefaults {
        self.project_type.defaults()
    }

    fn unknown() -> Self {
        Self {
            project_type: ProjectType::Unknown,
            confidence: 0.0,
            best_candidate: ProjectType::Unknown,
        }
    }
}

/// Requirements for one project type. A marker may list alternatives
/// separated by `|`.
#[derive(Debug, Clone)]
pub struct Rule {
    pub project_type: ProjectType,
    pub markers: &'static [&'static str],
    pub dependencies: &'static [&'static str],
    pub scripts: &'static [&'static str],
    pub threshold: f64,
}

/// Scores known project types against a repository tree
#[derive(Debug, Clone)]
pub struct ProjectTypeDetector {
    rules: Vec<Rule>,
}

impl Default for ProjectTypeDetector {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl ProjectTypeDetector {
    /// Create a detector; earlier rules win ties
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn detect(&self, input: &DetectionInput) -> Detection {
        // manifests alone are not evidence without a tree
        if input.files.is_empty() {
            return Detection::unknown();
        }

        let files: HashSet<&str> = input
            .files
            .iter()
            .map(|path| path.trim_start_matches("./"))
            .collect();
        let mut dependencies: HashSet<String> = input
            .manifest
            .as_ref()
            .map(|m| m.dependencies.clone())
            .unwrap_or_default();
        if let Some(requirements) = &input.requirements {
            dependencies.extend(parse_requirements(requirements));
        }
        let scripts = input.manifest.as_ref().map(|m| &m.scripts);

        let mut best: Option<(&Rule, f64)> = None;
        for rule in &self.rules {
            let marker_hits = rule
                .markers
                .iter()
                .filter(|marker| marker.split('|').any(|alt| files.contains(alt)))
                .count();
            let dependency_hits = rule
                .dependencies
                .iter()
                .filter(|dep| dependencies.contains(**dep))
                .count();
            let script_hits = rule
                .scripts
                .iter()
                .filter(|script| scripts.is_some_and(|s| s.contains(**script)))
                .count();

            let score = (MARKER_WEIGHT * fraction(marker_hits, rule.markers.len())
                + DEPENDENCY_WEIGHT * fraction(dependency_hits, rule.dependencies.len())
                + SCRIPT_WEIGHT * fraction(script_hits, rule.scripts.len()))
            .clamp(0.0, 1.0);

            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((rule, score));
            }
        }

        let Some((rule, score)) = best else {
            return Detection::unknown();
        };
        debug!(
            "Best project type candidate {} scored {:.2} (threshold {:.2})",
            rule.project_type, score, rule.threshold
        );

        Detection {
            project_type: if score + SCORE_EPSILON >= rule.threshold {
                rule.project_type
            } else {
                ProjectType::Unknown
            },
            confidence: score,
            best_candidate: rule.project_type,
        }
    }

    /// Detect the type of a checked-out tree
    pub async fn detect_dir(&self, root: &Path) -> Result<Detection, PipelineError> {
        let root = root.to_path_buf();
        let input = tokio::task::spawn_blocking(move || scan_dir(&root))
            .await
            .map_err(|e| PipelineError::Internal(format!("tree scan task failed: {e}")))??;
        Ok(self.detect(&input))
    }
}

fn fraction(hits: usize, required: usize) -> f64 {
    if required == 0 {
        0.0
    } else {
        hits as f64 / required as f64
    }
}

fn scan_dir(root: &Path) -> Result<DetectionInput, PipelineError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .max_depth(MAX_WALK_DEPTH)
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && SKIPPED_DIRS.contains(&entry.file_name().to_string_lossy().as_ref()))
        });

    for entry in walker {
        let entry = entry.map_err(|e| PipelineError::IoError(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            let parts: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }
    }

    let manifest = match std::fs::read_to_string(root.join("package.json")) {
        Ok(text) => PackageManifest::from_package_json(&text)
            .map_err(|e| warn!("Ignoring unparsable package.json: {}", e))
            .ok(),
        Err(_) => None,
    };
    let requirements = std::fs::read_to_string(root.join("requirements.txt")).ok();

    Ok(DetectionInput {
        files,
        manifest,
        requirements,
    })
}

/// The built-in rule table, most specific frameworks first
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            project_type: ProjectType::NextJs,
            markers: &["package.json", "next.config.js|next.config.mjs|next.config.ts"],
            dependencies: &["next", "react"],
            scripts: &["build"],
            threshold: 0.7,
        },
        Rule {
            project_type: ProjectType::Nuxt,
            markers: &["package.json", "nuxt.config.js|nuxt.config.ts"],
            dependencies: &["nuxt"],
            scripts: &["generate"],
            threshold: 0.7,
        },
        Rule {
            project_type: ProjectType::Gatsby,
            markers: &["package.json", "gatsby-config.js|gatsby-config.ts"],
            dependencies: &["gatsby"],
            scripts: &["build"],
            threshold: 0.7,
        },
        Rule {
            project_type: ProjectType::Angular,
            markers: &["package.json", "angular.json"],
            dependencies: &["@angular/core"],
            scripts: &["build"],
            threshold: 0.7,
        },
        Rule {
            project_type: ProjectType::Svelte,
            markers: &["package.json", "svelte.config.js"],
            dependencies: &["svelte"],
            scripts: &["build"],
            threshold: 0.6,
        },
        Rule {
            project_type: ProjectType::Vue,
            markers: &["package.json", "vue.config.js"],
            dependencies: &["vue"],
            scripts: &["build"],
            threshold: 0.6,
        },
        Rule {
            project_type: ProjectType::React,
            markers: &["package.json", "public/index.html"],
            dependencies: &["react", "react-dom"],
            scripts: &["build"],
            threshold: 0.7,
        },
        Rule {
            project_type: ProjectType::Django,
            markers: &["manage.py", "requirements.txt"],
            dependencies: &["django"],
            scripts: &[],
            threshold: 0.7,
        },
        Rule {
            project_type: ProjectType::Flask,
            markers: &["app.py", "requirements.txt"],
            dependencies: &["flask"],
            scripts: &[],
            threshold: 0.7,
        },
        Rule {
            project_type: ProjectType::NodeJs,
            markers: &["package.json"],
            dependencies: &[],
            scripts: &["start"],
            threshold: 0.5,
        },
        Rule {
            project_type: ProjectType::Python,
            markers: &["requirements.txt"],
            dependencies: &[],
            scripts: &[],
            threshold: 0.5,
        },
        Rule {
            project_type: ProjectType::Static,
            markers: &["index.html"],
            dependencies: &[],
            scripts: &[],
            threshold: 0.5,
        },
    ]
}
