//! Failure log classification

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::errors::PipelineError;
use crate::models::project::ProjectType;

/// Maximum number of matched snippets kept on an analysis
const MAX_SNIPPETS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    BuildFailure,
    DependencyError,
    ConfigurationError,
    ResourceLimit,
    NetworkError,
    PlatformError,
    Timeout,
    PermissionError,
    Unknown,
}

impl ErrorCategory {
    /// Declaration order; ties between equal scores go to the earlier entry
    pub const ALL: [ErrorCategory; 9] = [
        ErrorCategory::BuildFailure,
        ErrorCategory::DependencyError,
        ErrorCategory::ConfigurationError,
        ErrorCategory::ResourceLimit,
        ErrorCategory::NetworkError,
        ErrorCategory::PlatformError,
        ErrorCategory::Timeout,
        ErrorCategory::PermissionError,
        ErrorCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::BuildFailure => "build_failure",
            ErrorCategory::DependencyError => "dependency_error",
            ErrorCategory::ConfigurationError => "configuration_error",
            ErrorCategory::ResourceLimit => "resource_limit",
            ErrorCategory::NetworkError => "network_error",
            ErrorCategory::PlatformError => "platform_error",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::PermissionError => "permission_error",
            ErrorCategory::Unknown => "unknown",
        }
    }

    fn patterns(&self) -> &'static [&'static str] {
        match self {
            ErrorCategory::BuildFailure => &[
                r"build failed",
                r"failed to compile",
                r"compilation failed",
                r"syntaxerror",
                r"typeerror:",
                r"error ts\d+",
                r"npm err! code elifecycle",
                r"webpack .*error",
            ],
            ErrorCategory::DependencyError => &[
                r"cannot find module",
                r"module not found",
                r"modulenotfounderror",
                r"eresolve",
                r"could not resolve dependenc",
                r"no matching distribution found",
                r"npm err! 404",
                r"peer dep",
                r"package .+ not found",
            ],
            ErrorCategory::ConfigurationError => &[
                r"invalid configuration",
                r"missing script",
                r"environment variable .+ (is )?not set",
                r"no such file or directory",
                r"output directory not found",
                r"improperlyconfigured",
                r"must stay inside the workspace",
            ],
            ErrorCategory::ResourceLimit => &[
                r"out of memory",
                r"heap out of memory",
                r"enomem",
                r"no space left on device",
                r"killed",
                r"exceeds the .+ limit",
                r"quota exceeded",
            ],
            ErrorCategory::NetworkError => &[
                r"econnrefused",
                r"econnreset",
                r"etimedout",
                r"enotfound",
                r"network (is )?unreachable",
                r"could not resolve host",
                r"connection (timed out|refused|reset)",
                r"socket hang up",
            ],
            ErrorCategory::PlatformError => &[
                r"\b5\d\d\b.*(internal server error|bad gateway|service unavailable)",
                r"service unavailable",
                r"rate limit",
                r"deployment (api )?error",
            ],
            ErrorCategory::Timeout => &[
                r"timed out",
                r"timeout",
                r"deadline exceeded",
            ],
            ErrorCategory::PermissionError => &[
                r"permission denied",
                r"eacces",
                r"eperm",
                r"unauthorized",
                r"forbidden",
                r"authentication failed",
            ],
            ErrorCategory::Unknown => &[],
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Low => "low",
            ErrorSeverity::Medium => "medium",
            ErrorSeverity::High => "high",
            ErrorSeverity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified failure, produced on demand and never stored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorAnalysis {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub matched_patterns: Vec<String>,
    pub suggestions: Vec<String>,
    pub quick_fixes: Vec<String>,
    pub documentation: Vec<String>,
    /// In `[0, 1]`
    pub confidence: f64,
}

struct CategoryPatterns {
    category: ErrorCategory,
    patterns: Vec<Regex>,
}

/// Scores log text against per-category pattern tables
pub struct ErrorAnalyzer {
    tables: Vec<CategoryPatterns>,
    fatal: Regex,
}

fn compile(source: &str) -> Result<Regex, PipelineError> {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .build()
        .map_err(|e| PipelineError::Internal(format!("invalid error pattern {source:?}: {e}")))
}

impl ErrorAnalyzer {
    pub fn new() -> Result<Self, PipelineError> {
        let tables = ErrorCategory::ALL
            .iter()
            .map(|category| {
                let patterns = category
                    .patterns()
                    .iter()
                    .map(|p| compile(p))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CategoryPatterns {
                    category: *category,
                    patterns,
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;

        Ok(Self {
            tables,
            fatal: compile(r"\b(fatal|critical|panic(ked)?)\b")?,
        })
    }

    /// Classify `text`; the same text and project type always give the same
    /// analysis
    pub fn analyze(&self, text: &str, project_type: ProjectType) -> ErrorAnalysis {
        let mut best = (ErrorCategory::Unknown, 0usize);
        let mut snippets = Vec::new();

        for table in &self.tables {
            let mut count = 0;
            let mut found = Vec::new();
            for pattern in &table.patterns {
                for m in pattern.find_iter(text) {
                    count += 1;
                    found.push(m.as_str().trim().to_string());
                }
            }
            // strictly greater keeps the earlier category on ties
            if count > best.1 {
                best = (table.category, count);
                snippets = found;
            }
        }

        let (category, count) = best;
        let mut matched_patterns = Vec::new();
        for snippet in snippets {
            if matched_patterns.len() == MAX_SNIPPETS {
                break;
            }
            if !matched_patterns.contains(&snippet) {
                matched_patterns.push(snippet);
            }
        }

        let severity = match category {
            ErrorCategory::Unknown => ErrorSeverity::Medium,
            category => self.severity(category, text),
        };

        ErrorAnalysis {
            category,
            severity,
            matched_patterns,
            suggestions: suggestions(category, project_type),
            quick_fixes: quick_fixes(category, project_type),
            documentation: documentation(category, project_type),
            confidence: (count as f64 / 10.0).min(1.0),
        }
    }

    fn severity(&self, category: ErrorCategory, text: &str) -> ErrorSeverity {
        match category {
            ErrorCategory::PlatformError | ErrorCategory::PermissionError => ErrorSeverity::Critical,
            ErrorCategory::ResourceLimit | ErrorCategory::Timeout => ErrorSeverity::High,
            ErrorCategory::BuildFailure | ErrorCategory::DependencyError => ErrorSeverity::Medium,
            _ if self.fatal.is_match(text) => ErrorSeverity::High,
            ErrorCategory::NetworkError => ErrorSeverity::Low,
            ErrorCategory::ConfigurationError | ErrorCategory::Unknown => ErrorSeverity::Medium,
        }
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn suggestions(category: ErrorCategory, project_type: ProjectType) -> Vec<String> {
    let mut out = owned(match category {
        ErrorCategory::BuildFailure => &[
            "Run the build command locally and fix the first reported error",
            "Check that the build command matches the project's scripts",
        ],
        ErrorCategory::DependencyError => &[
            "Make sure every imported package is declared in the manifest",
            "Commit the lock file so installs are reproducible",
        ],
        ErrorCategory::ConfigurationError => &[
            "Verify the build command, install command and output directory",
            "Check that required environment variables are configured",
        ],
        ErrorCategory::ResourceLimit => &[
            "Reduce build memory usage or split large bundles",
            "Remove large artifacts from the build output",
        ],
        ErrorCategory::NetworkError => &[
            "Retry the deployment; network failures are usually transient",
            "Check that package registries are reachable from the build host",
        ],
        ErrorCategory::PlatformError => &[
            "Check the hosting platform status page",
            "Verify the platform token and team settings",
        ],
        ErrorCategory::Timeout => &[
            "Look for steps that hang waiting for input",
            "Cache dependencies to shorten the build",
        ],
        ErrorCategory::PermissionError => &[
            "Check file permissions in the repository",
            "Verify the credentials used for the hosting platform",
        ],
        ErrorCategory::Unknown => &[
            "Inspect the build and deploy logs for the first error",
            "Redeploy the last known good commit if the failure persists",
        ],
    });

    if project_type.is_javascript() {
        out.extend(owned(match category {
            ErrorCategory::BuildFailure => &["Run `npm run build` with the same Node.js version"],
            ErrorCategory::DependencyError => &["Delete node_modules and reinstall with `npm ci`"],
            ErrorCategory::ResourceLimit => &["Raise the Node.js heap with NODE_OPTIONS=--max-old-space-size"],
            _ => &[],
        }));
    } else if project_type.is_python() {
        out.extend(owned(match category {
            ErrorCategory::DependencyError => &["Pin versions in requirements.txt"],
            ErrorCategory::ConfigurationError if project_type == ProjectType::Django => {
                &["Check DJANGO_SETTINGS_MODULE and ALLOWED_HOSTS"]
            }
            _ => &[],
        }));
    }
    out
}

fn quick_fixes(category: ErrorCategory, project_type: ProjectType) -> Vec<String> {
    let javascript = project_type.is_javascript();
    let python = project_type.is_python();

    let fixes: &[&str] = match category {
        ErrorCategory::BuildFailure if javascript => &["npm ci", "npm run build"],
        ErrorCategory::DependencyError if javascript => {
            &["rm -rf node_modules package-lock.json", "npm install"]
        }
        ErrorCategory::DependencyError if python => {
            &["pip install --upgrade pip", "pip install -r requirements.txt"]
        }
        ErrorCategory::ResourceLimit if javascript => {
            &["export NODE_OPTIONS=--max-old-space-size=4096"]
        }
        ErrorCategory::PermissionError => &["chmod -R u+rwX ."],
        ErrorCategory::BuildFailure
        | ErrorCategory::DependencyError
        | ErrorCategory::ConfigurationError
        | ErrorCategory::ResourceLimit
        | ErrorCategory::NetworkError
        | ErrorCategory::PlatformError
        | ErrorCategory::Timeout
        | ErrorCategory::Unknown => &[],
    };
    owned(fixes)
}

fn documentation(category: ErrorCategory, project_type: ProjectType) -> Vec<String> {
    let mut docs = owned(match category {
        ErrorCategory::DependencyError if project_type.is_python() => {
            &["https://pip.pypa.io/en/stable/topics/dependency-resolution/"]
        }
        ErrorCategory::DependencyError => &["https://docs.npmjs.com/cli/commands/npm-ci"],
        ErrorCategory::ResourceLimit => &["https://nodejs.org/api/cli.html#--max-old-space-sizesize-in-mib"],
        ErrorCategory::PlatformError | ErrorCategory::PermissionError => {
            &["https://vercel.com/docs/rest-api"]
        }
        ErrorCategory::BuildFailure
        | ErrorCategory::ConfigurationError
        | ErrorCategory::NetworkError
        | ErrorCategory::Timeout
        | ErrorCategory::Unknown => &[],
    });

    let framework = match project_type {
        ProjectType::React => Some("https://create-react-app.dev/docs/deployment/"),
        ProjectType::NextJs => Some("https://nextjs.org/docs/app/building-your-application/deploying"),
        ProjectType::Vue => Some("https://vuejs.org/guide/best-practices/production-deployment"),
        ProjectType::Django => Some("https://docs.djangoproject.com/en/stable/howto/deployment/"),
        _ => None,
    };
    if let (Some(url), ErrorCategory::BuildFailure | ErrorCategory::ConfigurationError) =
        (framework, category)
    {
        docs.push(url.to_string());
    }
    docs
}
