//! Rule Router: maps a source path to the transformation pipeline that
//! applies to it.
//!
//! Rules are an ordered list evaluated top to bottom. The first rule whose
//! test matches (and whose exclusion does not) wins; pipelines of later
//! matching rules are never merged in.

mod defaults;
mod step;

pub use defaults::default_rule_configs;
pub use step::{
    JscOptions, JscParserOptions, JscTransformOptions, ReactTransformOptions, Step,
    SwcLoaderOptions,
};

use crate::error::{compile_pattern, Error};
use crate::project::schema::{ExcludeConfig, RuleConfig, UseConfig};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// How the output of a rule's pipeline is treated by the bundler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModuleType {
    #[default]
    #[serde(rename = "javascript/auto")]
    JavascriptAuto,
    #[serde(rename = "css/auto")]
    CssAuto,
    /// Emitted as a separate file; the module exports its public URL.
    #[serde(rename = "asset/resource")]
    AssetResource,
}

impl ModuleType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JavascriptAuto => "javascript/auto",
            Self::CssAuto => "css/auto",
            Self::AssetResource => "asset/resource",
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "javascript/auto" | "javascript" => Ok(Self::JavascriptAuto),
            "css/auto" | "css" => Ok(Self::CssAuto),
            "asset/resource" => Ok(Self::AssetResource),
            other => Err(Error::InvalidOption {
                key: "module.rules.type".to_string(),
                message: format!(
                    "unsupported module type '{other}' (expected javascript/auto, css/auto or asset/resource)"
                ),
            }),
        }
    }
}

/// What the host does with a file no rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedPolicy {
    /// Include the file unchanged.
    #[default]
    Passthrough,
    /// Fail the build.
    Reject,
}

impl UnmatchedPolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::Reject => "reject",
        }
    }
}

/// Per-rule module resolution override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOverride {
    /// Require relative imports to carry their file extension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fully_specified: Option<bool>,
}

/// A compiled regular expression that remembers its source.
#[derive(Debug, Clone)]
pub struct Condition {
    source: String,
    regex: Regex,
}

impl Condition {
    pub fn new(pattern: &str) -> Result<Self, Error> {
        Ok(Self {
            source: pattern.to_string(),
            regex: compile_pattern(pattern)?,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Whether a match begins exactly at byte offset `start`.
    fn matches_at(&self, path: &str, start: usize) -> bool {
        self.regex
            .find_at(path, start)
            .is_some_and(|m| m.start() == start)
    }
}

impl Serialize for Condition {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

/// Exclusion with an optional allow-list.
///
/// The allow-list applies per occurrence: a path is excluded when any match
/// of `pattern` is not also the start of an `unless` match.
#[derive(Debug, Clone, Serialize)]
pub struct Exclusion {
    pub pattern: Condition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unless: Option<Condition>,
}

impl Exclusion {
    #[must_use]
    pub fn excludes(&self, path: &str) -> bool {
        let Some(unless) = &self.unless else {
            return self.pattern.is_match(path);
        };
        self.pattern
            .regex
            .find_iter(path)
            .any(|m| !unless.matches_at(path, m.start()))
    }
}

/// A compiled transformation rule.
#[derive(Debug, Clone, Serialize)]
pub struct Rule {
    pub name: String,
    pub test: Condition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Exclusion>,
    /// Loader chain in declared order. Loaders execute last to first.
    pub steps: Vec<Step>,
    #[serde(rename = "type")]
    pub module_type: ModuleType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolve: Option<ResolveOverride>,
}

impl Rule {
    /// Compile a rule from its configuration form.
    ///
    /// `index` names anonymous rules; `root` anchors relative loader paths.
    pub fn from_config(config: &RuleConfig, index: usize, root: &Path) -> Result<Self, Error> {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("rule-{index}"));

        let test = Condition::new(&config.test)?;

        let exclude = match &config.exclude {
            None => None,
            Some(ExcludeConfig::Pattern(pattern)) => Some(Exclusion {
                pattern: Condition::new(pattern)?,
                unless: None,
            }),
            Some(ExcludeConfig::Guarded { pattern, unless }) => Some(Exclusion {
                pattern: Condition::new(pattern)?,
                unless: unless.as_deref().map(Condition::new).transpose()?,
            }),
        };

        let loaders = match &config.uses {
            None => Vec::new(),
            Some(UseConfig::One(loader)) => vec![loader.clone()],
            Some(UseConfig::Many(loaders)) => loaders.clone(),
        };
        let steps = loaders
            .iter()
            .map(|loader| Step::from_loader(&name, loader.name(), loader.options(), root))
            .collect::<Result<Vec<_>, _>>()?;

        let module_type = match config.module_type.as_deref() {
            Some(t) => t.parse().map_err(|e| match e {
                Error::InvalidOption { message, .. } => Error::InvalidOption {
                    key: format!("module.rules[{index}].type"),
                    message,
                },
                other => other,
            })?,
            None => ModuleType::default(),
        };

        Ok(Self {
            name,
            test,
            exclude,
            steps,
            module_type,
            resolve: config.resolve,
        })
    }

    /// Whether this rule applies to a `/`-normalized path.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.test.is_match(path) && !self.exclude.as_ref().is_some_and(|e| e.excludes(path))
    }
}

/// Result of routing a path.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RouteMatch<'a> {
    pub rule: &'a str,
    pub steps: &'a [Step],
    #[serde(rename = "type")]
    pub module_type: ModuleType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolve: Option<ResolveOverride>,
}

impl RouteMatch<'_> {
    /// Loader names in declared order.
    #[must_use]
    pub fn pipeline(&self) -> Vec<&'static str> {
        self.steps.iter().map(Step::loader_name).collect()
    }
}

/// Ordered, immutable rule list.
#[derive(Debug, Clone, Serialize)]
pub struct RuleRouter {
    rules: Vec<Rule>,
    unmatched: UnmatchedPolicy,
}

impl RuleRouter {
    #[must_use]
    pub fn new(rules: Vec<Rule>, unmatched: UnmatchedPolicy) -> Self {
        Self { rules, unmatched }
    }

    /// Compile rule configurations in order.
    pub fn from_configs(
        configs: &[RuleConfig],
        unmatched: UnmatchedPolicy,
        root: &Path,
    ) -> Result<Self, Error> {
        let rules = configs
            .iter()
            .enumerate()
            .map(|(i, c)| Rule::from_config(c, i, root))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules, unmatched))
    }

    /// The built-in rule set.
    pub fn defaults(root: &Path, css_extract: bool) -> Result<Self, Error> {
        Self::from_configs(
            &default_rule_configs(root, css_extract)?,
            UnmatchedPolicy::default(),
            root,
        )
    }

    /// First matching rule for `path`, or `None` when no rule matches.
    #[must_use]
    pub fn route(&self, path: &Path) -> Option<RouteMatch<'_>> {
        let normalized = normalize(path);
        let rule = self.rules.iter().find(|r| r.matches(&normalized))?;
        tracing::debug!(path = %normalized, rule = %rule.name, "routed");
        Some(RouteMatch {
            rule: &rule.name,
            steps: &rule.steps,
            module_type: rule.module_type,
            resolve: rule.resolve,
        })
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn unmatched(&self) -> UnmatchedPolicy {
        self.unmatched
    }
}

fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn router() -> RuleRouter {
        RuleRouter::defaults(Path::new("/app"), false).unwrap()
    }

    fn rule_for(path: &str) -> Option<String> {
        router().route(Path::new(path)).map(|m| m.rule.to_string())
    }

    #[test]
    fn test_default_rule_order() {
        let names: Vec<_> = router().rules().iter().map(|r| r.name.clone()).collect();
        assert_eq!(
            names,
            ["typescript", "javascript", "module-resolution", "css", "sass", "assets"]
        );
    }

    #[test]
    fn test_typescript_files() {
        assert_eq!(rule_for("/app/src/index.tsx").as_deref(), Some("typescript"));
        assert_eq!(rule_for("/app/src/util.ts").as_deref(), Some("typescript"));
    }

    #[test]
    fn test_project_js_gets_legacy_transform() {
        let router = router();
        let m = router.route(Path::new("/app/src/legacy.js")).unwrap();
        assert_eq!(m.rule, "javascript");
        assert_eq!(m.pipeline(), ["builtin:swc-loader"]);
        assert_eq!(m.module_type, ModuleType::JavascriptAuto);
    }

    #[test]
    fn test_dependency_excluded_from_legacy_rule() {
        let router = router();
        let m = router
            .route(Path::new("/app/node_modules/lodash/lodash.js"))
            .unwrap();
        assert_eq!(m.rule, "module-resolution");
        assert!(m.steps.is_empty());
        assert_eq!(m.resolve.and_then(|r| r.fully_specified), Some(false));
    }

    #[test]
    fn test_allow_listed_dependency_included() {
        assert_eq!(
            rule_for("/app/node_modules/@pdd/monitor/index.js").as_deref(),
            Some("javascript")
        );
        assert_eq!(
            rule_for("/app/node_modules/@pdd/monitoring/index.js").as_deref(),
            Some("module-resolution")
        );
    }

    #[test]
    fn test_allow_list_checked_per_node_modules_segment() {
        assert_eq!(
            rule_for("/app/node_modules/@pdd/monitor/node_modules/lodash/a.js").as_deref(),
            Some("module-resolution")
        );
        assert_eq!(
            rule_for("/app/node_modules/foo/node_modules/@pdd/monitor/a.js").as_deref(),
            Some("module-resolution")
        );
    }

    #[test]
    fn test_windows_separators_normalized() {
        assert_eq!(
            rule_for(r"C:\app\node_modules\react\index.js").as_deref(),
            Some("module-resolution")
        );
    }

    #[test]
    fn test_json_not_claimed_by_module_resolution() {
        assert!(router().route(Path::new("/app/src/data.json")).is_none());
        assert!(router()
            .route(Path::new("/app/node_modules/pkg/package.json"))
            .is_none());
    }

    #[test]
    fn test_mjs_resolution_only() {
        assert_eq!(
            rule_for("/app/node_modules/x/index.mjs").as_deref(),
            Some("module-resolution")
        );
    }

    #[test]
    fn test_styles_and_assets() {
        let router = router();
        let css = router.route(Path::new("/app/src/index.css")).unwrap();
        assert_eq!(css.rule, "css");
        assert_eq!(css.pipeline(), ["postcss-loader"]);
        assert_eq!(css.module_type, ModuleType::CssAuto);

        let sass = router.route(Path::new("/app/src/theme.scss")).unwrap();
        assert_eq!(sass.pipeline(), ["sass-loader"]);

        let logo = router.route(Path::new("/app/src/logo.svg")).unwrap();
        assert_eq!(logo.module_type, ModuleType::AssetResource);
        assert!(logo.steps.is_empty());
    }

    #[test]
    fn test_css_extract_pipeline() {
        let router = RuleRouter::defaults(Path::new("/app"), true).unwrap();
        let css = router.route(Path::new("/app/src/index.css")).unwrap();
        assert_eq!(css.pipeline(), ["css-extract-loader", "css-loader"]);
    }

    #[test]
    fn test_no_rule_matched() {
        assert!(router().route(Path::new("/app/README.md")).is_none());
        assert!(router().route(Path::new("/app/font.woff2")).is_none());
    }

    #[test]
    fn test_first_match_wins_without_merging() {
        let configs: Vec<RuleConfig> = serde_json::from_value(json!([
            { "name": "first", "test": "\\.js$", "use": "postcss-loader" },
            { "name": "second", "test": "\\.js$", "use": ["css-loader"] }
        ]))
        .unwrap();
        let router =
            RuleRouter::from_configs(&configs, UnmatchedPolicy::Reject, Path::new("/")).unwrap();
        let m = router.route(Path::new("a.js")).unwrap();
        assert_eq!(m.rule, "first");
        assert_eq!(m.pipeline(), ["postcss-loader"]);
        assert_eq!(router.unmatched(), UnmatchedPolicy::Reject);
    }

    #[test]
    fn test_unknown_loader_rejected() {
        let configs: Vec<RuleConfig> = serde_json::from_value(json!([
            { "test": "\\.less$", "use": "less-loader" }
        ]))
        .unwrap();
        let err = RuleRouter::from_configs(&configs, UnmatchedPolicy::default(), Path::new("/"))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownLoader { ref loader, ref rule } if loader == "less-loader" && rule == "rule-0"));
    }

    #[test]
    fn test_malformed_pattern_rejected() {
        let configs: Vec<RuleConfig> =
            serde_json::from_value(json!([{ "test": "\\.(ts|tsx$" }])).unwrap();
        let err = RuleRouter::from_configs(&configs, UnmatchedPolicy::default(), Path::new("/"))
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_INVALID_PATTERN");
    }

    #[test]
    fn test_unknown_module_type_rejected() {
        let configs: Vec<RuleConfig> = serde_json::from_value(json!([
            { "test": "\\.png$", "type": "asset/inline" }
        ]))
        .unwrap();
        let err = RuleRouter::from_configs(&configs, UnmatchedPolicy::default(), Path::new("/"))
            .unwrap_err();
        assert!(err.to_string().contains("module.rules[0].type"));
    }

    #[test]
    fn test_plain_string_exclude() {
        let configs: Vec<RuleConfig> = serde_json::from_value(json!([
            { "name": "js", "test": "\\.js$", "exclude": "vendor/" }
        ]))
        .unwrap();
        let router =
            RuleRouter::from_configs(&configs, UnmatchedPolicy::default(), Path::new("/")).unwrap();
        assert!(router.route(Path::new("src/a.js")).is_some());
        assert!(router.route(Path::new("vendor/a.js")).is_none());
    }
}
