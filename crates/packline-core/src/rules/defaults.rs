//! Built-in rule set.

use crate::error::Error;
use crate::project::schema::RuleConfig;
use serde_json::json;
use std::path::Path;

/// Default rules in evaluation order.
///
/// The `javascript` rule precedes `module-resolution` so that project `.js`
/// files take the legacy transform while dependency `.js`/`.mjs` files fall
/// through to the resolution-only rule.
#[must_use]
pub fn default_rule_configs(root: &Path, css_extract: bool) -> Result<Vec<RuleConfig>, Error> {
    let css_use = if css_extract {
        json!(["css-extract-loader", "css-loader"])
    } else {
        json!([{ "loader": "postcss-loader", "options": { "postcssOptions": {} } }])
    };

    let value = json!([
        {
            "name": "typescript",
            "test": r"\.(ts|tsx)$",
            "use": [{
                "loader": "builtin:swc-loader",
                "options": {
                    "sourceMaps": true,
                    "jsc": {
                        "parser": {
                            "syntax": "typescript",
                            "exportDefaultFrom": true,
                            "exportNamespaceFrom": true,
                            "jsx": true,
                            "decorators": true
                        },
                        "externalHelpers": true,
                        "preserveAllComments": false,
                        "transform": {
                            "react": { "runtime": "automatic", "throwIfNamespace": true, "useBuiltins": false }
                        }
                    }
                }
            }],
            "type": "javascript/auto"
        },
        {
            "name": "javascript",
            "test": r"\.(jsx|js)$",
            "exclude": { "pattern": "node_modules", "unless": "node_modules/@pdd/monitor/" },
            "use": {
                "loader": "builtin:swc-loader",
                "options": {
                    "sourceMap": true,
                    "target": "es5",
                    "jsc": {
                        "loose": true,
                        "parser": { "syntax": "ecmascript", "jsx": true, "tsx": true, "decorators": true },
                        "externalHelpers": true,
                        "preserveAllComments": false,
                        "transform": {
                            "react": {
                                "runtime": "automatic",
                                "pragma": "React.createElement",
                                "pragmaFrag": "React.Fragment",
                                "throwIfNamespace": true,
                                "useBuiltins": false
                            }
                        }
                    }
                }
            },
            "type": "javascript/auto"
        },
        {
            "name": "module-resolution",
            "test": r"\.m?js$",
            "resolve": { "fullySpecified": false }
        },
        {
            "name": "css",
            "test": r"\.css$",
            "use": css_use,
            "type": "css/auto"
        },
        {
            "name": "sass",
            "test": r"\.(sass|scss)$",
            "use": [{
                "loader": "sass-loader",
                "options": {
                    "includePaths": [
                        root.join("src").join("scss"),
                        root.join("node_modules")
                    ]
                }
            }],
            "type": "css/auto"
        },
        {
            "name": "assets",
            "test": r"\.(png|svg|jpg)$",
            "type": "asset/resource"
        }
    ]);

    serde_json::from_value(value).map_err(|source| Error::ConfigSchema { source })
}
