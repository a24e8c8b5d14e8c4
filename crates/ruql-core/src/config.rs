//! Engine configuration
//!
//! The qualifier set and resource types an engine instance works with are
//! injected at construction time. There is no module-level default state:
//! two engines in the same process can run with different configurations.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::qualifier::QualifierKind;

/// One qualifier dimension the engine knows about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifierConfig {
    /// Qualifier name, e.g. `language`
    pub name: String,
    /// Value rules for this qualifier
    #[serde(flatten)]
    pub kind: QualifierKind,
}

/// One resource type the engine can instantiate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceTypeConfig {
    /// Type name, e.g. `json`
    pub name: String,
    /// Template value used when a new resource is created without content
    #[serde(default = "default_template")]
    pub template: Value,
}

fn default_template() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Engine configuration: qualifiers and resource types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Qualifier dimensions, in declaration order
    #[serde(default)]
    pub qualifiers: Vec<QualifierConfig>,

    /// Known resource types
    #[serde(default)]
    pub resource_types: Vec<ResourceTypeConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            qualifiers: vec![
                QualifierConfig {
                    name: "language".to_string(),
                    kind: QualifierKind::LanguageTag,
                },
                QualifierConfig {
                    name: "territory".to_string(),
                    kind: QualifierKind::Territory,
                },
                QualifierConfig {
                    name: "platform".to_string(),
                    kind: QualifierKind::OneOf {
                        values: vec!["web".into(), "ios".into(), "android".into()],
                    },
                },
                QualifierConfig {
                    name: "density".to_string(),
                    kind: QualifierKind::OneOf {
                        values: vec!["ldpi".into(), "mdpi".into(), "hdpi".into(), "xhdpi".into()],
                    },
                },
            ],
            resource_types: vec![ResourceTypeConfig {
                name: "json".to_string(),
                template: default_template(),
            }],
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Look up a qualifier by name
    pub fn qualifier(&self, name: &str) -> Option<&QualifierConfig> {
        self.qualifiers.iter().find(|q| q.name == name)
    }

    /// Look up a resource type by name
    pub fn resource_type(&self, name: &str) -> Option<&ResourceTypeConfig> {
        self.resource_types.iter().find(|t| t.name == name)
    }

    /// Names of all configured qualifiers, in declaration order
    pub fn qualifier_names(&self) -> Vec<String> {
        self.qualifiers.iter().map(|q| q.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.qualifier("language").is_some());
        assert!(config.qualifier("territory").is_some());
        assert!(config.qualifier("unknown").is_none());
        assert!(config.resource_type("json").is_some());
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(
            &path,
            r#"
[[qualifiers]]
name = "language"
kind = "language_tag"

[[qualifiers]]
name = "channel"
kind = "one_of"
values = ["stable", "beta"]

[[resource_types]]
name = "json"

[[resource_types]]
name = "string"
template = ""
"#,
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.qualifiers.len(), 2);
        assert_eq!(
            config.qualifier("channel").unwrap().kind,
            QualifierKind::OneOf {
                values: vec!["stable".into(), "beta".into()]
            }
        );
        assert_eq!(
            config.resource_type("json").unwrap().template,
            serde_json::json!({})
        );
        assert_eq!(
            config.resource_type("string").unwrap().template,
            serde_json::json!("")
        );
    }

    #[test]
    fn test_qualifier_names_order() {
        let config = EngineConfig::default();
        assert_eq!(
            config.qualifier_names(),
            vec!["language", "territory", "platform", "density"]
        );
    }
}
