//! Config documents: JSON descriptors of pinned sources and named build
//! configurations.
//!
//! The authored JSON is kept alongside the typed view. It is what gets
//! persisted in snapshots and pretty-printed for the document diff, so field
//! order survives exactly as written (serde_json's `preserve_order`).

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{config_io, ConfigError};
use crate::remote::RemoteSpec;
use crate::types::{ConfigurationName, SourceName};

/// One pinned source repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub name: SourceName,
    pub remote: RemoteSpec,
    /// Branch, tag or commit id to check out.
    pub revision: String,
    /// Checkout location relative to the build directory's `layers/`.
    pub path: PathBuf,
}

/// One named, independently materializable build configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub name: ConfigurationName,
    pub description: String,
    pub template: String,
    pub fragments: Vec<String>,
    pub targets: Vec<String>,
}

/// A parsed config document.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    /// The document as authored.
    pub raw: Value,
    pub description: Option<String>,
    pub version: Option<String>,
    /// Sources in document order.
    pub sources: Vec<SourceEntry>,
    /// Configurations in document order.
    pub configurations: Vec<Configuration>,
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(rename = "git-remote")]
    git_remote: RawGitRemote,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawGitRemote {
    remotes: Map<String, Value>,
    #[serde(default)]
    rev: Option<String>,
    #[serde(default)]
    branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRemote {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct RawConfiguration {
    #[serde(default)]
    description: String,
    #[serde(default, alias = "oe-template")]
    template: Option<String>,
    #[serde(default, alias = "oe-fragments")]
    fragments: Vec<String>,
    #[serde(default)]
    targets: Vec<String>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl ConfigDocument {
    /// Read and parse a document from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| config_io(path, e))?;
        Self::parse(&contents, path)
    }

    /// Parse document text; `origin` is only used in error messages.
    pub fn parse(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        let raw: Value = serde_json::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        Self::from_value(raw, origin)
    }

    /// Build the typed view of an already-parsed JSON value.
    pub fn from_value(raw: Value, origin: &Path) -> Result<Self, ConfigError> {
        let missing = |key: &str| ConfigError::MissingKey {
            path: origin.to_path_buf(),
            key: key.to_string(),
        };
        let parse_err = |source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        };

        let Some(root) = raw.as_object() else {
            return Err(missing("sources"));
        };
        let sources_obj = root
            .get("sources")
            .and_then(Value::as_object)
            .ok_or_else(|| missing("sources"))?;
        let configurations_obj = root
            .get("configuration")
            .or_else(|| root.get("bitbake-setup").and_then(|s| s.get("configuration")))
            .and_then(Value::as_object)
            .ok_or_else(|| missing("configuration"))?;

        let mut sources = Vec::with_capacity(sources_obj.len());
        let mut seen_paths = BTreeSet::new();
        for (name, value) in sources_obj {
            validate_name("source", name, origin)?;
            let raw_source: RawSource =
                serde_json::from_value(value.clone()).map_err(parse_err)?;
            let remote = pick_remote(&raw_source.git_remote.remotes)
                .ok_or_else(|| missing(&format!("sources.{name}.git-remote.remotes")))?;
            let remote: RawRemote = serde_json::from_value(remote.clone()).map_err(parse_err)?;
            let remote = RemoteSpec::parse(&remote.uri)?;

            let revision = raw_source
                .git_remote
                .rev
                .clone()
                .or_else(|| remote.rev.clone())
                .or_else(|| raw_source.git_remote.branch.clone())
                .unwrap_or_else(|| remote.revision().to_string());

            let path = PathBuf::from(raw_source.path.as_deref().unwrap_or(name));
            validate_checkout_path(&path, origin)?;
            if !seen_paths.insert(path.clone()) {
                return Err(ConfigError::InvalidName {
                    kind: "duplicate source path",
                    name: path.display().to_string(),
                    path: origin.to_path_buf(),
                });
            }

            sources.push(SourceEntry {
                name: SourceName::from(name.as_str()),
                remote,
                revision,
                path,
            });
        }

        let mut configurations = Vec::with_capacity(configurations_obj.len());
        for (name, value) in configurations_obj {
            validate_name("configuration", name, origin)?;
            let raw_cfg: RawConfiguration =
                serde_json::from_value(value.clone()).map_err(parse_err)?;
            let template = raw_cfg
                .template
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| missing(&format!("configuration.{name}.oe-template")))?;
            configurations.push(Configuration {
                name: ConfigurationName::from(name.as_str()),
                description: raw_cfg.description,
                template,
                fragments: raw_cfg.fragments,
                targets: raw_cfg.targets,
            });
        }

        let description = root
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        let version = root.get("version").map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });

        Ok(Self {
            raw,
            description,
            version,
            sources,
            configurations,
        })
    }

    /// The authored document pretty-printed with 4-space indentation and a
    /// trailing newline. This is the text the document diff compares.
    pub fn pretty(&self) -> Result<String, serde_json::Error> {
        pretty_json(&self.raw)
    }

    pub fn source(&self, name: &SourceName) -> Option<&SourceEntry> {
        self.sources.iter().find(|s| &s.name == name)
    }
}

/// Pretty-print any JSON value the way documents are rendered for diffing.
pub fn pretty_json(value: &Value) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    let mut text = String::from_utf8_lossy(&buf).into_owned();
    text.push('\n');
    Ok(text)
}

/// `origin` wins when present, otherwise the first remote as authored.
fn pick_remote(remotes: &Map<String, Value>) -> Option<&Value> {
    remotes.get("origin").or_else(|| remotes.values().next())
}

fn validate_name(kind: &'static str, name: &str, origin: &Path) -> Result<(), ConfigError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') {
        return Err(ConfigError::InvalidName {
            kind,
            name: name.to_string(),
            path: origin.to_path_buf(),
        });
    }
    Ok(())
}

fn validate_checkout_path(path: &Path, origin: &Path) -> Result<(), ConfigError> {
    let ok = !path.as_os_str().is_empty()
        && path.components().all(|c| matches!(c, Component::Normal(_)));
    if !ok {
        return Err(ConfigError::InvalidName {
            kind: "source path",
            name: path.display().to_string(),
            path: origin.to_path_buf(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
    "sources": {
        "test-repo": {
            "git-remote": {
                "remotes": {
                    "origin": {
                        "uri": "file:///srv/test-repo"
                    }
                },
                "rev": "master"
            },
            "path": "test-repo"
        }
    },
    "description": "Test configuration",
    "bitbake-setup": {
        "configuration": {
            "gadget": {
                "description": "Gadget build configuration",
                "oe-template": "test-configuration-gadget",
                "oe-fragments": ["test-fragment-1"],
                "targets": ["some-target-executable-1"]
            },
            "gizmo": {
                "description": "Gizmo build configuration",
                "oe-template": "test-configuration-gizmo",
                "oe-fragments": ["test-fragment-2"],
                "targets": ["some-target-executable-2"]
            }
        }
    },
    "version": "1.0"
}
"#;

    fn origin() -> PathBuf {
        PathBuf::from("test.conf.json")
    }

    #[test]
    fn parses_nested_configuration_section() {
        let doc = ConfigDocument::parse(DOC, &origin()).unwrap();
        assert_eq!(doc.description.as_deref(), Some("Test configuration"));
        assert_eq!(doc.version.as_deref(), Some("1.0"));
        assert_eq!(doc.sources.len(), 1);
        let src = &doc.sources[0];
        assert_eq!(src.name, SourceName::from("test-repo"));
        assert_eq!(src.remote.url, "file:///srv/test-repo");
        assert_eq!(src.revision, "master");
        assert_eq!(src.path, PathBuf::from("test-repo"));

        let names: Vec<_> = doc.configurations.iter().map(|c| c.name.0.as_str()).collect();
        assert_eq!(names, ["gadget", "gizmo"]);
        assert_eq!(doc.configurations[0].template, "test-configuration-gadget");
        assert_eq!(doc.configurations[1].fragments, ["test-fragment-2"]);
    }

    #[test]
    fn pretty_print_preserves_authored_field_order() {
        let doc = ConfigDocument::parse(DOC, &origin()).unwrap();
        let pretty = doc.pretty().unwrap();
        assert!(pretty.contains("\n                \"rev\": \"master\"\n"));
        let pos = |needle: &str| pretty.find(needle).expect(needle);
        assert!(pos("\"sources\"") < pos("\"description\""));
        assert!(pos("\"description\"") < pos("\"bitbake-setup\""));
        assert!(pos("\"bitbake-setup\"") < pos("\"version\""));
        assert!(pos("\"gadget\"") < pos("\"gizmo\""));
        assert!(pretty.ends_with("}\n"));
    }

    #[test]
    fn top_level_configuration_key_is_accepted() {
        let text = r#"{"sources": {}, "configuration": {"a": {"template": "t"}}}"#;
        let doc = ConfigDocument::parse(text, &origin()).unwrap();
        assert_eq!(doc.configurations[0].template, "t");
        assert!(doc.configurations[0].targets.is_empty());
    }

    #[test]
    fn missing_sources_is_reported() {
        let err = ConfigDocument::parse(r#"{"configuration": {}}"#, &origin()).unwrap_err();
        assert!(
            matches!(&err, ConfigError::MissingKey { key, .. } if key == "sources"),
            "got: {err}"
        );
    }

    #[test]
    fn missing_configuration_is_reported() {
        let err = ConfigDocument::parse(r#"{"sources": {}}"#, &origin()).unwrap_err();
        assert!(
            matches!(&err, ConfigError::MissingKey { key, .. } if key == "configuration"),
            "got: {err}"
        );
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = ConfigDocument::parse("{ not json", &origin()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
        assert!(err.to_string().contains("test.conf.json"));
    }

    #[test]
    fn configuration_without_template_is_rejected() {
        let text = r#"{"sources": {}, "configuration": {"a": {"targets": ["x"]}}}"#;
        let err = ConfigDocument::parse(text, &origin()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { .. }), "got: {err}");
    }

    #[test]
    fn escaping_source_path_is_rejected() {
        let text = r#"{"sources": {"s": {"git-remote": {"remotes": {"o": {"uri": "file:///x"}}}, "path": "../x"}},
                      "configuration": {}}"#;
        let err = ConfigDocument::parse(text, &origin()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidName { .. }), "got: {err}");
    }

    #[test]
    fn revision_falls_back_to_uri_qualifiers() {
        let text = r#"{"sources": {"s": {"git-remote": {"remotes": {"o": {"uri": "file:///x;branch=dev"}}}}},
                      "configuration": {}}"#;
        let doc = ConfigDocument::parse(text, &origin()).unwrap();
        assert_eq!(doc.sources[0].revision, "dev");
        assert_eq!(doc.sources[0].path, PathBuf::from("s"));
    }
}
