//! # Command manifest loader.
//!
//! Reads a per-subsystem command manifest and produces the registry's
//! [`CommandInfo`] entries. Document shape:
//!
//! ```yaml
//! subsystem: sample
//! commands:
//!   - name: Sample
//!     allowed_modes: [normal]
//!     args:
//!       rate: int
//!       label: string
//!     emit: [event.sample.accepted]
//!     description: sample command
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ManifestError;

use super::message::ArgType;
use super::registry::CommandInfo;

#[derive(Debug, Deserialize)]
struct CommandManifestDoc {
    subsystem: String,
    #[serde(default)]
    commands: Vec<CommandEntry>,
}

#[derive(Debug, Deserialize)]
struct CommandEntry {
    name: String,
    #[serde(default)]
    allowed_modes: Vec<String>,
    #[serde(default)]
    args: BTreeMap<String, String>,
    #[serde(default)]
    emit: Vec<String>,
    #[serde(default)]
    description: String,
}

/// Loads command manifests into registry entries.
pub struct CommandManifestLoader;

impl CommandManifestLoader {
    /// Parses a manifest document.
    pub fn parse(yaml: &str, origin: &str) -> Result<Vec<CommandInfo>, ManifestError> {
        let doc: CommandManifestDoc =
            serde_yaml::from_str(yaml).map_err(|source| ManifestError::Parse {
                path: origin.to_string(),
                source,
            })?;

        Ok(doc
            .commands
            .into_iter()
            .map(|entry| CommandInfo {
                name: entry.name,
                service: doc.subsystem.clone(),
                allowed_modes: entry.allowed_modes.into_iter().collect(),
                arg_types: entry
                    .args
                    .into_iter()
                    .map(|(key, ty)| (key, ArgType::parse(&ty)))
                    .collect(),
                emit: entry.emit,
                description: entry.description,
            })
            .collect())
    }

    /// Reads and parses a manifest file.
    pub fn load(path: &Path) -> Result<Vec<CommandInfo>, ManifestError> {
        let origin = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: origin.clone(),
            source,
        })?;
        Self::parse(&text, &origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
subsystem: sample
commands:
  - name: Sample
    allowed_modes: [normal, production]
    args:
      rate: int
      label: String
    emit: [event.sample.accepted, event.sample.completed]
    description: sample command
  - name: UploadLog
    allowed_modes: [maintenance]
"#;

    #[test]
    fn parses_commands_with_typed_args() {
        let commands = CommandManifestLoader::parse(SAMPLE, "test").unwrap();
        assert_eq!(commands.len(), 2);

        let sample = &commands[0];
        assert_eq!(sample.name, "Sample");
        assert_eq!(sample.service, "sample");
        assert!(sample.allowed_modes.contains("normal"));
        assert_eq!(sample.arg_types["rate"], ArgType::Int);
        assert_eq!(sample.arg_types["label"], ArgType::String);
        assert_eq!(sample.emit.len(), 2);

        let upload = &commands[1];
        assert_eq!(upload.service, "sample");
        assert!(upload.arg_types.is_empty());
        assert!(upload.emit.is_empty());
    }

    #[test]
    fn bad_document_is_a_parse_error() {
        let err = CommandManifestLoader::parse("commands: 3", "test").unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }
}
