use serde::Serialize;
use thiserror::Error;

/// User-friendly error presentation for the frontend shell.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPresentation {
    pub title: String,
    pub message: String,
    pub action: Option<String>,
}

/// Application-wide error type.
///
/// Every variant is terminal for the current request: the engine surfaces the
/// first error encountered and discards any partial output. Exactly one
/// presentation is produced per failed request.
#[derive(Debug, Error)]
pub enum SplitError {
    // ── Input format ──────────────────────────────────────────────────────────
    #[error("Unsupported file format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("No reader available for {extension}: {remediation}")]
    MissingCapability {
        extension: String,
        remediation: String,
    },

    #[error("Failed to decode input: {0}")]
    Decode(String),

    // ── Configuration ─────────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    Config(String),

    // ── Output ────────────────────────────────────────────────────────────────
    #[error("Failed to serialize part {partition}: {message}")]
    Serialization { partition: usize, message: String },

    #[error("Archive assembly failed: {0}")]
    Archive(String),

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SplitError {
    /// Converts the error into a user-friendly presentation suitable for UI
    /// display.
    pub fn to_presentation(&self) -> ErrorPresentation {
        match self {
            SplitError::UnsupportedFormat { extension } => ErrorPresentation {
                title: "Unsupported File".into(),
                message: format!(
                    "Files of type {} cannot be processed. Supported types are .csv, .xlsx and .xlsm.",
                    extension
                ),
                action: Some("Upload a CSV or Excel file".into()),
            },

            SplitError::MissingCapability {
                extension,
                remediation,
            } => ErrorPresentation {
                title: "Format Not Enabled".into(),
                message: format!(
                    "Reading {} files is not enabled in this build. {}",
                    extension, remediation
                ),
                action: Some("Convert the file to .xlsx".into()),
            },

            SplitError::Decode(msg) => ErrorPresentation {
                title: "File Could Not Be Read".into(),
                message: format!("The file has a formatting problem: {}", msg),
                action: Some("Check the file's delimiter and encoding settings".into()),
            },

            SplitError::Config(msg) => ErrorPresentation {
                title: "Invalid Settings".into(),
                message: msg.clone(),
                action: Some("Adjust the split settings and try again".into()),
            },

            SplitError::Serialization { partition, message } => ErrorPresentation {
                title: "Part Could Not Be Written".into(),
                message: format!("Part {} failed to serialize: {}", partition, message),
                action: Some("Try a different output format".into()),
            },

            SplitError::Archive(msg) => ErrorPresentation {
                title: "Archive Error".into(),
                message: format!("The download archive could not be assembled: {}", msg),
                action: Some("Try again".into()),
            },

            SplitError::Internal(_) => ErrorPresentation {
                title: "Unexpected Error".into(),
                message: "Something went wrong. Please try again.".into(),
                action: Some("Try again".into()),
            },
        }
    }
}

// Allow SplitError to cross the shell boundary as its presentation.
impl Serialize for SplitError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_presentation().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns all SplitError variants for exhaustive testing.
    fn all_variants() -> Vec<SplitError> {
        vec![
            SplitError::UnsupportedFormat {
                extension: ".pdf".into(),
            },
            SplitError::MissingCapability {
                extension: ".xls".into(),
                remediation: "Re-save the workbook as .xlsx.".into(),
            },
            SplitError::Decode("invalid utf-8 at byte 42".into()),
            SplitError::Config("chunk size 0 is out of range".into()),
            SplitError::Serialization {
                partition: 3,
                message: "row too wide".into(),
            },
            SplitError::Archive("zip finalization failed".into()),
            SplitError::Internal("something broke".into()),
        ]
    }

    #[test]
    fn all_variants_have_nonempty_title_and_message() {
        for variant in all_variants() {
            let presentation = variant.to_presentation();
            assert!(
                !presentation.title.trim().is_empty(),
                "Empty title for {:?}",
                variant
            );
            assert!(
                !presentation.message.trim().is_empty(),
                "Empty message for {:?}",
                variant
            );
        }
    }

    #[test]
    fn missing_capability_names_extension_and_remediation() {
        let err = SplitError::MissingCapability {
            extension: ".xls".into(),
            remediation: "Re-save the workbook as .xlsx.".into(),
        };
        let presentation = err.to_presentation();
        assert!(presentation.message.contains(".xls"));
        assert!(presentation.message.contains(".xlsx"));
    }

    #[test]
    fn serialization_error_names_partition_index() {
        let err = SplitError::Serialization {
            partition: 7,
            message: "boom".into(),
        };
        assert!(err.to_string().contains("part 7"));
        assert!(err.to_presentation().message.contains("7"));
    }

    #[test]
    fn serialization_produces_valid_json_with_required_fields() {
        for variant in all_variants() {
            let json = serde_json::to_string(&variant)
                .unwrap_or_else(|_| panic!("Failed to serialize {:?}", variant));

            let parsed: serde_json::Value = serde_json::from_str(&json)
                .unwrap_or_else(|_| panic!("Failed to parse JSON for {:?}", variant));

            assert!(parsed.get("title").is_some());
            assert!(parsed.get("message").is_some());
            // action can be null, but the field must exist
            assert!(parsed.get("action").is_some());
        }
    }
}
