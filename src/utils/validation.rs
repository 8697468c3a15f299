use crate::utils::error::{EtlError, Result};
use std::collections::HashSet;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Output formats the load stage can write.
pub const SUPPORTED_FORMATS: &[&str] = &["csv", "json"];

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_file_extensions(
    field_name: &str,
    files: &[String],
    allowed_extensions: &[&str],
) -> Result<()> {
    let allowed_set: HashSet<String> = allowed_extensions
        .iter()
        .map(|ext| ext.to_ascii_lowercase())
        .collect();

    for file in files {
        if let Some(extension) = std::path::Path::new(file)
            .extension()
            .and_then(|ext| ext.to_str())
        {
            if !allowed_set.contains(&extension.to_ascii_lowercase()) {
                return Err(EtlError::InvalidConfigValueError {
                    field: field_name.to_string(),
                    value: file.clone(),
                    reason: format!(
                        "Unsupported file extension: {}. Allowed extensions: {}",
                        extension,
                        allowed_extensions.join(", ")
                    ),
                });
            }
        } else {
            return Err(EtlError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: file.clone(),
                reason: "File has no extension or invalid filename".to_string(),
            });
        }
    }

    Ok(())
}

pub fn validate_output_formats(field_name: &str, formats: &[String]) -> Result<()> {
    if formats.is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: String::new(),
            reason: "At least one output format is required".to_string(),
        });
    }

    for format in formats {
        if !SUPPORTED_FORMATS.contains(&format.to_ascii_lowercase().as_str()) {
            return Err(EtlError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: format.clone(),
                reason: format!(
                    "Unsupported output format. Supported formats: {}",
                    SUPPORTED_FORMATS.join(", ")
                ),
            });
        }
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| EtlError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("input", "run.fit").is_ok());
        assert!(validate_path("input", "").is_err());
        assert!(validate_path("input", "a\0b").is_err());
    }

    #[test]
    fn test_validate_file_extensions() {
        let files = vec!["morning.fit".to_string(), "EVENING.FIT".to_string()];
        assert!(validate_file_extensions("input", &files, &["fit"]).is_ok());

        let invalid_files = vec!["activity.gpx".to_string()];
        assert!(validate_file_extensions("input", &invalid_files, &["fit"]).is_err());

        let no_extension = vec!["activity".to_string()];
        assert!(validate_file_extensions("input", &no_extension, &["fit"]).is_err());
    }

    #[test]
    fn test_validate_output_formats() {
        assert!(validate_output_formats("formats", &["csv".into(), "JSON".into()]).is_ok());
        assert!(validate_output_formats("formats", &[]).is_err());
        assert!(validate_output_formats("formats", &["parquet".into()]).is_err());
    }

    #[test]
    fn test_validate_required_field() {
        let present = Some(3);
        let missing: Option<i32> = None;
        assert_eq!(*validate_required_field("x", &present).unwrap(), 3);
        assert!(matches!(
            validate_required_field("x", &missing),
            Err(EtlError::MissingConfigError { .. })
        ));
    }
}
