use crate::utils::error::{Result, TallyError};
use std::path::Path;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(TallyError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

/// A limit of -1 means "unlimited"; anything below that is a caller bug.
pub fn validate_limit(value: i64) -> Result<()> {
    if value < -1 {
        return Err(TallyError::InvalidLimit {
            value,
            reason: "limit must be -1 (unlimited) or non-negative".to_string(),
        });
    }
    Ok(())
}

pub fn validate_path(field_name: &str, path: &Path) -> Result<()> {
    let raw = path.as_os_str();
    if raw.is_empty() {
        return Err(TallyError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: String::new(),
            reason: "Path cannot be empty".to_string(),
        });
    }
    if path.to_string_lossy().contains('\0') {
        return Err(TallyError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string_lossy().into_owned(),
            reason: "Path contains null bytes".to_string(),
        });
    }
    Ok(())
}
