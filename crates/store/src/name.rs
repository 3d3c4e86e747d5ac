use crate::StoreError;

/// Longest accepted object name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Validates an object name before any tier I/O.
///
/// The namespace is flat: one file per name under the local tier's root,
/// one key per name in the object store. Separators are rejected rather
/// than normalized: flattening `a/b` into a single file name would
/// collide with a legitimate `a_b`.
///
/// Rejects:
/// - empty names and names over [`MAX_NAME_LEN`] bytes
/// - path separators (`/`, `\`)
/// - `.` and `..`
/// - control characters
pub fn validate_object_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::InvalidName("empty name".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(StoreError::InvalidName(format!(
            "name exceeds {MAX_NAME_LEN} bytes"
        )));
    }
    if name == "." || name == ".." {
        return Err(StoreError::InvalidName(format!(
            "reserved name not allowed: {name}"
        )));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(StoreError::InvalidName(format!(
            "path separators not allowed: {name}"
        )));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(StoreError::InvalidName(
            "control characters not allowed".into(),
        ));
    }
    Ok(())
}
