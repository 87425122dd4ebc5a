//! Primary-key shape checks used by the integrity sweep.

use serde_json::Value;
use uuid::Uuid;

use super::tables::KeyShape;

/// Hyphenated, 36-character UUID whose version nibble is 4.
///
/// Keys derived from timestamps (an older client scheme) fail this check.
pub fn is_uuid_v4(input: &str) -> bool {
    if input.len() != 36 {
        return false;
    }
    match Uuid::try_parse(input) {
        Ok(id) => id.get_version_num() == 4,
        Err(_) => false,
    }
}

/// Whether a stored key is acceptable for a table with the given shape.
pub fn key_matches_shape(shape: KeyShape, key: &Value) -> bool {
    match (shape, key) {
        (_, Value::Null) => false,
        (KeyShape::Opaque, _) => true,
        (KeyShape::UuidV4, Value::String(v)) => is_uuid_v4(v),
        (KeyShape::UuidV4, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_v4_uuids_in_either_case() {
        assert!(is_uuid_v4("3f2b6c1e-8d4a-4c2b-9e1f-0a1b2c3d4e5f"));
        assert!(is_uuid_v4("3F2B6C1E-8D4A-4C2B-9E1F-0A1B2C3D4E5F"));
    }

    #[test]
    fn rejects_other_versions_and_shapes() {
        // v7
        assert!(!is_uuid_v4("01890a5d-ac96-774b-bcce-b302099a8057"));
        // simple form
        assert!(!is_uuid_v4("3f2b6c1e8d4a4c2b9e1f0a1b2c3d4e5f"));
        // timestamp-derived key
        assert!(!is_uuid_v4("1722951234567"));
        assert!(!is_uuid_v4(""));
    }

    #[test]
    fn opaque_keys_only_reject_null() {
        assert!(key_matches_shape(KeyShape::Opaque, &json!("t1")));
        assert!(key_matches_shape(KeyShape::Opaque, &json!(7)));
        assert!(!key_matches_shape(KeyShape::Opaque, &Value::Null));
        assert!(!key_matches_shape(KeyShape::UuidV4, &json!(7)));
    }
}
