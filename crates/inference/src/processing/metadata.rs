//! Ultralytics ONNX exports carry their label table in the `names` metadata
//! entry as a YAML flow mapping, e.g. `{0: 'pothole', 1: 'crack'}`.

use std::collections::BTreeMap;

/// Largest label table accepted from model metadata.
pub const MAX_CLASSES: usize = 4096;

/// Parse a `names` entry into an id-indexed table.
///
/// Ids missing from the mapping get `class_{id}`. Returns `None` when the
/// value is not a non-empty mapping of integer ids to strings, or when an id
/// reaches [`MAX_CLASSES`].
pub fn parse_class_names(raw: &str) -> Option<Vec<String>> {
    let entries: BTreeMap<usize, String> = match serde_yaml::from_str(raw) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable `names` metadata");
            return None;
        }
    };

    let (&max_id, _) = entries.last_key_value()?;
    if max_id >= MAX_CLASSES {
        tracing::warn!(max_id, limit = MAX_CLASSES, "Class id out of range in `names` metadata");
        return None;
    }

    let mut names: Vec<String> = (0..=max_id).map(|id| format!("class_{}", id)).collect();
    for (id, name) in entries {
        names[id] = name;
    }
    Some(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_class() {
        assert_eq!(
            parse_class_names("{0: 'pothole'}"),
            Some(vec!["pothole".to_string()])
        );
    }

    #[test]
    fn test_rdd_classes_with_double_quotes() {
        let names = parse_class_names(r#"{0: "D00", 1: "D10", 2: "D20", 3: "D40"}"#).unwrap();
        assert_eq!(names, vec!["D00", "D10", "D20", "D40"]);
    }

    #[test]
    fn test_gaps_are_filled() {
        let names = parse_class_names("{0: 'pothole', 2: 'manhole'}").unwrap();
        assert_eq!(names, vec!["pothole", "class_1", "manhole"]);
    }

    #[test]
    fn test_labels_may_contain_separators() {
        let names = parse_class_names("{0: 'traffic light', 1: 'a, b: c'}").unwrap();
        assert_eq!(names, vec!["traffic light", "a, b: c"]);
    }

    #[test]
    fn test_plain_scalars_are_labels() {
        let names = parse_class_names("{0: pothole, 1: alligator crack}").unwrap();
        assert_eq!(names, vec!["pothole", "alligator crack"]);
    }

    #[test]
    fn test_malformed_input() {
        assert_eq!(parse_class_names(""), None);
        assert_eq!(parse_class_names("{}"), None);
        assert_eq!(parse_class_names("[pothole]"), None);
        assert_eq!(parse_class_names("{zero: 'pothole'}"), None);
        assert_eq!(parse_class_names("{-1: 'pothole'}"), None);
        assert_eq!(parse_class_names("{0: 'pothole'"), None);
    }

    #[test]
    fn test_oversized_ids_are_rejected() {
        assert_eq!(parse_class_names("{18446744073709551615: 'x'}"), None);
        assert_eq!(parse_class_names("{10000000000: 'x'}"), None);
        assert_eq!(parse_class_names("{0: 'a', 4096: 'b'}"), None);

        let names = parse_class_names("{4095: 'last'}").unwrap();
        assert_eq!(names.len(), MAX_CLASSES);
        assert_eq!(names[4095], "last");
    }
}
