use reviewbot_core::DiffChange;
use sha2::{Digest, Sha256};

/// Hex length of [`content_hash`] output.
pub const CONTENT_HASH_LEN: usize = 64;

/// SHA-256 over a labelled encoding of the ordered change set.
///
/// Each change is written as
///
/// ```text
/// old_path:<bytes>:<old path>
/// new_path:<bytes>:<new path>
/// flags:<N|-><D|-><R|->
/// diff:<bytes>:<diff body>
/// ---
/// ```
///
/// Variable-length fields carry their byte length, so a path or diff body that
/// happens to contain a label or the `---` terminator cannot shift field
/// boundaries. Missing paths encode as empty strings.
pub fn content_hash(changes: &[DiffChange]) -> String {
    let mut hasher = Sha256::new();
    for change in changes {
        write_field(&mut hasher, "old_path", change.old_path.as_deref().unwrap_or(""));
        write_field(&mut hasher, "new_path", change.new_path.as_deref().unwrap_or(""));
        hasher.update(b"flags:");
        hasher.update(change.flags().as_bytes());
        hasher.update(b"\n");
        write_field(&mut hasher, "diff", &change.diff);
        hasher.update(b"---\n");
    }
    hex::encode(hasher.finalize())
}

fn write_field(hasher: &mut Sha256, label: &str, value: &str) {
    hasher.update(label.as_bytes());
    hasher.update(format!(":{}:", value.len()).as_bytes());
    hasher.update(value.as_bytes());
    hasher.update(b"\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(path: &str, diff: &str) -> DiffChange {
        DiffChange {
            old_path: Some(path.into()),
            new_path: Some(path.into()),
            diff: diff.into(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_input_is_sha256_of_nothing() {
        assert_eq!(
            content_hash(&[]),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn matches_known_vector() {
        let h = content_hash(&[change("src/lib.rs", "@@ -1 +1 @@\n-a\n+b\n")]);
        assert_eq!(h, "8bec204fc333f642c58cf5fb6ff3c692d73778cf81295022f3f4b4560c8ede1d");
        assert_eq!(h.len(), CONTENT_HASH_LEN);
    }

    #[test]
    fn hash_is_stable() {
        let changes = vec![change("a.rs", "+1"), change("b.rs", "-2")];
        assert_eq!(content_hash(&changes), content_hash(&changes.clone()));
    }

    #[test]
    fn one_diff_body_changes_the_hash() {
        let a = vec![change("a.rs", "+1"), change("b.rs", "-2")];
        let b = vec![change("a.rs", "+1"), change("b.rs", "-3")];
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn order_matters() {
        let a = vec![change("a.rs", "+1"), change("b.rs", "-2")];
        let b = vec![change("b.rs", "-2"), change("a.rs", "+1")];
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn flags_change_the_hash() {
        let plain = change("a.rs", "+1");
        let created = DiffChange { new_file: true, ..plain.clone() };
        assert_ne!(content_hash(&[plain]), content_hash(&[created]));
    }

    #[test]
    fn missing_and_empty_path_are_equivalent() {
        let missing =
            DiffChange { new_path: Some("a.rs".into()), diff: "+1".into(), ..Default::default() };
        let empty = DiffChange { old_path: Some(String::new()), ..missing.clone() };
        assert_eq!(content_hash(&[missing]), content_hash(&[empty]));
    }

    #[test]
    fn terminator_inside_diff_cannot_forge_a_split() {
        // Naive concatenation would encode both inputs to identical bytes.
        let forged_body = "+x\n---\nold_path:b.rs\nnew_path:b.rs\nflags:---\ndiff:\n+y";
        let one = vec![change("a.rs", forged_body)];
        let two = vec![change("a.rs", "+x"), change("b.rs", "+y")];
        assert_ne!(content_hash(&one), content_hash(&two));
    }

    #[test]
    fn moving_bytes_between_fields_changes_the_hash() {
        let a = DiffChange {
            old_path: Some("ab".into()),
            new_path: Some("c".into()),
            ..Default::default()
        };
        let b = DiffChange {
            old_path: Some("a".into()),
            new_path: Some("bc".into()),
            ..Default::default()
        };
        assert_ne!(content_hash(&[a]), content_hash(&[b]));
    }
}
