use reviewbot_core::{ChatMessage, DiffChange};

pub const DEFAULT_REVIEW_INSTRUCTION: &str =
    "You are a senior software engineer and code reviewer.\n\
Your goal is to keep the code correct, secure and maintainable.\n\n\
Output guidelines:\n\
1. Use GitLab Markdown (bullet points, bold text, code blocks).\n\
2. Start with a short changelog-style summary.\n\
3. Point out bugs, edge cases and security problems before style issues.\n";

const REVIEW_CHECKLIST: &str = "Review checklist:\n\
1. Summary: briefly summarize the changes.\n\
2. Code quality: naming, readability, duplicated logic.\n\
3. Bugs and logic: edge cases, broken behavior after refactoring, \
paths of renamed or deleted files.\n\
4. Security: disabled certificate checks, hardcoded credentials, swallowed errors.\n\
5. Suggestions: concrete, actionable improvements.\n";

pub const REFACTOR_INSTRUCTION: &str =
    "You are a tech lead reviewing whole files with one rule in mind: \
leave the code a little cleaner than you found it.\n\n\
Rules:\n\
- Base every suggestion only on the file contents provided.\n\
- Prefer suggestions with the best value for their cost; skip matters of taste.\n\
- Focus on incremental refactoring opportunities, not on hunting critical bugs.\n\n\
Output format:\n\
### 1. Top Refactoring Opportunities\n\
- At most 5, most important first, each starting with [file path]\n\n\
### 2. File-by-File Suggestions\n\
- 1 to 3 suggestions per file, each with one sentence on why it is worth doing now\n\n\
### 3. Quick Wins (<= 30 minutes)\n\n\
### 4. Suggested Refactoring Plan\n\
- Follow-up work for the backlog after this merge request\n";

pub const EMPTY_DIFF_PLACEHOLDER: &str = "(No content changes or binary file)";

/// One file body handed to the refactor-suggestion prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileExcerpt {
    pub path: String,
    pub content: String,
    pub truncated: bool,
}

pub fn file_header(change: &DiffChange) -> String {
    let old_path = change.old_path.as_deref().unwrap_or("");
    let new_path = change.new_path.as_deref().unwrap_or("");
    // Hosts that omit the rename flag still report differing paths.
    let renamed = change.renamed_file
        || (!old_path.is_empty() && !new_path.is_empty() && old_path != new_path);

    if change.new_file {
        format!("**NEW FILE**: `{}`", new_path)
    } else if change.deleted_file {
        format!("**DELETED**: `{}`", old_path)
    } else if renamed {
        format!("**RENAMED**: `{}` -> `{}`", old_path, new_path)
    } else {
        format!("**MODIFIED**: `{}`", new_path)
    }
}

pub fn review_messages(
    changes: &[DiffChange],
    system_instruction: Option<&str>,
) -> Vec<ChatMessage> {
    let sections: Vec<String> = changes
        .iter()
        .map(|change| {
            let diff = if change.diff.trim().is_empty() {
                EMPTY_DIFF_PLACEHOLDER
            } else {
                change.diff.as_str()
            };
            format!("{}\n```diff\n{}\n```", file_header(change), diff)
        })
        .collect();

    let system = system_instruction
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_REVIEW_INSTRUCTION);
    let user = format!(
        "Review the following git diffs:\n\n{}\n\n{}",
        sections.join("\n\n"),
        REVIEW_CHECKLIST
    );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

pub fn refactor_messages(files: &[FileExcerpt]) -> Vec<ChatMessage> {
    let sections: Vec<String> = files
        .iter()
        .map(|f| {
            let note = if f.truncated { " (truncated)" } else { "" };
            format!("## FILE: {}{}\n```\n{}\n```", f.path, note, f.content)
        })
        .collect();

    let user = format!(
        "Below are the full contents of the code files changed in this merge request.\n\
         Suggest cleanups and refactorings that leave them better than before.\n\n{}",
        sections.join("\n\n")
    );

    vec![ChatMessage::system(REFACTOR_INSTRUCTION), ChatMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use reviewbot_core::Role;

    fn change(old: &str, new: &str) -> DiffChange {
        DiffChange {
            old_path: Some(old.into()),
            new_path: Some(new.into()),
            diff: "@@ -1 +1 @@\n-a\n+b".into(),
            ..Default::default()
        }
    }

    #[test]
    fn headers_follow_flags() {
        let mut c = change("a.rs", "a.rs");
        assert_eq!(file_header(&c), "**MODIFIED**: `a.rs`");
        c.new_file = true;
        assert_eq!(file_header(&c), "**NEW FILE**: `a.rs`");
        c.new_file = false;
        c.deleted_file = true;
        assert_eq!(file_header(&c), "**DELETED**: `a.rs`");
        assert_eq!(file_header(&change("old.rs", "new.rs")), "**RENAMED**: `old.rs` -> `new.rs`");
    }

    #[test]
    fn review_prompt_has_fenced_diffs() {
        let msgs = review_messages(&[change("a.rs", "a.rs")], None);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[0].content, DEFAULT_REVIEW_INSTRUCTION);
        assert!(msgs[1].content.contains("```diff\n@@ -1 +1 @@\n-a\n+b\n```"));
        assert!(msgs[1].content.contains("Review checklist"));
    }

    #[test]
    fn empty_diff_uses_placeholder() {
        let mut c = change("img.png", "img.png");
        c.diff = "  \n".into();
        let msgs = review_messages(&[c], None);
        assert!(msgs[1].content.contains(EMPTY_DIFF_PLACEHOLDER));
    }

    #[test]
    fn system_prompt_override() {
        let msgs = review_messages(&[], Some("Be brief."));
        assert_eq!(msgs[0].content, "Be brief.");
        let msgs = review_messages(&[], Some("   "));
        assert_eq!(msgs[0].content, DEFAULT_REVIEW_INSTRUCTION);
    }

    #[test]
    fn refactor_prompt_marks_truncation() {
        let msgs = refactor_messages(&[
            FileExcerpt { path: "a.rs".into(), content: "fn a() {}".into(), truncated: false },
            FileExcerpt { path: "b.rs".into(), content: "fn b(".into(), truncated: true },
        ]);
        assert_eq!(msgs[0].content, REFACTOR_INSTRUCTION);
        assert!(msgs[1].content.contains("## FILE: a.rs\n```\nfn a() {}\n```"));
        assert!(msgs[1].content.contains("## FILE: b.rs (truncated)\n"));
    }
}
