//! `@path` attachments.
//!
//! A token like `@src/main.rs` in user input inlines that file in a fenced
//! block after the message; `@src` inlines a directory listing. The agent
//! only ever sees the expanded text. References that do not resolve are left
//! as typed.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

/// Files larger than this are not inlined.
const MAX_ATTACHMENT_BYTES: u64 = 100_000;

/// Expand every resolvable `@path` reference in `input`, relative to `root`.
pub async fn expand(input: &str, root: &Path) -> String {
    let mut seen = HashSet::new();
    let mut blocks = Vec::new();

    for reference in references(input) {
        if !seen.insert(reference) {
            continue;
        }
        if let Some(block) = render(reference, root).await {
            blocks.push(block);
        }
    }

    if blocks.is_empty() {
        return input.to_string();
    }
    format!("{input}\n\n{}", blocks.join("\n\n"))
}

/// The path part of each `@token`, without trailing punctuation.
fn references(input: &str) -> impl Iterator<Item = &str> {
    input
        .split_whitespace()
        .filter_map(|token| token.strip_prefix('@'))
        .map(|path| path.trim_end_matches([',', '.', ';', ':', '!', '?', ')', '"', '\'']))
        .filter(|path| !path.is_empty())
}

async fn render(reference: &str, root: &Path) -> Option<String> {
    let path = root.join(reference);
    let meta = match tokio::fs::metadata(&path).await {
        Ok(meta) => meta,
        Err(e) => {
            debug!(reference, error = %e, "Attachment not resolved");
            return None;
        }
    };

    if meta.is_dir() {
        let mut entries = tokio::fs::read_dir(&path).await.ok()?;
        let mut names = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();
        return Some(format!(
            "Contents of directory {reference}:\n{}",
            names.join("\n")
        ));
    }

    if meta.len() > MAX_ATTACHMENT_BYTES {
        debug!(reference, bytes = meta.len(), "Attachment too large, skipping");
        return None;
    }

    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Some(format!("Contents of file {reference}:\n```\n{content}\n```")),
        Err(e) => {
            debug!(reference, error = %e, "Attachment not readable as text");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_references_and_trims_punctuation() {
        let refs: Vec<&str> = references("look at @src/main.rs, and @notes.txt. not@this @").collect();
        assert_eq!(refs, vec!["src/main.rs", "notes.txt"]);
    }

    #[tokio::test]
    async fn inlines_file_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "remember the milk").unwrap();

        let out = expand("summarize @notes.txt", dir.path()).await;
        assert!(out.starts_with("summarize @notes.txt\n\n"));
        assert!(out.contains("Contents of file notes.txt:\n```\nremember the milk\n```"));
    }

    #[tokio::test]
    async fn inlines_directory_listing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src").join("lib.rs"), "").unwrap();
        std::fs::create_dir(dir.path().join("src").join("bin")).unwrap();

        let out = expand("what is in @src", dir.path()).await;
        assert!(out.contains("Contents of directory src:\nbin/\nlib.rs"));
    }

    #[tokio::test]
    async fn unresolved_references_are_left_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let input = "email me @someone about @missing.txt";
        assert_eq!(expand(input, dir.path()).await, input);
    }

    #[tokio::test]
    async fn repeated_reference_is_inlined_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "AAA").unwrap();

        let out = expand("@a.txt vs @a.txt", dir.path()).await;
        assert_eq!(out.matches("AAA").count(), 1);
    }
}
