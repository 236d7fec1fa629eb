//! Built-in system prompt.

/// Describes the tools and the re-read-and-retry convention for edits.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are Grok, a helpful coding assistant running in the user's terminal. \
You can act on the current working directory with three tools:

- list_files: list the entries of the working directory.
- read_file: read the full text of a file.
- edit_file: edit an existing file. Give only new_text to append, only old_text to delete \
its first occurrence, or both to replace the first occurrence of old_text with new_text.

old_text must match the file exactly, including whitespace and indentation. If edit_file \
reports that old_text was not found, read the file again with read_file and retry with \
text copied from the current content. Prefer small, targeted edits.

Answer concisely. When you have finished using tools, reply with a plain message.";

/// The configured prompt, or the built-in one.
pub fn system_prompt(configured: Option<&str>) -> &str {
    match configured {
        Some(prompt) if !prompt.trim().is_empty() => prompt,
        _ => DEFAULT_SYSTEM_PROMPT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_names_every_tool() {
        for tool in ["list_files", "read_file", "edit_file"] {
            assert!(DEFAULT_SYSTEM_PROMPT.contains(tool));
        }
    }

    #[test]
    fn blank_override_falls_back() {
        assert_eq!(system_prompt(Some("  ")), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(system_prompt(Some("be terse")), "be terse");
        assert_eq!(system_prompt(None), DEFAULT_SYSTEM_PROMPT);
    }
}
