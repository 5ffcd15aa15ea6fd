//! Prompt text and response clean-up for command suggestions.

/// System instruction sent with every suggestion request.
pub const SYSTEM_PROMPT: &str = "You are a Linux shell assistant. \
Convert the user's natural language request into a single safe shell command. \
Output **only** the raw command, no explanation.";

/// Extract the command from a completion, dropping markdown code fences.
///
/// Handles fenced blocks with or without a language tag, single-line fences
/// (```` ```ls``` ````) and a command wrapped in one pair of inline backticks.
/// Anything else is returned trimmed.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let body = match after.split_once('\n') {
            Some((tag, rest)) if is_language_tag(tag) => rest,
            _ => after,
        };
        let block = body.find("```").map_or(body, |end| &body[..end]);
        return block.trim().to_string();
    }

    if let Some(inner) = trimmed
        .strip_prefix('`')
        .and_then(|s| s.strip_suffix('`'))
        .filter(|s| !s.contains('`'))
    {
        return inner.trim().to_string();
    }

    trimmed.to_string()
}

fn is_language_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fence_with_language_tag() {
        let raw = "```bash\nfind /var/log -size +100M\n```";
        assert_eq!(strip_code_fence(raw), "find /var/log -size +100M");
    }

    #[test]
    fn test_strip_fence_without_language_tag() {
        let raw = "```\nfind /var/log -size +100M\n```\n";
        assert_eq!(strip_code_fence(raw), "find /var/log -size +100M");
    }

    #[test]
    fn test_strip_single_line_fence() {
        assert_eq!(strip_code_fence("```ls -la```"), "ls -la");
    }

    #[test]
    fn test_strip_fence_with_surrounding_text() {
        let raw = "Here you go:\n```sh\ndf -h\n```\nThis shows disk usage.";
        assert_eq!(strip_code_fence(raw), "df -h");
    }

    #[test]
    fn test_strip_inline_backticks() {
        assert_eq!(strip_code_fence("`uptime`"), "uptime");
    }

    #[test]
    fn test_plain_command_is_trimmed() {
        assert_eq!(strip_code_fence("  du -sh *\n"), "du -sh *");
    }

    #[test]
    fn test_inner_backticks_are_kept() {
        assert_eq!(strip_code_fence("echo `date`"), "echo `date`");
    }

    #[test]
    fn test_system_prompt_demands_raw_command() {
        assert!(SYSTEM_PROMPT.contains("only"));
        assert!(SYSTEM_PROMPT.contains("no explanation"));
    }
}
