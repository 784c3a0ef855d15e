//! Terminal colors and reply formatting.

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const GRAY: &str = "\x1b[38;5;245m";
pub const CYAN: &str = "\x1b[38;5;87m";
pub const LIME: &str = "\x1b[38;5;154m";
pub const GOLD: &str = "\x1b[38;5;220m";
pub const PINK: &str = "\x1b[38;5;213m";
pub const RED: &str = "\x1b[38;5;203m";
const REPLY: &str = "\x1b[38;2;200;220;255m";

/// Color a model reply: fence markers dimmed, fenced lines and headings
/// highlighted, everything else in the reply color.
pub fn format_reply(text: &str) -> String {
    let mut in_code = false;
    text.lines()
        .map(|line| {
            if line.starts_with("```") {
                in_code = !in_code;
                format!("{GRAY}{line}{RESET}")
            } else if in_code {
                format!("{CYAN}{line}{RESET}")
            } else if line.starts_with('#') {
                format!("{LIME}{BOLD}{line}{RESET}")
            } else {
                format!("{REPLY}{line}{RESET}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// First `max` characters of `text`, with an ellipsis when cut.
pub fn truncate(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_fence_lines_are_cyan() {
        let out = format_reply("intro\n```\nlet x = 1;\n```\n# Title");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with(REPLY));
        assert!(lines[1].starts_with(GRAY));
        assert!(lines[2].starts_with(CYAN));
        assert!(lines[3].starts_with(GRAY));
        assert!(lines[4].starts_with(LIME));
    }

    #[test]
    fn test_heading_inside_code_is_not_a_heading() {
        let out = format_reply("```\n# comment\n```");
        assert!(out.lines().nth(1).unwrap().starts_with(CYAN));
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("héllo", 3), "hél…");
        assert_eq!(truncate("hi", 3), "hi");
    }
}
