//! Text clean-up for the log view.
//!
//! Remote output is shown as plain text; escape sequences are dropped rather
//! than interpreted. The audit log always keeps the raw decoded text.

/// Longest unterminated escape sequence held back between chunks.
const MAX_CARRY_BYTES: usize = 4096;

/// Strip ANSI escape codes from text.
/// Removes CSI sequences (colors, cursor movement) and OSC sequences.
pub fn strip_ansi_codes(text: &str) -> String {
    strip_escapes(text).0
}

/// Strips escape sequences and reports where an unterminated one starts.
fn strip_escapes(text: &str) -> (String, Option<usize>) {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();

    while let Some((start, ch)) = chars.next() {
        if ch != '\x1b' {
            result.push(ch);
            continue;
        }
        let terminated = match chars.next() {
            // CSI ends at the first byte in 0x40..=0x7e
            Some((_, '[')) => chars.by_ref().any(|(_, c)| ('@'..='~').contains(&c)),
            // OSC ends at BEL or ST (ESC \)
            Some((_, ']')) => {
                let mut done = false;
                while let Some((_, next_ch)) = chars.next() {
                    if next_ch == '\x07' {
                        done = true;
                        break;
                    }
                    if next_ch == '\x1b' {
                        match chars.peek() {
                            Some((_, '\\')) => {
                                chars.next();
                                done = true;
                                break;
                            }
                            None => break,
                            Some(_) => {}
                        }
                    }
                }
                done
            }
            // Two-byte escape such as ESC = or ESC >
            Some(_) => true,
            None => false,
        };
        if !terminated {
            return (result, Some(start));
        }
    }

    (result, None)
}

/// Drop carriage returns and other control characters, expand tabs.
fn sanitize(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\n' => Some("\n".to_string()),
            '\t' => Some("    ".to_string()),
            c if c.is_control() => None,
            c => Some(c.to_string()),
        })
        .collect()
}

/// Make decoded output safe to draw: no escape sequences, no carriage
/// returns, no other control characters, tabs expanded.
pub fn display_text(text: &str) -> String {
    sanitize(&strip_ansi_codes(text))
}

/// [`display_text`] over a stream of chunks.
///
/// An escape sequence cut off at the end of a chunk is held back and
/// completed by the next one, so it is never shown half-stripped.
#[derive(Debug, Default)]
pub struct DisplayFilter {
    carry: String,
}

impl DisplayFilter {
    pub fn push(&mut self, chunk: &str) -> String {
        let mut input = std::mem::take(&mut self.carry);
        input.push_str(chunk);
        let (stripped, cut) = strip_escapes(&input);
        if let Some(cut) = cut {
            if input.len() - cut <= MAX_CARRY_BYTES {
                self.carry = input[cut..].to_string();
            }
        }
        sanitize(&stripped)
    }

    /// Whether part of an escape sequence is waiting for the next chunk.
    pub fn has_carry(&self) -> bool {
        !self.carry.is_empty()
    }
}

/// Keep at most `max_bytes` from the end of `text`, on a char boundary.
pub fn truncate_front(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }
    let mut cut = text.len() - max_bytes;
    while !text.is_char_boundary(cut) {
        cut += 1;
    }
    text.drain(..cut);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi_codes() {
        assert_eq!(strip_ansi_codes("\x1b[31mRed\x1b[0m plain"), "Red plain");
        assert_eq!(strip_ansi_codes("a\x1b[2J\x1b[Hb"), "ab");
        assert_eq!(strip_ansi_codes("x\x1b[?2004hy"), "xy");
        assert_eq!(strip_ansi_codes("Before\x1b]0;title\x07After"), "BeforeAfter");
        assert_eq!(strip_ansi_codes("Before\x1b]7;file://h/p\x1b\\After"), "BeforeAfter");
        assert_eq!(strip_ansi_codes("Plain text"), "Plain text");
    }

    #[test]
    fn test_display_text_drops_controls() {
        assert_eq!(display_text("root@box:~# ls\r\n"), "root@box:~# ls\n");
        assert_eq!(display_text("a\tb"), "a    b");
        assert_eq!(display_text("bell\x07!"), "bell!");
        assert_eq!(display_text("\x1b[01;34mdir\x1b[0m\r\n"), "dir\n");
    }

    #[test]
    fn test_unterminated_escape_is_dropped() {
        assert_eq!(strip_ansi_codes("ok\x1b[3"), "ok");
        assert_eq!(strip_ansi_codes("ok\x1b"), "ok");
        assert_eq!(strip_ansi_codes("ok\x1b]0;tit"), "ok");
    }

    #[test]
    fn test_filter_joins_split_csi() {
        let mut filter = DisplayFilter::default();
        assert_eq!(filter.push("ab\x1b[3"), "ab");
        assert!(filter.has_carry());
        assert_eq!(filter.push("1mfoo"), "foo");
        assert!(!filter.has_carry());
    }

    #[test]
    fn test_filter_joins_split_osc_terminator() {
        let mut filter = DisplayFilter::default();
        assert_eq!(filter.push("a\x1b]0;title\x1b"), "a");
        assert_eq!(filter.push("\\b"), "b");
        assert_eq!(filter.push("\x1b"), "");
        assert_eq!(filter.push("[0mc\r\n"), "c\n");
    }

    #[test]
    fn test_filter_gives_up_on_runaway_sequence() {
        let mut filter = DisplayFilter::default();
        let runaway = format!("\x1b]{}", "x".repeat(MAX_CARRY_BYTES + 10));
        assert_eq!(filter.push(&runaway), "");
        assert!(!filter.has_carry());
        assert_eq!(filter.push("next"), "next");
    }

    #[test]
    fn test_truncate_front_respects_char_boundaries() {
        let mut text = "ab€cd".to_string();
        truncate_front(&mut text, 3);
        assert_eq!(text, "cd");

        let mut short = "abc".to_string();
        truncate_front(&mut short, 10);
        assert_eq!(short, "abc");
    }
}
