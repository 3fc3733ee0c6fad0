/// Splits command arguments the way a shell would.
///
/// - ASCII whitespace and the ideographic space (`U+3000`) separate words
/// - single and double quotes group words, and may be mixed
/// - inside double quotes a backslash escapes the next character
pub fn shell_split(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape_next = false;

    for ch in input.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_double_quote => escape_next = true,
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                quoted = true;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                quoted = true;
            }
            c if is_separator(c) && !in_single_quote && !in_double_quote => {
                if !current.is_empty() || quoted {
                    args.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() || quoted {
        args.push(current);
    }

    args
}

fn is_separator(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\u{3000}'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_split_simple() {
        assert_eq!(shell_split("add 1 2"), vec!["add", "1", "2"]);
    }

    #[test]
    fn test_shell_split_quoted() {
        assert_eq!(
            shell_split(r#"bind "my wife" now"#),
            vec!["bind", "my wife", "now"]
        );
        assert_eq!(shell_split(r#""a \"b\"""#), vec![r#"a "b""#]);
    }

    #[test]
    fn test_shell_split_mixed_quotes() {
        assert_eq!(shell_split(r#"'say "hi"' x"#), vec![r#"say "hi""#, "x"]);
    }

    #[test]
    fn test_shell_split_empty_quotes_kept() {
        assert_eq!(shell_split(r#"set "" 1"#), vec!["set", "", "1"]);
    }

    #[test]
    fn test_shell_split_ideographic_space() {
        assert_eq!(shell_split("老公\u{3000}老婆"), vec!["老公", "老婆"]);
    }

    #[test]
    fn test_shell_split_whitespace_only() {
        assert!(shell_split("").is_empty());
        assert!(shell_split("  \t ").is_empty());
    }
}
