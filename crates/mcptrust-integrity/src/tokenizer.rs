use crate::error::IntegrityError;

/// Splits `input` into argv-style tokens without ever invoking a shell.
///
/// Honors `"..."` and `'...'` quoting, `\` escapes outside single quotes (a
/// backslash inside single quotes is literal), and refuses any of
/// `; | & \`` or a bare newline/carriage return outside quotes — those are
/// the characters a real shell would treat specially, so their unescaped
/// presence here means the caller handed us something that was built
/// assuming shell interpretation (§4.6).
pub fn tokenize(input: &str) -> Result<Vec<String>, IntegrityError> {
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            if in_token {
                tokens.push(std::mem::take(&mut current));
                in_token = false;
            }
            i += 1;
            continue;
        }
        match c {
            '\'' => {
                in_token = true;
                i += 1;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(IntegrityError::UnsafeCommand(
                                "unclosed single quote".to_string(),
                            ))
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            current.push(*ch);
                            i += 1;
                        }
                    }
                }
            }
            '"' => {
                in_token = true;
                i += 1;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(IntegrityError::UnsafeCommand(
                                "unclosed double quote".to_string(),
                            ))
                        }
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some('\\') => match chars.get(i + 1) {
                            Some(escaped) => {
                                current.push(*escaped);
                                i += 2;
                            }
                            None => {
                                return Err(IntegrityError::UnsafeCommand(
                                    "trailing backslash".to_string(),
                                ))
                            }
                        },
                        Some(ch) => {
                            current.push(*ch);
                            i += 1;
                        }
                    }
                }
            }
            '\\' => {
                in_token = true;
                match chars.get(i + 1) {
                    Some(escaped) => {
                        current.push(*escaped);
                        i += 2;
                    }
                    None => {
                        return Err(IntegrityError::UnsafeCommand(
                            "trailing backslash".to_string(),
                        ))
                    }
                }
            }
            ';' | '|' | '&' | '`' | '\n' | '\r' => {
                return Err(IntegrityError::UnsafeCommand(format!(
                    "unsafe character '{c}' outside quotes"
                )));
            }
            other => {
                in_token = true;
                current.push(other);
                i += 1;
            }
        }
    }

    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}
