//! Line tokenizer.
//!
//! Splits configuration text into one token sequence per line. `#` and `!`
//! start a comment, double quotes group a token, and braces are always
//! standalone tokens.

/// Tokens of one source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 1-based line number.
    pub number: usize,
    pub tokens: Vec<String>,
}

/// Tokenize a whole configuration text, skipping blank and comment lines.
pub fn tokenize(text: &str) -> Vec<Line> {
    text.lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let tokens = tokenize_line(raw);
            (!tokens.is_empty()).then(|| Line { number: idx + 1, tokens })
        })
        .collect()
}

/// Tokenize a single line.
pub fn tokenize_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '#' | '!' => break,
            '"' => {
                // Quoted token runs to the closing quote (or end of line).
                for q in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                    current.push(q);
                }
                tokens.push(std::mem::take(&mut current));
            }
            '{' | '}' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(c.to_string());
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
