use serde::{Deserialize, Serialize};

/// A token cut out of an identifier or label.
///
/// Offsets are char offsets into the original input, so `start..end` addresses the exact
/// surface form used for highlighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// Splits local names such as `USRegion`, `IvanPetrov` or `made_from_grape` into tokens.
///
/// Case changes open a new token, an uppercase run followed by a lowercase letter gives
/// its last capital to the next word, digit runs stay together and any other run of
/// punctuation is a token of its own. Whitespace only separates.
pub struct LocalNameTokenizer {
    chars: Vec<char>,
    pos: usize,
}

impl LocalNameTokenizer {
    #[must_use]
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    /// Restart the scan from the beginning of the same input.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    fn emit(&mut self, start: usize, end: usize) -> Token {
        self.pos = end;
        Token {
            text: self.chars[start..end].iter().collect(),
            start,
            end,
        }
    }

    fn run_while(&self, from: usize, pred: impl Fn(char) -> bool) -> usize {
        let mut end = from;
        while end < self.chars.len() && pred(self.chars[end]) {
            end += 1;
        }
        end
    }
}

impl Iterator for LocalNameTokenizer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let len = self.chars.len();
        while self.pos < len && is_separator(self.chars[self.pos]) {
            self.pos += 1;
        }
        if self.pos >= len {
            return None;
        }

        let start = self.pos;
        if start + 1 == len {
            return Some(self.emit(start, len));
        }

        let first = self.chars[start];
        let second = self.chars[start + 1];
        let end = if first.is_lowercase() {
            self.run_while(start + 1, lower_or_name_char)
        } else if first.is_uppercase() {
            if second.is_uppercase() {
                let mut end = self.run_while(start + 1, upper_or_name_char);
                // "AAa" splits as "A" + "Aa"
                if end < len && self.chars[end].is_lowercase() {
                    end -= 1;
                }
                end
            } else if second.is_lowercase() {
                self.run_while(start + 1, lower_or_name_char)
            } else {
                start + 1
            }
        } else if is_decimal_digit(first) {
            self.run_while(start + 1, is_decimal_digit)
        } else {
            self.run_while(start + 1, |c| {
                !(c.is_alphabetic() || is_decimal_digit(c) || is_name_char(c))
            })
        };

        if end == start {
            self.pos = len;
            return None;
        }
        Some(self.emit(start, end))
    }
}

/// Tokenize `input` eagerly.
#[must_use]
pub fn tokenize(input: &str) -> Vec<Token> {
    LocalNameTokenizer::new(input).collect()
}

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// First code point of each BMP block of ten decimal digits (general category Nd).
const DECIMAL_DIGIT_ZEROS: [u32; 37] = [
    0x0030, 0x0660, 0x06F0, 0x07C0, 0x0966, 0x09E6, 0x0A66, 0x0AE6, 0x0B66, 0x0BE6, 0x0C66,
    0x0CE6, 0x0D66, 0x0DE6, 0x0E50, 0x0ED0, 0x0F20, 0x1040, 0x1090, 0x17E0, 0x1810, 0x1946,
    0x19D0, 0x1A80, 0x1A90, 0x1B50, 0x1BB0, 0x1C40, 0x1C50, 0xA620, 0xA8D0, 0xA900, 0xA9D0,
    0xA9F0, 0xAA50, 0xABF0, 0xFF10,
];

/// Decimal digits only; `½` or `Ⅻ` are numeric but do not start a digit run.
fn is_decimal_digit(c: char) -> bool {
    let c = u32::from(c);
    DECIMAL_DIGIT_ZEROS
        .iter()
        .any(|&zero| (zero..zero + 10).contains(&c))
}

fn is_name_char(c: char) -> bool {
    c == '\'' || c == '`'
}

fn lower_or_name_char(c: char) -> bool {
    c.is_lowercase() || is_name_char(c)
}

fn upper_or_name_char(c: char) -> bool {
    c.is_uppercase() || is_name_char(c)
}
