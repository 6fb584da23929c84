/// Lexical groundwork shared by the scanners: PL/SQL comment and string
/// masking plus a word/symbol tokenizer that reports byte offsets into the
/// original text.

/// Replaces the contents of comments (`--`, `/* */`) and string literals
/// (`'...'`, with doubled-quote escapes) with spaces, preserving length so
/// byte offsets in the mask line up with the original text. Newlines inside
/// comments survive so line-based rules still hold.
pub fn mask_literals(text: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        SingleQuote,
        DoubleQuote,
    }

    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut state = State::Code;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            State::Code => match (b, next) {
                (b'-', Some(b'-')) => {
                    state = State::LineComment;
                    out.extend_from_slice(b"  ");
                    i += 2;
                }
                (b'/', Some(b'*')) => {
                    state = State::BlockComment;
                    out.extend_from_slice(b"  ");
                    i += 2;
                }
                (b'\'', _) => {
                    state = State::SingleQuote;
                    out.push(b'\'');
                    i += 1;
                }
                (b'"', _) => {
                    state = State::DoubleQuote;
                    out.push(b'"');
                    i += 1;
                }
                _ => {
                    out.push(b);
                    i += 1;
                }
            },
            State::LineComment => {
                if b == b'\n' {
                    state = State::Code;
                    out.push(b'\n');
                } else {
                    out.push(b' ');
                }
                i += 1;
            }
            State::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    state = State::Code;
                    out.extend_from_slice(b"  ");
                    i += 2;
                } else {
                    out.push(if b == b'\n' { b'\n' } else { b' ' });
                    i += 1;
                }
            }
            State::SingleQuote => {
                if b == b'\'' && next == Some(b'\'') {
                    out.extend_from_slice(b"  ");
                    i += 2;
                } else if b == b'\'' {
                    state = State::Code;
                    out.push(b'\'');
                    i += 1;
                } else {
                    out.push(if b == b'\n' { b'\n' } else { b' ' });
                    i += 1;
                }
            }
            State::DoubleQuote => {
                // Quoted identifiers keep their text; they are names, not data.
                out.push(b);
                if b == b'"' {
                    state = State::Code;
                }
                i += 1;
            }
        }
    }

    // The masking above is byte-preserving for ASCII control characters;
    // any multi-byte character inside a literal was replaced per byte.
    String::from_utf8_lossy(&out).into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Symbol,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// Uppercased for words, verbatim for symbols.
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text == word
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b == b'#' || b == b':'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b == b'#'
}

/// Tokenizes pre-masked text into uppercase word tokens and single-symbol
/// tokens (`:=` is one token). Bind references like `:NEW` come out as one
/// word token including the colon.
pub fn tokenize(masked: &str) -> Vec<Token> {
    let bytes = masked.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if b == b':' && bytes.get(i + 1) == Some(&b'=') {
            tokens.push(Token {
                kind: TokenKind::Symbol,
                text: ":=".into(),
                start: i,
                end: i + 2,
            });
            i += 2;
            continue;
        }
        if is_ident_start(b) && (b != b':' || bytes.get(i + 1).is_some_and(|n| is_ident_continue(*n)))
        {
            let start = i;
            i += 1;
            while i < bytes.len() && is_ident_continue(bytes[i]) {
                i += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Word,
                text: masked[start..i].to_uppercase(),
                start,
                end: i,
            });
            continue;
        }
        tokens.push(Token {
            kind: TokenKind::Symbol,
            text: (b as char).to_string(),
            start: i,
            end: i + 1,
        });
        i += 1;
    }

    tokens
}

/// Counts word-boundary occurrences of `word` outside comments and strings.
/// "BEFORE" therefore never counts as a "FOR".
pub fn count_word(text: &str, word: &str) -> usize {
    let needle = word.to_uppercase();
    tokenize(&mask_literals(text))
        .iter()
        .filter(|t| t.is_word(&needle))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_line_comments_and_strings() {
        let masked = mask_literals("SELECT 'FOR' FROM t -- FOR loop\nWHERE x = 1");
        assert!(!masked.contains("FOR"));
        assert!(masked.contains("WHERE"));
        assert_eq!(masked.len(), "SELECT 'FOR' FROM t -- FOR loop\nWHERE x = 1".len());
    }

    #[test]
    fn masks_block_comments_preserving_newlines() {
        let src = "a /* FOR\nFOR */ b";
        let masked = mask_literals(src);
        assert!(!masked.contains("FOR"));
        assert_eq!(masked.matches('\n').count(), 1);
    }

    #[test]
    fn doubled_quotes_stay_inside_string() {
        let masked = mask_literals("v := 'it''s a FOR'; w := 2;");
        assert!(!masked.contains("FOR"));
        assert!(masked.contains("w := 2"));
    }

    #[test]
    fn word_boundary_counting() {
        let body = "BEFORE INSERT ON emp FOR EACH ROW";
        assert_eq!(count_word(body, "FOR"), 1);
        assert_eq!(count_word(body, "BEFORE"), 1);
    }

    #[test]
    fn bind_reference_is_one_token() {
        let tokens = tokenize(":NEW.emp_id := emp_seq.NEXTVAL;");
        assert!(tokens[0].is_word(":NEW"));
        assert!(tokens.iter().any(|t| t.text == ":="));
    }
}
