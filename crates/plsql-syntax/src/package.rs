use crate::tokens::{Token, TokenKind, mask_literals, tokenize};
use tracing::debug;

/// Kind of a scanned subprogram declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubprogramKind {
    Procedure,
    Function,
}

/// Parameter mode; defaults to IN when the declaration omits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: String,
    pub mode: ParamMode,
    pub data_type: String,
    pub default: Option<String>,
}

/// One PROCEDURE/FUNCTION found at the top level of a package spec or body.
#[derive(Debug, Clone)]
pub struct MemberDecl {
    pub kind: SubprogramKind,
    pub name: String,
    pub parameters: Vec<ParamDecl>,
    pub return_type: Option<String>,
    /// Full source of the member (header through terminating `;`), present
    /// only for body members with an implementation.
    pub body: Option<String>,
    /// Byte span of the whole member in the original text.
    pub span: (usize, usize),
}

/// Package-level item that cannot be decomposed into a standalone unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageItemKind {
    Variable,
    Type,
    Cursor,
    InitBlock,
    Pragma,
}

#[derive(Debug, Clone)]
pub struct PackageItem {
    pub kind: PackageItemKind,
    pub snippet: String,
}

/// Everything found by scanning one package spec or body.
#[derive(Debug, Clone, Default)]
pub struct PackageScan {
    pub package_name: Option<String>,
    pub members: Vec<MemberDecl>,
    pub items: Vec<PackageItem>,
    /// Declarations that could not be parsed; scanning continues past them.
    pub failures: Vec<String>,
}

/// Scans a package specification: member declarations end at `;` and carry
/// no bodies; package-level variables, types, cursors and pragmas become
/// items for the manual-intervention report.
pub fn scan_package_spec(text: &str) -> PackageScan {
    scan(text, false)
}

/// Scans a package body: members carry full implementations; an
/// initialization block at the end of the body becomes an item.
pub fn scan_package_body(text: &str) -> PackageScan {
    scan(text, true)
}

struct Scanner<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Token> {
        let idx = self.pos;
        if idx < self.tokens.len() {
            self.pos += 1;
            self.tokens.get(idx)
        } else {
            None
        }
    }

    fn peek_is_word(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.is_word(word))
    }

    fn peek_is_symbol(&self, symbol: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == TokenKind::Symbol && t.text == symbol)
    }

    /// Advances past a balanced `( ... )` group, returning the span of the
    /// inner text. Assumes the current token is `(`.
    fn consume_paren_group(&mut self) -> Option<(usize, usize)> {
        let open = self.bump()?.end;
        let mut depth = 1usize;
        while let Some(token) = self.bump() {
            if token.kind == TokenKind::Symbol {
                match token.text.as_str() {
                    "(" => depth += 1,
                    ")" => {
                        depth -= 1;
                        if depth == 0 {
                            return Some((open, token.start));
                        }
                    }
                    _ => {}
                }
            }
        }
        None
    }

    /// Skips forward to just past the next `;` at paren depth 0.
    fn skip_to_semicolon(&mut self) -> usize {
        let mut depth = 0usize;
        while let Some(token) = self.bump() {
            if token.kind == TokenKind::Symbol {
                match token.text.as_str() {
                    "(" => depth += 1,
                    ")" => depth = depth.saturating_sub(1),
                    ";" if depth == 0 => return token.end,
                    _ => {}
                }
            }
        }
        self.text.len()
    }
}

fn scan(text: &str, is_body: bool) -> PackageScan {
    let masked = mask_literals(text);
    let tokens = tokenize(&masked);
    let mut scanner = Scanner {
        text,
        tokens,
        pos: 0,
    };
    let mut result = PackageScan::default();

    skip_package_header(&mut scanner, &mut result);

    while let Some(token) = scanner.peek().cloned() {
        if token.is_word("PROCEDURE") || token.is_word("FUNCTION") {
            let kind = if token.is_word("PROCEDURE") {
                SubprogramKind::Procedure
            } else {
                SubprogramKind::Function
            };
            match scan_member(&mut scanner, kind, is_body) {
                Ok(Some(member)) => result.members.push(member),
                Ok(None) => {}
                Err(reason) => {
                    debug!(reason = %reason, "skipping unparseable member");
                    result.failures.push(reason);
                    scanner.skip_to_semicolon();
                }
            }
        } else if token.is_word("BEGIN") && is_body {
            // Initialization block: runs to the package's closing END.
            let start = token.start;
            scanner.bump();
            let end = skip_block(&mut scanner, 1);
            result.items.push(PackageItem {
                kind: PackageItemKind::InitBlock,
                snippet: text[start..end].trim().to_string(),
            });
        } else if token.is_word("END") {
            // Closing of the package itself.
            break;
        } else {
            scan_declaration_item(&mut scanner, &mut result);
        }
    }

    result
}

/// Consumes `CREATE [OR REPLACE] PACKAGE [BODY] <name> IS|AS`, recording the
/// package name. Tolerates input that starts directly at `PACKAGE`.
fn skip_package_header(scanner: &mut Scanner<'_>, result: &mut PackageScan) {
    while let Some(token) = scanner.peek().cloned() {
        if token.is_word("PACKAGE") {
            scanner.bump();
            if scanner.peek_is_word("BODY") {
                scanner.bump();
            }
            let mut name = None;
            if let Some(token) = scanner.peek()
                && token.kind == TokenKind::Word
            {
                name = Some(scanner.text[token.start..token.end].to_string());
                scanner.bump();
                // Schema-qualified package name.
                if scanner.peek_is_symbol(".") {
                    scanner.bump();
                    if let Some(part) = scanner.peek()
                        && part.kind == TokenKind::Word
                    {
                        name = Some(scanner.text[part.start..part.end].to_string());
                        scanner.bump();
                    }
                }
            }
            result.package_name = name;
            if scanner.peek_is_word("IS") || scanner.peek_is_word("AS") {
                scanner.bump();
            }
            return;
        }
        if token.is_word("PROCEDURE") || token.is_word("FUNCTION") {
            // Bare member list without a package header.
            return;
        }
        scanner.bump();
    }
}

fn scan_member(
    scanner: &mut Scanner<'_>,
    kind: SubprogramKind,
    is_body: bool,
) -> Result<Option<MemberDecl>, String> {
    let start = scanner.peek().map(|t| t.start).unwrap_or(0);
    scanner.bump(); // PROCEDURE | FUNCTION

    // Member names keep their source casing; the uppercased token text is
    // only the lookup key.
    let name = match scanner.peek() {
        Some(token) if token.kind == TokenKind::Word => {
            scanner.text[token.start..token.end].to_string()
        }
        other => {
            return Err(format!(
                "expected member name, found {:?}",
                other.map(|t| t.text.clone())
            ));
        }
    };
    scanner.bump();

    let parameters = if scanner.peek_is_symbol("(") {
        let (open, close) = scanner
            .consume_paren_group()
            .ok_or_else(|| format!("unbalanced parameter list for {name}"))?;
        parse_parameters(&scanner.text[open..close])?
    } else {
        Vec::new()
    };

    let mut return_type = None;
    if kind == SubprogramKind::Function && scanner.peek_is_word("RETURN") {
        scanner.bump();
        return_type = Some(collect_return_type(scanner));
    }

    // Spec declarations (and body forward declarations) stop at `;`.
    if !is_body || next_terminator_is_semicolon(scanner) {
        let end = scanner.skip_to_semicolon();
        return Ok(Some(MemberDecl {
            kind,
            name,
            parameters,
            return_type,
            body: None,
            span: (start, end),
        }));
    }

    // Body member: IS|AS <declarations> BEGIN ... END [name];
    if scanner.peek_is_word("IS") || scanner.peek_is_word("AS") {
        scanner.bump();
    }
    let end = scan_member_body(scanner)?;
    Ok(Some(MemberDecl {
        kind,
        name,
        parameters,
        return_type,
        body: Some(scanner.text[start..end].trim_end().to_string()),
        span: (start, end),
    }))
}

/// After the header, a spec declaration reaches `;` before any IS/AS; a body
/// implementation reaches IS/AS first. Pragma-ish modifiers in between are
/// skipped without consuming the scanner position permanently.
fn next_terminator_is_semicolon(scanner: &Scanner<'_>) -> bool {
    for token in &scanner.tokens[scanner.pos..] {
        if token.kind == TokenKind::Symbol && token.text == ";" {
            return true;
        }
        if token.is_word("IS") || token.is_word("AS") {
            return false;
        }
    }
    true
}

/// Scans a member implementation: declaration section, main BEGIN, nested
/// blocks, through the matching END and its `;`. Returns the end offset.
fn scan_member_body(scanner: &mut Scanner<'_>) -> Result<usize, String> {
    // Declaration section: runs until the subprogram's own BEGIN.
    while let Some(token) = scanner.peek().cloned() {
        if token.is_word("BEGIN") {
            scanner.bump();
            let end = skip_block(scanner, 1);
            return Ok(end);
        }
        if token.kind == TokenKind::Symbol && token.text == "(" {
            scanner.consume_paren_group();
            continue;
        }
        scanner.bump();
    }
    Err("member body has no BEGIN".to_string())
}

/// Consumes tokens until the block depth returns to zero. `BEGIN`, `LOOP`,
/// `CASE` and `IF` open blocks; `END` closes one (optionally followed by
/// IF/LOOP/CASE or a label name, then `;`). ELSIF does not open a block.
/// Returns the offset just past the closing `;` (or the closing END when no
/// semicolon follows).
fn skip_block(scanner: &mut Scanner<'_>, initial_depth: usize) -> usize {
    let mut depth = initial_depth;
    let mut last_end = scanner.text.len();

    while let Some(token) = scanner.bump().cloned() {
        if token.kind != TokenKind::Word {
            continue;
        }
        match token.text.as_str() {
            "BEGIN" | "LOOP" | "CASE" => depth += 1,
            "IF" => depth += 1,
            "END" => {
                // `END IF` / `END LOOP` / `END CASE` / `END <label>` all
                // close exactly one level.
                if let Some(next) = scanner.peek().cloned()
                    && next.kind == TokenKind::Word
                {
                    scanner.bump();
                }
                depth = depth.saturating_sub(1);
                let mut end = scanner
                    .tokens
                    .get(scanner.pos.saturating_sub(1))
                    .map(|t| t.end)
                    .unwrap_or(scanner.text.len());
                if scanner.peek_is_symbol(";") {
                    end = scanner.bump().map(|t| t.end).unwrap_or(end);
                }
                if depth == 0 {
                    return end;
                }
                last_end = end;
            }
            _ => {}
        }
    }
    last_end
}

fn collect_return_type(scanner: &mut Scanner<'_>) -> String {
    let mut parts: Vec<String> = Vec::new();
    while let Some(token) = scanner.peek().cloned() {
        if token.is_word("IS")
            || token.is_word("AS")
            || token.is_word("DETERMINISTIC")
            || token.is_word("PIPELINED")
            || token.is_word("RESULT_CACHE")
            || (token.kind == TokenKind::Symbol && token.text == ";")
        {
            break;
        }
        if token.kind == TokenKind::Symbol && token.text == "(" {
            if let Some((open, close)) = scanner.consume_paren_group() {
                let last = parts.pop().unwrap_or_default();
                parts.push(format!("{last}({})", scanner.text[open..close].trim()));
            }
            continue;
        }
        match token.kind {
            TokenKind::Word => parts.push(token.text.clone()),
            TokenKind::Symbol if token.text == "." => {
                let last = parts.pop().unwrap_or_default();
                parts.push(format!("{last}."));
            }
            _ => {}
        }
        scanner.bump();
    }
    join_type_parts(parts)
}

fn join_type_parts(parts: Vec<String>) -> String {
    let mut out = String::new();
    for part in parts {
        if !out.is_empty() && !out.ends_with('.') && !part.starts_with('.') {
            out.push(' ');
        }
        out.push_str(&part);
    }
    out
}

/// Anything at package level that is not a subprogram: variable, constant,
/// TYPE/SUBTYPE, CURSOR, PRAGMA. The whole declaration through `;` becomes
/// one item snippet.
fn scan_declaration_item(scanner: &mut Scanner<'_>, result: &mut PackageScan) {
    let Some(first) = scanner.peek().cloned() else {
        return;
    };
    let kind = if first.is_word("TYPE") || first.is_word("SUBTYPE") {
        PackageItemKind::Type
    } else if first.is_word("CURSOR") {
        PackageItemKind::Cursor
    } else if first.is_word("PRAGMA") {
        PackageItemKind::Pragma
    } else {
        PackageItemKind::Variable
    };
    let start = first.start;
    let end = scanner.skip_to_semicolon();
    let snippet = scanner.text[start..end].trim().to_string();
    if snippet.is_empty() || snippet == ";" || snippet == "/" {
        return;
    }
    result.items.push(PackageItem { kind, snippet });
}

fn parse_parameters(raw: &str) -> Result<Vec<ParamDecl>, String> {
    let mut params = Vec::new();
    for part in split_top_level(raw, ',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        params.push(parse_parameter(part)?);
    }
    Ok(params)
}

/// Splits on `separator` at paren depth 0 only, so `NUMBER(10,2)` survives.
fn split_top_level(raw: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for ch in raw.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            c if c == separator && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

fn parse_parameter(raw: &str) -> Result<ParamDecl, String> {
    // <name> [IN | OUT | IN OUT] [NOCOPY] <type> [DEFAULT expr | := expr]
    let (head, default) = match find_default(raw) {
        Some((head, default)) => (head, Some(default)),
        None => (raw.to_string(), None),
    };

    let mut words = head.split_whitespace();
    let name = words
        .next()
        .ok_or_else(|| format!("empty parameter declaration: {raw:?}"))?
        .to_uppercase();

    let rest: Vec<&str> = words.collect();
    let mut idx = 0;
    let mode = match rest.first().map(|w| w.to_uppercase()) {
        Some(word) if word == "IN" => {
            idx += 1;
            if rest.get(1).map(|w| w.to_uppercase()).as_deref() == Some("OUT") {
                idx += 1;
                ParamMode::InOut
            } else {
                ParamMode::In
            }
        }
        Some(word) if word == "OUT" => {
            idx += 1;
            ParamMode::Out
        }
        _ => ParamMode::In,
    };
    if rest.get(idx).map(|w| w.to_uppercase()).as_deref() == Some("NOCOPY") {
        idx += 1;
    }

    let data_type = rest[idx..].join(" ");
    if data_type.is_empty() {
        return Err(format!("parameter {name} has no data type"));
    }

    Ok(ParamDecl {
        name,
        mode,
        data_type,
        default,
    })
}

/// Finds `DEFAULT expr` or `:= expr` at paren depth 0 and splits it off.
fn find_default(raw: &str) -> Option<(String, String)> {
    let masked = mask_literals(raw);
    let bytes = masked.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b'=') => {
                return Some((
                    raw[..i].trim().to_string(),
                    raw[i + 2..].trim().to_string(),
                ));
            }
            b'D' | b'd' if depth == 0 => {
                let rest = &masked[i..];
                if rest.len() >= 7
                    && rest[..7].eq_ignore_ascii_case("DEFAULT")
                    && rest[7..].starts_with(char::is_whitespace)
                    && (i == 0 || bytes[i - 1].is_ascii_whitespace())
                {
                    return Some((
                        raw[..i].trim().to_string(),
                        raw[i + 7..].trim().to_string(),
                    ));
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}
