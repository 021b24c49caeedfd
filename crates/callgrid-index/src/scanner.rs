//! Line scanner that finds declarations and their extents.

use crate::lexer::CodeLine;
use callgrid_core::{AnalysisError, Declaration, DeclarationKind};
use regex::Regex;
use std::sync::LazyLock;

const IDENT: &str = r"([A-Za-z_][A-Za-z0-9_]*)";
const VIS: &str = r"(?:pub(?:\s*\([^)]*\))?\s+)?";

/// How many lines a signature may span before we give up looking for `{` or `;`.
const MAX_SIGNATURE_LINES: usize = 32;

fn item_regex(body: &str) -> Regex {
    Regex::new(&format!(r"^\s*{VIS}{body}")).expect("static declaration pattern")
}

static STRUCT_RE: LazyLock<Regex> = LazyLock::new(|| item_regex(&format!(r"struct\s+{IDENT}")));
static ENUM_RE: LazyLock<Regex> = LazyLock::new(|| item_regex(&format!(r"enum\s+{IDENT}")));
static TRAIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    item_regex(&format!(r"(?:unsafe\s+)?(?:auto\s+)?trait\s+{IDENT}"))
});
static TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| item_regex(&format!(r"type\s+{IDENT}[^=;]*=")));
static CONST_RE: LazyLock<Regex> = LazyLock::new(|| {
    item_regex(&format!(r"(?:const|static(?:\s+mut)?)\s+{IDENT}\s*:"))
});
static MOD_RE: LazyLock<Regex> = LazyLock::new(|| item_regex(&format!(r"mod\s+{IDENT}")));
static IMPL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:unsafe\s+)?impl\b(.*)$").expect("static impl pattern"));
static FN_RE: LazyLock<Regex> = LazyLock::new(|| {
    item_regex(&format!(
        r#"(?:(?:default|const|async|unsafe|extern(?:\s*"[^"]*")?)\s+)*fn\s+{IDENT}"#
    ))
});
static BRANCH_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bif\b",
        r"\belse\s+if\b",
        r"\bwhile\b",
        r"\bfor\b",
        r"\bloop\b",
        r"\bmatch\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static branch pattern"))
    .collect()
});
static WHERE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bwhere\b").expect("static where pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Impl,
    Trait,
    Module,
}

#[derive(Debug, Clone)]
struct Scope {
    name: String,
    kind: ScopeKind,
    body_depth: i64,
    line: usize,
    opened: bool,
}

/// Declarations in source order plus the number of `impl` blocks seen.
#[derive(Debug, Default)]
pub(crate) struct ScanOutput {
    pub declarations: Vec<Declaration>,
    pub impl_count: usize,
}

/// Where a signature ends: at a `{` that opens a body, or at a `;`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Block { line: usize },
    Semicolon { line: usize },
}

struct Scanner<'a> {
    raw: &'a [&'a str],
    code: &'a [CodeLine],
    depth: i64,
    scopes: Vec<Scope>,
    out: ScanOutput,
}

pub(crate) fn scan(raw: &[&str], code: &[CodeLine]) -> Result<ScanOutput, AnalysisError> {
    let mut scanner = Scanner {
        raw,
        code,
        depth: 0,
        scopes: Vec::new(),
        out: ScanOutput::default(),
    };
    scanner.run()?;
    Ok(scanner.out)
}

impl Scanner<'_> {
    fn run(&mut self) -> Result<(), AnalysisError> {
        let mut i = 0;
        while i < self.code.len() {
            self.pop_closed_scopes();
            let line = self.code[i].text.as_str();

            if let Some((kind, name)) = match_item(line) {
                match kind {
                    DeclarationKind::TypeAlias | DeclarationKind::Const => {
                        self.record(kind, &name, i, i, Vec::new(), None);
                    }
                    DeclarationKind::Trait | DeclarationKind::Module => {
                        let end = match self.find_terminator(i) {
                            Some(Terminator::Block { .. }) => {
                                let scope_kind = if kind == DeclarationKind::Trait {
                                    ScopeKind::Trait
                                } else {
                                    ScopeKind::Module
                                };
                                let end = self.block_end(i, &name)?;
                                self.push_scope(name.clone(), scope_kind, i);
                                end
                            }
                            _ => i,
                        };
                        self.record(kind, &name, i, end, Vec::new(), None);
                    }
                    _ => {
                        let end = match self.find_terminator(i) {
                            Some(Terminator::Block { .. }) => self.block_end(i, &name)?,
                            _ => i,
                        };
                        self.record(kind, &name, i, end, Vec::new(), None);
                        self.skip_lines(i, end)?;
                        i = end + 1;
                        continue;
                    }
                }
            } else if let Some(caps) = IMPL_RE.captures(line) {
                self.out.impl_count += 1;
                let header = caps.get(1).map_or("", |m| m.as_str());
                let ty = impl_type_name(header);
                self.push_scope(ty, ScopeKind::Impl, i);
            } else if let Some(caps) = FN_RE.captures(line) {
                let name = caps[1].to_string();
                let terminator = self.find_terminator(i);
                let (sig_end_line, end) = match terminator {
                    Some(Terminator::Block { line }) => (line, self.block_end(i, &name)?),
                    Some(Terminator::Semicolon { line }) => (line, line),
                    None => (i, i),
                };
                let signature = self.signature_text(i, sig_end_line);
                let sig = parse_signature(&signature);
                let kind = match self.innermost_type_scope() {
                    Some(_) => DeclarationKind::Method,
                    None => DeclarationKind::Function,
                };
                self.record(kind, &name, i, end, sig.params, sig.return_type);
                self.skip_lines(i, end)?;
                i = end + 1;
                continue;
            }

            self.apply_line(i)?;
            i += 1;
        }

        self.pop_closed_scopes();
        if self.depth > 0 {
            let (name, line) = match self.scopes.last() {
                Some(scope) => (scope.name.clone(), scope.line + 1),
                None => ("block".to_string(), self.code.len()),
            };
            return Err(AnalysisError::Unterminated { name, line });
        }
        Ok(())
    }

    fn apply_line(&mut self, i: usize) -> Result<(), AnalysisError> {
        let line = &self.code[i];
        self.depth += line.opens as i64 - line.closes as i64;
        if self.depth < 0 {
            return Err(AnalysisError::UnmatchedClose { line: i + 1 });
        }
        for scope in &mut self.scopes {
            if self.depth >= scope.body_depth {
                scope.opened = true;
            }
        }
        Ok(())
    }

    fn skip_lines(&mut self, start: usize, end: usize) -> Result<(), AnalysisError> {
        for k in start..=end {
            self.apply_line(k)?;
        }
        Ok(())
    }

    fn push_scope(&mut self, name: String, kind: ScopeKind, line: usize) {
        self.scopes.push(Scope {
            name,
            kind,
            body_depth: self.depth + 1,
            line,
            opened: false,
        });
    }

    fn pop_closed_scopes(&mut self) {
        while let Some(top) = self.scopes.last() {
            if top.opened && self.depth < top.body_depth {
                self.scopes.pop();
            } else {
                break;
            }
        }
    }

    fn innermost_type_scope(&self) -> Option<&Scope> {
        self.scopes
            .iter()
            .rev()
            .find(|s| matches!(s.kind, ScopeKind::Impl | ScopeKind::Trait))
    }

    /// First `{` or top-level `;` at or after line `start`.
    fn find_terminator(&self, start: usize) -> Option<Terminator> {
        let mut parens = 0i32;
        let last = (start + MAX_SIGNATURE_LINES).min(self.code.len());
        for k in start..last {
            for c in self.code[k].text.chars() {
                match c {
                    '(' | '[' => parens += 1,
                    ')' | ']' => parens -= 1,
                    '{' => return Some(Terminator::Block { line: k }),
                    ';' if parens <= 0 => return Some(Terminator::Semicolon { line: k }),
                    _ => {}
                }
            }
        }
        None
    }

    /// Line index where the block opened at or after `start` closes.
    fn block_end(&self, start: usize, name: &str) -> Result<usize, AnalysisError> {
        let mut local = 0i64;
        let mut opened = false;
        for k in start..self.code.len() {
            let line = &self.code[k];
            local += line.opens as i64 - line.closes as i64;
            opened |= line.opens > 0;
            if opened && local <= 0 {
                return Ok(k);
            }
        }
        Err(AnalysisError::Unterminated {
            name: name.to_string(),
            line: start + 1,
        })
    }

    fn signature_text(&self, start: usize, end: usize) -> String {
        self.code[start..=end]
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn record(
        &mut self,
        kind: DeclarationKind,
        name: &str,
        start: usize,
        end: usize,
        params: Vec<String>,
        return_type: Option<String>,
    ) {
        let qualified_name = match self.scopes.last() {
            Some(scope) if kind.is_callable() || kind == DeclarationKind::Const => {
                let owner = self.innermost_type_scope().unwrap_or(scope);
                format!("{}::{}", owner.name, name)
            }
            _ => name.to_string(),
        };
        let complexity = if kind.is_callable() {
            complexity(&self.code[start..=end])
        } else {
            1
        };
        self.out.declarations.push(Declaration {
            name: name.to_string(),
            qualified_name,
            kind,
            start_line: start + 1,
            end_line: end + 1,
            params,
            doc: doc_before(self.raw, start),
            return_type,
            complexity,
            source: self.raw[start..=end].join("\n"),
        });
    }
}

fn match_item(line: &str) -> Option<(DeclarationKind, String)> {
    let patterns: [(&LazyLock<Regex>, DeclarationKind); 6] = [
        (&STRUCT_RE, DeclarationKind::Struct),
        (&ENUM_RE, DeclarationKind::Enum),
        (&TRAIT_RE, DeclarationKind::Trait),
        (&TYPE_RE, DeclarationKind::TypeAlias),
        (&CONST_RE, DeclarationKind::Const),
        (&MOD_RE, DeclarationKind::Module),
    ];
    patterns.iter().find_map(|(re, kind)| {
        re.captures(line)
            .map(|caps| (*kind, caps[1].to_string()))
    })
}

/// `impl<T> Trait<T> for path::Type<T> where ..` -> `Type`.
fn impl_type_name(header: &str) -> String {
    let header = header.split('{').next().unwrap_or_default();
    let header = WHERE_RE.split(header).next().unwrap_or_default().trim();
    let header = skip_leading_generics(header).trim();
    let ty = header.rsplit(" for ").next().unwrap_or(header).trim();
    let ty = ty.trim_start_matches(['&', '*']).trim_start_matches("dyn ").trim();
    let ty = strip_generics(ty);
    let ty = ty.rsplit("::").next().unwrap_or_default();
    let ident: String = ty
        .trim()
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if ident.is_empty() {
        "impl".to_string()
    } else {
        ident
    }
}

fn skip_leading_generics(s: &str) -> &str {
    let trimmed = s.trim_start();
    if !trimmed.starts_with('<') {
        return trimmed;
    }
    let mut depth = 0i32;
    let mut prev = ' ';
    for (idx, c) in trimmed.char_indices() {
        match c {
            '<' => depth += 1,
            '>' if prev != '-' => {
                depth -= 1;
                if depth == 0 {
                    return &trimmed[idx + 1..];
                }
            }
            _ => {}
        }
        prev = c;
    }
    ""
}

fn strip_generics(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0i32;
    let mut prev = ' ';
    for c in s.chars() {
        match c {
            '<' => depth += 1,
            '>' if prev != '-' => depth = (depth - 1).max(0),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
        prev = c;
    }
    out
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Signature {
    params: Vec<String>,
    return_type: Option<String>,
}

/// Parses `fn name<G>(params) -> Ret where ..` (already cut before `{`/`;`).
fn parse_signature(sig: &str) -> Signature {
    let Some(name_end) = sig.find("fn ").map(|p| p + 3) else {
        return Signature::default();
    };
    let rest = sig[name_end..].trim_start();
    let rest = rest.trim_start_matches(|c: char| c.is_alphanumeric() || c == '_');
    let rest = skip_leading_generics(rest);
    let Some(open) = rest.find('(') else {
        return Signature::default();
    };
    let mut depth = 0i32;
    let mut close = None;
    for (idx, c) in rest.char_indices().skip_while(|(i, _)| *i < open) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(idx);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(close) = close else {
        return Signature::default();
    };

    let params = split_top_level(&rest[open + 1..close])
        .into_iter()
        .filter_map(param_name)
        .collect();

    let tail = cut_at_body(&rest[close + 1..]).trim();
    let return_type = tail.strip_prefix("->").map(|ret| {
        let ret = WHERE_RE.split(ret).next().unwrap_or_default();
        ret.split_whitespace().collect::<Vec<_>>().join(" ")
    });

    Signature {
        params,
        return_type: return_type.filter(|r| !r.is_empty()),
    }
}

fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut prev = ' ';
    for (idx, c) in s.char_indices() {
        match c {
            '(' | '[' | '<' => depth += 1,
            ')' | ']' => depth -= 1,
            '>' if prev != '-' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&s[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
        prev = c;
    }
    parts.push(&s[start..]);
    parts
}

/// Text before the first `{` or `;` that is not nested in brackets.
fn cut_at_body(s: &str) -> &str {
    let mut depth = 0i32;
    for (idx, c) in s.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            '{' => return &s[..idx],
            ';' if depth <= 0 => return &s[..idx],
            _ => {}
        }
    }
    s
}

fn param_name(param: &str) -> Option<String> {
    let pattern = split_top_level_colon(param.trim()).trim();
    if pattern.is_empty() {
        return None;
    }
    let mut receiver = pattern.trim_start_matches('&').trim_start();
    if receiver.starts_with('\'') {
        receiver = receiver
            .split_once(char::is_whitespace)
            .map_or("", |(_, r)| r)
            .trim_start();
    }
    let receiver = receiver.strip_prefix("mut ").unwrap_or(receiver).trim();
    if receiver == "self" {
        return None;
    }
    let name = pattern.strip_prefix("mut ").unwrap_or(pattern).trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn split_top_level_colon(param: &str) -> &str {
    let mut depth = 0i32;
    for (idx, c) in param.char_indices() {
        match c {
            '(' | '[' | '<' => depth += 1,
            ')' | ']' | '>' => depth -= 1,
            ':' if depth == 0 => return &param[..idx],
            _ => {}
        }
    }
    param
}

/// `///` lines directly above `idx`, skipping blank lines and attributes.
fn doc_before(raw: &[&str], idx: usize) -> String {
    let mut lines = Vec::new();
    for line in raw[..idx].iter().rev() {
        let trimmed = line.trim();
        if let Some(doc) = trimmed.strip_prefix("///") {
            lines.push(doc.trim_start_matches('/').trim().to_string());
        } else if trimmed.is_empty() || trimmed.starts_with("#[") {
            continue;
        } else {
            break;
        }
    }
    lines.reverse();
    lines.join("\n")
}

fn complexity(lines: &[CodeLine]) -> u32 {
    let text = lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    1 + BRANCH_RES
        .iter()
        .map(|re| re.find_iter(&text).count() as u32)
        .sum::<u32>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::sanitize;

    fn scan_src(src: &str) -> Result<ScanOutput, AnalysisError> {
        let raw: Vec<&str> = src.split('\n').collect();
        let code = sanitize(src);
        scan(&raw, &code)
    }

    fn find<'a>(out: &'a ScanOutput, name: &str) -> &'a Declaration {
        out.declarations
            .iter()
            .find(|d| d.name == name)
            .unwrap_or_else(|| panic!("missing declaration {name}"))
    }

    #[test]
    fn test_impl_methods_are_qualified() {
        let src = "struct Point { x: i32 }\n\nimpl Point {\n    pub fn new(x: i32) -> Self {\n        Point { x }\n    }\n\n    fn len(&self) -> usize { 1 }\n}\n\nfn free() {}\n";
        let out = scan_src(src).unwrap();
        assert_eq!(out.impl_count, 1);
        let new = find(&out, "new");
        assert_eq!(new.qualified_name, "Point::new");
        assert_eq!(new.kind, DeclarationKind::Method);
        assert_eq!((new.start_line, new.end_line), (4, 6));
        assert_eq!(new.params, vec!["x"]);
        assert_eq!(new.return_type.as_deref(), Some("Self"));
        let len = find(&out, "len");
        assert!(len.params.is_empty());
        let free = find(&out, "free");
        assert_eq!(free.qualified_name, "free");
        assert_eq!(free.kind, DeclarationKind::Function);
        let point = find(&out, "Point");
        assert_eq!(point.kind, DeclarationKind::Struct);
        assert_eq!((point.start_line, point.end_line), (1, 1));
    }

    #[test]
    fn test_trait_impl_uses_target_type() {
        let src = "impl<T: Clone> std::fmt::Display for wrapper::Holder<T> {\n    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {\n        Ok(())\n    }\n}\n";
        let out = scan_src(src).unwrap();
        let fmt = find(&out, "fmt");
        assert_eq!(fmt.qualified_name, "Holder::fmt");
        assert_eq!(fmt.params, vec!["f"]);
        assert_eq!(fmt.return_type.as_deref(), Some("fmt::Result"));
    }

    #[test]
    fn test_doc_comments_collected_upward() {
        let src = "/// First line\n///   Second line\n#[inline]\n\nfn documented() {}\n\n// plain\nfn bare() {}\n";
        let out = scan_src(src).unwrap();
        assert_eq!(find(&out, "documented").doc, "First line\nSecond line");
        assert_eq!(find(&out, "bare").doc, "");
    }

    #[test]
    fn test_single_line_items() {
        let src = "pub type Id = u64;\nconst LIMIT: usize = 3;\nmod external;\nstruct Unit;\n";
        let out = scan_src(src).unwrap();
        for (name, kind) in [
            ("Id", DeclarationKind::TypeAlias),
            ("LIMIT", DeclarationKind::Const),
            ("external", DeclarationKind::Module),
            ("Unit", DeclarationKind::Struct),
        ] {
            let decl = find(&out, name);
            assert_eq!(decl.kind, kind);
            assert_eq!(decl.start_line, decl.end_line);
        }
    }

    #[test]
    fn test_multiline_signature_and_where_clause() {
        let src = "fn spread<T>(\n    first: T,\n    rest: HashMap<String, Vec<T>>,\n) -> Option<T>\nwhere\n    T: Clone,\n{\n    if true { None } else { None }\n}\n";
        let out = scan_src(src).unwrap();
        let spread = find(&out, "spread");
        assert_eq!(spread.params, vec!["first", "rest"]);
        assert_eq!(spread.return_type.as_deref(), Some("Option<T>"));
        assert_eq!((spread.start_line, spread.end_line), (1, 9));
        assert_eq!(spread.complexity, 2);
    }

    #[test]
    fn test_trait_prototypes_span_one_line() {
        let src = "trait Shape {\n    fn area(&self) -> f64;\n    fn name(&self) -> String {\n        String::new()\n    }\n}\n";
        let out = scan_src(src).unwrap();
        let area = find(&out, "area");
        assert_eq!((area.start_line, area.end_line), (2, 2));
        assert_eq!(area.qualified_name, "Shape::area");
        let name = find(&out, "name");
        assert_eq!((name.start_line, name.end_line), (3, 5));
        let shape = find(&out, "Shape");
        assert_eq!((shape.start_line, shape.end_line), (1, 6));
    }

    #[test]
    fn test_complexity_counts_branch_keywords() {
        let src = "fn busy(x: u8) {\n    if x > 1 {\n    } else if x > 2 {\n    }\n    for _ in 0..3 {}\n    while false {}\n    loop { break; }\n    match x { _ => {} }\n}\n";
        let out = scan_src(src).unwrap();
        // if, if (from else if), else if, for, while, loop, match
        assert_eq!(find(&out, "busy").complexity, 8);
    }

    #[test]
    fn test_unbalanced_source_is_an_error() {
        assert!(matches!(
            scan_src("fn open() {\n    call();\n"),
            Err(AnalysisError::Unterminated { ref name, line: 1 }) if name == "open"
        ));
        assert!(matches!(
            scan_src("fn a() {}\n}\n"),
            Err(AnalysisError::UnmatchedClose { line: 2 })
        ));
        assert!(matches!(
            scan_src("impl Thing {\n"),
            Err(AnalysisError::Unterminated { .. })
        ));
    }

    #[test]
    fn test_receivers_are_not_params() {
        for sig in [
            "fn a(self)",
            "fn a(&self, x: u8)",
            "fn a(&mut self, x: u8)",
            "fn a(&'a mut self, x: u8)",
            "fn a(mut self, x: u8)",
            "fn a(self: Box<Self>, x: u8)",
        ] {
            let parsed = parse_signature(sig);
            assert!(
                parsed.params.iter().all(|p| p == "x"),
                "{sig} -> {:?}",
                parsed.params
            );
        }
        assert_eq!(parse_signature("fn b(mut count: usize)").params, vec!["count"]);
    }

    #[test]
    fn test_impl_type_name_variants() {
        assert_eq!(impl_type_name(" Foo {"), "Foo");
        assert_eq!(impl_type_name("<T> Foo<T> {"), "Foo");
        assert_eq!(impl_type_name(" From<u8> for crate::a::Bar where T: X {"), "Bar");
        assert_eq!(impl_type_name(" {"), "impl");
    }
}
