use crate::lexer::CodeLine;
use callgrid_core::Declaration;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

static CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b([A-Za-z_][A-Za-z0-9_]*)\s*\(|\.\s*([A-Za-z_][A-Za-z0-9_]*)\s*\(|::\s*([A-Za-z_][A-Za-z0-9_]*)\s*\(",
    )
    .expect("static call pattern")
});

/// Callees of each declaration, in first-occurrence order.
///
/// Only names that are themselves declarations count. Self-calls and
/// repeats are dropped.
pub(crate) fn extract(
    declarations: &[Declaration],
    code: &[CodeLine],
) -> BTreeMap<String, Vec<String>> {
    let known: HashSet<&str> = declarations.iter().map(|d| d.name.as_str()).collect();

    declarations
        .iter()
        .map(|decl| {
            let body = code[decl.start_line - 1..decl.end_line]
                .iter()
                .map(|l| l.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            // a renamed duplicate still spells its bare name in its own signature
            let bare = decl.qualified_name.rsplit("::").next().unwrap_or(&decl.name);
            let mut seen = HashSet::new();
            let callees = CALL_RE
                .captures_iter(&body)
                .filter_map(|caps| caps.get(1).or(caps.get(2)).or(caps.get(3)))
                .map(|m| m.as_str())
                .filter(|called| known.contains(called) && *called != decl.name && *called != bare)
                .filter(|called| seen.insert(*called))
                .map(str::to_string)
                .collect();
            (decl.name.clone(), callees)
        })
        .collect()
}
