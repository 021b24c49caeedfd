//! Blanks out string literals, character literals and comments so the
//! line scanner only ever sees code. Line and column structure is kept
//! intact; every removed character becomes a space.

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CodeLine {
    pub text: String,
    pub opens: u32,
    pub closes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    Str,
    RawStr(usize),
    Block(u32),
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub(crate) fn sanitize(source: &str) -> Vec<CodeLine> {
    let mut mode = Mode::Code;
    source
        .split('\n')
        .map(|line| sanitize_line(line.trim_end_matches('\r'), &mut mode))
        .collect()
}

fn sanitize_line(line: &str, mode: &mut Mode) -> CodeLine {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut opens = 0;
    let mut closes = 0;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match *mode {
            Mode::Code => match c {
                '/' if next == Some('/') => {
                    out.extend(std::iter::repeat_n(' ', chars.len() - i));
                    break;
                }
                '/' if next == Some('*') => {
                    *mode = Mode::Block(1);
                    out.push_str("  ");
                    i += 2;
                    continue;
                }
                '"' => {
                    *mode = Mode::Str;
                    out.push('"');
                }
                'r' if !chars[..i].last().is_some_and(|p| is_ident(*p) && *p != 'b')
                    && matches!(next, Some('"') | Some('#')) =>
                {
                    let hashes = chars[i + 1..].iter().take_while(|c| **c == '#').count();
                    if chars.get(i + 1 + hashes) == Some(&'"') {
                        *mode = Mode::RawStr(hashes);
                        out.push('r');
                        out.extend(std::iter::repeat_n(' ', hashes));
                        out.push('"');
                        i += hashes + 2;
                        continue;
                    }
                    out.push(c);
                }
                '\'' => {
                    let literal_len = if next == Some('\\') {
                        chars
                            .get(i + 3..)
                            .and_then(|rest| rest.iter().position(|c| *c == '\''))
                            .map(|p| p + 4)
                    } else if chars.get(i + 2) == Some(&'\'') {
                        Some(3)
                    } else {
                        None
                    };
                    match literal_len {
                        Some(len) => {
                            out.push('\'');
                            out.extend(std::iter::repeat_n(' ', len - 2));
                            out.push('\'');
                            i += len;
                            continue;
                        }
                        // lifetime or label
                        None => out.push('\''),
                    }
                }
                '{' => {
                    opens += 1;
                    out.push(c);
                }
                '}' => {
                    closes += 1;
                    out.push(c);
                }
                _ => out.push(c),
            },
            Mode::Str => match c {
                '\\' => {
                    out.push(' ');
                    if next.is_some() {
                        out.push(' ');
                        i += 1;
                    }
                }
                '"' => {
                    *mode = Mode::Code;
                    out.push('"');
                }
                _ => out.push(' '),
            },
            Mode::RawStr(hashes) => {
                let closes_here = c == '"'
                    && chars[i + 1..].iter().take(hashes).filter(|c| **c == '#').count() == hashes;
                if closes_here {
                    *mode = Mode::Code;
                    out.push('"');
                    out.extend(std::iter::repeat_n(' ', hashes));
                    i += hashes + 1;
                    continue;
                }
                out.push(' ');
            }
            Mode::Block(depth) => {
                if c == '*' && next == Some('/') {
                    *mode = if depth <= 1 {
                        Mode::Code
                    } else {
                        Mode::Block(depth - 1)
                    };
                    out.push_str("  ");
                    i += 2;
                    continue;
                }
                if c == '/' && next == Some('*') {
                    *mode = Mode::Block(depth + 1);
                    out.push_str("  ");
                    i += 2;
                    continue;
                }
                out.push(' ');
            }
        }
        i += 1;
    }

    CodeLine {
        text: out,
        opens,
        closes,
    }
}
