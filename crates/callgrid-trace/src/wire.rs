use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

static CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^call:\s+func=(\S+)\s+module=(\S*)\s+file=(.+)$").expect("valid call regex")
});

static ERROR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^error:\s+file=(.+?)\s+func=(\S*)\s+line=(\d+)\s+msg=(.*)$")
        .expect("valid error regex")
});

static TARGET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^target=(.+)$").expect("valid target regex"));

/// One message from an instrumented process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A function was entered.
    Call {
        func: String,
        module: String,
        file: String,
    },
    /// The run failed at a location.
    Error {
        file: String,
        func: String,
        line: usize,
        message: String,
    },
    /// The process announced which file it runs.
    Target { file: String },
}

impl TraceEvent {
    pub fn file(&self) -> &str {
        match self {
            TraceEvent::Call { file, .. }
            | TraceEvent::Error { file, .. }
            | TraceEvent::Target { file } => file,
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum JsonEvent {
    Call {
        func: String,
        #[serde(default)]
        module: String,
        file: String,
    },
    Error {
        file: String,
        #[serde(default)]
        func: String,
        #[serde(default)]
        line: usize,
        #[serde(default, alias = "message")]
        msg: String,
    },
}

/// Parse one protocol line.
///
/// Accepts the text forms
/// `call: func=<name> module=<name> file=<path>`,
/// `error: file=<path> func=<name> line=<n> msg=<text>` and
/// `target=<path>`, optionally prefixed with `[tracer]`, plus JSON objects
/// tagged with `"type": "call"` or `"type": "error"`. Anything else is
/// ignored.
pub fn parse_line(line: &str) -> Option<TraceEvent> {
    let line = line.trim();
    let line = line.strip_prefix("[tracer]").map_or(line, str::trim_start);
    if line.is_empty() {
        return None;
    }

    if line.starts_with('{') {
        return match serde_json::from_str::<JsonEvent>(line).ok()? {
            JsonEvent::Call { func, module, file } => Some(TraceEvent::Call { func, module, file }),
            JsonEvent::Error {
                file,
                func,
                line,
                msg,
            } => Some(TraceEvent::Error {
                file,
                func,
                line,
                message: msg,
            }),
        };
    }

    if let Some(caps) = CALL_RE.captures(line) {
        return Some(TraceEvent::Call {
            func: caps[1].to_string(),
            module: caps[2].to_string(),
            file: caps[3].trim().to_string(),
        });
    }
    if let Some(caps) = ERROR_RE.captures(line) {
        return Some(TraceEvent::Error {
            file: caps[1].to_string(),
            func: caps[2].to_string(),
            line: caps[3].parse().ok()?,
            message: caps[4].trim().to_string(),
        });
    }
    TARGET_RE.captures(line).map(|caps| TraceEvent::Target {
        file: caps[1].trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_line() {
        assert_eq!(
            parse_line("call: func=inventory::Inventory::ship module=inventory file=/src/inv entory.rs"),
            Some(TraceEvent::Call {
                func: "inventory::Inventory::ship".into(),
                module: "inventory".into(),
                file: "/src/inv entory.rs".into(),
            })
        );
    }

    #[test]
    fn test_empty_module_and_prefix() {
        assert_eq!(
            parse_line("[tracer] call: func=main module= file=src/main.rs\r"),
            Some(TraceEvent::Call {
                func: "main".into(),
                module: String::new(),
                file: "src/main.rs".into(),
            })
        );
    }

    #[test]
    fn test_error_line_keeps_message_spaces() {
        assert_eq!(
            parse_line("error: file=/a b/main.rs func=parse line=42 msg=index out of bounds: len 3"),
            Some(TraceEvent::Error {
                file: "/a b/main.rs".into(),
                func: "parse".into(),
                line: 42,
                message: "index out of bounds: len 3".into(),
            })
        );
    }

    #[test]
    fn test_target_line() {
        assert_eq!(
            parse_line("[tracer] target=/work/main.rs"),
            Some(TraceEvent::Target {
                file: "/work/main.rs".into()
            })
        );
    }

    #[test]
    fn test_json_lines() {
        assert_eq!(
            parse_line(r#"{"type":"call","func":"run","module":"app","file":"/x/app.rs"}"#),
            Some(TraceEvent::Call {
                func: "run".into(),
                module: "app".into(),
                file: "/x/app.rs".into(),
            })
        );
        assert_eq!(
            parse_line(r#"{"type":"error","file":"/x/app.rs","line":7,"message":"boom"}"#),
            Some(TraceEvent::Error {
                file: "/x/app.rs".into(),
                func: String::new(),
                line: 7,
                message: "boom".into(),
            })
        );
    }

    #[test]
    fn test_malformed_lines_are_ignored() {
        for line in [
            "",
            "hello world",
            "call: func= module=x file=y",
            "error: file=x func=y line=abc msg=z",
            r#"{"type":"call","func":"a"}"#,
            r#"{"type":"ping"}"#,
            "{not json",
        ] {
            assert_eq!(parse_line(line), None, "{line:?}");
        }
    }
}
