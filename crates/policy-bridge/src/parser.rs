//! Statement-level parser for policy modules.
//!
//! The parser splits source into top-level statements (package, imports,
//! rules) and reads each rule head. Rule bodies are kept as text; they only
//! need to be balanced, not understood.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{BridgeError, Result};
use crate::module::{Import, Module, Rule, RuleKind};

const REF: &str = r"[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*|\[[^\]]*\])*";

struct Patterns {
    package: Regex,
    import: Regex,
    default: Regex,
    head: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |pattern: String| match Regex::new(&pattern) {
            Ok(regex) => regex,
            Err(err) => unreachable!("invalid built-in pattern {}: {}", pattern, err),
        };
        Patterns {
            package: compile(format!(r"^package\s+({REF})$")),
            import: compile(format!(r"^import\s+({REF})(?:\s+as\s+([A-Za-z_][A-Za-z0-9_]*))?$")),
            default: compile(format!(r"(?s)^default\s+({REF})(?:\(([^)]*)\))?\s*(:=|=)\s*(.+)$")),
            head: compile(format!(r"(?s)^({REF})(?:\(([^)]*)\))?\s*(.*)$")),
        }
    })
}

/// A top-level statement with the line it starts on.
#[derive(Debug)]
struct Statement {
    line: usize,
    text: String,
}

struct Parser<'a> {
    filename: &'a str,
}

impl<'a> Parser<'a> {
    fn error(&self, line: usize, message: impl Into<String>) -> BridgeError {
        BridgeError::ModuleParse {
            filename: self.filename.to_string(),
            line,
            message: message.into(),
        }
    }

    /// Removes comments and groups lines into statements. A statement
    /// continues while brackets are open, while it ends in an operator, or
    /// when the next line starts with `else` or `{`.
    fn statements(&self, source: &str) -> Result<Vec<Statement>> {
        #[derive(PartialEq)]
        enum State {
            Code,
            Str,
            Raw,
        }

        let mut state = State::Code;
        let mut open: Vec<(char, usize)> = Vec::new();
        let mut statements: Vec<Statement> = Vec::new();
        let mut current: Option<Statement> = None;
        let mut continues = false;

        for (index, raw_line) in source.lines().enumerate() {
            let line_no = index + 1;
            let mut cleaned = String::with_capacity(raw_line.len());
            let mut chars = raw_line.chars();

            while let Some(c) = chars.next() {
                match state {
                    State::Code => match c {
                        '#' => break,
                        '"' => state = State::Str,
                        '`' => state = State::Raw,
                        '{' | '[' | '(' => open.push((c, line_no)),
                        '}' | ']' | ')' => {
                            let expected = match c {
                                '}' => '{',
                                ']' => '[',
                                _ => '(',
                            };
                            match open.pop() {
                                Some((opener, _)) if opener == expected => {}
                                _ => {
                                    return Err(self.error(line_no, format!("unexpected '{}'", c)));
                                }
                            }
                        }
                        _ => {}
                    },
                    State::Str => match c {
                        '\\' => {
                            cleaned.push(c);
                            if let Some(escaped) = chars.next() {
                                cleaned.push(escaped);
                            }
                            continue;
                        }
                        '"' => state = State::Code,
                        _ => {}
                    },
                    State::Raw => {
                        if c == '`' {
                            state = State::Code;
                        }
                    }
                }
                cleaned.push(c);
            }

            if state == State::Str {
                return Err(self.error(line_no, "unterminated string"));
            }

            let cleaned = cleaned.trim_end();
            let trimmed = cleaned.trim_start();
            let joins = current.is_some()
                && (continues
                    || strip_keyword(trimmed, "else").is_some()
                    || trimmed.starts_with('{'));

            if joins {
                if let Some(statement) = current.as_mut() {
                    statement.text.push('\n');
                    statement.text.push_str(cleaned);
                }
            } else {
                statements.extend(current.take());
                if !trimmed.is_empty() {
                    current = Some(Statement {
                        line: line_no,
                        text: trimmed.to_string(),
                    });
                }
            }

            continues = !open.is_empty() || state == State::Raw || ends_with_operator(trimmed);
        }

        if state == State::Raw {
            return Err(self.error(source.lines().count(), "unterminated raw string"));
        }
        if let Some((opener, line)) = open.first() {
            return Err(self.error(*line, format!("unclosed '{}'", opener)));
        }
        statements.extend(current);

        for statement in &mut statements {
            statement.text = statement.text.trim().to_string();
        }
        Ok(statements)
    }

    fn parse(&self, source: &str) -> Result<Module> {
        let patterns = patterns();
        let mut statements = self.statements(source)?.into_iter();

        let first = statements
            .next()
            .ok_or_else(|| self.error(1, "expected package declaration, found end of input"))?;
        let package = patterns
            .package
            .captures(&first.text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                let found = first_word(&first.text);
                self.error(first.line, format!("expected package declaration, found {:?}", found))
            })?;

        let mut module = Module {
            filename: self.filename.to_string(),
            package,
            imports: Vec::new(),
            rules: Vec::new(),
        };

        for statement in statements {
            if statement.text.starts_with("package") && patterns.package.is_match(&statement.text) {
                return Err(self.error(statement.line, "unexpected second package declaration"));
            }
            if first_word(&statement.text) == "import" {
                if !module.rules.is_empty() {
                    return Err(self.error(statement.line, "imports must precede rules"));
                }
                module.imports.push(self.import(&statement)?);
                continue;
            }
            module.rules.push(self.rule(&statement)?);
        }

        Ok(module)
    }

    fn import(&self, statement: &Statement) -> Result<Import> {
        let caps = patterns()
            .import
            .captures(&statement.text)
            .ok_or_else(|| self.error(statement.line, "malformed import"))?;
        Ok(Import {
            path: caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
            alias: caps.get(2).map(|m| m.as_str().to_string()),
        })
    }

    fn rule(&self, statement: &Statement) -> Result<Rule> {
        let patterns = patterns();
        let text = statement.text.clone();

        if first_word(&text) == "default" {
            let caps = patterns
                .default
                .captures(&text)
                .ok_or_else(|| self.error(statement.line, "malformed default rule"))?;
            return Ok(Rule {
                default: true,
                reference: capture(&caps, 1),
                args: split_args(caps.get(2).map_or("", |m| m.as_str())),
                kind: RuleKind::Complete,
                value: Some(capture(&caps, 4).trim().to_string()),
                conditional: false,
                line: statement.line,
                text,
            });
        }

        let caps = patterns.head.captures(&text).ok_or_else(|| {
            self.error(statement.line, format!("expected rule, found {:?}", first_word(&text)))
        })?;
        let reference = capture(&caps, 1);
        let args = split_args(caps.get(2).map_or("", |m| m.as_str()));
        let rest = caps.get(3).map_or("", |m| m.as_str()).trim();
        let bracketed = reference.ends_with(']');

        let (kind, value, conditional) = if let Some(after) = strip_keyword(rest, "contains") {
            let (_, condition) = split_condition(after);
            (RuleKind::PartialSet, None, condition.is_some())
        } else if let Some(after) = rest.strip_prefix(":=").or_else(|| {
            rest.strip_prefix('=').filter(|r| !r.starts_with('='))
        }) {
            let (value, condition) = split_condition(after.trim());
            if value.is_empty() {
                return Err(self.error(statement.line, "missing rule value"));
            }
            let kind = if bracketed {
                RuleKind::PartialObject
            } else {
                RuleKind::Complete
            };
            (kind, Some(value.to_string()), condition.is_some())
        } else if strip_keyword(rest, "if").is_some() || rest.starts_with('{') {
            let kind = if bracketed {
                RuleKind::PartialSet
            } else {
                RuleKind::Complete
            };
            (kind, None, true)
        } else if rest.is_empty() {
            let message = format!("rule {} has no value or body", reference);
            return Err(self.error(statement.line, message));
        } else {
            return Err(self.error(
                statement.line,
                format!("unexpected {:?} in head of rule {}", first_word(rest), reference),
            ));
        };

        Ok(Rule {
            default: false,
            reference,
            args,
            kind,
            value,
            conditional,
            line: statement.line,
            text,
        })
    }
}

/// Parses module source.
pub fn parse_source(filename: &str, source: &str) -> Result<Module> {
    let module = Parser { filename }.parse(source)?;
    tracing::trace!(
        filename,
        package = %module.package,
        rules = module.rules.len(),
        "parsed module"
    );
    Ok(module)
}

fn capture(caps: &regex::Captures<'_>, index: usize) -> String {
    caps.get(index).map(|m| m.as_str().to_string()).unwrap_or_default()
}

fn first_word(text: &str) -> &str {
    text.split(|c: char| c.is_whitespace() || c == '(' || c == '{')
        .next()
        .unwrap_or_default()
}

fn split_args(args: &str) -> Vec<String> {
    args.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_keyword<'t>(text: &'t str, keyword: &str) -> Option<&'t str> {
    let rest = text.strip_prefix(keyword)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() || c == '{' => Some(rest.trim_start()),
        Some(_) => None,
    }
}

fn ends_with_operator(line: &str) -> bool {
    const WORDS: [&str; 4] = ["if", "else", "contains", "with"];
    const SYMBOLS: [&str; 6] = [":=", "=", ",", "|", "&", "+"];
    let Some(last) = line.split_whitespace().last() else {
        return false;
    };
    WORDS.contains(&last) || SYMBOLS.iter().any(|s| last.ends_with(s))
}

/// Splits `value if cond`, `value { body }` and plain `value`. The `if`
/// keyword and a body brace only count outside brackets and strings.
fn split_condition(text: &str) -> (&str, Option<&str>) {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            match b {
                b'\\' => i += 1,
                b'"' => in_string = false,
                _ => {}
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'{' if depth == 0
                    && i > 0
                    && bytes[i - 1].is_ascii_whitespace()
                    && !ends_with_operator(&text[..i]) =>
                {
                    return (text[..i].trim_end(), Some(&text[i..]));
                }
                b'{' | b'[' | b'(' => depth += 1,
                b'}' | b']' | b')' => depth = depth.saturating_sub(1),
                b'i' if depth == 0
                    && text[i..].starts_with("if")
                    && (i == 0 || bytes[i - 1].is_ascii_whitespace())
                    && strip_keyword(&text[i..], "if").is_some() =>
                {
                    return (text[..i].trim_end(), Some(text[i + 2..].trim_start()));
                }
                _ => {}
            }
        }
        i += 1;
    }
    (text.trim(), None)
}
