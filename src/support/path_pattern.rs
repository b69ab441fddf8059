//! Ant-style pattern matching for paths and host names.
//!
//! # Syntax
//! - `?` matches one character inside a segment
//! - `*` matches zero or more characters inside a segment
//! - `**` matches zero or more whole segments
//! - `{name}` captures one segment; `{name:regex}` captures with a constraint
//!
//! Paths use `/` as the separator, hosts use `.`.
//!
//! # Design Decisions
//! - Patterns are compiled once, at route compilation time
//! - Empty segments are ignored, so `//a` and `/a` tokenise the same way
//! - A trailing separator is significant unless the pattern ends with `**`
//! - Each variable compiles to its own named group, so groups inside a
//!   `{name:regex}` constraint never shift the captures of later variables

use std::collections::HashMap;

use regex::Regex;

#[derive(Debug, Clone)]
enum Segment {
    DoubleWildcard,
    Literal(String),
    /// `variables` pairs each regex group name with its variable name.
    Pattern {
        regex: Regex,
        variables: Vec<(String, String)>,
    },
}

/// A compiled Ant-style pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    separator: char,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a `/`-separated path pattern.
    pub fn path(pattern: &str) -> Result<Self, regex::Error> {
        Self::new(pattern, '/')
    }

    /// Compile a `.`-separated host pattern.
    pub fn host(pattern: &str) -> Result<Self, regex::Error> {
        Self::new(pattern, '.')
    }

    pub fn new(pattern: &str, separator: char) -> Result<Self, regex::Error> {
        let segments = pattern
            .split(separator)
            .filter(|s| !s.is_empty())
            .map(compile_segment)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: pattern.to_string(),
            separator,
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.match_variables(candidate).is_some()
    }

    /// Match and return the captured `{name}` variables.
    pub fn match_variables(&self, candidate: &str) -> Option<HashMap<String, String>> {
        let sep = self.separator;
        if self.source.starts_with(sep) != candidate.starts_with(sep) {
            return None;
        }

        let ends_with_any = matches!(self.segments.last(), Some(Segment::DoubleWildcard));
        if !ends_with_any
            && candidate.len() > 1
            && candidate.ends_with(sep) != self.source.ends_with(sep)
        {
            return None;
        }

        let tokens: Vec<&str> = candidate.split(sep).filter(|s| !s.is_empty()).collect();
        let mut variables = Vec::new();
        if match_segments(&self.segments, &tokens, &mut variables) {
            Some(variables.into_iter().collect())
        } else {
            None
        }
    }
}

fn compile_segment(segment: &str) -> Result<Segment, regex::Error> {
    if segment == "**" {
        return Ok(Segment::DoubleWildcard);
    }
    if !segment.contains(&['*', '?', '{'][..]) {
        return Ok(Segment::Literal(segment.to_string()));
    }

    let mut pattern = String::from("^");
    let mut variables = Vec::new();
    let mut literal = String::new();
    let mut chars = segment.chars();

    while let Some(c) = chars.next() {
        match c {
            '*' | '?' | '{' => {
                pattern.push_str(&regex::escape(&literal));
                literal.clear();
                match c {
                    '*' => pattern.push_str(".*"),
                    '?' => pattern.push('.'),
                    _ => {
                        let mut body = String::new();
                        let mut depth = 1;
                        for c in chars.by_ref() {
                            match c {
                                '{' => depth += 1,
                                '}' => {
                                    depth -= 1;
                                    if depth == 0 {
                                        break;
                                    }
                                }
                                _ => {}
                            }
                            body.push(c);
                        }
                        let (name, constraint) = match body.split_once(':') {
                            Some((name, re)) => (name.to_string(), re.to_string()),
                            None => (body, ".*".to_string()),
                        };
                        let group = format!("__var{}", variables.len());
                        pattern.push_str(&format!("(?P<{group}>{constraint})"));
                        variables.push((group, name));
                    }
                }
            }
            other => literal.push(other),
        }
    }
    pattern.push_str(&regex::escape(&literal));
    pattern.push('$');

    Ok(Segment::Pattern {
        regex: Regex::new(&pattern)?,
        variables,
    })
}

fn match_segments(
    segments: &[Segment],
    tokens: &[&str],
    variables: &mut Vec<(String, String)>,
) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return tokens.is_empty();
    };

    match first {
        Segment::DoubleWildcard => {
            (0..=tokens.len()).any(|skip| match_segments(rest, &tokens[skip..], variables))
        }
        Segment::Literal(literal) => match tokens.split_first() {
            Some((token, remaining)) if token == literal => {
                match_segments(rest, remaining, variables)
            }
            _ => false,
        },
        Segment::Pattern {
            regex,
            variables: names,
        } => {
            let Some((token, remaining)) = tokens.split_first() else {
                return false;
            };
            let Some(captures) = regex.captures(token) else {
                return false;
            };

            let mark = variables.len();
            for (group, name) in names {
                if let Some(m) = captures.name(group) {
                    variables.push((name.clone(), m.as_str().to_string()));
                }
            }
            if match_segments(rest, remaining, variables) {
                true
            } else {
                variables.truncate(mark);
                false
            }
        }
    }
}
