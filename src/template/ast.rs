// src/template/ast.rs

//! Template syntax tree and parser
//!
//! The template language is deliberately small:
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `{{name}}` | Variable reference |
//! | `{{name\|fallback}}` | Variable with inline default |
//! | `{{#if key}} .. {{else}} .. {{/if}}` | Conditional on a truthy binding |
//! | `{{#unless key}} .. {{/unless}}` | Conditional on a falsy or missing binding |
//!
//! Everything outside `{{ }}` is literal text.

use std::collections::BTreeSet;
use thiserror::Error;

/// Template parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated tag starting at byte {0}")]
    UnterminatedTag(usize),

    #[error("empty tag at byte {0}")]
    EmptyTag(usize),

    #[error("invalid name '{name}' at byte {offset}")]
    InvalidName { name: String, offset: usize },

    #[error("block '{kind} {key}' is never closed")]
    UnclosedBlock { kind: String, key: String },

    #[error("unexpected '{tag}' at byte {offset}")]
    UnexpectedTag { tag: String, offset: usize },

    #[error("'{found}' closes '{expected}' at byte {offset}")]
    MismatchedClose {
        expected: String,
        found: String,
        offset: usize,
    },
}

/// A parsed template node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Literal(String),
    Variable {
        name: String,
        default: Option<String>,
    },
    Conditional {
        key: String,
        /// `#unless` blocks
        negate: bool,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

#[derive(Debug)]
enum Token<'a> {
    Text(&'a str),
    Tag { body: &'a str, offset: usize },
}

fn tokenize(source: &str) -> Result<Vec<Token<'_>>, TemplateError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            tokens.push(Token::Text(&rest[..start]));
        }
        let after_open = &rest[start + 2..];
        let end = after_open
            .find("}}")
            .ok_or(TemplateError::UnterminatedTag(offset + start))?;
        let body = after_open[..end].trim();
        if body.is_empty() {
            return Err(TemplateError::EmptyTag(offset + start));
        }
        tokens.push(Token::Tag {
            body,
            offset: offset + start,
        });
        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }

    if !rest.is_empty() {
        tokens.push(Token::Text(rest));
    }
    Ok(tokens)
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn checked_name(name: &str, offset: usize) -> Result<String, TemplateError> {
    if valid_name(name) {
        Ok(name.to_string())
    } else {
        Err(TemplateError::InvalidName {
            name: name.to_string(),
            offset,
        })
    }
}

/// Why a node sequence stopped
enum Stop {
    Eof,
    Else(usize),
    Close { kind: String, offset: usize },
}

fn parse_sequence(tokens: &[Token<'_>], pos: &mut usize) -> Result<(Vec<Node>, Stop), TemplateError> {
    let mut nodes = Vec::new();

    while let Some(token) = tokens.get(*pos) {
        *pos += 1;
        match token {
            Token::Text(text) => nodes.push(Node::Literal((*text).to_string())),
            Token::Tag { body, offset } => {
                let offset = *offset;
                if let Some(open) = body.strip_prefix('#') {
                    nodes.push(parse_block(open, offset, tokens, pos)?);
                } else if let Some(kind) = body.strip_prefix('/') {
                    return Ok((
                        nodes,
                        Stop::Close {
                            kind: kind.trim().to_string(),
                            offset,
                        },
                    ));
                } else if *body == "else" {
                    return Ok((nodes, Stop::Else(offset)));
                } else {
                    let (name, default) = match body.split_once('|') {
                        Some((name, default)) => (name.trim(), Some(default.trim().to_string())),
                        None => (*body, None),
                    };
                    nodes.push(Node::Variable {
                        name: checked_name(name, offset)?,
                        default,
                    });
                }
            }
        }
    }

    Ok((nodes, Stop::Eof))
}

fn parse_block(
    open: &str,
    offset: usize,
    tokens: &[Token<'_>],
    pos: &mut usize,
) -> Result<Node, TemplateError> {
    let mut parts = open.split_whitespace();
    let kind = parts.next().unwrap_or_default().to_string();
    let key = parts.next().unwrap_or_default();
    let negate = match kind.as_str() {
        "if" => false,
        "unless" => true,
        _ => {
            return Err(TemplateError::UnexpectedTag {
                tag: format!("#{}", open),
                offset,
            })
        }
    };
    let key = checked_name(key, offset)?;
    if parts.next().is_some() {
        return Err(TemplateError::UnexpectedTag {
            tag: format!("#{}", open),
            offset,
        });
    }

    let (then, stop) = parse_sequence(tokens, pos)?;
    let (otherwise, stop) = match stop {
        Stop::Else(_) => parse_sequence(tokens, pos)?,
        other => (Vec::new(), other),
    };

    match stop {
        Stop::Close { kind: found, .. } if found == kind => Ok(Node::Conditional {
            key,
            negate,
            then,
            otherwise,
        }),
        Stop::Close { kind: found, offset } => Err(TemplateError::MismatchedClose {
            expected: kind,
            found,
            offset,
        }),
        Stop::Else(offset) => Err(TemplateError::UnexpectedTag {
            tag: "else".to_string(),
            offset,
        }),
        Stop::Eof => Err(TemplateError::UnclosedBlock { kind, key }),
    }
}

/// Parse template source into a node list
pub fn parse(source: &str) -> Result<Vec<Node>, TemplateError> {
    let tokens = tokenize(source)?;
    let mut pos = 0;
    let (nodes, stop) = parse_sequence(&tokens, &mut pos)?;

    match stop {
        Stop::Eof => Ok(nodes),
        Stop::Else(offset) => Err(TemplateError::UnexpectedTag {
            tag: "else".to_string(),
            offset,
        }),
        Stop::Close { kind, offset } => Err(TemplateError::UnexpectedTag {
            tag: format!("/{}", kind),
            offset,
        }),
    }
}

/// Every binding name a node list refers to (variables and condition keys)
pub fn referenced_names(nodes: &[Node]) -> BTreeSet<&str> {
    let mut names = BTreeSet::new();
    collect_names(nodes, &mut names);
    names
}

fn collect_names<'a>(nodes: &'a [Node], names: &mut BTreeSet<&'a str>) {
    for node in nodes {
        match node {
            Node::Literal(_) => {}
            Node::Variable { name, .. } => {
                names.insert(name);
            }
            Node::Conditional {
                key,
                then,
                otherwise,
                ..
            } => {
                names.insert(key);
                collect_names(then, names);
                collect_names(otherwise, names);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literal_and_variables() {
        let nodes = parse(r#"{"id": "{{namespace}}:{{name}}", "stack": {{stack_size|64}}}"#).unwrap();
        assert_eq!(nodes[0], Node::Literal(r#"{"id": ""#.to_string()));
        assert_eq!(
            nodes[1],
            Node::Variable {
                name: "namespace".to_string(),
                default: None
            }
        );
        assert!(nodes.contains(&Node::Variable {
            name: "stack_size".to_string(),
            default: Some("64".to_string())
        }));
    }

    #[test]
    fn test_parse_nested_conditionals() {
        let nodes = parse("{{#if a}}A{{#unless b}}!b{{/unless}}{{else}}not a{{/if}}").unwrap();
        let Node::Conditional {
            key,
            negate,
            then,
            otherwise,
        } = &nodes[0]
        else {
            panic!("expected conditional");
        };
        assert_eq!(key, "a");
        assert!(!negate);
        assert_eq!(then.len(), 2);
        assert_eq!(otherwise, &vec![Node::Literal("not a".to_string())]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("abc {{name"), Err(TemplateError::UnterminatedTag(4)));
        assert_eq!(parse("{{ }}"), Err(TemplateError::EmptyTag(0)));
        assert!(matches!(
            parse("{{#if a}}x"),
            Err(TemplateError::UnclosedBlock { .. })
        ));
        assert!(matches!(
            parse("{{#if a}}x{{/unless}}"),
            Err(TemplateError::MismatchedClose { .. })
        ));
        assert!(matches!(
            parse("{{/if}}"),
            Err(TemplateError::UnexpectedTag { .. })
        ));
        assert!(matches!(
            parse("{{bad name}}"),
            Err(TemplateError::InvalidName { .. })
        ));
        assert!(matches!(
            parse("{{#each items}}{{/each}}"),
            Err(TemplateError::UnexpectedTag { .. })
        ));
    }

    #[test]
    fn test_referenced_names() {
        let nodes = parse("{{#if inventory}}{{slots|27}}{{/if}}{{name}}").unwrap();
        let names: Vec<_> = referenced_names(&nodes).into_iter().collect();
        assert_eq!(names, vec!["inventory", "name", "slots"]);
    }
}
