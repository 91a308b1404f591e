//! Text description format for diagrams.
//!
//! ```text
//! diagram "regcred-injector" LR
//! api[Control Plane]:::api
//! cluster kube-system
//!     injector[regcred-injector]:::deployment
//! end
//! api -->|1 mutate webhook| injector
//! ```
//!
//! Nodes must be declared before an edge can reference them.

use std::collections::HashMap;

use winnow::prelude::*;
use winnow::ascii::{space0, space1};
use winnow::combinator::{alt, delimited, eof, opt, preceded};
use winnow::token::{rest, take_while};

use crate::diagram::{Diagram, DiagramBuilder, Direction, EdgeStyle, NodeId, NodeKind};
use crate::error::{Error, Result};

const DEFAULT_NAME: &str = "diagram";

#[derive(Debug, Clone, PartialEq)]
enum Statement {
    Header {
        name: String,
        direction: Option<Direction>,
    },
    Cluster(String),
    End,
    Node(NodeDecl),
    Edge(EdgeDecl),
}

#[derive(Debug, Clone, PartialEq)]
struct NodeDecl {
    key: String,
    label: Option<String>,
    kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq)]
struct EdgeDecl {
    from: String,
    to: String,
    label: Option<String>,
    style: EdgeStyle,
}

pub fn parse_diagram(input: &str) -> Result<Diagram> {
    let mut statements = Vec::new();
    for (idx, raw) in input.lines().enumerate() {
        let text = raw.trim();
        if text.is_empty() || text.starts_with("%%") {
            continue;
        }
        let stmt = statement
            .parse(text)
            .map_err(|_| syntax_error(idx + 1, text))?;
        statements.push((idx + 1, text, stmt));
    }

    let mut iter = statements.into_iter().peekable();
    let (name, direction) =
        match iter.next_if(|(_, _, stmt)| matches!(stmt, Statement::Header { .. })) {
            Some((_, _, Statement::Header { name, direction })) => (name, direction),
            _ => (DEFAULT_NAME.to_string(), None),
        };

    let mut builder = DiagramBuilder::new(name);
    if let Some(direction) = direction {
        builder.direction(direction);
    }
    let mut keys: HashMap<String, NodeId> = HashMap::new();

    for (line, text, stmt) in iter {
        match stmt {
            Statement::Header { .. } => return Err(syntax_error(line, text)),
            Statement::Cluster(label) => {
                if let Some(outer) = builder.current_cluster_label() {
                    return Err(Error::NestedCluster {
                        outer: outer.to_string(),
                        inner: label,
                    });
                }
                builder.open_cluster(label);
            }
            Statement::End => {
                if builder.current_cluster_label().is_none() {
                    return Err(syntax_error(line, text));
                }
                builder.close_cluster();
            }
            Statement::Node(decl) => {
                if keys.contains_key(&decl.key) {
                    return Err(Error::DuplicateNode {
                        line,
                        key: decl.key,
                    });
                }
                let label = decl.label.unwrap_or_else(|| decl.key.clone());
                let id = builder.node(decl.kind, label);
                keys.insert(decl.key, id);
            }
            Statement::Edge(decl) => {
                let from = resolve(&keys, line, &decl.from)?;
                let to = resolve(&keys, line, &decl.to)?;
                builder.styled_edge(from, to, decl.label, decl.style);
            }
        }
    }

    if let Some(label) = builder.current_cluster_label() {
        return Err(Error::UnclosedCluster {
            label: label.to_string(),
        });
    }

    let diagram = builder.build()?;
    tracing::debug!(
        name = diagram.name(),
        nodes = diagram.nodes().len(),
        edges = diagram.edges().len(),
        "parsed diagram description"
    );
    Ok(diagram)
}

fn resolve(keys: &HashMap<String, NodeId>, line: usize, key: &str) -> Result<NodeId> {
    keys.get(key).copied().ok_or_else(|| Error::UnknownNode {
        line,
        key: key.to_string(),
    })
}

fn syntax_error(line: usize, text: &str) -> Error {
    let context = if text.chars().count() > 40 {
        format!("{}...", text.chars().take(40).collect::<String>())
    } else {
        text.to_string()
    };
    Error::Syntax { line, context }
}

fn statement(input: &mut &str) -> winnow::Result<Statement> {
    alt((
        header,
        cluster_start,
        ("end", eof).value(Statement::End),
        edge_line.map(Statement::Edge),
        node_line.map(Statement::Node),
    ))
    .parse_next(input)
}

fn header(input: &mut &str) -> winnow::Result<Statement> {
    "diagram".parse_next(input)?;
    space1.parse_next(input)?;
    let name = alt((quoted, bare_word)).parse_next(input)?;
    let direction = opt(preceded(space1, direction)).parse_next(input)?;
    space0.parse_next(input)?;
    Ok(Statement::Header { name, direction })
}

fn cluster_start(input: &mut &str) -> winnow::Result<Statement> {
    "cluster".parse_next(input)?;
    space1.parse_next(input)?;
    let label = alt((quoted, rest.map(|s: &str| s.trim_end().to_string())))
        .verify(|s: &String| !s.is_empty())
        .parse_next(input)?;
    space0.parse_next(input)?;
    Ok(Statement::Cluster(label))
}

fn direction(input: &mut &str) -> winnow::Result<Direction> {
    alt((
        "LR".value(Direction::LeftRight),
        "TD".value(Direction::TopDown),
        "TB".value(Direction::TopDown),
    ))
    .parse_next(input)
}

fn quoted(input: &mut &str) -> winnow::Result<String> {
    delimited('"', take_while(0.., |c: char| c != '"'), '"')
        .map(|s: &str| s.to_string())
        .parse_next(input)
}

fn bare_word(input: &mut &str) -> winnow::Result<String> {
    take_while(1.., |c: char| !c.is_whitespace())
        .map(|s: &str| s.to_string())
        .parse_next(input)
}

const KEYWORDS: [&str; 3] = ["diagram", "cluster", "end"];

fn key(input: &mut &str) -> winnow::Result<String> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_')
        .verify(|k: &str| !KEYWORDS.contains(&k))
        .map(|s: &str| s.to_string())
        .parse_next(input)
}

fn node_line(input: &mut &str) -> winnow::Result<NodeDecl> {
    let key = key.parse_next(input)?;
    let label = opt(bracketed_label).parse_next(input)?;
    let kind = opt(preceded(":::", kind_name)).parse_next(input)?;
    space0.parse_next(input)?;
    Ok(NodeDecl {
        key,
        label,
        kind: kind.unwrap_or(NodeKind::Generic),
    })
}

fn bracketed_label(input: &mut &str) -> winnow::Result<String> {
    "[".parse_next(input)?;
    let text = alt((
        quoted,
        take_while(1.., |c: char| c != ']').map(|s: &str| s.to_string()),
    ))
    .parse_next(input)?;
    "]".parse_next(input)?;
    Ok(text)
}

fn kind_name(input: &mut &str) -> winnow::Result<NodeKind> {
    take_while(1.., |c: char| c.is_alphanumeric())
        .verify_map(NodeKind::from_name)
        .parse_next(input)
}

fn arrow(input: &mut &str) -> winnow::Result<EdgeStyle> {
    alt((
        "-.->".value(EdgeStyle::Dashed),
        "==>".value(EdgeStyle::Bold),
        "-->".value(EdgeStyle::Solid),
    ))
    .parse_next(input)
}

fn edge_label(input: &mut &str) -> winnow::Result<String> {
    delimited('|', take_while(1.., |c: char| c != '|'), '|')
        .map(|s: &str| s.trim().to_string())
        .parse_next(input)
}

fn edge_line(input: &mut &str) -> winnow::Result<EdgeDecl> {
    let from = key.parse_next(input)?;
    space0.parse_next(input)?;
    let style = arrow.parse_next(input)?;
    let label = opt(edge_label).parse_next(input)?;
    space0.parse_next(input)?;
    let to = key.parse_next(input)?;
    space0.parse_next(input)?;
    Ok(EdgeDecl {
        from,
        to,
        label,
        style,
    })
}
