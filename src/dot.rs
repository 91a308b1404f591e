//! Graphviz source output, for feeding the diagram to `dot` directly.

use std::fmt::Write as _;

use crate::diagram::{Diagram, Direction, EdgeStyle, Node};

pub fn render(diagram: &Diagram) -> String {
    let mut out = String::new();
    let rankdir = match diagram.direction() {
        Direction::LeftRight => "LR",
        Direction::TopDown => "TB",
    };

    let _ = writeln!(out, "digraph \"{}\" {{", escape(diagram.name()));
    let _ = writeln!(out, "    rankdir={rankdir};");
    let _ = writeln!(
        out,
        "    label=\"{}\";\n    labelloc=b;\n    fontname=\"Sans-Serif\";",
        escape(diagram.name())
    );
    out.push_str(
        "    node [shape=box, style=\"rounded,filled\", fillcolor=white, fontname=\"Sans-Serif\"];\n",
    );
    out.push_str("    edge [fontname=\"Sans-Serif\", fontsize=10];\n");

    for (i, cluster) in diagram.clusters().iter().enumerate() {
        let _ = writeln!(out, "    subgraph cluster_{i} {{");
        let _ = writeln!(out, "        label=\"{}\";", escape(&cluster.label));
        out.push_str("        style=\"dashed,rounded\";\n");
        for &member in &cluster.members {
            let _ = writeln!(out, "        {}", node_statement(diagram.node(member)));
        }
        out.push_str("    }\n");
    }
    for node in diagram.nodes().iter().filter(|n| n.cluster.is_none()) {
        let _ = writeln!(out, "    {}", node_statement(node));
    }

    for edge in diagram.edges() {
        let mut attrs = Vec::new();
        if let Some(label) = &edge.label {
            attrs.push(format!("label=\"{}\"", escape(label)));
        }
        match edge.style {
            EdgeStyle::Solid => {}
            EdgeStyle::Dashed => attrs.push("style=dashed".to_string()),
            EdgeStyle::Bold => attrs.push("penwidth=2".to_string()),
        }
        let attrs = if attrs.is_empty() {
            String::new()
        } else {
            format!(" [{}]", attrs.join(", "))
        };
        let _ = writeln!(
            out,
            "    n{} -> n{}{attrs};",
            edge.from.index(),
            edge.to.index()
        );
    }

    out.push_str("}\n");
    out
}

fn node_statement(node: &Node) -> String {
    let label = match node.kind.caption() {
        Some(caption) => format!("{}\\n({caption})", escape(&node.label)),
        None => escape(&node.label),
    };
    format!(
        "n{} [label=\"{label}\", tooltip=\"{}\"];",
        node.id.index(),
        node.kind.name()
    )
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out
}
