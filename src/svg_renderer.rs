//! Standalone SVG output. Grid cells are scaled to pixels; box borders and
//! edge lines run through cell centers so both line up the way they do in the
//! text rendering.

use std::fmt::Write as _;

use crate::diagram::{EdgeStyle, NodeKind};
use crate::display_width::split_lines;
use crate::layout::{ClusterLayout, Layout, NodeLayout};
use crate::routing::{EdgeRoute, Heading, Point};

const CELL_W: f64 = 8.0;
const CELL_H: f64 = 18.0;
const MARGIN: f64 = 20.0;
const TITLE_ROWS: usize = 3;

const EDGE_COLOR: &str = "#5b6b82";
const TEXT_COLOR: &str = "#1f2733";

fn px_x(col: f64) -> f64 {
    MARGIN + (col + 0.5) * CELL_W
}

fn px_y(row: f64) -> f64 {
    MARGIN + (row + 0.5) * CELL_H
}

pub fn render(layout: &Layout) -> String {
    let width = layout.width as f64 * CELL_W + 2.0 * MARGIN;
    let height = (layout.height + TITLE_ROWS) as f64 * CELL_H + 2.0 * MARGIN;

    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.0}" height="{height:.0}" viewBox="0 0 {width:.0} {height:.0}" role="img" aria-label="{}">"#,
        escape_xml(&layout.title)
    );
    let _ = writeln!(out, "<title>{}</title>", escape_xml(&layout.title));
    out.push_str(concat!(
        "<style>",
        "text{font-family:'DejaVu Sans Mono',Menlo,Consolas,monospace;font-size:13px}",
        ".caption{font-size:10px;font-style:italic;fill:#6b7280}",
        ".cluster-title{font-size:12px;font-weight:bold;fill:#4b5563}",
        ".title{font-size:16px;font-weight:bold}",
        "</style>\n"
    ));
    let _ = writeln!(
        out,
        r#"<defs><marker id="arrow" viewBox="0 0 10 10" refX="10" refY="5" markerWidth="8" markerHeight="8" orient="auto-start-reverse"><path d="M0,0 L10,5 L0,10 z" fill="{EDGE_COLOR}"/></marker></defs>"#
    );
    let _ = writeln!(
        out,
        r#"<rect width="100%" height="100%" fill="white"/>"#
    );

    for cluster in &layout.clusters {
        write_cluster(&mut out, cluster);
    }
    for edge in &layout.edges {
        write_edge_line(&mut out, edge);
    }
    for node in &layout.nodes {
        write_node(&mut out, node);
    }
    for edge in &layout.edges {
        write_edge_label(&mut out, edge);
    }

    let _ = writeln!(
        out,
        r#"<text class="title" x="{:.1}" y="{:.1}" text-anchor="middle" fill="{TEXT_COLOR}">{}</text>"#,
        width / 2.0,
        px_y((layout.height + 1) as f64),
        escape_xml(&layout.title)
    );
    out.push_str("</svg>\n");
    out
}

fn write_cluster(out: &mut String, cluster: &ClusterLayout) {
    let x = px_x(cluster.x as f64);
    let y = px_y(cluster.y as f64);
    let w = (cluster.width - 1) as f64 * CELL_W;
    let h = (cluster.height - 1) as f64 * CELL_H;
    let _ = writeln!(
        out,
        r##"<g class="cluster"><rect x="{x:.1}" y="{y:.1}" width="{w:.1}" height="{h:.1}" rx="8" fill="#f4f7fb" stroke="#9aa8bd" stroke-dasharray="6 4"/><text class="cluster-title" x="{:.1}" y="{:.1}" dominant-baseline="central">{}</text></g>"##,
        x + 2.0 * CELL_W,
        y + CELL_H,
        escape_xml(&cluster.label)
    );
}

fn kind_colors(kind: NodeKind) -> (&'static str, &'static str) {
    match kind {
        NodeKind::Api | NodeKind::Deployment | NodeKind::Pod => ("#e6eefc", "#326ce5"),
        NodeKind::Secret => ("#fdf4e3", "#b7791f"),
        NodeKind::Registry => ("#fce8e6", "#c74634"),
        NodeKind::Generic => ("#ffffff", "#4b5563"),
    }
}

fn write_node(out: &mut String, node: &NodeLayout) {
    let (fill, stroke) = kind_colors(node.kind);
    let x = px_x(node.x as f64);
    let y = px_y(node.y as f64);
    let w = (node.width - 1) as f64 * CELL_W;
    let h = (node.height - 1) as f64 * CELL_H;
    let rx = match node.kind {
        NodeKind::Pod | NodeKind::Registry => 10.0,
        _ => 3.0,
    };
    let center = MARGIN + (node.x as f64 + node.width as f64 / 2.0) * CELL_W;

    let _ = write!(
        out,
        r#"<g class="node" data-kind="{}"><rect x="{x:.1}" y="{y:.1}" width="{w:.1}" height="{h:.1}" rx="{rx:.0}" fill="{fill}" stroke="{stroke}" stroke-width="1.5"/>"#,
        node.kind.name()
    );

    let mut row = node.y + 1;
    if let Some(caption) = node.kind.caption() {
        let _ = write!(
            out,
            r#"<text class="caption" x="{center:.1}" y="{:.1}" text-anchor="middle" dominant-baseline="central">{}</text>"#,
            px_y(row as f64),
            escape_xml(caption)
        );
        row += 1;
    }
    for line in split_lines(&node.label) {
        let _ = write!(
            out,
            r#"<text x="{center:.1}" y="{:.1}" text-anchor="middle" dominant-baseline="central" fill="{TEXT_COLOR}">{}</text>"#,
            px_y(row as f64),
            escape_xml(line)
        );
        row += 1;
    }
    out.push_str("</g>\n");
}

fn step(heading: Heading) -> (f64, f64) {
    match heading {
        Heading::Right => (1.0, 0.0),
        Heading::Left => (-1.0, 0.0),
        Heading::Down => (0.0, 1.0),
        Heading::Up => (0.0, -1.0),
    }
}

fn write_edge_line(out: &mut String, edge: &EdgeRoute) {
    let Some((&first, &last)) = edge.points.first().zip(edge.points.last()) else {
        return;
    };

    // Pull both ends onto the box borders.
    let (bx, by) = step(edge.exit);
    let (hx, hy) = step(edge.head);
    let mut coords: Vec<(f64, f64)> = Vec::with_capacity(edge.points.len() + 1);
    coords.push((first.col as f64 - bx, first.row as f64 - by));
    coords.extend(edge.points.iter().map(|p: &Point| (p.col as f64, p.row as f64)));
    coords.push((last.col as f64 + hx, last.row as f64 + hy));

    let points = coords
        .iter()
        .map(|&(c, r)| format!("{:.1},{:.1}", px_x(c), px_y(r)))
        .collect::<Vec<_>>()
        .join(" ");
    let style = match edge.style {
        EdgeStyle::Solid => r#" stroke-width="1.5""#,
        EdgeStyle::Dashed => r#" stroke-width="1.5" stroke-dasharray="5 4""#,
        EdgeStyle::Bold => r#" stroke-width="3""#,
    };
    let _ = writeln!(
        out,
        r#"<polyline class="edge" points="{points}" fill="none" stroke="{EDGE_COLOR}"{style} marker-end="url(#arrow)"/>"#
    );
}

fn write_edge_label(out: &mut String, edge: &EdgeRoute) {
    let Some(label) = &edge.label else {
        return;
    };
    let _ = writeln!(
        out,
        r#"<text class="edge-label" x="{:.1}" y="{:.1}" dominant-baseline="central" fill="{TEXT_COLOR}" stroke="white" stroke-width="4" paint-order="stroke">{}</text>"#,
        MARGIN + label.at.col as f64 * CELL_W,
        px_y(label.at.row as f64),
        escape_xml(&label.text)
    );
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout;
    use crate::parser::parse_diagram;
    use crate::regcred::regcred_injector;
    use pretty_assertions::assert_eq;

    fn render_input(input: &str) -> String {
        let diagram = parse_diagram(input).unwrap();
        render(&layout::compute(&diagram).unwrap())
    }

    #[test]
    fn document_is_a_single_svg_element() {
        let svg = render_input("a\nb\na --> b\n");
        assert!(svg.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(svg.ends_with("</svg>\n"));
        assert_eq!(svg.matches("<svg").count(), 1);
    }

    #[test]
    fn one_group_per_node_and_polyline_per_edge() {
        let svg = render_input("a\nb\nc\na --> b\nb --> c\n");
        assert_eq!(svg.matches(r#"<g class="node""#).count(), 3);
        assert_eq!(svg.matches(r#"<polyline class="edge""#).count(), 2);
        assert_eq!(svg.matches(r#"marker-end="url(#arrow)""#).count(), 2);
    }

    #[test]
    fn labels_are_escaped() {
        let svg = render_input("a[R&D <lab>]\nb\na -->|x > y| b\n");
        assert!(svg.contains("R&amp;D &lt;lab&gt;"));
        assert!(svg.contains("x &gt; y"));
        assert!(!svg.contains("<lab>"));
    }

    #[test]
    fn edge_styles_map_to_stroke_attributes() {
        let dashed = render_input("a\nb\na -.-> b\n");
        assert!(dashed.contains(r#"stroke-dasharray="5 4""#));
        let bold = render_input("a\nb\na ==> b\n");
        assert!(bold.contains(r#"stroke-width="3""#));
    }

    #[test]
    fn edge_ends_touch_box_borders() {
        let diagram = parse_diagram("a\nb\na --> b\n").unwrap();
        let layout = layout::compute(&diagram).unwrap();
        let svg = render(&layout);
        let a = &layout.nodes[0];
        let b = &layout.nodes[1];
        let start = format!("{:.1},", px_x((a.right() - 1) as f64));
        let end = format!("{:.1},", px_x(b.x as f64));
        assert!(svg.contains(&format!(r#"points="{start}"#)), "got:\n{svg}");
        assert!(svg.contains(&format!(" {end}")), "got:\n{svg}");
    }

    #[test]
    fn regcred_svg_contains_every_label_and_cluster() {
        let svg = render(&layout::compute(&regcred_injector().unwrap()).unwrap());
        for label in [
            "Control Plane",
            "DockerHub",
            "regcred-injector",
            "Credential/Certs",
            "new-pod",
            "regcred",
            "1 mutate webhook",
            "4 return mutated response",
            "7 authenticated pull",
        ] {
            assert!(svg.contains(label), "missing `{label}`");
        }
        assert_eq!(svg.matches(r#"<g class="cluster">"#).count(), 2);
        assert!(svg.contains(r#"data-kind="registry""#));
        assert!(svg.contains("<title>regcred-injector</title>"));
    }
}
