//! Orthogonal edge routing on the layout grid.
//!
//! A route is a polyline of cells. Its first point is the cell just outside
//! the source box and its last point is the cell just outside the target box,
//! where the arrow head goes.

use tracing::trace;

use crate::diagram::{Diagram, Direction, EdgeStyle, NodeId};
use crate::display_width::display_width;
use crate::layout::{ClusterLayout, NodeLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heading {
    Right,
    Left,
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub row: usize,
    pub col: usize,
}

impl Point {
    fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeLabel {
    pub text: String,
    pub at: Point,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRoute {
    pub from: NodeId,
    pub to: NodeId,
    pub points: Vec<Point>,
    pub exit: Heading,
    pub head: Heading,
    pub style: EdgeStyle,
    pub label: Option<EdgeLabel>,
}

impl EdgeRoute {
    pub fn extent(&self) -> (usize, usize) {
        let mut right = self.points.iter().map(|p| p.col + 1).max().unwrap_or(0);
        let mut bottom = self.points.iter().map(|p| p.row + 1).max().unwrap_or(0);
        if let Some(label) = &self.label {
            right = right.max(label.at.col + display_width(&label.text) + 1);
            bottom = bottom.max(label.at.row + 1);
        }
        (right, bottom)
    }

    pub fn segments(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.points.windows(2).map(|w| (w[0], w[1]))
    }
}

type Path = (Vec<Point>, Heading, Heading);

const CHANNEL_SPACING: usize = 2;

/// Free rows below (left-right) or columns right of (top-down) the content,
/// used by edges whose direct path would cross another box.
struct Channels {
    next_row: usize,
    next_col: usize,
}

impl Channels {
    fn take_row(&mut self) -> usize {
        let row = self.next_row;
        self.next_row += CHANNEL_SPACING;
        row
    }

    fn take_col(&mut self) -> usize {
        let col = self.next_col;
        self.next_col += CHANNEL_SPACING;
        col
    }
}

pub fn route_all(
    diagram: &Diagram,
    nodes: &[NodeLayout],
    clusters: &[ClusterLayout],
    width: usize,
    height: usize,
) -> Vec<EdgeRoute> {
    let mut channels = Channels {
        next_row: height + 1,
        next_col: width + 1,
    };
    let mut routes = Vec::with_capacity(diagram.edges().len());
    let mut placed: Vec<EdgeLabel> = Vec::new();

    for (i, edge) in diagram.edges().iter().enumerate() {
        // Earlier edges between the same pair, either way round.
        let lane = diagram.edges()[..i]
            .iter()
            .filter(|e| {
                (e.from == edge.from && e.to == edge.to) || (e.from == edge.to && e.to == edge.from)
            })
            .count();
        let from = &nodes[edge.from.index()];
        let to = &nodes[edge.to.index()];

        let (points, exit, head) = if edge.from == edge.to {
            self_loop(from)
        } else {
            direct(from, to, lane, clusters)
                .filter(|(points, _, _)| !blocked(points, nodes, edge.from, edge.to))
                .unwrap_or_else(|| detour(from, to, lane, diagram.direction(), &mut channels))
        };
        let points = simplify(points);
        let label = edge.label.as_deref().map(|text| {
            let mut label = place_label(&points, text);
            if !label.inline {
                while label_collides(&label, &placed, nodes, clusters) {
                    label.at.row += 1;
                }
            }
            placed.push(label.clone());
            label
        });

        trace!(
            from = %from.label,
            to = %to.label,
            points = points.len(),
            "routed edge"
        );

        routes.push(EdgeRoute {
            from: edge.from,
            to: edge.to,
            points,
            exit,
            head,
            style: edge.style,
            label,
        });
    }

    routes
}

fn side_row(node: &NodeLayout, lane: usize) -> usize {
    node.y + 1 + lane.min(node.height.saturating_sub(3))
}

fn side_col(node: &NodeLayout, lane: usize) -> usize {
    (node.center_x + 2 * lane).min(node.right() - 2)
}

fn direct(
    from: &NodeLayout,
    to: &NodeLayout,
    lane: usize,
    clusters: &[ClusterLayout],
) -> Option<Path> {
    let (r1, r2) = (side_row(from, lane), side_row(to, lane));
    let (c1, c2) = (side_col(from, lane), side_col(to, lane));

    if to.x > from.right() {
        let path = horizontal_path(r1, from.right(), r2, to.x - 1);
        Some((path, Heading::Right, Heading::Right))
    } else if to.right() < from.x {
        let path = horizontal_path(r1, from.x - 1, r2, to.right());
        Some((path, Heading::Left, Heading::Left))
    } else if to.y > from.bottom() {
        let (upper, lower) = (from.bottom(), to.y - 1);
        let mut jog = (upper + lower) / 2;
        let mut c2 = c2;
        if let Some(cluster) = crossed_title(to, upper, lower, clusters) {
            c2 = clear_of_title(cluster, to, c2, lane);
            jog = jog.min(cluster.y - 1);
        }
        let path = vertical_path(upper, c1, lower, c2, jog);
        Some((path, Heading::Down, Heading::Down))
    } else if to.bottom() < from.y {
        let (upper, lower) = (to.bottom(), from.y - 1);
        let mut jog = (upper + lower) / 2;
        let mut c1 = c1;
        if let Some(cluster) = crossed_title(from, upper, lower, clusters) {
            c1 = clear_of_title(cluster, from, c1, lane);
            jog = jog.min(cluster.y - 1);
        }
        let path = vertical_path(lower, c1, upper, c2, jog);
        Some((path, Heading::Up, Heading::Up))
    } else {
        None
    }
}

fn horizontal_path(r1: usize, c1: usize, r2: usize, c2: usize) -> Vec<Point> {
    if r1 == r2 {
        return vec![Point::new(r1, c1), Point::new(r2, c2)];
    }
    let mid = (c1 + c2) / 2;
    vec![
        Point::new(r1, c1),
        Point::new(r1, mid),
        Point::new(r2, mid),
        Point::new(r2, c2),
    ]
}

fn vertical_path(r1: usize, c1: usize, r2: usize, c2: usize, jog: usize) -> Vec<Point> {
    if c1 == c2 {
        return vec![Point::new(r1, c1), Point::new(r2, c2)];
    }
    vec![
        Point::new(r1, c1),
        Point::new(jog, c1),
        Point::new(jog, c2),
        Point::new(r2, c2),
    ]
}

fn title_span(cluster: &ClusterLayout) -> (usize, usize) {
    (cluster.x + 1, cluster.x + 3 + display_width(&cluster.label))
}

/// The cluster around `node` whose top border lies on a vertical run
/// spanning rows `upper..=lower`.
fn crossed_title<'a>(
    node: &NodeLayout,
    upper: usize,
    lower: usize,
    clusters: &'a [ClusterLayout],
) -> Option<&'a ClusterLayout> {
    clusters.iter().find(|c| {
        c.x < node.x
            && node.right() < c.x + c.width
            && c.y < node.y
            && node.bottom() < c.y + c.height
            && upper < c.y
            && c.y <= lower
    })
}

fn clear_of_title(cluster: &ClusterLayout, node: &NodeLayout, col: usize, lane: usize) -> usize {
    let (lo, hi) = title_span(cluster);
    let moved = hi + 1 + 2 * lane;
    if (lo..=hi).contains(&col) && moved + 2 <= node.right() {
        moved
    } else {
        col
    }
}

fn blocked(points: &[Point], nodes: &[NodeLayout], from: NodeId, to: NodeId) -> bool {
    points.windows(2).any(|w| {
        let rows = (w[0].row.min(w[1].row), w[0].row.max(w[1].row));
        let cols = (w[0].col.min(w[1].col), w[0].col.max(w[1].col));
        nodes
            .iter()
            .filter(|n| n.id != from && n.id != to)
            .any(|n| n.intersects(rows, cols))
    })
}

/// Routes around the content through a dedicated channel. Outgoing and
/// incoming attachments sit on opposite sides of the box center (left-right)
/// or on different rows (top-down) so a node can both send and receive
/// detoured edges.
fn detour(
    from: &NodeLayout,
    to: &NodeLayout,
    lane: usize,
    direction: Direction,
    channels: &mut Channels,
) -> Path {
    match direction {
        Direction::LeftRight => {
            let row = channels.take_row();
            let c1 = from.center_x.saturating_sub(1 + 2 * lane).max(from.x + 1);
            let c2 = (to.center_x + 1 + 2 * lane).min(to.right() - 2);
            let points = vec![
                Point::new(from.bottom(), c1),
                Point::new(row, c1),
                Point::new(row, c2),
                Point::new(to.bottom(), c2),
            ];
            (points, Heading::Down, Heading::Up)
        }
        Direction::TopDown => {
            let col = channels.take_col();
            let r1 = side_row(from, lane);
            let r2 = (to.bottom() - 2).saturating_sub(lane).max(to.y + 1);
            let points = vec![
                Point::new(r1, from.right()),
                Point::new(r1, col),
                Point::new(r2, col),
                Point::new(r2, to.right()),
            ];
            (points, Heading::Right, Heading::Left)
        }
    }
}

fn self_loop(node: &NodeLayout) -> Path {
    let row = side_row(node, 0);
    let col = node.right();
    let points = vec![
        Point::new(row, col),
        Point::new(row, col + 1),
        Point::new(row + 1, col + 1),
        Point::new(row + 1, col),
    ];
    (points, Heading::Right, Heading::Left)
}

fn simplify(points: Vec<Point>) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        if out.last() == Some(&p) {
            continue;
        }
        if let [.., a, b] = out.as_slice() {
            let collinear = (a.row == b.row && b.row == p.row) || (a.col == b.col && b.col == p.col);
            if collinear {
                out.pop();
            }
        }
        out.push(p);
    }
    out
}

fn place_label(points: &[Point], text: &str) -> EdgeLabel {
    let width = display_width(text);
    let longest = points
        .windows(2)
        .max_by_key(|s| s[0].row.abs_diff(s[1].row) + s[0].col.abs_diff(s[1].col));

    let (at, inline) = match longest {
        Some(s) if s[0].row == s[1].row => {
            let lo = s[0].col.min(s[1].col);
            let len = s[0].col.abs_diff(s[1].col) + 1;
            if len >= width + 4 {
                (Point::new(s[0].row, lo + (len - width) / 2), true)
            } else {
                (Point::new(s[0].row.saturating_sub(1), lo), false)
            }
        }
        // Beside the middle of a vertical run.
        Some(s) => {
            let top = s[0].row.min(s[1].row);
            (Point::new(top + s[0].row.abs_diff(s[1].row) / 2, s[0].col + 2), false)
        }
        None => (Point::new(points[0].row, points[0].col + 2), false),
    };

    EdgeLabel {
        text: text.to_string(),
        at,
        inline,
    }
}

fn label_span(label: &EdgeLabel) -> (usize, usize) {
    let width = display_width(&label.text);
    if label.inline {
        (label.at.col.saturating_sub(1), label.at.col + width)
    } else {
        (label.at.col, (label.at.col + width).saturating_sub(1))
    }
}

fn label_collides(
    label: &EdgeLabel,
    placed: &[EdgeLabel],
    nodes: &[NodeLayout],
    clusters: &[ClusterLayout],
) -> bool {
    let (lo, hi) = label_span(label);
    let row = label.at.row;
    let overlaps = |(olo, ohi): (usize, usize)| lo <= ohi + 1 && olo <= hi + 1;
    placed
        .iter()
        .any(|other| other.at.row == row && overlaps(label_span(other)))
        || clusters.iter().any(|c| c.y == row && overlaps(title_span(c)))
        || nodes.iter().any(|n| n.intersects((row, row), (lo, hi)))
}
