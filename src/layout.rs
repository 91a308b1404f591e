//! Places nodes and clusters on a character-cell grid.
//!
//! The grid is shared by every renderer: the text renderer draws it cell by
//! cell, the SVG renderer scales it to pixels.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::diagram::{Diagram, Direction, NodeId, NodeKind};
use crate::display_width::{display_width, line_count, multiline_width};
use crate::error::{Error, Result};
use crate::routing::{self, EdgeRoute};

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub title: String,
    pub direction: Direction,
    pub nodes: Vec<NodeLayout>,
    pub clusters: Vec<ClusterLayout>,
    pub edges: Vec<EdgeRoute>,
    pub width: usize,
    pub height: usize,
}

impl Layout {
    pub fn node(&self, id: NodeId) -> &NodeLayout {
        &self.nodes[id.index()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeLayout {
    pub id: NodeId,
    pub label: String,
    pub kind: NodeKind,
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    pub center_x: usize,
}

impl NodeLayout {
    fn new(id: NodeId, label: &str, kind: NodeKind) -> Self {
        let width = box_width(label, kind);
        let height = box_height(label, kind);
        Self {
            id,
            label: label.to_string(),
            kind,
            x: 0,
            y: 0,
            width,
            height,
            center_x: width / 2,
        }
    }

    fn shift(&mut self, dx: usize, dy: usize) {
        self.x += dx;
        self.y += dy;
        self.center_x += dx;
    }

    pub fn right(&self) -> usize {
        self.x + self.width
    }

    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    pub fn intersects(&self, rows: (usize, usize), cols: (usize, usize)) -> bool {
        rows.0 < self.bottom() && rows.1 >= self.y && cols.0 < self.right() && cols.1 >= self.x
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterLayout {
    pub label: String,
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

const BOX_PAD: usize = 4;
const LR_RANK_GAP: usize = 5;
const LR_NODE_VERTICAL_GAP: usize = 2;
const TD_RANK_GAP: usize = 3;
const TD_NODE_GAP: usize = 3;
const GROUP_GAP: usize = 4;

const CLUSTER_PAD_X: usize = 2;
const CLUSTER_PAD_TOP: usize = 2;
const CLUSTER_PAD_BOTTOM: usize = 2;
const CLUSTER_TITLE_DECOR: usize = 6;

/// Room an edge label needs between two boxes: the text, a blank on each
/// side, the arrow head and one line cell on each end.
const LABEL_MARGIN: usize = 6;

pub fn compute(diagram: &Diagram) -> Result<Layout> {
    if diagram.nodes().is_empty() {
        return Err(Error::EmptyDiagram);
    }

    let edges: Vec<(usize, usize)> = diagram
        .edges()
        .iter()
        .map(|e| (e.from.index(), e.to.index()))
        .collect();
    let all: Vec<usize> = (0..diagram.nodes().len()).collect();
    let global_ranks = assign_ranks(&all, &edges);
    let groups = order_groups(diagram, &global_ranks);
    let has_clusters = groups.iter().any(|g| g.cluster.is_some());
    let direction = diagram.direction();

    let mut nodes: Vec<NodeLayout> = diagram
        .nodes()
        .iter()
        .map(|n| NodeLayout::new(n.id, &n.label, n.kind))
        .collect();
    let mut clusters = Vec::new();
    let mut cursor = 0;

    for (i, group) in groups.iter().enumerate() {
        let extent = place_members(diagram, &group.members, &edges, &mut nodes);

        let main_extent = match group.cluster {
            Some(cluster) => {
                let label = &diagram.clusters()[cluster].label;
                let width = (extent.0 + 2 * CLUSTER_PAD_X)
                    .max(display_width(label) + CLUSTER_TITLE_DECOR);
                let height = extent.1 + CLUSTER_PAD_TOP + CLUSTER_PAD_BOTTOM;
                let (x, y) = origin(direction, cursor, 0);
                for &m in &group.members {
                    nodes[m].shift(x + CLUSTER_PAD_X, y + CLUSTER_PAD_TOP);
                }
                clusters.push(ClusterLayout {
                    label: label.clone(),
                    x,
                    y,
                    width,
                    height,
                });
                main_axis(direction, width, height)
            }
            None => {
                let cross = match (has_clusters, direction) {
                    (false, _) => 0,
                    (true, Direction::LeftRight) => CLUSTER_PAD_TOP,
                    (true, Direction::TopDown) => CLUSTER_PAD_X,
                };
                let (x, y) = origin(direction, cursor, cross);
                for &m in &group.members {
                    nodes[m].shift(x, y);
                }
                main_axis(direction, extent.0, extent.1)
            }
        };

        let gap = match groups.get(i + 1) {
            Some(next) => group_gap(diagram, direction, &group.members, &next.members),
            None => 0,
        };
        cursor += main_extent + gap;
    }

    let mut width = nodes.iter().map(NodeLayout::right).max().unwrap_or(0);
    let mut height = nodes.iter().map(NodeLayout::bottom).max().unwrap_or(0);
    for c in &clusters {
        width = width.max(c.x + c.width);
        height = height.max(c.y + c.height);
    }

    let edges = routing::route_all(diagram, &nodes, &clusters, width, height);
    for route in &edges {
        let (right, bottom) = route.extent();
        width = width.max(right);
        height = height.max(bottom);
    }

    debug!(
        name = diagram.name(),
        width,
        height,
        groups = groups.len(),
        "computed layout"
    );

    Ok(Layout {
        title: diagram.name().to_string(),
        direction,
        nodes,
        clusters,
        edges,
        width,
        height,
    })
}

fn origin(direction: Direction, main: usize, cross: usize) -> (usize, usize) {
    match direction {
        Direction::LeftRight => (main, cross),
        Direction::TopDown => (cross, main),
    }
}

fn main_axis(direction: Direction, width: usize, height: usize) -> usize {
    match direction {
        Direction::LeftRight => width,
        Direction::TopDown => height,
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Group {
    cluster: Option<usize>,
    members: Vec<usize>,
}

/// Each cluster and each bare node forms a group. Groups follow the flow:
/// ordered by the lowest rank among their members, then declaration order.
fn order_groups(diagram: &Diagram, ranks: &HashMap<usize, usize>) -> Vec<Group> {
    let mut groups: Vec<Group> = diagram
        .clusters()
        .iter()
        .filter(|c| !c.members.is_empty())
        .map(|c| Group {
            cluster: Some(c.id.index()),
            members: c.members.iter().map(|m| m.index()).collect(),
        })
        .collect();
    groups.extend(
        diagram
            .nodes()
            .iter()
            .filter(|n| n.cluster.is_none())
            .map(|n| Group {
                cluster: None,
                members: vec![n.id.index()],
            }),
    );

    groups.sort_by_key(|g| {
        let min_rank = g.members.iter().map(|m| ranks[m]).min().unwrap_or(0);
        (min_rank, g.members[0])
    });
    groups
}

fn group_gap(diagram: &Diagram, direction: Direction, a: &[usize], b: &[usize]) -> usize {
    if direction == Direction::TopDown {
        return TD_RANK_GAP;
    }
    diagram
        .edges()
        .iter()
        .filter(|e| {
            let (f, t) = (e.from.index(), e.to.index());
            (a.contains(&f) && b.contains(&t)) || (b.contains(&f) && a.contains(&t))
        })
        .filter_map(|e| e.label.as_deref().map(label_span))
        .max()
        .unwrap_or(0)
        .max(GROUP_GAP)
}

fn label_span(label: &str) -> usize {
    display_width(label) + LABEL_MARGIN
}

fn place_members(
    diagram: &Diagram,
    members: &[usize],
    edges: &[(usize, usize)],
    nodes: &mut [NodeLayout],
) -> (usize, usize) {
    let ranks = assign_ranks(members, edges);
    let max_rank = ranks.values().copied().max().unwrap_or(0);
    let mut ranks_nodes: Vec<Vec<usize>> = vec![Vec::new(); max_rank + 1];
    for &m in members {
        ranks_nodes[ranks[&m]].push(m);
    }

    match diagram.direction() {
        Direction::LeftRight => layout_lr(diagram, &ranks_nodes, &ranks, nodes),
        Direction::TopDown => layout_td(&ranks_nodes, nodes),
    }

    let width = members.iter().map(|&m| nodes[m].right()).max().unwrap_or(0);
    let height = members.iter().map(|&m| nodes[m].bottom()).max().unwrap_or(0);
    (width, height)
}

fn layout_lr(
    diagram: &Diagram,
    ranks_nodes: &[Vec<usize>],
    ranks: &HashMap<usize, usize>,
    nodes: &mut [NodeLayout],
) {
    let mut rank_x = 0;

    for (rank, rank_nodes) in ranks_nodes.iter().enumerate() {
        let rank_max_width = rank_nodes.iter().map(|&n| nodes[n].width).max().unwrap_or(0);
        let mut y = 0;

        for &n in rank_nodes {
            nodes[n].shift(rank_x, y);
            y += nodes[n].height + LR_NODE_VERTICAL_GAP;
        }

        if rank + 1 < ranks_nodes.len() {
            let label_gap = diagram
                .edges()
                .iter()
                .filter(|e| {
                    let pair = (ranks.get(&e.from.index()), ranks.get(&e.to.index()));
                    pair == (Some(&rank), Some(&(rank + 1)))
                        || pair == (Some(&(rank + 1)), Some(&rank))
                })
                .filter_map(|e| e.label.as_deref().map(label_span))
                .max()
                .unwrap_or(0);
            rank_x += rank_max_width + LR_RANK_GAP.max(label_gap);
        }
    }
}

fn layout_td(ranks_nodes: &[Vec<usize>], nodes: &mut [NodeLayout]) {
    let rank_widths: Vec<usize> = ranks_nodes
        .iter()
        .map(|rank_nodes| {
            rank_nodes.iter().map(|&n| nodes[n].width).sum::<usize>()
                + rank_nodes.len().saturating_sub(1) * TD_NODE_GAP
        })
        .collect();
    let max_width = rank_widths.iter().copied().max().unwrap_or(0);

    let mut y = 0;
    for (rank, rank_nodes) in ranks_nodes.iter().enumerate() {
        let mut x = (max_width - rank_widths[rank]) / 2;
        let rank_height = rank_nodes.iter().map(|&n| nodes[n].height).max().unwrap_or(0);

        for &n in rank_nodes {
            nodes[n].shift(x, y);
            x += nodes[n].width + TD_NODE_GAP;
        }

        y += rank_height + TD_RANK_GAP;
    }
}

fn box_width(label: &str, kind: NodeKind) -> usize {
    let caption = kind.caption().map(display_width).unwrap_or(0);
    multiline_width(label).max(caption) + BOX_PAD
}

fn box_height(label: &str, kind: NodeKind) -> usize {
    let caption = usize::from(kind.caption().is_some());
    2 + caption + line_count(label)
}

/// Longest-path ranks over the edges between `members`. Edges that close a
/// cycle during a declaration-order DFS are ignored.
fn assign_ranks(members: &[usize], edges: &[(usize, usize)]) -> HashMap<usize, usize> {
    let in_group: HashSet<usize> = members.iter().copied().collect();
    let local: Vec<(usize, usize)> = edges
        .iter()
        .copied()
        .filter(|(a, b)| in_group.contains(a) && in_group.contains(b))
        .collect();

    let mut preds: HashMap<usize, Vec<usize>> = HashMap::new();
    for (a, b) in break_cycles(members, &local) {
        preds.entry(b).or_default().push(a);
    }

    let mut ranks = HashMap::new();
    for &m in members {
        compute_rank(m, &preds, &mut ranks);
    }
    ranks
}

fn compute_rank(id: usize, preds: &HashMap<usize, Vec<usize>>, ranks: &mut HashMap<usize, usize>) {
    let mut stack = vec![id];
    while let Some(&n) = stack.last() {
        if ranks.contains_key(&n) {
            stack.pop();
            continue;
        }
        let ps = preds.get(&n).map(Vec::as_slice).unwrap_or_default();
        let pending: Vec<usize> = ps.iter().copied().filter(|p| !ranks.contains_key(p)).collect();
        if pending.is_empty() {
            let rank = ps.iter().map(|p| ranks[p] + 1).max().unwrap_or(0);
            ranks.insert(n, rank);
            stack.pop();
        } else {
            stack.extend(pending);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mark {
    Active,
    Done,
}

fn break_cycles(members: &[usize], edges: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut out: HashMap<usize, Vec<usize>> = HashMap::new();
    for &(a, b) in edges {
        out.entry(a).or_default().push(b);
    }

    let mut marks = HashMap::new();
    let mut kept = Vec::new();
    for &m in members {
        if marks.contains_key(&m) {
            continue;
        }
        marks.insert(m, Mark::Active);
        let mut stack = vec![(m, 0)];
        while let Some(top) = stack.last_mut() {
            let n = top.0;
            let Some(&b) = out.get(&n).and_then(|succ| succ.get(top.1)) else {
                marks.insert(n, Mark::Done);
                stack.pop();
                continue;
            };
            top.1 += 1;
            match marks.get(&b) {
                Some(Mark::Active) => {}
                Some(Mark::Done) => kept.push((n, b)),
                None => {
                    kept.push((n, b));
                    marks.insert(b, Mark::Active);
                    stack.push((b, 0));
                }
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::DiagramBuilder;
    use crate::parser::parse_diagram;
    use crate::regcred::regcred_injector;
    use pretty_assertions::assert_eq;

    #[test]
    fn rank_linear_chain() {
        let ranks = assign_ranks(&[0, 1, 2], &[(0, 1), (1, 2)]);
        assert_eq!(ranks[&0], 0);
        assert_eq!(ranks[&1], 1);
        assert_eq!(ranks[&2], 2);
    }

    #[test]
    fn rank_fan_in_takes_longest_path() {
        let ranks = assign_ranks(&[0, 1, 2], &[(0, 1), (1, 2), (0, 2)]);
        assert_eq!(ranks[&2], 2);
    }

    #[test]
    fn rank_two_cycle_keeps_first_declared_on_top() {
        let ranks = assign_ranks(&[0, 1], &[(0, 1), (1, 0)]);
        assert_eq!(ranks[&0], 0);
        assert_eq!(ranks[&1], 1);
    }

    #[test]
    fn rank_self_loop_and_long_cycle_terminate() {
        let ranks = assign_ranks(&[0, 1, 2], &[(0, 0), (0, 1), (1, 2), (2, 0)]);
        assert_eq!(ranks[&0], 0);
        assert_eq!(ranks[&1], 1);
        assert_eq!(ranks[&2], 2);
    }

    #[test]
    fn rank_very_long_chain() {
        let n = 200_000;
        let members: Vec<usize> = (0..n).collect();
        let mut edges: Vec<(usize, usize)> = (1..n).map(|i| (i - 1, i)).collect();
        edges.push((n - 1, 0));
        let ranks = assign_ranks(&members, &edges);
        assert_eq!(ranks[&0], 0);
        assert_eq!(ranks[&(n - 1)], n - 1);
    }

    #[test]
    fn rank_ignores_edges_leaving_the_group() {
        let ranks = assign_ranks(&[1, 2], &[(0, 1), (1, 2)]);
        assert_eq!(ranks.len(), 2);
        assert_eq!(ranks[&1], 0);
        assert_eq!(ranks[&2], 1);
    }

    #[test]
    fn empty_diagram_is_rejected() {
        let d = DiagramBuilder::new("empty").build().unwrap();
        assert!(matches!(compute(&d), Err(Error::EmptyDiagram)));
    }

    #[test]
    fn box_dimensions_include_caption_row() {
        let d = parse_diagram("a[Hello World]:::pod\nb[Hello]\n").unwrap();
        let layout = compute(&d).unwrap();
        let a = &layout.nodes[0];
        let b = &layout.nodes[1];
        assert_eq!(a.width, "Hello World".len() + 4);
        assert_eq!(a.height, 4);
        assert_eq!(b.height, 3);
    }

    #[test]
    fn caption_wider_than_label_sets_width() {
        let d = parse_diagram("a[x]:::registry\n").unwrap();
        let layout = compute(&d).unwrap();
        assert_eq!(layout.nodes[0].width, "oci registry".len() + 4);
    }

    #[test]
    fn lr_chain_advances_along_x() {
        let d = parse_diagram("cluster g\na\nb\nend\na --> b\n").unwrap();
        let layout = compute(&d).unwrap();
        let a = &layout.nodes[0];
        let b = &layout.nodes[1];
        assert!(b.x > a.right(), "b should be right of a");
        assert_eq!(a.y, b.y);
    }

    #[test]
    fn td_chain_advances_along_y() {
        let d = parse_diagram("diagram t TD\ncluster g\na\nb\nend\na --> b\n").unwrap();
        let layout = compute(&d).unwrap();
        let a = &layout.nodes[0];
        let b = &layout.nodes[1];
        assert!(b.y > a.bottom(), "b should be below a");
        assert_eq!(a.center_x, b.center_x);
    }

    #[test]
    fn labelled_rank_gap_fits_the_label() {
        let d = parse_diagram("cluster g\na\nb\nend\na -->|a rather long label| b\n").unwrap();
        let layout = compute(&d).unwrap();
        let gap = layout.nodes[1].x - layout.nodes[0].right();
        assert!(gap >= "a rather long label".len() + 4, "gap {gap} too small");
    }

    #[test]
    fn regcred_groups_follow_the_flow() {
        let layout = compute(&regcred_injector().unwrap()).unwrap();
        let x_of = |label: &str| layout.nodes.iter().find(|n| n.label == label).unwrap().x;

        assert!(x_of("Control Plane") < x_of("regcred-injector"));
        assert!(x_of("regcred-injector") < x_of("Credential/Certs"));
        assert!(x_of("Credential/Certs") < x_of("new-pod"));
        assert!(x_of("regcred") < x_of("DockerHub"));
    }

    #[test]
    fn regcred_clusters_contain_members_and_do_not_overlap() {
        let d = regcred_injector().unwrap();
        let layout = compute(&d).unwrap();
        assert_eq!(layout.clusters.len(), 2);

        for (cluster, decl) in layout.clusters.iter().zip(d.clusters()) {
            assert_eq!(cluster.label, decl.label);
            for &m in &decl.members {
                let n = layout.node(m);
                assert!(n.x > cluster.x, "{} left of cluster", n.label);
                assert!(n.right() < cluster.x + cluster.width, "{} right", n.label);
                assert!(n.y > cluster.y, "{} above cluster", n.label);
                assert!(n.bottom() < cluster.y + cluster.height, "{} below", n.label);
            }
        }

        let (a, b) = (&layout.clusters[0], &layout.clusters[1]);
        assert!(a.x + a.width <= b.x || b.x + b.width <= a.x, "clusters overlap");
    }

    #[test]
    fn bare_nodes_align_with_clustered_nodes() {
        let layout = compute(&regcred_injector().unwrap()).unwrap();
        let y_of = |label: &str| layout.nodes.iter().find(|n| n.label == label).unwrap().y;
        assert_eq!(y_of("Control Plane"), y_of("regcred-injector"));
        assert_eq!(y_of("DockerHub"), y_of("new-pod"));
    }

    #[test]
    fn no_two_boxes_overlap() {
        let layout = compute(&regcred_injector().unwrap()).unwrap();
        for (i, a) in layout.nodes.iter().enumerate() {
            for b in &layout.nodes[i + 1..] {
                assert!(
                    !a.intersects((b.y, b.bottom() - 1), (b.x, b.right() - 1)),
                    "{} overlaps {}",
                    a.label,
                    b.label
                );
            }
        }
    }

    #[test]
    fn extent_covers_everything() {
        let layout = compute(&regcred_injector().unwrap()).unwrap();
        for n in &layout.nodes {
            assert!(n.right() <= layout.width && n.bottom() <= layout.height);
        }
        for e in &layout.edges {
            for p in &e.points {
                assert!(p.col < layout.width && p.row < layout.height);
            }
        }
    }
}
