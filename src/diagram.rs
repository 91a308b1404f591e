//! In-memory diagram model. Edges refer to nodes through the [`NodeId`]
//! handles handed out by [`DiagramBuilder::node`]; [`DiagramBuilder::build`]
//! rejects handles that belong to another builder.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    LeftRight,
    TopDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterId(usize);

impl ClusterId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Api,
    Registry,
    Deployment,
    Pod,
    Secret,
    Generic,
}

impl NodeKind {
    pub fn caption(self) -> Option<&'static str> {
        match self {
            NodeKind::Api => Some("k8s api"),
            NodeKind::Registry => Some("oci registry"),
            NodeKind::Deployment => Some("k8s deploy"),
            NodeKind::Pod => Some("k8s pod"),
            NodeKind::Secret => Some("k8s secret"),
            NodeKind::Generic => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Api => "api",
            NodeKind::Registry => "registry",
            NodeKind::Deployment => "deployment",
            NodeKind::Pod => "pod",
            NodeKind::Secret => "secret",
            NodeKind::Generic => "generic",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "api" => Some(NodeKind::Api),
            "registry" | "ocir" => Some(NodeKind::Registry),
            "deployment" | "deploy" => Some(NodeKind::Deployment),
            "pod" => Some(NodeKind::Pod),
            "secret" => Some(NodeKind::Secret),
            "generic" => Some(NodeKind::Generic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeStyle {
    #[default]
    Solid,
    Dashed,
    Bold,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub kind: NodeKind,
    pub cluster: Option<ClusterId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: ClusterId,
    pub label: String,
    pub members: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub label: Option<String>,
    pub style: EdgeStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagram {
    name: String,
    direction: Direction,
    nodes: Vec<Node>,
    clusters: Vec<Cluster>,
    edges: Vec<Edge>,
}

impl Diagram {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// File name stem for rendered output: whitespace runs become `_`, then
    /// the whole name is lowercased.
    pub fn file_stem(&self) -> String {
        let stem = self
            .name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase();
        if stem.is_empty() {
            "diagram".to_string()
        } else {
            stem
        }
    }
}

#[derive(Debug)]
pub struct DiagramBuilder {
    diagram: Diagram,
    current_cluster: Option<ClusterId>,
}

impl DiagramBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            diagram: Diagram {
                name: name.into(),
                direction: Direction::default(),
                nodes: Vec::new(),
                clusters: Vec::new(),
                edges: Vec::new(),
            },
            current_cluster: None,
        }
    }

    pub fn direction(&mut self, direction: Direction) -> &mut Self {
        self.diagram.direction = direction;
        self
    }

    /// Declare a node. Inside a [`cluster`](Self::cluster) scope the node
    /// becomes a member of that cluster.
    pub fn node(&mut self, kind: NodeKind, label: impl Into<String>) -> NodeId {
        let id = NodeId(self.diagram.nodes.len());
        self.diagram.nodes.push(Node {
            id,
            label: label.into(),
            kind,
            cluster: self.current_cluster,
        });
        if let Some(cluster) = self.current_cluster {
            self.diagram.clusters[cluster.0].members.push(id);
        }
        id
    }

    pub fn cluster<T>(
        &mut self,
        label: impl Into<String>,
        f: impl FnOnce(&mut Self) -> T,
    ) -> Result<T> {
        let label = label.into();
        if let Some(outer) = self.current_cluster {
            return Err(Error::NestedCluster {
                outer: self.diagram.clusters[outer.0].label.clone(),
                inner: label,
            });
        }
        self.open_cluster(label);
        let value = f(self);
        self.close_cluster();
        Ok(value)
    }

    pub(crate) fn open_cluster(&mut self, label: String) {
        let id = ClusterId(self.diagram.clusters.len());
        self.diagram.clusters.push(Cluster {
            id,
            label,
            members: Vec::new(),
        });
        self.current_cluster = Some(id);
    }

    pub(crate) fn close_cluster(&mut self) {
        self.current_cluster = None;
    }

    pub(crate) fn current_cluster_label(&self) -> Option<&str> {
        self.current_cluster
            .map(|id| self.diagram.clusters[id.0].label.as_str())
    }

    pub fn edge(&mut self, from: NodeId, to: NodeId, label: impl Into<String>) -> &mut Self {
        self.styled_edge(from, to, Some(label.into()), EdgeStyle::Solid)
    }

    pub fn styled_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        label: Option<String>,
        style: EdgeStyle,
    ) -> &mut Self {
        self.diagram.edges.push(Edge {
            from,
            to,
            label,
            style,
        });
        self
    }

    pub fn build(self) -> Result<Diagram> {
        let nodes = self.diagram.nodes.len();
        if let Some(edge) = self
            .diagram
            .edges
            .iter()
            .find(|e| e.from.0 >= nodes || e.to.0 >= nodes)
        {
            return Err(Error::DanglingEdge {
                from: edge.from.0,
                to: edge.to.0,
                nodes,
            });
        }
        Ok(self.diagram)
    }
}
