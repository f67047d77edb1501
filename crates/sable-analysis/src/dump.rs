use std::fmt::Write as _;

use sable_ir::EdgeKind;

/// Which rendering of the analyzed CFGs a run should produce.
///
/// The engine renders DOT itself; the GraphML and HTML variants are emitted
/// as [`SerializableGraph`]s for an external serializer, subnode variants
/// additionally carrying expression subtrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisGraphs {
    #[default]
    None,
    Dot,
    Graphml,
    GraphmlWithSubnodes,
    Html,
    HtmlWithSubnodes,
}

impl AnalysisGraphs {
    pub fn is_none(self) -> bool {
        self == AnalysisGraphs::None
    }
}

/// One node of the exported graph schema.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerializableNode {
    pub id: usize,
    pub label: String,
    /// Rendering of the post-state, when states are exported.
    pub state: Option<String>,
}

/// One typed edge of the exported graph schema.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerializableEdge {
    pub src: usize,
    pub dst: usize,
    pub kind: EdgeKind,
}

/// Frontend-agnostic dump of one (possibly analyzed) CFG.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerializableGraph {
    pub name: String,
    pub nodes: Vec<SerializableNode>,
    pub edges: Vec<SerializableEdge>,
}

impl SerializableGraph {
    pub fn new(name: impl Into<String>) -> Self {
        SerializableGraph {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn push_node(&mut self, id: usize, label: impl Into<String>, state: Option<String>) {
        self.nodes.push(SerializableNode {
            id,
            label: label.into(),
            state,
        });
    }

    pub fn push_edge(&mut self, src: usize, dst: usize, kind: EdgeKind) {
        self.edges.push(SerializableEdge { src, dst, kind });
    }

    /// Render as a DOT digraph, branch edges labeled with their condition.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph \"{}\" {{", escape(&self.name));
        let _ = writeln!(out, "  node [shape=box];");
        for node in &self.nodes {
            let label = match &node.state {
                Some(state) => format!("{}\\n{}", escape(&node.label), escape(state)),
                None => escape(&node.label),
            };
            let _ = writeln!(out, "  n{} [label=\"{}\"];", node.id, label);
        }
        for edge in &self.edges {
            let attrs = match edge.kind {
                EdgeKind::Sequential => String::new(),
                EdgeKind::TrueBranch => " [label=\"true\", color=blue]".to_owned(),
                EdgeKind::FalseBranch => " [label=\"false\", color=red]".to_owned(),
            };
            let _ = writeln!(out, "  n{} -> n{}{};", edge.src, edge.dst, attrs);
        }
        let _ = writeln!(out, "}}");
        out
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// A graph as delivered in the analysis report.
#[derive(Debug, Clone)]
pub enum RenderedGraph {
    /// Fully rendered DOT text.
    Dot { name: String, content: String },
    /// Schema-level dump for external GraphML/HTML serializers.
    Structured(SerializableGraph),
}

impl RenderedGraph {
    pub fn name(&self) -> &str {
        match self {
            RenderedGraph::Dot { name, .. } => name,
            RenderedGraph::Structured(graph) => &graph.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_rendering_includes_typed_edges() {
        let mut graph = SerializableGraph::new("f");
        graph.push_node(0, "x < 10", None);
        graph.push_node(1, "x = x + 1", Some("{x -> [0, 10]}".to_owned()));
        graph.push_node(2, "return x", None);
        graph.push_edge(0, 1, EdgeKind::TrueBranch);
        graph.push_edge(0, 2, EdgeKind::FalseBranch);
        graph.push_edge(1, 0, EdgeKind::Sequential);
        let dot = graph.to_dot();
        assert!(dot.contains("digraph \"f\""));
        assert!(dot.contains("n0 -> n1 [label=\"true\", color=blue];"));
        assert!(dot.contains("n0 -> n2 [label=\"false\", color=red];"));
        assert!(dot.contains("n1 -> n0;"));
        assert!(dot.contains("{x -> [0, 10]}"));
    }
}
