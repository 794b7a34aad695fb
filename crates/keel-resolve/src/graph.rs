//! Resolved dependency graph storage and the visit driver.

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactSet;
use crate::component::ComponentId;
use crate::error::ResolveError;
use crate::metadata::ConfigurationMetadata;
use crate::visitor::{DependencyArtifactsVisitor, DependencyGraphVisitor};

/// Index of a node within one [`ResolvedGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One resolved configuration in the graph.
///
/// Nodes are created during graph resolution and never mutated after the
/// visitors have run.
#[derive(Debug)]
pub struct DependencyGraphNode {
    id: NodeId,
    component: ComponentId,
    metadata: ConfigurationMetadata,
    outgoing: Vec<DependencyGraphEdge>,
}

impl DependencyGraphNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn component(&self) -> &ComponentId {
        &self.component
    }

    pub fn metadata(&self) -> &ConfigurationMetadata {
        &self.metadata
    }

    pub fn outgoing_edges(&self) -> &[DependencyGraphEdge] {
        &self.outgoing
    }
}

/// A directed edge between two resolved nodes.
///
/// An edge optionally carries the failure that prevented its target from
/// resolving. Each edge is presented to visitors exactly once per resolve,
/// so a failure is counted by exactly one aggregation pass.
#[derive(Debug)]
pub struct DependencyGraphEdge {
    target: NodeId,
    failure: Option<ResolveError>,
    artifacts: Option<ArtifactSet>,
}

impl DependencyGraphEdge {
    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn failure(&self) -> Option<&ResolveError> {
        self.failure.as_ref()
    }

    pub fn artifacts(&self) -> Option<&ArtifactSet> {
        self.artifacts.as_ref()
    }
}

/// An immutable resolved graph plus the walk driver feeding visitors.
///
/// The first node added becomes the root.
#[derive(Debug, Default)]
pub struct ResolvedGraph {
    nodes: Vec<DependencyGraphNode>,
}

impl ResolvedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, component: ComponentId, metadata: ConfigurationMetadata) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(DependencyGraphNode {
            id,
            component,
            metadata,
            outgoing: Vec::new(),
        });
        id
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.push_edge(from, to, None, None);
    }

    pub fn add_artifact_edge(&mut self, from: NodeId, to: NodeId, artifacts: ArtifactSet) {
        self.push_edge(from, to, None, Some(artifacts));
    }

    pub fn add_failed_edge(&mut self, from: NodeId, to: NodeId, failure: ResolveError) {
        self.push_edge(from, to, Some(failure), None);
    }

    fn push_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        failure: Option<ResolveError>,
        artifacts: Option<ArtifactSet>,
    ) {
        self.nodes[from.0].outgoing.push(DependencyGraphEdge {
            target: to,
            failure,
            artifacts,
        });
    }

    pub fn node(&self, id: NodeId) -> &DependencyGraphNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walk the graph, feeding callbacks in the contract order.
    pub fn visit<V>(&self, visitor: &mut V)
    where
        V: DependencyGraphVisitor + DependencyArtifactsVisitor,
    {
        let Some(root) = self.nodes.first() else {
            return;
        };
        visitor.start(root);
        for node in &self.nodes {
            visitor.visit_node(node);
        }
        for node in &self.nodes {
            visitor.visit_edge(node);
        }
        for node in &self.nodes {
            for edge in &node.outgoing {
                if let Some(artifacts) = &edge.artifacts {
                    visitor.visit_artifacts(node, self.node(edge.target), artifacts);
                }
            }
        }
        visitor.finish_artifacts();
        visitor.finish(root);
    }
}
