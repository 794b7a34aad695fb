//! The traversal contract for resolved dependency graphs.
//!
//! A graph walker drives these callbacks in a fixed order: `start(root)`
//! once, then `visit_node` for every node, then `visit_edge` for every node,
//! then `visit_artifacts` for every artifact-bearing edge, then
//! `finish_artifacts` once all artifact sets are known, then `finish(root)`.

use crate::artifact::ArtifactSet;
use crate::graph::DependencyGraphNode;

/// Receives node and edge callbacks while a resolved graph is walked.
pub trait DependencyGraphVisitor {
    fn start(&mut self, root: &DependencyGraphNode) {
        let _ = root;
    }

    fn visit_node(&mut self, node: &DependencyGraphNode) {
        let _ = node;
    }

    fn visit_edge(&mut self, node: &DependencyGraphNode) {
        let _ = node;
    }

    fn finish(&mut self, root: &DependencyGraphNode) {
        let _ = root;
    }
}

/// Receives the artifact sets attached to graph edges.
pub trait DependencyArtifactsVisitor {
    fn visit_artifacts(
        &mut self,
        from: &DependencyGraphNode,
        to: &DependencyGraphNode,
        artifacts: &ArtifactSet,
    ) {
        let _ = (from, to, artifacts);
    }

    fn finish_artifacts(&mut self) {}
}
