//! topology.rs
//! Parameter dependency graph: cycle detection and evaluation order.

use super::identifiers::scan_identifiers;
use crate::model::Parameter;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::fmt;

/// A dependency cycle, listed from its first member back around to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub members: Vec<String>,
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut path = self.members.clone();
        if let Some(first) = self.members.first() {
            path.push(first.clone());
        }
        write!(f, "{}", path.join(" -> "))
    }
}

/// Edges point from a parameter to the parameters its formula references.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn build(parameters: &[Parameter]) -> Self {
        let mut deps = Self::default();
        for p in parameters {
            if !deps.index.contains_key(&p.name) {
                let idx = deps.graph.add_node(p.name.clone());
                deps.index.insert(p.name.clone(), idx);
            }
        }

        for p in parameters {
            let Some(formula) = p.formula_text() else { continue };
            let from = deps.index[&p.name];
            for name in scan_identifiers(formula) {
                if let Some(&to) = deps.index.get(&name) {
                    deps.graph.update_edge(from, to, ());
                }
            }
        }
        deps
    }

    pub fn detect_cycle(&self) -> Result<(), Cycle> {
        self.evaluation_order().map(|_| ())
    }

    /// Every parameter after the parameters it depends on.
    /// Fails with the first cycle found, in declaration order.
    pub fn evaluation_order(&self) -> Result<Vec<String>, Cycle> {
        let count = self.graph.node_count();
        let mut state = vec![VisitState::None; count];
        let mut order = Vec::with_capacity(count);

        for root in self.graph.node_indices() {
            if state[root.index()] == VisitState::None {
                self.visit(root, &mut state, &mut order)?;
            }
        }
        Ok(order.into_iter().map(|idx| self.graph[idx].clone()).collect())
    }

    // Depth-first with an explicit stack; the frames double as the current path.
    fn visit(&self, root: NodeIndex, state: &mut [VisitState], order: &mut Vec<NodeIndex>) -> Result<(), Cycle> {
        state[root.index()] = VisitState::Visiting;
        let mut stack = vec![Frame { node: root, next: self.successors(root), cursor: 0 }];

        while let Some(frame) = stack.last_mut() {
            let Some(&next) = frame.next.get(frame.cursor) else {
                state[frame.node.index()] = VisitState::Visited;
                order.push(frame.node);
                stack.pop();
                continue;
            };
            frame.cursor += 1;

            match state[next.index()] {
                VisitState::Visited => {}
                VisitState::Visiting => {
                    let start = stack.iter().position(|f| f.node == next).unwrap_or(0);
                    let members = stack[start..].iter().map(|f| self.graph[f.node].clone()).collect();
                    return Err(Cycle { members });
                }
                VisitState::None => {
                    state[next.index()] = VisitState::Visiting;
                    stack.push(Frame { node: next, next: self.successors(next), cursor: 0 });
                }
            }
        }
        Ok(())
    }

    // petgraph yields neighbors newest-first.
    fn successors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut out: Vec<_> = self.graph.neighbors(node).collect();
        out.reverse();
        out
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    None,
    Visiting,
    Visited,
}

struct Frame {
    node: NodeIndex,
    next: Vec<NodeIndex>,
    cursor: usize,
}
