use std::collections::{HashMap, HashSet};

use elham_core::{Array, Result};

use crate::node::{Node, NodeId};

// Graph: orchestrates forward and backward over a DAG of nodes
//
// Construction walks the DAG once from the root:
//
//   - Each node is registered under its name. The first node seen with a
//     given name keeps it; a *different* node carrying the same name is
//     reported with `log::warn!` and is only reachable through the topology.
//   - The same walk records a post-order (children before parents) keyed by
//     node identity, so nodes that share a name are still evaluated and
//     differentiated correctly.
//
// FORWARD:  evaluate every operator once, in post-order.
//
// BACKWARD: three phases.
//
//   1. zero the gradient of every reachable node
//   2. seed the root gradient with ones shaped like the root value
//   3. walk the post-order in reverse; each operator hands its *total*
//      gradient to its children exactly once
//
// Phase 3 visits a node only after all its parents, so by then its gradient
// already holds the sum over every path from the root. On a diamond
// `y = f(x) + g(x)` the shared input receives f'(x) + g'(x).

/// A computation graph rooted at one node.
pub struct Graph {
    root: Node,
    registry: HashMap<String, Node>,
    order: Vec<Node>,
}

impl Graph {
    /// Register every node reachable from `root`.
    pub fn new(root: &Node) -> Self {
        let mut registry = HashMap::new();
        let mut visited = HashSet::new();
        let mut order = Vec::new();

        fn visit(
            node: &Node,
            registry: &mut HashMap<String, Node>,
            visited: &mut HashSet<NodeId>,
            order: &mut Vec<Node>,
        ) {
            if !visited.insert(node.id()) {
                return;
            }
            match registry.get(node.name()) {
                Some(existing) if !existing.same(node) => {
                    log::warn!(
                        "duplicate node name '{}': keeping {:?}, not registering {:?}",
                        node.name(),
                        existing,
                        node
                    );
                }
                Some(_) => {}
                None => {
                    registry.insert(node.name().to_string(), node.clone());
                }
            }
            for child in node.children() {
                visit(child, registry, visited, order);
            }
            order.push(node.clone());
        }

        visit(root, &mut registry, &mut visited, &mut order);
        log::debug!(
            "graph built: root '{}', {} nodes, {} registered names",
            root.name(),
            order.len(),
            registry.len()
        );

        Graph {
            root: root.clone(),
            registry,
            order,
        }
    }

    /// Evaluate the whole graph and return the root value.
    ///
    /// Every reachable operator is recomputed from current leaf values, once
    /// per call, and its gradient reset to zeros.
    pub fn forward(&self) -> Result<Array> {
        log::debug!("forward: {} nodes", self.order.len());
        for node in &self.order {
            node.evaluate()?;
        }
        self.root.value()
    }

    /// Compute gradients of the root (seeded with ones) for every node.
    ///
    /// Fails with `Error::NotEvaluated` if `forward` has not been run.
    pub fn backward(&self) -> Result<()> {
        log::debug!("backward: zeroing {} gradients", self.order.len());
        for node in &self.order {
            node.zero_grad()?;
        }

        let root_value = self.root.value()?;
        self.root.accumulate_grad(&Array::like(&root_value, 1.0))?;

        for node in self.order.iter().rev() {
            node.propagate()?;
        }
        log::debug!("backward: done");
        Ok(())
    }

    /// Gradient of every registered node, by name.
    pub fn gradients(&self) -> Result<HashMap<String, Array>> {
        self.registry
            .iter()
            .map(|(name, node)| Ok((name.clone(), node.grad()?)))
            .collect()
    }

    /// Look up a registered node by name.
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.registry.get(name)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Reachable nodes, children before parents.
    pub fn nodes(&self) -> &[Node] {
        &self.order
    }

    /// Variable leaves, in evaluation order.
    pub fn variables(&self) -> Vec<&Node> {
        self.order.iter().filter(|n| n.is_variable()).collect()
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}
