use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use elham_core::kernels;
use elham_core::{Array, Error, Result, Shape};

use crate::op::OpKind;

// Node: one vertex of the computation graph
//
// A Node is a cheap handle (Arc) to shared inner data, so the same node can be
// a child of many parents and also sit in a Graph's registry.
//
// KINDS:
//
//   Variable  leaf that owns its value and accumulates gradient
//   Constant  leaf that owns its value and ignores gradient
//   Operator  computed from child `a` and optional child `b` by an OpKind
//
// Children are fixed at construction and never change, so a node can only
// point at nodes that already existed when it was built. Cycles cannot be
// formed.
//
// STATE:
//
//   `value` and `grad` sit behind an RwLock. Operators have no value until
//   their first forward. Locks are released before recursing into children.
//
// BACKWARD CONTRACT:
//
//   node.backward(upstream) adds `upstream` into the node's own grad, then
//   (for operators) computes each child's partial from cached values, sums it
//   down to the child's shape and calls child.backward with it. Constants
//   drop whatever they receive.

/// Unique identifier for a node (global atomic counter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        NodeId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// What a node is, together with its children for operators.
#[derive(Debug)]
pub enum NodeKind {
    Variable,
    Constant,
    Operator {
        op: OpKind,
        a: Node,
        b: Option<Node>,
    },
}

impl NodeKind {
    fn label(&self) -> &'static str {
        match self {
            NodeKind::Variable => "variable",
            NodeKind::Constant => "constant",
            NodeKind::Operator { op, .. } => op.name(),
        }
    }
}

#[derive(Default)]
struct NodeState {
    value: Option<Array>,
    grad: Option<Array>,
}

struct NodeInner {
    id: NodeId,
    name: String,
    kind: NodeKind,
    state: RwLock<NodeState>,
}

/// Shared handle to a computation-graph node.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Node(id={}, name={:?}, kind={})",
            self.inner.id.get(),
            self.inner.name,
            self.inner.kind.label()
        )
    }
}

impl Node {
    // Construction

    fn build(kind: NodeKind, name: String, value: Option<Array>) -> Self {
        let id = NodeId::new();
        let name = if name.is_empty() {
            format!("{}_{}", kind.label(), id.get())
        } else {
            name
        };
        let grad = value.as_ref().map(|v| Array::like(v, 0.0));
        Node {
            inner: Arc::new(NodeInner {
                id,
                name,
                kind,
                state: RwLock::new(NodeState { value, grad }),
            }),
        }
    }

    /// Trainable leaf. An empty name is replaced by `variable_<id>`.
    pub fn variable(value: Array, name: impl Into<String>) -> Self {
        Self::build(NodeKind::Variable, name.into(), Some(value))
    }

    /// Non-trainable leaf. Its gradient stays zero.
    pub fn constant(value: Array, name: impl Into<String>) -> Self {
        Self::build(NodeKind::Constant, name.into(), Some(value))
    }

    fn operator(op: OpKind, a: &Node, b: Option<&Node>, name: impl Into<String>) -> Self {
        let kind = NodeKind::Operator {
            op,
            a: a.clone(),
            b: b.cloned(),
        };
        Self::build(kind, name.into(), None)
    }

    pub fn add(a: &Node, b: &Node, name: impl Into<String>) -> Self {
        Self::operator(OpKind::Add, a, Some(b), name)
    }

    pub fn sub(a: &Node, b: &Node, name: impl Into<String>) -> Self {
        Self::operator(OpKind::Sub, a, Some(b), name)
    }

    pub fn mul(a: &Node, b: &Node, name: impl Into<String>) -> Self {
        Self::operator(OpKind::Mul, a, Some(b), name)
    }

    pub fn div(a: &Node, b: &Node, name: impl Into<String>) -> Self {
        Self::operator(OpKind::Div, a, Some(b), name)
    }

    /// `a` raised elementwise to `b`.
    pub fn pow(a: &Node, b: &Node, name: impl Into<String>) -> Self {
        Self::operator(OpKind::Pow, a, Some(b), name)
    }

    pub fn ln(a: &Node, name: impl Into<String>) -> Self {
        Self::operator(OpKind::Ln, a, None, name)
    }

    pub fn exp(a: &Node, name: impl Into<String>) -> Self {
        Self::operator(OpKind::Exp, a, None, name)
    }

    pub fn sqrt(a: &Node, name: impl Into<String>) -> Self {
        Self::operator(OpKind::Sqrt, a, None, name)
    }

    /// Logarithm of `x` in base `base`, elementwise.
    pub fn log_base(x: &Node, base: &Node, name: impl Into<String>) -> Self {
        Self::operator(OpKind::LogBase, x, Some(base), name)
    }

    pub fn matmul(a: &Node, b: &Node, name: impl Into<String>) -> Self {
        Self::operator(OpKind::Matmul, a, Some(b), name)
    }

    pub fn dot(a: &Node, b: &Node, name: impl Into<String>) -> Self {
        Self::operator(OpKind::Dot, a, Some(b), name)
    }

    pub fn cross(a: &Node, b: &Node, name: impl Into<String>) -> Self {
        Self::operator(OpKind::Cross, a, Some(b), name)
    }

    // Accessors

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.inner.kind
    }

    /// The operator, or None for leaves.
    pub fn op(&self) -> Option<OpKind> {
        match self.kind() {
            NodeKind::Operator { op, .. } => Some(*op),
            _ => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.op().is_none()
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind(), NodeKind::Variable)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind(), NodeKind::Constant)
    }

    /// Direct children in operand order (empty for leaves).
    pub fn children(&self) -> Vec<&Node> {
        match self.kind() {
            NodeKind::Operator { a, b, .. } => std::iter::once(a).chain(b.as_ref()).collect(),
            _ => Vec::new(),
        }
    }

    /// Whether two handles refer to the same node.
    pub fn same(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, NodeState>> {
        self.inner
            .state
            .read()
            .map_err(|_| Error::msg("node state lock poisoned"))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, NodeState>> {
        self.inner
            .state
            .write()
            .map_err(|_| Error::msg("node state lock poisoned"))
    }

    fn not_evaluated(&self) -> Error {
        Error::NotEvaluated {
            name: self.inner.name.clone(),
        }
    }

    /// The last computed (or assigned) value.
    pub fn value(&self) -> Result<Array> {
        self.read_state()?
            .value
            .clone()
            .ok_or_else(|| self.not_evaluated())
    }

    /// The accumulated gradient.
    pub fn grad(&self) -> Result<Array> {
        self.read_state()?
            .grad
            .clone()
            .ok_or_else(|| self.not_evaluated())
    }

    pub fn shape(&self) -> Result<Shape> {
        match &self.read_state()?.value {
            Some(v) => Ok(v.shape().clone()),
            None => Err(self.not_evaluated()),
        }
    }

    pub fn size(&self) -> Result<usize> {
        match &self.read_state()?.value {
            Some(v) => Ok(v.size()),
            None => Err(self.not_evaluated()),
        }
    }

    /// Replace a leaf's value and reset its gradient to zeros.
    pub fn set_value(&self, value: Array) -> Result<()> {
        if !self.is_leaf() {
            return Err(Error::NotALeaf {
                name: self.inner.name.clone(),
            });
        }
        let mut state = self.write_state()?;
        state.grad = Some(Array::like(&value, 0.0));
        state.value = Some(value);
        Ok(())
    }

    /// Reset the gradient to zeros shaped like the value.
    pub fn zero_grad(&self) -> Result<()> {
        let mut state = self.write_state()?;
        let zeros = match &state.value {
            Some(v) => Array::like(v, 0.0),
            None => return Err(self.not_evaluated()),
        };
        state.grad = Some(zeros);
        Ok(())
    }

    // Forward

    /// Recompute this node and everything below it.
    ///
    /// Leaves return their value. Operators forward their children, apply the
    /// kernel, store the result and reset their gradient to zeros. Shared
    /// subgraphs are recomputed once per path; `Graph::forward` evaluates each
    /// node once.
    pub fn forward(&self) -> Result<Array> {
        if let NodeKind::Operator { a, b, .. } = &self.inner.kind {
            a.forward()?;
            if let Some(b) = b {
                b.forward()?;
            }
        }
        self.evaluate()
    }

    /// Compute this node from its children's current values, without
    /// recursing. Leaves just return their value.
    pub fn evaluate(&self) -> Result<Array> {
        let (op, a, b) = match &self.inner.kind {
            NodeKind::Operator { op, a, b } => (*op, a, b),
            _ => return self.value(),
        };
        let av = a.value()?;
        let bv = match b {
            Some(b) => Some(b.value()?),
            None => None,
        };
        let value = op.apply(&av, bv.as_ref())?;
        log::trace!("forward {} ({}) -> {}", self.inner.name, op, value.desc());

        let mut state = self.write_state()?;
        state.grad = Some(Array::like(&value, 0.0));
        state.value = Some(value.clone());
        Ok(value)
    }

    // Backward

    /// Add `g` into this node's gradient. Constants ignore it.
    ///
    /// `g` is first summed down to the node's shape, so callers may pass a
    /// gradient at any shape the node's value broadcasts to.
    pub fn accumulate_grad(&self, g: &Array) -> Result<()> {
        if self.is_constant() {
            return Ok(());
        }
        let mut state = self.write_state()?;
        let value = state.value.as_ref().ok_or_else(|| self.not_evaluated())?;
        let g = kernels::reduce_to_shape(g, value.shape())?;
        let total = match state.grad.take() {
            Some(existing) => kernels::add(&existing, &g)?,
            None => g,
        };
        state.grad = Some(total);
        Ok(())
    }

    /// Each child paired with its share of `upstream`, already reduced to the
    /// child's shape.
    fn child_grads(&self, upstream: &Array) -> Result<Vec<(&Node, Array)>> {
        let (op, a, b) = match &self.inner.kind {
            NodeKind::Operator { op, a, b } => (*op, a, b),
            _ => return Ok(Vec::new()),
        };
        let value = self.value()?;
        let av = a.value()?;
        let bv = match b {
            Some(b) => Some(b.value()?),
            None => None,
        };
        let (da, db) = op.partials(upstream, &av, bv.as_ref(), &value)?;

        let mut out = vec![(a, kernels::reduce_to_shape(&da, av.shape())?)];
        if let (Some(b), Some(bv), Some(db)) = (b, bv, db) {
            out.push((b, kernels::reduce_to_shape(&db, bv.shape())?));
        }
        Ok(out)
    }

    /// Push `upstream` into this node and, recursively, into its children.
    ///
    /// Operators must have been forwarded first (`Error::NotEvaluated`).
    pub fn backward(&self, upstream: &Array) -> Result<()> {
        match &self.inner.kind {
            NodeKind::Constant => Ok(()),
            NodeKind::Variable => self.accumulate_grad(upstream),
            NodeKind::Operator { .. } => {
                self.accumulate_grad(upstream)?;
                for (child, g) in self.child_grads(upstream)? {
                    child.backward(&g)?;
                }
                Ok(())
            }
        }
    }

    /// Send this node's total accumulated gradient to its children without
    /// recursing further. Used by the topological pass in `Graph::backward`.
    pub(crate) fn propagate(&self) -> Result<()> {
        if self.is_leaf() {
            return Ok(());
        }
        let total = self.grad()?;
        for (child, g) in self.child_grads(&total)? {
            child.accumulate_grad(&g)?;
        }
        Ok(())
    }
}

// Operator overloads build auto-named nodes: `&x * &y + &z`.

macro_rules! node_binary_op {
    ($trait:ident, $method:ident, $ctor:ident) => {
        impl std::ops::$trait<&Node> for &Node {
            type Output = Node;
            fn $method(self, rhs: &Node) -> Node {
                Node::$ctor(self, rhs, "")
            }
        }

        impl std::ops::$trait<Node> for Node {
            type Output = Node;
            fn $method(self, rhs: Node) -> Node {
                Node::$ctor(&self, &rhs, "")
            }
        }

        impl std::ops::$trait<&Node> for Node {
            type Output = Node;
            fn $method(self, rhs: &Node) -> Node {
                Node::$ctor(&self, rhs, "")
            }
        }
    };
}

node_binary_op!(Add, add, add);
node_binary_op!(Sub, sub, sub);
node_binary_op!(Mul, mul, mul);
node_binary_op!(Div, div, div);
