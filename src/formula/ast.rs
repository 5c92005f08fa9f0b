//! ast.rs
//! Arena-allocated expression tree. Nodes refer to each other by index, never by pointer.

use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ExprId(pub u32);

impl ExprId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Power,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Call arguments rarely exceed four, so they stay inline.
pub type Args = SmallVec<[ExprId; 4]>;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    Member { object: ExprId, property: String },
    Index { object: ExprId, index: ExprId },
    Call { callee: ExprId, args: Args },
    Unary { op: UnaryOp, operand: ExprId },
    Binary { op: BinaryOp, lhs: ExprId, rhs: ExprId },
    Logical { op: LogicalOp, lhs: ExprId, rhs: ExprId },
    Conditional { test: ExprId, then: ExprId, otherwise: ExprId },
    Array(Args),
    Object(Vec<(String, ExprId)>),
}

/// A parsed formula: the node arena plus the root expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Formula {
    nodes: Vec<Expr>,
    root: ExprId,
}

impl Formula {
    pub(crate) fn push(&mut self, expr: Expr) -> ExprId {
        let id = ExprId::new(self.nodes.len());
        self.nodes.push(expr);
        id
    }

    pub(crate) fn set_root(&mut self, root: ExprId) {
        self.root = root;
    }

    pub fn root(&self) -> ExprId { self.root }

    #[inline(always)]
    pub fn get(&self, id: ExprId) -> &Expr { &self.nodes[id.index()] }

    pub fn node_count(&self) -> usize { self.nodes.len() }

    /// Keys of the object literal the formula evaluates to, if its root is one.
    pub fn result_keys(&self) -> Option<Vec<&str>> {
        match self.get(self.root) {
            Expr::Object(fields) => Some(fields.iter().map(|(k, _)| k.as_str()).collect()),
            _ => None,
        }
    }

    /// Free (top-level) identifiers, in first-occurrence order, deduplicated.
    /// Member properties and object keys are not free.
    pub fn free_identifiers(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for node in &self.nodes {
            if let Expr::Ident(name) = node {
                if !seen.contains(&name.as_str()) {
                    seen.push(name.as_str());
                }
            }
        }
        seen
    }
}
