pub mod build;
pub mod visit;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Identity of an AST node.
///
/// Ids handed over by the AST differencing pass are non-negative. Negative ids are reserved
/// for synthetic nodes the engine fabricates (undeclared globals, sentinel definers).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i32);

impl NodeId {
    pub fn is_synthetic(&self) -> bool {
        self.0 < 0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for NodeId {
    fn from(value: i32) -> Self {
        NodeId(value)
    }
}

/// Classification assigned to every AST node by the tree differencing pass.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    Inserted,
    Removed,
    Updated,
    Moved,
    #[default]
    Unchanged,
    Unknown,
}

impl ChangeType {
    /// Inserted, removed and updated nodes differ between the two versions.
    pub fn is_changed(&self) -> bool {
        matches!(
            self,
            ChangeType::Inserted | ChangeType::Removed | ChangeType::Updated
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    BitNot,
    TypeOf,
    Void,
    Delete,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    In,
    InstanceOf,
    Comma,
}

impl BinaryOp {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Sub
                | BinaryOp::Mul
                | BinaryOp::Div
                | BinaryOp::Mod
                | BinaryOp::BitAnd
                | BinaryOp::BitOr
                | BinaryOp::BitXor
                | BinaryOp::Shl
                | BinaryOp::Shr
                | BinaryOp::UShr
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::StrictEq
                | BinaryOp::StrictNe
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::In
                | BinaryOp::InstanceOf
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    This,
    Null,
    True,
    False,
}

/// A named binding site: a parameter, a declared variable or a function name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    pub id: NodeId,
    #[serde(default)]
    pub change: ChangeType,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    #[serde(default)]
    pub change: ChangeType,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Name(String),
    Number(f64),
    String(String),
    Keyword(Keyword),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// `target.property`. The property is always an [ExprKind::Name].
    PropertyGet {
        target: Box<Expr>,
        property: Box<Expr>,
    },
    ElementGet {
        target: Box<Expr>,
        element: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Object(Vec<ObjectProperty>),
    Array(Vec<Expr>),
    Function(Arc<FunctionNode>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Paren(Box<Expr>),
}

impl Expr {
    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(n) => Some(n.as_str()),
            _ => None,
        }
    }

    /// Strip any number of enclosing parentheses.
    pub fn unparen(&self) -> &Expr {
        match &self.kind {
            ExprKind::Paren(inner) => inner.unparen(),
            _ => self,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectProperty {
    pub id: NodeId,
    #[serde(default)]
    pub change: ChangeType,
    pub key: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarInit {
    pub name: Ident,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub id: NodeId,
    #[serde(default)]
    pub change: ChangeType,
    pub kind: StmtKind,
}

/// Statement kinds.
///
/// The CFG builder flattens `Block`, `If`, `Loop` and `Try` into nodes and conditional edges;
/// they are kept here so that declarations nested inside them can be hoisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Empty,
    Expression(Expr),
    VarDecl(Vec<VarInit>),
    Return(Option<Expr>),
    Throw(Expr),
    FunctionDecl(Arc<FunctionNode>),
    Block(Vec<Stmt>),
    If {
        test: Expr,
        consequent: Vec<Stmt>,
        alternate: Vec<Stmt>,
    },
    Loop {
        test: Option<Expr>,
        body: Vec<Stmt>,
    },
    Try {
        block: Vec<Stmt>,
        handler: Vec<Stmt>,
        finalizer: Vec<Stmt>,
    },
    Break,
    Continue,
}

/// A function or a whole script (no name, no parameters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionNode {
    pub id: NodeId,
    #[serde(default)]
    pub change: ChangeType,
    pub name: Option<Ident>,
    #[serde(default)]
    pub params: Vec<Ident>,
    pub body: Vec<Stmt>,
}

impl FunctionNode {
    pub fn name(&self) -> Option<&str> {
        self.name.as_ref().map(|n| n.name.as_str())
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ExprKind::Name(n) => write!(f, "{n}"),
            ExprKind::Number(n) => write!(f, "{n}"),
            ExprKind::String(s) => write!(f, "{s:?}"),
            ExprKind::Keyword(k) => match k {
                Keyword::This => write!(f, "this"),
                Keyword::Null => write!(f, "null"),
                Keyword::True => write!(f, "true"),
                Keyword::False => write!(f, "false"),
            },
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "!{operand}"),
                UnaryOp::Neg => write!(f, "-{operand}"),
                UnaryOp::Plus => write!(f, "+{operand}"),
                UnaryOp::BitNot => write!(f, "~{operand}"),
                UnaryOp::TypeOf => write!(f, "typeof {operand}"),
                UnaryOp::Void => write!(f, "void {operand}"),
                UnaryOp::Delete => write!(f, "delete {operand}"),
                UnaryOp::PreInc => write!(f, "++{operand}"),
                UnaryOp::PreDec => write!(f, "--{operand}"),
                UnaryOp::PostInc => write!(f, "{operand}++"),
                UnaryOp::PostDec => write!(f, "{operand}--"),
            },
            ExprKind::Binary { op, left, right } => {
                write!(f, "{left} {} {right}", binary_symbol(*op))
            }
            ExprKind::Assign { op, target, value } => {
                write!(f, "{target} {} {value}", assign_symbol(*op))
            }
            ExprKind::PropertyGet { target, property } => write!(f, "{target}.{property}"),
            ExprKind::ElementGet { target, element } => write!(f, "{target}[{element}]"),
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => write!(f, "{test} ? {consequent} : {alternate}"),
            ExprKind::Object(props) => {
                write!(f, "{{")?;
                for (i, p) in props.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", p.key, p.value)?;
                }
                write!(f, "}}")
            }
            ExprKind::Array(elems) => {
                write!(f, "[")?;
                write_list(f, elems)?;
                write!(f, "]")
            }
            ExprKind::Function(func) => match func.name() {
                Some(n) => write!(f, "function {n}(..)"),
                None => write!(f, "function(..)"),
            },
            ExprKind::Call { callee, args } => {
                write!(f, "{callee}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ExprKind::New { callee, args } => {
                write!(f, "new {callee}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ExprKind::Paren(inner) => write!(f, "({inner})"),
        }
    }
}

fn write_list(f: &mut Formatter<'_>, items: &[Expr]) -> std::fmt::Result {
    for (i, e) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{e}")?;
    }
    Ok(())
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::StrictEq => "===",
        BinaryOp::StrictNe => "!==",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
        BinaryOp::BitAnd => "&",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "^",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
        BinaryOp::UShr => ">>>",
        BinaryOp::In => "in",
        BinaryOp::InstanceOf => "instanceof",
        BinaryOp::Comma => ",",
    }
}

fn assign_symbol(op: AssignOp) -> &'static str {
    match op {
        AssignOp::Assign => "=",
        AssignOp::Add => "+=",
        AssignOp::Sub => "-=",
        AssignOp::Mul => "*=",
        AssignOp::Div => "/=",
        AssignOp::Mod => "%=",
        AssignOp::BitAnd => "&=",
        AssignOp::BitOr => "|=",
        AssignOp::BitXor => "^=",
        AssignOp::Shl => "<<=",
        AssignOp::Shr => ">>=",
        AssignOp::UShr => ">>>=",
    }
}
