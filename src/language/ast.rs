use crate::language::{
    span::{LeafNode, Position},
    types::{TypeNode, TypeParameter, VarModifier},
};

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub file: String,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    VarDeclaration(VarDeclaration),
    MultiVarDeclaration(MultiVarDeclaration),
    FunctionDeclaration(FunctionDeclaration),
    Return(ReturnStatement),
    IfElse(IfElseStatement),
    While(WhileStatement),
    For(ForStatement),
    ForIn(ForInStatement),
    ForRange(ForRangeStatement),
    Break(BreakStatement),
    Continue(ContinueStatement),
    TypeDeclaration(TypeDeclaration),
    ContractFulfillment(ContractFulfillment),
    Expr(Expr),
}

impl Stmt {
    pub fn kind(&self) -> &'static str {
        match self {
            Stmt::VarDeclaration(_) => "VarDeclaration",
            Stmt::MultiVarDeclaration(_) => "MultiVarDeclaration",
            Stmt::FunctionDeclaration(_) => "FunctionDeclaration",
            Stmt::Return(_) => "ReturnStatement",
            Stmt::IfElse(_) => "IfElseStatement",
            Stmt::While(_) => "WhileStatement",
            Stmt::For(_) => "ForStatement",
            Stmt::ForIn(_) => "ForInStatement",
            Stmt::ForRange(_) => "ForRangeStatement",
            Stmt::Break(_) => "BreakStatement",
            Stmt::Continue(_) => "ContinueStatement",
            Stmt::TypeDeclaration(_) => "TypeDeclaration",
            Stmt::ContractFulfillment(_) => "ContractFulfillment",
            Stmt::Expr(expr) => expr.kind(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDeclaration {
    pub modifier: VarModifier,
    pub name: LeafNode<String>,
    pub ty: Option<TypeNode>,
    pub value: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MultiVarDeclaration {
    pub declarations: Vec<VarDeclaration>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: LeafNode<String>,
    pub ty: Option<TypeNode>,
    pub default: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDeclaration {
    pub name: LeafNode<String>,
    pub type_params: Vec<TypeParameter>,
    /// Leading `self` parameter, present on methods inside `fulfill` blocks.
    pub receiver: Option<LeafNode<String>>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeNode>,
    pub body: Vec<Stmt>,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReturnStatement {
    pub value: Option<Expr>,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConditionalBranch {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfElseStatement {
    /// The `if` branch followed by every `else if`, in source order.
    pub branches: Vec<ConditionalBranch>,
    pub else_body: Option<Vec<Stmt>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WhileStatement {
    pub loop_id: String,
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

/// Infinite, pre-condition and C-style loops.
#[derive(Clone, Debug, PartialEq)]
pub struct ForStatement {
    pub loop_id: String,
    pub label: Option<LeafNode<String>>,
    pub init: Option<Box<Stmt>>,
    pub condition: Option<Expr>,
    pub update: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForInStatement {
    pub loop_id: String,
    pub label: Option<LeafNode<String>>,
    pub index: Option<LeafNode<String>>,
    pub value: LeafNode<String>,
    pub iterable: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForRangeStatement {
    pub loop_id: String,
    pub label: Option<LeafNode<String>>,
    pub index: Option<LeafNode<String>>,
    pub value: LeafNode<String>,
    pub start: Expr,
    pub end: Expr,
    /// `through` includes the end bound, `to` stops before it.
    pub inclusive: bool,
    pub step: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BreakStatement {
    pub loop_id: String,
    pub label: Option<LeafNode<String>>,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContinueStatement {
    pub loop_id: String,
    pub label: Option<LeafNode<String>>,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeDeclaration {
    pub name: LeafNode<String>,
    pub type_params: Vec<TypeParameter>,
    pub definition: TypeNode,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GetterImpl {
    pub name: LeafNode<String>,
    pub return_type: TypeNode,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContractFulfillment {
    pub contract: LeafNode<String>,
    pub target: LeafNode<String>,
    pub methods: Vec<FunctionDeclaration>,
    pub getters: Vec<GetterImpl>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Assignment(AssignmentExpr),
    Member(MemberExpr),
    Call(CallExpr),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Identifier(LeafNode<String>),
    NumericLiteral(LeafNode<f64>),
    StringLiteral(StringLiteral),
    ArrayLiteral(ArrayLiteral),
    ObjectLiteral(ObjectLiteral),
}

impl Expr {
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Assignment(_) => "AssignmentExpr",
            Expr::Member(_) => "MemberExpr",
            Expr::Call(_) => "CallExpr",
            Expr::Binary(_) => "BinaryExpr",
            Expr::Unary(_) => "UnaryExpr",
            Expr::Identifier(_) => "Identifier",
            Expr::NumericLiteral(_) => "NumericLiteral",
            Expr::StringLiteral(_) => "StringLiteral",
            Expr::ArrayLiteral(_) => "ArrayLiteral",
            Expr::ObjectLiteral(_) => "ObjectLiteral",
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Expr::Assignment(expr) => expr.assignee.position().to(expr.value.position()),
            Expr::Member(expr) => expr.position,
            Expr::Call(expr) => expr.position,
            Expr::Binary(expr) => expr.left.position().to(expr.right.position()),
            Expr::Unary(expr) => expr.position,
            Expr::Identifier(leaf) => leaf.position,
            Expr::NumericLiteral(leaf) => leaf.position,
            Expr::StringLiteral(lit) => lit.position,
            Expr::ArrayLiteral(lit) => lit.position,
            Expr::ObjectLiteral(lit) => lit.position,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssignmentExpr {
    pub assignee: Box<Expr>,
    pub value: Box<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemberExpr {
    pub object: Box<Expr>,
    pub property: Box<Expr>,
    /// `a[b]` rather than `a.b`.
    pub computed: bool,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CallExpr {
    pub caller: Box<Expr>,
    pub args: Vec<Expr>,
    pub position: Position,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::LtEq => "<=",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BinaryExpr {
    pub left: Box<Expr>,
    pub op: BinaryOp,
    pub right: Box<Expr>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Box<Expr>,
    pub position: Position,
}

/// A string literal. `value` holds the text with every `${...}` replaced by a
/// `#expr(N)` placeholder; `$name` references are left in place.
#[derive(Clone, Debug, PartialEq)]
pub struct StringLiteral {
    pub value: String,
    pub identifiers: Vec<String>,
    pub expressions: Vec<(String, Expr)>,
    pub position: Position,
}

impl StringLiteral {
    pub fn is_plain(&self) -> bool {
        self.identifiers.is_empty() && self.expressions.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArrayLiteral {
    pub elements: Vec<Expr>,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub key: LeafNode<String>,
    /// `None` for shorthand `{ name }`.
    pub value: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ObjectLiteral {
    pub instance_of: Option<LeafNode<String>>,
    pub type_args: Vec<TypeNode>,
    pub properties: Vec<Property>,
    pub position: Position,
}
