use crate::language::span::{LeafNode, Position};
use std::fmt;

pub const PRIMITIVE_TYPES: [&str; 5] = ["number", "string", "bool", "null", "dynamic"];

/// Type syntax as written in the source.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeNode {
    Primitive(LeafNode<String>),
    /// A reference to a declared type, resolved at runtime.
    Named(LeafNode<String>),
    Generic(GenericType),
    Union(UnionType),
    Array(ArrayType),
    Function(FunctionType),
    Struct(StructType),
    Contract(ContractType),
    Alias(AliasType),
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenericType {
    pub name: LeafNode<String>,
    pub args: Vec<TypeNode>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnionType {
    pub members: Vec<TypeNode>,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArrayType {
    pub element: Box<TypeNode>,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionType {
    pub params: Vec<TypeNode>,
    pub return_type: Option<Box<TypeNode>>,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructType {
    pub members: Vec<StructMember>,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructMember {
    pub name: LeafNode<String>,
    pub ty: TypeNode,
    pub optional: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContractType {
    pub members: Vec<ContractMember>,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ContractMember {
    Method(MethodSignature),
    Getter(GetterType),
}

impl ContractMember {
    pub fn name(&self) -> &str {
        match self {
            ContractMember::Method(sig) => sig.name.as_str(),
            ContractMember::Getter(getter) => getter.name.as_str(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodSignature {
    pub name: LeafNode<String>,
    /// Parameter types, the receiver (`self`) already removed.
    pub params: Vec<Option<TypeNode>>,
    pub return_type: Option<TypeNode>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GetterType {
    pub name: LeafNode<String>,
    pub return_type: TypeNode,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AliasType {
    pub target: Box<TypeNode>,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeParameter {
    pub name: LeafNode<String>,
    pub constraint: Option<TypeNode>,
}

impl TypeNode {
    pub fn kind(&self) -> &'static str {
        match self {
            TypeNode::Primitive(_) => "PrimitiveType",
            TypeNode::Named(_) => "NamedType",
            TypeNode::Generic(_) => "GenericType",
            TypeNode::Union(_) => "UnionType",
            TypeNode::Array(_) => "ArrayType",
            TypeNode::Function(_) => "FunctionType",
            TypeNode::Struct(_) => "StructType",
            TypeNode::Contract(_) => "ContractType",
            TypeNode::Alias(_) => "AliasType",
        }
    }

    pub fn position(&self) -> Position {
        match self {
            TypeNode::Primitive(leaf) | TypeNode::Named(leaf) => leaf.position,
            TypeNode::Generic(generic) => generic.name.position,
            TypeNode::Union(union) => union.position,
            TypeNode::Array(array) => array.position,
            TypeNode::Function(function) => function.position,
            TypeNode::Struct(structure) => structure.position,
            TypeNode::Contract(contract) => contract.position,
            TypeNode::Alias(alias) => alias.position,
        }
    }
}

impl fmt::Display for TypeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeNode::Primitive(leaf) | TypeNode::Named(leaf) => write!(f, "{}", leaf.value),
            TypeNode::Generic(generic) => {
                write!(f, "{}<", generic.name.value)?;
                for (idx, arg) in generic.args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
            TypeNode::Union(union) => {
                for (idx, member) in union.members.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
            TypeNode::Array(array) => match &*array.element {
                TypeNode::Union(_) | TypeNode::Function(_) => write!(f, "({})[]", array.element),
                element => write!(f, "{element}[]"),
            },
            TypeNode::Function(function) => {
                write!(f, "fn(")?;
                for (idx, param) in function.params.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ")")?;
                if let Some(ret) = &function.return_type {
                    write!(f, " -> {ret}")?;
                }
                Ok(())
            }
            TypeNode::Struct(_) => write!(f, "struct"),
            TypeNode::Contract(_) => write!(f, "contract"),
            TypeNode::Alias(alias) => write!(f, "alias {}", alias.target),
        }
    }
}

/// How a binding may be reassigned after its declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarModifier {
    Variable,
    Final,
    Constant,
}

impl VarModifier {
    pub fn requires_initializer(self) -> bool {
        !matches!(self, VarModifier::Variable)
    }

    pub fn keyword(self) -> &'static str {
        match self {
            VarModifier::Variable => "var",
            VarModifier::Final => "final",
            VarModifier::Constant => "const",
        }
    }
}
