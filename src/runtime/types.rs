use crate::language::types::{ContractMember, TypeNode, TypeParameter};
use crate::runtime::{
    environment::Environment,
    error::{RuntimeError, RuntimeResult},
    typecheck::are_types_compatible,
};
use std::collections::HashMap;
use std::fmt;

pub type Substitutions = HashMap<String, TypeVal>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveType {
    Number,
    String,
    Bool,
    Null,
    Dynamic,
}

impl PrimitiveType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "number" => Some(PrimitiveType::Number),
            "string" => Some(PrimitiveType::String),
            "bool" => Some(PrimitiveType::Bool),
            "null" => Some(PrimitiveType::Null),
            "dynamic" => Some(PrimitiveType::Dynamic),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Number => "number",
            PrimitiveType::String => "string",
            PrimitiveType::Bool => "bool",
            PrimitiveType::Null => "null",
            PrimitiveType::Dynamic => "dynamic",
        }
    }
}

/// Runtime type descriptor.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeVal {
    Primitive(PrimitiveType),
    Struct(StructTypeVal),
    Alias(AliasTypeVal),
    Generic(GenericTypeVal),
    Union(Vec<TypeVal>),
    Array(Box<TypeVal>),
    TypeParameter(TypeParamVal),
    Function(FunctionTypeVal),
    Contract(ContractTypeVal),
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructTypeVal {
    /// Empty for the shape of an anonymous object.
    pub name: String,
    pub type_params: Vec<TypeParamVal>,
    pub type_args: Vec<TypeVal>,
    pub members: Vec<MemberVal>,
}

impl StructTypeVal {
    pub fn member(&self, name: &str) -> Option<&MemberVal> {
        self.members.iter().find(|member| member.name == name)
    }

    /// Maps each type parameter to the matching argument.
    pub fn substitutions(&self, args: &[TypeVal]) -> Substitutions {
        self.type_params
            .iter()
            .zip(args)
            .map(|(param, arg)| (param.name.clone(), arg.clone()))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemberVal {
    pub name: String,
    pub ty: TypeVal,
    pub optional: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AliasTypeVal {
    pub name: String,
    pub target: Box<TypeVal>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenericTypeVal {
    pub name: String,
    pub params: Vec<TypeVal>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeParamVal {
    pub name: String,
    pub constraint: Option<Box<TypeVal>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionTypeVal {
    pub params: Vec<TypeVal>,
    pub return_type: Option<Box<TypeVal>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContractTypeVal {
    pub name: String,
    pub members: Vec<ContractMemberVal>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ContractMemberVal {
    Method {
        name: String,
        params: Vec<TypeVal>,
        return_type: TypeVal,
    },
    Getter {
        name: String,
        return_type: TypeVal,
    },
}

impl ContractMemberVal {
    pub fn name(&self) -> &str {
        match self {
            ContractMemberVal::Method { name, .. } | ContractMemberVal::Getter { name, .. } => name,
        }
    }

    /// `area(number) -> number` or `get label -> string`, as used in fulfillment errors.
    pub fn signature(&self) -> String {
        match self {
            ContractMemberVal::Method {
                name,
                params,
                return_type,
            } => {
                let params: Vec<String> = params.iter().map(ToString::to_string).collect();
                format!("{name}({}) -> {return_type}", params.join(", "))
            }
            ContractMemberVal::Getter { name, return_type } => {
                format!("get {name} -> {return_type}")
            }
        }
    }
}

impl TypeVal {
    pub const DYNAMIC: TypeVal = TypeVal::Primitive(PrimitiveType::Dynamic);
    pub const NULL: TypeVal = TypeVal::Primitive(PrimitiveType::Null);

    pub fn is_dynamic(&self) -> bool {
        matches!(self, TypeVal::Primitive(PrimitiveType::Dynamic))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TypeVal::Primitive(_) => "primitive",
            TypeVal::Struct(_) => "struct",
            TypeVal::Alias(_) => "alias",
            TypeVal::Generic(_) => "generic",
            TypeVal::Union(_) => "union",
            TypeVal::Array(_) => "array",
            TypeVal::TypeParameter(_) => "typeParameter",
            TypeVal::Function(_) => "function",
            TypeVal::Contract(_) => "contract",
        }
    }

    /// Follows aliases down to the aliased type.
    pub fn unaliased(&self) -> &TypeVal {
        match self {
            TypeVal::Alias(alias) => alias.target.unaliased(),
            other => other,
        }
    }
}

impl fmt::Display for TypeVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeVal::Primitive(primitive) => write!(f, "{}", primitive.name()),
            TypeVal::Struct(st) if st.name.is_empty() => {
                write!(f, "{{")?;
                for (idx, member) in st.members.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    let optional = if member.optional { "?" } else { "" };
                    write!(f, "{}{optional}: {}", member.name, member.ty)?;
                }
                write!(f, "}}")
            }
            TypeVal::Struct(st) => {
                write!(f, "{}", st.name)?;
                write_args(f, &st.type_args)
            }
            TypeVal::Alias(alias) => write!(f, "{}", alias.name),
            TypeVal::Generic(generic) => {
                write!(f, "{}", generic.name)?;
                write_args(f, &generic.params)
            }
            TypeVal::Union(members) => {
                for (idx, member) in members.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
            TypeVal::Array(element) => match element.as_ref() {
                TypeVal::Union(_) | TypeVal::Function(_) => write!(f, "({element})[]"),
                element => write!(f, "{element}[]"),
            },
            TypeVal::TypeParameter(param) => write!(f, "{}", param.name),
            TypeVal::Function(function) => {
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
            TypeVal::Contract(contract) => write!(f, "{}", contract.name),
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[TypeVal]) -> fmt::Result {
    if args.is_empty() {
        return Ok(());
    }
    write!(f, "<")?;
    for (idx, arg) in args.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    write!(f, ">")
}

/// Turns type syntax into a runtime descriptor, resolving names through `env`.
/// Names found in `subs` (type parameters in scope) win over declared types.
pub fn eval_type(node: &TypeNode, env: &Environment, subs: &Substitutions) -> RuntimeResult<TypeVal> {
    match node {
        TypeNode::Primitive(leaf) => PrimitiveType::from_name(&leaf.value)
            .map(TypeVal::Primitive)
            .ok_or_else(|| RuntimeError::UnresolvedType {
                name: leaf.value.clone(),
            }),
        TypeNode::Named(leaf) => {
            if let Some(ty) = subs.get(&leaf.value) {
                return Ok(ty.clone());
            }
            env.lookup_type(&leaf.value)
                .ok_or_else(|| RuntimeError::UnresolvedType {
                    name: leaf.value.clone(),
                })
        }
        TypeNode::Generic(generic) => {
            let name = &generic.name.value;
            let declared = env
                .lookup_type(name)
                .ok_or_else(|| RuntimeError::UnresolvedType { name: name.clone() })?;
            let TypeVal::Struct(base) = declared.unaliased() else {
                return Err(RuntimeError::NotAStruct { name: name.clone() });
            };
            let params = generic
                .args
                .iter()
                .map(|arg| eval_type(arg, env, subs))
                .collect::<RuntimeResult<Vec<_>>>()?;
            check_type_arguments(base, &params)?;
            Ok(TypeVal::Generic(GenericTypeVal {
                name: base.name.clone(),
                params,
            }))
        }
        TypeNode::Union(union) => Ok(TypeVal::Union(
            union
                .members
                .iter()
                .map(|member| eval_type(member, env, subs))
                .collect::<RuntimeResult<_>>()?,
        )),
        TypeNode::Array(array) => Ok(TypeVal::Array(Box::new(eval_type(
            &array.element,
            env,
            subs,
        )?))),
        TypeNode::Function(function) => Ok(TypeVal::Function(FunctionTypeVal {
            params: function
                .params
                .iter()
                .map(|param| eval_type(param, env, subs))
                .collect::<RuntimeResult<_>>()?,
            return_type: match &function.return_type {
                Some(ret) => Some(Box::new(eval_type(ret, env, subs)?)),
                None => None,
            },
        })),
        TypeNode::Struct(st) => Ok(TypeVal::Struct(StructTypeVal {
            name: String::new(),
            type_params: Vec::new(),
            type_args: Vec::new(),
            members: st
                .members
                .iter()
                .map(|member| {
                    Ok(MemberVal {
                        name: member.name.value.clone(),
                        ty: eval_type(&member.ty, env, subs)?,
                        optional: member.optional,
                    })
                })
                .collect::<RuntimeResult<_>>()?,
        })),
        TypeNode::Contract(contract) => Ok(TypeVal::Contract(ContractTypeVal {
            name: String::new(),
            members: contract
                .members
                .iter()
                .map(|member| eval_contract_member(member, env, subs))
                .collect::<RuntimeResult<_>>()?,
        })),
        TypeNode::Alias(alias) => {
            let target = eval_type(&alias.target, env, subs)?;
            Ok(TypeVal::Alias(AliasTypeVal {
                name: String::new(),
                target: Box::new(target),
            }))
        }
    }
}

fn optional_type(node: Option<&TypeNode>, env: &Environment, subs: &Substitutions) -> RuntimeResult<TypeVal> {
    match node {
        Some(node) => eval_type(node, env, subs),
        None => Ok(TypeVal::DYNAMIC),
    }
}

fn eval_contract_member(
    member: &ContractMember,
    env: &Environment,
    subs: &Substitutions,
) -> RuntimeResult<ContractMemberVal> {
    match member {
        ContractMember::Method(sig) => Ok(ContractMemberVal::Method {
            name: sig.name.value.clone(),
            params: sig
                .params
                .iter()
                .map(|param| optional_type(param.as_ref(), env, subs))
                .collect::<RuntimeResult<_>>()?,
            return_type: optional_type(sig.return_type.as_ref(), env, subs)?,
        }),
        ContractMember::Getter(getter) => Ok(ContractMemberVal::Getter {
            name: getter.name.value.clone(),
            return_type: eval_type(&getter.return_type, env, subs)?,
        }),
    }
}

/// Evaluates declared type parameters, returning them along with a substitution map
/// that binds each name to its `TypeParameter` descriptor.
pub fn eval_type_params(
    params: &[TypeParameter],
    env: &Environment,
) -> RuntimeResult<(Vec<TypeParamVal>, Substitutions)> {
    let mut evaluated = Vec::with_capacity(params.len());
    let mut subs = Substitutions::new();
    for param in params {
        let constraint = match &param.constraint {
            Some(node) => Some(Box::new(eval_type(node, env, &subs)?)),
            None => None,
        };
        let value = TypeParamVal {
            name: param.name.value.clone(),
            constraint,
        };
        subs.insert(value.name.clone(), TypeVal::TypeParameter(value.clone()));
        evaluated.push(value);
    }
    Ok((evaluated, subs))
}

/// Checks arity and constraints of concrete arguments against a generic struct.
pub fn check_type_arguments(base: &StructTypeVal, args: &[TypeVal]) -> RuntimeResult<()> {
    if args.len() != base.type_params.len() {
        return Err(RuntimeError::TypeArityMismatch {
            name: base.name.clone(),
            expected: base.type_params.len(),
            received: args.len(),
        });
    }
    for (param, arg) in base.type_params.iter().zip(args) {
        if let Some(constraint) = &param.constraint {
            let (compatible, _, _) = are_types_compatible(arg, constraint);
            if !compatible {
                return Err(RuntimeError::ConstraintViolation {
                    argument: arg.to_string(),
                    constraint: constraint.to_string(),
                    parameter: param.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Replaces type parameters named in `subs` throughout `ty`.
pub fn substitute(ty: &TypeVal, subs: &Substitutions) -> TypeVal {
    if subs.is_empty() {
        return ty.clone();
    }
    match ty {
        TypeVal::TypeParameter(param) => subs.get(&param.name).cloned().unwrap_or_else(|| ty.clone()),
        TypeVal::Union(members) => {
            TypeVal::Union(members.iter().map(|member| substitute(member, subs)).collect())
        }
        TypeVal::Array(element) => TypeVal::Array(Box::new(substitute(element, subs))),
        TypeVal::Generic(generic) => TypeVal::Generic(GenericTypeVal {
            name: generic.name.clone(),
            params: generic.params.iter().map(|p| substitute(p, subs)).collect(),
        }),
        TypeVal::Function(function) => TypeVal::Function(FunctionTypeVal {
            params: function.params.iter().map(|p| substitute(p, subs)).collect(),
            return_type: function
                .return_type
                .as_ref()
                .map(|ret| Box::new(substitute(ret, subs))),
        }),
        TypeVal::Struct(st) => TypeVal::Struct(StructTypeVal {
            members: st
                .members
                .iter()
                .map(|member| MemberVal {
                    name: member.name.clone(),
                    ty: substitute(&member.ty, subs),
                    optional: member.optional,
                })
                .collect(),
            ..st.clone()
        }),
        other => other.clone(),
    }
}
