use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum RuntimeError {
    #[error("Cannot declare variable \"{name}\" as it is already defined")]
    AlreadyDeclared { name: String },
    #[error("Cannot resolve variable \"{name}\" as it does not exist")]
    UnresolvedVariable { name: String },
    #[error("Cannot assign to a constant variable \"{name}\"")]
    ConstantAssignment { name: String },
    #[error("Cannot assign to a final variable \"{name}\"")]
    FinalAssignment { name: String },
    #[error("Type mismatch: Cannot assign value of type {actual} to variable \"{name}\" of type {expected}")]
    VariableTypeMismatch {
        name: String,
        actual: String,
        expected: String,
    },
    #[error("Type mismatch: Cannot assign value of type {actual} to variable of type {expected}")]
    NominalMismatch { actual: String, expected: String },

    #[error("Cannot declare type \"{name}\" as it is already defined")]
    TypeAlreadyDeclared { name: String },
    #[error("Unable to resolve type {name}")]
    UnresolvedType { name: String },
    #[error("Type '{name}' is not a struct")]
    NotAStruct { name: String },
    #[error("Type '{name}' is not a contract")]
    NotAContract { name: String },
    #[error("Alias {alias} cannot refer to another alias {target}")]
    AliasChain { alias: String, target: String },
    #[error("Type {name} expects {expected} type arguments but received {received}")]
    TypeArityMismatch {
        name: String,
        expected: usize,
        received: usize,
    },
    #[error("Type argument {argument} does not satisfy constraint {constraint} of type parameter {parameter}")]
    ConstraintViolation {
        argument: String,
        constraint: String,
        parameter: String,
    },

    #[error("Missing required field '{field}' in struct '{ty}'")]
    MissingField { field: String, ty: String },
    #[error("Unknown field '{field}' in struct '{ty}'")]
    UnknownField { field: String, ty: String },
    #[error("Field '{field}' in struct '{ty}' must be of type '{expected}', but got '{actual}'")]
    FieldTypeMismatch {
        field: String,
        ty: String,
        expected: String,
        actual: String,
    },
    #[error("Property '{property}' does not exist on {ty}")]
    UnknownProperty { property: String, ty: String },
    #[error("Cannot read property '{property}' of {kind}")]
    InvalidMember { property: String, kind: String },

    #[error("Method {implemented} of struct {target}, does not satisfy signature {contract}.{expected}.")]
    SignatureMismatch {
        implemented: String,
        target: String,
        contract: String,
        expected: String,
    },
    #[error("Implementation of contract {contract} is missing method {member}, for struct {target}.")]
    MissingContractMember {
        contract: String,
        member: String,
        target: String,
    },

    #[error("Index {index} is out of bounds of the array '{name}'")]
    IndexOutOfBounds { index: String, name: String },
    #[error("Index must be a number")]
    NonNumericIndex,
    #[error("Invalid assignment target {target}")]
    InvalidAssignmentTarget { target: String },

    #[error("Function {name} expected {expected} arguments but received {received}")]
    ArityMismatch {
        name: String,
        expected: usize,
        received: usize,
    },
    #[error("Parameter {param} of function {function} must be of type {expected}, but got {actual}")]
    ParamTypeMismatch {
        param: String,
        function: String,
        expected: String,
        actual: String,
    },
    #[error("Function {name} must return a value of type {expected}, but returned {actual}")]
    ReturnTypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("Value of type {kind} is not callable")]
    NotCallable { kind: String },
    #[error("Maximum call depth of {limit} exceeded")]
    CallDepthExceeded { limit: usize },

    #[error("Range step cannot be zero")]
    ZeroStep,
    #[error("Cannot iterate over a value of type {kind}")]
    NotIterable { kind: String },

    #[error("Type mismatch: {message}")]
    TypeMismatch { message: String },
}
