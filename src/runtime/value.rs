use crate::language::ast::FunctionDeclaration;
use crate::runtime::{
    context::ExecutionContext,
    environment::Environment,
    error::RuntimeResult,
    types::TypeVal,
};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub enum RuntimeVal {
    Null,
    Number(f64),
    String(String),
    Boolean(bool),
    Object(ObjectVal),
    Array(ArrayVal),
    NativeFn(NativeFnVal),
    Function(Rc<FunctionVal>),
    Type(TypeVal),
    /// Result of statements that produce nothing.
    Placeholder,
}

impl RuntimeVal {
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeVal::Null => "null",
            RuntimeVal::Number(_) => "number",
            RuntimeVal::String(_) => "string",
            RuntimeVal::Boolean(_) => "boolean",
            RuntimeVal::Object(_) => "object",
            RuntimeVal::Array(_) => "array",
            RuntimeVal::NativeFn(_) => "nativefn",
            RuntimeVal::Function(_) => "function",
            RuntimeVal::Type(_) => "type",
            RuntimeVal::Placeholder => "placeholder",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            RuntimeVal::Null | RuntimeVal::Placeholder => false,
            RuntimeVal::Boolean(b) => *b,
            RuntimeVal::Number(n) => *n != 0.0,
            RuntimeVal::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RuntimeVal::Null)
    }

    pub fn array(items: Vec<RuntimeVal>) -> Self {
        RuntimeVal::Array(ArrayVal::new(items))
    }

    /// Identity of the shared storage behind an object or array.
    pub fn shared_ptr(&self) -> Option<*const ()> {
        match self {
            RuntimeVal::Object(object) => Some(Rc::as_ptr(&object.properties).cast()),
            RuntimeVal::Array(array) => Some(Rc::as_ptr(&array.items).cast()),
            _ => None,
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>, seen: &mut Vec<*const ()>) -> fmt::Result {
        match self {
            RuntimeVal::String(s) => write!(f, "{s:?}"),
            RuntimeVal::Object(object) => object.fmt_guarded(f, seen),
            RuntimeVal::Array(array) => array.fmt_guarded(f, seen),
            other => write!(f, "{other}"),
        }
    }
}

const CYCLE_MARKER: &str = "<cycle>";

impl PartialEq for RuntimeVal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RuntimeVal::Null, RuntimeVal::Null) => true,
            (RuntimeVal::Placeholder, RuntimeVal::Placeholder) => true,
            (RuntimeVal::Number(a), RuntimeVal::Number(b)) => a == b,
            (RuntimeVal::String(a), RuntimeVal::String(b)) => a == b,
            (RuntimeVal::Boolean(a), RuntimeVal::Boolean(b)) => a == b,
            (RuntimeVal::Object(a), RuntimeVal::Object(b)) => a == b,
            (RuntimeVal::Array(a), RuntimeVal::Array(b)) => a == b,
            (RuntimeVal::NativeFn(a), RuntimeVal::NativeFn(b)) => a.name == b.name,
            (RuntimeVal::Function(a), RuntimeVal::Function(b)) => Rc::ptr_eq(a, b),
            (RuntimeVal::Type(a), RuntimeVal::Type(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for RuntimeVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeVal::Null => write!(f, "null"),
            RuntimeVal::Number(n) => write!(f, "{n}"),
            RuntimeVal::String(s) => write!(f, "{s}"),
            RuntimeVal::Boolean(b) => write!(f, "{b}"),
            RuntimeVal::Object(object) => write!(f, "{object}"),
            RuntimeVal::Array(array) => write!(f, "{array}"),
            RuntimeVal::NativeFn(native) => write!(f, "<native fn {}>", native.name),
            RuntimeVal::Function(function) => write!(f, "<fn {}>", function.name()),
            RuntimeVal::Type(ty) => write!(f, "<type {ty}>"),
            RuntimeVal::Placeholder => Ok(()),
        }
    }
}

/// A struct instance or anonymous object. Clones share the same properties.
#[derive(Clone, Debug)]
pub struct ObjectVal {
    /// Nominal tag of the declaring struct.
    pub instance_of: Option<String>,
    pub type_args: Vec<TypeVal>,
    pub properties: Rc<RefCell<Vec<(String, RuntimeVal)>>>,
}

impl ObjectVal {
    pub fn new(
        instance_of: Option<String>,
        type_args: Vec<TypeVal>,
        properties: Vec<(String, RuntimeVal)>,
    ) -> Self {
        Self {
            instance_of,
            type_args,
            properties: Rc::new(RefCell::new(properties)),
        }
    }

    pub fn get(&self, key: &str) -> Option<RuntimeVal> {
        self.properties
            .borrow()
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
    }

    pub fn set(&self, key: &str, value: RuntimeVal) {
        let mut properties = self.properties.borrow_mut();
        match properties.iter_mut().find(|(name, _)| name == key) {
            Some((_, slot)) => *slot = value,
            None => properties.push((key.to_string(), value)),
        }
    }

    pub fn len(&self) -> usize {
        self.properties.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<(String, RuntimeVal)> {
        self.properties.borrow().clone()
    }
}

impl PartialEq for ObjectVal {
    fn eq(&self, other: &Self) -> bool {
        self.instance_of == other.instance_of
            && (Rc::ptr_eq(&self.properties, &other.properties)
                || *self.properties.borrow() == *other.properties.borrow())
    }
}

impl ObjectVal {
    fn fmt_guarded(&self, f: &mut fmt::Formatter<'_>, seen: &mut Vec<*const ()>) -> fmt::Result {
        let ptr: *const () = Rc::as_ptr(&self.properties).cast();
        if seen.contains(&ptr) {
            return write!(f, "{CYCLE_MARKER}");
        }
        if let Some(name) = &self.instance_of {
            write!(f, "{name} ")?;
        }
        let properties = self.snapshot();
        if properties.is_empty() {
            return write!(f, "{{}}");
        }
        seen.push(ptr);
        write!(f, "{{ ")?;
        for (idx, (name, value)) in properties.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: ")?;
            value.fmt_nested(f, seen)?;
        }
        seen.pop();
        write!(f, " }}")
    }
}

impl fmt::Display for ObjectVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_guarded(f, &mut Vec::new())
    }
}

#[derive(Clone, Debug)]
pub struct ArrayVal {
    pub items: Rc<RefCell<Vec<RuntimeVal>>>,
}

impl ArrayVal {
    pub fn new(items: Vec<RuntimeVal>) -> Self {
        Self {
            items: Rc::new(RefCell::new(items)),
        }
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<RuntimeVal> {
        self.items.borrow().get(index).cloned()
    }

    pub fn set(&self, index: usize, value: RuntimeVal) -> bool {
        match self.items.borrow_mut().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> Vec<RuntimeVal> {
        self.items.borrow().clone()
    }
}

impl PartialEq for ArrayVal {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.items, &other.items) || *self.items.borrow() == *other.items.borrow()
    }
}

impl ArrayVal {
    fn fmt_guarded(&self, f: &mut fmt::Formatter<'_>, seen: &mut Vec<*const ()>) -> fmt::Result {
        let ptr: *const () = Rc::as_ptr(&self.items).cast();
        if seen.contains(&ptr) {
            return write!(f, "{CYCLE_MARKER}");
        }
        seen.push(ptr);
        write!(f, "[")?;
        for (idx, value) in self.snapshot().iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            value.fmt_nested(f, seen)?;
        }
        seen.pop();
        write!(f, "]")
    }
}

impl fmt::Display for ArrayVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_guarded(f, &mut Vec::new())
    }
}

pub type NativeCall = fn(&[RuntimeVal], &mut ExecutionContext) -> RuntimeResult<RuntimeVal>;

#[derive(Clone)]
pub struct NativeFnVal {
    pub name: &'static str,
    pub call: NativeCall,
}

impl fmt::Debug for NativeFnVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFnVal").field("name", &self.name).finish()
    }
}

/// A user function closed over the scope it was declared in.
#[derive(Debug)]
pub struct FunctionVal {
    pub declaration: Rc<FunctionDeclaration>,
    pub env: Environment,
}

impl FunctionVal {
    pub fn name(&self) -> &str {
        self.declaration.name.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!RuntimeVal::Null.is_truthy());
        assert!(!RuntimeVal::Number(0.0).is_truthy());
        assert!(!RuntimeVal::String(String::new()).is_truthy());
        assert!(RuntimeVal::String("0".into()).is_truthy());
        assert!(RuntimeVal::array(Vec::new()).is_truthy());
    }

    #[test]
    fn display_quotes_nested_strings_only() {
        let object = ObjectVal::new(
            Some("Person".into()),
            Vec::new(),
            vec![
                ("name".into(), RuntimeVal::String("Ada".into())),
                ("tags".into(), RuntimeVal::array(vec![RuntimeVal::Number(1.0)])),
            ],
        );
        assert_eq!(
            RuntimeVal::Object(object).to_string(),
            "Person { name: \"Ada\", tags: [1] }"
        );
        assert_eq!(RuntimeVal::String("Ada".into()).to_string(), "Ada");
        assert_eq!(RuntimeVal::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn self_containing_values_render_a_cycle_marker() {
        let object = ObjectVal::new(None, Vec::new(), vec![("x".into(), RuntimeVal::Number(1.0))]);
        object.set("me", RuntimeVal::Object(object.clone()));
        assert_eq!(object.to_string(), "{ x: 1, me: <cycle> }");

        let array = ArrayVal::new(vec![RuntimeVal::Number(1.0)]);
        let holder = ObjectVal::new(None, Vec::new(), vec![("list".into(), RuntimeVal::Array(array.clone()))]);
        array.items.borrow_mut().push(RuntimeVal::Object(holder));
        assert_eq!(array.to_string(), "[1, { list: <cycle> }]");
    }

    #[test]
    fn object_clones_share_properties() {
        let object = ObjectVal::new(None, Vec::new(), vec![("x".into(), RuntimeVal::Number(1.0))]);
        let alias = object.clone();
        alias.set("x", RuntimeVal::Number(2.0));
        alias.set("y", RuntimeVal::Boolean(true));
        assert_eq!(object.get("x"), Some(RuntimeVal::Number(2.0)));
        assert_eq!(object.len(), 2);
    }
}
