use crate::language::types::VarModifier;
use crate::runtime::{
    error::{RuntimeError, RuntimeResult},
    typecheck::{ensure_assignable, value_type, Mismatch},
    types::TypeVal,
    value::RuntimeVal,
};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

#[derive(Default)]
struct Scope {
    variables: HashMap<String, RuntimeVal>,
    constants: HashSet<String>,
    finals: HashSet<String>,
    /// Declared type, or the type inferred from the first non-null value.
    var_types: HashMap<String, TypeVal>,
    types: HashMap<String, TypeVal>,
    /// Keyed by (struct, member).
    methods: HashMap<(String, String), RuntimeVal>,
    getters: HashMap<(String, String), RuntimeVal>,
    /// (struct, contract) pairs.
    fulfillments: HashSet<(String, String)>,
}

struct Frame {
    scope: RefCell<Scope>,
    parent: Option<Environment>,
}

/// A lexical scope. Cloning yields another handle to the same scope; children keep
/// their parent alive, never the other way round.
#[derive(Clone)]
pub struct Environment {
    frame: Rc<Frame>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = self.frame.scope.borrow();
        let mut names: Vec<_> = scope.variables.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("variables", &names)
            .field("has_parent", &self.frame.parent.is_some())
            .finish()
    }
}

fn mismatch_error(name: &str, mismatch: Mismatch) -> RuntimeError {
    match mismatch {
        Mismatch::Nominal { actual, expected } => RuntimeError::NominalMismatch { actual, expected },
        Mismatch::Structural { actual, expected } => RuntimeError::VariableTypeMismatch {
            name: name.to_string(),
            actual,
            expected,
        },
    }
}

impl Environment {
    pub fn root() -> Self {
        Self {
            frame: Rc::new(Frame {
                scope: RefCell::new(Scope::default()),
                parent: None,
            }),
        }
    }

    pub fn child(&self) -> Self {
        Self {
            frame: Rc::new(Frame {
                scope: RefCell::new(Scope::default()),
                parent: Some(self.clone()),
            }),
        }
    }

    pub fn parent(&self) -> Option<&Environment> {
        self.frame.parent.as_ref()
    }

    fn ancestors(&self) -> impl Iterator<Item = &Environment> {
        std::iter::successors(Some(self), |env| env.parent())
    }

    /// Binds `name` in this scope. An annotated binding is checked before it is made;
    /// an uninitialised `var` (null value) skips the check.
    pub fn declare_var(
        &self,
        name: &str,
        value: RuntimeVal,
        modifier: VarModifier,
        ty: Option<TypeVal>,
    ) -> RuntimeResult<RuntimeVal> {
        if self.frame.scope.borrow().variables.contains_key(name) {
            return Err(RuntimeError::AlreadyDeclared {
                name: name.to_string(),
            });
        }

        let skip_check = value.is_null() && modifier == VarModifier::Variable;
        let recorded = match ty {
            Some(ty) => {
                if !skip_check {
                    ensure_assignable(&value, &ty, self).map_err(|m| mismatch_error(name, m))?;
                }
                Some(ty)
            }
            None if value.is_null() => None,
            None => Some(value_type(&value)),
        };

        let mut scope = self.frame.scope.borrow_mut();
        match modifier {
            VarModifier::Constant => {
                scope.constants.insert(name.to_string());
            }
            VarModifier::Final => {
                scope.finals.insert(name.to_string());
            }
            VarModifier::Variable => {}
        }
        if let Some(ty) = recorded {
            scope.var_types.insert(name.to_string(), ty);
        }
        scope.variables.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Binds a built-in constant without any checks.
    pub fn define_constant(&self, name: &str, value: RuntimeVal) {
        let mut scope = self.frame.scope.borrow_mut();
        scope.constants.insert(name.to_string());
        scope.variables.insert(name.to_string(), value);
    }

    pub fn assign_var(&self, name: &str, value: RuntimeVal) -> RuntimeResult<RuntimeVal> {
        let owner = self.resolve(name)?;
        owner.ensure_reassignable(name)?;

        let recorded = owner.frame.scope.borrow().var_types.get(name).cloned();
        match recorded {
            Some(ty) => {
                ensure_assignable(&value, &ty, self).map_err(|m| mismatch_error(name, m))?;
            }
            None if !value.is_null() => {
                owner
                    .frame
                    .scope
                    .borrow_mut()
                    .var_types
                    .insert(name.to_string(), value_type(&value));
            }
            None => {}
        }

        owner
            .frame
            .scope
            .borrow_mut()
            .variables
            .insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Fails when the nearest binding of `name` is constant or final.
    pub fn ensure_reassignable(&self, name: &str) -> RuntimeResult<()> {
        let owner = self.resolve(name)?;
        let scope = owner.frame.scope.borrow();
        if scope.constants.contains(name) {
            return Err(RuntimeError::ConstantAssignment {
                name: name.to_string(),
            });
        }
        if scope.finals.contains(name) {
            return Err(RuntimeError::FinalAssignment {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn lookup_var(&self, name: &str) -> RuntimeResult<RuntimeVal> {
        let owner = self.resolve(name)?;
        let scope = owner.frame.scope.borrow();
        scope
            .variables
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnresolvedVariable {
                name: name.to_string(),
            })
    }

    /// The nearest scope that binds `name`.
    pub fn resolve(&self, name: &str) -> RuntimeResult<Environment> {
        self.ancestors()
            .find(|env| env.frame.scope.borrow().variables.contains_key(name))
            .cloned()
            .ok_or_else(|| RuntimeError::UnresolvedVariable {
                name: name.to_string(),
            })
    }

    pub fn declare_type(&self, name: &str, ty: TypeVal) -> RuntimeResult<()> {
        let mut scope = self.frame.scope.borrow_mut();
        if scope.types.contains_key(name) {
            return Err(RuntimeError::TypeAlreadyDeclared {
                name: name.to_string(),
            });
        }
        scope.types.insert(name.to_string(), ty);
        Ok(())
    }

    /// Binds or replaces a type in this scope.
    pub fn define_type(&self, name: &str, ty: TypeVal) {
        self.frame
            .scope
            .borrow_mut()
            .types
            .insert(name.to_string(), ty);
    }

    pub fn lookup_type(&self, name: &str) -> Option<TypeVal> {
        self.ancestors()
            .find_map(|env| env.frame.scope.borrow().types.get(name).cloned())
    }

    pub fn register_method(&self, target: &str, name: &str, function: RuntimeVal) {
        self.frame
            .scope
            .borrow_mut()
            .methods
            .insert((target.to_string(), name.to_string()), function);
    }

    pub fn lookup_method(&self, target: &str, name: &str) -> Option<RuntimeVal> {
        let key = (target.to_string(), name.to_string());
        self.ancestors()
            .find_map(|env| env.frame.scope.borrow().methods.get(&key).cloned())
    }

    pub fn register_getter(&self, target: &str, name: &str, function: RuntimeVal) {
        self.frame
            .scope
            .borrow_mut()
            .getters
            .insert((target.to_string(), name.to_string()), function);
    }

    pub fn lookup_getter(&self, target: &str, name: &str) -> Option<RuntimeVal> {
        let key = (target.to_string(), name.to_string());
        self.ancestors()
            .find_map(|env| env.frame.scope.borrow().getters.get(&key).cloned())
    }

    pub fn record_fulfillment(&self, target: &str, contract: &str) {
        self.frame
            .scope
            .borrow_mut()
            .fulfillments
            .insert((target.to_string(), contract.to_string()));
    }

    pub fn fulfills(&self, target: &str, contract: &str) -> bool {
        let key = (target.to_string(), contract.to_string());
        self.ancestors()
            .any(|env| env.frame.scope.borrow().fulfillments.contains(&key))
    }
}
