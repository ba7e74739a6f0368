use crate::config::InterpreterConfig;
use crate::language::{
    ast::*,
    span::Position,
    types::VarModifier,
};
use crate::runtime::{
    builtins::bootstrap,
    context::ExecutionContext,
    environment::Environment,
    error::{RuntimeError, RuntimeResult},
    typecheck::{ensure_assignable, value_type},
    types::{eval_type, eval_type_params, Substitutions, TypeVal},
    value::{FunctionVal, RuntimeVal},
};
use std::rc::Rc;
use tracing::debug;

/// Outcome of evaluating a statement or block. Anything other than `Normal` stops the
/// enclosing block and travels outwards until a loop or call consumes it.
#[derive(Clone, Debug, PartialEq)]
pub enum Flow {
    Normal(RuntimeVal),
    Return(RuntimeVal),
    Break(String),
    Continue(String),
}

pub struct Interpreter {
    globals: Environment,
    pub(crate) context: ExecutionContext,
}

impl Interpreter {
    pub fn new(file: impl Into<String>, config: InterpreterConfig) -> Self {
        let globals = Environment::root();
        bootstrap(&globals);
        Self {
            globals,
            context: ExecutionContext::new(file, config),
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Evaluates a program in the global scope and returns the value of its last
    /// statement.
    pub fn run(&mut self, program: &Program) -> RuntimeResult<RuntimeVal> {
        let globals = self.globals.clone();
        self.context.clear_failure_trace();
        let mut last = RuntimeVal::Placeholder;
        for stmt in &program.body {
            match self.eval_stmt(stmt, &globals) {
                Ok(Flow::Normal(value)) => last = value,
                Ok(Flow::Return(value)) => {
                    last = value;
                    break;
                }
                Ok(Flow::Break(_) | Flow::Continue(_)) => break,
                Err(err) => {
                    self.context.capture_failure_trace();
                    debug!(file = %program.file, error = %err, "run failed");
                    return Err(err);
                }
            }
        }
        debug!(file = %program.file, statements = program.body.len(), "run finished");
        Ok(last)
    }

    pub(crate) fn eval_stmt(&mut self, stmt: &Stmt, env: &Environment) -> RuntimeResult<Flow> {
        match stmt {
            Stmt::VarDeclaration(decl) => self.eval_var_declaration(decl, env).map(Flow::Normal),
            Stmt::MultiVarDeclaration(multi) => {
                let mut last = RuntimeVal::Placeholder;
                for decl in &multi.declarations {
                    last = self.eval_var_declaration(decl, env)?;
                }
                Ok(Flow::Normal(last))
            }
            Stmt::FunctionDeclaration(decl) => {
                let function = make_function(decl, env);
                debug!(function = decl.name.as_str(), params = decl.params.len(), "declared function");
                env.declare_var(decl.name.as_str(), function, VarModifier::Final, None)
                    .map(Flow::Normal)
            }
            Stmt::Return(ret) => {
                let value = match &ret.value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => RuntimeVal::Null,
                };
                Ok(Flow::Return(value))
            }
            Stmt::IfElse(stmt) => {
                for branch in &stmt.branches {
                    if self.eval_expr(&branch.condition, env)?.is_truthy() {
                        return self.eval_block(&branch.body, env);
                    }
                }
                match &stmt.else_body {
                    Some(body) => self.eval_block(body, env),
                    None => Ok(Flow::Normal(RuntimeVal::Placeholder)),
                }
            }
            Stmt::While(stmt) => self.eval_while(stmt, env),
            Stmt::For(stmt) => self.eval_for(stmt, env),
            Stmt::ForIn(stmt) => self.eval_for_in(stmt, env),
            Stmt::ForRange(stmt) => self.eval_for_range(stmt, env),
            Stmt::Break(stmt) => Ok(Flow::Break(stmt.loop_id.clone())),
            Stmt::Continue(stmt) => Ok(Flow::Continue(stmt.loop_id.clone())),
            Stmt::TypeDeclaration(decl) => self.eval_type_declaration(decl, env).map(Flow::Normal),
            Stmt::ContractFulfillment(fulfillment) => {
                self.eval_fulfillment(fulfillment, env).map(Flow::Normal)
            }
            Stmt::Expr(expr) => self.eval_expr(expr, env).map(Flow::Normal),
        }
    }

    /// Runs `body` in a fresh child scope of `env`.
    pub(crate) fn eval_block(&mut self, body: &[Stmt], env: &Environment) -> RuntimeResult<Flow> {
        let scope = env.child();
        self.eval_body(body, &scope)
    }

    pub(crate) fn eval_body(&mut self, body: &[Stmt], env: &Environment) -> RuntimeResult<Flow> {
        let mut last = RuntimeVal::Placeholder;
        for stmt in body {
            match self.eval_stmt(stmt, env)? {
                Flow::Normal(value) => last = value,
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal(last))
    }

    fn eval_var_declaration(&mut self, decl: &VarDeclaration, env: &Environment) -> RuntimeResult<RuntimeVal> {
        let value = match &decl.value {
            Some(expr) => self.eval_expr(expr, env)?,
            None => RuntimeVal::Null,
        };
        let ty = match &decl.ty {
            Some(node) => Some(eval_type(node, env, &Substitutions::new())?),
            None => None,
        };
        env.declare_var(decl.name.as_str(), value, decl.modifier, ty)
    }

    pub(crate) fn eval_expr(&mut self, expr: &Expr, env: &Environment) -> RuntimeResult<RuntimeVal> {
        match expr {
            Expr::Identifier(leaf) => env.lookup_var(leaf.as_str()),
            Expr::NumericLiteral(leaf) => Ok(RuntimeVal::Number(leaf.value)),
            Expr::StringLiteral(literal) => self.eval_string(literal, env),
            Expr::ArrayLiteral(literal) => {
                let items = literal
                    .elements
                    .iter()
                    .map(|element| self.eval_expr(element, env))
                    .collect::<RuntimeResult<Vec<_>>>()?;
                Ok(RuntimeVal::array(items))
            }
            Expr::ObjectLiteral(literal) => self.eval_object_literal(literal, env),
            Expr::Unary(unary) => {
                let operand = self.eval_expr(&unary.operand, env)?;
                Ok(apply_unary(unary.op, &operand))
            }
            Expr::Binary(binary) => {
                let left = self.eval_expr(&binary.left, env)?;
                let right = self.eval_expr(&binary.right, env)?;
                Ok(apply_binary(binary.op, &left, &right))
            }
            Expr::Assignment(assign) => match assign.assignee.as_ref() {
                Expr::Identifier(leaf) => {
                    let value = self.eval_expr(&assign.value, env)?;
                    env.assign_var(leaf.as_str(), value)
                }
                Expr::Member(member) => self.assign_member(member, &assign.value, env),
                other => Err(RuntimeError::InvalidAssignmentTarget {
                    target: other.kind().to_string(),
                }),
            },
            Expr::Member(member) => {
                let object = self.eval_expr(&member.object, env)?;
                if member.computed {
                    let index = self.eval_expr(&member.property, env)?;
                    self.read_index(&object, &index, member, env)
                } else {
                    self.read_property(&object, property_name(member)?, member.position, env)
                }
            }
            Expr::Call(call) => self.eval_call(call, env),
        }
    }

    /// Substitutes `#expr(N)` placeholders and `$name` references into the literal text.
    fn eval_string(&mut self, literal: &StringLiteral, env: &Environment) -> RuntimeResult<RuntimeVal> {
        if literal.is_plain() {
            return Ok(RuntimeVal::String(literal.value.clone()));
        }

        let mut rendered = Vec::with_capacity(literal.expressions.len());
        for (key, expr) in &literal.expressions {
            rendered.push((key.as_str(), self.eval_expr(expr, env)?.to_string()));
        }

        let mut out = String::with_capacity(literal.value.len());
        let mut rest = literal.value.as_str();
        while let Some(idx) = rest.find(|ch: char| ch == '$' || ch == '#') {
            out.push_str(&rest[..idx]);
            rest = &rest[idx..];

            if let Some((key, text)) = rendered.iter().find(|(key, _)| rest.starts_with(*key)) {
                out.push_str(text);
                rest = &rest[key.len()..];
                continue;
            }
            if let Some(tail) = rest.strip_prefix('$') {
                let end = tail
                    .find(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
                    .unwrap_or(tail.len());
                let name = &tail[..end];
                if literal.identifiers.iter().any(|id| id == name) {
                    out.push_str(&env.lookup_var(name)?.to_string());
                    rest = &tail[end..];
                    continue;
                }
            }
            out.push_str(&rest[..1]);
            rest = &rest[1..];
        }
        out.push_str(rest);
        Ok(RuntimeVal::String(out))
    }

    fn read_index(
        &mut self,
        object: &RuntimeVal,
        index: &RuntimeVal,
        member: &MemberExpr,
        env: &Environment,
    ) -> RuntimeResult<RuntimeVal> {
        let out_of_bounds = |n: f64| RuntimeError::IndexOutOfBounds {
            index: n.to_string(),
            name: describe_target(&member.object),
        };
        match (object, index) {
            (RuntimeVal::Array(array), RuntimeVal::Number(n)) => checked_index(*n, array.len())
                .and_then(|slot| array.get(slot))
                .ok_or_else(|| out_of_bounds(*n)),
            (RuntimeVal::String(text), RuntimeVal::Number(n)) => checked_index(*n, text.chars().count())
                .and_then(|slot| text.chars().nth(slot))
                .map(|ch| RuntimeVal::String(ch.to_string()))
                .ok_or_else(|| out_of_bounds(*n)),
            (RuntimeVal::Array(_) | RuntimeVal::String(_), _) => Err(RuntimeError::NonNumericIndex),
            (RuntimeVal::Object(_), RuntimeVal::String(key)) => {
                self.read_property(object, key, member.position, env)
            }
            (other, index) => Err(RuntimeError::InvalidMember {
                property: index.to_string(),
                kind: other.kind().to_string(),
            }),
        }
    }

    /// Own properties first, then fulfilled getters, then `null` for declared optional
    /// fields.
    pub(crate) fn read_property(
        &mut self,
        object: &RuntimeVal,
        name: &str,
        position: Position,
        env: &Environment,
    ) -> RuntimeResult<RuntimeVal> {
        match object {
            RuntimeVal::Object(obj) => {
                if let Some(value) = obj.get(name) {
                    return Ok(value);
                }
                let Some(tag) = &obj.instance_of else {
                    return Err(RuntimeError::UnknownProperty {
                        property: name.to_string(),
                        ty: "object".to_string(),
                    });
                };
                if let Some(getter) = env.lookup_getter(tag, name) {
                    return self.call_value(getter, Vec::new(), Some(object.clone()), position);
                }
                let optional = env.lookup_type(tag).is_some_and(|ty| {
                    matches!(ty.unaliased(), TypeVal::Struct(st)
                        if st.member(name).is_some_and(|member| member.optional))
                });
                if optional {
                    Ok(RuntimeVal::Null)
                } else {
                    Err(RuntimeError::UnknownProperty {
                        property: name.to_string(),
                        ty: tag.clone(),
                    })
                }
            }
            RuntimeVal::Array(array) if name == "length" => Ok(RuntimeVal::Number(array.len() as f64)),
            RuntimeVal::String(text) if name == "length" => {
                Ok(RuntimeVal::Number(text.chars().count() as f64))
            }
            other => Err(RuntimeError::InvalidMember {
                property: name.to_string(),
                kind: other.kind().to_string(),
            }),
        }
    }

    /// `a.b = v` and `a[i] = v`. The root binding must be reassignable, and struct
    /// fields keep their declared types.
    fn assign_member(
        &mut self,
        member: &MemberExpr,
        value_expr: &Expr,
        env: &Environment,
    ) -> RuntimeResult<RuntimeVal> {
        let root = root_identifier(&member.object).ok_or_else(|| {
            RuntimeError::InvalidAssignmentTarget {
                target: describe_target(&member.object),
            }
        })?;
        env.ensure_reassignable(root)?;

        let container = self.eval_expr(&member.object, env)?;
        let key = if member.computed {
            self.eval_expr(&member.property, env)?
        } else {
            RuntimeVal::String(property_name(member)?.to_string())
        };
        let value = self.eval_expr(value_expr, env)?;

        match (&container, &key) {
            (RuntimeVal::Object(object), RuntimeVal::String(field)) => {
                self.check_field_assignment(object, field, &value, env)?;
                object.set(field, value.clone());
            }
            (RuntimeVal::Array(array), RuntimeVal::Number(n)) => {
                let slot = checked_index(*n, array.len()).ok_or_else(|| {
                    RuntimeError::IndexOutOfBounds {
                        index: n.to_string(),
                        name: describe_target(&member.object),
                    }
                })?;
                array.set(slot, value.clone());
            }
            (RuntimeVal::Array(_), _) => return Err(RuntimeError::NonNumericIndex),
            (other, key) => {
                return Err(RuntimeError::InvalidMember {
                    property: key.to_string(),
                    kind: other.kind().to_string(),
                })
            }
        }
        Ok(value)
    }

    fn eval_call(&mut self, call: &CallExpr, env: &Environment) -> RuntimeResult<RuntimeVal> {
        let (callee, receiver) = match call.caller.as_ref() {
            Expr::Member(member) if !member.computed => {
                let object = self.eval_expr(&member.object, env)?;
                let name = property_name(member)?;
                let method = match &object {
                    RuntimeVal::Object(obj) => obj
                        .instance_of
                        .as_deref()
                        .and_then(|tag| env.lookup_method(tag, name)),
                    _ => None,
                };
                match method {
                    Some(method) => (method, Some(object)),
                    None => (self.read_property(&object, name, member.position, env)?, None),
                }
            }
            other => (self.eval_expr(other, env)?, None),
        };

        let args = call
            .args
            .iter()
            .map(|arg| self.eval_expr(arg, env))
            .collect::<RuntimeResult<Vec<_>>>()?;
        self.call_value(callee, args, receiver, call.position)
    }

    pub(crate) fn call_value(
        &mut self,
        callee: RuntimeVal,
        args: Vec<RuntimeVal>,
        receiver: Option<RuntimeVal>,
        position: Position,
    ) -> RuntimeResult<RuntimeVal> {
        match callee {
            RuntimeVal::NativeFn(native) => (native.call)(&args, &mut self.context),
            RuntimeVal::Function(function) => self.call_function(&function, args, receiver, position),
            other => Err(RuntimeError::NotCallable {
                kind: other.kind().to_string(),
            }),
        }
    }

    fn call_function(
        &mut self,
        function: &FunctionVal,
        args: Vec<RuntimeVal>,
        receiver: Option<RuntimeVal>,
        position: Position,
    ) -> RuntimeResult<RuntimeVal> {
        let decl = function.declaration.as_ref();
        let name = decl.name.as_str();
        if args.len() != decl.params.len() {
            return Err(RuntimeError::ArityMismatch {
                name: name.to_string(),
                expected: decl.params.len(),
                received: args.len(),
            });
        }

        let closure = &function.env;
        let scope = closure.child();
        let (_, subs) = eval_type_params(&decl.type_params, closure)?;

        if let (Some(self_name), Some(receiver)) = (&decl.receiver, receiver) {
            scope.declare_var(self_name.as_str(), receiver, VarModifier::Variable, None)?;
        }

        for (param, arg) in decl.params.iter().zip(args) {
            let value = match (&param.default, arg) {
                (Some(default), RuntimeVal::Null) => self.eval_expr(default, &scope)?,
                (_, arg) => arg,
            };
            let ty = match &param.ty {
                Some(node) => Some(eval_type(node, &scope, &subs)?),
                None => None,
            };
            if let Some(ty) = &ty {
                ensure_assignable(&value, ty, &scope).map_err(|_| RuntimeError::ParamTypeMismatch {
                    param: param.name.value.clone(),
                    function: name.to_string(),
                    expected: ty.to_string(),
                    actual: value_type(&value).to_string(),
                })?;
            }
            scope.declare_var(param.name.as_str(), value, VarModifier::Variable, ty)?;
        }

        self.context.push_frame(name, position)?;
        let outcome = self.eval_body(&decl.body, &scope);
        if outcome.is_err() {
            self.context.capture_failure_trace();
        }
        self.context.pop_frame();

        let value = match outcome? {
            Flow::Return(value) => value,
            _ => RuntimeVal::Null,
        };
        if let Some(node) = &decl.return_type {
            let expected = eval_type(node, &scope, &subs)?;
            ensure_assignable(&value, &expected, &scope).map_err(|_| {
                RuntimeError::ReturnTypeMismatch {
                    name: name.to_string(),
                    expected: expected.to_string(),
                    actual: value_type(&value).to_string(),
                }
            })?;
        }
        Ok(value)
    }
}

pub(crate) fn make_function(decl: &FunctionDeclaration, env: &Environment) -> RuntimeVal {
    RuntimeVal::Function(Rc::new(FunctionVal {
        declaration: Rc::new(decl.clone()),
        env: env.clone(),
    }))
}

/// Numeric, boolean and string operators. Unsupported pairings produce `null`.
pub fn apply_binary(op: BinaryOp, left: &RuntimeVal, right: &RuntimeVal) -> RuntimeVal {
    use RuntimeVal::{Boolean, Null, Number};

    match (left, right) {
        (Number(a), Number(b)) => {
            let (a, b) = (*a, *b);
            match op {
                BinaryOp::Add => Number(a + b),
                BinaryOp::Sub => Number(a - b),
                BinaryOp::Mul => Number(a * b),
                BinaryOp::Div => Number(a / b),
                BinaryOp::Mod => Number(a % b),
                BinaryOp::Pow => Number(a.powf(b)),
                BinaryOp::Eq => Boolean(a == b),
                BinaryOp::NotEq => Boolean(a != b),
                BinaryOp::Lt => Boolean(a < b),
                BinaryOp::Gt => Boolean(a > b),
                BinaryOp::LtEq => Boolean(a <= b),
                BinaryOp::GtEq => Boolean(a >= b),
                BinaryOp::And | BinaryOp::Or => Null,
            }
        }
        (Boolean(a), Boolean(b)) => match op {
            BinaryOp::And => Boolean(*a && *b),
            BinaryOp::Or => Boolean(*a || *b),
            BinaryOp::Eq => Boolean(a == b),
            BinaryOp::NotEq => Boolean(a != b),
            _ => Null,
        },
        (RuntimeVal::String(a), RuntimeVal::String(b)) => match op {
            BinaryOp::Add => RuntimeVal::String(format!("{a}{b}")),
            BinaryOp::Eq => Boolean(a == b),
            BinaryOp::NotEq => Boolean(a != b),
            _ => Null,
        },
        (RuntimeVal::String(a), other @ (Number(_) | Boolean(_))) if op == BinaryOp::Add => {
            RuntimeVal::String(format!("{a}{other}"))
        }
        (other @ (Number(_) | Boolean(_)), RuntimeVal::String(b)) if op == BinaryOp::Add => {
            RuntimeVal::String(format!("{other}{b}"))
        }
        _ => Null,
    }
}

pub fn apply_unary(op: UnaryOp, operand: &RuntimeVal) -> RuntimeVal {
    match (op, operand) {
        (UnaryOp::Negate, RuntimeVal::Number(n)) => RuntimeVal::Number(-n),
        (UnaryOp::Not, RuntimeVal::Boolean(b)) => RuntimeVal::Boolean(!b),
        _ => RuntimeVal::Null,
    }
}

fn property_name(member: &MemberExpr) -> RuntimeResult<&str> {
    match member.property.as_ref() {
        Expr::Identifier(leaf) => Ok(leaf.as_str()),
        other => Err(RuntimeError::InvalidMember {
            property: other.kind().to_string(),
            kind: "member expression".to_string(),
        }),
    }
}

fn checked_index(n: f64, len: usize) -> Option<usize> {
    if n >= 0.0 && n.fract() == 0.0 && (n as usize) < len {
        Some(n as usize)
    } else {
        None
    }
}

fn root_identifier(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Identifier(leaf) => Some(leaf.as_str()),
        Expr::Member(member) => root_identifier(&member.object),
        _ => None,
    }
}

/// Source-like rendering of an access path, for error messages.
fn describe_target(expr: &Expr) -> String {
    match expr {
        Expr::Identifier(leaf) => leaf.value.clone(),
        Expr::Member(member) => match (member.computed, member.property.as_ref()) {
            (false, Expr::Identifier(property)) => {
                format!("{}.{}", describe_target(&member.object), property.value)
            }
            _ => format!("{}[]", describe_target(&member.object)),
        },
        other => other.kind().to_string(),
    }
}
