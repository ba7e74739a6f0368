use crate::language::{
    ast::{Expr, ForInStatement, ForRangeStatement, ForStatement, WhileStatement},
    span::LeafNode,
    types::VarModifier,
};
use crate::runtime::{
    environment::Environment,
    error::{RuntimeError, RuntimeResult},
    interpreter::{Flow, Interpreter},
    typecheck::value_type,
    value::RuntimeVal,
};
use tracing::trace;

/// What a loop does with the flow its body produced.
enum LoopControl {
    Next,
    Exit,
    Propagate(Flow),
}

impl LoopControl {
    /// `break`/`skip` only stop here when they target this loop's id; anything aimed
    /// further out keeps unwinding.
    fn from_flow(flow: Flow, loop_id: &str) -> Self {
        match flow {
            Flow::Normal(_) => LoopControl::Next,
            Flow::Continue(target) if target == loop_id => LoopControl::Next,
            Flow::Break(target) if target == loop_id => LoopControl::Exit,
            other => LoopControl::Propagate(other),
        }
    }
}

impl Interpreter {
    fn within_loop(
        &mut self,
        loop_id: &str,
        run: impl FnOnce(&mut Self) -> RuntimeResult<Flow>,
    ) -> RuntimeResult<Flow> {
        self.context.enter_loop(loop_id);
        trace!(loop_id, "entering loop");
        let outcome = run(self);
        self.context.exit_loop();
        trace!(loop_id, "leaving loop");
        outcome
    }

    pub(crate) fn eval_while(&mut self, stmt: &WhileStatement, env: &Environment) -> RuntimeResult<Flow> {
        self.within_loop(&stmt.loop_id, |this| {
            while this.eval_expr(&stmt.condition, env)?.is_truthy() {
                match LoopControl::from_flow(this.eval_block(&stmt.body, env)?, &stmt.loop_id) {
                    LoopControl::Next => {}
                    LoopControl::Exit => break,
                    LoopControl::Propagate(flow) => return Ok(flow),
                }
            }
            Ok(Flow::Normal(RuntimeVal::Placeholder))
        })
    }

    /// Infinite, pre-condition and C-style loops. The update clause also runs after
    /// `skip`.
    pub(crate) fn eval_for(&mut self, stmt: &ForStatement, env: &Environment) -> RuntimeResult<Flow> {
        let scope = env.child();
        if let Some(init) = &stmt.init {
            self.eval_stmt(init, &scope)?;
        }

        self.within_loop(&stmt.loop_id, |this| {
            loop {
                if let Some(condition) = &stmt.condition {
                    if !this.eval_expr(condition, &scope)?.is_truthy() {
                        break;
                    }
                }
                match LoopControl::from_flow(this.eval_block(&stmt.body, &scope)?, &stmt.loop_id) {
                    LoopControl::Next => {}
                    LoopControl::Exit => break,
                    LoopControl::Propagate(flow) => return Ok(flow),
                }
                if let Some(update) = &stmt.update {
                    this.eval_expr(update, &scope)?;
                }
            }
            Ok(Flow::Normal(RuntimeVal::Placeholder))
        })
    }

    pub(crate) fn eval_for_in(&mut self, stmt: &ForInStatement, env: &Environment) -> RuntimeResult<Flow> {
        let items = match self.eval_expr(&stmt.iterable, env)? {
            RuntimeVal::Array(array) => array.snapshot(),
            RuntimeVal::String(text) => text
                .chars()
                .map(|ch| RuntimeVal::String(ch.to_string()))
                .collect(),
            other => {
                return Err(RuntimeError::NotIterable {
                    kind: value_type(&other).to_string(),
                })
            }
        };

        self.within_loop(&stmt.loop_id, |this| {
            for (index, item) in items.into_iter().enumerate() {
                let scope = env.child();
                bind_iteration(&scope, stmt.index.as_ref(), index, &stmt.value, item)?;
                match LoopControl::from_flow(this.eval_body(&stmt.body, &scope)?, &stmt.loop_id) {
                    LoopControl::Next => {}
                    LoopControl::Exit => break,
                    LoopControl::Propagate(flow) => return Ok(flow),
                }
            }
            Ok(Flow::Normal(RuntimeVal::Placeholder))
        })
    }

    /// `range A to B` stops before `B`, `range A through B` includes it. A negative step
    /// counts down.
    pub(crate) fn eval_for_range(&mut self, stmt: &ForRangeStatement, env: &Environment) -> RuntimeResult<Flow> {
        let start = self.eval_number(&stmt.start, env, "Range start")?;
        let end = self.eval_number(&stmt.end, env, "Range end")?;
        let step = match &stmt.step {
            Some(expr) => self.eval_number(expr, env, "Range step")?,
            None => 1.0,
        };
        if step == 0.0 {
            return Err(RuntimeError::ZeroStep);
        }

        self.within_loop(&stmt.loop_id, |this| {
            let mut index = 0;
            loop {
                let value = start + index as f64 * step;
                let in_range = match (step > 0.0, stmt.inclusive) {
                    (true, true) => value <= end,
                    (true, false) => value < end,
                    (false, true) => value >= end,
                    (false, false) => value > end,
                };
                if !in_range {
                    break;
                }

                let scope = env.child();
                bind_iteration(
                    &scope,
                    stmt.index.as_ref(),
                    index,
                    &stmt.value,
                    RuntimeVal::Number(value),
                )?;
                match LoopControl::from_flow(this.eval_body(&stmt.body, &scope)?, &stmt.loop_id) {
                    LoopControl::Next => {}
                    LoopControl::Exit => break,
                    LoopControl::Propagate(flow) => return Ok(flow),
                }
                index += 1;
            }
            Ok(Flow::Normal(RuntimeVal::Placeholder))
        })
    }

    fn eval_number(&mut self, expr: &Expr, env: &Environment, role: &str) -> RuntimeResult<f64> {
        match self.eval_expr(expr, env)? {
            RuntimeVal::Number(n) => Ok(n),
            other => Err(RuntimeError::TypeMismatch {
                message: format!("{role} must be a number, but got {}", value_type(&other)),
            }),
        }
    }
}

fn bind_iteration(
    scope: &Environment,
    index: Option<&LeafNode<String>>,
    position: usize,
    value: &LeafNode<String>,
    item: RuntimeVal,
) -> RuntimeResult<()> {
    if let Some(index) = index {
        scope.declare_var(
            index.as_str(),
            RuntimeVal::Number(position as f64),
            VarModifier::Final,
            None,
        )?;
    }
    scope.declare_var(value.as_str(), item, VarModifier::Final, None)?;
    Ok(())
}
