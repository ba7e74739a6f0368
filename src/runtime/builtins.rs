use crate::runtime::{
    context::ExecutionContext,
    environment::Environment,
    error::{RuntimeError, RuntimeResult},
    typecheck::value_type,
    types::{PrimitiveType, TypeVal},
    value::{NativeCall, NativeFnVal, RuntimeVal},
};
use std::time::{SystemTime, UNIX_EPOCH};

const PRIMITIVES: [PrimitiveType; 5] = [
    PrimitiveType::Number,
    PrimitiveType::String,
    PrimitiveType::Bool,
    PrimitiveType::Null,
    PrimitiveType::Dynamic,
];

const NATIVES: [(&str, NativeCall); 6] = [
    ("print", native_print),
    ("len", native_len),
    ("typeof", native_typeof),
    ("str", native_str),
    ("time", native_time),
    ("trace", native_trace),
];

/// Seeds a fresh root scope with the primitive types, constants and native functions.
pub fn bootstrap(env: &Environment) {
    for primitive in PRIMITIVES {
        env.define_type(primitive.name(), TypeVal::Primitive(primitive));
    }

    env.define_constant("true", RuntimeVal::Boolean(true));
    env.define_constant("false", RuntimeVal::Boolean(false));
    env.define_constant("null", RuntimeVal::Null);

    for (name, call) in NATIVES {
        env.define_constant(name, RuntimeVal::NativeFn(NativeFnVal { name, call }));
    }
}

fn expect_one<'a>(name: &str, args: &'a [RuntimeVal]) -> RuntimeResult<&'a RuntimeVal> {
    match args {
        [value] => Ok(value),
        _ => Err(RuntimeError::ArityMismatch {
            name: name.to_string(),
            expected: 1,
            received: args.len(),
        }),
    }
}

fn native_print(args: &[RuntimeVal], ctx: &mut ExecutionContext) -> RuntimeResult<RuntimeVal> {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    ctx.write_line(line);
    Ok(RuntimeVal::Null)
}

fn native_len(args: &[RuntimeVal], _: &mut ExecutionContext) -> RuntimeResult<RuntimeVal> {
    let length = match expect_one("len", args)? {
        RuntimeVal::String(s) => s.chars().count(),
        RuntimeVal::Array(array) => array.len(),
        RuntimeVal::Object(object) => object.len(),
        other => {
            return Err(RuntimeError::TypeMismatch {
                message: format!("len expects a string, array or object, but got {}", other.kind()),
            })
        }
    };
    Ok(RuntimeVal::Number(length as f64))
}

fn native_typeof(args: &[RuntimeVal], _: &mut ExecutionContext) -> RuntimeResult<RuntimeVal> {
    let value = expect_one("typeof", args)?;
    let name = match value {
        RuntimeVal::Object(object) if object.instance_of.is_none() => "object".to_string(),
        RuntimeVal::NativeFn(_) | RuntimeVal::Function(_) => "function".to_string(),
        RuntimeVal::Type(_) => "type".to_string(),
        other => value_type(other).to_string(),
    };
    Ok(RuntimeVal::String(name))
}

fn native_str(args: &[RuntimeVal], _: &mut ExecutionContext) -> RuntimeResult<RuntimeVal> {
    Ok(RuntimeVal::String(expect_one("str", args)?.to_string()))
}

fn native_time(_: &[RuntimeVal], _: &mut ExecutionContext) -> RuntimeResult<RuntimeVal> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
        .unwrap_or(0.0);
    Ok(RuntimeVal::Number(millis.floor()))
}

fn native_trace(_: &[RuntimeVal], ctx: &mut ExecutionContext) -> RuntimeResult<RuntimeVal> {
    let trace = ctx.format_stack_trace();
    for line in trace.lines() {
        ctx.write_line(line);
    }
    Ok(RuntimeVal::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterpreterConfig;
    use crate::runtime::value::ObjectVal;

    fn quiet_context() -> ExecutionContext {
        ExecutionContext::new("t.sbl", InterpreterConfig::default().with_echo_output(false))
    }

    fn call(env: &Environment, name: &str, args: &[RuntimeVal]) -> RuntimeResult<RuntimeVal> {
        let mut ctx = quiet_context();
        match env.lookup_var(name)? {
            RuntimeVal::NativeFn(native) => (native.call)(args, &mut ctx),
            other => panic!("{name} is {}", other.kind()),
        }
    }

    #[test]
    fn bootstrap_seeds_types_and_constants() {
        let env = Environment::root();
        bootstrap(&env);
        assert_eq!(env.lookup_type("bool"), Some(TypeVal::Primitive(PrimitiveType::Bool)));
        assert_eq!(env.lookup_var("true"), Ok(RuntimeVal::Boolean(true)));
        assert!(env.assign_var("null", RuntimeVal::Number(1.0)).is_err());
    }

    #[test]
    fn print_joins_arguments() {
        let mut ctx = quiet_context();
        native_print(
            &[RuntimeVal::String("total".into()), RuntimeVal::Number(3.0)],
            &mut ctx,
        )
        .expect("print");
        assert_eq!(ctx.output(), ["total 3".to_string()]);
    }

    #[test]
    fn len_and_typeof() {
        let env = Environment::root();
        bootstrap(&env);
        assert_eq!(
            call(&env, "len", &[RuntimeVal::String("héllo".into())]),
            Ok(RuntimeVal::Number(5.0))
        );
        assert!(call(&env, "len", &[RuntimeVal::Number(1.0)]).is_err());

        let point = RuntimeVal::Object(ObjectVal::new(Some("Point".into()), Vec::new(), Vec::new()));
        assert_eq!(
            call(&env, "typeof", &[point]),
            Ok(RuntimeVal::String("Point".into()))
        );
        assert_eq!(
            call(&env, "typeof", &[RuntimeVal::Boolean(true)]),
            Ok(RuntimeVal::String("bool".into()))
        );
    }

    #[test]
    fn str_requires_exactly_one_argument() {
        let env = Environment::root();
        bootstrap(&env);
        assert_eq!(
            call(&env, "str", &[]),
            Err(RuntimeError::ArityMismatch {
                name: "str".into(),
                expected: 1,
                received: 0,
            })
        );
    }
}
