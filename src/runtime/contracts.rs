use crate::language::{
    ast::{ContractFulfillment, FunctionDeclaration, GetterImpl},
    span::LeafNode,
};
use crate::runtime::{
    environment::Environment,
    error::{RuntimeError, RuntimeResult},
    interpreter::{make_function, Interpreter},
    types::{eval_type, eval_type_params, ContractMemberVal, ContractTypeVal, TypeVal},
    value::RuntimeVal,
};
use tracing::debug;

impl Interpreter {
    /// `fulfill Contract for Struct { .. }`: every contract member must be implemented
    /// with the same signature before any method is registered.
    pub(crate) fn eval_fulfillment(
        &mut self,
        fulfillment: &ContractFulfillment,
        env: &Environment,
    ) -> RuntimeResult<RuntimeVal> {
        let contract = resolve_contract(fulfillment.contract.as_str(), env)?;
        let target = resolve_target(fulfillment.target.as_str(), env)?;

        for expected in &contract.members {
            let implemented = implemented_signature(fulfillment, expected.name(), env)?.ok_or_else(|| {
                RuntimeError::MissingContractMember {
                    contract: contract.name.clone(),
                    member: expected.name().to_string(),
                    target: fulfillment.target.value.clone(),
                }
            })?;
            if implemented.signature() != expected.signature() {
                return Err(RuntimeError::SignatureMismatch {
                    implemented: implemented.signature(),
                    target: fulfillment.target.value.clone(),
                    contract: contract.name.clone(),
                    expected: expected.signature(),
                });
            }
        }

        for method in &fulfillment.methods {
            env.register_method(&target, method.name.as_str(), make_function(method, env));
        }
        for getter in &fulfillment.getters {
            env.register_getter(&target, getter.name.as_str(), make_function(&getter_function(getter), env));
        }
        env.record_fulfillment(&target, &contract.name);

        debug!(
            contract = %contract.name,
            target = %target,
            methods = fulfillment.methods.len(),
            getters = fulfillment.getters.len(),
            "fulfilled contract"
        );
        Ok(RuntimeVal::Placeholder)
    }
}

fn resolve_contract(name: &str, env: &Environment) -> RuntimeResult<ContractTypeVal> {
    let declared = env
        .lookup_type(name)
        .ok_or_else(|| RuntimeError::UnresolvedType {
            name: name.to_string(),
        })?;
    match declared.unaliased() {
        TypeVal::Contract(contract) => Ok(ContractTypeVal {
            name: name.to_string(),
            members: contract.members.clone(),
        }),
        _ => Err(RuntimeError::NotAContract {
            name: name.to_string(),
        }),
    }
}

/// The nominal tag instances of the target carry.
fn resolve_target(name: &str, env: &Environment) -> RuntimeResult<String> {
    let declared = env
        .lookup_type(name)
        .ok_or_else(|| RuntimeError::UnresolvedType {
            name: name.to_string(),
        })?;
    match declared.unaliased() {
        TypeVal::Struct(shape) => Ok(shape.name.clone()),
        _ => Err(RuntimeError::NotAStruct {
            name: name.to_string(),
        }),
    }
}

/// Signature of the implementation named `member`, methods before getters.
fn implemented_signature(
    fulfillment: &ContractFulfillment,
    member: &str,
    env: &Environment,
) -> RuntimeResult<Option<ContractMemberVal>> {
    if let Some(method) = fulfillment.methods.iter().find(|m| m.name.as_str() == member) {
        let (_, subs) = eval_type_params(&method.type_params, env)?;
        let params = method
            .params
            .iter()
            .map(|param| match &param.ty {
                Some(node) => eval_type(node, env, &subs),
                None => Ok(TypeVal::DYNAMIC),
            })
            .collect::<RuntimeResult<Vec<_>>>()?;
        let return_type = match &method.return_type {
            Some(node) => eval_type(node, env, &subs)?,
            None => TypeVal::DYNAMIC,
        };
        return Ok(Some(ContractMemberVal::Method {
            name: member.to_string(),
            params,
            return_type,
        }));
    }

    match fulfillment.getters.iter().find(|g| g.name.as_str() == member) {
        Some(getter) => Ok(Some(ContractMemberVal::Getter {
            name: member.to_string(),
            return_type: eval_type(&getter.return_type, env, &Default::default())?,
        })),
        None => Ok(None),
    }
}

/// A getter runs as a zero-argument method with `self` bound.
fn getter_function(getter: &GetterImpl) -> FunctionDeclaration {
    FunctionDeclaration {
        name: getter.name.clone(),
        type_params: Vec::new(),
        receiver: Some(LeafNode::new("self".to_string(), getter.name.position)),
        params: Vec::new(),
        return_type: Some(getter.return_type.clone()),
        body: getter.body.clone(),
        position: getter.name.position,
    }
}
