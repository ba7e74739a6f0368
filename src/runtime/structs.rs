use crate::language::{
    ast::{ObjectLiteral, Property, TypeDeclaration},
    types::TypeNode,
};
use crate::runtime::{
    environment::Environment,
    error::{RuntimeError, RuntimeResult},
    interpreter::Interpreter,
    typecheck::{ensure_assignable, value_type},
    types::{
        check_type_arguments, eval_type, eval_type_params, substitute, AliasTypeVal, Substitutions,
        StructTypeVal, TypeVal,
    },
    value::{ObjectVal, RuntimeVal},
};
use tracing::debug;

impl Interpreter {
    pub(crate) fn eval_type_declaration(
        &mut self,
        decl: &TypeDeclaration,
        env: &Environment,
    ) -> RuntimeResult<RuntimeVal> {
        let name = decl.name.as_str();
        let (type_params, subs) = eval_type_params(&decl.type_params, env)?;

        let ty = match &decl.definition {
            TypeNode::Struct(_) => {
                // Members may refer to the struct being declared. The placeholder lives in a
                // staging scope so a failed declaration leaves `env` untouched.
                let staging = env.child();
                staging.declare_type(
                    name,
                    TypeVal::Struct(StructTypeVal {
                        name: name.to_string(),
                        type_params: type_params.clone(),
                        type_args: Vec::new(),
                        members: Vec::new(),
                    }),
                )?;
                let members = match eval_type(&decl.definition, &staging, &subs)? {
                    TypeVal::Struct(shape) => shape.members,
                    _ => Vec::new(),
                };
                let ty = TypeVal::Struct(StructTypeVal {
                    name: name.to_string(),
                    type_params,
                    type_args: Vec::new(),
                    members,
                });
                env.declare_type(name, ty.clone())?;
                debug!(name, kind = "struct", "declared type");
                return Ok(RuntimeVal::Type(ty));
            }
            TypeNode::Contract(_) => match eval_type(&decl.definition, env, &subs)? {
                TypeVal::Contract(mut contract) => {
                    contract.name = name.to_string();
                    TypeVal::Contract(contract)
                }
                other => other,
            },
            TypeNode::Alias(alias) => {
                let target = eval_type(&alias.target, env, &subs)?;
                if let TypeVal::Alias(inner) = &target {
                    return Err(RuntimeError::AliasChain {
                        alias: name.to_string(),
                        target: inner.name.clone(),
                    });
                }
                TypeVal::Alias(AliasTypeVal {
                    name: name.to_string(),
                    target: Box::new(target),
                })
            }
            other => eval_type(other, env, &subs)?,
        };

        env.declare_type(name, ty.clone())?;
        debug!(name, kind = ty.kind(), "declared type");
        Ok(RuntimeVal::Type(ty))
    }

    /// Builds an anonymous object, or instantiates `Name { .. }` after checking every
    /// field against the struct declaration.
    pub(crate) fn eval_object_literal(
        &mut self,
        literal: &ObjectLiteral,
        env: &Environment,
    ) -> RuntimeResult<RuntimeVal> {
        let Some(type_name) = &literal.instance_of else {
            let mut properties = Vec::with_capacity(literal.properties.len());
            for property in &literal.properties {
                let value = self.eval_property(property, env)?;
                properties.push((property.key.value.clone(), value));
            }
            return Ok(RuntimeVal::Object(ObjectVal::new(None, Vec::new(), properties)));
        };

        let name = type_name.as_str();
        let declared = env
            .lookup_type(name)
            .ok_or_else(|| RuntimeError::UnresolvedType {
                name: name.to_string(),
            })?;
        let TypeVal::Struct(shape) = declared.unaliased() else {
            return Err(RuntimeError::NotAStruct {
                name: name.to_string(),
            });
        };

        let type_args = literal
            .type_args
            .iter()
            .map(|arg| eval_type(arg, env, &Substitutions::new()))
            .collect::<RuntimeResult<Vec<_>>>()?;
        if !type_args.is_empty() {
            check_type_arguments(shape, &type_args)?;
        }
        let subs = shape.substitutions(&type_args);

        let mut properties = Vec::with_capacity(shape.members.len());
        for member in &shape.members {
            let Some(property) = literal
                .properties
                .iter()
                .find(|property| property.key.value == member.name)
            else {
                if member.optional {
                    continue;
                }
                return Err(RuntimeError::MissingField {
                    field: member.name.clone(),
                    ty: name.to_string(),
                });
            };

            let value = self.eval_property(property, env)?;
            let expected = substitute(&member.ty, &subs);
            ensure_assignable(&value, &expected, env).map_err(|_| RuntimeError::FieldTypeMismatch {
                field: member.name.clone(),
                ty: name.to_string(),
                expected: expected.to_string(),
                actual: value_type(&value).to_string(),
            })?;
            properties.push((member.name.clone(), value));
        }

        if let Some(extra) = literal
            .properties
            .iter()
            .find(|property| shape.member(&property.key.value).is_none())
        {
            return Err(RuntimeError::UnknownField {
                field: extra.key.value.clone(),
                ty: name.to_string(),
            });
        }

        Ok(RuntimeVal::Object(ObjectVal::new(
            Some(shape.name.clone()),
            type_args,
            properties,
        )))
    }

    fn eval_property(&mut self, property: &Property, env: &Environment) -> RuntimeResult<RuntimeVal> {
        match &property.value {
            Some(expr) => self.eval_expr(expr, env),
            None => env.lookup_var(property.key.as_str()),
        }
    }

    /// Field writes on struct instances must name a declared member and keep its type.
    pub(crate) fn check_field_assignment(
        &self,
        object: &ObjectVal,
        field: &str,
        value: &RuntimeVal,
        env: &Environment,
    ) -> RuntimeResult<()> {
        let Some(tag) = &object.instance_of else {
            return Ok(());
        };
        let Some(declared) = env.lookup_type(tag) else {
            return Ok(());
        };
        let TypeVal::Struct(shape) = declared.unaliased() else {
            return Ok(());
        };
        let Some(member) = shape.member(field) else {
            return Err(RuntimeError::UnknownField {
                field: field.to_string(),
                ty: tag.clone(),
            });
        };

        let expected = substitute(&member.ty, &shape.substitutions(&object.type_args));
        ensure_assignable(value, &expected, env).map_err(|_| RuntimeError::FieldTypeMismatch {
            field: field.to_string(),
            ty: tag.clone(),
            expected: expected.to_string(),
            actual: value_type(value).to_string(),
        })
    }
}
