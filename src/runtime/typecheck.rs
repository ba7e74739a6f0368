//! Structural compatibility over runtime type descriptors, plus the nominal and
//! contract checks applied when a value is bound to an annotated name.

use crate::runtime::{
    environment::Environment,
    types::{
        substitute, FunctionTypeVal, GenericTypeVal, MemberVal, PrimitiveType, StructTypeVal,
        TypeVal,
    },
    value::RuntimeVal,
};

/// Whether a value of type `source` may flow into `target`. The resolved (alias-free)
/// pair that decided the answer is returned alongside it.
pub fn are_types_compatible(source: &TypeVal, target: &TypeVal) -> (bool, TypeVal, TypeVal) {
    if source.is_dynamic() || target.is_dynamic() {
        return (true, source.clone(), target.clone());
    }

    match (source, target) {
        (TypeVal::Primitive(a), TypeVal::Primitive(b)) => (a == b, source.clone(), target.clone()),
        (TypeVal::Union(members), _) => {
            let all = members
                .iter()
                .all(|member| are_types_compatible(member, target).0);
            (all, source.clone(), target.clone())
        }
        (_, TypeVal::Union(members)) => {
            for member in members {
                let result = are_types_compatible(source, member);
                if result.0 {
                    return result;
                }
            }
            (false, source.clone(), target.clone())
        }
        (TypeVal::Alias(alias), _) => are_types_compatible(&alias.target, target),
        (_, TypeVal::Alias(alias)) => are_types_compatible(source, &alias.target),
        (TypeVal::Array(a), TypeVal::Array(b)) => {
            let (compatible, _, _) = are_types_compatible(a, b);
            (compatible, source.clone(), target.clone())
        }
        (TypeVal::Struct(a), TypeVal::Struct(b)) => {
            (struct_covers(a, b), source.clone(), target.clone())
        }
        (TypeVal::Generic(a), TypeVal::Generic(b)) => {
            let compatible = a.name == b.name
                && a.params.len() == b.params.len()
                && a.params
                    .iter()
                    .zip(&b.params)
                    .all(|(x, y)| are_types_compatible(x, y).0);
            (compatible, source.clone(), target.clone())
        }
        (_, TypeVal::TypeParameter(param)) => {
            let compatible = match &param.constraint {
                Some(constraint) => are_types_compatible(source, constraint).0,
                None => true,
            };
            (compatible, source.clone(), target.clone())
        }
        (TypeVal::TypeParameter(param), _) => {
            let compatible = match &param.constraint {
                Some(constraint) => are_types_compatible(constraint, target).0,
                None => false,
            };
            (compatible, source.clone(), target.clone())
        }
        (TypeVal::Function(a), TypeVal::Function(b)) => {
            (functions_match(a, b), source.clone(), target.clone())
        }
        (TypeVal::Contract(a), TypeVal::Contract(b)) => {
            (a.name == b.name, source.clone(), target.clone())
        }
        _ => (false, source.clone(), target.clone()),
    }
}

/// Width subtyping: every required member of `target` must exist on `source` with a
/// compatible type. Extra members on `source` are fine.
fn struct_covers(source: &StructTypeVal, target: &StructTypeVal) -> bool {
    target.members.iter().all(|wanted| match source.member(&wanted.name) {
        Some(found) => are_types_compatible(&found.ty, &wanted.ty).0,
        None => wanted.optional,
    })
}

fn functions_match(source: &FunctionTypeVal, target: &FunctionTypeVal) -> bool {
    if source.params.len() != target.params.len() {
        return false;
    }
    let params_match = source
        .params
        .iter()
        .zip(&target.params)
        .all(|(a, b)| are_types_compatible(b, a).0);
    let return_matches = match (&source.return_type, &target.return_type) {
        (Some(a), Some(b)) => are_types_compatible(a, b).0,
        _ => true,
    };
    params_match && return_matches
}

/// Coarse classification: primitives for scalars, `dynamic` for everything else.
pub fn get_runtime_type(value: &RuntimeVal) -> TypeVal {
    match value {
        RuntimeVal::Number(_) => TypeVal::Primitive(PrimitiveType::Number),
        RuntimeVal::String(_) => TypeVal::Primitive(PrimitiveType::String),
        RuntimeVal::Boolean(_) => TypeVal::Primitive(PrimitiveType::Bool),
        _ => TypeVal::DYNAMIC,
    }
}

/// The full type of a value, including the shape of objects and arrays. A value that
/// contains itself is typed `dynamic` at the point of recursion.
pub fn value_type(value: &RuntimeVal) -> TypeVal {
    shape_of(value, &mut Vec::new())
}

fn shape_of(value: &RuntimeVal, seen: &mut Vec<*const ()>) -> TypeVal {
    let ptr = value.shared_ptr();
    if let Some(ptr) = ptr {
        if seen.contains(&ptr) {
            return TypeVal::DYNAMIC;
        }
        seen.push(ptr);
    }
    let ty = match value {
        RuntimeVal::Null | RuntimeVal::Placeholder => TypeVal::NULL,
        RuntimeVal::Number(_) | RuntimeVal::String(_) | RuntimeVal::Boolean(_) => {
            get_runtime_type(value)
        }
        RuntimeVal::Object(object) => match (&object.instance_of, object.type_args.is_empty()) {
            (Some(name), false) => TypeVal::Generic(GenericTypeVal {
                name: name.clone(),
                params: object.type_args.clone(),
            }),
            _ => TypeVal::Struct(StructTypeVal {
                name: object.instance_of.clone().unwrap_or_default(),
                type_params: Vec::new(),
                type_args: Vec::new(),
                members: object
                    .snapshot()
                    .iter()
                    .map(|(name, value)| MemberVal {
                        name: name.clone(),
                        ty: shape_of(value, seen),
                        optional: false,
                    })
                    .collect(),
            }),
        },
        RuntimeVal::Array(array) => {
            let mut element_types: Vec<TypeVal> = Vec::new();
            for item in array.snapshot() {
                let ty = shape_of(&item, seen);
                if !element_types.contains(&ty) {
                    element_types.push(ty);
                }
            }
            let element = match element_types.len() {
                0 => TypeVal::DYNAMIC,
                1 => element_types.remove(0),
                _ => TypeVal::Union(element_types),
            };
            TypeVal::Array(Box::new(element))
        }
        RuntimeVal::Function(function) => TypeVal::Function(FunctionTypeVal {
            params: vec![TypeVal::DYNAMIC; function.declaration.params.len()],
            return_type: None,
        }),
        RuntimeVal::NativeFn(_) | RuntimeVal::Type(_) => TypeVal::DYNAMIC,
    };
    if ptr.is_some() {
        seen.pop();
    }
    ty
}

/// How a value failed to fit an annotated type.
#[derive(Clone, Debug, PartialEq)]
pub enum Mismatch {
    /// A struct instance whose nominal tag differs from the annotated struct.
    Nominal { actual: String, expected: String },
    Structural { actual: String, expected: String },
}

fn structural(value: &RuntimeVal, target: &TypeVal) -> Mismatch {
    Mismatch::Structural {
        actual: value_type(value).to_string(),
        expected: target.to_string(),
    }
}

/// Checks a value against an annotation: nominal struct tags first, then contract
/// fulfillment, then structural compatibility.
pub fn ensure_assignable(value: &RuntimeVal, target: &TypeVal, env: &Environment) -> Result<(), Mismatch> {
    match (value, target) {
        (_, TypeVal::Primitive(PrimitiveType::Dynamic)) => Ok(()),
        (_, TypeVal::Alias(alias)) => {
            ensure_assignable(value, &alias.target, env).map_err(|_| structural(value, target))
        }
        (_, TypeVal::Union(members)) => {
            if members
                .iter()
                .any(|member| ensure_assignable(value, member, env).is_ok())
            {
                Ok(())
            } else {
                Err(structural(value, target))
            }
        }
        (RuntimeVal::Object(object), TypeVal::Struct(st)) if !st.name.is_empty() => {
            match &object.instance_of {
                Some(tag) if tag == &st.name => Ok(()),
                Some(tag) => Err(Mismatch::Nominal {
                    actual: tag.clone(),
                    expected: target.to_string(),
                }),
                None => compare(value, target),
            }
        }
        (RuntimeVal::Object(object), TypeVal::Contract(contract)) => match &object.instance_of {
            Some(tag) if env.fulfills(tag, &contract.name) => Ok(()),
            _ => Err(structural(value, target)),
        },
        (RuntimeVal::Object(object), TypeVal::Generic(generic)) => {
            match &object.instance_of {
                Some(tag) if tag != &generic.name => Err(Mismatch::Nominal {
                    actual: tag.clone(),
                    expected: target.to_string(),
                }),
                Some(_) if object.type_args.is_empty() => {
                    // Instantiated without explicit arguments: check the shape against
                    // the struct specialised to the annotation's arguments.
                    let Some(TypeVal::Struct(base)) = env.lookup_type(&generic.name) else {
                        return Err(structural(value, target));
                    };
                    let expected = substitute(
                        &TypeVal::Struct(base.clone()),
                        &base.substitutions(&generic.params),
                    );
                    compare(value, &expected).map_err(|_| structural(value, target))
                }
                _ => compare(value, target),
            }
        }
        (RuntimeVal::Array(array), TypeVal::Array(element)) => {
            if array
                .snapshot()
                .iter()
                .all(|item| ensure_assignable(item, element, env).is_ok())
            {
                Ok(())
            } else {
                Err(structural(value, target))
            }
        }
        _ => compare(value, target),
    }
}

fn compare(value: &RuntimeVal, target: &TypeVal) -> Result<(), Mismatch> {
    let (compatible, _, _) = are_types_compatible(&value_type(value), target);
    if compatible {
        Ok(())
    } else {
        Err(structural(value, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::types::{AliasTypeVal, TypeParamVal};
    use crate::runtime::value::ObjectVal;

    fn number() -> TypeVal {
        TypeVal::Primitive(PrimitiveType::Number)
    }

    fn string() -> TypeVal {
        TypeVal::Primitive(PrimitiveType::String)
    }

    fn shape(name: &str, members: &[(&str, TypeVal, bool)]) -> TypeVal {
        TypeVal::Struct(StructTypeVal {
            name: name.into(),
            type_params: Vec::new(),
            type_args: Vec::new(),
            members: members
                .iter()
                .map(|(name, ty, optional)| MemberVal {
                    name: (*name).into(),
                    ty: ty.clone(),
                    optional: *optional,
                })
                .collect(),
        })
    }

    #[test]
    fn dynamic_is_compatible_with_everything() {
        assert!(are_types_compatible(&TypeVal::DYNAMIC, &number()).0);
        assert!(are_types_compatible(&shape("A", &[]), &TypeVal::DYNAMIC).0);
    }

    #[test]
    fn unions_on_either_side() {
        let either = TypeVal::Union(vec![number(), string()]);
        assert!(are_types_compatible(&number(), &either).0);
        assert!(are_types_compatible(&either, &either).0);
        assert!(!are_types_compatible(&either, &number()).0);
    }

    #[test]
    fn aliases_are_transparent() {
        let alias = TypeVal::Alias(AliasTypeVal {
            name: "Count".into(),
            target: Box::new(number()),
        });
        let (compatible, source, target) = are_types_compatible(&number(), &alias);
        assert!(compatible);
        assert_eq!(source, number());
        assert_eq!(target, number());
    }

    #[test]
    fn structs_use_width_subtyping() {
        let point = shape("Point", &[("x", number(), false), ("label", string(), true)]);
        let wide = shape("", &[("x", number(), false), ("y", number(), false)]);
        let narrow = shape("", &[("label", string(), false)]);
        assert!(are_types_compatible(&wide, &point).0);
        assert!(!are_types_compatible(&narrow, &point).0);
    }

    #[test]
    fn generics_compare_name_and_arguments() {
        let a = TypeVal::Generic(GenericTypeVal {
            name: "Box".into(),
            params: vec![number()],
        });
        let b = TypeVal::Generic(GenericTypeVal {
            name: "Box".into(),
            params: vec![string()],
        });
        assert!(are_types_compatible(&a, &a).0);
        assert!(!are_types_compatible(&a, &b).0);
    }

    #[test]
    fn type_parameters_respect_constraints() {
        let constrained = TypeVal::TypeParameter(TypeParamVal {
            name: "T".into(),
            constraint: Some(Box::new(number())),
        });
        assert!(are_types_compatible(&number(), &constrained).0);
        assert!(!are_types_compatible(&string(), &constrained).0);
    }

    #[test]
    fn self_containing_values_type_as_dynamic_where_they_recur() {
        let object = ObjectVal::new(None, Vec::new(), vec![("x".into(), RuntimeVal::Number(1.0))]);
        object.set("me", RuntimeVal::Object(object.clone()));
        assert_eq!(
            value_type(&RuntimeVal::Object(object)).to_string(),
            "{x: number, me: dynamic}"
        );

        let list = RuntimeVal::array(vec![RuntimeVal::Number(1.0)]);
        if let RuntimeVal::Array(array) = &list {
            array.items.borrow_mut().push(list.clone());
        }
        assert_eq!(value_type(&list).to_string(), "(number | dynamic)[]");
    }

    #[test]
    fn array_value_types_collapse_to_unions() {
        let mixed = RuntimeVal::array(vec![
            RuntimeVal::Number(1.0),
            RuntimeVal::String("a".into()),
            RuntimeVal::Number(2.0),
        ]);
        assert_eq!(value_type(&mixed).to_string(), "(number | string)[]");
        assert_eq!(value_type(&RuntimeVal::array(Vec::new())).to_string(), "dynamic[]");
    }

    #[test]
    fn nominal_tags_win_over_shape() {
        let env = Environment::root();
        let person = shape("Person", &[("name", string(), false)]);
        let impostor = RuntimeVal::Object(ObjectVal::new(
            Some("Person2".into()),
            Vec::new(),
            vec![("name".into(), RuntimeVal::String("John".into()))],
        ));
        assert_eq!(
            ensure_assignable(&impostor, &person, &env),
            Err(Mismatch::Nominal {
                actual: "Person2".into(),
                expected: "Person".into(),
            })
        );

        let anonymous = RuntimeVal::Object(ObjectVal::new(
            None,
            Vec::new(),
            vec![("name".into(), RuntimeVal::String("John".into()))],
        ));
        assert_eq!(ensure_assignable(&anonymous, &person, &env), Ok(()));
    }

    #[test]
    fn null_does_not_fit_a_primitive() {
        let env = Environment::root();
        assert_eq!(
            ensure_assignable(&RuntimeVal::Null, &number(), &env),
            Err(Mismatch::Structural {
                actual: "null".into(),
                expected: "number".into(),
            })
        );
    }
}
