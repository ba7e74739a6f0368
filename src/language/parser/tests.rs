use super::Parser;
use crate::language::{
    ast::*,
    errors::SyntaxError,
    lexer::tokenize,
    types::{ContractMember, TypeNode, VarModifier},
};
use pretty_assertions::assert_eq;

fn parse(source: &str) -> Program {
    try_parse(source).unwrap_or_else(|err| panic!("parse failed: {err}"))
}

fn try_parse(source: &str) -> Result<Program, SyntaxError> {
    let tokens = tokenize("test.sbl", source).expect("tokenize");
    Parser::new("test.sbl", tokens).produce_ast()
}

fn parse_err(source: &str) -> String {
    match try_parse(source) {
        Ok(program) => panic!("expected a syntax error, got {:?}", program.body),
        Err(err) => err.message,
    }
}

fn only_expr(program: &Program) -> &Expr {
    match program.body.as_slice() {
        [Stmt::Expr(expr)] => expr,
        other => panic!("expected a single expression statement, got {other:?}"),
    }
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let program = parse("1 + 2 * 3");
    let Expr::Binary(add) = only_expr(&program) else {
        panic!("expected binary expression");
    };
    assert_eq!(add.op, BinaryOp::Add);
    assert!(matches!(&*add.right, Expr::Binary(mul) if mul.op == BinaryOp::Mul));
}

#[test]
fn power_is_right_associative() {
    let program = parse("2 ** 3 ** 2");
    let Expr::Binary(outer) = only_expr(&program) else {
        panic!("expected binary expression");
    };
    assert_eq!(outer.op, BinaryOp::Pow);
    assert!(matches!(&*outer.left, Expr::NumericLiteral(n) if n.value == 2.0));
    assert!(matches!(&*outer.right, Expr::Binary(inner) if inner.op == BinaryOp::Pow));
}

#[test]
fn keyword_operators_match_symbolic_ones() {
    let program = parse("a and not b or c");
    let Expr::Binary(or) = only_expr(&program) else {
        panic!("expected binary expression");
    };
    assert_eq!(or.op, BinaryOp::Or);
    let Expr::Binary(and) = &*or.left else {
        panic!("expected `and` on the left");
    };
    assert_eq!(and.op, BinaryOp::And);
    assert!(matches!(&*and.right, Expr::Unary(u) if u.op == UnaryOp::Not));
}

#[test]
fn compound_assignment_is_desugared() {
    let program = parse("total += 2");
    let Expr::Assignment(assign) = only_expr(&program) else {
        panic!("expected assignment");
    };
    assert!(matches!(&*assign.assignee, Expr::Identifier(id) if id.value == "total"));
    let Expr::Binary(sum) = &*assign.value else {
        panic!("expected desugared binary");
    };
    assert_eq!(sum.op, BinaryOp::Add);
    assert!(matches!(&*sum.left, Expr::Identifier(id) if id.value == "total"));
}

#[test]
fn assignment_to_a_literal_is_rejected() {
    assert!(parse_err("3 = 4").starts_with("Invalid assignment target"));
}

#[test]
fn declarations_carry_their_modifier() {
    let program = parse("let a = 1\nlet mut b = 2\nvar c\nconst d = 4\nfinal e = 5");
    let modifiers: Vec<_> = program
        .body
        .iter()
        .map(|stmt| match stmt {
            Stmt::VarDeclaration(decl) => (decl.name.value.clone(), decl.modifier),
            other => panic!("unexpected {}", other.kind()),
        })
        .collect();
    assert_eq!(
        modifiers,
        vec![
            ("a".to_string(), VarModifier::Final),
            ("b".to_string(), VarModifier::Variable),
            ("c".to_string(), VarModifier::Variable),
            ("d".to_string(), VarModifier::Constant),
            ("e".to_string(), VarModifier::Final),
        ]
    );
}

#[test]
fn comma_separated_bindings_form_one_statement() {
    let program = parse("var x: number = 1, y = \"two\", z");
    let [Stmt::MultiVarDeclaration(multi)] = program.body.as_slice() else {
        panic!("expected a multi declaration");
    };
    let names: Vec<_> = multi.declarations.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["x", "y", "z"]);
    assert!(matches!(multi.declarations[0].ty, Some(TypeNode::Primitive(_))));
    assert!(multi.declarations[2].value.is_none());
}

#[test]
fn const_and_final_need_an_initializer() {
    assert_eq!(
        parse_err("const limit"),
        "Must assign value to const declaration \"limit\""
    );
    assert_eq!(
        parse_err("final name: string"),
        "Must assign value to final declaration \"name\""
    );
}

#[test]
fn colon_blocks_and_brace_blocks_are_equivalent() {
    let indented = parse("fn add(a: number, b: number) -> number:\n    return a + b\n");
    let braced = parse("fn add(a: number, b: number) -> number {\n    return a + b\n}\n");
    let (Stmt::FunctionDeclaration(left), Stmt::FunctionDeclaration(right)) =
        (&indented.body[0], &braced.body[0])
    else {
        panic!("expected function declarations");
    };
    assert_eq!(left.params.len(), 2);
    assert_eq!(left.body.len(), 1);
    assert_eq!(left.body[0].kind(), right.body[0].kind());
    assert!(matches!(&left.body[0], Stmt::Return(ret) if ret.value.is_some()));
}

#[test]
fn return_value_must_share_its_line() {
    let program = parse("fn f() {\n    return\n    done()\n}");
    let Stmt::FunctionDeclaration(function) = &program.body[0] else {
        panic!("expected function");
    };
    assert_eq!(function.body.len(), 2);
    assert!(matches!(&function.body[0], Stmt::Return(ret) if ret.value.is_none()));
}

#[test]
fn if_chain_collects_branches() {
    let program = parse("if a { x() } else if b { y() } else { z() }");
    let [Stmt::IfElse(chain)] = program.body.as_slice() else {
        panic!("expected if statement");
    };
    assert_eq!(chain.branches.len(), 2);
    assert!(chain.else_body.is_some());
}

#[test]
fn headers_do_not_swallow_blocks_as_struct_literals() {
    let program = parse("if ready { go() }");
    let [Stmt::IfElse(chain)] = program.body.as_slice() else {
        panic!("expected if statement");
    };
    assert!(matches!(&chain.branches[0].condition, Expr::Identifier(id) if id.value == "ready"));

    let program = parse("if (Point { x: 1 }).x == 1 { go() }");
    assert!(matches!(&program.body[0], Stmt::IfElse(_)));
}

#[test]
fn generic_instantiation_is_told_apart_from_comparison() {
    let program = parse("let b = Box<number> { value: 1 }\nlet c = a < b");
    let Stmt::VarDeclaration(boxed) = &program.body[0] else {
        panic!("expected declaration");
    };
    let Some(Expr::ObjectLiteral(literal)) = &boxed.value else {
        panic!("expected struct literal");
    };
    assert_eq!(literal.instance_of.as_ref().map(|n| n.as_str()), Some("Box"));
    assert_eq!(literal.type_args.len(), 1);

    let Stmt::VarDeclaration(compare) = &program.body[1] else {
        panic!("expected declaration");
    };
    assert!(matches!(&compare.value, Some(Expr::Binary(b)) if b.op == BinaryOp::Lt));
}

#[test]
fn object_literal_shorthand_properties() {
    let program = parse("let p = Point { x, y: 2 }");
    let Stmt::VarDeclaration(decl) = &program.body[0] else {
        panic!("expected declaration");
    };
    let Some(Expr::ObjectLiteral(literal)) = &decl.value else {
        panic!("expected struct literal");
    };
    assert!(literal.properties[0].value.is_none());
    assert!(literal.properties[1].value.is_some());
}

#[test]
fn loops_receive_sequential_ids() {
    let program = parse("for i in range 0 to 3 {\n    while true {\n        break\n    }\n}");
    let Stmt::ForRange(range) = &program.body[0] else {
        panic!("expected range loop");
    };
    assert_eq!(range.loop_id, "loop_1");
    assert!(!range.inclusive);
    let Stmt::While(inner) = &range.body[0] else {
        panic!("expected while loop");
    };
    assert_eq!(inner.loop_id, "loop_2");
    assert!(matches!(&inner.body[0], Stmt::Break(b) if b.loop_id == "loop_2"));
}

#[test]
fn labelled_break_targets_the_outer_loop() {
    let program = parse("for label outer {\n    for x in items {\n        break outer\n    }\n}");
    let Stmt::For(outer) = &program.body[0] else {
        panic!("expected infinite loop");
    };
    assert_eq!(outer.label.as_ref().map(|l| l.as_str()), Some("outer"));
    let Stmt::ForIn(inner) = &outer.body[0] else {
        panic!("expected for-in loop");
    };
    assert!(matches!(&inner.body[0], Stmt::Break(b) if b.loop_id == "loop_1"));
}

#[test]
fn label_on_the_next_line_is_not_consumed() {
    let program = parse("for {\n    skip\n    outer\n}");
    let Stmt::For(for_loop) = &program.body[0] else {
        panic!("expected loop");
    };
    assert_eq!(for_loop.body.len(), 2);
    assert!(matches!(&for_loop.body[0], Stmt::Continue(c) if c.label.is_none()));
}

#[test]
fn unknown_label_is_a_syntax_error() {
    assert_eq!(
        parse_err("for { break nowhere }"),
        "Invalid label 'nowhere' for break/skip statement."
    );
}

#[test]
fn loop_and_eof_errors_carry_help() {
    let help = |source: &str| try_parse(source).expect_err("syntax error").help;
    assert_eq!(
        help("for { break nowhere }").as_deref(),
        Some("name an enclosing loop declared with `for label <name>`")
    );
    assert_eq!(
        help("skip").as_deref(),
        Some("`break` and `skip` only work inside `for` and `while` bodies")
    );
    assert_eq!(
        help("let x = (1 + ").as_deref(),
        Some("the file ended before this construct was closed")
    );
    assert_eq!(help("let = 4"), None);
}

#[test]
fn break_outside_loop_is_a_syntax_error() {
    assert_eq!(
        parse_err("break"),
        "Unexpected break/continue statement outside of loop."
    );
    assert_eq!(
        parse_err("for {\n    fn inner() {\n        skip\n    }\n}"),
        "Unexpected break/continue statement outside of loop."
    );
}

#[test]
fn range_loop_forms() {
    let program = parse("for i, v in range 10 through 0 step -2 { }");
    let Stmt::ForRange(range) = &program.body[0] else {
        panic!("expected range loop");
    };
    assert_eq!(range.index.as_ref().map(|i| i.as_str()), Some("i"));
    assert_eq!(range.value.as_str(), "v");
    assert!(range.inclusive);
    assert!(matches!(&range.step, Some(Expr::Unary(_))));
}

#[test]
fn c_style_and_conditional_loops() {
    let program = parse("for let mut i = 0; i < 3; i += 1 { }\nfor n < 10 { n += 1 }");
    let Stmt::For(c_style) = &program.body[0] else {
        panic!("expected c-style loop");
    };
    assert!(matches!(c_style.init.as_deref(), Some(Stmt::VarDeclaration(_))));
    assert!(c_style.update.is_some());

    let Stmt::For(conditional) = &program.body[1] else {
        panic!("expected conditional loop");
    };
    assert!(conditional.init.is_none());
    assert!(matches!(&conditional.condition, Some(Expr::Binary(b)) if b.op == BinaryOp::Lt));
}

#[test]
fn type_declarations() {
    let program = parse(
        "type Point struct {\n    x: number,\n    label?: string\n}\n\
         type Pair<T: number | string> { left: T, right: T }\n\
         type Id = number | string\n",
    );
    let Stmt::TypeDeclaration(point) = &program.body[0] else {
        panic!("expected type declaration");
    };
    let TypeNode::Struct(fields) = &point.definition else {
        panic!("expected struct");
    };
    assert!(fields.members[1].optional);

    let Stmt::TypeDeclaration(pair) = &program.body[1] else {
        panic!("expected type declaration");
    };
    assert_eq!(pair.type_params.len(), 1);
    assert!(matches!(pair.type_params[0].constraint, Some(TypeNode::Union(_))));

    let Stmt::TypeDeclaration(id) = &program.body[2] else {
        panic!("expected type declaration");
    };
    assert_eq!(id.definition.to_string(), "number | string");
}

#[test]
fn alias_chains_are_rejected() {
    assert_eq!(
        parse_err("alias Num = number\nalias Count = Num"),
        "Alias Count cannot refer to another alias Num"
    );
}

#[test]
fn contracts_and_fulfillments() {
    let program = parse(
        "type Shape contract {\n    fn area(self) -> number\n    get name -> string\n}\n\
         fulfill Shape for Square {\n    fn area(self) { return self.side ** 2 }\n    get name -> string { return \"square\" }\n}\n",
    );
    let Stmt::TypeDeclaration(shape) = &program.body[0] else {
        panic!("expected contract");
    };
    let TypeNode::Contract(contract) = &shape.definition else {
        panic!("expected contract body");
    };
    let names: Vec<_> = contract.members.iter().map(ContractMember::name).collect();
    assert_eq!(names, vec!["area", "name"]);

    let Stmt::ContractFulfillment(fulfill) = &program.body[1] else {
        panic!("expected fulfillment");
    };
    assert_eq!(fulfill.target.as_str(), "Square");
    assert!(fulfill.methods[0].receiver.is_some());
    assert!(fulfill.methods[0].params.is_empty());
    assert_eq!(fulfill.getters[0].name.as_str(), "name");
}

#[test]
fn receivers_may_carry_a_type_annotation() {
    let program = parse(
        "type Shape contract {\n    fn scale(self: Shape, by: number) -> number\n}\n\
         fulfill Shape for Sq {\n    fn scale(self: Sq, by: number) -> number { return self.side * by }\n}\n",
    );
    let Stmt::ContractFulfillment(fulfill) = &program.body[1] else {
        panic!("expected fulfillment");
    };
    let method = &fulfill.methods[0];
    assert_eq!(method.receiver.as_ref().map(|r| r.as_str()), Some("self"));
    assert_eq!(method.params.len(), 1);
    assert_eq!(method.params[0].name.as_str(), "by");
}

#[test]
fn type_syntax_round_trips_through_display() {
    let program = parse("let f: fn(number, string[]) -> (bool | null)[] = g");
    let Stmt::VarDeclaration(decl) = &program.body[0] else {
        panic!("expected declaration");
    };
    assert_eq!(
        decl.ty.as_ref().map(ToString::to_string).as_deref(),
        Some("fn(number, string[]) -> (bool | null)[]")
    );
}

#[test]
fn member_and_call_chains() {
    let program = parse("items[0].name.upper()");
    let Expr::Call(call) = only_expr(&program) else {
        panic!("expected call");
    };
    let Expr::Member(method) = &*call.caller else {
        panic!("expected member caller");
    };
    assert!(!method.computed);
    let Expr::Member(name) = &*method.object else {
        panic!("expected nested member");
    };
    assert!(matches!(&*name.object, Expr::Member(index) if index.computed));
}

#[test]
fn interpolated_strings_are_parsed() {
    let program = parse("\"hi ${user.name}!\"");
    let Expr::StringLiteral(literal) = only_expr(&program) else {
        panic!("expected string");
    };
    assert_eq!(literal.value, "hi #expr(0)!");
    assert!(matches!(&literal.expressions[0].1, Expr::Member(_)));
}

#[test]
fn unexpected_token_reports_what_was_expected() {
    assert_eq!(parse_err("let = 4"), "Unexpected token '=', expected a variable name");
}
