use crate::config::InterpreterConfig;
use crate::runtime::{value::RuntimeVal, Interpreter};
use crate::{interpret_with, parse, Interpretation};
use pretty_assertions::assert_eq;

fn quiet() -> InterpreterConfig {
    InterpreterConfig::default().with_echo_output(false)
}

fn run(source: &str) -> Interpretation {
    interpret_with("test.sbl", source, quiet())
        .unwrap_or_else(|err| panic!("frontend error: {err}"))
}

fn value(source: &str) -> RuntimeVal {
    match run(source) {
        Interpretation::Value(value) => value,
        Interpretation::Message(message) => panic!("runtime error: {message}"),
    }
}

fn message(source: &str) -> String {
    match run(source) {
        Interpretation::Message(message) => message,
        Interpretation::Value(value) => panic!("expected a runtime error, got {value:?}"),
    }
}

fn number(n: f64) -> RuntimeVal {
    RuntimeVal::Number(n)
}

fn string(s: &str) -> RuntimeVal {
    RuntimeVal::String(s.to_string())
}

#[test]
fn arithmetic_and_boolean_precedence() {
    assert_eq!(value("1 + 2 * 3"), number(7.0));
    assert_eq!(value("10 > 5 || 10 > 11 && 11 > 10"), RuntimeVal::Boolean(true));
    assert_eq!(value("2 ** 3 ** 2"), number(512.0));
    assert_eq!(value("1 + null"), RuntimeVal::Null);
}

#[test]
fn named_struct_annotations_are_nominal() {
    assert_eq!(
        message(
            "type Person struct{name:string}; type Person2 struct{name:string}; \
             let p: Person = Person2{name:\"John\"}"
        ),
        "Type mismatch: Cannot assign value of type Person2 to variable of type Person\n"
    );
}

#[test]
fn aliases_are_transparent() {
    let result = value(
        "type Person struct{name:string}; alias Person2 = Person; \
         let p: Person = Person2{name:\"John\"}; p",
    );
    let RuntimeVal::Object(person) = result else {
        panic!("expected an object, got {result:?}");
    };
    assert_eq!(person.instance_of.as_deref(), Some("Person"));
    assert_eq!(person.get("name"), Some(string("John")));
}

#[test]
fn struct_literals_check_their_fields() {
    assert_eq!(
        message("type Point{x:number,y:number}; Point{x:1}"),
        "Missing required field 'y' in struct 'Point'\n"
    );
    assert_eq!(
        message("type Point{x:number,y:number}; Point{x:1,y:2,z:3}"),
        "Unknown field 'z' in struct 'Point'\n"
    );
    assert_eq!(
        message("type Point{x:number,y:string}; Point{x:1,y:2}"),
        "Field 'y' in struct 'Point' must be of type 'string', but got 'number'\n"
    );
    assert_eq!(
        message("Shape{x:1}"),
        "Unable to resolve type Shape\n"
    );
    assert_eq!(
        message("type Id = number; Id{x:1}"),
        "Type 'Id' is not a struct\n"
    );
}

#[test]
fn failed_struct_declarations_leave_no_trace() {
    let mut interpreter = Interpreter::new("test.sbl", quiet());
    let mut run_line = |source: &str| {
        let program = parse("test.sbl", source).expect("parses");
        interpreter.run(&program).map_err(|err| err.to_string())
    };

    assert_eq!(
        run_line("type Bad { x: Missing }"),
        Err("Unable to resolve type Missing".to_string())
    );
    assert_eq!(
        run_line("Bad {}"),
        Err("Unable to resolve type Bad".to_string())
    );
    assert!(run_line("type Bad { x: number }").is_ok());
    assert_eq!(
        run_line("Bad {}"),
        Err("Missing required field 'x' in struct 'Bad'".to_string())
    );
    assert_eq!(
        run_line("type Bad { y: number }"),
        Err("Cannot declare type \"Bad\" as it is already defined".to_string())
    );
}

#[test]
fn optional_fields_read_as_null() {
    assert_eq!(
        value("type User { name: string, nick?: string }\nlet u = User { name: \"ada\" }\nu.nick"),
        RuntimeVal::Null
    );
}

#[test]
fn modifiers_guard_reassignment() {
    assert_eq!(
        message("const x = 5; x = 10"),
        "Cannot assign to a constant variable \"x\"\n"
    );
    assert_eq!(
        message("let x = 5; x = 10"),
        "Cannot assign to a final variable \"x\"\n"
    );
    assert_eq!(value("let mut x = 5; x = 10; x"), number(10.0));
}

#[test]
fn variables_lock_to_their_first_type() {
    assert_eq!(
        message("var x\nx = 5\nx = \"five\""),
        "Type mismatch: Cannot assign value of type string to variable \"x\" of type number\n"
    );
    assert_eq!(value("var d: dynamic = 1\nd = \"one\"\nd"), string("one"));
}

#[test]
fn member_assignment_respects_bindings_and_fields() {
    assert_eq!(
        message("type P { x: number }\nlet p = P { x: 1 }\np.x = 2"),
        "Cannot assign to a final variable \"p\"\n"
    );
    assert_eq!(
        message("type P { x: number }\nlet mut p = P { x: 1 }\np.x = \"two\""),
        "Field 'x' in struct 'P' must be of type 'number', but got 'string'\n"
    );
    assert_eq!(
        message("type P { x: number }\nlet mut p = P { x: 1 }\np.y = 2"),
        "Unknown field 'y' in struct 'P'\n"
    );
    assert_eq!(
        value("type P { x: number }\nlet mut p = P { x: 1 }\np.x += 41\np.x"),
        number(42.0)
    );
}

#[test]
fn arrays_index_and_assign() {
    assert_eq!(
        value("let mut xs = [1, 2, 3]\nxs[1] = 5\nxs[1] + xs.length"),
        number(8.0)
    );
    assert_eq!(
        message("let xs = [1, 2, 3]\nxs[3]"),
        "Index 3 is out of bounds of the array 'xs'\n"
    );
    assert_eq!(
        message("let xs = [1, 2, 3]\nlet i = \"a\"\nxs[i]"),
        "Index must be a number\n"
    );
}

#[test]
fn contract_signatures_must_match() {
    let source = "type Shape contract {\n    fn area(self, scale: number) -> number\n}\n\
                  type Square { side: number }\n\
                  fulfill Shape for Square {\n    fn area(self) -> number { return self.side }\n}\n";
    assert_eq!(
        message(source),
        "Method area() -> number of struct Square, does not satisfy signature Shape.area(number) -> number.\n"
    );
}

#[test]
fn contract_members_must_be_implemented() {
    let source = "type Shape contract {\n    fn area(self) -> number\n    get label -> string\n}\n\
                  type Square { side: number }\n\
                  fulfill Shape for Square {\n    fn area(self) -> number { return self.side }\n}\n";
    assert_eq!(
        message(source),
        "Implementation of contract Shape is missing method label, for struct Square.\n"
    );
}

#[test]
fn fulfilled_contracts_expose_methods_and_getters() {
    let source = "type Shape contract {\n    fn area(self) -> number\n    get name -> string\n}\n\
                  type Square { side: number }\n\
                  fulfill Shape for Square {\n    fn area(self) -> number { return self.side ** 2 }\n    \
                  get name -> string { return \"square\" }\n}\n\
                  let sq = Square { side: 3 }\n\
                  let s: Shape = sq\n\
                  \"${s.name} ${s.area()}\"";
    assert_eq!(value(source), string("square 9"));
}

#[test]
fn typed_receivers_match_untyped_contract_members() {
    let source = "type Area contract {\n    fn area(self) -> number\n}\n\
                  type Sq { side: number }\n\
                  fulfill Area for Sq {\n    fn area(self: Sq) -> number { return self.side * self.side }\n}\n\
                  let s = Sq { side: 4 }\ns.area()";
    assert_eq!(value(source), number(16.0));
}

#[test]
fn generic_constraints_are_enforced() {
    assert_eq!(
        message("type Box<T: number> { value: T }\nBox<string> { value: \"x\" }"),
        "Type argument string does not satisfy constraint number of type parameter T\n"
    );
    assert_eq!(
        value("type Box<T: number> { value: T }\nlet b = Box<number> { value: 5 }\nb.value"),
        number(5.0)
    );
    assert_eq!(
        message("type Box<T> { value: T }\nlet b: Box<number> = Box<string> { value: \"x\" }"),
        "Type mismatch: Cannot assign value of type Box<string> to variable \"b\" of type Box<number>\n"
    );
}

#[test]
fn union_constraints_accept_any_member() {
    assert_eq!(
        message("type Pair<T: number | string> { first: T }\nPair<bool> { first: true }"),
        "Type argument bool does not satisfy constraint number | string of type parameter T\n"
    );
    assert_eq!(
        value("type Pair<T: number | string> { first: T }\nlet p = Pair<string> { first: \"a\" }\np.first"),
        string("a")
    );
}

#[test]
fn labeled_break_leaves_the_outer_loop() {
    let source = "let mut count = 0\n\
                  for label outer {\n    for {\n        count += 1\n        break outer\n    }\n    count += 100\n}\n\
                  count";
    assert_eq!(value(source), number(1.0));
}

#[test]
fn labeled_skip_continues_the_outer_loop() {
    let source = "let mut hits = 0\n\
                  for label outer i in range 0 to 3 {\n    for j in range 0 to 3 {\n        if j == 1 { skip outer }\n        hits += 1\n    }\n    hits += 100\n}\n\
                  hits";
    assert_eq!(value(source), number(3.0));
}

#[test]
fn skip_continues_the_innermost_loop() {
    let source = "let mut i = 0\nlet mut total = 0\n\
                  while i < 5 {\n    i += 1\n    if i == 2 { skip }\n    total += i\n}\n\
                  total";
    assert_eq!(value(source), number(13.0));
}

#[test]
fn range_bounds_and_steps() {
    let count = |header: &str| {
        value(&format!("let mut n = 0\nfor {header} {{ n += 1 }}\nn"))
    };
    assert_eq!(count("i in range 0 to 5 step 2"), number(3.0));
    assert_eq!(count("i in range 0 through 4 step 2"), number(3.0));
    assert_eq!(count("i in range 0 to 5"), number(5.0));
    assert_eq!(count("i in range 0 through 5"), number(6.0));
    assert_eq!(count("i in range 5 to 0"), number(0.0));

    assert_eq!(
        value("let mut sum = 0\nfor i, v in range 10 through 0 step -5 { sum += v * 10 + i }\nsum"),
        number(153.0)
    );
    assert_eq!(
        message("for i in range 0 to 5 step 0 { }"),
        "Range step cannot be zero\n"
    );
}

#[test]
fn c_style_and_conditional_loops() {
    assert_eq!(
        value("let mut total = 0\nfor let mut i = 0; i < 4; i += 1 { total += i }\ntotal"),
        number(6.0)
    );
    assert_eq!(
        value("let mut n = 1\nfor n < 100 { n *= 3 }\nn"),
        number(243.0)
    );
}

#[test]
fn iteration_over_strings_and_arrays() {
    assert_eq!(
        value("let mut out = \"\"\nfor i, c in \"abc\" { out += \"${i}${c}\" }\nout"),
        string("0a1b2c")
    );
    assert_eq!(
        value("let mut total = 0\nfor x in [4, 5, 6] { total += x }\ntotal"),
        number(15.0)
    );
    assert_eq!(
        message("for x in 42 { }"),
        "Cannot iterate over a value of type number\n"
    );
}

#[test]
fn string_interpolation() {
    let source = "let name = \"Ada\"\nlet a = 2\nlet b = 3\n\"hi $name, ${a + b}! costs $5\"";
    assert_eq!(value(source), string("hi Ada, 5! costs $5"));
}

#[test]
fn return_unwinds_nested_loops() {
    let source = "fn find(limit: number) -> number {\n\
                  \x20   for i in range 0 to limit {\n\
                  \x20       for j in range 0 to limit {\n\
                  \x20           if i * j == 6 {\n\
                  \x20               return i + j\n\
                  \x20           }\n\
                  \x20       }\n\
                  \x20   }\n\
                  \x20   return -1\n\
                  }\n\
                  find(5)";
    assert_eq!(value(source), number(5.0));
}

#[test]
fn functions_check_arity_params_and_returns() {
    assert_eq!(
        message("fn add(a: number, b: number) -> number { return a + b }\nadd(1)"),
        "Function add expected 2 arguments but received 1\n"
    );
    assert_eq!(
        message("fn twice(n: number) { return n * 2 }\ntwice(\"x\")"),
        "Parameter n of function twice must be of type number, but got string\n"
    );
    assert_eq!(
        message("fn f() -> number { return \"x\" }\nf()"),
        "Function f must return a value of type number, but returned string\n"
    );
    assert_eq!(
        value("fn greet(name: string = \"world\") { return \"hi \" + name }\ngreet(null)"),
        string("hi world")
    );
}

#[test]
fn recursion_and_indented_bodies() {
    let source = "fn fib(n: number) -> number:\n    if n < 2:\n        return n\n    return fib(n - 1) + fib(n - 2)\n\nfib(10)";
    assert_eq!(value(source), number(55.0));
}

#[test]
fn call_depth_is_capped() {
    let config = quiet().with_max_call_depth(5);
    let result = interpret_with("test.sbl", "fn down(n) { return down(n + 1) }\ndown(0)", config)
        .expect("parses");
    assert_eq!(
        result,
        Interpretation::Message("Maximum call depth of 5 exceeded\n".to_string())
    );
}

#[test]
fn closures_see_their_defining_scope() {
    let source = "let base = 10\nfn add(n: number) { return base + n }\nfn apply(f, x) { return f(x) }\napply(add, 5)";
    assert_eq!(value(source), number(15.0));
}

#[test]
fn returned_closures_keep_their_captured_state() {
    let counter = "fn counter() {\n    let mut n = 0\n    fn next() {\n        n += 1\n        return n\n    }\n    return next\n}\n\
                   let c = counter()\nlet d = counter()\nc()\nc()\nd()\nc()";
    assert_eq!(value(counter), number(3.0));

    let factory = "fn make(step: number) {\n    fn inner(x: number) { return x + step }\n    return inner\n}\n\
                   let add2 = make(2)\nadd2(40)";
    assert_eq!(value(factory), number(42.0));
}

#[test]
fn self_referencing_objects_render_without_recursing() {
    assert_eq!(
        value("let mut a = { x: 1 }\na.x = a\nstr(a)"),
        string("{ x: <cycle> }")
    );
    assert_eq!(
        value("let mut items = [1]\nitems[0] = items\ntypeof(items)"),
        string("dynamic[]")
    );
    assert_eq!(
        value("let mut items = [1]\nitems[0] = items\nlet later = \"$items\"\nlater"),
        string("[<cycle>]")
    );
}

#[test]
fn print_writes_to_the_context() {
    let program = parse("test.sbl", "print(\"sum\", 1 + 2)\nprint(typeof([1, \"a\"]))").expect("parses");
    let mut interpreter = Interpreter::new("test.sbl", quiet());
    interpreter.run(&program).expect("runs");
    assert_eq!(
        interpreter.context().output(),
        ["sum 3".to_string(), "(number | string)[]".to_string()]
    );
}

#[test]
fn failures_capture_a_stack_trace() {
    let source = "fn inner() {\n    return missing\n}\nfn outer() {\n    return inner()\n}\nouter()";
    let program = parse("test.sbl", source).expect("parses");
    let mut interpreter = Interpreter::new("test.sbl", quiet());
    let err = interpreter.run(&program).expect_err("fails");
    assert_eq!(err.to_string(), "Cannot resolve variable \"missing\" as it does not exist");

    let trace = interpreter.context().failure_trace().expect("trace captured");
    let lines: Vec<_> = trace.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("    at inner (test.sbl:5:"), "{trace}");
    assert!(lines[1].starts_with("    at outer (test.sbl:7:"), "{trace}");
    assert_eq!(interpreter.context().depth(), 0);
}

#[test]
fn syntax_errors_fail_the_call() {
    let err = interpret_with("test.sbl", "for { break nowhere }", quiet()).expect_err("syntax error");
    assert_eq!(
        err.to_string(),
        "Invalid label 'nowhere' for break/skip statement. (test.sbl:1:7)"
    );
}
