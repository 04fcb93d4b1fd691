//! End-to-end scripts run through the library API.

use std::io::Write;
use std::rc::Rc;

use tyrt::script::{Error, Interpreter, LineError, RuntimeError, Value};

fn run(src: &str) -> Vec<String> {
    let mut interp = Interpreter::new();
    if let Err(e) = interp.run(src) {
        panic!("script failed: {e}\noutput so far: {:?}", interp.output);
    }
    interp.output
}

fn run_err(src: &str) -> (Vec<String>, LineError) {
    let mut interp = Interpreter::new();
    let err = interp.run(src).expect_err("script should fail");
    (interp.output, err)
}

// ── Control flow ──────────────────────────────────────────────────────────────

#[test]
fn numeric_loop_with_suffix() {
    let out = run("\
entr_i i ty 3:5 _CS-TINK {
    print|[i]
}");
    assert_eq!(out, vec!["3", "4", "5"]);
}

#[test]
fn loop_variable_outlives_top_level_loop() {
    let mut interp = Interpreter::new();
    interp.run("entr_i k ty 0:2 {\n/0 nothing\n}").unwrap();
    assert_eq!(interp.get_global_var("k"), Some(&Value::Int(2)));
}

#[test]
fn loop_inside_function_rebinds_existing_local() {
    let out = run("\
func f() {
    tyrt i = 100
    entr_i i ty 1:3 {
        print|[i]
    }
    print|[i]
}
f()");
    assert_eq!(out, vec!["1", "2", "3", "3"]);
}

#[test]
fn loop_inside_function_stays_local() {
    let mut interp = Interpreter::new();
    interp
        .run("func f() {\nentr_i j ty 1:2 {\n/0 nothing\n}\nreturn_object j\n}\ntyrt r = f()")
        .unwrap();
    assert_eq!(interp.get_global_var("r"), Some(&Value::Int(2)));
    assert_eq!(interp.get_global_var("j"), None);
}

#[test]
fn break_and_continue() {
    let out = run("\
tyrt n = 0
/1 n < 10 {
    tyrt n = n + 1
    BILHETE_NADA n == 2 {
        loop.continue
    }
    BILHETE_NADA n > 4 {
        loop.break
    }
    print|[n]
}
print|[\"end \" + \"loop\"]");
    assert_eq!(out, vec!["1", "3", "4", "end loop"]);
}

#[test]
fn nested_same_kind_blocks() {
    let out = run("\
tyrt a = 1
tyrt b = 2
BILHETE_NADA a == 1 {
    BILHETE_NADA b == 2 {
        print|[\"both\"]
    }
    print|[\"outer\"]
}
entr_i i ty 1:2 {
    entr_i j ty 1:2 {
        print|[i + j]
    }
}");
    assert_eq!(out, vec!["both", "outer", "2", "3", "3", "4"]);
}

#[test]
fn mixed_nesting_inside_function() {
    let out = run("\
func count_big(xs, limit) {
    tyrt total = 0
    entr_i i ty 0:3 {
        BILHETE_NADA xs[i] > limit {
            tyrt total = total + 1
        }
    }
    return_object total
}
print|[count_big(.lista(1, 9, 3, 12), 2)]");
    assert_eq!(out, vec!["3"]);
}

#[test]
fn recursion() {
    let out = run("\
func countdown(n) {
    BILHETE_NADA n > 0 {
        print|[n]
        countdown(n + -1)
    }
}
countdown(3)");
    assert_eq!(out, vec!["3", "2", "1"]);
}

// ── Functions and scope ───────────────────────────────────────────────────────

#[test]
fn call_scope_is_restored_after_error() {
    let mut interp = Interpreter::new();
    let err = interp
        .run("tyrt x = 1\nfunc f(x) {\ntyrt y = nope\n}\nf(5)")
        .unwrap_err();
    assert!(matches!(err.error, Error::Runtime(RuntimeError::VariableNotDefined(_))));
    assert_eq!(err.line, 5);
    assert_eq!(interp.get_global_var("x"), Some(&Value::Int(1)));
    interp.run("print|[x]").unwrap();
    assert_eq!(interp.output, vec!["1"]);
}

#[test]
fn functions_see_globals_but_not_caller_locals() {
    let (out, err) = run_err("\
tyrt g = 10
func inner() {
    print|[g]
    print|[secret]
}
func outer() {
    tyrt secret = 1
    inner()
}
outer()");
    assert_eq!(out, vec!["10"]);
    assert!(matches!(err.error, Error::Runtime(RuntimeError::VariableNotDefined(_))));
}

#[test]
fn helper_called_from_method_reads_receiver_fields() {
    let out = run("\
func describe() {
    return_object \"size \" + self.label
}
class Box {
    func ___init___(self, label) {
        tyrt self.label = label
    }
    func show(self) {
        print|[describe()]
    }
}
tyrt b = Box(\"big\")
b.show()");
    assert_eq!(out, vec!["size big"]);
}

#[test]
fn undefined_function() {
    let (_, err) = run_err("nothing_here(1)");
    assert!(matches!(err.error, Error::Runtime(RuntimeError::VariableNotDefined(_))));
}

// ── Objects ───────────────────────────────────────────────────────────────────

const POINT: &str = "\
class Point {
    func ___init___(self, x, y) {
        tyrt self.x = x
        tyrt self.y = y
    }
    func ___add___(self, other) {
        return_object Point(self.x + other.x, self.y + other.y)
    }
    func ___eq___(self, other) {
        BILHETE_NADA self.x == other.x {
            return_object self.y == other.y
        }
        return_object 1 == 0
    }
    func ___print___(self) {
        return_object \"(\" + self.x + \")\"
    }
    func norm1(self) {
        return_object self.x + self.y
    }
}
";

#[test]
fn operator_overloads() {
    let out = run(&format!(
        "{POINT}\
tyrt a = Point(1, 2)
tyrt b = Point(3, 4)
tyrt c = a + b
print|[c.norm1()]
print|[c.x]
print|[a == Point(1, 2)]"
    ));
    assert_eq!(out, vec!["10", "4", "True"]);
}

#[test]
fn print_overload_errors_propagate() {
    // "(" + integer is a type mismatch inside ___print___.
    let (_, err) = run_err(&format!("{POINT}print|[Point(1, 2)]"));
    assert!(matches!(err.error, Error::Runtime(RuntimeError::Failure(_))));
}

#[test]
fn missing_overload_is_operator_not_implemented() {
    let (_, err) = run_err(&format!("{POINT}tyrt p = Point(1, 1)\nprint|[p > p]"));
    assert!(matches!(
        err.error,
        Error::Runtime(RuntimeError::OperatorNotImplemented { ref op, ref class }) if op == ">" && class == "Point"
    ));
}

#[test]
fn method_arity_and_unknown_method() {
    let (_, err) = run_err(&format!("{POINT}tyrt p = Point(1)"));
    assert!(matches!(err.error, Error::Runtime(RuntimeError::InvalidMethodCall(_))));
    let (_, err) = run_err(&format!("{POINT}tyrt p = Point(1, 2)\np.scale(2)"));
    assert!(matches!(err.error, Error::Runtime(RuntimeError::InvalidMethodCall(_))));
}

#[test]
fn len_overload() {
    let out = run("\
class Stack {
    func ___init___(self) {
        tyrt self.items = .lista(1, 2, 3)
    }
    func ___len___(self) {
        return_object self.items.len()
    }
}
tyrt s = Stack()
print|[s.len()]");
    assert_eq!(out, vec!["3"]);
}

// ── Collections ───────────────────────────────────────────────────────────────

#[test]
fn sequence_operations() {
    let out = run("\
tyrt xs = .lista(1, \"two\")
xs.append(3)
print|[xs]
print|[xs.len()]
print|[xs.pop(0)]
print|[xs[-1]]
tyrt xs[0] = \"deux\"
print|[xs]");
    assert_eq!(out, vec!["[1, 'two', 3]", "3", "1", "3", "['deux', 3]"]);
}

#[test]
fn sequence_appended_to_itself() {
    let out = run("\
tyrt xs = .lista(1)
xs.append(xs)
print|[xs]
print|[xs.len()]
print|[xs == xs]");
    assert_eq!(out, vec!["[1, [...]]", "2", "True"]);
}

#[test]
fn mapping_literal_is_always_empty() {
    let out = run("\
tyrt m = #dicionario(\"a\", 1)
print|[m]
tyrt m[\"k\"] = 5
print|[m[\"k\"]]
print|[m]");
    assert_eq!(out, vec!["{}", "5", "{'k': 5}"]);
}

#[test]
fn pop_on_empty_is_catchable() {
    let out = run("\
tyrt xs = .lista()
Try {
    xs.pop()
}
Except as e {
    print|[\"caught\"]
}");
    assert_eq!(out, vec!["caught"]);
}

// ── Constants ─────────────────────────────────────────────────────────────────

#[test]
fn constants() {
    let out = run("const LIMIT = 3\nprint|[LIMIT + 1]");
    assert_eq!(out, vec!["4"]);
    let (_, err) = run_err("const LIMIT = 3\nconst LIMIT = 4");
    assert!(matches!(err.error, Error::Runtime(RuntimeError::ConstantReassignment(_))));
    let (_, err) = run_err("const I = 3\nentr_i I ty 0:1 {\n}");
    assert!(matches!(err.error, Error::Runtime(RuntimeError::ConstantReassignment(_))));
}

#[test]
fn constant_reassignment_is_catchable() {
    let out = run("\
const PI = 3
Try {
    tyrt PI = 4
}
Except as e {
    print|[e]
}
print|[PI]");
    assert_eq!(out, vec!["ConstantReassignment: constant 'PI' is immutable", "3"]);
}

// ── Try / Except / Now ────────────────────────────────────────────────────────

#[test]
fn try_except_now() {
    let out = run("\
Try {
    tyrt x = 1/0
}
Except as e {
    print|[e]
}
Now {
    print|[99]
}");
    assert_eq!(out, vec!["VariableNotDefined: cannot resolve expression '1/0'", "99"]);
}

#[test]
fn finally_runs_without_error() {
    let out = run("Try {\nprint|[1]\n}\nExcept {\nprint|[2]\n}\nNow {\nprint|[3]\n}");
    assert_eq!(out, vec!["1", "3"]);
}

#[test]
fn error_in_except_body_propagates_after_finally() {
    let (out, err) = run_err("Try {\ntyrt a = nope\n}\nExcept {\ntyrt b = nada\n}\nNow {\nprint|[\"cleanup\"]\n}");
    assert_eq!(out, vec!["cleanup"]);
    assert!(matches!(err.error, Error::Runtime(RuntimeError::VariableNotDefined(ref m)) if m.contains("nada")));
}

#[test]
fn try_inside_function_returns() {
    let out = run("\
func safe_get(xs, i) {
    Try {
        return_object xs[i]
    }
    Except {
        return_object -1
    }
}
print|[safe_get(.lista(5), 0)]
print|[safe_get(.lista(5), 3)]");
    assert_eq!(out, vec!["5", "-1"]);
}

#[test]
fn empty_except_does_not_bind_the_error() {
    let mut interp = Interpreter::new();
    interp.run("Try {\ntyrt a = nope\n}\nExcept as e {\n}\nprint|[\"after\"]").unwrap();
    assert_eq!(interp.output, vec!["after"]);
    assert_eq!(interp.get_global_var("e"), None);
}

#[test]
fn except_without_try_is_a_syntax_error() {
    let (_, err) = run_err("Except {\nprint|[1]\n}");
    assert!(matches!(err.error, Error::Syntax(_)));
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[test]
fn stray_terminator() {
    let (_, err) = run_err("print|[1]\n}");
    assert!(matches!(err.error, Error::Syntax(_)));
    assert_eq!(err.line, 2);
    assert!(err.to_string().starts_with("uncaught error (line 2): SyntaxError"));
}

#[test]
fn unrecognized_line_halts_run() {
    let (out, err) = run_err("print|[1]\nthis is not code\nprint|[2]");
    assert_eq!(out, vec!["1"]);
    assert!(matches!(err.error, Error::UnrecognizedLine(_)));
    assert_eq!(err.line, 2);
}

#[test]
fn error_line_is_the_closing_line_of_a_block() {
    let (_, err) = run_err("BILHETE_NADA 1 {\nprint|[1]\nprint|[undefined_name]\n}");
    assert_eq!(err.line, 4);
}

// ── Host file read ────────────────────────────────────────────────────────────

#[test]
fn read_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "hello from disk").unwrap();
    let path = file.path().to_str().unwrap().replace('\\', "/");
    let out = run(&format!("tyrt text = read_file(\"{path}\")\nprint|[text]"));
    assert_eq!(out, vec!["hello from disk"]);
}

#[test]
fn read_file_failure_is_catchable() {
    let mut interp = Interpreter::new();
    interp.file_loader = Rc::new(|path: &str| {
        Err(std::io::Error::new(std::io::ErrorKind::NotFound, format!("{path} is gone")))
    });
    interp
        .run("Try {\ntyrt t = read_file(\"x.txt\")\n}\nExcept as e {\nprint|[e]\n}")
        .unwrap();
    assert_eq!(interp.output.len(), 1);
    assert!(interp.output[0].starts_with("RuntimeError: cannot read file 'x.txt'"));
}
