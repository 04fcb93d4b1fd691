//! TyrtLang interpreter.
//!
//! The [`Interpreter`] owns the bindings, the registered functions and
//! classes, and the top-level [`BlockMachine`].  Source is executed line by
//! line: a line either feeds the open block capture or is classified and
//! executed on its own.  Closed blocks are dispatched to the block
//! processors below, which execute their bodies by feeding them through a
//! fresh machine.
//!
//! It implements [`EvalContext`] so the expression evaluator can call back
//! into it for lookups, calls, and operator dispatch.

use std::collections::HashMap;
use std::io;
use std::rc::Rc;

use super::{
    builtins::{self, READ_FILE},
    capture::{collect_methods, BlockMachine, Capture, Header, TryGroup},
    env::Environment,
    error::{Error, LineError, RuntimeError},
    expr::{eval_expr, EvalContext},
    stmt::{parse_line, Opener, Stmt, Target, BREAK, CONTINUE, DEFAULT_ERROR_BINDING, RETURN},
    value::{Class, Function, Instance, Operator, Value, INIT_METHOD},
};

// ── File loader callback ──────────────────────────────────────────────────────

/// A callback that resolves a path to the file's contents.  Backs the
/// `read_file` primitive; hosts and tests may replace it.
pub type FileLoader = Rc<dyn Fn(&str) -> io::Result<String>>;

fn read_from_disk() -> FileLoader {
    Rc::new(|path: &str| std::fs::read_to_string(path))
}

// ── ControlFlow ───────────────────────────────────────────────────────────────

/// Non-error control-flow signals that unwind body execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    Break,
    Continue,
    Return(Value),
}

impl ControlFlow {
    /// The statement that raised the signal.
    pub fn keyword(&self) -> &'static str {
        match self {
            ControlFlow::Break => BREAK,
            ControlFlow::Continue => CONTINUE,
            ControlFlow::Return(_) => RETURN,
        }
    }
}

/// Outcome of executing a line or a body.
type Flow = Result<Option<ControlFlow>, Error>;

// ── Interpreter ───────────────────────────────────────────────────────────────

pub struct Interpreter {
    env: Environment,
    functions: HashMap<String, Rc<Function>>,
    classes: HashMap<String, Rc<Class>>,
    /// Receiver of each active call, paired with the environment's frames.
    receivers: Vec<Option<Rc<Instance>>>,
    /// Capture state for top-level lines.
    machine: BlockMachine,
    /// Lines produced by `print|[…]` (when not echoed to stdout).
    pub output: Vec<String>,
    /// Write printed lines straight to stdout instead of collecting them.
    pub echo_stdout: bool,
    pub file_loader: FileLoader,
    /// 1-based number of the last top-level line fed.
    line: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            env: Environment::new(),
            functions: HashMap::new(),
            classes: HashMap::new(),
            receivers: Vec::new(),
            machine: BlockMachine::new(),
            output: Vec::new(),
            echo_stdout: false,
            file_loader: read_from_disk(),
            line: 0,
        }
    }

    /// Define a constant before running a script.
    pub fn define_constant(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        self.env.define_constant(name, value)
    }

    pub fn set_global_var(&mut self, name: &str, value: Value) {
        self.env.set_global(name, value);
    }

    pub fn get_global_var(&self, name: &str) -> Option<&Value> {
        self.env.global(name)
    }

    /// `true` while a top-level block is open.
    pub fn capturing(&self) -> bool {
        self.machine.is_capturing()
    }

    /// `true` while a closed `Try` still waits for `Except`/`Now` lines.
    pub fn pending_try(&self) -> bool {
        self.machine.has_pending_try()
    }

    /// Number of the last top-level line executed.
    pub fn line(&self) -> usize {
        self.line
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    /// Execute a whole script.  The first uncaught error halts the run and
    /// is reported with the number of the line that raised it.
    pub fn run(&mut self, src: &str) -> Result<(), LineError> {
        for line in src.lines() {
            self.exec_line(line).map_err(|error| LineError { line: self.line, error })?;
        }
        self.finish_input().map_err(|error| LineError { line: self.line, error })
    }

    /// Feed one top-level line.
    pub fn exec_line(&mut self, line: &str) -> Result<(), Error> {
        self.line += 1;
        let mut machine = std::mem::take(&mut self.machine);
        let result = self.feed(&mut machine, line);
        self.machine = machine;
        match result? {
            None => Ok(()),
            Some(cf) => Err(Error::UnhandledSignal(cf.keyword())),
        }
    }

    /// End of input: reject an unterminated block and run a trailing try
    /// group.
    pub fn finish_input(&mut self) -> Result<(), Error> {
        let mut machine = std::mem::take(&mut self.machine);
        match self.finish_body(&mut machine)? {
            None => Ok(()),
            Some(cf) => Err(Error::UnhandledSignal(cf.keyword())),
        }
    }

    /// Evaluate an expression in the active scope.
    pub fn eval(&mut self, src: &str) -> Result<Value, Error> {
        let recv = self.receiver();
        eval_expr(self, src, recv.as_ref())
    }

    fn receiver(&self) -> Option<Rc<Instance>> {
        self.receivers.last().cloned().flatten()
    }

    /// Execute a captured body through a fresh machine.
    fn exec_body(&mut self, body: &[String]) -> Flow {
        let mut machine = BlockMachine::new();
        for line in body {
            if let Some(cf) = self.feed(&mut machine, line)? {
                return Ok(Some(cf));
            }
        }
        self.finish_body(&mut machine)
    }

    fn finish_body(&mut self, machine: &mut BlockMachine) -> Flow {
        machine.finish()?;
        match machine.take_pending_try() {
            Some(group) => self.run_try_group(group),
            None => Ok(None),
        }
    }

    fn feed(&mut self, machine: &mut BlockMachine, line: &str) -> Flow {
        if machine.is_capturing() {
            return match machine.absorb(line) {
                Some(capture) => self.close_block(machine, capture),
                None => Ok(None),
            };
        }

        let stmt = parse_line(line)?;
        let continues_group = matches!(
            stmt,
            Stmt::Blank | Stmt::Open(Opener::Except { .. }) | Stmt::Open(Opener::Now)
        );
        if !continues_group {
            if let Some(group) = machine.take_pending_try() {
                if let Some(cf) = self.run_try_group(group)? {
                    return Ok(Some(cf));
                }
            }
        }
        self.exec_stmt(machine, stmt)
    }

    fn exec_stmt(&mut self, machine: &mut BlockMachine, stmt: Stmt) -> Flow {
        match stmt {
            Stmt::Blank => {}
            Stmt::End => return Err(Error::syntax("terminator without open block")),
            Stmt::Open(opener) => self.open_block(machine, opener)?,
            Stmt::Assign { target, expr } => self.assign(target, &expr)?,
            Stmt::Const { name, expr } => {
                let value = self.eval(&expr)?;
                self.env.define_constant(&name, value)?;
            }
            Stmt::Print { expr } => {
                let value = self.eval(&expr)?;
                let text = self.render(&value)?;
                self.emit(text);
            }
            Stmt::Break => return Ok(Some(ControlFlow::Break)),
            Stmt::Continue => return Ok(Some(ControlFlow::Continue)),
            Stmt::Return { value } => {
                let value = match value {
                    Some(expr) => self.eval(&expr)?,
                    None => Value::None,
                };
                return Ok(Some(ControlFlow::Return(value)));
            }
            Stmt::Call { expr } => {
                self.eval(&expr)?;
            }
        }
        Ok(None)
    }

    // ── Blocks ────────────────────────────────────────────────────────────────

    fn open_block(&mut self, machine: &mut BlockMachine, opener: Opener) -> Result<(), Error> {
        let header = match opener {
            Opener::If { cond } => Header::If { taken: self.eval(&cond)?.truthy() },
            Opener::For { var, start, end } => Header::For { var, start, end },
            Opener::While { cond } => Header::While { cond },
            Opener::Func { name, params } => Header::Func { name, params },
            Opener::Class { name } => Header::Class { name },
            Opener::Try => Header::Try,
            Opener::Except { binding } => Header::Except {
                binding: binding.unwrap_or_else(|| DEFAULT_ERROR_BINDING.to_owned()),
            },
            Opener::Now => Header::Now,
        };
        tracing::debug!(kind = %header.kind(), line = self.line, "block opened");
        machine.open(header);
        Ok(())
    }

    fn close_block(&mut self, machine: &mut BlockMachine, capture: Capture) -> Flow {
        let Capture { header, body, .. } = capture;
        tracing::debug!(kind = %header.kind(), lines = body.len(), "block closed");
        match header {
            Header::If { taken } => {
                if taken {
                    return self.exec_body(&body);
                }
            }
            Header::For { var, start, end } => return self.process_for(&var, start, end, &body),
            Header::While { cond } => return self.process_while(&cond, &body),
            Header::Func { name, params } => {
                self.functions.insert(name.clone(), Rc::new(Function::new(name, params, body)));
            }
            Header::Class { name } => {
                let methods = collect_methods(&name, &body)?;
                self.classes.insert(name.clone(), Rc::new(Class::new(name, methods)));
            }
            Header::Try => machine.begin_try(body),
            Header::Except { binding } => machine.attach_except(binding, body)?,
            Header::Now => {
                let group = machine.attach_finally(body)?;
                return self.run_try_group(group);
            }
        }
        Ok(None)
    }

    /// Numeric loop over the inclusive range `start..=end`.  The loop opens
    /// no scope of its own: the variable is bound in the active scope.
    fn process_for(&mut self, var: &str, start: i64, end: i64, body: &[String]) -> Flow {
        if self.env.is_constant(var) {
            return Err(RuntimeError::ConstantReassignment(var.to_owned()).into());
        }
        for i in start..=end {
            self.env.assign(var, Value::Int(i))?;
            match self.exec_body(body)? {
                Some(ControlFlow::Break) => break,
                Some(ControlFlow::Continue) | None => {}
                Some(ret @ ControlFlow::Return(_)) => return Ok(Some(ret)),
            }
        }
        Ok(None)
    }

    fn process_while(&mut self, cond: &str, body: &[String]) -> Flow {
        while self.eval(cond)?.truthy() {
            match self.exec_body(body)? {
                Some(ControlFlow::Break) => break,
                Some(ControlFlow::Continue) | None => {}
                Some(ret @ ControlFlow::Return(_)) => return Ok(Some(ret)),
            }
        }
        Ok(None)
    }

    fn run_try_group(&mut self, group: TryGroup) -> Flow {
        let outcome = match self.exec_body(&group.try_body) {
            Err(Error::Runtime(err)) => {
                tracing::debug!(error = %err, handled = group.handler.is_some(), "try body raised");
                match &group.handler {
                    Some(handler) if !handler.is_empty() => {
                        match self.env.assign(&handler.binding, Value::Error(Rc::new(err))) {
                            Ok(()) => self.exec_body(&handler.body),
                            Err(e) => Err(e.into()),
                        }
                    }
                    _ => Ok(None),
                }
            }
            other => other,
        };
        match &group.finally {
            Some(body) => match self.exec_body(body)? {
                Some(cf) => Ok(Some(cf)),
                None => outcome,
            },
            None => outcome,
        }
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn assign(&mut self, target: Target, expr: &str) -> Result<(), Error> {
        match target {
            Target::Name(name) => {
                let value = self.eval(expr)?;
                self.env.assign(&name, value)?;
            }
            Target::Field(field) => {
                let inst = self
                    .receiver()
                    .ok_or_else(|| Error::expression(format!("'self.{field}' assigned outside of a method")))?;
                let value = self.eval(expr)?;
                inst.set_field(&field, value);
            }
            Target::Index { base, index } => {
                let value = self.eval(expr)?;
                let collection = self.eval(&base)?;
                let key = self.eval(&index)?;
                match &collection {
                    Value::Instance(inst) => {
                        self.invoke_overload(inst, Operator::SetItem, vec![key, value])?;
                    }
                    other => other.set_index(&key, value)?,
                }
            }
        }
        Ok(())
    }

    /// Text shown by `print|[…]`; instances may supply their own.
    fn render(&mut self, value: &Value) -> Result<String, Error> {
        match value {
            Value::Instance(inst) if inst.overload(Operator::Print).is_some() => {
                Ok(self.invoke_overload(inst, Operator::Print, Vec::new())?.to_string())
            }
            other => Ok(other.to_string()),
        }
    }

    fn emit(&mut self, text: String) {
        if self.echo_stdout {
            println!("{text}");
        } else {
            self.output.push(text);
        }
    }

    // ── Calls ─────────────────────────────────────────────────────────────────

    fn instantiate(&mut self, class: Rc<Class>, args: Vec<Value>) -> Result<Value, Error> {
        let inst = Rc::new(Instance::new(Rc::clone(&class)));
        match class.method(INIT_METHOD).cloned() {
            Some(init) => {
                self.invoke(&init, &inst, args)?;
            }
            None if args.is_empty() => {}
            None => {
                return Err(RuntimeError::invalid_call(format!(
                    "class '{}' has no {INIT_METHOD} and takes no arguments, {} given",
                    class.name,
                    args.len()
                ))
                .into())
            }
        }
        Ok(Value::Instance(inst))
    }

    fn invoke_overload(&mut self, inst: &Rc<Instance>, op: Operator, args: Vec<Value>) -> Result<Value, Error> {
        let func = inst.overload(op).cloned().ok_or_else(|| RuntimeError::OperatorNotImplemented {
            op: op.symbol().to_owned(),
            class: inst.class_name().to_owned(),
        })?;
        tracing::trace!(class = inst.class_name(), op = op.symbol(), "operator overload");
        self.invoke(&func, inst, args)
    }

    /// Run a method body in a new call frame.  `self` is bound to the
    /// receiver and a leading `self` parameter does not count towards arity.
    fn invoke(&mut self, func: &Rc<Function>, inst: &Rc<Instance>, args: Vec<Value>) -> Result<Value, Error> {
        let mut locals = bind_params(func, func.method_params(), args)?;
        locals.insert("self".to_owned(), Value::Instance(Rc::clone(inst)));
        self.run_frame(func, locals, Some(Rc::clone(inst)))
    }

    /// Plain `name(args)` call.  The caller's receiver stays in effect, so a
    /// helper called from a method still reaches `self.<field>`.
    fn invoke_plain(&mut self, func: &Rc<Function>, args: Vec<Value>) -> Result<Value, Error> {
        let locals = bind_params(func, &func.params, args)?;
        let recv = self.receiver();
        self.run_frame(func, locals, recv)
    }

    fn run_frame(
        &mut self,
        func: &Rc<Function>,
        locals: HashMap<String, Value>,
        recv: Option<Rc<Instance>>,
    ) -> Result<Value, Error> {
        tracing::debug!(function = %func.name, depth = self.env.depth() + 1, "call");
        self.env.push_frame(locals);
        self.receivers.push(recv);
        let result = self.exec_body(&func.body);
        self.receivers.pop();
        self.env.pop_frame();

        match result? {
            None => Ok(Value::None),
            Some(ControlFlow::Return(value)) => Ok(value),
            Some(cf) => Err(Error::UnhandledSignal(cf.keyword())),
        }
    }
}

fn bind_params(func: &Function, params: &[String], args: Vec<Value>) -> Result<HashMap<String, Value>, Error> {
    if params.len() != args.len() {
        return Err(RuntimeError::invalid_call(format!(
            "{}() takes {} argument(s), {} given",
            func.name,
            params.len(),
            args.len()
        ))
        .into());
    }
    Ok(params.iter().cloned().zip(args).collect())
}

// ── EvalContext impl ──────────────────────────────────────────────────────────

impl EvalContext for Interpreter {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.env.lookup(name)
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, Error> {
        if name == READ_FILE {
            return Ok(builtins::read_file(&self.file_loader, args)?);
        }
        if let Some(func) = self.functions.get(name).cloned() {
            return self.invoke_plain(&func, args);
        }
        if let Some(class) = self.classes.get(name).cloned() {
            return self.instantiate(class, args);
        }
        Err(RuntimeError::undefined(format!("function '{name}' is not defined")).into())
    }

    fn call_method(&mut self, inst: &Rc<Instance>, name: &str, args: Vec<Value>) -> Result<Value, Error> {
        let func = inst.method(name).cloned().ok_or_else(|| {
            RuntimeError::invalid_call(format!(
                "method '{name}' is not defined on class '{}'",
                inst.class_name()
            ))
        })?;
        self.invoke(&func, inst, args)
    }

    fn handle_operator(&mut self, inst: &Rc<Instance>, op: Operator, other: Option<Value>) -> Result<Value, Error> {
        let args = if op.is_unary() { Vec::new() } else { other.into_iter().collect() };
        self.invoke_overload(inst, op, args)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
