//! # Evaluator
//!
//! Tree-walking evaluation of the loaded module graph. Expressions produce
//! [`Value`]s; statements produce a [`Flow`] that models `return` as an
//! explicit signal instead of an exception. Errors carry source positions
//! and the file of the module being evaluated.
//!
//! ## Module initialization
//! Initialization is two-phase across the whole graph:
//!
//! 1. Every module gets a scope (child of the shared intrinsics frame) and
//!    all of its function declarations are registered.
//! 2. Modules are visited in load order (dependencies first); imports are
//!    bound, then top-level constants evaluate in source order.
//!
//! Mutually recursive functions across modules work because functions exist
//! before any constant runs. A constant that needs a constant from a module
//! later in the load order (an import cycle) fails with a name error.
//!
//! ## Call semantics
//! Calls bind positional arguments first, then named arguments by parameter
//! name. Missing parameters become `null`; unknown named arguments are an
//! error listing the available names. A call depth beyond
//! [`MAX_CALL_DEPTH`] aborts with a stack-overflow error.

pub mod clip;
pub mod score;

use crate::ast::*;
use crate::error::{closest_name, Diagnostic, SourcePos, TakoError};
use crate::intrinsics;
use crate::loader::ModuleGraph;
use crate::pos::Pos;
use crate::rat::Rat;
use crate::scope::{AssignError, Scope};
use crate::value::{deep_eq, FuncValue, ObjectMap, ScoreValue, Value};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Maximum user-function call depth. A call exactly at the limit succeeds;
/// one above fails.
pub const MAX_CALL_DEPTH: usize = 512;

/// Statement result: either fall through or unwind to the enclosing call.
pub enum Flow {
    Normal,
    Return(Value),
}

/// Evaluated call arguments, positional then named.
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub named: Vec<(String, Value)>,
    pub pos: SourcePos,
}

impl CallArgs {
    pub fn named_arg(&self, name: &str) -> Option<&Value> {
        self.named
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

struct ModuleEnv {
    scope: Rc<Scope>,
    exported: HashSet<String>,
    declared: HashSet<String>,
}

/// The tree-walking evaluator. Owns per-module environments and the shared
/// diagnostics buffer for the duration of one compilation.
pub struct Evaluator<'a> {
    graph: &'a ModuleGraph,
    pub diagnostics: &'a mut Vec<Diagnostic>,
    envs: HashMap<String, ModuleEnv>,
    call_depth: usize,
    file: String,
}

/// Evaluate a loaded module graph: initialize every module, then run the
/// entry module's exported `main()` and return its score.
pub fn evaluate(
    graph: &ModuleGraph,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<ScoreValue, TakoError> {
    let mut ev = Evaluator::new(graph, diagnostics);
    ev.init_modules();
    ev.eval_constants()?;
    ev.call_main()
}

impl<'a> Evaluator<'a> {
    pub fn new(graph: &'a ModuleGraph, diagnostics: &'a mut Vec<Diagnostic>) -> Self {
        Self {
            graph,
            diagnostics,
            envs: HashMap::new(),
            call_depth: 0,
            file: String::new(),
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn type_error(&self, pos: SourcePos, message: impl Into<String>) -> TakoError {
        TakoError::Type {
            file: self.file.clone(),
            line: pos.line,
            column: pos.column,
            message: message.into(),
        }
    }

    fn name_error(&self, pos: SourcePos, name: &str, scope: &Scope) -> TakoError {
        let names = scope.visible_names();
        let suggestion = closest_name(name, names.iter().map(String::as_str));
        let message = match &suggestion {
            Some(s) => format!("undefined name '{}'. Did you mean '{}'?", name, s),
            None => format!("undefined name '{}'", name),
        };
        TakoError::Name {
            file: self.file.clone(),
            line: pos.line,
            column: pos.column,
            message,
            suggestion,
        }
    }

    // -----------------------------------------------------------------------
    // Module initialization

    /// Phase one: create every module's scope and register its functions.
    fn init_modules(&mut self) {
        let graph = self.graph;
        let root = Scope::root();
        intrinsics::install(&root);

        for id in &graph.order {
            let Some(module) = graph.module(id) else {
                continue;
            };
            let scope = Scope::child(&root);
            let mut exported = HashSet::new();
            let mut declared = HashSet::new();
            for decl in &module.program.body {
                declared.insert(decl.name().to_string());
                if decl.exported() {
                    exported.insert(decl.name().to_string());
                }
                if let Decl::Fn(f) = decl {
                    let func = FuncValue::User {
                        name: f.name.clone(),
                        params: f.params.clone(),
                        body: Rc::new(f.body.clone()),
                        closure: Rc::clone(&scope),
                        file: module.file.clone(),
                    };
                    scope.define(f.name.clone(), Value::Func(Rc::new(func)), false, true);
                }
            }
            self.envs.insert(
                id.clone(),
                ModuleEnv {
                    scope,
                    exported,
                    declared,
                },
            );
        }
        debug!("registered functions for {} module(s)", graph.order.len());
    }

    /// Phase two: bind imports and evaluate constants, in load order.
    fn eval_constants(&mut self) -> Result<(), TakoError> {
        let graph = self.graph;
        for id in &graph.order {
            let Some(module) = graph.module(id) else {
                continue;
            };
            self.file = module.file.clone();
            let scope = Rc::clone(&self.envs[id].scope);

            for (import, target_id) in module
                .program
                .imports
                .iter()
                .zip(module.resolved_imports.iter())
            {
                self.bind_import(import, target_id, &scope, &module.file)?;
            }

            for decl in &module.program.body {
                let bind = match decl {
                    Decl::Const(b) | Decl::Let(b) => b,
                    Decl::Fn(_) => continue,
                };
                let value = self.eval_expr(&bind.value, &scope)?;
                scope.define(bind.name.clone(), value, bind.mutable, true);
            }
        }
        Ok(())
    }

    fn bind_import(
        &mut self,
        import: &ImportDecl,
        target_id: &str,
        scope: &Rc<Scope>,
        file: &str,
    ) -> Result<(), TakoError> {
        let target = self.envs.get(target_id).ok_or_else(|| TakoError::Import {
            file: file.to_string(),
            message: format!("module \"{}\" was not loaded", import.from),
        })?;
        let target_scope = Rc::clone(&target.scope);
        let exported: HashSet<String> = target.exported.clone();
        let declared: HashSet<String> = target.declared.clone();

        match &import.names {
            ImportNames::Named(names) => {
                for name in names {
                    if !declared.contains(&name.name) {
                        return Err(TakoError::Import {
                            file: file.to_string(),
                            message: format!(
                                "module \"{}\" has no export named '{}'",
                                import.from, name.name
                            ),
                        });
                    }
                    if !exported.contains(&name.name) {
                        return Err(TakoError::Import {
                            file: file.to_string(),
                            message: format!(
                                "'{}' exists in \"{}\" but is not exported",
                                name.name, import.from
                            ),
                        });
                    }
                    match target_scope.get(&name.name) {
                        Some(value) => scope.define(name.local(), value, false, true),
                        None => {
                            // declared but not yet evaluated: a constant cycle
                            return Err(TakoError::Name {
                                file: file.to_string(),
                                line: import.pos.line,
                                column: import.pos.column,
                                message: format!(
                                    "cannot resolve '{}' from \"{}\": cyclic constant initialization",
                                    name.name, import.from
                                ),
                                suggestion: None,
                            });
                        }
                    }
                }
            }
            ImportNames::Star { alias } => {
                let mut map = ObjectMap::new();
                for name in &exported {
                    if let Some(value) = target_scope.get(name) {
                        map.set(name.clone(), value);
                    }
                }
                scope.define(alias.clone(), Value::object(map), false, true);
            }
        }
        Ok(())
    }

    /// Run the entry module's exported `main()` and unwrap the score value.
    fn call_main(&mut self) -> Result<ScoreValue, TakoError> {
        let graph = self.graph;
        let entry = graph.module(&graph.entry).ok_or_else(|| TakoError::Import {
            file: graph.entry.clone(),
            message: "entry module was not loaded".to_string(),
        })?;
        self.file = entry.file.clone();
        let env = &self.envs[&graph.entry];
        if !env.exported.contains("main") {
            return Err(TakoError::Import {
                file: entry.file.clone(),
                message: "entry module does not export a 'main' function".to_string(),
            });
        }
        let main = env.scope.get("main").ok_or_else(|| TakoError::Import {
            file: entry.file.clone(),
            message: "entry module does not define 'main'".to_string(),
        })?;
        let pos = entry.program.pos;
        let result = self.call_value(
            &main,
            CallArgs {
                positional: Vec::new(),
                named: Vec::new(),
                pos,
            },
        )?;
        match result {
            Value::Score(score) => Ok((*score).clone()),
            other => Err(self.type_error(
                pos,
                format!("main() must return a Score, got {}", other.type_name()),
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Calls

    pub fn call_value(&mut self, callee: &Value, args: CallArgs) -> Result<Value, TakoError> {
        match callee {
            Value::Func(f) => self.call_function(&Rc::clone(f), args),
            other => Err(self.type_error(
                args.pos,
                format!("value of type {} is not callable", other.type_name()),
            )),
        }
    }

    pub fn call_function(
        &mut self,
        func: &Rc<FuncValue>,
        args: CallArgs,
    ) -> Result<Value, TakoError> {
        match func.as_ref() {
            FuncValue::Native { f, .. } => f(self, &args),
            FuncValue::User {
                name,
                params,
                body,
                closure,
                file,
            } => {
                if self.call_depth >= MAX_CALL_DEPTH {
                    return Err(TakoError::StackOverflow {
                        file: self.file.clone(),
                        line: args.pos.line,
                        column: args.pos.column,
                        depth: MAX_CALL_DEPTH,
                    });
                }
                if args.positional.len() > params.len() {
                    return Err(self.type_error(
                        args.pos,
                        format!(
                            "{}() expects at most {} argument(s), got {}",
                            name,
                            params.len(),
                            args.positional.len()
                        ),
                    ));
                }

                let scope = Scope::child(closure);
                let positional_count = args.positional.len();
                for (param, value) in params.iter().zip(args.positional.iter()) {
                    scope.define(param.clone(), value.clone(), true, true);
                }
                for (arg_name, value) in &args.named {
                    match params.iter().position(|p| p == arg_name) {
                        Some(index) => {
                            if index < positional_count {
                                return Err(self.type_error(
                                    args.pos,
                                    format!(
                                        "{}(): argument '{}' is bound both positionally and by name",
                                        name, arg_name
                                    ),
                                ));
                            }
                            scope.define(arg_name.clone(), value.clone(), true, true);
                        }
                        None => {
                            return Err(self.type_error(
                                args.pos,
                                format!(
                                    "{}(): unknown named argument '{}' (available: {})",
                                    name,
                                    arg_name,
                                    params.join(", ")
                                ),
                            ));
                        }
                    }
                }
                for param in params.iter().skip(positional_count) {
                    if !args.named.iter().any(|(n, _)| n == param) {
                        scope.define(param.clone(), Value::Null, true, true);
                    }
                }

                self.call_depth += 1;
                let prev_file = std::mem::replace(&mut self.file, file.clone());
                let result = self.eval_stmts(&body.stmts, &scope);
                self.file = prev_file;
                self.call_depth -= 1;

                match result? {
                    Flow::Return(value) => Ok(value),
                    Flow::Normal => Ok(Value::Null),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Statements

    /// Evaluate a block in a fresh child frame.
    fn eval_block(&mut self, block: &Block, scope: &Rc<Scope>) -> Result<Flow, TakoError> {
        let inner = Scope::child(scope);
        self.eval_stmts(&block.stmts, &inner)
    }

    /// Evaluate statements directly in the given frame (used at function
    /// boundaries where the call frame is the block frame).
    fn eval_stmts(&mut self, stmts: &[Stmt], scope: &Rc<Scope>) -> Result<Flow, TakoError> {
        for stmt in stmts {
            match self.eval_stmt(stmt, scope)? {
                Flow::Normal => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn eval_stmt(&mut self, stmt: &Stmt, scope: &Rc<Scope>) -> Result<Flow, TakoError> {
        match stmt {
            Stmt::Const(bind) | Stmt::Let(bind) => {
                let value = self.eval_expr(&bind.value, scope)?;
                scope.define(bind.name.clone(), value, bind.mutable, true);
                Ok(Flow::Normal)
            }
            Stmt::Assign { target, value, pos } => {
                let value = self.eval_expr(value, scope)?;
                self.assign(target, value, scope, *pos)?;
                Ok(Flow::Normal)
            }
            Stmt::If(stmt) => self.eval_if(stmt, scope),
            Stmt::For(stmt) => self.eval_for(stmt, scope),
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, scope)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Expr(expr) => {
                self.eval_expr(expr, scope)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn assign(
        &mut self,
        target: &AssignTarget,
        value: Value,
        scope: &Rc<Scope>,
        pos: SourcePos,
    ) -> Result<(), TakoError> {
        match target {
            AssignTarget::Name(name) => match scope.assign(name, value) {
                Ok(()) => Ok(()),
                Err(AssignError::Immutable) => Err(self.type_error(
                    pos,
                    format!("cannot assign to immutable binding '{}'", name),
                )),
                Err(AssignError::Undefined) => Err(self.name_error(pos, name, scope)),
            },
            AssignTarget::Member { object, field } => {
                let object = self.eval_expr(object, scope)?;
                match object {
                    Value::Object(map) => {
                        map.borrow_mut().set(field.clone(), value);
                        Ok(())
                    }
                    other => Err(self.type_error(
                        pos,
                        format!("cannot set field '{}' on {}", field, other.type_name()),
                    )),
                }
            }
            AssignTarget::Index { object, index } => {
                let object = self.eval_expr(object, scope)?;
                let index = self.eval_expr(index, scope)?;
                match (&object, &index) {
                    (Value::Array(items), _) => {
                        let i = index.as_int().ok_or_else(|| {
                            self.type_error(pos, "array index must be an integer")
                        })?;
                        let mut items = items.borrow_mut();
                        if i < 0 || i as usize >= items.len() {
                            return Err(self.type_error(
                                pos,
                                format!("array index {} out of bounds (len {})", i, items.len()),
                            ));
                        }
                        items[i as usize] = value;
                        Ok(())
                    }
                    (Value::Object(map), Value::Str(key)) => {
                        map.borrow_mut().set(key.clone(), value);
                        Ok(())
                    }
                    _ => Err(self.type_error(
                        pos,
                        format!("cannot index-assign into {}", object.type_name()),
                    )),
                }
            }
        }
    }

    fn eval_if(&mut self, stmt: &IfStmt, scope: &Rc<Scope>) -> Result<Flow, TakoError> {
        let cond = self.eval_expr(&stmt.cond, scope)?;
        if cond.truthy() {
            return self.eval_block(&stmt.then_block, scope);
        }
        match &stmt.else_branch {
            Some(ElseBranch::If(next)) => self.eval_if(next, scope),
            Some(ElseBranch::Block(block)) => self.eval_block(block, scope),
            None => Ok(Flow::Normal),
        }
    }

    fn eval_for(&mut self, stmt: &ForStmt, scope: &Rc<Scope>) -> Result<Flow, TakoError> {
        let iter = self.eval_expr(&stmt.iter, scope)?;
        let items: Vec<Value> = match &iter {
            Value::Array(items) => items.borrow().clone(),
            Value::Range {
                start,
                end,
                inclusive,
            } => {
                let lo = start.as_int().ok_or_else(|| {
                    self.type_error(stmt.pos, "range bounds must be integers")
                })?;
                let hi = end.as_int().ok_or_else(|| {
                    self.type_error(stmt.pos, "range bounds must be integers")
                })?;
                let hi = if *inclusive { hi + 1 } else { hi };
                (lo..hi).map(|n| Value::Num(n as f64)).collect()
            }
            other => {
                return Err(self.type_error(
                    stmt.pos,
                    format!(
                        "for loop expects an array or integer range, got {}",
                        other.type_name()
                    ),
                ))
            }
        };
        for item in items {
            let frame = Scope::child(scope);
            frame.define(stmt.var.clone(), item, true, true);
            match self.eval_stmts(&stmt.body.stmts, &frame)? {
                Flow::Normal => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    // -----------------------------------------------------------------------
    // Expressions

    pub fn eval_expr(&mut self, expr: &Expr, scope: &Rc<Scope>) -> Result<Value, TakoError> {
        match expr {
            Expr::Null(_) => Ok(Value::Null),
            Expr::Bool(b, _) => Ok(Value::Bool(*b)),
            Expr::Int(n, _) => Ok(Value::Num(*n as f64)),
            Expr::Float(x, _) => Ok(Value::Num(*x)),
            Expr::Str(s, _) => Ok(Value::Str(s.clone())),
            Expr::PitchLit(p, _) => Ok(Value::Pitch(*p)),
            Expr::DurationLit { num, den, dots, pos } => {
                let base = Rat::new(*num as i64, *den as i64)
                    .ok_or_else(|| self.type_error(*pos, "duration denominator must be nonzero"))?;
                Ok(Value::Rat(apply_dots(base, *dots)))
            }
            Expr::PosLit { bar, beat, sub, pos } => {
                let base = Pos::Ref {
                    bar: *bar,
                    beat: *beat,
                };
                match sub {
                    Some(sub) if *sub > 0 => {
                        let offset = Rat::new(*sub as i64, 16)
                            .ok_or_else(|| self.type_error(*pos, "invalid subdivision"))?;
                        Ok(Value::Pos(base.shift(offset)))
                    }
                    _ => Ok(Value::Pos(base)),
                }
            }
            Expr::TempoLit(bpm, _) => Ok(Value::Num(*bpm)),
            Expr::Ident(name, pos) => scope
                .get(name)
                .ok_or_else(|| self.name_error(*pos, name, scope)),
            Expr::Array(items, _) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, scope)?);
                }
                Ok(Value::array(values))
            }
            Expr::Object(entries, _) => {
                let mut map = ObjectMap::new();
                for (key, value) in entries {
                    let value = self.eval_expr(value, scope)?;
                    map.set(key.clone(), value);
                }
                Ok(Value::object(map))
            }
            Expr::Unary { op, expr, pos } => {
                let value = self.eval_expr(expr, scope)?;
                self.apply_unop(*op, value, *pos)
            }
            Expr::Binary { op, lhs, rhs, pos } => self.eval_binary(*op, lhs, rhs, scope, *pos),
            Expr::Range {
                lo,
                hi,
                inclusive,
                pos: _,
            } => {
                let lo = self.eval_expr(lo, scope)?;
                let hi = self.eval_expr(hi, scope)?;
                Ok(Value::Range {
                    start: Box::new(lo),
                    end: Box::new(hi),
                    inclusive: *inclusive,
                })
            }
            Expr::Call { callee, args, pos } => {
                let callee = self.eval_expr(callee, scope)?;
                let mut positional = Vec::new();
                let mut named = Vec::new();
                for arg in args {
                    let value = self.eval_expr(&arg.value, scope)?;
                    match &arg.name {
                        Some(name) => named.push((name.clone(), value)),
                        None => positional.push(value),
                    }
                }
                self.call_value(
                    &callee,
                    CallArgs {
                        positional,
                        named,
                        pos: *pos,
                    },
                )
            }
            Expr::Member { object, field, pos } => {
                let object = self.eval_expr(object, scope)?;
                match &object {
                    Value::Object(map) => {
                        Ok(map.borrow().get(field).cloned().unwrap_or(Value::Null))
                    }
                    other => Err(self.type_error(
                        *pos,
                        format!("cannot read field '{}' of {}", field, other.type_name()),
                    )),
                }
            }
            Expr::Index { object, index, pos } => {
                let object = self.eval_expr(object, scope)?;
                let index = self.eval_expr(index, scope)?;
                match (&object, &index) {
                    (Value::Array(items), _) => {
                        let i = index.as_int().ok_or_else(|| {
                            self.type_error(*pos, "array index must be an integer")
                        })?;
                        let items = items.borrow();
                        if i < 0 || i as usize >= items.len() {
                            return Err(self.type_error(
                                *pos,
                                format!("array index {} out of bounds (len {})", i, items.len()),
                            ));
                        }
                        Ok(items[i as usize].clone())
                    }
                    (Value::Object(map), Value::Str(key)) => {
                        Ok(map.borrow().get(key).cloned().unwrap_or(Value::Null))
                    }
                    _ => Err(self.type_error(
                        *pos,
                        format!("cannot index into {}", object.type_name()),
                    )),
                }
            }
            Expr::Match(m) => self.eval_match(m, scope),
            Expr::Score(s) => {
                let score = score::eval_score(self, s, scope)?;
                Ok(Value::Score(Rc::new(score)))
            }
            Expr::Clip(c) => {
                let clip = clip::eval_clip(self, c, scope)?;
                Ok(Value::Clip(Rc::new(clip)))
            }
        }
    }

    fn eval_match(&mut self, m: &MatchExpr, scope: &Rc<Scope>) -> Result<Value, TakoError> {
        let subject = self.eval_expr(&m.subject, scope)?;
        let mut default: Option<&MatchArm> = None;
        for arm in &m.arms {
            match &arm.pattern {
                Some(pattern) => {
                    let candidate = self.eval_expr(pattern, scope)?;
                    if deep_eq(&subject, &candidate) {
                        return self.eval_expr(&arm.value, scope);
                    }
                }
                None => default = Some(arm),
            }
        }
        match default {
            Some(arm) => self.eval_expr(&arm.value, scope),
            None => Ok(Value::Null),
        }
    }

    fn apply_unop(&self, op: UnOp, value: Value, pos: SourcePos) -> Result<Value, TakoError> {
        match (op, &value) {
            (UnOp::Not, v) => Ok(Value::Bool(!v.truthy())),
            (UnOp::Neg, Value::Num(n)) => Ok(Value::Num(-n)),
            (UnOp::Neg, Value::Rat(r)) => Ok(Value::Rat(-*r)),
            (UnOp::Neg, other) => Err(self.type_error(
                pos,
                format!("cannot negate {}", other.type_name()),
            )),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        scope: &Rc<Scope>,
        pos: SourcePos,
    ) -> Result<Value, TakoError> {
        // short-circuit forms first
        match op {
            BinOp::And => {
                let left = self.eval_expr(lhs, scope)?;
                if !left.truthy() {
                    return Ok(left);
                }
                return self.eval_expr(rhs, scope);
            }
            BinOp::Or => {
                let left = self.eval_expr(lhs, scope)?;
                if left.truthy() {
                    return Ok(left);
                }
                return self.eval_expr(rhs, scope);
            }
            BinOp::Coalesce => {
                let left = self.eval_expr(lhs, scope)?;
                if !matches!(left, Value::Null) {
                    return Ok(left);
                }
                return self.eval_expr(rhs, scope);
            }
            _ => {}
        }

        let left = self.eval_expr(lhs, scope)?;
        let right = self.eval_expr(rhs, scope)?;
        self.apply_binop(op, left, right, pos)
    }

    pub fn apply_binop(
        &self,
        op: BinOp,
        left: Value,
        right: Value,
        pos: SourcePos,
    ) -> Result<Value, TakoError> {
        let mismatch = |ev: &Self| {
            ev.type_error(
                pos,
                format!(
                    "unsupported operand types for '{}': {} and {}",
                    op.symbol(),
                    left.type_name(),
                    right.type_name()
                ),
            )
        };

        match op {
            BinOp::Eq => return Ok(Value::Bool(deep_eq(&left, &right))),
            BinOp::NotEq => return Ok(Value::Bool(!deep_eq(&left, &right))),
            _ => {}
        }

        match (op, &left, &right) {
            // addition
            (BinOp::Add, Value::Num(a), Value::Num(b)) => Ok(Value::Num(a + b)),
            (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            (BinOp::Add, Value::Pitch(p), b) => match b.as_int() {
                Some(semitones) => Ok(Value::Pitch(p.transpose(semitones as i32))),
                None => Err(mismatch(self)),
            },
            (BinOp::Add, Value::Pos(_), Value::Pos(_)) => Err(self.type_error(
                pos,
                "cannot add two positions; subtract them or shift by a rational",
            )),
            (BinOp::Add, Value::Pos(p), b) => match rat_like(b) {
                Some(delta) => Ok(Value::Pos(p.shift(delta))),
                None => Err(mismatch(self)),
            },
            (BinOp::Add, Value::Rat(a), Value::Rat(b)) => Ok(Value::Rat(*a + *b)),
            (BinOp::Add, Value::Rat(a), Value::Num(b)) => match right.as_int() {
                Some(n) => Ok(Value::Rat(*a + Rat::int(n))),
                None => Ok(Value::Num(a.to_f64() + b)),
            },
            (BinOp::Add, Value::Num(a), Value::Rat(b)) => match left.as_int() {
                Some(n) => Ok(Value::Rat(Rat::int(n) + *b)),
                None => Ok(Value::Num(a + b.to_f64())),
            },

            // subtraction
            (BinOp::Sub, Value::Num(a), Value::Num(b)) => Ok(Value::Num(a - b)),
            (BinOp::Sub, Value::Pitch(p), b) => match b.as_int() {
                Some(semitones) => Ok(Value::Pitch(p.transpose(-semitones as i32))),
                None => Err(mismatch(self)),
            },
            (BinOp::Sub, Value::Pos(a), Value::Pos(b)) => match a.minus(*b) {
                Some(distance) => Ok(Value::Rat(distance)),
                None => Err(self.type_error(
                    pos,
                    "cannot subtract positions with different symbolic bases before normalization",
                )),
            },
            (BinOp::Sub, Value::Pos(p), b) => match rat_like(b) {
                Some(delta) => Ok(Value::Pos(p.shift(-delta))),
                None => Err(mismatch(self)),
            },
            (BinOp::Sub, Value::Rat(a), Value::Rat(b)) => Ok(Value::Rat(*a - *b)),
            (BinOp::Sub, Value::Rat(a), Value::Num(b)) => match right.as_int() {
                Some(n) => Ok(Value::Rat(*a - Rat::int(n))),
                None => Ok(Value::Num(a.to_f64() - b)),
            },
            (BinOp::Sub, Value::Num(a), Value::Rat(b)) => match left.as_int() {
                Some(n) => Ok(Value::Rat(Rat::int(n) - *b)),
                None => Ok(Value::Num(a - b.to_f64())),
            },

            // multiplication
            (BinOp::Mul, Value::Num(a), Value::Num(b)) => Ok(Value::Num(a * b)),
            (BinOp::Mul, Value::Rat(a), Value::Rat(b)) => Ok(Value::Rat(*a * *b)),
            (BinOp::Mul, Value::Rat(a), Value::Num(b)) => match right.as_int() {
                Some(n) => Ok(Value::Rat(*a * Rat::int(n))),
                None => Ok(Value::Num(a.to_f64() * b)),
            },
            (BinOp::Mul, Value::Num(a), Value::Rat(b)) => match left.as_int() {
                Some(n) => Ok(Value::Rat(Rat::int(n) * *b)),
                None => Ok(Value::Num(a * b.to_f64())),
            },

            // division: integer / integer is exact
            (BinOp::Div, Value::Num(a), Value::Num(b)) => {
                match (left.as_int(), right.as_int()) {
                    (Some(x), Some(y)) => Rat::new(x, y)
                        .map(Value::Rat)
                        .ok_or_else(|| self.type_error(pos, "division by zero")),
                    _ => {
                        if *b == 0.0 {
                            Err(self.type_error(pos, "division by zero"))
                        } else {
                            Ok(Value::Num(a / b))
                        }
                    }
                }
            }
            (BinOp::Div, Value::Rat(a), Value::Rat(b)) => a
                .checked_div(*b)
                .map(Value::Rat)
                .ok_or_else(|| self.type_error(pos, "division by zero")),
            (BinOp::Div, Value::Rat(a), Value::Num(b)) => match right.as_int() {
                Some(n) => a
                    .checked_div(Rat::int(n))
                    .map(Value::Rat)
                    .ok_or_else(|| self.type_error(pos, "division by zero")),
                None => {
                    if *b == 0.0 {
                        Err(self.type_error(pos, "division by zero"))
                    } else {
                        Ok(Value::Num(a.to_f64() / b))
                    }
                }
            },
            (BinOp::Div, Value::Num(a), Value::Rat(b)) => match left.as_int() {
                Some(n) => Rat::int(n)
                    .checked_div(*b)
                    .map(Value::Rat)
                    .ok_or_else(|| self.type_error(pos, "division by zero")),
                None => {
                    if b.is_zero() {
                        Err(self.type_error(pos, "division by zero"))
                    } else {
                        Ok(Value::Num(a / b.to_f64()))
                    }
                }
            },

            // remainder
            (BinOp::Rem, Value::Num(a), Value::Num(b)) => {
                if *b == 0.0 {
                    Err(self.type_error(pos, "remainder by zero"))
                } else {
                    Ok(Value::Num(a % b))
                }
            }

            // ordering
            (BinOp::Lt, _, _) | (BinOp::Le, _, _) | (BinOp::Gt, _, _) | (BinOp::Ge, _, _) => {
                let ordering = match (&left, &right) {
                    (Value::Num(a), Value::Num(b)) => a.partial_cmp(b),
                    (Value::Rat(a), Value::Rat(b)) => Some(a.cmp(b)),
                    (Value::Rat(a), Value::Num(b)) => a.to_f64().partial_cmp(b),
                    (Value::Num(a), Value::Rat(b)) => a.partial_cmp(&b.to_f64()),
                    _ => None,
                };
                let ordering = ordering.ok_or_else(|| {
                    self.type_error(
                        pos,
                        format!(
                            "cannot compare {} and {}",
                            left.type_name(),
                            right.type_name()
                        ),
                    )
                })?;
                let result = match op {
                    BinOp::Lt => ordering == std::cmp::Ordering::Less,
                    BinOp::Le => ordering != std::cmp::Ordering::Greater,
                    BinOp::Gt => ordering == std::cmp::Ordering::Greater,
                    _ => ordering != std::cmp::Ordering::Less,
                };
                Ok(Value::Bool(result))
            }

            _ => Err(mismatch(self)),
        }
    }
}

/// Dotted-note extension: each dot adds half the previous value, so `k`
/// dots multiply by `(2^(k+1) - 1) / 2^k`.
pub fn apply_dots(base: Rat, dots: u8) -> Rat {
    if dots == 0 {
        return base;
    }
    let pow = 1i64 << dots;
    match Rat::new(2 * pow - 1, pow) {
        Some(factor) => base * factor,
        None => base,
    }
}

/// A rational, or an integral number coerced to one. Duration arithmetic
/// stays exact under integer scaling this way.
pub fn rat_like(value: &Value) -> Option<Rat> {
    match value {
        Value::Rat(r) => Some(*r),
        Value::Num(_) => value.as_int().map(Rat::int),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_dots() {
        let quarter = Rat::new(1, 4).unwrap();
        assert_eq!(apply_dots(quarter, 0), quarter);
        assert_eq!(apply_dots(quarter, 1), Rat::new(3, 8).unwrap());
        assert_eq!(apply_dots(quarter, 2), Rat::new(7, 16).unwrap());
    }

    #[test]
    fn test_rat_like() {
        assert_eq!(rat_like(&Value::Num(3.0)), Some(Rat::int(3)));
        assert_eq!(rat_like(&Value::Num(0.5)), None);
        assert_eq!(
            rat_like(&Value::Rat(Rat::new(1, 4).unwrap())),
            Rat::new(1, 4)
        );
        assert_eq!(rat_like(&Value::Str("x".to_string())), None);
    }
}
