//! Tree-walking evaluator
//!
//! Statements run against an explicit [`Scope`] chain. Every call, host or
//! script, goes through [`call_function`], which does the call-depth
//! accounting and grows the native stack when needed.

use std::path::Path;
use std::rc::Rc;

use indexmap::IndexMap;

use super::builtins::{describe_thrown, get_property, property_key, set_property};
use super::context::ExecutionContext;
use super::scope::Scope;
use super::value::{Closure, Function, Value};
use crate::error::{Error, Result, RuntimeErrorKind};
use crate::parser::ast::*;
use crate::parser::Span;
use crate::stack::ensure_sufficient_stack;

/// How a statement finished.
#[derive(Debug)]
pub(crate) enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Assignable location.
enum Reference {
    Binding(Rc<str>),
    Property(Value, Rc<str>),
}

/// Call `callee` with `this` and `args`.
pub fn call_function(
    ctx: &ExecutionContext,
    callee: &Value,
    this: Value,
    args: Vec<Value>,
) -> Result<Value> {
    let Value::Function(function) = callee else {
        return Err(Error::type_error(format!(
            "{} is not a function",
            callee.inspect()
        )));
    };

    let _call = ctx.enter_call()?;
    ensure_sufficient_stack(|| match &**function {
        Function::Native(native) => (native.call)(ctx, this, args),
        Function::Closure(closure) => {
            Interpreter::new(ctx, Rc::clone(&closure.origin)).call_closure(closure, this, args)
        }
    })
}

/// Turn a parsed function into a value closing over the global scope.
pub(crate) fn instantiate(
    ctx: &ExecutionContext,
    literal: Rc<FunctionLiteral>,
    origin: Rc<Path>,
) -> Value {
    Value::Function(Rc::new(Function::Closure(Closure {
        literal,
        scope: Rc::clone(ctx.global_scope()),
        origin,
    })))
}

pub(crate) struct Interpreter<'ctx> {
    ctx: &'ctx ExecutionContext,
    /// Module file the running code came from
    origin: Rc<Path>,
}

impl<'ctx> Interpreter<'ctx> {
    pub(crate) fn new(ctx: &'ctx ExecutionContext, origin: Rc<Path>) -> Self {
        Self { ctx, origin }
    }

    fn locate(&self, error: Error, span: &Span) -> Error {
        error.located(&self.origin, span)
    }

    fn call_closure(&self, closure: &Closure, this: Value, args: Vec<Value>) -> Result<Value> {
        let literal = &closure.literal;
        // Arrow functions see the `this` of the scope they were created in.
        let this = if literal.is_arrow {
            closure.scope.this()
        } else {
            this
        };
        let scope = Scope::function(&closure.scope, this);

        let mut args = args.into_iter();
        for param in &literal.params {
            scope.declare(param.name.clone(), args.next().unwrap_or_default(), true);
        }

        match &literal.body {
            FunctionBodyKind::Expression(expression) => self.eval(expression, &scope),
            FunctionBodyKind::Block(body) => {
                hoist_vars(&body.statements, &scope);
                match self.exec_statements(&body.statements, &scope)? {
                    Flow::Return(value) => Ok(value),
                    _ => Ok(Value::Undefined),
                }
            }
        }
    }

    fn closure(&self, literal: &Rc<FunctionLiteral>, scope: &Rc<Scope>) -> Value {
        Value::Function(Rc::new(Function::Closure(Closure {
            literal: Rc::clone(literal),
            scope: Rc::clone(scope),
            origin: Rc::clone(&self.origin),
        })))
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Run a statement list, hoisting its function declarations first.
    pub(crate) fn exec_statements(
        &self,
        statements: &[Statement],
        scope: &Rc<Scope>,
    ) -> Result<Flow> {
        for statement in statements {
            if let Statement::FunctionDecl(decl) = statement {
                scope.declare(decl.name.name.clone(), self.closure(&decl.function, scope), true);
            }
        }
        for statement in statements {
            match self.exec_statement(statement, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_statement(&self, statement: &Statement, scope: &Rc<Scope>) -> Result<Flow> {
        ensure_sufficient_stack(|| self.exec_statement_inner(statement, scope))
            .map_err(|e| self.locate(e, statement.span()))
    }

    fn exec_statement_inner(&self, statement: &Statement, scope: &Rc<Scope>) -> Result<Flow> {
        match statement {
            Statement::VariableDecl(decl) => {
                self.exec_variable_decl(decl, scope)?;
                Ok(Flow::Normal)
            }
            Statement::FunctionDecl(decl) => {
                // Already hoisted when it sits directly in a statement list.
                if scope.lookup(&decl.name.name).is_none() {
                    scope.declare(decl.name.name.clone(), self.closure(&decl.function, scope), true);
                }
                Ok(Flow::Normal)
            }
            Statement::Expression(stmt) => {
                self.eval(&stmt.expression, scope)?;
                Ok(Flow::Normal)
            }
            Statement::Block(block) => self.exec_statements(&block.statements, &Scope::block(scope)),
            Statement::If(stmt) => {
                if self.eval(&stmt.condition, scope)?.is_truthy() {
                    self.exec_statement(&stmt.then_branch, scope)
                } else if let Some(else_branch) = &stmt.else_branch {
                    self.exec_statement(else_branch, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Statement::While(stmt) => {
                while self.eval(&stmt.condition, scope)?.is_truthy() {
                    match self.exec_statement(&stmt.body, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::DoWhile(stmt) => {
                loop {
                    match self.exec_statement(&stmt.body, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if !self.eval(&stmt.condition, scope)?.is_truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::For(stmt) => self.exec_for(stmt, scope),
            Statement::ForOf(stmt) => self.exec_for_of(stmt, scope),
            Statement::Return(stmt) => {
                let value = match &stmt.value {
                    Some(expression) => self.eval(expression, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Statement::Break(_) => Ok(Flow::Break),
            Statement::Continue(_) => Ok(Flow::Continue),
            Statement::Throw(stmt) => {
                let value = self.eval(&stmt.value, scope)?;
                Err(Error::runtime(RuntimeErrorKind::Thrown, describe_thrown(&value)))
            }
            Statement::Empty(_) => Ok(Flow::Normal),
        }
    }

    fn exec_variable_decl(&self, decl: &VariableDecl, scope: &Rc<Scope>) -> Result<()> {
        for declarator in &decl.declarators {
            let value = match &declarator.initializer {
                Some(initializer) => Some(self.eval(initializer, scope)?),
                None => None,
            };
            let name = declarator.name.name.clone();
            match decl.kind {
                VariableKind::Var => scope.declare_var(name, value),
                VariableKind::Let => scope.declare(name, value.unwrap_or_default(), true),
                VariableKind::Const => scope.declare(name, value.unwrap_or_default(), false),
            }
        }
        Ok(())
    }

    /// C-style `for`; `let` bindings get a fresh copy per iteration so
    /// closures created in the body see that iteration's value.
    fn exec_for(&self, stmt: &ForStatement, scope: &Rc<Scope>) -> Result<Flow> {
        let loop_scope = Scope::block(scope);
        let mut per_iteration: Vec<Rc<str>> = Vec::new();
        match &stmt.init {
            Some(ForInit::VariableDecl(decl)) => {
                self.exec_variable_decl(decl, &loop_scope)?;
                if decl.kind == VariableKind::Let {
                    per_iteration = decl
                        .declarators
                        .iter()
                        .map(|d| d.name.name.clone())
                        .collect();
                }
            }
            Some(ForInit::Expression(expression)) => {
                self.eval(expression, &loop_scope)?;
            }
            None => {}
        }

        let mut iteration = copy_bindings(&loop_scope, scope, &per_iteration);
        loop {
            if let Some(test) = &stmt.test {
                if !self.eval(test, &iteration)?.is_truthy() {
                    break;
                }
            }
            match self.exec_statement(&stmt.body, &iteration)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
            iteration = copy_bindings(&iteration, scope, &per_iteration);
            if let Some(update) = &stmt.update {
                self.eval(update, &iteration)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_for_of(&self, stmt: &ForOfStatement, scope: &Rc<Scope>) -> Result<Flow> {
        let iterable = self.eval(&stmt.iterable, scope)?;
        let mut index = 0;
        loop {
            let item = match &iterable {
                Value::Array(items) => match items.borrow().get(index) {
                    Some(item) => item.clone(),
                    None => break,
                },
                Value::String(s) => match s.chars().nth(index) {
                    Some(c) => Value::string(c.to_string()),
                    None => break,
                },
                other => {
                    return Err(Error::type_error(format!(
                        "{} is not iterable",
                        other.inspect()
                    )))
                }
            };
            index += 1;

            let iteration = Scope::block(scope);
            let name = stmt.binding.name.clone();
            match stmt.kind {
                VariableKind::Var => scope.declare_var(name, Some(item)),
                VariableKind::Let => iteration.declare(name, item, true),
                VariableKind::Const => iteration.declare(name, item, false),
            }
            match self.exec_statement(&stmt.body, &iteration)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
        }
        Ok(Flow::Normal)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub(crate) fn eval(&self, expression: &Expression, scope: &Rc<Scope>) -> Result<Value> {
        self.eval_inner(expression, scope)
            .map_err(|e| self.locate(e, expression.span()))
    }

    fn eval_inner(&self, expression: &Expression, scope: &Rc<Scope>) -> Result<Value> {
        match expression {
            Expression::Number(n) => Ok(Value::Number(n.value)),
            Expression::String(s) => Ok(Value::String(s.value.clone())),
            Expression::Boolean(b) => Ok(Value::Bool(b.value)),
            Expression::Null(_) => Ok(Value::Null),
            Expression::Undefined(_) => Ok(Value::Undefined),
            Expression::Template(template) => {
                let mut out = String::new();
                for part in &template.parts {
                    match part {
                        TemplateElement::String(s) => out.push_str(s),
                        TemplateElement::Expression(e) => out.push_str(&self.eval(e, scope)?.to_string()),
                    }
                }
                Ok(Value::string(out))
            }
            Expression::Identifier(ident) => self.lookup(&ident.name, scope),
            Expression::This(_) => Ok(scope.this()),
            Expression::Array(array) => {
                let items = array
                    .elements
                    .iter()
                    .map(|e| self.eval(e, scope))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::array(items))
            }
            Expression::Object(object) => {
                let mut properties = IndexMap::new();
                for property in &object.properties {
                    let key = match &property.key {
                        PropertyKey::Static(name) => name.clone(),
                        PropertyKey::Computed(e) => property_key(&self.eval(e, scope)?),
                    };
                    let value = self.eval(&property.value, scope)?;
                    properties.insert(key, value);
                }
                Ok(Value::object(properties))
            }
            Expression::Function(literal) => Ok(self.function_expression(literal, scope)),
            Expression::Unary(unary) => self.eval_unary(unary, scope),
            Expression::Update(update) => {
                let reference = self.reference(&update.target, scope)?;
                let old = self.read(&reference, scope)?.to_number();
                let new = match update.operator {
                    UpdateOperator::Increment => old + 1.0,
                    UpdateOperator::Decrement => old - 1.0,
                };
                self.write(&reference, Value::Number(new), scope)?;
                Ok(Value::Number(if update.prefix { new } else { old }))
            }
            Expression::Binary(binary) => {
                let left = self.eval(&binary.left, scope)?;
                let right = self.eval(&binary.right, scope)?;
                Ok(binary_op(binary.operator, &left, &right))
            }
            Expression::Logical(logical) => {
                let left = self.eval(&logical.left, scope)?;
                let short_circuit = match logical.operator {
                    LogicalOperator::And => !left.is_truthy(),
                    LogicalOperator::Or => left.is_truthy(),
                    LogicalOperator::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(&logical.right, scope)
                }
            }
            Expression::Conditional(conditional) => {
                if self.eval(&conditional.test, scope)?.is_truthy() {
                    self.eval(&conditional.consequent, scope)
                } else {
                    self.eval(&conditional.alternate, scope)
                }
            }
            Expression::Assignment(assignment) => self.eval_assignment(assignment, scope),
            Expression::Call(_) | Expression::Member(_) | Expression::Index(_) => {
                Ok(self.eval_chain(expression, scope)?.unwrap_or_default())
            }
        }
    }

    fn lookup(&self, name: &str, scope: &Rc<Scope>) -> Result<Value> {
        if let Some(value) = scope.lookup(name) {
            return Ok(value);
        }
        if name == "globalThis" {
            return Ok(Value::Object(Rc::clone(self.ctx.global())));
        }
        self.ctx
            .get_global(name)
            .ok_or_else(|| Error::reference_error(format!("{} is not defined", name)))
    }

    /// Named function expressions can refer to themselves by name.
    fn function_expression(&self, literal: &Rc<FunctionLiteral>, scope: &Rc<Scope>) -> Value {
        match &literal.name {
            Some(name) if !literal.is_arrow => {
                let own = Scope::block(scope);
                let function = self.closure(literal, &own);
                own.declare(name.clone(), function.clone(), false);
                function
            }
            _ => self.closure(literal, scope),
        }
    }

    fn eval_unary(&self, unary: &UnaryExpression, scope: &Rc<Scope>) -> Result<Value> {
        if unary.operator == UnaryOperator::Typeof {
            // `typeof undeclared` is "undefined", not a ReferenceError.
            if let Expression::Identifier(ident) = &*unary.operand {
                let value = self.lookup(&ident.name, scope).unwrap_or_default();
                return Ok(Value::string(value.type_of()));
            }
        }

        let operand = self.eval(&unary.operand, scope)?;
        Ok(match unary.operator {
            UnaryOperator::Not => Value::Bool(!operand.is_truthy()),
            UnaryOperator::Negate => Value::Number(-operand.to_number()),
            UnaryOperator::Plus => Value::Number(operand.to_number()),
            UnaryOperator::Typeof => Value::string(operand.type_of()),
            UnaryOperator::Void => Value::Undefined,
        })
    }

    fn eval_assignment(&self, assignment: &AssignmentExpression, scope: &Rc<Scope>) -> Result<Value> {
        let reference = self.reference(&assignment.target, scope)?;
        let value = match assignment.operator {
            AssignmentOperator::Assign => self.eval(&assignment.value, scope)?,
            AssignmentOperator::NullishAssign => {
                let current = self.read(&reference, scope)?;
                if !current.is_nullish() {
                    return Ok(current);
                }
                self.eval(&assignment.value, scope)?
            }
            operator => {
                let current = self.read(&reference, scope)?;
                let rhs = self.eval(&assignment.value, scope)?;
                match operator.binary() {
                    Some(op) => binary_op(op, &current, &rhs),
                    None => rhs,
                }
            }
        };
        self.write(&reference, value.clone(), scope)?;
        Ok(value)
    }

    fn reference(&self, target: &Expression, scope: &Rc<Scope>) -> Result<Reference> {
        match target {
            Expression::Identifier(ident) => Ok(Reference::Binding(ident.name.clone())),
            Expression::Member(member) => {
                let object = self.eval(&member.object, scope)?;
                Ok(Reference::Property(object, member.property.name.clone()))
            }
            Expression::Index(index) => {
                let object = self.eval(&index.object, scope)?;
                let key = property_key(&self.eval(&index.index, scope)?);
                Ok(Reference::Property(object, key))
            }
            _ => Err(Error::type_error("Invalid assignment target")),
        }
    }

    fn read(&self, reference: &Reference, scope: &Rc<Scope>) -> Result<Value> {
        match reference {
            Reference::Binding(name) => self.lookup(name, scope),
            Reference::Property(object, key) => get_property(self.ctx, object, key),
        }
    }

    /// Undeclared names become properties of the global object.
    fn write(&self, reference: &Reference, value: Value, scope: &Rc<Scope>) -> Result<()> {
        match reference {
            Reference::Binding(name) => {
                if !scope.assign(name, value.clone())? {
                    self.ctx.set_global(name, value);
                }
                Ok(())
            }
            Reference::Property(object, key) => set_property(object, key, value),
        }
    }

    /// Member, index and call chains. `None` means an optional link
    /// short-circuited the rest of the chain.
    fn eval_chain(&self, expression: &Expression, scope: &Rc<Scope>) -> Result<Option<Value>> {
        match expression {
            Expression::Member(member) => {
                let Some(object) = self.eval_chain(&member.object, scope)? else {
                    return Ok(None);
                };
                if member.optional && object.is_nullish() {
                    return Ok(None);
                }
                get_property(self.ctx, &object, &member.property.name)
                    .map(Some)
                    .map_err(|e| self.locate(e, &member.span))
            }
            Expression::Index(index) => {
                let Some(object) = self.eval_chain(&index.object, scope)? else {
                    return Ok(None);
                };
                if index.optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = property_key(&self.eval(&index.index, scope)?);
                get_property(self.ctx, &object, &key)
                    .map(Some)
                    .map_err(|e| self.locate(e, &index.span))
            }
            Expression::Call(call) => self.eval_call(call, scope),
            other => self.eval(other, scope).map(Some),
        }
    }

    fn eval_call(&self, call: &CallExpression, scope: &Rc<Scope>) -> Result<Option<Value>> {
        let (this, callee) = match &*call.callee {
            Expression::Member(member) => {
                let Some(object) = self.eval_chain(&member.object, scope)? else {
                    return Ok(None);
                };
                if member.optional && object.is_nullish() {
                    return Ok(None);
                }
                let callee = get_property(self.ctx, &object, &member.property.name)?;
                (object, callee)
            }
            Expression::Index(index) => {
                let Some(object) = self.eval_chain(&index.object, scope)? else {
                    return Ok(None);
                };
                if index.optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = property_key(&self.eval(&index.index, scope)?);
                let callee = get_property(self.ctx, &object, &key)?;
                (object, callee)
            }
            other => match self.eval_chain(other, scope)? {
                Some(callee) => (Value::Undefined, callee),
                None => return Ok(None),
            },
        };

        if call.optional && callee.is_nullish() {
            return Ok(None);
        }
        if !matches!(callee, Value::Function(_)) {
            return Err(Error::type_error(format!(
                "{} is not a function",
                describe_callee(&call.callee)
            )));
        }

        let args = call
            .arguments
            .iter()
            .map(|argument| self.eval(argument, scope))
            .collect::<Result<Vec<_>>>()?;
        call_function(self.ctx, &callee, this, args)
            .map(Some)
            .map_err(|e| self.locate(e, &call.span))
    }
}

/// Source-like rendering of a callee for error messages.
fn describe_callee(expression: &Expression) -> String {
    match expression {
        Expression::Identifier(ident) => ident.name.to_string(),
        Expression::This(_) => "this".to_string(),
        Expression::Member(member) => {
            format!("{}.{}", describe_callee(&member.object), member.property.name)
        }
        Expression::Index(index) => format!("{}[...]", describe_callee(&index.object)),
        Expression::Call(call) => format!("{}(...)", describe_callee(&call.callee)),
        _ => "expression".to_string(),
    }
}

/// Fresh block scope under `parent` holding copies of `names` from `from`.
fn copy_bindings(from: &Rc<Scope>, parent: &Rc<Scope>, names: &[Rc<str>]) -> Rc<Scope> {
    if names.is_empty() {
        return Rc::clone(from);
    }
    let scope = Scope::block(parent);
    for name in names {
        scope.declare(name.clone(), from.lookup(name).unwrap_or_default(), true);
    }
    scope
}

/// Declare every `var` in a function body up front, as `undefined`.
fn hoist_vars(statements: &[Statement], scope: &Rc<Scope>) {
    for statement in statements {
        match statement {
            Statement::VariableDecl(decl) if decl.kind == VariableKind::Var => {
                for declarator in &decl.declarators {
                    scope.declare_var(declarator.name.name.clone(), None);
                }
            }
            Statement::Block(block) => hoist_vars(&block.statements, scope),
            Statement::If(stmt) => {
                hoist_vars(std::slice::from_ref(&*stmt.then_branch), scope);
                if let Some(else_branch) = &stmt.else_branch {
                    hoist_vars(std::slice::from_ref(&**else_branch), scope);
                }
            }
            Statement::While(stmt) => hoist_vars(std::slice::from_ref(&*stmt.body), scope),
            Statement::DoWhile(stmt) => hoist_vars(std::slice::from_ref(&*stmt.body), scope),
            Statement::For(stmt) => {
                if let Some(ForInit::VariableDecl(decl)) = &stmt.init {
                    if decl.kind == VariableKind::Var {
                        for declarator in &decl.declarators {
                            scope.declare_var(declarator.name.name.clone(), None);
                        }
                    }
                }
                hoist_vars(std::slice::from_ref(&*stmt.body), scope);
            }
            Statement::ForOf(stmt) => {
                if stmt.kind == VariableKind::Var {
                    scope.declare_var(stmt.binding.name.clone(), None);
                }
                hoist_vars(std::slice::from_ref(&*stmt.body), scope);
            }
            _ => {}
        }
    }
}

fn is_primitive_non_string(value: &Value) -> bool {
    matches!(
        value,
        Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_)
    )
}

fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

/// Apply a binary operator; these never fail.
pub(crate) fn binary_op(operator: BinaryOperator, left: &Value, right: &Value) -> Value {
    use std::cmp::Ordering::*;

    match operator {
        BinaryOperator::Add => {
            if is_primitive_non_string(left) && is_primitive_non_string(right) {
                Value::Number(left.to_number() + right.to_number())
            } else {
                Value::string(format!("{}{}", left, right))
            }
        }
        BinaryOperator::Subtract => Value::Number(left.to_number() - right.to_number()),
        BinaryOperator::Multiply => Value::Number(left.to_number() * right.to_number()),
        BinaryOperator::Divide => Value::Number(left.to_number() / right.to_number()),
        BinaryOperator::Modulo => Value::Number(left.to_number() % right.to_number()),
        BinaryOperator::Exponent => {
            let exponent = right.to_number();
            if exponent.is_nan() {
                Value::Number(f64::NAN)
            } else {
                Value::Number(left.to_number().powf(exponent))
            }
        }
        BinaryOperator::Equal => Value::Bool(left.loose_equals(right)),
        BinaryOperator::NotEqual => Value::Bool(!left.loose_equals(right)),
        BinaryOperator::StrictEqual => Value::Bool(left.strict_equals(right)),
        BinaryOperator::StrictNotEqual => Value::Bool(!left.strict_equals(right)),
        BinaryOperator::LessThan => Value::Bool(matches!(compare(left, right), Some(Less))),
        BinaryOperator::LessEqual => {
            Value::Bool(matches!(compare(left, right), Some(Less | Equal)))
        }
        BinaryOperator::GreaterThan => Value::Bool(matches!(compare(left, right), Some(Greater))),
        BinaryOperator::GreaterEqual => {
            Value::Bool(matches!(compare(left, right), Some(Greater | Equal)))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::PathBuf;

    use super::*;
    use crate::interp::console::{Capture, Console};
    use crate::loader::LoaderOptions;
    use crate::parser::{Parser, Span};

    /// Run `source` as a function body taking `give`, returning the given value.
    fn run_with(options: LoaderOptions, source: &str) -> (Result<Value>, Capture) {
        let (console, capture) = Console::capture();
        let ctx = ExecutionContext::with_console(options, console);
        let body = Parser::new(source)
            .and_then(Parser::parse_function_body)
            .unwrap_or_else(|e| panic!("parse failed: {}", e));
        let literal = Rc::new(FunctionLiteral {
            name: None,
            params: vec![Identifier::new("give", Span::default())],
            span: body.span,
            body: FunctionBodyKind::Block(body),
            is_arrow: false,
        });

        let slot = Rc::new(RefCell::new(Value::Undefined));
        let sink = Rc::clone(&slot);
        let give = Value::native("give", move |_, _, args| {
            *sink.borrow_mut() = args.into_iter().next().unwrap_or_default();
            Ok(Value::Undefined)
        });

        let origin: Rc<Path> = Rc::from(PathBuf::from("/test/module.js"));
        let function = instantiate(&ctx, literal, origin);
        let result = call_function(&ctx, &function, Value::Undefined, vec![give])
            .map(|_| slot.borrow().clone());
        (result, capture)
    }

    fn run(source: &str) -> Value {
        run_with(LoaderOptions::default(), source)
            .0
            .unwrap_or_else(|e| panic!("run failed: {}", e))
    }

    fn run_err(source: &str) -> Error {
        run_with(LoaderOptions::default(), source)
            .0
            .expect_err("expected a runtime error")
    }

    #[test]
    fn test_arithmetic_and_concatenation() {
        assert_eq!(run("give(1 + 2 * 3 - 4 / 2)").as_number(), Some(5.0));
        assert_eq!(run("give(2 ** 10 % 1000)").as_number(), Some(24.0));
        assert_eq!(run("give('n=' + 1 + 2)").as_str(), Some("n=12"));
        assert_eq!(run("give(1 + null)").as_number(), Some(1.0));
        assert_eq!(run("give([1, 2] + '')").as_str(), Some("1,2"));
    }

    #[test]
    fn test_self_containing_array_converts_to_string() {
        let value = run(
            "const a = [1]\na.push(a)\ngive([a + '', a.join('-'), String(a), a == 'x'].join('|'))",
        );
        assert_eq!(value.as_str(), Some("1,|1-|1,|false"));
    }

    #[test]
    fn test_closures_and_recursion() {
        let value = run(
            "function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2) }
             const counter = () => { let c = 0; return () => ++c }
             const next = counter(); next(); next()
             give([fib(10), next()])",
        );
        assert_eq!(value.to_string(), "55,3");
    }

    #[test]
    fn test_hoisting() {
        assert_eq!(run("give(twice(4))\nfunction twice(x) { return x * 2 }").as_number(), Some(8.0));
        assert!(run("give(v)\nvar v = 1").is_undefined());
    }

    #[test]
    fn test_loops() {
        let value = run(
            "let out = []
             for (let i = 0; i < 10; i++) { if (i % 2) continue; if (i > 6) break; out.push(i) }
             let j = 0; while (j < 3) j++
             let k = 0; do { k += 5 } while (k < 12)
             for (const ch of 'ab') out.push(ch)
             give(out.join(',') + '|' + j + '|' + k)",
        );
        assert_eq!(value.as_str(), Some("0,2,4,6,a,b|3|15"));
    }

    #[test]
    fn test_let_in_for_is_per_iteration() {
        let value = run(
            "const fns = []
             for (let i = 0; i < 3; i++) fns.push(() => i)
             give(fns.map(f => f()).join())",
        );
        assert_eq!(value.as_str(), Some("0,1,2"));
    }

    #[test]
    fn test_objects_methods_and_this() {
        let value = run(
            "const point = { x: 3, y: 4, norm() { return Math.sqrt(this.x ** 2 + this.y ** 2) } }
             point.z = 1
             point['w'] = 2
             give(`${point.norm()} ${Object.keys(point).join('')}`)",
        );
        assert_eq!(value.as_str(), Some("5 xynormzw"));
    }

    #[test]
    fn test_optional_chaining_and_nullish() {
        assert!(run("const o = null; give(o?.a.b.c)").is_undefined());
        assert!(run("const o = {}; give(o.f?.())").is_undefined());
        assert_eq!(run("let a; a ??= 7; give(a ?? 1)").as_number(), Some(7.0));
        assert_eq!(run("give((0 || null) ?? 'x')").as_str(), Some("x"));
    }

    #[test]
    fn test_undeclared_assignment_creates_global() {
        assert_eq!(run("leaked = 5; give(globalThis.leaked)").as_number(), Some(5.0));
    }

    #[test]
    fn test_typeof() {
        assert_eq!(
            run("give([typeof 1, typeof 'a', typeof nope, typeof null, typeof (() => 1)].join())")
                .as_str(),
            Some("number,string,undefined,object,function")
        );
    }

    #[test]
    fn test_top_level_return_ends_early() {
        assert_eq!(run("give(1)\nreturn\ngive(2)").as_number(), Some(1.0));
    }

    #[test]
    fn test_reference_error_is_located() {
        let err = run_err("let a = 1\nconst b = missing + a");
        assert_eq!(err.runtime_kind(), Some(RuntimeErrorKind::ReferenceError));
        match err {
            Error::Runtime {
                location: Some(location),
                ..
            } => {
                assert_eq!(location.path, PathBuf::from("/test/module.js"));
                assert_eq!((location.line, location.column), (2, 11));
            }
            other => panic!("expected located error, got {:?}", other),
        }
    }

    #[test]
    fn test_const_assignment_fails() {
        let err = run_err("const x = 1; x = 2");
        assert_eq!(err.runtime_kind(), Some(RuntimeErrorKind::TypeError));
    }

    #[test]
    fn test_calling_non_function() {
        let err = run_err("const o = { a: 1 }; o.a()");
        assert!(err.to_string().contains("o.a is not a function"));
    }

    #[test]
    fn test_throw_reports_value() {
        let err = run_err("throw Error('bad input')");
        assert_eq!(err.runtime_kind(), Some(RuntimeErrorKind::Thrown));
        assert!(err.to_string().starts_with("Uncaught: Error: bad input"));
    }

    #[test]
    fn test_unbounded_recursion_hits_depth_limit() {
        let (result, _) = run_with(
            LoaderOptions::new().max_call_depth(64),
            "function down(n) { return down(n + 1) }\ndown(0)",
        );
        let err = result.expect_err("recursion should be bounded");
        assert!(err.is_stack_exhaustion());
    }

    #[test]
    fn test_console_output_is_captured() {
        let (result, capture) = run_with(
            LoaderOptions::default(),
            "console.log('hi', 1, [1, 'a'], { k: true })\nconsole.error('warn')",
        );
        assert!(result.is_ok());
        assert_eq!(capture.stdout(), vec!["hi 1 [ 1, 'a' ] { k: true }"]);
        assert_eq!(capture.stderr(), vec!["warn"]);
    }

    #[test]
    fn test_binary_op_comparisons() {
        let a = Value::string("apple");
        let b = Value::string("banana");
        assert!(binary_op(BinaryOperator::LessThan, &a, &b).is_truthy());
        assert!(!binary_op(BinaryOperator::LessThan, &Value::Number(f64::NAN), &Value::Number(1.0)).is_truthy());
        assert!(binary_op(BinaryOperator::GreaterEqual, &Value::string("10"), &Value::Number(9.0)).is_truthy());
    }
}
