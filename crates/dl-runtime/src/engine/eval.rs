use dl_core::{DicelangError, DieForm, ErrorKind, Namespace, Node, Tier, Value};

use super::context::{ExecutionContext, Frame};
use super::dice::{render_draws, DiceRoller};
use super::guard::Guard;
use super::{ops, InterpreterOptions};
use crate::store::VariableStore;

/// Walks one program tree. Owns the per-invocation context and borrows
/// the shared store for the duration of the run.
pub(crate) struct Evaluator<'a> {
    pub(super) store: &'a VariableStore,
    pub(super) options: &'a InterpreterOptions,
    pub(super) context: ExecutionContext,
    dice: DiceRoller,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(
        store: &'a VariableStore,
        options: &'a InterpreterOptions,
        context: ExecutionContext,
        dice: DiceRoller,
    ) -> Self {
        Self {
            store,
            options,
            context,
            dice,
        }
    }

    pub(crate) fn into_actions(self) -> Vec<String> {
        self.context.into_actions()
    }

    pub(crate) fn evaluate(&mut self, node: &Node) -> Result<Value, DicelangError> {
        match node {
            Node::Integer { value } => Ok(Value::Integer(*value)),
            Node::Float { value } => Ok(Value::Float(*value)),
            Node::String { value } => Ok(Value::String(value.clone())),
            Node::Boolean { value } => Ok(Value::Boolean(*value)),
            Node::List { items } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.operand(item)?);
                }
                Ok(Value::List(values))
            }
            Node::Identifier { name } => Ok(self.read_variable(name)),
            Node::QualifiedIdentifier { tier, name } => Ok(self.read_qualified(*tier, name)),
            Node::Group { inner } => self.evaluate(inner),
            Node::Binary { op, left, right } => {
                let left = self.operand(left)?;
                let right = self.operand(right)?;
                ops::binary(*op, left, right, &self.options.limits)
            }
            Node::Unary { op, operand } => {
                let value = self.operand(operand)?;
                ops::unary(*op, value)
            }
            Node::Dice { count, sides, form } => self.roll(count.as_deref(), sides, *form),
            Node::Block { statements } => self.run_block(statements),
            Node::Assign { name, value } => {
                let value = self.operand(value)?;
                self.context.bind(name, value.clone());
                Ok(value)
            }
            Node::QualifiedAssign { tier, name, value } => {
                let namespace = self.writable_namespace(*tier, name)?;
                let value = self.operand(value)?;
                self.store.put(&namespace, name, value.clone())?;
                Ok(value)
            }
            Node::Delete { tier: None, name } => Ok(self.context.unbind(name)),
            Node::Delete {
                tier: Some(tier),
                name,
            } => {
                let namespace = self.writable_namespace(*tier, name)?;
                self.store.drop(&namespace, name)
            }
            Node::Print { value } => {
                let value = self.operand(value)?;
                self.context.log(value.to_string());
                Ok(value)
            }
            Node::If {
                condition,
                then,
                otherwise,
            } => {
                if self.condition(condition)? {
                    self.run_block(then)
                } else {
                    self.run_block(otherwise)
                }
            }
            Node::While { condition, body } => self.run_while(condition, body),
            Node::DoWhile { body, condition } => self.run_do_while(body, condition),
            Node::Define {
                name,
                params,
                body,
                tier,
            } => self.define_function(name, params, body, tier.unwrap_or(Tier::Private)),
            Node::Call { name, tier, args } => self.call_function(name, *tier, args),
        }
    }

    /// Evaluates a node whose value is consumed by an operation, so it must
    /// be bound.
    pub(super) fn operand(&mut self, node: &Node) -> Result<Value, DicelangError> {
        let value = self.evaluate(node)?;
        if !value.is_undefined() {
            return Ok(value);
        }
        Err(match unbound_name(node) {
            Some(name) => DicelangError::missing_identifier(name),
            None => DicelangError::operation(format!(
                "{} produced no value.",
                node.kind_name()
            )),
        })
    }

    /// Frames first, then the store tiers in the configured order.
    pub(super) fn read_variable(&self, name: &str) -> Value {
        if let Some(value) = self.context.lookup(name) {
            return value.clone();
        }
        for tier in self.options.resolution_order.tiers() {
            let value = self.read_qualified(*tier, name);
            if !value.is_undefined() {
                return value;
            }
        }
        Value::Undefined
    }

    pub(super) fn read_qualified(&self, tier: Tier, name: &str) -> Value {
        self.store
            .get(&Namespace::resolve(tier, &self.context.identity), name)
    }

    fn writable_namespace(&self, tier: Tier, name: &str) -> Result<Namespace, DicelangError> {
        if tier == Tier::Core {
            return Err(DicelangError::privilege(format!(
                "Cannot modify \"{}\": the core tier is read-only.",
                name
            )));
        }
        Ok(Namespace::resolve(tier, &self.context.identity))
    }

    fn condition(&mut self, node: &Node) -> Result<bool, DicelangError> {
        let value = self.operand(node)?;
        value.as_bool().ok_or_else(|| {
            DicelangError::operation(format!(
                "Condition must be a boolean, got {}.",
                value.type_name()
            ))
        })
    }

    pub(super) fn run_block(&mut self, statements: &[Node]) -> Result<Value, DicelangError> {
        let mut last = Value::Undefined;
        for statement in statements {
            last = self.evaluate(statement)?;
        }
        Ok(last)
    }

    /// Runs `body` with `frame` pushed, popping it again on every exit path.
    pub(super) fn in_frame<T>(
        &mut self,
        frame: Frame,
        body: impl FnOnce(&mut Self) -> Result<T, DicelangError>,
    ) -> Result<T, DicelangError> {
        self.context.push_frame(frame);
        let result = body(self);
        self.context.pop_frame();
        result
    }

    fn run_while(&mut self, condition: &Node, body: &[Node]) -> Result<Value, DicelangError> {
        let mut guard = Guard::new(
            ErrorKind::WhileLoopTimeout,
            self.options.limits.max_loop_iterations,
        );
        self.in_frame(Frame::new(), |this| {
            let mut last = Value::Undefined;
            while this.condition(condition)? {
                guard.tick()?;
                this.charge_loop(ErrorKind::WhileLoopTimeout)?;
                last = this.run_block(body)?;
            }
            Ok(last)
        })
    }

    fn run_do_while(&mut self, body: &[Node], condition: &Node) -> Result<Value, DicelangError> {
        let mut guard = Guard::new(
            ErrorKind::DoWhileLoopTimeout,
            self.options.limits.max_loop_iterations,
        );
        self.in_frame(Frame::new(), |this| loop {
            guard.tick()?;
            this.charge_loop(ErrorKind::DoWhileLoopTimeout)?;
            let last = this.run_block(body)?;
            if !this.condition(condition)? {
                return Ok(last);
            }
        })
    }

    /// Fails with the loop's timeout once every loop of this invocation
    /// together has run past the invocation-wide budget.
    fn charge_loop(&mut self, kind: ErrorKind) -> Result<(), DicelangError> {
        let limit = self.options.limits.max_total_loop_iterations;
        let total = self.context.count_loop_iteration();
        if total > limit {
            return Err(DicelangError::timeout(kind, limit));
        }
        Ok(())
    }

    fn roll(
        &mut self,
        count: Option<&Node>,
        sides: &Node,
        form: DieForm,
    ) -> Result<Value, DicelangError> {
        let count = match count {
            Some(node) => self.die_parameter(node, "count")?,
            None => 1,
        };
        let sides = self.die_parameter(sides, "sides")?;
        let mut guard = Guard::new(
            ErrorKind::DiceRollTimeout,
            self.options.limits.max_dice_draws,
        );
        let draws = self.dice.roll(count, sides, &mut guard)?;
        let faces = render_draws(&draws);
        match form {
            DieForm::Scalar => {
                let total = draws
                    .iter()
                    .try_fold(0i64, |sum, face| sum.checked_add(*face))
                    .ok_or_else(|| DicelangError::operation("Dice total overflowed."))?;
                self.context
                    .log(format!("{}d{}: {} = {}", count, sides, faces, total));
                Ok(Value::Integer(total))
            }
            DieForm::Vector => {
                self.context.log(format!("{}d{}: {}", count, sides, faces));
                Ok(Value::List(draws.into_iter().map(Value::Integer).collect()))
            }
        }
    }

    fn die_parameter(&mut self, node: &Node, role: &str) -> Result<i64, DicelangError> {
        let value = self.operand(node)?;
        value.as_integer().ok_or_else(|| {
            DicelangError::operation(format!(
                "Dice {} must be an integer, got {}.",
                role,
                value.type_name()
            ))
        })
    }
}

fn unbound_name(node: &Node) -> Option<&str> {
    match node {
        Node::Identifier { name } | Node::QualifiedIdentifier { name, .. } => Some(name),
        Node::Group { inner } => unbound_name(inner),
        _ => None,
    }
}
