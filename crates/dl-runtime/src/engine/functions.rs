use std::collections::BTreeSet;

use dl_core::{DicelangError, Function, Namespace, Node, Tier, Value};
use tracing::debug;

use super::context::Frame;
use super::eval::Evaluator;
use super::RedefinitionPolicy;

impl Evaluator<'_> {
    pub(super) fn define_function(
        &mut self,
        name: &str,
        params: &[String],
        body: &[Node],
        tier: Tier,
    ) -> Result<Value, DicelangError> {
        if tier == Tier::Core {
            return Err(DicelangError::definition(format!(
                "Cannot define \"{}\" in the core tier.",
                name
            )));
        }
        let mut seen = BTreeSet::new();
        for param in params {
            if !seen.insert(param.as_str()) {
                return Err(DicelangError::definition(format!(
                    "Parameter \"{}\" appears more than once in \"{}\".",
                    param, name
                )));
            }
        }

        let namespace = Namespace::resolve(tier, &self.context.identity);
        if self.options.redefinition == RedefinitionPolicy::Forbid
            && self.store.get(&namespace, name).as_function().is_some()
        {
            return Err(DicelangError::definition(format!(
                "Function \"{}\" is already defined in the {} tier.",
                name, tier
            )));
        }

        let function = Value::Function(Function {
            name: name.to_string(),
            params: params.to_vec(),
            body: body.to_vec(),
            tier,
        });
        self.store.put(&namespace, name, function.clone())?;
        debug!(name, %tier, arity = params.len(), "function defined");
        Ok(function)
    }

    pub(super) fn call_function(
        &mut self,
        name: &str,
        tier: Option<Tier>,
        args: &[Node],
    ) -> Result<Value, DicelangError> {
        let callee = match tier {
            Some(tier) => self.read_qualified(tier, name),
            None => self.read_variable(name),
        };
        let function = match callee {
            Value::Function(function) => function,
            Value::Undefined => return Err(DicelangError::missing_identifier(name)),
            other => {
                return Err(DicelangError::call(format!(
                    "\"{}\" is a {}, not a function.",
                    name,
                    other.type_name()
                )))
            }
        };
        if args.len() != function.arity() {
            return Err(DicelangError::call(format!(
                "\"{}\" expects {} argument(s), got {}.",
                name,
                function.arity(),
                args.len()
            )));
        }
        let max_depth = self.options.limits.max_call_depth;
        if self.context.call_depth() >= max_depth {
            return Err(DicelangError::call(format!(
                "Call depth exceeded {} while calling \"{}\".",
                max_depth, name
            )));
        }

        let mut frame = Frame::new();
        for (param, arg) in function.params.iter().zip(args) {
            let value = self.operand(arg)?;
            frame.insert(param.clone(), value);
        }

        self.context.enter_call();
        let result = self.in_frame(frame, |this| this.run_block(&function.body));
        self.context.exit_call();
        result
    }
}
