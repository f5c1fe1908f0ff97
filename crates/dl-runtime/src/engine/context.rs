use std::collections::BTreeMap;

use dl_core::{Identity, Value};

pub(crate) type Frame = BTreeMap<String, Value>;

/// Per-invocation state: who is running, the local frame stack and the
/// action log. Nothing here outlives a single `execute` call.
#[derive(Debug)]
pub(crate) struct ExecutionContext {
    pub(crate) identity: Identity,
    frames: Vec<Frame>,
    actions: Vec<String>,
    call_depth: usize,
    loop_iterations: u64,
}

impl ExecutionContext {
    pub(crate) fn new(identity: Identity) -> Self {
        Self {
            identity,
            frames: vec![Frame::new()],
            actions: Vec::new(),
            call_depth: 0,
            loop_iterations: 0,
        }
    }

    pub(crate) fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop_frame(&mut self) -> Option<Frame> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Innermost binding of `name` across all frames.
    pub(crate) fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub(crate) fn bind(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    /// Removes `name` from the innermost frame only.
    pub(crate) fn unbind(&mut self, name: &str) -> Value {
        self.frames
            .last_mut()
            .and_then(|frame| frame.remove(name))
            .unwrap_or(Value::Undefined)
    }

    pub(crate) fn call_depth(&self) -> usize {
        self.call_depth
    }

    pub(crate) fn enter_call(&mut self) {
        self.call_depth += 1;
    }

    pub(crate) fn exit_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    /// Counts one loop iteration against the invocation-wide budget and
    /// returns the new total.
    pub(crate) fn count_loop_iteration(&mut self) -> u64 {
        self.loop_iterations += 1;
        self.loop_iterations
    }

    pub(crate) fn log(&mut self, action: String) {
        self.actions.push(action);
    }

    pub(crate) fn into_actions(self) -> Vec<String> {
        self.actions
    }
}

#[cfg(test)]
mod context_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn context() -> ExecutionContext {
        ExecutionContext::new(Identity::new("alice", "guild"))
    }

    #[test]
    fn popping_a_frame_restores_outer_binding() {
        let mut context = context();
        context.bind("x", Value::Integer(1));
        context.push_frame(Frame::new());
        context.bind("x", Value::Integer(2));
        assert_eq!(context.lookup("x"), Some(&Value::Integer(2)));
        context.pop_frame();
        assert_eq!(context.lookup("x"), Some(&Value::Integer(1)));
    }

    #[test]
    fn root_frame_is_never_popped() {
        let mut context = context();
        assert_eq!(context.pop_frame(), None);
        assert_eq!(context.depth(), 1);
    }

    #[test]
    fn unbind_only_touches_innermost_frame() {
        let mut context = context();
        context.bind("x", Value::Integer(1));
        context.push_frame(Frame::new());
        assert_eq!(context.unbind("x"), Value::Undefined);
        assert_eq!(context.lookup("x"), Some(&Value::Integer(1)));
    }

    #[test]
    fn actions_keep_emission_order() {
        let mut context = context();
        context.log("first".to_string());
        context.log("second".to_string());
        assert_eq!(
            context.into_actions(),
            vec!["first".to_string(), "second".to_string()]
        );
    }
}
