use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dl_core::{DicelangError, Identity, Namespace, Node, Tier, Value};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::schedule::{PersistAction, PersistenceSchedule, ScheduleOptions};
use crate::store::VariableStore;

mod context;
mod dice;
mod eval;
mod functions;
mod guard;
mod ops;


use context::ExecutionContext;
use dice::DiceRoller;
use eval::Evaluator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeLimits {
    pub max_loop_iterations: u64,
    /// Loop iterations allowed across all loops of one invocation, so
    /// nesting cannot multiply `max_loop_iterations`.
    pub max_total_loop_iterations: u64,
    pub max_dice_draws: u64,
    pub max_exponent_steps: u64,
    pub max_call_depth: usize,
}

impl Default for RuntimeLimits {
    fn default() -> Self {
        Self {
            max_loop_iterations: 1000,
            max_total_loop_iterations: 100_000,
            max_dice_draws: 10_000,
            max_exponent_steps: 10_000,
            max_call_depth: 64,
        }
    }
}

/// Order in which store tiers are consulted for an unqualified name once
/// the local frames have been searched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Tier>", into = "Vec<Tier>")]
pub struct ResolutionOrder(Vec<Tier>);

impl ResolutionOrder {
    pub fn new(tiers: Vec<Tier>) -> Result<Self, DicelangError> {
        let unique = tiers.iter().collect::<BTreeSet<_>>();
        if unique.len() != tiers.len() {
            return Err(DicelangError::operation(
                "Resolution order lists a tier more than once.",
            ));
        }
        Ok(Self(tiers))
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.0
    }
}

impl TryFrom<Vec<Tier>> for ResolutionOrder {
    type Error = DicelangError;

    fn try_from(tiers: Vec<Tier>) -> Result<Self, Self::Error> {
        Self::new(tiers)
    }
}

impl From<ResolutionOrder> for Vec<Tier> {
    fn from(order: ResolutionOrder) -> Self {
        order.0
    }
}

impl Default for ResolutionOrder {
    fn default() -> Self {
        Self(vec![Tier::Private, Tier::Shared, Tier::Global, Tier::Core])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedefinitionPolicy {
    #[default]
    Overwrite,
    Forbid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterpreterOptions {
    pub limits: RuntimeLimits,
    pub resolution_order: ResolutionOrder,
    pub redefinition: RedefinitionPolicy,
    pub schedule: ScheduleOptions,
    /// Fixed dice seed; each invocation derives its own stream from it.
    pub random_seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub value: Value,
    pub actions: Vec<String>,
}

/// Entry point shared by every caller. Safe to use from many threads at
/// once; each `execute` call gets its own context and dice stream.
pub struct Interpreter {
    store: Arc<VariableStore>,
    options: InterpreterOptions,
    schedule: Mutex<PersistenceSchedule>,
    invocations: AtomicU64,
}

impl Interpreter {
    pub fn new(store: Arc<VariableStore>, options: InterpreterOptions) -> Self {
        let schedule = PersistenceSchedule::new(options.schedule);
        Self {
            store,
            options,
            schedule: Mutex::new(schedule),
            invocations: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<VariableStore> {
        &self.store
    }

    pub fn options(&self) -> &InterpreterOptions {
        &self.options
    }

    #[tracing::instrument(level = "debug", skip(self, program), fields(kind = program.kind_name()))]
    pub fn execute(&self, program: &Node, user: &str, server: &str) -> Result<Outcome, DicelangError> {
        let invocation = self.invocations.fetch_add(1, Ordering::Relaxed);
        let dice = match self.options.random_seed {
            Some(seed) => DiceRoller::seeded(seed.wrapping_add(invocation)),
            None => DiceRoller::from_entropy(),
        };
        let context = ExecutionContext::new(Identity::new(user, server));
        let mut evaluator = Evaluator::new(&self.store, &self.options, context, dice);
        let result = evaluator.evaluate(program);
        let actions = evaluator.into_actions();
        match result {
            Ok(value) => {
                debug!(value = %value, actions = actions.len(), "program finished");
                Ok(Outcome { value, actions })
            }
            Err(error) => {
                debug!(kind = %error.kind, message = %error.message, "program failed");
                Err(error.with_actions(actions))
            }
        }
    }

    /// Reports one completed command to the persistence schedule and
    /// performs whatever save or backup is now due.
    pub fn after_command(&self) -> Result<Option<PersistAction>, DicelangError> {
        let mut schedule = self.schedule.lock();
        schedule.update();
        if !self.store.is_durable() {
            return Ok(None);
        }
        let action = schedule.next_action();
        match action {
            Some(PersistAction::Backup) => {
                self.store.backup().map_err(|error| {
                    warn!(%error, "scheduled backup failed");
                    error
                })?;
                schedule.backed_up();
            }
            Some(PersistAction::Save) => {
                self.store.save().map_err(|error| {
                    warn!(%error, "scheduled save failed");
                    error
                })?;
                schedule.saved();
            }
            None => {}
        }
        Ok(action)
    }

    /// Final save on shutdown.
    pub fn flush(&self) -> Result<(), DicelangError> {
        let mut schedule = self.schedule.lock();
        self.store.save()?;
        schedule.saved();
        Ok(())
    }

    pub fn keys(&self, tier: Tier, user: &str, server: &str) -> BTreeSet<String> {
        let identity = Identity::new(user, server);
        self.store.keys(&Namespace::resolve(tier, &identity))
    }
}
