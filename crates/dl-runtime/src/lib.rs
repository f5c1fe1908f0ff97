mod engine;
mod schedule;
mod store;

pub use engine::{
    Interpreter, InterpreterOptions, Outcome, RedefinitionPolicy, ResolutionOrder, RuntimeLimits,
};
pub use schedule::{Cadence, PersistAction, PersistenceSchedule, ScheduleOptions};
pub use store::{JsonFileBackend, MemoryBackend, StoreBackend, VariableStore};
