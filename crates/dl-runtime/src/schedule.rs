use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Trigger for one kind of persistence: whichever of the command count or
/// the elapsed interval is reached first. A zero disables that trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cadence {
    pub commands: u64,
    pub interval_secs: u64,
}

impl Cadence {
    pub fn new(commands: u64, interval: Duration) -> Self {
        Self {
            commands,
            interval_secs: interval.as_secs(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    fn is_due(&self, commands: u64, elapsed: Duration) -> bool {
        (self.commands > 0 && commands >= self.commands)
            || (self.interval_secs > 0 && elapsed >= self.interval())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleOptions {
    pub save_every: Cadence,
    pub backup_every: Cadence,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            save_every: Cadence::new(10, Duration::from_secs(5 * 60)),
            backup_every: Cadence::new(100, Duration::from_secs(60 * 60)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistAction {
    Save,
    Backup,
}

/// Counts commands and elapsed time to decide when the store should be
/// saved or backed up. Callers report completed work with `saved()` and
/// `backed_up()`; a backup also counts as a save.
#[derive(Debug, Clone)]
pub struct PersistenceSchedule {
    options: ScheduleOptions,
    commands_since_save: u64,
    commands_since_backup: u64,
    last_save: Instant,
    last_backup: Instant,
    now: Instant,
}

impl Default for PersistenceSchedule {
    fn default() -> Self {
        Self::new(ScheduleOptions::default())
    }
}

impl PersistenceSchedule {
    pub fn new(options: ScheduleOptions) -> Self {
        Self::starting_at(options, Instant::now())
    }

    pub fn starting_at(options: ScheduleOptions, now: Instant) -> Self {
        Self {
            options,
            commands_since_save: 0,
            commands_since_backup: 0,
            last_save: now,
            last_backup: now,
            now,
        }
    }

    /// Records one completed command.
    pub fn update(&mut self) {
        self.update_at(Instant::now());
    }

    pub fn update_at(&mut self, now: Instant) {
        self.now = self.now.max(now);
        self.commands_since_save += 1;
        self.commands_since_backup += 1;
    }

    pub fn should_save(&self) -> bool {
        self.options.save_every.is_due(
            self.commands_since_save,
            self.now.saturating_duration_since(self.last_save),
        )
    }

    pub fn should_back_up(&self) -> bool {
        self.options.backup_every.is_due(
            self.commands_since_backup,
            self.now.saturating_duration_since(self.last_backup),
        )
    }

    /// Backup wins over save when both are due.
    pub fn next_action(&self) -> Option<PersistAction> {
        if self.should_back_up() {
            Some(PersistAction::Backup)
        } else if self.should_save() {
            Some(PersistAction::Save)
        } else {
            None
        }
    }

    pub fn saved(&mut self) {
        self.commands_since_save = 0;
        self.last_save = self.now;
    }

    pub fn backed_up(&mut self) {
        self.saved();
        self.commands_since_backup = 0;
        self.last_backup = self.now;
    }

    pub fn commands_since_save(&self) -> u64 {
        self.commands_since_save
    }
}
