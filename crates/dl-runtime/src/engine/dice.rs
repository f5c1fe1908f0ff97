use dl_core::DicelangError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::guard::Guard;

#[derive(Debug)]
pub(crate) struct DiceRoller {
    rng: StdRng,
}

impl DiceRoller {
    pub(crate) fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub(crate) fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draws `count` independent faces in `1..=sides`, one guard step each.
    pub(crate) fn roll(
        &mut self,
        count: i64,
        sides: i64,
        guard: &mut Guard,
    ) -> Result<Vec<i64>, DicelangError> {
        if count < 0 {
            return Err(DicelangError::operation(format!(
                "Cannot roll a negative number of dice ({}).",
                count
            )));
        }
        if sides < 1 {
            return Err(DicelangError::operation(format!(
                "Dice need at least one side, got {}.",
                sides
            )));
        }
        let mut draws = Vec::new();
        for _ in 0..count {
            guard.tick()?;
            draws.push(self.rng.gen_range(1..=sides));
        }
        Ok(draws)
    }
}

pub(crate) fn render_draws(draws: &[i64]) -> String {
    let faces = draws
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}]", faces)
}

#[cfg(test)]
mod dice_tests {
    use super::*;
    use dl_core::ErrorKind;

    fn guard(limit: u64) -> Guard {
        Guard::new(ErrorKind::DiceRollTimeout, limit)
    }

    #[test]
    fn one_sided_dice_are_deterministic() {
        let mut roller = DiceRoller::from_entropy();
        let draws = roller.roll(4, 1, &mut guard(100)).expect("roll should pass");
        assert_eq!(draws, vec![1, 1, 1, 1]);
    }

    #[test]
    fn faces_stay_in_range_and_mean_converges() {
        let mut roller = DiceRoller::seeded(42);
        let mut total = 0i64;
        let rolls = 4000;
        for _ in 0..rolls {
            let draws = roller.roll(3, 6, &mut guard(10)).expect("roll should pass");
            assert!(draws.iter().all(|face| (1..=6).contains(face)));
            total += draws.iter().sum::<i64>();
        }
        let mean = total as f64 / rolls as f64;
        assert!((mean - 10.5).abs() < 0.25, "mean was {}", mean);
    }

    #[test]
    fn zero_dice_draw_nothing() {
        let mut roller = DiceRoller::seeded(1);
        assert!(roller
            .roll(0, 6, &mut guard(0))
            .expect("roll should pass")
            .is_empty());
    }

    #[test]
    fn invalid_parameters_are_operation_errors() {
        let mut roller = DiceRoller::seeded(1);
        let error = roller.roll(-1, 6, &mut guard(10)).expect_err("should fail");
        assert_eq!(error.kind, ErrorKind::OperationError);
        let error = roller.roll(1, 0, &mut guard(10)).expect_err("should fail");
        assert_eq!(error.kind, ErrorKind::OperationError);
    }

    #[test]
    fn too_many_draws_time_out() {
        let mut roller = DiceRoller::seeded(1);
        let error = roller.roll(11, 6, &mut guard(10)).expect_err("should fail");
        assert_eq!(error.kind, ErrorKind::DiceRollTimeout);
        assert_eq!(error.iterations, Some(10));
    }

    #[test]
    fn render_draws_lists_faces() {
        assert_eq!(render_draws(&[3, 5]), "[3, 5]");
        assert_eq!(render_draws(&[]), "[]");
    }
}
