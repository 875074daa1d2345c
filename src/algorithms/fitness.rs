use super::chromosome::Chromosome;
use super::instance::ProblemInstance;
use crate::models::ClassSession;

pub const PREFERRED_DAY_BONUS: i64 = 50;
pub const INVALID_SESSION_PENALTY: i64 = 1000;

/// Scores chromosomes against one problem instance. Holds no state between calls.
#[derive(Debug, Clone, Copy)]
pub struct FitnessCalculator<'a> {
    instance: &'a ProblemInstance,
}

impl<'a> FitnessCalculator<'a> {
    pub fn new(instance: &'a ProblemInstance) -> Self {
        Self { instance }
    }

    pub fn calculate_fitness(&self, chromosome: &Chromosome) -> i64 {
        let mut score = 0;
        for (i, session) in chromosome.sessions.iter().enumerate() {
            if self.instance.preferred_days(&session.lecturer).contains(&session.weekday) {
                score += PREFERRED_DAY_BONUS;
            }
            if !self.is_session_valid(session) || !chromosome.collisions_of(i).is_empty() {
                score -= INVALID_SESSION_PENALTY;
            }
        }
        score
    }

    /// A session is invalid when its room cannot seat the batch or when it
    /// falls on a day outside the lecturer's stated preferred days. A
    /// lecturer with no stated days is treated as always available.
    pub fn is_session_valid(&self, session: &ClassSession) -> bool {
        let capacity = self.instance.room_capacity(&session.room).unwrap_or(0);
        let headcount = self.instance.batch_headcount(&session.batch_code).unwrap_or(u32::MAX);
        if capacity < headcount {
            return false;
        }

        let preferred = self.instance.preferred_days(&session.lecturer);
        preferred.is_empty() || preferred.contains(&session.weekday)
    }
}
