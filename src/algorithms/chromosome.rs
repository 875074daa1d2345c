//! Timetable chromosome: one [`ClassSession`] gene per demand.

use rand::Rng;

use crate::models::{ClassSession, SessionKind};

pub const SCHOOL_DAY_START: u8 = 8;
pub const SCHOOL_DAY_END: u8 = 18;
/// Midday hour; no session may start at it.
pub const BLOCKED_HOUR: u8 = 12;

/// Every start hour a session of `kind` may take, in ascending order.
pub fn valid_start_hours(kind: SessionKind) -> impl Iterator<Item = u8> {
    (SCHOOL_DAY_START..=SCHOOL_DAY_END - kind.duration()).filter(|&h| h != BLOCKED_HOUR)
}

pub fn random_start_hour<R: Rng>(kind: SessionKind, rng: &mut R) -> u8 {
    let last = SCHOOL_DAY_END - kind.duration();
    loop {
        let hour = rng.random_range(SCHOOL_DAY_START..=last);
        if hour != BLOCKED_HOUR {
            return hour;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chromosome {
    pub sessions: Vec<ClassSession>,
}

impl Chromosome {
    pub fn new(sessions: Vec<ClassSession>) -> Self {
        Self { sessions }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Indices of the sessions colliding with the session at `index`.
    pub fn collisions_of(&self, index: usize) -> Vec<usize> {
        let target = &self.sessions[index];
        self.sessions
            .iter()
            .enumerate()
            .filter(|&(j, other)| j != index && target.collides_with(other))
            .map(|(j, _)| j)
            .collect()
    }

    /// True when `candidate`, placed at `index`, collides with no other session.
    pub fn fits(&self, index: usize, candidate: &ClassSession) -> bool {
        self.sessions
            .iter()
            .enumerate()
            .all(|(j, other)| j == index || !candidate.collides_with(other))
    }

    /// Ids of every session involved in at least one collision.
    pub fn colliding_sessions(&self) -> Vec<u32> {
        (0..self.sessions.len())
            .filter(|&i| !self.collisions_of(i).is_empty())
            .map(|i| self.sessions[i].id)
            .collect()
    }
}
