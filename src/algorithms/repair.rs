//! Deterministic collision repair.
//!
//! A colliding session is tried, in order, with: a free room, a free
//! lecturer, another start hour on its day, a slot on one of its lecturer's
//! other preferred days, and finally the first weekday where its current
//! hours are free. A strategy only counts when it leaves the session with no
//! collision at all, so every accepted change strictly removes collisions and
//! the pass terminates. Sessions no strategy can fix are reported, not
//! raised.

use log::warn;

use super::allocator::{eligible_lecturers, room_candidates};
use super::chromosome::{valid_start_hours, Chromosome};
use super::instance::ProblemInstance;
use crate::error::ScheduleError;
use crate::models::{ClassSession, Weekday};

#[derive(Debug, Clone, Default)]
pub struct Repaired {
    pub chromosome: Chromosome,
    /// Ids of sessions still colliding after every strategy.
    pub exhausted: Vec<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct Repairer<'a> {
    instance: &'a ProblemInstance,
}

impl<'a> Repairer<'a> {
    pub fn new(instance: &'a ProblemInstance) -> Self {
        Self { instance }
    }

    pub fn repair(&self, mut chromosome: Chromosome) -> Repaired {
        // Each accepted fix removes at least one colliding pair.
        let max_passes = chromosome.len() + 1;
        for _ in 0..max_passes {
            let mut changed = false;
            for i in 0..chromosome.len() {
                if chromosome.collisions_of(i).is_empty() {
                    continue;
                }
                if let Some(fixed) = self.resolve(&chromosome, i) {
                    chromosome.sessions[i] = fixed;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let exhausted = chromosome.colliding_sessions();
        for &session in &exhausted {
            warn!("{}", ScheduleError::RepairExhausted { session });
        }
        Repaired { chromosome, exhausted }
    }

    fn resolve(&self, chromosome: &Chromosome, index: usize) -> Option<ClassSession> {
        let mut candidate = chromosome.sessions[index].clone();

        if self.shares(chromosome, index, &candidate, |a, b| a.room == b.room) {
            if let Some(room) = self.free_room(chromosome, index, &candidate) {
                candidate.room = room;
            }
        }
        if chromosome.fits(index, &candidate) {
            return Some(candidate);
        }

        if self.shares(chromosome, index, &candidate, |a, b| a.lecturer == b.lecturer) {
            if let Some(staff_no) = self.free_lecturer(chromosome, index, &candidate) {
                candidate.lecturer = staff_no;
            }
        }
        if chromosome.fits(index, &candidate) {
            return Some(candidate);
        }

        if let Some(moved) = self.relocate_same_day(chromosome, index, &candidate) {
            return Some(moved);
        }
        if let Some(moved) = self.relocate_preferred_day(chromosome, index, &candidate) {
            return Some(moved);
        }
        self.relocate_any_day(chromosome, index, &candidate)
    }

    fn shares(
        &self,
        chromosome: &Chromosome,
        index: usize,
        candidate: &ClassSession,
        same: impl Fn(&ClassSession, &ClassSession) -> bool,
    ) -> bool {
        chromosome
            .sessions
            .iter()
            .enumerate()
            .any(|(j, other)| j != index && candidate.overlaps(other) && same(candidate, other))
    }

    /// First room (by room number) that seats the batch and nobody else
    /// occupies at the candidate's time.
    fn free_room(&self, chromosome: &Chromosome, index: usize, candidate: &ClassSession) -> Option<String> {
        let rooms = room_candidates(self.instance, &candidate.batch_code, candidate.kind.room_type()).ok()?;
        rooms
            .into_iter()
            .filter(|&room| room != candidate.room)
            .find(|&room| {
                !chromosome
                    .sessions
                    .iter()
                    .enumerate()
                    .any(|(j, other)| j != index && other.room == room && candidate.overlaps(other))
            })
            .map(str::to_owned)
    }

    /// First free eligible lecturer, preferring those who like the day.
    fn free_lecturer(
        &self,
        chromosome: &Chromosome,
        index: usize,
        candidate: &ClassSession,
    ) -> Option<String> {
        let mut lecturers =
            eligible_lecturers(self.instance, &candidate.batch_code, &candidate.subject_code).ok()?;
        lecturers.retain(|&staff_no| staff_no != candidate.lecturer);
        lecturers.sort_by_key(|&staff_no| {
            !self
                .instance
                .preferred_days(staff_no)
                .contains(&candidate.weekday)
        });

        lecturers
            .into_iter()
            .find(|&staff_no| {
                !chromosome.sessions.iter().enumerate().any(|(j, other)| {
                    j != index && other.lecturer == staff_no && candidate.overlaps(other)
                })
            })
            .map(str::to_owned)
    }

    /// Later start hours of the same day first, then earlier ones.
    fn relocate_same_day(
        &self,
        chromosome: &Chromosome,
        index: usize,
        candidate: &ClassSession,
    ) -> Option<ClassSession> {
        let current = candidate.start_time;
        let later = valid_start_hours(candidate.kind).filter(|&h| h > current);
        let earlier = valid_start_hours(candidate.kind).filter(|&h| h < current);
        later
            .chain(earlier)
            .map(|hour| at(candidate, candidate.weekday, hour))
            .find(|moved| chromosome.fits(index, moved))
    }

    fn relocate_preferred_day(
        &self,
        chromosome: &Chromosome,
        index: usize,
        candidate: &ClassSession,
    ) -> Option<ClassSession> {
        self.instance
            .preferred_days(&candidate.lecturer)
            .iter()
            .filter(|&&day| day != candidate.weekday)
            .flat_map(|&day| valid_start_hours(candidate.kind).map(move |hour| (day, hour)))
            .map(|(day, hour)| at(candidate, day, hour))
            .find(|moved| chromosome.fits(index, moved))
    }

    /// First weekday on which the session's current hours are free.
    fn relocate_any_day(
        &self,
        chromosome: &Chromosome,
        index: usize,
        candidate: &ClassSession,
    ) -> Option<ClassSession> {
        Weekday::ALL
            .iter()
            .filter(|&&day| day != candidate.weekday)
            .map(|&day| at(candidate, day, candidate.start_time))
            .find(|moved| chromosome.fits(index, moved))
    }
}

fn at(session: &ClassSession, weekday: Weekday, start_time: u8) -> ClassSession {
    ClassSession {
        weekday,
        start_time,
        end_time: start_time + session.kind.duration(),
        ..session.clone()
    }
}
