use log::warn;
use rand::seq::IndexedRandom;
use rand::Rng;

use super::allocator::{eligible_lecturers, preferred_day, room_candidates};
use super::chromosome::{random_start_hour, Chromosome};
use super::instance::{Demand, ProblemInstance};
use crate::error::ScheduleError;
use crate::models::{ClassSession, SessionKind, Unassignable, Weekday};

/// A demand that passed allocation checks, with its candidate pools.
#[derive(Debug, Clone)]
struct Slot {
    id: u32,
    demand: Demand,
    lecturers: Vec<String>,
    rooms: Vec<String>,
}

/// Builds initial chromosomes. Slot order (and so gene order and session
/// ids) is fixed for the instance, which keeps crossover positions aligned.
#[derive(Debug, Clone)]
pub struct Seeder {
    slots: Vec<Slot>,
    unassignable: Vec<Unassignable>,
}

impl Seeder {
    pub fn new(instance: &ProblemInstance) -> Self {
        let mut slots = Vec::new();
        let mut unassignable = Vec::new();

        for demand in instance.demands() {
            match Self::check(instance, &demand) {
                Ok((lecturers, rooms)) => slots.push(Slot {
                    id: slots.len() as u32 + 1,
                    demand,
                    lecturers,
                    rooms,
                }),
                Err(err) => {
                    warn!("{} {:?} left unassigned: {}", demand.subject_code, demand.kind, err);
                    unassignable.push(Unassignable {
                        batch_code: demand.batch_code,
                        subject_code: demand.subject_code,
                        kind: demand.kind,
                        reason: err.to_string(),
                    });
                }
            }
        }

        Self { slots, unassignable }
    }

    fn check(
        instance: &ProblemInstance,
        demand: &Demand,
    ) -> Result<(Vec<String>, Vec<String>), ScheduleError> {
        let lecturers = eligible_lecturers(instance, &demand.batch_code, &demand.subject_code)?;
        let rooms = room_candidates(instance, &demand.batch_code, demand.kind.room_type())?;
        Ok((
            lecturers.into_iter().map(str::to_owned).collect(),
            rooms.into_iter().map(str::to_owned).collect(),
        ))
    }

    /// Number of genes every chromosome of this instance carries.
    pub fn gene_count(&self) -> usize {
        self.slots.len()
    }

    pub fn unassignable(&self) -> &[Unassignable] {
        &self.unassignable
    }

    pub fn seed<R: Rng>(&self, instance: &ProblemInstance, rng: &mut R) -> Chromosome {
        let mut sessions: Vec<ClassSession> = Vec::with_capacity(self.slots.len());
        // Lecturer and day of the last lecture, reused by its lab component.
        let mut last_lecture: Option<(&Demand, String, Weekday)> = None;

        for slot in &self.slots {
            let paired = match (&last_lecture, slot.demand.kind) {
                (Some((lecture, staff_no, day)), SessionKind::Lab)
                    if lecture.batch_code == slot.demand.batch_code
                        && lecture.subject_code == slot.demand.subject_code =>
                {
                    Some((staff_no.clone(), *day))
                }
                _ => None,
            };

            let (lecturer, weekday) = match paired {
                Some(pair) => pair,
                None => {
                    let lecturer = pick(&slot.lecturers, rng);
                    let day = preferred_day(instance, &lecturer, rng);
                    (lecturer, day)
                }
            };

            let kind = slot.demand.kind;
            let start_time = random_start_hour(kind, rng);
            let session = ClassSession {
                id: slot.id,
                lecturer: lecturer.clone(),
                subject_code: slot.demand.subject_code.clone(),
                room: pick(&slot.rooms, rng),
                batch_code: slot.demand.batch_code.clone(),
                kind,
                weekday,
                start_time,
                end_time: start_time + kind.duration(),
            };

            if kind == SessionKind::Lecture {
                last_lecture = Some((&slot.demand, lecturer, weekday));
            }
            sessions.push(session);
        }

        Chromosome::new(sessions)
    }
}

/// Slot pools are never empty: `Seeder::check` rejects such demands.
fn pick<R: Rng>(pool: &[String], rng: &mut R) -> String {
    pool.choose(rng).cloned().unwrap_or_default()
}
