//! Roulette selection, two-point crossover and attribute mutation.

use rand::seq::IndexedRandom;
use rand::Rng;

use super::allocator::{allocate_room, assign_lecturer, preferred_day};
use super::chromosome::{random_start_hour, Chromosome};
use super::instance::ProblemInstance;
use crate::models::{ClassSession, Optimize, SessionKind};

/// Draws one population index with probability proportional to its score.
///
/// Scores are shifted so the worst individual weighs zero, which keeps the
/// wheel defined when penalties drive scores negative. A population of equal
/// scores is drawn uniformly.
pub fn roulette<R: Rng>(scores: &[i64], optimize: Optimize, rng: &mut R) -> usize {
    let weights = selection_weights(scores, optimize);
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return rng.random_range(0..scores.len());
    }

    let draw = rng.random_range(0.0..total);
    let mut cumulative = 0.0;
    for (i, weight) in weights.iter().enumerate() {
        cumulative += weight;
        if cumulative > draw {
            return i;
        }
    }
    scores.len() - 1
}

fn selection_weights(scores: &[i64], optimize: Optimize) -> Vec<f64> {
    match optimize {
        Optimize::Maximize => {
            let min = scores.iter().copied().min().unwrap_or(0);
            scores.iter().map(|&s| (s - min) as f64).collect()
        }
        Optimize::Minimize => {
            let max = scores.iter().copied().max().unwrap_or(0);
            scores.iter().map(|&s| (max - s) as f64).collect()
        }
    }
}

/// Two independent roulette draws per mating slot, one slot per individual.
pub fn select_parents<R: Rng>(scores: &[i64], optimize: Optimize, rng: &mut R) -> Vec<usize> {
    (0..scores.len() * 2)
        .map(|_| roulette(scores, optimize, rng))
        .collect()
}

/// With probability `rate` swaps the genes between two random cut points;
/// otherwise hands back copies of both parents. Always two children.
pub fn two_point_crossover<R: Rng>(
    first: &Chromosome,
    second: &Chromosome,
    rate: f64,
    rng: &mut R,
) -> (Chromosome, Chromosome) {
    let len = first.len().min(second.len());
    if len == 0 || !rng.random_bool(rate) {
        return (first.clone(), second.clone());
    }

    let a = rng.random_range(0..=len);
    let b = rng.random_range(0..=len);
    let (start, end) = if a <= b { (a, b) } else { (b, a) };

    let mut child1 = first.clone();
    let mut child2 = second.clone();
    child1.sessions[start..end].clone_from_slice(&second.sessions[start..end]);
    child2.sessions[start..end].clone_from_slice(&first.sessions[start..end]);
    (child1, child2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attribute {
    Lecturer,
    Room,
    Subject,
    Batch,
    Weekday,
    Time,
}

const ATTRIBUTES: [Attribute; 6] = [
    Attribute::Lecturer,
    Attribute::Room,
    Attribute::Subject,
    Attribute::Batch,
    Attribute::Weekday,
    Attribute::Time,
];

pub struct Mutator<'a> {
    instance: &'a ProblemInstance,
    rate: f64,
}

impl<'a> Mutator<'a> {
    pub fn new(instance: &'a ProblemInstance, rate: f64) -> Self {
        Self { instance, rate }
    }

    pub fn mutate<R: Rng>(&self, chromosome: &mut Chromosome, rng: &mut R) {
        for session in &mut chromosome.sessions {
            if rng.random_bool(self.rate) {
                let attribute = ATTRIBUTES[rng.random_range(0..ATTRIBUTES.len())];
                self.mutate_attribute(session, attribute, rng);
            }
        }
    }

    /// Regenerates one attribute. When no valid replacement exists the gene
    /// keeps its value.
    fn mutate_attribute<R: Rng>(&self, session: &mut ClassSession, attribute: Attribute, rng: &mut R) {
        let instance = self.instance;
        match attribute {
            Attribute::Lecturer => {
                if let Ok(staff_no) =
                    assign_lecturer(instance, &session.batch_code, &session.subject_code, rng)
                {
                    session.lecturer = staff_no;
                }
            }
            Attribute::Room => {
                if let Ok(room) =
                    allocate_room(instance, &session.batch_code, session.kind.room_type(), rng)
                {
                    session.room = room;
                }
            }
            Attribute::Subject => {
                let candidates: Vec<&String> = instance
                    .required_subjects(&session.batch_code)
                    .iter()
                    .filter(|code| {
                        session.kind == SessionKind::Lecture
                            || instance.subject(code).is_some_and(|s| s.has_lab)
                    })
                    .collect();
                if let Some(code) = candidates.choose(rng) {
                    session.subject_code = (*code).clone();
                }
            }
            Attribute::Batch => {
                // Sessions stay within the cohort's own course.
                let course = instance.batch_course(&session.batch_code);
                let candidates: Vec<&str> = instance
                    .batches()
                    .iter()
                    .filter(|b| {
                        Some(b.course_id) == course
                            && instance
                                .required_subjects(&b.batch_code)
                                .contains(&session.subject_code)
                    })
                    .map(|b| b.batch_code.as_str())
                    .collect();
                if let Some(code) = candidates.choose(rng) {
                    session.batch_code = (*code).to_owned();
                }
            }
            Attribute::Weekday => {
                session.weekday = preferred_day(instance, &session.lecturer, rng);
            }
            Attribute::Time => {
                session.start_time = random_start_hour(session.kind, rng);
            }
        }
        session.end_time = session.start_time + session.kind.duration();
    }
}
