use std::time::{Duration, Instant};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tokio::sync::{broadcast, watch};

use super::fitness::FitnessCalculator;
use super::instance::ProblemInstance;
use super::operators::{select_parents, two_point_crossover, Mutator};
use super::repair::{Repaired, Repairer};
use super::seeder::Seeder;
use crate::error::ScheduleError;
use crate::models::{GaParameters, GenerationOutcome, GenerationStatus, Optimize};

/// RNG stream of the orchestrator's parent selection.
const SELECTION_STREAM: u64 = 0;
/// RNG stream of the initial population; generation `g` breeds on `g + 2`.
const SEEDING_STREAM: u64 = 1;

/// Generational GA over timetable chromosomes.
///
/// Fitness evaluation and offspring breeding run on the rayon pool; only the
/// calling thread touches the best-so-far pair. Every parallel task draws from
/// its own `StdRng`, derived from the master seed, generation and index.
pub struct GeneticAlgorithm {
    instance: ProblemInstance,
    parameters: GaParameters,
    seeder: Seeder,
    status_tx: Option<broadcast::Sender<GenerationStatus>>,
    stop_rx: Option<watch::Receiver<bool>>,
}

/// State owned by one call to [`GeneticAlgorithm::run`].
struct RunContext {
    master_seed: u64,
    started: Instant,
    population: Vec<Repaired>,
    /// Fitness of `population`, index for index.
    scores: Vec<i64>,
    best: Option<(Repaired, i64)>,
    history: Vec<i64>,
}

impl GeneticAlgorithm {
    pub fn new(instance: ProblemInstance, parameters: GaParameters) -> Result<Self, ScheduleError> {
        validate(&parameters)?;
        let seeder = Seeder::new(&instance);
        Ok(Self {
            instance,
            parameters,
            seeder,
            status_tx: None,
            stop_rx: None,
        })
    }

    pub fn with_status(mut self, status_tx: broadcast::Sender<GenerationStatus>) -> Self {
        self.status_tx = Some(status_tx);
        self
    }

    pub fn with_stop(mut self, stop_rx: watch::Receiver<bool>) -> Self {
        self.stop_rx = Some(stop_rx);
        self
    }

    pub fn gene_count(&self) -> usize {
        self.seeder.gene_count()
    }

    pub fn run(&self) -> GenerationOutcome {
        let params = &self.parameters;
        let master_seed = params.seed.unwrap_or_else(|| rand::rng().random());
        info!(
            "Starting GA: {} genes, population {}, {} generations, seed {}",
            self.gene_count(),
            params.population_size,
            params.generations,
            master_seed
        );

        let mut ctx = self.start(master_seed);
        let mut selection_rng = worker_rng(master_seed, SELECTION_STREAM, 0);

        let mut generations = 0;
        for generation in 0..params.generations {
            if self.should_stop(&ctx) {
                info!("GA stopped before generation {}", generation);
                break;
            }

            let current = self.track_best(&mut ctx);
            if let Some((_, best)) = &ctx.best {
                ctx.history.push(*best);
            }
            generations += 1;
            self.progress(&ctx, generation, current, false);

            self.advance(&mut ctx, generation, &mut selection_rng);
        }

        // The last bred population has not been compared with the best yet.
        let current = self.track_best(&mut ctx);
        self.progress(&ctx, generations, current, true);

        let (best, fitness) = ctx.best.unwrap_or_default();
        info!(
            "GA finished after {} generations in {:?}: fitness {}, {} unresolved sessions",
            generations,
            ctx.started.elapsed(),
            fitness,
            best.exhausted.len()
        );

        GenerationOutcome {
            fitness,
            generations,
            schedule: best.chromosome.sessions,
            unassignable: self.seeder.unassignable().to_vec(),
            unresolved: best.exhausted,
            best_fitness_history: ctx.history,
        }
    }

    /// Seeds, repairs and scores the first population.
    fn start(&self, master_seed: u64) -> RunContext {
        let started = Instant::now();
        let repairer = Repairer::new(&self.instance);
        let population: Vec<Repaired> = (0..self.parameters.population_size)
            .into_par_iter()
            .map(|i| {
                let mut rng = worker_rng(master_seed, SEEDING_STREAM, i as u64);
                repairer.repair(self.seeder.seed(&self.instance, &mut rng))
            })
            .collect();
        let scores = self.evaluate(&population);

        RunContext {
            master_seed,
            started,
            population,
            scores,
            best: None,
            history: Vec::with_capacity(self.parameters.generations),
        }
    }

    fn evaluate(&self, population: &[Repaired]) -> Vec<i64> {
        let calculator = FitnessCalculator::new(&self.instance);
        population
            .par_iter()
            .map(|individual| calculator.calculate_fitness(&individual.chromosome))
            .collect()
    }

    /// Replaces the global best iff this generation's best beats it.
    /// Returns this generation's best score.
    fn track_best(&self, ctx: &mut RunContext) -> i64 {
        let optimize = self.parameters.optimize;
        let Some(leader) = best_index(&ctx.scores, optimize) else {
            return ctx.best.as_ref().map_or(0, |(_, f)| *f);
        };
        let current = ctx.scores[leader];

        let improved = ctx
            .best
            .as_ref()
            .map_or(true, |(_, best)| optimize.beats(current, *best));
        if improved {
            ctx.best = Some((ctx.population[leader].clone(), current));
        }
        current
    }

    /// Selects parents from the scored population, breeds their offspring and
    /// installs the survivors as the next population.
    fn advance(&self, ctx: &mut RunContext, generation: usize, selection_rng: &mut StdRng) {
        let parents = select_parents(&ctx.scores, self.parameters.optimize, selection_rng);
        let offspring = self.breed(ctx, &parents, generation);
        let (population, scores) = self.replace(offspring);
        ctx.population = population;
        ctx.scores = scores;
    }

    /// Pairs consecutive parents into mating slots; each slot yields two
    /// mutated and repaired children.
    fn breed(&self, ctx: &RunContext, parents: &[usize], generation: usize) -> Vec<Repaired> {
        let rate = self.parameters.crossover_rate;
        let mutator = Mutator::new(&self.instance, self.parameters.mutation_rate);
        let repairer = Repairer::new(&self.instance);
        let population = &ctx.population;
        let stream = breeding_stream(generation);

        parents
            .par_chunks(2)
            .enumerate()
            .flat_map_iter(|(slot, pair)| {
                let mut rng = worker_rng(ctx.master_seed, stream, slot as u64);
                let first = &population[pair[0]].chromosome;
                let second = &population[pair[pair.len() - 1]].chromosome;
                let (mut a, mut b) = two_point_crossover(first, second, rate, &mut rng);
                mutator.mutate(&mut a, &mut rng);
                mutator.mutate(&mut b, &mut rng);
                [repairer.repair(a), repairer.repair(b)]
            })
            .collect()
    }

    /// Keeps the population-size best children, returned with their scores.
    fn replace(&self, offspring: Vec<Repaired>) -> (Vec<Repaired>, Vec<i64>) {
        let scores = self.evaluate(&offspring);
        let mut ranked: Vec<(i64, Repaired)> = scores.into_iter().zip(offspring).collect();
        match self.parameters.optimize {
            Optimize::Maximize => ranked.sort_by(|a, b| b.0.cmp(&a.0)),
            Optimize::Minimize => ranked.sort_by(|a, b| a.0.cmp(&b.0)),
        }
        ranked.truncate(self.parameters.population_size);
        let (scores, population) = ranked.into_iter().unzip();
        (population, scores)
    }

    fn should_stop(&self, ctx: &RunContext) -> bool {
        if let Some(limit) = self.parameters.time_limit_ms {
            if ctx.started.elapsed() >= Duration::from_millis(limit) {
                return true;
            }
        }
        self.stop_rx
            .as_ref()
            .is_some_and(|rx| rx.has_changed().unwrap_or(false))
    }

    fn progress(&self, ctx: &RunContext, generation: usize, current: i64, is_finished: bool) {
        let (best_fitness, unresolved_conflicts) = ctx
            .best
            .as_ref()
            .map_or((current, 0), |(best, f)| (*f, best.exhausted.len()));
        debug!(
            "generation {}: current {}, best {}, unresolved {}",
            generation, current, best_fitness, unresolved_conflicts
        );

        if let Some(tx) = &self.status_tx {
            let _ = tx.send(GenerationStatus {
                generation,
                elapsed_time: ctx.started.elapsed(),
                current_fitness: current,
                best_fitness,
                unresolved_conflicts,
                is_finished,
            });
        }
    }
}

fn validate(parameters: &GaParameters) -> Result<(), ScheduleError> {
    if parameters.population_size < 2 {
        return Err(ScheduleError::InvalidParameters(
            "population_size must be at least 2".into(),
        ));
    }
    for (name, rate) in [
        ("crossover_rate", parameters.crossover_rate),
        ("mutation_rate", parameters.mutation_rate),
    ] {
        if !(0.0..=1.0).contains(&rate) {
            return Err(ScheduleError::InvalidParameters(format!(
                "{name} must lie in [0, 1], got {rate}"
            )));
        }
    }
    Ok(())
}

fn best_index(scores: &[i64], optimize: Optimize) -> Option<usize> {
    let mut best = None;
    for (i, &score) in scores.iter().enumerate() {
        match best {
            Some(b) if !optimize.beats(score, scores[b]) => {}
            _ => best = Some(i),
        }
    }
    best
}

fn worker_rng(master_seed: u64, stream: u64, index: u64) -> StdRng {
    let seed = master_seed
        ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ index.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    StdRng::seed_from_u64(seed)
}

fn breeding_stream(generation: usize) -> u64 {
    generation as u64 + 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::chromosome::Chromosome;
    use crate::algorithms::instance::tests::{batch, campus, lecturer, link, room, subject};
    use crate::models::{CourseRequest, ProblemRequest, RoomType, Weekday};

    fn parameters(generations: usize, seed: u64) -> GaParameters {
        GaParameters {
            population_size: 16,
            generations,
            seed: Some(seed),
            ..GaParameters::default()
        }
    }

    #[test]
    fn best_never_regresses() {
        let instance = ProblemInstance::build(&campus()).unwrap();
        let ga = GeneticAlgorithm::new(instance, parameters(15, 1)).unwrap();
        let outcome = ga.run();

        assert_eq!(outcome.generations, 15);
        assert_eq!(outcome.best_fitness_history.len(), 15);
        assert!(outcome
            .best_fitness_history
            .windows(2)
            .all(|w| w[1] >= w[0]));
        assert!(outcome.fitness >= *outcome.best_fitness_history.last().unwrap());
    }

    #[test]
    fn gene_count_survives_the_run() {
        let instance = ProblemInstance::build(&campus()).unwrap();
        let ga = GeneticAlgorithm::new(instance, parameters(10, 2)).unwrap();
        let outcome = ga.run();

        assert_eq!(outcome.schedule.len(), ga.gene_count());
        let mut ids: Vec<u32> = outcome.schedule.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        for session in &outcome.schedule {
            assert_eq!(session.end_time, session.start_time + session.kind.duration());
        }
    }

    #[test]
    fn same_seed_same_timetable() {
        let first = GeneticAlgorithm::new(ProblemInstance::build(&campus()).unwrap(), parameters(8, 42))
            .unwrap()
            .run();
        let second = GeneticAlgorithm::new(ProblemInstance::build(&campus()).unwrap(), parameters(8, 42))
            .unwrap()
            .run();
        assert_eq!(first.schedule, second.schedule);
        assert_eq!(first.fitness, second.fitness);
    }

    #[test]
    fn shared_room_scenario_ends_without_collisions() {
        let request = ProblemRequest {
            rooms: vec![room("R1", 40, RoomType::Classroom), room("R2", 20, RoomType::Classroom)],
            lecturers: vec![lecturer("L1", 1, &[Weekday::Monday])],
            courses: vec![CourseRequest { course_id: 1, department_id: 1 }],
            subjects: vec![subject("S1", 1, false)],
            batches: vec![batch("B1", 1, 30), batch("B2", 1, 30)],
            batch_subjects: vec![link("B1", "S1"), link("B2", "S1")],
        };
        let instance = ProblemInstance::build(&request).unwrap();
        let outcome = GeneticAlgorithm::new(instance, parameters(5, 9)).unwrap().run();

        assert!(outcome.unresolved.is_empty());
        assert_eq!(outcome.fitness, 100);
        let [a, b] = &outcome.schedule[..] else {
            panic!("expected two sessions");
        };
        assert!(!a.collides_with(b));
    }

    #[test]
    fn offspring_replace_the_population() {
        let instance = ProblemInstance::build(&campus()).unwrap();
        let params = GaParameters {
            mutation_rate: 1.0,
            ..parameters(1, 11)
        };
        let ga = GeneticAlgorithm::new(instance, params).unwrap();
        let mut ctx = ga.start(11);
        let chromosomes = |ctx: &RunContext| -> Vec<Chromosome> {
            ctx.population.iter().map(|r| r.chromosome.clone()).collect()
        };
        let seeded = chromosomes(&ctx);

        let mut rng = worker_rng(11, SELECTION_STREAM, 0);
        ga.advance(&mut ctx, 0, &mut rng);

        let bred = chromosomes(&ctx);
        assert_eq!(bred.len(), 16);
        assert_ne!(bred, seeded);
        // Scores travel with the population they were computed for.
        assert_eq!(ctx.scores, ga.evaluate(&ctx.population));
        assert!(ctx.scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn rng_streams_do_not_overlap() {
        let draw = |stream: u64, index: u64| worker_rng(99, stream, index).random::<u64>();
        let selection = draw(SELECTION_STREAM, 0);
        for i in 0..16 {
            assert_ne!(selection, draw(SEEDING_STREAM, i));
            assert_ne!(selection, draw(breeding_stream(0), i));
            assert_ne!(draw(SEEDING_STREAM, i), draw(breeding_stream(0), i));
        }
    }

    #[test]
    fn unresolved_sessions_come_from_the_best_timetable() {
        // More single-room demand than a week holds.
        let mut request = ProblemRequest {
            rooms: vec![room("R1", 40, RoomType::Classroom)],
            lecturers: vec![lecturer("L1", 1, &[Weekday::Monday])],
            courses: vec![CourseRequest { course_id: 1, department_id: 1 }],
            subjects: Vec::new(),
            batches: vec![batch("B1", 1, 30)],
            batch_subjects: Vec::new(),
        };
        for n in 0..30 {
            let code = format!("S{n}");
            request.subjects.push(subject(&code, 1, false));
            request.batch_subjects.push(link("B1", &code));
        }
        let instance = ProblemInstance::build(&request).unwrap();
        let params = GaParameters {
            population_size: 4,
            ..parameters(2, 6)
        };
        let outcome = GeneticAlgorithm::new(instance, params).unwrap().run();

        assert!(!outcome.unresolved.is_empty());
        assert_eq!(
            outcome.unresolved,
            Chromosome::new(outcome.schedule.clone()).colliding_sessions()
        );
    }

    #[test]
    fn stop_signal_ends_the_run() {
        let (stop_tx, stop_rx) = watch::channel(false);
        stop_tx.send_replace(true);
        let instance = ProblemInstance::build(&campus()).unwrap();
        let outcome = GeneticAlgorithm::new(instance, parameters(50, 3))
            .unwrap()
            .with_stop(stop_rx)
            .run();

        assert_eq!(outcome.generations, 0);
        assert_eq!(outcome.schedule.len(), 4);
    }

    #[test]
    fn zero_time_limit_ends_the_run() {
        let instance = ProblemInstance::build(&campus()).unwrap();
        let params = GaParameters {
            time_limit_ms: Some(0),
            ..parameters(50, 3)
        };
        let outcome = GeneticAlgorithm::new(instance, params).unwrap().run();
        assert_eq!(outcome.generations, 0);
    }

    #[test]
    fn reports_every_generation() {
        let (status_tx, mut status_rx) = broadcast::channel(64);
        let instance = ProblemInstance::build(&campus()).unwrap();
        GeneticAlgorithm::new(instance, parameters(3, 4))
            .unwrap()
            .with_status(status_tx)
            .run();

        let mut statuses = Vec::new();
        while let Ok(status) = status_rx.try_recv() {
            statuses.push(status);
        }
        assert_eq!(statuses.len(), 4);
        assert!(statuses.last().unwrap().is_finished);
        assert!(statuses[..3].iter().all(|s| !s.is_finished));
    }

    #[test]
    fn rejects_bad_parameters() {
        let instance = ProblemInstance::build(&campus()).unwrap();
        let params = GaParameters {
            mutation_rate: 1.5,
            ..GaParameters::default()
        };
        assert!(matches!(
            GeneticAlgorithm::new(instance.clone(), params),
            Err(ScheduleError::InvalidParameters(_))
        ));
        let params = GaParameters {
            population_size: 1,
            ..GaParameters::default()
        };
        assert!(GeneticAlgorithm::new(instance, params).is_err());
    }

    #[test]
    fn best_index_follows_direction() {
        assert_eq!(best_index(&[3, 9, 9, 1], Optimize::Maximize), Some(1));
        assert_eq!(best_index(&[3, 9, 1, 1], Optimize::Minimize), Some(2));
        assert_eq!(best_index(&[], Optimize::Maximize), None);
    }
}
