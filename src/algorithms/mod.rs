pub mod allocator;
pub mod chromosome;
pub mod fitness;
pub mod instance;
pub mod operators;
pub mod optimizer;
pub mod repair;
pub mod seeder;
