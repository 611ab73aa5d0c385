use std::collections::BTreeMap;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rayon::prelude::*;

use crate::computer::{Computer, ComputerConfig};
use crate::decode::{Opcode, Role};
use crate::error::Fault;
use crate::program::Program;

/// Configuration for a random-program soak test.
#[derive(Debug, Clone)]
pub struct FuzzConfig {
    /// Number of programs to generate and run.
    pub programs: usize,
    /// Words per generated program.
    pub program_len: usize,
    /// Maximum instructions per program.
    pub step_limit: usize,
    /// Highest address a program may touch.
    pub memory_limit: usize,
    /// Probability that a word is raw noise instead of a well-formed instruction.
    pub noise_rate: f64,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            programs: 1 << 12,
            program_len: 64,
            step_limit: 1 << 12,
            memory_limit: 1 << 16,
            noise_rate: 0.05,
        }
    }
}

/// How one generated program ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Halted,
    /// Waiting for input after consuming everything supplied.
    Starved,
    Faulted(&'static str),
}

/// Tally of outcomes over a whole soak run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FuzzReport {
    pub programs: usize,
    pub halted: usize,
    pub starved: usize,
    pub outputs: usize,
    /// Fault counts keyed by [`Fault::kind`].
    pub faults: BTreeMap<&'static str, usize>,
}

impl FuzzReport {
    fn record(&mut self, outcome: Outcome, outputs: usize) {
        self.programs += 1;
        self.outputs += outputs;
        match outcome {
            Outcome::Halted => self.halted += 1,
            Outcome::Starved => self.starved += 1,
            Outcome::Faulted(kind) => *self.faults.entry(kind).or_default() += 1,
        }
    }
}

/// Seed for program `index`, spread so neighbouring indices diverge.
fn program_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Generate a random program that is mostly well-formed instructions with
/// operands pointing back into the program, salted with noise words.
pub fn random_program(rng: &mut SmallRng, config: &FuzzConfig) -> Program {
    let len = config.program_len.max(1);
    let mut words = Vec::with_capacity(len + 3);
    while words.len() < len {
        if rng.gen_bool(config.noise_rate) {
            words.push(rng.gen_range(-100..100_000));
            continue;
        }
        let opcode = Opcode::ALL[rng.gen_range(0..Opcode::ALL.len())];
        let mut word = opcode.code();
        let mut scale = 100;
        for &role in opcode.roles() {
            let mode = match role {
                Role::Read => rng.gen_range(0..3),
                Role::Write => [0, 2][rng.gen_range(0..2)],
            };
            word += mode * scale;
            scale *= 10;
        }
        words.push(word);
        for _ in opcode.roles() {
            words.push(rng.gen_range(-4..len as i64 + 8));
        }
    }
    words.truncate(len);
    Program::from(words)
}

/// Run one program on a bounded computer, feeding `inputs` up front.
pub fn run_one(program: Program, config: &FuzzConfig, inputs: &[i64]) -> (Outcome, usize) {
    let computer_config = ComputerConfig {
        blocking_input: true,
        relative_base: true,
        step_limit: Some(config.step_limit),
        memory_limit: Some(config.memory_limit),
    };
    let mut computer = Computer::with_config(program, computer_config);
    let mut outputs = match computer.run(inputs.iter().copied()) {
        Ok(output) => usize::from(output.is_some()),
        Err(fault) => return (Outcome::Faulted(fault.kind()), 0),
    };
    // A program that keeps printing pauses often, so the step limit is
    // enforced across runs as well as within each one.
    loop {
        if computer.is_halted() {
            return (Outcome::Halted, outputs);
        }
        if computer.needs_input() {
            return (Outcome::Starved, outputs);
        }
        if computer.steps() >= config.step_limit {
            let fault = Fault::StepLimitExceeded { limit: config.step_limit };
            return (Outcome::Faulted(fault.kind()), outputs);
        }
        match computer.run([]) {
            Ok(output) => outputs += usize::from(output.is_some()),
            Err(fault) => return (Outcome::Faulted(fault.kind()), outputs),
        }
    }
}

/// Generate and run `config.programs` random programs in parallel.
///
/// Each program derives its own RNG from `seed` and its index, so the
/// report is identical for a given seed regardless of thread count.
pub fn soak(config: &FuzzConfig, seed: u64) -> FuzzReport {
    let outcomes: Vec<(Outcome, usize)> = (0..config.programs)
        .into_par_iter()
        .map(|index| {
            let mut rng = SmallRng::seed_from_u64(program_seed(seed, index));
            let program = random_program(&mut rng, config);
            let inputs: Vec<i64> = (0..4).map(|_| rng.gen_range(-10..10)).collect();
            run_one(program, config, &inputs)
        })
        .collect();

    let mut report = FuzzReport::default();
    for (outcome, outputs) in outcomes {
        report.record(outcome, outputs);
    }
    report
}
