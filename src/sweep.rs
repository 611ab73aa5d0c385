use rayon::prelude::*;

use crate::computer::{Computer, ComputerConfig};
use crate::error::Fault;
use crate::program::Program;

/// One independent evaluation of a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Job {
    /// `(address, value)` pairs written before the first run.
    pub patches: Vec<(usize, i64)>,
    /// Input queued before the first run.
    pub inputs: Vec<i64>,
    /// Addresses read back once the program stops.
    pub probes: Vec<usize>,
}

/// What a job left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub outputs: Vec<i64>,
    /// Values at the job's probe addresses, in probe order.
    pub probes: Vec<i64>,
    pub halted: bool,
}

/// Evaluate one program under many independent configurations.
///
/// Every job gets a fresh computer of its own, so jobs run in parallel via
/// rayon without sharing any mutable state; only the program image is
/// shared. Results come back in job order.
pub struct Sweep {
    program: Program,
    config: ComputerConfig,
}

impl Sweep {
    pub fn new(program: Program, config: ComputerConfig) -> Self {
        Self { program, config }
    }

    /// Run a single job to halt or input starvation.
    pub fn evaluate(&self, job: &Job) -> Result<Evaluation, Fault> {
        let mut computer = Computer::with_config(self.program.clone(), self.config);
        for &(addr, value) in &job.patches {
            computer.poke(addr, value)?;
        }
        let outputs = computer.drain(job.inputs.iter().copied())?;
        let probes = job
            .probes
            .iter()
            .map(|&addr| computer.peek(addr))
            .collect::<Result<_, _>>()?;
        Ok(Evaluation {
            outputs,
            probes,
            halted: computer.is_halted(),
        })
    }

    pub fn run_all(&self, jobs: &[Job]) -> Vec<Result<Evaluation, Fault>> {
        jobs.par_iter().map(|job| self.evaluate(job)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAVITY_ASSIST: &str = "1,9,10,3,2,3,11,0,99,30,40,50";

    fn sweep(text: &str) -> Sweep {
        Sweep::new(text.parse().unwrap(), ComputerConfig::default())
    }

    #[test]
    fn test_probe_after_halt() {
        let job = Job {
            probes: vec![0, 3],
            ..Job::default()
        };
        let evaluation = sweep(GRAVITY_ASSIST).evaluate(&job).unwrap();
        assert_eq!(evaluation.probes, vec![3500, 70]);
        assert!(evaluation.halted);
        assert!(evaluation.outputs.is_empty());
    }

    #[test]
    fn test_patches_applied_before_run() {
        let job = Job {
            patches: vec![(1, 5), (2, 6)],
            probes: vec![3],
            ..Job::default()
        };
        let evaluation = sweep("1,0,0,3,99,7,8").evaluate(&job).unwrap();
        assert_eq!(evaluation.probes, vec![15]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sweep = sweep("3,9,8,9,10,9,4,9,99,-1,8");
        let jobs: Vec<Job> = (0..64)
            .map(|i| Job {
                inputs: vec![i % 12],
                ..Job::default()
            })
            .collect();
        let parallel = sweep.run_all(&jobs);
        let sequential: Vec<_> = jobs.iter().map(|job| sweep.evaluate(job)).collect();
        assert_eq!(parallel, sequential);
        for (job, result) in jobs.iter().zip(&parallel) {
            let expected = (job.inputs[0] == 8) as i64;
            assert_eq!(result.as_ref().unwrap().outputs, vec![expected]);
        }
    }

    #[test]
    fn test_faults_are_per_job() {
        let sweep = sweep("3,0,4,0,99");
        let jobs = vec![
            Job { inputs: vec![4], ..Job::default() },
            Job::default(),
        ];
        let results = sweep.run_all(&jobs);
        assert_eq!(results[0].as_ref().unwrap().outputs, vec![4]);
        assert_eq!(results[1], Err(Fault::InputExhausted { ip: 0 }));
    }
}
