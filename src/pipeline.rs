use log::debug;
use thiserror::Error;

use crate::computer::{Computer, ComputerConfig};
use crate::error::Fault;
use crate::program::Program;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("stage {stage} faulted: {source}")]
    Stage {
        stage: usize,
        #[source]
        source: Fault,
    },

    /// A stage stopped without producing the signal the next stage needs.
    #[error("stage {stage} produced no output")]
    NoOutput { stage: usize },

    #[error("pipeline has no stages")]
    Empty,
}

/// A chain of computers running the same program, each configured with its
/// own phase setting, where every stage's output is the next stage's input.
///
/// Each stage receives its phase as its first input the first time it runs
/// after a reset. The chain is driven from one thread, one stage at a time.
pub struct Pipeline {
    stages: Vec<Computer>,
    phases: Vec<i64>,
}

impl Pipeline {
    pub fn new(program: &Program, phases: &[i64]) -> Self {
        let stages = phases
            .iter()
            .map(|_| Computer::with_config(program.clone(), ComputerConfig::blocking()))
            .collect();
        Self {
            stages,
            phases: phases.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stages(&self) -> &[Computer] {
        &self.stages
    }

    fn reload(&mut self) -> Result<(), PipelineError> {
        if self.stages.is_empty() {
            return Err(PipelineError::Empty);
        }
        for (stage, &phase) in self.stages.iter_mut().zip(&self.phases) {
            stage.reset();
            stage.push_input(phase);
        }
        Ok(())
    }

    /// Pass `signal` once through every stage in order and return the last
    /// stage's first output.
    pub fn run_once(&mut self, signal: i64) -> Result<i64, PipelineError> {
        self.reload()?;
        let mut signal = signal;
        for (i, stage) in self.stages.iter_mut().enumerate() {
            signal = stage
                .run([signal])
                .map_err(|source| PipelineError::Stage { stage: i, source })?
                .ok_or(PipelineError::NoOutput { stage: i })?;
            debug!("stage {i} -> {signal}");
        }
        Ok(signal)
    }

    /// Connect the last stage back to the first and keep the signal
    /// circulating until the last stage halts. Returns the last signal the
    /// final stage produced.
    ///
    /// Only freshly produced values travel along the loop; a stage that
    /// produced nothing this turn hands nothing to its successor.
    pub fn run_feedback(&mut self, signal: i64) -> Result<i64, PipelineError> {
        self.reload()?;
        let last = self.stages.len() - 1;
        let mut carry = Some(signal);
        let mut final_signal = None;
        loop {
            let mut progressed = false;
            for (i, stage) in self.stages.iter_mut().enumerate() {
                if stage.is_halted() {
                    continue;
                }
                let output = stage
                    .run(carry.take())
                    .map_err(|source| PipelineError::Stage { stage: i, source })?;
                if let Some(value) = output {
                    debug!("stage {i} -> {value}");
                    carry = Some(value);
                    progressed = true;
                    if i == last {
                        final_signal = Some(value);
                    }
                }
                if i == last && stage.is_halted() {
                    return final_signal.ok_or(PipelineError::NoOutput { stage: last });
                }
            }
            if !progressed {
                // Every live stage is waiting on input nobody will send.
                let stage = self.stages.iter().position(|s| !s.is_halted()).unwrap_or(last);
                return Err(PipelineError::NoOutput { stage });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(text: &str) -> Program {
        text.parse().unwrap()
    }

    const CHAIN_A: &str = "3,15,3,16,1002,16,10,16,1,16,15,15,4,15,99,0,0";
    const CHAIN_B: &str = "3,23,3,24,1002,24,10,24,1002,23,-1,23,\
        101,5,23,23,1,24,23,23,4,23,99,0,0";
    const LOOP_A: &str = "3,26,1001,26,-4,26,3,27,1002,27,2,27,1,27,26,27,4,27,\
        1001,28,-1,28,1005,28,6,99,0,0,5";
    const LOOP_B: &str = "3,52,1001,52,-5,52,3,53,1,52,56,54,1007,54,5,55,1005,55,26,1001,54,\
        -5,54,1105,1,12,1,53,54,53,1008,54,0,55,1001,55,1,55,2,53,55,53,4,\
        53,1001,56,-1,56,1005,56,6,99,0,0,0,0,10";

    #[test]
    fn test_run_once() {
        let mut pipeline = Pipeline::new(&program(CHAIN_A), &[4, 3, 2, 1, 0]);
        assert_eq!(pipeline.run_once(0), Ok(43210));

        let mut pipeline = Pipeline::new(&program(CHAIN_B), &[0, 1, 2, 3, 4]);
        assert_eq!(pipeline.run_once(0), Ok(54321));
    }

    #[test]
    fn test_run_once_is_deterministic_across_runs() {
        let mut pipeline = Pipeline::new(&program(CHAIN_B), &[0, 1, 2, 3, 4]);
        let first = pipeline.run_once(0).unwrap();
        for _ in 0..3 {
            assert_eq!(pipeline.run_once(0), Ok(first));
        }
    }

    #[test]
    fn test_run_feedback() {
        let mut pipeline = Pipeline::new(&program(LOOP_A), &[9, 8, 7, 6, 5]);
        assert_eq!(pipeline.run_feedback(0), Ok(139629729));

        let mut pipeline = Pipeline::new(&program(LOOP_B), &[9, 7, 8, 5, 6]);
        assert_eq!(pipeline.run_feedback(0), Ok(18216));
        assert!(pipeline.stages().iter().all(Computer::is_halted));
    }

    #[test]
    fn test_stage_without_output() {
        let mut pipeline = Pipeline::new(&program("3,0,3,0,99"), &[1, 2]);
        assert_eq!(pipeline.run_once(0), Err(PipelineError::NoOutput { stage: 0 }));
    }

    #[test]
    fn test_stage_fault_is_wrapped() {
        let mut pipeline = Pipeline::new(&program("3,0,3,0,4,0,42"), &[1, 2]);
        assert_eq!(pipeline.run_once(0), Ok(0));
        let err = pipeline.run_feedback(0).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Stage { stage: 0, source: Fault::Decode { ip: 6, .. } }
        ));
    }

    #[test]
    fn test_empty_pipeline() {
        let mut pipeline = Pipeline::new(&program("99"), &[]);
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.run_once(0), Err(PipelineError::Empty));
        assert_eq!(pipeline.run_feedback(0), Err(PipelineError::Empty));
    }
}
