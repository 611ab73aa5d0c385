use std::collections::VecDeque;

use log::{debug, trace};

use crate::decode::{self, Instruction, Mode, Opcode, Role, MAX_PARAMS};
use crate::error::Fault;
use crate::memory::{self, Memory};
use crate::program::Program;

/// Construction-time policy for a [`Computer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputerConfig {
    /// Yield instead of faulting when input is requested on an empty queue.
    pub blocking_input: bool,
    /// Accept opcode 9 and relative-mode parameters.
    pub relative_base: bool,
    /// Maximum instructions a single `run` call may execute.
    pub step_limit: Option<usize>,
    /// Highest address the tape may grow to. `None` means
    /// [`memory::MAX_ADDRESS`].
    pub memory_limit: Option<usize>,
}

impl Default for ComputerConfig {
    fn default() -> Self {
        Self {
            blocking_input: false,
            relative_base: true,
            step_limit: None,
            memory_limit: None,
        }
    }
}

impl ComputerConfig {
    /// The configuration cooperative drivers use: blocking input, relative
    /// base enabled, no limits.
    pub fn blocking() -> Self {
        Self {
            blocking_input: true,
            ..Self::default()
        }
    }
}

/// Execution state observed by a driver between calls.
///
/// A faulted instance is `Halted` and keeps returning its fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Executing; only visible from inside `run`.
    Ready,
    /// Yielded after an output, on input starvation, or freshly loaded.
    Paused,
    /// Terminal.
    Halted,
}

/// An Intcode computer.
///
/// State:
/// - a growable tape shared by code and data ([`Memory`])
/// - the instruction pointer and relative base registers
/// - a FIFO input queue and a one-value output latch
///
/// Execution is cooperative: [`Computer::run`] executes until the program
/// produces an output, halts, or (with blocking input) asks for input that
/// has not been supplied. Nothing is cached between instructions, so a
/// program that rewrites its own code sees the new words at the next decode.
#[derive(Debug, Clone)]
pub struct Computer {
    memory: Memory,
    ip: usize,
    relative_base: i64,
    inputs: VecDeque<i64>,
    output: Option<i64>,
    state: State,
    needs_input: bool,
    fault: Option<Fault>,
    steps: usize,
    config: ComputerConfig,
}

impl Computer {
    pub fn new(program: impl Into<Program>) -> Self {
        Self::with_config(program, ComputerConfig::default())
    }

    pub fn with_config(program: impl Into<Program>, config: ComputerConfig) -> Self {
        let limit = config.memory_limit.unwrap_or(memory::MAX_ADDRESS);
        Self {
            memory: Memory::with_limit(program.into(), limit),
            ip: 0,
            relative_base: 0,
            inputs: VecDeque::new(),
            output: None,
            state: State::Paused,
            needs_input: false,
            fault: None,
            steps: 0,
            config,
        }
    }

    /// Reload the tape from the program and clear every register, queue and
    /// flag. The instance is left paused, ready for its first `run`.
    pub fn reset(&mut self) {
        self.memory.reset();
        self.ip = 0;
        self.relative_base = 0;
        self.inputs.clear();
        self.output = None;
        self.state = State::Paused;
        self.needs_input = false;
        self.fault = None;
        self.steps = 0;
    }

    /// Queue `inputs`, then execute until the next pause or halt.
    ///
    /// Returns the value output during this call, or `None` if the program
    /// halted or starved for input without producing one. Running a halted
    /// instance is a [`Fault::Halted`]; running a faulted one returns the
    /// original fault again.
    pub fn run(&mut self, inputs: impl IntoIterator<Item = i64>) -> Result<Option<i64>, Fault> {
        self.check_live()?;
        self.inputs.extend(inputs);
        self.state = State::Ready;
        self.needs_input = false;
        self.output = None;

        let mut executed = 0usize;
        while self.state == State::Ready {
            if let Some(limit) = self.config.step_limit {
                if executed >= limit {
                    return Err(self.fail(Fault::StepLimitExceeded { limit }));
                }
            }
            self.step()?;
            executed += 1;
        }
        Ok(self.output)
    }

    /// Run until the program halts or starves for input, collecting every
    /// value it outputs along the way.
    pub fn drain(&mut self, inputs: impl IntoIterator<Item = i64>) -> Result<Vec<i64>, Fault> {
        let mut outputs = Vec::new();
        let mut pending: Vec<i64> = inputs.into_iter().collect();
        loop {
            let output = self.run(pending.drain(..))?;
            outputs.extend(output);
            if self.is_halted() || self.needs_input {
                return Ok(outputs);
            }
        }
    }

    /// Execute a single instruction. A fault leaves the instruction pointer
    /// on the faulting instruction and the instance halted.
    pub fn step(&mut self) -> Result<(), Fault> {
        self.check_live()?;
        let ip = self.ip;
        self.step_at(ip).map_err(|fault| {
            self.ip = ip;
            self.fail(fault)
        })
    }

    fn check_live(&self) -> Result<(), Fault> {
        match (&self.fault, self.state) {
            (Some(fault), _) => Err(fault.clone()),
            (None, State::Halted) => Err(Fault::Halted),
            _ => Ok(()),
        }
    }

    fn fail(&mut self, fault: Fault) -> Fault {
        debug!("ip {}: {fault}", self.ip);
        self.state = State::Halted;
        self.needs_input = false;
        self.fault = Some(fault.clone());
        fault
    }

    fn step_at(&mut self, ip: usize) -> Result<(), Fault> {
        let word = self.load(ip, ip)?;
        let inst = decode::decode(word, self.config.relative_base)
            .map_err(|source| Fault::Decode { ip, source })?;

        if inst.opcode == Opcode::Input && self.inputs.is_empty() {
            if self.config.blocking_input {
                debug!("ip {ip}: waiting for input");
                self.needs_input = true;
                self.state = State::Paused;
                return Ok(());
            }
            return Err(Fault::InputExhausted { ip });
        }

        trace!(
            "ip {ip}: {} {:?} rb={}",
            inst.opcode.mnemonic(),
            &inst.modes[..inst.opcode.arity()],
            self.relative_base
        );

        self.ip += inst.opcode.width();
        self.steps += 1;
        let params = self.resolve(ip, &inst)?;
        self.execute(ip, inst.opcode, &params)
    }

    /// Resolve every parameter: read roles to their operand value, write
    /// roles to their signed destination, checked when the write commits.
    fn resolve(&mut self, ip: usize, inst: &Instruction) -> Result<[i64; MAX_PARAMS], Fault> {
        let mut params = [0i64; MAX_PARAMS];
        for (i, (role, mode)) in inst.params().enumerate() {
            let raw = self.load(ip + 1 + i, ip)?;
            params[i] = match (role, mode) {
                (Role::Read, Mode::Immediate) => raw,
                (Role::Read, Mode::Position) => self.load(Memory::address(raw, ip)?, ip)?,
                (Role::Read, Mode::Relative) => {
                    let addr = Memory::address(self.relative(raw, ip)?, ip)?;
                    self.load(addr, ip)?
                }
                (Role::Write, Mode::Position) => raw,
                (Role::Write, Mode::Relative) => self.relative(raw, ip)?,
                (Role::Write, Mode::Immediate) => unreachable!("rejected by decode"),
            };
        }
        Ok(params)
    }

    fn execute(&mut self, ip: usize, opcode: Opcode, p: &[i64; MAX_PARAMS]) -> Result<(), Fault> {
        let overflow = || Fault::Overflow { ip };
        match opcode {
            Opcode::Add => self.write(p[2], p[0].checked_add(p[1]).ok_or_else(overflow)?, ip)?,
            Opcode::Mul => self.write(p[2], p[0].checked_mul(p[1]).ok_or_else(overflow)?, ip)?,
            Opcode::LessThan => self.write(p[2], (p[0] < p[1]) as i64, ip)?,
            Opcode::Equals => self.write(p[2], (p[0] == p[1]) as i64, ip)?,
            Opcode::Input => {
                let value = self.inputs.pop_front().ok_or(Fault::InputExhausted { ip })?;
                self.write(p[0], value, ip)?;
                self.needs_input = false;
            }
            Opcode::Output => {
                debug!("ip {ip}: output {}", p[0]);
                self.output = Some(p[0]);
                self.state = State::Paused;
            }
            Opcode::JumpIfTrue => {
                if p[0] != 0 {
                    self.jump(p[1], ip)?;
                }
            }
            Opcode::JumpIfFalse => {
                if p[0] == 0 {
                    self.jump(p[1], ip)?;
                }
            }
            Opcode::AdjustRelativeBase => {
                self.relative_base = self.relative_base.checked_add(p[0]).ok_or_else(overflow)?;
            }
            Opcode::Halt => {
                debug!("ip {ip}: halt after {} steps", self.steps);
                self.state = State::Halted;
            }
        }
        Ok(())
    }

    /// Read a cell on behalf of the instruction at `ip`.
    #[inline]
    fn load(&mut self, addr: usize, ip: usize) -> Result<i64, Fault> {
        self.memory.get(addr).ok_or(Fault::MemoryLimit { ip, address: addr as i64 })
    }

    #[inline]
    fn write(&mut self, raw: i64, value: i64, ip: usize) -> Result<(), Fault> {
        let addr = Memory::address(raw, ip)?;
        self.memory.set(addr, value).ok_or(Fault::MemoryLimit { ip, address: raw })
    }

    fn jump(&mut self, target: i64, ip: usize) -> Result<(), Fault> {
        self.ip = Memory::address(target, ip)?;
        Ok(())
    }

    fn relative(&self, raw: i64, ip: usize) -> Result<i64, Fault> {
        self.relative_base.checked_add(raw).ok_or(Fault::Overflow { ip })
    }

    pub fn push_input(&mut self, value: i64) {
        self.inputs.push_back(value);
    }

    pub fn pending_input(&self) -> usize {
        self.inputs.len()
    }

    /// Read an absolute address, growing the tape if needed.
    pub fn peek(&mut self, addr: usize) -> Result<i64, Fault> {
        self.load(addr, self.ip)
    }

    /// Overwrite an absolute address, growing the tape if needed.
    pub fn poke(&mut self, addr: usize, value: i64) -> Result<(), Fault> {
        let ip = self.ip;
        self.memory
            .set(addr, value)
            .ok_or(Fault::MemoryLimit { ip, address: addr as i64 })
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state == State::Halted
    }

    /// The fault that stopped this instance, if any.
    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.state == State::Paused
    }

    /// True if the last `run` yielded because it needs input.
    pub fn needs_input(&self) -> bool {
        self.needs_input
    }

    /// The value output during the most recent `run` call, if any.
    pub fn output(&self) -> Option<i64> {
        self.output
    }

    pub fn instruction_pointer(&self) -> usize {
        self.ip
    }

    pub fn relative_base(&self) -> i64 {
        self.relative_base
    }

    pub fn memory(&self) -> &[i64] {
        self.memory.as_slice()
    }

    pub fn program(&self) -> &Program {
        self.memory.program()
    }

    /// Instructions executed since load or the last reset.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn config(&self) -> &ComputerConfig {
        &self.config
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn bounded() -> ComputerConfig {
        ComputerConfig {
            blocking_input: true,
            relative_base: true,
            step_limit: Some(2048),
            memory_limit: Some(1 << 16),
        }
    }

    proptest! {
        #[test]
        fn random_programs_never_panic(image in prop::collection::vec(-10i64..30_000, 1..128)) {
            let mut computer = Computer::with_config(Program::from(image), bounded());
            for _ in 0..64 {
                match computer.run([1]) {
                    Ok(_) if computer.is_halted() || computer.needs_input() => break,
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        }

        #[test]
        fn memory_never_shrinks(image in prop::collection::vec(-10i64..30_000, 1..128)) {
            let len = image.len();
            let mut computer = Computer::with_config(Program::from(image), bounded());
            let mut last = len;
            for _ in 0..16 {
                if computer.step().is_err() || computer.is_halted() {
                    break;
                }
                prop_assert!(computer.memory().len() >= last);
                last = computer.memory().len();
            }
        }

        #[test]
        fn add_in_position_mode(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
            let mut computer = Computer::new(Program::from(vec![1, 5, 6, 7, 99, a, b, 0]));
            computer.step().unwrap();
            prop_assert_eq!(computer.memory(), &[1, 5, 6, 7, 99, a, b, a + b][..]);
        }
    }
}
