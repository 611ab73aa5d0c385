use crate::error::Fault;
use crate::program::Program;

/// Highest address a tape may grow to when no tighter limit is configured.
pub const MAX_ADDRESS: usize = (1 << 26) - 1;

/// The mutable tape of a single computer.
///
/// Code and data share this one store, so programs may rewrite their own
/// unexecuted instructions. Any access beyond the current end first extends
/// the tape with zero cells through the requested address, up to `limit`.
/// Accesses past the limit, or growth the allocator refuses, return `None`.
/// The tape never shrinks except on [`Memory::reset`].
#[derive(Debug, Clone)]
pub struct Memory {
    program: Program,
    cells: Vec<i64>,
    limit: usize,
}

impl Memory {
    pub fn new(program: Program) -> Self {
        Self::with_limit(program, MAX_ADDRESS)
    }

    pub fn with_limit(program: Program, limit: usize) -> Self {
        let cells = program.to_vec();
        Self {
            program,
            cells,
            limit,
        }
    }

    /// Convert a signed operand into an address.
    ///
    /// Negative addresses never come from correct programs and are fatal.
    #[inline]
    pub fn address(raw: i64, ip: usize) -> Result<usize, Fault> {
        usize::try_from(raw).map_err(|_| Fault::NegativeAddress { ip, address: raw })
    }

    /// Cells of the load image are always reachable, even past the limit.
    #[inline]
    fn grow_to(&mut self, addr: usize) -> Option<()> {
        if addr < self.cells.len() {
            return Some(());
        }
        if addr > self.limit {
            return None;
        }
        let extra = (addr - self.cells.len()).checked_add(1)?;
        self.cells.try_reserve(extra).ok()?;
        self.cells.resize(addr + 1, 0);
        Some(())
    }

    #[inline]
    pub fn get(&mut self, addr: usize) -> Option<i64> {
        self.grow_to(addr)?;
        self.cells.get(addr).copied()
    }

    #[inline]
    pub fn set(&mut self, addr: usize, value: i64) -> Option<()> {
        self.grow_to(addr)?;
        let cell = self.cells.get_mut(addr)?;
        *cell = value;
        Some(())
    }

    /// Replace the tape with a fresh copy of the load image.
    pub fn reset(&mut self) {
        self.cells.clear();
        self.cells.extend_from_slice(&self.program);
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.cells
    }

    pub fn program(&self) -> &Program {
        &self.program
    }
}
