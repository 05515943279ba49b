//! Execution trace collection.
//!
//! Two views of a run are available. [`TraceSnapshot`] is a point-in-time
//! picture of the machine (registers, the instruction about to execute, and the
//! active and caller stack frames) handed to observers while the program runs.
//! [`ExecutionTrace`] is the summary returned once the program halts: coverage
//! and aggregate metrics sourced from the sandbox and memory subsystems, plus
//! the order of executed addresses when step recording is switched on. The
//! collector's footprint is otherwise bounded by the program size.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use isavm_spec_compiler::MachineRegister;
use serde::{Deserialize, Serialize};

use crate::memory::{Memory, MemoryMetrics};
use crate::program::Program;
use crate::registers::RegisterFile;
use crate::sandbox::SandboxMetrics;

/// Most cells shown for either stack frame in a snapshot.
pub const FRAME_WINDOW: usize = 20;

/// Machine state between two steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSnapshot {
    /// Instructions executed so far.
    pub step: u64,
    pub pc: i64,
    /// Disassembly of the instruction at `pc`, if `pc` is inside the program.
    pub instruction: Option<String>,
    pub registers: IndexMap<String, i64>,
    /// `memory[FP..SP]`.
    pub frame: Vec<i64>,
    /// `memory[memory[FP + 1]..FP]`, present when `FP` is non-zero.
    pub caller: Option<Vec<i64>>,
}

impl TraceSnapshot {
    pub fn capture(step: u64, program: &Program, registers: &RegisterFile, memory: &Memory) -> Self {
        let pc = registers.pc();
        let instruction = usize::try_from(pc)
            .ok()
            .and_then(|address| program.get(address))
            .map(|instruction| instruction.disassemble(false));
        let fp = registers.machine(MachineRegister::Fp);
        let sp = registers.machine(MachineRegister::Sp);
        let frame = memory.window(fp, sp, FRAME_WINDOW).to_vec();
        let caller = (fp != 0).then(|| {
            let start = fp
                .checked_add(1)
                .and_then(|slot| memory.peek(slot))
                .unwrap_or(0);
            memory.window(start, fp, FRAME_WINDOW).to_vec()
        });
        Self {
            step,
            pc,
            instruction,
            registers: registers.snapshot(),
            frame,
            caller,
        }
    }
}

impl fmt::Display for TraceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registers: Vec<String> = self
            .registers
            .iter()
            .map(|(name, value)| format!("'{name}': {value}"))
            .collect();
        writeln!(f, "      regs  =")?;
        writeln!(f, "              {{{}}}", registers.join(", "))?;
        writeln!(f, "      frame = {:?}", self.frame)?;
        writeln!(
            f,
            "      caller= {:?}",
            self.caller.as_deref().unwrap_or_default()
        )?;
        match &self.instruction {
            Some(instruction) => write!(f, "[{:4}] {instruction}", self.pc),
            None => write!(f, "[{:4}] <no instruction>", self.pc),
        }
    }
}

/// Summary emitted after execution completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    /// Every executed step in order. Empty unless step recording was enabled.
    pub steps: Vec<TraceStep>,
    /// Distinct addresses executed, ascending.
    pub coverage: Vec<usize>,
    pub metrics: TraceMetrics,
}

/// Individual instruction execution event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    pub address: usize,
    pub opcode: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceMetrics {
    pub instructions: u64,
    /// Long mnemonics of every instruction kind executed, sorted.
    pub instruction_kinds: Vec<String>,
    pub sandbox: SandboxMetrics,
    pub memory: MemoryMetrics,
}

/// Records trace state as the interpreter runs.
#[derive(Debug, Default)]
pub struct TraceCollector {
    record_steps: bool,
    steps: Vec<TraceStep>,
    coverage: BTreeSet<usize>,
    instruction_count: u64,
    instruction_kinds: BTreeSet<String>,
}

impl TraceCollector {
    pub fn new(record_steps: bool) -> Self {
        Self {
            record_steps,
            ..Self::default()
        }
    }

    pub fn record_instruction(&mut self, address: usize, opcode: usize, class_name: &str) {
        self.instruction_count += 1;
        if !self.instruction_kinds.contains(class_name) {
            self.instruction_kinds.insert(class_name.to_owned());
        }
        if self.record_steps {
            self.steps.push(TraceStep { address, opcode });
        }
        self.coverage.insert(address);
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    pub fn finish(self, sandbox: SandboxMetrics, memory: MemoryMetrics) -> ExecutionTrace {
        ExecutionTrace {
            steps: self.steps,
            coverage: self.coverage.into_iter().collect(),
            metrics: TraceMetrics {
                instructions: self.instruction_count,
                instruction_kinds: self.instruction_kinds.into_iter().collect(),
                sandbox,
                memory,
            },
        }
    }
}
