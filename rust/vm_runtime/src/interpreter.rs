//! Step-wise program execution.
//!
//! An [`Execution`] owns the register file and memory of one run over a linked
//! [`Program`]. Each step reads `PC`, charges the sandbox, advances `PC` and
//! only then executes the instruction, so control transfers simply overwrite
//! the already-advanced value. A failure is latched like a halt: later steps
//! report it again without executing anything.

use std::io::Write;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use isavm_spec_compiler::MachineRegister;

use crate::instruction::{Flow, Machine, RuntimeError};
use crate::memory::{Memory, DEFAULT_MEMORY_CELLS};
use crate::program::Program;
use crate::registers::RegisterFile;
use crate::sandbox::{Sandbox, SandboxError, SandboxLimits};
use crate::trace::{ExecutionTrace, TraceCollector, TraceSnapshot};

/// Configuration controlling interpreter resource budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub sandbox_limits: SandboxLimits,
    /// Zero cells placed after the argument block by `launch`.
    pub memory_cells: usize,
    /// Keep every executed address in the returned trace.
    pub record_steps: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            sandbox_limits: SandboxLimits::unlimited(),
            memory_cells: DEFAULT_MEMORY_CELLS,
            record_steps: false,
        }
    }
}

#[derive(Debug)]
pub enum StepOutcome {
    Continuing,
    Halted,
    Failed(VmError),
}

#[derive(Debug, Clone, Error)]
pub enum VmError {
    #[error("program counter {pc} is outside the program (0..{len})")]
    PcOutOfRange { pc: i64, len: usize },
    #[error("instruction at {address} (`{instruction}`) failed: {source}")]
    Instruction {
        address: usize,
        instruction: String,
        #[source]
        source: RuntimeError,
    },
    #[error("sandbox violation: {0}")]
    Sandbox(#[from] SandboxError),
}

pub struct Execution<'p, W: Write> {
    program: &'p Program,
    registers: RegisterFile,
    memory: Memory,
    output: W,
    sandbox: Sandbox,
    trace: TraceCollector,
    expected_sp: Option<i64>,
    halted: bool,
    failure: Option<VmError>,
}

impl<'p, W: Write> Execution<'p, W> {
    pub fn new(program: &'p Program, memory: Memory, registers: RegisterFile, output: W) -> Self {
        Self::with_limits(program, memory, registers, output, SandboxLimits::unlimited())
    }

    pub fn with_limits(
        program: &'p Program,
        memory: Memory,
        registers: RegisterFile,
        output: W,
        limits: SandboxLimits,
    ) -> Self {
        Self {
            program,
            registers,
            memory,
            output,
            sandbox: Sandbox::new(limits),
            trace: TraceCollector::new(false),
            expected_sp: None,
            halted: false,
            failure: None,
        }
    }

    /// Warn at halt unless `SP` is back at `sp`.
    pub fn expect_stack_pointer(mut self, sp: i64) -> Self {
        self.expected_sp = Some(sp);
        self
    }

    /// Keep every executed address in the trace `run` returns.
    pub fn record_steps(mut self, enabled: bool) -> Self {
        self.trace = TraceCollector::new(enabled);
        self
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// The error that stopped execution, if a step failed.
    pub fn failure(&self) -> Option<&VmError> {
        self.failure.as_ref()
    }

    pub fn snapshot(&self) -> TraceSnapshot {
        TraceSnapshot::capture(
            self.trace.instruction_count(),
            self.program,
            &self.registers,
            &self.memory,
        )
    }

    pub fn step(&mut self) -> StepOutcome {
        if let Some(error) = &self.failure {
            return StepOutcome::Failed(error.clone());
        }
        if self.halted {
            return StepOutcome::Halted;
        }
        let outcome = self.execute_next();
        if let StepOutcome::Failed(error) = &outcome {
            self.failure = Some(error.clone());
        }
        outcome
    }

    fn execute_next(&mut self) -> StepOutcome {
        let program = self.program;
        let pc = self.registers.pc();
        let Some((address, instruction)) = usize::try_from(pc)
            .ok()
            .and_then(|address| program.get(address).map(|instruction| (address, instruction)))
        else {
            return StepOutcome::Failed(VmError::PcOutOfRange {
                pc,
                len: program.len(),
            });
        };
        if let Err(violation) = self.sandbox.observe_instruction() {
            return StepOutcome::Failed(violation.into());
        }
        self.registers.set_pc(pc + 1);
        self.trace
            .record_instruction(address, instruction.opcode(), instruction.class_name());
        trace!(address, instruction = %instruction, "step");

        let mut machine = Machine {
            registers: &mut self.registers,
            memory: &mut self.memory,
            labels: program.labels(),
            output: &mut self.output,
        };
        match instruction.execute(&mut machine) {
            Ok(Flow::Continue) => StepOutcome::Continuing,
            Ok(Flow::Halt) => {
                self.halted = true;
                self.check_stack_pointer();
                StepOutcome::Halted
            }
            Err(source) => StepOutcome::Failed(VmError::Instruction {
                address,
                instruction: instruction.disassemble(false),
                source,
            }),
        }
    }

    /// Step until the program halts or fails.
    pub fn run(&mut self) -> Result<ExecutionTrace, VmError> {
        self.drive(None)
    }

    /// Like [`run`](Self::run), handing a snapshot to `observer` before the
    /// first step and after every completed step.
    pub fn run_observed<F>(&mut self, mut observer: F) -> Result<ExecutionTrace, VmError>
    where
        F: FnMut(&TraceSnapshot),
    {
        self.drive(Some(&mut observer))
    }

    fn drive(
        &mut self,
        mut observer: Option<&mut dyn FnMut(&TraceSnapshot)>,
    ) -> Result<ExecutionTrace, VmError> {
        debug!(instructions = self.program.len(), "execution started");
        self.notify(&mut observer);
        loop {
            match self.step() {
                StepOutcome::Continuing => self.notify(&mut observer),
                StepOutcome::Halted => {
                    self.notify(&mut observer);
                    break;
                }
                StepOutcome::Failed(error) => {
                    debug!(%error, "execution failed");
                    return Err(error);
                }
            }
        }
        let trace =
            std::mem::take(&mut self.trace).finish(self.sandbox.metrics(), self.memory.metrics());
        debug!(steps = trace.metrics.instructions, "execution halted");
        Ok(trace)
    }

    fn notify(&self, observer: &mut Option<&mut dyn FnMut(&TraceSnapshot)>) {
        if let Some(observer) = observer {
            (*observer)(&self.snapshot());
        }
    }

    fn check_stack_pointer(&self) {
        let Some(expected) = self.expected_sp else {
            return;
        };
        let sp = self.registers.machine(MachineRegister::Sp);
        if sp != expected {
            warn!(sp, expected, "stack pointer not restored at halt");
        }
    }
}
