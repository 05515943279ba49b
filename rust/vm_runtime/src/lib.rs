//! Register/memory virtual machine for catalog-defined instruction sets.

pub mod instruction;
pub mod interpreter;
pub mod lexer;
pub mod memory;
pub mod parser;
pub mod program;
pub mod registers;
pub mod sandbox;
pub mod toolchain;
pub mod trace;

pub use instruction::{Flow, Instruction, Machine, OperandValue, RuntimeError};
pub use interpreter::{Execution, ExecutionConfig, StepOutcome, VmError};
pub use memory::{Memory, MemoryError};
pub use program::{LabelTable, LinkError, Program};
pub use registers::RegisterFile;
pub use sandbox::SandboxLimits;
pub use toolchain::{launch, LoadError, Toolchain};
