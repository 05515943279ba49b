//! Register file shared by every instruction of a running program.

use indexmap::IndexMap;
use isavm_spec_compiler::MachineRegister;
use serde::{Deserialize, Serialize};

/// Named `i64` registers in first-write order.
///
/// Reading a register that was never written yields 0. The machine registers
/// `PC`, `RA`, `FP` and `SP` are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    values: IndexMap<String, i64>,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        let values = MachineRegister::ALL
            .iter()
            .map(|register| (register.name().to_owned(), 0))
            .collect();
        Self { values }
    }

    /// Seeded file with `overrides` applied in order.
    pub fn with_values<I, K>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, i64)>,
        K: Into<String>,
    {
        let mut file = Self::new();
        for (name, value) in overrides {
            file.values.insert(name.into(), value);
        }
        file
    }

    pub fn get(&self, name: &str) -> i64 {
        self.values.get(name).copied().unwrap_or(0)
    }

    pub fn set(&mut self, name: &str, value: i64) {
        match self.values.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.values.insert(name.to_owned(), value);
            }
        }
    }

    pub fn machine(&self, register: MachineRegister) -> i64 {
        self.get(register.name())
    }

    pub fn set_machine(&mut self, register: MachineRegister, value: i64) {
        self.set(register.name(), value);
    }

    pub fn pc(&self) -> i64 {
        self.machine(MachineRegister::Pc)
    }

    pub fn set_pc(&mut self, value: i64) {
        self.set_machine(MachineRegister::Pc, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn snapshot(&self) -> IndexMap<String, i64> {
        self.values.clone()
    }
}
