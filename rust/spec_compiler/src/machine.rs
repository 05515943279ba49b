//! Machine registers shared by every instruction set.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Register that exists independently of any catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MachineRegister {
    /// Program counter.
    Pc,
    /// Return address written by calls.
    Ra,
    /// Frame pointer.
    Fp,
    /// Stack pointer.
    Sp,
}

impl MachineRegister {
    pub const ALL: [MachineRegister; 4] = [
        MachineRegister::Pc,
        MachineRegister::Ra,
        MachineRegister::Fp,
        MachineRegister::Sp,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            MachineRegister::Pc => "PC",
            MachineRegister::Ra => "RA",
            MachineRegister::Fp => "FP",
            MachineRegister::Sp => "SP",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|register| register.name() == name)
    }
}

impl fmt::Display for MachineRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
