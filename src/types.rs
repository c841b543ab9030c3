//! Operand data types and their generation-dependent hardware encodings.
//!
//! Four independent table axes: generation era, register-vs-immediate
//! operand class, and for three-source instructions a separate pair of
//! axes (align16 shared-type encoding vs align1 per-operand encoding,
//! the latter again split by the execution-type selector). Forward
//! lookups on unmapped combinations return `None` so the builder can
//! fail loudly and the validator can classify quietly; nothing ever
//! defaults silently.

use std::fmt;

use crate::devinfo::DeviceInfo;
use crate::regs::RegFile;

/// Abstract operand data type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RegType {
    /// Unsigned/signed doubleword.
    Ud,
    D,
    /// Unsigned/signed word.
    Uw,
    W,
    /// Unsigned/signed byte.
    Ub,
    B,
    /// Unsigned/signed quadword.
    Uq,
    Q,
    /// Half, single, double float.
    Hf,
    F,
    Df,
    /// Native accumulator format (math macro operands).
    Nf,
    /// Immediate-only packed vectors: restricted float, signed word,
    /// unsigned word.
    Vf,
    V,
    Uv,
}

pub const ALL_TYPES: &[RegType] = &[
    RegType::Ud,
    RegType::D,
    RegType::Uw,
    RegType::W,
    RegType::Ub,
    RegType::B,
    RegType::Uq,
    RegType::Q,
    RegType::Hf,
    RegType::F,
    RegType::Df,
    RegType::Nf,
    RegType::Vf,
    RegType::V,
    RegType::Uv,
];

impl RegType {
    /// Size of one element in bytes.
    pub fn size_bytes(self) -> u32 {
        match self {
            RegType::Ub | RegType::B => 1,
            RegType::Uw | RegType::W | RegType::Hf | RegType::V | RegType::Uv => 2,
            RegType::Ud | RegType::D | RegType::F | RegType::Vf => 4,
            RegType::Uq | RegType::Q | RegType::Df | RegType::Nf => 8,
        }
    }

    pub fn is_floating_point(self) -> bool {
        matches!(
            self,
            RegType::Hf | RegType::F | RegType::Df | RegType::Nf | RegType::Vf
        )
    }

    pub fn is_integer(self) -> bool {
        !self.is_floating_point()
    }

    /// Folds away signedness; used by raw-move detection.
    pub fn to_signed(self) -> RegType {
        match self {
            RegType::Ud => RegType::D,
            RegType::Uw => RegType::W,
            RegType::Ub => RegType::B,
            RegType::Uq => RegType::Q,
            t => t,
        }
    }
}

impl fmt::Display for RegType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegType::Ud => "UD",
            RegType::D => "D",
            RegType::Uw => "UW",
            RegType::W => "W",
            RegType::Ub => "UB",
            RegType::B => "B",
            RegType::Uq => "UQ",
            RegType::Q => "Q",
            RegType::Hf => "HF",
            RegType::F => "F",
            RegType::Df => "DF",
            RegType::Nf => "NF",
            RegType::Vf => "VF",
            RegType::V => "V",
            RegType::Uv => "UV",
        };
        f.write_str(s)
    }
}

type Entry = (RegType, u32);

// Register-file (GRF/MRF/ARF) hardware type encodings.
const REG_TYPES_GFX4: &[Entry] = &[
    (RegType::Ud, 0),
    (RegType::D, 1),
    (RegType::Uw, 2),
    (RegType::W, 3),
    (RegType::Ub, 4),
    (RegType::B, 5),
    (RegType::F, 7),
];

const REG_TYPES_GFX7: &[Entry] = &[
    (RegType::Ud, 0),
    (RegType::D, 1),
    (RegType::Uw, 2),
    (RegType::W, 3),
    (RegType::Ub, 4),
    (RegType::B, 5),
    (RegType::Df, 6),
    (RegType::F, 7),
];

const REG_TYPES_GFX8: &[Entry] = &[
    (RegType::Ud, 0),
    (RegType::D, 1),
    (RegType::Uw, 2),
    (RegType::W, 3),
    (RegType::Ub, 4),
    (RegType::B, 5),
    (RegType::Df, 6),
    (RegType::F, 7),
    (RegType::Uq, 8),
    (RegType::Q, 9),
    (RegType::Hf, 10),
];

const REG_TYPES_GFX11: &[Entry] = &[
    (RegType::Ud, 0),
    (RegType::D, 1),
    (RegType::Uw, 2),
    (RegType::W, 3),
    (RegType::Ub, 4),
    (RegType::B, 5),
    (RegType::F, 7),
    (RegType::Hf, 10),
    (RegType::Nf, 11),
];

const REG_TYPES_GFX12: &[Entry] = &[
    (RegType::Ud, 0),
    (RegType::D, 1),
    (RegType::Uw, 2),
    (RegType::W, 3),
    (RegType::Ub, 4),
    (RegType::B, 5),
    (RegType::F, 7),
    (RegType::Hf, 10),
];

const REG_TYPES_GFX125: &[Entry] = &[
    (RegType::Ud, 0),
    (RegType::D, 1),
    (RegType::Uw, 2),
    (RegType::W, 3),
    (RegType::Ub, 4),
    (RegType::B, 5),
    (RegType::Df, 6),
    (RegType::F, 7),
    (RegType::Uq, 8),
    (RegType::Q, 9),
    (RegType::Hf, 10),
];

// Immediate-operand encodings; a strictly smaller and partially
// different set (the packed vector types exist only here).
const IMM_TYPES_GFX4: &[Entry] = &[
    (RegType::Ud, 0),
    (RegType::D, 1),
    (RegType::Uw, 2),
    (RegType::W, 3),
    (RegType::Vf, 5),
    (RegType::V, 6),
    (RegType::F, 7),
];

const IMM_TYPES_GFX6: &[Entry] = &[
    (RegType::Ud, 0),
    (RegType::D, 1),
    (RegType::Uw, 2),
    (RegType::W, 3),
    (RegType::Uv, 4),
    (RegType::Vf, 5),
    (RegType::V, 6),
    (RegType::F, 7),
];

const IMM_TYPES_GFX8: &[Entry] = &[
    (RegType::Ud, 0),
    (RegType::D, 1),
    (RegType::Uw, 2),
    (RegType::W, 3),
    (RegType::Uv, 4),
    (RegType::Vf, 5),
    (RegType::V, 6),
    (RegType::F, 7),
    (RegType::Uq, 8),
    (RegType::Q, 9),
    (RegType::Df, 10),
    (RegType::Hf, 11),
];

const IMM_TYPES_GFX12: &[Entry] = &[
    (RegType::Ud, 0),
    (RegType::D, 1),
    (RegType::Uw, 2),
    (RegType::W, 3),
    (RegType::Uv, 4),
    (RegType::Vf, 5),
    (RegType::V, 6),
    (RegType::F, 7),
    (RegType::Hf, 11),
];

const IMM_TYPES_GFX125: &[Entry] = &[
    (RegType::Ud, 0),
    (RegType::D, 1),
    (RegType::Uw, 2),
    (RegType::W, 3),
    (RegType::Uv, 4),
    (RegType::Vf, 5),
    (RegType::V, 6),
    (RegType::F, 7),
    (RegType::Uq, 8),
    (RegType::Q, 9),
    (RegType::Df, 10),
    (RegType::Hf, 11),
];

fn table_for(devinfo: &DeviceInfo, file: RegFile) -> &'static [Entry] {
    match (file, devinfo.verx10) {
        (RegFile::Imm, 40..=50) => IMM_TYPES_GFX4,
        (RegFile::Imm, 60..=75) => IMM_TYPES_GFX6,
        (RegFile::Imm, 80..=110) => IMM_TYPES_GFX8,
        (RegFile::Imm, 120) => IMM_TYPES_GFX12,
        (RegFile::Imm, _) => IMM_TYPES_GFX125,
        (_, 40..=60) => REG_TYPES_GFX4,
        (_, 70..=75) => REG_TYPES_GFX7,
        (_, 80..=100) => REG_TYPES_GFX8,
        (_, 110) => REG_TYPES_GFX11,
        (_, 120) => REG_TYPES_GFX12,
        (_, _) => REG_TYPES_GFX125,
    }
}

/// Hardware encoding of `t` as a `file` operand, or `None` if the
/// combination is not encodable on this generation (e.g. a DF immediate
/// on hardware without 64-bit float immediates).
pub fn reg_type_to_hw(devinfo: &DeviceInfo, file: RegFile, t: RegType) -> Option<u32> {
    table_for(devinfo, file)
        .iter()
        .find(|&&(ty, _)| ty == t)
        .map(|&(_, hw)| hw)
}

/// Reverse of [`reg_type_to_hw`]. The mapping is not guaranteed
/// bijective by construction, so this is a linear scan; unassigned
/// encodings decode to `None`.
pub fn hw_type_to_reg_type(devinfo: &DeviceInfo, file: RegFile, hw: u32) -> Option<RegType> {
    table_for(devinfo, file)
        .iter()
        .find(|&&(_, h)| h == hw)
        .map(|&(ty, _)| ty)
}

// Three-source align16 encodings: one shared source/destination type
// field, three bits, tiny per-era type sets.
const A16_3SRC_TYPES_GFX6: &[Entry] = &[(RegType::F, 0)];

const A16_3SRC_TYPES_GFX7: &[Entry] = &[
    (RegType::F, 0),
    (RegType::D, 1),
    (RegType::Ud, 2),
    (RegType::Df, 3),
];

const A16_3SRC_TYPES_GFX8: &[Entry] = &[
    (RegType::F, 0),
    (RegType::D, 1),
    (RegType::Ud, 2),
    (RegType::Df, 3),
    (RegType::Hf, 4),
];

/// Align16 three-source type encoding.
pub fn a16_3src_type_to_hw(devinfo: &DeviceInfo, t: RegType) -> Option<u32> {
    a16_3src_table(devinfo)?
        .iter()
        .find(|&&(ty, _)| ty == t)
        .map(|&(_, hw)| hw)
}

pub fn hw_to_a16_3src_type(devinfo: &DeviceInfo, hw: u32) -> Option<RegType> {
    a16_3src_table(devinfo)?
        .iter()
        .find(|&&(_, h)| h == hw)
        .map(|&(ty, _)| ty)
}

fn a16_3src_table(devinfo: &DeviceInfo) -> Option<&'static [Entry]> {
    match devinfo.verx10 {
        60 => Some(A16_3SRC_TYPES_GFX6),
        70..=75 => Some(A16_3SRC_TYPES_GFX7),
        80..=110 => Some(A16_3SRC_TYPES_GFX8),
        // Align16 itself is gone.
        _ => None,
    }
}

/// The two execution-type classes of align1 three-source instructions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExecType {
    Int,
    Float,
}

impl ExecType {
    pub fn to_hw(self) -> u32 {
        match self {
            ExecType::Int => 0,
            ExecType::Float => 1,
        }
    }

    pub fn from_hw(hw: u32) -> Option<ExecType> {
        match hw {
            0 => Some(ExecType::Int),
            1 => Some(ExecType::Float),
            _ => None,
        }
    }
}

const A1_3SRC_FLOAT_GFX10: &[Entry] = &[(RegType::F, 0), (RegType::Hf, 1)];
const A1_3SRC_FLOAT_GFX125: &[Entry] = &[(RegType::F, 0), (RegType::Hf, 1), (RegType::Df, 2)];

// Byte operands become legal as three-source operands on Gen11.
const A1_3SRC_INT_GFX10: &[Entry] = &[
    (RegType::Ud, 0),
    (RegType::D, 1),
    (RegType::Uw, 2),
    (RegType::W, 3),
];

const A1_3SRC_INT_GFX11: &[Entry] = &[
    (RegType::Ud, 0),
    (RegType::D, 1),
    (RegType::Uw, 2),
    (RegType::W, 3),
    (RegType::Ub, 4),
    (RegType::B, 5),
];

fn a1_3src_table(devinfo: &DeviceInfo, exec_type: ExecType) -> Option<&'static [Entry]> {
    match (exec_type, devinfo.verx10) {
        (_, 0..=90) => None,
        (ExecType::Float, 100..=120) => Some(A1_3SRC_FLOAT_GFX10),
        (ExecType::Float, _) => Some(A1_3SRC_FLOAT_GFX125),
        (ExecType::Int, 100) => Some(A1_3SRC_INT_GFX10),
        (ExecType::Int, _) => Some(A1_3SRC_INT_GFX11),
    }
}

/// Align1 three-source type encoding, selected by the instruction's
/// execution-type field.
pub fn a1_3src_type_to_hw(devinfo: &DeviceInfo, exec_type: ExecType, t: RegType) -> Option<u32> {
    a1_3src_table(devinfo, exec_type)?
        .iter()
        .find(|&&(ty, _)| ty == t)
        .map(|&(_, hw)| hw)
}

pub fn hw_to_a1_3src_type(devinfo: &DeviceInfo, exec_type: ExecType, hw: u32) -> Option<RegType> {
    a1_3src_table(devinfo, exec_type)?
        .iter()
        .find(|&&(_, h)| h == hw)
        .map(|&(ty, _)| ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devinfo::Platform;

    fn dev(verx10: u32) -> DeviceInfo {
        DeviceInfo::new(verx10, Platform::Main)
    }

    #[test]
    fn round_trip_all_defined_mappings() {
        for &v in crate::devinfo::SUPPORTED_VERX10 {
            let devinfo = dev(v);
            for &file in &[RegFile::Grf, RegFile::Imm] {
                for &t in ALL_TYPES {
                    if let Some(hw) = reg_type_to_hw(&devinfo, file, t) {
                        assert_eq!(
                            hw_type_to_reg_type(&devinfo, file, hw),
                            Some(t),
                            "verx10={v} file={file:?} type={t}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn immediate_set_is_smaller() {
        let devinfo = dev(90);
        // Packed vectors are immediate-only.
        assert!(reg_type_to_hw(&devinfo, RegFile::Imm, RegType::Vf).is_some());
        assert!(reg_type_to_hw(&devinfo, RegFile::Grf, RegType::Vf).is_none());
        // Bytes are register-only.
        assert!(reg_type_to_hw(&devinfo, RegFile::Grf, RegType::B).is_some());
        assert!(reg_type_to_hw(&devinfo, RegFile::Imm, RegType::B).is_none());
    }

    #[test]
    fn df_immediate_requires_64bit_support() {
        assert!(reg_type_to_hw(&dev(120), RegFile::Imm, RegType::Df).is_none());
        assert!(reg_type_to_hw(&dev(90), RegFile::Imm, RegType::Df).is_some());
        assert!(reg_type_to_hw(&dev(70), RegFile::Imm, RegType::Df).is_none());
    }

    #[test]
    fn a1_3src_byte_gating() {
        assert!(a1_3src_type_to_hw(&dev(110), ExecType::Int, RegType::B).is_some());
        assert!(a1_3src_type_to_hw(&dev(90), ExecType::Int, RegType::B).is_none());
        assert!(a1_3src_type_to_hw(&dev(120), ExecType::Float, RegType::Df).is_none());
        assert!(a1_3src_type_to_hw(&dev(125), ExecType::Float, RegType::Df).is_some());
    }

    #[test]
    fn unassigned_hw_codes_decode_to_none() {
        let devinfo = dev(40);
        assert_eq!(hw_type_to_reg_type(&devinfo, RegFile::Grf, 6), None);
        assert_eq!(hw_type_to_reg_type(&devinfo, RegFile::Grf, 15), None);
    }
}
