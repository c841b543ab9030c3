//! Opcode descriptors.
//!
//! The abstract [`Opcode`] enum is stable across generations; the
//! hardware opcode byte is not. A static record list maps each abstract
//! opcode to its hardware encoding for the generations it applies to,
//! and [`IsaInfo`] folds that list into two lookup arrays at session
//! start: abstract-opcode -> descriptor and hardware-opcode ->
//! descriptor. Building the arrays asserts that no two records claim the
//! same slot for the same generation; a collision is a bug in the static
//! table, not a runtime condition.

use bitflags::bitflags;

use crate::devinfo::DeviceInfo;
use crate::inst::Inst;
use crate::regs::MathFunction;

bitflags! {
    /// Generation applicability mask, one bit per supported `verx10`.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct GenMask: u16 {
        const G40 = 1 << 0;
        const G45 = 1 << 1;
        const G50 = 1 << 2;
        const G60 = 1 << 3;
        const G70 = 1 << 4;
        const G75 = 1 << 5;
        const G80 = 1 << 6;
        const G90 = 1 << 7;
        const G100 = 1 << 8;
        const G110 = 1 << 9;
        const G120 = 1 << 10;
        const G125 = 1 << 11;
        const G200 = 1 << 12;
    }
}

impl GenMask {
    /// Mask bit for a single generation.
    pub fn of(verx10: u32) -> GenMask {
        match verx10 {
            40 => GenMask::G40,
            45 => GenMask::G45,
            50 => GenMask::G50,
            60 => GenMask::G60,
            70 => GenMask::G70,
            75 => GenMask::G75,
            80 => GenMask::G80,
            90 => GenMask::G90,
            100 => GenMask::G100,
            110 => GenMask::G110,
            120 => GenMask::G120,
            125 => GenMask::G125,
            200 => GenMask::G200,
            _ => panic!("unsupported generation verx10={verx10}"),
        }
    }

    /// All generations in `lo..=hi` (inclusive, in `verx10` terms).
    pub const fn range(lo: u32, hi: u32) -> GenMask {
        let vals = [40u32, 45, 50, 60, 70, 75, 80, 90, 100, 110, 120, 125, 200];
        let mut m = 0u16;
        let mut i = 0;
        while i < vals.len() {
            if vals[i] >= lo && vals[i] <= hi {
                m |= 1 << i;
            }
            i += 1;
        }
        GenMask::from_bits_retain(m)
    }
}

/// Abstract instruction opcodes.
///
/// The discriminant is an index into the IR-side lookup array, not a
/// hardware encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Illegal,
    Sync,
    Mov,
    Sel,
    Not,
    And,
    Or,
    Xor,
    Shr,
    Shl,
    Asr,
    Ror,
    Rol,
    Cmp,
    Cmpn,
    Csel,
    Bfrev,
    Bfe,
    Bfi1,
    Bfi2,
    Jmpi,
    If,
    // Pre-Gen6 IF variant that jumps past the ENDIF when all channels
    // are false; produced by the control-flow assembler, never emitted
    // directly.
    Iff,
    Else,
    Endif,
    Do,
    While,
    Break,
    Continue,
    Halt,
    Wait,
    Send,
    Sendc,
    Sends,
    Sendsc,
    Math,
    Add,
    Addc,
    Mul,
    Avg,
    Frc,
    Rndu,
    Rndd,
    Rnde,
    Rndz,
    Mac,
    Mach,
    Lzd,
    Fbh,
    Fbl,
    Cbit,
    Subb,
    Sad2,
    Sada2,
    Dp4,
    Dph,
    Dp3,
    Dp2,
    Dp4a,
    Line,
    Pln,
    Mad,
    Lrp,
    Madm,
    Nop,
}

pub const NUM_OPCODES: usize = Opcode::Nop as usize + 1;

/// One entry of the static opcode table.
#[derive(Copy, Clone, Debug)]
pub struct OpcodeDesc {
    pub ir: Opcode,
    /// Hardware opcode byte for the generations in `gens`.
    pub hw: u8,
    pub name: &'static str,
    /// Number of source operands the encoding carries.
    pub nsrc: u8,
    /// Number of destination operands (0 or 1).
    pub ndst: u8,
    pub gens: GenMask,
}

const fn desc(ir: Opcode, hw: u8, name: &'static str, nsrc: u8, ndst: u8, gens: GenMask) -> OpcodeDesc {
    OpcodeDesc { ir, hw, name, nsrc, ndst, gens }
}

// Everything up to and including 12.5 shares the pre-renumbering opcode
// space; the Gen12 renumbering is represented by a second record for the
// same abstract opcode.
const PRE12: GenMask = GenMask::range(40, 110);
const GEN12P: GenMask = GenMask::range(120, 200);
const ALL: GenMask = GenMask::range(40, 200);

#[rustfmt::skip]
static RECORDS: &[OpcodeDesc] = &[
    desc(Opcode::Illegal,  0x00, "illegal",  0, 0, ALL),
    desc(Opcode::Sync,     0x01, "sync",     1, 0, GEN12P),
    desc(Opcode::Mov,      0x01, "mov",      1, 1, PRE12),
    desc(Opcode::Mov,      0x61, "mov",      1, 1, GEN12P),
    desc(Opcode::Sel,      0x02, "sel",      2, 1, PRE12),
    desc(Opcode::Sel,      0x62, "sel",      2, 1, GEN12P),
    desc(Opcode::Not,      0x04, "not",      1, 1, PRE12),
    desc(Opcode::Not,      0x64, "not",      1, 1, GEN12P),
    desc(Opcode::And,      0x05, "and",      2, 1, PRE12),
    desc(Opcode::And,      0x65, "and",      2, 1, GEN12P),
    desc(Opcode::Or,       0x06, "or",       2, 1, PRE12),
    desc(Opcode::Or,       0x66, "or",       2, 1, GEN12P),
    desc(Opcode::Xor,      0x07, "xor",      2, 1, PRE12),
    desc(Opcode::Xor,      0x67, "xor",      2, 1, GEN12P),
    desc(Opcode::Shr,      0x08, "shr",      2, 1, PRE12),
    desc(Opcode::Shr,      0x68, "shr",      2, 1, GEN12P),
    desc(Opcode::Shl,      0x09, "shl",      2, 1, PRE12),
    desc(Opcode::Shl,      0x69, "shl",      2, 1, GEN12P),
    desc(Opcode::Asr,      0x0c, "asr",      2, 1, PRE12),
    desc(Opcode::Asr,      0x6c, "asr",      2, 1, GEN12P),
    desc(Opcode::Ror,      0x0e, "ror",      2, 1, GenMask::range(110, 110)),
    desc(Opcode::Ror,      0x6e, "ror",      2, 1, GEN12P),
    desc(Opcode::Rol,      0x0f, "rol",      2, 1, GenMask::range(110, 110)),
    desc(Opcode::Rol,      0x6f, "rol",      2, 1, GEN12P),
    desc(Opcode::Cmp,      0x10, "cmp",      2, 1, PRE12),
    desc(Opcode::Cmp,      0x70, "cmp",      2, 1, GEN12P),
    desc(Opcode::Cmpn,     0x11, "cmpn",     2, 1, PRE12),
    desc(Opcode::Cmpn,     0x71, "cmpn",     2, 1, GEN12P),
    desc(Opcode::Csel,     0x12, "csel",     3, 1, GenMask::range(80, 110)),
    desc(Opcode::Csel,     0x72, "csel",     3, 1, GEN12P),
    desc(Opcode::Bfrev,    0x17, "bfrev",    1, 1, GenMask::range(70, 110)),
    desc(Opcode::Bfrev,    0x77, "bfrev",    1, 1, GEN12P),
    desc(Opcode::Bfe,      0x18, "bfe",      3, 1, GenMask::range(70, 110)),
    desc(Opcode::Bfe,      0x78, "bfe",      3, 1, GEN12P),
    desc(Opcode::Bfi1,     0x19, "bfi1",     2, 1, GenMask::range(70, 110)),
    desc(Opcode::Bfi1,     0x79, "bfi1",     2, 1, GEN12P),
    desc(Opcode::Bfi2,     0x1a, "bfi2",     3, 1, GenMask::range(70, 110)),
    desc(Opcode::Bfi2,     0x7a, "bfi2",     3, 1, GEN12P),
    desc(Opcode::Jmpi,     0x20, "jmpi",     2, 1, ALL),
    desc(Opcode::If,       0x22, "if",       0, 0, ALL),
    desc(Opcode::Iff,      0x23, "iff",      0, 0, GenMask::range(40, 50)),
    desc(Opcode::Else,     0x24, "else",     0, 0, ALL),
    desc(Opcode::Endif,    0x25, "endif",    0, 0, ALL),
    desc(Opcode::Do,       0x26, "do",       0, 0, GenMask::range(40, 50)),
    desc(Opcode::While,    0x27, "while",    0, 0, ALL),
    desc(Opcode::Break,    0x28, "break",    0, 0, ALL),
    desc(Opcode::Continue, 0x29, "cont",     0, 0, ALL),
    desc(Opcode::Halt,     0x2a, "halt",     0, 0, ALL),
    desc(Opcode::Wait,     0x30, "wait",     1, 0, GenMask::range(40, 110)),
    desc(Opcode::Send,     0x31, "send",     1, 1, ALL),
    desc(Opcode::Sendc,    0x32, "sendc",    1, 1, ALL),
    desc(Opcode::Sends,    0x33, "sends",    2, 1, GenMask::range(90, 110)),
    desc(Opcode::Sendsc,   0x34, "sendsc",   2, 1, GenMask::range(90, 110)),
    desc(Opcode::Math,     0x38, "math",     2, 1, GenMask::range(60, 200)),
    desc(Opcode::Add,      0x40, "add",      2, 1, ALL),
    desc(Opcode::Mul,      0x41, "mul",      2, 1, ALL),
    desc(Opcode::Avg,      0x42, "avg",      2, 1, ALL),
    desc(Opcode::Frc,      0x43, "frc",      1, 1, ALL),
    desc(Opcode::Rndu,     0x44, "rndu",     1, 1, ALL),
    desc(Opcode::Rndd,     0x45, "rndd",     1, 1, ALL),
    desc(Opcode::Rnde,     0x46, "rnde",     1, 1, ALL),
    desc(Opcode::Rndz,     0x47, "rndz",     1, 1, ALL),
    desc(Opcode::Mac,      0x48, "mac",      2, 1, ALL),
    desc(Opcode::Mach,     0x49, "mach",     2, 1, ALL),
    desc(Opcode::Lzd,      0x4a, "lzd",      1, 1, ALL),
    desc(Opcode::Fbh,      0x4b, "fbh",      1, 1, GenMask::range(70, 200)),
    desc(Opcode::Fbl,      0x4c, "fbl",      1, 1, GenMask::range(70, 200)),
    desc(Opcode::Cbit,     0x4d, "cbit",     1, 1, GenMask::range(70, 200)),
    desc(Opcode::Addc,     0x4e, "addc",     2, 1, GenMask::range(70, 200)),
    desc(Opcode::Subb,     0x4f, "subb",     2, 1, GenMask::range(70, 200)),
    desc(Opcode::Sad2,     0x50, "sad2",     2, 1, ALL),
    desc(Opcode::Sada2,    0x51, "sada2",    2, 1, ALL),
    desc(Opcode::Dp4,      0x54, "dp4",      2, 1, GenMask::range(40, 110)),
    desc(Opcode::Dph,      0x55, "dph",      2, 1, GenMask::range(40, 110)),
    desc(Opcode::Dp3,      0x56, "dp3",      2, 1, GenMask::range(40, 110)),
    desc(Opcode::Dp2,      0x57, "dp2",      2, 1, GenMask::range(40, 110)),
    desc(Opcode::Dp4a,     0x58, "dp4a",     3, 1, GEN12P),
    desc(Opcode::Line,     0x59, "line",     2, 1, GenMask::range(40, 90)),
    desc(Opcode::Pln,      0x5a, "pln",      2, 1, GenMask::range(45, 90)),
    desc(Opcode::Mad,      0x5b, "mad",      3, 1, GenMask::range(60, 200)),
    desc(Opcode::Lrp,      0x5c, "lrp",      3, 1, GenMask::range(60, 110)),
    desc(Opcode::Madm,     0x5d, "madm",     3, 1, GenMask::range(80, 200)),
    desc(Opcode::Nop,      0x7e, "nop",      0, 0, PRE12),
    desc(Opcode::Nop,      0x60, "nop",      0, 0, GEN12P),
];

/// Per-session opcode lookup tables.
pub struct IsaInfo {
    pub devinfo: DeviceInfo,
    ir_to_desc: [Option<&'static OpcodeDesc>; NUM_OPCODES],
    hw_to_desc: [Option<&'static OpcodeDesc>; 128],
}

impl IsaInfo {
    /// Folds the static record list into the two lookup arrays, keeping
    /// only records applicable to `devinfo`'s generation.
    pub fn new(devinfo: DeviceInfo) -> IsaInfo {
        let gen = GenMask::of(devinfo.verx10);
        let mut ir_to_desc: [Option<&'static OpcodeDesc>; NUM_OPCODES] = [None; NUM_OPCODES];
        let mut hw_to_desc: [Option<&'static OpcodeDesc>; 128] = [None; 128];

        for rec in RECORDS {
            if !rec.gens.contains(gen) {
                continue;
            }
            let ir_slot = &mut ir_to_desc[rec.ir as usize];
            assert!(
                ir_slot.is_none(),
                "opcode table collision: {} claimed twice for verx10={}",
                rec.name,
                devinfo.verx10
            );
            *ir_slot = Some(rec);

            let hw_slot = &mut hw_to_desc[rec.hw as usize];
            assert!(
                hw_slot.is_none(),
                "opcode table collision: hw opcode {:#04x} claimed twice for verx10={}",
                rec.hw,
                devinfo.verx10
            );
            *hw_slot = Some(rec);
        }

        IsaInfo { devinfo, ir_to_desc, hw_to_desc }
    }

    /// Descriptor for an abstract opcode, if it exists on this generation.
    pub fn desc(&self, op: Opcode) -> Option<&'static OpcodeDesc> {
        self.ir_to_desc[op as usize]
    }

    /// Descriptor for a hardware opcode byte, if assigned on this
    /// generation. Out-of-range bytes simply have no descriptor.
    pub fn desc_by_hw(&self, hw: u32) -> Option<&'static OpcodeDesc> {
        self.hw_to_desc.get(hw as usize).copied().flatten()
    }

    /// Hardware encoding of `op`. Panics if the opcode does not exist on
    /// this generation: emitting it would be a caller bug.
    pub fn hw_opcode(&self, op: Opcode) -> u8 {
        self.desc(op)
            .unwrap_or_else(|| panic!("opcode {op:?} does not exist on verx10={}", self.devinfo.verx10))
            .hw
    }

    /// The abstract opcode of an encoded instruction, if its hardware
    /// opcode byte is assigned.
    pub fn opcode(&self, inst: &Inst) -> Option<Opcode> {
        self.desc_by_hw(inst.hw_opcode(&self.devinfo) as u32).map(|d| d.ir)
    }

    /// Source-operand count of an encoded instruction.
    ///
    /// MATH consults the math-function field: the two-operand functions
    /// carry two sources, the rest one.
    pub fn num_sources(&self, inst: &Inst) -> Option<u8> {
        let desc = self.desc_by_hw(inst.hw_opcode(&self.devinfo) as u32)?;
        if desc.ir == Opcode::Math {
            let two = matches!(
                MathFunction::decode(inst.math_function(&self.devinfo) as u32),
                Some(MathFunction::Pow)
                    | Some(MathFunction::IntDivQuotientAndRemainder)
                    | Some(MathFunction::IntDivQuotient)
                    | Some(MathFunction::IntDivRemainder)
            );
            return Some(if two { 2 } else { 1 });
        }
        Some(desc.nsrc)
    }
}

/// Send-class opcodes share stricter operand encodings.
pub fn is_send_opcode(op: Opcode) -> bool {
    matches!(op, Opcode::Send | Opcode::Sendc | Opcode::Sends | Opcode::Sendsc)
}

/// Split sends encode two payload registers and no source regions.
pub fn is_split_send(devinfo: &DeviceInfo, op: Opcode) -> bool {
    if devinfo.ver >= 12 {
        is_send_opcode(op)
    } else {
        matches!(op, Opcode::Sends | Opcode::Sendsc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devinfo::Platform;

    #[test]
    fn build_every_generation() {
        for &v in crate::devinfo::SUPPORTED_VERX10 {
            let isa = IsaInfo::new(DeviceInfo::new(v, Platform::Main));
            // ADD exists everywhere and maps back from its hw code.
            let add = isa.desc(Opcode::Add).unwrap();
            assert_eq!(isa.desc_by_hw(add.hw as u32).unwrap().ir, Opcode::Add);
        }
    }

    #[test]
    fn renumbered_opcodes() {
        let skl = IsaInfo::new(DeviceInfo::new(90, Platform::Main));
        let tgl = IsaInfo::new(DeviceInfo::new(120, Platform::Main));
        assert_eq!(skl.hw_opcode(Opcode::Mov), 0x01);
        assert_eq!(tgl.hw_opcode(Opcode::Mov), 0x61);
        // SYNC reuses the old MOV slot on Gen12.
        assert_eq!(tgl.desc_by_hw(0x01).unwrap().ir, Opcode::Sync);
        assert!(skl.desc(Opcode::Sync).is_none());
    }

    #[test]
    fn generation_gating() {
        let ilk = IsaInfo::new(DeviceInfo::new(50, Platform::Main));
        assert!(ilk.desc(Opcode::Math).is_none());
        assert!(ilk.desc(Opcode::Do).is_some());
        let bdw = IsaInfo::new(DeviceInfo::new(80, Platform::Main));
        assert!(bdw.desc(Opcode::Do).is_none());
        assert!(bdw.desc(Opcode::Math).is_some());
    }
}
