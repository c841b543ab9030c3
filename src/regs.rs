//! Register files, region encodings, and the operand descriptor.
//!
//! [`Reg`] is the builder's input type: a logical operand with its
//! register file, data type, region shape (or swizzle, in align16
//! sessions) and modifiers. Region parameters are stored in their
//! hardware encodings, the same convention the encoder and validator
//! use throughout.

use crate::types::RegType;

/// Register file of an operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegFile {
    /// Architecture register file (null, accumulator, flags, ...).
    Arf,
    /// General register file.
    Grf,
    /// Message register file; remapped to high GRFs on Gen7+.
    Mrf,
    /// Immediate operand.
    Imm,
}

impl RegFile {
    pub fn to_hw(self) -> u32 {
        match self {
            RegFile::Arf => 0,
            RegFile::Grf => 1,
            RegFile::Mrf => 2,
            RegFile::Imm => 3,
        }
    }

    pub fn from_hw(hw: u32) -> Option<RegFile> {
        match hw {
            0 => Some(RegFile::Arf),
            1 => Some(RegFile::Grf),
            2 => Some(RegFile::Mrf),
            3 => Some(RegFile::Imm),
            _ => None,
        }
    }
}

// Architecture register numbers. The low nibble selects the instance
// (e.g. acc0/acc1), so comparisons mask with 0xF0.
pub const ARF_NULL: u32 = 0x00;
pub const ARF_ADDRESS: u32 = 0x10;
pub const ARF_ACCUMULATOR: u32 = 0x20;
pub const ARF_FLAG: u32 = 0x30;
pub const ARF_MASK: u32 = 0x40;
pub const ARF_IP: u32 = 0x90;
pub const ARF_TDR: u32 = 0xb0;
pub const ARF_TIMESTAMP: u32 = 0xc0;

/// MRF numbers with this bit set use the compressed-quadruple layout.
pub const MRF_COMPR4: u32 = 1 << 7;

/// Maximum message register number, before the Gen7+ remap to GRF space.
pub fn max_mrf(ver: u32) -> u32 {
    if ver >= 7 { 16 } else { 24 }
}

/// First GRF of the range message registers are remapped into on Gen7+.
pub const MRF_HACK_START: u32 = 112;

/// Operand addressing mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddressMode {
    Direct,
    Indirect,
}

impl AddressMode {
    pub fn to_hw(self) -> u32 {
        match self {
            AddressMode::Direct => 0,
            AddressMode::Indirect => 1,
        }
    }

    pub fn from_hw(hw: u32) -> AddressMode {
        if hw == 0 { AddressMode::Direct } else { AddressMode::Indirect }
    }
}

/// Access mode of an instruction: region-based align1 or swizzle-based
/// align16.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AccessMode {
    Align1,
    Align16,
}

impl AccessMode {
    pub fn to_hw(self) -> u32 {
        match self {
            AccessMode::Align1 => 0,
            AccessMode::Align16 => 1,
        }
    }

    pub fn from_hw(hw: u32) -> AccessMode {
        if hw == 0 { AccessMode::Align1 } else { AccessMode::Align16 }
    }
}

/// Vertical stride, hardware-encoded: the logical stride in elements is
/// `0` for encoding 0, otherwise `1 << (enc - 1)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd)]
pub enum VStride {
    V0 = 0,
    V1 = 1,
    V2 = 2,
    V4 = 3,
    V8 = 4,
    V16 = 5,
    V32 = 6,
}

impl VStride {
    pub fn to_hw(self) -> u32 {
        self as u32
    }

    /// Logical stride in elements.
    pub fn elements(self) -> u32 {
        decode_stride(self as u32)
    }
}

/// Region width, hardware-encoded: logical width is `1 << enc`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd)]
pub enum Width {
    W1 = 0,
    W2 = 1,
    W4 = 2,
    W8 = 3,
    W16 = 4,
}

impl Width {
    pub fn to_hw(self) -> u32 {
        self as u32
    }

    pub fn elements(self) -> u32 {
        1 << (self as u32)
    }
}

/// Horizontal stride, hardware-encoded like [`VStride`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd)]
pub enum HStride {
    H0 = 0,
    H1 = 1,
    H2 = 2,
    H4 = 3,
}

impl HStride {
    pub fn to_hw(self) -> u32 {
        self as u32
    }

    pub fn elements(self) -> u32 {
        decode_stride(self as u32)
    }
}

/// Decodes a stride field value to elements: 0 stays 0, otherwise
/// `1 << (enc - 1)`.
pub fn decode_stride(enc: u32) -> u32 {
    if enc == 0 { 0 } else { 1 << (enc - 1) }
}

/// Decodes a width field value to elements.
pub fn decode_width(enc: u32) -> u32 {
    1 << enc
}

/// Execution size, hardware-encoded: the SIMD width is `1 << enc`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExecSize {
    E1 = 0,
    E2 = 1,
    E4 = 2,
    E8 = 3,
    E16 = 4,
    E32 = 5,
}

impl ExecSize {
    pub fn to_hw(self) -> u32 {
        self as u32
    }

    pub fn channels(self) -> u32 {
        1 << (self as u32)
    }

    pub fn from_width(w: Width) -> ExecSize {
        match w {
            Width::W1 => ExecSize::E1,
            Width::W2 => ExecSize::E2,
            Width::W4 => ExecSize::E4,
            Width::W8 => ExecSize::E8,
            Width::W16 => ExecSize::E16,
        }
    }
}

/// Write-enable override: `Disable` ("NoMask") executes all channels
/// regardless of predication.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MaskControl {
    Enable = 0,
    Disable = 1,
}

/// Predication control. The align16 replicate modes share hardware
/// values with the align1 group modes; both spellings live here and the
/// access mode decides which reading applies.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    None = 0,
    Normal = 1,
    AnyV = 2,
    AllV = 3,
    Any2h = 4,
    All2h = 5,
    Any4h = 6,
    All4h = 7,
    Any8h = 8,
    All8h = 9,
    Any16h = 10,
    All16h = 11,
    Any32h = 12,
    All32h = 13,
}

/// Conditional modifier (flag-write condition).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CondModifier {
    None = 0,
    Z = 1,
    Nz = 2,
    G = 3,
    Ge = 4,
    L = 5,
    Le = 6,
    O = 8,
    U = 9,
}

/// Extended-math function selector, written into the shared
/// condition-modifier field of MATH instructions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MathFunction {
    Inv = 1,
    Log = 2,
    Exp = 3,
    Sqrt = 4,
    Rsq = 5,
    Sin = 6,
    Cos = 7,
    Fdiv = 9,
    Pow = 10,
    IntDivQuotientAndRemainder = 11,
    IntDivQuotient = 12,
    IntDivRemainder = 13,
    Invm = 14,
    Rsqrtm = 15,
}

impl MathFunction {
    pub fn decode(hw: u32) -> Option<MathFunction> {
        Some(match hw {
            1 => MathFunction::Inv,
            2 => MathFunction::Log,
            3 => MathFunction::Exp,
            4 => MathFunction::Sqrt,
            5 => MathFunction::Rsq,
            6 => MathFunction::Sin,
            7 => MathFunction::Cos,
            9 => MathFunction::Fdiv,
            10 => MathFunction::Pow,
            11 => MathFunction::IntDivQuotientAndRemainder,
            12 => MathFunction::IntDivQuotient,
            13 => MathFunction::IntDivRemainder,
            14 => MathFunction::Invm,
            15 => MathFunction::Rsqrtm,
            _ => return None,
        })
    }
}

// Channel-select helpers for align16 swizzles, two bits per channel.
pub const SWIZZLE_XYZW: u8 = 0b11_10_01_00;
pub const SWIZZLE_XXXX: u8 = 0b00_00_00_00;

pub fn swizzle(x: u8, y: u8, z: u8, w: u8) -> u8 {
    debug_assert!(x < 4 && y < 4 && z < 4 && w < 4);
    x | (y << 2) | (z << 4) | (w << 6)
}

pub fn get_swizzle_channel(swz: u8, chan: u8) -> u8 {
    (swz >> (chan * 2)) & 3
}

pub const WRITEMASK_XYZW: u8 = 0xf;

/// A logical operand: the builder's input descriptor.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Reg {
    pub file: RegFile,
    pub rtype: RegType,
    pub nr: u32,
    /// Sub-register byte offset.
    pub subnr: u32,
    pub negate: bool,
    pub abs: bool,
    pub address_mode: AddressMode,
    pub vstride: VStride,
    pub width: Width,
    pub hstride: HStride,
    /// Align16 channel select; ignored in align1 sessions.
    pub swizzle: u8,
    /// Align16 destination writemask; ignored in align1 sessions.
    pub writemask: u8,
    /// Indirect addressing immediate offset, in bytes.
    pub indirect_offset: i32,
    /// Raw immediate bits when `file == Imm`.
    pub imm: u64,
}

impl Reg {
    /// General constructor: a direct register with an explicit region.
    pub fn new(file: RegFile, nr: u32, subnr: u32, rtype: RegType, vstride: VStride, width: Width, hstride: HStride) -> Reg {
        Reg {
            file,
            rtype,
            nr,
            subnr,
            negate: false,
            abs: false,
            address_mode: AddressMode::Direct,
            vstride,
            width,
            hstride,
            swizzle: SWIZZLE_XYZW,
            writemask: WRITEMASK_XYZW,
            indirect_offset: 0,
            imm: 0,
        }
    }

    /// An 8-wide float GRF region, the workhorse operand.
    pub fn grf(nr: u32) -> Reg {
        Reg::new(RegFile::Grf, nr, 0, RegType::F, VStride::V8, Width::W8, HStride::H1)
    }

    pub fn mrf(nr: u32) -> Reg {
        Reg::new(RegFile::Mrf, nr, 0, RegType::F, VStride::V8, Width::W8, HStride::H1)
    }

    /// The null register.
    pub fn null() -> Reg {
        Reg::new(RegFile::Arf, ARF_NULL, 0, RegType::F, VStride::V8, Width::W8, HStride::H1)
    }

    pub fn acc(nr: u32) -> Reg {
        Reg::new(RegFile::Arf, ARF_ACCUMULATOR + nr, 0, RegType::F, VStride::V8, Width::W8, HStride::H1)
    }

    pub fn flag(nr: u32) -> Reg {
        Reg::new(RegFile::Arf, ARF_FLAG + nr, 0, RegType::Uw, VStride::V0, Width::W1, HStride::H0)
    }

    pub fn address(subnr: u32) -> Reg {
        Reg::new(RegFile::Arf, ARF_ADDRESS, subnr, RegType::Uw, VStride::V0, Width::W1, HStride::H0)
    }

    /// The instruction pointer, used by the pre-Gen6 control-flow
    /// rewrites.
    pub fn ip() -> Reg {
        Reg::new(RegFile::Arf, ARF_IP, 0, RegType::Ud, VStride::V0, Width::W1, HStride::H0)
    }

    fn imm_bits(rtype: RegType, bits: u64) -> Reg {
        let mut r = Reg::new(RegFile::Imm, 0, 0, rtype, VStride::V0, Width::W1, HStride::H0);
        r.imm = bits;
        r
    }

    pub fn imm_ud(v: u32) -> Reg {
        Reg::imm_bits(RegType::Ud, v as u64)
    }

    pub fn imm_d(v: i32) -> Reg {
        Reg::imm_bits(RegType::D, v as u32 as u64)
    }

    pub fn imm_uw(v: u16) -> Reg {
        Reg::imm_bits(RegType::Uw, v as u64)
    }

    pub fn imm_w(v: i16) -> Reg {
        Reg::imm_bits(RegType::W, v as u16 as u64)
    }

    pub fn imm_f(v: f32) -> Reg {
        Reg::imm_bits(RegType::F, v.to_bits() as u64)
    }

    pub fn imm_df(v: f64) -> Reg {
        Reg::imm_bits(RegType::Df, v.to_bits())
    }

    pub fn imm_uq(v: u64) -> Reg {
        Reg::imm_bits(RegType::Uq, v)
    }

    pub fn imm_q(v: i64) -> Reg {
        Reg::imm_bits(RegType::Q, v as u64)
    }

    pub fn imm_v(v: u32) -> Reg {
        Reg::imm_bits(RegType::V, v as u64)
    }

    pub fn imm_uv(v: u32) -> Reg {
        Reg::imm_bits(RegType::Uv, v as u64)
    }

    pub fn imm_vf(v: u32) -> Reg {
        Reg::imm_bits(RegType::Vf, v as u64)
    }

    /// Same operand viewed with another data type.
    pub fn retype(mut self, rtype: RegType) -> Reg {
        self.rtype = rtype;
        self
    }

    /// Narrows the region to a scalar (replicated) element.
    pub fn vec1(mut self) -> Reg {
        self.vstride = VStride::V0;
        self.width = Width::W1;
        self.hstride = HStride::H0;
        self
    }

    pub fn vec2(mut self) -> Reg {
        self.vstride = VStride::V2;
        self.width = Width::W2;
        self.hstride = HStride::H1;
        self
    }

    pub fn vec4(mut self) -> Reg {
        self.vstride = VStride::V4;
        self.width = Width::W4;
        self.hstride = HStride::H1;
        self
    }

    pub fn vec8(mut self) -> Reg {
        self.vstride = VStride::V8;
        self.width = Width::W8;
        self.hstride = HStride::H1;
        self
    }

    pub fn vec16(mut self) -> Reg {
        self.vstride = VStride::V16;
        self.width = Width::W16;
        self.hstride = HStride::H1;
        self
    }

    pub fn with_subnr(mut self, subnr: u32) -> Reg {
        self.subnr = subnr;
        self
    }

    pub fn with_stride(mut self, vstride: VStride, width: Width, hstride: HStride) -> Reg {
        self.vstride = vstride;
        self.width = width;
        self.hstride = hstride;
        self
    }

    pub fn with_swizzle(mut self, swz: u8) -> Reg {
        self.swizzle = swz;
        self
    }

    pub fn with_writemask(mut self, mask: u8) -> Reg {
        self.writemask = mask;
        self
    }

    pub fn negate(mut self) -> Reg {
        self.negate = !self.negate;
        self
    }

    pub fn abs(mut self) -> Reg {
        self.abs = true;
        self.negate = false;
        self
    }

    /// Register-indirect form of this operand, addressed through
    /// `a0.subnr` plus a byte offset.
    pub fn indirect(mut self, addr_subnr: u32, offset: i32) -> Reg {
        self.address_mode = AddressMode::Indirect;
        self.subnr = addr_subnr;
        self.indirect_offset = offset;
        self
    }

    pub fn is_null(&self) -> bool {
        self.file == RegFile::Arf && (self.nr & 0xf0) == ARF_NULL
    }

    pub fn is_acc(&self) -> bool {
        self.file == RegFile::Arf && (self.nr & 0xf0) == ARF_ACCUMULATOR
    }

    /// A scalar (fully replicated) region.
    pub fn has_scalar_region(&self) -> bool {
        self.vstride == VStride::V0 && self.width == Width::W1 && self.hstride == HStride::H0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_encodings() {
        assert_eq!(VStride::V0.elements(), 0);
        assert_eq!(VStride::V8.elements(), 8);
        assert_eq!(Width::W16.elements(), 16);
        assert_eq!(HStride::H0.elements(), 0);
        assert_eq!(HStride::H4.elements(), 4);
        assert_eq!(ExecSize::E32.channels(), 32);
    }

    #[test]
    fn scalar_region() {
        assert!(Reg::grf(3).vec1().has_scalar_region());
        assert!(!Reg::grf(3).has_scalar_region());
    }

    #[test]
    fn swizzle_channels() {
        let swz = swizzle(3, 2, 1, 0);
        assert_eq!(get_swizzle_channel(swz, 0), 3);
        assert_eq!(get_swizzle_channel(swz, 3), 0);
        assert_eq!(get_swizzle_channel(SWIZZLE_XYZW, 2), 2);
    }

    #[test]
    fn modifiers() {
        let r = Reg::grf(0).negate();
        assert!(r.negate);
        let r = r.abs();
        assert!(r.abs && !r.negate);
    }
}
