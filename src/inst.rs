//! The 128-bit instruction word and its field accessors.
//!
//! No field offset is globally constant: every accessor takes a
//! [`DeviceInfo`] and consults the per-era field tables below before
//! touching bits. The tables are generation *data*, kept in this one
//! module; the encoder, the validator, and the tests all go through the
//! same accessors, so cross-component agreement is independent of any
//! individual offset value.
//!
//! Three field families share the word: the two-source layout (also
//! used by zero- and one-source instructions), the align16 three-source
//! layout, and the align1 three-source layout. Which family applies is
//! decided by the opcode descriptor and the access mode, exactly as the
//! hardware does it.

use crate::devinfo::DeviceInfo;

/// Size in bytes of a full (non-compacted) instruction word.
pub const INST_SIZE: usize = 16;

/// Size in bytes of a compacted instruction word.
pub const COMPACT_INST_SIZE: usize = 8;

/// An inclusive bit range within the 128-bit word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub lo: u8,
    pub hi: u8,
}

const fn f(lo: u8, hi: u8) -> Field {
    Field { lo, hi }
}

impl Field {
    pub fn width(self) -> u32 {
        (self.hi - self.lo + 1) as u32
    }
}

/// One fixed-size instruction word.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Inst(u128);

impl Inst {
    pub fn zeroed() -> Inst {
        Inst(0)
    }

    pub fn from_bytes(bytes: [u8; INST_SIZE]) -> Inst {
        Inst(u128::from_le_bytes(bytes))
    }

    pub fn to_bytes(self) -> [u8; INST_SIZE] {
        self.0.to_le_bytes()
    }

    /// Raw read of a field.
    pub fn bits(&self, field: Field) -> u64 {
        debug_assert!(field.hi < 128 && field.lo <= field.hi);
        debug_assert!(field.width() <= 64);
        let mask = if field.width() == 64 { u64::MAX } else { (1u64 << field.width()) - 1 };
        ((self.0 >> field.lo) as u64) & mask
    }

    /// Sign-extended read of a field.
    pub fn bits_signed(&self, field: Field) -> i64 {
        let w = field.width();
        let v = self.bits(field);
        let shift = 64 - w;
        ((v << shift) as i64) >> shift
    }

    /// Raw write of a field. The value must fit; truncation would be an
    /// encoder bug.
    pub fn set_bits(&mut self, field: Field, value: u64) {
        debug_assert!(field.hi < 128 && field.lo <= field.hi);
        let mask = if field.width() == 64 { u64::MAX } else { (1u64 << field.width()) - 1 };
        debug_assert!(value & !mask == 0, "value {value:#x} does not fit field {field:?}");
        let wide_mask = (mask as u128) << field.lo;
        self.0 = (self.0 & !wide_mask) | (((value & mask) as u128) << field.lo);
    }

    /// Write of a signed field value.
    pub fn set_bits_signed(&mut self, field: Field, value: i64) {
        let w = field.width();
        let min = -(1i64 << (w - 1));
        let max = (1i64 << (w - 1)) - 1;
        debug_assert!(value >= min && value <= max, "value {value} does not fit signed field {field:?}");
        let mask = if w == 64 { u64::MAX } else { (1u64 << w) - 1 };
        self.set_bits(field, (value as u64) & mask);
    }
}

fn is_gen12(devinfo: &DeviceInfo) -> bool {
    devinfo.ver >= 12
}

// ---------------------------------------------------------------------
// Common control fields (two-source layout, shared by the three-source
// layouts where noted).
// ---------------------------------------------------------------------

// Pre-Gen12 control dword.
const A_OPCODE: Field = f(0, 6);
const A_MASK_CONTROL: Field = f(7, 7);
const A_ACCESS_MODE: Field = f(8, 8);
const A_NO_DD_CLEAR: Field = f(9, 9);
const A_NO_DD_CHECK: Field = f(10, 10);
const A_NIB_CONTROL: Field = f(11, 11);
const A_QTR_CONTROL: Field = f(12, 13);
const A_THREAD_CONTROL: Field = f(14, 15);
const A_PRED_CONTROL: Field = f(16, 19);
const A_PRED_INV: Field = f(20, 20);
const A_EXEC_SIZE: Field = f(21, 23);
const A_COND_MODIFIER: Field = f(24, 27);
const A_ACC_WR_CONTROL: Field = f(28, 28);
const A_CMPT_CONTROL: Field = f(29, 29);
const A_BRANCH_CONTROL: Field = f(30, 30);
const A_SATURATE: Field = f(31, 31);

// Gen12+ control dword: the dependency-control and thread-control bits
// are gone, the SWSB annotation takes their place, and the access-mode
// bit no longer exists (align16 itself is gone).
const B_OPCODE: Field = f(0, 6);
const B_MASK_CONTROL: Field = f(7, 7);
const B_SWSB: Field = f(8, 15);
const B_NIB_CONTROL: Field = f(16, 16);
const B_QTR_CONTROL: Field = f(17, 18);
const B_EXEC_SIZE: Field = f(19, 21);
const B_PRED_CONTROL: Field = f(22, 25);
const B_PRED_INV: Field = f(26, 26);
const B_COND_MODIFIER: Field = f(27, 30);
const B_CMPT_CONTROL: Field = f(31, 31);
const B_SATURATE: Field = f(34, 34);

// Pre-Gen12 operand descriptors.
const A_FLAG_SUBREG_NR: Field = f(32, 32);
const A_FLAG_REG_NR: Field = f(33, 33);
const A_DST_REG_FILE: Field = f(34, 35);
const A_DST_REG_HW_TYPE: Field = f(36, 39);
const A_DST_ADDRESS_MODE: Field = f(40, 40);
const A_DST_HSTRIDE: Field = f(41, 42);
const A_DST_DA_REG_NR: Field = f(43, 50);
const A_DST_IA_SUBREG_NR: Field = f(43, 46);
const A_DST_DA1_SUBREG_NR: Field = f(51, 55);
const A_DST_DA16_SUBREG_NR: Field = f(51, 51);
const A_DST_DA16_WRITEMASK: Field = f(52, 55);
const A_DST_IA1_ADDR_IMM: Field = f(47, 55);
const A_DST_IA16_ADDR_IMM: Field = f(47, 52);
const A_SRC0_REG_FILE: Field = f(56, 57);
const A_SRC0_REG_HW_TYPE: Field = f(58, 61);

const A_SRC0_ADDRESS_MODE: Field = f(64, 64);
const A_SRC0_NEGATE: Field = f(65, 65);
const A_SRC0_ABS: Field = f(66, 66);
const A_SRC0_DA_REG_NR: Field = f(67, 74);
const A_SRC0_IA_SUBREG_NR: Field = f(67, 70);
const A_SRC0_DA1_SUBREG_NR: Field = f(75, 79);
const A_SRC0_DA16_SUBREG_NR: Field = f(75, 75);
const A_SRC0_HSTRIDE: Field = f(80, 81);
const A_SRC0_WIDTH: Field = f(82, 84);
const A_SRC0_VSTRIDE: Field = f(85, 88);
const A_SRC0_DA16_SWIZZLE: Field = f(76, 83);
const A_SRC0_IA1_ADDR_IMM: Field = f(71, 79);
const A_SRC0_IA16_ADDR_IMM: Field = f(71, 75);
const A_SRC1_REG_FILE: Field = f(89, 90);
const A_SRC1_REG_HW_TYPE: Field = f(91, 94);

const A_SRC1_ADDRESS_MODE: Field = f(96, 96);
const A_SRC1_NEGATE: Field = f(97, 97);
const A_SRC1_ABS: Field = f(98, 98);
const A_SRC1_DA_REG_NR: Field = f(99, 106);
const A_SRC1_IA_SUBREG_NR: Field = f(99, 102);
const A_SRC1_DA1_SUBREG_NR: Field = f(107, 111);
const A_SRC1_DA16_SUBREG_NR: Field = f(107, 107);
const A_SRC1_HSTRIDE: Field = f(112, 113);
const A_SRC1_WIDTH: Field = f(114, 116);
const A_SRC1_VSTRIDE: Field = f(117, 120);
const A_SRC1_DA16_SWIZZLE: Field = f(108, 115);
const A_SRC1_IA1_ADDR_IMM: Field = f(103, 111);
const A_SRC1_IA16_ADDR_IMM: Field = f(103, 107);

// Gen12+ operand descriptors.
const B_FLAG_SUBREG_NR: Field = f(32, 32);
const B_FLAG_REG_NR: Field = f(33, 33);
const B_DST_REG_FILE: Field = f(35, 36);
const B_DST_REG_HW_TYPE: Field = f(37, 40);
const B_DST_ADDRESS_MODE: Field = f(41, 41);
const B_DST_HSTRIDE: Field = f(42, 43);
const B_DST_DA_REG_NR: Field = f(44, 51);
const B_DST_IA_SUBREG_NR: Field = f(44, 47);
const B_DST_DA1_SUBREG_NR: Field = f(52, 56);
const B_DST_IA1_ADDR_IMM: Field = f(48, 56);
const B_SRC0_REG_FILE: Field = f(57, 58);
const B_SRC0_REG_HW_TYPE: Field = f(59, 62);

// The Gen12 source blocks reuse the pre-Gen12 positions; only the
// align16 variants disappear.
const B_SRC0_ADDRESS_MODE: Field = A_SRC0_ADDRESS_MODE;
const B_SRC0_NEGATE: Field = A_SRC0_NEGATE;
const B_SRC0_ABS: Field = A_SRC0_ABS;
const B_SRC0_DA_REG_NR: Field = A_SRC0_DA_REG_NR;
const B_SRC0_IA_SUBREG_NR: Field = A_SRC0_IA_SUBREG_NR;
const B_SRC0_DA1_SUBREG_NR: Field = A_SRC0_DA1_SUBREG_NR;
const B_SRC0_HSTRIDE: Field = A_SRC0_HSTRIDE;
const B_SRC0_WIDTH: Field = A_SRC0_WIDTH;
const B_SRC0_VSTRIDE: Field = A_SRC0_VSTRIDE;
const B_SRC0_IA1_ADDR_IMM: Field = A_SRC0_IA1_ADDR_IMM;
const B_SRC1_REG_FILE: Field = A_SRC1_REG_FILE;
const B_SRC1_REG_HW_TYPE: Field = A_SRC1_REG_HW_TYPE;

// Immediates. The 32-bit form lives in the last dword regardless of
// which source it logically belongs to; the 64-bit form (one-source
// instructions only) spans the upper half of the word.
const IMM32: Field = f(96, 127);
const IMM64: Field = f(64, 127);

// Branch displacement fields.
const GFX4_JUMP_COUNT: Field = f(96, 111);
const GFX4_POP_COUNT: Field = f(112, 115);
// Gen6 structured-control jump count, stored in the immediate-typed
// destination slot.
const GFX6_JUMP_COUNT: Field = f(40, 55);
// 16-bit JIP/UIP on Gen6/7, widened to 32 bits from Gen8 on.
const JIP16: Field = f(96, 111);
const UIP16: Field = f(112, 127);
const JIP32: Field = f(64, 95);
const UIP32: Field = f(96, 127);

// Send descriptor fields, inside the immediate dword.
const SEND_DESC: Field = f(96, 124);
const SEND_EOT: Field = f(127, 127);
const SEND_DESC_MLEN: Field = f(121, 124);
const SEND_DESC_RLEN: Field = f(116, 120);
const SEND_DESC_HEADER: Field = f(115, 115);
const SEND_SEL_REG32_DESC: Field = f(125, 125);
const SEND_SEL_REG32_EX_DESC: Field = f(126, 126);
// Split-send extras, packed into source fields sends never use.
const SEND_SRC1_REG_NR: Field = f(80, 87);
const SEND_SRC1_REG_FILE: Field = f(95, 95);
const SEND_EX_MLEN: Field = f(91, 94);

// ---------------------------------------------------------------------
// Align16 three-source layout.
// ---------------------------------------------------------------------
const A16_FLAG_SUBREG_NR: Field = f(32, 32);
const A16_FLAG_REG_NR: Field = f(33, 33);
const A16_DST_REG_FILE: Field = f(34, 34);
const A16_DST_REG_NR: Field = f(35, 42);
const A16_DST_SUBREG_NR: Field = f(43, 45);
const A16_DST_WRITEMASK: Field = f(46, 49);
const A16_DST_TYPE: Field = f(50, 52);
const A16_SRC_TYPE: Field = f(53, 55);
const A16_SRC1_TYPE_HF: Field = f(56, 56);
const A16_SRC2_TYPE_HF: Field = f(57, 57);

const A16_SRC_BASE: [u8; 3] = [62, 84, 106];

fn a16_src(base: u8, lo: u8, hi: u8) -> Field {
    f(base + lo, base + hi)
}

// ---------------------------------------------------------------------
// Align1 three-source layout (Gen10+). The control dword is the
// two-source one of the same era.
// ---------------------------------------------------------------------
const A1_EXEC_TYPE: Field = f(35, 36);
const A1_DST_REG_FILE: Field = f(37, 38);
const A1_DST_TYPE: Field = f(39, 41);
const A1_DST_SUBREG_NR: Field = f(42, 44);
const A1_DST_HSTRIDE: Field = f(45, 45);
const A1_DST_REG_NR: Field = f(46, 53);

const A1_SRC0_TYPE: Field = f(54, 56);
const A1_SRC0_VSTRIDE: Field = f(57, 58);
const A1_SRC0_HSTRIDE: Field = f(59, 60);
const A1_SRC0_SUBREG_NR: Field = f(61, 65);
const A1_SRC0_REG_NR: Field = f(66, 73);
const A1_SRC0_ABS: Field = f(74, 74);
const A1_SRC0_NEGATE: Field = f(75, 75);
const A1_SRC0_IS_IMM: Field = f(76, 76);
const A1_SRC0_IMM: Field = f(58, 73);

const A1_SRC1_TYPE: Field = f(77, 79);
const A1_SRC1_VSTRIDE: Field = f(80, 81);
const A1_SRC1_HSTRIDE: Field = f(82, 83);
const A1_SRC1_SUBREG_NR: Field = f(84, 88);
const A1_SRC1_REG_NR: Field = f(89, 96);
const A1_SRC1_ABS: Field = f(97, 97);
const A1_SRC1_NEGATE: Field = f(98, 98);

const A1_SRC2_TYPE: Field = f(99, 101);
const A1_SRC2_HSTRIDE: Field = f(102, 103);
const A1_SRC2_SUBREG_NR: Field = f(104, 108);
const A1_SRC2_REG_NR: Field = f(109, 116);
const A1_SRC2_ABS: Field = f(117, 117);
const A1_SRC2_NEGATE: Field = f(118, 118);
const A1_SRC2_IS_IMM: Field = f(119, 119);
const A1_SRC2_IMM: Field = f(103, 118);

const A1_SRC0_REG_FILE: Field = f(120, 121);
const A1_SRC1_REG_FILE: Field = f(122, 123);
const A1_SRC2_REG_FILE: Field = f(124, 125);

macro_rules! accessors {
    ($get:ident, $set:ident, $sel:expr) => {
        pub fn $get(&self, devinfo: &DeviceInfo) -> u64 {
            self.bits($sel(devinfo))
        }

        pub fn $set(&mut self, devinfo: &DeviceInfo, value: u64) {
            self.set_bits($sel(devinfo), value);
        }
    };
}

macro_rules! accessors_signed {
    ($get:ident, $set:ident, $sel:expr) => {
        pub fn $get(&self, devinfo: &DeviceInfo) -> i64 {
            self.bits_signed($sel(devinfo))
        }

        pub fn $set(&mut self, devinfo: &DeviceInfo, value: i64) {
            self.set_bits_signed($sel(devinfo), value);
        }
    };
}

macro_rules! accessors_fixed {
    ($get:ident, $set:ident, $field:expr) => {
        accessors!($get, $set, |_d: &DeviceInfo| $field);
    };
}

fn ab(devinfo: &DeviceInfo, a: Field, b: Field) -> Field {
    if is_gen12(devinfo) { b } else { a }
}

impl Inst {
    // Control fields.
    accessors!(hw_opcode, set_hw_opcode, |d| ab(d, A_OPCODE, B_OPCODE));
    accessors!(mask_control, set_mask_control, |d| ab(d, A_MASK_CONTROL, B_MASK_CONTROL));
    accessors!(nib_control, set_nib_control, |d| ab(d, A_NIB_CONTROL, B_NIB_CONTROL));
    accessors!(qtr_control, set_qtr_control, |d| ab(d, A_QTR_CONTROL, B_QTR_CONTROL));
    accessors!(pred_control, set_pred_control, |d| ab(d, A_PRED_CONTROL, B_PRED_CONTROL));
    accessors!(pred_inv, set_pred_inv, |d| ab(d, A_PRED_INV, B_PRED_INV));
    accessors!(exec_size, set_exec_size, |d| ab(d, A_EXEC_SIZE, B_EXEC_SIZE));
    accessors!(cond_modifier, set_cond_modifier, |d| ab(d, A_COND_MODIFIER, B_COND_MODIFIER));
    accessors!(cmpt_control, set_cmpt_control, |d| ab(d, A_CMPT_CONTROL, B_CMPT_CONTROL));
    accessors!(saturate, set_saturate, |d| ab(d, A_SATURATE, B_SATURATE));
    accessors!(flag_subreg_nr, set_flag_subreg_nr, |d| ab(d, A_FLAG_SUBREG_NR, B_FLAG_SUBREG_NR));
    accessors!(flag_reg_nr, set_flag_reg_nr, |d| ab(d, A_FLAG_REG_NR, B_FLAG_REG_NR));

    /// The extended-math function selector and the send SFID share the
    /// condition-modifier bits.
    pub fn math_function(&self, devinfo: &DeviceInfo) -> u64 {
        self.cond_modifier(devinfo)
    }

    pub fn set_math_function(&mut self, devinfo: &DeviceInfo, value: u64) {
        self.set_cond_modifier(devinfo, value);
    }

    pub fn sfid(&self, devinfo: &DeviceInfo) -> u64 {
        self.cond_modifier(devinfo)
    }

    pub fn set_sfid(&mut self, devinfo: &DeviceInfo, value: u64) {
        self.set_cond_modifier(devinfo, value);
    }

    /// Access mode: the bit exists only before Gen12; afterwards every
    /// instruction is align1.
    pub fn access_mode(&self, devinfo: &DeviceInfo) -> u64 {
        if is_gen12(devinfo) { 0 } else { self.bits(A_ACCESS_MODE) }
    }

    pub fn set_access_mode(&mut self, devinfo: &DeviceInfo, value: u64) {
        if is_gen12(devinfo) {
            assert!(value == 0, "align16 does not exist from Gen12 on");
        } else {
            self.set_bits(A_ACCESS_MODE, value);
        }
    }

    pub fn no_dd_clear(&self, devinfo: &DeviceInfo) -> u64 {
        if is_gen12(devinfo) { 0 } else { self.bits(A_NO_DD_CLEAR) }
    }

    pub fn set_no_dd_clear(&mut self, devinfo: &DeviceInfo, value: u64) {
        assert!(!is_gen12(devinfo), "dependency control bits are gone from Gen12 on");
        self.set_bits(A_NO_DD_CLEAR, value);
    }

    pub fn no_dd_check(&self, devinfo: &DeviceInfo) -> u64 {
        if is_gen12(devinfo) { 0 } else { self.bits(A_NO_DD_CHECK) }
    }

    pub fn set_no_dd_check(&mut self, devinfo: &DeviceInfo, value: u64) {
        assert!(!is_gen12(devinfo), "dependency control bits are gone from Gen12 on");
        self.set_bits(A_NO_DD_CHECK, value);
    }

    pub fn thread_control(&self, devinfo: &DeviceInfo) -> u64 {
        if is_gen12(devinfo) { 0 } else { self.bits(A_THREAD_CONTROL) }
    }

    pub fn set_thread_control(&mut self, devinfo: &DeviceInfo, value: u64) {
        assert!(!is_gen12(devinfo));
        self.set_bits(A_THREAD_CONTROL, value);
    }

    pub fn acc_wr_control(&self, devinfo: &DeviceInfo) -> u64 {
        if devinfo.ver >= 6 && !is_gen12(devinfo) { self.bits(A_ACC_WR_CONTROL) } else { 0 }
    }

    pub fn set_acc_wr_control(&mut self, devinfo: &DeviceInfo, value: u64) {
        assert!(devinfo.ver >= 6 && !is_gen12(devinfo), "no AccWrEn on this generation");
        self.set_bits(A_ACC_WR_CONTROL, value);
    }

    pub fn branch_control(&self, devinfo: &DeviceInfo) -> u64 {
        if devinfo.has_branch_ctrl { self.bits(A_BRANCH_CONTROL) } else { 0 }
    }

    pub fn set_branch_control(&mut self, devinfo: &DeviceInfo, value: u64) {
        assert!(devinfo.has_branch_ctrl);
        self.set_bits(A_BRANCH_CONTROL, value);
    }

    pub fn swsb(&self, devinfo: &DeviceInfo) -> u64 {
        debug_assert!(devinfo.has_swsb);
        self.bits(B_SWSB)
    }

    pub fn set_swsb(&mut self, devinfo: &DeviceInfo, value: u64) {
        assert!(devinfo.has_swsb, "SWSB annotations require ver >= 12");
        self.set_bits(B_SWSB, value);
    }

    /// Channel group, assembled from the quarter- and nibble-control
    /// fields.
    pub fn group(&self, devinfo: &DeviceInfo) -> u64 {
        self.qtr_control(devinfo) * 8 + self.nib_control(devinfo) * 4
    }

    pub fn set_group(&mut self, devinfo: &DeviceInfo, group: u64) {
        debug_assert!(group % 4 == 0 && group < 32);
        self.set_qtr_control(devinfo, group / 8);
        self.set_nib_control(devinfo, (group / 4) % 2);
    }

    // Destination fields.
    accessors!(dst_reg_file, set_dst_reg_file, |d| ab(d, A_DST_REG_FILE, B_DST_REG_FILE));
    accessors!(dst_reg_hw_type, set_dst_reg_hw_type, |d| ab(d, A_DST_REG_HW_TYPE, B_DST_REG_HW_TYPE));
    accessors!(dst_address_mode, set_dst_address_mode, |d| ab(d, A_DST_ADDRESS_MODE, B_DST_ADDRESS_MODE));
    accessors!(dst_hstride, set_dst_hstride, |d| ab(d, A_DST_HSTRIDE, B_DST_HSTRIDE));
    accessors!(dst_da_reg_nr, set_dst_da_reg_nr, |d| ab(d, A_DST_DA_REG_NR, B_DST_DA_REG_NR));
    accessors!(dst_ia_subreg_nr, set_dst_ia_subreg_nr, |d| ab(d, A_DST_IA_SUBREG_NR, B_DST_IA_SUBREG_NR));
    accessors!(dst_da1_subreg_nr, set_dst_da1_subreg_nr, |d| ab(d, A_DST_DA1_SUBREG_NR, B_DST_DA1_SUBREG_NR));
    accessors_signed!(dst_ia1_addr_imm, set_dst_ia1_addr_imm, |d| ab(d, A_DST_IA1_ADDR_IMM, B_DST_IA1_ADDR_IMM));
    accessors_fixed!(dst_da16_subreg_nr, set_dst_da16_subreg_nr, A_DST_DA16_SUBREG_NR);
    accessors_fixed!(dst_da16_writemask, set_dst_da16_writemask, A_DST_DA16_WRITEMASK);
    accessors_signed!(dst_ia16_addr_imm, set_dst_ia16_addr_imm, |_d| A_DST_IA16_ADDR_IMM);

    // Source fields.
    accessors!(src0_reg_file, set_src0_reg_file, |d| ab(d, A_SRC0_REG_FILE, B_SRC0_REG_FILE));
    accessors!(src0_reg_hw_type, set_src0_reg_hw_type, |d| ab(d, A_SRC0_REG_HW_TYPE, B_SRC0_REG_HW_TYPE));
    accessors!(src0_address_mode, set_src0_address_mode, |d| ab(d, A_SRC0_ADDRESS_MODE, B_SRC0_ADDRESS_MODE));
    accessors!(src0_negate, set_src0_negate, |d| ab(d, A_SRC0_NEGATE, B_SRC0_NEGATE));
    accessors!(src0_abs, set_src0_abs, |d| ab(d, A_SRC0_ABS, B_SRC0_ABS));
    accessors!(src0_da_reg_nr, set_src0_da_reg_nr, |d| ab(d, A_SRC0_DA_REG_NR, B_SRC0_DA_REG_NR));
    accessors!(src0_ia_subreg_nr, set_src0_ia_subreg_nr, |d| ab(d, A_SRC0_IA_SUBREG_NR, B_SRC0_IA_SUBREG_NR));
    accessors!(src0_da1_subreg_nr, set_src0_da1_subreg_nr, |d| ab(d, A_SRC0_DA1_SUBREG_NR, B_SRC0_DA1_SUBREG_NR));
    accessors!(src0_hstride, set_src0_hstride, |d| ab(d, A_SRC0_HSTRIDE, B_SRC0_HSTRIDE));
    accessors!(src0_width, set_src0_width, |d| ab(d, A_SRC0_WIDTH, B_SRC0_WIDTH));
    accessors!(src0_vstride, set_src0_vstride, |d| ab(d, A_SRC0_VSTRIDE, B_SRC0_VSTRIDE));
    accessors_signed!(src0_ia1_addr_imm, set_src0_ia1_addr_imm, |d| ab(d, A_SRC0_IA1_ADDR_IMM, B_SRC0_IA1_ADDR_IMM));
    accessors_fixed!(src0_da16_subreg_nr, set_src0_da16_subreg_nr, A_SRC0_DA16_SUBREG_NR);
    accessors_fixed!(src0_da16_swizzle, set_src0_da16_swizzle, A_SRC0_DA16_SWIZZLE);
    accessors_signed!(src0_ia16_addr_imm, set_src0_ia16_addr_imm, |_d| A_SRC0_IA16_ADDR_IMM);

    accessors!(src1_reg_file, set_src1_reg_file, |d| ab(d, A_SRC1_REG_FILE, B_SRC1_REG_FILE));
    accessors!(src1_reg_hw_type, set_src1_reg_hw_type, |d| ab(d, A_SRC1_REG_HW_TYPE, B_SRC1_REG_HW_TYPE));
    accessors_fixed!(src1_address_mode, set_src1_address_mode, A_SRC1_ADDRESS_MODE);
    accessors_fixed!(src1_negate, set_src1_negate, A_SRC1_NEGATE);
    accessors_fixed!(src1_abs, set_src1_abs, A_SRC1_ABS);
    accessors_fixed!(src1_da_reg_nr, set_src1_da_reg_nr, A_SRC1_DA_REG_NR);
    accessors_fixed!(src1_ia_subreg_nr, set_src1_ia_subreg_nr, A_SRC1_IA_SUBREG_NR);
    accessors_fixed!(src1_da1_subreg_nr, set_src1_da1_subreg_nr, A_SRC1_DA1_SUBREG_NR);
    accessors_fixed!(src1_hstride, set_src1_hstride, A_SRC1_HSTRIDE);
    accessors_fixed!(src1_width, set_src1_width, A_SRC1_WIDTH);
    accessors_fixed!(src1_vstride, set_src1_vstride, A_SRC1_VSTRIDE);
    accessors_signed!(src1_ia1_addr_imm, set_src1_ia1_addr_imm, |_d| A_SRC1_IA1_ADDR_IMM);
    accessors_fixed!(src1_da16_subreg_nr, set_src1_da16_subreg_nr, A_SRC1_DA16_SUBREG_NR);
    accessors_fixed!(src1_da16_swizzle, set_src1_da16_swizzle, A_SRC1_DA16_SWIZZLE);
    accessors_signed!(src1_ia16_addr_imm, set_src1_ia16_addr_imm, |_d| A_SRC1_IA16_ADDR_IMM);

    // Immediates.
    accessors_fixed!(imm_ud, set_imm_ud, IMM32);
    accessors_fixed!(imm_uq, set_imm_uq, IMM64);

    pub fn imm_d(&self, devinfo: &DeviceInfo) -> i64 {
        let _ = devinfo;
        self.bits_signed(IMM32)
    }

    // Branch fields.
    accessors_signed!(gfx4_jump_count, set_gfx4_jump_count, |_d| GFX4_JUMP_COUNT);
    accessors_fixed!(gfx4_pop_count, set_gfx4_pop_count, GFX4_POP_COUNT);
    accessors_signed!(gfx6_jump_count, set_gfx6_jump_count, |_d| GFX6_JUMP_COUNT);

    pub fn jip(&self, devinfo: &DeviceInfo) -> i64 {
        if devinfo.ver >= 8 { self.bits_signed(JIP32) } else { self.bits_signed(JIP16) }
    }

    pub fn set_jip(&mut self, devinfo: &DeviceInfo, value: i64) {
        assert!(devinfo.ver >= 6, "no JIP field before Gen6");
        if devinfo.ver >= 8 {
            self.set_bits_signed(JIP32, value);
        } else {
            self.set_bits_signed(JIP16, value);
        }
    }

    pub fn uip(&self, devinfo: &DeviceInfo) -> i64 {
        if devinfo.ver >= 8 { self.bits_signed(UIP32) } else { self.bits_signed(UIP16) }
    }

    pub fn set_uip(&mut self, devinfo: &DeviceInfo, value: i64) {
        assert!(devinfo.ver >= 6, "no UIP field before Gen6");
        if devinfo.ver >= 8 {
            self.set_bits_signed(UIP32, value);
        } else {
            self.set_bits_signed(UIP16, value);
        }
    }

    // Send descriptor fields.
    accessors_fixed!(send_desc, set_send_desc, SEND_DESC);
    accessors_fixed!(eot, set_eot, SEND_EOT);
    accessors_fixed!(mlen, set_mlen, SEND_DESC_MLEN);
    accessors_fixed!(rlen, set_rlen, SEND_DESC_RLEN);
    accessors_fixed!(header_present, set_header_present, SEND_DESC_HEADER);
    accessors_fixed!(send_sel_reg32_desc, set_send_sel_reg32_desc, SEND_SEL_REG32_DESC);
    accessors_fixed!(send_sel_reg32_ex_desc, set_send_sel_reg32_ex_desc, SEND_SEL_REG32_EX_DESC);
    accessors_fixed!(send_src1_reg_nr, set_send_src1_reg_nr, SEND_SRC1_REG_NR);
    accessors_fixed!(send_src1_reg_file, set_send_src1_reg_file, SEND_SRC1_REG_FILE);
    accessors_fixed!(send_ex_mlen, set_send_ex_mlen, SEND_EX_MLEN);

    /// Split sends encode the payload file in the ordinary source-file
    /// slot.
    pub fn send_src0_reg_file(&self, devinfo: &DeviceInfo) -> u64 {
        self.src0_reg_file(devinfo)
    }

    pub fn set_send_src0_reg_file(&mut self, devinfo: &DeviceInfo, value: u64) {
        self.set_src0_reg_file(devinfo, value);
    }

    // Align16 three-source fields.
    accessors_fixed!(a16_flag_subreg_nr, set_a16_flag_subreg_nr, A16_FLAG_SUBREG_NR);
    accessors_fixed!(a16_flag_reg_nr, set_a16_flag_reg_nr, A16_FLAG_REG_NR);
    accessors_fixed!(a16_dst_reg_file, set_a16_dst_reg_file, A16_DST_REG_FILE);
    accessors_fixed!(a16_dst_reg_nr, set_a16_dst_reg_nr, A16_DST_REG_NR);
    accessors_fixed!(a16_dst_subreg_nr, set_a16_dst_subreg_nr, A16_DST_SUBREG_NR);
    accessors_fixed!(a16_dst_writemask, set_a16_dst_writemask, A16_DST_WRITEMASK);
    accessors_fixed!(a16_dst_type, set_a16_dst_type, A16_DST_TYPE);
    accessors_fixed!(a16_src_type, set_a16_src_type, A16_SRC_TYPE);
    accessors_fixed!(a16_src1_type_hf, set_a16_src1_type_hf, A16_SRC1_TYPE_HF);
    accessors_fixed!(a16_src2_type_hf, set_a16_src2_type_hf, A16_SRC2_TYPE_HF);

    pub fn a16_src_swizzle(&self, s: usize) -> u64 {
        self.bits(a16_src(A16_SRC_BASE[s], 0, 7))
    }

    pub fn set_a16_src_swizzle(&mut self, s: usize, v: u64) {
        self.set_bits(a16_src(A16_SRC_BASE[s], 0, 7), v);
    }

    pub fn a16_src_subreg_nr(&self, s: usize) -> u64 {
        self.bits(a16_src(A16_SRC_BASE[s], 8, 10))
    }

    pub fn set_a16_src_subreg_nr(&mut self, s: usize, v: u64) {
        self.set_bits(a16_src(A16_SRC_BASE[s], 8, 10), v);
    }

    pub fn a16_src_rep_ctrl(&self, s: usize) -> u64 {
        self.bits(a16_src(A16_SRC_BASE[s], 11, 11))
    }

    pub fn set_a16_src_rep_ctrl(&mut self, s: usize, v: u64) {
        self.set_bits(a16_src(A16_SRC_BASE[s], 11, 11), v);
    }

    pub fn a16_src_reg_nr(&self, s: usize) -> u64 {
        self.bits(a16_src(A16_SRC_BASE[s], 12, 19))
    }

    pub fn set_a16_src_reg_nr(&mut self, s: usize, v: u64) {
        self.set_bits(a16_src(A16_SRC_BASE[s], 12, 19), v);
    }

    pub fn a16_src_abs(&self, s: usize) -> u64 {
        self.bits(a16_src(A16_SRC_BASE[s], 20, 20))
    }

    pub fn set_a16_src_abs(&mut self, s: usize, v: u64) {
        self.set_bits(a16_src(A16_SRC_BASE[s], 20, 20), v);
    }

    pub fn a16_src_negate(&self, s: usize) -> u64 {
        self.bits(a16_src(A16_SRC_BASE[s], 21, 21))
    }

    pub fn set_a16_src_negate(&mut self, s: usize, v: u64) {
        self.set_bits(a16_src(A16_SRC_BASE[s], 21, 21), v);
    }

    // Align1 three-source fields.
    accessors_fixed!(a1_exec_type, set_a1_exec_type, A1_EXEC_TYPE);
    accessors_fixed!(a1_dst_reg_file, set_a1_dst_reg_file, A1_DST_REG_FILE);
    accessors_fixed!(a1_dst_type, set_a1_dst_type, A1_DST_TYPE);
    accessors_fixed!(a1_dst_subreg_nr, set_a1_dst_subreg_nr, A1_DST_SUBREG_NR);
    accessors_fixed!(a1_dst_hstride, set_a1_dst_hstride, A1_DST_HSTRIDE);
    accessors_fixed!(a1_dst_reg_nr, set_a1_dst_reg_nr, A1_DST_REG_NR);

    accessors_fixed!(a1_src0_type, set_a1_src0_type, A1_SRC0_TYPE);
    accessors_fixed!(a1_src0_vstride, set_a1_src0_vstride, A1_SRC0_VSTRIDE);
    accessors_fixed!(a1_src0_hstride, set_a1_src0_hstride, A1_SRC0_HSTRIDE);
    accessors_fixed!(a1_src0_subreg_nr, set_a1_src0_subreg_nr, A1_SRC0_SUBREG_NR);
    accessors_fixed!(a1_src0_reg_nr, set_a1_src0_reg_nr, A1_SRC0_REG_NR);
    accessors_fixed!(a1_src0_abs, set_a1_src0_abs, A1_SRC0_ABS);
    accessors_fixed!(a1_src0_negate, set_a1_src0_negate, A1_SRC0_NEGATE);
    accessors_fixed!(a1_src0_is_imm, set_a1_src0_is_imm, A1_SRC0_IS_IMM);
    accessors_fixed!(a1_src0_imm, set_a1_src0_imm, A1_SRC0_IMM);
    accessors_fixed!(a1_src0_reg_file, set_a1_src0_reg_file, A1_SRC0_REG_FILE);

    accessors_fixed!(a1_src1_type, set_a1_src1_type, A1_SRC1_TYPE);
    accessors_fixed!(a1_src1_vstride, set_a1_src1_vstride, A1_SRC1_VSTRIDE);
    accessors_fixed!(a1_src1_hstride, set_a1_src1_hstride, A1_SRC1_HSTRIDE);
    accessors_fixed!(a1_src1_subreg_nr, set_a1_src1_subreg_nr, A1_SRC1_SUBREG_NR);
    accessors_fixed!(a1_src1_reg_nr, set_a1_src1_reg_nr, A1_SRC1_REG_NR);
    accessors_fixed!(a1_src1_abs, set_a1_src1_abs, A1_SRC1_ABS);
    accessors_fixed!(a1_src1_negate, set_a1_src1_negate, A1_SRC1_NEGATE);
    accessors_fixed!(a1_src1_reg_file, set_a1_src1_reg_file, A1_SRC1_REG_FILE);

    accessors_fixed!(a1_src2_type, set_a1_src2_type, A1_SRC2_TYPE);
    accessors_fixed!(a1_src2_hstride, set_a1_src2_hstride, A1_SRC2_HSTRIDE);
    accessors_fixed!(a1_src2_subreg_nr, set_a1_src2_subreg_nr, A1_SRC2_SUBREG_NR);
    accessors_fixed!(a1_src2_reg_nr, set_a1_src2_reg_nr, A1_SRC2_REG_NR);
    accessors_fixed!(a1_src2_abs, set_a1_src2_abs, A1_SRC2_ABS);
    accessors_fixed!(a1_src2_negate, set_a1_src2_negate, A1_SRC2_NEGATE);
    accessors_fixed!(a1_src2_is_imm, set_a1_src2_is_imm, A1_SRC2_IS_IMM);
    accessors_fixed!(a1_src2_imm, set_a1_src2_imm, A1_SRC2_IMM);
    accessors_fixed!(a1_src2_reg_file, set_a1_src2_reg_file, A1_SRC2_REG_FILE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devinfo::{DeviceInfo, Platform};

    #[test]
    fn bitfield_read_write() {
        let mut inst = Inst::zeroed();
        inst.set_bits(f(4, 11), 0xa5);
        assert_eq!(inst.bits(f(4, 11)), 0xa5);
        assert_eq!(inst.bits(f(0, 3)), 0);
        assert_eq!(inst.bits(f(12, 15)), 0);

        inst.set_bits(f(4, 11), 0x3c);
        assert_eq!(inst.bits(f(4, 11)), 0x3c);
    }

    #[test]
    fn signed_fields() {
        let mut inst = Inst::zeroed();
        inst.set_bits_signed(f(96, 111), -5);
        assert_eq!(inst.bits_signed(f(96, 111)), -5);
        assert_eq!(inst.bits(f(112, 127)), 0);
    }

    #[test]
    fn field_positions_differ_across_eras() {
        let skl = DeviceInfo::new(90, Platform::Main);
        let tgl = DeviceInfo::new(120, Platform::Main);

        let mut a = Inst::zeroed();
        a.set_exec_size(&skl, 0b100);
        let mut b = Inst::zeroed();
        b.set_exec_size(&tgl, 0b100);
        assert_ne!(a.0, b.0);
        assert_eq!(a.exec_size(&skl), 0b100);
        assert_eq!(b.exec_size(&tgl), 0b100);
    }

    #[test]
    fn imm_and_src1_descriptor_do_not_collide() {
        // The gen<12 quirk writes the src1 file and type while a 32-bit
        // immediate sits in the last dword; the fields must not alias.
        let skl = DeviceInfo::new(90, Platform::Main);
        let mut inst = Inst::zeroed();
        inst.set_imm_ud(&skl, 0xdead_beef);
        inst.set_src1_reg_file(&skl, 0);
        inst.set_src1_reg_hw_type(&skl, 7);
        assert_eq!(inst.imm_ud(&skl), 0xdead_beef);
    }

    #[test]
    fn swsb_requires_gen12() {
        let tgl = DeviceInfo::new(120, Platform::Main);
        let mut inst = Inst::zeroed();
        inst.set_swsb(&tgl, 0x85);
        assert_eq!(inst.swsb(&tgl), 0x85);
    }

    #[test]
    fn jip_width_by_generation() {
        let ivb = DeviceInfo::new(70, Platform::Main);
        let bdw = DeviceInfo::new(80, Platform::Main);
        let mut inst = Inst::zeroed();
        inst.set_jip(&ivb, -2);
        assert_eq!(inst.jip(&ivb), -2);
        let mut inst = Inst::zeroed();
        inst.set_jip(&bdw, -0x1_0000);
        assert_eq!(inst.jip(&bdw), -0x1_0000);
    }
}
