//! Binary instruction validation.
//!
//! The validator re-derives legality purely from encoded bits, through
//! the same accessors the builder used to write them, and is run
//! against arbitrary input: fuzzed, corrupt, or hostile bytes must be
//! classified as invalid, never panicked on. Reserved or out-of-range
//! field patterns therefore decode to *some* value that a later check
//! rejects.
//!
//! Each instruction runs a battery of conjunctive checks; errors
//! accumulate into a diagnostics list the way the code-verifier
//! collects located errors, and the overall result is a plain boolean.

use log::debug;

use crate::devinfo::DeviceInfo;
use crate::inst::{Inst, COMPACT_INST_SIZE, INST_SIZE};
use crate::opcode::{IsaInfo, Opcode};
use crate::regs::{decode_stride, decode_width, AccessMode, AddressMode, RegFile, ARF_ACCUMULATOR, ARF_NULL};
use crate::types::{
    hw_to_a16_3src_type, hw_to_a1_3src_type, hw_type_to_reg_type, ExecType, RegType,
};

/// Located validation errors, optionally collected next to the boolean
/// verdict.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub entries: Vec<(usize, String)>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }
}

macro_rules! error_if {
    ($errs:expr, $cond:expr, $msg:expr) => {
        if $cond {
            let msg: &str = $msg;
            if !$errs.iter().any(|e| e == msg) {
                $errs.push(msg.to_string());
            }
        }
    };
}

struct Ctx<'a> {
    isa: &'a IsaInfo,
    devinfo: DeviceInfo,
}

impl<'a> Ctx<'a> {
    fn opcode(&self, inst: &Inst) -> Option<Opcode> {
        self.isa.opcode(inst)
    }

    fn num_sources(&self, inst: &Inst) -> u32 {
        self.isa.num_sources(inst).unwrap_or(0) as u32
    }

    fn is_send(&self, inst: &Inst) -> bool {
        matches!(
            self.opcode(inst),
            Some(Opcode::Send) | Some(Opcode::Sendc) | Some(Opcode::Sends) | Some(Opcode::Sendsc)
        )
    }

    fn is_split_send(&self, inst: &Inst) -> bool {
        if self.devinfo.ver >= 12 {
            self.is_send(inst)
        } else {
            matches!(self.opcode(inst), Some(Opcode::Sends) | Some(Opcode::Sendsc))
        }
    }

    fn access_mode(&self, inst: &Inst) -> AccessMode {
        AccessMode::from_hw(inst.access_mode(&self.devinfo) as u32)
    }

    fn exec_size_channels(&self, inst: &Inst) -> u32 {
        1 << inst.exec_size(&self.devinfo) as u32
    }

    fn dst_file(&self, inst: &Inst) -> Option<RegFile> {
        RegFile::from_hw(inst.dst_reg_file(&self.devinfo) as u32)
    }

    fn src_file(&self, inst: &Inst, s: u32) -> Option<RegFile> {
        let hw = if s == 0 {
            inst.src0_reg_file(&self.devinfo)
        } else {
            inst.src1_reg_file(&self.devinfo)
        };
        RegFile::from_hw(hw as u32)
    }

    /// Decoded destination type. Sends on Gen12+ have no destination
    /// type field; treat them as writing dwords.
    fn dst_type(&self, inst: &Inst) -> Option<RegType> {
        if self.devinfo.ver >= 12 && self.is_send(inst) {
            return Some(RegType::D);
        }
        let file = self.dst_file(inst)?;
        let table_file = if file == RegFile::Imm { RegFile::Imm } else { RegFile::Grf };
        hw_type_to_reg_type(&self.devinfo, table_file, inst.dst_reg_hw_type(&self.devinfo) as u32)
    }

    fn src_type(&self, inst: &Inst, s: u32) -> Option<RegType> {
        let file = self.src_file(inst, s)?;
        let table_file = if file == RegFile::Imm { RegFile::Imm } else { RegFile::Grf };
        let hw = if s == 0 {
            inst.src0_reg_hw_type(&self.devinfo)
        } else {
            inst.src1_reg_hw_type(&self.devinfo)
        };
        hw_type_to_reg_type(&self.devinfo, table_file, hw as u32)
    }

    fn dst_is_null(&self, inst: &Inst) -> bool {
        self.dst_file(inst) == Some(RegFile::Arf)
            && inst.dst_da_reg_nr(&self.devinfo) as u32 == ARF_NULL
    }

    fn src_is_null(&self, inst: &Inst, s: u32) -> bool {
        let (file, mode, nr) = if s == 0 {
            (
                self.src_file(inst, 0),
                inst.src0_address_mode(&self.devinfo),
                inst.src0_da_reg_nr(&self.devinfo) as u32,
            )
        } else {
            (
                self.src_file(inst, 1),
                inst.src1_address_mode(&self.devinfo),
                inst.src1_da_reg_nr(&self.devinfo) as u32,
            )
        };
        mode == 0 && file == Some(RegFile::Arf) && nr == ARF_NULL
    }

    fn src_is_acc(&self, inst: &Inst, s: u32) -> bool {
        let (file, nr) = if s == 0 {
            (self.src_file(inst, 0), inst.src0_da_reg_nr(&self.devinfo) as u32)
        } else {
            (self.src_file(inst, 1), inst.src1_da_reg_nr(&self.devinfo) as u32)
        };
        file == Some(RegFile::Arf) && (nr & 0xf0) == ARF_ACCUMULATOR
    }

    fn src_region(&self, inst: &Inst, s: u32) -> (u32, u32, u32, u32) {
        // (vstride, width, hstride, subreg) in elements/bytes.
        if s == 0 {
            (
                decode_stride(inst.src0_vstride(&self.devinfo) as u32),
                decode_width(inst.src0_width(&self.devinfo) as u32),
                decode_stride(inst.src0_hstride(&self.devinfo) as u32),
                inst.src0_da1_subreg_nr(&self.devinfo) as u32,
            )
        } else {
            (
                decode_stride(inst.src1_vstride(&self.devinfo) as u32),
                decode_width(inst.src1_width(&self.devinfo) as u32),
                decode_stride(inst.src1_hstride(&self.devinfo) as u32),
                inst.src1_da1_subreg_nr(&self.devinfo) as u32,
            )
        }
    }

    fn dst_stride(&self, inst: &Inst) -> u32 {
        decode_stride(inst.dst_hstride(&self.devinfo) as u32)
    }

    fn has_dst(&self, inst: &Inst) -> bool {
        self.isa
            .desc_by_hw(inst.hw_opcode(&self.devinfo) as u32)
            .map_or(false, |d| d.ndst != 0)
    }

    fn is_raw_move(&self, inst: &Inst) -> bool {
        if self.opcode(inst) != Some(Opcode::Mov) || inst.saturate(&self.devinfo) != 0 {
            return false;
        }
        let (Some(dst_type), Some(src_type)) = (self.dst_type(inst), self.src_type(inst, 0)) else {
            return false;
        };
        if self.src_file(inst, 0) == Some(RegFile::Imm) {
            if matches!(src_type, RegType::Vf | RegType::V | RegType::Uv) {
                return false;
            }
        } else if inst.src0_negate(&self.devinfo) != 0 || inst.src0_abs(&self.devinfo) != 0 {
            return false;
        }
        dst_type.to_signed() == src_type.to_signed()
    }

    fn uses_src_acc(&self, inst: &Inst) -> bool {
        match self.opcode(inst) {
            Some(Opcode::Mac) | Some(Opcode::Mach) | Some(Opcode::Sada2) => return true,
            _ => {}
        }
        self.src_is_acc(inst, 0) || (self.num_sources(inst) > 1 && self.src_is_acc(inst, 1))
    }
}

fn types_are_mixed_float(t0: RegType, t1: RegType) -> bool {
    (t0 == RegType::F && t1 == RegType::Hf) || (t1 == RegType::F && t0 == RegType::Hf)
}

fn execution_type_for_type(t: RegType) -> RegType {
    match t {
        RegType::Nf | RegType::Df | RegType::F | RegType::Hf => t,
        RegType::Vf => RegType::F,
        RegType::Q | RegType::Uq => RegType::Q,
        RegType::D | RegType::Ud => RegType::D,
        RegType::W | RegType::Uw | RegType::B | RegType::Ub | RegType::V | RegType::Uv => RegType::W,
    }
}

/// The widest participating type, after the mixed-float promotion
/// rules.
fn execution_type(ctx: &Ctx<'_>, inst: &Inst) -> Option<RegType> {
    let num_sources = ctx.num_sources(inst);
    let dst_exec_type = ctx.dst_type(inst)?;

    let src0_exec_type = execution_type_for_type(ctx.src_type(inst, 0)?);
    if num_sources == 1 {
        if src0_exec_type == RegType::Hf {
            return Some(dst_exec_type);
        }
        return Some(src0_exec_type);
    }

    let src1_exec_type = execution_type_for_type(ctx.src_type(inst, 1)?);
    if types_are_mixed_float(src0_exec_type, src1_exec_type)
        || types_are_mixed_float(src0_exec_type, dst_exec_type)
        || types_are_mixed_float(src1_exec_type, dst_exec_type)
    {
        return Some(RegType::F);
    }

    if src0_exec_type == src1_exec_type {
        return Some(src0_exec_type);
    }

    if src0_exec_type == RegType::Nf || src1_exec_type == RegType::Nf {
        return Some(RegType::Nf);
    }

    // Mixed types with a float participant execute as float only on the
    // earliest generations.
    if ctx.devinfo.ver < 6 && (src0_exec_type == RegType::F || src1_exec_type == RegType::F) {
        return Some(RegType::F);
    }

    for t in [RegType::Q, RegType::D, RegType::W, RegType::Df] {
        if src0_exec_type == t || src1_exec_type == t {
            return Some(t);
        }
    }
    None
}

/// Packed: adjacent elements, no gaps, no replication.
fn is_packed(vstride: u32, width: u32, hstride: u32) -> bool {
    if vstride == width {
        if vstride == 1 {
            return hstride == 0;
        }
        return hstride == 1;
    }
    false
}

fn is_half_float_conversion(ctx: &Ctx<'_>, inst: &Inst) -> bool {
    let Some(dst_type) = ctx.dst_type(inst) else { return false };
    let Some(src0_type) = ctx.src_type(inst, 0) else { return false };

    if dst_type != src0_type && (dst_type == RegType::Hf || src0_type == RegType::Hf) {
        return true;
    }
    if ctx.num_sources(inst) > 1 {
        if let Some(src1_type) = ctx.src_type(inst, 1) {
            return dst_type != src1_type && (dst_type == RegType::Hf || src1_type == RegType::Hf);
        }
    }
    false
}

fn is_byte_conversion(ctx: &Ctx<'_>, inst: &Inst) -> bool {
    let Some(dst_type) = ctx.dst_type(inst) else { return false };
    let Some(src0_type) = ctx.src_type(inst, 0) else { return false };

    if dst_type != src0_type && (dst_type.size_bytes() == 1 || src0_type.size_bytes() == 1) {
        return true;
    }
    if ctx.num_sources(inst) > 1 {
        if let Some(src1_type) = ctx.src_type(inst, 1) {
            return dst_type != src1_type
                && (dst_type.size_bytes() == 1 || src1_type.size_bytes() == 1);
        }
    }
    false
}

fn is_mixed_float(ctx: &Ctx<'_>, inst: &Inst) -> bool {
    if ctx.devinfo.ver < 8 || ctx.is_send(inst) || !ctx.has_dst(inst) {
        return false;
    }
    let num_sources = ctx.num_sources(inst);
    if num_sources == 0 || num_sources > 2 {
        return false;
    }
    let (Some(dst_type), Some(src0_type)) = (ctx.dst_type(inst), ctx.src_type(inst, 0)) else {
        return false;
    };
    if num_sources == 1 {
        return types_are_mixed_float(src0_type, dst_type);
    }
    let Some(src1_type) = ctx.src_type(inst, 1) else { return false };
    types_are_mixed_float(src0_type, src1_type)
        || types_are_mixed_float(src0_type, dst_type)
        || types_are_mixed_float(src1_type, dst_type)
}

// ---------------------------------------------------------------------
// Check battery.
// ---------------------------------------------------------------------

fn invalid_values(ctx: &Ctx<'_>, inst: &Inst, errs: &mut Vec<String>) {
    let devinfo = &ctx.devinfo;
    let num_sources = ctx.num_sources(inst);

    error_if!(errs, inst.exec_size(devinfo) > 5, "invalid execution size");
    if !errs.is_empty() {
        return;
    }

    if devinfo.ver >= 12 {
        let group_size = ctx.exec_size_channels(inst);
        let chan_off =
            (inst.qtr_control(devinfo) * 2 + inst.nib_control(devinfo)) as u32 * 4;
        error_if!(
            errs,
            chan_off % group_size != 0,
            "the execution size must be a factor of the chosen channel offset"
        );
    }

    if ctx.is_send(inst) {
        return;
    }

    if num_sources == 3 {
        if ctx.access_mode(inst) == AccessMode::Align1 {
            if devinfo.ver >= 10 {
                let exec_type = ExecType::from_hw(inst.a1_exec_type(devinfo) as u32)
                    .unwrap_or(ExecType::Int);
                let ok = hw_to_a1_3src_type(devinfo, exec_type, inst.a1_dst_type(devinfo) as u32)
                    .is_some()
                    && hw_to_a1_3src_type(devinfo, exec_type, inst.a1_src0_type(devinfo) as u32)
                        .is_some()
                    && hw_to_a1_3src_type(devinfo, exec_type, inst.a1_src1_type(devinfo) as u32)
                        .is_some()
                    && hw_to_a1_3src_type(devinfo, exec_type, inst.a1_src2_type(devinfo) as u32)
                        .is_some();
                error_if!(errs, !ok, "invalid register type encoding");
            } else {
                error_if!(errs, true, "align1 three-source encoding does not exist before Gen10");
            }
        } else {
            let ok = hw_to_a16_3src_type(devinfo, inst.a16_dst_type(devinfo) as u32).is_some()
                && hw_to_a16_3src_type(devinfo, inst.a16_src_type(devinfo) as u32).is_some();
            error_if!(errs, !ok, "invalid register type encoding");
        }
        return;
    }

    if devinfo.ver > 6 {
        let mrf = |f: Option<RegFile>| f == Some(RegFile::Mrf);
        error_if!(
            errs,
            mrf(ctx.dst_file(inst))
                || (num_sources > 0 && mrf(ctx.src_file(inst, 0)))
                || (num_sources > 1 && mrf(ctx.src_file(inst, 1))),
            "invalid register file encoding"
        );
    }
    if !errs.is_empty() {
        return;
    }

    if ctx.has_dst(inst) {
        error_if!(errs, ctx.dst_type(inst).is_none(), "invalid register type encoding");
    }
    error_if!(
        errs,
        (num_sources > 0 && ctx.src_type(inst, 0).is_none())
            || (num_sources > 1 && ctx.src_type(inst, 1).is_none()),
        "invalid register type encoding"
    );
}

fn sources_not_null(ctx: &Ctx<'_>, inst: &Inst, errs: &mut Vec<String>) {
    let num_sources = ctx.num_sources(inst);

    // Three-source operands and split-send payloads have no file bits
    // that could encode null in the first place.
    if num_sources == 3 || ctx.is_split_send(inst) {
        return;
    }

    if num_sources >= 1 && ctx.opcode(inst) != Some(Opcode::Sync) {
        error_if!(errs, ctx.src_is_null(inst, 0), "src0 is null");
    }
    if num_sources == 2 {
        error_if!(errs, ctx.src_is_null(inst, 1), "src1 is null");
    }
}

fn alignment_supported(ctx: &Ctx<'_>, inst: &Inst, errs: &mut Vec<String>) {
    error_if!(
        errs,
        ctx.devinfo.ver >= 11 && ctx.access_mode(inst) == AccessMode::Align16,
        "align16 is not supported on this generation"
    );
}

fn send_restrictions(ctx: &Ctx<'_>, inst: &Inst, errs: &mut Vec<String>) {
    let devinfo = &ctx.devinfo;

    if ctx.is_split_send(inst) {
        error_if!(
            errs,
            inst.send_src1_reg_file(devinfo) == RegFile::Arf.to_hw() as u64
                && inst.send_src1_reg_nr(devinfo) as u32 != ARF_NULL,
            "src1 of split send must be a GRF or NULL"
        );
        error_if!(
            errs,
            inst.eot(devinfo) != 0 && inst.src0_da_reg_nr(devinfo) < 112,
            "send with EOT must use g112-g127"
        );
        error_if!(
            errs,
            inst.eot(devinfo) != 0
                && inst.send_src1_reg_file(devinfo) == RegFile::Grf.to_hw() as u64
                && inst.send_src1_reg_nr(devinfo) < 112,
            "send with EOT must use g112-g127"
        );

        if inst.send_src0_reg_file(devinfo) == RegFile::Grf.to_hw() as u64
            && inst.send_src1_reg_file(devinfo) == RegFile::Grf.to_hw() as u64
        {
            // Assume minimal payloads when the descriptors are in
            // registers.
            let mlen = if inst.send_sel_reg32_desc(devinfo) == 0 {
                inst.mlen(devinfo).max(1)
            } else {
                1
            };
            let ex_mlen = if inst.send_sel_reg32_ex_desc(devinfo) == 0 {
                inst.send_ex_mlen(devinfo).max(1)
            } else {
                1
            };
            let src0_nr = inst.src0_da_reg_nr(devinfo);
            let src1_nr = inst.send_src1_reg_nr(devinfo);
            error_if!(
                errs,
                (src0_nr <= src1_nr && src1_nr < src0_nr + mlen)
                    || (src1_nr <= src0_nr && src0_nr < src1_nr + ex_mlen),
                "split send payloads must not overlap"
            );
        }
    } else if ctx.is_send(inst) {
        error_if!(
            errs,
            inst.src0_address_mode(devinfo) != AddressMode::Direct.to_hw() as u64,
            "send must use direct addressing"
        );

        if devinfo.ver >= 7 {
            error_if!(
                errs,
                ctx.src_file(inst, 0) != Some(RegFile::Grf),
                "send from non-GRF"
            );
            error_if!(
                errs,
                inst.eot(devinfo) != 0 && inst.src0_da_reg_nr(devinfo) < 112,
                "send with EOT must use g112-g127"
            );
        }

        if devinfo.ver >= 8 {
            error_if!(
                errs,
                !ctx.dst_is_null(inst)
                    && (inst.dst_da_reg_nr(devinfo) + inst.rlen(devinfo) > 127)
                    && (inst.src0_da_reg_nr(devinfo) + inst.mlen(devinfo)
                        > inst.dst_da_reg_nr(devinfo)),
                "r127 must not be used for return address when there is a src and dest overlap"
            );
        }
    }
}

fn general_restrictions_based_on_operand_types(ctx: &Ctx<'_>, inst: &Inst, errs: &mut Vec<String>) {
    let devinfo = &ctx.devinfo;
    let num_sources = ctx.num_sources(inst);
    let exec_size = ctx.exec_size_channels(inst);

    if ctx.is_send(inst) {
        return;
    }

    if devinfo.ver >= 11 && num_sources == 3 && ctx.access_mode(inst) == AccessMode::Align1 {
        let exec_type =
            ExecType::from_hw(inst.a1_exec_type(devinfo) as u32).unwrap_or(ExecType::Int);
        let byte = |hw: u64| {
            hw_to_a1_3src_type(devinfo, exec_type, hw as u32)
                .map_or(false, |t| t.size_bytes() == 1)
        };
        error_if!(
            errs,
            byte(inst.a1_src1_type(devinfo)) || byte(inst.a1_src2_type(devinfo)),
            "byte data types are not supported for src1/src2 regioning"
        );
    }
    if devinfo.ver >= 11 && num_sources == 2 {
        error_if!(
            errs,
            ctx.src_type(inst, 1).map_or(false, |t| t.size_bytes() == 1),
            "byte data types are not supported for src1 regioning"
        );
    }

    // 64-bit types must exist on the target at all.
    let type_64bit_ok = |t: RegType| match t {
        RegType::Df => devinfo.has_64bit_float,
        RegType::Q | RegType::Uq => devinfo.has_64bit_int,
        _ => true,
    };

    let dst_type = if num_sources == 3 {
        if ctx.access_mode(inst) == AccessMode::Align1 {
            let exec_type =
                ExecType::from_hw(inst.a1_exec_type(devinfo) as u32).unwrap_or(ExecType::Int);
            hw_to_a1_3src_type(devinfo, exec_type, inst.a1_dst_type(devinfo) as u32)
        } else {
            hw_to_a16_3src_type(devinfo, inst.a16_dst_type(devinfo) as u32)
        }
    } else {
        ctx.dst_type(inst)
    };

    if let Some(t) = dst_type {
        error_if!(
            errs,
            !type_64bit_ok(t),
            "64-bit destination type, but the platform does not support it"
        );
    }

    for s in 0..num_sources {
        let src_type = if num_sources == 3 {
            if ctx.access_mode(inst) == AccessMode::Align1 {
                let exec_type =
                    ExecType::from_hw(inst.a1_exec_type(devinfo) as u32).unwrap_or(ExecType::Int);
                let hw = match s {
                    0 => inst.a1_src0_type(devinfo),
                    1 => inst.a1_src1_type(devinfo),
                    _ => inst.a1_src2_type(devinfo),
                };
                hw_to_a1_3src_type(devinfo, exec_type, hw as u32)
            } else {
                hw_to_a16_3src_type(devinfo, inst.a16_src_type(devinfo) as u32)
            }
        } else {
            ctx.src_type(inst, s)
        };
        if let Some(t) = src_type {
            error_if!(
                errs,
                !type_64bit_ok(t),
                "64-bit source type, but the platform does not support it"
            );
        }
    }

    if num_sources == 3 || exec_size == 1 || !ctx.has_dst(inst) {
        return;
    }

    let Some(dst_type) = dst_type else { return };
    let dst_stride = ctx.dst_stride(inst);
    let dst_type_is_byte = matches!(dst_type, RegType::B | RegType::Ub);

    if dst_type_is_byte {
        if is_packed(exec_size * dst_stride, exec_size, dst_stride) {
            error_if!(
                errs,
                !ctx.is_raw_move(inst),
                "only raw MOV supports a packed-byte destination"
            );
            return;
        }
    }

    let Some(exec_type) = execution_type(ctx, inst) else { return };
    let exec_type_size = exec_type.size_bytes();
    let mut dst_type_size = dst_type.size_bytes();

    // On the 7.0 parts, region parameters for double floats count
    // 32-bit halves; evaluate with the doubled destination size.
    if devinfo.verx10 == 70 && exec_type_size == 8 && dst_type_size == 4 {
        dst_type_size = 8;
    }

    if is_byte_conversion(ctx, inst) {
        let src0_sz = ctx.src_type(inst, 0).map_or(0, |t| t.size_bytes());
        let src1_sz = if num_sources > 1 {
            ctx.src_type(inst, 1).map_or(0, |t| t.size_bytes())
        } else {
            0
        };
        error_if!(
            errs,
            dst_type.size_bytes() == 1 && (src0_sz == 8 || src1_sz == 8),
            "there are no direct conversions between 64-bit types and B/UB"
        );
        error_if!(
            errs,
            dst_type.size_bytes() == 8 && (src0_sz == 1 || src1_sz == 1),
            "there are no direct conversions between 64-bit types and B/UB"
        );
    }

    if is_half_float_conversion(ctx, inst) {
        let src0_type = ctx.src_type(inst, 0);
        let src1_type = if num_sources > 1 { ctx.src_type(inst, 1) } else { None };
        let src0_sz = src0_type.map_or(0, |t| t.size_bytes());
        let src1_sz = src1_type.map_or(0, |t| t.size_bytes());

        error_if!(
            errs,
            dst_type == RegType::Hf && (src0_sz == 8 || src1_sz == 8),
            "there are no direct conversions between 64-bit types and HF"
        );
        error_if!(
            errs,
            dst_type.size_bytes() == 8
                && (src0_type == Some(RegType::Hf) || src1_type == Some(RegType::Hf)),
            "there are no direct conversions between 64-bit types and HF"
        );

        if ctx.access_mode(inst) == AccessMode::Align1 {
            let int_to_hf = dst_type == RegType::Hf
                && (src0_type.map_or(false, |t| t.is_integer())
                    || (num_sources > 1 && src1_type.map_or(false, |t| t.is_integer())));
            let hf_to_int = dst_type.is_integer()
                && (src0_type == Some(RegType::Hf)
                    || (num_sources > 1 && src1_type == Some(RegType::Hf)));
            if int_to_hf || hf_to_int {
                error_if!(
                    errs,
                    dst_stride * dst_type.size_bytes() != 4,
                    "integer/half-float conversions must be dword strided on the destination"
                );
                error_if!(
                    errs,
                    inst.dst_da1_subreg_nr(devinfo) % 4 != 0,
                    "integer/half-float conversions must be dword aligned on the destination"
                );
            } else if devinfo.ver >= 9 && dst_type == RegType::Hf {
                let subreg = inst.dst_da1_subreg_nr(devinfo);
                error_if!(
                    errs,
                    dst_stride != 2
                        && !(is_mixed_float(ctx, inst) && dst_stride == 1 && subreg % 16 == 0),
                    "conversions to HF must be word strided or mixed-float with an oword-aligned packed destination"
                );
            }
        }
    }

    // Mixed float on Gen9+ has its own regioning rules; skip the
    // general size-ratio rule there.
    let validate_ratio = !is_mixed_float(ctx, inst) || devinfo.ver < 9;

    if validate_ratio && exec_type_size > dst_type_size {
        if !(dst_type_is_byte && ctx.is_raw_move(inst)) {
            error_if!(
                errs,
                dst_stride * dst_type_size != exec_type_size,
                "destination stride must equal the ratio of the execution type size to the destination type size"
            );
        }

        if ctx.access_mode(inst) == AccessMode::Align1
            && inst.dst_address_mode(devinfo) == AddressMode::Direct.to_hw() as u64
        {
            let subreg = inst.dst_da1_subreg_nr(devinfo) as u32;
            if devinfo.verx10 >= 45 && dst_type_is_byte {
                error_if!(
                    errs,
                    subreg % exec_type_size != 0 && subreg % exec_type_size != 1,
                    "destination subregister must be aligned to the execution type size or the next lowest byte"
                );
            } else {
                error_if!(
                    errs,
                    subreg % exec_type_size != 0,
                    "destination subregister must be aligned to the execution type size"
                );
            }
        }
    }
}

fn general_restrictions_on_region_parameters(ctx: &Ctx<'_>, inst: &Inst, errs: &mut Vec<String>) {
    let devinfo = &ctx.devinfo;
    let num_sources = ctx.num_sources(inst);
    let exec_size = ctx.exec_size_channels(inst);

    if num_sources == 3 || ctx.is_split_send(inst) {
        return;
    }

    if ctx.access_mode(inst) == AccessMode::Align16 {
        if ctx.has_dst(inst) && !ctx.dst_is_null(inst) {
            error_if!(
                errs,
                inst.dst_hstride(devinfo) != 1,
                "destination horizontal stride must be 1 in align16"
            );
        }

        for s in 0..num_sources.min(2) {
            if ctx.src_file(inst, s) == Some(RegFile::Imm) {
                continue;
            }
            let vstride = if s == 0 {
                inst.src0_vstride(devinfo)
            } else {
                inst.src1_vstride(devinfo)
            };
            let ok = if devinfo.verx10 >= 75 {
                matches!(vstride, 0 | 2 | 3)
            } else {
                matches!(vstride, 0 | 3)
            };
            error_if!(errs, !ok, "in align16 only vertical strides of 0, 2, or 4 are allowed");
        }
        return;
    }

    for s in 0..num_sources.min(2) {
        if ctx.src_file(inst, s) == Some(RegFile::Imm) {
            continue;
        }
        let (vstride, width, hstride, subreg) = ctx.src_region(inst, s);
        let mut element_size = match ctx.src_type(inst, s) {
            Some(t) => t.size_bytes(),
            None => return,
        };

        // 7.0 double-float regions count 32-bit halves.
        if devinfo.verx10 == 70 && element_size == 8 {
            element_size = 4;
        }

        error_if!(errs, exec_size < width, "execution size must be at least the region width");

        if exec_size == width && hstride != 0 {
            error_if!(
                errs,
                vstride != width * hstride,
                "when execution size equals width, vertical stride must be width times horizontal stride"
            );
        }

        if width == 1 {
            error_if!(errs, hstride != 0, "a width of 1 requires a horizontal stride of 0");
        }

        if exec_size == 1 && width == 1 {
            error_if!(
                errs,
                vstride != 0 || hstride != 0,
                "scalar regions require both strides to be 0"
            );
        }

        if vstride == 0 && hstride == 0 {
            error_if!(errs, width != 1, "zero strides require a width of 1");
        }

        // Elements within one row must not cross a register boundary;
        // only the vertical stride may do that.
        if width > 0 && element_size > 0 {
            let mask = (1u128 << element_size) - 1;
            let mut rowbase = subreg;
            let rows = (exec_size / width).max(1);
            'rows: for _ in 0..rows {
                let mut access: u128 = 0;
                let mut offset = rowbase;
                for _ in 0..width {
                    access |= mask << (offset % 64);
                    offset += hstride * element_size;
                }
                rowbase += vstride * element_size;
                if (access & 0xffff_ffff) != 0 && (access >> 32) != 0 {
                    error_if!(
                        errs,
                        true,
                        "vertical stride must be used to cross register boundaries"
                    );
                    break 'rows;
                }
            }
        }
    }

    if ctx.has_dst(inst) && !ctx.dst_is_null(inst) {
        error_if!(
            errs,
            inst.dst_hstride(devinfo) == 0,
            "destination horizontal stride must not be 0"
        );
    }
}

fn special_restrictions_for_mixed_float_mode(ctx: &Ctx<'_>, inst: &Inst, errs: &mut Vec<String>) {
    let devinfo = &ctx.devinfo;
    let num_sources = ctx.num_sources(inst);
    if num_sources >= 3 || !is_mixed_float(ctx, inst) {
        return;
    }

    let exec_size = ctx.exec_size_channels(inst);
    let is_align16 = ctx.access_mode(inst) == AccessMode::Align16;
    let dst_type = ctx.dst_type(inst);
    let src0_type = ctx.src_type(inst, 0);
    let src1_type = if num_sources > 1 { ctx.src_type(inst, 1) } else { None };
    let dst_stride = ctx.dst_stride(inst);
    let dst_is_packed = is_packed(exec_size * dst_stride, exec_size, dst_stride);

    error_if!(
        errs,
        inst.src0_address_mode(devinfo) != 0
            || (num_sources > 1 && inst.src1_address_mode(devinfo) != 0),
        "indirect addressing on sources is not supported in mixed float mode"
    );

    error_if!(
        errs,
        exec_size > 8 && dst_type == Some(RegType::F),
        "mixed float mode with a 32-bit float destination is limited to SIMD8"
    );

    if is_align16 {
        // Align16 mixed float assumes packed data, so the vertical
        // stride must always be the 4 encoding.
        error_if!(
            errs,
            inst.src0_vstride(devinfo) != 3,
            "align16 mixed float mode assumes packed data"
        );
        error_if!(
            errs,
            num_sources >= 2 && inst.src1_vstride(devinfo) != 3,
            "align16 mixed float mode assumes packed data"
        );

        error_if!(errs, exec_size > 8, "align16 mixed float mode is limited to SIMD8");

        error_if!(
            errs,
            ctx.uses_src_acc(inst),
            "no accumulator read access in align16 mixed float"
        );
    } else {
        error_if!(
            errs,
            exec_size > 8 && dst_is_packed && dst_type == Some(RegType::Hf),
            "mixed float mode with a packed half-float destination is limited to SIMD8"
        );

        if ctx.opcode(inst) == Some(Opcode::Math) {
            let strided = |s: u32| {
                let (_, _, hstride, _) = ctx.src_region(inst, s);
                hstride > 1
            };
            error_if!(
                errs,
                src0_type == Some(RegType::Hf) && !strided(0),
                "mixed mode math needs strided half-float inputs"
            );
            error_if!(
                errs,
                num_sources >= 2 && src1_type == Some(RegType::Hf) && !strided(1),
                "mixed mode math needs strided half-float inputs"
            );
        }

        if dst_type == Some(RegType::Hf) && dst_stride == 1 {
            let subreg = if inst.dst_address_mode(devinfo) == 0 {
                inst.dst_da1_subreg_nr(devinfo)
            } else {
                inst.dst_ia_subreg_nr(devinfo)
            };
            error_if!(
                errs,
                subreg % 16 != 0,
                "packed half-float output in mixed mode must be oword aligned"
            );
            error_if!(
                errs,
                exec_size > 8,
                "packed half-float output in mixed mode must not cross oword boundaries"
            );

            let acc_needs_align = |s: u32| {
                ctx.src_is_acc(inst, s)
                    && matches!(ctx.src_type(inst, s), Some(RegType::F) | Some(RegType::Hf))
            };
            let src_subreg = |s: u32| {
                if s == 0 {
                    inst.src0_da1_subreg_nr(devinfo)
                } else {
                    inst.src1_da1_subreg_nr(devinfo)
                }
            };
            error_if!(
                errs,
                acc_needs_align(0) && src_subreg(0) != 0,
                "accumulator sources must be register aligned with a packed half-float destination"
            );
            error_if!(
                errs,
                num_sources > 1 && acc_needs_align(1) && src_subreg(1) != 0,
                "accumulator sources must be register aligned with a packed half-float destination"
            );
        }

        error_if!(
            errs,
            dst_type == Some(RegType::Hf) && ctx.uses_src_acc(inst) && dst_stride != 2,
            "half-float destinations with accumulator sources require a destination stride of 2"
        );
    }
}

fn region_alignment_rules(ctx: &Ctx<'_>, inst: &Inst, errs: &mut Vec<String>) {
    let devinfo = &ctx.devinfo;
    let num_sources = ctx.num_sources(inst);
    let exec_size = ctx.exec_size_channels(inst);
    let reg_size = devinfo.grf_size;

    if num_sources == 3
        || ctx.access_mode(inst) == AccessMode::Align16
        || ctx.is_send(inst)
        || !ctx.has_dst(inst)
    {
        return;
    }

    // In direct addressing, a region may touch at most two adjacent
    // registers.
    for s in 0..num_sources.min(2) {
        if ctx.src_file(inst, s) == Some(RegFile::Imm) {
            continue;
        }
        let addr_mode = if s == 0 {
            inst.src0_address_mode(devinfo)
        } else {
            inst.src1_address_mode(devinfo)
        };
        if addr_mode != 0 {
            continue;
        }
        let (vstride, width, hstride, subreg) = ctx.src_region(inst, s);
        let element_size = match ctx.src_type(inst, s) {
            Some(t) => t.size_bytes(),
            None => return,
        };
        if width == 0 {
            continue;
        }
        let rows = (exec_size / width).max(1);
        let row_extent = if width == 0 { 0 } else { (width - 1) * hstride * element_size + element_size };
        let last_row_base = subreg + (rows - 1) * vstride * element_size;
        error_if!(
            errs,
            last_row_base + row_extent > 2 * reg_size,
            "source region may not span more than 2 adjacent registers"
        );
    }

    if ctx.dst_is_null(inst) || inst.dst_address_mode(devinfo) != 0 {
        return;
    }
    let dst_stride = ctx.dst_stride(inst);
    let Some(dst_type) = ctx.dst_type(inst) else { return };
    let subreg = inst.dst_da1_subreg_nr(devinfo) as u32;
    let extent = subreg + (exec_size - 1) * dst_stride * dst_type.size_bytes() + dst_type.size_bytes();
    error_if!(
        errs,
        extent > 2 * reg_size,
        "destination region may not span more than 2 adjacent registers"
    );
}

fn vector_immediate_restrictions(ctx: &Ctx<'_>, inst: &Inst, errs: &mut Vec<String>) {
    let devinfo = &ctx.devinfo;
    let num_sources = ctx.num_sources(inst);
    if num_sources == 3 || num_sources == 0 {
        return;
    }

    let s = num_sources - 1;
    if ctx.src_file(inst, s) != Some(RegFile::Imm) {
        return;
    }
    let Some(imm_type) = ctx.src_type(inst, s) else { return };
    let Some(dst_type) = ctx.dst_type(inst) else { return };

    let dst_subreg = if ctx.access_mode(inst) == AccessMode::Align1 {
        inst.dst_da1_subreg_nr(devinfo) as u32
    } else {
        0
    };
    let dst_stride = ctx.dst_stride(inst);

    match imm_type {
        RegType::V | RegType::Uv | RegType::Vf => {
            error_if!(
                errs,
                dst_subreg % 16 != 0,
                "the destination must be 128-bit aligned to use immediate vector types"
            );
            if imm_type == RegType::Vf {
                error_if!(
                    errs,
                    dst_type.size_bytes() * dst_stride != 4,
                    "the destination must have a dword stride to use the VF type"
                );
            } else {
                error_if!(
                    errs,
                    dst_type.size_bytes() * dst_stride != 2,
                    "the destination must have a word stride to use the V or UV type"
                );
            }
        }
        _ => {}
    }
}

fn special_requirements_for_handling_double_precision_data_types(
    ctx: &Ctx<'_>,
    inst: &Inst,
    errs: &mut Vec<String>,
) {
    let devinfo = &ctx.devinfo;
    let num_sources = ctx.num_sources(inst);

    if num_sources == 3 || ctx.is_send(inst) || !ctx.has_dst(inst) {
        return;
    }

    let Some(exec_type) = execution_type(ctx, inst) else { return };
    let Some(dst_type) = ctx.dst_type(inst) else { return };
    let is_64bit = exec_type.size_bytes() == 8 || dst_type.size_bytes() == 8;
    if !is_64bit {
        return;
    }

    // The low-power parts of the Gen8/9 era support 64-bit operations
    // with a dedicated set of restrictions.
    let lowpower = devinfo.platform == crate::devinfo::Platform::LowPower
        && (8..=9).contains(&devinfo.ver);
    if !lowpower {
        return;
    }

    error_if!(
        errs,
        inst.no_dd_clear(devinfo) != 0 || inst.no_dd_check(devinfo) != 0,
        "DepCtrl is not allowed with 64-bit types on this platform"
    );

    let indirect = inst.dst_address_mode(devinfo) != 0
        || inst.src0_address_mode(devinfo) != 0
        || (num_sources > 1 && inst.src1_address_mode(devinfo) != 0);
    error_if!(
        errs,
        indirect,
        "indirect addressing is not allowed with 64-bit types on this platform"
    );

    let arf_not_null = |file: Option<RegFile>, nr: u32| {
        file == Some(RegFile::Arf) && (nr & 0xf0) != ARF_NULL
    };
    let mut arf = arf_not_null(ctx.dst_file(inst), inst.dst_da_reg_nr(devinfo) as u32);
    arf |= arf_not_null(ctx.src_file(inst, 0), inst.src0_da_reg_nr(devinfo) as u32)
        && ctx.src_file(inst, 0) != Some(RegFile::Imm);
    if num_sources > 1 {
        arf |= arf_not_null(ctx.src_file(inst, 1), inst.src1_da_reg_nr(devinfo) as u32)
            && ctx.src_file(inst, 1) != Some(RegFile::Imm);
    }
    error_if!(
        errs,
        arf,
        "architecture registers other than null are not allowed with 64-bit types on this platform"
    );

    // Source and destination strides must address the same qword halves.
    let dst_span = ctx.dst_stride(inst) * dst_type.size_bytes();
    for s in 0..num_sources.min(2) {
        if ctx.src_file(inst, s) == Some(RegFile::Imm) {
            continue;
        }
        let (_, _, hstride, _) = ctx.src_region(inst, s);
        let Some(src_type) = ctx.src_type(inst, s) else { return };
        let src_span = hstride * src_type.size_bytes();
        error_if!(
            errs,
            src_span != 0 && dst_span != 0 && src_span != dst_span,
            "source and destination strides must address the same qword halves for 64-bit types"
        );
    }
}

fn instruction_restrictions(ctx: &Ctx<'_>, inst: &Inst, errs: &mut Vec<String>) {
    let devinfo = &ctx.devinfo;

    if devinfo.ver >= 12 && ctx.opcode(inst) == Some(Opcode::Mul) {
        let exec_type = execution_type(ctx, inst);
        let modifier_free = |s: u32| {
            let (negate, abs) = if s == 0 {
                (inst.src0_negate(devinfo), inst.src0_abs(devinfo))
            } else {
                (inst.src1_negate(devinfo), inst.src1_abs(devinfo))
            };
            ctx.src_type(inst, s).map_or(true, |t| t.size_bytes() == 4)
                || ctx.src_file(inst, s) == Some(RegFile::Imm)
                || (negate == 0 && abs == 0)
        };
        let int_dword = exec_type
            .map_or(false, |t| !t.is_floating_point() && t.size_bytes() == 4);
        error_if!(
            errs,
            int_dword && !(modifier_free(0) && modifier_free(1)),
            "source modifiers are not supported when multiplying a dword by a lower precision integer"
        );
    }

    if matches!(ctx.opcode(inst), Some(Opcode::Cmp) | Some(Opcode::Cmpn)) {
        if devinfo.ver <= 7 {
            error_if!(
                errs,
                ctx.dst_file(inst) == Some(RegFile::Arf)
                    && inst.dst_da_reg_nr(devinfo) as u32 != ARF_NULL,
                "the accumulator cannot be the destination of a compare"
            );
        }
        if devinfo.ver == 7 {
            error_if!(
                errs,
                ctx.dst_is_null(inst) && inst.thread_control(devinfo) != 1,
                "a compare with a null destination must use the switch thread control"
            );
        }
    }

    if ctx.opcode(inst) == Some(Opcode::Dp4a) {
        // The dot-product accumulate variant only takes dword types.
        let exec_type =
            ExecType::from_hw(inst.a1_exec_type(devinfo) as u32).unwrap_or(ExecType::Int);
        let dword = |hw: u64| {
            matches!(
                hw_to_a1_3src_type(devinfo, exec_type, hw as u32),
                Some(RegType::D) | Some(RegType::Ud)
            )
        };
        error_if!(
            errs,
            !(dword(inst.a1_dst_type(devinfo))
                && dword(inst.a1_src0_type(devinfo))
                && dword(inst.a1_src1_type(devinfo))
                && dword(inst.a1_src2_type(devinfo))),
            "dp4a operands must be dword typed"
        );
    }
}

/// Validates one decoded instruction word.
pub fn validate_instruction(
    isa: &IsaInfo,
    inst: &Inst,
    offset: usize,
    diag: &mut Option<&mut Diagnostics>,
) -> bool {
    let ctx = Ctx { isa, devinfo: isa.devinfo };
    let mut errs: Vec<String> = Vec::new();

    match ctx.opcode(inst) {
        None => error_if!(&mut errs, true, "unassigned hardware opcode"),
        Some(Opcode::Illegal) => error_if!(&mut errs, true, "illegal instruction"),
        Some(_) => {
            invalid_values(&ctx, inst, &mut errs);
            if errs.is_empty() {
                sources_not_null(&ctx, inst, &mut errs);
                send_restrictions(&ctx, inst, &mut errs);
                alignment_supported(&ctx, inst, &mut errs);
                general_restrictions_based_on_operand_types(&ctx, inst, &mut errs);
                general_restrictions_on_region_parameters(&ctx, inst, &mut errs);
                special_restrictions_for_mixed_float_mode(&ctx, inst, &mut errs);
                region_alignment_rules(&ctx, inst, &mut errs);
                vector_immediate_restrictions(&ctx, inst, &mut errs);
                special_requirements_for_handling_double_precision_data_types(&ctx, inst, &mut errs);
                instruction_restrictions(&ctx, inst, &mut errs);
            }
        }
    }

    let valid = errs.is_empty();
    if !valid {
        debug!("invalid instruction at {offset:#x}: {}", errs.join("; "));
        if let Some(diag) = diag.as_deref_mut() {
            for e in errs {
                diag.entries.push((offset, e));
            }
        }
    }
    valid
}

/// Validates every instruction in `assembly[start..end]`.
///
/// Compacted words are recognized by the compact-control bit and
/// classified as invalid (this crate does not carry the compaction
/// codec); they still advance the cursor by their own size so the rest
/// of the stream stays aligned.
pub fn validate_instructions(
    isa: &IsaInfo,
    assembly: &[u8],
    start: usize,
    end: usize,
    mut diag: Option<&mut Diagnostics>,
) -> bool {
    let devinfo = &isa.devinfo;
    let mut valid = true;
    let mut offset = start;

    while offset < end {
        if offset + INST_SIZE > assembly.len() && offset + COMPACT_INST_SIZE > assembly.len() {
            if let Some(diag) = diag.as_deref_mut() {
                diag.entries.push((offset, "truncated instruction stream".to_string()));
            }
            return false;
        }

        let mut bytes = [0u8; INST_SIZE];
        let avail = (assembly.len() - offset).min(INST_SIZE);
        bytes[..avail].copy_from_slice(&assembly[offset..offset + avail]);
        let inst = Inst::from_bytes(bytes);

        if inst.cmpt_control(devinfo) == 0 && avail < INST_SIZE {
            if let Some(diag) = diag.as_deref_mut() {
                diag.entries.push((offset, "truncated instruction stream".to_string()));
            }
            return false;
        }

        if inst.cmpt_control(devinfo) != 0 {
            if let Some(diag) = diag.as_deref_mut() {
                diag.entries.push((offset, "compacted instruction".to_string()));
            }
            valid = false;
            offset += COMPACT_INST_SIZE;
            continue;
        }

        valid &= validate_instruction(isa, &inst, offset, &mut diag);
        offset += INST_SIZE;
    }

    valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuilderOptions, CodeBuilder};
    use crate::devinfo::Platform;
    use crate::regs::{ExecSize, HStride, Reg, VStride, Width};

    fn isa(verx10: u32) -> IsaInfo {
        IsaInfo::new(DeviceInfo::new(verx10, Platform::Main))
    }

    fn validate_all(isa: &IsaInfo, p: &CodeBuilder<'_>) -> bool {
        let bytes = p.program();
        validate_instructions(isa, &bytes, 0, bytes.len(), None)
    }

    #[test]
    fn encoder_output_is_valid() {
        for &v in &[50u32, 70, 75, 80, 90, 110, 120] {
            let isa = isa(v);
            let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
            p.add(Reg::grf(1), Reg::grf(2), Reg::grf(3));
            p.mov(Reg::grf(4), Reg::grf(5));
            p.mul(Reg::grf(6), Reg::grf(7), Reg::imm_f(2.0));
            assert!(validate_all(&isa, &p), "verx10={v}");
        }
    }

    #[test]
    fn unassigned_opcode_rejected() {
        let isa = isa(90);
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.add(Reg::grf(1), Reg::grf(2), Reg::grf(3));
        let mut bytes = p.program();
        // An opcode slot nothing claims on Gen9.
        bytes[0] = (bytes[0] & !0x7f) | 0x7d;
        assert!(!validate_instructions(&isa, &bytes, 0, bytes.len(), None));
    }

    #[test]
    fn dst_stride_must_match_exec_type_ratio() {
        let isa = isa(90);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        // W destination fed by D sources needs a stride-2 destination.
        let idx = p.add(
            Reg::grf(1).retype(RegType::W),
            Reg::grf(2).retype(RegType::D),
            Reg::grf(3).retype(RegType::D),
        );
        assert!(!validate_all(&isa, &p));

        p.inst_mut(idx).set_dst_hstride(&devinfo, HStride::H2.to_hw() as u64);
        assert!(validate_all(&isa, &p));
    }

    #[test]
    fn scalar_region_requires_zero_vstride() {
        let isa = isa(90);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.set_default_exec_size(ExecSize::E1);
        let idx = p.mov(Reg::grf(1).vec1(), Reg::grf(2).vec1());
        // Forge <1;1,0>: vstride 1 with width 1 at exec size 1.
        p.inst_mut(idx).set_src0_vstride(&devinfo, VStride::V1.to_hw() as u64);
        assert!(!validate_all(&isa, &p));

        p.inst_mut(idx).set_src0_vstride(&devinfo, VStride::V0.to_hw() as u64);
        assert!(validate_all(&isa, &p));
    }

    #[test]
    fn region_may_not_span_three_registers() {
        let isa = isa(90);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.set_default_exec_size(ExecSize::E32);
        let idx = p.mov(
            Reg::grf(1).retype(RegType::W).with_stride(VStride::V16, Width::W8, HStride::H2),
            Reg::grf(2).retype(RegType::W).with_stride(VStride::V16, Width::W8, HStride::H2),
        );
        // <16;8,2>:w over 32 channels reads 4 rows of 32 bytes: 3
        // registers. Invalid.
        assert!(!validate_all(&isa, &p));

        // <8;8,1> over 32 word channels stays within 2 registers.
        p.inst_mut(idx).set_src0_vstride(&devinfo, VStride::V8.to_hw() as u64);
        p.inst_mut(idx).set_src0_hstride(&devinfo, HStride::H1.to_hw() as u64);
        p.inst_mut(idx).set_dst_hstride(&devinfo, HStride::H1.to_hw() as u64);
        assert!(validate_all(&isa, &p));
    }

    #[test]
    fn width_exceeding_exec_size_rejected() {
        let isa = isa(90);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.set_default_exec_size(ExecSize::E4);
        let idx = p.mov(Reg::grf(1), Reg::grf(2));
        p.inst_mut(idx).set_src0_width(&devinfo, Width::W8.to_hw() as u64);
        assert!(!validate_all(&isa, &p));
    }

    #[test]
    fn null_sources_rejected() {
        let isa = isa(90);
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.add(Reg::grf(1), Reg::null(), Reg::grf(2));
        assert!(!validate_all(&isa, &p));
    }

    #[test]
    fn byte_src1_rejected_on_gen11() {
        let isa11 = isa(110);
        let mut p = CodeBuilder::new(&isa11, BuilderOptions::default());
        let dst = Reg::grf(1).retype(RegType::W).with_stride(VStride::V8, Width::W8, HStride::H2);
        p.add(
            dst,
            Reg::grf(2).retype(RegType::W),
            Reg::grf(3).retype(RegType::B).with_stride(VStride::V8, Width::W4, HStride::H2),
        );
        assert!(!validate_all(&isa11, &p));

        let isa9 = isa(90);
        let mut p = CodeBuilder::new(&isa9, BuilderOptions::default());
        let dst = Reg::grf(1).retype(RegType::W).with_stride(VStride::V8, Width::W8, HStride::H2);
        p.add(
            dst,
            Reg::grf(2).retype(RegType::W),
            Reg::grf(3).retype(RegType::B).with_stride(VStride::V4, Width::W4, HStride::H1),
        );
        assert!(validate_all(&isa9, &p));
    }

    #[test]
    fn packed_byte_destination_only_for_raw_mov() {
        let isa = isa(90);
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        // Packed-byte raw MOV is the one blessed form.
        p.mov(
            Reg::grf(1).retype(RegType::Ub).with_stride(VStride::V8, Width::W8, HStride::H1),
            Reg::grf(2).retype(RegType::Ub),
        );
        assert!(validate_all(&isa, &p));

        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.add(
            Reg::grf(1).retype(RegType::Ub).with_stride(VStride::V8, Width::W8, HStride::H1),
            Reg::grf(2).retype(RegType::Ub).with_stride(VStride::V8, Width::W4, HStride::H2),
            Reg::grf(3).retype(RegType::Ub).with_stride(VStride::V8, Width::W4, HStride::H2),
        );
        assert!(!validate_all(&isa, &p));
    }

    #[test]
    fn align16_rejected_on_gen11() {
        let isa9 = isa(90);
        let devinfo = isa9.devinfo;
        let mut p = CodeBuilder::new(&isa9, BuilderOptions::default());
        p.set_default_access_mode(crate::regs::AccessMode::Align16);
        p.mov(Reg::grf(1), Reg::grf(2));
        let bytes = p.program();
        assert!(validate_instructions(&isa9, &bytes, 0, bytes.len(), None));

        // The same bit pattern interpreted for Gen11 is rejected; the
        // access-mode bit sits at the same spot in that era.
        let isa11 = isa(110);
        assert!(!validate_instructions(&isa11, &bytes, 0, bytes.len(), None));
        let _ = devinfo;
    }

    #[test]
    fn compacted_words_are_flagged() {
        let isa = isa(90);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        let idx = p.mov(Reg::grf(1), Reg::grf(2));
        p.inst_mut(idx).set_cmpt_control(&devinfo, 1);
        let bytes = p.program();
        let mut diag = Diagnostics::new();
        assert!(!validate_instructions(&isa, &bytes, 0, bytes.len(), Some(&mut diag)));
        assert!(diag.entries.iter().any(|(_, m)| m.contains("compacted")));
    }

    #[test]
    fn diagnostics_carry_offsets() {
        let isa = isa(90);
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.mov(Reg::grf(1), Reg::grf(2));
        p.add(
            Reg::grf(1).retype(RegType::W),
            Reg::grf(2).retype(RegType::D),
            Reg::grf(3).retype(RegType::D),
        );
        let bytes = p.program();
        let mut diag = Diagnostics::new();
        assert!(!validate_instructions(&isa, &bytes, 0, bytes.len(), Some(&mut diag)));
        assert!(diag.entries.iter().all(|(off, _)| *off == INST_SIZE));
    }

    #[test]
    fn fuzzed_bit_patterns_never_panic() {
        // A cheap linear congruential sweep over byte patterns; the
        // point is the absence of panics, not the verdicts.
        for &v in &[40u32, 60, 75, 90, 110, 120, 125] {
            let isa = isa(v);
            let mut seed: u64 = 0x1234_5678_9abc_def0 ^ (v as u64);
            let mut bytes = vec![0u8; 64 * INST_SIZE];
            for b in bytes.iter_mut() {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                *b = (seed >> 56) as u8;
            }
            let _ = validate_instructions(&isa, &bytes, 0, bytes.len(), None);
        }
    }

    #[test]
    fn mixed_float_simd16_packed_hf_rejected() {
        let isa = isa(90);
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.set_default_exec_size(ExecSize::E16);
        p.add(
            Reg::grf(1).retype(RegType::Hf).with_stride(VStride::V16, Width::W16, HStride::H1),
            Reg::grf(2).retype(RegType::F),
            Reg::grf(4).retype(RegType::F),
        );
        assert!(!validate_all(&isa, &p));
    }

    #[test]
    fn lowpower_64bit_bans_depctrl() {
        let chv = IsaInfo::new(DeviceInfo::new(80, Platform::LowPower));
        let devinfo = chv.devinfo;
        let mut p = CodeBuilder::new(&chv, BuilderOptions::default());
        p.set_default_exec_size(ExecSize::E4);
        let idx = p.mov(
            Reg::grf(1).retype(RegType::Df).with_stride(VStride::V4, Width::W4, HStride::H1),
            Reg::grf(2).retype(RegType::Df).with_stride(VStride::V4, Width::W4, HStride::H1),
        );
        assert!(validate_all(&chv, &p));

        p.inst_mut(idx).set_no_dd_clear(&devinfo, 1);
        assert!(!validate_all(&chv, &p));
    }
}
