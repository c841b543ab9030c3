//! The instruction builder: a stateful emitter appending fixed-size
//! instruction words to a growable store.
//!
//! The store may reallocate on growth, so "the current instruction" is
//! always an index into it, never a pointer; every public operation
//! takes or returns such an index. A bounded stack of default
//! instruction state (execution size, predication, access mode,
//! scheduling annotation, ...) seeds each new instruction; `push_state`
//! / `pop_state` bracket temporary overrides.
//!
//! Invariant violations here — wrong operand counts, unencodable type
//! combinations, stack underflow — are caller bugs and panic. Data
//! validity questions belong to the validator.

use std::path::PathBuf;

use log::{debug, trace};
use smallvec::SmallVec;

use crate::devinfo::DeviceInfo;
use crate::inst::{Inst, INST_SIZE};
use crate::opcode::{is_send_opcode, is_split_send, IsaInfo, Opcode};
use crate::regs::{
    max_mrf, AccessMode, AddressMode, CondModifier, ExecSize, HStride, MaskControl, MathFunction,
    Predicate, Reg, RegFile, VStride, Width, ARF_ACCUMULATOR, ARF_NULL, MRF_COMPR4, MRF_HACK_START,
};
use crate::swsb::{self, Swsb};
use crate::types::{
    a16_3src_type_to_hw, a1_3src_type_to_hw, reg_type_to_hw, ExecType, RegType,
};

/// A pending fixup for an immediate whose final value is known only at
/// link time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RelocKind {
    /// Patch the 32-bit immediate dword in place.
    MovImm32,
    /// Patch a descriptor dword.
    DescImm32,
}

/// One relocation record, consumed by an external linking step.
#[derive(Copy, Clone, Debug)]
pub struct Reloc {
    pub id: u32,
    pub kind: RelocKind,
    /// Byte offset of the instruction from the start of the program.
    pub offset: u32,
    /// Value to add to the resolved symbol.
    pub delta: u32,
}

/// Session I/O failures from the debug dump/override paths.
#[derive(Debug, thiserror::Error)]
pub enum ProgramIoError {
    #[error("failed to dump program binary to {path}: {source}")]
    Dump {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read program override from {path}: {source}")]
    Override {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Explicit session configuration; the debug binary dump/override is
/// plain configuration here rather than ambient environment state, so
/// sessions stay independently testable.
#[derive(Clone, Debug, Default)]
pub struct BuilderOptions {
    /// Name used for dump/override files.
    pub label: String,
    /// If set, `finish` writes the emitted binary into this directory.
    pub dump_dir: Option<PathBuf>,
    /// If set and a file named after the label exists there, `finish`
    /// returns that file's contents instead of the emitted binary.
    pub override_dir: Option<PathBuf>,
    /// Narrow the execution size to the destination width for small
    /// registers.
    pub automatic_exec_sizes: bool,
    /// Pre-Gen6 single-program-flow mode: structured control flow is
    /// rewritten into instruction-pointer arithmetic.
    pub single_program_flow: bool,
}

/// One snapshot of default instruction state.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InsnState {
    pub exec_size: ExecSize,
    pub group: u32,
    pub compressed: bool,
    pub access_mode: AccessMode,
    pub mask_control: MaskControl,
    pub saturate: bool,
    pub predicate: Predicate,
    pub pred_inv: bool,
    /// Combined flag register/sub-register index (flag `n/2`.`n%2`).
    pub flag_subreg: u32,
    pub acc_wr_control: bool,
    pub swsb: Swsb,
}

impl Default for InsnState {
    fn default() -> InsnState {
        InsnState {
            exec_size: ExecSize::E8,
            group: 0,
            compressed: false,
            access_mode: AccessMode::Align1,
            mask_control: MaskControl::Enable,
            saturate: false,
            predicate: Predicate::None,
            pred_inv: false,
            flag_subreg: 0,
            acc_wr_control: false,
            swsb: Swsb::null(),
        }
    }
}

/// The codegen context. One per compilation unit; not internally
/// synchronized.
pub struct CodeBuilder<'a> {
    pub isa: &'a IsaInfo,
    pub devinfo: DeviceInfo,
    pub(crate) store: Vec<Inst>,
    state_stack: SmallVec<[InsnState; 16]>,
    relocs: Vec<Reloc>,
    options: BuilderOptions,
    // Control-flow assembler state (see `flow.rs`).
    pub(crate) if_stack: SmallVec<[usize; 16]>,
    pub(crate) loop_stack: SmallVec<[usize; 16]>,
    pub(crate) if_depth_in_loop: SmallVec<[u32; 16]>,
}

impl<'a> CodeBuilder<'a> {
    pub fn new(isa: &'a IsaInfo, options: BuilderOptions) -> CodeBuilder<'a> {
        let mut state_stack = SmallVec::new();
        state_stack.push(InsnState::default());
        let mut if_depth_in_loop = SmallVec::new();
        if_depth_in_loop.push(0);
        CodeBuilder {
            isa,
            devinfo: isa.devinfo,
            store: Vec::new(),
            state_stack,
            relocs: Vec::new(),
            options,
            if_stack: SmallVec::new(),
            loop_stack: SmallVec::new(),
            if_depth_in_loop,
        }
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    /// Number of emitted instructions.
    pub fn inst_count(&self) -> usize {
        self.store.len()
    }

    /// Byte offset just past the last emitted instruction.
    pub fn next_inst_offset(&self) -> usize {
        self.store.len() * INST_SIZE
    }

    pub fn inst(&self, idx: usize) -> &Inst {
        &self.store[idx]
    }

    pub fn inst_mut(&mut self, idx: usize) -> &mut Inst {
        &mut self.store[idx]
    }

    /// The emitted program as raw bytes.
    pub fn program(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.store.len() * INST_SIZE);
        for inst in &self.store {
            bytes.extend_from_slice(&inst.to_bytes());
        }
        bytes
    }

    /// Finishes the session: applies the override path if configured,
    /// then the dump path, and returns the final binary.
    pub fn finish(&self) -> Result<Vec<u8>, ProgramIoError> {
        let name = if self.options.label.is_empty() { "program" } else { self.options.label.as_str() };

        if let Some(dir) = &self.options.override_dir {
            let path = dir.join(format!("{name}.bin"));
            if path.exists() {
                debug!("overriding emitted binary from {}", path.display());
                return std::fs::read(&path).map_err(|source| ProgramIoError::Override { path, source });
            }
        }

        let bytes = self.program();
        if let Some(dir) = &self.options.dump_dir {
            let path = dir.join(format!("{name}.bin"));
            debug!("dumping emitted binary to {}", path.display());
            std::fs::write(&path, &bytes).map_err(|source| ProgramIoError::Dump { path, source })?;
        }
        Ok(bytes)
    }

    // State stack -----------------------------------------------------

    pub fn current_state(&self) -> &InsnState {
        self.state_stack.last().unwrap()
    }

    fn current_state_mut(&mut self) -> &mut InsnState {
        self.state_stack.last_mut().unwrap()
    }

    /// Duplicates the top default-state record.
    pub fn push_state(&mut self) {
        let top = *self.current_state();
        self.state_stack.push(top);
    }

    /// Discards the top default-state record. Popping the initial record
    /// is a stack-discipline bug.
    pub fn pop_state(&mut self) {
        assert!(self.state_stack.len() > 1, "insn state stack underflow");
        self.state_stack.pop();
    }

    pub fn set_default_exec_size(&mut self, v: ExecSize) {
        self.current_state_mut().exec_size = v;
    }

    pub fn set_default_group(&mut self, v: u32) {
        self.current_state_mut().group = v;
    }

    pub fn set_default_compression(&mut self, v: bool) {
        self.current_state_mut().compressed = v;
    }

    pub fn set_default_access_mode(&mut self, v: AccessMode) {
        assert!(
            v == AccessMode::Align1 || self.devinfo.ver < 12,
            "align16 does not exist from Gen12 on"
        );
        self.current_state_mut().access_mode = v;
    }

    pub fn set_default_mask_control(&mut self, v: MaskControl) {
        self.current_state_mut().mask_control = v;
    }

    pub fn set_default_saturate(&mut self, v: bool) {
        self.current_state_mut().saturate = v;
    }

    pub fn set_default_predicate(&mut self, p: Predicate, inverted: bool) {
        let st = self.current_state_mut();
        st.predicate = p;
        st.pred_inv = inverted;
    }

    pub fn set_default_flag_reg(&mut self, reg: u32, subreg: u32) {
        debug_assert!(reg < 2 && subreg < 2);
        self.current_state_mut().flag_subreg = reg * 2 + subreg;
    }

    pub fn set_default_acc_write_control(&mut self, v: bool) {
        self.current_state_mut().acc_wr_control = v;
    }

    pub fn set_default_swsb(&mut self, v: Swsb) {
        self.current_state_mut().swsb = v;
    }

    // Emission --------------------------------------------------------

    fn apply_state(&mut self, idx: usize) {
        let devinfo = self.devinfo;
        let state = *self.current_state();
        let three_src_align16 = {
            let inst = &self.store[idx];
            self.isa.num_sources(inst) == Some(3) && state.access_mode == AccessMode::Align16
        };
        let inst = &mut self.store[idx];

        inst.set_exec_size(&devinfo, state.exec_size.to_hw() as u64);
        if devinfo.ver >= 6 {
            inst.set_group(&devinfo, state.group as u64);
            if state.compressed {
                // Compressed SIMD16 on the old encodings is the second
                // compression-control value.
                inst.set_qtr_control(&devinfo, 2);
            }
        } else {
            inst.set_qtr_control(&devinfo, if state.compressed { 2 } else { 0 });
        }
        inst.set_access_mode(&devinfo, state.access_mode.to_hw() as u64);
        inst.set_mask_control(&devinfo, state.mask_control as u64);
        if devinfo.has_swsb {
            inst.set_swsb(&devinfo, swsb::encode(&devinfo, state.swsb) as u64);
        }
        inst.set_saturate(&devinfo, state.saturate as u64);
        inst.set_pred_control(&devinfo, state.predicate as u64);
        inst.set_pred_inv(&devinfo, state.pred_inv as u64);

        // The three-source align16 encoding keeps its flag selector in a
        // different spot than everything else.
        if three_src_align16 {
            inst.set_a16_flag_subreg_nr(&devinfo, (state.flag_subreg % 2) as u64);
            if devinfo.ver >= 7 {
                inst.set_a16_flag_reg_nr(&devinfo, (state.flag_subreg / 2) as u64);
            }
        } else {
            inst.set_flag_subreg_nr(&devinfo, (state.flag_subreg % 2) as u64);
            if devinfo.ver >= 7 {
                inst.set_flag_reg_nr(&devinfo, (state.flag_subreg / 2) as u64);
            }
        }

        if devinfo.ver >= 6 && devinfo.ver < 12 {
            inst.set_acc_wr_control(&devinfo, state.acc_wr_control as u64);
        }
    }

    /// Appends a zeroed instruction word, writes the opcode, copies the
    /// current default state onto it, and returns its index.
    pub fn next_inst(&mut self, op: Opcode) -> usize {
        let hw = self.isa.hw_opcode(op);
        let idx = self.store.len();
        trace!("emit {:?} at inst {}", op, idx);
        self.store.push(Inst::zeroed());
        self.store[idx].set_hw_opcode(&self.devinfo, hw as u64);
        self.apply_state(idx);
        idx
    }

    /// Pads the store with zeroed words until the next instruction
    /// offset is `alignment`-aligned. The padding is explicitly zeroed
    /// so later hashing or comparison of the program never sees
    /// uninitialized bits.
    pub fn realign(&mut self, alignment: usize) {
        assert!(alignment.is_power_of_two() && alignment % INST_SIZE == 0);
        while self.next_inst_offset() % alignment != 0 {
            self.store.push(Inst::zeroed());
        }
    }

    /// Appends raw data (e.g. an embedded constant block) into the
    /// instruction store, zero-padding the trailing partial word.
    /// Returns the byte offset the data landed at.
    pub fn append_data(&mut self, data: &[u8], alignment: usize) -> usize {
        self.realign(alignment);
        let offset = self.next_inst_offset();
        for chunk in data.chunks(INST_SIZE) {
            let mut bytes = [0u8; INST_SIZE];
            bytes[..chunk.len()].copy_from_slice(chunk);
            self.store.push(Inst::from_bytes(bytes));
        }
        offset
    }

    /// Appends a relocation record.
    pub fn add_reloc(&mut self, id: u32, kind: RelocKind, offset: u32, delta: u32) {
        self.relocs.push(Reloc { id, kind, offset, delta });
    }

    pub fn relocs(&self) -> &[Reloc] {
        &self.relocs
    }

    // Operand setters -------------------------------------------------

    /// Message registers stopped existing on Gen7; remap them into the
    /// reserved high GRF range to stay source-compatible with code
    /// written against the old model.
    fn convert_mrf_to_grf(&self, reg: &mut Reg) {
        if self.devinfo.ver >= 7 && reg.file == RegFile::Mrf {
            reg.file = RegFile::Grf;
            reg.nr += MRF_HACK_START;
        }
    }

    fn opcode_of(&self, idx: usize) -> Opcode {
        self.isa
            .opcode(&self.store[idx])
            .expect("builder-emitted instruction has a descriptor")
    }

    fn hw_reg_type(&self, file: RegFile, t: RegType) -> u64 {
        reg_type_to_hw(&self.devinfo, file, t).unwrap_or_else(|| {
            panic!(
                "type {t} is not encodable as a {file:?} operand on verx10={}",
                self.devinfo.verx10
            )
        }) as u64
    }

    pub fn set_dest(&mut self, idx: usize, mut dest: Reg) {
        let devinfo = self.devinfo;
        let op = self.opcode_of(idx);

        if dest.file == RegFile::Mrf {
            assert!((dest.nr & !MRF_COMPR4) < max_mrf(devinfo.ver));
        } else if dest.file == RegFile::Grf {
            assert!(dest.nr < devinfo.max_grf());
        }

        // Byte destinations with a stride of exactly 1 are reserved for
        // the packed-byte MOV; everything else must widen, even the null
        // register.
        if dest.file == RegFile::Arf
            && dest.nr == ARF_NULL
            && dest.rtype.size_bytes() == 1
            && dest.hstride == HStride::H1
        {
            dest.hstride = HStride::H2;
        }

        self.convert_mrf_to_grf(&mut dest);

        let inst_access = AccessMode::from_hw(self.store[idx].access_mode(&devinfo) as u32);
        let inst = &mut self.store[idx];

        if devinfo.ver >= 12 && matches!(op, Opcode::Send | Opcode::Sendc) {
            assert!(dest.file == RegFile::Grf || dest.file == RegFile::Arf);
            assert!(dest.address_mode == AddressMode::Direct);
            assert!(dest.subnr == 0);
            assert!(!dest.negate && !dest.abs);
            inst.set_dst_reg_file(&devinfo, dest.file.to_hw() as u64);
            inst.set_dst_da_reg_nr(&devinfo, dest.nr as u64);
        } else if matches!(op, Opcode::Sends | Opcode::Sendsc) {
            assert!(devinfo.ver < 12);
            assert!(dest.file == RegFile::Grf || dest.file == RegFile::Arf);
            assert!(dest.address_mode == AddressMode::Direct);
            assert!(dest.subnr % 16 == 0);
            assert!(!dest.negate && !dest.abs);
            inst.set_dst_reg_file(&devinfo, dest.file.to_hw() as u64);
            inst.set_dst_da_reg_nr(&devinfo, dest.nr as u64);
            inst.set_dst_da16_subreg_nr(&devinfo, (dest.subnr / 16) as u64);
        } else {
            let hw_type = self.hw_reg_type(dest.file, dest.rtype);
            let inst = &mut self.store[idx];
            inst.set_dst_reg_file(&devinfo, dest.file.to_hw() as u64);
            inst.set_dst_reg_hw_type(&devinfo, hw_type);
            inst.set_dst_address_mode(&devinfo, dest.address_mode.to_hw() as u64);

            if dest.address_mode == AddressMode::Direct {
                inst.set_dst_da_reg_nr(&devinfo, dest.nr as u64);

                if inst_access == AccessMode::Align1 {
                    inst.set_dst_da1_subreg_nr(&devinfo, dest.subnr as u64);
                    if dest.hstride == HStride::H0 {
                        dest.hstride = HStride::H1;
                    }
                    inst.set_dst_hstride(&devinfo, dest.hstride.to_hw() as u64);
                } else {
                    inst.set_dst_da16_subreg_nr(&devinfo, (dest.subnr / 16) as u64);
                    inst.set_dst_da16_writemask(&devinfo, dest.writemask as u64);
                    if dest.file == RegFile::Grf || dest.file == RegFile::Mrf {
                        assert!(dest.writemask != 0);
                    }
                    // HorzStride is a don't-care in align16 but the
                    // hardware wants it programmed as one.
                    inst.set_dst_hstride(&devinfo, 1);
                }
            } else {
                inst.set_dst_ia_subreg_nr(&devinfo, dest.subnr as u64);
                if inst_access == AccessMode::Align1 {
                    inst.set_dst_ia1_addr_imm(&devinfo, dest.indirect_offset as i64);
                    if dest.hstride == HStride::H0 {
                        dest.hstride = HStride::H1;
                    }
                    inst.set_dst_hstride(&devinfo, dest.hstride.to_hw() as u64);
                } else {
                    assert!(dest.indirect_offset % 16 == 0);
                    inst.set_dst_ia16_addr_imm(&devinfo, (dest.indirect_offset / 16) as i64);
                    inst.set_dst_hstride(&devinfo, 1);
                }
            }
        }

        // Narrow the execution size to match small destinations when the
        // caller opted in.
        if self.options.automatic_exec_sizes {
            let narrow = if devinfo.ver >= 6 {
                dest.width < Width::W4
            } else {
                dest.width < Width::W8
            };
            if narrow {
                let exec = ExecSize::from_width(dest.width);
                self.store[idx].set_exec_size(&devinfo, exec.to_hw() as u64);
            }
        }
    }

    fn set_src_region_align1(&mut self, idx: usize, src: usize, reg: &Reg) {
        let devinfo = self.devinfo;
        let exec_size = self.store[idx].exec_size(&devinfo) as u32;
        let scalar = reg.width == Width::W1 && exec_size == ExecSize::E1.to_hw();
        let (v, w, h) = if scalar {
            (VStride::V0, Width::W1, HStride::H0)
        } else {
            (reg.vstride, reg.width, reg.hstride)
        };
        let inst = &mut self.store[idx];
        if src == 0 {
            inst.set_src0_hstride(&devinfo, h.to_hw() as u64);
            inst.set_src0_width(&devinfo, w.to_hw() as u64);
            inst.set_src0_vstride(&devinfo, v.to_hw() as u64);
        } else {
            inst.set_src1_hstride(&devinfo, h.to_hw() as u64);
            inst.set_src1_width(&devinfo, w.to_hw() as u64);
            inst.set_src1_vstride(&devinfo, v.to_hw() as u64);
        }
    }

    fn align16_vstride(&self, reg: &Reg) -> VStride {
        // Align16 reuses the align1 region descriptions; a vertical
        // stride of 8 means "4 components" there, and double floats on
        // the 7.0 parts must use the 4 encoding as well.
        if reg.vstride == VStride::V8 {
            VStride::V4
        } else if self.devinfo.verx10 == 70 && reg.rtype == RegType::Df && reg.vstride == VStride::V2 {
            VStride::V4
        } else {
            reg.vstride
        }
    }

    pub fn set_src0(&mut self, idx: usize, mut reg: Reg) {
        let devinfo = self.devinfo;
        let op = self.opcode_of(idx);

        if reg.file == RegFile::Mrf {
            assert!((reg.nr & !MRF_COMPR4) < max_mrf(devinfo.ver));
        } else if reg.file == RegFile::Grf {
            assert!(reg.nr < devinfo.max_grf());
        }

        self.convert_mrf_to_grf(&mut reg);

        if devinfo.ver >= 6 && is_send_opcode(op) {
            // The payload operand only names where the message starts;
            // modifiers and regions would be ignored.
            assert!(!reg.negate);
            assert!(!reg.abs);
            assert!(reg.address_mode == AddressMode::Direct);
        }

        if devinfo.ver >= 12 && matches!(op, Opcode::Send | Opcode::Sendc) {
            assert!(reg.file != RegFile::Imm);
            assert!(reg.subnr == 0);
            let inst = &mut self.store[idx];
            inst.set_send_src0_reg_file(&devinfo, reg.file.to_hw() as u64);
            inst.set_src0_da_reg_nr(&devinfo, reg.nr as u64);
            return;
        } else if matches!(op, Opcode::Sends | Opcode::Sendsc) {
            assert!(reg.file == RegFile::Grf);
            assert!(reg.subnr % 16 == 0);
            let inst = &mut self.store[idx];
            inst.set_src0_da_reg_nr(&devinfo, reg.nr as u64);
            inst.set_src0_da16_subreg_nr(&devinfo, (reg.subnr / 16) as u64);
            return;
        }

        let hw_type = self.hw_reg_type(reg.file, reg.rtype);
        let inst_access = AccessMode::from_hw(self.store[idx].access_mode(&devinfo) as u32);
        let inst = &mut self.store[idx];
        inst.set_src0_reg_file(&devinfo, reg.file.to_hw() as u64);
        inst.set_src0_reg_hw_type(&devinfo, hw_type);
        inst.set_src0_abs(&devinfo, reg.abs as u64);
        inst.set_src0_negate(&devinfo, reg.negate as u64);
        inst.set_src0_address_mode(&devinfo, reg.address_mode.to_hw() as u64);

        if reg.file == RegFile::Imm {
            if reg.rtype.size_bytes() == 8 {
                inst.set_imm_uq(&devinfo, reg.imm);
            } else {
                inst.set_imm_ud(&devinfo, reg.imm & 0xffff_ffff);
            }

            if devinfo.ver < 12 && reg.rtype.size_bytes() < 8 {
                // The hardware wants the unused src1 slot to mirror an
                // architecture-file operand of the immediate's type.
                let t = self.store[idx].src0_reg_hw_type(&devinfo);
                let inst = &mut self.store[idx];
                inst.set_src1_reg_file(&devinfo, RegFile::Arf.to_hw() as u64);
                inst.set_src1_reg_hw_type(&devinfo, t);
            }
            return;
        }

        if reg.address_mode == AddressMode::Direct {
            inst.set_src0_da_reg_nr(&devinfo, reg.nr as u64);
            if inst_access == AccessMode::Align1 {
                inst.set_src0_da1_subreg_nr(&devinfo, reg.subnr as u64);
            } else {
                inst.set_src0_da16_subreg_nr(&devinfo, (reg.subnr / 16) as u64);
            }
        } else {
            inst.set_src0_ia_subreg_nr(&devinfo, reg.subnr as u64);
            if inst_access == AccessMode::Align1 {
                inst.set_src0_ia1_addr_imm(&devinfo, reg.indirect_offset as i64);
            } else {
                assert!(reg.indirect_offset % 16 == 0);
                inst.set_src0_ia16_addr_imm(&devinfo, (reg.indirect_offset / 16) as i64);
            }
        }

        if inst_access == AccessMode::Align1 {
            self.set_src_region_align1(idx, 0, &reg);
        } else {
            let v = self.align16_vstride(&reg);
            let inst = &mut self.store[idx];
            inst.set_src0_da16_swizzle(&devinfo, reg.swizzle as u64);
            inst.set_src0_vstride(&devinfo, v.to_hw() as u64);
        }
    }

    pub fn set_src1(&mut self, idx: usize, mut reg: Reg) {
        let devinfo = self.devinfo;
        let op = self.opcode_of(idx);

        if reg.file == RegFile::Grf {
            assert!(reg.nr < devinfo.max_grf());
        }

        if is_split_send(&devinfo, op) {
            assert!(reg.file == RegFile::Grf || reg.file == RegFile::Arf);
            assert!(reg.address_mode == AddressMode::Direct);
            assert!(reg.subnr == 0);
            assert!(!reg.negate && !reg.abs);
            let inst = &mut self.store[idx];
            inst.set_send_src1_reg_nr(&devinfo, reg.nr as u64);
            inst.set_send_src1_reg_file(&devinfo, reg.file.to_hw() as u64);
            return;
        }

        // Accumulators may be accessed explicitly as src0 only.
        assert!(
            reg.file != RegFile::Arf || (reg.nr & 0xf0) != ARF_ACCUMULATOR,
            "accumulator is src0-only"
        );

        self.convert_mrf_to_grf(&mut reg);
        assert!(reg.file != RegFile::Mrf);

        // Only src1 carries an immediate in two-source instructions.
        assert!(
            self.store[idx].src0_reg_file(&devinfo) != RegFile::Imm.to_hw() as u64,
            "src0 and src1 cannot both be immediates"
        );

        let hw_type = self.hw_reg_type(reg.file, reg.rtype);
        let inst_access = AccessMode::from_hw(self.store[idx].access_mode(&devinfo) as u32);
        let inst = &mut self.store[idx];
        inst.set_src1_reg_file(&devinfo, reg.file.to_hw() as u64);
        inst.set_src1_reg_hw_type(&devinfo, hw_type);
        inst.set_src1_abs(&devinfo, reg.abs as u64);
        inst.set_src1_negate(&devinfo, reg.negate as u64);

        if reg.file == RegFile::Imm {
            // Two-source instructions only take 32-bit immediates.
            assert!(reg.rtype.size_bytes() < 8);
            inst.set_imm_ud(&devinfo, reg.imm & 0xffff_ffff);
            return;
        }

        // Indirect src1 is a hardware restriction, not a policy choice.
        assert!(reg.address_mode == AddressMode::Direct);

        inst.set_src1_da_reg_nr(&devinfo, reg.nr as u64);
        if inst_access == AccessMode::Align1 {
            inst.set_src1_da1_subreg_nr(&devinfo, reg.subnr as u64);
        } else {
            inst.set_src1_da16_subreg_nr(&devinfo, (reg.subnr / 16) as u64);
        }

        if inst_access == AccessMode::Align1 {
            self.set_src_region_align1(idx, 1, &reg);
        } else {
            let v = self.align16_vstride(&reg);
            let inst = &mut self.store[idx];
            inst.set_src1_da16_swizzle(&devinfo, reg.swizzle as u64);
            inst.set_src1_vstride(&devinfo, v.to_hw() as u64);
        }
    }

    // ALU emission ----------------------------------------------------

    pub fn alu1(&mut self, op: Opcode, dest: Reg, src: Reg) -> usize {
        let idx = self.next_inst(op);
        self.set_dest(idx, dest);
        self.set_src0(idx, src);
        idx
    }

    pub fn alu2(&mut self, op: Opcode, dest: Reg, src0: Reg, src1: Reg) -> usize {
        // 64-bit immediates only exist on one-source instructions.
        assert!(src0.file != RegFile::Imm || src0.rtype.size_bytes() <= 4);
        assert!(src1.file != RegFile::Imm || src1.rtype.size_bytes() <= 4);
        let idx = self.next_inst(op);
        self.set_dest(idx, dest);
        self.set_src0(idx, src0);
        self.set_src1(idx, src1);
        idx
    }

    fn a1_3src_vstride(&self, v: VStride) -> u64 {
        match v {
            VStride::V0 => 0,
            VStride::V1 => {
                assert!(self.devinfo.ver >= 12);
                1
            }
            VStride::V2 => {
                assert!(self.devinfo.ver < 12);
                1
            }
            VStride::V4 => 2,
            VStride::V8 | VStride::V16 => 3,
            other => panic!("invalid 3-source vstride {other:?}"),
        }
    }

    fn a1_3src_type(&self, exec_type: ExecType, t: RegType) -> u64 {
        a1_3src_type_to_hw(&self.devinfo, exec_type, t).unwrap_or_else(|| {
            panic!(
                "type {t} is not a valid {exec_type:?} 3-source operand on verx10={}",
                self.devinfo.verx10
            )
        }) as u64
    }

    pub fn alu3(&mut self, op: Opcode, mut dest: Reg, src0: Reg, src1: Reg, src2: Reg) -> usize {
        let devinfo = self.devinfo;
        let idx = self.next_inst(op);

        self.convert_mrf_to_grf(&mut dest);
        assert!(dest.nr < devinfo.max_grf());

        if devinfo.ver >= 10 {
            assert!(!(src0.file == RegFile::Imm && src2.file == RegFile::Imm));
        }
        assert!(src0.file == RegFile::Imm || src0.nr < devinfo.max_grf());
        assert!(src1.file != RegFile::Imm && src1.nr < devinfo.max_grf());
        assert!(src2.file == RegFile::Imm || src2.nr < devinfo.max_grf());
        assert!(dest.address_mode == AddressMode::Direct);
        assert!(src0.address_mode == AddressMode::Direct);
        assert!(src1.address_mode == AddressMode::Direct);
        assert!(src2.address_mode == AddressMode::Direct);

        let access = AccessMode::from_hw(self.store[idx].access_mode(&devinfo) as u32);
        if access == AccessMode::Align1 {
            assert!(devinfo.ver >= 10, "align1 three-source encoding needs Gen10+");
            assert!(
                dest.file == RegFile::Grf
                    || (dest.file == RegFile::Arf && (dest.nr & 0xf0) == ARF_ACCUMULATOR)
            );

            // Each operand carries its own type; the execution-type
            // selector decides which sub-table applies.
            let exec_type = if dest.rtype.is_floating_point() { ExecType::Float } else { ExecType::Int };
            let dst_hw_type = self.a1_3src_type(exec_type, dest.rtype);
            let src0_hw_type = self.a1_3src_type(exec_type, src0.rtype);
            let src1_hw_type = self.a1_3src_type(exec_type, src1.rtype);
            let src2_hw_type = self.a1_3src_type(exec_type, src2.rtype);

            let src0_vstride = if src0.file == RegFile::Imm { 0 } else { self.a1_3src_vstride(src0.vstride) };
            let src1_vstride = self.a1_3src_vstride(src1.vstride);

            let inst = &mut self.store[idx];
            inst.set_a1_exec_type(&devinfo, exec_type.to_hw() as u64);
            inst.set_a1_dst_reg_file(&devinfo, dest.file.to_hw() as u64);
            inst.set_a1_dst_reg_nr(&devinfo, dest.nr as u64);
            inst.set_a1_dst_subreg_nr(&devinfo, (dest.subnr / 8) as u64);
            inst.set_a1_dst_hstride(&devinfo, 0);
            inst.set_a1_dst_type(&devinfo, dst_hw_type);
            inst.set_a1_src0_type(&devinfo, src0_hw_type);
            inst.set_a1_src1_type(&devinfo, src1_hw_type);
            inst.set_a1_src2_type(&devinfo, src2_hw_type);

            if src0.file == RegFile::Imm {
                assert!(src0.imm <= u16::MAX as u64);
                inst.set_a1_src0_imm(&devinfo, src0.imm);
                if devinfo.ver >= 12 {
                    inst.set_a1_src0_is_imm(&devinfo, 1);
                } else {
                    inst.set_a1_src0_reg_file(&devinfo, RegFile::Imm.to_hw() as u64);
                }
            } else {
                inst.set_a1_src0_vstride(&devinfo, src0_vstride);
                inst.set_a1_src0_hstride(&devinfo, src0.hstride.to_hw() as u64);
                inst.set_a1_src0_subreg_nr(&devinfo, src0.subnr as u64);
                if src0.rtype == RegType::Nf {
                    inst.set_a1_src0_reg_nr(&devinfo, ARF_ACCUMULATOR as u64);
                } else {
                    inst.set_a1_src0_reg_nr(&devinfo, src0.nr as u64);
                }
                inst.set_a1_src0_abs(&devinfo, src0.abs as u64);
                inst.set_a1_src0_negate(&devinfo, src0.negate as u64);
                inst.set_a1_src0_reg_file(&devinfo, src0.file.to_hw() as u64);
            }

            inst.set_a1_src1_vstride(&devinfo, src1_vstride);
            inst.set_a1_src1_hstride(&devinfo, src1.hstride.to_hw() as u64);
            inst.set_a1_src1_subreg_nr(&devinfo, src1.subnr as u64);
            if src1.file == RegFile::Arf {
                inst.set_a1_src1_reg_nr(&devinfo, ARF_ACCUMULATOR as u64);
            } else {
                inst.set_a1_src1_reg_nr(&devinfo, src1.nr as u64);
            }
            inst.set_a1_src1_abs(&devinfo, src1.abs as u64);
            inst.set_a1_src1_negate(&devinfo, src1.negate as u64);
            inst.set_a1_src1_reg_file(&devinfo, src1.file.to_hw() as u64);

            if src2.file == RegFile::Imm {
                assert!(src2.imm <= u16::MAX as u64);
                inst.set_a1_src2_imm(&devinfo, src2.imm);
                if devinfo.ver >= 12 {
                    inst.set_a1_src2_is_imm(&devinfo, 1);
                } else {
                    inst.set_a1_src2_reg_file(&devinfo, RegFile::Imm.to_hw() as u64);
                }
            } else {
                // No vertical stride on src2.
                inst.set_a1_src2_hstride(&devinfo, src2.hstride.to_hw() as u64);
                inst.set_a1_src2_subreg_nr(&devinfo, src2.subnr as u64);
                inst.set_a1_src2_reg_nr(&devinfo, src2.nr as u64);
                inst.set_a1_src2_abs(&devinfo, src2.abs as u64);
                inst.set_a1_src2_negate(&devinfo, src2.negate as u64);
                inst.set_a1_src2_reg_file(&devinfo, src2.file.to_hw() as u64);
            }

            assert!(
                src0.file == RegFile::Grf
                    || src0.file == RegFile::Imm
                    || (src0.file == RegFile::Arf && src0.rtype == RegType::Nf)
            );
            assert!(
                src1.file == RegFile::Grf
                    || (src1.file == RegFile::Arf && (src1.nr & 0xf0) == ARF_ACCUMULATOR)
            );
            assert!(src2.file == RegFile::Grf || src2.file == RegFile::Imm);
        } else {
            assert!(dest.file == RegFile::Grf || dest.file == RegFile::Mrf);
            assert!(matches!(
                dest.rtype,
                RegType::F | RegType::Df | RegType::D | RegType::Ud | RegType::Hf
            ));
            if dest.rtype == RegType::Hf {
                assert!(devinfo.ver >= 8);
            }

            let dst_hw_type = a16_3src_type_to_hw(&devinfo, dest.rtype).unwrap_or_else(|| {
                panic!("type {} is not a valid align16 3-source type", dest.rtype)
            }) as u64;

            let inst = &mut self.store[idx];
            if devinfo.ver == 6 {
                inst.set_a16_dst_reg_file(&devinfo, (dest.file == RegFile::Mrf) as u64);
            }
            inst.set_a16_dst_reg_nr(&devinfo, dest.nr as u64);
            inst.set_a16_dst_subreg_nr(&devinfo, (dest.subnr / 4) as u64);
            inst.set_a16_dst_writemask(&devinfo, dest.writemask as u64);

            for (s, src) in [&src0, &src1, &src2].into_iter().enumerate() {
                assert!(src.file == RegFile::Grf);
                inst.set_a16_src_swizzle(s, src.swizzle as u64);
                // Three-source sub-registers count 32-bit components,
                // not bytes.
                inst.set_a16_src_subreg_nr(s, (src.subnr / 4) as u64);
                inst.set_a16_src_reg_nr(s, src.nr as u64);
                inst.set_a16_src_abs(s, src.abs as u64);
                inst.set_a16_src_negate(s, src.negate as u64);
                inst.set_a16_src_rep_ctrl(s, (src.vstride == VStride::V0) as u64);
            }

            if devinfo.ver >= 7 {
                // Both type fields follow the destination type; the
                // per-source HF overrides are the only exception.
                inst.set_a16_src_type(&devinfo, dst_hw_type);
                inst.set_a16_dst_type(&devinfo, dst_hw_type);
                if src1.rtype == RegType::Hf {
                    inst.set_a16_src1_type_hf(&devinfo, 1);
                }
                if src2.rtype == RegType::Hf {
                    inst.set_a16_src2_type_hf(&devinfo, 1);
                }
            }
        }

        idx
    }

    // Helper surface --------------------------------------------------

    pub fn mov(&mut self, dest: Reg, src: Reg) -> usize {
        self.alu1(Opcode::Mov, dest, src)
    }

    pub fn not(&mut self, dest: Reg, src: Reg) -> usize {
        self.alu1(Opcode::Not, dest, src)
    }

    pub fn frc(&mut self, dest: Reg, src: Reg) -> usize {
        self.alu1(Opcode::Frc, dest, src)
    }

    pub fn rndd(&mut self, dest: Reg, src: Reg) -> usize {
        self.alu1(Opcode::Rndd, dest, src)
    }

    pub fn rnde(&mut self, dest: Reg, src: Reg) -> usize {
        self.alu1(Opcode::Rnde, dest, src)
    }

    pub fn rndz(&mut self, dest: Reg, src: Reg) -> usize {
        self.alu1(Opcode::Rndz, dest, src)
    }

    pub fn lzd(&mut self, dest: Reg, src: Reg) -> usize {
        self.alu1(Opcode::Lzd, dest, src)
    }

    pub fn add(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        self.alu2(Opcode::Add, dest, src0, src1)
    }

    pub fn mul(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        self.alu2(Opcode::Mul, dest, src0, src1)
    }

    pub fn avg(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        self.alu2(Opcode::Avg, dest, src0, src1)
    }

    pub fn and(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        self.alu2(Opcode::And, dest, src0, src1)
    }

    pub fn or(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        self.alu2(Opcode::Or, dest, src0, src1)
    }

    pub fn xor(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        self.alu2(Opcode::Xor, dest, src0, src1)
    }

    pub fn shl(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        self.alu2(Opcode::Shl, dest, src0, src1)
    }

    pub fn shr(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        self.alu2(Opcode::Shr, dest, src0, src1)
    }

    pub fn asr(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        self.alu2(Opcode::Asr, dest, src0, src1)
    }

    pub fn sel(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        self.alu2(Opcode::Sel, dest, src0, src1)
    }

    pub fn mac(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        self.alu2(Opcode::Mac, dest, src0, src1)
    }

    pub fn mach(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        let idx = self.alu2(Opcode::Mach, dest, src0, src1);
        if self.devinfo.ver >= 6 && self.devinfo.ver < 12 {
            self.store[idx].set_acc_wr_control(&self.devinfo, 1);
        }
        idx
    }

    pub fn dp2(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        self.alu2(Opcode::Dp2, dest, src0, src1)
    }

    pub fn dp3(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        self.alu2(Opcode::Dp3, dest, src0, src1)
    }

    pub fn dp4(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        self.alu2(Opcode::Dp4, dest, src0, src1)
    }

    pub fn dph(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        self.alu2(Opcode::Dph, dest, src0, src1)
    }

    pub fn line(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        self.alu2(Opcode::Line, dest, src0, src1)
    }

    pub fn pln(&mut self, dest: Reg, src0: Reg, src1: Reg) -> usize {
        self.alu2(Opcode::Pln, dest, src0, src1)
    }

    pub fn mad(&mut self, dest: Reg, src0: Reg, src1: Reg, src2: Reg) -> usize {
        self.alu3(Opcode::Mad, dest, src0, src1, src2)
    }

    pub fn lrp(&mut self, dest: Reg, src0: Reg, src1: Reg, src2: Reg) -> usize {
        assert!(self.devinfo.ver >= 6 && self.devinfo.ver <= 11);
        self.alu3(Opcode::Lrp, dest, src0, src1, src2)
    }

    /// Flag-writing compare.
    pub fn cmp(&mut self, dest: Reg, cond: CondModifier, src0: Reg, src1: Reg) -> usize {
        let idx = self.alu2(Opcode::Cmp, dest, src0, src1);
        self.store[idx].set_cond_modifier(&self.devinfo, cond as u64);
        self.cmp_null_dst_workaround(idx, &dest);
        idx
    }

    pub fn cmpn(&mut self, dest: Reg, cond: CondModifier, src0: Reg, src1: Reg) -> usize {
        let idx = self.alu2(Opcode::Cmpn, dest, src0, src1);
        self.store[idx].set_cond_modifier(&self.devinfo, cond as u64);
        self.cmp_null_dst_workaround(idx, &dest);
        idx
    }

    // A compare discarding its result must take the thread switch on
    // Gen7, or the EU can miss the flag update.
    fn cmp_null_dst_workaround(&mut self, idx: usize, dest: &Reg) {
        if self.devinfo.ver == 7 && dest.is_null() {
            self.store[idx].set_thread_control(&self.devinfo, 1);
        }
    }

    /// Extended math, Gen6+ two-operand form. One-operand functions take
    /// a null src1.
    pub fn math(&mut self, function: MathFunction, dest: Reg, src0: Reg, src1: Reg) -> usize {
        assert!(self.devinfo.ver >= 6, "shared-function math uses sends before Gen6");
        let idx = self.next_inst(Opcode::Math);
        self.set_dest(idx, dest);
        self.set_src0(idx, src0);
        self.set_src1(idx, src1);
        self.store[idx].set_math_function(&self.devinfo, function as u64);
        idx
    }

    pub fn nop(&mut self) -> usize {
        self.next_inst(Opcode::Nop)
    }

    /// Gen12 scoreboard sync; the function selector shares the
    /// condition-modifier field.
    pub fn sync_nop(&mut self) -> usize {
        assert!(self.devinfo.ver >= 12);
        let idx = self.next_inst(Opcode::Sync);
        self.set_dest(idx, Reg::null().retype(RegType::Ud).vec1());
        self.set_src0(idx, Reg::null().retype(RegType::Ud).vec1());
        idx
    }

    /// Indexed jump; the displacement is patched by
    /// [`CodeBuilder::land_fwd_jump`].
    pub fn jmpi(&mut self, index: Reg) -> usize {
        let idx = self.next_inst(Opcode::Jmpi);
        self.set_dest(idx, Reg::ip());
        self.set_src0(idx, Reg::ip());
        self.set_src1(idx, index);
        let devinfo = self.devinfo;
        self.store[idx].set_exec_size(&devinfo, ExecSize::E1.to_hw() as u64);
        self.store[idx].set_mask_control(&devinfo, MaskControl::Disable as u64);
        idx
    }

    /// Message send. The caller provides the descriptor; this writes the
    /// opcode-side fields.
    pub fn send(&mut self, op: Opcode, dest: Reg, payload: Reg, sfid: u32, desc: u32, eot: bool) -> usize {
        assert!(is_send_opcode(op));
        let idx = self.next_inst(op);
        self.set_dest(idx, dest);
        self.set_src0(idx, payload);
        let devinfo = self.devinfo;
        let inst = &mut self.store[idx];
        inst.set_send_desc(&devinfo, desc as u64);
        inst.set_sfid(&devinfo, sfid as u64);
        inst.set_eot(&devinfo, eot as u64);
        idx
    }

    /// Packs message length, response length, and header presence into a
    /// descriptor dword the way the descriptor field expects them.
    pub fn message_desc(&self, mlen: u32, rlen: u32, header_present: bool) -> u32 {
        debug_assert!(mlen < 16 && rlen < 32);
        (mlen << 25) | (rlen << 20) | ((header_present as u32) << 19)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devinfo::Platform;

    fn isa(verx10: u32) -> IsaInfo {
        IsaInfo::new(DeviceInfo::new(verx10, Platform::Main))
    }

    #[test]
    fn state_push_pop_is_identity() {
        let isa = isa(90);
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        let before = *p.current_state();
        p.push_state();
        p.set_default_exec_size(ExecSize::E16);
        p.set_default_mask_control(MaskControl::Disable);
        p.pop_state();
        assert_eq!(*p.current_state(), before);
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn popping_initial_state_is_a_bug() {
        let isa = isa(90);
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.pop_state();
    }

    #[test]
    fn default_state_is_applied_to_new_instructions() {
        let isa = isa(90);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.set_default_exec_size(ExecSize::E16);
        p.set_default_mask_control(MaskControl::Disable);
        let idx = p.mov(Reg::grf(1), Reg::grf(2));
        let inst = p.inst(idx);
        assert_eq!(inst.exec_size(&devinfo), ExecSize::E16.to_hw() as u64);
        assert_eq!(inst.mask_control(&devinfo), MaskControl::Disable as u64);
    }

    #[test]
    fn mrf_remap_on_gen7() {
        let isa = isa(75);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        let idx = p.mov(Reg::mrf(2), Reg::grf(0));
        let inst = p.inst(idx);
        assert_eq!(inst.dst_reg_file(&devinfo), RegFile::Grf.to_hw() as u64);
        assert_eq!(inst.dst_da_reg_nr(&devinfo), (MRF_HACK_START + 2) as u64);
    }

    #[test]
    fn mrf_survives_on_gen6() {
        let isa = isa(60);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        let idx = p.mov(Reg::mrf(2), Reg::grf(0));
        assert_eq!(p.inst(idx).dst_reg_file(&devinfo), RegFile::Mrf.to_hw() as u64);
    }

    #[test]
    fn null_byte_dest_stride_widened() {
        let isa = isa(90);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        let dest = Reg::null().retype(RegType::Ub);
        let idx = p.add(
            dest,
            Reg::grf(0).retype(RegType::Ub),
            Reg::grf(1).retype(RegType::Ub),
        );
        assert_eq!(p.inst(idx).dst_hstride(&devinfo), HStride::H2.to_hw() as u64);
    }

    #[test]
    fn src0_imm_mirrors_type_into_src1_before_gen12() {
        let isa = isa(90);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        let idx = p.mov(Reg::grf(1), Reg::imm_f(1.0));
        let inst = p.inst(idx);
        assert_eq!(inst.src1_reg_file(&devinfo), RegFile::Arf.to_hw() as u64);
        assert_eq!(inst.src1_reg_hw_type(&devinfo), inst.src0_reg_hw_type(&devinfo));
        assert_eq!(inst.imm_ud(&devinfo), 1.0f32.to_bits() as u64);
    }

    #[test]
    fn scalar_source_region_collapses() {
        let isa = isa(90);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.set_default_exec_size(ExecSize::E1);
        let idx = p.mov(Reg::grf(1).vec1(), Reg::grf(2).vec1());
        let inst = p.inst(idx);
        assert_eq!(inst.src0_vstride(&devinfo), 0);
        assert_eq!(inst.src0_width(&devinfo), 0);
        assert_eq!(inst.src0_hstride(&devinfo), 0);
    }

    #[test]
    fn align16_vstride8_rewritten_to_4() {
        let isa = isa(75);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.set_default_access_mode(AccessMode::Align16);
        let idx = p.mov(Reg::grf(1), Reg::grf(2));
        assert_eq!(p.inst(idx).src0_vstride(&devinfo), VStride::V4.to_hw() as u64);
    }

    #[test]
    #[should_panic]
    fn df_immediate_rejected_without_64bit() {
        let isa = isa(120);
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.mov(Reg::grf(1).retype(RegType::Df), Reg::imm_df(1.0));
    }

    #[test]
    #[should_panic(expected = "src0-only")]
    fn accumulator_as_src1_is_a_bug() {
        let isa = isa(90);
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.add(Reg::grf(0), Reg::grf(1), Reg::acc(0));
    }

    #[test]
    fn swsb_default_applied_on_gen12() {
        let isa = isa(120);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.set_default_swsb(Swsb::regdist(2));
        let idx = p.mov(Reg::grf(1), Reg::grf(2));
        let bits = p.inst(idx).swsb(&devinfo) as u16;
        assert_eq!(swsb::decode(&devinfo, false, bits), Swsb::regdist(2));
    }

    #[test]
    fn relocations_accumulate() {
        let isa = isa(90);
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        let idx = p.mov(Reg::grf(1).retype(RegType::Ud), Reg::imm_ud(0));
        p.add_reloc(7, RelocKind::MovImm32, (idx * INST_SIZE) as u32, 42);
        assert_eq!(p.relocs().len(), 1);
        assert_eq!(p.relocs()[0].id, 7);
    }

    #[test]
    fn append_data_pads_with_zeros() {
        let isa = isa(90);
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.mov(Reg::grf(1), Reg::grf(2));
        let offset = p.append_data(&[0xaa; 20], 32);
        assert_eq!(offset, 32);
        let bytes = p.program();
        // Alignment padding and the tail of the partial word are zero.
        assert!(bytes[INST_SIZE..32].iter().all(|&b| b == 0));
        assert!(bytes[32..52].iter().all(|&b| b == 0xaa));
        assert!(bytes[52..64].iter().all(|&b| b == 0));
    }

    #[test]
    fn automatic_exec_size_narrowing() {
        let isa = isa(90);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(
            &isa,
            BuilderOptions { automatic_exec_sizes: true, ..Default::default() },
        );
        let idx = p.mov(Reg::grf(1).vec2(), Reg::grf(2).vec2());
        assert_eq!(p.inst(idx).exec_size(&devinfo), ExecSize::E2.to_hw() as u64);
    }

    #[test]
    fn mad_align16_shares_dest_type() {
        let isa = isa(75);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.set_default_access_mode(AccessMode::Align16);
        let idx = p.mad(Reg::grf(1), Reg::grf(2), Reg::grf(3), Reg::grf(4));
        let inst = p.inst(idx);
        assert_eq!(inst.a16_dst_type(&devinfo), inst.a16_src_type(&devinfo));
    }

    #[test]
    fn mad_align1_per_operand_types() {
        let isa = isa(120);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        let idx = p.mad(
            Reg::grf(1).retype(RegType::F),
            Reg::grf(2).retype(RegType::Hf),
            Reg::grf(3).retype(RegType::F),
            Reg::grf(4).retype(RegType::Hf),
        );
        let inst = p.inst(idx);
        assert_eq!(inst.a1_exec_type(&devinfo), ExecType::Float.to_hw() as u64);
        assert_eq!(inst.a1_src0_type(&devinfo), 1);
        assert_eq!(inst.a1_src1_type(&devinfo), 0);
        assert_eq!(inst.a1_src2_type(&devinfo), 1);
    }

    #[test]
    fn dump_and_override_round_trip() {
        let dir = std::env::temp_dir().join("gen-eu-assembler-dump-test");
        std::fs::create_dir_all(&dir).unwrap();
        let isa = isa(90);

        let mut p = CodeBuilder::new(
            &isa,
            BuilderOptions {
                label: "t".into(),
                dump_dir: Some(dir.clone()),
                ..Default::default()
            },
        );
        p.mov(Reg::grf(1), Reg::grf(2));
        let bytes = p.finish().unwrap();
        assert_eq!(bytes.len(), INST_SIZE);

        // A second session with the dump as override reads it back even
        // though it emits nothing itself.
        let q = CodeBuilder::new(
            &isa,
            BuilderOptions {
                label: "t".into(),
                override_dir: Some(dir.clone()),
                ..Default::default()
            },
        );
        assert_eq!(q.finish().unwrap(), bytes);

        std::fs::remove_dir_all(&dir).ok();
    }
}
