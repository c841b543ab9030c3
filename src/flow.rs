//! Structured control-flow assembly: IF/ELSE/ENDIF and DO/WHILE with
//! BREAK/CONTINUE/HALT, plus the jump-target fixup passes.
//!
//! Branch targets are not known at emission time, so the assembler
//! pushes the emitting instruction's index on a stack, emits a
//! placeholder displacement, and patches it when the structure closes.
//! On the oldest generations running single-program-flow the IF/ELSE
//! opcodes are rewritten into plain instruction-pointer ADDs instead of
//! patched. A final whole-program pass ([`CodeBuilder::set_uip_jip`])
//! resolves BREAK/CONTINUE/HALT displacements on Gen6+ by scanning for
//! the enclosing block ends.

use log::trace;

use crate::builder::CodeBuilder;
use crate::inst::INST_SIZE;
use crate::opcode::Opcode;
use crate::regs::{CondModifier, ExecSize, MaskControl, Predicate, Reg};
use crate::types::RegType;

fn null_d() -> Reg {
    Reg::null().retype(RegType::D).vec1()
}

impl<'a> CodeBuilder<'a> {
    fn opcode_at(&self, idx: usize) -> Option<Opcode> {
        self.isa.opcode(self.inst(idx))
    }

    fn push_if_stack(&mut self, idx: usize) {
        self.if_stack.push(idx);
    }

    fn pop_if_stack(&mut self) -> usize {
        self.if_stack.pop().expect("if stack underflow")
    }

    fn push_loop_stack(&mut self, idx: usize) {
        self.loop_stack.push(idx);
        self.if_depth_in_loop.push(0);
    }

    fn inner_do_idx(&self) -> usize {
        *self.loop_stack.last().expect("loop stack underflow")
    }

    /// Emits an IF, pushing it for the matching `else_`/`endif_`.
    pub fn if_(&mut self, exec_size: ExecSize) -> usize {
        let devinfo = self.devinfo;
        let idx = self.next_inst(Opcode::If);

        if devinfo.ver < 6 {
            self.set_dest(idx, Reg::ip());
            self.set_src0(idx, Reg::ip());
            self.set_src1(idx, Reg::imm_d(0));
        } else if devinfo.ver == 6 {
            self.set_dest(idx, Reg::imm_w(0));
            self.inst_mut(idx).set_gfx6_jump_count(&devinfo, 0);
            self.set_src0(idx, null_d());
            self.set_src1(idx, null_d());
        } else if devinfo.ver == 7 {
            self.set_dest(idx, null_d());
            self.set_src0(idx, null_d());
            self.set_src1(idx, Reg::imm_w(0));
            self.inst_mut(idx).set_jip(&devinfo, 0);
            self.inst_mut(idx).set_uip(&devinfo, 0);
        } else {
            self.set_dest(idx, null_d());
            if devinfo.ver < 12 {
                self.set_src0(idx, Reg::imm_d(0));
            }
            self.inst_mut(idx).set_jip(&devinfo, 0);
            self.inst_mut(idx).set_uip(&devinfo, 0);
        }

        let inst = self.inst_mut(idx);
        inst.set_exec_size(&devinfo, exec_size.to_hw() as u64);
        inst.set_qtr_control(&devinfo, 0);
        inst.set_pred_control(&devinfo, Predicate::Normal as u64);
        inst.set_mask_control(&devinfo, MaskControl::Enable as u64);
        if !self.options().single_program_flow && devinfo.ver < 6 {
            self.inst_mut(idx).set_thread_control(&devinfo, 1);
        }

        self.push_if_stack(idx);
        *self.if_depth_in_loop.last_mut().unwrap() += 1;
        idx
    }

    /// Gen6-only IF form with an embedded comparison.
    pub fn gfx6_if(&mut self, cond: CondModifier, src0: Reg, src1: Reg) -> usize {
        let devinfo = self.devinfo;
        assert!(devinfo.ver == 6);
        let idx = self.next_inst(Opcode::If);

        self.set_dest(idx, Reg::imm_w(0));
        let exec = self.current_state().exec_size;
        self.inst_mut(idx).set_exec_size(&devinfo, exec.to_hw() as u64);
        self.inst_mut(idx).set_gfx6_jump_count(&devinfo, 0);
        self.set_src0(idx, src0);
        self.set_src1(idx, src1);

        assert!(self.inst(idx).qtr_control(&devinfo) == 0);
        assert!(self.inst(idx).pred_control(&devinfo) == Predicate::None as u64);
        self.inst_mut(idx).set_cond_modifier(&devinfo, cond as u64);

        self.push_if_stack(idx);
        idx
    }

    pub fn else_(&mut self) {
        let devinfo = self.devinfo;
        let idx = self.next_inst(Opcode::Else);

        if devinfo.ver < 6 {
            self.set_dest(idx, Reg::ip());
            self.set_src0(idx, Reg::ip());
            self.set_src1(idx, Reg::imm_d(0));
        } else if devinfo.ver == 6 {
            self.set_dest(idx, Reg::imm_w(0));
            self.inst_mut(idx).set_gfx6_jump_count(&devinfo, 0);
            self.set_src0(idx, null_d());
            self.set_src1(idx, null_d());
        } else if devinfo.ver == 7 {
            self.set_dest(idx, null_d());
            self.set_src0(idx, null_d());
            self.set_src1(idx, Reg::imm_w(0));
            self.inst_mut(idx).set_jip(&devinfo, 0);
            self.inst_mut(idx).set_uip(&devinfo, 0);
        } else {
            self.set_dest(idx, null_d());
            if devinfo.ver < 12 {
                self.set_src0(idx, Reg::imm_d(0));
            }
            self.inst_mut(idx).set_jip(&devinfo, 0);
            self.inst_mut(idx).set_uip(&devinfo, 0);
        }

        let inst = self.inst_mut(idx);
        inst.set_qtr_control(&devinfo, 0);
        inst.set_mask_control(&devinfo, MaskControl::Enable as u64);
        if !self.options().single_program_flow && devinfo.ver < 6 {
            self.inst_mut(idx).set_thread_control(&devinfo, 1);
        }

        // Both the IF and the ELSE sit on the stack until the ENDIF.
        self.push_if_stack(idx);
    }

    /// In single-program-flow mode the IF and ELSE become predicated
    /// ADDs on the instruction pointer, and no ENDIF exists at all.
    fn convert_if_else_to_add(&mut self, if_idx: usize, else_idx: Option<usize>) {
        let devinfo = self.devinfo;
        let next_idx = self.inst_count();

        assert!(self.options().single_program_flow);
        assert!(self.opcode_at(if_idx) == Some(Opcode::If));
        assert!(else_idx.map_or(true, |e| self.opcode_at(e) == Some(Opcode::Else)));
        assert!(self.inst(if_idx).exec_size(&devinfo) == ExecSize::E1.to_hw() as u64);

        let add = self.isa.hw_opcode(Opcode::Add) as u64;

        // The IF jumps (with inverted predicate) to the first ELSE-block
        // instruction, or to where the ENDIF would have been.
        self.inst_mut(if_idx).set_hw_opcode(&devinfo, add);
        self.inst_mut(if_idx).set_pred_inv(&devinfo, 1);

        if let Some(else_idx) = else_idx {
            self.inst_mut(else_idx).set_hw_opcode(&devinfo, add);
            let if_delta = ((else_idx - if_idx + 1) * INST_SIZE) as u64;
            let else_delta = ((next_idx - else_idx) * INST_SIZE) as u64;
            self.inst_mut(if_idx).set_imm_ud(&devinfo, if_delta);
            self.inst_mut(else_idx).set_imm_ud(&devinfo, else_delta);
        } else {
            let if_delta = ((next_idx - if_idx) * INST_SIZE) as u64;
            self.inst_mut(if_idx).set_imm_ud(&devinfo, if_delta);
        }
    }

    fn patch_if_else(&mut self, if_idx: usize, else_idx: Option<usize>, endif_idx: usize) {
        let devinfo = self.devinfo;

        if devinfo.ver < 6 {
            assert!(!self.options().single_program_flow);
        }

        assert!(self.opcode_at(if_idx) == Some(Opcode::If));
        assert!(self.opcode_at(endif_idx) == Some(Opcode::Endif));
        assert!(else_idx.map_or(true, |e| self.opcode_at(e) == Some(Opcode::Else)));

        let br = devinfo.jump_scale() as i64;
        let if_exec = self.inst(if_idx).exec_size(&devinfo);
        self.inst_mut(endif_idx).set_exec_size(&devinfo, if_exec);

        match else_idx {
            None => {
                let dist = (endif_idx - if_idx) as i64;
                if devinfo.ver < 6 {
                    // Rewrite into IFF: no mask-stack work for all-false,
                    // jumping past the ENDIF.
                    let iff = self.isa.hw_opcode(Opcode::Iff) as u64;
                    let inst = self.inst_mut(if_idx);
                    inst.set_hw_opcode(&devinfo, iff);
                    inst.set_gfx4_jump_count(&devinfo, br * (dist + 1));
                    inst.set_gfx4_pop_count(&devinfo, 0);
                } else if devinfo.ver == 6 {
                    self.inst_mut(if_idx).set_gfx6_jump_count(&devinfo, br * dist);
                } else {
                    self.inst_mut(if_idx).set_uip(&devinfo, br * dist);
                    self.inst_mut(if_idx).set_jip(&devinfo, br * dist);
                }
            }
            Some(else_idx) => {
                self.inst_mut(else_idx).set_exec_size(&devinfo, if_exec);

                // IF jumps into the ELSE block.
                let if_to_else = (else_idx - if_idx) as i64;
                let if_to_endif = (endif_idx - if_idx) as i64;
                let else_to_endif = (endif_idx - else_idx) as i64;
                if devinfo.ver < 6 {
                    let inst = self.inst_mut(if_idx);
                    inst.set_gfx4_jump_count(&devinfo, br * if_to_else);
                    inst.set_gfx4_pop_count(&devinfo, 0);
                } else if devinfo.ver == 6 {
                    self.inst_mut(if_idx).set_gfx6_jump_count(&devinfo, br * (if_to_else + 1));
                }

                if devinfo.ver < 6 {
                    // ELSE points just past the matching ENDIF.
                    let inst = self.inst_mut(else_idx);
                    inst.set_gfx4_jump_count(&devinfo, br * (else_to_endif + 1));
                    inst.set_gfx4_pop_count(&devinfo, 1);
                } else if devinfo.ver == 6 {
                    self.inst_mut(else_idx).set_gfx6_jump_count(&devinfo, br * else_to_endif);
                } else {
                    // IF's JIP points just past the ELSE; its UIP and
                    // the ELSE's JIP point at the ENDIF.
                    self.inst_mut(if_idx).set_jip(&devinfo, br * (if_to_else + 1));
                    self.inst_mut(if_idx).set_uip(&devinfo, br * if_to_endif);

                    if devinfo.has_branch_ctrl {
                        // Target the NOP landing pad inserted before the
                        // ENDIF; jumping at the ENDIF itself can leave
                        // the program running with all channels disabled
                        // on these generations.
                        self.inst_mut(else_idx).set_jip(&devinfo, br * (else_to_endif - 1));
                        self.inst_mut(else_idx).set_branch_control(&devinfo, 1);
                    } else {
                        self.inst_mut(else_idx).set_jip(&devinfo, br * else_to_endif);
                    }

                    if devinfo.ver >= 8 {
                        self.inst_mut(else_idx).set_uip(&devinfo, br * else_to_endif);
                    }
                }
            }
        }
    }

    pub fn endif_(&mut self) {
        let devinfo = self.devinfo;

        assert!(!self.if_stack.is_empty(), "ENDIF without matching IF");

        if devinfo.has_branch_ctrl
            && self.opcode_at(*self.if_stack.last().unwrap()) == Some(Opcode::Else)
        {
            // Landing pad for the branch-controlled ELSE; see
            // `patch_if_else`.
            self.nop();
        }

        // Pre-Gen6 single-program-flow expresses IF/ELSE as IP
        // arithmetic; the ENDIF would be dead weight.
        let emit_endif = !(devinfo.ver < 6 && self.options().single_program_flow);

        let endif_idx = if emit_endif { Some(self.next_inst(Opcode::Endif)) } else { None };

        // The embedded-compare IF form never counted itself, so the
        // depth may already be zero here.
        let depth = self.if_depth_in_loop.last_mut().unwrap();
        *depth = depth.saturating_sub(1);
        let mut tmp = self.pop_if_stack();
        let mut else_idx = None;
        if self.opcode_at(tmp) == Some(Opcode::Else) {
            else_idx = Some(tmp);
            tmp = self.pop_if_stack();
        }
        let if_idx = tmp;

        let endif_idx = match endif_idx {
            None => {
                self.convert_if_else_to_add(if_idx, else_idx);
                return;
            }
            Some(idx) => idx,
        };

        if devinfo.ver < 6 {
            self.set_dest(endif_idx, null_d());
            self.set_src0(endif_idx, null_d());
            self.set_src1(endif_idx, Reg::imm_d(0));
        } else if devinfo.ver == 6 {
            self.set_dest(endif_idx, Reg::imm_w(0));
            self.set_src0(endif_idx, null_d());
            self.set_src1(endif_idx, null_d());
        } else if devinfo.ver == 7 {
            self.set_dest(endif_idx, null_d());
            self.set_src0(endif_idx, null_d());
            self.set_src1(endif_idx, Reg::imm_w(0));
        } else {
            self.set_src0(endif_idx, Reg::imm_d(0));
        }

        {
            let inst = self.inst_mut(endif_idx);
            inst.set_qtr_control(&devinfo, 0);
            inst.set_mask_control(&devinfo, MaskControl::Enable as u64);
        }
        if devinfo.ver < 6 {
            self.inst_mut(endif_idx).set_thread_control(&devinfo, 1);
        }

        // The ENDIF also pops the mask stack entry.
        if devinfo.ver < 6 {
            let inst = self.inst_mut(endif_idx);
            inst.set_gfx4_jump_count(&devinfo, 0);
            inst.set_gfx4_pop_count(&devinfo, 1);
        } else if devinfo.ver == 6 {
            self.inst_mut(endif_idx).set_gfx6_jump_count(&devinfo, 2);
        } else {
            self.inst_mut(endif_idx).set_jip(&devinfo, 2);
        }

        self.patch_if_else(if_idx, else_idx, endif_idx);
    }

    pub fn break_(&mut self) -> usize {
        let devinfo = self.devinfo;
        let idx = self.next_inst(Opcode::Break);
        if devinfo.ver >= 8 {
            self.set_dest(idx, null_d());
            if devinfo.ver < 12 {
                self.set_src0(idx, Reg::imm_d(0));
            }
        } else if devinfo.ver >= 6 {
            self.set_dest(idx, null_d());
            self.set_src0(idx, null_d());
            self.set_src1(idx, Reg::imm_d(0));
        } else {
            self.set_dest(idx, Reg::ip());
            self.set_src0(idx, Reg::ip());
            self.set_src1(idx, Reg::imm_d(0));
            let depth = *self.if_depth_in_loop.last().unwrap();
            self.inst_mut(idx).set_gfx4_pop_count(&devinfo, depth as u64);
        }
        let exec = self.current_state().exec_size;
        let inst = self.inst_mut(idx);
        inst.set_qtr_control(&devinfo, 0);
        inst.set_exec_size(&devinfo, exec.to_hw() as u64);
        idx
    }

    pub fn cont_(&mut self) -> usize {
        let devinfo = self.devinfo;
        let idx = self.next_inst(Opcode::Continue);
        self.set_dest(idx, Reg::ip());
        if devinfo.ver >= 8 {
            if devinfo.ver < 12 {
                self.set_src0(idx, Reg::imm_d(0));
            }
        } else {
            self.set_src0(idx, Reg::ip());
            self.set_src1(idx, Reg::imm_d(0));
        }

        if devinfo.ver < 6 {
            let depth = *self.if_depth_in_loop.last().unwrap();
            self.inst_mut(idx).set_gfx4_pop_count(&devinfo, depth as u64);
        }
        let exec = self.current_state().exec_size;
        let inst = self.inst_mut(idx);
        inst.set_qtr_control(&devinfo, 0);
        inst.set_exec_size(&devinfo, exec.to_hw() as u64);
        idx
    }

    /// HALT: the UIP is the caller's to provide (program epilogue); the
    /// JIP is filled in by [`CodeBuilder::set_uip_jip`].
    pub fn halt(&mut self) -> usize {
        let devinfo = self.devinfo;
        let idx = self.next_inst(Opcode::Halt);
        self.set_dest(idx, null_d());
        if devinfo.ver < 6 {
            self.set_dest(idx, Reg::ip());
            self.set_src0(idx, Reg::ip());
            self.set_src1(idx, Reg::imm_d(0));
        } else if devinfo.ver < 8 {
            self.set_src0(idx, null_d());
            self.set_src1(idx, Reg::imm_d(0));
        } else if devinfo.ver < 12 {
            self.set_src0(idx, Reg::imm_d(0));
        }

        let exec = self.current_state().exec_size;
        let inst = self.inst_mut(idx);
        inst.set_qtr_control(&devinfo, 0);
        inst.set_exec_size(&devinfo, exec.to_hw() as u64);
        idx
    }

    /// Opens a loop. On Gen6+ the loop start is implicit (no DO
    /// instruction is emitted); the returned index is the first
    /// instruction of the loop body either way.
    pub fn do_(&mut self, exec_size: ExecSize) -> usize {
        let devinfo = self.devinfo;

        if devinfo.ver >= 6 || self.options().single_program_flow {
            let idx = self.inst_count();
            self.push_loop_stack(idx);
            idx
        } else {
            let idx = self.next_inst(Opcode::Do);
            self.push_loop_stack(idx);

            self.set_dest(idx, Reg::null());
            self.set_src0(idx, Reg::null());
            self.set_src1(idx, Reg::null());

            let inst = self.inst_mut(idx);
            inst.set_qtr_control(&devinfo, 0);
            inst.set_exec_size(&devinfo, exec_size.to_hw() as u64);
            inst.set_pred_control(&devinfo, Predicate::None as u64);
            idx
        }
    }

    /// Patches not-yet-visited BREAK/CONTINUE placeholders between the
    /// loop start and the WHILE. A zero jump count marks "not yet
    /// patched": inner loops have already filled theirs in, and this
    /// sentinel keeps nested loops from patching twice.
    fn patch_break_cont(&mut self, while_idx: usize) {
        let devinfo = self.devinfo;
        assert!(devinfo.ver < 6);
        let do_idx = self.inner_do_idx();
        let br = devinfo.jump_scale() as i64;

        let mut idx = while_idx - 1;
        while idx != do_idx {
            match self.opcode_at(idx) {
                Some(Opcode::Break) if self.inst(idx).gfx4_jump_count(&devinfo) == 0 => {
                    let count = br * ((while_idx - idx) as i64 + 1);
                    self.inst_mut(idx).set_gfx4_jump_count(&devinfo, count);
                }
                Some(Opcode::Continue) if self.inst(idx).gfx4_jump_count(&devinfo) == 0 => {
                    let count = br * (while_idx - idx) as i64;
                    self.inst_mut(idx).set_gfx4_jump_count(&devinfo, count);
                }
                _ => {}
            }
            idx -= 1;
        }
    }

    pub fn while_(&mut self) -> usize {
        let devinfo = self.devinfo;
        let br = devinfo.jump_scale() as i64;

        let idx = if devinfo.ver >= 6 {
            let idx = self.next_inst(Opcode::While);
            let do_idx = self.inner_do_idx();
            let back = do_idx as i64 - idx as i64;

            if devinfo.ver >= 8 {
                self.set_dest(idx, null_d());
                if devinfo.ver < 12 {
                    self.set_src0(idx, Reg::imm_d(0));
                }
                self.inst_mut(idx).set_jip(&devinfo, br * back);
            } else if devinfo.ver == 7 {
                self.set_dest(idx, null_d());
                self.set_src0(idx, null_d());
                self.set_src1(idx, Reg::imm_w(0));
                self.inst_mut(idx).set_jip(&devinfo, br * back);
            } else {
                self.set_dest(idx, Reg::imm_w(0));
                self.inst_mut(idx).set_gfx6_jump_count(&devinfo, br * back);
                self.set_src0(idx, null_d());
                self.set_src1(idx, null_d());
            }

            let exec = self.current_state().exec_size;
            self.inst_mut(idx).set_exec_size(&devinfo, exec.to_hw() as u64);
            idx
        } else if self.options().single_program_flow {
            let idx = self.next_inst(Opcode::Add);
            let do_idx = self.inner_do_idx();

            self.set_dest(idx, Reg::ip());
            self.set_src0(idx, Reg::ip());
            let delta = (do_idx as i64 - idx as i64) * INST_SIZE as i64;
            self.set_src1(idx, Reg::imm_d(delta as i32));
            self.inst_mut(idx).set_exec_size(&devinfo, ExecSize::E1.to_hw() as u64);
            idx
        } else {
            let idx = self.next_inst(Opcode::While);
            let do_idx = self.inner_do_idx();
            assert!(self.opcode_at(do_idx) == Some(Opcode::Do));

            self.set_dest(idx, Reg::ip());
            self.set_src0(idx, Reg::ip());
            self.set_src1(idx, Reg::imm_d(0));

            let do_exec = self.inst(do_idx).exec_size(&devinfo);
            let count = br * ((do_idx as i64 - idx as i64) + 1);
            let inst = self.inst_mut(idx);
            inst.set_exec_size(&devinfo, do_exec);
            inst.set_gfx4_jump_count(&devinfo, count);
            inst.set_gfx4_pop_count(&devinfo, 0);

            self.patch_break_cont(idx);
            idx
        };
        self.inst_mut(idx).set_qtr_control(&devinfo, 0);

        self.loop_stack.pop().expect("loop stack underflow");
        self.if_depth_in_loop.pop();
        assert!(!self.if_depth_in_loop.is_empty(), "loop stack underflow");

        idx
    }

    /// Patches a forward JMPI's displacement to land just past the last
    /// emitted instruction.
    pub fn land_fwd_jump(&mut self, jmp_idx: usize) {
        let devinfo = self.devinfo;
        let jmpi: i64 = if devinfo.ver >= 5 { 2 } else { 1 };

        assert!(self.opcode_at(jmp_idx) == Some(Opcode::Jmpi));
        assert!(self.inst(jmp_idx).src1_reg_file(&devinfo) == 3);

        let count = jmpi * (self.inst_count() as i64 - jmp_idx as i64 - 1);
        self.inst_mut(jmp_idx).set_gfx4_jump_count(&devinfo, count);
    }

    // Whole-program fixup ---------------------------------------------

    fn while_jumps_before_offset(&self, while_offset: i64, start_offset: i64) -> bool {
        let devinfo = self.devinfo;
        let scale = 16 / devinfo.jump_scale() as i64;
        let idx = (while_offset as usize) / INST_SIZE;
        let jip = if devinfo.ver == 6 {
            self.inst(idx).gfx6_jump_count(&devinfo)
        } else {
            self.inst(idx).jip(&devinfo)
        };
        debug_assert!(jip < 0);
        while_offset + jip * scale <= start_offset
    }

    /// Byte offset of the end of the block enclosing `start_offset`: the
    /// next ENDIF/ELSE/HALT at depth zero, or the first WHILE branching
    /// back past it. Returns 0 when no block end exists.
    fn find_next_block_end(&self, start_offset: i64) -> i64 {
        let mut depth = 0i32;
        let mut offset = start_offset + INST_SIZE as i64;
        let end = self.next_inst_offset() as i64;

        while offset < end {
            let idx = (offset as usize) / INST_SIZE;
            match self.opcode_at(idx) {
                Some(Opcode::If) => depth += 1,
                Some(Opcode::Endif) => {
                    if depth == 0 {
                        return offset;
                    }
                    depth -= 1;
                }
                Some(Opcode::While) => {
                    // A WHILE that doesn't jump back past us closes a
                    // sibling loop; ignore it.
                    if self.while_jumps_before_offset(offset, start_offset) && depth == 0 {
                        return offset;
                    }
                }
                Some(Opcode::Else) | Some(Opcode::Halt) => {
                    if depth == 0 {
                        return offset;
                    }
                }
                _ => {}
            }
            offset += INST_SIZE as i64;
        }
        0
    }

    /// Byte offset of the WHILE closing the loop that contains
    /// `start_offset`. There is no DO instruction on Gen6+, so the loop
    /// is recognized by its WHILE jumping back before the start.
    fn find_loop_end(&self, start_offset: i64) -> i64 {
        assert!(self.devinfo.ver >= 6);
        let mut offset = start_offset + INST_SIZE as i64;
        let end = self.next_inst_offset() as i64;

        while offset < end {
            let idx = (offset as usize) / INST_SIZE;
            if self.opcode_at(idx) == Some(Opcode::While)
                && self.while_jumps_before_offset(offset, start_offset)
            {
                return offset;
            }
            offset += INST_SIZE as i64;
        }
        panic!("loop has no closing WHILE");
    }

    /// Whole-program pass filling in the JIP/UIP of BREAK, CONTINUE,
    /// ENDIF, and HALT once the routine is fully assembled. Gen6+ only;
    /// earlier generations were patched as each construct closed.
    pub fn set_uip_jip(&mut self, start_offset: usize) {
        let devinfo = self.devinfo;
        if devinfo.ver < 6 {
            return;
        }

        let br = devinfo.jump_scale() as i64;
        let scale = 16 / br;
        let end = self.next_inst_offset() as i64;
        let mut offset = start_offset as i64;

        while offset < end {
            let idx = (offset as usize) / INST_SIZE;
            assert!(self.inst(idx).cmpt_control(&devinfo) == 0);

            match self.opcode_at(idx) {
                Some(Opcode::Break) => {
                    let block_end = self.find_next_block_end(offset);
                    assert!(block_end != 0);
                    let loop_end = self.find_loop_end(offset);
                    trace!("patch break at {offset}: jip -> {block_end}, uip -> {loop_end}");
                    let jip = (block_end - offset) / scale;
                    // Gen6 points just after the WHILE; Gen7+ at it.
                    let uip = (loop_end - offset + if devinfo.ver == 6 { 16 } else { 0 }) / scale;
                    self.inst_mut(idx).set_jip(&devinfo, jip);
                    self.inst_mut(idx).set_uip(&devinfo, uip);
                }
                Some(Opcode::Continue) => {
                    let block_end = self.find_next_block_end(offset);
                    assert!(block_end != 0);
                    let loop_end = self.find_loop_end(offset);
                    let jip = (block_end - offset) / scale;
                    let uip = (loop_end - offset) / scale;
                    self.inst_mut(idx).set_jip(&devinfo, jip);
                    self.inst_mut(idx).set_uip(&devinfo, uip);
                    assert!(self.inst(idx).uip(&devinfo) != 0);
                    assert!(self.inst(idx).jip(&devinfo) != 0);
                }
                Some(Opcode::Endif) => {
                    let block_end = self.find_next_block_end(offset);
                    let jump = if block_end == 0 { br } else { (block_end - offset) / scale };
                    if devinfo.ver >= 7 {
                        self.inst_mut(idx).set_jip(&devinfo, jump);
                    } else {
                        self.inst_mut(idx).set_gfx6_jump_count(&devinfo, jump);
                    }
                }
                Some(Opcode::Halt) => {
                    // The UIP was set by whoever emitted the HALT. A halt
                    // outside any conditional block jumps to its own UIP;
                    // inside one, the JIP is the innermost block end.
                    let block_end = self.find_next_block_end(offset);
                    if block_end == 0 {
                        let uip = self.inst(idx).uip(&devinfo);
                        self.inst_mut(idx).set_jip(&devinfo, uip);
                    } else {
                        self.inst_mut(idx).set_jip(&devinfo, (block_end - offset) / scale);
                    }
                    assert!(self.inst(idx).uip(&devinfo) != 0);
                    assert!(self.inst(idx).jip(&devinfo) != 0);
                }
                _ => {}
            }
            offset += INST_SIZE as i64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuilderOptions;
    use crate::devinfo::{DeviceInfo, Platform};
    use crate::opcode::IsaInfo;

    fn isa(verx10: u32) -> IsaInfo {
        IsaInfo::new(DeviceInfo::new(verx10, Platform::Main))
    }

    fn emit_add(p: &mut CodeBuilder<'_>) {
        p.add(Reg::grf(1), Reg::grf(2), Reg::grf(3));
    }

    #[test]
    fn if_else_endif_patching_gen8() {
        let isa = isa(80);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());

        let if_idx = p.if_(ExecSize::E8);
        emit_add(&mut p);
        p.else_();
        emit_add(&mut p);
        p.endif_();

        // Layout: IF, ADD, ELSE, ADD, NOP (branch-ctrl landing pad),
        // ENDIF.
        assert_eq!(p.inst_count(), 6);
        let else_idx = 2;
        let endif_idx = 5;
        let br = devinfo.jump_scale() as i64;

        let if_inst = p.inst(if_idx);
        assert_eq!(if_inst.jip(&devinfo), br * (else_idx - if_idx as i64 + 1));
        assert_eq!(if_inst.uip(&devinfo), br * (endif_idx - if_idx as i64));

        // Branch-controlled ELSE lands on the NOP before the ENDIF.
        let else_inst = p.inst(else_idx as usize);
        assert_eq!(else_inst.branch_control(&devinfo), 1);
        assert_eq!(else_inst.jip(&devinfo), br * (endif_idx - else_idx - 1));
        assert_eq!(else_inst.uip(&devinfo), br * (endif_idx - else_idx));
    }

    #[test]
    fn if_else_endif_patching_gen11_no_nop() {
        let isa = isa(110);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());

        let if_idx = p.if_(ExecSize::E8);
        emit_add(&mut p);
        p.else_();
        emit_add(&mut p);
        p.endif_();

        // No erratum NOP outside the Gen8..10 window.
        assert_eq!(p.inst_count(), 5);
        let br = devinfo.jump_scale() as i64;
        let else_inst = p.inst(2);
        assert_eq!(else_inst.branch_control(&devinfo), 0);
        assert_eq!(else_inst.jip(&devinfo), br * 2);
        assert_eq!(else_inst.uip(&devinfo), br * 2);
        let _ = if_idx;
    }

    #[test]
    fn if_endif_without_else_gen7() {
        let isa = isa(70);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());

        let if_idx = p.if_(ExecSize::E8);
        emit_add(&mut p);
        p.endif_();

        let br = devinfo.jump_scale() as i64;
        let if_inst = p.inst(if_idx);
        assert_eq!(if_inst.jip(&devinfo), br * 2);
        assert_eq!(if_inst.uip(&devinfo), br * 2);
    }

    #[test]
    fn spf_rewrites_if_else_to_add_pre_gen6() {
        let isa = isa(45);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(
            &isa,
            BuilderOptions { single_program_flow: true, ..Default::default() },
        );

        let if_idx = p.if_(ExecSize::E1);
        emit_add(&mut p);
        p.else_();
        emit_add(&mut p);
        p.endif_();

        // No ENDIF is emitted; IF and ELSE became ADDs on the IP.
        assert_eq!(p.inst_count(), 4);
        assert_eq!(p.isa.opcode(p.inst(if_idx)), Some(Opcode::Add));
        assert_eq!(p.isa.opcode(p.inst(2)), Some(Opcode::Add));
        assert_eq!(p.inst(if_idx).pred_inv(&devinfo), 1);
        // IF's displacement lands on the first ELSE-block instruction.
        assert_eq!(p.inst(if_idx).imm_ud(&devinfo), 3 * INST_SIZE as u64);
        assert_eq!(p.inst(2).imm_ud(&devinfo), 2 * INST_SIZE as u64);
    }

    #[test]
    fn if_becomes_iff_without_else_on_gen4() {
        let isa = isa(40);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());

        let if_idx = p.if_(ExecSize::E8);
        emit_add(&mut p);
        p.endif_();

        assert_eq!(p.isa.opcode(p.inst(if_idx)), Some(Opcode::Iff));
        assert_eq!(p.inst(if_idx).gfx4_jump_count(&devinfo), 3);
    }

    #[test]
    fn do_while_loop_gen7() {
        let isa = isa(75);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());

        let do_idx = p.do_(ExecSize::E8);
        // No DO instruction on Gen6+.
        assert_eq!(p.inst_count(), 0);
        emit_add(&mut p);
        let while_idx = p.while_();

        let br = devinfo.jump_scale() as i64;
        assert_eq!(p.inst(while_idx).jip(&devinfo), br * (do_idx as i64 - while_idx as i64));
    }

    #[test]
    fn do_while_with_break_and_continue_gen7() {
        let isa = isa(75);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());

        p.do_(ExecSize::E8);
        emit_add(&mut p);
        let brk = p.break_();
        emit_add(&mut p);
        let cont = p.cont_();
        let whl = p.while_();
        p.set_uip_jip(0);

        let scale = 16 / devinfo.jump_scale() as i64;
        let _ = scale;
        let br = devinfo.jump_scale() as i64;
        // BREAK exits past the WHILE's block: its JIP finds the WHILE
        // (the loop's block end), and its UIP is the WHILE itself.
        assert_eq!(p.inst(brk).jip(&devinfo), br * (whl as i64 - brk as i64));
        assert_eq!(p.inst(brk).uip(&devinfo), br * (whl as i64 - brk as i64));
        // CONTINUE jumps forward to the WHILE on both fields.
        assert_eq!(p.inst(cont).jip(&devinfo), br * (whl as i64 - cont as i64));
        assert_eq!(p.inst(cont).uip(&devinfo), br * (whl as i64 - cont as i64));
    }

    #[test]
    fn pre_gen6_break_patching_uses_zero_sentinel() {
        let isa = isa(50);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());

        // Outer loop with a nested inner loop; the inner BREAK must not
        // be re-patched by the outer WHILE.
        p.do_(ExecSize::E8);
        let outer_break = p.break_();
        p.do_(ExecSize::E8);
        let inner_break = p.break_();
        let inner_while = p.while_();
        let outer_while = p.while_();

        let br = devinfo.jump_scale() as i64;
        assert_eq!(
            p.inst(inner_break).gfx4_jump_count(&devinfo),
            br * ((inner_while - inner_break) as i64 + 1)
        );
        assert_eq!(
            p.inst(outer_break).gfx4_jump_count(&devinfo),
            br * ((outer_while - outer_break) as i64 + 1)
        );
    }

    #[test]
    fn halt_jip_defaults_to_uip_outside_blocks() {
        let isa = isa(75);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());

        emit_add(&mut p);
        let h = p.halt();
        emit_add(&mut p);
        // Caller-provided UIP: jump to the end of the program.
        let uip = (p.inst_count() as i64 - h as i64) * devinfo.jump_scale() as i64;
        p.inst_mut(h).set_uip(&devinfo, uip);
        p.set_uip_jip(0);

        assert_eq!(p.inst(h).jip(&devinfo), uip);
    }

    #[test]
    fn jmpi_forward_landing() {
        let isa = isa(50);
        let devinfo = isa.devinfo;
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());

        let jmp = p.jmpi(Reg::imm_d(0));
        emit_add(&mut p);
        emit_add(&mut p);
        p.land_fwd_jump(jmp);

        assert_eq!(p.inst(jmp).gfx4_jump_count(&devinfo), 2 * 2);
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn while_without_do_is_a_bug() {
        let isa = isa(75);
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
        p.while_();
    }
}
