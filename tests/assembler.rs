//! End-to-end scenarios: programs assembled by the builder must pass
//! the validator for the same generation, and targeted corruptions of
//! the emitted bytes must fail it.

use gen_eu_assembler::{
    validate_instructions, AccessMode, BuilderOptions, CodeBuilder, CondModifier, DeviceInfo,
    Diagnostics, ExecSize, HStride, IsaInfo, MathFunction, Opcode, Platform, Reg, RegType, VStride,
    Width,
};

use proptest::prelude::*;

fn isa(verx10: u32) -> IsaInfo {
    let _ = env_logger::try_init();
    IsaInfo::new(DeviceInfo::new(verx10, Platform::Main))
}

fn validate(isa: &IsaInfo, p: &CodeBuilder<'_>) -> bool {
    let bytes = p.program();
    validate_instructions(isa, &bytes, 0, bytes.len(), None)
}

#[test]
fn add_program_round_trips_through_validator() {
    let isa = isa(90);
    let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
    p.add(Reg::grf(0), Reg::grf(0), Reg::grf(0));
    let bytes = p.finish().unwrap();
    assert!(validate_instructions(&isa, &bytes, 0, bytes.len(), None));

    // The same bytes with the opcode field pointed at an unassigned
    // hardware opcode must be rejected.
    let mut corrupt = bytes.clone();
    corrupt[0] = (corrupt[0] & !0x7f) | 0x75;
    let mut diag = Diagnostics::new();
    assert!(!validate_instructions(&isa, &corrupt, 0, corrupt.len(), Some(&mut diag)));
    assert!(!diag.entries.is_empty());
}

#[test]
fn encoder_and_validator_agree_across_generations() {
    for &v in &[45u32, 60, 70, 75, 80, 90, 100, 110, 120, 125] {
        let isa = isa(v);
        let mut p = CodeBuilder::new(&isa, BuilderOptions::default());

        p.mov(Reg::grf(1), Reg::grf(2));
        p.add(Reg::grf(3), Reg::grf(4), Reg::grf(5));
        p.mul(Reg::grf(6), Reg::grf(7).vec1(), Reg::imm_f(4.0));
        p.and(
            Reg::grf(8).retype(RegType::Ud),
            Reg::grf(9).retype(RegType::Ud),
            Reg::imm_ud(0xff),
        );
        p.cmp(
            Reg::null(),
            CondModifier::Ge,
            Reg::grf(10),
            Reg::imm_f(0.5),
        );
        if isa.devinfo.ver >= 6 {
            p.math(MathFunction::Inv, Reg::grf(11), Reg::grf(12), Reg::null());
        }

        let mut diag = Diagnostics::new();
        let bytes = p.program();
        let ok = validate_instructions(&isa, &bytes, 0, bytes.len(), Some(&mut diag));
        assert!(ok, "verx10={v}: {:?}", diag.entries);
    }
}

#[test]
fn width_relationship_scenario() {
    // ADD with a W destination and D sources: stride 1 fails, stride 2
    // passes.
    let isa = isa(90);
    let devinfo = isa.devinfo;
    let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
    let idx = p.add(
        Reg::grf(1).retype(RegType::W),
        Reg::grf(2).retype(RegType::D),
        Reg::grf(3).retype(RegType::D),
    );
    assert!(!validate(&isa, &p));
    p.inst_mut(idx).set_dst_hstride(&devinfo, HStride::H2.to_hw() as u64);
    assert!(validate(&isa, &p));
}

#[test]
fn scalar_region_boundary_case() {
    // Exec size 1: <1;1,0> is malformed, <0;1,0> is the scalar region.
    let isa = isa(90);
    let devinfo = isa.devinfo;
    let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
    p.set_default_exec_size(ExecSize::E1);
    let idx = p.mov(Reg::grf(1).vec1(), Reg::grf(2).vec1());

    p.inst_mut(idx).set_src0_vstride(&devinfo, VStride::V1.to_hw() as u64);
    assert!(!validate(&isa, &p));

    p.inst_mut(idx).set_src0_vstride(&devinfo, VStride::V0.to_hw() as u64);
    assert!(validate(&isa, &p));
}

#[test]
fn structured_control_flow_validates_gen7() {
    let isa = isa(75);
    let devinfo = isa.devinfo;
    let mut p = CodeBuilder::new(&isa, BuilderOptions::default());

    let if_idx = p.if_(ExecSize::E8);
    p.add(Reg::grf(1), Reg::grf(2), Reg::grf(3));
    p.else_();
    p.add(Reg::grf(1), Reg::grf(4), Reg::grf(5));
    p.endif_();
    p.set_uip_jip(0);

    // IF, ADD, ELSE, ADD, ENDIF.
    assert_eq!(p.inst_count(), 5);
    let br = devinfo.jump_scale() as i64;
    assert_eq!(p.inst(if_idx).uip(&devinfo), br * 4);
    assert_eq!(p.inst(if_idx).jip(&devinfo), br * 3);
    assert_eq!(p.inst(2).jip(&devinfo), br * 2);

    assert!(validate(&isa, &p));
}

#[test]
fn loops_with_break_validate_gen9() {
    let isa = isa(90);
    let mut p = CodeBuilder::new(&isa, BuilderOptions::default());

    p.do_(ExecSize::E8);
    p.add(Reg::grf(1), Reg::grf(1), Reg::imm_f(1.0));
    p.cmp(Reg::null(), CondModifier::Ge, Reg::grf(1), Reg::imm_f(8.0));
    p.break_();
    p.while_();
    p.set_uip_jip(0);

    assert!(validate(&isa, &p));
}

#[test]
fn single_program_flow_rewrites_pre_gen6() {
    let isa = isa(45);
    let devinfo = isa.devinfo;
    let mut p = CodeBuilder::new(
        &isa,
        BuilderOptions { single_program_flow: true, ..Default::default() },
    );

    let if_idx = p.if_(ExecSize::E1);
    p.add(Reg::grf(1), Reg::grf(2), Reg::grf(3));
    p.else_();
    p.add(Reg::grf(1), Reg::grf(4), Reg::grf(5));
    p.endif_();

    // The IF and ELSE opcodes became IP-arithmetic ADDs and no ENDIF
    // was emitted at all.
    assert_eq!(p.inst_count(), 4);
    assert_eq!(p.isa.opcode(p.inst(if_idx)), Some(Opcode::Add));
    assert_eq!(p.isa.opcode(p.inst(2)), Some(Opcode::Add));
    assert_eq!(p.inst(if_idx).pred_inv(&devinfo), 1);

    assert!(validate(&isa, &p));
}

#[test]
fn align16_session_validates_gen7() {
    let isa = isa(75);
    let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
    p.set_default_access_mode(AccessMode::Align16);
    p.mov(Reg::grf(1), Reg::grf(2));
    p.mad(Reg::grf(3), Reg::grf(4), Reg::grf(5), Reg::grf(6));
    assert!(validate(&isa, &p));
}

#[test]
fn mad_align1_validates_gen12() {
    let isa = isa(120);
    let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
    p.mad(Reg::grf(1), Reg::grf(2), Reg::grf(3), Reg::grf(4));
    assert!(validate(&isa, &p));
}

#[test]
fn register_crossing_scenario() {
    let isa = isa(90);
    let devinfo = isa.devinfo;
    let mut p = CodeBuilder::new(&isa, BuilderOptions::default());
    p.set_default_exec_size(ExecSize::E32);

    // 32 word channels at <16;8,2> walk across three registers.
    let wide = Reg::grf(2)
        .retype(RegType::W)
        .with_stride(VStride::V16, Width::W8, HStride::H2);
    let dst = Reg::grf(4)
        .retype(RegType::W)
        .with_stride(VStride::V16, Width::W16, HStride::H1);
    let idx = p.mov(dst, wide);
    assert!(!validate(&isa, &p));

    // The packed form of the same read stays within two registers.
    p.inst_mut(idx).set_src0_vstride(&devinfo, VStride::V8.to_hw() as u64);
    p.inst_mut(idx).set_src0_hstride(&devinfo, HStride::H1.to_hw() as u64);
    assert!(validate(&isa, &p));
}

proptest! {
    // Scheduling-annotation round trip: decode(encode(tag)) is exact for
    // every canonical tag on every SWSB-capable generation.
    #[test]
    fn swsb_round_trip(verx10 in prop::sample::select(vec![120u32, 125, 200]),
                       regdist in 0u8..8,
                       token in 0u8..16,
                       shape in 0u8..4) {
        use gen_eu_assembler::{swsb, Swsb, TokenMode};

        let devinfo = DeviceInfo::new(verx10, Platform::Main);
        let (tag, unordered) = match shape {
            0 => (Swsb::null(), false),
            1 => (Swsb::regdist(regdist), false),
            2 => (Swsb::sbid(TokenMode::DST, token), false),
            _ => (Swsb::sbid(TokenMode::SET, token), true),
        };
        let bits = swsb::encode(&devinfo, tag);
        prop_assert_eq!(swsb::decode(&devinfo, unordered, bits), tag);
    }

    // Type-table round trip: every defined (file, type) mapping inverts
    // exactly.
    #[test]
    fn type_table_round_trip(verx10 in prop::sample::select(
        vec![40u32, 45, 50, 60, 70, 75, 80, 90, 100, 110, 120, 125]
    )) {
        use gen_eu_assembler::types::{hw_type_to_reg_type, reg_type_to_hw, ALL_TYPES};
        use gen_eu_assembler::RegFile;

        let devinfo = DeviceInfo::new(verx10, Platform::Main);
        for &file in &[RegFile::Grf, RegFile::Imm] {
            for &t in ALL_TYPES {
                if let Some(hw) = reg_type_to_hw(&devinfo, file, t) {
                    prop_assert_eq!(hw_type_to_reg_type(&devinfo, file, hw), Some(t));
                }
            }
        }
    }
}
