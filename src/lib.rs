//! Encoder and binary validator for the Intel GEN execution-unit
//! instruction set.
//!
//! The crate covers the encoding contract of the fixed-width EU
//! instruction word across hardware generations: a stateful
//! [`CodeBuilder`](builder::CodeBuilder) that packs logical operands
//! into instruction words (with structured control-flow assembly and
//! branch fixups on top), and an independent
//! [`validate_instructions`](validate::validate_instructions) that
//! re-derives legality from nothing but the packed bytes and a
//! generation descriptor.
//!
//! Everything is parameterized by a [`DeviceInfo`](devinfo::DeviceInfo):
//! field offsets, type encodings, opcode numbering, and legality rules
//! all shift between generations, and no accessor touches bits without
//! consulting it.
//!
//! Error handling follows a strict two-tier split: misuse of the builder
//! (bad operand counts, unencodable types, unbalanced control-flow
//! stacks) panics, while the validator classifies arbitrary input bytes
//! with a boolean and never panics.

pub mod builder;
pub mod devinfo;
pub mod flow;
pub mod inst;
pub mod opcode;
pub mod regs;
pub mod swsb;
pub mod types;
pub mod validate;

pub use builder::{BuilderOptions, CodeBuilder, InsnState, ProgramIoError, Reloc, RelocKind};
pub use devinfo::{DeviceInfo, Platform};
pub use inst::Inst;
pub use opcode::{IsaInfo, Opcode, OpcodeDesc};
pub use regs::{
    AccessMode, AddressMode, CondModifier, ExecSize, HStride, MaskControl, MathFunction, Predicate,
    Reg, RegFile, VStride, Width,
};
pub use swsb::{Pipe, Swsb, TokenMode};
pub use types::RegType;
pub use validate::{validate_instruction, validate_instructions, Diagnostics};
