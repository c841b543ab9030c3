//! Software-scoreboard (SWSB) annotation codec.
//!
//! Out-of-order-capable generations attach a compact dependency tag to
//! each instruction: an in-order register distance, a named scoreboard
//! token (SBID) with a dependency mode, or both. Two incompatible bit
//! layouts exist, split at version 20; each has sub-cases for
//! "has regdist", "has sbid", and "neither" (a free-running instruction
//! needing no synchronization).
//!
//! Encoding and decoding are exact inverses for every canonical tag; the
//! only collapsed distinction is redundant state such as a pipe selector
//! on a zero register distance.

use bitflags::bitflags;

use crate::devinfo::DeviceInfo;

bitflags! {
    /// How an instruction relates to a scoreboard token.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct TokenMode: u8 {
        /// Waits until the token's in-flight read completes.
        const SRC = 1 << 0;
        /// Waits until the token's in-flight write completes.
        const DST = 1 << 1;
        /// Allocates the token for this instruction's own completion.
        const SET = 1 << 2;
    }
}

/// In-order pipe a register distance counts against.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Pipe {
    /// No in-order dependency.
    None,
    /// All in-order pipes.
    All,
    Float,
    Int,
    Long,
    /// Math pipe, distinct from version 12.5 on.
    Math,
}

/// A scheduling annotation tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Swsb {
    /// Distance (in instructions) to the producing in-order instruction;
    /// 0 means no in-order dependency.
    pub regdist: u8,
    pub pipe: Pipe,
    /// Scoreboard token number; meaningful only when `mode` is
    /// non-empty.
    pub sbid: u8,
    pub mode: TokenMode,
}

impl Swsb {
    /// No synchronization required.
    pub fn null() -> Swsb {
        Swsb { regdist: 0, pipe: Pipe::None, sbid: 0, mode: TokenMode::empty() }
    }

    /// A pure register-distance dependency. A nonzero distance implies a
    /// pipe selection; zero degenerates to [`Swsb::null`].
    pub fn regdist(n: u8) -> Swsb {
        debug_assert!(n < 8);
        Swsb {
            regdist: n,
            pipe: if n == 0 { Pipe::None } else { Pipe::All },
            sbid: 0,
            mode: TokenMode::empty(),
        }
    }

    /// A scoreboard-token dependency.
    pub fn sbid(mode: TokenMode, token: u8) -> Swsb {
        debug_assert!(!mode.is_empty());
        debug_assert!(token < 32);
        Swsb { regdist: 0, pipe: Pipe::None, sbid: token, mode }
    }

    /// Combines this tag with an additional register-distance dependency
    /// for an instruction that writes its destination: any token use is
    /// narrowed to allocation only, and the pipe is recomputed from the
    /// new distance.
    pub fn dst_dep(self, regdist: u8) -> Swsb {
        Swsb {
            regdist,
            pipe: if regdist == 0 { Pipe::None } else { Pipe::All },
            sbid: self.sbid,
            mode: self.mode & TokenMode::SET,
        }
    }

    /// Narrows this tag for an instruction that only reads: allocation
    /// is stripped, leaving source/destination uses.
    pub fn src_dep(self) -> Swsb {
        Swsb {
            regdist: self.regdist,
            pipe: self.pipe,
            sbid: self.sbid,
            mode: self.mode & (TokenMode::SRC | TokenMode::DST),
        }
    }
}

// Pre-version-20 layout, 8 bits:
//   1RRR_SSSS  combined regdist + SBID
//   0010_SSSS  SBID destination dependency
//   0011_SSSS  SBID source dependency
//   0100_SSSS  SBID allocation
//   0PPP_PRRR  pipe selector + regdist (selector 0 with distance 0 is
//              the null tag)
const PRE20_COMBINED: u16 = 0x80;
const PRE20_SBID_DST: u16 = 0x20;
const PRE20_SBID_SRC: u16 = 0x30;
const PRE20_SBID_SET: u16 = 0x40;

fn pre20_pipe_sel(devinfo: &DeviceInfo, pipe: Pipe) -> u16 {
    if devinfo.verx10 < 125 {
        // Only the unified pipe exists; the selector bits stay clear.
        return 0;
    }
    match pipe {
        Pipe::None => 0x00,
        Pipe::All => 0x08,
        Pipe::Float => 0x10,
        Pipe::Int => 0x18,
        Pipe::Long => 0x50,
        Pipe::Math => 0x58,
    }
}

// Version 20+ layout, 10 bits: [9:8] mode selector, with
//   mode 0: [7:5] pipe selector, [2:0] regdist
//   mode 1/2/3: [4:0] SBID for dst/src/set
const V20_MODE_SHIFT: u16 = 8;
const V20_SBID_MASK: u16 = 0x1f;

fn v20_pipe_sel(pipe: Pipe) -> u16 {
    match pipe {
        Pipe::None => 0,
        Pipe::All => 1,
        Pipe::Float => 2,
        Pipe::Int => 3,
        Pipe::Long => 4,
        Pipe::Math => 5,
    }
}

fn v20_pipe_from_sel(sel: u16, regdist: u8) -> Pipe {
    match sel {
        1 => Pipe::All,
        2 => Pipe::Float,
        3 => Pipe::Int,
        4 => Pipe::Long,
        5 => Pipe::Math,
        // Selector 0 carries no pipe; a nonzero distance still implies
        // the unified pipe.
        _ => {
            if regdist != 0 {
                Pipe::All
            } else {
                Pipe::None
            }
        }
    }
}

/// Packs a tag into the generation's SWSB field value.
///
/// Panics on tags that are not encodable on the target (a combined
/// regdist + SBID tag on version 20+, an out-of-range distance): those
/// are builder bugs, not data conditions.
pub fn encode(devinfo: &DeviceInfo, swsb: Swsb) -> u16 {
    assert!(devinfo.has_swsb, "SWSB annotations require ver >= 12");
    assert!(swsb.regdist < 8);
    if devinfo.ver >= 20 {
        assert!(
            swsb.mode.is_empty() || swsb.regdist == 0,
            "combined regdist+SBID tags are not encodable from version 20 on"
        );
        if swsb.mode.is_empty() {
            let sel = if swsb.regdist == 0 { 0 } else { v20_pipe_sel(swsb.pipe) };
            (sel << 5) | swsb.regdist as u16
        } else {
            let mode_sel = if swsb.mode.contains(TokenMode::SET) {
                3
            } else if swsb.mode.contains(TokenMode::SRC) {
                2
            } else {
                1
            };
            (mode_sel << V20_MODE_SHIFT) | (swsb.sbid as u16 & V20_SBID_MASK)
        }
    } else {
        assert!(swsb.sbid < 16);
        if swsb.mode.is_empty() {
            let sel = if swsb.regdist == 0 { 0 } else { pre20_pipe_sel(devinfo, swsb.pipe) };
            sel | swsb.regdist as u16
        } else if swsb.regdist != 0 {
            PRE20_COMBINED | ((swsb.regdist as u16) << 4) | swsb.sbid as u16
        } else if swsb.mode.contains(TokenMode::SET) {
            PRE20_SBID_SET | swsb.sbid as u16
        } else if swsb.mode.contains(TokenMode::DST) {
            PRE20_SBID_DST | swsb.sbid as u16
        } else {
            PRE20_SBID_SRC | swsb.sbid as u16
        }
    }
}

/// Unpacks a SWSB field value.
///
/// `is_unordered` is the instruction's own classification (send, math,
/// DPAS execute out of order); it disambiguates the combined encoding,
/// whose token use is allocation on an unordered instruction and a
/// destination wait on an in-order one. Never panics: reserved patterns
/// decode to *some* tag for a later legality check to reject.
pub fn decode(devinfo: &DeviceInfo, is_unordered: bool, bits: u16) -> Swsb {
    if devinfo.ver >= 20 {
        let mode_sel = (bits >> V20_MODE_SHIFT) & 3;
        if mode_sel == 0 {
            let regdist = (bits & 7) as u8;
            let pipe = v20_pipe_from_sel((bits >> 5) & 7, regdist);
            Swsb { regdist, pipe, sbid: 0, mode: TokenMode::empty() }
        } else {
            let mode = match mode_sel {
                1 => TokenMode::DST,
                2 => TokenMode::SRC,
                _ => TokenMode::SET,
            };
            Swsb::sbid(mode, (bits & V20_SBID_MASK) as u8)
        }
    } else if bits & PRE20_COMBINED != 0 {
        Swsb {
            regdist: ((bits >> 4) & 7) as u8,
            pipe: Pipe::All,
            sbid: (bits & 0xf) as u8,
            mode: if is_unordered { TokenMode::SET } else { TokenMode::DST },
        }
    } else {
        match bits & 0x70 {
            0x20 => Swsb::sbid(TokenMode::DST, (bits & 0xf) as u8),
            0x30 => Swsb::sbid(TokenMode::SRC, (bits & 0xf) as u8),
            0x40 => Swsb::sbid(TokenMode::SET, (bits & 0xf) as u8),
            sel => {
                let regdist = (bits & 7) as u8;
                let pipe = if regdist == 0 {
                    Pipe::None
                } else if devinfo.verx10 < 125 {
                    Pipe::All
                } else {
                    match sel | (bits & 0x8) {
                        0x08 => Pipe::All,
                        0x10 => Pipe::Float,
                        0x18 => Pipe::Int,
                        0x50 => Pipe::Long,
                        0x58 => Pipe::Math,
                        _ => Pipe::None,
                    }
                };
                Swsb { regdist, pipe, sbid: 0, mode: TokenMode::empty() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devinfo::Platform;

    fn canonical_tags(devinfo: &DeviceInfo) -> Vec<(Swsb, bool)> {
        let mut tags = vec![(Swsb::null(), false), (Swsb::null(), true)];
        for d in 1..8 {
            tags.push((Swsb::regdist(d), false));
        }
        let max_token: u8 = if devinfo.ver >= 20 { 32 } else { 16 };
        for t in 0..max_token {
            tags.push((Swsb::sbid(TokenMode::DST, t), false));
            tags.push((Swsb::sbid(TokenMode::SRC, t), false));
            tags.push((Swsb::sbid(TokenMode::SET, t), true));
        }
        if devinfo.ver < 20 {
            // Combined forms: allocation on unordered instructions,
            // destination wait on in-order ones.
            for d in 1..8 {
                tags.push((Swsb::sbid(TokenMode::SET, 3).dst_dep(d), true));
                tags.push((
                    Swsb { regdist: d, pipe: Pipe::All, sbid: 3, mode: TokenMode::DST },
                    false,
                ));
            }
        }
        tags
    }

    #[test]
    fn round_trip_every_canonical_tag() {
        for &v in &[120u32, 125, 200] {
            let devinfo = DeviceInfo::new(v, Platform::Main);
            for (tag, unordered) in canonical_tags(&devinfo) {
                let bits = encode(&devinfo, tag);
                assert_eq!(
                    decode(&devinfo, unordered, bits),
                    tag,
                    "verx10={v} tag={tag:?} bits={bits:#x}"
                );
            }
        }
    }

    #[test]
    fn null_encodes_to_zero() {
        for &v in &[120u32, 125, 200] {
            let devinfo = DeviceInfo::new(v, Platform::Main);
            assert_eq!(encode(&devinfo, Swsb::null()), 0);
        }
    }

    #[test]
    fn combinators() {
        let set = Swsb::sbid(TokenMode::SET, 5);
        let both = set.dst_dep(3);
        assert_eq!(both.regdist, 3);
        assert_eq!(both.pipe, Pipe::All);
        assert_eq!(both.mode, TokenMode::SET);

        let src_use = Swsb::sbid(TokenMode::SET | TokenMode::SRC, 5).src_dep();
        assert_eq!(src_use.mode, TokenMode::SRC);
    }

    #[test]
    #[should_panic]
    fn combined_tag_rejected_on_v20() {
        let devinfo = DeviceInfo::new(200, Platform::Main);
        encode(&devinfo, Swsb::sbid(TokenMode::SET, 1).dst_dep(2));
    }
}
