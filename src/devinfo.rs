//! Hardware generation descriptor.
//!
//! Every field layout, type encoding, and legality rule in this crate is
//! parameterized by a [`DeviceInfo`]. It is built once per assembly or
//! validation session and never mutated afterwards; sessions targeting
//! different generations can run concurrently because nothing here is
//! shared mutable state.

/// Distinguishes full-power parts from the low-power derivatives that
/// carry extra 64-bit restrictions (see the validator's double-precision
/// checks).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Platform {
    /// Mainline desktop/server parts.
    Main,
    /// Low-power parts (Cherryview/Broxton class).
    LowPower,
}

/// An immutable description of the target hardware generation.
#[derive(Copy, Clone, Debug)]
pub struct DeviceInfo {
    /// Major generation number (4, 6, 7, 8, 9, 11, 12, 20).
    pub ver: u32,
    /// Major * 10 + minor, e.g. 75 for the 7.5 stepping, 125 for 12.5.
    pub verx10: u32,
    pub platform: Platform,
    /// 64-bit float operands are encodable and legal.
    pub has_64bit_float: bool,
    /// 64-bit integer operands are encodable and legal.
    pub has_64bit_int: bool,
    /// Software scoreboard (SWSB) annotations are carried per instruction.
    pub has_swsb: bool,
    /// The ELSE branch-control erratum window (the ENDIF needs a NOP
    /// landing pad when the ELSE uses branch control).
    pub has_branch_ctrl: bool,
    /// Bytes per general register.
    pub grf_size: u32,
}

/// The `verx10` values this crate has layout and type tables for.
pub const SUPPORTED_VERX10: &[u32] = &[40, 45, 50, 60, 70, 75, 80, 90, 100, 110, 120, 125, 200];

impl DeviceInfo {
    /// Builds the descriptor for a generation.
    ///
    /// Panics if `verx10` is not one of [`SUPPORTED_VERX10`]; asking for
    /// an unknown generation is a caller bug, not a runtime condition.
    pub fn new(verx10: u32, platform: Platform) -> DeviceInfo {
        assert!(
            SUPPORTED_VERX10.contains(&verx10),
            "unsupported generation verx10={verx10}"
        );
        let ver = verx10 / 10;
        // 64-bit operands disappear on Gen11/12.0 and return on the 12.5
        // compute parts. The low-power Gen8/9 derivatives keep them but
        // under extra restrictions, which the validator enforces.
        let big64 = !matches!(verx10, 110 | 120);
        DeviceInfo {
            ver,
            verx10,
            platform,
            has_64bit_float: big64,
            has_64bit_int: big64 && ver >= 8,
            has_swsb: ver >= 12,
            has_branch_ctrl: ver >= 8 && ver < 11,
            grf_size: if ver >= 20 { 64 } else { 32 },
        }
    }

    /// Maximum general register number addressable on this generation.
    pub fn max_grf(&self) -> u32 {
        if self.ver >= 20 { 256 } else { 128 }
    }

    /// Scale factor between encoded jump counts and bytes. Later
    /// generations encode branch offsets directly in bytes; earlier ones
    /// count in instruction-size units.
    pub fn jump_scale(&self) -> i32 {
        if self.ver >= 8 {
            16
        } else if self.ver >= 5 {
            2
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_flags() {
        let skl = DeviceInfo::new(90, Platform::Main);
        assert!(skl.has_64bit_float && skl.has_64bit_int);
        assert!(!skl.has_swsb);
        assert!(skl.has_branch_ctrl);

        let tgl = DeviceInfo::new(120, Platform::Main);
        assert!(tgl.has_swsb);
        assert!(!tgl.has_64bit_float);
        assert!(!tgl.has_branch_ctrl);

        let hpc = DeviceInfo::new(125, Platform::Main);
        assert!(hpc.has_64bit_float && hpc.has_64bit_int);
    }

    #[test]
    fn jump_scale_by_generation() {
        assert_eq!(DeviceInfo::new(40, Platform::Main).jump_scale(), 1);
        assert_eq!(DeviceInfo::new(50, Platform::Main).jump_scale(), 2);
        assert_eq!(DeviceInfo::new(70, Platform::Main).jump_scale(), 2);
        assert_eq!(DeviceInfo::new(80, Platform::Main).jump_scale(), 16);
    }

    #[test]
    #[should_panic]
    fn unknown_generation_is_a_bug() {
        DeviceInfo::new(130, Platform::Main);
    }
}
