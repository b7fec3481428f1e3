/// Optional historical behaviors of individual opcodes.
///
/// Interpreters disagree on a handful of instructions. The default set
/// follows the common modern behavior; each flag switches one instruction
/// family to the original COSMAC VIP behavior instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quirks {
    /// 8XY6/8XYE shift VY into VX instead of shifting VX in place.
    pub shift_uses_vy: bool,
    /// 8XY1/8XY2/8XY3 reset VF to 0.
    pub logic_resets_vf: bool,
    /// FX55/FX65 leave I pointing past the last register transferred.
    pub load_store_increments_i: bool,
    /// DXYN clips sprites at the screen edge instead of wrapping them.
    pub clip_sprites: bool,
}

impl Quirks {
    /// Quirk set matching the COSMAC VIP interpreter.
    pub fn cosmac_vip() -> Self {
        Quirks {
            shift_uses_vy: true,
            logic_resets_vf: true,
            load_store_increments_i: true,
            clip_sprites: true,
        }
    }
}
