//! Level derivation
//!
//! Levels are linear in XP: every `level_xp_unit` points is one level,
//! starting at level 1 with zero XP.

/// XP per level unless configured otherwise
pub const DEFAULT_LEVEL_XP_UNIT: u64 = 500;

/// Derive the level for a given XP total
pub fn level_for_xp(xp: u64, level_xp_unit: u64) -> u64 {
    xp / level_xp_unit.max(1) + 1
}

/// XP still needed to reach the next level
pub fn xp_to_next_level(xp: u64, level_xp_unit: u64) -> u64 {
    let unit = level_xp_unit.max(1);
    unit - xp % unit
}
