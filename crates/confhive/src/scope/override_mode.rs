//! Effective override mode over a materialized level chain.

use super::{ConfigLevel, OverrideMode};

/// Effective mode of a section at `levels[index]`.
///
/// A Deny anywhere from the root down to `index` wins. Otherwise the
/// nearest explicit setting walking upward applies, defaulting to Allow.
/// Never cache the result: ancestor files can change between reads.
pub fn effective_mode(levels: &[ConfigLevel], index: usize) -> OverrideMode {
    if levels.is_empty() {
        return OverrideMode::Allow;
    }
    let end = index.min(levels.len() - 1);

    for level in &levels[..=end] {
        if level.override_mode == OverrideMode::Deny {
            return OverrideMode::Deny;
        }
    }

    let mut current = Some(end);
    while let Some(i) = current {
        match levels[i].override_mode {
            OverrideMode::Inherit => current = levels[i].parent,
            explicit => return explicit,
        }
    }

    OverrideMode::Allow
}

/// Effective mode of the level above `levels[index]`; the root answers Allow.
pub fn parent_effective_mode(levels: &[ConfigLevel], index: usize) -> OverrideMode {
    match levels.get(index).and_then(|l| l.parent) {
        Some(parent) => effective_mode(levels, parent),
        None => OverrideMode::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(modes: &[OverrideMode]) -> Vec<ConfigLevel> {
        modes
            .iter()
            .enumerate()
            .map(|(i, mode)| ConfigLevel {
                location_id: format!("level{}", i),
                file: format!("level{}/web.toml", i),
                override_mode: *mode,
                is_locally_stored: false,
                parent: i.checked_sub(1),
            })
            .collect()
    }

    use OverrideMode::{Allow, Deny, Inherit};

    #[test]
    fn test_defaults_to_allow() {
        let levels = chain(&[Inherit, Inherit, Inherit]);
        assert_eq!(effective_mode(&levels, 2), Allow);
        assert_eq!(effective_mode(&[], 0), Allow);
    }

    #[test]
    fn test_ancestor_deny_wins_over_descendant_allow() {
        let levels = chain(&[Deny, Allow, Allow]);
        for i in 0..levels.len() {
            assert_eq!(effective_mode(&levels, i), Deny);
        }
    }

    #[test]
    fn test_deny_only_affects_levels_below() {
        let levels = chain(&[Inherit, Deny, Allow]);
        assert_eq!(effective_mode(&levels, 0), Allow);
        assert_eq!(effective_mode(&levels, 1), Deny);
        assert_eq!(effective_mode(&levels, 2), Deny);
    }

    #[test]
    fn test_nearest_explicit_allow() {
        let levels = chain(&[Allow, Inherit, Inherit]);
        assert_eq!(effective_mode(&levels, 2), Allow);
    }

    #[test]
    fn test_parent_effective_mode() {
        let levels = chain(&[Inherit, Deny, Inherit]);
        assert_eq!(parent_effective_mode(&levels, 0), Allow);
        assert_eq!(parent_effective_mode(&levels, 1), Allow);
        assert_eq!(parent_effective_mode(&levels, 2), Deny);
    }

    #[test]
    fn test_index_past_end_clamps() {
        let levels = chain(&[Inherit, Deny]);
        assert_eq!(effective_mode(&levels, 10), Deny);
    }
}
