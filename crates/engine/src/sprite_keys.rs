use thiserror::Error;

use crate::world::{Partition, Pickup};

const PALM_SPRITES: [&str; 6] = [
    "palm_small",
    "palm_large",
    "palm_bg",
    "palm_bg_top",
    "palm_bg_left",
    "palm_bg_right",
];

pub const PLAYER_SPRITE_ROOT: &str = "character";
pub const ENEMY_SPRITE_KEY: &str = "enemy/run";
pub const FLAG_SPRITE_ROOT: &str = "flag";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpriteKeyError {
    #[error("sprite key must not be empty")]
    Empty,
    #[error("sprite key must not start with '/'")]
    LeadingSlash,
    #[error("sprite key must not contain '\\\\'")]
    Backslash,
    #[error("sprite key must not contain '..'")]
    ParentTraversal,
    #[error("sprite key contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

/// Keys map onto `assets/base/sprites/<key>/<frame>.png`, so they must stay
/// inside the sprite tree.
pub(crate) fn validate_sprite_key(key: &str) -> Result<(), SpriteKeyError> {
    if key.is_empty() {
        return Err(SpriteKeyError::Empty);
    }
    if key.starts_with('/') {
        return Err(SpriteKeyError::LeadingSlash);
    }
    if key.contains('\\') {
        return Err(SpriteKeyError::Backslash);
    }
    if key.contains("..") {
        return Err(SpriteKeyError::ParentTraversal);
    }
    for ch in key.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '/' | '-') {
            continue;
        }
        return Err(SpriteKeyError::InvalidCharacter { character: ch });
    }
    Ok(())
}

pub(crate) fn pickup_sprite_key(pickup: Pickup) -> &'static str {
    match pickup {
        Pickup::GoldCoin => "coins/gold",
        Pickup::SilverCoin => "coins/silver",
        Pickup::GoldenSkull => "items/golden_skull",
        Pickup::RedDiamond => "items/red_diamond",
        Pickup::GreenBottle => "items/green_bottle",
    }
}

/// Sprite key for a static tile variant. Variants are range-checked by the
/// caller before reaching here.
pub(crate) fn tile_sprite_key(partition: Partition, variant: i32) -> String {
    match partition {
        Partition::Terrain | Partition::BgTerrain => format!("terrain/{variant}"),
        Partition::BgPalms | Partition::FgPalms => {
            let name = usize::try_from(variant)
                .ok()
                .and_then(|index| PALM_SPRITES.get(index))
                .copied()
                .unwrap_or(PALM_SPRITES[0]);
            format!("palms/{name}")
        }
        Partition::Crates => "crate".to_string(),
        Partition::Grass => format!("grass/{variant}"),
        Partition::Spikes => "spikes".to_string(),
        Partition::EnemyConstraints => "constraint".to_string(),
        Partition::Coins | Partition::Collectibles => "items/unknown".to_string(),
    }
}

pub(crate) fn player_sprite_key(state_name: &str) -> String {
    format!("{PLAYER_SPRITE_ROOT}/{state_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_keys() {
        for key in ["crate", "palms/palm_bg_top", "a-b/c_d"] {
            assert!(validate_sprite_key(key).is_ok(), "key={key}");
        }
    }

    #[test]
    fn rejects_invalid_keys() {
        for key in ["", "/a", "..", "a/../b", r"a\b", "A", "a.b"] {
            assert!(validate_sprite_key(key).is_err(), "key={key}");
        }
    }

    #[test]
    fn every_generated_key_is_valid() {
        for partition in Partition::ALL {
            for variant in 0..24 {
                let key = tile_sprite_key(partition, variant);
                assert!(validate_sprite_key(&key).is_ok(), "key={key}");
            }
        }
        for pickup in [
            Pickup::GoldCoin,
            Pickup::SilverCoin,
            Pickup::GoldenSkull,
            Pickup::RedDiamond,
            Pickup::GreenBottle,
        ] {
            assert!(validate_sprite_key(pickup_sprite_key(pickup)).is_ok());
        }
        for state in ["idle", "dead_ground"] {
            assert!(validate_sprite_key(&player_sprite_key(state)).is_ok());
        }
        assert!(validate_sprite_key(ENEMY_SPRITE_KEY).is_ok());
    }
}
