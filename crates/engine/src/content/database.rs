use crate::world::{GameTuning, Vec2};

/// One entry of the level catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelDef {
    pub id: u32,
    pub label: String,
    /// Directory under `assets/levels/` holding `<directory>_<layer>.csv`.
    pub directory: String,
    /// Overworld node position in screen units.
    pub node: Vec2,
}

#[derive(Debug, Clone, Default)]
pub struct DefDatabase {
    tuning: GameTuning,
    levels: Vec<LevelDef>,
    source_hash: String,
}

impl DefDatabase {
    /// `levels` must already be sorted by id.
    pub(crate) fn new(tuning: GameTuning, levels: Vec<LevelDef>, source_hash: String) -> Self {
        Self {
            tuning,
            levels,
            source_hash,
        }
    }

    pub fn tuning(&self) -> GameTuning {
        self.tuning
    }

    pub fn levels(&self) -> &[LevelDef] {
        &self.levels
    }

    pub fn level(&self, id: u32) -> Option<&LevelDef> {
        self.levels
            .binary_search_by_key(&id, |level| level.id)
            .ok()
            .map(|index| &self.levels[index])
    }

    pub fn level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    /// SHA-256 over every defs file name and body, in compile order.
    pub fn source_hash(&self) -> &str {
        &self.source_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(id: u32) -> LevelDef {
        LevelDef {
            id,
            label: format!("Level {id}"),
            directory: format!("level_{id}"),
            node: Vec2::ZERO,
        }
    }

    #[test]
    fn lookup_by_id_skips_gaps() {
        let db = DefDatabase::new(
            GameTuning::default(),
            vec![level(1), level(2), level(5)],
            String::new(),
        );
        assert_eq!(db.level(5).map(|level| level.directory.as_str()), Some("level_5"));
        assert!(db.level(3).is_none());
        assert_eq!(db.level_count(), 3);
    }
}
