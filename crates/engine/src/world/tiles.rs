use super::geometry::Rect;

/// Named static tile collections. Drawing and collision iterate partitions
/// explicitly; there is no implicit insertion order across partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    Terrain,
    BgTerrain,
    BgPalms,
    FgPalms,
    Crates,
    Grass,
    Coins,
    Collectibles,
    Spikes,
    EnemyConstraints,
}

pub const PARTITION_COUNT: usize = 10;

impl Partition {
    pub const ALL: [Partition; PARTITION_COUNT] = [
        Partition::Terrain,
        Partition::BgTerrain,
        Partition::BgPalms,
        Partition::FgPalms,
        Partition::Crates,
        Partition::Grass,
        Partition::Coins,
        Partition::Collectibles,
        Partition::Spikes,
        Partition::EnemyConstraints,
    ];

    /// Partitions the player and falling bodies collide with.
    pub const SOLIDS: [Partition; 2] = [Partition::Terrain, Partition::FgPalms];

    const fn index(self) -> usize {
        match self {
            Partition::Terrain => 0,
            Partition::BgTerrain => 1,
            Partition::BgPalms => 2,
            Partition::FgPalms => 3,
            Partition::Crates => 4,
            Partition::Grass => 5,
            Partition::Coins => 6,
            Partition::Collectibles => 7,
            Partition::Spikes => 8,
            Partition::EnemyConstraints => 9,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Partition::Terrain => "terrain",
            Partition::BgTerrain => "bg_terrain",
            Partition::BgPalms => "bg_palms",
            Partition::FgPalms => "fg_palms",
            Partition::Crates => "crates",
            Partition::Grass => "grass",
            Partition::Coins => "coins",
            Partition::Collectibles => "collectibles",
            Partition::Spikes => "spikes",
            Partition::EnemyConstraints => "enemies_constraints",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pickup {
    GoldCoin,
    SilverCoin,
    GoldenSkull,
    RedDiamond,
    GreenBottle,
}

/// Gameplay meaning of a tile, independent of how it is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TileRole {
    Solid,
    Decoration,
    Pickup(Pickup),
    Hazard { damage: f32 },
    Constraint,
    Goal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagState {
    NoWind,
    TransToWind,
    Wind,
    TransToNoWind,
}

impl FlagState {
    pub const fn name(self) -> &'static str {
        match self {
            FlagState::NoWind => "no_wind",
            FlagState::TransToWind => "trans_to_wind",
            FlagState::Wind => "wind",
            FlagState::TransToNoWind => "trans_to_no_wind",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopingAnimation {
    frame_count: u32,
    frames_per_tick: f32,
    frame: f32,
}

impl LoopingAnimation {
    pub fn new(frame_count: u32, frames_per_tick: f32) -> Self {
        Self {
            frame_count: frame_count.max(1),
            frames_per_tick,
            frame: 0.0,
        }
    }

    /// Advances one tick; returns true when the cycle wrapped.
    pub fn advance(&mut self) -> bool {
        self.frame += self.frames_per_tick;
        if self.frame >= self.frame_count as f32 {
            self.frame = 0.0;
            return true;
        }
        false
    }

    pub fn frame(&self) -> u32 {
        (self.frame as u32).min(self.frame_count - 1)
    }

    pub fn restart(&mut self) {
        self.frame = 0.0;
    }
}

/// Goal flag: loops its settled state and plays a one-shot transition
/// between calm and windy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlagAnimation {
    playing: FlagState,
    settled: FlagState,
    animation: LoopingAnimation,
}

impl FlagAnimation {
    pub fn new(frame_count: u32, frames_per_tick: f32) -> Self {
        Self {
            playing: FlagState::NoWind,
            settled: FlagState::NoWind,
            animation: LoopingAnimation::new(frame_count, frames_per_tick),
        }
    }

    pub fn start_transition(&mut self) {
        let (playing, settled) = match self.settled {
            FlagState::NoWind | FlagState::TransToNoWind => {
                (FlagState::TransToWind, FlagState::Wind)
            }
            FlagState::Wind | FlagState::TransToWind => {
                (FlagState::TransToNoWind, FlagState::NoWind)
            }
        };
        self.playing = playing;
        self.settled = settled;
        self.animation.restart();
    }

    pub fn advance(&mut self) {
        if self.animation.advance() && self.playing != self.settled {
            self.playing = self.settled;
        }
    }

    pub fn state(&self) -> FlagState {
        self.playing
    }

    pub fn frame(&self) -> u32 {
        self.animation.frame()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VisualBehavior {
    Static,
    Looping(LoopingAnimation),
    Flag(FlagAnimation),
}

/// Opaque handle the renderer resolves to an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteFrame {
    pub key: String,
    pub frame: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaticTile {
    pub rect: Rect,
    pub collide_rect: Option<Rect>,
    pub role: TileRole,
    pub variant: i32,
    pub sprite_key: String,
    pub behavior: VisualBehavior,
}

impl StaticTile {
    /// Footprint used for contact tests; hazards narrow it below the visual.
    pub fn collision_rect(&self) -> Rect {
        self.collide_rect.unwrap_or(self.rect)
    }

    pub fn animate(&mut self) {
        match &mut self.behavior {
            VisualBehavior::Static => {}
            VisualBehavior::Looping(animation) => {
                animation.advance();
            }
            VisualBehavior::Flag(flag) => flag.advance(),
        }
    }

    pub fn sprite_frame(&self) -> SpriteFrame {
        match &self.behavior {
            VisualBehavior::Static => SpriteFrame {
                key: self.sprite_key.clone(),
                frame: 0,
            },
            VisualBehavior::Looping(animation) => SpriteFrame {
                key: self.sprite_key.clone(),
                frame: animation.frame(),
            },
            VisualBehavior::Flag(flag) => SpriteFrame {
                key: format!("{}/{}", self.sprite_key, flag.state().name()),
                frame: flag.frame(),
            },
        }
    }

    pub fn start_flag_transition(&mut self) {
        if let VisualBehavior::Flag(flag) = &mut self.behavior {
            flag.start_transition();
        }
    }
}

/// Static geometry of one level, one ordered collection per partition.
#[derive(Debug, Clone, Default)]
pub struct TileWorld {
    partitions: [Vec<StaticTile>; PARTITION_COUNT],
}

impl TileWorld {
    pub fn push(&mut self, partition: Partition, tile: StaticTile) {
        self.partitions[partition.index()].push(tile);
    }

    pub fn tiles(&self, partition: Partition) -> &[StaticTile] {
        &self.partitions[partition.index()]
    }

    pub fn tile_count(&self, partition: Partition) -> usize {
        self.partitions[partition.index()].len()
    }

    pub fn total_tile_count(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum()
    }

    /// Removes a picked-up tile. A stale index is a no-op.
    pub fn remove(&mut self, partition: Partition, index: usize) -> Option<StaticTile> {
        let tiles = &mut self.partitions[partition.index()];
        (index < tiles.len()).then(|| tiles.remove(index))
    }

    /// Collidable rectangles in partition order, terrain first.
    pub fn solids(&self) -> impl Iterator<Item = &Rect> + '_ {
        Partition::SOLIDS
            .iter()
            .flat_map(move |partition| self.tiles(*partition).iter().map(|tile| &tile.rect))
    }

    pub fn animate(&mut self) {
        for tiles in &mut self.partitions {
            for tile in tiles.iter_mut() {
                tile.animate();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(x: f32, role: TileRole) -> StaticTile {
        StaticTile {
            rect: Rect::new(x, 0.0, 64.0, 64.0),
            collide_rect: None,
            role,
            variant: 0,
            sprite_key: "terrain/0".to_string(),
            behavior: VisualBehavior::Static,
        }
    }

    #[test]
    fn partition_indices_are_unique() {
        let mut seen = [false; PARTITION_COUNT];
        for partition in Partition::ALL {
            assert!(!seen[partition.index()], "{}", partition.name());
            seen[partition.index()] = true;
        }
    }

    #[test]
    fn solids_cover_terrain_then_fg_palms_only() {
        let mut world = TileWorld::default();
        world.push(Partition::FgPalms, tile(128.0, TileRole::Solid));
        world.push(Partition::Terrain, tile(0.0, TileRole::Solid));
        world.push(Partition::BgTerrain, tile(64.0, TileRole::Decoration));

        let xs = world.solids().map(|rect| rect.x).collect::<Vec<_>>();
        assert_eq!(xs, vec![0.0, 128.0]);
    }

    #[test]
    fn stale_remove_is_noop() {
        let mut world = TileWorld::default();
        world.push(Partition::Coins, tile(0.0, TileRole::Pickup(Pickup::GoldCoin)));
        assert!(world.remove(Partition::Coins, 0).is_some());
        assert!(world.remove(Partition::Coins, 0).is_none());
        assert_eq!(world.total_tile_count(), 0);
    }

    #[test]
    fn looping_animation_wraps() {
        let mut animation = LoopingAnimation::new(2, 0.5);
        assert!(!animation.advance());
        assert_eq!(animation.frame(), 0);
        assert!(!animation.advance());
        assert_eq!(animation.frame(), 1);
        assert!(!animation.advance());
        assert!(animation.advance());
        assert_eq!(animation.frame(), 0);
    }

    #[test]
    fn flag_transition_settles_into_wind() {
        let mut flag = FlagAnimation::new(2, 1.0);
        assert_eq!(flag.state(), FlagState::NoWind);
        flag.start_transition();
        assert_eq!(flag.state(), FlagState::TransToWind);
        flag.advance();
        assert_eq!(flag.state(), FlagState::TransToWind);
        flag.advance();
        assert_eq!(flag.state(), FlagState::Wind);

        flag.start_transition();
        assert_eq!(flag.state(), FlagState::TransToNoWind);
        flag.advance();
        flag.advance();
        assert_eq!(flag.state(), FlagState::NoWind);
    }

    #[test]
    fn flag_sprite_key_tracks_state() {
        let mut goal = tile(0.0, TileRole::Goal);
        goal.sprite_key = "flag".to_string();
        goal.behavior = VisualBehavior::Flag(FlagAnimation::new(4, 0.15));
        assert_eq!(goal.sprite_frame().key, "flag/no_wind");
        goal.start_flag_transition();
        assert_eq!(goal.sprite_frame().key, "flag/trans_to_wind");
    }

    #[test]
    fn hazard_collision_rect_prefers_narrow_box() {
        let mut spike = tile(0.0, TileRole::Hazard { damage: 25.0 });
        spike.collide_rect = Some(Rect::new(0.0, 32.0, 64.0, 32.0));
        assert_eq!(spike.collision_rect().top(), 32.0);
    }
}
