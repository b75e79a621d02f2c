use std::collections::HashMap;

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::physics::Face;

pub const MAX_LIGHT_LEVEL: u8 = 15;
pub const SKY_LIGHT_LEVEL: u8 = MAX_LIGHT_LEVEL;

#[repr(transparent)]
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Pod,
    Zeroable,
)]
pub struct BlockType(pub u8);

impl BlockType {
    pub const AIR: Self = Self(0);
    pub const GRASS: Self = Self(1);
    pub const DIRT: Self = Self(2);
    pub const STONE: Self = Self(3);
    pub const SAND: Self = Self(4);
    pub const CLAY: Self = Self(5);
    pub const GLOWSTONE: Self = Self(6);
    pub const COBBLESTONE: Self = Self(7);
    pub const CLAY_BRICK: Self = Self(8);
    pub const STONE_BRICK: Self = Self(9);
    pub const WATER: Self = Self(10);
    pub const BEDROCK: Self = Self(11);

    /// Sentinel for "no block type".
    pub const INVALID: Self = Self(u8::MAX);

    pub const COUNT: usize = 12;
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct BlockFlags: u8 {
        const LIGHT = 0x0F;
        const LIGHTING_DIRTY = 0x40;
        const SKY = 0x80;
    }
}

/// One voxel: a type id plus packed light level and lighting flags.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    pub block_type: BlockType,
    flags: BlockFlags,
}

impl Block {
    pub const AIR: Self = Self::new(BlockType::AIR);

    pub const fn new(block_type: BlockType) -> Self {
        Self {
            block_type,
            flags: BlockFlags::empty(),
        }
    }

    pub fn light(&self) -> u8 {
        self.flags.bits() & BlockFlags::LIGHT.bits()
    }

    pub fn set_light(&mut self, level: u8) {
        debug_assert!(level <= MAX_LIGHT_LEVEL, "light level {level} out of range");
        let level = level.min(MAX_LIGHT_LEVEL);
        let others = self.flags.bits() & !BlockFlags::LIGHT.bits();
        self.flags = BlockFlags::from_bits_retain(others | level);
    }

    pub fn is_sky(&self) -> bool {
        self.flags.contains(BlockFlags::SKY)
    }

    pub fn set_sky(&mut self, sky: bool) {
        self.flags.set(BlockFlags::SKY, sky);
    }

    pub fn is_lighting_dirty(&self) -> bool {
        self.flags.contains(BlockFlags::LIGHTING_DIRTY)
    }

    pub fn set_lighting_dirty(&mut self, dirty: bool) {
        self.flags.set(BlockFlags::LIGHTING_DIRTY, dirty);
    }

    pub fn flags(&self) -> BlockFlags {
        self.flags
    }
}

/// Cell on the 4x4 block sprite sheet. Mapping to texture coordinates is the
/// renderer's business.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpriteCell {
    pub column: u8,
    pub row: u8,
}

impl SpriteCell {
    pub const fn new(column: u8, row: u8) -> Self {
        Self { column, row }
    }
}

/// Audio asset handle. Playback happens elsewhere.
pub type SoundId = &'static str;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockSounds {
    pub breaking: Option<SoundId>,
    pub placing: Option<SoundId>,
    pub walking: Option<SoundId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockDefinition {
    pub name: &'static str,
    pub solid: bool,
    pub opaque: bool,
    pub visible: bool,
    pub toughness: f32,
    pub illumination: u8,
    pub top_sprite: SpriteCell,
    pub bottom_sprite: SpriteCell,
    pub side_sprite: SpriteCell,
    pub sounds: BlockSounds,
}

impl BlockDefinition {
    pub fn sprite_for_face(&self, face: Face) -> SpriteCell {
        match face {
            Face::PosZ => self.top_sprite,
            Face::NegZ => self.bottom_sprite,
            _ => self.side_sprite,
        }
    }

    pub fn is_emissive(&self) -> bool {
        self.illumination > 0
    }
}

pub struct BlockRegistry {
    definitions: Vec<BlockDefinition>,
    by_name: HashMap<&'static str, BlockType>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self {
            definitions: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn register(&mut self, definition: BlockDefinition) -> BlockType {
        debug_assert!(self.definitions.len() < usize::from(BlockType::INVALID.0));
        let id = BlockType(self.definitions.len() as u8);
        self.by_name.insert(definition.name, id);
        self.definitions.push(definition);
        id
    }

    pub fn get(&self, block_type: BlockType) -> Option<&BlockDefinition> {
        self.definitions.get(usize::from(block_type.0))
    }

    pub fn get_by_name(&self, name: &str) -> Option<BlockType> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, block_type: BlockType) -> bool {
        usize::from(block_type.0) < self.definitions.len()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockType, &BlockDefinition)> {
        self.definitions
            .iter()
            .enumerate()
            .map(|(index, definition)| (BlockType(index as u8), definition))
    }

    // Unknown types (including the sentinel) behave like air for every query.

    pub fn is_solid(&self, block_type: BlockType) -> bool {
        self.get(block_type).is_some_and(|d| d.solid)
    }

    pub fn is_opaque(&self, block_type: BlockType) -> bool {
        self.get(block_type).is_some_and(|d| d.opaque)
    }

    pub fn is_visible(&self, block_type: BlockType) -> bool {
        self.get(block_type).is_some_and(|d| d.visible)
    }

    pub fn illumination(&self, block_type: BlockType) -> u8 {
        self.get(block_type).map_or(0, |d| d.illumination)
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        register_default_blocks()
    }
}

fn uniform(
    name: &'static str,
    toughness: f32,
    sprite: SpriteCell,
    sounds: BlockSounds,
) -> BlockDefinition {
    BlockDefinition {
        name,
        solid: true,
        opaque: true,
        visible: true,
        toughness,
        illumination: 0,
        top_sprite: sprite,
        bottom_sprite: sprite,
        side_sprite: sprite,
        sounds,
    }
}

fn place_and_break(path: SoundId) -> BlockSounds {
    BlockSounds {
        breaking: Some(path),
        placing: Some(path),
        walking: None,
    }
}

pub fn register_default_blocks() -> BlockRegistry {
    let mut registry = BlockRegistry::new();

    registry.register(BlockDefinition {
        name: "air",
        solid: false,
        opaque: false,
        visible: false,
        toughness: 0.0,
        illumination: 0,
        top_sprite: SpriteCell::new(0, 0),
        bottom_sprite: SpriteCell::new(0, 0),
        side_sprite: SpriteCell::new(0, 0),
        sounds: BlockSounds::default(),
    });
    registry.register(BlockDefinition {
        top_sprite: SpriteCell::new(2, 0),
        bottom_sprite: SpriteCell::new(3, 0),
        side_sprite: SpriteCell::new(1, 0),
        sounds: BlockSounds {
            walking: Some("sounds/GrassWalking.ogg"),
            ..place_and_break("sounds/GrassPlacingAndBreaking.ogg")
        },
        ..uniform("grass", 3.0, SpriteCell::new(1, 0), BlockSounds::default())
    });
    registry.register(uniform(
        "dirt",
        3.0,
        SpriteCell::new(3, 0),
        place_and_break("sounds/DirtPlacingAndBreaking.ogg"),
    ));
    registry.register(uniform(
        "stone",
        5.0,
        SpriteCell::new(0, 1),
        place_and_break("sounds/StonePlacingAndBreaking.ogg"),
    ));
    registry.register(uniform(
        "sand",
        1.0,
        SpriteCell::new(1, 1),
        place_and_break("sounds/SandPlacingAndBreaking.ogg"),
    ));
    registry.register(uniform(
        "clay",
        2.0,
        SpriteCell::new(2, 1),
        place_and_break("sounds/ClayPlacingAndBreaking.ogg"),
    ));
    registry.register(BlockDefinition {
        illumination: 12,
        ..uniform(
            "glowstone",
            4.0,
            SpriteCell::new(3, 1),
            place_and_break("sounds/GlowstonePlacingAndBreaking.ogg"),
        )
    });
    registry.register(uniform(
        "cobblestone",
        4.0,
        SpriteCell::new(0, 2),
        BlockSounds {
            walking: Some("sounds/CobblestoneWalking.ogg"),
            ..place_and_break("sounds/CobblestonePlacingAndBreaking.ogg")
        },
    ));
    registry.register(uniform(
        "clay_brick",
        4.0,
        SpriteCell::new(1, 2),
        place_and_break("sounds/ClayBrickPlacingAndBreaking.ogg"),
    ));
    registry.register(uniform(
        "stone_brick",
        4.0,
        SpriteCell::new(2, 2),
        place_and_break("sounds/StoneBrickPlacingAndBreaking.ogg"),
    ));
    registry.register(BlockDefinition {
        solid: false,
        opaque: false,
        toughness: 0.0,
        sounds: BlockSounds {
            breaking: Some("sounds/WaterBreaking.ogg"),
            ..BlockSounds::default()
        },
        ..uniform("water", 0.0, SpriteCell::new(0, 0), BlockSounds::default())
    });
    registry.register(uniform(
        "bedrock",
        10.0,
        SpriteCell::new(3, 2),
        BlockSounds {
            breaking: Some("sounds/BedrockBreaking.ogg"),
            ..BlockSounds::default()
        },
    ));

    debug_assert_eq!(registry.len(), BlockType::COUNT);
    registry
}
