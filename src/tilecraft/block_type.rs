use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Raw tile value as stored in chunks and sent over the wire.
pub type BlockId = u8;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Deserialize, Serialize)]
#[repr(u8)]
pub enum BlockType {
    Air = 0,
    Dirt,
    Stone,
    Grass,
    Sand,
    Wood,
    Leaves,
    Snow,
    Ice,
    Gravel,
    CoalOre,
    CopperOre,
    Obsidian,
    Cactus,
    Sandstone
}

pub const ALL_BLOCKS: [BlockType; 15] = [
    BlockType::Air,
    BlockType::Dirt,
    BlockType::Stone,
    BlockType::Grass,
    BlockType::Sand,
    BlockType::Wood,
    BlockType::Leaves,
    BlockType::Snow,
    BlockType::Ice,
    BlockType::Gravel,
    BlockType::CoalOre,
    BlockType::CopperOre,
    BlockType::Obsidian,
    BlockType::Cactus,
    BlockType::Sandstone
];

impl BlockType {
    pub fn id(self) -> BlockId {
        self as BlockId
    }

    pub fn from_id(id: BlockId) -> Option<BlockType> {
        ALL_BLOCKS.get(id as usize).copied()
    }

    // registry key, also used as the texture key
    pub fn key(self) -> &'static str {
        match self {
            BlockType::Air => "air",
            BlockType::Dirt => "dirt",
            BlockType::Stone => "stone",
            BlockType::Grass => "grass",
            BlockType::Sand => "sand",
            BlockType::Wood => "wood",
            BlockType::Leaves => "leaves",
            BlockType::Snow => "snow",
            BlockType::Ice => "ice",
            BlockType::Gravel => "gravel",
            BlockType::CoalOre => "coal_ore",
            BlockType::CopperOre => "copper_ore",
            BlockType::Obsidian => "obsidian",
            BlockType::Cactus => "cactus",
            BlockType::Sandstone => "sandstone"
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            BlockType::Air => "Air",
            BlockType::Dirt => "Dirt",
            BlockType::Stone => "Stone",
            BlockType::Grass => "Grass",
            BlockType::Sand => "Sand",
            BlockType::Wood => "Wood",
            BlockType::Leaves => "Leaves",
            BlockType::Snow => "Snow",
            BlockType::Ice => "Ice",
            BlockType::Gravel => "Gravel",
            BlockType::CoalOre => "Coal Ore",
            BlockType::CopperOre => "Copper Ore",
            BlockType::Obsidian => "Obsidian",
            BlockType::Cactus => "Cactus",
            BlockType::Sandstone => "Sandstone"
        }
    }

    pub fn color(self) -> (u8, u8, u8) {
        match self {
            BlockType::Air => (255, 255, 255),
            BlockType::Dirt => (139, 69, 19),
            BlockType::Stone => (110, 110, 110),
            BlockType::Grass => (34, 139, 34),
            BlockType::Sand => (194, 178, 128),
            BlockType::Wood => (101, 67, 33),
            BlockType::Leaves => (50, 205, 50),
            BlockType::Snow => (240, 248, 255),
            BlockType::Ice => (165, 210, 245),
            BlockType::Gravel => (136, 126, 126),
            BlockType::CoalOre => (54, 54, 54),
            BlockType::CopperOre => (184, 115, 51),
            BlockType::Obsidian => (40, 22, 60),
            BlockType::Cactus => (83, 130, 53),
            BlockType::Sandstone => (216, 201, 155)
        }
    }

    pub fn is_solid(self) -> bool {
        self != BlockType::Air
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDefinition {
    pub id: BlockId,
    pub name: String,
    pub color: (u8, u8, u8),
    pub solid: bool,
    pub texture: Option<String>
}

/// Block definitions keyed by block key. Authoritative on the server and
/// shipped verbatim to every client during the handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockRegistry {
    blocks: BTreeMap<String, BlockDefinition>
}

impl BlockRegistry {
    pub fn builtin() -> BlockRegistry {
        let blocks = ALL_BLOCKS.iter().map(|block| {
            let definition = BlockDefinition {
                id: block.id(),
                name: String::from(block.display_name()),
                color: block.color(),
                solid: block.is_solid(),
                // air is never drawn
                texture: match block {
                    BlockType::Air => None,
                    _ => Some(String::from(block.key()))
                }
            };
            (String::from(block.key()), definition)
        }).collect();
        BlockRegistry { blocks }
    }

    pub fn get(&self, key: &str) -> Option<&BlockDefinition> {
        self.blocks.get(key)
    }

    pub fn by_id(&self, id: BlockId) -> Option<&BlockDefinition> {
        self.blocks.values().find(|definition| definition.id == id)
    }

    pub fn contains_id(&self, id: BlockId) -> bool {
        self.by_id(id).is_some()
    }

    // ids the registry does not know are treated as non-solid
    pub fn is_solid(&self, id: BlockId) -> bool {
        self.by_id(id).map_or(false, |definition| definition.solid)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAction {
    PlaceBlock
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: u32,
    pub name: String,
    pub block_id: BlockId,
    pub action: ItemAction
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemRegistry {
    items: BTreeMap<String, ItemDefinition>
}

impl ItemRegistry {
    // one placeable item per building block; ores and vegetation only come from terrain
    pub fn builtin() -> ItemRegistry {
        let placeable = [
            BlockType::Dirt,
            BlockType::Stone,
            BlockType::Grass,
            BlockType::Sand,
            BlockType::Wood,
            BlockType::Leaves,
            BlockType::Snow,
            BlockType::Ice,
            BlockType::Gravel,
            BlockType::Sandstone
        ];
        let items = placeable.iter().map(|block| {
            let definition = ItemDefinition {
                id: block.id() as u32,
                name: format!("{} Block", block.display_name()),
                block_id: block.id(),
                action: ItemAction::PlaceBlock
            };
            (format!("{}_block", block.key()), definition)
        }).collect();
        ItemRegistry { items }
    }

    pub fn get(&self, key: &str) -> Option<&ItemDefinition> {
        self.items.get(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_from_id() {
        for block in ALL_BLOCKS.iter() {
            assert_eq!(BlockType::from_id(block.id()), Some(*block));
        }
        assert_eq!(BlockType::from_id(200), None);
    }

    #[test]
    fn builtin_registry_keeps_stable_ids() {
        let registry = BlockRegistry::builtin();
        assert_eq!(registry.len(), ALL_BLOCKS.len());

        let dirt = registry.get("dirt").unwrap();
        assert_eq!(dirt.id, 1);
        assert_eq!(dirt.color, (139, 69, 19));
        assert!(dirt.solid);
        assert_eq!(dirt.texture.as_deref(), Some("dirt"));

        let air = registry.get("air").unwrap();
        assert_eq!(air.id, 0);
        assert!(!air.solid);
        assert_eq!(air.texture, None);

        assert_eq!(registry.get("leaves").unwrap().id, 6);
    }

    #[test]
    fn unknown_ids_are_not_solid() {
        let registry = BlockRegistry::builtin();
        assert!(registry.is_solid(BlockType::Stone.id()));
        assert!(!registry.is_solid(BlockType::Air.id()));
        assert!(!registry.is_solid(250));
        assert!(!registry.contains_id(250));
    }

    #[test]
    fn items_point_at_their_blocks() {
        let items = ItemRegistry::builtin();
        let stone = items.get("stone_block").unwrap();
        assert_eq!(stone.block_id, BlockType::Stone.id());
        assert_eq!(stone.name, "Stone Block");
        assert_eq!(stone.action, ItemAction::PlaceBlock);
        assert!(items.get("air_block").is_none());
    }

    #[test]
    fn registry_serializes_as_a_plain_map() {
        let json = serde_json::to_value(BlockRegistry::builtin()).unwrap();
        assert_eq!(json["grass"]["id"], 3);
        assert_eq!(json["grass"]["color"], serde_json::json!([34, 139, 34]));
        assert_eq!(json["air"]["texture"], serde_json::Value::Null);

        let items = serde_json::to_value(ItemRegistry::builtin()).unwrap();
        assert_eq!(items["dirt_block"]["action"], "place_block");
    }
}
