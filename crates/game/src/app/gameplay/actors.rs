use savegame::{Participant, ParticipantError, Position3, Rotation4, SaveRecordRow};
use serde::{Deserialize, Serialize};

pub(crate) const PLAYER_NAME: &str = "Player";
pub(crate) const COMPANION_NAME: &str = "Okto";

const PLAYER_WALK_SPEED: f32 = 2.0;
const COMPANION_FOLLOW_DISTANCE: f32 = 1.5;
const STAMINA_DRAIN_PER_SECOND: f32 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct InventoryItem {
    pub(crate) id: String,
    pub(crate) count: u32,
}

/// A saved character: the player or the companion that trails them.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Character {
    name: String,
    pub(crate) health: f32,
    pub(crate) max_health: f32,
    pub(crate) stamina: f32,
    pub(crate) max_stamina: f32,
    pub(crate) level: i32,
    pub(crate) position: Position3,
    pub(crate) rotation: Rotation4,
    pub(crate) inventory: Vec<InventoryItem>,
    pub(crate) invincible: bool,
}

impl Character {
    pub(crate) fn player() -> Self {
        Self {
            name: PLAYER_NAME.to_string(),
            health: 100.0,
            max_health: 100.0,
            stamina: 50.0,
            max_stamina: 50.0,
            level: 1,
            position: Position3::default(),
            rotation: Rotation4::IDENTITY,
            inventory: vec![InventoryItem {
                id: "torch".to_string(),
                count: 1,
            }],
            invincible: false,
        }
    }

    pub(crate) fn companion() -> Self {
        Self {
            name: COMPANION_NAME.to_string(),
            health: 60.0,
            max_health: 60.0,
            stamina: 0.0,
            max_stamina: 0.0,
            level: 3,
            position: Position3 {
                x: -COMPANION_FOLLOW_DISTANCE,
                y: 0.0,
                z: 0.0,
            },
            rotation: Rotation4::IDENTITY,
            inventory: Vec::new(),
            invincible: true,
        }
    }

    /// Walks along +x and burns stamina while any is left.
    pub(crate) fn walk(&mut self, dt_seconds: f32) {
        if dt_seconds <= 0.0 || self.stamina <= 0.0 {
            return;
        }
        self.position.x += PLAYER_WALK_SPEED * dt_seconds;
        self.stamina = (self.stamina - STAMINA_DRAIN_PER_SECOND * dt_seconds).max(0.0);
    }

    pub(crate) fn follow(&mut self, leader: Position3) {
        self.position = Position3 {
            x: leader.x - COMPANION_FOLLOW_DISTANCE,
            y: leader.y,
            z: leader.z,
        };
    }
}

impl Participant for Character {
    fn character_name(&self) -> String {
        self.name.clone()
    }

    fn capture(
        &self,
        save_name: &str,
        scene_name: &str,
    ) -> Result<SaveRecordRow, ParticipantError> {
        let inventory_items = serde_json::to_string(&self.inventory).map_err(|source| {
            ParticipantError::InvalidPayload {
                field: "inventory_items",
                source,
            }
        })?;
        let mut row = SaveRecordRow::new(save_name, self.name.clone())
            .with_health(self.health, self.max_health)
            .with_stamina(self.stamina, self.max_stamina)
            .with_pose(self.position, self.rotation);
        row.scene_name = scene_name.to_string();
        row.level = self.level;
        row.inventory_items = inventory_items;
        row.is_invincible = self.invincible;
        Ok(row)
    }

    fn restore(&mut self, row: &SaveRecordRow) -> Result<(), ParticipantError> {
        let inventory = decode_inventory(&row.inventory_items)?;
        self.health = row.health;
        self.max_health = row.max_health;
        self.stamina = row.stamina;
        self.max_stamina = row.max_stamina;
        self.level = row.level;
        self.position = row.position();
        self.rotation = row.rotation();
        self.inventory = inventory;
        self.invincible = row.is_invincible;
        Ok(())
    }
}

fn decode_inventory(payload: &str) -> Result<Vec<InventoryItem>, ParticipantError> {
    if payload.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut deserializer = serde_json::Deserializer::from_str(payload);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
        ParticipantError::Rejected {
            message: format!("inventory_items at {}: {}", err.path(), err.inner()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_then_restore_brings_back_every_saved_field() {
        let mut saved = Character::player();
        saved.walk(1.0);
        saved.health = 42.5;
        saved.inventory.push(InventoryItem {
            id: "rope".to_string(),
            count: 3,
        });
        let row = saved.capture("save", "Meadow").expect("capture");
        assert_eq!(row.character_name, PLAYER_NAME);
        assert_eq!(row.scene_name, "Meadow");

        let mut restored = Character::player();
        restored.restore(&row).expect("restore");
        assert_eq!(restored, saved);
    }

    #[test]
    fn walking_stops_when_stamina_runs_out() {
        let mut player = Character::player();
        player.walk(20.0);
        assert_eq!(player.stamina, 0.0);
        let stalled_at = player.position;
        player.walk(1.0);
        assert_eq!(player.position, stalled_at);
    }

    #[test]
    fn companion_keeps_its_distance_behind_the_leader() {
        let mut okto = Character::companion();
        okto.follow(Position3 {
            x: 10.0,
            y: 2.0,
            z: 0.0,
        });
        assert_eq!(okto.position.x, 10.0 - COMPANION_FOLLOW_DISTANCE);
        assert_eq!(okto.position.y, 2.0);
    }

    #[test]
    fn bad_inventory_payload_names_the_offending_path() {
        let mut player = Character::player();
        let mut row = player.capture("save", "Meadow").expect("capture");
        row.health = 1.0;
        row.inventory_items = r#"[{"id":"rope","count":"three"}]"#.to_string();

        let error = player.restore(&row).expect_err("bad payload");
        let ParticipantError::Rejected { message } = error else {
            panic!("unexpected error variant");
        };
        assert!(message.contains("[0].count"), "{message}");
        assert_eq!(player.health, 100.0);
    }
}
