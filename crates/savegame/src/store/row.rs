use serde::{Deserialize, Serialize};

/// One flat persisted record: either a participant's state or the save header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecordRow {
    #[serde(default)]
    pub id: u64,
    pub scene_name: String,
    pub save_name: String,
    pub character_name: String,
    pub health: f32,
    pub max_health: f32,
    pub stamina: f32,
    pub max_stamina: f32,
    pub level: i32,
    pub position_x: f32,
    pub position_y: f32,
    pub position_z: f32,
    pub rotation_x: f32,
    pub rotation_y: f32,
    pub rotation_z: f32,
    pub rotation_w: f32,
    pub inventory_items: String,
    pub is_invincible: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Rotation4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rotation4 {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };
}

impl SaveRecordRow {
    /// Empty participant row tagged for `save_name`. Numeric fields start at
    /// zero and the rotation at identity.
    pub fn new(save_name: impl Into<String>, character_name: impl Into<String>) -> Self {
        Self {
            id: 0,
            scene_name: String::new(),
            save_name: save_name.into(),
            character_name: character_name.into(),
            health: 0.0,
            max_health: 0.0,
            stamina: 0.0,
            max_stamina: 0.0,
            level: 0,
            position_x: 0.0,
            position_y: 0.0,
            position_z: 0.0,
            rotation_x: 0.0,
            rotation_y: 0.0,
            rotation_z: 0.0,
            rotation_w: 1.0,
            inventory_items: "[]".to_string(),
            is_invincible: false,
        }
    }

    /// The reserved row describing the save itself.
    pub fn header(
        save_name: impl Into<String>,
        scene_name: impl Into<String>,
        sentinel: &str,
    ) -> Self {
        Self {
            scene_name: scene_name.into(),
            ..Self::new(save_name, sentinel)
        }
    }

    pub fn is_header(&self, sentinel: &str) -> bool {
        self.character_name == sentinel
    }

    pub fn position(&self) -> Position3 {
        Position3 {
            x: self.position_x,
            y: self.position_y,
            z: self.position_z,
        }
    }

    pub fn rotation(&self) -> Rotation4 {
        Rotation4 {
            x: self.rotation_x,
            y: self.rotation_y,
            z: self.rotation_z,
            w: self.rotation_w,
        }
    }

    pub fn with_pose(mut self, position: Position3, rotation: Rotation4) -> Self {
        self.position_x = position.x;
        self.position_y = position.y;
        self.position_z = position.z;
        self.rotation_x = rotation.x;
        self.rotation_y = rotation.y;
        self.rotation_z = rotation.z;
        self.rotation_w = rotation.w;
        self
    }

    pub fn with_health(mut self, health: f32, max_health: f32) -> Self {
        self.health = health;
        self.max_health = max_health;
        self
    }

    pub fn with_stamina(mut self, stamina: f32, max_stamina: f32) -> Self {
        self.stamina = stamina;
        self.max_stamina = max_stamina;
        self
    }
}

/// Finds the row belonging to `character_name`, ignoring the header.
pub fn find_row<'a>(
    rows: &'a [SaveRecordRow],
    character_name: &str,
    sentinel: &str,
) -> Option<&'a SaveRecordRow> {
    rows.iter()
        .find(|row| row.character_name == character_name && !row.is_header(sentinel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_row_carries_scene_and_zeroed_fields() {
        let header = SaveRecordRow::header("2024-01-01_00-00-00", "Forest", "InitialRow");
        assert!(header.is_header("InitialRow"));
        assert_eq!(header.scene_name, "Forest");
        assert_eq!(header.health, 0.0);
        assert_eq!(header.level, 0);
        assert_eq!(header.rotation(), Rotation4::IDENTITY);
        assert_eq!(header.inventory_items, "[]");
    }

    #[test]
    fn find_row_skips_header_even_when_names_collide() {
        let rows = vec![
            SaveRecordRow::header("s", "Forest", "InitialRow"),
            SaveRecordRow::new("s", "Player").with_health(80.0, 100.0),
        ];
        assert_eq!(
            find_row(&rows, "Player", "InitialRow").map(|row| row.health),
            Some(80.0)
        );
        assert!(find_row(&rows, "InitialRow", "InitialRow").is_none());
        assert!(find_row(&rows, "Okto", "InitialRow").is_none());
    }

    #[test]
    fn missing_id_defaults_to_zero_when_parsing() {
        let mut value = serde_json::to_value(SaveRecordRow::new("s", "Player")).expect("encode");
        value.as_object_mut().expect("object").remove("id");
        let row: SaveRecordRow = serde_json::from_value(value).expect("decode");
        assert_eq!(row.id, 0);
        assert_eq!(row.character_name, "Player");
    }
}
