use savegame::{Participant, ParticipantError, Position3, Rotation4, SaveRecordRow};

pub(crate) const CAMERA_NAME: &str = "MainCamera";

const FOLLOW_HEIGHT: f32 = 6.0;
const FOLLOW_BACK: f32 = -8.0;

/// Third-person camera that trails the player. Only its pose is saved.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CameraRig {
    pub(crate) position: Position3,
    pub(crate) rotation: Rotation4,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            position: Position3 {
                x: 0.0,
                y: FOLLOW_HEIGHT,
                z: FOLLOW_BACK,
            },
            rotation: Rotation4::IDENTITY,
        }
    }
}

impl CameraRig {
    pub(crate) fn track(&mut self, target: Position3) {
        self.position = Position3 {
            x: target.x,
            y: target.y + FOLLOW_HEIGHT,
            z: target.z + FOLLOW_BACK,
        };
    }
}

impl Participant for CameraRig {
    fn character_name(&self) -> String {
        CAMERA_NAME.to_string()
    }

    fn capture(
        &self,
        save_name: &str,
        scene_name: &str,
    ) -> Result<SaveRecordRow, ParticipantError> {
        let mut row =
            SaveRecordRow::new(save_name, CAMERA_NAME).with_pose(self.position, self.rotation);
        row.scene_name = scene_name.to_string();
        Ok(row)
    }

    fn restore(&mut self, row: &SaveRecordRow) -> Result<(), ParticipantError> {
        self.position = row.position();
        self.rotation = row.rotation();
        Ok(())
    }
}
