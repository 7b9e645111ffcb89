mod actors;
mod camera;
mod dialog;
mod session;

#[cfg(test)]
mod tests;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use savegame::{
    Attachment, DialogStateParticipant, ParticipantRegistry, VariableConsumerTable,
    VariableStorage,
};
use serde_json::json;
use tracing::debug;

use self::actors::Character;
use self::camera::CameraRig;
use self::dialog::{DialogSkeleton, SKELETON_CLASS_NAME};

pub(crate) use self::session::{DemoSession, SessionOutcome, SessionScript};

pub(crate) const MEADOW_SCENE: &str = "Meadow";
pub(crate) const DEMO_SCENES: [&str; 3] = [MEADOW_SCENE, "Cave", "LoadingScene"];

/// Everything in the demo that takes part in save and load.
pub(crate) struct World {
    pub(crate) player: Rc<RefCell<Character>>,
    pub(crate) companion: Rc<RefCell<Character>>,
    pub(crate) camera: Rc<RefCell<CameraRig>>,
    pub(crate) dialog: Rc<RefCell<DialogStateParticipant>>,
    pub(crate) skeleton: Rc<RefCell<DialogSkeleton>>,
    consumers: VariableConsumerTable,
    attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WorldSnapshot {
    pub(crate) player: Character,
    pub(crate) companion: Character,
    pub(crate) camera: CameraRig,
    pub(crate) dialog: VariableStorage,
}

impl World {
    /// Builds the participants and attaches them to `registry`.
    pub(crate) fn spawn(registry: &ParticipantRegistry) -> Self {
        let consumers = VariableConsumerTable::new();
        let skeleton = Rc::new(RefCell::new(DialogSkeleton::default()));
        consumers.register(SKELETON_CLASS_NAME, Rc::clone(&skeleton));

        let mut dialog = DialogStateParticipant::new(consumers.clone());
        dialog.set_variable(SKELETON_CLASS_NAME, "met_player", json!(true));
        dialog.set_variable(SKELETON_CLASS_NAME, "times_talked", json!(2));

        let world = Self {
            player: Rc::new(RefCell::new(Character::player())),
            companion: Rc::new(RefCell::new(Character::companion())),
            camera: Rc::new(RefCell::new(CameraRig::default())),
            dialog: Rc::new(RefCell::new(dialog)),
            skeleton,
            consumers,
            attachments: Vec::new(),
        };
        world.enable(registry)
    }

    fn enable(mut self, registry: &ParticipantRegistry) -> Self {
        self.attachments = vec![
            registry.attach(&self.player),
            registry.attach(&self.companion),
            registry.attach(&self.camera),
            registry.attach(&self.dialog),
        ];
        debug!(participants = self.attachments.len(), "world_enabled");
        self
    }

    /// Detaches every participant. Returns how many were still attached.
    pub(crate) fn disable(&mut self, registry: &ParticipantRegistry) -> usize {
        let detached = self
            .attachments
            .drain(..)
            .filter(|attachment| registry.detach(*attachment))
            .count();
        self.consumers.unregister(SKELETON_CLASS_NAME);
        debug!(detached, "world_disabled");
        detached
    }

    pub(crate) fn fixed_update(&self, sim_dt: Duration) {
        let dt = sim_dt.as_secs_f32();
        if dt <= 0.0 {
            return;
        }
        let leader = {
            let mut player = self.player.borrow_mut();
            player.walk(dt);
            player.position
        };
        self.companion.borrow_mut().follow(leader);
        self.camera.borrow_mut().track(leader);
    }

    pub(crate) fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            player: self.player.borrow().clone(),
            companion: self.companion.borrow().clone(),
            camera: self.camera.borrow().clone(),
            dialog: self.dialog.borrow().storage().clone(),
        }
    }

    /// Roughs up the live state so a later load has something to undo.
    pub(crate) fn scramble(&self) {
        {
            let mut player = self.player.borrow_mut();
            player.health = (player.health - 35.0).max(1.0);
            player.position.x += 25.0;
            player.inventory.clear();
        }
        self.companion.borrow_mut().level += 1;
        self.camera.borrow_mut().position.y += 3.0;
        self.dialog
            .borrow_mut()
            .set_variable(SKELETON_CLASS_NAME, "times_talked", json!(99));
    }
}
