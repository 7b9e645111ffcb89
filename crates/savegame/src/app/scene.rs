use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneLoadMode {
    /// Replaces every loaded scene.
    Single,
    /// Loads alongside the scenes already present.
    Additive,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("scene '{name}' is not known to the scene loader")]
    UnknownScene { name: String },
    #[error("scene '{name}' is not loaded")]
    NotLoaded { name: String },
}

/// Progress of one asynchronous scene load, shared with the loader.
#[derive(Debug, Clone)]
pub struct SceneLoadHandle {
    scene_name: Rc<str>,
    progress: Rc<Cell<f32>>,
}

impl SceneLoadHandle {
    pub fn new(scene_name: &str) -> Self {
        Self {
            scene_name: Rc::from(scene_name),
            progress: Rc::new(Cell::new(0.0)),
        }
    }

    pub fn scene_name(&self) -> &str {
        &self.scene_name
    }

    pub fn progress(&self) -> f32 {
        self.progress.get()
    }

    pub fn is_done(&self) -> bool {
        self.progress.get() >= 1.0
    }

    pub fn set_progress(&self, progress: f32) {
        self.progress.set(progress.clamp(0.0, 1.0));
    }
}

/// The host's scene graph as the save coordinators see it.
pub trait SceneLoader {
    fn active_scene_name(&self) -> String;

    fn load_scene_async(
        &mut self,
        name: &str,
        mode: SceneLoadMode,
    ) -> Result<SceneLoadHandle, SceneError>;

    fn unload_scene(&mut self, name: &str) -> Result<(), SceneError>;

    fn set_active_scene(&mut self, name: &str) -> Result<(), SceneError>;

    /// Advances pending loads. Called once per frame.
    fn update(&mut self);
}

#[derive(Debug)]
struct PendingLoad {
    mode: SceneLoadMode,
    handle: SceneLoadHandle,
    remaining_updates: u32,
}

/// In-memory scene graph whose loads finish after a fixed number of updates.
#[derive(Debug)]
pub struct SimulatedSceneLoader {
    known: BTreeSet<String>,
    loaded: Vec<String>,
    active: Option<String>,
    pending: Vec<PendingLoad>,
    updates_per_load: u32,
}

impl SimulatedSceneLoader {
    pub fn new<I, S>(known_scenes: I, initial_scene: &str, updates_per_load: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut known: BTreeSet<String> = known_scenes.into_iter().map(Into::into).collect();
        known.insert(initial_scene.to_string());
        Self {
            known,
            loaded: vec![initial_scene.to_string()],
            active: Some(initial_scene.to_string()),
            pending: Vec::new(),
            updates_per_load: updates_per_load.max(1),
        }
    }

    pub fn loaded_scenes(&self) -> &[String] {
        &self.loaded
    }

    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    fn finish_load(&mut self, load: PendingLoad) {
        let name = load.handle.scene_name().to_string();
        match load.mode {
            SceneLoadMode::Single => {
                self.loaded = vec![name.clone()];
                self.active = Some(name.clone());
            }
            SceneLoadMode::Additive => {
                if !self.loaded.contains(&name) {
                    self.loaded.push(name.clone());
                }
                if self.active.is_none() {
                    self.active = Some(name.clone());
                }
            }
        }
        load.handle.set_progress(1.0);
        info!(scene = %name, mode = ?load.mode, "scene_loaded");
    }
}

impl SceneLoader for SimulatedSceneLoader {
    fn active_scene_name(&self) -> String {
        self.active.clone().unwrap_or_default()
    }

    fn load_scene_async(
        &mut self,
        name: &str,
        mode: SceneLoadMode,
    ) -> Result<SceneLoadHandle, SceneError> {
        if !self.known.contains(name) {
            return Err(SceneError::UnknownScene {
                name: name.to_string(),
            });
        }
        let handle = SceneLoadHandle::new(name);
        debug!(scene = name, mode = ?mode, "scene_load_started");
        self.pending.push(PendingLoad {
            mode,
            handle: handle.clone(),
            remaining_updates: self.updates_per_load,
        });
        Ok(handle)
    }

    fn unload_scene(&mut self, name: &str) -> Result<(), SceneError> {
        let Some(index) = self.loaded.iter().position(|loaded| loaded == name) else {
            return Err(SceneError::NotLoaded {
                name: name.to_string(),
            });
        };
        self.loaded.remove(index);
        if self.active.as_deref() == Some(name) {
            self.active = self.loaded.first().cloned();
        }
        info!(scene = name, "scene_unloaded");
        Ok(())
    }

    fn set_active_scene(&mut self, name: &str) -> Result<(), SceneError> {
        if !self.loaded.iter().any(|loaded| loaded == name) {
            return Err(SceneError::NotLoaded {
                name: name.to_string(),
            });
        }
        self.active = Some(name.to_string());
        Ok(())
    }

    fn update(&mut self) {
        let total = self.updates_per_load as f32;
        let mut finished = Vec::new();
        let mut index = 0;
        while index < self.pending.len() {
            let load = &mut self.pending[index];
            load.remaining_updates = load.remaining_updates.saturating_sub(1);
            if load.remaining_updates == 0 {
                finished.push(self.pending.remove(index));
            } else {
                let done = total - load.remaining_updates as f32;
                load.handle.set_progress((done / total).min(0.9));
                index += 1;
            }
        }
        for load in finished {
            self.finish_load(load);
        }
    }
}
