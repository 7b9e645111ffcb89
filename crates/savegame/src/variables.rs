use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::store::SaveRecordRow;
use crate::sync::{Participant, ParticipantError};

pub type VariableMap = BTreeMap<String, Value>;

/// Dialog variables grouped by the class name of the component that owns them.
pub type VariableStorage = BTreeMap<String, VariableMap>;

pub const DIALOG_STATE_CHARACTER_NAME: &str = "DialogManager";

/// A dialog-bearing component that accepts its restored variables.
pub trait VariableStorageConsumer {
    fn set_variable_storage(&mut self, variables: &VariableMap);
}

type SharedConsumer = Rc<RefCell<dyn VariableStorageConsumer>>;

/// Lookup table from class name to the live component that consumes that
/// class's variables. Registered at startup.
#[derive(Clone, Default)]
pub struct VariableConsumerTable {
    consumers: Rc<RefCell<BTreeMap<String, SharedConsumer>>>,
}

impl VariableConsumerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when an earlier consumer for `class_name` was replaced.
    pub fn register<C>(&self, class_name: impl Into<String>, consumer: Rc<RefCell<C>>) -> bool
    where
        C: VariableStorageConsumer + 'static,
    {
        let consumer: SharedConsumer = consumer;
        self.consumers
            .borrow_mut()
            .insert(class_name.into(), consumer)
            .is_some()
    }

    pub fn unregister(&self, class_name: &str) -> bool {
        self.consumers.borrow_mut().remove(class_name).is_some()
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.consumers.borrow().contains_key(class_name)
    }

    /// Hands each class its variables. Classes without a registered consumer
    /// are skipped. Returns the class names that received variables.
    pub fn distribute(&self, storage: &VariableStorage) -> Vec<String> {
        let targets: Vec<(String, Option<SharedConsumer>)> = {
            let consumers = self.consumers.borrow();
            storage
                .keys()
                .map(|class_name| (class_name.clone(), consumers.get(class_name).cloned()))
                .collect()
        };

        let mut delivered = Vec::new();
        for (class_name, consumer) in targets {
            let Some(consumer) = consumer else {
                debug!(class_name = %class_name, "variable_consumer_missing");
                continue;
            };
            let Ok(mut consumer) = consumer.try_borrow_mut() else {
                warn!(class_name = %class_name, "variable_consumer_busy");
                continue;
            };
            if let Some(variables) = storage.get(&class_name) {
                consumer.set_variable_storage(variables);
                delivered.push(class_name);
            }
        }
        delivered
    }
}

/// Persists the dialog variable storage through the `inventory_items`
/// payload of a single row.
pub struct DialogStateParticipant {
    character_name: String,
    storage: VariableStorage,
    consumers: VariableConsumerTable,
}

impl DialogStateParticipant {
    pub fn new(consumers: VariableConsumerTable) -> Self {
        Self {
            character_name: DIALOG_STATE_CHARACTER_NAME.to_string(),
            storage: VariableStorage::new(),
            consumers,
        }
    }

    pub fn storage(&self) -> &VariableStorage {
        &self.storage
    }

    pub fn set_variable(&mut self, class_name: &str, key: &str, value: Value) {
        self.storage
            .entry(class_name.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn variable(&self, class_name: &str, key: &str) -> Option<&Value> {
        self.storage.get(class_name)?.get(key)
    }
}

impl Participant for DialogStateParticipant {
    fn character_name(&self) -> String {
        self.character_name.clone()
    }

    fn capture(
        &self,
        save_name: &str,
        scene_name: &str,
    ) -> Result<SaveRecordRow, ParticipantError> {
        let payload = serde_json::to_string(&self.storage).map_err(|source| {
            ParticipantError::InvalidPayload {
                field: "inventory_items",
                source,
            }
        })?;
        let mut row = SaveRecordRow::new(save_name, self.character_name.clone());
        row.scene_name = scene_name.to_string();
        row.inventory_items = payload;
        Ok(row)
    }

    fn restore(&mut self, row: &SaveRecordRow) -> Result<(), ParticipantError> {
        let storage = decode_storage(&row.inventory_items)?;
        let delivered = self.consumers.distribute(&storage);
        debug!(
            classes = storage.len(),
            delivered = delivered.len(),
            "dialog_variables_restored"
        );
        self.storage = storage;
        Ok(())
    }
}

fn decode_storage(payload: &str) -> Result<VariableStorage, ParticipantError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() || trimmed == "[]" {
        return Ok(VariableStorage::new());
    }
    serde_json::from_str(trimmed).map_err(|source| ParticipantError::InvalidPayload {
        field: "inventory_items",
        source,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct Skeleton {
        variables: VariableMap,
        loads: u32,
    }

    impl VariableStorageConsumer for Skeleton {
        fn set_variable_storage(&mut self, variables: &VariableMap) {
            self.variables = variables.clone();
            self.loads += 1;
        }
    }

    #[test]
    fn distribute_delivers_to_registered_and_skips_missing() {
        let table = VariableConsumerTable::new();
        let skeleton = Rc::new(RefCell::new(Skeleton::default()));
        table.register("DialogSkeleton", Rc::clone(&skeleton));

        let mut storage = VariableStorage::new();
        storage
            .entry("DialogSkeleton".to_string())
            .or_default()
            .insert("met_player".to_string(), json!(true));
        storage
            .entry("RemovedNpc".to_string())
            .or_default()
            .insert("mood".to_string(), json!("grumpy"));

        let delivered = table.distribute(&storage);
        assert_eq!(delivered, vec!["DialogSkeleton".to_string()]);
        assert_eq!(skeleton.borrow().variables["met_player"], json!(true));
    }

    #[test]
    fn register_reports_replacement_and_unregister_removes() {
        let table = VariableConsumerTable::new();
        assert!(!table.register("Npc", Rc::new(RefCell::new(Skeleton::default()))));
        assert!(table.register("Npc", Rc::new(RefCell::new(Skeleton::default()))));
        assert!(table.unregister("Npc"));
        assert!(!table.contains("Npc"));
    }

    #[test]
    fn dialog_state_round_trips_through_its_row() {
        let table = VariableConsumerTable::new();
        let skeleton = Rc::new(RefCell::new(Skeleton::default()));
        table.register("DialogSkeleton", Rc::clone(&skeleton));

        let mut saved = DialogStateParticipant::new(table.clone());
        saved.set_variable("DialogSkeleton", "times_talked", json!(3));
        let row = saved.capture("save", "Forest").expect("capture");
        assert_eq!(row.character_name, DIALOG_STATE_CHARACTER_NAME);

        let mut restored = DialogStateParticipant::new(table);
        restored.restore(&row).expect("restore");
        assert_eq!(
            restored.variable("DialogSkeleton", "times_talked"),
            Some(&json!(3))
        );
        assert_eq!(skeleton.borrow().loads, 1);
    }

    #[test]
    fn default_row_payload_restores_empty_storage() {
        let mut dialog = DialogStateParticipant::new(VariableConsumerTable::new());
        dialog.set_variable("Npc", "flag", json!(1));
        dialog
            .restore(&SaveRecordRow::new("save", DIALOG_STATE_CHARACTER_NAME))
            .expect("restore");
        assert!(dialog.storage().is_empty());
    }

    #[test]
    fn malformed_payload_is_rejected_without_touching_state() {
        let mut dialog = DialogStateParticipant::new(VariableConsumerTable::new());
        dialog.set_variable("Npc", "flag", json!(1));
        let mut row = SaveRecordRow::new("save", DIALOG_STATE_CHARACTER_NAME);
        row.inventory_items = "{not json".to_string();

        let error = dialog.restore(&row).expect_err("malformed payload");
        assert!(matches!(
            error,
            ParticipantError::InvalidPayload {
                field: "inventory_items",
                ..
            }
        ));
        assert_eq!(dialog.variable("Npc", "flag"), Some(&json!(1)));
    }
}
