use savegame::{VariableMap, VariableStorageConsumer};
use serde_json::Value;

pub(crate) const SKELETON_CLASS_NAME: &str = "DialogSkeleton";

/// Talkative skeleton whose dialog graph reads a handful of variables.
#[derive(Debug, Default)]
pub(crate) struct DialogSkeleton {
    variables: VariableMap,
    restores: u32,
}

impl DialogSkeleton {
    pub(crate) fn variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    pub(crate) fn restores(&self) -> u32 {
        self.restores
    }
}

impl VariableStorageConsumer for DialogSkeleton {
    fn set_variable_storage(&mut self, variables: &VariableMap) {
        self.variables = variables.clone();
        self.restores += 1;
    }
}
