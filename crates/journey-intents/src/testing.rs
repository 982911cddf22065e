//! Shared fixtures for intent tests

use crate::outcome::IntentContext;
use journey_browser::InventoryBudget;
use journey_core::fail_open::EvidenceGaps;
use journey_core::Timeouts;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

pub struct Harness {
    pub temp: TempDir,
    pub timeouts: Timeouts,
    pub inventory: InventoryBudget,
    pub bullets: Vec<String>,
    pub form_definition: Option<Value>,
}

impl Harness {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let inventory = InventoryBudget::new(temp.path(), 4, Arc::new(EvidenceGaps::new()));
        Self {
            temp,
            timeouts: Timeouts::immediate(),
            inventory,
            bullets: Vec::new(),
            form_definition: None,
        }
    }

    pub fn ctx(&mut self) -> IntentContext<'_> {
        IntentContext {
            run_dir: self.temp.path(),
            timeouts: &self.timeouts,
            inventory: &mut self.inventory,
            form_definition: self.form_definition.as_ref(),
            bullets: &self.bullets,
        }
    }
}
