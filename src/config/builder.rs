use anyhow::Result;

use super::types::{Config, LlmSettings, RetrievalSettings, WorkflowSettings};

#[derive(Debug)]
pub struct ConfigBuilder {
    pub(super) llm: LlmSettings,
    pub(super) workflow: WorkflowSettings,
    pub(super) retrieval: RetrievalSettings,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            llm: LlmSettings::default(),
            workflow: WorkflowSettings::default(),
            retrieval: RetrievalSettings::default(),
        }
    }

    pub fn with_llm<F>(mut self, update: F) -> Self
    where
        F: FnOnce(&mut LlmSettings),
    {
        update(&mut self.llm);
        self
    }

    pub fn with_workflow<F>(mut self, update: F) -> Self
    where
        F: FnOnce(&mut WorkflowSettings),
    {
        update(&mut self.workflow);
        self
    }

    pub fn with_retrieval<F>(mut self, update: F) -> Self
    where
        F: FnOnce(&mut RetrievalSettings),
    {
        update(&mut self.retrieval);
        self
    }

    pub fn build(self) -> Result<Config> {
        Ok(Config {
            llm: self.llm,
            workflow: self.workflow,
            retrieval: self.retrieval,
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
