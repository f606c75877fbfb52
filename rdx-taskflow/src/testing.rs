//! Test helpers: a task that writes every lifecycle call into a shared journal.

use crate::common::{ResourceId, ResourceSet};
use crate::components::task::Task;
use crate::time::TickContext;
use anyhow::Result;
use std::sync::{Arc, Mutex};

/// Shared, ordered record of lifecycle calls.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn record(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.lock().unwrap().iter().any(|e| e == entry)
    }

    /// Position of the first matching entry.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.lock().unwrap().iter().position(|e| e == entry)
    }
}

/// Records `label:start`, `label:step`, `label:end` / `label:interrupted`.
///
/// Runs forever unless `finish_after` is set, in which case it reports finished
/// once it has been stepped that many times.
pub struct Probe {
    label: String,
    journal: Journal,
    finish_after: Option<u32>,
    steps: u32,
    requirements: ResourceSet,
    interruptible: bool,
    fail_on_step: bool,
    fail_on_end: bool,
}

impl Probe {
    pub fn new(label: &str, journal: &Journal) -> Self {
        Self {
            label: label.to_string(),
            journal: journal.clone(),
            finish_after: None,
            steps: 0,
            requirements: ResourceSet::new(),
            interruptible: true,
            fail_on_step: false,
            fail_on_end: false,
        }
    }

    pub fn finish_after(mut self, steps: u32) -> Self {
        self.finish_after = Some(steps);
        self
    }

    pub fn requiring(mut self, resource: ResourceId) -> Self {
        self.requirements.insert(resource);
        self
    }

    pub fn uninterruptible(mut self) -> Self {
        self.interruptible = false;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_on_step = true;
        self
    }

    pub fn failing_end(mut self) -> Self {
        self.fail_on_end = true;
        self
    }
}

impl Task for Probe {
    fn name(&self) -> String {
        self.label.clone()
    }

    fn requirements(&self) -> ResourceSet {
        self.requirements.clone()
    }

    fn start(&mut self, _ctx: &TickContext) -> Result<()> {
        self.steps = 0;
        self.journal.record(format!("{}:start", self.label));
        Ok(())
    }

    fn step(&mut self, _ctx: &TickContext) -> Result<()> {
        if self.fail_on_step {
            anyhow::bail!("{} failed", self.label);
        }
        self.steps += 1;
        self.journal.record(format!("{}:step", self.label));
        Ok(())
    }

    fn is_finished(&mut self, _ctx: &TickContext) -> Result<bool> {
        Ok(self.finish_after.is_some_and(|n| self.steps >= n))
    }

    fn end(&mut self, _ctx: &TickContext, interrupted: bool) -> Result<()> {
        if self.fail_on_end {
            anyhow::bail!("{} failed to end", self.label);
        }
        let suffix = if interrupted { "interrupted" } else { "end" };
        self.journal.record(format!("{}:{}", self.label, suffix));
        Ok(())
    }

    fn interruptible(&self) -> bool {
        self.interruptible
    }
}
