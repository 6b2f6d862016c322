//! Job registry
//!
//! Maps entry-point names to job factories. The controller uses it to
//! validate a run before spawning anything; workers use it to instantiate the
//! job named on their command line.

use std::any::TypeId;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use crate::error::{ExecutionError, ExecutionResult};
use crate::job::{Job, JobVariant};
use crate::runner::{ErasedJob, TaskRunner};

type JobFactory = Box<dyn Fn() -> Box<dyn ErasedJob> + Send + Sync>;

struct JobEntry {
    type_id: TypeId,
    variant: JobVariant,
    factory: JobFactory,
}

/// Registered jobs, keyed by [`Job::NAME`]
#[derive(Default)]
pub struct JobRegistry {
    entries: BTreeMap<&'static str, JobEntry>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `J` under `J::NAME`. Registering a name twice replaces the
    /// earlier entry.
    pub fn register<J, F>(&mut self, factory: F) -> &mut Self
    where
        J: Job,
        F: Fn() -> J + Send + Sync + 'static,
    {
        let variant = TaskRunner::new(factory()).variant();
        let entry = JobEntry {
            type_id: TypeId::of::<J>(),
            variant,
            factory: Box::new(move || -> Box<dyn ErasedJob> {
                Box::new(TaskRunner::new(factory()))
            }),
        };

        if self.entries.insert(J::NAME, entry).is_some() {
            warn!(job = J::NAME, "Job registered twice, keeping the latest entry");
        }
        self
    }

    /// Builder form of [`JobRegistry::register`]
    pub fn with<J, F>(mut self, factory: F) -> Self
    where
        J: Job,
        F: Fn() -> J + Send + Sync + 'static,
    {
        self.register::<J, F>(factory);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn variant_of(&self, name: &str) -> Option<JobVariant> {
        self.entries.get(name).map(|entry| entry.variant)
    }

    /// Registered names with their variants, sorted by name
    pub fn jobs(&self) -> impl Iterator<Item = (&'static str, JobVariant)> + '_ {
        self.entries.iter().map(|(name, entry)| (*name, entry.variant))
    }

    /// Check that `J` is registered under its own name
    pub fn resolve<J: Job>(&self) -> ExecutionResult<()> {
        let entry = self
            .entries
            .get(J::NAME)
            .ok_or_else(|| ExecutionError::EntryPointNotFound(J::NAME.to_string()))?;

        if entry.type_id != TypeId::of::<J>() {
            return Err(ExecutionError::EntryPointTypeMismatch {
                name: J::NAME.to_string(),
            });
        }
        Ok(())
    }

    /// Create a fresh runner for the job registered under `name`
    pub fn instantiate(&self, name: &str) -> Option<Box<dyn ErasedJob>> {
        self.entries.get(name).map(|entry| (entry.factory)())
    }
}

impl fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.jobs()).finish()
    }
}
