//! In-memory registry of cutting projects.
//!
//! Mutations of one project are serialized by that project's mutex, held for
//! the whole mutate, re-optimize and commit cycle. Readers only see the last
//! published `Arc<LayoutResult>`, never a half-applied mutation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::{LayoutError, Result};
use crate::layout::LayoutConfig;
use crate::project::CuttingProject;
use crate::types::{LayoutResult, Roll};

pub type ProjectId = u64;

#[derive(Debug)]
pub struct ProjectHandle {
    project: Mutex<CuttingProject>,
    snapshot: RwLock<Arc<LayoutResult>>,
}

impl ProjectHandle {
    fn new(project: CuttingProject) -> Self {
        let snapshot = Arc::new(project.layout().clone());
        Self {
            project: Mutex::new(project),
            snapshot: RwLock::new(snapshot),
        }
    }

    /// The last fully computed layout.
    pub fn snapshot(&self) -> Arc<LayoutResult> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs one mutation under the project lock and publishes the new layout
    /// if it succeeds.
    ///
    /// The closure works on a copy, so a closure that chains several project
    /// calls commits all of them or none.
    pub fn mutate<T>(
        &self,
        mutate: impl FnOnce(&mut CuttingProject) -> Result<T>,
    ) -> Result<(T, Arc<LayoutResult>)> {
        // A panic mid-mutation only ever poisons an uncommitted working copy.
        let mut project = self.project.lock().unwrap_or_else(PoisonError::into_inner);
        let mut working = project.clone();
        let out = mutate(&mut working)?;
        *project = working;
        let layout = Arc::new(project.layout().clone());
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = layout.clone();
        Ok((out, layout))
    }

    /// Read access to specs and instances; waits for any running mutation.
    pub fn inspect<T>(&self, read: impl FnOnce(&CuttingProject) -> T) -> T {
        let project = self.project.lock().unwrap_or_else(PoisonError::into_inner);
        read(&project)
    }
}

#[derive(Debug)]
pub struct ProjectStore {
    config: LayoutConfig,
    next_id: AtomicU64,
    projects: RwLock<HashMap<ProjectId, Arc<ProjectHandle>>>,
}

impl ProjectStore {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
            projects: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> LayoutConfig {
        self.config
    }

    pub fn create(&self, roll: Roll, allow_rotation: bool) -> Result<ProjectId> {
        let project = CuttingProject::new(roll, allow_rotation, self.config)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.projects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(ProjectHandle::new(project)));
        tracing::info!(project = id, roll = %roll, allow_rotation, "project created");
        Ok(id)
    }

    pub fn get(&self, id: ProjectId) -> Result<Arc<ProjectHandle>> {
        self.projects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(LayoutError::UnknownProject(id))
    }

    pub fn layout(&self, id: ProjectId) -> Result<Arc<LayoutResult>> {
        Ok(self.get(id)?.snapshot())
    }

    pub fn mutate<T>(
        &self,
        id: ProjectId,
        mutate: impl FnOnce(&mut CuttingProject) -> Result<T>,
    ) -> Result<(T, Arc<LayoutResult>)> {
        // The map lock is released before the project lock is taken.
        let handle = self.get(id)?;
        handle.mutate(mutate)
    }

    pub fn remove_project(&self, id: ProjectId) -> Result<()> {
        let removed = self
            .projects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        match removed {
            Some(_) => {
                tracing::info!(project = id, "project removed");
                Ok(())
            }
            None => Err(LayoutError::UnknownProject(id)),
        }
    }

    pub fn len(&self) -> usize {
        self.projects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProjectStore {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}
