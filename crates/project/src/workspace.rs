use chrono::Utc;
use log::warn;
use thiserror::Error;

use crate::cache::ProjectCache;
use crate::model::{
    GenerationResult, GenerationStatus, Project, SaveState, Selection, MAX_RESULTS,
};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("a generation session is already running for this project")]
    SessionActive,
}

/// Single mutation gateway for the live project record. Every edit
/// goes through here so reads are consistent snapshots; each one bumps
/// `updated_at` and snapshots to the local cache fire-and-forget.
pub struct Workspace {
    project: Project,
    cache: Option<ProjectCache>,
}

impl Workspace {
    pub fn new(project: Project, cache: ProjectCache) -> Self {
        Self {
            project,
            cache: Some(cache),
        }
    }

    /// Workspace without a backing cache, for tests and dry runs.
    pub fn detached(project: Project) -> Self {
        Self {
            project,
            cache: None,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn cache(&self) -> Option<&ProjectCache> {
        self.cache.as_ref()
    }

    pub fn into_project(self) -> Project {
        self.project
    }

    fn commit(&mut self) {
        self.project.updated_at = Utc::now();
        self.persist();
    }

    fn persist(&self) {
        let Some(cache) = &self.cache else {
            return;
        };
        if let Err(err) = cache.upsert_project(&self.project) {
            warn!("cache write failed for project {}: {err}", self.project.id);
        }
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.project.name = name.into();
        self.commit();
    }

    pub fn set_prompt(&mut self, prompt: Option<String>) {
        self.project.prompt = prompt;
        self.commit();
    }

    pub fn set_slide_context(&mut self, context: Option<String>) {
        self.project.slide_context = context;
        self.commit();
    }

    pub fn set_slide_image(&mut self, image: Option<String>) {
        self.project.slide_image = image;
        self.commit();
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.project.selection = selection;
        self.commit();
    }

    pub fn clear_selection(&mut self) {
        self.set_selection(None);
    }

    pub fn set_save_state(&mut self, state: SaveState) {
        self.project.save_state = state;
        self.persist();
    }

    /// Appends in arrival order and evicts the oldest past the cap.
    pub fn push_result(&mut self, result: GenerationResult) {
        self.project.results.push(result);
        if self.project.results.len() > MAX_RESULTS {
            let overflow = self.project.results.len() - MAX_RESULTS;
            self.project.results.drain(..overflow);
        }
        self.commit();
    }

    /// Consumes one pending slot, flooring at zero.
    pub fn take_pending_slot(&mut self) {
        self.project.pending_slots = self.project.pending_slots.saturating_sub(1);
        self.persist();
    }

    pub fn begin_generation(&mut self, variant_count: u32) -> Result<(), ProjectError> {
        if self.project.is_generating() {
            return Err(ProjectError::SessionActive);
        }
        self.project.generation_status = GenerationStatus::Generating;
        self.project.generation_error = None;
        self.project.pending_slots = variant_count;
        self.commit();
        Ok(())
    }

    pub fn complete_generation(&mut self) {
        self.project.generation_status = GenerationStatus::Idle;
        self.project.pending_slots = 0;
        self.commit();
    }

    pub fn fail_generation(&mut self, message: impl Into<String>) {
        self.project.generation_status = GenerationStatus::Error;
        self.project.generation_error = Some(message.into());
        self.project.pending_slots = 0;
        self.commit();
    }

    /// Explicit delete: clears the local cache row. Remote deletion is
    /// the synchronizer's job.
    pub fn delete_local(self) -> anyhow::Result<Project> {
        if let Some(cache) = &self.cache {
            cache.delete_project(&self.project.id)?;
        }
        Ok(self.project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResultSource;

    fn result(id: &str) -> GenerationResult {
        GenerationResult {
            id: id.to_string(),
            image: format!("images/{id}.png"),
            description: format!("variant {id}"),
            created_at: Utc::now(),
            source: ResultSource::Api,
        }
    }

    #[test]
    fn results_cap_at_twelve_keeping_newest_in_arrival_order() {
        let mut ws = Workspace::detached(Project::new("Deck"));
        for i in 0..15 {
            ws.push_result(result(&i.to_string()));
        }
        let ids: Vec<&str> = ws.project().results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), MAX_RESULTS);
        assert_eq!(ids.first(), Some(&"3"));
        assert_eq!(ids.last(), Some(&"14"));
    }

    #[test]
    fn pending_slots_floor_at_zero() {
        let mut ws = Workspace::detached(Project::new("Deck"));
        ws.begin_generation(1).unwrap();
        ws.take_pending_slot();
        ws.take_pending_slot();
        assert_eq!(ws.project().pending_slots, 0);
    }

    #[test]
    fn second_session_is_rejected_while_generating() {
        let mut ws = Workspace::detached(Project::new("Deck"));
        ws.begin_generation(2).unwrap();
        assert!(matches!(
            ws.begin_generation(2),
            Err(ProjectError::SessionActive)
        ));
    }

    #[test]
    fn begin_generation_clears_prior_error() {
        let mut ws = Workspace::detached(Project::new("Deck"));
        ws.fail_generation("timeout");
        assert_eq!(ws.project().generation_status, GenerationStatus::Error);
        ws.begin_generation(3).unwrap();
        assert_eq!(ws.project().generation_status, GenerationStatus::Generating);
        assert!(ws.project().generation_error.is_none());
        assert_eq!(ws.project().pending_slots, 3);
    }

    #[test]
    fn terminal_transitions_zero_pending_slots() {
        let mut ws = Workspace::detached(Project::new("Deck"));
        ws.begin_generation(4).unwrap();
        ws.fail_generation("connection lost");
        assert_eq!(ws.project().pending_slots, 0);
        assert_eq!(
            ws.project().generation_error.as_deref(),
            Some("connection lost")
        );

        ws.begin_generation(4).unwrap();
        ws.complete_generation();
        assert_eq!(ws.project().pending_slots, 0);
        assert_eq!(ws.project().generation_status, GenerationStatus::Idle);
    }

    #[test]
    fn edits_bump_updated_at() {
        let mut ws = Workspace::detached(Project::new("Deck"));
        let before = ws.project().updated_at;
        std::thread::sleep(std::time::Duration::from_millis(5));
        ws.rename("Renamed deck");
        assert!(ws.project().updated_at > before);
        assert_eq!(ws.project().name, "Renamed deck");
    }
}
