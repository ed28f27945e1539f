use log::{debug, warn};

use project::{
    GenerationResult, Project, ProjectCache, ResultSource, SaveState, Workspace, MAX_RESULTS,
};

use crate::config::ApiConfig;
use crate::remote::{encode_image_data_url, RemoteStore, SyncError};

const DEFAULT_PROJECT_NAME: &str = "Untitled project";

/// Enters the workspace: resolves the target project against the
/// remote store when a credential is present, otherwise (or on any
/// remote fault) falls back to the local cache or a fresh default.
/// Never fails; always hands back an idle project.
pub async fn activate(config: &ApiConfig, cache: ProjectCache, target: Option<&str>) -> Workspace {
    let project = resolve(config, &cache, target).await;
    if let Err(err) = cache.upsert_project(&project) {
        warn!("could not cache activated project: {err}");
    }
    if let Err(err) = cache.set_last_active(&project.id) {
        warn!("could not record last-active project: {err}");
    }
    Workspace::new(project, cache)
}

async fn resolve(config: &ApiConfig, cache: &ProjectCache, target: Option<&str>) -> Project {
    if !config.has_credential() {
        return local_fallback(cache, target);
    }
    let store = match RemoteStore::new(config) {
        Ok(store) => store,
        Err(_) => return local_fallback(cache, target),
    };
    match fetch_remote(&store, target, config.result_source()).await {
        Ok(Some(mut project)) => {
            project.reset_session_state();
            project
        }
        Ok(None) => {
            debug!("no remote projects yet, using local workspace");
            local_fallback(cache, target)
        }
        Err(err) => {
            warn!("remote activation failed, using local cache: {err}");
            local_fallback(cache, target)
        }
    }
}

/// Builds a fresh project from the remote record, its generation
/// history (each image fetched individually), and its slide image.
/// `None` means the store holds no projects at all.
async fn fetch_remote(
    store: &RemoteStore,
    target: Option<&str>,
    source: ResultSource,
) -> Result<Option<Project>, SyncError> {
    let projects = store.list_projects().await?;
    if projects.is_empty() {
        return Ok(None);
    }
    let summary = target
        .and_then(|id| projects.iter().find(|p| p.id == id))
        .unwrap_or(&projects[0]);

    let detail = store.get_project(&summary.id).await?;
    let generations = store.list_generations(&detail.id).await?;

    // The store lists newest-first; keep the newest cap's worth and
    // flip back to arrival order.
    let mut results: Vec<GenerationResult> = Vec::new();
    for generation in generations.into_iter().take(MAX_RESULTS).rev() {
        match store.fetch_generation_image(&generation.id).await {
            Ok(bytes) => results.push(GenerationResult {
                id: generation.id,
                image: encode_image_data_url(&bytes),
                description: generation.description,
                created_at: generation.created_at,
                source,
            }),
            Err(err) => warn!("skipping generation {}: {err}", generation.id),
        }
    }

    let slide_image = store
        .fetch_slide_image(&detail.id)
        .await?
        .map(|bytes| encode_image_data_url(&bytes));

    Ok(Some(Project {
        id: detail.id,
        name: detail.name,
        created_at: detail.created_at,
        updated_at: detail.updated_at,
        save_state: SaveState::Ready,
        slide_image,
        slide_context: detail.last_slide_context,
        prompt: detail.last_prompt,
        results,
        selection: None,
        generation_status: project::GenerationStatus::Idle,
        generation_error: None,
        pending_slots: 0,
    }))
}

fn local_fallback(cache: &ProjectCache, target: Option<&str>) -> Project {
    let candidate = target
        .map(str::to_string)
        .or_else(|| cache.last_active().ok().flatten());
    if let Some(id) = candidate {
        if let Ok(Some(mut project)) = cache.load_project(&id) {
            project.reset_session_state();
            return project;
        }
    }
    if let Ok(listed) = cache.list_projects() {
        if let Some(info) = listed.first() {
            if let Ok(Some(mut project)) = cache.load_project(&info.id) {
                project.reset_session_state();
                return project;
            }
        }
    }
    Project::new(DEFAULT_PROJECT_NAME)
}

/// Renames locally first, then forwards to the remote store. A remote
/// failure surfaces to the caller; the local name is retained either
/// way.
pub async fn rename(
    config: &ApiConfig,
    workspace: &mut Workspace,
    name: &str,
) -> Result<(), SyncError> {
    workspace.rename(name);
    let store = RemoteStore::new(config)?;

    let (id, prompt, context) = {
        let project = workspace.project();
        (
            project.id.clone(),
            project.prompt.clone().unwrap_or_default(),
            project.slide_context.clone().unwrap_or_default(),
        )
    };
    workspace.set_save_state(SaveState::Saving);
    let result = store.rename_project(&id, name, &prompt, &context).await;
    workspace.set_save_state(SaveState::Ready);
    result
}

/// Applies the slide image locally and forwards it to the remote
/// store; a failed remote sync is silently dropped.
pub async fn sync_slide_image(
    config: &ApiConfig,
    workspace: &mut Workspace,
    image: Option<Vec<u8>>,
) {
    workspace.set_slide_image(image.as_deref().map(encode_image_data_url));

    let store = match RemoteStore::new(config) {
        Ok(store) => store,
        Err(_) => return,
    };
    let id = workspace.project().id.clone();
    workspace.set_save_state(SaveState::Saving);
    let result = match &image {
        Some(bytes) => store.upload_slide_image(&id, bytes).await,
        None => store.delete_slide_image(&id).await,
    };
    if let Err(err) = result {
        debug!("slide image sync for {id} skipped: {err}");
    }
    workspace.set_save_state(SaveState::Ready);
}

/// Explicit delete clears both the local cache row and the remote
/// record.
pub async fn delete(config: &ApiConfig, workspace: Workspace) -> anyhow::Result<()> {
    let project = workspace.delete_local()?;
    match RemoteStore::new(config) {
        Ok(store) => {
            store.delete_project(&project.id).await?;
            Ok(())
        }
        // Nothing durable to clear without a credential.
        Err(SyncError::Auth) => Ok(()),
        Err(err) => Err(err.into()),
    }
}
