use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use rendezvous_application::BusinessContextRepository;
use rendezvous_core::{AppError, AppResult};
use rendezvous_domain::{BusinessContext, BusinessContextId, ContextType};

/// In-memory business-context store enforcing the same unique keys as the schema.
#[derive(Debug, Default)]
pub struct InMemoryBusinessContextRepository {
    contexts: RwLock<HashMap<BusinessContextId, BusinessContext>>,
}

impl InMemoryBusinessContextRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn collides(existing: &BusinessContext, candidate: &BusinessContext) -> bool {
    if existing.id() == candidate.id() || existing.business_id() != candidate.business_id() {
        return false;
    }

    let same_name = existing.context_type() == candidate.context_type()
        && existing.name() == candidate.name();
    let same_code = candidate.code().is_some() && existing.code() == candidate.code();

    same_name || same_code
}

fn ensure_unique<'a>(
    mut contexts: impl Iterator<Item = &'a BusinessContext>,
    candidate: &BusinessContext,
) -> AppResult<()> {
    if contexts.any(|existing| collides(existing, candidate)) {
        return Err(AppError::Validation(format!(
            "business context '{}' collides with an existing name or code",
            candidate.name()
        )));
    }

    Ok(())
}

#[async_trait]
impl BusinessContextRepository for InMemoryBusinessContextRepository {
    async fn insert_context(&self, context: BusinessContext) -> AppResult<()> {
        let mut contexts = self.contexts.write().await;

        if contexts.contains_key(&context.id()) {
            return Err(AppError::Conflict(format!(
                "business context '{}' already exists",
                context.id()
            )));
        }
        ensure_unique(contexts.values(), &context)?;

        contexts.insert(context.id(), context);
        Ok(())
    }

    async fn update_context(&self, context: BusinessContext) -> AppResult<()> {
        let mut contexts = self.contexts.write().await;

        if !contexts.contains_key(&context.id()) {
            return Err(AppError::NotFound(format!(
                "business context '{}'",
                context.id()
            )));
        }
        ensure_unique(contexts.values(), &context)?;

        contexts.insert(context.id(), context);
        Ok(())
    }

    async fn find_context(
        &self,
        context_id: BusinessContextId,
    ) -> AppResult<Option<BusinessContext>> {
        Ok(self.contexts.read().await.get(&context_id).cloned())
    }

    async fn find_contexts(
        &self,
        context_ids: &[BusinessContextId],
    ) -> AppResult<Vec<BusinessContext>> {
        let contexts = self.contexts.read().await;
        let mut found: Vec<BusinessContext> = context_ids
            .iter()
            .filter_map(|context_id| contexts.get(context_id).cloned())
            .collect();
        found.sort_by_key(BusinessContext::level);

        Ok(found)
    }

    async fn list_contexts_for_business(
        &self,
        business_id: BusinessContextId,
    ) -> AppResult<Vec<BusinessContext>> {
        let contexts = self.contexts.read().await;
        let mut values: Vec<BusinessContext> = contexts
            .values()
            .filter(|context| context.business_id() == business_id)
            .cloned()
            .collect();

        values.sort_by(|left, right| {
            left.level()
                .cmp(&right.level())
                .then_with(|| left.display_order().cmp(&right.display_order()))
                .then_with(|| left.name().cmp(right.name()))
        });

        Ok(values)
    }

    async fn name_exists(
        &self,
        business_id: BusinessContextId,
        context_type: ContextType,
        name: &str,
        excluding: Option<BusinessContextId>,
    ) -> AppResult<bool> {
        Ok(self.contexts.read().await.values().any(|context| {
            context.business_id() == business_id
                && context.context_type() == context_type
                && context.name() == name
                && Some(context.id()) != excluding
        }))
    }

    async fn code_exists(&self, business_id: BusinessContextId, code: &str) -> AppResult<bool> {
        Ok(self
            .contexts
            .read()
            .await
            .values()
            .any(|context| context.business_id() == business_id && context.code() == Some(code)))
    }
}
