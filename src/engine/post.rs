use super::{truncate_chars, CycleOutcome, InteractionEngine};
use crate::error::EngineError;
use crate::llm::{OutputContract, PostDraft};
use crate::types::Community;

fn post_prompt(community: &Community, title_max_chars: usize) -> String {
    format!(
        "You are posting in {display}: {description}\n\n\
         Write an original forum post for this community, fully in your own voice. \
         Let your worldview decide what you write about and how you argue it. \
         Never break character.\n\n\
         Respond with a single JSON object in exactly this format:\n{example}\n\n\
         The title must be at most {title_max_chars} characters. \
         Output only the JSON object.",
        display = community.display_name(),
        description = community.description,
        example = PostDraft::example_json(),
    )
}

impl InteractionEngine {
    /// A random persona writes a new post in a random community.
    pub async fn run_post_cycle(&self) -> Result<CycleOutcome, EngineError> {
        let personas = self.store.list_personas().await?;
        let communities = self.store.list_communities().await?;

        let persona = self.pick(&personas).ok_or(EngineError::EmptyRegistry)?;
        let community = self.pick(&communities).ok_or(EngineError::EmptyRegistry)?;

        let prompt = post_prompt(community, self.config.title_max_chars);
        let draft: PostDraft = self.generate(persona, &prompt).await?;
        let title = truncate_chars(draft.title.trim(), self.config.title_max_chars);

        let post_id = self
            .store
            .create_post(&persona.id, &community.id, title, &draft.content)
            .await?;

        log::info!(
            "{} ({}) posted in {}: \"{}\" | {}",
            persona.handle,
            persona.personality,
            community.display_name(),
            truncate_chars(title, 50),
            truncate_chars(&draft.content, 100)
        );

        Ok(CycleOutcome::Posted { post_id })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::*;
    use crate::error::ErrorKind;
    use crate::llm::testing::ScriptedGenerator;
    use crate::store::{MemoryStore, Store};

    #[tokio::test]
    async fn test_post_cycle_persists_generated_post() {
        let store = Arc::new(MemoryStore::with_catalog());
        let generator = Arc::new(ScriptedGenerator::always(POST_JSON));
        let engine = engine(&store, &generator, seeded_config(7));

        let outcome = engine.run_post_cycle().await.unwrap();
        assert_eq!(outcome.kind(), "post");
        assert_eq!(store.post_count(), 1);

        let post = store
            .post(&crate::types::PostId::new(outcome.id()))
            .unwrap();
        assert_eq!(post.title, "On the weight of small things");
        assert_eq!(post.content, "Dust remembers.");
        assert_eq!(post.votes, 0);

        let personas = store.list_personas().await.unwrap();
        let author = personas.iter().find(|p| p.id == post.author_id).unwrap();
        let call = &generator.calls()[0];
        assert_eq!(call.persona_instruction, author.system_prompt);
        assert!(call.task_prompt.contains("\"title\""));
        assert!(call.task_prompt.contains("at most 300 characters"));
    }

    #[tokio::test]
    async fn test_prompt_names_the_chosen_community() {
        let store = Arc::new(MemoryStore::with_catalog());
        let generator = Arc::new(ScriptedGenerator::always(POST_JSON));
        let engine = engine(&store, &generator, seeded_config(8));

        let outcome = engine.run_post_cycle().await.unwrap();
        let post = store
            .post(&crate::types::PostId::new(outcome.id()))
            .unwrap();
        let community = store
            .list_communities()
            .await
            .unwrap()
            .into_iter()
            .find(|c| c.id == post.community_id)
            .unwrap();
        assert!(generator.calls()[0]
            .task_prompt
            .contains(&format!("m/{}", community.name)));
    }

    #[tokio::test]
    async fn test_long_title_is_truncated() {
        let long = "ж".repeat(400);
        let raw = format!(r#"{{"title": "{long}", "content": "body"}}"#);
        let store = Arc::new(MemoryStore::with_catalog());
        let generator = Arc::new(ScriptedGenerator::always(raw));
        let engine = engine(&store, &generator, seeded_config(9));

        let outcome = engine.run_post_cycle().await.unwrap();
        let post = store
            .post(&crate::types::PostId::new(outcome.id()))
            .unwrap();
        assert_eq!(post.title.chars().count(), 300);
    }

    #[tokio::test]
    async fn test_malformed_output_persists_nothing() {
        let store = Arc::new(MemoryStore::with_catalog());
        let generator = Arc::new(ScriptedGenerator::always("Here's my post: hello world"));
        let engine = engine(&store, &generator, seeded_config(10));

        let err = engine.run_post_cycle().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedGeneration);
        assert!(err.is_retryable());
        assert_eq!(store.post_count(), 0);
        assert_eq!(store.reply_count(), 0);
        // no internal retry
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_positional_array_output_persists_nothing() {
        let store = Arc::new(MemoryStore::with_catalog());
        let generator = Arc::new(ScriptedGenerator::always(r#"["t", "c"]"#));
        let engine = engine(&store, &generator, seeded_config(11));

        let err = engine.run_post_cycle().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedGeneration);
        assert_eq!(store.post_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_communities_is_empty_registry() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_persona(crate::persona::seed_personas().remove(0))
            .await
            .unwrap();
        let generator = Arc::new(ScriptedGenerator::always(POST_JSON));
        let engine = engine(&store, &generator, seeded_config(1));

        let err = engine.run_post_cycle().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyRegistry);
        assert_eq!(generator.call_count(), 0);
    }
}
