//! Reply synthesis and conflict pulses.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{truncate_chars, CycleOutcome, InteractionEngine};
use crate::error::EngineError;
use crate::llm::{OutputContract, ReplyDraft};
use crate::types::{Persona, RecentPost};

/// The stance a reply takes toward the post it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictPulse {
    Agree,
    Disagree,
    Pivot,
}

impl ConflictPulse {
    pub const ALL: [ConflictPulse; 3] = [Self::Agree, Self::Disagree, Self::Pivot];

    /// Uniform draw over the three pulses.
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        *Self::ALL.choose(rng).unwrap_or(&Self::Agree)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agree => "Agree",
            Self::Disagree => "Disagree",
            Self::Pivot => "Pivot",
        }
    }

    /// Task instruction for this stance. `author_handle` is the post author.
    pub fn instruction(&self, author_handle: &str) -> String {
        match self {
            Self::Agree => "AGREE with this post and build on its ideas. \
                 Add a new example, angle or argument that strengthens it, in your own voice."
                .to_string(),
            Self::Disagree => format!(
                "DISAGREE with {author_handle}. Write a rebuttal that goes after \
                 their specific claims, the way your personality would. \
                 Be pointed, but stay on the topic of the post."
            ),
            Self::Pivot => "PIVOT. Take the discussion somewhere orthogonal: \
                 reframe the topic from an angle that neither affirms nor rejects the post."
                .to_string(),
        }
    }

    fn log_label(&self) -> &'static str {
        match self {
            Self::Agree => "alliance",
            Self::Disagree => "conflict",
            Self::Pivot => "pivot",
        }
    }
}

impl fmt::Display for ConflictPulse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The thread excerpt shown to the responder: the post, then up to `limit`
/// of the replies carried on `target` in the order given (newest first).
pub fn context_block(target: &RecentPost, limit: usize) -> String {
    let mut block = format!(
        "Original post by {}:\nTitle: {}\n{}",
        target.author.handle, target.post.title, target.post.content
    );
    let replies: Vec<_> = target.recent_replies.iter().take(limit).collect();
    if !replies.is_empty() {
        block.push_str("\n\nRecent replies:");
        for (n, view) in replies.iter().enumerate() {
            block.push_str(&format!(
                "\n{}. {}: {}",
                n + 1,
                view.author.handle,
                view.reply.content
            ));
        }
    }
    block
}

fn reply_prompt(target: &RecentPost, pulse: ConflictPulse, context_limit: usize) -> String {
    format!(
        "You are replying to a thread in {community}.\n\n\
         {context}\n\n\
         {instruction}\n\n\
         Respond with a single JSON object in exactly this format:\n{example}\n\n\
         Output only the JSON object.",
        community = target.community.display_name(),
        context = context_block(target, context_limit),
        instruction = pulse.instruction(&target.author.handle),
        example = ReplyDraft::example_json(),
    )
}

impl InteractionEngine {
    /// A persona answers one of the recent posts with a random pulse.
    ///
    /// With no posts yet, this runs [`InteractionEngine::run_post_cycle`]
    /// instead and returns its outcome.
    pub async fn run_reply_cycle(&self) -> Result<CycleOutcome, EngineError> {
        let personas = self.store.list_personas().await?;
        if personas.is_empty() {
            return Err(EngineError::EmptyRegistry);
        }

        let posts = self
            .store
            .list_recent_posts(
                self.config.recent_post_window,
                true,
                self.config.reply_context_limit,
            )
            .await?;
        let Some(target) = self.pick(&posts) else {
            log::info!("No posts to reply to yet, writing a new post instead");
            return self.run_post_cycle().await;
        };

        let others: Vec<&Persona> = personas
            .iter()
            .filter(|p| p.id != target.post.author_id)
            .collect();
        let responder = if others.is_empty() {
            self.pick(&personas)
        } else {
            self.pick(&others).copied()
        }
        .ok_or(EngineError::EmptyRegistry)?;

        let pulse = self.with_rng(|rng| ConflictPulse::draw(rng));
        let prompt = reply_prompt(target, pulse, self.config.reply_context_limit);
        let draft: ReplyDraft = self.generate(responder, &prompt).await?;

        let reply_id = self
            .store
            .create_reply(&target.post.id, &responder.id, None, &draft.content)
            .await?;

        log::info!(
            "{} replied to {} ({}) on \"{}\" in {} [{} in context]",
            responder.handle,
            target.author.handle,
            pulse,
            truncate_chars(&target.post.title, 50),
            target.community.display_name(),
            target
                .recent_replies
                .len()
                .min(self.config.reply_context_limit)
        );
        log::debug!(
            "{}: {} vs {}",
            pulse.log_label(),
            responder.handle,
            target.author.handle
        );

        Ok(CycleOutcome::Replied {
            reply_id,
            post_id: target.post.id.clone(),
            pulse,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::super::test_support::*;
    use super::*;
    use crate::llm::testing::ScriptedGenerator;
    use crate::store::{MemoryStore, Store};
    use crate::types::PostId;

    async fn store_with_post(author_handle: &str) -> (Arc<MemoryStore>, PostId) {
        let store = Arc::new(MemoryStore::with_catalog());
        let author = store.persona_by_handle(author_handle).unwrap();
        let community = store.list_communities().await.unwrap().remove(0);
        let post_id = store
            .create_post(&author.id, &community.id, "Night thoughts", "The moon is a wound.")
            .await
            .unwrap();
        (store, post_id)
    }

    #[test]
    fn test_pulses_are_uniform() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut counts = [0usize; 3];
        let n = 9_000;
        for _ in 0..n {
            let pulse = ConflictPulse::draw(&mut rng);
            let idx = ConflictPulse::ALL.iter().position(|p| *p == pulse).unwrap();
            counts[idx] += 1;
        }
        for count in counts {
            assert!((count as f64 / n as f64 - 1.0 / 3.0).abs() < 0.02);
        }
    }

    #[test]
    fn test_pulse_wire_names() {
        assert_eq!(serde_json::to_value(ConflictPulse::Agree).unwrap(), "Agree");
        assert_eq!(serde_json::to_value(ConflictPulse::Disagree).unwrap(), "Disagree");
        let pivot: ConflictPulse = serde_json::from_str("\"Pivot\"").unwrap();
        assert_eq!(pivot, ConflictPulse::Pivot);
        assert_eq!(pivot.to_string(), "Pivot");
    }

    #[test]
    fn test_disagree_names_the_author() {
        let text = ConflictPulse::Disagree.instruction("@TheRaven");
        assert!(text.contains("@TheRaven"));
        assert!(ConflictPulse::Pivot.instruction("@x").contains("neither affirms nor rejects"));
    }

    #[tokio::test]
    async fn test_reply_is_top_level_and_never_self_authored() {
        let (store, post_id) = store_with_post("@TheRaven").await;
        let generator = Arc::new(ScriptedGenerator::always(REPLY_JSON));
        let raven = store.persona_by_handle("@TheRaven").unwrap();

        for seed in 0..20 {
            let engine = engine(&store, &generator, seeded_config(seed));
            let outcome = engine.run_reply_cycle().await.unwrap();
            let CycleOutcome::Replied {
                reply_id,
                post_id: replied_to,
                ..
            } = outcome
            else {
                panic!("expected a reply");
            };
            assert_eq!(replied_to, post_id);
            let reply = store.reply(&reply_id).unwrap();
            assert_eq!(reply.parent_id, None);
            assert_ne!(reply.author_id, raven.id);
            assert_eq!(reply.content, "You mistake decay for depth.");
        }
    }

    #[tokio::test]
    async fn test_all_pulses_show_up_across_cycles() {
        let (store, _) = store_with_post("@TheCynic").await;
        let generator = Arc::new(ScriptedGenerator::always(REPLY_JSON));
        let engine = engine(&store, &generator, seeded_config(99));
        let mut seen = HashSet::new();
        for _ in 0..60 {
            if let CycleOutcome::Replied { pulse, .. } = engine.run_reply_cycle().await.unwrap() {
                seen.insert(pulse);
            }
        }
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn test_context_holds_three_newest_replies() {
        let (store, post_id) = store_with_post("@TheLogician").await;
        let cynic = store.persona_by_handle("@TheCynic").unwrap();
        for n in 1..=5 {
            store
                .create_reply(&post_id, &cynic.id, None, &format!("reply number {n}"))
                .await
                .unwrap();
        }

        let generator = Arc::new(ScriptedGenerator::always(REPLY_JSON));
        let engine = engine(&store, &generator, seeded_config(4));
        engine.run_reply_cycle().await.unwrap();

        let prompt = &generator.calls()[0].task_prompt;
        assert!(prompt.contains("Original post by @TheLogician"));
        assert!(prompt.contains("Recent replies:"));
        assert!(prompt.contains("1. @TheCynic: reply number 5"));
        assert!(prompt.contains("3. @TheCynic: reply number 3"));
        assert!(!prompt.contains("reply number 2"));
    }

    #[tokio::test]
    async fn test_no_posts_falls_back_to_post_cycle() {
        let store = Arc::new(MemoryStore::with_catalog());
        let generator = Arc::new(ScriptedGenerator::always(POST_JSON));
        let engine = engine(&store, &generator, seeded_config(12));

        let outcome = engine.run_reply_cycle().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Posted { .. }));
        assert_eq!(store.post_count(), 1);
        assert_eq!(store.reply_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_reply_persists_nothing() {
        let (store, _) = store_with_post("@TheRaven").await;
        let generator = Arc::new(ScriptedGenerator::always("{\"text\": \"wrong field\"}"));
        let engine = engine(&store, &generator, seeded_config(13));

        let err = engine.run_reply_cycle().await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedGeneration);
        assert_eq!(store.reply_count(), 0);
        assert_eq!(store.post_count(), 1);
    }

    #[tokio::test]
    async fn test_prose_reply_persists_nothing() {
        let (store, _) = store_with_post("@TheRaven").await;
        let generator = Arc::new(ScriptedGenerator::always(
            "Sure! Here is a reply: the moon is fine.",
        ));
        let engine = engine(&store, &generator, seeded_config(14));

        let err = engine.run_reply_cycle().await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedGeneration);
        assert_eq!(store.reply_count(), 0);
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_array_reply_persists_nothing() {
        let (store, _) = store_with_post("@TheRaven").await;
        let generator = Arc::new(ScriptedGenerator::always(r#"["not a record"]"#));
        let engine = engine(&store, &generator, seeded_config(15));

        let err = engine.run_reply_cycle().await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedGeneration);
        assert_eq!(store.reply_count(), 0);
    }
}
