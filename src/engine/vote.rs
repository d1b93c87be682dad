use super::{decide_vote, truncate_chars, CycleOutcome, InteractionEngine};
use crate::error::EngineError;
use crate::types::{ContentKind, Persona, VoteTarget};

/// What the voter looks at.
struct Candidate {
    target: VoteTarget,
    author: Persona,
    content: String,
    /// Community name; empty for replies.
    community: String,
}

fn direction(delta: i32) -> &'static str {
    match delta.signum() {
        1 => "UPVOTED",
        -1 => "DOWNVOTED",
        _ => "ABSTAINED",
    }
}

impl InteractionEngine {
    /// A random persona votes on a recent post (or, less often, reply).
    pub async fn run_vote_cycle(&self) -> Result<CycleOutcome, EngineError> {
        let personas = self.store.list_personas().await?;
        let voter = self
            .pick(&personas)
            .ok_or(EngineError::EmptyRegistry)?;

        let candidate = if self.draw() < self.config.post_vote_probability {
            self.post_candidate().await?
        } else {
            self.reply_candidate().await?
        };

        let delta = self.with_rng(|rng| {
            decide_vote(
                &self.rules,
                voter,
                &candidate.author.id,
                &candidate.content,
                &candidate.community,
                rng,
            )
        });

        if delta != 0 {
            let total = self
                .store
                .increment_votes(candidate.target.kind, &candidate.target.id, delta)
                .await?;
            log::debug!("{} {} now at {} votes", candidate.target.kind, candidate.target.id, total);
        }

        log::info!(
            "{} {} a {} by {} in {}: {}",
            voter.handle,
            direction(delta),
            candidate.target.kind,
            candidate.author.handle,
            if candidate.community.is_empty() { "-" } else { candidate.community.as_str() },
            truncate_chars(&candidate.content, 60)
        );

        Ok(CycleOutcome::Voted {
            target: candidate.target,
            delta,
        })
    }

    async fn post_candidate(&self) -> Result<Candidate, EngineError> {
        let posts = self
            .store
            .list_recent_posts(self.config.recent_post_window, false, 0)
            .await?;
        let chosen = self
            .pick(&posts)
            .ok_or(EngineError::NoTargets(ContentKind::Post))?;
        Ok(Candidate {
            target: VoteTarget::post(&chosen.post.id),
            author: chosen.author.clone(),
            content: chosen.post.content.clone(),
            community: chosen.community.name.clone(),
        })
    }

    async fn reply_candidate(&self) -> Result<Candidate, EngineError> {
        let replies = self
            .store
            .list_recent_replies(self.config.recent_reply_window)
            .await?;
        let chosen = self
            .pick(&replies)
            .ok_or(EngineError::NoTargets(ContentKind::Comment))?;
        Ok(Candidate {
            target: VoteTarget::comment(&chosen.reply.id),
            author: chosen.author.clone(),
            content: chosen.reply.content.clone(),
            community: String::new(),
        })
    }
}
