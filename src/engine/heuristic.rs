//! The per-persona vote decision.

use rand::Rng;

use crate::persona::VoteRuleBook;
use crate::types::{Persona, PersonaId};

/// Decide how `voter` votes on content written by `author_id`.
///
/// Returns 0 for a self-vote, otherwise +1 or -1 as the voter's rule (or the
/// book's fallback) leans for this content and community. Matching is
/// case-insensitive. `community` is empty for replies.
pub fn decide_vote<R: Rng + ?Sized>(
    rules: &VoteRuleBook,
    voter: &Persona,
    author_id: &PersonaId,
    content: &str,
    community: &str,
    rng: &mut R,
) -> i32 {
    if &voter.id == author_id {
        return 0;
    }
    rules.lean(&voter.handle, content, community).cast(rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::seed_personas;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn persona(handle: &str) -> Persona {
        let seed = seed_personas()
            .into_iter()
            .find(|s| s.handle == handle)
            .unwrap_or_else(|| crate::persona::PersonaSeed {
                name: "Nobody".into(),
                handle: handle.into(),
                bio: String::new(),
                personality: String::new(),
                system_prompt: String::new(),
            });
        Persona {
            id: PersonaId::generate(),
            name: seed.name,
            handle: seed.handle,
            bio: seed.bio,
            personality: seed.personality,
            system_prompt: seed.system_prompt,
            karma: 0,
            avatar_url: None,
        }
    }

    fn up_rate(handle: &str, content: &str, community: &str, seed: u64) -> f64 {
        let rules = VoteRuleBook::default();
        let voter = persona(handle);
        let author = PersonaId::generate();
        let mut rng = StdRng::seed_from_u64(seed);
        let n = 10_000;
        let ups = (0..n)
            .filter(|_| decide_vote(&rules, &voter, &author, content, community, &mut rng) == 1)
            .count();
        ups as f64 / n as f64
    }

    #[test]
    fn test_self_vote_abstains() {
        let rules = VoteRuleBook::default();
        let voter = persona("@TheRaven");
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            assert_eq!(
                decide_vote(&rules, &voter, &voter.id, "beauty", "general", &mut rng),
                0
            );
        }
    }

    #[test]
    fn test_nurturer_always_upvotes_neutral_content() {
        let rules = VoteRuleBook::default();
        let voter = persona("@TheNurturer");
        let author = PersonaId::generate();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1_000 {
            assert_eq!(
                decide_vote(&rules, &voter, &author, "A calm walk by the river.", "", &mut rng),
                1
            );
        }
    }

    #[test]
    fn test_nurturer_sometimes_downvotes_hostile_content() {
        let rate = up_rate("@TheNurturer", "I HATE this and it is the WORST", "general", 4);
        assert!((rate - 0.7).abs() < 0.02, "{rate}");
    }

    #[test]
    fn test_cynic_distrusts_optimism() {
        // match: 0.6 down outright, else up 0.7 → 0.28 up
        let rate = up_rate("@TheCynic", "A bright future of progress", "general", 5);
        assert!((rate - 0.28).abs() < 0.02, "{rate}");
        // miss: 0.6 up outright, else up 0.7 → 0.88 up
        let rate = up_rate("@TheCynic", "Taxes are due on Monday", "general", 6);
        assert!((rate - 0.88).abs() < 0.02, "{rate}");
    }

    #[test]
    fn test_tech_optimist_matches_community() {
        let rate = up_rate("@TechOptimist", "Nothing in particular", "techoptimism", 7);
        assert!((rate - 0.8).abs() < 0.02, "{rate}");
        let rate = up_rate("@TechOptimist", "Nothing in particular", "general", 8);
        assert!((rate - 0.6).abs() < 0.02, "{rate}");
    }

    #[test]
    fn test_raven_and_logician_keywords() {
        let rate = up_rate("@TheRaven", "The SOUL of the night", "", 9);
        assert!((rate - 0.8).abs() < 0.02, "{rate}");
        let rate = up_rate("@TheLogician", "Weather report", "", 10);
        assert!((rate - 0.4).abs() < 0.02, "{rate}");
    }

    #[test]
    fn test_unknown_handle_uses_fallback() {
        let rate = up_rate("@Stranger", "anything", "general", 11);
        assert!((rate - 0.55).abs() < 0.02, "{rate}");
    }
}
