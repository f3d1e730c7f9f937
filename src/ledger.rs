//! Score ledger: running win/loss/draw tallies across rematches.
//!
//! Scores are partitioned by session key, so repeated games between the
//! same two participants in the same mode accumulate into one matchup
//! entry. A global per-player tally aggregates across all matchups.
//!
//! The ledger trusts its callers to invoke `record_outcome` at most once
//! per finished game; the session's settlement flag enforces that.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::types::{GameMode, PlayerScore};

/// The ledger partition key for a matchup: same two names, same mode.
pub fn session_key(player1: &str, player2: &str, mode: GameMode) -> String {
    format!("{}:{}|{}", mode, player1, player2)
}

/// Role-resolved view of a finished game, used for settlement.
///
/// The winner is resolved to a role before it reaches the ledger, so
/// matchups where both sides share a display name still count correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettledOutcome {
    Player1Wins,
    Player2Wins,
    Draw,
    /// Engine failure; not a chess result, settles nothing.
    AiError,
}

/// Running scores for one matchup. Tallies are role-indexed (player1 /
/// player2) so matchups where both sides share a display name still count
/// separately.
#[derive(Debug, Clone)]
pub struct MatchupScores {
    pub player1: String,
    pub player2: String,
    pub player1_score: PlayerScore,
    pub player2_score: PlayerScore,
}

impl MatchupScores {
    fn new(player1: &str, player2: &str) -> Self {
        Self {
            player1: player1.to_string(),
            player2: player2.to_string(),
            player1_score: PlayerScore::default(),
            player2_score: PlayerScore::default(),
        }
    }

    /// Headline score, "<player1 wins> - <player2 wins>".
    pub fn summary(&self) -> String {
        format!("{} - {}", self.player1_score.wins, self.player2_score.wins)
    }

    /// The name-keyed tally map shown to clients.
    pub fn by_name(&self) -> HashMap<String, PlayerScore> {
        let mut map = HashMap::new();
        map.insert(self.player1.clone(), self.player1_score.clone());
        map.insert(self.player2.clone(), self.player2_score.clone());
        map
    }
}

/// Process-wide score store. Shared across all sessions; safe for
/// concurrent reads and updates.
#[derive(Default)]
pub struct ScoreLedger {
    matchups: RwLock<HashMap<String, MatchupScores>>,
    totals: RwLock<HashMap<String, PlayerScore>>,
}

impl ScoreLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one finished game.
    ///
    /// Decisive outcomes bump the winner's wins and the loser's losses;
    /// draws bump both draw counters. The "AI error" sentinel is not a
    /// chess result and settles nothing.
    pub fn record_outcome(
        &self,
        key: &str,
        player1: &str,
        player2: &str,
        outcome: SettledOutcome,
    ) {
        if outcome == SettledOutcome::AiError {
            log::warn!("Not recording engine failure for {}", key);
            return;
        }

        let mut matchups = self.matchups.write().unwrap();
        let entry = matchups
            .entry(key.to_string())
            .or_insert_with(|| MatchupScores::new(player1, player2));

        match outcome {
            SettledOutcome::Player1Wins => {
                entry.player1_score.wins += 1;
                entry.player2_score.losses += 1;
                self.bump_total(player1, |t| t.wins += 1);
                self.bump_total(player2, |t| t.losses += 1);
            }
            SettledOutcome::Player2Wins => {
                entry.player2_score.wins += 1;
                entry.player1_score.losses += 1;
                self.bump_total(player2, |t| t.wins += 1);
                self.bump_total(player1, |t| t.losses += 1);
            }
            SettledOutcome::Draw => {
                entry.player1_score.draws += 1;
                entry.player2_score.draws += 1;
                self.bump_total(player1, |t| t.draws += 1);
                if player1 != player2 {
                    self.bump_total(player2, |t| t.draws += 1);
                }
            }
            SettledOutcome::AiError => unreachable!(),
        }
    }

    fn bump_total(&self, name: &str, f: impl FnOnce(&mut PlayerScore)) {
        let mut totals = self.totals.write().unwrap();
        f(totals.entry(name.to_string()).or_default());
    }

    /// Returns the matchup scores for a key, if any game under that key
    /// has settled.
    pub fn get(&self, key: &str) -> Option<MatchupScores> {
        self.matchups.read().unwrap().get(key).cloned()
    }

    /// Global per-player tallies across all matchups.
    pub fn player_totals(&self) -> HashMap<String, PlayerScore> {
        self.totals.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_is_role_ordered() {
        assert_eq!(session_key("Alice", "Bob", GameMode::Pvp), "pvp:Alice|Bob");
        assert_ne!(
            session_key("Alice", "Bob", GameMode::Pvp),
            session_key("Bob", "Alice", GameMode::Pvp)
        );
        assert_ne!(
            session_key("Alice", "Bob", GameMode::Pvp),
            session_key("Alice", "Bob", GameMode::Pvai)
        );
    }

    #[test]
    fn test_decisive_outcome_bumps_winner_and_loser() {
        let ledger = ScoreLedger::new();
        let key = session_key("Alice", "Bob", GameMode::Pvp);

        ledger.record_outcome(&key, "Alice", "Bob", SettledOutcome::Player2Wins);

        let scores = ledger.get(&key).unwrap();
        assert_eq!(scores.player1_score.wins, 0);
        assert_eq!(scores.player1_score.losses, 1);
        assert_eq!(scores.player2_score.wins, 1);
        assert_eq!(scores.player2_score.losses, 0);
        assert_eq!(scores.summary(), "0 - 1");

        let totals = ledger.player_totals();
        assert_eq!(totals["Bob"].wins, 1);
        assert_eq!(totals["Alice"].losses, 1);
    }

    #[test]
    fn test_draw_bumps_both() {
        let ledger = ScoreLedger::new();
        let key = session_key("Alice", "Bob", GameMode::Pvp);

        ledger.record_outcome(&key, "Alice", "Bob", SettledOutcome::Draw);

        let scores = ledger.get(&key).unwrap();
        assert_eq!(scores.player1_score.draws, 1);
        assert_eq!(scores.player2_score.draws, 1);
        assert_eq!(scores.summary(), "0 - 0");
    }

    #[test]
    fn test_rematches_accumulate() {
        let ledger = ScoreLedger::new();
        let key = session_key("Alice", "Bob", GameMode::Pvp);

        ledger.record_outcome(&key, "Alice", "Bob", SettledOutcome::Player1Wins);
        ledger.record_outcome(&key, "Alice", "Bob", SettledOutcome::Player1Wins);
        ledger.record_outcome(&key, "Alice", "Bob", SettledOutcome::Player2Wins);
        ledger.record_outcome(&key, "Alice", "Bob", SettledOutcome::Draw);

        let scores = ledger.get(&key).unwrap();
        assert_eq!(scores.player1_score.wins, 2);
        assert_eq!(scores.player1_score.losses, 1);
        assert_eq!(scores.player1_score.draws, 1);
        assert_eq!(scores.summary(), "2 - 1");
    }

    #[test]
    fn test_ai_error_settles_nothing() {
        let ledger = ScoreLedger::new();
        let key = session_key("AI", "AI", GameMode::Aivai);

        ledger.record_outcome(&key, "AI", "AI", SettledOutcome::AiError);

        assert!(ledger.get(&key).is_none());
        assert!(ledger.player_totals().is_empty());
    }

    #[test]
    fn test_unknown_key_is_none() {
        let ledger = ScoreLedger::new();
        assert!(ledger.get("pvp:Nobody|Nowhere").is_none());
    }

    #[test]
    fn test_same_name_matchup_keeps_roles_apart() {
        let ledger = ScoreLedger::new();
        let key = session_key("AI", "AI", GameMode::Aivai);

        ledger.record_outcome(&key, "AI", "AI", SettledOutcome::Draw);

        let scores = ledger.get(&key).unwrap();
        assert_eq!(scores.player1_score.draws, 1);
        assert_eq!(scores.player2_score.draws, 1);
        // The global tally counts the shared name once per game.
        assert_eq!(ledger.player_totals()["AI"].draws, 1);
    }
}
