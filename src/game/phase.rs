//! Game phases and the fixed transition table

use std::fmt;

/// First round in which the village may vote
pub const FIRST_VOTING_ROUND: u32 = 2;

/// The phase the game is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    DayDiscussion,
    Vote,
    Night,
    VillageWins,
    WolvesWin,
    ConnectionLost,
}

impl Phase {
    /// Terminal phases accept no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Phase::VillageWins | Phase::WolvesWin | Phase::ConnectionLost
        )
    }

    /// Check a transition against the table
    ///
    /// ```text
    /// DayDiscussion -> Vote            (round >= 2)
    /// DayDiscussion -> Night           (round 1 only)
    /// Vote          -> Night
    /// Night         -> DayDiscussion
    /// Vote | Night  -> VillageWins | WolvesWin   (after an elimination)
    /// any live      -> ConnectionLost
    /// ```
    pub fn can_transition(self, to: Phase, round: u32) -> bool {
        match (self, to) {
            (from, _) if from.is_terminal() => false,
            (_, Phase::ConnectionLost) => true,
            (Phase::DayDiscussion, Phase::Vote) => round >= FIRST_VOTING_ROUND,
            (Phase::DayDiscussion, Phase::Night) => round < FIRST_VOTING_ROUND,
            (Phase::Vote, Phase::Night) => true,
            (Phase::Night, Phase::DayDiscussion) => true,
            (Phase::Vote | Phase::Night, Phase::VillageWins | Phase::WolvesWin) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::DayDiscussion => "day discussion",
            Phase::Vote => "vote",
            Phase::Night => "night",
            Phase::VillageWins => "village wins",
            Phase::WolvesWin => "wolves win",
            Phase::ConnectionLost => "connection lost",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side won
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Village,
    Wolves,
}

impl Winner {
    /// Decide the game from alive counts alone
    pub fn from_counts(alive_wolves: usize, alive_others: usize) -> Option<Winner> {
        if alive_wolves == 0 {
            Some(Winner::Village)
        } else if alive_wolves >= alive_others {
            Some(Winner::Wolves)
        } else {
            None
        }
    }

    pub fn phase(self) -> Phase {
        match self {
            Winner::Village => Phase::VillageWins,
            Winner::Wolves => Phase::WolvesWin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Phase::DayDiscussion, Phase::Vote, 1, false)]
    #[case(Phase::DayDiscussion, Phase::Vote, 2, true)]
    #[case(Phase::DayDiscussion, Phase::Night, 1, true)]
    #[case(Phase::DayDiscussion, Phase::Night, 3, false)]
    #[case(Phase::Vote, Phase::Night, 2, true)]
    #[case(Phase::Vote, Phase::DayDiscussion, 2, false)]
    #[case(Phase::Night, Phase::DayDiscussion, 1, true)]
    #[case(Phase::Night, Phase::Vote, 2, false)]
    #[case(Phase::Night, Phase::WolvesWin, 1, true)]
    #[case(Phase::DayDiscussion, Phase::VillageWins, 2, false)]
    #[case(Phase::DayDiscussion, Phase::ConnectionLost, 1, true)]
    #[case(Phase::VillageWins, Phase::DayDiscussion, 4, false)]
    #[case(Phase::ConnectionLost, Phase::ConnectionLost, 4, false)]
    fn test_transition_table(
        #[case] from: Phase,
        #[case] to: Phase,
        #[case] round: u32,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition(to, round), allowed);
    }

    #[rstest]
    #[case(0, 5, Some(Winner::Village))]
    #[case(0, 0, Some(Winner::Village))]
    #[case(1, 1, Some(Winner::Wolves))]
    #[case(2, 1, Some(Winner::Wolves))]
    #[case(1, 2, None)]
    #[case(1, 5, None)]
    fn test_winner_from_counts(
        #[case] wolves: usize,
        #[case] others: usize,
        #[case] expected: Option<Winner>,
    ) {
        assert_eq!(Winner::from_counts(wolves, others), expected);
    }

    #[test]
    fn test_terminal_phases() {
        assert!(Phase::VillageWins.is_terminal());
        assert!(Phase::WolvesWin.is_terminal());
        assert!(Phase::ConnectionLost.is_terminal());
        assert!(!Phase::Night.is_terminal());
    }
}
