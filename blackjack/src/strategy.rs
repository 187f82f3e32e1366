use crate::{Action, State};

const HARD_LOWEST: u8 = 4;
const SOFT_LOWEST: u8 = 13;

/// Reference play for hard and soft totals. Pairs are played by their total.
///
/// Columns are the dealer up card: Ace first, then 2 to 10.
#[derive(Debug, Clone)]
pub struct BasicStrategy {
    hard_chart: [[Action; 10]; 18],
    soft_chart: [[Action; 10]; 9],
}

impl Default for BasicStrategy {
    fn default() -> Self {
        BasicStrategy::new()
    }
}

impl BasicStrategy {
    pub fn new() -> BasicStrategy {
        const H: Action = Action::Hit;
        const S: Action = Action::Stand;
        const D: Action = Action::Double;
        const R: Action = Action::Surrender;

        BasicStrategy {
            hard_chart: [
                [H, H, H, H, H, H, H, H, H, H], // 4
                [H, H, H, H, H, H, H, H, H, H],
                [H, H, H, H, H, H, H, H, H, H],
                [H, H, H, H, H, H, H, H, H, H],
                [H, H, H, H, H, H, H, H, H, H], // 8
                [H, H, D, D, D, D, H, H, H, H],
                [H, D, D, D, D, D, D, D, D, H],
                [D, D, D, D, D, D, D, D, D, D],
                [H, H, H, S, S, S, H, H, H, H], // 12
                [H, S, S, S, S, S, H, H, H, H],
                [H, S, S, S, S, S, H, H, H, H],
                [H, S, S, S, S, S, H, H, H, R],
                [R, S, S, S, S, S, H, H, R, R], // 16
                [S, S, S, S, S, S, S, S, S, S],
                [S, S, S, S, S, S, S, S, S, S],
                [S, S, S, S, S, S, S, S, S, S],
                [S, S, S, S, S, S, S, S, S, S],
                [S, S, S, S, S, S, S, S, S, S], // 21
            ],
            soft_chart: [
                [H, H, H, H, H, H, H, H, H, H], // Ace + 2
                [H, H, H, H, H, H, H, H, H, H],
                [H, H, H, H, H, H, H, H, H, H],
                [H, H, H, H, H, H, H, H, H, H],
                [H, H, H, H, H, H, H, H, H, H],
                [H, S, S, S, S, S, S, S, H, H], // soft 18
                [S, S, S, S, S, S, S, S, S, S],
                [S, S, S, S, S, S, S, S, S, S],
                [S, S, S, S, S, S, S, S, S, S], // Ace + 10
            ],
        }
    }

    /// Totals outside the charts hit below 17 and stand otherwise.
    pub fn action(&self, state: &State) -> Action {
        let row = if state.soft {
            state
                .player_total
                .checked_sub(SOFT_LOWEST)
                .and_then(|r| self.soft_chart.get(r as usize))
        } else {
            state
                .player_total
                .checked_sub(HARD_LOWEST)
                .and_then(|r| self.hard_chart.get(r as usize))
        };
        let cell = state
            .dealer_up_card
            .checked_sub(1)
            .and_then(|column| row?.get(column as usize));
        match cell {
            Some(action) => *action,
            None if state.player_total < 17 => Action::Hit,
            None => Action::Stand,
        }
    }

    /// HIT is accepted wherever DOUBLE is prescribed, since doubling is not always available.
    pub fn is_correct_action(&self, state: &State, action: Action) -> bool {
        let optimal = self.action(state);
        action == optimal || (optimal == Action::Double && action == Action::Hit)
    }
}

/// Hard 15 vs 10 and hard 16 vs 9, 10 or Ace.
pub fn is_surrender_state(state: &State) -> bool {
    if state.soft {
        return false;
    }
    let dealer = state.dealer_for_chart();
    (state.player_total == 15 && dealer == 10)
        || (state.player_total == 16 && (9..=11).contains(&dealer))
}

/// States where a wrong decision costs the most, or that come up most often.
pub fn is_critical_state(state: &State) -> bool {
    if state.soft {
        return state.player_total == 18;
    }
    let total = state.player_total;
    let dealer = state.dealer_for_chart();
    ((12..=16).contains(&total) && dealer >= 7)
        || ((10..=11).contains(&total) && dealer >= 9)
        || is_surrender_state(state)
}

/// Actions offered to the agent when its policy is compared against the charts:
/// HIT and STAND, DOUBLE on 9 to 11, SURRENDER on the surrender states.
pub fn comparison_actions(state: &State) -> Vec<Action> {
    let mut actions = vec![Action::Hit, Action::Stand];
    if (9..=11).contains(&state.player_total) {
        actions.push(Action::Double);
    }
    if is_surrender_state(state) {
        actions.push(Action::Surrender);
    }
    actions
}

/// Every total 4 to 21 against every dealer card, hard then soft.
pub fn exhaustive_states() -> impl Iterator<Item = State> {
    (4..=21u8).flat_map(|total| {
        (1..=10u8).flat_map(move |dealer| {
            [false, true]
                .into_iter()
                .map(move |soft| State::new(total, dealer, soft))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stands_on_hard_17_and_above() {
        let strategy = BasicStrategy::new();
        for total in 17..=21 {
            for dealer in 1..=10 {
                assert_eq!(strategy.action(&State::new(total, dealer, false)), Action::Stand);
            }
        }
    }

    #[test]
    fn doubles_11_and_accepts_hit() {
        let strategy = BasicStrategy::new();
        for dealer in 1..=10 {
            let state = State::new(11, dealer, false);
            assert_eq!(strategy.action(&state), Action::Double);
            assert!(strategy.is_correct_action(&state, Action::Hit));
            assert!(!strategy.is_correct_action(&state, Action::Stand));
        }
    }

    #[test]
    fn surrender_cells() {
        let strategy = BasicStrategy::new();
        assert_eq!(strategy.action(&State::new(16, 10, false)), Action::Surrender);
        assert_eq!(strategy.action(&State::new(16, 9, false)), Action::Surrender);
        assert_eq!(strategy.action(&State::new(16, 1, false)), Action::Surrender);
        assert_eq!(strategy.action(&State::new(15, 10, false)), Action::Surrender);
        assert_eq!(strategy.action(&State::new(15, 9, false)), Action::Hit);
        assert!(!strategy.is_correct_action(&State::new(16, 10, false), Action::Hit));
        assert!(comparison_actions(&State::new(16, 1, false)).contains(&Action::Surrender));
        assert!(!comparison_actions(&State::new(16, 1, true)).contains(&Action::Surrender));
    }

    #[test]
    fn middle_of_the_hard_chart() {
        let strategy = BasicStrategy::new();
        assert_eq!(strategy.action(&State::new(9, 2, false)), Action::Hit);
        assert_eq!(strategy.action(&State::new(9, 3, false)), Action::Double);
        assert_eq!(strategy.action(&State::new(10, 9, false)), Action::Double);
        assert_eq!(strategy.action(&State::new(10, 10, false)), Action::Hit);
        assert_eq!(strategy.action(&State::new(10, 1, false)), Action::Hit);
        assert_eq!(strategy.action(&State::new(12, 3, false)), Action::Hit);
        assert_eq!(strategy.action(&State::new(12, 4, false)), Action::Stand);
        assert_eq!(strategy.action(&State::new(13, 2, false)), Action::Stand);
        assert_eq!(strategy.action(&State::new(14, 7, false)), Action::Hit);
    }

    #[test]
    fn soft_totals() {
        let strategy = BasicStrategy::new();
        for dealer in 1..=10 {
            assert_eq!(strategy.action(&State::new(17, dealer, true)), Action::Hit);
            assert_eq!(strategy.action(&State::new(19, dealer, true)), Action::Stand);
        }
        assert_eq!(strategy.action(&State::new(18, 8, true)), Action::Stand);
        assert_eq!(strategy.action(&State::new(18, 9, true)), Action::Hit);
        assert_eq!(strategy.action(&State::new(18, 1, true)), Action::Hit);
        // soft 12 is off the chart
        assert_eq!(strategy.action(&State::new(12, 6, true)), Action::Hit);
    }

    #[test]
    fn critical_states() {
        assert!(is_critical_state(&State::new(18, 3, true)));
        assert!(!is_critical_state(&State::new(17, 3, true)));
        assert!(is_critical_state(&State::new(12, 7, false)));
        assert!(is_critical_state(&State::new(16, 1, false)));
        assert!(!is_critical_state(&State::new(16, 6, false)));
        assert!(is_critical_state(&State::new(10, 9, false)));
        assert!(!is_critical_state(&State::new(10, 8, false)));
        assert!(!is_critical_state(&State::new(20, 10, false)));
    }

    #[test]
    fn exhaustive_scan_covers_360_states() {
        let states: Vec<State> = exhaustive_states().collect();
        assert_eq!(states.len(), 360);
        assert!(states.iter().all(|s| s.is_valid()));
        assert_eq!(states[0], State::new(4, 1, false));
        assert_eq!(states[1], State::new(4, 1, true));
    }
}
