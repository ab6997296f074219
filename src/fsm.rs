//! A small table-driven finite state machine.
//!
//! States and flags are static names; the action type is generic so a
//! protocol can drive the machine with its own verb enum. Transitions may
//! carry operations of the shape `set_<flag>` (applied when the transition
//! runs) and a guard condition of the shape `if_<flag>` / `if_not_<flag>`
//! (evaluated against the current flag set).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use thiserror::Error;

pub type State = &'static str;
pub type Flag = &'static str;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FsmError {
    #[error(
        "duplicate action \"{action}\" for state \"{state}\" \
         (-> \"{known}\" already known, can not add transition to \"{proposed}\")"
    )]
    DuplicateTransition {
        state: State,
        action: String,
        known: State,
        proposed: State,
    },

    #[error("invalid action \"{action}\", expected one of [{}]", allowed.join(", "))]
    InvalidAction {
        action: String,
        allowed: Vec<String>,
    },

    #[error("unknown state \"{0}\"")]
    UnknownState(State),

    #[error("malformed operation \"{0}\", expected \"set_<flag>\"")]
    MalformedOperation(&'static str),

    #[error("malformed condition \"{0}\", expected \"if_<flag>\" or \"if_not_<flag>\"")]
    MalformedCondition(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Condition {
    IfSet(Flag),
    IfNotSet(Flag),
}

impl Condition {
    fn parse(condition: &'static str) -> Result<Self, FsmError> {
        let Some(flag) = condition.strip_prefix("if_") else {
            return Err(FsmError::MalformedCondition(condition));
        };

        let parsed = flag
            .strip_prefix("not_")
            .map_or(Self::IfSet(flag), Self::IfNotSet);
        match parsed {
            Self::IfSet("") | Self::IfNotSet("") => Err(FsmError::MalformedCondition(condition)),
            _ => Ok(parsed),
        }
    }

    fn is_satisfied(&self, flags: &BTreeSet<Flag>) -> bool {
        match self {
            Self::IfSet(flag) => flags.contains(flag),
            Self::IfNotSet(flag) => !flags.contains(flag),
        }
    }
}

#[derive(Debug, Clone)]
struct Transition {
    to: State,
    operations: Vec<Flag>,
    condition: Option<Condition>,
}

/// The machine itself. `A` is the action type; protocols typically use an
/// enum, tests can use plain `&'static str`.
#[derive(Debug, Clone)]
pub struct StateMachine<A> {
    state: State,
    flags: BTreeSet<Flag>,
    transitions: BTreeMap<State, BTreeMap<A, Transition>>,
}

impl<A> StateMachine<A>
where
    A: Copy + Ord + Display,
{
    #[must_use]
    pub fn new(initial_state: State) -> Self {
        Self {
            state: initial_state,
            flags: BTreeSet::default(),
            transitions: BTreeMap::default(),
        }
    }

    // --- states ---------------------------

    /// The current state, or `None` when the machine was put into a state
    /// that no transition mentions.
    #[must_use]
    pub fn state(&self) -> Option<State> {
        if self.is_impossible_state() {
            None
        } else {
            Some(self.state)
        }
    }

    #[must_use]
    pub fn is_impossible_state(&self) -> bool {
        !self.known_states().contains(self.state)
    }

    pub fn set_state(&mut self, state: State) -> Result<(), FsmError> {
        if !self.known_states().contains(state) {
            return Err(FsmError::UnknownState(state));
        }
        self.state = state;
        Ok(())
    }

    // --- transitions ----------------------

    /// Register a transition. At most one transition may exist per
    /// (state, action) pair.
    pub fn add(
        &mut self,
        from_state: State,
        to_state: State,
        action: A,
        operations: &[&'static str],
        condition: Option<&'static str>,
    ) -> Result<(), FsmError> {
        let operations = operations
            .iter()
            .map(|&operation| {
                operation
                    .strip_prefix("set_")
                    .filter(|flag| !flag.is_empty())
                    .ok_or(FsmError::MalformedOperation(operation))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let condition = condition.map(Condition::parse).transpose()?;

        let transitions = self.transitions.entry(from_state).or_default();
        if let Some(existing) = transitions.get(&action) {
            return Err(FsmError::DuplicateTransition {
                state: from_state,
                action: action.to_string(),
                known: existing.to,
                proposed: to_state,
            });
        }

        transitions.insert(
            action,
            Transition {
                to: to_state,
                operations,
                condition,
            },
        );

        Ok(())
    }

    /// Run `action` from the current state: apply its `set_<flag>`
    /// operations, then move to the destination state.
    pub fn execute(&mut self, action: A) -> Result<State, FsmError> {
        if !self.allowed_actions().contains(&action) {
            return Err(FsmError::InvalidAction {
                action: action.to_string(),
                allowed: self
                    .allowed_actions()
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            });
        }

        let transition = self
            .transitions
            .get(self.state)
            .and_then(|transitions| transitions.get(&action))
            .cloned()
            .ok_or(FsmError::UnknownState(self.state))?;

        for flag in transition.operations {
            self.flags.insert(flag);
        }
        self.state = transition.to;

        Ok(self.state)
    }

    // --- flags ----------------------------

    #[must_use]
    pub fn is_set(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    // --- introspection --------------------

    /// Every action mentioned anywhere in the table, regardless of the
    /// current state.
    #[must_use]
    pub fn known_actions(&self) -> BTreeSet<A> {
        self.transitions
            .values()
            .flat_map(|transitions| transitions.keys().copied())
            .collect()
    }

    /// The actions executable right now: transitions out of the current
    /// state whose guard condition (if any) holds.
    #[must_use]
    pub fn allowed_actions(&self) -> BTreeSet<A> {
        self.transitions
            .get(self.state)
            .map(|transitions| {
                transitions
                    .iter()
                    .filter(|(_, transition)| {
                        transition
                            .condition
                            .is_none_or(|condition| condition.is_satisfied(&self.flags))
                    })
                    .map(|(action, _)| *action)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// States with at least one outgoing transition.
    #[must_use]
    pub fn known_non_final_states(&self) -> BTreeSet<State> {
        self.transitions.keys().copied().collect()
    }

    #[must_use]
    pub fn known_states(&self) -> BTreeSet<State> {
        let mut states = self.known_non_final_states();
        states.extend(
            self.transitions
                .values()
                .flat_map(|transitions| transitions.values().map(|transition| transition.to)),
        );
        states
    }
}
