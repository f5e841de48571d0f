//! Content-model automata.
//!
//! A particle tree is expanded into a nondeterministic automaton whose
//! transitions consume one child element each. Matching tracks the set of
//! live states, so a child sequence is checked in one left-to-right pass with
//! no backtracking. Occurrence bounds are expanded into copies of the term,
//! which is why the number of states is capped.

use super::error::SchemaError;
use super::model::{ElementDeclId, Occurs, Particle, Term, Wildcard};
use crate::relay::domain::QName;
use std::collections::BTreeSet;

/// Upper bound on the states of one content model.
pub(crate) const MAX_STATES: usize = 10_000;

#[derive(Debug, Clone)]
enum Label {
    Element { id: ElementDeclId, name: QName },
    Any(usize),
}

#[derive(Debug, Clone)]
struct Transition {
    label: Option<Label>,
    target: usize,
}

#[derive(Debug)]
pub(crate) struct ContentAutomaton {
    transitions: Vec<Vec<Transition>>,
    wildcards: Vec<Wildcard>,
    start: usize,
    accept: usize,
}

/// What a child element was matched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChildMatch<'a> {
    Element(ElementDeclId),
    Wildcard(&'a Wildcard),
}

impl ContentAutomaton {
    pub(crate) fn compile(particle: &Particle, context: &str) -> Result<Self, SchemaError> {
        let mut builder = Builder {
            transitions: Vec::new(),
            wildcards: Vec::new(),
            context,
        };
        let start = builder.state()?;
        let accept = builder.particle(particle, start)?;
        Ok(Self {
            transitions: builder.transitions,
            wildcards: builder.wildcards,
            start,
            accept,
        })
    }

    pub(crate) fn matcher(&self) -> ContentMatcher<'_> {
        let mut live = BTreeSet::new();
        live.insert(self.start);
        ContentMatcher {
            automaton: self,
            live: self.closure(live),
        }
    }

    fn closure(&self, states: BTreeSet<usize>) -> BTreeSet<usize> {
        let mut closed = states.clone();
        let mut pending: Vec<usize> = states.into_iter().collect();
        while let Some(state) = pending.pop() {
            let Some(outgoing) = self.transitions.get(state) else {
                continue;
            };
            for transition in outgoing {
                if transition.label.is_none() && closed.insert(transition.target) {
                    pending.push(transition.target);
                }
            }
        }
        closed
    }

    fn labelled(&self, live: &BTreeSet<usize>) -> impl Iterator<Item = (&Label, usize)> {
        live.iter()
            .filter_map(|state| self.transitions.get(*state))
            .flatten()
            .filter_map(|transition| {
                transition
                    .label
                    .as_ref()
                    .map(|label| (label, transition.target))
            })
    }
}

/// Incremental matcher over one element's children.
#[derive(Debug)]
pub(crate) struct ContentMatcher<'a> {
    automaton: &'a ContentAutomaton,
    live: BTreeSet<usize>,
}

impl<'a> ContentMatcher<'a> {
    /// Consumes one child. Returns `None`, leaving the matcher unchanged, when
    /// the child is not allowed at this point.
    pub(crate) fn step(&mut self, name: &QName) -> Option<ChildMatch<'a>> {
        let automaton = self.automaton;
        let mut matched = None;
        let mut targets = BTreeSet::new();

        for (label, target) in automaton.labelled(&self.live) {
            if let Label::Element { id, name: expected } = label
                && expected == name
            {
                matched.get_or_insert(ChildMatch::Element(*id));
                targets.insert(target);
            }
        }
        if targets.is_empty() {
            for (label, target) in automaton.labelled(&self.live) {
                if let Label::Any(index) = label
                    && let Some(wildcard) = automaton.wildcards.get(*index)
                    && wildcard.allows(name.namespace())
                {
                    matched.get_or_insert(ChildMatch::Wildcard(wildcard));
                    targets.insert(target);
                }
            }
        }

        let matched = matched?;
        self.live = automaton.closure(targets);
        Some(matched)
    }

    /// Returns whether the children consumed so far form a complete content.
    pub(crate) fn is_complete(&self) -> bool {
        self.live.contains(&self.automaton.accept)
    }

    /// Describes the children allowed next, for diagnostics.
    pub(crate) fn expected(&self) -> Vec<String> {
        let automaton = self.automaton;
        let mut names = BTreeSet::new();
        for (label, _) in automaton.labelled(&self.live) {
            let description = match label {
                Label::Element { name, .. } => name.local_name().to_owned(),
                Label::Any(index) => automaton
                    .wildcards
                    .get(*index)
                    .map_or_else(|| "any element".to_owned(), Wildcard::describe),
            };
            names.insert(description);
        }
        names.into_iter().collect()
    }
}

struct Builder<'c> {
    transitions: Vec<Vec<Transition>>,
    wildcards: Vec<Wildcard>,
    context: &'c str,
}

impl Builder<'_> {
    fn state(&mut self) -> Result<usize, SchemaError> {
        if self.transitions.len() >= MAX_STATES {
            return Err(SchemaError::ContentModelTooLarge {
                context: self.context.to_owned(),
                states: self.transitions.len() + 1,
                limit: MAX_STATES,
            });
        }
        self.transitions.push(Vec::new());
        Ok(self.transitions.len() - 1)
    }

    fn edge(&mut self, from: usize, label: Option<Label>, target: usize) {
        if let Some(outgoing) = self.transitions.get_mut(from) {
            outgoing.push(Transition { label, target });
        }
    }

    /// Appends `particle` after `entry` and returns its exit state.
    fn particle(&mut self, particle: &Particle, entry: usize) -> Result<usize, SchemaError> {
        let Occurs { min, max } = particle.occurs;
        let mut current = entry;
        for _ in 0..min {
            current = self.term(&particle.term, current)?;
        }
        match max {
            None => {
                let repeat = self.state()?;
                self.edge(current, None, repeat);
                let after = self.term(&particle.term, repeat)?;
                self.edge(after, None, repeat);
                Ok(repeat)
            }
            Some(max) => {
                let exit = self.state()?;
                self.edge(current, None, exit);
                for _ in min..max {
                    current = self.term(&particle.term, current)?;
                    self.edge(current, None, exit);
                }
                Ok(exit)
            }
        }
    }

    fn term(&mut self, term: &Term, entry: usize) -> Result<usize, SchemaError> {
        match term {
            Term::Element { id, name } => {
                let exit = self.state()?;
                let label = Label::Element {
                    id: *id,
                    name: name.clone(),
                };
                self.edge(entry, Some(label), exit);
                Ok(exit)
            }
            Term::Any(wildcard) => {
                let exit = self.state()?;
                self.wildcards.push(wildcard.clone());
                let label = Label::Any(self.wildcards.len() - 1);
                self.edge(entry, Some(label), exit);
                Ok(exit)
            }
            Term::Sequence(particles) => {
                let mut current = entry;
                for particle in particles {
                    current = self.particle(particle, current)?;
                }
                Ok(current)
            }
            Term::Choice(particles) => {
                let exit = self.state()?;
                for particle in particles {
                    let branch = self.state()?;
                    self.edge(entry, None, branch);
                    let branch_exit = self.particle(particle, branch)?;
                    self.edge(branch_exit, None, exit);
                }
                Ok(exit)
            }
        }
    }
}
