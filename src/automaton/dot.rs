use std::fmt::Debug;

use itertools::Itertools;

use crate::{graph::Datagraph, Show};

use super::{Dfa, FiniteAutomaton, Nfa, StateId};

fn escape_label(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

impl<G: Datagraph> FiniteAutomaton<G> {
    /// Compute the graphviz representation, for more information on the DOT format,
    /// see the [graphviz documentation](https://graphviz.org/doc/info/lang.html).
    /// Final states are drawn as double circles, the initial state is marked by an arrow
    /// coming from an invisible node.
    pub fn dot_representation(&self, name: &str) -> String {
        let header = [
            format!("digraph {} {{", name),
            "rankdir=LR".to_string(),
            "init [label=\"\", shape=none, width=0, height=0]".to_string(),
        ];

        let states = self.states().map(|(q, _)| {
            let shape = if self.is_final(q) {
                "doublecircle"
            } else {
                "circle"
            };
            format!("{} [label=\"{}\", shape={}]", q.show(), q.show(), shape)
        });

        let initial = std::iter::once(format!("init -> {}", self.initial_state().show()));

        let transitions = self.transitions().map(|(_, t)| {
            format!(
                "{} -> {} [label=\"{}\"]",
                t.start_state().show(),
                t.end_state().show(),
                escape_label(&t.kind().show())
            )
        });

        header
            .into_iter()
            .chain(states)
            .chain(initial)
            .chain(transitions)
            .chain(std::iter::once("}".to_string()))
            .join("\n")
    }

    /// Returns a string representation of the transitions of every state. The decorator is
    /// applied to the name of each state.
    fn build_transition_table<SD>(&self, state_decorator: SD) -> String
    where
        SD: Fn(StateId, String) -> String,
    {
        let mut builder = tabled::builder::Builder::default();
        builder.push_record(["State", "Final", "Transitions"].map(String::from));
        for (q, _) in self.states() {
            let transitions = self
                .out_transitions(q)
                .map(|t| format!("{} → {}", t.kind().show(), t.end_state().show()))
                .join(", ");
            builder.push_record([
                state_decorator(q, q.show()),
                self.is_final(q).show(),
                if transitions.is_empty() {
                    "-".to_string()
                } else {
                    transitions
                },
            ]);
        }
        builder
            .build()
            .with(tabled::settings::Style::rounded())
            .to_string()
    }
}

impl<G: Datagraph> Debug for FiniteAutomaton<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let initial = self.initial_state();
        write!(
            f,
            "{}",
            self.build_transition_table(|q, name| if q == initial {
                format!("→ {name}")
            } else {
                name
            })
        )
    }
}

impl<G: Datagraph> Show for FiniteAutomaton<G> {
    fn show(&self) -> String {
        use owo_colors::OwoColorize;
        let initial = self.initial_state();
        self.build_transition_table(|q, name| {
            if q == initial {
                name.bold().to_string()
            } else if self.is_final(q) {
                name.green().to_string()
            } else {
                name
            }
        })
    }
}

impl<G: Datagraph> Show for Nfa<G> {
    fn show(&self) -> String {
        self.automaton().show()
    }
}

impl<G: Datagraph> Show for Dfa<G> {
    fn show(&self) -> String {
        self.automaton().show()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        automaton::{Dfa, Direction, EdgeSymbol, Nfa},
        graph::SimpleGraph,
        Show,
    };

    #[test]
    fn dot_and_tables_mention_every_state() {
        let nfa = Nfa::<SimpleGraph>::simple(EdgeSymbol::new(Direction::Out))
            .then(Nfa::simple(EdgeSymbol::new(Direction::In)).star());
        let dfa = Dfa::from_nfa(nfa);
        let dot = dfa.automaton().dot_representation("path");
        assert!(dot.starts_with("digraph path {"));
        assert!(dot.contains("init -> q0"));
        assert!(dot.contains("doublecircle"));
        assert!(dot.contains("[label=\"-->\"]"));
        assert!(dot.contains("[label=\"<--\"]"));

        let table = format!("{:?}", dfa.automaton());
        for (q, _) in dfa.automaton().states() {
            assert!(table.contains(&q.show()));
        }
        assert!(!dfa.show().is_empty());
    }
}
