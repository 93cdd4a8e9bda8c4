use crate::prelude::*;
use crate::graph::{ElementType, SimpleGraph};
use tracing::debug;

/// Generates a random graph with `vertices` vertices and `edges` edges. The schema
/// consists of `types` vertex types named `V0`, `V1`, ... and as many edge types named
/// `E0`, `E1`, ...; every odd type is declared a subtype of its predecessor. Endpoints and
/// types of edges are drawn uniformly, so loops and parallel edges occur. Roughly every
/// fourth edge gets a composition kind at its start.
pub fn generate_random_graph(vertices: usize, edges: usize, types: usize) -> SimpleGraph {
    let mut graph = SimpleGraph::new();
    let types = types.max(1);
    let vertex_types = declare_types(&mut graph, "V", types);
    let edge_types = declare_types(&mut graph, "E", types);

    let ids = (0..vertices)
        .map(|_| graph.add_vertex(&vertex_types[fastrand::usize(..types)]))
        .collect::<Vec<_>>();
    if ids.is_empty() {
        return graph;
    }
    for _ in 0..edges {
        let alpha = ids[fastrand::usize(..ids.len())];
        let omega = ids[fastrand::usize(..ids.len())];
        let edge = graph.add_edge(&edge_types[fastrand::usize(..types)], alpha, omega);
        if fastrand::u8(..4) == 0 {
            let kind = if fastrand::bool() {
                AggregationKind::Shared
            } else {
                AggregationKind::Composite
            };
            graph.set_composition_kind(edge, EdgeEnd::This, kind);
        }
    }
    debug!(
        "generated random graph with {} vertices and {} edges",
        graph.vertex_count(),
        graph.edge_count()
    );
    graph
}

fn declare_types(graph: &mut SimpleGraph, prefix: &str, count: usize) -> Vec<ElementType> {
    (0..count)
        .map(|i| {
            let name = format!("{prefix}{i}");
            if i % 2 == 1 {
                let parent = format!("{prefix}{}", i - 1);
                graph.define_type(&name, &[parent.as_str()])
            } else {
                graph.define_type(&name, &[])
            }
        })
        .collect()
}

fn declared_types(graph: &SimpleGraph, prefix: &str) -> Vec<ElementType> {
    (0..)
        .map_while(|i| graph.element_type(&format!("{prefix}{i}")))
        .collect()
}

/// Generates a random path description over the schema of a graph produced by
/// [`generate_random_graph`]. Operators are nested up to `depth` levels, atoms are edge
/// steps in a random direction with a random type collection, sometimes aggregations.
/// Descriptions only use type based restrictions, so their meaning does not depend on any
/// external evaluator.
pub fn generate_random_description(graph: &SimpleGraph, depth: usize) -> Nfa<SimpleGraph> {
    let edge_types = declared_types(graph, "E");
    let vertex_types = declared_types(graph, "V");
    random_description(&edge_types, &vertex_types, depth)
}

fn random_description(
    edge_types: &[ElementType],
    vertex_types: &[ElementType],
    depth: usize,
) -> Nfa<SimpleGraph> {
    if depth == 0 || fastrand::u8(..4) == 0 {
        return random_atom(edge_types);
    }
    let nested = || random_description(edge_types, vertex_types, depth - 1);
    match fastrand::u8(..9) {
        0 => (1..fastrand::usize(2..=3)).fold(nested(), |acc, _| acc.then(nested())),
        1 => {
            let branches = (0..fastrand::usize(2..=3)).map(|_| nested()).collect::<Vec<_>>();
            // there are at least two branches
            Nfa::alternative(branches).unwrap_or_else(|_| Nfa::empty_path())
        }
        2 => nested().optional(),
        3 => nested().star(),
        4 => nested().plus(),
        5 => nested().exponentiated(fastrand::usize(..3)),
        6 => nested().transposed(),
        7 => nested().with_goal_type_restriction(random_types(vertex_types)),
        _ => nested().with_start_type_restriction(random_types(vertex_types)),
    }
}

fn random_atom(edge_types: &[ElementType]) -> Nfa<SimpleGraph> {
    let direction = match fastrand::u8(..3) {
        0 => Direction::In,
        1 => Direction::Out,
        _ => Direction::Any,
    };
    let symbol = EdgeSymbol::new(direction).with_types(random_types(edge_types));
    if fastrand::u8(..6) == 0 {
        let end = if fastrand::bool() {
            EdgeEnd::This
        } else {
            EdgeEnd::That
        };
        Nfa::aggregation(end, symbol)
    } else {
        Nfa::simple(symbol)
    }
}

fn random_types(types: &[ElementType]) -> TypeCollection<ElementType> {
    if types.is_empty() {
        return TypeCollection::any();
    }
    let pick = || types[fastrand::usize(..types.len())].clone();
    match fastrand::u8(..4) {
        0 | 1 => TypeCollection::any(),
        2 => TypeCollection::allowing([pick()]),
        _ => TypeCollection::forbidding([pick()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::OrderedSet;

    const ROUNDS: usize = 40;

    fn random_setup() -> (SimpleGraph, Dfa<SimpleGraph>) {
        let graph = generate_random_graph(
            fastrand::usize(1..12),
            fastrand::usize(0..20),
            fastrand::usize(1..4),
        );
        let nfa = generate_random_description(&graph, 3);
        (graph, Dfa::from_nfa(nfa))
    }

    #[test]
    fn random_graphs_have_the_requested_size() {
        fastrand::seed(7);
        let graph = generate_random_graph(10, 25, 3);
        assert_eq!(graph.vertex_count(), 10);
        assert_eq!(graph.edge_count(), 25);
        assert_eq!(declared_types(&graph, "E").len(), 3);
        let e1 = graph.element_type("E1").unwrap();
        let e0 = graph.element_type("E0").unwrap();
        assert!(e1.is_subtype_of(&e0));
        assert_eq!(generate_random_graph(0, 5, 1).edge_count(), 0);
    }

    #[test_log::test]
    fn random_automata_are_epsilon_free_and_densely_numbered() {
        fastrand::seed(11);
        for _ in 0..ROUNDS {
            let (_, dfa) = random_setup();
            let fa = dfa.automaton();
            assert!(fa.is_epsilon_free());
            let numbers = fa.states().map(|(_, s)| s.number()).collect::<OrderedSet<_>>();
            assert_eq!(numbers, (0..fa.state_count()).collect());
        }
    }

    #[test]
    fn double_reversal_finds_the_same_vertices() {
        fastrand::seed(23);
        for _ in 0..ROUNDS {
            let (graph, dfa) = random_setup();
            let twice = dfa.reversed().reversed();
            let search = PathSearch::new(&graph, &dfa);
            let other = PathSearch::new(&graph, &twice);
            for root in graph.vertices() {
                assert_eq!(search.vertex_set(root).unwrap(), other.vertex_set(root).unwrap());
            }
        }
    }

    #[test]
    fn backward_search_inverts_forward_search() {
        fastrand::seed(42);
        for _ in 0..ROUNDS {
            let (graph, dfa) = random_setup();
            let search = PathSearch::new(&graph, &dfa);
            for root in graph.vertices() {
                for reached in search.vertex_set(root).unwrap() {
                    assert!(
                        search.backward_vertex_set(reached).unwrap().contains(&root),
                        "{root:?} reaches {reached:?}\n{dfa:?}"
                    );
                    assert!(search.is_reachable(root, reached).unwrap());
                }
            }
        }
    }

    #[test]
    fn reconstructed_paths_are_connected() {
        fastrand::seed(5);
        for _ in 0..ROUNDS {
            let (graph, dfa) = random_setup();
            let search = PathSearch::new(&graph, &dfa);
            for root in graph.vertices() {
                let system = search.path_system(root).unwrap();
                assert_eq!(
                    system.leaves().map(|e| e.vertex()).collect::<OrderedSet<_>>(),
                    search.vertex_set(root).unwrap()
                );
                for path in system.extract_paths() {
                    assert_eq!(path.start_vertex(), root);
                    assert!(path.length() <= system.depth());
                    for (i, &edge) in path.edges().iter().enumerate() {
                        assert_eq!(graph.this_vertex(edge), path.vertices()[i]);
                        assert_eq!(graph.that_vertex(edge), path.vertices()[i + 1]);
                    }
                }
            }
        }
    }

    #[test]
    fn slices_contain_the_vertex_sets() {
        fastrand::seed(99);
        for _ in 0..ROUNDS {
            let (graph, dfa) = random_setup();
            let search = PathSearch::new(&graph, &dfa);
            for root in graph.vertices() {
                let slice = search.slice([root]).unwrap();
                let reached = search.vertex_set(root).unwrap();
                assert_eq!(slice.is_empty(), reached.is_empty());
                assert!(reached.iter().all(|&v| slice.contains_vertex(v)));
                if !slice.is_empty() {
                    assert!(slice.contains_vertex(root));
                }
            }
        }
    }
}
