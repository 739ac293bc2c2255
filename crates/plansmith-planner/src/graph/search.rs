use std::collections::{BTreeSet, HashSet, VecDeque};

use tracing::{debug, trace};

use super::node::NodeId;

/// One way of producing a node: agent `agent` writes `output` after reading
/// every node in `inputs`.
#[derive(Debug, Clone)]
pub struct Producer {
    pub agent: usize,
    pub output: NodeId,
    pub inputs: Vec<NodeId>,
}

/// Fewest-invocations search over a node arena.
///
/// A node is derivable when it is available, or when some producer has all
/// of its inputs derivable. The search walks breadth-first over sets of
/// produced nodes, firing one ready producer per step, so the first set that
/// holds the goal uses the fewest agent invocations. Producers are tried in
/// registration order, so ties go to the earliest registered. The order in
/// which available nodes are given does not matter.
pub struct DependencyGraphSearch<'g> {
    node_count: usize,
    producers: &'g [Producer],
}

/// A search state: nodes produced so far and the producers fired, in order.
struct Frontier {
    produced: BTreeSet<NodeId>,
    fired: Vec<usize>,
}

impl<'g> DependencyGraphSearch<'g> {
    pub fn new(node_count: usize, producers: &'g [Producer]) -> Self {
        Self {
            node_count,
            producers,
        }
    }

    /// Find an ordered node path from the available nodes to `goal`.
    ///
    /// The path lists the available nodes the derivation consumes, then each
    /// produced node after all of its inputs, ending with `goal`. A goal that
    /// is already available yields `[goal]`. Returns `None` when the goal
    /// cannot be derived. Nodes outside the arena are ignored.
    pub fn search<I>(&self, available: I, goal: NodeId) -> Option<Vec<NodeId>>
    where
        I: IntoIterator<Item = NodeId>,
    {
        if goal.0 >= self.node_count {
            return None;
        }

        let available: HashSet<NodeId> = available
            .into_iter()
            .filter(|node| node.0 < self.node_count)
            .collect();

        if available.contains(&goal) {
            return Some(vec![goal]);
        }

        let fired = self.fewest_firings(&available, goal)?;
        let path = self.path_for(&fired, &available, goal);

        debug!(
            goal = goal.0,
            producers = fired.len(),
            path_len = path.len(),
            "Derivation found"
        );
        Some(path)
    }

    /// Producers whose output can feed the goal, in registration order.
    fn relevant(&self, available: &HashSet<NodeId>, goal: NodeId) -> Vec<usize> {
        let mut needed: HashSet<NodeId> = HashSet::from([goal]);
        let mut grew = true;
        while grew {
            grew = false;
            for producer in self.producers {
                if needed.contains(&producer.output) {
                    for input in &producer.inputs {
                        grew |= needed.insert(*input);
                    }
                }
            }
        }

        (0..self.producers.len())
            .filter(|&index| {
                let output = self.producers[index].output;
                needed.contains(&output) && !available.contains(&output)
            })
            .collect()
    }

    /// Shortest firing sequence that produces `goal`.
    fn fewest_firings(&self, available: &HashSet<NodeId>, goal: NodeId) -> Option<Vec<usize>> {
        let relevant = self.relevant(available, goal);
        let known = |state: &Frontier, node: &NodeId| {
            available.contains(node) || state.produced.contains(node)
        };

        let mut visited: HashSet<BTreeSet<NodeId>> = HashSet::from([BTreeSet::new()]);
        let mut queue = VecDeque::from([Frontier {
            produced: BTreeSet::new(),
            fired: vec![],
        }]);

        while let Some(state) = queue.pop_front() {
            for &index in &relevant {
                let producer = &self.producers[index];
                if known(&state, &producer.output)
                    || !producer.inputs.iter().all(|input| known(&state, input))
                {
                    continue;
                }

                let mut produced = state.produced.clone();
                produced.insert(producer.output);
                if !visited.insert(produced.clone()) {
                    continue;
                }

                let mut fired = state.fired.clone();
                fired.push(index);
                if producer.output == goal {
                    trace!(states = visited.len(), "Goal reached");
                    return Some(fired);
                }
                queue.push_back(Frontier { produced, fired });
            }
        }

        trace!(states = visited.len(), "Search space exhausted");
        None
    }

    /// Node path for a firing sequence, keeping only producers the goal needs.
    fn path_for(&self, fired: &[usize], available: &HashSet<NodeId>, goal: NodeId) -> Vec<NodeId> {
        let mut needed: HashSet<NodeId> = HashSet::from([goal]);
        let mut kept: Vec<usize> = Vec::with_capacity(fired.len());
        for &index in fired.iter().rev() {
            let producer = &self.producers[index];
            if needed.remove(&producer.output) {
                needed.extend(producer.inputs.iter().copied());
                kept.push(index);
            }
        }
        kept.reverse();

        let mut path = Vec::with_capacity(kept.len() + available.len());
        let mut emitted = HashSet::new();
        for &index in &kept {
            for input in &self.producers[index].inputs {
                if available.contains(input) && emitted.insert(*input) {
                    path.push(*input);
                }
            }
        }
        path.extend(kept.iter().map(|&index| self.producers[index].output));
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn producer(agent: usize, inputs: &[usize], output: usize) -> Producer {
        Producer {
            agent,
            output: NodeId(output),
            inputs: inputs.iter().map(|&i| NodeId(i)).collect(),
        }
    }

    fn ids(raw: &[usize]) -> Vec<NodeId> {
        raw.iter().map(|&i| NodeId(i)).collect()
    }

    #[test]
    fn test_goal_already_available() {
        let producers = vec![producer(0, &[0], 1)];
        let search = DependencyGraphSearch::new(2, &producers);
        assert_eq!(search.search(ids(&[0, 1]), NodeId(1)), Some(ids(&[1])));
    }

    #[test]
    fn test_chain() {
        // 0:x -> 1:y -> 2:z
        let producers = vec![producer(0, &[0], 1), producer(1, &[1], 2)];
        let search = DependencyGraphSearch::new(3, &producers);
        assert_eq!(search.search(ids(&[0]), NodeId(2)), Some(ids(&[0, 1, 2])));
    }

    #[test]
    fn test_shortcut_preferred() {
        // x -> y -> z and x -> z directly
        let producers = vec![
            producer(0, &[0], 1),
            producer(1, &[1], 2),
            producer(2, &[0], 2),
        ];
        let search = DependencyGraphSearch::new(3, &producers);
        assert_eq!(search.search(ids(&[0]), NodeId(2)), Some(ids(&[0, 2])));
    }

    #[test]
    fn test_all_inputs_required() {
        // (x, w) -> y
        let producers = vec![producer(0, &[0, 1], 2)];
        let search = DependencyGraphSearch::new(3, &producers);
        assert_eq!(search.search(ids(&[0]), NodeId(2)), None);
        assert_eq!(search.search(ids(&[0, 1]), NodeId(2)), Some(ids(&[0, 1, 2])));
    }

    #[test]
    fn test_unreachable_and_empty_available() {
        let producers = vec![producer(0, &[0], 1)];
        let search = DependencyGraphSearch::new(3, &producers);
        assert_eq!(search.search(ids(&[0]), NodeId(2)), None);
        assert_eq!(search.search(Vec::new(), NodeId(1)), None);
    }

    #[test]
    fn test_out_of_range_nodes_ignored() {
        let producers = vec![producer(0, &[0], 1)];
        let search = DependencyGraphSearch::new(2, &producers);
        assert_eq!(search.search(ids(&[0, 42]), NodeId(1)), Some(ids(&[0, 1])));
        assert_eq!(search.search(ids(&[0]), NodeId(42)), None);
    }

    #[test]
    fn test_source_producer() {
        // () -> x, x -> y
        let producers = vec![producer(0, &[], 0), producer(1, &[0], 1)];
        let search = DependencyGraphSearch::new(2, &producers);
        assert_eq!(search.search(Vec::new(), NodeId(1)), Some(ids(&[0, 1])));
    }

    #[test]
    fn test_cycle_terminates() {
        // x -> y, y -> x, y -> z
        let producers = vec![
            producer(0, &[0], 1),
            producer(1, &[1], 0),
            producer(2, &[1], 2),
        ];
        let search = DependencyGraphSearch::new(3, &producers);
        assert_eq!(search.search(ids(&[0]), NodeId(2)), Some(ids(&[0, 1, 2])));
        assert_eq!(search.search(Vec::new(), NodeId(2)), None);
    }

    #[test]
    fn test_tie_break_registration_order() {
        // x -> z (registered first) and w -> z
        let producers = vec![producer(0, &[0], 2), producer(1, &[1], 2)];
        let search = DependencyGraphSearch::new(3, &producers);
        assert_eq!(search.search(ids(&[0, 1]), NodeId(2)), Some(ids(&[0, 2])));
        assert_eq!(search.search(ids(&[1, 0]), NodeId(2)), Some(ids(&[0, 2])));
    }

    #[test]
    fn test_shared_intermediate_counted_once() {
        // x -> m; m -> a; m -> b; (a, b) -> g
        let producers = vec![
            producer(0, &[0], 1),
            producer(1, &[1], 2),
            producer(2, &[1], 3),
            producer(3, &[2, 3], 4),
        ];
        let search = DependencyGraphSearch::new(5, &producers);
        let path = search.search(ids(&[0]), NodeId(4)).unwrap();
        assert_eq!(path, ids(&[0, 1, 2, 3, 4]));
    }

    #[test]
    fn test_joint_cost_beats_cheapest_per_node() {
        // x -> t -> a, x -> m, m -> a, m -> b, (a, b) -> g
        // a alone is cheapest via t, but sharing m makes [m, a, b, g] shorter
        let producers = vec![
            producer(0, &[0], 1),
            producer(1, &[1], 2),
            producer(2, &[0], 3),
            producer(3, &[3], 2),
            producer(4, &[3], 4),
            producer(5, &[2, 4], 5),
        ];
        let search = DependencyGraphSearch::new(6, &producers);
        let path = search.search(ids(&[0]), NodeId(5)).unwrap();
        assert_eq!(path, ids(&[0, 3, 2, 4, 5]));
    }
}
