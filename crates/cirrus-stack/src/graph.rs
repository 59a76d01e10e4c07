use std::collections::{BTreeMap, BTreeSet, VecDeque, btree_set};

static NO_NEIGHBOURS: BTreeSet<String> = BTreeSet::new();

/// Dependency graph for traversal and ordering.
///
/// An edge `(from, to)` means `to` cannot be realized before `from`.
#[derive(Debug, Clone, Default)]
pub struct Graph {
  /// Adjacency list: node_id -> downstream node_ids.
  adjacency: BTreeMap<String, BTreeSet<String>>,
  /// Reverse adjacency: node_id -> upstream node_ids.
  reverse_adjacency: BTreeMap<String, BTreeSet<String>>,
  /// Nodes with no incoming edges.
  entry_points: Vec<String>,
}

impl Graph {
  /// Build a graph from node ids and edges. Duplicate edges collapse.
  pub fn new<'a, I>(node_ids: I, edges: &[(String, String)]) -> Self
  where
    I: IntoIterator<Item = &'a String>,
  {
    let mut adjacency: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut reverse_adjacency: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for node_id in node_ids {
      adjacency.entry(node_id.clone()).or_default();
      reverse_adjacency.entry(node_id.clone()).or_default();
    }

    for (from, to) in edges {
      adjacency.entry(from.clone()).or_default().insert(to.clone());
      reverse_adjacency
        .entry(to.clone())
        .or_default()
        .insert(from.clone());
      adjacency.entry(to.clone()).or_default();
      reverse_adjacency.entry(from.clone()).or_default();
    }

    let entry_points = reverse_adjacency
      .iter()
      .filter(|(_, incoming)| incoming.is_empty())
      .map(|(id, _)| id.clone())
      .collect();

    Self {
      adjacency,
      reverse_adjacency,
      entry_points,
    }
  }

  pub fn len(&self) -> usize {
    self.adjacency.len()
  }

  pub fn is_empty(&self) -> bool {
    self.adjacency.is_empty()
  }

  pub fn contains(&self, node_id: &str) -> bool {
    self.adjacency.contains_key(node_id)
  }

  /// Get entry points (nodes with no incoming edges).
  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  /// Get downstream nodes for a given node.
  pub fn downstream(&self, node_id: &str) -> btree_set::Iter<'_, String> {
    self.adjacency.get(node_id).unwrap_or(&NO_NEIGHBOURS).iter()
  }

  /// Get upstream nodes for a given node.
  pub fn upstream(&self, node_id: &str) -> btree_set::Iter<'_, String> {
    self
      .reverse_adjacency
      .get(node_id)
      .unwrap_or(&NO_NEIGHBOURS)
      .iter()
  }

  /// Every node reachable downstream of `node_id`, excluding itself.
  pub fn descendants(&self, node_id: &str) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<&String> = self.downstream(node_id).collect();
    while let Some(next) = queue.pop_front() {
      if seen.insert(next.clone()) {
        queue.extend(self.downstream(next));
      }
    }
    seen
  }

  /// Find a cycle using DFS, returning its path with the first node repeated
  /// at the end (`a -> b -> a`).
  pub fn find_cycle(&self) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
      White,
      Gray,
      Black,
    }

    fn dfs<'a>(
      node: &'a str,
      adjacency: &'a BTreeMap<String, BTreeSet<String>>,
      color: &mut BTreeMap<&'a str, Color>,
      path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
      color.insert(node, Color::Gray);
      path.push(node);

      for neighbor in adjacency.get(node).into_iter().flatten() {
        match color.get(neighbor.as_str()).copied().unwrap_or(Color::White) {
          Color::Gray => {
            // Back edge: the cycle is the path suffix starting at `neighbor`.
            let start = path.iter().position(|n| *n == neighbor.as_str()).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(neighbor.clone());
            return Some(cycle);
          }
          Color::White => {
            if let Some(cycle) = dfs(neighbor.as_str(), adjacency, color, path) {
              return Some(cycle);
            }
          }
          Color::Black => {}
        }
      }

      path.pop();
      color.insert(node, Color::Black);
      None
    }

    let mut color: BTreeMap<&str, Color> = BTreeMap::new();
    let mut path = Vec::new();

    for node_id in self.adjacency.keys() {
      if color.get(node_id.as_str()).copied().unwrap_or(Color::White) == Color::White {
        if let Some(cycle) = dfs(node_id.as_str(), &self.adjacency, &mut color, &mut path) {
          return Some(cycle);
        }
      }
    }

    None
  }

  /// Group nodes into waves: every node's dependencies sit in earlier waves,
  /// and nodes within a wave are independent of each other.
  ///
  /// Nodes caught in a cycle never appear; callers validate with
  /// [`find_cycle`](Graph::find_cycle) first.
  pub fn waves(&self) -> Vec<Vec<String>> {
    let mut in_degree: BTreeMap<&str, usize> = self
      .reverse_adjacency
      .iter()
      .map(|(id, incoming)| (id.as_str(), incoming.len()))
      .collect();

    let mut current: Vec<&str> = self.entry_points.iter().map(String::as_str).collect();

    let mut waves = Vec::new();
    while !current.is_empty() {
      let mut next = Vec::new();
      for node_id in &current {
        for downstream in self.downstream(node_id) {
          if let Some(degree) = in_degree.get_mut(downstream.as_str()) {
            *degree -= 1;
            if *degree == 0 {
              next.push(downstream.as_str());
            }
          }
        }
      }
      next.sort_unstable();
      waves.push(current.iter().map(|id| id.to_string()).collect());
      current = next;
    }

    waves
  }

  /// A topological order of all nodes.
  pub fn topological_order(&self) -> Vec<String> {
    self.waves().into_iter().flatten().collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
  }

  fn edge(from: &str, to: &str) -> (String, String) {
    (from.to_string(), to.to_string())
  }

  #[test]
  fn test_entry_points_and_neighbours() {
    let nodes = ids(&["b", "p", "policy"]);
    let graph = Graph::new(&nodes, &[edge("b", "p"), edge("p", "policy"), edge("b", "policy")]);

    assert_eq!(graph.entry_points(), &["b".to_string()]);
    assert_eq!(graph.downstream("b").cloned().collect::<Vec<_>>(), ids(&["p", "policy"]));
    assert_eq!(graph.upstream("policy").cloned().collect::<Vec<_>>(), ids(&["b", "p"]));
    assert_eq!(graph.upstream("missing").count(), 0);
  }

  #[test]
  fn test_topological_order_respects_edges() {
    let nodes = ids(&["policy", "p", "b", "site", "object"]);
    let edges = vec![
      edge("b", "p"),
      edge("p", "policy"),
      edge("b", "policy"),
      edge("b", "site"),
      edge("b", "object"),
    ];
    let graph = Graph::new(&nodes, &edges);
    assert!(graph.find_cycle().is_none());

    let order = graph.topological_order();
    assert_eq!(order.len(), 5);
    let position = |id: &str| order.iter().position(|n| n == id).unwrap();
    for (from, to) in &edges {
      assert!(position(from.as_str()) < position(to.as_str()), "{from} must precede {to}");
    }
  }

  #[test]
  fn test_waves_group_independent_nodes() {
    let nodes = ids(&["a", "b", "c", "d"]);
    let graph = Graph::new(&nodes, &[edge("a", "c"), edge("b", "c"), edge("c", "d")]);

    assert_eq!(
      graph.waves(),
      vec![ids(&["a", "b"]), ids(&["c"]), ids(&["d"])]
    );
  }

  #[test]
  fn test_find_cycle_reports_path() {
    let nodes = ids(&["a", "b"]);
    let graph = Graph::new(&nodes, &[edge("a", "b"), edge("b", "a")]);

    let cycle = graph.find_cycle().unwrap();
    assert_eq!(cycle, ids(&["a", "b", "a"]));
  }

  #[test]
  fn test_find_cycle_in_longer_chain() {
    let nodes = ids(&["root", "x", "y", "z"]);
    let graph = Graph::new(
      &nodes,
      &[edge("root", "x"), edge("x", "y"), edge("y", "z"), edge("z", "x")],
    );

    let cycle = graph.find_cycle().unwrap();
    assert_eq!(cycle, ids(&["x", "y", "z", "x"]));
  }

  #[test]
  fn test_self_loop_is_a_cycle() {
    let nodes = ids(&["a"]);
    let graph = Graph::new(&nodes, &[edge("a", "a")]);
    assert_eq!(graph.find_cycle().unwrap(), ids(&["a", "a"]));
  }

  #[test]
  fn test_descendants() {
    let nodes = ids(&["a", "b", "c", "d"]);
    let graph = Graph::new(&nodes, &[edge("a", "b"), edge("b", "c")]);

    let descendants: Vec<String> = graph.descendants("a").into_iter().collect();
    assert_eq!(descendants, ids(&["b", "c"]));
    assert!(graph.descendants("d").is_empty());
  }

  #[test]
  fn test_duplicate_edges_collapse() {
    let nodes = ids(&["a", "b"]);
    let graph = Graph::new(&nodes, &[edge("a", "b"), edge("a", "b")]);
    assert_eq!(graph.downstream("a").count(), 1);
    assert_eq!(graph.upstream("b").count(), 1);
    assert_eq!(graph.waves(), vec![ids(&["a"]), ids(&["b"])]);
  }

  mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
      /// Edges always point from a higher index to a lower one, so every
      /// generated graph is acyclic.
      #[test]
      fn acyclic_graphs_always_order(
        size in 1usize..16,
        pairs in prop::collection::vec((0usize..16, 0usize..16), 0..48)
      ) {
        let nodes: Vec<String> = (0..size).map(|i| format!("node-{i}")).collect();
        let edges: Vec<(String, String)> = pairs
          .into_iter()
          .map(|(a, b)| (a % size, b % size))
          .filter(|(a, b)| a != b)
          .map(|(a, b)| (nodes[a.max(b)].clone(), nodes[a.min(b)].clone()))
          .collect();
        let graph = Graph::new(&nodes, &edges);

        prop_assert!(graph.find_cycle().is_none());
        let order = graph.topological_order();
        prop_assert_eq!(order.len(), size);
        for (from, to) in &edges {
          let from_at = order.iter().position(|n| n == from);
          let to_at = order.iter().position(|n| n == to);
          prop_assert!(from_at < to_at, "{} must precede {}", from, to);
        }
      }
    }
  }
}
