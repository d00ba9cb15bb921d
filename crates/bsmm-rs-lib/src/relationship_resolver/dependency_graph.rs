//! Graph of catalog mods linked by their declared relationships.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::prelude::*;

use crate::catalog::{Catalog, ModDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeData {
	/// The source mod requires the target mod.
	Depends,
	/// The source mod can't be installed alongside the target mod.
	Conflicts,
}

#[derive(Debug)]
pub struct DependencyGraph<'c> {
	pub graph: DiGraph<&'c ModDescriptor, EdgeData>,
	indices: HashMap<&'c str, NodeIndex>,
}

impl<'c> DependencyGraph<'c> {
	/// Builds the graph for every mod in `catalog`.
	///
	/// Relationships naming mods absent from the catalog are dropped, absent mods can't be required.
	pub fn from_catalog(catalog: &'c Catalog) -> Self {
		let mut graph = DiGraph::with_capacity(catalog.len(), catalog.len());
		let mut indices = HashMap::with_capacity(catalog.len());

		for m in catalog {
			let i = graph.add_node(m);
			indices.entry(m.name.as_str()).or_insert(i);
		}

		for m in catalog {
			let src = indices[m.name.as_str()];
			for (names, kind) in [(&m.dependencies, EdgeData::Depends), (&m.conflicts, EdgeData::Conflicts)] {
				for name in names {
					if let Some(&target) = indices.get(name.as_str()) {
						graph.add_edge(src, target, kind);
					} else {
						log::debug!("{:?} target {} of {} is not in the catalog, ignoring.", kind, name, m.name);
					}
				}
			}
		}

		Self { graph, indices }
	}

	pub fn node(&self, name: &str) -> Option<NodeIndex> {
		self.indices.get(name).copied()
	}

	pub fn descriptor(&self, i: NodeIndex) -> &'c ModDescriptor {
		self.graph[i]
	}

	/// Every node reachable from `start` through [`EdgeData::Depends`] edges, `start` included.
	///
	/// Cycles converge on the visited set.
	pub fn dependency_closure(&self, start: impl IntoIterator<Item = NodeIndex>) -> HashSet<NodeIndex> {
		let mut visited = HashSet::<NodeIndex>::new();
		let mut queue: VecDeque<NodeIndex> = start.into_iter().collect();

		while let Some(i) = queue.pop_front() {
			if !visited.insert(i) { continue; }
			for e in self.graph.edges_directed(i, Outgoing) {
				if let EdgeData::Depends = e.weight() {
					queue.push_back(e.target());
				}
			}
		}

		visited
	}

	/// Nodes `i` declares a conflict with.
	pub fn conflicts_of(&self, i: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
		self.graph
			.edges_directed(i, Outgoing)
			.filter(|e| matches!(e.weight(), EdgeData::Conflicts))
			.map(|e| e.target())
	}
}
