//! Connected component labelling

use petgraph::unionfind::UnionFind;

use crate::graph::SocialGraph;

/// Component labels for every node plus the size of each component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentLabels {
    /// labels[i] is the component of node i
    pub labels: Vec<u32>,
    /// sizes[c] is the member count of component c
    pub sizes: Vec<usize>,
}

impl ComponentLabels {
    pub fn count(&self) -> usize {
        self.sizes.len()
    }

    pub fn largest(&self) -> usize {
        self.sizes.iter().copied().max().unwrap_or(0)
    }
}

/// Label connected components with dense ids.
///
/// Ids are assigned in order of each component's lowest node index, so the
/// labelling only depends on the graph. Isolated nodes get a component of
/// their own.
pub fn label_components(graph: &SocialGraph) -> ComponentLabels {
    let n = graph.node_count();
    let mut sets = UnionFind::<u32>::new(n);

    for src in 0..n {
        for &dst in graph.neighbors(src) {
            // each edge appears twice; one union is enough
            if (src as u32) < dst {
                sets.union(src as u32, dst);
            }
        }
    }

    let roots = sets.into_labeling();
    let mut root_to_label: Vec<Option<u32>> = vec![None; n];
    let mut labels = Vec::with_capacity(n);
    let mut sizes: Vec<usize> = Vec::new();

    for root in roots {
        let slot = &mut root_to_label[root as usize];
        let label = match *slot {
            Some(label) => label,
            None => {
                let label = sizes.len() as u32;
                sizes.push(0);
                *slot = Some(label);
                label
            }
        };
        sizes[label as usize] += 1;
        labels.push(label);
    }

    ComponentLabels { labels, sizes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    #[test]
    fn separates_components_and_singletons() {
        // 1-2, 3-4-5, 6 isolated
        let g = GraphBuilder::from_edges([1, 2, 3, 4, 5, 6], [(1, 2), (3, 4), (4, 5)]).unwrap();
        let c = label_components(&g);
        let at = |id| c.labels[g.index_of(id).unwrap()];

        assert_eq!(c.count(), 3);
        assert_eq!(at(1), at(2));
        assert_eq!(at(3), at(5));
        assert_ne!(at(1), at(3));
        assert_ne!(at(6), at(1));
        assert_ne!(at(6), at(3));
        assert_eq!(c.largest(), 3);
    }

    #[test]
    fn labels_follow_first_node_order() {
        let g = GraphBuilder::from_edges([10, 20, 30], [(20, 30)]).unwrap();
        let c = label_components(&g);
        assert_eq!(c.labels, vec![0, 1, 1]);
        assert_eq!(c.sizes, vec![1, 2]);
    }
}
