/// Trait for types that can be located in N-dimensional Cartesian space.
pub trait KdPoint<const N: usize> {
    fn point(&self) -> [f64; N];
}

/// Axis-aligned KD-Tree node storing a single item index and optional children.
#[derive(Debug, Clone)]
pub struct KdNode {
    pub axis: u8,
    pub point_index: usize,
    pub left: Option<usize>,
    pub right: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct KdTree<T, const N: usize>
where
    T: KdPoint<N>,
{
    pub items: Vec<T>,
    pub nodes: Vec<KdNode>,
    pub root: Option<usize>,
}

impl<T, const N: usize> KdTree<T, N>
where
    T: KdPoint<N>,
{
    pub fn build(items: Vec<T>) -> Self {
        if items.is_empty() {
            return Self {
                items,
                nodes: Vec::new(),
                root: None,
            };
        }

        assert!(N > 0, "KDTree dimension must be greater than zero");

        let mut indices: Vec<usize> = (0..items.len()).collect();
        let mut builder = TreeBuilder::new(&items);
        let root = builder.build_recursive(&mut indices, 0);
        let nodes = builder.nodes;

        Self { items, nodes, root }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find the closest item to the provided query point.
    /// Returns the item index and Euclidean distance.
    ///
    /// Among items at exactly the same distance the lowest index wins,
    /// which is what a linear scan over `items` would report.
    pub fn nearest_neighbor(&self, query_point: [f64; N]) -> Option<(usize, f64)> {
        self.nearest_where(query_point, |_| true)
    }

    /// Nearest item whose index satisfies `accept`.
    pub fn nearest_where<F>(&self, query_point: [f64; N], accept: F) -> Option<(usize, f64)>
    where
        F: Fn(usize) -> bool,
    {
        let root = self.root?;
        let mut best = NearestMatch {
            index: None,
            dist2: f64::INFINITY,
        };

        self.nearest_recursive(root, &query_point, &accept, &mut best);
        best.index.map(|idx| (idx, best.dist2.sqrt()))
    }

    fn nearest_recursive<F>(
        &self,
        node_idx: usize,
        query_point: &[f64; N],
        accept: &F,
        best: &mut NearestMatch,
    ) where
        F: Fn(usize) -> bool,
    {
        let node = &self.nodes[node_idx];
        let point = self.items[node.point_index].point();
        if accept(node.point_index) {
            let dist2 = squared_distance(&point, query_point);
            if best.improves(node.point_index, dist2) {
                best.dist2 = dist2;
                best.index = Some(node.point_index);
            }
        }

        let axis = node.axis as usize;
        let diff = query_point[axis] - point[axis];
        let (near, far) = if diff <= 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = near {
            self.nearest_recursive(child, query_point, accept, best);
        }

        // Equal-distance items on the far side may still win on index
        if diff * diff <= best.dist2 {
            if let Some(child) = far {
                self.nearest_recursive(child, query_point, accept, best);
            }
        }
    }
}

struct NearestMatch {
    index: Option<usize>,
    dist2: f64,
}

impl NearestMatch {
    fn improves(&self, index: usize, dist2: f64) -> bool {
        match self.index {
            None => true,
            Some(current) => dist2 < self.dist2 || (dist2 == self.dist2 && index < current),
        }
    }
}

fn squared_distance<const N: usize>(a: &[f64; N], b: &[f64; N]) -> f64 {
    let mut sum = 0.0;
    for axis in 0..N {
        let diff = a[axis] - b[axis];
        sum += diff * diff;
    }
    sum
}

struct TreeBuilder<'a, T, const N: usize>
where
    T: KdPoint<N>,
{
    items: &'a [T],
    nodes: Vec<KdNode>,
}

impl<'a, T, const N: usize> TreeBuilder<'a, T, N>
where
    T: KdPoint<N>,
{
    fn new(items: &'a [T]) -> Self {
        Self {
            items,
            nodes: Vec::with_capacity(items.len()),
        }
    }

    fn build_recursive(&mut self, indices: &mut [usize], depth: usize) -> Option<usize> {
        if indices.is_empty() {
            return None;
        }

        let axis = (depth % N) as u8;
        indices.sort_unstable_by(|a, b| {
            let lhs = self.items[*a].point()[axis as usize];
            let rhs = self.items[*b].point()[axis as usize];
            lhs.total_cmp(&rhs)
        });

        let median = indices.len() / 2;
        let (left_slice, rest) = indices.split_at_mut(median);
        let (median_idx_slice, right_slice) = rest.split_first_mut()?;
        let point_index = *median_idx_slice;

        let node_index = self.nodes.len();
        self.nodes.push(KdNode {
            axis,
            point_index,
            left: None,
            right: None,
        });

        let left = self.build_recursive(left_slice, depth + 1);
        let right = self.build_recursive(right_slice, depth + 1);
        self.nodes[node_index].left = left;
        self.nodes[node_index].right = right;
        Some(node_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SkyPosition;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn brute_nearest(items: &[SkyPosition], query: &SkyPosition) -> (usize, f64) {
        let mut best = (0, f64::INFINITY);
        for (i, item) in items.iter().enumerate() {
            let d = item.separation(query);
            if d < best.1 {
                best = (i, d);
            }
        }
        best
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTree::<SkyPosition, 2>::build(Vec::new());
        assert!(tree.is_empty());
        assert!(tree.nearest_neighbor([0.0, 0.0]).is_none());
    }

    #[test]
    fn test_nearest_matches_linear_scan() {
        let mut rng = SmallRng::seed_from_u64(42);
        let items: Vec<SkyPosition> = (0..500)
            .map(|_| SkyPosition::new(rng.random_range(0.0..1.0), rng.random_range(0.0..1.0)))
            .collect();
        let tree = KdTree::build(items.clone());

        for _ in 0..200 {
            let q = SkyPosition::new(rng.random_range(-0.1..1.1), rng.random_range(-0.1..1.1));
            let (idx, dist) = tree.nearest_neighbor([q.alpha, q.delta]).expect("non-empty");
            let (bidx, bdist) = brute_nearest(&items, &q);
            assert_eq!(idx, bidx);
            assert!((dist - bdist).abs() < 1e-12);
        }
    }

    #[test]
    fn test_equidistant_ties_pick_lowest_index() {
        // Four points on a square around the origin, plus duplicates
        let items = vec![
            SkyPosition::new(1.0, 0.0),
            SkyPosition::new(0.0, 1.0),
            SkyPosition::new(-1.0, 0.0),
            SkyPosition::new(0.0, -1.0),
            SkyPosition::new(1.0, 0.0),
        ];
        let tree = KdTree::build(items);
        let (idx, dist) = tree.nearest_neighbor([0.0, 0.0]).expect("non-empty");
        assert_eq!(idx, 0);
        assert_eq!(dist, 1.0);
    }

    #[test]
    fn test_nearest_where_skips_rejected() {
        let items = vec![
            SkyPosition::new(0.0, 0.0),
            SkyPosition::new(0.5, 0.0),
            SkyPosition::new(3.0, 0.0),
        ];
        let tree = KdTree::build(items);
        let (idx, dist) = tree
            .nearest_where([0.0, 0.0], |i| i != 0)
            .expect("has candidates");
        assert_eq!(idx, 1);
        assert_eq!(dist, 0.5);
        assert!(tree.nearest_where([0.0, 0.0], |_| false).is_none());
    }
}
