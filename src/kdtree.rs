use arrayvec::ArrayVec;

use crate::{bounds::Bounds3f, intersection::Intersection, ray::Ray, triangle::Triangle, Float};

/// Subtrees with at most this many triangles become leaves.
const MAX_LEAF_TRIANGLES: usize = 12;
/// Extra depth allowed past `ceil(log2(n))`.
const DEPTH_SLACK: usize = 8;
/// Traversal stack capacity; comfortably above any reachable tree depth.
const TRAVERSAL_STACK: usize = 64;

#[derive(Debug)]
enum KdNode {
    Leaf {
        triangles: Vec<u32>,
    },
    Interior {
        axis: usize,
        split: Float,
        children: [u32; 2],
    },
}

/// Axis-aligned BSP over the scene's triangles. Built once at scene commit;
/// all queries are read-only and safe to share across render workers.
///
/// Split axis is the longest extent of the node bounds and the split plane
/// sits at the median triangle centroid. Triangles whose bounds straddle the
/// plane are referenced from both children, so leaf lists may overlap.
#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    bounds: Bounds3f,
}

impl KdTree {
    pub fn build(triangles: &[Triangle]) -> KdTree {
        let tri_bounds: Vec<Bounds3f> = triangles.iter().map(|t| t.bounds()).collect();
        let bounds = tri_bounds
            .iter()
            .fold(Bounds3f::EMPTY, |acc, b| acc.union(b));
        let max_depth = if triangles.is_empty() {
            0
        } else {
            (triangles.len() as Float).log2().ceil() as usize + DEPTH_SLACK
        };

        let mut nodes = Vec::new();
        let all: Vec<u32> = (0..triangles.len() as u32).collect();
        Self::build_node(&mut nodes, all, bounds, 0, max_depth, triangles, &tri_bounds);
        KdTree { nodes, bounds }
    }

    pub fn bounds(&self) -> Bounds3f {
        self.bounds
    }

    fn build_node(
        nodes: &mut Vec<KdNode>,
        indices: Vec<u32>,
        bounds: Bounds3f,
        depth: usize,
        max_depth: usize,
        triangles: &[Triangle],
        tri_bounds: &[Bounds3f],
    ) -> u32 {
        if indices.len() <= MAX_LEAF_TRIANGLES || depth >= max_depth {
            nodes.push(KdNode::Leaf { triangles: indices });
            return (nodes.len() - 1) as u32;
        }

        let axis = bounds.longest_axis();
        let mut centroids: Vec<Float> = indices
            .iter()
            .map(|&i| triangles[i as usize].centroid()[axis])
            .collect();
        centroids.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let split = centroids[centroids.len() / 2];

        let left: Vec<u32> = indices
            .iter()
            .copied()
            .filter(|&i| tri_bounds[i as usize].min[axis] <= split)
            .collect();
        let right: Vec<u32> = indices
            .iter()
            .copied()
            .filter(|&i| tri_bounds[i as usize].max[axis] >= split)
            .collect();

        // The split made no progress (everything straddles); stop here.
        if left.len() == indices.len() && right.len() == indices.len() {
            nodes.push(KdNode::Leaf { triangles: indices });
            return (nodes.len() - 1) as u32;
        }

        let mut left_bounds = bounds;
        left_bounds.max[axis] = split;
        let mut right_bounds = bounds;
        right_bounds.min[axis] = split;

        let index = nodes.len();
        nodes.push(KdNode::Leaf {
            triangles: Vec::new(),
        });
        let l = Self::build_node(
            nodes,
            left,
            left_bounds,
            depth + 1,
            max_depth,
            triangles,
            tri_bounds,
        );
        let r = Self::build_node(
            nodes,
            right,
            right_bounds,
            depth + 1,
            max_depth,
            triangles,
            tri_bounds,
        );
        nodes[index] = KdNode::Interior {
            axis,
            split,
            children: [l, r],
        };
        index as u32
    }

    /// Closest hit along the ray, or a miss.
    pub fn find_closest(&self, triangles: &[Triangle], ray: &Ray) -> Intersection {
        self.closest(triangles, ray, None, None)
    }

    /// Closest hit, ignoring one triangle. Used when spawning secondary rays
    /// exactly on a surface to avoid self-intersection.
    pub fn find_closest_excluding(
        &self,
        triangles: &[Triangle],
        ray: &Ray,
        exclude: Option<u32>,
    ) -> Intersection {
        self.closest(triangles, ray, exclude, None)
    }

    /// Closest hit among non-thin-glass triangles; every thin-glass triangle
    /// crossed on the way is recorded in the result together with its `t`.
    pub fn find_closest_collecting_thinglass(
        &self,
        triangles: &[Triangle],
        ray: &Ray,
        exclude: Option<u32>,
        is_thinglass: &dyn Fn(u32) -> bool,
    ) -> Intersection {
        self.closest(triangles, ray, exclude, Some(is_thinglass))
    }

    fn closest(
        &self,
        triangles: &[Triangle],
        ray: &Ray,
        exclude: Option<u32>,
        is_thinglass: Option<&dyn Fn(u32) -> bool>,
    ) -> Intersection {
        let mut best = Intersection::miss();
        let mut thin: Vec<(u32, Float)> = Vec::new();

        let span = self.bounds.intersect_interval(ray, ray.near, ray.far);
        let Some((t0, t1)) = span else {
            return best;
        };

        let mut stack: ArrayVec<(u32, Float, Float), TRAVERSAL_STACK> = ArrayVec::new();
        let mut current = Some((0u32, t0, t1));

        loop {
            let (node, tmin, tmax) = match current.take().or_else(|| stack.pop()) {
                Some(entry) => entry,
                None => break,
            };
            // Everything in this subtree is behind the best hit already found.
            if best.t < tmin {
                continue;
            }
            match &self.nodes[node as usize] {
                KdNode::Leaf { triangles: tris } => {
                    for &ti in tris {
                        if exclude == Some(ti) {
                            continue;
                        }
                        if let Some((t, a, b)) = triangles[ti as usize].intersect(ray) {
                            if let Some(is_thinglass) = is_thinglass {
                                if is_thinglass(ti) {
                                    thin.push((ti, t));
                                    continue;
                                }
                            }
                            if t < best.t {
                                best = Intersection {
                                    triangle: Some(ti),
                                    t,
                                    a,
                                    b,
                                    thinglass: Vec::new(),
                                };
                            }
                        }
                    }
                }
                KdNode::Interior {
                    axis,
                    split,
                    children,
                } => {
                    let o = ray.origin[*axis];
                    let d = ray.direction[*axis];
                    if d == 0.0 {
                        // Parallel to the split plane; the ray stays on one side.
                        let child = if o <= *split { children[0] } else { children[1] };
                        current = Some((child, tmin, tmax));
                        continue;
                    }
                    let below_first = o < *split || (o == *split && d <= 0.0);
                    let (near, far) = if below_first {
                        (children[0], children[1])
                    } else {
                        (children[1], children[0])
                    };
                    let t_split = (*split - o) / d;
                    if t_split > tmax || t_split <= 0.0 {
                        current = Some((near, tmin, tmax));
                    } else if t_split < tmin {
                        current = Some((far, tmin, tmax));
                    } else {
                        stack.push((far, t_split, tmax));
                        current = Some((near, tmin, t_split));
                    }
                }
            }
        }

        // Straddling triangles live in both children, so a thin-glass pane
        // past the closest opaque hit can sneak into the list; drop those.
        thin.retain(|&(_, t)| t <= best.t);
        best.thinglass = thin;
        best
    }

    /// First triangle hit in `(near, far)`, in no particular order.
    /// Early-exits on the first hit; used for shadow rays.
    pub fn any_hit(&self, triangles: &[Triangle], ray: &Ray) -> Option<u32> {
        if self
            .bounds
            .intersect_interval(ray, ray.near, ray.far)
            .is_none()
        {
            return None;
        }
        let mut stack: ArrayVec<u32, TRAVERSAL_STACK> = ArrayVec::new();
        stack.push(0);
        while let Some(node) = stack.pop() {
            match &self.nodes[node as usize] {
                KdNode::Leaf { triangles: tris } => {
                    for &ti in tris {
                        if triangles[ti as usize].intersect(ray).is_some() {
                            return Some(ti);
                        }
                    }
                }
                KdNode::Interior {
                    axis,
                    split,
                    children,
                } => {
                    let o = ray.origin[*axis];
                    let d = ray.direction[*axis];
                    // Conservative descent: visit any child whose halfspace the
                    // segment can touch.
                    let reach_min = o + d * ray.near.min(ray.far);
                    let reach_max = o + d * ray.far.max(ray.near);
                    let (lo, hi) = if reach_min <= reach_max {
                        (reach_min, reach_max)
                    } else {
                        (reach_max, reach_min)
                    };
                    if lo <= *split {
                        stack.push(children[0]);
                    }
                    if hi >= *split {
                        stack.push(children[1]);
                    }
                }
            }
        }
        None
    }

    /// Union of all leaf triangle lists, deduplicated.
    pub fn leaf_triangle_indices(&self) -> Vec<u32> {
        let mut all: Vec<u32> = self
            .nodes
            .iter()
            .filter_map(|n| match n {
                KdNode::Leaf { triangles } => Some(triangles.iter().copied()),
                _ => None,
            })
            .flatten()
            .collect();
        all.sort_unstable();
        all.dedup();
        all
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    use super::*;

    fn random_triangle(rng: &mut SmallRng) -> Triangle {
        let base = Vec3::new(
            rng.gen_range(-5.0..5.0),
            rng.gen_range(-5.0..5.0),
            rng.gen_range(-5.0..5.0),
        );
        let e = |rng: &mut SmallRng| {
            Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            )
        };
        Triangle {
            positions: [base, base + e(rng), base + e(rng)],
            normals: [Vec3::Z; 3],
            tangents: [Vec3::X; 3],
            uvs: [Vec2::ZERO; 3],
            material: 0,
        }
    }

    fn random_soup(seed: u64, count: usize) -> Vec<Triangle> {
        let mut rng = SmallRng::seed_from_u64(seed);
        (0..count)
            .map(|_| random_triangle(&mut rng))
            .filter(|t| t.area() > 1e-6)
            .collect()
    }

    fn brute_force(triangles: &[Triangle], ray: &Ray) -> Option<(u32, Float)> {
        let mut best: Option<(u32, Float)> = None;
        for (i, tri) in triangles.iter().enumerate() {
            if let Some((t, _, _)) = tri.intersect(ray) {
                if best.map_or(true, |(_, bt)| t < bt) {
                    best = Some((i as u32, t));
                }
            }
        }
        best
    }

    #[test]
    fn leaves_cover_all_triangles() {
        let soup = random_soup(7, 300);
        let tree = KdTree::build(&soup);
        let covered = tree.leaf_triangle_indices();
        assert_eq!(covered, (0..soup.len() as u32).collect::<Vec<_>>());
    }

    #[test]
    fn closest_matches_brute_force() {
        let soup = random_soup(11, 400);
        let tree = KdTree::build(&soup);
        let mut rng = SmallRng::seed_from_u64(13);
        for _ in 0..500 {
            let origin = Vec3::new(
                rng.gen_range(-8.0..8.0),
                rng.gen_range(-8.0..8.0),
                rng.gen_range(-8.0..8.0),
            );
            let dir = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            if dir.length() < 1e-3 {
                continue;
            }
            let ray = Ray::new(origin, dir);
            let isect = tree.find_closest(&soup, &ray);
            let reference = brute_force(&soup, &ray);
            match (isect.triangle, reference) {
                (None, None) => {}
                (Some(_), Some((_, rt))) => {
                    assert!(
                        (isect.t - rt).abs() < 1e-4,
                        "kd t {} vs brute {}",
                        isect.t,
                        rt
                    );
                }
                (kd, brute) => panic!("kd {:?} disagrees with brute force {:?}", kd, brute),
            }
        }
    }

    #[test]
    fn any_hit_agrees_as_boolean() {
        let soup = random_soup(17, 250);
        let tree = KdTree::build(&soup);
        let mut rng = SmallRng::seed_from_u64(19);
        for _ in 0..300 {
            let origin = Vec3::new(
                rng.gen_range(-8.0..8.0),
                rng.gen_range(-8.0..8.0),
                rng.gen_range(-8.0..8.0),
            );
            let dir = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            if dir.length() < 1e-3 {
                continue;
            }
            let ray = Ray::new(origin, dir);
            assert_eq!(
                tree.any_hit(&soup, &ray).is_some(),
                brute_force(&soup, &ray).is_some()
            );
        }
    }

    #[test]
    fn excluding_skips_the_named_triangle() {
        let tri = |z: Float| Triangle {
            positions: [
                Vec3::new(-1.0, -1.0, z),
                Vec3::new(1.0, -1.0, z),
                Vec3::new(0.0, 1.0, z),
            ],
            normals: [Vec3::Z; 3],
            tangents: [Vec3::X; 3],
            uvs: [Vec2::ZERO; 3],
            material: 0,
        };
        let soup = vec![tri(1.0), tri(2.0)];
        let tree = KdTree::build(&soup);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 0.0), Vec3::Z);
        let hit = tree.find_closest_excluding(&soup, &ray, Some(0));
        assert_eq!(hit.triangle, Some(1));
        assert!((hit.t - 2.0).abs() < 1e-5);
    }

    #[test]
    fn collecting_reports_crossed_panes() {
        let tri = |z: Float| Triangle {
            positions: [
                Vec3::new(-2.0, -2.0, z),
                Vec3::new(2.0, -2.0, z),
                Vec3::new(0.0, 2.0, z),
            ],
            normals: [Vec3::Z; 3],
            tangents: [Vec3::X; 3],
            uvs: [Vec2::ZERO; 3],
            material: 0,
        };
        // Two panes in front of an opaque wall, one pane behind it.
        let soup = vec![tri(1.0), tri(2.0), tri(3.0), tri(4.0)];
        let tree = KdTree::build(&soup);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        let opaque = 2u32;
        let isect = tree.find_closest_collecting_thinglass(&soup, &ray, None, &|i| i != opaque);
        assert_eq!(isect.triangle, Some(opaque));
        let mut crossed: Vec<u32> = isect.thinglass.iter().map(|&(i, _)| i).collect();
        crossed.sort_unstable();
        assert_eq!(crossed, vec![0, 1]);
    }

    #[test]
    fn empty_tree_always_misses() {
        let tree = KdTree::build(&[]);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        assert!(!tree.find_closest(&[], &ray).is_hit());
        assert!(tree.any_hit(&[], &ray).is_none());
    }
}
