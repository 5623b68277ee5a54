use std::collections::HashSet;

use tracing::{debug, info, instrument};

use super::{RoutePair, RouteSampler, Sampled, SamplingConstraints, SamplingMode};
use crate::graph::{RoadGraph, nodes_within_hops, shortest_path};
use crate::rng::SamplerRng;

/// Intersection-to-intersection sampler using a hop-bounded neighbourhood.
///
/// Sources are visited in a seeded random order; each contributes up to
/// `neighbors_per_source` pairs with intersections reachable within
/// `max_hops` edges. Every unordered pair is emitted at most once.
pub struct NetworkSampler {
    pub constraints: SamplingConstraints,
}

impl NetworkSampler {
    pub fn new(constraints: SamplingConstraints) -> Self {
        Self { constraints }
    }
}

impl RouteSampler for NetworkSampler {
    fn mode(&self) -> SamplingMode {
        SamplingMode::Network
    }

    fn constraints(&self) -> &SamplingConstraints {
        &self.constraints
    }

    #[instrument(skip_all, fields(max_pairs = ?self.constraints.max_pairs))]
    fn generate(&self, graph: &RoadGraph, rng: &mut SamplerRng) -> Sampled {
        let c = &self.constraints;
        let mut out = Sampled::default();

        let mut sources = graph.intersections();
        info!(intersections = sources.len(), "Intersections found");
        if sources.is_empty() {
            return out;
        }
        let is_intersection: HashSet<_> = sources.iter().copied().collect();
        rng.shuffle(&mut sources);

        let mut emitted: HashSet<(u64, u64)> = HashSet::new();
        let mut too_close = 0usize;

        'sources: for &source in &sources {
            if c.is_full(out.pairs.len()) {
                break;
            }
            let mut nearby: Vec<_> = nodes_within_hops(graph, source, c.max_hops)
                .into_iter()
                .filter(|n| is_intersection.contains(n))
                .collect();
            rng.shuffle(&mut nearby);

            let mut taken = 0usize;
            for target in nearby {
                if taken >= c.neighbors_per_source {
                    break;
                }
                if c.is_full(out.pairs.len()) {
                    break 'sources;
                }

                let mut pair = RoutePair::new(
                    graph.node_ref(source),
                    graph.pos(source),
                    graph.node_ref(target),
                    graph.pos(target),
                );
                if pair.straight_line_m < c.min_distance_m {
                    too_close += 1;
                    continue;
                }
                if emitted.contains(&pair.unordered_key()) {
                    continue;
                }

                let path = match shortest_path(graph, source, target) {
                    Ok(path) => path,
                    Err(e) => {
                        debug!(error = %e, "Dropping unreachable pair");
                        out.no_path += 1;
                        continue;
                    }
                };
                pair.path_geometry = Some(
                    path.geometry(graph)
                        .into_iter()
                        .map(|p| p.lon_lat())
                        .collect(),
                );

                emitted.insert(pair.unordered_key());
                out.pairs.push(pair);
                taken += 1;
            }
        }

        info!(
            generated = out.pairs.len(),
            too_close,
            no_path = out.no_path,
            "Network route queue generated"
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::graph::{EdgeSpec, RoadGraphBuilder, fixtures};

    fn sampler(min_distance_m: f64, max_pairs: Option<usize>) -> NetworkSampler {
        NetworkSampler::new(SamplingConstraints {
            min_distance_m,
            max_pairs,
            neighbors_per_source: 4,
            max_hops: 4,
            ..Default::default()
        })
    }

    #[test]
    fn test_pairs_respect_min_distance() {
        let g = fixtures::grid();
        let out = sampler(1_000.0, None).generate(&g, &mut SamplerRng::new(1));
        assert!(!out.pairs.is_empty());
        for p in &out.pairs {
            assert!(p.straight_line_m >= 1_000.0, "{p:?}");
            assert!(p.path_geometry.as_ref().unwrap().len() >= 2);
        }
    }

    #[test]
    fn test_no_duplicate_unordered_pairs() {
        let g = fixtures::grid();
        let out = sampler(500.0, None).generate(&g, &mut SamplerRng::new(3));
        let mut keys: Vec<_> = out.pairs.iter().map(|p| p.unordered_key()).collect();
        let total = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), total);
    }

    #[test]
    fn test_max_pairs_caps_output() {
        let g = fixtures::grid();
        let out = sampler(500.0, Some(5)).generate(&g, &mut SamplerRng::new(9));
        assert_eq!(out.pairs.len(), 5);
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let g = fixtures::grid();
        let a = sampler(500.0, Some(10)).generate(&g, &mut SamplerRng::new(11));
        let b = sampler(500.0, Some(10)).generate(&g, &mut SamplerRng::new(11));
        assert_eq!(a.pairs, b.pairs);
    }

    #[test]
    fn test_empty_intersections_yield_empty_result() {
        let mut b = RoadGraphBuilder::new();
        let n0 = b.add_node(1, GeoPoint::new(0.0, 0.0));
        let n1 = b.add_node(2, GeoPoint::new(0.0, 0.1));
        b.add_road(n0, n1, EdgeSpec::default());
        let g = b.build();
        let out = sampler(0.0, None).generate(&g, &mut SamplerRng::new(1));
        assert!(out.pairs.is_empty());
    }

    #[test]
    fn test_min_distance_holds_over_random_graphs() {
        for seed in 0..20u64 {
            let mut rng = SamplerRng::new(seed);
            let mut b = RoadGraphBuilder::new();
            let nodes: Vec<_> = (0..30)
                .map(|i| {
                    let lat = rng.gen_range(-0.05..0.05);
                    let lon = rng.gen_range(-0.05..0.05);
                    b.add_node(i, GeoPoint::new(lat, lon))
                })
                .collect();
            for _ in 0..70 {
                let a = nodes[rng.gen_range(0..nodes.len())];
                let z = nodes[rng.gen_range(0..nodes.len())];
                if a != z {
                    b.add_road(a, z, EdgeSpec::default());
                }
            }
            let g = b.build();
            let min = rng.gen_range(200.0..3_000.0);
            let out = sampler(min, Some(40)).generate(&g, &mut rng);
            assert!(out.pairs.iter().all(|p| p.straight_line_m >= min));
            let mut keys: Vec<_> = out.pairs.iter().map(|p| p.unordered_key()).collect();
            let total = keys.len();
            keys.sort();
            keys.dedup();
            assert_eq!(keys.len(), total, "seed {seed}");
        }
    }
}
