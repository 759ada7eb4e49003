//! Density-based clustering (DBSCAN semantics) over behavioral
//! vectors, geographic coordinates, or timestamps.
//!
//! Backend selection follows the capability descriptor: a
//! vector-similarity index answers neighborhood queries when present,
//! otherwise distances are computed in memory. Visitation is strictly
//! in input order and neighbor lists are index-sorted, so labels and
//! the noise set are identical across runs.

use crate::capability::BackendCapabilities;
use crate::information::{cosine_distance, haversine_km};
use crate::types::{ClusterAssignment, ClusterLabel, ClusterParams};

/// One point entering a clustering pass. All points of a pass carry the
/// same coordinate kind.
#[derive(Debug, Clone)]
pub struct ClusterPoint {
    pub entity_id: String,
    pub coord: Coord,
}

#[derive(Debug, Clone)]
pub enum Coord {
    /// Dense feature vector; cosine distance.
    Dense(Vec<f64>),
    /// WGS84 coordinates; great-circle distance in kilometers.
    Geo { lat: f64, lon: f64 },
    /// Unix timestamp; absolute delta in seconds.
    Time(i64),
}

fn distance(a: &Coord, b: &Coord) -> f64 {
    match (a, b) {
        (Coord::Dense(x), Coord::Dense(y)) => cosine_distance(x, y),
        (Coord::Geo { lat: la, lon: lo }, Coord::Geo { lat: lb, lon: lj }) => {
            haversine_km(*la, *lo, *lb, *lj)
        }
        (Coord::Time(x), Coord::Time(y)) => (*x as i128 - *y as i128).unsigned_abs() as f64,
        // Mixed kinds never cluster together.
        _ => f64::INFINITY,
    }
}

/// Neighborhood queries served by a vector-similarity index.
///
/// `neighbors_within` returns the indices of loaded points within
/// `epsilon` of point `idx` (excluding `idx`), in ascending index
/// order.
pub trait VectorIndex: Send {
    fn load(&mut self, points: &[Vec<f64>]);
    fn neighbors_within(&self, idx: usize, epsilon: f64) -> Vec<usize>;
}

enum Neighborhoods {
    /// Full pairwise distance matrix (row-major, n*n).
    Matrix { distances: Vec<f64>, n: usize },
    /// Recompute per query; used when the matrix would bust the memory
    /// budget. Same results, bounded memory.
    OnDemand,
    Index(Box<dyn VectorIndex>),
}

pub struct ClusteringEngine {
    memory_budget_bytes: usize,
    capabilities: BackendCapabilities,
}

impl ClusteringEngine {
    pub fn new(capabilities: BackendCapabilities, memory_budget_bytes: usize) -> Self {
        Self {
            memory_budget_bytes,
            capabilities,
        }
    }

    /// Estimated bytes for the in-memory distance matrix of `n` points.
    pub fn estimated_matrix_bytes(n: usize) -> u64 {
        (n as u64) * (n as u64) * std::mem::size_of::<f64>() as u64
    }

    /// Bytes the neighborhood backend will actually hold for `n`
    /// points: the full matrix when it fits the budget, otherwise one
    /// recomputed neighbor row at a time.
    pub fn planned_memory_bytes(&self, n: usize) -> u64 {
        let matrix = Self::estimated_matrix_bytes(n);
        if matrix > self.memory_budget_bytes as u64 {
            (n as u64) * std::mem::size_of::<f64>() as u64
        } else {
            matrix
        }
    }

    /// DBSCAN over `points`. A point is core when at least `min_points`
    /// *other* points lie within `epsilon`; clusters connect core
    /// points and attach border points; the rest is noise.
    pub fn cluster(
        &self,
        points: &[ClusterPoint],
        params: ClusterParams,
        index: Option<Box<dyn VectorIndex>>,
    ) -> Vec<ClusterAssignment> {
        let n = points.len();
        let neighborhoods = self.build_neighborhoods(points, index);

        const UNVISITED: i64 = -2;
        const NOISE: i64 = -1;
        let mut labels = vec![UNVISITED; n];
        let mut next_cluster: i64 = 0;

        for i in 0..n {
            if labels[i] != UNVISITED {
                continue;
            }
            let neighbors = self.neighbors(&neighborhoods, points, i, params.epsilon);
            if neighbors.len() < params.min_points {
                labels[i] = NOISE;
                continue;
            }

            let cluster = next_cluster;
            next_cluster += 1;
            labels[i] = cluster;

            // Seed queue expansion in deterministic (index) order.
            let mut queue: Vec<usize> = neighbors;
            let mut cursor = 0;
            while cursor < queue.len() {
                let j = queue[cursor];
                cursor += 1;

                if labels[j] == NOISE {
                    labels[j] = cluster; // border point
                }
                if labels[j] != UNVISITED {
                    continue;
                }
                labels[j] = cluster;

                let j_neighbors = self.neighbors(&neighborhoods, points, j, params.epsilon);
                if j_neighbors.len() >= params.min_points {
                    queue.extend(j_neighbors);
                }
            }
        }

        points
            .iter()
            .zip(&labels)
            .map(|(point, &label)| ClusterAssignment {
                entity_id: point.entity_id.clone(),
                label: if label < 0 {
                    ClusterLabel::Noise
                } else {
                    ClusterLabel::Member(label as u32)
                },
                params,
            })
            .collect()
    }

    fn build_neighborhoods(
        &self,
        points: &[ClusterPoint],
        index: Option<Box<dyn VectorIndex>>,
    ) -> Neighborhoods {
        if self.capabilities.vector_backed {
            if let Some(mut index) = index {
                let dense: Option<Vec<Vec<f64>>> = points
                    .iter()
                    .map(|p| match &p.coord {
                        Coord::Dense(v) if v.len() <= self.capabilities.max_dimension => {
                            Some(v.clone())
                        }
                        _ => None,
                    })
                    .collect();
                // Only dense vectors within the index dimension bound go
                // through the index; otherwise fall back in memory.
                if let Some(dense) = dense {
                    index.load(&dense);
                    return Neighborhoods::Index(index);
                }
            }
        }

        let n = points.len();
        if Self::estimated_matrix_bytes(n) > self.memory_budget_bytes as u64 {
            return Neighborhoods::OnDemand;
        }

        let mut distances = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = distance(&points[i].coord, &points[j].coord);
                distances[i * n + j] = d;
                distances[j * n + i] = d;
            }
        }
        Neighborhoods::Matrix { distances, n }
    }

    fn neighbors(
        &self,
        neighborhoods: &Neighborhoods,
        points: &[ClusterPoint],
        idx: usize,
        epsilon: f64,
    ) -> Vec<usize> {
        match neighborhoods {
            Neighborhoods::Matrix { distances, n } => (0..*n)
                .filter(|&j| j != idx && distances[idx * n + j] <= epsilon)
                .collect(),
            Neighborhoods::OnDemand => (0..points.len())
                .filter(|&j| j != idx && distance(&points[idx].coord, &points[j].coord) <= epsilon)
                .collect(),
            Neighborhoods::Index(index) => {
                let mut out = index.neighbors_within(idx, epsilon);
                out.retain(|&j| j != idx);
                out.sort_unstable();
                out
            }
        }
    }
}
