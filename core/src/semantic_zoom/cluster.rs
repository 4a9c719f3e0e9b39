//! Position based clustering of zoomable objects.
//!
//! Both algorithms are deterministic for a given input order so repeated
//! decisions over an unchanged scene produce the same buckets.

use cgmath::{EuclideanSpace, MetricSpace, Point3, Vector3, Zero};
use rayon::prelude::*;

use crate::error::ClusterError;

/// A group of points around a centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub centroid: Point3<f32>,
    /// Indices into the clustered point slice, ascending.
    pub members: Vec<usize>,
    /// Distance from the centroid to the farthest member.
    pub radius: f32,
}

impl Cluster {
    fn from_members(points: &[Point3<f32>], members: Vec<usize>) -> Self {
        let centroid = mean(members.iter().map(|&i| points[i]));
        let radius = members
            .iter()
            .map(|&i| centroid.distance(points[i]))
            .fold(0.0, f32::max);
        Self {
            centroid,
            members,
            radius,
        }
    }
}

fn mean(points: impl Iterator<Item = Point3<f32>>) -> Point3<f32> {
    let (sum, count) = points.fold((Vector3::zero(), 0usize), |(sum, count), p| (sum + p.to_vec(), count + 1));
    if count == 0 {
        Point3::origin()
    } else {
        Point3::from_vec(sum / count as f32)
    }
}

fn nearest(centroids: &[Point3<f32>], point: Point3<f32>) -> usize {
    let mut best = 0;
    let mut best_distance = f32::INFINITY;
    for (index, centroid) in centroids.iter().enumerate() {
        let distance = centroid.distance2(point);
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    best
}

/// Splits points into `k` clusters with Lloyd's algorithm.
///
/// Centroids start at the first point and then at the point farthest from
/// all centroids chosen so far. Clusters that end up empty are dropped.
///
/// # Arguments
/// * `points` - Positions to cluster
/// * `k` - Number of clusters, at most `points.len()`
/// * `max_iterations` - Upper bound on assignment rounds
pub fn k_means(points: &[Point3<f32>], k: usize, max_iterations: usize) -> Result<Vec<Cluster>, ClusterError> {
    if points.is_empty() {
        return Err(ClusterError::EmptyDataset);
    }
    if k == 0 {
        return Err(ClusterError::InvalidParameter("k must be at least 1"));
    }
    if points.len() < k {
        return Err(ClusterError::TooFewPoints {
            points: points.len(),
            clusters: k,
        });
    }

    let mut centroids = vec![points[0]];
    while centroids.len() < k {
        let mut farthest = 0;
        let mut farthest_distance = -1.0;
        for (index, &point) in points.iter().enumerate() {
            let distance = centroids[nearest(&centroids, point)].distance2(point);
            if distance > farthest_distance {
                farthest = index;
                farthest_distance = distance;
            }
        }
        centroids.push(points[farthest]);
    }

    let mut assignment = vec![usize::MAX; points.len()];
    for _ in 0..max_iterations.max(1) {
        let next: Vec<usize> = points.iter().map(|&p| nearest(&centroids, p)).collect();
        if next == assignment {
            break;
        }
        assignment = next;

        for (cluster, centroid) in centroids.iter_mut().enumerate() {
            let members = points
                .iter()
                .zip(&assignment)
                .filter(|&(_, &a)| a == cluster)
                .map(|(&p, _)| p);
            let mut members = members.peekable();
            if members.peek().is_some() {
                *centroid = mean(members);
            }
        }
    }

    let mut buckets = vec![Vec::new(); k];
    for (index, &cluster) in assignment.iter().enumerate() {
        buckets[cluster].push(index);
    }
    Ok(buckets
        .into_iter()
        .filter(|members| !members.is_empty())
        .map(|members| Cluster::from_members(points, members))
        .collect())
}

/// Groups points around the modes of their density with a flat kernel.
///
/// Every point climbs to the mean of the input points within `bandwidth`
/// until it moves less than a thousandth of the bandwidth. Modes closer than
/// half the bandwidth share a cluster.
pub fn mean_shift(points: &[Point3<f32>], bandwidth: f32, max_iterations: usize) -> Result<Vec<Cluster>, ClusterError> {
    if points.is_empty() {
        return Err(ClusterError::EmptyDataset);
    }
    if !(bandwidth.is_finite() && bandwidth > 0.0) {
        return Err(ClusterError::InvalidParameter("bandwidth must be positive"));
    }

    let bandwidth2 = bandwidth * bandwidth;
    let tolerance = bandwidth * 1e-3;
    let mut modes = points.to_vec();

    for _ in 0..max_iterations {
        let shifted: Vec<Point3<f32>> = modes
            .par_iter()
            .map(|&mode| {
                let window = points.iter().copied().filter(|p| p.distance2(mode) <= bandwidth2);
                let mut window = window.peekable();
                if window.peek().is_some() {
                    mean(window)
                } else {
                    mode
                }
            })
            .collect();

        let max_shift = modes
            .iter()
            .zip(&shifted)
            .map(|(a, b)| a.distance(*b))
            .fold(0.0, f32::max);
        modes = shifted;
        if max_shift < tolerance {
            break;
        }
    }

    let merge_distance = bandwidth / 2.0;
    let mut centers: Vec<Point3<f32>> = Vec::new();
    let mut buckets: Vec<Vec<usize>> = Vec::new();
    for (index, &mode) in modes.iter().enumerate() {
        match centers.iter().position(|c| c.distance(mode) <= merge_distance) {
            Some(cluster) => buckets[cluster].push(index),
            None => {
                centers.push(mode);
                buckets.push(vec![index]);
            }
        }
    }

    Ok(buckets
        .into_iter()
        .map(|members| Cluster::from_members(points, members))
        .collect())
}
