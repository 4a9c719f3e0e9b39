use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use cgmath::{MetricSpace, Point3};
use codecity_scene::ZoomCamera;
use serde::{Deserialize, Serialize};

use crate::error::ClusterError;
use crate::semantic_zoom::appearance::{ObjectId, ReleasedResource};
use crate::semantic_zoom::cluster::{k_means, mean_shift, Cluster};
use crate::semantic_zoom::zoomable::{ZoomLevel, ZoomableObject};

/// Slot of a registered object in the manager.
pub type ZoomId = usize;

/// A zoomable object shared between its renderer and the manager.
pub type SharedZoomable = Rc<RefCell<dyn ZoomableObject>>;

/// Registered objects currently holding each child, kept for one decision pass.
type ChildOwners = HashMap<ObjectId, Vec<ZoomId>>;

/// Camera distance thresholds, expected in descending order.
///
/// The level for a distance is the number of leading thresholds the distance
/// falls below, so with `[80, 40]` anything at 80 or farther shows level 0,
/// anything closer than 40 shows level 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoomLevelTable {
    thresholds: Vec<f32>,
}

impl Default for ZoomLevelTable {
    fn default() -> Self {
        Self {
            thresholds: vec![80.0, 40.0],
        }
    }
}

impl ZoomLevelTable {
    /// Builds a table, logging a warning if the thresholds are not descending.
    pub fn new(thresholds: Vec<f32>) -> Self {
        let table = Self { thresholds };
        table.warn_if_invalid();
        table
    }

    pub fn thresholds(&self) -> &[f32] {
        &self.thresholds
    }

    /// Highest level the table can produce.
    pub fn max_level(&self) -> ZoomLevel {
        self.thresholds.len()
    }

    pub fn level_for_distance(&self, distance: f32) -> ZoomLevel {
        self.thresholds.iter().take_while(|&&threshold| distance < threshold).count()
    }

    /// Returns the index of the first threshold that is not below its predecessor.
    pub fn validate(&self) -> Result<(), usize> {
        match self.thresholds.windows(2).position(|pair| pair[1] >= pair[0]) {
            Some(index) => Err(index + 1),
            None => Ok(()),
        }
    }

    fn warn_if_invalid(&self) {
        if let Err(index) = self.validate() {
            log::warn!(
                "Zoom distance thresholds are not descending at index {}: {:?}",
                index,
                self.thresholds
            );
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClusterAlgorithm {
    KMeans { k: usize, max_iterations: usize },
    MeanShift { bandwidth: f32, max_iterations: usize },
}

impl Default for ClusterAlgorithm {
    fn default() -> Self {
        ClusterAlgorithm::MeanShift {
            bandwidth: 20.0,
            max_iterations: 50,
        }
    }
}

impl ClusterAlgorithm {
    /// Runs the algorithm. With k-means, `k` is capped at the number of points.
    pub fn run(&self, points: &[Point3<f32>]) -> Result<Vec<Cluster>, ClusterError> {
        match *self {
            ClusterAlgorithm::KMeans { k, max_iterations } => k_means(points, k.min(points.len()), max_iterations),
            ClusterAlgorithm::MeanShift {
                bandwidth,
                max_iterations,
            } => mean_shift(points, bandwidth, max_iterations),
        }
    }
}

/// How the per-frame decision measures camera distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecisionMode {
    /// Distance to each object.
    PerObject,
    /// Distance to the centroid of each object's cluster.
    Clustered(ClusterAlgorithm),
}

impl Default for DecisionMode {
    fn default() -> Self {
        DecisionMode::Clustered(ClusterAlgorithm::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticZoomConfig {
    pub levels: ZoomLevelTable,
    pub mode: DecisionMode,
    /// Restore the original appearance before applying a level above 0.
    pub restore_first: bool,
    /// Skip objects and clusters outside the view frustum.
    pub frustum_culling: bool,
}

impl Default for SemanticZoomConfig {
    fn default() -> Self {
        Self {
            levels: ZoomLevelTable::default(),
            mode: DecisionMode::default(),
            restore_first: true,
            frustum_culling: true,
        }
    }
}

/// Drives appearance levels of registered objects from the camera distance.
///
/// One manager serves one visualization session and is passed explicitly to
/// whoever registers objects. It keeps strong references to everything
/// registered: call [`reset`](Self::reset) when the session ends or the
/// landscape changes.
pub struct SemanticZoomManager {
    config: SemanticZoomConfig,
    objects: Vec<Option<SharedZoomable>>,
    clusters: Vec<Cluster>,
    clusters_dirty: bool,
    enabled: bool,
    released: Vec<ReleasedResource>,
}

impl Default for SemanticZoomManager {
    fn default() -> Self {
        Self::new(SemanticZoomConfig::default())
    }
}

impl SemanticZoomManager {
    pub fn new(config: SemanticZoomConfig) -> Self {
        config.levels.warn_if_invalid();
        Self {
            config,
            objects: Vec::new(),
            clusters: Vec::new(),
            clusters_dirty: true,
            enabled: true,
            released: Vec::new(),
        }
    }

    // ========== Registration ==========

    pub fn register(&mut self, object: SharedZoomable) -> ZoomId {
        self.objects.push(Some(object));
        self.clusters_dirty = true;
        self.objects.len() - 1
    }

    /// Removes an object. Its slot id is not reused.
    pub fn unregister(&mut self, id: ZoomId) -> Option<SharedZoomable> {
        let object = self.objects.get_mut(id)?.take()?;
        if let Ok(mut zoomable) = object.try_borrow_mut() {
            self.released.extend(zoomable.take_released_resources());
        }
        self.clusters_dirty = true;
        Some(object)
    }

    /// Drops every registration, cluster and pending released resource.
    ///
    /// Objects keep their current appearance.
    pub fn reset(&mut self) {
        log::debug!("Resetting semantic zoom with {} objects", self.len());
        self.objects.clear();
        self.clusters.clear();
        self.clusters_dirty = true;
        self.released.clear();
        self.enabled = true;
    }

    /// Marks clusters stale, e.g. after objects moved.
    pub fn invalidate_clusters(&mut self) {
        self.clusters_dirty = true;
    }

    // ========== Configuration ==========

    pub fn config(&self) -> &SemanticZoomConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SemanticZoomConfig) {
        config.levels.warn_if_invalid();
        self.config = config;
        self.clusters_dirty = true;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabling returns every object to level 0. Returns the number of objects switched.
    pub fn set_enabled(&mut self, enabled: bool) -> usize {
        if self.enabled == enabled {
            return 0;
        }
        self.enabled = enabled;
        if enabled {
            0
        } else {
            self.force_level(0)
        }
    }

    // ========== Decisions ==========

    /// Recomputes clusters from the current object positions.
    ///
    /// Clusters stay stale after an error, so the next decision retries.
    pub fn recluster(&mut self) -> Result<(), ClusterError> {
        self.clusters.clear();

        let DecisionMode::Clustered(algorithm) = &self.config.mode else {
            self.clusters_dirty = false;
            return Ok(());
        };
        let (ids, points): (Vec<ZoomId>, Vec<Point3<f32>>) = self
            .live_objects()
            .filter_map(|(id, object)| object.try_borrow().ok().map(|o| (id, o.world_position())))
            .unzip();
        if points.is_empty() {
            self.clusters_dirty = false;
            return Ok(());
        }

        let mut clusters = algorithm.run(&points).inspect_err(|e| {
            log::error!("Clustering {} objects failed: {}", points.len(), e);
        })?;
        for cluster in &mut clusters {
            for member in &mut cluster.members {
                *member = ids[*member];
            }
        }
        self.clusters = clusters;
        self.clusters_dirty = false;
        Ok(())
    }

    /// Clusters of the last decision; members are [`ZoomId`]s.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Moves every object to the level its camera distance asks for.
    ///
    /// Objects already at their target level, objects with
    /// `override_visibility`, and objects or clusters outside the view
    /// frustum are left alone. Returns the number of transitions made.
    pub fn trigger_level_decision(&mut self, camera: &dyn ZoomCamera) -> Result<usize, ClusterError> {
        if !self.enabled {
            return Ok(0);
        }
        let frustum = camera.frustum();
        let eye = camera.position();
        let culling = self.config.frustum_culling;

        let mut targets: Vec<(ZoomId, ZoomLevel)> = Vec::new();
        if self.config.mode == DecisionMode::PerObject {
            for (id, object) in self.live_objects() {
                let Ok(object) = object.try_borrow() else {
                    continue;
                };
                let position = object.world_position();
                if culling && !frustum.intersects_sphere(position, object.bounding_radius()) {
                    continue;
                }
                targets.push((id, self.config.levels.level_for_distance(eye.distance(position))));
            }
        } else {
            if self.clusters_dirty {
                self.recluster()?;
            }
            for cluster in &self.clusters {
                let reach = cluster.radius + self.max_bounding_radius(&cluster.members);
                if culling && !frustum.intersects_sphere(cluster.centroid, reach) {
                    continue;
                }
                let level = self.config.levels.level_for_distance(eye.distance(cluster.centroid));
                targets.extend(cluster.members.iter().map(|&id| (id, level)));
            }
        }

        let mut owners = self.child_owners();
        let mut transitions = 0;
        for (id, level) in targets {
            let current = self
                .object(id)
                .and_then(|o| o.try_borrow().ok().map(|o| (o.appearance_level(), o.zoom_state().override_visibility)));
            match current {
                Some((current, false)) if current != level => {}
                _ => continue,
            }
            if self.show(id, level, &mut owners) {
                transitions += 1;
            }
        }
        Ok(transitions)
    }

    /// Shows `level` on every registered object regardless of distance.
    ///
    /// Returns the number of objects that reached the level.
    pub fn force_level(&mut self, level: ZoomLevel) -> usize {
        let ids: Vec<ZoomId> = self.live_objects().map(|(id, _)| id).collect();
        let mut owners = self.child_owners();
        ids.into_iter().filter(|&id| self.show(id, level, &mut owners)).count()
    }

    /// Indexes which objects hold each child right now.
    fn child_owners(&self) -> ChildOwners {
        let mut owners = ChildOwners::new();
        for (id, object) in self.live_objects() {
            let Ok(object) = object.try_borrow() else {
                continue;
            };
            for &child in &object.visual().children {
                owners.entry(child).or_default().push(id);
            }
        }
        owners
    }

    /// Shows `level` on one object and moves its children in `owners`.
    fn show(&mut self, id: ZoomId, level: ZoomLevel, owners: &mut ChildOwners) -> bool {
        let Some(Some(object)) = self.objects.get(id) else {
            return false;
        };
        let Ok(mut zoomable) = object.try_borrow_mut() else {
            log::warn!("Zoomable object {} is borrowed, skipping level {}", id, level);
            return false;
        };

        let claimed_elsewhere =
            |child: ObjectId| owners.get(&child).is_some_and(|holders| holders.iter().any(|&holder| holder != id));
        let shown = zoomable.show_appearance_with(level, self.config.restore_first, &claimed_elsewhere);
        self.released.extend(zoomable.take_released_resources());

        if shown {
            for holders in owners.values_mut() {
                holders.retain(|&holder| holder != id);
            }
            owners.retain(|_, holders| !holders.is_empty());
            for &child in &zoomable.visual().children {
                owners.entry(child).or_default().push(id);
            }
        }
        shown
    }

    // ========== Query API ==========

    pub fn len(&self) -> usize {
        self.objects.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn object(&self, id: ZoomId) -> Option<&SharedZoomable> {
        self.objects.get(id)?.as_ref()
    }

    pub fn level_of(&self, id: ZoomId) -> Option<ZoomLevel> {
        self.object(id)?.try_borrow().ok().map(|o| o.appearance_level())
    }

    /// Drains geometry and material handles detached by transitions, for disposal.
    pub fn take_released_resources(&mut self) -> Vec<ReleasedResource> {
        let mut released = std::mem::take(&mut self.released);
        for object in self.objects.iter().flatten() {
            if let Ok(mut zoomable) = object.try_borrow_mut() {
                released.extend(zoomable.take_released_resources());
            }
        }
        released
    }

    fn live_objects(&self) -> impl Iterator<Item = (ZoomId, &SharedZoomable)> + '_ {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(id, object)| object.as_ref().map(|object| (id, object)))
    }

    fn max_bounding_radius(&self, members: &[ZoomId]) -> f32 {
        members
            .iter()
            .filter_map(|&id| self.object(id)?.try_borrow().ok().map(|o| o.bounding_radius()))
            .fold(0.0, f32::max)
    }
}
