use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use cgmath::{Point3, Vector3};
use codecity_scene::{Communication, EntityId, LayoutMap, Mesh};

use crate::communication::geometry::{Arrow, CommunicationLayout};
use crate::communication::mesh::{CommunicationMesh, CommunicationMeshDataModel};
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::semantic_zoom::{SemanticZoomManager, SharedZoomable, ZoomId};

/// Tube thickness for a request count, scaled logarithmically against the
/// busiest communication and clamped to the configured range.
pub fn line_thickness_for_requests(requests: u64, max_requests: u64, config: &RenderConfig) -> f32 {
    let min = config.min_line_thickness;
    let max = config.max_line_thickness.max(min);
    if max_requests == 0 {
        return min;
    }
    let ratio = ((requests as f64).ln_1p() / (max_requests as f64).ln_1p()) as f32;
    (min + (max - min) * ratio).clamp(min, max)
}

struct RenderedCommunication {
    zoom_id: ZoomId,
    mesh: Rc<RefCell<CommunicationMesh>>,
}

/// Builds and owns the communication meshes of every rendered application.
///
/// Meshes are registered with the [`SemanticZoomManager`] on creation and
/// unregistered when their application is cleared.
pub struct CommunicationRenderer {
    config: RenderConfig,
    /// Shared by every arrow instance.
    arrow_geometry: Mesh,
    applications: HashMap<EntityId, Vec<RenderedCommunication>>,
    hovered: Option<EntityId>,
}

impl CommunicationRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            arrow_geometry: Arrow::unit_geometry(),
            applications: HashMap::new(),
            hovered: None,
        }
    }

    fn endpoint(layouts: &LayoutMap, class_id: &EntityId) -> Result<Point3<f32>, RenderError> {
        let layout = layouts
            .get(class_id)
            .ok_or_else(|| RenderError::MissingLayout(class_id.clone()))?;
        Ok(Point3::new(layout.center.x, layout.top_y(), layout.center.z))
    }

    fn layout_for(
        &self,
        communication: &Communication,
        layouts: &LayoutMap,
        max_requests: u64,
    ) -> Result<CommunicationLayout, RenderError> {
        let start = Self::endpoint(layouts, &communication.source_class_id)?;
        let end = Self::endpoint(layouts, &communication.target_class_id)?;
        let thickness = line_thickness_for_requests(communication.request_count, max_requests, &self.config);
        Ok(CommunicationLayout::new(start, end, thickness))
    }

    fn find(&self, id: &str) -> Option<&RenderedCommunication> {
        self.applications
            .values()
            .flatten()
            .find(|rendered| rendered.mesh.borrow().id() == id)
    }

    // ========== Query API ==========

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn arrow_geometry(&self) -> &Mesh {
        &self.arrow_geometry
    }

    pub fn communication(&self, id: &str) -> Option<Rc<RefCell<CommunicationMesh>>> {
        self.find(id).map(|rendered| rendered.mesh.clone())
    }

    /// Zoom manager slot of a communication.
    pub fn zoom_id(&self, id: &str) -> Option<ZoomId> {
        self.find(id).map(|rendered| rendered.zoom_id)
    }

    /// Meshes of one application, in insertion order.
    pub fn meshes(&self, application_id: &str) -> impl Iterator<Item = &Rc<RefCell<CommunicationMesh>>> + '_ {
        self.applications
            .get(application_id)
            .into_iter()
            .flatten()
            .map(|rendered| &rendered.mesh)
    }

    pub fn len(&self) -> usize {
        self.applications.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hovered(&self) -> Option<&EntityId> {
        self.hovered.as_ref()
    }

    // ========== Mutation API ==========

    /// Adds the communications of an application.
    ///
    /// Endpoints are the top centers of the source and target class boxes.
    /// A communication whose class layout is missing is logged and skipped.
    /// Returns the number of meshes created.
    ///
    /// # Arguments
    /// * `application_id` - Application the communications are drawn for
    /// * `origin` - World position of the application
    /// * `communications` - Communications to render
    /// * `layouts` - Class layouts relative to `origin`
    /// * `zoom` - Manager every new mesh is registered with
    pub fn add_communications(
        &mut self,
        application_id: &str,
        origin: Vector3<f32>,
        communications: &[Communication],
        layouts: &LayoutMap,
        zoom: &mut SemanticZoomManager,
    ) -> usize {
        let max_requests = communications.iter().map(|c| c.request_count).max().unwrap_or(0);
        let mut added = 0;

        for communication in communications {
            let layout = match self.layout_for(communication, layouts, max_requests) {
                Ok(layout) => layout,
                Err(err) => {
                    log::error!("Skipping communication {}: {}", communication.id, err);
                    continue;
                }
            };

            let data_model = CommunicationMeshDataModel::new(application_id, communication.clone());
            let mesh = Rc::new(RefCell::new(CommunicationMesh::new(data_model, origin, layout, &self.config)));
            let shared: SharedZoomable = mesh.clone();
            let zoom_id = zoom.register(shared);

            self.applications
                .entry(application_id.to_string())
                .or_default()
                .push(RenderedCommunication { zoom_id, mesh });
            added += 1;
        }
        added
    }

    /// Moves the communications of an application to new class layouts.
    ///
    /// Direction, transparency and hover survive. Communications whose
    /// layout went missing keep their previous geometry. Returns the number
    /// of meshes updated.
    pub fn update_layouts(&mut self, application_id: &str, origin: Vector3<f32>, layouts: &LayoutMap) -> usize {
        let Some(rendered) = self.applications.get(application_id) else {
            return 0;
        };
        let max_requests = rendered
            .iter()
            .map(|r| r.mesh.borrow().data_model().communication.request_count)
            .max()
            .unwrap_or(0);

        let mut updated = 0;
        for entry in rendered {
            let mut mesh = entry.mesh.borrow_mut();
            match self.layout_for(&mesh.data_model().communication, layouts, max_requests) {
                Ok(layout) => {
                    mesh.update_layout(origin, layout, &self.config);
                    updated += 1;
                }
                Err(err) => log::error!("Keeping old geometry of communication {}: {}", mesh.id(), err),
            }
        }
        updated
    }

    /// Destroys the communications of an application and unregisters them
    /// from the zoom manager. Returns the number removed.
    pub fn clear_application(&mut self, application_id: &str, zoom: &mut SemanticZoomManager) -> usize {
        let Some(rendered) = self.applications.remove(application_id) else {
            return 0;
        };

        for entry in &rendered {
            zoom.unregister(entry.zoom_id);
            if self.hovered.as_deref() == Some(entry.mesh.borrow().id().as_str()) {
                self.hovered = None;
            }
        }
        log::debug!("Disposed {} communications of application {}", rendered.len(), application_id);
        rendered.len()
    }

    /// Switches a communication between one and two arrows.
    ///
    /// Returns whether the direction changed.
    pub fn set_bidirectional(&mut self, id: &str, bidirectional: bool) -> Result<bool, RenderError> {
        let rendered = self.find(id).ok_or_else(|| RenderError::UnknownEntity(id.to_string()))?;
        let changed = rendered.mesh.borrow_mut().set_bidirectional(bidirectional);
        Ok(changed)
    }

    /// Fades every communication of an application. Returns the number affected.
    pub fn set_transparent(&mut self, application_id: &str, transparent: bool) -> usize {
        let mut count = 0;
        for mesh in self.meshes(application_id) {
            mesh.borrow_mut().set_transparent(transparent);
            count += 1;
        }
        count
    }

    /// Hovers a communication, reverting the previously hovered one first.
    pub fn apply_hover_effect(&mut self, id: &str) -> Result<(), RenderError> {
        let mesh = self
            .communication(id)
            .ok_or_else(|| RenderError::UnknownEntity(id.to_string()))?;
        if self.hovered.as_deref() != Some(id) {
            self.reset_hover_effect();
        }
        mesh.borrow_mut().apply_hover_effect(self.config.hover_color_shift);
        self.hovered = Some(id.to_string());
        Ok(())
    }

    pub fn reset_hover_effect(&mut self) {
        let Some(id) = self.hovered.take() else {
            return;
        };
        if let Some(mesh) = self.communication(&id) {
            mesh.borrow_mut().reset_hover_effect();
        }
    }
}
