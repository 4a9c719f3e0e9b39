use cgmath::{EuclideanSpace, Matrix4, Vector3};
use codecity_common::RgbColor;
use codecity_scene::{Communication, EntityId};

use crate::communication::geometry::{Arrow, CommunicationGeometry, CommunicationLayout, RenderMode};
use crate::config::RenderConfig;
use crate::instanced::MeshKind;
use crate::semantic_zoom::{Visual, ZoomState, ZoomableObject};

/// What a rendered communication stands for.
#[derive(Debug, Clone, PartialEq)]
pub struct CommunicationMeshDataModel {
    pub id: EntityId,
    pub application_id: EntityId,
    pub communication: Communication,
    /// Application of the target class when it differs from the source's.
    pub target_application_id: Option<EntityId>,
}

impl CommunicationMeshDataModel {
    pub fn new(application_id: impl Into<EntityId>, communication: Communication) -> Self {
        let target_application_id = communication
            .is_cross_application()
            .then(|| communication.target_app_id.clone());
        Self {
            id: communication.id.clone(),
            application_id: application_id.into(),
            communication,
            target_application_id,
        }
    }
}

/// A communication tube or sphere with its direction arrows.
#[derive(Debug)]
pub struct CommunicationMesh {
    data_model: CommunicationMeshDataModel,
    origin: Vector3<f32>,
    layout: CommunicationLayout,
    geometry: CommunicationGeometry,
    arrows: Vec<Arrow>,
    /// Reverse arrow of a unidirectional communication, attached when it becomes bidirectional.
    reverse_arrow: Option<Arrow>,
    arrow_width: f32,
    arrow_color: RgbColor,
    transparent: bool,
    opacity: f32,
    visual: Visual,
    zoom: ZoomState,
    /// Brightness factor while hovered. Kept out of the visual so snapshots never see it.
    hover_shift: Option<f32>,
}

impl CommunicationMesh {
    /// Builds the mesh of one communication.
    ///
    /// # Arguments
    /// * `data_model` - The communication and its applications
    /// * `origin` - World position of the source application
    /// * `layout` - Endpoints relative to `origin`
    /// * `config` - Geometry constants and colors
    pub fn new(
        data_model: CommunicationMeshDataModel,
        origin: Vector3<f32>,
        layout: CommunicationLayout,
        config: &RenderConfig,
    ) -> Self {
        let mut mesh = Self {
            geometry: CommunicationGeometry::build(&layout, data_model.communication.is_recursive(), config),
            data_model,
            origin,
            layout,
            arrows: Vec::new(),
            reverse_arrow: None,
            arrow_width: config.arrow_width,
            arrow_color: config.colors.communication_arrow,
            transparent: false,
            opacity: config.transparent_opacity,
            visual: Visual {
                color: config.colors.communication,
                ..Visual::default()
            },
            zoom: ZoomState::new(),
            hover_shift: None,
        };
        mesh.place();
        mesh.build_arrows();
        mesh
    }

    /// Point the visual position rests at for the current layout.
    fn anchor(&self) -> Vector3<f32> {
        self.origin + self.layout.midpoint().to_vec()
    }

    fn place(&mut self) {
        let thickness = self.layout.line_thickness;
        self.visual.position = self.anchor();
        self.visual.dimensions = Vector3::new(thickness, thickness, self.geometry.path_length());
    }

    /// Moves layout-space geometry to the world, following the visual's
    /// position and scale around the anchor.
    fn placement(&self) -> Matrix4<f32> {
        let scale = self.visual.scale;
        Matrix4::from_translation(self.visual.position)
            * Matrix4::from_nonuniform_scale(scale.x, scale.y, scale.z)
            * Matrix4::from_translation(-self.layout.midpoint().to_vec())
    }

    fn build_arrows(&mut self) {
        let forward = Arrow::along(&self.geometry, self.arrow_width, false, self.arrow_color);
        let reverse = Arrow::along(&self.geometry, self.arrow_width, true, self.arrow_color);

        self.arrows = forward.into_iter().collect();
        self.reverse_arrow = None;
        if self.data_model.communication.is_bidirectional {
            self.arrows.extend(reverse);
        } else {
            self.reverse_arrow = reverse;
        }

        let (transparent, opacity) = (self.transparent, self.opacity);
        for arrow in self.arrows.iter_mut().chain(self.reverse_arrow.as_mut()) {
            arrow.set_transparent(transparent, opacity);
        }
    }

    // ========== Query API ==========

    pub fn data_model(&self) -> &CommunicationMeshDataModel {
        &self.data_model
    }

    pub fn id(&self) -> &EntityId {
        &self.data_model.id
    }

    pub fn kind(&self) -> MeshKind {
        MeshKind::Communication
    }

    pub fn layout(&self) -> &CommunicationLayout {
        &self.layout
    }

    pub fn geometry(&self) -> &CommunicationGeometry {
        &self.geometry
    }

    pub fn render_mode(&self) -> RenderMode {
        self.geometry.mode
    }

    /// Attached arrows. Bidirectional communications carry two.
    pub fn arrows(&self) -> &[Arrow] {
        &self.arrows
    }

    pub fn cached_reverse_arrow(&self) -> Option<&Arrow> {
        self.reverse_arrow.as_ref()
    }

    pub fn is_bidirectional(&self) -> bool {
        self.data_model.communication.is_bidirectional
    }

    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    /// Opacity of the tube and its arrows.
    pub fn opacity(&self) -> f32 {
        if self.transparent {
            self.opacity
        } else {
            1.0
        }
    }

    pub fn is_hovered(&self) -> bool {
        self.hover_shift.is_some()
    }

    /// Whether the current appearance shows the communication at all.
    pub fn is_visible(&self) -> bool {
        self.visual.visible
    }

    /// Color to draw the tube with, including the hover highlight.
    pub fn color(&self) -> RgbColor {
        match self.hover_shift {
            Some(shift) => self.visual.color.scaled_clamped(shift),
            None => self.visual.color,
        }
    }

    /// World transform of the tube or sphere mesh.
    pub fn world_transform(&self) -> Matrix4<f32> {
        self.placement() * self.geometry.transform
    }

    /// World transforms of the attached arrows. Empty while hidden.
    pub fn arrow_transforms(&self) -> Vec<Matrix4<f32>> {
        if !self.visual.visible {
            return Vec::new();
        }
        let placement = self.placement();
        self.arrows.iter().map(|arrow| placement * arrow.transform()).collect()
    }

    // ========== Mutation API ==========

    /// Attaches or detaches the reverse arrow.
    ///
    /// Returns true if the direction flag changed.
    pub fn set_bidirectional(&mut self, bidirectional: bool) -> bool {
        if self.is_bidirectional() == bidirectional {
            return false;
        }
        self.data_model.communication.is_bidirectional = bidirectional;

        if bidirectional {
            self.arrows.extend(self.reverse_arrow.take());
        } else if self.arrows.len() > 1 {
            self.reverse_arrow = self.arrows.pop();
        }
        true
    }

    /// Fades the communication and every arrow, attached or cached.
    pub fn set_transparent(&mut self, transparent: bool) {
        self.transparent = transparent;
        let opacity = self.opacity;
        for arrow in self.arrows.iter_mut().chain(self.reverse_arrow.as_mut()) {
            arrow.set_transparent(transparent, opacity);
        }
    }

    /// Brightens the drawn color. The visual keeps its base color.
    pub fn apply_hover_effect(&mut self, shift: f32) {
        self.hover_shift = Some(shift);
    }

    pub fn reset_hover_effect(&mut self) {
        self.hover_shift = None;
    }

    /// Rebuilds geometry for new endpoints, keeping direction, transparency and hover.
    ///
    /// The level 0 snapshot is retaken at the new place and the current
    /// appearance level is applied again on top of it.
    pub fn update_layout(&mut self, origin: Vector3<f32>, layout: CommunicationLayout, config: &RenderConfig) {
        let level = self.zoom.level();
        let had_original = self.zoom.original().is_some();
        if had_original && level != 0 {
            self.zoom.transition(&mut self.visual, 0, false, &|_| false);
        }

        self.origin = origin;
        self.layout = layout;
        self.geometry = CommunicationGeometry::build(&layout, self.data_model.communication.is_recursive(), config);
        self.arrow_width = config.arrow_width;
        self.place();
        self.build_arrows();

        if had_original {
            self.zoom.save_original(&self.visual);
            if level != 0 && !self.zoom.transition(&mut self.visual, level, false, &|_| false) {
                log::warn!("Communication {} lost appearance level {} on relayout", self.id(), level);
            }
        }
    }
}

impl ZoomableObject for CommunicationMesh {
    fn zoom_parts_mut(&mut self) -> (&mut ZoomState, &mut Visual) {
        (&mut self.zoom, &mut self.visual)
    }

    fn zoom_state(&self) -> &ZoomState {
        &self.zoom
    }

    fn visual(&self) -> &Visual {
        &self.visual
    }
}
