//! Material backend
//!
//! Retains the current material and feeds it into the bound shader program
//! as `scene_Material`. The upload is lazy: it happens on the first
//! `geo-drawing` after the material or the program changed.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::core::SceneError;
use crate::events::{Event, EventType};
use crate::scene::{Params, Value};

use super::program::{ProgramBackend, PROGRAM_BACKEND};
use super::{Backend, BackendContext};

/// Type string the material backend is installed under
pub const MATERIAL_BACKEND: &str = "material";

/// Program variable the material is uploaded to
pub const MATERIAL_VAR: &str = "scene_Material";

/// RGB color with components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: f64,
    /// Green
    pub g: f64,
    /// Blue
    pub b: f64,
}

impl Color {
    /// Create a color
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Read a `{r, g, b}` map; missing components are zero
    fn from_value(name: &str, value: &Value) -> Result<Self, SceneError> {
        let map = value.as_map().ok_or_else(|| {
            SceneError::InvalidNodeConfig(format!("material {name} must be a map of r, g, b"))
        })?;
        let component = |key: &str| -> Result<f64, SceneError> {
            match map.get(key) {
                None => Ok(0.0),
                Some(v) => v.as_f64().ok_or_else(|| {
                    SceneError::InvalidNodeConfig(format!("material {name}.{key} must be a number"))
                }),
            }
        };
        Ok(Self::new(component("r")?, component("g")?, component("b")?))
    }

    fn to_value(self) -> Value {
        Params::new().with("r", self.r).with("g", self.g).with("b", self.b).into()
    }
}

/// Surface reflectance properties
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    /// Ambient reflectance
    pub ambient: Color,
    /// Diffuse reflectance
    pub diffuse: Color,
    /// Specular reflectance
    pub specular: Color,
    /// Shininess
    pub shininess: Color,
}

impl Default for Material {
    // Visible on any background while debugging a scene
    fn default() -> Self {
        Self {
            ambient: Color::new(0.3, 0.3, 0.3),
            diffuse: Color::new(1.0, 1.0, 1.0),
            specular: Color::new(1.0, 1.0, 1.0),
            shininess: Color::new(0.0, 0.0, 1.0),
        }
    }
}

impl Material {
    /// Build from node parameters; absent properties keep their defaults
    pub fn from_params(params: &Params) -> Result<Self, SceneError> {
        let mut material = Self::default();
        for (name, slot) in [
            ("ambient", &mut material.ambient),
            ("diffuse", &mut material.diffuse),
            ("specular", &mut material.specular),
            ("shininess", &mut material.shininess),
        ] {
            if let Some(value) = params.get(name) {
                *slot = Color::from_value(name, value)?;
            }
        }
        Ok(material)
    }

    /// Parameter map form, as uploaded to the program
    pub fn to_params(&self) -> Params {
        Params::new()
            .with("ambient", self.ambient.to_value())
            .with("diffuse", self.diffuse.to_value())
            .with("specular", self.specular.to_value())
            .with("shininess", self.shininess.to_value())
    }
}

#[derive(Debug, Default)]
struct MaterialState {
    material: Material,
    loaded: bool,
}

/// Backend retaining the current material
#[derive(Debug, Default)]
pub struct MaterialBackend {
    state: Rc<RefCell<MaterialState>>,
}

impl MaterialBackend {
    /// Create a backend holding the default material
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current material; it is re-uploaded before the next draw
    pub fn set_material(&self, material: Material) {
        let mut state = self.state.borrow_mut();
        state.material = material;
        state.loaded = false;
    }

    /// Current material
    pub fn material(&self) -> Material {
        self.state.borrow().material
    }

    /// Whether the current material has been uploaded to the program
    pub fn is_loaded(&self) -> bool {
        self.state.borrow().loaded
    }
}

impl Backend for MaterialBackend {
    fn backend_type(&self) -> &str {
        MATERIAL_BACKEND
    }

    fn install(&self, ctx: &BackendContext) -> Result<(), SceneError> {
        let state = Rc::clone(&self.state);
        ctx.events.on_event(EventType::SceneActivated, move |_: &Event| -> Result<(), SceneError> {
            *state.borrow_mut() = MaterialState::default();
            Ok(())
        });

        // The previously bound program may need the material again
        let state = Rc::clone(&self.state);
        ctx.events.on_event(EventType::ProgramDeactivated, move |_: &Event| -> Result<(), SceneError> {
            state.borrow_mut().loaded = false;
            Ok(())
        });

        let state = Rc::clone(&self.state);
        let backends = ctx.backends.downgrade();
        ctx.events.on_event(EventType::GeoDrawing, move |_: &Event| -> Result<(), SceneError> {
            if state.borrow().loaded {
                return Ok(());
            }
            let program = backends.get_backend_as::<ProgramBackend>(PROGRAM_BACKEND)?;
            let material = state.borrow().material;
            program.set_var(MATERIAL_VAR, material.to_params());
            state.borrow_mut().loaded = true;
            log::trace!("Uploaded material to program");
            Ok(())
        });
        Ok(())
    }
}
