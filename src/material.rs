//! Shared, immutable materials.
//!
//! Materials are created once and handed out as [`MaterialRef`]s. Objects
//! swap which reference they hold; nobody mutates a material in place, so
//! identity (`Arc::ptr_eq`) is enough to tell whether an object's visual state
//! was restored exactly.

use std::collections::HashMap;
use std::sync::Arc;

/// Shared handle to an immutable material.
pub type MaterialRef = Arc<Material>;

/// Linear RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Build from a packed `0xRRGGBB` value.
    pub fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }

    /// Build from hue, saturation and lightness, all in 0..1.
    pub fn from_hsl(h: f32, s: f32, l: f32) -> Self {
        let h = h.rem_euclid(1.0);
        let s = s.clamp(0.0, 1.0);
        let l = l.clamp(0.0, 1.0);

        if s == 0.0 {
            return Self::rgb(l, l, l);
        }

        let q = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;

        Self {
            r: hue_to_rgb(p, q, h + 1.0 / 3.0),
            g: hue_to_rgb(p, q, h),
            b: hue_to_rgb(p, q, h - 1.0 / 3.0),
        }
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self::rgb(self.r * factor, self.g * factor, self.b * factor)
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    /// Relative luminance (Rec. 709 weights).
    pub fn luminance(&self) -> f32 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }
}

fn hue_to_rgb(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * 6.0 * (2.0 / 3.0 - t)
    } else {
        p
    }
}

/// A surface description shared between objects.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Human-readable name.
    pub name: String,
    /// Base color.
    pub color: Color,
    /// Multiplier applied to the color; values above 1 push the surface into
    /// HDR range so it survives the bloom threshold.
    pub intensity: f32,
    /// 1.0 is opaque, 0.0 draws nothing.
    pub opacity: f32,
    /// Multiply the color with per-vertex colors.
    pub vertex_colors: bool,
}

impl Material {
    /// Create a new material builder.
    pub fn builder(name: impl Into<String>) -> MaterialBuilder {
        MaterialBuilder::new(name)
    }

    /// Opaque black stand-in: still writes depth, so it hides glowing objects
    /// behind it.
    pub fn black() -> Self {
        Material::builder("placeholder_black")
            .color(Color::BLACK)
            .build()
    }

    /// Fully transparent stand-in that draws nothing.
    pub fn hidden() -> Self {
        Material::builder("placeholder_hidden")
            .color(Color::BLACK)
            .opacity(0.0)
            .build()
    }

    /// Whether objects with this material produce any fragments.
    pub fn is_drawn(&self) -> bool {
        self.opacity > 0.0
    }

    /// Final RGBA color as uploaded to the GPU / used by the rasterizer.
    pub fn shaded_rgba(&self) -> [f32; 4] {
        let c = self.color.scaled(self.intensity);
        [c.r, c.g, c.b, self.opacity.clamp(0.0, 1.0)]
    }

    pub fn into_ref(self) -> MaterialRef {
        Arc::new(self)
    }
}

/// Builder for creating materials.
pub struct MaterialBuilder {
    name: String,
    color: Color,
    intensity: f32,
    opacity: f32,
    vertex_colors: bool,
}

impl MaterialBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: Color::WHITE,
            intensity: 1.0,
            opacity: 1.0,
            vertex_colors: false,
        }
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity.max(0.0);
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn vertex_colors(mut self, enabled: bool) -> Self {
        self.vertex_colors = enabled;
        self
    }

    pub fn build(self) -> Material {
        Material {
            name: self.name,
            color: self.color,
            intensity: self.intensity,
            opacity: self.opacity,
            vertex_colors: self.vertex_colors,
        }
    }
}

/// Named materials shared across a scene.
pub struct MaterialRegistry {
    materials: HashMap<String, MaterialRef>,
}

impl MaterialRegistry {
    /// Create a new registry with built-in materials.
    pub fn new() -> Self {
        let mut registry = Self {
            materials: HashMap::new(),
        };
        registry.register_builtin_materials();
        registry
    }

    fn register_builtin_materials(&mut self) {
        self.register(Material::builder("default").color(Color::WHITE).build());

        self.register(
            Material::builder("vertex_color")
                .vertex_colors(true)
                .build(),
        );

        // Hot white core used for sun-like emitters
        self.register(
            Material::builder("emitter")
                .color(Color::from_hex(0xfff2cc))
                .intensity(3.0)
                .build(),
        );
    }

    /// Register a material under its name, returning the shared handle.
    pub fn register(&mut self, material: Material) -> MaterialRef {
        let handle = material.into_ref();
        self.materials.insert(handle.name.clone(), Arc::clone(&handle));
        handle
    }

    /// Get a material by name.
    pub fn get(&self, name: &str) -> Option<MaterialRef> {
        self.materials.get(name).cloned()
    }

    /// Get the material with the given name, registering `make()` first if absent.
    pub fn get_or_insert_with(&mut self, name: &str, make: impl FnOnce() -> Material) -> MaterialRef {
        if let Some(existing) = self.materials.get(name) {
            return Arc::clone(existing);
        }
        let mut material = make();
        material.name = name.to_string();
        self.register(material)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.materials.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

impl Default for MaterialRegistry {
    fn default() -> Self {
        Self::new()
    }
}
