//! Materials and the scene objects that carry them.
//!
//! Each material variant has a fixed set of texture slots, so finding every
//! texture an object uses is a plain walk over known fields.

use std::sync::Arc;

use crate::texture::Texture;

type Slot = Option<Arc<Texture>>;

#[derive(Debug, Clone, Default)]
pub struct BasicMaterial {
    pub map: Slot,
    pub alpha_map: Slot,
    pub ao_map: Slot,
    pub env_map: Slot,
    pub light_map: Slot,
    pub specular_map: Slot,
}

#[derive(Debug, Clone, Default)]
pub struct LambertMaterial {
    pub map: Slot,
    pub alpha_map: Slot,
    pub ao_map: Slot,
    pub emissive_map: Slot,
    pub env_map: Slot,
    pub light_map: Slot,
    pub specular_map: Slot,
}

#[derive(Debug, Clone, Default)]
pub struct PhongMaterial {
    pub map: Slot,
    pub alpha_map: Slot,
    pub ao_map: Slot,
    pub bump_map: Slot,
    pub displacement_map: Slot,
    pub emissive_map: Slot,
    pub env_map: Slot,
    pub light_map: Slot,
    pub normal_map: Slot,
    pub specular_map: Slot,
}

#[derive(Debug, Clone, Default)]
pub struct StandardMaterial {
    pub map: Slot,
    pub alpha_map: Slot,
    pub ao_map: Slot,
    pub bump_map: Slot,
    pub displacement_map: Slot,
    pub emissive_map: Slot,
    pub env_map: Slot,
    pub light_map: Slot,
    pub metalness_map: Slot,
    pub normal_map: Slot,
    pub roughness_map: Slot,
}

#[derive(Debug, Clone, Default)]
pub struct SpriteMaterial {
    pub map: Slot,
    pub alpha_map: Slot,
}

#[derive(Debug, Clone)]
pub enum Material {
    Basic(BasicMaterial),
    Lambert(LambertMaterial),
    Phong(PhongMaterial),
    Standard(StandardMaterial),
    Sprite(SpriteMaterial),
}

impl Material {
    /// Every texture bound to this material, in slot declaration order.
    pub fn textures(&self) -> impl Iterator<Item = &Arc<Texture>> {
        let slots: Vec<&Slot> = match self {
            Material::Basic(m) => vec![
                &m.map,
                &m.alpha_map,
                &m.ao_map,
                &m.env_map,
                &m.light_map,
                &m.specular_map,
            ],
            Material::Lambert(m) => vec![
                &m.map,
                &m.alpha_map,
                &m.ao_map,
                &m.emissive_map,
                &m.env_map,
                &m.light_map,
                &m.specular_map,
            ],
            Material::Phong(m) => vec![
                &m.map,
                &m.alpha_map,
                &m.ao_map,
                &m.bump_map,
                &m.displacement_map,
                &m.emissive_map,
                &m.env_map,
                &m.light_map,
                &m.normal_map,
                &m.specular_map,
            ],
            Material::Standard(m) => vec![
                &m.map,
                &m.alpha_map,
                &m.ao_map,
                &m.bump_map,
                &m.displacement_map,
                &m.emissive_map,
                &m.env_map,
                &m.light_map,
                &m.metalness_map,
                &m.normal_map,
                &m.roughness_map,
            ],
            Material::Sprite(m) => vec![&m.map, &m.alpha_map],
        };
        slots.into_iter().flatten()
    }
}

/// A node in the scene graph.
#[derive(Debug, Clone, Default)]
pub struct SceneObject {
    pub material: Option<Material>,
    pub children: Vec<SceneObject>,
}

impl SceneObject {
    pub fn new(material: Material) -> Self {
        Self {
            material: Some(material),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: SceneObject) -> Self {
        self.children.push(child);
        self
    }

    /// Visit this object and then its descendants, depth first.
    pub fn traverse<'a>(&'a self, visit: &mut impl FnMut(&'a SceneObject)) {
        visit(self);
        for child in &self.children {
            child.traverse(visit);
        }
    }

    /// The textures of this object's own material.
    pub fn own_textures(&self) -> impl Iterator<Item = &Arc<Texture>> {
        self.material.iter().flat_map(Material::textures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slots_are_skipped() {
        let map = Texture::builder().build();
        let normal = Texture::builder().build();
        let material = Material::Standard(StandardMaterial {
            map: Some(map.clone()),
            normal_map: Some(normal.clone()),
            ..Default::default()
        });

        let ids: Vec<_> = material.textures().map(|t| t.id()).collect();
        assert_eq!(ids, vec![map.id(), normal.id()]);
    }

    #[test]
    fn traversal_visits_parents_before_children() {
        let textures: Vec<_> = (0..4).map(|_| Texture::builder().build()).collect();
        let sprite = |i: usize| {
            SceneObject::new(Material::Sprite(SpriteMaterial {
                map: Some(textures[i].clone()),
                alpha_map: None,
            }))
        };

        let scene = sprite(0)
            .with_child(sprite(1).with_child(sprite(2)))
            .with_child(sprite(3));

        let mut visited = Vec::new();
        scene.traverse(&mut |object| {
            visited.extend(object.own_textures().map(|t| t.id()));
        });

        let expected: Vec<_> = textures.iter().map(|t| t.id()).collect();
        assert_eq!(visited, expected);
    }

    #[test]
    fn objects_without_materials_have_no_textures() {
        assert_eq!(SceneObject::default().own_textures().count(), 0);
    }
}
