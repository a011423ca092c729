//! Minimal MTL parser: material names and texture map statements.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result, anyhow};

use crate::scene::Material;
use crate::texture::TextureKind;

/// Load all materials of an MTL file.
pub fn load_mtl_from_path(path: impl AsRef<Path>) -> Result<Vec<Material>> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open MTL file: {}", path.as_ref().display()))?;
    parse_mtl(BufReader::new(file))
}

/// Convenience helper to parse an MTL string literal.
pub fn load_mtl_from_str(contents: &str) -> Result<Vec<Material>> {
    parse_mtl(io::Cursor::new(contents))
}

/// Texture kind a map statement feeds, if it is one we import.
fn map_kind(tag: &str) -> Option<TextureKind> {
    match tag.to_ascii_lowercase().as_str() {
        "map_kd" => Some(TextureKind::Diffuse),
        "map_ks" => Some(TextureKind::Specular),
        "norm" | "map_kn" => Some(TextureKind::Normal),
        "map_bump" | "bump" => Some(TextureKind::Height),
        _ => None,
    }
}

fn parse_mtl<R: BufRead>(reader: R) -> Result<Vec<Material>> {
    let mut materials: Vec<Material> = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };

        if tag == "newmtl" {
            let name = parts.collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                anyhow::bail!("Missing material name on line {}", line_no + 1);
            }
            materials.push(Material::new(name));
            continue;
        }

        let Some(kind) = map_kind(tag) else {
            // Colors, exponents, illum etc. are not used.
            continue;
        };
        // Options (-bm 1.0, -clamp on, ...) precede the file name.
        let file = parts
            .last()
            .ok_or_else(|| anyhow!("Missing texture path for '{}' on line {}", tag, line_no + 1))?;
        let material = materials.last_mut().ok_or_else(|| {
            anyhow!(
                "Texture statement '{}' before any newmtl on line {}",
                tag,
                line_no + 1
            )
        })?;
        material.add_texture(kind, file);
    }

    Ok(materials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_maps_per_material() {
        let src = r#"
            # two materials
            newmtl body
            Kd 0.8 0.8 0.8
            map_Kd body_dif.png
            map_Ks body_spec.png
            map_Bump -bm 0.5 body_ddn.png
            newmtl glass
            map_Kd glass.png
            norm glass_n.png
            bump glass_h.png
        "#;
        let mats = load_mtl_from_str(src).expect("parse mtl");
        assert_eq!(mats.len(), 2);
        assert_eq!(mats[0].name, "body");
        assert_eq!(mats[0].textures(TextureKind::Diffuse), ["body_dif.png"]);
        assert_eq!(mats[0].textures(TextureKind::Specular), ["body_spec.png"]);
        assert_eq!(mats[0].textures(TextureKind::Height), ["body_ddn.png"]);
        assert!(mats[0].textures(TextureKind::Normal).is_empty());
        assert_eq!(mats[1].textures(TextureKind::Normal), ["glass_n.png"]);
        assert_eq!(mats[1].textures(TextureKind::Height), ["glass_h.png"]);
    }

    #[test]
    fn map_before_newmtl_is_an_error() {
        let err = load_mtl_from_str("map_Kd a.png\n").unwrap_err();
        assert!(err.to_string().contains("before any newmtl"));
    }
}
