use std::fs;
use std::path::Path;

use asset::{ImportError, TextureKind};
use renderer::{AssetImporter, Command, HeadlessBackend, ProgramId, TextureId};
use tempfile::TempDir;

const MODEL: &str = "\
mtllib scene.mtl
v -1 0 -1
v 1 0 -1
v 1 0 1
v -1 0 1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 1 0
o crate
usemtl wood
f 1/1/1 2/2/1 3/3/1 4/4/1
o floor
usemtl stone
f 1/1/1 3/3/1 2/2/1
";

const MATERIALS: &str = "\
newmtl wood
map_Kd textures/wood.png
map_Ks textures/wood.png
newmtl stone
map_Kd textures/wood.png
norm textures/missing.png
";

fn write_model(dir: &Path) -> std::path::PathBuf {
    fs::create_dir_all(dir.join("textures")).unwrap();
    image::RgbaImage::from_pixel(4, 4, image::Rgba([200, 120, 40, 255]))
        .save(dir.join("textures/wood.png"))
        .unwrap();
    fs::write(dir.join("scene.mtl"), MATERIALS).unwrap();
    let model = dir.join("scene.obj");
    fs::write(&model, MODEL).unwrap();
    model
}

#[test]
fn obj_with_shared_texture_uploads_each_path_once() {
    let tmp = TempDir::new().unwrap();
    let path = write_model(tmp.path());

    let mut gpu = HeadlessBackend::new();
    let model = AssetImporter::new().import_scene(&mut gpu, &path).unwrap();

    assert_eq!(model.directory(), tmp.path());
    assert_eq!(model.meshes().len(), 2);
    // quad fanned into two triangles, then the single floor triangle
    assert_eq!(model.meshes()[0].indices().len(), 6);
    assert_eq!(model.meshes()[1].indices().len(), 3);
    assert_eq!(model.triangle_count(), 3);

    // wood.png requested three times, missing.png once
    assert_eq!(model.textures().len(), 2);
    assert_eq!(model.textures().upload_count(), 1);
    assert_eq!(gpu.uploads().len(), 1);
    assert_eq!(gpu.uploads()[0].width, 4);
    assert_eq!(gpu.uploads()[0].mip_levels, 3);

    let crate_textures = model.meshes()[0].textures();
    assert_eq!(crate_textures.len(), 2);
    assert_eq!(crate_textures[0].kind, TextureKind::Diffuse);
    assert_eq!(crate_textures[1].kind, TextureKind::Specular);
    assert_eq!(crate_textures[0].handle, crate_textures[1].handle);
    assert_eq!(crate_textures[0].path, tmp.path().join("textures/wood.png"));

    let floor_textures = model.meshes()[1].textures();
    assert_eq!(floor_textures[0].handle, crate_textures[0].handle);
    assert_eq!(floor_textures[1].kind, TextureKind::Normal);
    assert_eq!(floor_textures[1].handle, TextureId::INVALID);
}

#[test]
fn drawing_names_slots_per_mesh() {
    let tmp = TempDir::new().unwrap();
    let path = write_model(tmp.path());
    let mut gpu = HeadlessBackend::new();
    let model = AssetImporter::new().import_scene(&mut gpu, &path).unwrap();

    model.draw(&mut gpu, &ProgramId(1));

    let names: Vec<String> = gpu
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::SetInt { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        names,
        vec![
            "texture_diffuse1",
            "texture_specular1",
            "texture_diffuse1",
            "texture_normal1",
        ]
    );
    assert_eq!(gpu.draw_count(), 2);
}

#[test]
fn unreadable_and_empty_models_fail_to_import() {
    let tmp = TempDir::new().unwrap();
    let mut gpu = HeadlessBackend::new();

    let missing = AssetImporter::new().import_scene(&mut gpu, tmp.path().join("nope.obj"));
    assert!(matches!(missing, Err(ImportError::Parse { .. })));

    let empty = tmp.path().join("empty.obj");
    fs::write(&empty, "# nothing here\n").unwrap();
    let result = AssetImporter::new().import_scene(&mut gpu, &empty);
    assert!(matches!(result, Err(ImportError::Incomplete { .. })));
    assert!(gpu.uploads().is_empty());
}
