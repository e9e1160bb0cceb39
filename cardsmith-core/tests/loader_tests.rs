use std::fs;
use std::io::Write;
use std::path::Path;

use pretty_assertions::assert_eq;
use serde_json::json;

use cardsmith_core::{CancelToken, CardError, CardLoader};
use cardsmith_ctml::{BoundElement, CtmlError};

const HERO_FACE: &str = r##"
<template>
    <rectangle color="#1a1a2e" radius="4px">
        <text x="10px" y="10px" :value="title" />
    </rectangle>
</template>
<script setup>
return function(name)
    local system = require("system")
    return { title = name, banner = system.unit("100%", true) }
end
</script>
"##;

fn write_definition(dir: &Path, face_markup: &str) {
    let definition = json!({
        "name": "demo set",
        "width": "300px",
        "height": "420px",
        "fontSize": "12px",
        "variants": { "hero": "faces/hero.ctml" }
    });
    fs::write(dir.join("card.json"), definition.to_string()).unwrap();
    fs::create_dir_all(dir.join("faces")).unwrap();
    fs::write(dir.join("faces/hero.ctml"), face_markup).unwrap();
}

#[tokio::test]
async fn loads_a_directory_and_runs_the_setup_script() {
    cardsmith_core::init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_definition(dir.path(), HERO_FACE);

    let set = CardLoader::new()
        .load(&dir.path().to_string_lossy())
        .await
        .unwrap();
    assert_eq!(set.definition.name, "demo set");
    assert!(set.cleanup_paths.is_empty());

    let face = set.front_faces.get("hero").unwrap();
    assert_eq!(face.template.len(), 1);
    assert!(matches!(face.template[0], BoundElement::Rectangle(_)));

    let result = face
        .run_setup(vec![json!("Dragon")], CancelToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result, json!({ "title": "Dragon", "banner": 300 }));
}

#[tokio::test]
async fn faces_without_setup_scripts_have_no_runner() {
    let dir = tempfile::tempdir().unwrap();
    write_definition(dir.path(), "<template><clear color=\"#000\" /></template>");

    let set = CardLoader::new()
        .load(&dir.path().to_string_lossy())
        .await
        .unwrap();
    let face = set.front_faces.get("hero").unwrap();
    assert!(face.runner.is_none());
    let result = face.run_setup(vec![], CancelToken::new()).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn shared_scripts_are_requirable_from_setup() {
    let dir = tempfile::tempdir().unwrap();
    let definition = json!({
        "name": "demo set",
        "width": "300px",
        "height": "420px",
        "fontSize": "12px",
        "variants": { "hero": "faces/hero.ctml" },
        "resources": { "scripts": { "util": "scripts/util.lua" } }
    });
    fs::write(dir.path().join("card.json"), definition.to_string()).unwrap();
    fs::create_dir_all(dir.path().join("scripts")).unwrap();
    fs::write(
        dir.path().join("scripts/util.lua"),
        "return { shout = function(s) return s .. \"!\" end }",
    )
    .unwrap();
    fs::create_dir_all(dir.path().join("faces")).unwrap();
    fs::write(
        dir.path().join("faces/hero.ctml"),
        "<template><clear color=\"#000\" /></template>\n\
         <script setup>\n\
         local util = require(\"util\")\n\
         return function(name) return { title = util.shout(name) } end\n\
         </script>",
    )
    .unwrap();

    let set = CardLoader::new()
        .load(&dir.path().to_string_lossy())
        .await
        .unwrap();
    assert!(set.shared_scripts.contains_key("util"));

    let face = set.front_faces.get("hero").unwrap();
    let result = face
        .run_setup(vec![json!("charge")], CancelToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result, json!({ "title": "charge!" }));
}

#[tokio::test]
async fn face_scripts_cannot_shadow_shared_scripts() {
    let dir = tempfile::tempdir().unwrap();
    let definition = json!({
        "name": "demo set",
        "width": "300px",
        "height": "420px",
        "fontSize": "12px",
        "variants": { "hero": "faces/hero.ctml" },
        "resources": { "scripts": { "util": "scripts/util.lua" } }
    });
    fs::write(dir.path().join("card.json"), definition.to_string()).unwrap();
    fs::create_dir_all(dir.path().join("scripts")).unwrap();
    fs::write(dir.path().join("scripts/util.lua"), "return {}").unwrap();
    fs::create_dir_all(dir.path().join("faces")).unwrap();
    fs::write(
        dir.path().join("faces/hero.ctml"),
        "<template><clear color=\"#000\" /></template>\n\
         <script name=\"util\">return {}</script>",
    )
    .unwrap();

    let err = CardLoader::new()
        .load(&dir.path().to_string_lossy())
        .await
        .unwrap_err();
    assert!(matches!(err, CardError::DuplicateScriptName { name } if name == "util"));
}

#[tokio::test]
async fn malformed_bound_expressions_fail_at_load_time() {
    let dir = tempfile::tempdir().unwrap();
    write_definition(
        dir.path(),
        r#"<template><text :x="1 +" value="broken" /></template>"#,
    );
    let err = CardLoader::new()
        .load(&dir.path().to_string_lossy())
        .await
        .unwrap_err();
    assert!(matches!(err, CardError::Script(_)));
}

#[tokio::test]
async fn well_formed_bound_expressions_pass_the_load_time_check() {
    let dir = tempfile::tempdir().unwrap();
    write_definition(
        dir.path(),
        r#"<template><text :x="offset + 2" :value="card.title" /></template>"#,
    );
    let set = CardLoader::new()
        .load(&dir.path().to_string_lossy())
        .await
        .unwrap();
    assert!(set.front_faces.contains_key("hero"));
}

#[tokio::test]
async fn face_documents_need_exactly_one_template() {
    let dir = tempfile::tempdir().unwrap();
    write_definition(
        dir.path(),
        "<template><clear color=\"#000\" /></template>\n\
         <template><clear color=\"#fff\" /></template>",
    );
    let err = CardLoader::new()
        .load(&dir.path().to_string_lossy())
        .await
        .unwrap_err();
    assert!(matches!(err, CardError::MultipleTemplates));

    let dir = tempfile::tempdir().unwrap();
    write_definition(dir.path(), "<script setup>return function() end</script>");
    let err = CardLoader::new()
        .load(&dir.path().to_string_lossy())
        .await
        .unwrap_err();
    assert!(matches!(err, CardError::MissingTemplate));
}

#[tokio::test]
async fn at_most_one_setup_script_per_face() {
    let dir = tempfile::tempdir().unwrap();
    write_definition(
        dir.path(),
        "<template><clear color=\"#000\" /></template>\n\
         <script setup>return function() end</script>\n\
         <script setup>return function() end</script>",
    );
    let err = CardLoader::new()
        .load(&dir.path().to_string_lossy())
        .await
        .unwrap_err();
    assert!(matches!(err, CardError::MultipleSetupScripts));
}

#[tokio::test]
async fn scripts_need_a_body_or_a_src_attribute() {
    let dir = tempfile::tempdir().unwrap();
    write_definition(
        dir.path(),
        "<template><clear color=\"#000\" /></template>\n\
         <script name=\"empty\" />",
    );
    let err = CardLoader::new()
        .load(&dir.path().to_string_lossy())
        .await
        .unwrap_err();
    assert!(matches!(err, CardError::ScriptMissingSource));
}

#[tokio::test]
async fn non_setup_scripts_need_a_name() {
    let dir = tempfile::tempdir().unwrap();
    write_definition(
        dir.path(),
        "<template><clear color=\"#000\" /></template>\n\
         <script>return {}</script>",
    );
    let err = CardLoader::new()
        .load(&dir.path().to_string_lossy())
        .await
        .unwrap_err();
    assert!(matches!(err, CardError::ScriptMissingName));
}

#[tokio::test]
async fn unknown_root_tags_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_definition(
        dir.path(),
        "<template><clear color=\"#000\" /></template>\n\
         <styles></styles>",
    );
    let err = CardLoader::new()
        .load(&dir.path().to_string_lossy())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CardError::Ctml(CtmlError::UnknownElement { tag, .. }) if tag == "styles"
    ));
}

fn build_archive(target: &Path, entries: &[(&str, &[u8])]) {
    let file = fs::File::create(target).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, bytes) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
}

#[tokio::test]
async fn loads_a_zip_bundle_and_tracks_its_extraction_directory() {
    let staging = tempfile::tempdir().unwrap();
    let definition = json!({
        "name": "bundled",
        "width": "300px",
        "height": "420px",
        "fontSize": "12px",
        "variants": { "hero": "faces/hero.ctml" }
    });
    let archive = staging.path().join("set.zip");
    build_archive(
        &archive,
        &[
            ("card.json", definition.to_string().as_bytes()),
            ("faces/hero.ctml", HERO_FACE.as_bytes()),
        ],
    );

    let mut set = CardLoader::new()
        .load(&archive.to_string_lossy())
        .await
        .unwrap();
    assert_eq!(set.definition.name, "bundled");
    assert_eq!(set.cleanup_paths.len(), 1);

    let extracted = set.cleanup_paths[0].clone();
    assert!(extracted.is_dir());
    set.cleanup();
    assert!(!extracted.exists());
    assert!(set.cleanup_paths.is_empty());
}

fn extraction_dirs() -> Vec<std::path::PathBuf> {
    fs::read_dir(std::env::temp_dir())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("cardsmith-"))
        })
        .collect()
}

#[tokio::test]
async fn archives_inside_archives_are_refused_and_leave_no_extraction_dir() {
    let staging = tempfile::tempdir().unwrap();
    let inner = staging.path().join("inner.zip");
    build_archive(&inner, &[("card.json", b"{}")]);

    let outer = staging.path().join("outer.zip");
    build_archive(&outer, &[("index.zip", &fs::read(&inner).unwrap())]);

    let before = extraction_dirs();
    let err = CardLoader::new()
        .load(&outer.to_string_lossy())
        .await
        .unwrap_err();
    assert!(matches!(err, CardError::NestedArchive { .. }));

    // Only this load extracts an index.zip; other tests may create
    // extraction directories concurrently, so check contents, not counts.
    for leftover in extraction_dirs() {
        if !before.contains(&leftover) {
            assert!(
                !leftover.join("index.zip").exists(),
                "rejected archive left its extraction directory behind: {}",
                leftover.display()
            );
        }
    }
}

#[tokio::test]
async fn missing_locations_report_not_found() {
    let err = CardLoader::new()
        .load("/nonexistent/cardsmith/set")
        .await
        .unwrap_err();
    assert!(matches!(err, CardError::ResourceNotFound { .. }));
}
